//! Adaptive polling timer: widens or tightens the quoter's tick interval
//! based on observed price/volume activity. Grounded on the original bot's
//! adaptive timer; transitions per §4.22.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    Fast,
    Normal,
    Sleep,
}

pub struct AdaptiveTimer {
    fast_interval: Duration,
    normal_interval: Duration,
    sleep_interval: Duration,
    fast_mode_duration: Duration,
    mode: TimerMode,
    last_fast_trigger: Option<Instant>,
}

impl AdaptiveTimer {
    pub fn new(fast_secs: f64, normal_secs: f64, sleep_secs: f64, fast_mode_duration_secs: f64) -> Self {
        Self {
            fast_interval: Duration::from_secs_f64(fast_secs),
            normal_interval: Duration::from_secs_f64(normal_secs),
            sleep_interval: Duration::from_secs_f64(sleep_secs),
            fast_mode_duration: Duration::from_secs_f64(fast_mode_duration_secs),
            mode: TimerMode::Normal,
            last_fast_trigger: None,
        }
    }

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn interval(&self) -> Duration {
        match self.mode {
            TimerMode::Fast => self.fast_interval,
            TimerMode::Normal => self.normal_interval,
            TimerMode::Sleep => self.sleep_interval,
        }
    }

    fn trigger_fast(&mut self) {
        self.mode = TimerMode::Fast;
        self.last_fast_trigger = Some(Instant::now());
    }

    pub fn record_price_change(&mut self, pct: f64) {
        if pct.abs() >= 0.01 {
            self.trigger_fast();
        }
    }

    pub fn record_volume(&mut self, current: f64, avg: f64) {
        if avg > 0.0 && current / avg >= 2.0 {
            self.trigger_fast();
        }
    }

    pub fn record_activity(&mut self, seconds_since_last: f64) {
        if self.mode == TimerMode::Fast {
            return;
        }
        if seconds_since_last >= 60.0 {
            self.mode = TimerMode::Sleep;
        }
    }

    /// Must be polled every tick so FAST mode can decay once the
    /// `fast_mode_duration` window has elapsed without new triggers.
    pub fn tick(&mut self) {
        if self.mode == TimerMode::Fast {
            if let Some(triggered_at) = self.last_fast_trigger {
                if triggered_at.elapsed() >= self.fast_mode_duration {
                    self.mode = TimerMode::Normal;
                    self.last_fast_trigger = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn large_price_move_triggers_fast() {
        let mut timer = AdaptiveTimer::new(0.1, 2.0, 5.0, 10.0);
        timer.record_price_change(0.02);
        assert_eq!(timer.mode(), TimerMode::Fast);
    }

    #[test]
    fn volume_spike_triggers_fast() {
        let mut timer = AdaptiveTimer::new(0.1, 2.0, 5.0, 10.0);
        timer.record_volume(250.0, 100.0);
        assert_eq!(timer.mode(), TimerMode::Fast);
    }

    #[test]
    fn inactivity_triggers_sleep_unless_fast() {
        let mut timer = AdaptiveTimer::new(0.1, 2.0, 5.0, 10.0);
        timer.record_activity(90.0);
        assert_eq!(timer.mode(), TimerMode::Sleep);
        timer.record_price_change(0.05);
        timer.record_activity(90.0);
        assert_eq!(timer.mode(), TimerMode::Fast);
    }

    #[test]
    fn fast_mode_decays_after_duration() {
        let mut timer = AdaptiveTimer::new(0.1, 2.0, 5.0, 0.01);
        timer.record_price_change(0.05);
        assert_eq!(timer.mode(), TimerMode::Fast);
        sleep(Duration::from_millis(20));
        timer.tick();
        assert_eq!(timer.mode(), TimerMode::Normal);
    }
}

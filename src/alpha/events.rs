//! Resolution-proximity and news-impact signal tracking.
//! Grounded on the original bot's event tracker; thresholds per §4.12.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct MarketEvent {
    pub impact: f64,
    pub confidence: f64,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDirection {
    Neutral,
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeRecommendation {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy)]
pub struct EventSignal {
    pub direction: EventDirection,
    pub trade: TradeRecommendation,
    pub strength: f64,
    pub spread_mult: f64,
    pub size_mult: f64,
}

pub struct EventTracker {
    events: std::collections::HashMap<String, Vec<MarketEvent>>,
    resolutions: std::collections::HashMap<String, DateTime<Utc>>,
}

impl EventTracker {
    pub fn new() -> Self {
        Self {
            events: std::collections::HashMap::new(),
            resolutions: std::collections::HashMap::new(),
        }
    }

    pub fn register_resolution(&mut self, market_id: &str, resolves_at: DateTime<Utc>) {
        self.resolutions.insert(market_id.to_string(), resolves_at);
    }

    pub fn add_event(&mut self, market_id: &str, event: MarketEvent) {
        self.events.entry(market_id.to_string()).or_default().push(event);
    }

    pub fn get_signal(&self, market_id: &str) -> EventSignal {
        let now = Utc::now();
        let active_events: Vec<&MarketEvent> = self
            .events
            .get(market_id)
            .map(|events| events.iter().filter(|e| e.expiry > now).collect())
            .unwrap_or_default();

        let hours_to_resolution = self
            .resolutions
            .get(market_id)
            .map(|resolves_at| (*resolves_at - now).num_milliseconds() as f64 / 3_600_000.0);

        if active_events.is_empty() {
            match hours_to_resolution {
                None => return neutral_default(),
                Some(h) if h > 24.0 => return neutral_default(),
                Some(h) if h > 1.0 => {
                    let spread_mult = (1.5 + (1.0 - h / 24.0)).min(2.5);
                    let size_mult = (h / 24.0).max(0.2);
                    return EventSignal {
                        direction: EventDirection::Neutral,
                        trade: TradeRecommendation::Yes,
                        strength: 0.0,
                        spread_mult,
                        size_mult,
                    };
                }
                Some(_) => {
                    return EventSignal {
                        direction: EventDirection::Neutral,
                        trade: TradeRecommendation::No,
                        strength: 0.0,
                        spread_mult: 1.0,
                        size_mult: 1.0,
                    };
                }
            }
        }

        let total_confidence: f64 = active_events.iter().map(|e| e.confidence).sum();
        let weighted_impact = if total_confidence > 0.0 {
            active_events
                .iter()
                .map(|e| e.impact * e.confidence)
                .sum::<f64>()
                / total_confidence
        } else {
            0.0
        };
        let mean_confidence = total_confidence / active_events.len() as f64;

        if weighted_impact.abs() > 0.2 && mean_confidence > 0.7 {
            let direction = if weighted_impact > 0.0 {
                EventDirection::Long
            } else {
                EventDirection::Short
            };
            let strength = weighted_impact.abs() * mean_confidence;
            EventSignal {
                direction,
                trade: TradeRecommendation::Yes,
                strength,
                spread_mult: 1.0 + (1.0 - mean_confidence) * 0.5,
                size_mult: mean_confidence,
            }
        } else {
            neutral_default()
        }
    }
}

impl Default for EventTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn neutral_default() -> EventSignal {
    EventSignal {
        direction: EventDirection::Neutral,
        trade: TradeRecommendation::Yes,
        strength: 0.0,
        spread_mult: 1.0,
        size_mult: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn no_events_far_from_resolution_is_neutral() {
        let tracker = EventTracker::new();
        let signal = tracker.get_signal("mkt");
        assert_eq!(signal.direction, EventDirection::Neutral);
        assert_eq!(signal.trade, TradeRecommendation::Yes);
        assert_eq!(signal.spread_mult, 1.0);
    }

    #[test]
    fn resolution_within_hour_recommends_no() {
        let mut tracker = EventTracker::new();
        tracker.register_resolution("mkt", Utc::now() + Duration::minutes(30));
        let signal = tracker.get_signal("mkt");
        assert_eq!(signal.trade, TradeRecommendation::No);
    }

    #[test]
    fn strong_confident_event_drives_direction() {
        let mut tracker = EventTracker::new();
        tracker.add_event(
            "mkt",
            MarketEvent {
                impact: 0.6,
                confidence: 0.9,
                expiry: Utc::now() + Duration::hours(1),
            },
        );
        let signal = tracker.get_signal("mkt");
        assert_eq!(signal.direction, EventDirection::Long);
        assert!(signal.strength > 0.0);
    }
}

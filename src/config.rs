//! Runtime configuration: env-sourced thresholds plus CLI overrides.
//! Grounded on the teacher's `models::Config::from_env` idiom
//! (`dotenv` then `env::var(...).unwrap_or_else(...).parse().unwrap_or(...)`)
//! and the original bot's `config.py` defaults.

use clap::Parser;

#[derive(Debug, Clone)]
pub struct Config {
    // Feed
    pub stale_threshold_secs: f64,
    pub feed_heartbeat_timeout_secs: f64,
    pub ws_reconnect_base_delay_secs: f64,
    pub ws_reconnect_max_delay_secs: f64,
    pub ws_reconnect_max_attempts: u32,
    pub ws_recovery_delay_secs: f64,
    pub rest_poll_interval_secs: f64,
    pub ws_channel_capacity: usize,

    // Order simulator / execution
    pub fee_rate: f64,
    pub order_rate_per_sec: f64,
    pub market_data_rate_per_sec: f64,

    // Volatility
    pub vol_sample_interval_secs: u64,
    pub vol_window_secs: u64,
    pub vol_min_samples: usize,
    pub vol_mult_min: f64,
    pub vol_mult_max: f64,

    // Book analyzer
    pub book_depth_cents: f64,
    pub book_imbalance_t: f64,
    pub book_adjustment_cap: f64,
    pub book_wall_threshold: f64,

    // Inventory
    pub skew_max: f64,
    pub size_reduction_start: f64,
    pub min_size_mult: f64,

    // Flow analyzer
    pub flow_window_secs: u64,
    pub flow_half_life_secs: f64,

    // Arbitrage
    pub arb_min_profit_bps: f64,
    pub arb_skew_threshold_bps: f64,

    // Event tracker
    pub event_resolution_warning_hours: f64,

    // Market scorer
    pub scorer_weight_volume: f64,
    pub scorer_weight_spread: f64,
    pub scorer_weight_depth: f64,
    pub scorer_weight_timing: f64,
    pub scorer_weight_price: f64,
    pub scorer_min_hours_to_resolution: f64,

    // Adverse selection
    pub adverse_threshold: f64,
    pub toxic_threshold: f64,
    pub highly_toxic_threshold: f64,
    pub toxicity_lookback_secs: u64,

    // Dynamic limits
    pub dynamic_limit_min_pct: f64,
    pub dynamic_limit_max_pct: f64,
    pub dynamic_limit_smoothing: f64,

    // Kelly
    pub kelly_fraction: f64,
    pub kelly_max_position_pct: f64,
    pub kelly_min_trades: usize,

    // Correlation / portfolio
    pub correlation_window: usize,
    pub correlation_min_samples: usize,
    pub correlation_threshold: f64,
    pub max_correlated_exposure: f64,

    // Risk manager
    pub max_errors_per_minute: u32,
    pub error_cooldown_secs: f64,
    pub max_daily_loss: f64,
    pub max_total_exposure: f64,
    pub base_position_limit: f64,

    // Quoter
    pub base_spread: f64,
    pub min_spread: f64,
    pub max_spread: f64,
    pub base_size: f64,
    pub min_order_size: f64,
    pub requote_threshold: f64,
    pub heartbeat_interval_secs: u64,

    // Pool
    pub max_markets: usize,
    pub total_capital: f64,

    // Adaptive timer
    pub timer_fast_secs: f64,
    pub timer_normal_secs: f64,
    pub timer_sleep_secs: f64,
    pub timer_fast_mode_duration_secs: f64,
    pub timer_inactivity_threshold_secs: f64,
    pub timer_volume_spike_ratio: f64,

    // Startup reconciliation / live adapter
    pub stale_order_age_secs: f64,

    // Mode
    pub dry_run: bool,
    pub trade_log_path: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        fn var<T: std::str::FromStr>(key: &str, default: T) -> T {
            std::env::var(key)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default)
        }

        Ok(Self {
            stale_threshold_secs: var("STALE_THRESHOLD_SECS", 10.0),
            feed_heartbeat_timeout_secs: var("FEED_HEARTBEAT_TIMEOUT_SECS", 45.0),
            ws_reconnect_base_delay_secs: var("WS_RECONNECT_BASE_DELAY_SECS", 1.0),
            ws_reconnect_max_delay_secs: var("WS_RECONNECT_MAX_DELAY_SECS", 60.0),
            ws_reconnect_max_attempts: var("WS_RECONNECT_MAX_ATTEMPTS", 10),
            ws_recovery_delay_secs: var("WS_RECOVERY_DELAY_SECS", 30.0),
            rest_poll_interval_secs: var("REST_POLL_INTERVAL_SECS", 5.0),
            ws_channel_capacity: var("WS_CHANNEL_CAPACITY", 10_000),

            fee_rate: var("FEE_RATE", 0.001),
            order_rate_per_sec: var("ORDER_RATE_PER_SEC", 5.0),
            market_data_rate_per_sec: var("MARKET_DATA_RATE_PER_SEC", 10.0),

            vol_sample_interval_secs: var("VOL_SAMPLE_INTERVAL_SECS", 5),
            vol_window_secs: var("VOL_WINDOW_SECS", 1800),
            vol_min_samples: var("VOL_MIN_SAMPLES", 10),
            vol_mult_min: var("VOL_MULT_MIN", 0.5),
            vol_mult_max: var("VOL_MULT_MAX", 3.0),

            book_depth_cents: var("BOOK_DEPTH_CENTS", 3.0),
            book_imbalance_t: var("BOOK_IMBALANCE_T", 0.10),
            book_adjustment_cap: var("BOOK_ADJUSTMENT_CAP", 0.02),
            book_wall_threshold: var("BOOK_WALL_THRESHOLD", 0.30),

            skew_max: var("SKEW_MAX", 0.02),
            size_reduction_start: var("SIZE_REDUCTION_START", 0.5),
            min_size_mult: var("MIN_SIZE_MULT", 0.2),

            flow_window_secs: var("FLOW_WINDOW_SECS", 60),
            flow_half_life_secs: var("FLOW_HALF_LIFE_SECS", 30.0),

            arb_min_profit_bps: var("ARB_MIN_PROFIT_BPS", 20.0),
            arb_skew_threshold_bps: var("ARB_SKEW_THRESHOLD_BPS", 10.0),

            event_resolution_warning_hours: var("EVENT_RESOLUTION_WARNING_HOURS", 24.0),

            scorer_weight_volume: var("SCORER_WEIGHT_VOLUME", 0.30),
            scorer_weight_spread: var("SCORER_WEIGHT_SPREAD", 0.35),
            scorer_weight_depth: var("SCORER_WEIGHT_DEPTH", 0.15),
            scorer_weight_timing: var("SCORER_WEIGHT_TIMING", 0.10),
            scorer_weight_price: var("SCORER_WEIGHT_PRICE", 0.10),
            scorer_min_hours_to_resolution: var("SCORER_MIN_HOURS_TO_RESOLUTION", 12.0),

            adverse_threshold: var("ADVERSE_THRESHOLD", 0.005),
            toxic_threshold: var("TOXIC_THRESHOLD", 0.4),
            highly_toxic_threshold: var("HIGHLY_TOXIC_THRESHOLD", 0.6),
            toxicity_lookback_secs: var("TOXICITY_LOOKBACK_SECS", 300),

            dynamic_limit_min_pct: var("DYNAMIC_LIMIT_MIN_PCT", 0.20),
            dynamic_limit_max_pct: var("DYNAMIC_LIMIT_MAX_PCT", 2.0),
            dynamic_limit_smoothing: var("DYNAMIC_LIMIT_SMOOTHING", 0.3),

            kelly_fraction: var("KELLY_FRACTION", 0.25),
            kelly_max_position_pct: var("KELLY_MAX_POSITION_PCT", 0.10),
            kelly_min_trades: var("KELLY_MIN_TRADES", 20),

            correlation_window: var("CORRELATION_WINDOW", 100),
            correlation_min_samples: var("CORRELATION_MIN_SAMPLES", 20),
            correlation_threshold: var("CORRELATION_THRESHOLD", 0.5),
            max_correlated_exposure: var("MAX_CORRELATED_EXPOSURE", 500.0),

            max_errors_per_minute: var("MAX_ERRORS_PER_MINUTE", 10),
            error_cooldown_secs: var("ERROR_COOLDOWN_SECS", 60.0),
            max_daily_loss: var("MAX_DAILY_LOSS", 500.0),
            max_total_exposure: var("MAX_TOTAL_EXPOSURE", 1000.0),
            base_position_limit: var("BASE_POSITION_LIMIT", 100.0),

            base_spread: var("BASE_SPREAD", 0.04),
            min_spread: var("MIN_SPREAD", 0.02),
            max_spread: var("MAX_SPREAD", 0.15),
            base_size: var("BASE_SIZE", 10.0),
            min_order_size: var("MIN_ORDER_SIZE", 1.0),
            requote_threshold: var("REQUOTE_THRESHOLD", 0.03),
            heartbeat_interval_secs: var("HEARTBEAT_INTERVAL_SECS", 30),

            max_markets: var("MAX_MARKETS", 5),
            total_capital: var("TOTAL_CAPITAL", 1000.0),

            timer_fast_secs: var("TIMER_FAST_SECS", 0.1),
            timer_normal_secs: var("TIMER_NORMAL_SECS", 2.0),
            timer_sleep_secs: var("TIMER_SLEEP_SECS", 5.0),
            timer_fast_mode_duration_secs: var("TIMER_FAST_MODE_DURATION_SECS", 10.0),
            timer_inactivity_threshold_secs: var("TIMER_INACTIVITY_THRESHOLD_SECS", 60.0),
            timer_volume_spike_ratio: var("TIMER_VOLUME_SPIKE_RATIO", 2.0),

            stale_order_age_secs: var("STALE_ORDER_AGE_SECS", 300.0),

            dry_run: var("DRY_RUN", true),
            trade_log_path: std::env::var("TRADE_LOG_PATH")
                .unwrap_or_else(|_| "./quotebot_trades.jsonl".to_string()),
        })
    }
}

/// CLI contract (§6): a token id and optional complement are the only inputs
/// the core needs; everything else is configuration.
#[derive(Debug, Parser)]
#[command(name = "quotebot", about = "Binary-market adaptive quoter")]
pub struct Cli {
    /// Asset id (CLOB token id) to quote.
    pub asset_id: String,

    /// Complementary outcome's asset id, if quoting a YES/NO pair.
    pub complement_asset_id: Option<String>,

    /// Run against the simulator instead of the live exchange.
    #[arg(long)]
    pub dry_run: bool,

    /// Optional path to a .env-style config file override.
    #[arg(long)]
    pub config: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load_without_env() {
        std::env::remove_var("BASE_SPREAD");
        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.base_spread, 0.04);
        assert_eq!(cfg.kelly_fraction, 0.25);
        assert_eq!(cfg.vol_mult_min, 0.5);
        assert_eq!(cfg.vol_mult_max, 3.0);
    }
}

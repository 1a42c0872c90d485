//! Composition root: wires config, feed, risk, execution, and strategy
//! into a running quoter, handles startup order reconciliation, and
//! shuts down cleanly on ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use parking_lot::Mutex;
use quotebot_core::alpha::arbitrage::ArbitrageDetector;
use quotebot_core::alpha::book_analyzer::BookAnalyzer;
use quotebot_core::alpha::flow::FlowAnalyzer;
use quotebot_core::alpha::volatility::VolatilityTracker;
use quotebot_core::config::{Cli, Config};
use quotebot_core::exec::live::{ExchangeCredentials, LiveOrderAdapter};
use quotebot_core::exec::rate_limit::RateLimiter;
use quotebot_core::exec::simulator::OrderSimulator;
use quotebot_core::exec::OrderExecutor;
use quotebot_core::feed::facade::MarketFeed;
use quotebot_core::models::Pair;
use quotebot_core::money::{Price, Size};
use quotebot_core::risk::adverse_selection::AdverseSelectionDetector;
use quotebot_core::risk::correlation::{CorrelationTracker, PortfolioRisk};
use quotebot_core::risk::dynamic_limits::DynamicLimitManager;
use quotebot_core::risk::inventory::InventoryManager;
use quotebot_core::risk::kelly::KellySizer;
use quotebot_core::risk::manager::{ExecutionMode, RiskManager};
use quotebot_core::strategy::quoter::{Quoter, QuoterConfig};
use quotebot_core::strategy::timing::AdaptiveTimer;
use quotebot_core::telemetry::trade_logger::TradeLogger;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICK: Price = rust_decimal_macros::dec!(0.01);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Builds the live adapter or the dry-run simulator behind one trait
/// object (§9: no conditional in the quoter). When running live, also
/// returns a standalone simulator so the quoter's fill-sweep step has
/// nothing to poll (the field stays `None` in that case).
fn build_executor(cfg: &Config) -> (Arc<dyn OrderExecutor>, Option<Arc<OrderSimulator>>) {
    if cfg.dry_run {
        let sim = Arc::new(OrderSimulator::new(cfg.fee_rate));
        return (sim.clone(), Some(sim));
    }
    let creds = ExchangeCredentials {
        api_key: std::env::var("POLY_API_KEY").unwrap_or_default(),
        api_secret: std::env::var("POLY_API_SECRET").unwrap_or_default(),
        api_passphrase: std::env::var("POLY_API_PASSPHRASE").unwrap_or_default(),
    };
    if creds.api_key.is_empty() || creds.api_secret.is_empty() {
        warn!("live mode requested but POLY_API_KEY/POLY_API_SECRET are unset");
    }
    let limiter = Arc::new(RateLimiter::new(cfg.order_rate_per_sec));
    (Arc::new(LiveOrderAdapter::new(creds, limiter)), None)
}

/// Cancels any pre-existing open orders on an asset before the quoter
/// starts, so a restart never leaves orphaned resting orders (§4.25).
async fn reconcile_startup(executor: &Arc<dyn OrderExecutor>, asset_id: &str) {
    let open = match executor.open_orders(Some(asset_id)).await {
        Ok(orders) => orders,
        Err(e) => {
            warn!(asset_id, error = %e, "startup reconciliation: could not list open orders");
            return;
        }
    };
    for order in &open {
        info!(order_id = %order.id, "cancelling stale order from previous run");
        if let Err(e) = executor.cancel_order(&order.id).await {
            warn!(order_id = %order.id, error = %e, "failed to cancel stale order");
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_quoter(
    cfg: &Config,
    asset_id: &str,
    complement_asset_id: Option<String>,
    feed: Arc<MarketFeed>,
    executor: Arc<dyn OrderExecutor>,
    simulator: Option<Arc<OrderSimulator>>,
    trade_logger: Arc<TradeLogger>,
    arbitrage: Option<Arc<Mutex<ArbitrageDetector>>>,
) -> Quoter {
    let risk = Arc::new(Mutex::new(RiskManager::new(
        if cfg.dry_run {
            ExecutionMode::DataGather
        } else {
            ExecutionMode::Enforce
        },
        cfg.max_errors_per_minute,
        cfg.error_cooldown_secs,
        cfg.max_daily_loss,
        cfg.max_total_exposure,
        cfg.base_position_limit,
        DynamicLimitManager::new(
            cfg.base_position_limit,
            cfg.max_daily_loss,
            cfg.dynamic_limit_min_pct,
            cfg.dynamic_limit_max_pct,
            cfg.dynamic_limit_smoothing,
        ),
        AdverseSelectionDetector::new(
            cfg.adverse_threshold,
            cfg.toxic_threshold,
            cfg.highly_toxic_threshold,
            cfg.toxicity_lookback_secs,
        ),
        KellySizer::new(cfg.kelly_fraction, cfg.kelly_max_position_pct, cfg.kelly_min_trades),
        PortfolioRisk::new(
            CorrelationTracker::new(cfg.correlation_window, cfg.correlation_min_samples),
            cfg.correlation_threshold,
            cfg.max_correlated_exposure,
        ),
    )));

    let inventory = InventoryManager::new(
        Size::try_from(cfg.base_position_limit).unwrap_or_default(),
        cfg.skew_max,
        cfg.size_reduction_start,
        cfg.min_size_mult,
    );
    let volatility = VolatilityTracker::new(
        cfg.vol_sample_interval_secs,
        cfg.vol_window_secs,
        cfg.vol_min_samples,
        cfg.vol_mult_min,
        cfg.vol_mult_max,
    );
    let book_analyzer = BookAnalyzer {
        depth_cents: cfg.book_depth_cents,
        imbalance_t: cfg.book_imbalance_t,
        adjustment_cap: cfg.book_adjustment_cap,
        wall_threshold: cfg.book_wall_threshold,
        tick: TICK,
        thin_threshold: cfg.book_depth_cents * 0.5,
        thick_threshold: cfg.book_depth_cents * 3.0,
    };
    let flow = FlowAnalyzer::new(cfg.flow_window_secs, cfg.flow_half_life_secs);
    let timer = AdaptiveTimer::new(
        cfg.timer_fast_secs,
        cfg.timer_normal_secs,
        cfg.timer_sleep_secs,
        cfg.timer_fast_mode_duration_secs,
    );

    let quoter_config = QuoterConfig {
        asset_id: asset_id.to_string(),
        complement_asset_id,
        base_spread: cfg.base_spread,
        min_spread: cfg.min_spread,
        max_spread: cfg.max_spread,
        base_size: cfg.base_size,
        min_order_size: cfg.min_order_size,
        requote_threshold: cfg.requote_threshold,
        heartbeat_interval: Duration::from_secs(cfg.heartbeat_interval_secs),
        tick: TICK,
        is_dry_run: cfg.dry_run,
    };

    Quoter::new(
        quoter_config,
        feed,
        executor,
        simulator,
        risk,
        trade_logger,
        arbitrage,
        inventory,
        volatility,
        book_analyzer,
        flow,
        timer,
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut cfg = Config::from_env()?;
    if cli.dry_run {
        cfg.dry_run = true;
    }

    info!(asset_id = %cli.asset_id, dry_run = cfg.dry_run, "starting quoter");

    let feed = MarketFeed::new(
        cfg.stale_threshold_secs,
        cfg.feed_heartbeat_timeout_secs,
        cfg.ws_reconnect_base_delay_secs,
        cfg.ws_reconnect_max_delay_secs,
        cfg.ws_reconnect_max_attempts,
        cfg.ws_recovery_delay_secs,
        cfg.rest_poll_interval_secs,
        cfg.market_data_rate_per_sec,
        cfg.ws_channel_capacity,
    );
    let mut subscribed = vec![cli.asset_id.clone()];
    if let Some(complement) = &cli.complement_asset_id {
        subscribed.push(complement.clone());
    }
    feed.subscribe(&subscribed);

    let (executor, simulator) = build_executor(&cfg);
    if !cfg.dry_run {
        reconcile_startup(&executor, &cli.asset_id).await;
        if let Some(complement) = &cli.complement_asset_id {
            reconcile_startup(&executor, complement).await;
        }
    }

    let trade_logger = Arc::new(TradeLogger::open(&cfg.trade_log_path)?);

    let arbitrage = cli.complement_asset_id.as_ref().map(|complement| {
        let mut detector = ArbitrageDetector::new(
            cfg.fee_rate,
            cfg.arb_min_profit_bps,
            cfg.arb_skew_threshold_bps,
        );
        detector.register_pair(Pair {
            condition_id: cli.asset_id.clone(),
            yes_asset_id: cli.asset_id.clone(),
            no_asset_id: complement.clone(),
            market_slug: cli.asset_id.clone(),
        });
        Arc::new(Mutex::new(detector))
    });

    let mut quoter = build_quoter(
        &cfg,
        &cli.asset_id,
        cli.complement_asset_id.clone(),
        feed.clone(),
        executor,
        simulator,
        trade_logger,
        arbitrage,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    quoter.run(shutdown_rx).await;
    feed.stop().await;
    info!("quoter stopped");
    Ok(())
}

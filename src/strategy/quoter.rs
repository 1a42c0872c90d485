//! Core market-maker loop: one quoter per asset (plus an optional
//! complement for YES/NO arbitrage). Composes every alpha/risk signal into
//! a single bid/ask per tick and drives the order executor. Grounded on
//! the original bot's main quoting loop; pipeline per §4.19.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::alpha::arbitrage::ArbitrageDetector;
use crate::alpha::book_analyzer::BookAnalyzer;
use crate::alpha::events::EventTracker;
use crate::alpha::flow::FlowAnalyzer;
use crate::alpha::parity::within_parity_band;
use crate::alpha::regime::RegimeDetector;
use crate::alpha::volatility::VolatilityTracker;
use crate::error::CoreResult;
use crate::exec::simulator::OrderSimulator;
use crate::exec::OrderExecutor;
use crate::feed::facade::MarketFeed;
use crate::models::{RiskStatus, Side};
use crate::money::{clamp, round_to_tick, Price, Size};
use crate::risk::inventory::{InventoryClass, InventoryManager};
use crate::risk::manager::RiskManager;
use crate::risk::market_pnl::MarketPnlTracker;
use crate::strategy::timing::AdaptiveTimer;
use crate::telemetry::trade_logger::TradeLogger;

const PARITY_TOLERANCE: f64 = 0.15;
const REGIME_WINDOW: usize = 50;
const BID_FLOOR: Price = rust_decimal_macros::dec!(0.01);
const BID_CEIL: Price = rust_decimal_macros::dec!(0.98);
const ASK_FLOOR: Price = rust_decimal_macros::dec!(0.02);
const ASK_CEIL: Price = rust_decimal_macros::dec!(0.99);

#[derive(Debug, Clone)]
pub struct QuoterConfig {
    pub asset_id: String,
    pub complement_asset_id: Option<String>,
    pub base_spread: f64,
    pub min_spread: f64,
    pub max_spread: f64,
    pub base_size: f64,
    pub min_order_size: f64,
    pub requote_threshold: f64,
    pub heartbeat_interval: Duration,
    pub tick: Price,
    pub is_dry_run: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Stopped,
}

pub struct Quoter {
    config: QuoterConfig,
    feed: Arc<MarketFeed>,
    executor: Arc<dyn OrderExecutor>,
    simulator: Option<Arc<OrderSimulator>>,
    risk: Arc<Mutex<RiskManager>>,
    trade_logger: Arc<TradeLogger>,
    arbitrage: Option<Arc<Mutex<ArbitrageDetector>>>,

    inventory: InventoryManager,
    market_pnl: MarketPnlTracker,
    volatility: VolatilityTracker,
    book_analyzer: BookAnalyzer,
    flow: FlowAnalyzer,
    events: EventTracker,
    regime: RegimeDetector,
    timer: AdaptiveTimer,

    open_bid: Option<String>,
    open_ask: Option<String>,
    last_mid: Option<Price>,
    loop_count: u64,
    last_heartbeat: Instant,
    stopped: AtomicBool,
}

struct ComposedQuote {
    bid: Price,
    ask: Price,
    inventory_class: InventoryClass,
    bid_size_mult: f64,
    ask_size_mult: f64,
    should_pause: bool,
}

impl Quoter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: QuoterConfig,
        feed: Arc<MarketFeed>,
        executor: Arc<dyn OrderExecutor>,
        simulator: Option<Arc<OrderSimulator>>,
        risk: Arc<Mutex<RiskManager>>,
        trade_logger: Arc<TradeLogger>,
        arbitrage: Option<Arc<Mutex<ArbitrageDetector>>>,
        inventory: InventoryManager,
        volatility: VolatilityTracker,
        book_analyzer: BookAnalyzer,
        flow: FlowAnalyzer,
        timer: AdaptiveTimer,
    ) -> Self {
        Self {
            config,
            feed,
            executor,
            simulator,
            risk,
            trade_logger,
            arbitrage,
            inventory,
            market_pnl: MarketPnlTracker::new(),
            volatility,
            book_analyzer,
            flow,
            events: EventTracker::new(),
            regime: RegimeDetector::new(REGIME_WINDOW),
            timer,
            open_bid: None,
            open_ask: None,
            last_mid: None,
            loop_count: 0,
            last_heartbeat: Instant::now(),
            stopped: AtomicBool::new(false),
        }
    }

    pub fn events_mut(&mut self) -> &mut EventTracker {
        &mut self.events
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn record_external_trade(&mut self, price: f64, size: f64, side: Side, is_aggressive: bool) {
        self.flow.record_trade(price, size, side, is_aggressive);
    }

    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }
            let interval = self.timer.interval();
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }

            match self.tick().await {
                Ok(TickOutcome::Continue) => {}
                Ok(TickOutcome::Stopped) => break,
                Err(e) => warn!(asset_id = %self.config.asset_id, error = %e, "quoter tick failed, continuing"),
            }
            self.timer.tick();
        }

        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        self.cancel_quotes().await;
        info!(
            asset_id = %self.config.asset_id,
            loops = self.loop_count,
            position = %self.inventory.position(),
            realized_pnl = %self.market_pnl.realized_pnl(),
            "quoter stopped"
        );
        let _ = self.trade_logger.log_event(
            "shutdown",
            format!("asset={} loops={}", self.config.asset_id, self.loop_count),
        );
    }

    pub async fn tick(&mut self) -> CoreResult<TickOutcome> {
        self.loop_count += 1;

        // 1. Risk gate.
        let risk_outcome = self.risk.lock().check(Some(std::slice::from_ref(&self.config.asset_id)));
        if risk_outcome.status == RiskStatus::Stop {
            warn!(asset_id = %self.config.asset_id, reason = %risk_outcome.reason, "risk stop, quoter exiting");
            self.cancel_quotes().await;
            self.stopped.store(true, Ordering::SeqCst);
            return Ok(TickOutcome::Stopped);
        }
        if risk_outcome.status == RiskStatus::Warn {
            warn!(asset_id = %self.config.asset_id, reason = %risk_outcome.reason, "risk warning");
        }

        // 2. Feed gate.
        if !self.feed.is_healthy() {
            self.cancel_quotes().await;
            return Ok(TickOutcome::Continue);
        }

        // 3. Arbitrage scan.
        if let (Some(arb), Some(complement)) = (&self.arbitrage, &self.config.complement_asset_id) {
            let yes_mid = self.feed.mid(&self.config.asset_id);
            let no_mid = self.feed.mid(complement);
            if let (Some(yes), Some(no)) = (yes_mid, no_mid) {
                let yes_f = yes.to_f64().unwrap_or(0.0);
                let no_f = no.to_f64().unwrap_or(0.0);
                let feed = &self.feed;
                let signal = {
                    let mut guard = arb.lock();
                    // Populates last_signal for every registered pair so
                    // get_quote_adjustment's cached-SKEW lookup stays live.
                    guard.scan_all(|id| feed.mid(id).and_then(|p| p.to_f64()));
                    guard.classify(yes_f, no_f)
                };
                if signal.is_actionable()
                    && matches!(
                        signal.kind,
                        crate::models::ArbitrageType::SellBoth | crate::models::ArbitrageType::BuyBoth
                    )
                {
                    self.cancel_quotes().await;
                    info!(
                        asset_id = %self.config.asset_id,
                        kind = ?signal.kind,
                        profit_bps = signal.profit_bps,
                        "arbitrage opportunity supersedes making"
                    );
                    let _ = self
                        .trade_logger
                        .log_event("arbitrage", format!("{:?} profit_bps={:.1}", signal.kind, signal.profit_bps));
                    return Ok(TickOutcome::Continue);
                }
            }
        }

        // 4. Read mid.
        let Some(mid) = self.feed.mid(&self.config.asset_id) else {
            return Ok(TickOutcome::Continue);
        };

        // 5. Parity skip.
        if let Some(complement) = &self.config.complement_asset_id {
            if let Some(complement_mid) = self.feed.mid(complement) {
                let yes_f = mid.to_f64().unwrap_or(0.0);
                let no_f = complement_mid.to_f64().unwrap_or(0.0);
                if !within_parity_band(yes_f, no_f, PARITY_TOLERANCE) {
                    self.cancel_quotes().await;
                    return Ok(TickOutcome::Continue);
                }
            }
        }

        // 6. Update trackers.
        let mid_f = mid.to_f64().unwrap_or(0.0);
        self.volatility.update(mid_f);

        // 7. Dry-run fill sweep.
        if self.config.is_dry_run {
            if let Some(sim) = &self.simulator {
                let best_bid = self.feed.best_bid(&self.config.asset_id);
                let best_ask = self.feed.best_ask(&self.config.asset_id);
                let fills = sim.check_fills(&self.config.asset_id, best_bid, best_ask);
                for fill in fills {
                    self.inventory
                        .record_fill(fill.side == Side::Buy, fill.size, fill.price);
                    self.market_pnl.record_fill(fill.side, fill.size, fill.price, fill.fee);
                    let _ = self.trade_logger.log_trade(&fill);
                    self.risk.lock().record_trade(None, fill.fee.to_f64().unwrap_or(0.0));
                }
            }
        }

        // 8. Compose quote.
        let quote = self.compose_quote(mid);

        if quote.should_pause {
            self.cancel_quotes().await;
            warn!(asset_id = %self.config.asset_id, "liquidity regime transition: pausing quotes");
            return Ok(TickOutcome::Continue);
        }

        // 9. Requote decision.
        let should_requote = self.open_bid.is_none()
            || self.open_ask.is_none()
            || self
                .last_mid
                .map(|last| (mid - last).abs().to_f64().unwrap_or(0.0) >= self.config.requote_threshold)
                .unwrap_or(true);

        if should_requote {
            self.requote(&quote).await;
            self.last_mid = Some(mid);
        }

        // 10. Heartbeat.
        if self.last_heartbeat.elapsed() >= self.config.heartbeat_interval {
            info!(
                asset_id = %self.config.asset_id,
                loops = self.loop_count,
                mid = %mid,
                position = %self.inventory.position(),
                realized_pnl = %self.market_pnl.realized_pnl(),
                "heartbeat"
            );
            self.last_heartbeat = Instant::now();
        }

        Ok(TickOutcome::Continue)
    }

    fn compose_quote(&mut self, mid: Price) -> ComposedQuote {
        let vol_mult = self.volatility.multiplier();
        let inv_skew = self.inventory.skew();
        let inv_mult = (1.0 + inv_skew.rho.abs() / 2.0).min(1.5);

        let book = self.feed.store().order_book(&self.config.asset_id);
        let book_analysis = book.as_ref().map(|b| self.book_analyzer.analyze(b));
        let imbalance_adj = book_analysis.as_ref().map(|a| a.price_adjustment).unwrap_or(0.0);

        if let (Some(book), Some(analysis)) = (&book, &book_analysis) {
            if let Some(spread_px) = book.spread() {
                let bid_depth = Size::try_from(analysis.bid_depth).unwrap_or_default();
                let ask_depth = Size::try_from(analysis.ask_depth).unwrap_or_default();
                // No independent trade-tape volume feed reaches the quoter yet;
                // total book depth stands in as the volume term (§2 regime supplement).
                let volume = bid_depth + ask_depth;
                self.regime.record_snapshot(spread_px, bid_depth, ask_depth, volume);
            }
        }
        let regime_adj = self.regime.strategy_adjustment();

        let mut spread = (self.config.base_spread * vol_mult * inv_mult * regime_adj.spread_mult)
            .clamp(self.config.min_spread, self.config.max_spread);

        let imbalance_adj_dec = Price::try_from(imbalance_adj).unwrap_or_default();
        let inv_bid_skew = Price::try_from(inv_skew.bid_skew).unwrap_or_default();
        let inv_ask_skew = Price::try_from(inv_skew.ask_skew).unwrap_or_default();
        let half_spread = Price::try_from(spread / 2.0).unwrap_or_default();

        let mut bid = mid - half_spread + inv_bid_skew + imbalance_adj_dec;
        let mut ask = mid + half_spread + inv_ask_skew + imbalance_adj_dec;

        // Arb adjustment is captured as an additive delta so every later
        // recompute (flow widen, event spread) keeps it (§4.19 step 8).
        let mut arb_bid_delta = Price::ZERO;
        let mut arb_ask_delta = Price::ZERO;
        if let Some(arb) = &self.arbitrage {
            let (adj_bid, adj_ask) = arb.lock().get_quote_adjustment(&self.config.asset_id, bid, ask);
            arb_bid_delta = adj_bid - bid;
            arb_ask_delta = adj_ask - ask;
            bid = adj_bid;
            ask = adj_ask;
        }

        let flow_state = self.flow.get_state();
        let flow_skew_dec = Price::try_from(flow_state.recommended_skew).unwrap_or_default();
        bid += flow_skew_dec;
        ask += flow_skew_dec;
        if self.flow.should_widen_spread() {
            spread *= 1.2;
            let half_spread = Price::try_from(spread / 2.0).unwrap_or_default();
            bid = mid - half_spread + inv_bid_skew + imbalance_adj_dec + arb_bid_delta + flow_skew_dec;
            ask = mid + half_spread + inv_ask_skew + imbalance_adj_dec + arb_ask_delta + flow_skew_dec;
        }

        let event_signal = self.events.get_signal(&self.config.asset_id);
        if event_signal.spread_mult != 1.0 {
            spread *= event_signal.spread_mult;
            let half_spread = Price::try_from(spread / 2.0).unwrap_or_default();
            bid = mid - half_spread + inv_bid_skew + imbalance_adj_dec + arb_bid_delta + flow_skew_dec;
            ask = mid + half_spread + inv_ask_skew + imbalance_adj_dec + arb_ask_delta + flow_skew_dec;
        }

        bid = round_to_tick(bid, self.config.tick);
        ask = round_to_tick(ask, self.config.tick);
        bid = clamp(bid, BID_FLOOR, BID_CEIL);
        ask = clamp(ask, ASK_FLOOR, ASK_CEIL);
        if bid >= ask {
            let half_spread = Price::try_from(spread / 2.0).unwrap_or_default();
            bid = round_to_tick(mid - half_spread, self.config.tick);
            ask = round_to_tick(mid + half_spread, self.config.tick);
        }

        ComposedQuote {
            bid,
            ask,
            inventory_class: inv_skew.class,
            bid_size_mult: inv_skew.bid_size_mult * event_signal.size_mult * regime_adj.size_mult,
            ask_size_mult: inv_skew.ask_size_mult * event_signal.size_mult * regime_adj.size_mult,
            should_pause: regime_adj.should_pause,
        }
    }

    async fn requote(&mut self, quote: &ComposedQuote) {
        let bid_size = (self.config.base_size * quote.bid_size_mult).max(self.config.min_order_size);
        let ask_size = (self.config.base_size * quote.ask_size_mult).max(self.config.min_order_size);
        let bid_size_dec = Size::try_from(bid_size).unwrap_or_default();
        let ask_size_dec = Size::try_from(ask_size).unwrap_or_default();

        self.cancel_quotes().await;

        if quote.inventory_class != InventoryClass::MaxLong {
            match self.executor.place_order(&self.config.asset_id, Side::Buy, quote.bid, bid_size_dec).await {
                Ok(order) => self.open_bid = Some(order.id),
                Err(e) => warn!(asset_id = %self.config.asset_id, error = %e, "bid placement failed"),
            }
        }
        if quote.inventory_class != InventoryClass::MaxShort {
            match self.executor.place_order(&self.config.asset_id, Side::Sell, quote.ask, ask_size_dec).await {
                Ok(order) => self.open_ask = Some(order.id),
                Err(e) => warn!(asset_id = %self.config.asset_id, error = %e, "ask placement failed"),
            }
        }

        let _ = self
            .trade_logger
            .log_quote(&self.config.asset_id, quote.bid, quote.ask, bid_size_dec, ask_size_dec);
    }

    async fn cancel_quotes(&mut self) {
        if let Some(id) = self.open_bid.take() {
            let _ = self.executor.cancel_order(&id).await;
        }
        if let Some(id) = self.open_ask.take() {
            let _ = self.executor.cancel_order(&id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PriceLevel;
    use crate::risk::adverse_selection::AdverseSelectionDetector;
    use crate::risk::correlation::{CorrelationTracker, PortfolioRisk};
    use crate::risk::dynamic_limits::DynamicLimitManager;
    use crate::risk::kelly::KellySizer;
    use crate::risk::manager::ExecutionMode;
    use rust_decimal_macros::dec;

    fn levels(pairs: Vec<(rust_decimal::Decimal, rust_decimal::Decimal)>) -> Vec<PriceLevel> {
        pairs
            .into_iter()
            .map(|(price, size)| PriceLevel { price, size })
            .collect()
    }

    fn make_feed(asset_id: &str) -> Arc<MarketFeed> {
        let feed = MarketFeed::new(10.0, 45.0, 1.0, 60.0, 10, 30.0, 5.0, 10.0, 1024);
        feed.store().register(asset_id);
        feed
    }

    fn make_risk() -> Arc<Mutex<RiskManager>> {
        Arc::new(Mutex::new(RiskManager::new(
            ExecutionMode::Enforce,
            10,
            60.0,
            500.0,
            1000.0,
            100.0,
            DynamicLimitManager::new(100.0, 500.0, 0.2, 2.0, 0.3),
            AdverseSelectionDetector::new(0.005, 0.4, 0.6, 300),
            KellySizer::new(0.25, 0.10, 20),
            PortfolioRisk::new(CorrelationTracker::new(100, 20), 0.5, 500.0),
        )))
    }

    #[tokio::test]
    async fn requotes_on_large_mid_move() {
        let asset_id = "tok".to_string();
        let feed = make_feed(&asset_id);
        feed.store().apply_book(
            &asset_id,
            levels(vec![(dec!(0.48), dec!(100))]),
            levels(vec![(dec!(0.52), dec!(100))]),
            None,
        );

        let sim = Arc::new(OrderSimulator::new(0.0));
        let logger_dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(TradeLogger::open(logger_dir.path().join("t.jsonl")).unwrap());

        let config = QuoterConfig {
            asset_id: asset_id.clone(),
            complement_asset_id: None,
            base_spread: 0.04,
            min_spread: 0.01,
            max_spread: 0.20,
            base_size: 10.0,
            min_order_size: 1.0,
            requote_threshold: 0.03,
            heartbeat_interval: Duration::from_secs(3600),
            tick: dec!(0.01),
            is_dry_run: true,
        };

        let mut quoter = Quoter::new(
            config,
            feed.clone(),
            sim.clone(),
            Some(sim.clone()),
            make_risk(),
            logger,
            None,
            InventoryManager::new(dec!(100), 0.02, 0.5, 0.2),
            VolatilityTracker::new(5, 1800, 10, 0.5, 3.0),
            BookAnalyzer {
                depth_cents: 3.0,
                imbalance_t: 0.10,
                adjustment_cap: 0.02,
                wall_threshold: 0.30,
                tick: dec!(0.01),
                thin_threshold: 50.0,
                thick_threshold: 500.0,
            },
            FlowAnalyzer::new(60, 30.0),
            AdaptiveTimer::new(0.01, 0.01, 0.01, 10.0),
        );

        quoter.tick().await.unwrap();
        assert!(quoter.open_bid.is_some());
        assert!(quoter.open_ask.is_some());
        let first_bid = quoter.open_bid.clone();

        feed.store().apply_book(
            &asset_id,
            levels(vec![(dec!(0.51), dec!(100))]),
            levels(vec![(dec!(0.55), dec!(100))]),
            None,
        );
        quoter.tick().await.unwrap();
        assert_ne!(quoter.open_bid, first_bid);
    }

    #[tokio::test]
    async fn arbitrage_opportunity_cancels_and_skips() {
        let asset_id = "yes".to_string();
        let complement_id = "no".to_string();
        let feed = make_feed(&asset_id);
        feed.store().register(&complement_id);
        feed.store().apply_book(
            &asset_id,
            levels(vec![(dec!(0.54), dec!(100))]),
            levels(vec![(dec!(0.56), dec!(100))]),
            None,
        );
        feed.store().apply_book(
            &complement_id,
            levels(vec![(dec!(0.47), dec!(100))]),
            levels(vec![(dec!(0.49), dec!(100))]),
            None,
        );

        let sim = Arc::new(OrderSimulator::new(0.0));
        let logger_dir = tempfile::tempdir().unwrap();
        let logger = Arc::new(TradeLogger::open(logger_dir.path().join("t.jsonl")).unwrap());
        let arb = Arc::new(Mutex::new(ArbitrageDetector::new(0.001, 20.0, 10.0)));

        let config = QuoterConfig {
            asset_id: asset_id.clone(),
            complement_asset_id: Some(complement_id.clone()),
            base_spread: 0.04,
            min_spread: 0.01,
            max_spread: 0.20,
            base_size: 10.0,
            min_order_size: 1.0,
            requote_threshold: 0.03,
            heartbeat_interval: Duration::from_secs(3600),
            tick: dec!(0.01),
            is_dry_run: true,
        };

        let mut quoter = Quoter::new(
            config,
            feed,
            sim.clone(),
            Some(sim),
            make_risk(),
            logger,
            Some(arb),
            InventoryManager::new(dec!(100), 0.02, 0.5, 0.2),
            VolatilityTracker::new(5, 1800, 10, 0.5, 3.0),
            BookAnalyzer {
                depth_cents: 3.0,
                imbalance_t: 0.10,
                adjustment_cap: 0.02,
                wall_threshold: 0.30,
                tick: dec!(0.01),
                thin_threshold: 50.0,
                thick_threshold: 500.0,
            },
            FlowAnalyzer::new(60, 30.0),
            AdaptiveTimer::new(0.01, 0.01, 0.01, 10.0),
        );

        quoter.tick().await.unwrap();
        assert!(quoter.open_bid.is_none());
        assert!(quoter.open_ask.is_none());
    }
}

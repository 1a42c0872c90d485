//! WebSocket market-channel connection: connect, subscribe, exponential
//! backoff reconnect. Adapted from the teacher's
//! `PolymarketMarketWsCache::run`/`connect_and_stream` (see the removed
//! `ws_raw_ref` prototype this module supersedes), generalized from a
//! book-only cache into a frame-forwarding connection whose consumer is
//! the feed facade's worker.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

const MARKET_WSS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

enum WsCommand {
    Subscribe(String),
    Disconnect,
}

/// A WebSocket market connection. Raw text frames are forwarded to
/// `on_frame`; the facade parses and applies them to the store.
pub struct WsConnection {
    cmd_tx: mpsc::Sender<WsCommand>,
    state: Arc<RwLock<WsState>>,
    reconnect_attempts: Arc<AtomicU32>,
    dropped_frames: Arc<AtomicU32>,
}

impl WsConnection {
    pub fn spawn(
        base_delay_secs: f64,
        max_delay_secs: f64,
        max_attempts: u32,
        on_frame: impl Fn(&str) + Send + Sync + 'static,
    ) -> Arc<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel(1024);
        let state = Arc::new(RwLock::new(WsState::Disconnected));
        let reconnect_attempts = Arc::new(AtomicU32::new(0));
        let dropped_frames = Arc::new(AtomicU32::new(0));

        let conn = Arc::new(Self {
            cmd_tx,
            state: state.clone(),
            reconnect_attempts: reconnect_attempts.clone(),
            dropped_frames: dropped_frames.clone(),
        });

        let on_frame = Arc::new(on_frame);
        tokio::spawn(run_loop(
            cmd_rx,
            state,
            reconnect_attempts,
            base_delay_secs,
            max_delay_secs,
            max_attempts,
            on_frame,
        ));

        conn
    }

    pub fn state(&self) -> WsState {
        *self.state.read()
    }

    pub fn subscribe(&self, asset_ids: &[String]) {
        for id in asset_ids {
            let _ = self.cmd_tx.try_send(WsCommand::Subscribe(id.clone()));
        }
    }

    pub fn disconnect(&self) {
        let _ = self.cmd_tx.try_send(WsCommand::Disconnect);
        *self.state.write() = WsState::Disconnected;
    }

    pub fn dropped_frame_count(&self) -> u32 {
        self.dropped_frames.load(Ordering::Relaxed)
    }
}

async fn run_loop(
    mut cmd_rx: mpsc::Receiver<WsCommand>,
    state: Arc<RwLock<WsState>>,
    reconnect_attempts: Arc<AtomicU32>,
    base_delay_secs: f64,
    max_delay_secs: f64,
    max_attempts: u32,
    on_frame: Arc<dyn Fn(&str) + Send + Sync>,
) {
    let mut desired: HashSet<String> = HashSet::new();

    loop {
        *state.write() = WsState::Connecting;
        match connect_and_stream(&mut cmd_rx, &mut desired, &on_frame).await {
            Ok(WsExit::Disconnected) => {
                *state.write() = WsState::Disconnected;
                return;
            }
            Ok(WsExit::Closed) => {
                reconnect_attempts.store(0, Ordering::Relaxed);
            }
            Err(e) => {
                warn!(error = %e, "market ws connection error");
            }
        }

        let attempt = reconnect_attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if attempt > max_attempts {
            *state.write() = WsState::Failed;
            warn!(attempt, "market ws reconnect attempts exhausted");
            return;
        }
        *state.write() = WsState::Reconnecting;
        let delay = (base_delay_secs * 2f64.powi(attempt as i32 - 1)).min(max_delay_secs);
        sleep(Duration::from_secs_f64(delay)).await;
    }
}

enum WsExit {
    Closed,
    Disconnected,
}

async fn connect_and_stream(
    cmd_rx: &mut mpsc::Receiver<WsCommand>,
    desired: &mut HashSet<String>,
    on_frame: &Arc<dyn Fn(&str) + Send + Sync>,
) -> Result<WsExit> {
    let (ws_stream, resp) = connect_async(MARKET_WSS_URL)
        .await
        .context("connect_async market ws")?;
    info!(status = %resp.status(), "market ws connected");

    let (mut write, mut read) = ws_stream.split();

    if !desired.is_empty() {
        let assets: Vec<String> = desired.iter().cloned().collect();
        let sub = serde_json::json!({ "type": "market", "assets_ids": assets });
        write
            .send(Message::Text(sub.to_string()))
            .await
            .context("send initial subscription")?;
    }

    let mut ping = interval(Duration::from_secs(5));
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ping.tick() => {
                let _ = write.send(Message::Text("PING".to_string())).await;
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(WsCommand::Subscribe(token)) => {
                        if desired.insert(token.clone()) {
                            let msg = serde_json::json!({ "assets_ids": [token], "operation": "subscribe" });
                            let _ = write.send(Message::Text(msg.to_string())).await;
                        }
                    }
                    Some(WsCommand::Disconnect) | None => {
                        let _ = write.close().await;
                        return Ok(WsExit::Disconnected);
                    }
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if !text.eq_ignore_ascii_case("PONG") {
                            on_frame(&text);
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "market ws close frame");
                        return Ok(WsExit::Closed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return Err(anyhow::anyhow!("market ws error: {e}"));
                    }
                    None => return Ok(WsExit::Closed),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_exponential_and_capped() {
        let base = 1.0_f64;
        let max = 30.0_f64;
        let delays: Vec<f64> = (1..=8)
            .map(|n| (base * 2f64.powi(n - 1)).min(max))
            .collect();
        assert_eq!(delays, vec![1.0, 2.0, 4.0, 8.0, 16.0, 30.0, 30.0, 30.0]);
    }
}

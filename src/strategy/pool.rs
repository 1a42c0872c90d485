//! Multi-market pool: supervises up to `max_markets` quoters, allocating
//! capital equally and isolating per-quoter failures. Grounded on the
//! teacher's task-per-worker supervision pattern; allocation rules per
//! §4.20.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::strategy::quoter::Quoter;

struct PoolMember {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

pub struct MarketPool {
    max_markets: usize,
    total_capital: f64,
    allocations: Mutex<HashMap<String, f64>>,
    members: Mutex<HashMap<String, PoolMember>>,
}

impl MarketPool {
    pub fn new(max_markets: usize, total_capital: f64) -> Self {
        Self {
            max_markets,
            total_capital,
            allocations: Mutex::new(HashMap::new()),
            members: Mutex::new(HashMap::new()),
        }
    }

    fn recompute_allocations(&self) {
        let mut allocations = self.allocations.lock();
        let n = allocations.len().max(1) as f64;
        let per_market = self.total_capital / n;
        for value in allocations.values_mut() {
            *value = per_market;
        }
    }

    pub fn per_market_allocation(&self, asset_id: &str) -> Option<f64> {
        self.allocations.lock().get(asset_id).copied()
    }

    pub fn get_max_position(&self, asset_id: &str, remaining_total_exposure: f64) -> f64 {
        let per_market = self.per_market_allocation(asset_id).unwrap_or(0.0);
        remaining_total_exposure.min(per_market)
    }

    pub fn active_markets(&self) -> usize {
        self.members.lock().len()
    }

    /// Registers a market and spawns its quoter task. Returns `false` if
    /// the pool is already at `max_markets`.
    pub fn add_market(&self, asset_id: &str, mut quoter: Quoter) -> bool {
        {
            let members = self.members.lock();
            if members.len() >= self.max_markets {
                return false;
            }
        }

        self.allocations.lock().insert(asset_id.to_string(), 0.0);
        self.recompute_allocations();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let asset_id_owned = asset_id.to_string();
        let handle = tokio::spawn(async move {
            quoter.run(shutdown_rx).await;
            info!(asset_id = %asset_id_owned, "quoter task exited");
        });

        self.members.lock().insert(
            asset_id.to_string(),
            PoolMember {
                handle,
                shutdown: shutdown_tx,
            },
        );
        true
    }

    /// Stops and removes one market's quoter without affecting the others.
    pub async fn remove_market(&self, asset_id: &str) {
        let member = self.members.lock().remove(asset_id);
        if let Some(member) = member {
            let _ = member.shutdown.send(true);
            if let Err(e) = member.handle.await {
                error!(asset_id, error = %e, "quoter task panicked during removal");
            }
        }
        self.allocations.lock().remove(asset_id);
        self.recompute_allocations();
    }

    /// Reaps any quoter task that has finished (panicked or returned) so a
    /// single failure never blocks the rest of the pool.
    pub fn reap_finished(&self) {
        let mut members = self.members.lock();
        let finished: Vec<String> = members
            .iter()
            .filter(|(_, m)| m.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        for asset_id in finished {
            members.remove(&asset_id);
            error!(asset_id, "quoter marked inactive after unexpected exit");
        }
        drop(members);
        self.recompute_allocations();
    }

    pub async fn stop(&self) {
        let members: Vec<(String, PoolMember)> = self.members.lock().drain().collect();
        for (_, member) in &members {
            let _ = member.shutdown.send(true);
        }
        for (asset_id, member) in members {
            if let Err(e) = member.handle.await {
                error!(asset_id, error = %e, "quoter task panicked during pool shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_splits_evenly_across_markets() {
        let pool = MarketPool::new(5, 1000.0);
        pool.allocations.lock().insert("a".to_string(), 0.0);
        pool.allocations.lock().insert("b".to_string(), 0.0);
        pool.recompute_allocations();
        assert_eq!(pool.per_market_allocation("a"), Some(500.0));
        assert_eq!(pool.per_market_allocation("b"), Some(500.0));
    }

    #[test]
    fn max_position_respects_remaining_exposure() {
        let pool = MarketPool::new(5, 1000.0);
        pool.allocations.lock().insert("a".to_string(), 200.0);
        assert_eq!(pool.get_max_position("a", 50.0), 50.0);
        assert_eq!(pool.get_max_position("a", 500.0), 200.0);
    }
}

use crate::{OracleError, Result};
use incentives_host::{AccessControl, BlockClock, EventBus, IncentiveEvent, Role};
use incentives_types::{Address, BlockHeight, ChunkBalance};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Denominator of the increase rates
pub const PRICE_BASE: u64 = 1024;

/// Redundancy at which the price is left unchanged
pub const TARGET_REDUNDANCY: u8 = 4;

/// Signals above `TARGET_REDUNDANCY + MAX_CONSIDERED_EXTRA_REDUNDANCY` are capped
pub const MAX_CONSIDERED_EXTRA_REDUNDANCY: u8 = 4;

/// Price multiplier per redundancy signal, scaled by `PRICE_BASE`.
/// Fewer redundant copies raise the price, more lower it.
/// The scale stays `PRICE_BASE` whatever floor `OracleConfig::minimum_price` sets.
pub const INCREASE_RATE: [u64; 9] = [0, 1069, 1048, 1032, 1024, 1021, 1015, 1012, 1009];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Floor the price is clamped to
    pub minimum_price: u64,
    pub initial_price: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            minimum_price: PRICE_BASE,
            initial_price: PRICE_BASE,
        }
    }
}

#[derive(Debug, Clone)]
struct PriceState {
    current_price: u64,
    total_outpayment_at_last_change: ChunkBalance,
    block_of_last_change: BlockHeight,
}

impl PriceState {
    fn total_outpayment_at(&self, block: BlockHeight) -> ChunkBalance {
        let elapsed = block.saturating_sub(self.block_of_last_change) as u128;
        self.total_outpayment_at_last_change
            .saturating_add(self.current_price as u128 * elapsed)
    }

    /// Close the accrual period at `block` before the price changes
    fn flush(&mut self, block: BlockHeight) {
        self.total_outpayment_at_last_change = self.total_outpayment_at(block);
        self.block_of_last_change = block;
    }
}

/// Per-chunk storage price and its cumulative outpayment.
///
/// The cumulative outpayment is never stored per block: it is the value at the
/// last price change plus `price * elapsed blocks`, computed on demand.
pub struct PriceOracle {
    config: OracleConfig,
    state: RwLock<PriceState>,
    clock: Arc<dyn BlockClock>,
    access: Arc<dyn AccessControl>,
    events: EventBus,
}

impl PriceOracle {
    pub fn new(
        config: OracleConfig,
        clock: Arc<dyn BlockClock>,
        access: Arc<dyn AccessControl>,
        events: EventBus,
    ) -> Self {
        let state = PriceState {
            current_price: config.initial_price.max(config.minimum_price),
            total_outpayment_at_last_change: 0,
            block_of_last_change: clock.current_block(),
        };

        info!(
            initial_price = state.current_price,
            minimum_price = config.minimum_price,
            block = state.block_of_last_change,
            "📈 Price oracle initialized"
        );

        Self {
            config,
            state: RwLock::new(state),
            clock,
            access,
            events,
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Set the price directly. Values under the floor are clamped.
    /// Returns the effective price.
    pub async fn set_price(&self, caller: Address, price: u64) -> Result<u64> {
        self.require_role(Role::Oracle, caller).await?;
        let block = self.clock.current_block();

        let effective = price.max(self.config.minimum_price);
        let mut state = self.state.write().await;
        state.flush(block);
        state.current_price = effective;
        drop(state);
        self.events.emit(IncentiveEvent::PriceUpdate { price: effective });

        info!(
            caller = %caller.short(),
            requested = price,
            price = effective,
            block,
            "💲 Price set"
        );
        Ok(effective)
    }

    /// Move the price by the rate for the observed redundancy signal.
    /// Returns the effective price.
    pub async fn adjust_price(&self, caller: Address, redundancy: u8) -> Result<u64> {
        self.require_role(Role::PriceUpdater, caller).await?;
        if redundancy == 0 {
            return Err(OracleError::InvalidSignal(redundancy));
        }
        let block = self.clock.current_block();

        let signal = redundancy.min(TARGET_REDUNDANCY + MAX_CONSIDERED_EXTRA_REDUNDANCY);
        let rate = INCREASE_RATE[signal as usize] as u128;

        let mut state = self.state.write().await;
        let current = state.current_price;
        let scaled = rate * current as u128 / PRICE_BASE as u128;
        let effective = u64::try_from(scaled)
            .unwrap_or(u64::MAX)
            .max(self.config.minimum_price);
        state.flush(block);
        state.current_price = effective;
        drop(state);
        self.events.emit(IncentiveEvent::PriceUpdate { price: effective });

        info!(
            caller = %caller.short(),
            redundancy,
            signal,
            previous = current,
            price = effective,
            block,
            "📊 Price adjusted"
        );
        Ok(effective)
    }

    pub async fn current_price(&self) -> u64 {
        self.state.read().await.current_price
    }

    /// Cumulative per-chunk outpayment at the current block
    pub async fn current_total_outpayment(&self) -> ChunkBalance {
        self.total_outpayment_at(self.clock.current_block()).await
    }

    /// Cumulative per-chunk outpayment at `block`, assuming the current price
    /// holds until then. Blocks before the last change report the value at
    /// the last change.
    pub async fn total_outpayment_at(&self, block: BlockHeight) -> ChunkBalance {
        let state = self.state.read().await;
        let total = state.total_outpayment_at(block);
        debug!(block, total, "Total outpayment read");
        total
    }

    pub async fn last_updated_block(&self) -> BlockHeight {
        self.state.read().await.block_of_last_change
    }

    async fn require_role(&self, role: Role, caller: Address) -> Result<()> {
        if self.access.has_role(role, &caller).await {
            Ok(())
        } else {
            Err(OracleError::Unauthorized { caller, role })
        }
    }
}

//! Observations emitted by the incentive components
//!
//! Indexers and the simulator learn about state changes from these events
//! rather than by polling component state.

use incentives_types::{Address, BatchId, BlockHeight, ChunkBalance, Hash, Overlay, TokenAmount};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Events buffered per subscriber before the oldest are dropped
const EVENT_BUFFER: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum IncentiveEvent {
    BatchCreated {
        batch_id: BatchId,
        total_amount: TokenAmount,
        normalised_balance: ChunkBalance,
        owner: Address,
        depth: u8,
        bucket_depth: u8,
        immutable: bool,
    },

    BatchTopUp {
        batch_id: BatchId,
        total_amount: TokenAmount,
        normalised_balance: ChunkBalance,
    },

    BatchDepthIncrease {
        batch_id: BatchId,
        new_depth: u8,
        normalised_balance: ChunkBalance,
    },

    PotWithdrawn {
        recipient: Address,
        amount: TokenAmount,
    },

    PriceUpdate {
        price: u64,
    },

    StakeUpdated {
        overlay: Overlay,
        stake_amount: TokenAmount,
        owner: Address,
        last_updated_block: BlockHeight,
    },

    Committed {
        round: u64,
        overlay: Overlay,
    },

    Revealed {
        round: u64,
        overlay: Overlay,
        stake: TokenAmount,
        stake_density: u128,
        #[serde(with = "hex::serde")]
        reserve_commitment: Hash,
        depth: u8,
    },

    TruthSelected {
        owner: Address,
        #[serde(with = "hex::serde")]
        hash: Hash,
        depth: u8,
    },

    WinnerSelected {
        owner: Address,
        overlay: Overlay,
    },

    /// `component` names the paused component: `postage`, `staking` or `redistribution`
    Paused {
        component: String,
        account: Address,
    },

    Unpaused {
        component: String,
        account: Address,
    },
}

impl IncentiveEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            IncentiveEvent::BatchCreated { .. } => "batch.created",
            IncentiveEvent::BatchTopUp { .. } => "batch.topup",
            IncentiveEvent::BatchDepthIncrease { .. } => "batch.depth",
            IncentiveEvent::PotWithdrawn { .. } => "pot.withdrawn",
            IncentiveEvent::PriceUpdate { .. } => "price.update",
            IncentiveEvent::StakeUpdated { .. } => "stake.updated",
            IncentiveEvent::Committed { .. } => "round.commit",
            IncentiveEvent::Revealed { .. } => "round.reveal",
            IncentiveEvent::TruthSelected { .. } => "round.truth",
            IncentiveEvent::WinnerSelected { .. } => "round.winner",
            IncentiveEvent::Paused { .. } => "component.paused",
            IncentiveEvent::Unpaused { .. } => "component.unpaused",
        }
    }
}

/// Broadcast channel shared by all components
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<IncentiveEvent>,
    emitted: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            sender,
            emitted: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IncentiveEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// With nobody listening the event is dropped.
    pub fn emit(&self, event: IncentiveEvent) {
        let event_type = event.event_type();
        self.emitted.fetch_add(1, Ordering::Relaxed);
        match self.sender.send(event) {
            Ok(subscribers) => debug!(event_type, subscribers, "Event emitted"),
            Err(_) => debug!(event_type, "Event emitted but no subscribers listening"),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn total_events_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

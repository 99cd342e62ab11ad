use incentives_types::BlockHeight;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current block height
pub trait BlockClock: Send + Sync {
    fn current_block(&self) -> BlockHeight;
}

/// Clock driven by hand. Never moves backwards.
#[derive(Debug, Default)]
pub struct ManualClock {
    block: AtomicU64,
}

impl ManualClock {
    pub fn new(start: BlockHeight) -> Self {
        Self {
            block: AtomicU64::new(start),
        }
    }

    /// Move to `block`; earlier heights are ignored
    pub fn set(&self, block: BlockHeight) {
        self.block.fetch_max(block, Ordering::SeqCst);
    }

    /// Mine `blocks` blocks and return the new height
    pub fn advance(&self, blocks: u64) -> BlockHeight {
        self.block.fetch_add(blocks, Ordering::SeqCst) + blocks
    }
}

impl BlockClock for ManualClock {
    fn current_block(&self) -> BlockHeight {
        self.block.load(Ordering::SeqCst)
    }
}

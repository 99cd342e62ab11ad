use crate::Batch;
use incentives_types::{BatchId, ChunkBalance};
use std::collections::{BTreeSet, HashMap};

/// Batches ordered by `(normalised_balance, id)` ascending.
///
/// The order set and the map always hold the same ids.
#[derive(Debug, Default)]
pub struct BatchIndex {
    batches: HashMap<BatchId, Batch>,
    order: BTreeSet<(ChunkBalance, BatchId)>,
}

impl BatchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false without touching the index if `id` is present
    pub fn insert(&mut self, id: BatchId, batch: Batch) -> bool {
        if self.batches.contains_key(&id) {
            return false;
        }
        self.order.insert((batch.normalised_balance, id));
        self.batches.insert(id, batch);
        true
    }

    pub fn get(&self, id: &BatchId) -> Option<&Batch> {
        self.batches.get(id)
    }

    pub fn contains(&self, id: &BatchId) -> bool {
        self.batches.contains_key(id)
    }

    pub fn remove(&mut self, id: &BatchId) -> Option<Batch> {
        let batch = self.batches.remove(id)?;
        self.order.remove(&(batch.normalised_balance, *id));
        Some(batch)
    }

    /// Re-key `id` under a new balance and depth
    pub fn update(&mut self, id: &BatchId, normalised_balance: ChunkBalance, depth: u8) -> bool {
        let Some(batch) = self.batches.get_mut(id) else {
            return false;
        };
        self.order.remove(&(batch.normalised_balance, *id));
        batch.normalised_balance = normalised_balance;
        batch.depth = depth;
        self.order.insert((normalised_balance, *id));
        true
    }

    /// Batch with the smallest normalised balance
    pub fn first(&self) -> Option<(BatchId, &Batch)> {
        let (_, id) = self.order.first()?;
        self.batches.get(id).map(|b| (*id, b))
    }

    /// Remove and return the first batch if its balance is at most `threshold`
    pub fn pop_first_at_most(&mut self, threshold: ChunkBalance) -> Option<(BatchId, Batch)> {
        let &(balance, id) = self.order.first()?;
        if balance > threshold {
            return None;
        }
        self.order.pop_first();
        self.batches.remove(&id).map(|b| (id, b))
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Ids in ascending balance order
    pub fn ids(&self) -> impl Iterator<Item = BatchId> + '_ {
        self.order.iter().map(|(_, id)| *id)
    }
}

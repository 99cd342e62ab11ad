use crate::{Batch, BatchIndex, LedgerConfig, PostageError, Result, MAX_DEPTH};
use incentives_host::{AccessControl, BlockClock, EventBus, IncentiveEvent, Role, TokenLedger};
use incentives_oracle::PriceOracle;
use incentives_types::{Address, BatchId, ChunkBalance, TokenAmount};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

struct LedgerState {
    index: BatchIndex,
    /// Sum of `2^depth` over live batches
    valid_chunk_count: u128,
    /// Cumulative outpayment at the last expiry sweep
    last_expiry_balance: ChunkBalance,
    pot: TokenAmount,
    paused: bool,
    minimum_validity_blocks: u64,
}

impl LedgerState {
    /// Prune batches that ran dry by `total_outpayment` and move everything
    /// owed since the last sweep into the pot. Returns the number pruned.
    fn expire(&mut self, total_outpayment: ChunkBalance) -> usize {
        let mut pruned = 0;
        while let Some((id, batch)) = self.index.pop_first_at_most(total_outpayment) {
            let owed = batch
                .normalised_balance
                .saturating_sub(self.last_expiry_balance);
            let value = owed.saturating_mul(batch.capacity());
            self.pot = self.pot.saturating_add(TokenAmount::from_units(value));
            self.valid_chunk_count = self.valid_chunk_count.saturating_sub(batch.capacity());
            pruned += 1;

            debug!(
                batch_id = %id.short(),
                normalised_balance = batch.normalised_balance,
                value,
                "🗑️ Batch expired"
            );
        }

        let elapsed = total_outpayment.saturating_sub(self.last_expiry_balance);
        let accrued = self.valid_chunk_count.saturating_mul(elapsed);
        self.pot = self.pot.saturating_add(TokenAmount::from_units(accrued));
        self.last_expiry_balance = self.last_expiry_balance.max(total_outpayment);

        pruned
    }
}

/// Batch payments, expiry and the redistribution pot
pub struct PostageLedger {
    config: LedgerConfig,
    state: RwLock<LedgerState>,
    oracle: Arc<PriceOracle>,
    token: Arc<dyn TokenLedger>,
    access: Arc<dyn AccessControl>,
    clock: Arc<dyn BlockClock>,
    events: EventBus,
}

impl PostageLedger {
    pub fn new(
        config: LedgerConfig,
        oracle: Arc<PriceOracle>,
        token: Arc<dyn TokenLedger>,
        access: Arc<dyn AccessControl>,
        clock: Arc<dyn BlockClock>,
        events: EventBus,
    ) -> Self {
        let state = LedgerState {
            index: BatchIndex::new(),
            valid_chunk_count: 0,
            last_expiry_balance: 0,
            pot: TokenAmount::ZERO,
            paused: false,
            minimum_validity_blocks: config.minimum_validity_blocks,
        };

        Self {
            config,
            state: RwLock::new(state),
            oracle,
            token,
            access,
            clock,
            events,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Create a batch with id `H(caller || nonce)`, paid by `caller`
    #[allow(clippy::too_many_arguments)]
    pub async fn create_batch(
        &self,
        caller: Address,
        owner: Address,
        initial_balance_per_chunk: ChunkBalance,
        depth: u8,
        bucket_depth: u8,
        nonce: [u8; 32],
        immutable: bool,
    ) -> Result<BatchId> {
        let batch_id = BatchId::derive(&caller, &nonce);
        self.insert_batch(
            caller,
            owner,
            batch_id,
            initial_balance_per_chunk,
            depth,
            bucket_depth,
            immutable,
        )
        .await?;
        Ok(batch_id)
    }

    /// Migrate a batch under an explicit id
    #[allow(clippy::too_many_arguments)]
    pub async fn copy_batch(
        &self,
        caller: Address,
        owner: Address,
        initial_balance_per_chunk: ChunkBalance,
        depth: u8,
        bucket_depth: u8,
        batch_id: BatchId,
        immutable: bool,
    ) -> Result<()> {
        self.require_role(Role::Admin, caller).await?;
        self.insert_batch(
            caller,
            owner,
            batch_id,
            initial_balance_per_chunk,
            depth,
            bucket_depth,
            immutable,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_batch(
        &self,
        caller: Address,
        owner: Address,
        batch_id: BatchId,
        initial_balance_per_chunk: ChunkBalance,
        depth: u8,
        bucket_depth: u8,
        immutable: bool,
    ) -> Result<()> {
        if owner.is_zero() {
            return Err(PostageError::InvalidOwner);
        }
        if depth > MAX_DEPTH {
            return Err(PostageError::InvalidDepth(depth));
        }
        if bucket_depth == 0
            || bucket_depth < self.config.minimum_bucket_depth
            || bucket_depth >= depth
        {
            return Err(PostageError::InvalidBucketDepth {
                depth,
                bucket_depth,
            });
        }

        let block = self.clock.current_block();
        let mut state = self.state.write().await;
        if state.paused {
            return Err(PostageError::Paused);
        }
        if state.index.contains(&batch_id) {
            return Err(PostageError::BatchExists(batch_id));
        }
        if initial_balance_per_chunk == 0 {
            return Err(PostageError::ZeroBalance);
        }
        let required = self.minimum_balance_locked(&state).await;
        if initial_balance_per_chunk < required {
            return Err(PostageError::InsufficientBalance {
                required,
                provided: initial_balance_per_chunk,
            });
        }

        let total_outpayment = self.oracle.total_outpayment_at(block).await;
        let normalised_balance = total_outpayment
            .checked_add(initial_balance_per_chunk)
            .ok_or(PostageError::AmountOverflow)?;
        let capacity = 1u128 << depth;
        let total_amount = initial_balance_per_chunk
            .checked_mul(capacity)
            .map(TokenAmount::from_units)
            .ok_or(PostageError::AmountOverflow)?;

        self.token
            .transfer(caller, self.config.escrow_account, total_amount)
            .await?;

        state.expire(total_outpayment);
        state.index.insert(
            batch_id,
            Batch {
                owner,
                depth,
                bucket_depth,
                immutable,
                normalised_balance,
            },
        );
        state.valid_chunk_count = state.valid_chunk_count.saturating_add(capacity);
        drop(state);

        self.events.emit(IncentiveEvent::BatchCreated {
            batch_id,
            total_amount,
            normalised_balance,
            owner,
            depth,
            bucket_depth,
            immutable,
        });

        info!(
            batch_id = %batch_id.short(),
            owner = %owner.short(),
            depth,
            bucket_depth,
            immutable,
            total_amount = %total_amount,
            normalised_balance,
            block,
            "📮 Batch created"
        );
        Ok(())
    }

    /// Add `amount_per_chunk` to every chunk of a live batch, paid by `caller`
    pub async fn top_up(
        &self,
        caller: Address,
        batch_id: BatchId,
        amount_per_chunk: ChunkBalance,
    ) -> Result<()> {
        let block = self.clock.current_block();
        let mut state = self.state.write().await;
        if state.paused {
            return Err(PostageError::Paused);
        }

        let total_outpayment = self.oracle.total_outpayment_at(block).await;
        let batch = state
            .index
            .get(&batch_id)
            .cloned()
            .ok_or(PostageError::BatchNotFound(batch_id))?;
        if batch.normalised_balance <= total_outpayment {
            return Err(PostageError::BatchExpired(batch_id));
        }
        if amount_per_chunk == 0 {
            return Err(PostageError::ZeroBalance);
        }

        let normalised_balance = batch
            .normalised_balance
            .checked_add(amount_per_chunk)
            .ok_or(PostageError::AmountOverflow)?;
        let total_amount = amount_per_chunk
            .checked_mul(batch.capacity())
            .map(TokenAmount::from_units)
            .ok_or(PostageError::AmountOverflow)?;

        self.token
            .transfer(caller, self.config.escrow_account, total_amount)
            .await?;

        state.expire(total_outpayment);
        state
            .index
            .update(&batch_id, normalised_balance, batch.depth);
        drop(state);

        self.events.emit(IncentiveEvent::BatchTopUp {
            batch_id,
            total_amount,
            normalised_balance,
        });

        info!(
            batch_id = %batch_id.short(),
            caller = %caller.short(),
            total_amount = %total_amount,
            normalised_balance,
            block,
            "⬆️ Batch topped up"
        );
        Ok(())
    }

    /// Double the batch capacity `new_depth - depth` times, spreading the
    /// remaining balance over the larger chunk count
    pub async fn increase_depth(
        &self,
        caller: Address,
        batch_id: BatchId,
        new_depth: u8,
    ) -> Result<()> {
        let block = self.clock.current_block();
        let mut state = self.state.write().await;
        if state.paused {
            return Err(PostageError::Paused);
        }

        let batch = state
            .index
            .get(&batch_id)
            .cloned()
            .ok_or(PostageError::BatchNotFound(batch_id))?;
        if batch.owner != caller {
            return Err(PostageError::NotOwner { batch_id, caller });
        }
        if batch.immutable {
            return Err(PostageError::Immutable(batch_id));
        }
        if new_depth <= batch.depth {
            return Err(PostageError::DepthNotIncreasing {
                current: batch.depth,
                requested: new_depth,
            });
        }
        if new_depth > MAX_DEPTH {
            return Err(PostageError::InvalidDepth(new_depth));
        }

        let total_outpayment = self.oracle.total_outpayment_at(block).await;
        if batch.normalised_balance <= total_outpayment {
            return Err(PostageError::BatchExpired(batch_id));
        }

        let remaining = batch.normalised_balance - total_outpayment;
        let new_remaining = remaining >> (new_depth - batch.depth);
        let required = self.minimum_balance_locked(&state).await.max(1);
        if new_remaining < required {
            return Err(PostageError::InsufficientBalance {
                required,
                provided: new_remaining,
            });
        }

        state.expire(total_outpayment);
        let normalised_balance = total_outpayment + new_remaining;
        state.index.update(&batch_id, normalised_balance, new_depth);
        state.valid_chunk_count = state
            .valid_chunk_count
            .saturating_sub(batch.capacity())
            .saturating_add(1u128 << new_depth);
        drop(state);

        self.events.emit(IncentiveEvent::BatchDepthIncrease {
            batch_id,
            new_depth,
            normalised_balance,
        });

        info!(
            batch_id = %batch_id.short(),
            old_depth = batch.depth,
            new_depth,
            normalised_balance,
            block,
            "🔽 Batch depth increased"
        );
        Ok(())
    }

    /// Balance per chunk left before the batch expires
    pub async fn remaining_balance(&self, batch_id: &BatchId) -> Result<ChunkBalance> {
        let block = self.clock.current_block();
        let state = self.state.read().await;
        let batch = state
            .index
            .get(batch_id)
            .ok_or(PostageError::BatchNotFound(*batch_id))?;
        let total_outpayment = self.oracle.total_outpayment_at(block).await;
        Ok(batch.normalised_balance.saturating_sub(total_outpayment))
    }

    /// Prune expired batches and settle the pot up to the current block.
    /// Returns the number of batches pruned.
    pub async fn expire(&self) -> usize {
        let block = self.clock.current_block();
        let mut state = self.state.write().await;
        let total_outpayment = self.oracle.total_outpayment_at(block).await;
        let pruned = state.expire(total_outpayment);
        debug!(block, pruned, pot = %state.pot, "Expiry sweep");
        pruned
    }

    /// Settled pot, capped by what the escrow actually holds
    pub async fn total_pot(&self) -> TokenAmount {
        let block = self.clock.current_block();
        let mut state = self.state.write().await;
        let total_outpayment = self.oracle.total_outpayment_at(block).await;
        state.expire(total_outpayment);
        let escrow = self.token.balance_of(self.config.escrow_account).await;
        state.pot.min(escrow)
    }

    /// Pay the whole pot to `recipient`
    pub async fn withdraw(&self, caller: Address, recipient: Address) -> Result<TokenAmount> {
        self.withdraw_after(caller, recipient, Vec::new()).await
    }

    /// Withdraw the pot, emitting `preceding` ahead of `PotWithdrawn`.
    /// Nothing is emitted if the withdrawal fails.
    pub async fn withdraw_after(
        &self,
        caller: Address,
        recipient: Address,
        preceding: Vec<IncentiveEvent>,
    ) -> Result<TokenAmount> {
        self.require_role(Role::Redistributor, caller).await?;

        let block = self.clock.current_block();
        let mut state = self.state.write().await;
        let total_outpayment = self.oracle.total_outpayment_at(block).await;
        state.expire(total_outpayment);

        let escrow = self.token.balance_of(self.config.escrow_account).await;
        let amount = state.pot.min(escrow);
        self.token
            .transfer(self.config.escrow_account, recipient, amount)
            .await?;
        state.pot = TokenAmount::ZERO;
        drop(state);

        for event in preceding {
            self.events.emit(event);
        }
        self.events.emit(IncentiveEvent::PotWithdrawn { recipient, amount });

        info!(
            recipient = %recipient.short(),
            amount = %amount,
            block,
            "💰 Pot withdrawn"
        );
        Ok(amount)
    }

    pub async fn set_minimum_validity_blocks(&self, caller: Address, blocks: u64) -> Result<()> {
        self.require_role(Role::Admin, caller).await?;
        self.state.write().await.minimum_validity_blocks = blocks;
        info!(caller = %caller.short(), blocks, "Minimum validity updated");
        Ok(())
    }

    pub async fn pause(&self, caller: Address) -> Result<()> {
        self.set_paused(caller, true).await
    }

    pub async fn unpause(&self, caller: Address) -> Result<()> {
        self.set_paused(caller, false).await
    }

    pub async fn is_paused(&self) -> bool {
        self.state.read().await.paused
    }

    pub async fn batch(&self, batch_id: &BatchId) -> Option<Batch> {
        self.state.read().await.index.get(batch_id).cloned()
    }

    pub async fn first_batch_id(&self) -> Option<BatchId> {
        self.state.read().await.index.first().map(|(id, _)| id)
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.index.is_empty()
    }

    pub async fn batch_count(&self) -> usize {
        self.state.read().await.index.len()
    }

    pub async fn valid_chunk_count(&self) -> u128 {
        self.state.read().await.valid_chunk_count
    }

    /// Pot as of the last sweep, without settling
    pub async fn pot(&self) -> TokenAmount {
        self.state.read().await.pot
    }

    pub async fn last_expiry_balance(&self) -> ChunkBalance {
        self.state.read().await.last_expiry_balance
    }

    pub async fn minimum_initial_balance_per_chunk(&self) -> ChunkBalance {
        let state = self.state.read().await;
        self.minimum_balance_locked(&state).await
    }

    async fn minimum_balance_locked(&self, state: &LedgerState) -> ChunkBalance {
        let price = self.oracle.current_price().await as u128;
        (state.minimum_validity_blocks as u128).saturating_mul(price)
    }

    async fn set_paused(&self, caller: Address, paused: bool) -> Result<()> {
        self.require_role(Role::Pauser, caller).await?;
        self.state.write().await.paused = paused;

        let component = "postage".to_string();
        self.events.emit(if paused {
            IncentiveEvent::Paused {
                component,
                account: caller,
            }
        } else {
            IncentiveEvent::Unpaused {
                component,
                account: caller,
            }
        });

        info!(caller = %caller.short(), paused, "Postage ledger pause state changed");
        Ok(())
    }

    async fn require_role(&self, role: Role, caller: Address) -> Result<()> {
        if self.access.has_role(role, &caller).await {
            Ok(())
        } else {
            Err(PostageError::Unauthorized { caller, role })
        }
    }
}

use crate::{FullStake, Result, StakingError, UsableStakePolicy};
use incentives_host::{AccessControl, BlockClock, EventBus, IncentiveEvent, Role, TokenLedger};
use incentives_types::{hash_parts, Address, BlockHeight, Overlay, TokenAmount};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    /// Mixed into every overlay so identities differ across networks
    pub network_id: u64,
    /// Account holding deposited stake
    pub escrow_account: Address,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            network_id: 1,
            escrow_account: Address::from_bytes(hash_parts(&[b"incentives/stake-escrow"])),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRecord {
    pub overlay: Overlay,
    pub owner: Address,
    pub stake_amount: TokenAmount,
    pub last_updated_block: BlockHeight,
}

#[derive(Default)]
struct RegistryState {
    stakes: HashMap<Overlay, StakeRecord>,
    paused: bool,
}

/// Stake deposits keyed by overlay.
///
/// Stake only ever grows. Nothing in the redistribution game consumes it.
pub struct StakeRegistry {
    config: StakingConfig,
    state: RwLock<RegistryState>,
    token: Arc<dyn TokenLedger>,
    access: Arc<dyn AccessControl>,
    clock: Arc<dyn BlockClock>,
    events: EventBus,
    policy: Arc<dyn UsableStakePolicy>,
}

impl StakeRegistry {
    pub fn new(
        config: StakingConfig,
        token: Arc<dyn TokenLedger>,
        access: Arc<dyn AccessControl>,
        clock: Arc<dyn BlockClock>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState::default()),
            token,
            access,
            clock,
            events,
            policy: Arc::new(FullStake),
        }
    }

    /// Replace the usable-stake policy
    pub fn with_policy(mut self, policy: Arc<dyn UsableStakePolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &StakingConfig {
        &self.config
    }

    /// Deposit `amount` for the overlay derived from `owner` and `nonce`.
    ///
    /// Repeated deposits under the same nonce add to the same overlay.
    pub async fn deposit_stake(
        &self,
        caller: Address,
        owner: Address,
        nonce: [u8; 32],
        amount: TokenAmount,
    ) -> Result<Overlay> {
        if caller != owner {
            return Err(StakingError::CallerNotOwner { caller, owner });
        }
        if amount.is_zero() {
            return Err(StakingError::ZeroAmount);
        }

        let block = self.clock.current_block();
        let overlay = Overlay::derive(&owner, self.config.network_id, &nonce);

        let mut state = self.state.write().await;
        if state.paused {
            return Err(StakingError::Paused);
        }

        let previous = state
            .stakes
            .get(&overlay)
            .map(|r| r.stake_amount)
            .unwrap_or(TokenAmount::ZERO);
        let stake_amount = previous
            .checked_add(amount)
            .ok_or(StakingError::StakeOverflow)?;

        self.token
            .transfer(caller, self.config.escrow_account, amount)
            .await?;

        let record = StakeRecord {
            overlay,
            owner,
            stake_amount,
            last_updated_block: block,
        };
        state.stakes.insert(overlay, record);
        drop(state);

        self.events.emit(IncentiveEvent::StakeUpdated {
            overlay,
            stake_amount,
            owner,
            last_updated_block: block,
        });

        info!(
            overlay = %overlay.short(),
            owner = %owner.short(),
            deposit = %amount,
            stake = %stake_amount,
            block,
            "🥩 Stake deposited"
        );

        Ok(overlay)
    }

    pub async fn stake(&self, overlay: &Overlay) -> Option<StakeRecord> {
        self.state.read().await.stakes.get(overlay).cloned()
    }

    pub async fn stake_of_overlay(&self, overlay: &Overlay) -> TokenAmount {
        self.state
            .read()
            .await
            .stakes
            .get(overlay)
            .map(|r| r.stake_amount)
            .unwrap_or(TokenAmount::ZERO)
    }

    /// Stake counted by the redistribution game under the installed policy
    pub async fn usable_stake_of_overlay(&self, overlay: &Overlay) -> TokenAmount {
        let state = self.state.read().await;
        let usable = state
            .stakes
            .get(overlay)
            .map(|r| self.policy.usable_stake(r))
            .unwrap_or(TokenAmount::ZERO);
        debug!(overlay = %overlay.short(), usable = %usable, "Usable stake read");
        usable
    }

    pub async fn owner_of_overlay(&self, overlay: &Overlay) -> Option<Address> {
        self.state.read().await.stakes.get(overlay).map(|r| r.owner)
    }

    pub async fn last_updated_block_of_overlay(&self, overlay: &Overlay) -> Option<BlockHeight> {
        self.state
            .read()
            .await
            .stakes
            .get(overlay)
            .map(|r| r.last_updated_block)
    }

    pub async fn staker_count(&self) -> usize {
        self.state.read().await.stakes.len()
    }

    pub async fn is_paused(&self) -> bool {
        self.state.read().await.paused
    }

    pub async fn pause(&self, caller: Address) -> Result<()> {
        self.set_paused(caller, true).await
    }

    pub async fn unpause(&self, caller: Address) -> Result<()> {
        self.set_paused(caller, false).await
    }

    async fn set_paused(&self, caller: Address, paused: bool) -> Result<()> {
        if !self.access.has_role(Role::Pauser, &caller).await {
            return Err(StakingError::Unauthorized {
                caller,
                role: Role::Pauser,
            });
        }

        self.state.write().await.paused = paused;

        let component = "staking".to_string();
        let event = if paused {
            IncentiveEvent::Paused {
                component,
                account: caller,
            }
        } else {
            IncentiveEvent::Unpaused {
                component,
                account: caller,
            }
        };
        self.events.emit(event);

        info!(caller = %caller.short(), paused, "Stake registry pause state changed");
        Ok(())
    }
}

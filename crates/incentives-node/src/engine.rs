use crate::config::IncentivesConfig;
use anyhow::{Context, Result};
use incentives_host::{AccessControl, BlockClock, EventBus, IncentiveEvent, Role, TokenLedger};
use incentives_oracle::PriceOracle;
use incentives_postage::PostageLedger;
use incentives_redistribution::{Phase, RedistributionGame};
use incentives_staking::StakeRegistry;
use incentives_types::{BlockHeight, TokenAmount};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Snapshot of the economic layer at one block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub block: BlockHeight,
    pub round: u64,
    pub phase: Phase,
    pub price: u64,
    pub pot: TokenAmount,
    pub batches: usize,
    pub stakers: usize,
}

/// The four incentive components wired to one set of host collaborators
pub struct IncentivesEngine {
    pub oracle: Arc<PriceOracle>,
    pub staking: Arc<StakeRegistry>,
    pub ledger: Arc<PostageLedger>,
    pub game: Arc<RedistributionGame>,
    clock: Arc<dyn BlockClock>,
    events: EventBus,
}

impl IncentivesEngine {
    pub async fn new(
        config: &IncentivesConfig,
        clock: Arc<dyn BlockClock>,
        token: Arc<dyn TokenLedger>,
        access: Arc<dyn AccessControl>,
    ) -> Result<Self> {
        let events = EventBus::new();

        let oracle = Arc::new(PriceOracle::new(
            config.oracle.clone(),
            clock.clone(),
            access.clone(),
            events.clone(),
        ));
        let staking = Arc::new(StakeRegistry::new(
            config.staking.clone(),
            token.clone(),
            access.clone(),
            clock.clone(),
            events.clone(),
        ));
        let ledger = Arc::new(PostageLedger::new(
            config.ledger.clone(),
            oracle.clone(),
            token,
            access.clone(),
            clock.clone(),
            events.clone(),
        ));
        let game = Arc::new(
            RedistributionGame::new(
                config.game.clone(),
                staking.clone(),
                ledger.clone(),
                access.clone(),
                clock.clone(),
                events.clone(),
            )
            .context("creating redistribution game")?,
        );

        if !access
            .has_role(Role::Redistributor, &config.game.game_account)
            .await
        {
            warn!(
                game_account = %config.game.game_account.short(),
                "⚠️ Game account lacks the redistributor role, claims cannot pay out"
            );
        }

        info!(
            block = clock.current_block(),
            network_id = config.staking.network_id,
            price = oracle.current_price().await,
            "✨ Incentives engine initialized"
        );

        Ok(Self {
            oracle,
            staking,
            ledger,
            game,
            clock,
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IncentiveEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn current_block(&self) -> BlockHeight {
        self.clock.current_block()
    }

    pub async fn status(&self) -> EngineStatus {
        EngineStatus {
            block: self.clock.current_block(),
            round: self.game.current_round(),
            phase: self.game.current_phase(),
            price: self.oracle.current_price().await,
            pot: self.ledger.total_pot().await,
            batches: self.ledger.batch_count().await,
            stakers: self.staking.staker_count().await,
        }
    }
}

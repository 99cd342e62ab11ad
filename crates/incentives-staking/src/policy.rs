use crate::StakeRecord;
use incentives_types::TokenAmount;

/// Portion of a deposit that counts towards the redistribution game
pub trait UsableStakePolicy: Send + Sync {
    fn usable_stake(&self, record: &StakeRecord) -> TokenAmount;
}

/// The whole deposit is usable
#[derive(Debug, Clone, Copy, Default)]
pub struct FullStake;

impl UsableStakePolicy for FullStake {
    fn usable_stake(&self, record: &StakeRecord) -> TokenAmount {
        record.stake_amount
    }
}

use crate::anchor::{round_randomness, SeedState};
use crate::proof::{verify_claim_proofs, ClaimContext, ClaimProofs};
use crate::round::{Phase, PhaseSchedule};
use crate::selection::select_weighted;
use crate::{RedistributionError, Result};
use incentives_host::{AccessControl, BlockClock, EventBus, IncentiveEvent, Role};
use incentives_postage::PostageLedger;
use incentives_staking::StakeRegistry;
use incentives_types::{
    compute_challenge, hash_parts, in_proximity, Address, BlockHeight, Hash, Overlay, TokenAmount,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Transformed addresses below this mean the sampled reserve is at least
/// the expected size
pub const DEFAULT_SAMPLE_MAX_VALUE: Hash = [
    0x00, 0x00, 0xba, 0x19, 0x14, 0xb5, 0x4e, 0x03, 0x48, 0xa1, 0x02, 0x8d, 0x1a, 0x10, 0x3a, 0x95,
    0xed, 0x55, 0xc4, 0x00, 0x4b, 0x9d, 0x33, 0x24, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub phase_length: u64,
    pub round_length: u64,
    /// Usable stake an overlay needs to commit
    pub minimum_stake: TokenAmount,
    /// Rounds a stake must sit unchanged before it can commit
    pub stake_maturity_rounds: u64,
    /// Anchor of the first round
    #[serde(with = "hex::serde")]
    pub genesis_seed: Hash,
    #[serde(with = "hex::serde")]
    pub sample_max_value: Hash,
    /// Account the game withdraws the pot with; needs the redistributor role
    pub game_account: Address,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            phase_length: PhaseSchedule::DEFAULT_PHASE_LENGTH,
            round_length: PhaseSchedule::DEFAULT_ROUND_LENGTH,
            minimum_stake: TokenAmount::ZERO,
            stake_maturity_rounds: 2,
            genesis_seed: hash_parts(&[b"incentives/genesis-seed"]),
            sample_max_value: DEFAULT_SAMPLE_MAX_VALUE,
            game_account: Address::from_bytes(hash_parts(&[b"incentives/redistribution"])),
        }
    }
}

impl GameConfig {
    pub fn schedule(&self) -> Result<PhaseSchedule> {
        PhaseSchedule::new(self.phase_length, self.round_length).ok_or_else(|| {
            RedistributionError::InvalidConfiguration(format!(
                "phase length {} and round length {} leave no claim phase",
                self.phase_length, self.round_length
            ))
        })
    }
}

/// Obfuscated reserve commitment: `H(hash || depth || nonce || overlay)`
pub fn wrap_commit(hash: &Hash, depth: u8, nonce: &Hash, overlay: &Overlay) -> Hash {
    hash_parts(&[hash, &[depth], nonce, overlay.as_bytes()])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub overlay: Overlay,
    pub owner: Address,
    #[serde(with = "hex::serde")]
    pub obfuscated_hash: Hash,
    /// Usable stake when the commit was made
    pub stake: TokenAmount,
    pub revealed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reveal {
    pub overlay: Overlay,
    pub owner: Address,
    #[serde(with = "hex::serde")]
    pub hash: Hash,
    pub depth: u8,
    pub stake: TokenAmount,
    /// `stake * 2^depth`, reported for observers
    pub stake_density: u128,
    #[serde(with = "hex::serde")]
    pub nonce: Hash,
}

/// Result of a successful claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimOutcome {
    pub round: u64,
    pub truth: Reveal,
    pub winner: Reveal,
    pub reward: TokenAmount,
    #[serde(with = "hex::serde")]
    pub randomness: Hash,
}

struct GameState {
    seed: SeedState,
    commit_round: Option<u64>,
    commits: Vec<Commit>,
    reveal_round: Option<u64>,
    reveal_anchor: Hash,
    reveals: Vec<Reveal>,
    last_claimed_round: Option<u64>,
    paused: bool,
}

impl GameState {
    /// Seed as it stands in `round`. An unclaimed round with reveals still
    /// rolls the seed forward to its randomness.
    fn synced_seed(&self, round: u64) -> SeedState {
        match self.reveal_round {
            Some(reveal_round) if reveal_round < round && !self.reveals.is_empty() => {
                let randomness =
                    round_randomness(&self.reveal_anchor, self.reveals.iter().map(|r| &r.nonce));
                SeedState::new(randomness, reveal_round + 1)
            }
            _ => self.seed,
        }
    }

    fn sync(&mut self, round: u64) {
        let synced = self.synced_seed(round);
        if synced != self.seed {
            debug!(
                seed_round = synced.seed_round,
                seed = %hex::encode(&synced.seed[..4]),
                "🌱 Seed rolled over from unclaimed round"
            );
            self.seed = synced;
            self.reveals.clear();
        }
    }

    fn has_reveals_in(&self, round: u64) -> bool {
        self.reveal_round == Some(round) && !self.reveals.is_empty()
    }

    fn randomness(&self) -> Hash {
        round_randomness(&self.reveal_anchor, self.reveals.iter().map(|r| &r.nonce))
    }
}

/// Per-round commit-reveal lottery paying the postage pot to a staked
/// node that proves it stores the sample it revealed
pub struct RedistributionGame {
    config: GameConfig,
    schedule: PhaseSchedule,
    state: RwLock<GameState>,
    staking: Arc<StakeRegistry>,
    ledger: Arc<PostageLedger>,
    access: Arc<dyn AccessControl>,
    clock: Arc<dyn BlockClock>,
    events: EventBus,
}

impl RedistributionGame {
    pub fn new(
        config: GameConfig,
        staking: Arc<StakeRegistry>,
        ledger: Arc<PostageLedger>,
        access: Arc<dyn AccessControl>,
        clock: Arc<dyn BlockClock>,
        events: EventBus,
    ) -> Result<Self> {
        let schedule = config.schedule()?;
        let start_round = schedule.round_of(clock.current_block());

        let state = GameState {
            seed: SeedState::new(config.genesis_seed, start_round),
            commit_round: None,
            commits: Vec::new(),
            reveal_round: None,
            reveal_anchor: config.genesis_seed,
            reveals: Vec::new(),
            last_claimed_round: None,
            paused: false,
        };

        info!(
            phase_length = schedule.phase_length(),
            round_length = schedule.round_length(),
            start_round,
            "🎲 Redistribution game initialized"
        );

        Ok(Self {
            config,
            schedule,
            state: RwLock::new(state),
            staking,
            ledger,
            access,
            clock,
            events,
        })
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn schedule(&self) -> &PhaseSchedule {
        &self.schedule
    }

    pub fn current_round(&self) -> u64 {
        self.schedule.round_of(self.clock.current_block())
    }

    pub fn current_phase(&self) -> Phase {
        self.schedule.phase_of(self.clock.current_block())
    }

    /// Commit an obfuscated reserve commitment for `overlay`
    pub async fn commit(&self, caller: Address, obfuscated_hash: Hash, overlay: Overlay) -> Result<()> {
        let block = self.clock.current_block();
        self.require_phase(block, Phase::Commit)?;
        if self.schedule.is_last_commit_block(block) {
            return Err(RedistributionError::CommitPhaseEnding);
        }
        let round = self.schedule.round_of(block);

        let owner = self.staking.owner_of_overlay(&overlay).await;
        if owner != Some(caller) {
            return Err(RedistributionError::NotOverlayOwner { overlay, caller });
        }
        let stake = self.staking.usable_stake_of_overlay(&overlay).await;
        if stake.is_zero() || stake < self.config.minimum_stake {
            return Err(RedistributionError::NoStake(overlay));
        }
        let last_updated = self
            .staking
            .last_updated_block_of_overlay(&overlay)
            .await
            .unwrap_or(block);
        let maturity = self
            .config
            .stake_maturity_rounds
            .saturating_mul(self.schedule.round_length());
        if last_updated.saturating_add(maturity) >= block {
            return Err(RedistributionError::StakeTooRecent {
                overlay,
                last_updated,
            });
        }

        let mut state = self.state.write().await;
        if state.paused {
            return Err(RedistributionError::Paused);
        }
        state.sync(round);
        if state.commit_round != Some(round) {
            state.commits.clear();
            state.commit_round = Some(round);
        }
        if state.commits.iter().any(|c| c.overlay == overlay) {
            return Err(RedistributionError::AlreadyCommitted(overlay));
        }

        state.commits.push(Commit {
            overlay,
            owner: caller,
            obfuscated_hash,
            stake,
            revealed: false,
        });
        let commit_count = state.commits.len();
        drop(state);

        self.events.emit(IncentiveEvent::Committed { round, overlay });

        info!(
            round,
            overlay = %overlay.short(),
            stake = %stake,
            commits = commit_count,
            block,
            "📝 Commit accepted"
        );
        Ok(())
    }

    /// Open a commitment made this round
    pub async fn reveal(&self, hash: Hash, depth: u8, nonce: Hash, overlay: Overlay) -> Result<()> {
        let block = self.clock.current_block();
        self.require_phase(block, Phase::Reveal)?;
        let round = self.schedule.round_of(block);

        let mut state = self.state.write().await;
        if state.paused {
            return Err(RedistributionError::Paused);
        }
        state.sync(round);
        if state.commit_round != Some(round) || state.commits.is_empty() {
            return Err(RedistributionError::NoCommits(round));
        }

        let anchor = if state.reveal_round == Some(round) {
            state.reveal_anchor
        } else {
            state.seed.anchor_for(round)
        };

        let obfuscated = wrap_commit(&hash, depth, &nonce, &overlay);
        let position = state
            .commits
            .iter()
            .position(|c| c.overlay == overlay)
            .ok_or(RedistributionError::HashMismatch(overlay))?;
        let commit = &state.commits[position];
        if commit.revealed {
            return Err(RedistributionError::AlreadyRevealed(overlay));
        }
        if commit.obfuscated_hash != obfuscated {
            return Err(RedistributionError::HashMismatch(overlay));
        }
        if !in_proximity(overlay.as_bytes(), &anchor, depth) {
            return Err(RedistributionError::OutOfDepth { overlay, depth });
        }

        let stake = commit.stake;
        let owner = commit.owner;
        let stake_density = stake_density(stake, depth);

        if state.reveal_round != Some(round) {
            state.reveals.clear();
            state.reveal_round = Some(round);
            state.reveal_anchor = anchor;
            debug!(round, anchor = %hex::encode(&anchor[..4]), "Reveal anchor fixed");
        }
        state.commits[position].revealed = true;
        state.reveals.push(Reveal {
            overlay,
            owner,
            hash,
            depth,
            stake,
            stake_density,
            nonce,
        });
        let reveal_count = state.reveals.len();
        drop(state);

        self.events.emit(IncentiveEvent::Revealed {
            round,
            overlay,
            stake,
            stake_density,
            reserve_commitment: hash,
            depth,
        });

        info!(
            round,
            overlay = %overlay.short(),
            depth,
            reveals = reveal_count,
            block,
            "🔓 Reveal accepted"
        );
        Ok(())
    }

    /// Select truth and winner for this round, verify the winner's sample
    /// proofs and pay out the pot
    pub async fn claim(&self, proofs: &ClaimProofs) -> Result<ClaimOutcome> {
        let block = self.clock.current_block();
        self.require_phase(block, Phase::Claim)?;
        let round = self.schedule.round_of(block);

        let mut state = self.state.write().await;
        if state.paused {
            return Err(RedistributionError::Paused);
        }
        state.sync(round);
        if state.last_claimed_round == Some(round) {
            return Err(RedistributionError::AlreadyClaimed(round));
        }
        if !state.has_reveals_in(round) {
            return Err(RedistributionError::NoReveals(round));
        }

        let randomness = state.randomness();
        let (truth, winner) =
            select_truth_and_winner(&state.reveals, &randomness).ok_or(RedistributionError::NoReveals(round))?;

        let ctx = ClaimContext {
            randomness,
            anchor: state.reveal_anchor,
            sample_hash: truth.hash,
            depth: winner.depth,
            sample_max_value: self.config.sample_max_value,
        };
        let mut batches = HashMap::new();
        for batch_id in proofs.batch_ids() {
            if let Some(batch) = self.ledger.batch(&batch_id).await {
                batches.insert(batch_id, batch);
            }
        }
        if let Err(e) = verify_claim_proofs(&ctx, proofs, &batches) {
            warn!(
                round,
                winner = %winner.overlay.short(),
                error = %e,
                "❌ Claim rejected"
            );
            return Err(e.into());
        }

        let selected = vec![
            IncentiveEvent::WinnerSelected {
                owner: winner.owner,
                overlay: winner.overlay,
            },
            IncentiveEvent::TruthSelected {
                owner: truth.owner,
                hash: truth.hash,
                depth: truth.depth,
            },
        ];
        let reward = self
            .ledger
            .withdraw_after(self.config.game_account, winner.owner, selected)
            .await?;

        state.seed = SeedState::new(randomness, round + 1);
        state.last_claimed_round = Some(round);
        state.commits.clear();
        state.reveals.clear();
        drop(state);

        info!(
            round,
            truth = %hex::encode(&truth.hash[..4]),
            winner = %winner.overlay.short(),
            reward = %reward,
            block,
            "🏆 Round claimed"
        );

        Ok(ClaimOutcome {
            round,
            truth,
            winner,
            reward,
            randomness,
        })
    }

    /// Randomness of the current round from the reveals so far. Final once
    /// the reveal phase is over.
    pub async fn current_round_randomness(&self) -> Result<Hash> {
        let round = self.current_round();
        let state = self.state.read().await;
        if !state.has_reveals_in(round) {
            return Err(RedistributionError::NoReveals(round));
        }
        Ok(state.randomness())
    }

    /// Truth and winner the current reveals would produce
    pub async fn preview_selection(&self) -> Result<(Reveal, Reveal)> {
        let round = self.current_round();
        let state = self.state.read().await;
        if !state.has_reveals_in(round) {
            return Err(RedistributionError::NoReveals(round));
        }
        select_truth_and_winner(&state.reveals, &state.randomness())
            .ok_or(RedistributionError::NoReveals(round))
    }

    /// Anchor reveals of the current round are checked against
    pub async fn current_round_anchor(&self) -> Hash {
        let round = self.current_round();
        let state = self.state.read().await;
        if state.has_reveals_in(round) {
            return state.reveal_anchor;
        }
        state.synced_seed(round).anchor_for(round)
    }

    /// Whether `overlay` at `depth` falls in the neighbourhood selected for
    /// the next round it can commit to. Undetermined during the reveal phase.
    pub async fn is_participating_in_upcoming_round(&self, overlay: &Overlay, depth: u8) -> Result<bool> {
        let block = self.clock.current_block();
        let round = self.schedule.round_of(block);
        let state = self.state.read().await;

        let anchor = match self.schedule.phase_of(block) {
            Phase::Reveal => return Err(RedistributionError::UpcomingRoundUndetermined),
            Phase::Commit => state.synced_seed(round).anchor_for(round),
            Phase::Claim if state.has_reveals_in(round) => state.randomness(),
            Phase::Claim => state.synced_seed(round).anchor_for(round + 1),
        };
        Ok(in_proximity(overlay.as_bytes(), &anchor, depth))
    }

    pub async fn current_commits(&self) -> Vec<Commit> {
        let round = self.current_round();
        let state = self.state.read().await;
        if state.commit_round == Some(round) {
            state.commits.clone()
        } else {
            Vec::new()
        }
    }

    pub async fn current_reveals(&self) -> Vec<Reveal> {
        let round = self.current_round();
        let state = self.state.read().await;
        if state.has_reveals_in(round) {
            state.reveals.clone()
        } else {
            Vec::new()
        }
    }

    pub async fn current_seed(&self) -> SeedState {
        let round = self.current_round();
        self.state.read().await.synced_seed(round)
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
            return Err(RedistributionError::Unauthorized {
                caller,
                role: Role::Pauser,
            });
        }
        self.state.write().await.paused = paused;

        let component = "redistribution".to_string();
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

        info!(caller = %caller.short(), paused, "Redistribution pause state changed");
        Ok(())
    }

    fn require_phase(&self, block: BlockHeight, expected: Phase) -> Result<()> {
        let actual = self.schedule.phase_of(block);
        if actual != expected {
            return Err(RedistributionError::WrongPhase { expected, actual });
        }
        Ok(())
    }
}

fn stake_density(stake: TokenAmount, depth: u8) -> u128 {
    if depth >= 128 {
        return if stake.is_zero() { 0 } else { u128::MAX };
    }
    stake.units().saturating_mul(1u128 << depth)
}

/// Stake-weighted truth over all reveals, then a stake-weighted winner
/// among the reveals agreeing with the truth
fn select_truth_and_winner(reveals: &[Reveal], randomness: &Hash) -> Option<(Reveal, Reveal)> {
    let mut sorted = reveals.to_vec();
    sorted.sort_by(|a, b| a.overlay.cmp(&b.overlay));

    let truth_anchor = compute_challenge(randomness, "truth", &[]);
    let truth = sorted[select_weighted(&sorted, |r| r.stake.units(), &truth_anchor)?].clone();

    let honest: Vec<&Reveal> = sorted.iter().filter(|r| r.hash == truth.hash).collect();
    let winner_anchor = compute_challenge(randomness, "winner", &[]);
    let winner = honest[select_weighted(&honest, |r| r.stake.units(), &winner_anchor)?].clone();

    Some((truth, winner))
}

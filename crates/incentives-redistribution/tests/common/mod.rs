#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use incentives_host::{EventBus, ManualClock, MemoryToken, Role, RoleRegistry};
use incentives_oracle::{OracleConfig, PriceOracle};
use incentives_postage::{LedgerConfig, PostageLedger};
use incentives_redistribution::{
    wrap_commit, Bmt, ClaimOutcome, GameConfig, Phase, PostageStamp, RedistributionGame,
    ReserveSample, Result, StampedChunk,
};
use incentives_staking::{StakeRegistry, StakingConfig};
use incentives_types::{bucket_of, hash_parts, Address, BatchId, Hash, Overlay, TokenAmount};
use std::collections::HashMap;
use std::sync::Arc;

pub const ADMIN: Address = Address::from_bytes([0xad; 32]);

pub struct World {
    pub clock: Arc<ManualClock>,
    pub token: Arc<MemoryToken>,
    pub roles: Arc<RoleRegistry>,
    pub events: EventBus,
    pub oracle: Arc<PriceOracle>,
    pub staking: Arc<StakeRegistry>,
    pub ledger: Arc<PostageLedger>,
    pub game: RedistributionGame,
}

/// Short rounds, no maturity wait, any sample size accepted
pub fn fast_config() -> GameConfig {
    GameConfig {
        phase_length: 4,
        round_length: 12,
        minimum_stake: TokenAmount::ZERO,
        stake_maturity_rounds: 0,
        genesis_seed: [0x5e; 32],
        sample_max_value: [0xff; 32],
        ..GameConfig::default()
    }
}

pub async fn world(config: GameConfig) -> World {
    let clock = Arc::new(ManualClock::new(0));
    let token = Arc::new(MemoryToken::new());
    let roles = Arc::new(RoleRegistry::new());
    let events = EventBus::new();

    for role in [Role::Admin, Role::Oracle, Role::Pauser] {
        roles.grant_role(role, ADMIN).await;
    }
    roles.grant_role(Role::Redistributor, config.game_account).await;

    let oracle = Arc::new(PriceOracle::new(
        OracleConfig::default(),
        clock.clone(),
        roles.clone(),
        events.clone(),
    ));
    let staking = Arc::new(StakeRegistry::new(
        StakingConfig::default(),
        token.clone(),
        roles.clone(),
        clock.clone(),
        events.clone(),
    ));
    let ledger = Arc::new(PostageLedger::new(
        LedgerConfig::default(),
        oracle.clone(),
        token.clone(),
        roles.clone(),
        clock.clone(),
        events.clone(),
    ));
    let game = RedistributionGame::new(
        config,
        staking.clone(),
        ledger.clone(),
        roles.clone(),
        clock.clone(),
        events.clone(),
    )
    .unwrap();

    World {
        clock,
        token,
        roles,
        events,
        oracle,
        staking,
        ledger,
        game,
    }
}

pub struct Participant {
    pub key: SigningKey,
    pub address: Address,
    pub overlay: Overlay,
}

impl Participant {
    pub fn nonce_for(&self, round: u64) -> Hash {
        hash_parts(&[self.overlay.as_bytes(), &round.to_be_bytes()])
    }
}

fn key_address(key: &SigningKey) -> Address {
    Address::from_bytes(key.verifying_key().to_bytes())
}

pub async fn staked_participant(world: &World, seed: u8, stake: u128) -> Participant {
    let key = SigningKey::from_bytes(&[seed; 32]);
    let address = key_address(&key);
    world
        .token
        .mint(address, TokenAmount::from_units(stake))
        .await
        .unwrap();
    let overlay = world
        .staking
        .deposit_stake(address, address, [seed; 32], TokenAmount::from_units(stake))
        .await
        .unwrap();
    Participant {
        key,
        address,
        overlay,
    }
}

/// Buy a batch and stamp `count` distinct chunks with it
pub async fn stamped_reserve(world: &World, publisher_seed: u8, count: usize) -> Vec<StampedChunk> {
    let publisher = SigningKey::from_bytes(&[publisher_seed; 32]);
    let owner = key_address(&publisher);
    let (depth, bucket_depth) = (16u8, 8u8);
    let balance_per_chunk: u128 = 10_000_000;

    world
        .token
        .mint(owner, TokenAmount::from_units(balance_per_chunk << depth))
        .await
        .unwrap();
    let batch_id: BatchId = world
        .ledger
        .create_batch(
            owner,
            owner,
            balance_per_chunk,
            depth,
            bucket_depth,
            [publisher_seed; 32],
            false,
        )
        .await
        .unwrap();

    let mut positions: HashMap<u32, u32> = HashMap::new();
    (0..count)
        .map(|i| {
            let data: Vec<u8> = (0..8u64)
                .flat_map(|j| {
                    hash_parts(&[
                        b"chunk",
                        &[publisher_seed],
                        &(i as u64).to_be_bytes(),
                        &j.to_be_bytes(),
                    ])
                })
                .collect();
            let address = Bmt::new(&data).unwrap().address();
            let bucket = bucket_of(address.as_bytes(), bucket_depth);
            let position = positions.entry(bucket).or_insert(0);
            let index = PostageStamp::pack_index(bucket, *position);
            *position += 1;
            let stamp = PostageStamp::sign(&publisher, &address, batch_id, index, i as u64);
            StampedChunk { data, stamp }
        })
        .collect()
}

/// Move the clock to the start of `phase` in `round`
pub fn enter(world: &World, round: u64, phase: Phase) {
    let block = world.game.schedule().phase_start(round, phase);
    world.clock.set(block);
}

/// Commit and reveal the sample of `reserve` at depth 0 for every participant
pub async fn commit_and_reveal(
    world: &World,
    round: u64,
    participants: &[&Participant],
    reserve: &[StampedChunk],
) -> ReserveSample {
    enter(world, round, Phase::Commit);
    let anchor = world.game.current_round_anchor().await;
    let sample = ReserveSample::build(reserve, &anchor, 0).unwrap();

    for p in participants {
        let obfuscated = wrap_commit(&sample.hash(), 0, &p.nonce_for(round), &p.overlay);
        world
            .game
            .commit(p.address, obfuscated, p.overlay)
            .await
            .unwrap();
    }

    enter(world, round, Phase::Reveal);
    for p in participants {
        world
            .game
            .reveal(sample.hash(), 0, p.nonce_for(round), p.overlay)
            .await
            .unwrap();
    }
    sample
}

/// Full round ending in a proof-carrying claim
pub async fn play_round(
    world: &World,
    round: u64,
    participants: &[&Participant],
    reserve: &[StampedChunk],
) -> Result<ClaimOutcome> {
    let sample = commit_and_reveal(world, round, participants, reserve).await;
    enter(world, round, Phase::Claim);
    let randomness = world.game.current_round_randomness().await?;
    let proofs = sample.claim_proofs(&randomness)?;
    world.game.claim(&proofs).await
}

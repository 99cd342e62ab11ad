mod common;

use common::*;
use incentives_host::{IncentiveEvent, Role, TokenLedger};
use incentives_postage::PostageError;
use incentives_redistribution::{
    wrap_commit, GameConfig, Phase, ProofError, RedistributionError, ReserveSample,
};
use incentives_types::{Address, ErrorKind, HasErrorKind, TokenAmount};

#[tokio::test]
async fn test_commit_outside_commit_phase() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;

    enter(&world, 1, Phase::Reveal);
    let err = world
        .game
        .commit(node.address, [1; 32], node.overlay)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RedistributionError::WrongPhase {
            expected: Phase::Commit,
            actual: Phase::Reveal
        }
    );
    assert_eq!(err.kind(), ErrorKind::WrongPhase);
}

#[tokio::test]
async fn test_commit_closed_in_last_commit_block() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;

    let last = world.game.schedule().phase_start(1, Phase::Reveal) - 1;
    world.clock.set(last);
    assert_eq!(world.game.current_phase(), Phase::Commit);

    let err = world
        .game
        .commit(node.address, [1; 32], node.overlay)
        .await
        .unwrap_err();
    assert_eq!(err, RedistributionError::CommitPhaseEnding);
}

#[tokio::test]
async fn test_commit_requires_overlay_owner() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let stranger = Address::from_bytes([0x77; 32]);

    enter(&world, 1, Phase::Commit);
    let err = world
        .game
        .commit(stranger, [1; 32], node.overlay)
        .await
        .unwrap_err();
    assert!(matches!(err, RedistributionError::NotOverlayOwner { .. }));
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn test_commit_requires_minimum_stake() {
    let config = GameConfig {
        minimum_stake: TokenAmount::from_units(5_000),
        ..fast_config()
    };
    let world = world(config).await;
    let small = staked_participant(&world, 1, 1_000).await;
    let large = staked_participant(&world, 2, 5_000).await;

    enter(&world, 1, Phase::Commit);
    let err = world
        .game
        .commit(small.address, [1; 32], small.overlay)
        .await
        .unwrap_err();
    assert_eq!(err, RedistributionError::NoStake(small.overlay));

    world
        .game
        .commit(large.address, [1; 32], large.overlay)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stake_must_mature() {
    let config = GameConfig {
        stake_maturity_rounds: 2,
        ..fast_config()
    };
    let world = world(config).await;
    let node = staked_participant(&world, 1, 1_000).await;

    for round in [1, 2] {
        enter(&world, round, Phase::Commit);
        let err = world
            .game
            .commit(node.address, [1; 32], node.overlay)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RedistributionError::StakeTooRecent { last_updated: 0, .. }
        ));
    }

    enter(&world, 3, Phase::Commit);
    world
        .game
        .commit(node.address, [1; 32], node.overlay)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_single_commit_per_round() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;

    enter(&world, 1, Phase::Commit);
    world
        .game
        .commit(node.address, [1; 32], node.overlay)
        .await
        .unwrap();
    let err = world
        .game
        .commit(node.address, [2; 32], node.overlay)
        .await
        .unwrap_err();
    assert_eq!(err, RedistributionError::AlreadyCommitted(node.overlay));

    // A new round starts with an empty commit list
    enter(&world, 2, Phase::Commit);
    assert!(world.game.current_commits().await.is_empty());
    world
        .game
        .commit(node.address, [2; 32], node.overlay)
        .await
        .unwrap();
    assert_eq!(world.game.current_commits().await.len(), 1);
}

#[tokio::test]
async fn test_reveal_without_commits() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;

    enter(&world, 1, Phase::Reveal);
    let err = world
        .game
        .reveal([1; 32], 0, node.nonce_for(1), node.overlay)
        .await
        .unwrap_err();
    assert_eq!(err, RedistributionError::NoCommits(1));
}

#[tokio::test]
async fn test_reveal_must_open_commit() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let other = staked_participant(&world, 2, 1_000).await;
    let hash = [0xab; 32];

    enter(&world, 1, Phase::Commit);
    let obfuscated = wrap_commit(&hash, 0, &node.nonce_for(1), &node.overlay);
    world
        .game
        .commit(node.address, obfuscated, node.overlay)
        .await
        .unwrap();

    enter(&world, 1, Phase::Reveal);
    let wrong_nonce = world
        .game
        .reveal(hash, 0, other.nonce_for(1), node.overlay)
        .await
        .unwrap_err();
    assert_eq!(wrong_nonce, RedistributionError::HashMismatch(node.overlay));

    let uncommitted = world
        .game
        .reveal(hash, 0, other.nonce_for(1), other.overlay)
        .await
        .unwrap_err();
    assert_eq!(uncommitted, RedistributionError::HashMismatch(other.overlay));

    world
        .game
        .reveal(hash, 0, node.nonce_for(1), node.overlay)
        .await
        .unwrap();
    let again = world
        .game
        .reveal(hash, 0, node.nonce_for(1), node.overlay)
        .await
        .unwrap_err();
    assert_eq!(again, RedistributionError::AlreadyRevealed(node.overlay));

    let reveals = world.game.current_reveals().await;
    assert_eq!(reveals.len(), 1);
    assert_eq!(reveals[0].stake, TokenAmount::from_units(1_000));
    assert_eq!(reveals[0].stake_density, 1_000);
}

#[tokio::test]
async fn test_reveal_out_of_depth() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let hash = [0xab; 32];
    let depth = 200;

    enter(&world, 1, Phase::Commit);
    let obfuscated = wrap_commit(&hash, depth, &node.nonce_for(1), &node.overlay);
    world
        .game
        .commit(node.address, obfuscated, node.overlay)
        .await
        .unwrap();

    enter(&world, 1, Phase::Reveal);
    let err = world
        .game
        .reveal(hash, depth, node.nonce_for(1), node.overlay)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        RedistributionError::OutOfDepth {
            overlay: node.overlay,
            depth
        }
    );
    assert_eq!(err.kind(), ErrorKind::ProofMismatch);
    assert!(world.game.current_reveals().await.is_empty());
}

#[tokio::test]
async fn test_reveal_outside_reveal_phase() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let hash = [0xab; 32];

    enter(&world, 1, Phase::Commit);
    let obfuscated = wrap_commit(&hash, 0, &node.nonce_for(1), &node.overlay);
    world
        .game
        .commit(node.address, obfuscated, node.overlay)
        .await
        .unwrap();

    for phase in [Phase::Commit, Phase::Claim] {
        enter(&world, 1, phase);
        let err = world
            .game
            .reveal(hash, 0, node.nonce_for(1), node.overlay)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RedistributionError::WrongPhase {
                expected: Phase::Reveal,
                actual: phase
            }
        );
        assert_eq!(err.kind(), ErrorKind::WrongPhase);
    }
    assert!(world.game.current_reveals().await.is_empty());
}

#[tokio::test]
async fn test_claim_outside_claim_phase() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let reserve = stamped_reserve(&world, 9, 20).await;
    let sample = commit_and_reveal(&world, 1, &[&node], &reserve).await;
    let randomness = world.game.current_round_randomness().await.unwrap();
    let proofs = sample.claim_proofs(&randomness).unwrap();

    for phase in [Phase::Commit, Phase::Reveal] {
        enter(&world, 1, phase);
        let err = world.game.claim(&proofs).await.unwrap_err();
        assert_eq!(
            err,
            RedistributionError::WrongPhase {
                expected: Phase::Claim,
                actual: phase
            }
        );
        assert_eq!(err.kind(), ErrorKind::WrongPhase);
    }
}

#[tokio::test]
async fn test_claim_pays_pot_to_winner() {
    let world = world(fast_config()).await;
    let a = staked_participant(&world, 1, 1_000).await;
    let b = staked_participant(&world, 2, 3_000).await;
    let reserve = stamped_reserve(&world, 9, 20).await;

    let sample = commit_and_reveal(&world, 1, &[&a, &b], &reserve).await;
    enter(&world, 1, Phase::Claim);

    let (truth, winner) = world.game.preview_selection().await.unwrap();
    let randomness = world.game.current_round_randomness().await.unwrap();
    let proofs = sample.claim_proofs(&randomness).unwrap();

    let pot = world.ledger.total_pot().await;
    assert!(!pot.is_zero());

    let outcome = world.game.claim(&proofs).await.unwrap();
    assert_eq!(outcome.round, 1);
    assert_eq!(outcome.truth, truth);
    assert_eq!(outcome.winner, winner);
    assert_eq!(outcome.randomness, randomness);
    assert_eq!(outcome.reward, pot);
    assert_eq!(outcome.truth.hash, sample.hash());

    assert_eq!(world.token.balance_of(outcome.winner.owner).await, pot);
    assert!(world.ledger.total_pot().await.is_zero());

    let err = world.game.claim(&proofs).await.unwrap_err();
    assert_eq!(err, RedistributionError::AlreadyClaimed(1));
}

#[tokio::test]
async fn test_tampered_proof_rejected() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let reserve = stamped_reserve(&world, 9, 20).await;

    let sample = commit_and_reveal(&world, 1, &[&node], &reserve).await;
    enter(&world, 1, Phase::Claim);
    let randomness = world.game.current_round_randomness().await.unwrap();
    let proofs = sample.claim_proofs(&randomness).unwrap();

    let mut tampered = proofs.clone();
    tampered.first.data_segment[0] ^= 1;
    let err = world.game.claim(&tampered).await.unwrap_err();
    assert_eq!(
        err,
        RedistributionError::Proof(ProofError::ChunkMismatch { witness: 0 })
    );
    assert_eq!(err.kind(), ErrorKind::ProofMismatch);

    // Rejection leaves the round claimable
    let outcome = world.game.claim(&proofs).await.unwrap();
    assert_eq!(outcome.winner.overlay, node.overlay);
}

#[tokio::test]
async fn test_claim_without_reveals() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let reserve = stamped_reserve(&world, 9, 20).await;
    let proofs = ReserveSample::build(&reserve, &[0; 32], 0)
        .unwrap()
        .claim_proofs(&[1; 32])
        .unwrap();

    enter(&world, 1, Phase::Commit);
    world
        .game
        .commit(node.address, [1; 32], node.overlay)
        .await
        .unwrap();

    enter(&world, 1, Phase::Claim);
    let err = world.game.claim(&proofs).await.unwrap_err();
    assert_eq!(err, RedistributionError::NoReveals(1));
    assert!(world.game.current_round_randomness().await.is_err());
}

#[tokio::test]
async fn test_seed_rolls_over_after_claim() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let reserve = stamped_reserve(&world, 9, 20).await;

    let outcome = play_round(&world, 1, &[&node], &reserve).await.unwrap();

    enter(&world, 2, Phase::Commit);
    let seed = world.game.current_seed().await;
    assert_eq!(seed.seed, outcome.randomness);
    assert_eq!(seed.seed_round, 2);
    assert_eq!(world.game.current_round_anchor().await, outcome.randomness);
}

#[tokio::test]
async fn test_seed_rolls_over_without_claim() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let reserve = stamped_reserve(&world, 9, 20).await;

    commit_and_reveal(&world, 1, &[&node], &reserve).await;
    enter(&world, 1, Phase::Claim);
    let randomness = world.game.current_round_randomness().await.unwrap();

    // Nobody claims round 1; round 3 still derives from its randomness
    enter(&world, 3, Phase::Commit);
    let seed = world.game.current_seed().await;
    assert_eq!(seed.seed, randomness);
    assert_eq!(seed.seed_round, 2);
    assert_eq!(world.game.current_round_anchor().await, seed.anchor_for(3));
    assert_ne!(world.game.current_round_anchor().await, randomness);

    // The next round can be played against the rolled anchor
    let outcome = play_round(&world, 3, &[&node], &reserve).await.unwrap();
    assert_eq!(outcome.round, 3);
}

#[tokio::test]
async fn test_seed_unchanged_by_empty_rounds() {
    let world = world(fast_config()).await;
    let genesis = world.game.current_seed().await;
    assert_eq!(genesis.seed, [0x5e; 32]);
    assert_eq!(genesis.seed_round, 0);

    enter(&world, 5, Phase::Claim);
    assert_eq!(world.game.current_seed().await, genesis);
    assert_eq!(world.game.current_round_anchor().await, genesis.anchor_for(5));
}

#[tokio::test]
async fn test_participation_check() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;

    enter(&world, 1, Phase::Commit);
    assert!(world
        .game
        .is_participating_in_upcoming_round(&node.overlay, 0)
        .await
        .unwrap());

    enter(&world, 1, Phase::Reveal);
    let err = world
        .game
        .is_participating_in_upcoming_round(&node.overlay, 0)
        .await
        .unwrap_err();
    assert_eq!(err, RedistributionError::UpcomingRoundUndetermined);

    enter(&world, 1, Phase::Claim);
    assert!(world
        .game
        .is_participating_in_upcoming_round(&node.overlay, 0)
        .await
        .unwrap());
}

#[tokio::test]
async fn test_round_emits_events() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let reserve = stamped_reserve(&world, 9, 20).await;
    let mut rx = world.events.subscribe();

    let outcome = play_round(&world, 1, &[&node], &reserve).await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let IncentiveEvent::WinnerSelected { overlay, .. } = &event {
            assert_eq!(*overlay, node.overlay);
        }
        if let IncentiveEvent::PotWithdrawn { amount, .. } = &event {
            assert_eq!(*amount, outcome.reward);
        }
        kinds.push(event.event_type());
    }
    assert_eq!(
        kinds,
        vec![
            "round.commit",
            "round.reveal",
            "round.winner",
            "round.truth",
            "pot.withdrawn"
        ]
    );
}

#[tokio::test]
async fn test_failed_payout_emits_nothing() {
    let config = fast_config();
    let game_account = config.game_account;
    let world = world(config).await;
    let node = staked_participant(&world, 1, 1_000).await;
    let reserve = stamped_reserve(&world, 9, 20).await;

    let sample = commit_and_reveal(&world, 1, &[&node], &reserve).await;
    enter(&world, 1, Phase::Claim);
    let randomness = world.game.current_round_randomness().await.unwrap();
    let proofs = sample.claim_proofs(&randomness).unwrap();

    world
        .roles
        .revoke_role(Role::Redistributor, &game_account)
        .await;
    let mut rx = world.events.subscribe();
    let err = world.game.claim(&proofs).await.unwrap_err();
    assert!(matches!(
        err,
        RedistributionError::Withdraw(PostageError::Unauthorized { .. })
    ));
    assert!(rx.try_recv().is_err());
    assert_eq!(world.game.current_reveals().await.len(), 1);

    world.roles.grant_role(Role::Redistributor, game_account).await;
    let outcome = world.game.claim(&proofs).await.unwrap();
    assert_eq!(outcome.winner.overlay, node.overlay);

    let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|event| event.event_type())
        .collect();
    assert_eq!(kinds, vec!["round.winner", "round.truth", "pot.withdrawn"]);
}

#[tokio::test]
async fn test_pause_blocks_game() {
    let world = world(fast_config()).await;
    let node = staked_participant(&world, 1, 1_000).await;

    let err = world.game.pause(node.address).await.unwrap_err();
    assert!(matches!(err, RedistributionError::Unauthorized { .. }));

    world.game.pause(ADMIN).await.unwrap();
    assert!(world.game.is_paused().await);

    enter(&world, 1, Phase::Commit);
    let err = world
        .game
        .commit(node.address, [1; 32], node.overlay)
        .await
        .unwrap_err();
    assert_eq!(err, RedistributionError::Paused);

    world.game.unpause(ADMIN).await.unwrap();
    world
        .game
        .commit(node.address, [1; 32], node.overlay)
        .await
        .unwrap();
}

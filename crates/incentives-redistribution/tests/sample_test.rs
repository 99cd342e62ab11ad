mod common;

use common::*;
use incentives_postage::Batch;
use incentives_redistribution::{
    verify_claim_proofs, ClaimContext, ProofError, ReserveSample, WitnessIndices, SAMPLE_SIZE,
};
use incentives_types::{in_proximity, Address, BatchId, Hash};
use std::collections::HashMap;

const ANCHOR: Hash = [0x3c; 32];
const RANDOMNESS: Hash = [0x91; 32];

struct Fixture {
    sample: ReserveSample,
    ctx: ClaimContext,
    batches: HashMap<BatchId, Batch>,
}

async fn fixture(chunks: usize) -> Fixture {
    let world = world(fast_config()).await;
    let reserve = stamped_reserve(&world, 4, chunks).await;
    let batch_id = reserve[0].stamp.batch_id;

    let sample = ReserveSample::build(&reserve, &ANCHOR, 0).unwrap();
    let ctx = ClaimContext {
        randomness: RANDOMNESS,
        anchor: ANCHOR,
        sample_hash: sample.hash(),
        depth: 0,
        sample_max_value: [0xff; 32],
    };
    let mut batches = HashMap::new();
    batches.insert(batch_id, world.ledger.batch(&batch_id).await.unwrap());

    Fixture {
        sample,
        ctx,
        batches,
    }
}

#[tokio::test]
async fn test_sample_keeps_smallest_transformed_addresses() {
    let f = fixture(40).await;
    let entries = f.sample.entries();
    assert_eq!(entries.len(), SAMPLE_SIZE);
    assert!(entries.windows(2).all(|w| w[0].transformed < w[1].transformed));
    assert_eq!(f.sample.anchor(), &ANCHOR);
    assert_eq!(f.sample.depth(), 0);
}

#[tokio::test]
async fn test_sample_respects_depth() {
    let world = world(fast_config()).await;
    let reserve = stamped_reserve(&world, 4, 200).await;

    let sample = ReserveSample::build(&reserve, &ANCHOR, 2).unwrap();
    for entry in sample.entries() {
        assert!(in_proximity(entry.address.as_bytes(), &ANCHOR, 2));
    }
}

#[tokio::test]
async fn test_small_reserve_cannot_sample() {
    let world = world(fast_config()).await;
    let reserve = stamped_reserve(&world, 4, 10).await;

    let err = ReserveSample::build(&reserve, &ANCHOR, 0).err().unwrap();
    assert_eq!(
        err,
        ProofError::InsufficientSample {
            required: SAMPLE_SIZE,
            found: 10
        }
    );
}

#[tokio::test]
async fn test_honest_proofs_verify() {
    let f = fixture(20).await;
    let proofs = f.sample.claim_proofs(&RANDOMNESS).unwrap();

    let indices = WitnessIndices::from_randomness(&RANDOMNESS);
    assert_eq!(
        proofs.first.chunk_address,
        f.sample.entries()[indices.first].address
    );
    assert_eq!(proofs.last.chunk_address, f.sample.entries()[15].address);

    verify_claim_proofs(&f.ctx, &proofs, &f.batches).unwrap();
}

#[tokio::test]
async fn test_foreign_sample_rejected() {
    let f = fixture(20).await;
    let proofs = f.sample.claim_proofs(&RANDOMNESS).unwrap();

    let ctx = ClaimContext {
        sample_hash: [0x01; 32],
        ..f.ctx
    };
    let err = verify_claim_proofs(&ctx, &proofs, &f.batches).unwrap_err();
    assert_eq!(err, ProofError::SampleMismatch { witness: 0 });
}

#[tokio::test]
async fn test_witness_outside_neighbourhood_rejected() {
    let f = fixture(20).await;
    let proofs = f.sample.claim_proofs(&RANDOMNESS).unwrap();

    let ctx = ClaimContext { depth: 64, ..f.ctx };
    let err = verify_claim_proofs(&ctx, &proofs, &f.batches).unwrap_err();
    assert_eq!(err, ProofError::WitnessOutOfDepth { witness: 0 });
}

#[tokio::test]
async fn test_tampered_segments_rejected() {
    let f = fixture(20).await;
    let proofs = f.sample.claim_proofs(&RANDOMNESS).unwrap();

    let mut bad_data = proofs.clone();
    bad_data.second.data_segment[31] ^= 0x80;
    assert_eq!(
        verify_claim_proofs(&f.ctx, &bad_data, &f.batches).unwrap_err(),
        ProofError::ChunkMismatch { witness: 1 }
    );

    let mut bad_transformed = proofs.clone();
    bad_transformed.last.transformed_proof[1][0] ^= 1;
    assert_eq!(
        verify_claim_proofs(&f.ctx, &bad_transformed, &f.batches).unwrap_err(),
        ProofError::TransformedMismatch { witness: 2 }
    );

    let mut short = proofs;
    short.first.original_proof.pop();
    assert!(matches!(
        verify_claim_proofs(&f.ctx, &short, &f.batches).unwrap_err(),
        ProofError::WrongProofLength { .. }
    ));
}

#[tokio::test]
async fn test_stamp_checked_against_batch() {
    let f = fixture(20).await;
    let proofs = f.sample.claim_proofs(&RANDOMNESS).unwrap();
    let batch_id = proofs.first.stamp.batch_id;

    let err = verify_claim_proofs(&f.ctx, &proofs, &HashMap::new()).unwrap_err();
    assert_eq!(err, ProofError::UnknownBatch(batch_id));

    let mut sold = f.batches.clone();
    if let Some(batch) = sold.get_mut(&batch_id) {
        batch.owner = Address::from_bytes([0x42; 32]);
    }
    let err = verify_claim_proofs(&f.ctx, &proofs, &sold).unwrap_err();
    assert_eq!(err, ProofError::SignerNotOwner(batch_id));

    let mut forged = proofs.clone();
    forged.first.stamp.timestamp += 1;
    let err = verify_claim_proofs(&f.ctx, &forged, &f.batches).unwrap_err();
    assert_eq!(err, ProofError::InvalidSignature(batch_id));
}

#[tokio::test]
async fn test_undersized_reserve_estimate_rejected() {
    let f = fixture(20).await;
    let proofs = f.sample.claim_proofs(&RANDOMNESS).unwrap();

    let ctx = ClaimContext {
        sample_max_value: [0; 32],
        ..f.ctx
    };
    assert_eq!(
        verify_claim_proofs(&ctx, &proofs, &f.batches).unwrap_err(),
        ProofError::ReserveTooSmall
    );
}

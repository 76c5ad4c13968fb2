use std::path::Path;

use anyhow::{Result, bail};
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vouch_store::BlockStore;
use vouch_types::{BilateralBlock, BlockHash, PublicKey};

/// Running ledger state for one generated identity.
struct SideState {
    key: SigningKey,
    next_seq: i64,
    total_up: u64,
    total_down: u64,
    prev_hash: BlockHash,
}

impl SideState {
    fn new(key: SigningKey) -> Self {
        Self {
            key,
            next_seq: 0,
            total_up: 0,
            total_down: 0,
            prev_hash: BlockHash::zeroed(),
        }
    }

    fn public_key(&self) -> PublicKey {
        PublicKey::new(self.key.verifying_key().to_bytes())
    }
}

pub async fn handle(db: &Path, agents: usize, blocks: usize, seed: u64) -> Result<()> {
    if agents < 2 {
        bail!("Need at least two agents, got {agents}");
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut population: Vec<SideState> = (0..agents)
        .map(|_| {
            let mut secret = [0u8; 32];
            rng.fill(&mut secret);
            SideState::new(SigningKey::from_bytes(&secret))
        })
        .collect();

    let store = BlockStore::open(db)?;
    for _ in 0..blocks {
        let requester = rng.gen_range(0..agents);
        let responder = loop {
            let candidate = rng.gen_range(0..agents);
            if candidate != requester {
                break candidate;
            }
        };
        let up: u64 = rng.gen_range(1..=100);
        let down: u64 = rng.gen_range(1..=100);
        let record = next_record(&mut population, requester, responder, up, down);
        store.insert(&record)?;
    }

    println!(
        "Seeded {agents} agents, {blocks} blocks into {} (seed {seed})",
        db.display()
    );
    Ok(())
}

/// Build one signed bilateral record and advance both sides' ledger state.
fn next_record(
    population: &mut [SideState],
    requester: usize,
    responder: usize,
    up: u64,
    down: u64,
) -> BilateralBlock {
    let (req_pk, req_seq, req_prev, req_up, req_down) = {
        let side = &population[requester];
        (
            side.public_key(),
            side.next_seq,
            side.prev_hash,
            side.total_up + up,
            side.total_down + down,
        )
    };
    let (res_pk, res_seq, res_prev, res_up, res_down) = {
        let side = &population[responder];
        (
            side.public_key(),
            side.next_seq,
            side.prev_hash,
            side.total_up + down,
            side.total_down + up,
        )
    };

    let hash_requester =
        BilateralBlock::side_hash(&req_pk, req_seq, &req_prev, up, req_up, req_down);
    let hash_responder =
        BilateralBlock::side_hash(&res_pk, res_seq, &res_prev, down, res_up, res_down);
    let signature_requester = population[requester]
        .key
        .sign(hash_requester.as_bytes())
        .to_bytes()
        .to_vec();
    let signature_responder = population[responder]
        .key
        .sign(hash_responder.as_bytes())
        .to_bytes()
        .to_vec();

    let record = BilateralBlock {
        public_key_requester: req_pk,
        public_key_responder: res_pk,
        up,
        down,
        total_up_requester: req_up,
        total_down_requester: req_down,
        sequence_number_requester: req_seq,
        previous_hash_requester: req_prev,
        signature_requester,
        hash_requester,
        total_up_responder: res_up,
        total_down_responder: res_down,
        sequence_number_responder: res_seq,
        previous_hash_responder: res_prev,
        signature_responder,
        hash_responder,
        insert_time: Utc::now(),
    };

    let side = &mut population[requester];
    side.next_seq += 1;
    side.total_up = req_up;
    side.total_down = req_down;
    side.prev_hash = hash_requester;
    let side = &mut population[responder];
    side.next_seq += 1;
    side.total_up = res_up;
    side.total_down = res_down;
    side.prev_hash = hash_responder;

    record
}

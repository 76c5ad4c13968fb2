use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::identity::{BlockHash, PublicKey};

/// Sequence number of a half-block whose owner side has not been finalized.
///
/// A bilateral record starts out with only the requester side filled in; the
/// responder side carries this sentinel until the counterparty signs off.
pub const UNLINKED_SEQUENCE: i64 = -1;

/// One side of a bilateral interaction record.
///
/// A `HalfBlock` is owned by exactly one identity and describes the
/// interaction from that identity's point of view: `contribution` is what
/// the owner put in, `net_contribution` is contribution minus what the
/// counterparty put in. The mirrored half held by the counterparty has the
/// roles swapped, so the two halves always satisfy
/// `net_a == -net_b` and `contribution_a - net_a == contribution_b`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfBlock {
    pub contribution: u64,
    pub net_contribution: i64,
    pub public_key: PublicKey,
    pub sequence_number: i64,
    pub link_public_key: PublicKey,
    pub link_sequence_number: i64,
    pub previous_hash: BlockHash,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl HalfBlock {
    /// Split a bilateral record into its two one-sided halves:
    /// `(requester_half, responder_half)`.
    pub fn split(record: &BilateralBlock) -> (HalfBlock, HalfBlock) {
        let up = record.up as i64;
        let down = record.down as i64;
        let requester = HalfBlock {
            contribution: record.up,
            net_contribution: up - down,
            public_key: record.public_key_requester,
            sequence_number: record.sequence_number_requester,
            link_public_key: record.public_key_responder,
            link_sequence_number: record.sequence_number_responder,
            previous_hash: record.previous_hash_requester,
            signature: record.signature_requester.clone(),
        };
        let responder = HalfBlock {
            contribution: record.down,
            net_contribution: down - up,
            public_key: record.public_key_responder,
            sequence_number: record.sequence_number_responder,
            link_public_key: record.public_key_requester,
            link_sequence_number: record.sequence_number_requester,
            previous_hash: record.previous_hash_responder,
            signature: record.signature_responder.clone(),
        };
        (requester, responder)
    }

    /// The structural identity used for deduplication.
    pub fn id(&self) -> BlockId {
        BlockId {
            owner: self.public_key,
            sequence_number: self.sequence_number,
            link: self.link_public_key,
        }
    }

    /// Whether the owner side has a finalized position in its chain.
    pub fn is_linked(&self) -> bool {
        self.sequence_number != UNLINKED_SEQUENCE
    }
}

impl fmt::Display for HalfBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: @{} {:+} -> @{}",
            self.sequence_number, self.public_key, self.net_contribution, self.link_public_key
        )
    }
}

/// Structural key of a half-block: owner, position, counterparty.
///
/// Two half-blocks with the same `BlockId` describe the same side of the
/// same interaction; collections keyed by `BlockId` are therefore
/// duplicate-free under replays and re-deliveries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockId {
    pub owner: PublicKey,
    pub sequence_number: i64,
    pub link: PublicKey,
}

/// A full bilateral interaction record, as agreed by both parties.
///
/// This is the persisted form: both sides' chain positions, running totals,
/// previous-hash links and signatures, plus the per-side content hashes.
/// `up` is the amount the requester contributed, `down` the amount the
/// responder contributed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BilateralBlock {
    pub public_key_requester: PublicKey,
    pub public_key_responder: PublicKey,
    pub up: u64,
    pub down: u64,
    pub total_up_requester: u64,
    pub total_down_requester: u64,
    pub sequence_number_requester: i64,
    pub previous_hash_requester: BlockHash,
    #[serde(with = "base64_bytes")]
    pub signature_requester: Vec<u8>,
    pub hash_requester: BlockHash,
    pub total_up_responder: u64,
    pub total_down_responder: u64,
    pub sequence_number_responder: i64,
    pub previous_hash_responder: BlockHash,
    #[serde(with = "base64_bytes")]
    pub signature_responder: Vec<u8>,
    pub hash_responder: BlockHash,
    pub insert_time: DateTime<Utc>,
}

impl BilateralBlock {
    /// Content hash of one side of a record.
    pub fn side_hash(
        public_key: &PublicKey,
        sequence_number: i64,
        previous_hash: &BlockHash,
        contribution: u64,
        total_up: u64,
        total_down: u64,
    ) -> BlockHash {
        let mut hasher = Sha256::new();
        hasher.update(public_key.as_bytes());
        hasher.update(sequence_number.to_be_bytes());
        hasher.update(previous_hash.as_bytes());
        hasher.update(contribution.to_be_bytes());
        hasher.update(total_up.to_be_bytes());
        hasher.update(total_down.to_be_bytes());
        BlockHash::new(hasher.finalize().into())
    }

    /// Fill in both per-side content hashes from the other fields.
    pub fn seal(mut self) -> Self {
        self.hash_requester = Self::side_hash(
            &self.public_key_requester,
            self.sequence_number_requester,
            &self.previous_hash_requester,
            self.up,
            self.total_up_requester,
            self.total_down_requester,
        );
        self.hash_responder = Self::side_hash(
            &self.public_key_responder,
            self.sequence_number_responder,
            &self.previous_hash_responder,
            self.down,
            self.total_up_responder,
            self.total_down_responder,
        );
        self
    }
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        BASE64.decode(s).map_err(serde::de::Error::custom)
    }
}

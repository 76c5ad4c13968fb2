use serde::{Deserialize, Serialize};
use vouch_types::{Chain, HalfBlock, PublicKey};

/// Payload of a protocol message.
///
/// A pairwise audit is a fixed four-step exchange: the initiator opens with
/// its full known-block set, the responder merges and answers with its own
/// full set, then each side sends the score it computed for the other.
/// Chain requests are the propagation side channel used to pull ledgers
/// from further away.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MessageKind {
    /// Audit step 1: the initiator's full known-block set.
    PaBlocks { blocks: Vec<HalfBlock> },
    /// Audit step 2: the responder's full known-block set.
    PaBlocksReply { blocks: Vec<HalfBlock> },
    /// Audit step 3: the initiator's score for the responder.
    PaScore { score: f64 },
    /// Audit step 4, terminal: the responder's score for the initiator.
    PaScoreReply { score: f64 },
    /// Ask an agent for its personal chain.
    ChainRequest,
    /// The requested personal chain.
    ChainReply { chain: Chain },
}

impl MessageKind {
    /// Stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::PaBlocks { .. } => "pa_blocks",
            MessageKind::PaBlocksReply { .. } => "pa_blocks_reply",
            MessageKind::PaScore { .. } => "pa_score",
            MessageKind::PaScoreReply { .. } => "pa_score_reply",
            MessageKind::ChainRequest => "chain_request",
            MessageKind::ChainReply { .. } => "chain_reply",
        }
    }
}

/// A payload tagged with the identity that produced it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub sender: PublicKey,
    pub kind: MessageKind,
}

impl Message {
    pub fn new(sender: PublicKey, kind: MessageKind) -> Self {
        Self { sender, kind }
    }
}

/// A message addressed for delivery.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub to: PublicKey,
    pub message: Message,
}

impl Envelope {
    pub fn new(to: PublicKey, message: Message) -> Self {
        Self { to, message }
    }
}

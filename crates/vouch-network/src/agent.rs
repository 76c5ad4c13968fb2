use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use vouch_ranking::{RankConfig, temporal_page_rank};
use vouch_types::{
    Chain, Endorsement, HalfBlock, InteractionSet, PublicKey, Result, VouchError,
};

use crate::message::{Envelope, Message, MessageKind};

/// A participant in the reputation network.
///
/// An agent owns a personal [`Chain`] of its half-blocks, an
/// [`InteractionSet`] of everything it has learned about anyone, the
/// endorsements it has issued, and an append-only log of inbound messages.
/// All protocol handling happens in [`Agent::receive`]; handlers reply by
/// returning envelopes, never by mutating other agents.
#[derive(Debug)]
pub struct Agent {
    public_key: PublicKey,
    chain: Chain,
    interactions: InteractionSet,
    endorsements: Vec<Endorsement>,
    messages: Vec<Message>,
}

impl Agent {
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            chain: Chain::new(),
            interactions: InteractionSet::new(),
            endorsements: Vec::new(),
            messages: Vec::new(),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn interactions(&self) -> &InteractionSet {
        &self.interactions
    }

    pub fn endorsements(&self) -> &[Endorsement] {
        &self.endorsements
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Fold one half-block into this agent's knowledge. Only blocks the
    /// agent itself owns join its personal chain.
    pub fn add_transaction(&mut self, block: HalfBlock) {
        if block.public_key == self.public_key {
            self.chain.add(block.clone());
        }
        self.interactions.add_block(block);
    }

    /// Every identity this agent has seen on either side of a block.
    pub fn known_agents(&self) -> HashSet<PublicKey> {
        self.interactions.list_public_keys()
    }

    /// Whether this agent has already endorsed `subject`.
    pub fn endorsed(&self, subject: &PublicKey) -> bool {
        self.endorsements.iter().any(|e| e.subject == *subject)
    }

    /// Fail unless the personal chain is an unbroken run.
    pub fn ensure_complete_chain(&self) -> Result<()> {
        if self.chain.is_complete() {
            Ok(())
        } else {
            Err(VouchError::IncompleteChain {
                public_key: self.public_key,
                length: self.chain.len(),
            })
        }
    }

    /// Temporal PageRank over everything this agent knows, from its own
    /// point of view.
    pub fn calculate_ranking(&self, config: &RankConfig) -> HashMap<PublicKey, f64> {
        temporal_page_rank(&self.public_key, self.interactions.iter(), config)
    }

    /// The score this agent assigns to one identity, or −1 when the
    /// identity is absent from the computed ranking.
    pub fn calculate_score(&self, subject: &PublicKey, config: &RankConfig) -> f64 {
        self.calculate_ranking(config)
            .get(subject)
            .copied()
            .unwrap_or(-1.0)
    }

    /// Counterparties of `identity`, as witnessed by this agent's known
    /// blocks, in sorted order.
    fn counterparties_of(&self, identity: &PublicKey) -> Vec<PublicKey> {
        let mut partners = self.interactions.chain_of(identity).partner_agents();
        partners.sort();
        partners
    }

    /// The nearest counterparty this agent has not yet endorsed.
    ///
    /// Walks ring by ring over chain-derived counterparties, at most
    /// `max_hops` rings out. Candidates in each ring are visited in sorted
    /// order, so the choice is deterministic. Returns `None` when every
    /// reachable identity is already endorsed.
    pub fn get_next_audit_partner(&self, max_hops: usize) -> Option<PublicKey> {
        let mut visited: HashSet<PublicKey> = HashSet::new();
        visited.insert(self.public_key);
        let mut frontier: Vec<PublicKey> = self
            .counterparties_of(&self.public_key)
            .into_iter()
            .filter(|k| *k != self.public_key)
            .collect();

        for _ in 0..max_hops {
            if frontier.is_empty() {
                return None;
            }
            if let Some(partner) = frontier.iter().copied().find(|k| !self.endorsed(k)) {
                return Some(partner);
            }
            visited.extend(frontier.iter().copied());
            let mut next: Vec<PublicKey> = Vec::new();
            for hop in &frontier {
                for partner in self.counterparties_of(hop) {
                    if !visited.contains(&partner) && !next.contains(&partner) {
                        next.push(partner);
                    }
                }
            }
            next.sort();
            frontier = next;
        }
        None
    }

    /// Open a pairwise audit with `responder`, or with the nearest
    /// unaudited counterparty when none is named.
    pub fn initiate_pairwise_auditing(
        &self,
        responder: Option<PublicKey>,
        max_hops: usize,
    ) -> Result<Envelope> {
        let responder = responder
            .or_else(|| self.get_next_audit_partner(max_hops))
            .ok_or(VouchError::NoAuditPartner { max_hops })?;
        debug!(initiator = %self.public_key, responder = %responder, "starting pairwise audit");
        Ok(self.reply(
            responder,
            MessageKind::PaBlocks {
                blocks: self.interactions.get_blocks(),
            },
        ))
    }

    /// Handle one inbound message and produce any replies.
    pub fn receive(&mut self, message: Message, ranking: &RankConfig) -> Vec<Envelope> {
        let sender = message.sender;
        debug!(
            agent = %self.public_key,
            from = %sender,
            kind = message.kind.name(),
            "message received"
        );
        self.messages.push(message.clone());

        match message.kind {
            MessageKind::PaBlocks { blocks } => {
                self.interactions.add_blocks(blocks);
                vec![self.reply(
                    sender,
                    MessageKind::PaBlocksReply {
                        blocks: self.interactions.get_blocks(),
                    },
                )]
            }
            MessageKind::PaBlocksReply { blocks } => {
                self.interactions.add_blocks(blocks);
                self.endorsements.push(Endorsement::new(self.public_key, sender));
                let score = self.calculate_score(&sender, ranking);
                vec![self.reply(sender, MessageKind::PaScore { score })]
            }
            MessageKind::PaScore { score } => {
                self.endorsements.push(Endorsement::new(self.public_key, sender));
                let own = self.calculate_score(&sender, ranking);
                debug!(
                    agent = %self.public_key,
                    subject = %sender,
                    theirs = score,
                    ours = own,
                    "audit scores exchanged"
                );
                vec![self.reply(sender, MessageKind::PaScoreReply { score: own })]
            }
            MessageKind::PaScoreReply { score } => {
                debug!(agent = %self.public_key, subject = %sender, score, "audit finished");
                Vec::new()
            }
            MessageKind::ChainRequest => {
                vec![self.reply(
                    sender,
                    MessageKind::ChainReply {
                        chain: self.chain.clone(),
                    },
                )]
            }
            MessageKind::ChainReply { chain } => {
                self.interactions.add_blocks(Vec::<HalfBlock>::from(chain));
                Vec::new()
            }
        }
    }

    fn reply(&self, to: PublicKey, kind: MessageKind) -> Envelope {
        Envelope::new(to, Message::new(self.public_key, kind))
    }

    /// Presentation view: identity, chain aggregates, known blocks and the
    /// one- and two-hop neighborhoods.
    pub fn summary(&self) -> AgentSummary {
        let neighbors = self.counterparties_of(&self.public_key);
        let mut second: Vec<PublicKey> = Vec::new();
        for neighbor in &neighbors {
            for partner in self.counterparties_of(neighbor) {
                if partner != self.public_key
                    && !neighbors.contains(&partner)
                    && !second.contains(&partner)
                {
                    second.push(partner);
                }
            }
        }
        second.sort();

        AgentSummary {
            public_key: self.public_key.to_hex(),
            public_key_base64: self.public_key.to_base64(),
            chain_length: self.chain.len(),
            up: self.chain.up(),
            down: self.chain.down(),
            net_contribution: self.chain.net_contribution(),
            blocks: self.interactions.get_blocks(),
            neighbors: neighbors.iter().map(PublicKey::to_hex).collect(),
            second_neighbors: second.iter().map(PublicKey::to_hex).collect(),
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent: @{}", self.public_key.short())
    }
}

/// JSON-friendly snapshot of one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub public_key: String,
    pub public_key_base64: String,
    pub chain_length: usize,
    pub up: u64,
    pub down: i64,
    pub net_contribution: i64,
    pub blocks: Vec<HalfBlock>,
    pub neighbors: Vec<String>,
    pub second_neighbors: Vec<String>,
}

#[cfg(test)]
mod tests {
    use vouch_types::identity::BlockHash;

    use super::*;

    fn key(fill: u8) -> PublicKey {
        PublicKey::new([fill; 32])
    }

    fn half_block(owner: u8, seq: i64, link: u8, c: u64, net: i64) -> HalfBlock {
        HalfBlock {
            contribution: c,
            net_contribution: net,
            public_key: key(owner),
            sequence_number: seq,
            link_public_key: key(link),
            link_sequence_number: 0,
            previous_hash: BlockHash::zeroed(),
            signature: Vec::new(),
        }
    }

    fn config() -> RankConfig {
        RankConfig::default()
    }

    #[test]
    fn test_new_agent_is_empty() {
        let agent = Agent::new(key(1));
        assert!(agent.chain().is_empty());
        assert!(agent.interactions().is_empty());
        assert!(agent.endorsements().is_empty());
        assert!(agent.messages().is_empty());
    }

    #[test]
    fn test_add_transaction_updates_chain_and_interactions() {
        let mut agent = Agent::new(key(1));
        agent.add_transaction(half_block(1, 0, 2, 10, 6));
        assert_eq!(agent.chain().len(), 1);
        assert_eq!(agent.interactions().len(), 1);
        assert_eq!(agent.chain().up(), 10);
    }

    #[test]
    fn test_foreign_half_block_never_joins_the_chain() {
        let mut agent = Agent::new(key(1));
        agent.add_transaction(half_block(1, 0, 2, 1, 0));
        agent.add_transaction(half_block(1, 2, 3, 1, 0));
        assert!(agent.ensure_complete_chain().is_err());

        // A block owned by key(2) must not fill the gap at position 1.
        agent.add_transaction(half_block(2, 1, 1, 1, 0));
        assert_eq!(agent.chain().len(), 2);
        assert_eq!(agent.interactions().len(), 3);
        assert!(agent.ensure_complete_chain().is_err());
    }

    #[test]
    fn test_ensure_complete_chain() {
        let mut agent = Agent::new(key(1));
        agent.add_transaction(half_block(1, 0, 2, 1, 0));
        assert!(agent.ensure_complete_chain().is_ok());

        agent.add_transaction(half_block(1, 2, 3, 1, 0));
        let err = agent.ensure_complete_chain().unwrap_err();
        assert!(matches!(err, VouchError::IncompleteChain { length: 2, .. }));
    }

    #[test]
    fn test_score_for_unknown_identity_is_sentinel() {
        let mut agent = Agent::new(key(1));
        agent.add_transaction(half_block(1, 0, 2, 5, 0));
        assert!(agent.calculate_score(&key(2), &config()) >= 0.0);
        assert_eq!(agent.calculate_score(&key(9), &config()), -1.0);
    }

    #[test]
    fn test_next_partner_prefers_nearest_unaudited() {
        let mut agent = Agent::new(key(1));
        agent.add_transaction(half_block(1, 0, 3, 1, 0));
        agent.add_transaction(half_block(1, 1, 2, 1, 0));
        // Sorted order puts key(2) before key(3).
        assert_eq!(agent.get_next_audit_partner(1), Some(key(2)));
    }

    #[test]
    fn test_next_partner_skips_endorsed_and_walks_outward() {
        let mut agent = Agent::new(key(1));
        agent.add_transaction(half_block(1, 0, 2, 1, 0));
        // Learn that key(2) interacted with key(3).
        agent.receive(
            Message::new(
                key(2),
                MessageKind::PaBlocks {
                    blocks: vec![half_block(2, 0, 3, 1, 0)],
                },
            ),
            &config(),
        );
        agent.endorsements.push(Endorsement::new(key(1), key(2)));

        assert_eq!(agent.get_next_audit_partner(1), None);
        assert_eq!(agent.get_next_audit_partner(2), Some(key(3)));
    }

    #[test]
    fn test_initiate_with_no_partner_is_an_error() {
        let agent = Agent::new(key(1));
        let err = agent.initiate_pairwise_auditing(None, 3).unwrap_err();
        assert!(matches!(err, VouchError::NoAuditPartner { max_hops: 3 }));
    }

    #[test]
    fn test_initiate_carries_full_block_set() {
        let mut agent = Agent::new(key(1));
        agent.add_transaction(half_block(1, 0, 2, 5, 0));
        let envelope = agent.initiate_pairwise_auditing(Some(key(2)), 1).unwrap();
        assert_eq!(envelope.to, key(2));
        match envelope.message.kind {
            MessageKind::PaBlocks { blocks } => assert_eq!(blocks.len(), 1),
            other => panic!("expected PaBlocks, got {}", other.name()),
        }
    }

    #[test]
    fn test_receive_pa_blocks_merges_and_replies_with_own_set() {
        let mut agent = Agent::new(key(1));
        agent.add_transaction(half_block(1, 0, 2, 5, 0));
        let replies = agent.receive(
            Message::new(
                key(2),
                MessageKind::PaBlocks {
                    blocks: vec![half_block(2, 0, 1, 3, 0)],
                },
            ),
            &config(),
        );
        assert_eq!(agent.interactions().len(), 2);
        assert_eq!(replies.len(), 1);
        match &replies[0].message.kind {
            MessageKind::PaBlocksReply { blocks } => assert_eq!(blocks.len(), 2),
            other => panic!("expected PaBlocksReply, got {}", other.name()),
        }
    }

    #[test]
    fn test_receive_logs_every_message() {
        let mut agent = Agent::new(key(1));
        agent.receive(Message::new(key(2), MessageKind::ChainRequest), &config());
        agent.receive(
            Message::new(key(3), MessageKind::PaScoreReply { score: 0.1 }),
            &config(),
        );
        assert_eq!(agent.messages().len(), 2);
    }

    #[test]
    fn test_chain_request_returns_chain_not_interactions() {
        let mut agent = Agent::new(key(1));
        agent.add_transaction(half_block(1, 0, 2, 5, 0));
        // A foreign block lands in the interaction set only.
        agent.receive(
            Message::new(
                key(2),
                MessageKind::PaBlocks {
                    blocks: vec![half_block(2, 0, 1, 3, 0)],
                },
            ),
            &config(),
        );
        let replies = agent.receive(Message::new(key(9), MessageKind::ChainRequest), &config());
        match &replies[0].message.kind {
            MessageKind::ChainReply { chain } => assert_eq!(chain.len(), 1),
            other => panic!("expected ChainReply, got {}", other.name()),
        }
    }

    #[test]
    fn test_summary_lists_two_hop_neighborhood() {
        let mut agent = Agent::new(key(1));
        agent.add_transaction(half_block(1, 0, 2, 5, 0));
        agent.receive(
            Message::new(
                key(2),
                MessageKind::PaBlocks {
                    blocks: vec![half_block(2, 0, 3, 1, 0)],
                },
            ),
            &config(),
        );
        let summary = agent.summary();
        assert_eq!(summary.chain_length, 1);
        assert_eq!(summary.neighbors, vec![key(2).to_hex()]);
        assert_eq!(summary.second_neighbors, vec![key(3).to_hex()]);
        assert_eq!(summary.blocks.len(), 2);
    }
}

use std::collections::BTreeMap;

use petgraph::graph::DiGraph;
use tracing::{debug, info, warn};
use vouch_ranking::RankConfig;
use vouch_store::BlockStore;
use vouch_types::{
    BilateralBlock, HalfBlock, InteractionSet, PublicKey, Result, VouchError,
};

use crate::agent::Agent;
use crate::interface::NetworkInterface;
use crate::message::{Envelope, Message, MessageKind};

/// Result of resolving a partial identifier to an agent.
#[derive(Debug)]
pub enum AgentLookup<'a> {
    /// Nothing matched.
    NotFound,
    /// Exactly one agent matched.
    Found(&'a Agent),
    /// The identifier is a substring of several identities.
    Ambiguous(Vec<&'a Agent>),
}

/// Outcome of a ledger scan. Scans report; they never remove data.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CleanupReport {
    pub complete: usize,
    pub incomplete: Vec<PublicKey>,
    pub blocks_scanned: usize,
}

/// The whole simulated network: agents, their shared history, and the
/// delivery queue connecting them.
///
/// Agents are stored in a sorted map so every bulk operation visits them
/// in the same order on every run.
#[derive(Debug)]
pub struct Network {
    agents: BTreeMap<PublicKey, Agent>,
    interactions: InteractionSet,
    interface: NetworkInterface,
    rank_config: RankConfig,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self::with_config(RankConfig::default())
    }

    pub fn with_config(rank_config: RankConfig) -> Self {
        Self {
            agents: BTreeMap::new(),
            interactions: InteractionSet::new(),
            interface: NetworkInterface::new(),
            rank_config,
        }
    }

    /// Rebuild a network by replaying bilateral records in order.
    pub fn from_blocks(blocks: impl IntoIterator<Item = BilateralBlock>) -> Self {
        let mut network = Self::new();
        network.replay(blocks);
        network
    }

    /// Replay everything the store holds.
    pub fn from_store(store: &BlockStore) -> Result<Self> {
        Self::from_store_with_config(store, RankConfig::default())
    }

    /// Replay everything the store holds, ranking with `rank_config`.
    pub fn from_store_with_config(store: &BlockStore, rank_config: RankConfig) -> Result<Self> {
        let blocks = store
            .get_all()
            .map_err(|e| VouchError::Store(e.to_string()))?;
        let mut network = Self::with_config(rank_config);
        network.replay(blocks);
        info!(
            agents = network.agent_count(),
            blocks = network.interactions.len(),
            "network replayed from store"
        );
        Ok(network)
    }

    pub fn replay(&mut self, blocks: impl IntoIterator<Item = BilateralBlock>) {
        for block in blocks {
            self.add_interaction(&block);
        }
    }

    /// Split one bilateral record and hand each half to its owner,
    /// registering the owners as agents if needed.
    pub fn add_interaction(&mut self, record: &BilateralBlock) {
        let (requester_half, responder_half) = HalfBlock::split(record);
        self.interactions.add_block(requester_half.clone());
        self.interactions.add_block(responder_half.clone());
        self.agents
            .entry(record.public_key_requester)
            .or_insert_with(|| Agent::new(record.public_key_requester))
            .add_transaction(requester_half);
        self.agents
            .entry(record.public_key_responder)
            .or_insert_with(|| Agent::new(record.public_key_responder))
            .add_transaction(responder_half);
    }

    /// Register an agent. Re-registering is a warned no-op.
    pub fn add_agent(&mut self, public_key: PublicKey) -> bool {
        if self.agents.contains_key(&public_key) {
            warn!(agent = %public_key, "agent already registered");
            return false;
        }
        self.agents.insert(public_key, Agent::new(public_key));
        true
    }

    pub fn get_agent(&self, public_key: &PublicKey) -> Option<&Agent> {
        self.agents.get(public_key)
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// All registered identities, sorted.
    pub fn list_agents(&self) -> Vec<PublicKey> {
        self.agents.keys().copied().collect()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    /// Resolve a partial hex or base64 identifier.
    pub fn find_agent(&self, query: &str) -> AgentLookup<'_> {
        let matches: Vec<&Agent> = self
            .agents
            .values()
            .filter(|agent| {
                let key = agent.public_key();
                key.to_hex().contains(query) || key.to_base64().contains(query)
            })
            .collect();
        match matches.len() {
            0 => AgentLookup::NotFound,
            1 => AgentLookup::Found(matches[0]),
            _ => AgentLookup::Ambiguous(matches),
        }
    }

    pub fn interactions(&self) -> &InteractionSet {
        &self.interactions
    }

    pub fn rank_config(&self) -> &RankConfig {
        &self.rank_config
    }

    /// Directed graph over the global interaction history.
    pub fn interaction_graph(&self) -> DiGraph<String, u64> {
        self.interactions.build_graph()
    }

    /// Run one pairwise audit initiated by `requester` and return the
    /// audited counterparty.
    ///
    /// With no responder named, the requester picks its nearest unaudited
    /// counterparty within `max_hops`. The exchange is driven to completion
    /// before returning.
    pub fn pairwise_audit(
        &mut self,
        requester: &PublicKey,
        responder: Option<&PublicKey>,
        max_hops: usize,
    ) -> Result<PublicKey> {
        if let Some(responder) = responder {
            if !self.agents.contains_key(responder) {
                return Err(VouchError::UnknownAgent(*responder));
            }
        }
        let envelope = self
            .agents
            .get(requester)
            .ok_or(VouchError::UnknownAgent(*requester))?
            .initiate_pairwise_auditing(responder.copied(), max_hops)?;
        let audited = envelope.to;
        self.interface.post(envelope);
        self.dispatch_until_idle();
        Ok(audited)
    }

    /// Let one agent pull chains from ever further away.
    ///
    /// Each round asks every currently known identity for its chain; the
    /// replies widen the next round's audience by one ring.
    pub fn obtain_data_from_hops(&mut self, agent: &PublicKey, hops: usize) -> Result<()> {
        for _ in 0..hops {
            let requester = self
                .agents
                .get(agent)
                .ok_or(VouchError::UnknownAgent(*agent))?;
            let sender = requester.public_key();
            let mut targets: Vec<PublicKey> = requester
                .known_agents()
                .into_iter()
                .filter(|k| k != agent)
                .collect();
            targets.sort();
            for target in targets {
                self.interface
                    .post(Envelope::new(target, Message::new(sender, MessageKind::ChainRequest)));
            }
            self.dispatch_until_idle();
        }
        Ok(())
    }

    /// Grow every agent's knowledge out to `hops` rings.
    pub fn increase_data_to_hops(&mut self, hops: usize) -> Result<()> {
        for key in self.list_agents() {
            self.obtain_data_from_hops(&key, hops)?;
        }
        Ok(())
    }

    /// Check every agent's chain for gaps.
    pub fn clean_data(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        for agent in self.agents.values() {
            report.blocks_scanned += agent.chain().len();
            if agent.chain().is_complete() {
                report.complete += 1;
            } else {
                debug!(agent = %agent.public_key(), "incomplete chain\n{}", agent.chain());
                report.incomplete.push(agent.public_key());
            }
        }
        info!(
            complete = report.complete,
            incomplete = report.incomplete.len(),
            blocks = report.blocks_scanned,
            "ledger scan finished"
        );
        report
    }

    /// Deliver queued messages until no agent has anything left to say.
    fn dispatch_until_idle(&mut self) {
        while let Some(envelope) = self.interface.take_next() {
            match self.agents.get_mut(&envelope.to) {
                Some(agent) => {
                    let outgoing = agent.receive(envelope.message, &self.rank_config);
                    self.interface.post_all(outgoing);
                }
                None => {
                    warn!(to = %envelope.to, "dropping message for unknown agent");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use proptest::prelude::*;
    use vouch_types::BlockHash;

    use super::*;

    fn key(fill: u8) -> PublicKey {
        PublicKey::new([fill; 32])
    }

    fn record(requester: u8, req_seq: i64, responder: u8, res_seq: i64, up: u64, down: u64) -> BilateralBlock {
        BilateralBlock {
            public_key_requester: key(requester),
            public_key_responder: key(responder),
            up,
            down,
            total_up_requester: up,
            total_down_requester: down,
            sequence_number_requester: req_seq,
            previous_hash_requester: BlockHash::zeroed(),
            signature_requester: vec![1; 64],
            hash_requester: BlockHash::zeroed(),
            total_up_responder: down,
            total_down_responder: up,
            sequence_number_responder: res_seq,
            previous_hash_responder: BlockHash::zeroed(),
            signature_responder: vec![2; 64],
            hash_responder: BlockHash::zeroed(),
            insert_time: Utc::now(),
        }
        .seal()
    }

    #[test]
    fn test_add_interaction_splits_between_owners() {
        let network = Network::from_blocks(vec![record(1, 0, 2, 0, 10, 4)]);
        assert_eq!(network.agent_count(), 2);

        let requester = network.get_agent(&key(1)).unwrap();
        assert_eq!(requester.chain().len(), 1);
        assert_eq!(requester.chain().up(), 10);
        assert_eq!(requester.chain().down(), 4);
        assert_eq!(requester.chain().net_contribution(), 6);

        let responder = network.get_agent(&key(2)).unwrap();
        assert_eq!(responder.chain().up(), 4);
        assert_eq!(responder.chain().net_contribution(), -6);
    }

    #[test]
    fn test_add_agent_twice_is_a_noop() {
        let mut network = Network::new();
        assert!(network.add_agent(key(1)));
        assert!(!network.add_agent(key(1)));
        assert_eq!(network.agent_count(), 1);
    }

    #[test]
    fn test_list_agents_is_sorted() {
        let mut network = Network::new();
        network.add_agent(key(9));
        network.add_agent(key(1));
        network.add_agent(key(5));
        assert_eq!(network.list_agents(), vec![key(1), key(5), key(9)]);
    }

    #[test]
    fn test_find_agent() {
        let mut network = Network::new();
        network.add_agent(key(0x01));
        network.add_agent(key(0x10));

        assert!(matches!(network.find_agent("ff"), AgentLookup::NotFound));
        // "01" occurs in both 0101..01 and 1010..10.
        assert!(matches!(
            network.find_agent("01"),
            AgentLookup::Ambiguous(ref agents) if agents.len() == 2
        ));
        match network.find_agent(&key(0x01).to_hex()) {
            AgentLookup::Found(agent) => assert_eq!(agent.public_key(), key(0x01)),
            other => panic!("expected Found, got {other:?}"),
        }
    }

    #[test]
    fn test_pairwise_audit_requires_known_agents() {
        let mut network = Network::new();
        network.add_agent(key(1));
        let err = network.pairwise_audit(&key(9), None, 1).unwrap_err();
        assert!(matches!(err, VouchError::UnknownAgent(_)));

        let err = network
            .pairwise_audit(&key(1), Some(&key(9)), 1)
            .unwrap_err();
        assert!(matches!(err, VouchError::UnknownAgent(_)));
    }

    #[test]
    fn test_pairwise_audit_exchanges_full_state() {
        let mut network = Network::from_blocks(vec![
            record(1, 0, 2, 0, 10, 4),
            record(2, 1, 3, 0, 5, 5),
        ]);
        // Before the audit, agent 1 has never seen block 2<->3.
        assert_eq!(network.get_agent(&key(1)).unwrap().interactions().len(), 1);

        let audited = network.pairwise_audit(&key(1), Some(&key(2)), 1).unwrap();
        assert_eq!(audited, key(2));

        let one = network.get_agent(&key(1)).unwrap();
        let two = network.get_agent(&key(2)).unwrap();
        // Both ends now hold the union of what either knew.
        assert_eq!(one.interactions().len(), 3);
        assert_eq!(two.interactions().len(), 3);
        assert!(one.endorsed(&key(2)));
        assert!(two.endorsed(&key(1)));
        // Initiator saw reply and score; responder saw opening and score.
        assert_eq!(one.messages().len(), 2);
        assert_eq!(two.messages().len(), 2);
    }

    #[test]
    fn test_audit_partner_search_is_bounded() {
        let mut network = Network::from_blocks(vec![record(1, 0, 2, 0, 1, 1)]);
        network.pairwise_audit(&key(1), None, 2).unwrap();
        assert!(network.get_agent(&key(1)).unwrap().endorsed(&key(2)));

        // Everyone reachable is audited now.
        let err = network.pairwise_audit(&key(1), None, 2).unwrap_err();
        assert!(matches!(err, VouchError::NoAuditPartner { max_hops: 2 }));
    }

    #[test]
    fn test_obtain_data_walks_outward_ring_by_ring() {
        // Line topology: 1 - 2 - 3 - 4.
        let mut network = Network::from_blocks(vec![
            record(1, 0, 2, 0, 1, 1),
            record(2, 1, 3, 0, 1, 1),
            record(3, 1, 4, 0, 1, 1),
        ]);
        let known = network.get_agent(&key(1)).unwrap().known_agents();
        assert_eq!(known.len(), 2, "starts knowing itself and its neighbor");

        network.obtain_data_from_hops(&key(1), 1).unwrap();
        let known = network.get_agent(&key(1)).unwrap().known_agents();
        assert!(known.contains(&key(3)), "one hop reveals the neighbor's partner");
        assert!(!known.contains(&key(4)));

        network.obtain_data_from_hops(&key(1), 1).unwrap();
        let known = network.get_agent(&key(1)).unwrap().known_agents();
        assert!(known.contains(&key(4)), "second round reaches the far end");
    }

    #[test]
    fn test_increase_data_covers_every_agent() {
        let mut network = Network::from_blocks(vec![
            record(1, 0, 2, 0, 1, 1),
            record(2, 1, 3, 0, 1, 1),
            record(3, 1, 4, 0, 1, 1),
        ]);
        network.increase_data_to_hops(2).unwrap();
        for agent in network.agents() {
            assert_eq!(
                agent.known_agents().len(),
                4,
                "agent @{} should know the whole line",
                agent.public_key()
            );
        }
    }

    #[test]
    fn test_clean_data_reports_gaps() {
        let mut network = Network::from_blocks(vec![
            record(1, 0, 2, 0, 1, 1),
            record(1, 1, 3, 0, 1, 1),
        ]);
        // Agent 4 joins with a chain that starts at position 5.
        network.add_interaction(&record(4, 5, 2, 1, 1, 1));

        let report = network.clean_data();
        assert_eq!(report.complete, 3);
        assert_eq!(report.incomplete, vec![key(4)]);
        assert_eq!(report.blocks_scanned, 2 + 2 + 1 + 1);
    }

    #[test]
    fn test_from_store_round_trip() {
        let store = vouch_store::BlockStore::open_in_memory().unwrap();
        store.insert(&record(1, 0, 2, 0, 10, 4)).unwrap();
        store.insert(&record(2, 1, 3, 0, 3, 3)).unwrap();

        let network = Network::from_store(&store).unwrap();
        assert_eq!(network.agent_count(), 3);
        assert_eq!(network.interactions().len(), 4);
        assert_eq!(network.get_agent(&key(2)).unwrap().chain().len(), 2);
    }

    #[test]
    fn test_unroutable_message_is_dropped() {
        let mut network = Network::new();
        network.add_agent(key(1));
        network.interface.post(Envelope::new(
            key(9),
            Message::new(key(1), MessageKind::ChainRequest),
        ));
        network.dispatch_until_idle();
        assert!(network.interface.is_idle());
    }

    proptest! {
        #[test]
        fn prop_split_halves_mirror_each_other(up in 0u64..10_000, down in 0u64..10_000) {
            let network = Network::from_blocks(vec![record(1, 0, 2, 0, up, down)]);
            let requester = network.get_agent(&key(1)).unwrap();
            let responder = network.get_agent(&key(2)).unwrap();
            prop_assert_eq!(requester.chain().up(), up);
            prop_assert_eq!(requester.chain().down(), down as i64);
            prop_assert_eq!(responder.chain().up(), down);
            prop_assert_eq!(
                requester.chain().net_contribution(),
                -responder.chain().net_contribution()
            );
            prop_assert_eq!(network.interactions().len(), 2);
        }
    }
}

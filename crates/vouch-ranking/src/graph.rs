use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use vouch_types::{HalfBlock, PublicKey};

/// A node in the temporal graph: one identity at one chain position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TemporalNode {
    pub identity: PublicKey,
    pub position: i64,
}

/// Time-expanded interaction graph.
///
/// Every half-block contributes four weighted edges:
///
/// * owner position to the owner's next position, weighted by what the
///   owner contributed,
/// * owner position to the counterparty's next position, weighted by what
///   the owner received,
/// * and the two mirrored edges starting from the counterparty's position.
///
/// Weights are additive, so replays of the same interaction from both
/// halves scale every edge uniformly and leave the walk distribution
/// unchanged.
#[derive(Debug, Default)]
pub struct TemporalGraph {
    graph: DiGraph<TemporalNode, f64>,
    indices: HashMap<TemporalNode, NodeIndex>,
}

impl TemporalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_blocks<'a>(blocks: impl IntoIterator<Item = &'a HalfBlock>) -> Self {
        let mut graph = Self::new();
        for block in blocks {
            graph.add_interaction(block);
        }
        graph
    }

    /// Add the four edges derived from one half-block.
    pub fn add_interaction(&mut self, block: &HalfBlock) {
        let owner_now = self.node(block.public_key, block.sequence_number);
        let owner_next = self.node(block.public_key, block.sequence_number + 1);
        let partner_now = self.node(block.link_public_key, block.link_sequence_number);
        let partner_next = self.node(block.link_public_key, block.link_sequence_number + 1);

        let given = block.contribution as f64;
        let received = block.contribution as f64 - block.net_contribution as f64;

        self.accumulate(owner_now, owner_next, given);
        self.accumulate(owner_now, partner_next, received);
        self.accumulate(partner_now, partner_next, received);
        self.accumulate(partner_now, owner_next, given);
    }

    fn node(&mut self, identity: PublicKey, position: i64) -> NodeIndex {
        let node = TemporalNode { identity, position };
        *self
            .indices
            .entry(node)
            .or_insert_with(|| self.graph.add_node(node))
    }

    fn accumulate(&mut self, from: NodeIndex, to: NodeIndex, weight: f64) {
        match self.graph.find_edge(from, to) {
            Some(edge) => {
                if let Some(existing) = self.graph.edge_weight_mut(edge) {
                    *existing += weight;
                }
            }
            None => {
                self.graph.add_edge(from, to, weight);
            }
        }
    }

    pub fn inner(&self) -> &DiGraph<TemporalNode, f64> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Number of temporal nodes belonging to one identity.
    pub fn positions_of(&self, identity: &PublicKey) -> usize {
        self.indices.keys().filter(|n| n.identity == *identity).count()
    }
}

#[cfg(test)]
mod tests {
    use vouch_types::identity::BlockHash;

    use super::*;

    fn key(fill: u8) -> PublicKey {
        PublicKey::new([fill; 32])
    }

    fn half_block(owner: u8, seq: i64, link: u8, link_seq: i64, c: u64, net: i64) -> HalfBlock {
        HalfBlock {
            contribution: c,
            net_contribution: net,
            public_key: key(owner),
            sequence_number: seq,
            link_public_key: key(link),
            link_sequence_number: link_seq,
            previous_hash: BlockHash::zeroed(),
            signature: Vec::new(),
        }
    }

    #[test]
    fn test_one_block_yields_four_nodes_and_edges() {
        let block = half_block(1, 0, 2, 0, 10, 6);
        let graph = TemporalGraph::from_blocks([&block]);
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.positions_of(&key(1)), 2);
        assert_eq!(graph.positions_of(&key(2)), 2);
    }

    #[test]
    fn test_mirrored_halves_double_every_weight() {
        let a = half_block(1, 0, 2, 0, 10, 6);
        let b = half_block(2, 0, 1, 0, 4, -6);
        let single = TemporalGraph::from_blocks([&a]);
        let both = TemporalGraph::from_blocks([&a, &b]);
        assert_eq!(both.node_count(), single.node_count());
        assert_eq!(both.edge_count(), single.edge_count());
        let sum_single: f64 = single.inner().edge_weights().sum();
        let sum_both: f64 = both.inner().edge_weights().sum();
        assert!((sum_both - 2.0 * sum_single).abs() < f64::EPSILON);
    }

    #[test]
    fn test_consecutive_blocks_share_positions() {
        let first = half_block(1, 0, 2, 0, 5, 0);
        let second = half_block(1, 1, 3, 0, 5, 0);
        let graph = TemporalGraph::from_blocks([&first, &second]);
        // (1,1) is both the successor of (1,0) and the start of the
        // second interaction, so it must not be duplicated.
        assert_eq!(graph.positions_of(&key(1)), 3);
    }
}

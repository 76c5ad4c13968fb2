use std::collections::{HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};

use crate::block::{BlockId, HalfBlock};
use crate::chain::Chain;
use crate::identity::PublicKey;

/// Everything an agent (or the network) knows about past interactions.
///
/// Blocks are keyed by their structural [`BlockId`], so adding the same
/// half-block twice is a no-op and unions of two sets never produce
/// duplicates. The set only ever grows.
#[derive(Clone, Debug, Default)]
pub struct InteractionSet {
    blocks: HashMap<BlockId, HalfBlock>,
}

impl InteractionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one half-block. Re-adding a known block changes nothing.
    pub fn add_block(&mut self, block: HalfBlock) {
        self.blocks.entry(block.id()).or_insert(block);
    }

    pub fn add_blocks(&mut self, blocks: impl IntoIterator<Item = HalfBlock>) {
        for block in blocks {
            self.add_block(block);
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HalfBlock> {
        self.blocks.values()
    }

    /// All known blocks, sorted by owner, position and counterparty.
    pub fn get_blocks(&self) -> Vec<HalfBlock> {
        let mut blocks: Vec<HalfBlock> = self.blocks.values().cloned().collect();
        blocks.sort_by_key(|b| (b.public_key, b.sequence_number, b.link_public_key));
        blocks
    }

    /// Identities appearing on either side of any known block.
    pub fn list_public_keys(&self) -> HashSet<PublicKey> {
        self.blocks
            .values()
            .flat_map(|b| [b.public_key, b.link_public_key])
            .collect()
    }

    /// A throwaway chain view over one identity's known blocks.
    pub fn chain_of(&self, identity: &PublicKey) -> Chain {
        Chain::from_blocks(
            self.blocks
                .values()
                .filter(|b| b.public_key == *identity)
                .cloned(),
        )
    }

    /// Total contribution this set can attest for an identity.
    pub fn known_contribution(&self, identity: &PublicKey) -> u64 {
        self.chain_of(identity).up()
    }

    /// Look up a block by owner and sequence number.
    pub fn get_block(&self, identity: &PublicKey, sequence_number: i64) -> Option<&HalfBlock> {
        self.blocks
            .values()
            .find(|b| b.public_key == *identity && b.sequence_number == sequence_number)
    }

    /// Directed interaction graph: one node per identity, one edge per
    /// (owner, counterparty) pair carrying the summed contribution.
    ///
    /// Nodes are labeled with a ten-character hex prefix of the identity.
    /// Blocks are visited in sorted order so the output is deterministic.
    pub fn build_graph(&self) -> DiGraph<String, u64> {
        let mut graph = DiGraph::new();
        let mut indices: HashMap<PublicKey, NodeIndex> = HashMap::new();
        let mut ordered: Vec<&HalfBlock> = self.blocks.values().collect();
        ordered.sort_by_key(|b| (b.public_key, b.sequence_number, b.link_public_key));
        for block in ordered {
            let from = Self::node_for(&mut graph, &mut indices, &block.public_key);
            let to = Self::node_for(&mut graph, &mut indices, &block.link_public_key);
            match graph.find_edge(from, to) {
                Some(edge) => {
                    if let Some(weight) = graph.edge_weight_mut(edge) {
                        *weight += block.contribution;
                    }
                }
                None => {
                    graph.add_edge(from, to, block.contribution);
                }
            }
        }
        graph
    }

    fn node_for(
        graph: &mut DiGraph<String, u64>,
        indices: &mut HashMap<PublicKey, NodeIndex>,
        identity: &PublicKey,
    ) -> NodeIndex {
        *indices
            .entry(*identity)
            .or_insert_with(|| graph.add_node(identity.to_hex()[..10].to_string()))
    }
}

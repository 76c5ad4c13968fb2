use std::collections::HashMap;

use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use vouch_types::{HalfBlock, PublicKey};

use crate::graph::TemporalGraph;

/// Tuning knobs for the personalized power iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankConfig {
    /// Probability of following an edge instead of teleporting home.
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Upper bound on power-iteration rounds.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Convergence threshold on the L1 delta, scaled by node count.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_damping() -> f64 {
    0.85
}

fn default_max_iterations() -> usize {
    100
}

fn default_tolerance() -> f64 {
    1e-6
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            damping: default_damping(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

/// Temporal PageRank from one identity's point of view.
///
/// Builds the time-expanded graph over `blocks`, runs a power iteration
/// whose teleport vector is spread uniformly over the perspective
/// identity's own positions, and folds the per-position scores back into
/// one score per identity. Dangling mass is redistributed through the same
/// teleport vector, so the scores always sum to one.
///
/// Returns an empty map when there are no blocks, or when the perspective
/// identity does not appear in them.
pub fn temporal_page_rank<'a>(
    perspective: &PublicKey,
    blocks: impl IntoIterator<Item = &'a HalfBlock>,
    config: &RankConfig,
) -> HashMap<PublicKey, f64> {
    let graph = TemporalGraph::from_blocks(blocks);
    rank_graph(perspective, &graph, config)
}

/// Run the power iteration over an already built temporal graph.
pub fn rank_graph(
    perspective: &PublicKey,
    graph: &TemporalGraph,
    config: &RankConfig,
) -> HashMap<PublicKey, f64> {
    let inner = graph.inner();
    let n = inner.node_count();
    if n == 0 {
        return HashMap::new();
    }

    let own_positions = graph.positions_of(perspective);
    if own_positions == 0 {
        return HashMap::new();
    }

    let mut teleport = vec![0.0; n];
    let share = 1.0 / own_positions as f64;
    for idx in inner.node_indices() {
        if inner[idx].identity == *perspective {
            teleport[idx.index()] = share;
        }
    }

    let mut out_weight = vec![0.0; n];
    for edge in inner.edge_references() {
        out_weight[edge.source().index()] += *edge.weight();
    }

    let mut x = vec![1.0 / n as f64; n];
    for _ in 0..config.max_iterations {
        let xlast = std::mem::replace(&mut x, vec![0.0; n]);

        for edge in inner.edge_references() {
            let u = edge.source().index();
            if out_weight[u] > 0.0 {
                x[edge.target().index()] +=
                    config.damping * xlast[u] * *edge.weight() / out_weight[u];
            }
        }

        // Nodes without outgoing weight hand their mass back through the
        // teleport vector.
        let dangling: f64 = (0..n)
            .filter(|&i| out_weight[i] <= 0.0)
            .map(|i| xlast[i])
            .sum();
        for (i, value) in x.iter_mut().enumerate() {
            *value += config.damping * dangling * teleport[i]
                + (1.0 - config.damping) * teleport[i];
        }

        let delta: f64 = x.iter().zip(&xlast).map(|(a, b)| (a - b).abs()).sum();
        if delta < n as f64 * config.tolerance {
            break;
        }
    }

    let mut scores: HashMap<PublicKey, f64> = HashMap::new();
    for idx in inner.node_indices() {
        *scores.entry(inner[idx].identity).or_insert(0.0) += x[idx.index()];
    }
    scores
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
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

    /// Both halves of one bilateral record.
    fn pair(a: u8, a_seq: i64, b: u8, b_seq: i64, up: u64, down: u64) -> Vec<HalfBlock> {
        vec![
            half_block(a, a_seq, b, b_seq, up, up as i64 - down as i64),
            half_block(b, b_seq, a, a_seq, down, down as i64 - up as i64),
        ]
    }

    #[test]
    fn test_no_blocks_means_no_scores() {
        let scores = temporal_page_rank(&key(1), [], &RankConfig::default());
        assert!(scores.is_empty());
    }

    #[test]
    fn test_unknown_perspective_means_no_scores() {
        let blocks = pair(1, 0, 2, 0, 10, 4);
        let scores =
            temporal_page_rank(&key(9), blocks.iter(), &RankConfig::default());
        assert!(scores.is_empty());
    }

    #[test]
    fn test_scores_sum_to_one() {
        let mut blocks = pair(1, 0, 2, 0, 10, 4);
        blocks.extend(pair(1, 1, 3, 0, 2, 8));
        blocks.extend(pair(2, 1, 3, 1, 5, 5));
        let scores =
            temporal_page_rank(&key(1), blocks.iter(), &RankConfig::default());
        assert_eq!(scores.len(), 3);
        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-6, "scores sum to {total}");
    }

    #[test]
    fn test_perspective_identity_holds_most_mass() {
        let blocks = pair(1, 0, 2, 0, 10, 4);
        let scores =
            temporal_page_rank(&key(1), blocks.iter(), &RankConfig::default());
        let own = scores[&key(1)];
        let other = scores[&key(2)];
        assert!(own > 0.0 && other > 0.0);
        assert!(own > other, "own={own} other={other}");
    }

    #[test]
    fn test_rank_graph_matches_convenience_entry_point() {
        let blocks = pair(1, 0, 2, 0, 3, 3);
        let config = RankConfig::default();
        let direct = temporal_page_rank(&key(1), blocks.iter(), &config);
        let graph = TemporalGraph::from_blocks(blocks.iter());
        let via_graph = rank_graph(&key(1), &graph, &config);
        assert_eq!(direct, via_graph);
    }

    fn scenario() -> Vec<HalfBlock> {
        let mut blocks = pair(1, 0, 2, 0, 10, 4);
        blocks.extend(pair(1, 1, 3, 0, 7, 7));
        blocks.extend(pair(2, 1, 4, 0, 1, 9));
        blocks.extend(pair(3, 1, 4, 1, 6, 2));
        blocks.extend(pair(1, 2, 4, 2, 3, 5));
        blocks
    }

    proptest! {
        #[test]
        fn test_block_order_does_not_change_scores(
            shuffled in Just(scenario()).prop_shuffle()
        ) {
            let config = RankConfig::default();
            let baseline =
                temporal_page_rank(&key(1), scenario().iter(), &config);
            let scores = temporal_page_rank(&key(1), shuffled.iter(), &config);
            prop_assert_eq!(baseline.len(), scores.len());
            for (identity, score) in &baseline {
                let other = scores[identity];
                prop_assert!(
                    (score - other).abs() < 1e-8,
                    "identity {} differs: {} vs {}",
                    identity,
                    score,
                    other
                );
            }
        }
    }
}

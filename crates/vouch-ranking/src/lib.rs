//! Temporal PageRank over half-block interaction histories.
//!
//! The ranking walks a time-expanded graph in which every chain position of
//! every identity is its own node, so later interactions cannot launder
//! reputation earned earlier.

pub mod graph;
pub mod pagerank;

pub use graph::{TemporalGraph, TemporalNode};
pub use pagerank::{RankConfig, rank_graph, temporal_page_rank};

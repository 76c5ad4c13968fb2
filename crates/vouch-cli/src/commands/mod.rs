pub mod experiment;
pub mod graph;
pub mod scan;
pub mod seed;
pub mod serve;
pub mod stats;

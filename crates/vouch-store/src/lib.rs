//! Durable storage for bilateral interaction records.
//!
//! The store is the archive a network is replayed from, not the live state:
//! agents keep their chains and interaction sets in memory and the SQLite
//! file holds the full bilateral records both halves were split from.

pub mod store;

pub use store::{BlockStore, Result, StoreError, StoreStats};

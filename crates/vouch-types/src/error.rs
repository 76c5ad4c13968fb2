use thiserror::Error;

use crate::identity::PublicKey;

/// Errors shared across the vouch crates.
#[derive(Debug, Error)]
pub enum VouchError {
    #[error("unknown agent @{0}")]
    UnknownAgent(PublicKey),

    #[error("identifier {query:?} matches {matches} agents")]
    AmbiguousIdentifier { query: String, matches: usize },

    #[error("chain of @{public_key} is incomplete ({length} blocks)")]
    IncompleteChain {
        public_key: PublicKey,
        length: usize,
    },

    #[error("no unaudited partner within {max_hops} hops")]
    NoAuditPartner { max_hops: usize },

    #[error("invalid {what} length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid {what} encoding: {value:?}")]
    InvalidEncoding { what: &'static str, value: String },

    #[error("store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, VouchError>;

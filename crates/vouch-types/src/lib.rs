//! Core domain types for the vouch reputation network.
//!
//! A bilateral interaction between two agents is recorded as two mirrored
//! [`HalfBlock`]s, one per side. Each agent keeps its own blocks in a
//! [`Chain`] and everything it has learned about anyone in an
//! [`InteractionSet`].

pub mod block;
pub mod chain;
pub mod endorsement;
pub mod error;
pub mod identity;
pub mod interactions;

pub use block::{BilateralBlock, BlockId, HalfBlock, UNLINKED_SEQUENCE};
pub use chain::Chain;
pub use endorsement::Endorsement;
pub use error::{Result, VouchError};
pub use identity::{BLOCK_HASH_LEN, BlockHash, PUBLIC_KEY_LEN, PublicKey};
pub use interactions::InteractionSet;

//! Agents, their message protocol, and the simulated network that
//! connects them.
//!
//! Delivery is an explicit FIFO queue: handlers return envelopes instead
//! of calling each other, and [`Network`] pumps the queue until it drains.
//! That keeps every exchange inspectable and every run deterministic.

pub mod agent;
pub mod interface;
pub mod message;
pub mod network;

pub use agent::{Agent, AgentSummary};
pub use interface::NetworkInterface;
pub use message::{Envelope, Message, MessageKind};
pub use network::{AgentLookup, CleanupReport, Network};

use std::sync::Arc;

use tokio::sync::RwLock;
use vouch_network::Network;

/// Shared server state: one network behind a read/write lock.
///
/// Reads (listings, summaries, rankings) take the read side; audits take
/// the write side because the exchange mutates both participants.
#[derive(Clone)]
pub struct AppState {
    pub network: Arc<RwLock<Network>>,
    pub max_audit_hops: usize,
}

impl AppState {
    pub fn new(network: Network, max_audit_hops: usize) -> Self {
        Self {
            network: Arc::new(RwLock::new(network)),
            max_audit_hops,
        }
    }
}

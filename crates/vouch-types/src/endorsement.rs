use serde::{Deserialize, Serialize};

use crate::identity::PublicKey;

/// A record that `auditor` ran a pairwise audit against `subject`.
///
/// The outcome is advisory. Audits exchange full block sets and scores but
/// never reject a peer, so today every endorsement carries `outcome: true`;
/// the field exists so a verdict can be attached without changing the type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    pub auditor: PublicKey,
    pub subject: PublicKey,
    pub outcome: bool,
}

impl Endorsement {
    pub fn new(auditor: PublicKey, subject: PublicKey) -> Self {
        Self {
            auditor,
            subject,
            outcome: true,
        }
    }
}

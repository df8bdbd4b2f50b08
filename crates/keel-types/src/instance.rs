//! Job instance identities
//!
//! A [`JobInstance`] is one replica of a job in one availability zone. Its
//! address and id are derived deterministically so rendered templates stay
//! stable across resolution runs.

use serde::{Deserialize, Serialize};

/// Identity of one job replica
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobInstance {
    /// Ordinal, unique and contiguous within the instance group
    pub index: usize,

    /// Logical replica this AZ copy belongs to
    pub instance: usize,

    /// Availability zone; empty when the group declares none
    #[serde(default)]
    pub az: String,

    /// `<group>-<job>`
    pub name: String,

    /// Stable identifier
    pub id: String,

    /// DNS address
    pub address: String,

    /// True only for ordinal 0
    pub bootstrap: bool,
}

//! Wire messages exchanged by the replication bridge.

use serde::{Deserialize, Serialize};

use crate::guid::{Guid, Seed};
use crate::math::{Quat, Vec3};

pub const INSTANCE_CREATED: &str = "instance-created";
pub const INSTANCE_DESTROYED: &str = "instance-destroyed";

/// Announces a clone. Replaying `instantiate` on `original_guid` with an
/// `IdProvider` seeded by `seed` yields the same guids as on the sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInstanceMessage {
    pub original_guid: Guid,
    /// Guid of the clone's root.
    pub guid: Guid,
    pub seed: Seed,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Quat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec3>,
    /// Guid of the node to parent the clone under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Guid>,
    /// The clone is a root node regardless of the original's parent.
    #[serde(default)]
    pub unparented: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    /// Opaque data attached by the sending host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestroyInstanceMessage {
    pub guid: Guid,
}

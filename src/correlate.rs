//! Identifier correlation across provider locators, nodes and secrets
//!
//! The cloud provider, the node inventory and the per-instance secrets each use
//! their own identifier. The instance ID, the last path segment of a provider
//! locator such as `aws:///us-east-1e/i-078285fdadccb2eaa`, is the join key.
//!
//! Node lookup matches by substring containment of the instance ID in the
//! provider locator, not by exact segment equality. An ID that happens to be a
//! substring of another node's locator can therefore match the wrong node;
//! callers that need strict matching should compare [`extract_instance_id`]
//! results instead.

use crate::fleet::{FleetSnapshot, NodeRecord};
use crate::Error;

/// Address type reported for a node's public address
pub const EXTERNAL_IP: &str = "ExternalIP";

/// Canonical per-instance identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wrap a raw identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Extract the instance ID from a provider locator
///
/// Returns the segment after the last `/`, or the whole input when there is no
/// separator. Returns `None` for an empty input or a locator ending in `/`.
pub fn extract_instance_id(locator: &str) -> Option<InstanceId> {
    locator
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(InstanceId::new)
}

/// Find the first node whose provider locator contains `id`
pub fn find_node_by_instance_id<'a>(
    id: &InstanceId,
    snapshot: &'a FleetSnapshot,
) -> Result<&'a NodeRecord, Error> {
    snapshot
        .nodes()
        .iter()
        .find(|node| node.provider_locator.contains(id.as_str()))
        .ok_or_else(|| Error::not_found("node", id.as_str()))
}

/// Instance IDs of all nodes that have a provider locator, in node order
pub fn instance_ids_of_nodes(snapshot: &FleetSnapshot) -> Vec<InstanceId> {
    snapshot
        .nodes()
        .iter()
        .filter_map(|node| extract_instance_id(&node.provider_locator))
        .collect()
}

/// First external IP address of a node
pub fn node_external_ip(node: &NodeRecord) -> Result<&str, Error> {
    node.addresses
        .iter()
        .find(|a| a.type_ == EXTERNAL_IP)
        .map(|a| a.address.as_str())
        .ok_or_else(|| Error::not_found("external IP", node.name.as_str()))
}

/// External IP of the node correlated with `id`
pub fn external_ip_for_instance<'a>(
    id: &InstanceId,
    snapshot: &'a FleetSnapshot,
) -> Result<&'a str, Error> {
    let node = find_node_by_instance_id(id, snapshot)?;
    node_external_ip(node)
}

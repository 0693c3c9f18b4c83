//! Frozen view of the provisioned fleet
//!
//! A [`FleetSnapshot`] is captured once after provisioning and then passed by
//! reference into every verifier. Nothing mutates it after construction.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Node;
use tracing::info;

use crate::client::ControlPlane;
use crate::Error;

/// A node taint as a key/value/effect triple
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Taint {
    /// Taint key
    pub key: String,
    /// Taint value (empty when the taint has no value)
    pub value: String,
    /// Taint effect (NoSchedule, PreferNoSchedule, NoExecute)
    pub effect: String,
}

impl Taint {
    /// Create a taint
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        effect: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            effect: effect.into(),
        }
    }
}

impl std::str::FromStr for Taint {
    type Err = Error;

    /// Parses `key=value:Effect` or `key:Effect`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kv, effect)) = s.rsplit_once(':') else {
            let message = format!("invalid taint '{s}', expected key=value:Effect");
            return Err(Error::config(message));
        };
        let (key, value) = kv.split_once('=').unwrap_or((kv, ""));
        if key.is_empty() || effect.is_empty() {
            let message = format!("invalid taint '{s}', key and effect are required");
            return Err(Error::config(message));
        }
        Ok(Self::new(key, value, effect))
    }
}

impl std::fmt::Display for Taint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.value.is_empty() {
            write!(f, "{}:{}", self.key, self.effect)
        } else {
            write!(f, "{}={}:{}", self.key, self.value, self.effect)
        }
    }
}

/// A typed node address (InternalIP, ExternalIP, Hostname, ...)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeAddress {
    /// Address type
    pub type_: String,
    /// Address value
    pub address: String,
}

/// Read-only projection of a Node object
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeRecord {
    /// Node object name
    pub name: String,
    /// Cloud provider locator (`spec.providerID`), empty if unset
    pub provider_locator: String,
    /// Node labels
    pub labels: BTreeMap<String, String>,
    /// Node taints
    pub taints: Vec<Taint>,
    /// Node addresses in status order
    pub addresses: Vec<NodeAddress>,
}

impl NodeRecord {
    /// Returns true if the node carries a label with the given key
    pub fn has_label(&self, key: &str) -> bool {
        self.labels.contains_key(key)
    }

    /// Returns true if the node carries a taint equal to `taint`
    pub fn has_taint(&self, taint: &Taint) -> bool {
        self.taints.iter().any(|t| t == taint)
    }
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        let spec = node.spec.as_ref();
        let provider_id = spec.and_then(|s| s.provider_id.clone());
        let taints = spec
            .and_then(|s| s.taints.as_ref())
            .map(|taints| {
                taints
                    .iter()
                    .map(|t| Taint::new(&t.key, t.value.clone().unwrap_or_default(), &t.effect))
                    .collect()
            })
            .unwrap_or_default();
        let addresses = node
            .status
            .as_ref()
            .and_then(|s| s.addresses.as_ref())
            .map(|addrs| {
                addrs
                    .iter()
                    .map(|a| NodeAddress {
                        type_: a.type_.clone(),
                        address: a.address.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: node.metadata.name.clone().unwrap_or_default(),
            provider_locator: provider_id.unwrap_or_default(),
            labels: node.metadata.labels.clone().unwrap_or_default(),
            taints,
            addresses,
        }
    }
}

/// The provisioned fleet as seen once, after provisioning
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FleetSnapshot {
    expected_node_count: usize,
    nodes: Vec<NodeRecord>,
}

impl FleetSnapshot {
    /// Create a snapshot from already projected node records
    pub fn new(expected_node_count: usize, nodes: Vec<NodeRecord>) -> Self {
        Self {
            expected_node_count,
            nodes,
        }
    }

    /// List nodes matching `label_selector` once and freeze them
    pub async fn capture(
        control_plane: &dyn ControlPlane,
        label_selector: &str,
        expected_node_count: usize,
    ) -> Result<Self, Error> {
        let nodes = control_plane.list_nodes(label_selector).await?;
        info!(
            selector = %label_selector,
            found = nodes.len(),
            expected = expected_node_count,
            "captured fleet snapshot"
        );
        Ok(Self::new(
            expected_node_count,
            nodes.iter().map(NodeRecord::from).collect(),
        ))
    }

    /// Number of nodes the provisioning phase asked for
    pub fn expected_node_count(&self) -> usize {
        self.expected_node_count
    }

    /// Nodes in listing order
    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }
}

//! Tracking registry verification
//!
//! The onboarding controller records each configured instance as a binary
//! entry in a single ConfigMap keyed by instance ID. Waiting for the entry
//! count and checking which IDs are present are separate steps: the wait only
//! establishes the shape, [`assert_tracks_fleet`] checks the content.

use std::collections::{BTreeMap, BTreeSet};

use k8s_openapi::api::core::v1::ConfigMap;
use tracing::info;

use crate::client::ControlPlane;
use crate::config::VerifierConfig;
use crate::correlate::{instance_ids_of_nodes, InstanceId};
use crate::fleet::FleetSnapshot;
use crate::poll::{poll_until, PollStatus};
use crate::Error;

/// Contents of the tracking registry at the moment it converged
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistrySnapshot {
    entries: BTreeMap<String, Vec<u8>>,
}

impl RegistrySnapshot {
    /// Build a snapshot from raw entries
    pub fn new(entries: BTreeMap<String, Vec<u8>>) -> Self {
        Self { entries }
    }

    /// Number of tracked instances
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true if the instance has an entry
    pub fn contains(&self, id: &InstanceId) -> bool {
        self.entries.contains_key(id.as_str())
    }

    /// Opaque payload recorded for an instance
    pub fn payload(&self, id: &InstanceId) -> Option<&[u8]> {
        self.entries.get(id.as_str()).map(Vec::as_slice)
    }

    /// Tracked instance IDs in key order
    pub fn instance_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl From<&ConfigMap> for RegistrySnapshot {
    fn from(cm: &ConfigMap) -> Self {
        let entries = cm
            .binary_data
            .iter()
            .flatten()
            .map(|(k, v)| (k.clone(), v.0.clone()))
            .collect();
        Self { entries }
    }
}

/// Wait until the registry tracks exactly `expected_count` instances
///
/// The deadline is `base_timeout * max(expected_count, 1)`, since every
/// instance has to finish its configuration before it is recorded. A count
/// above `expected_count` keeps polling rather than succeeding.
pub async fn wait_for_registry_convergence(
    control_plane: &dyn ControlPlane,
    config: &VerifierConfig,
    expected_count: usize,
) -> Result<RegistrySnapshot, Error> {
    let namespace = config.namespace.as_str();
    let name = config.registry_name.as_str();
    let operation = format!("{namespace}/{name} registry to track {expected_count} instances");

    poll_until(config.fleet_poll(expected_count), &operation, || async move {
        let Some(cm) = control_plane.get_config_map(namespace, name).await? else {
            info!(
                namespace = %namespace,
                name = %name,
                "waiting for registry ConfigMap to be created"
            );
            return Ok(PollStatus::progress(format!(
                "0/{expected_count} tracked, registry not created"
            )));
        };

        let snapshot = RegistrySnapshot::from(&cm);
        if snapshot.len() == expected_count {
            info!(
                namespace = %namespace,
                name = %name,
                tracked = snapshot.len(),
                "registry tracking required number of instances"
            );
            return Ok(PollStatus::Done(snapshot));
        }

        info!(
            tracked = snapshot.len(),
            expected = expected_count,
            "waiting for instances to be tracked"
        );
        Ok(PollStatus::progress(format!(
            "{}/{} tracked",
            snapshot.len(),
            expected_count
        )))
    })
    .await
}

/// Assert the registry tracks exactly the instances derivable from the fleet
///
/// Missing and unexpected entries are all reported in one [`Error::Aggregate`].
pub fn assert_tracks_fleet(
    registry: &RegistrySnapshot,
    fleet: &FleetSnapshot,
) -> Result<(), Error> {
    let expected: BTreeSet<InstanceId> = instance_ids_of_nodes(fleet).into_iter().collect();

    let mut failures: Vec<String> = expected
        .iter()
        .filter(|id| !registry.contains(id))
        .map(|id| format!("{id}: not tracked"))
        .collect();

    failures.extend(
        registry
            .instance_ids()
            .filter(|id| !expected.contains(&InstanceId::new(*id)))
            .map(|id| format!("{id}: tracked but not in fleet")),
    );

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Aggregate {
            stage: "registry content check".to_string(),
            failures,
        })
    }
}

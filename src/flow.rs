//! End-to-end fleet verification flow
//!
//! Stages run strictly forward:
//!
//! ```text
//! Idle -> PollingRegistry -> RegistryConverged -> CorrelatingInstances -> PollingSecrets -> Converged
//! ```
//!
//! The first hard error or deadline breach ends the flow in the stage where
//! it happened. A later stage never re-enters an earlier one.

use tracing::{error, info};

use crate::checks::{verify_taint, verify_worker_label};
use crate::client::ControlPlane;
use crate::config::VerifierConfig;
use crate::correlate::{find_node_by_instance_id, instance_ids_of_nodes, InstanceId};
use crate::credentials::verify_instance_secrets;
use crate::fleet::FleetSnapshot;
use crate::registry::{assert_tracks_fleet, wait_for_registry_convergence, RegistrySnapshot};
use crate::Error;

/// Stage of the verification flow
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VerificationStage {
    /// Nothing has run yet
    #[default]
    Idle,
    /// Waiting for the tracking registry to reach the fleet size
    PollingRegistry,
    /// Registry entry count reached the fleet size
    RegistryConverged,
    /// Joining instance IDs against the node inventory
    CorrelatingInstances,
    /// Waiting for and decoding per-instance secrets
    PollingSecrets,
    /// Every stage passed
    Converged,
}

impl std::fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "Idle",
            Self::PollingRegistry => "PollingRegistry",
            Self::RegistryConverged => "RegistryConverged",
            Self::CorrelatingInstances => "CorrelatingInstances",
            Self::PollingSecrets => "PollingSecrets",
            Self::Converged => "Converged",
        };
        f.write_str(s)
    }
}

/// Forward-only stage tracker
#[derive(Clone, Debug, Default)]
pub struct StageTracker {
    history: Vec<VerificationStage>,
}

impl StageTracker {
    /// Current stage
    pub fn current(&self) -> VerificationStage {
        self.history.last().copied().unwrap_or_default()
    }

    /// Stages entered so far, in order
    pub fn history(&self) -> &[VerificationStage] {
        &self.history
    }

    /// Move to `next`, which must come after the current stage
    pub fn advance(&mut self, next: VerificationStage) -> Result<(), Error> {
        let current = self.current();
        if next <= current {
            return Err(Error::internal(
                "verification flow",
                format!("illegal transition {current} -> {next}"),
            ));
        }
        info!(from = %current, to = %next, "verification stage transition");
        self.history.push(next);
        Ok(())
    }
}

/// One instance joined across registry, node and secret
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedInstance {
    /// Instance ID
    pub id: InstanceId,
    /// Name of the correlated node
    pub node_name: String,
    /// User name decoded from the instance secret
    pub username: String,
}

/// Outcome of a successful flow
#[derive(Clone, Debug)]
pub struct FlowReport {
    /// Registry contents at convergence
    pub registry: RegistrySnapshot,
    /// Correlated instances in node order
    pub instances: Vec<VerifiedInstance>,
    /// Stages passed through
    pub stages: Vec<VerificationStage>,
}

/// Drives the verification stages for one scenario
pub struct FleetVerifier<'a> {
    control_plane: &'a dyn ControlPlane,
    config: &'a VerifierConfig,
}

impl<'a> FleetVerifier<'a> {
    /// Create a verifier reading through `control_plane`
    pub fn new(control_plane: &'a dyn ControlPlane, config: &'a VerifierConfig) -> Self {
        Self {
            control_plane,
            config,
        }
    }

    /// Run every stage against `fleet`
    pub async fn run(&self, fleet: &FleetSnapshot) -> Result<FlowReport, Error> {
        let mut tracker = StageTracker::default();
        match self.run_stages(fleet, &mut tracker).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(stage = %tracker.current(), error = %e, "fleet verification failed");
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        fleet: &FleetSnapshot,
        tracker: &mut StageTracker,
    ) -> Result<FlowReport, Error> {
        let expected = fleet.expected_node_count();

        tracker.advance(VerificationStage::PollingRegistry)?;
        let registry =
            wait_for_registry_convergence(self.control_plane, self.config, expected).await?;
        tracker.advance(VerificationStage::RegistryConverged)?;

        tracker.advance(VerificationStage::CorrelatingInstances)?;
        let ids = instance_ids_of_nodes(fleet);
        if ids.len() != expected {
            return Err(Error::CountMismatch {
                expected,
                actual: ids.len(),
            });
        }
        let node_names = ids
            .iter()
            .map(|id| find_node_by_instance_id(id, fleet).map(|node| node.name.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        assert_tracks_fleet(&registry, fleet)?;

        tracker.advance(VerificationStage::PollingSecrets)?;
        let credentials = verify_instance_secrets(self.control_plane, self.config, &ids).await?;

        tracker.advance(VerificationStage::Converged)?;
        let instances = credentials
            .into_iter()
            .zip(node_names)
            .map(|((id, creds), node_name)| VerifiedInstance {
                id,
                node_name,
                username: creds.username,
            })
            .collect();

        info!(instances = expected, "fleet converged");
        Ok(FlowReport {
            registry,
            instances,
            stages: tracker.history().to_vec(),
        })
    }

    /// Check labels and taints on every node, reporting both checks together
    pub fn check_nodes(&self, fleet: &FleetSnapshot) -> Result<(), Error> {
        let failures: Vec<String> = [
            verify_worker_label(fleet, &self.config.worker_label),
            verify_taint(fleet, &self.config.expected_taint),
        ]
        .into_iter()
        .filter_map(Result::err)
        .map(|e| e.to_string())
        .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregate {
                stage: "node checks".to_string(),
                failures,
            })
        }
    }
}

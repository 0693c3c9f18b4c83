//! FleetConfig Custom Resource Definition
//!
//! A FleetConfig asks the onboarding controller for `replicas` instances of a
//! given instance type. The schema rejects negative replica counts at admission.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for a FleetConfig
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "fleet.onboarding.dev",
    version = "v1alpha1",
    kind = "FleetConfig",
    plural = "fleetconfigs",
    shortname = "fc",
    namespaced,
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.instanceType"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct FleetConfigSpec {
    /// Cloud instance type to provision (e.g. m5a.large)
    pub instance_type: String,

    /// Number of instances; absent means zero
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0))]
    pub replicas: Option<i32>,

    /// AWS account and key pair used for provisioning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsSpec>,
}

impl FleetConfigSpec {
    /// Replica count with the absent case folded to zero
    pub fn replicas_or_default(&self) -> i32 {
        self.replicas.unwrap_or(0)
    }
}

/// AWS provisioning parameters
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwsSpec {
    /// Account ID holding the provisioning credentials
    pub credential_account_id: String,

    /// EC2 key pair name installed on each instance
    pub ssh_key_pair: String,
}

impl FleetConfig {
    /// Build a FleetConfig for submission
    ///
    /// `replicas = None` leaves the field out of the request body entirely.
    pub fn build(
        namespace: &str,
        name: &str,
        instance_type: &str,
        aws: Option<AwsSpec>,
        replicas: Option<i32>,
    ) -> Self {
        let mut config = FleetConfig::new(
            name,
            FleetConfigSpec {
                instance_type: instance_type.to_string(),
                replicas,
                aws,
            },
        );
        config.metadata.namespace = Some(namespace.to_string());
        config
    }
}

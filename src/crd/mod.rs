//! Custom Resource Definitions exercised by the verifier
//!
//! The verifier never reconciles these resources. It submits them to check that
//! the API server enforces the schema the onboarding controller relies on.

mod fleet_config;

pub use fleet_config::{AwsSpec, FleetConfig, FleetConfigSpec};

//! Verifier configuration

use std::time::Duration;

use crate::fleet::Taint;
use crate::poll::PollConfig;
use crate::Error;

/// Default name of the tracking registry ConfigMap
pub const DEFAULT_REGISTRY_NAME: &str = "windows-services";

/// Default namespace the onboarding controller writes into
pub const DEFAULT_NAMESPACE: &str = "windows-machine-config-operator";

/// Default label selector for onboarded nodes
pub const DEFAULT_NODE_SELECTOR: &str = "kubernetes.io/os=windows";

/// Default label every onboarded node must carry
pub const DEFAULT_WORKER_LABEL: &str = "node-role.kubernetes.io/worker";

/// Default taint every onboarded node must carry
pub const DEFAULT_TAINT: &str = "os=Windows:NoSchedule";

/// Default interval between poll attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Default per-node convergence budget
pub const DEFAULT_BASE_TIMEOUT: Duration = Duration::from_secs(600);

/// Default number of secrets verified concurrently
pub const DEFAULT_SECRET_CONCURRENCY: usize = 4;

/// Settings shared by every verification stage
#[derive(Clone, Debug, PartialEq)]
pub struct VerifierConfig {
    /// Namespace holding the registry and per-instance secrets
    pub namespace: String,
    /// Name of the tracking registry ConfigMap
    pub registry_name: String,
    /// Interval between poll attempts
    pub retry_interval: Duration,
    /// Budget per node for fleet-wide waits, and the fixed budget for single-secret waits
    pub base_timeout: Duration,
    /// Label selector used to capture the fleet
    pub node_label_selector: String,
    /// Label key every node must carry
    pub worker_label: String,
    /// Taint every node must carry
    pub expected_taint: Taint,
    /// Upper bound on concurrent secret verifications
    pub secret_concurrency: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            registry_name: DEFAULT_REGISTRY_NAME.to_string(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            base_timeout: DEFAULT_BASE_TIMEOUT,
            node_label_selector: DEFAULT_NODE_SELECTOR.to_string(),
            worker_label: DEFAULT_WORKER_LABEL.to_string(),
            expected_taint: Taint::new("os", "Windows", "NoSchedule"),
            secret_concurrency: DEFAULT_SECRET_CONCURRENCY,
        }
    }
}

impl VerifierConfig {
    /// Set the namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the registry name
    pub fn with_registry_name(mut self, name: impl Into<String>) -> Self {
        self.registry_name = name.into();
        self
    }

    /// Set the poll interval and per-node timeout
    pub fn with_timing(mut self, retry_interval: Duration, base_timeout: Duration) -> Self {
        self.retry_interval = retry_interval;
        self.base_timeout = base_timeout;
        self
    }

    /// Set the secret verification concurrency
    pub fn with_secret_concurrency(mut self, concurrency: usize) -> Self {
        self.secret_concurrency = concurrency;
        self
    }

    /// Reject settings that would make polling spin or never start
    pub fn validate(&self) -> Result<(), Error> {
        if self.namespace.is_empty() {
            return Err(Error::config("namespace must not be empty"));
        }
        if self.registry_name.is_empty() {
            return Err(Error::config("registry name must not be empty"));
        }
        if self.retry_interval.is_zero() {
            return Err(Error::config("retry interval must be greater than zero"));
        }
        if self.base_timeout.is_zero() {
            return Err(Error::config("base timeout must be greater than zero"));
        }
        if self.secret_concurrency == 0 {
            return Err(Error::config("secret concurrency must be at least 1"));
        }
        Ok(())
    }

    /// Poll settings for a fleet-wide wait over `expected_nodes`
    pub fn fleet_poll(&self, expected_nodes: usize) -> PollConfig {
        PollConfig::scaled(self.retry_interval, self.base_timeout, expected_nodes)
    }

    /// Poll settings for a single-object wait, independent of fleet size
    pub fn single_poll(&self) -> PollConfig {
        PollConfig::new(self.retry_interval, self.base_timeout)
    }
}

//! Error types for fleet convergence verification
//!
//! Each variant maps to one failure class of the verifier. Transient "not yet
//! created" conditions never show up here: they are folded into polling and
//! only surface as [`Error::Timeout`] once a deadline elapses.

use std::time::Duration;

use thiserror::Error;

/// Main error type for verification operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error that is not a plain "not found"
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Deadline elapsed before the observed state converged
    #[error("timed out waiting for {operation} after {deadline:?} (last seen: {last_observed})")]
    Timeout {
        /// What was being waited on
        operation: String,
        /// Polling budget that ran out
        deadline: Duration,
        /// Last partial progress seen before giving up (e.g. "2/3 tracked")
        last_observed: String,
    },

    /// A fetched object could not be decoded or decoded to an empty value
    #[error("malformed data in {resource}: {message}")]
    MalformedData {
        /// Object the payload came from (e.g. "secret ns/i-0abc")
        resource: String,
        /// Description of what is wrong
        message: String,
    },

    /// An identifier could not be joined against the fleet
    #[error("correlation failed: no {kind} found for instance ID {id}")]
    NotFound {
        /// Kind of record that was looked up (node, secret, address)
        kind: String,
        /// Identifier that failed to correlate
        id: String,
    },

    /// Number of correlated instances differs from the expected fleet size
    #[error("correlation failed: expected {expected} instances, found {actual}")]
    CountMismatch {
        /// Expected fleet size
        expected: usize,
        /// Number of instances actually correlated
        actual: usize,
    },

    /// A validation case produced an outcome other than the declared one
    #[error("validation case '{case}' mismatched: {message}")]
    ValidationMismatch {
        /// Name of the failing case
        case: String,
        /// Description of the mismatch
        message: String,
    },

    /// Several independent checks failed; each failure is kept
    #[error("{stage} failed for {} item(s): {}", failures.len(), failures.join("; "))]
    Aggregate {
        /// Stage or check that fanned out
        stage: String,
        /// One message per failed item
        failures: Vec<String>,
    },

    /// Invalid verifier configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Where the error occurred
        context: String,
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a timeout error
    pub fn timeout(
        operation: impl Into<String>,
        deadline: Duration,
        last_observed: impl Into<String>,
    ) -> Self {
        Self::Timeout {
            operation: operation.into(),
            deadline,
            last_observed: last_observed.into(),
        }
    }

    /// Create a malformed data error
    pub fn malformed(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedData {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a correlation not-found error
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Create a validation mismatch error
    pub fn validation_mismatch(case: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationMismatch {
            case: case.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error with context
    pub fn internal(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Returns true if this is a deadline-class failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if this error indicates a structurally bad payload
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::MalformedData { .. })
    }
}

/// Returns true if a kube error is an HTTP 404 from the API server
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

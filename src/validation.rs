//! Table-driven admission checks for FleetConfig
//!
//! Each [`ValidationCase`] is submitted once. A case expecting rejection passes
//! when the API server refuses it with an error containing the expected text.
//! A case expecting acceptance passes when the object can be read back with the
//! field under test unchanged, which catches silent defaulting.
//!
//! Cases run one after another, each against its own object name, and every
//! accepted object is deleted before the next case starts. A failing case never
//! stops the rest of the table.

use async_trait::async_trait;
use kube::api::{Api, DeleteParams, PostParams};
use kube::{Client, ResourceExt};
use tracing::{info, warn};

#[cfg(test)]
use mockall::automock;

use crate::crd::{AwsSpec, FleetConfig};
use crate::error::is_not_found;
use crate::Error;

/// Error text the API server returns for a negative replica count
pub const NEGATIVE_REPLICAS_ERROR: &str =
    "spec.replicas in body should be greater than or equal to 0";

/// JSON pointer of the replica count within a FleetConfig
pub const REPLICAS_FIELD: &str = "/spec/replicas";

/// Trait abstracting FleetConfig submission and read-back
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SpecStore: Send + Sync {
    /// Submit a new FleetConfig
    async fn create(&self, config: &FleetConfig) -> Result<(), Error>;

    /// Read a persisted FleetConfig
    async fn get(&self, namespace: &str, name: &str) -> Result<FleetConfig, Error>;

    /// Delete a FleetConfig; deleting a missing object succeeds
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), Error>;
}

/// Real store backed by a kube client
#[derive(Clone)]
pub struct KubeSpecStore {
    client: Client,
}

impl KubeSpecStore {
    /// Create a new KubeSpecStore wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<FleetConfig> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl SpecStore for KubeSpecStore {
    async fn create(&self, config: &FleetConfig) -> Result<(), Error> {
        let namespace = config
            .namespace()
            .ok_or_else(|| Error::config("FleetConfig must have metadata.namespace"))?;
        self.api(&namespace)
            .create(&PostParams::default(), config)
            .await?;
        Ok(())
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<FleetConfig, Error> {
        Ok(self.api(namespace).get(name).await?)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api = self.api(namespace);
        match api.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Expected outcome of submitting a case
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expectation {
    /// Submission succeeds and the field at this JSON pointer round-trips
    Accepted {
        /// JSON pointer of the field under test (e.g. `/spec/replicas`)
        field: String,
    },
    /// Submission fails with an error containing this text
    Rejected {
        /// Substring the error message must contain
        error_contains: String,
    },
}

/// One row of a validation table
#[derive(Clone, Debug)]
pub struct ValidationCase {
    /// Human-readable case name
    pub name: String,
    /// Object to submit, with its own name and namespace
    pub spec: FleetConfig,
    /// What the API server should do with it
    pub expectation: Expectation,
}

impl ValidationCase {
    /// A case the API server should accept, checking `field` round-trips
    pub fn accepted(
        name: impl Into<String>,
        spec: FleetConfig,
        field: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            expectation: Expectation::Accepted {
                field: field.into(),
            },
        }
    }

    /// A case the API server should reject with an error containing `error_contains`
    pub fn rejected(
        name: impl Into<String>,
        spec: FleetConfig,
        error_contains: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            spec,
            expectation: Expectation::Rejected {
                error_contains: error_contains.into(),
            },
        }
    }

    /// Returns true if the case expects a rejection
    pub fn expects_error(&self) -> bool {
        matches!(self.expectation, Expectation::Rejected { .. })
    }
}

/// Result of one case
#[derive(Debug)]
pub struct CaseOutcome {
    /// Case name
    pub name: String,
    /// `Ok` if the case behaved as declared
    pub result: Result<(), Error>,
}

/// Results of a whole table, in case order
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// One outcome per case
    pub outcomes: Vec<CaseOutcome>,
}

impl ValidationReport {
    /// Number of cases that behaved as declared
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Outcomes of the cases that did not behave as declared
    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Collapse the report into a single result
    pub fn into_result(self) -> Result<(), Error> {
        let failures: Vec<String> = self
            .outcomes
            .into_iter()
            .filter_map(|o| o.result.err().map(|e| format!("{}: {}", o.name, e)))
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Aggregate {
                stage: "validation rules".to_string(),
                failures,
            })
        }
    }
}

/// Run every case against the store
pub async fn evaluate(store: &dyn SpecStore, cases: &[ValidationCase]) -> ValidationReport {
    let mut report = ValidationReport::default();
    for case in cases {
        let result = run_case(store, case).await;
        match &result {
            Ok(()) => info!(case = %case.name, "validation case passed"),
            Err(e) => warn!(case = %case.name, error = %e, "validation case failed"),
        }
        report.outcomes.push(CaseOutcome {
            name: case.name.clone(),
            result,
        });
    }
    report
}

async fn run_case(store: &dyn SpecStore, case: &ValidationCase) -> Result<(), Error> {
    let name = case.spec.name_any();
    let namespace = case
        .spec
        .namespace()
        .ok_or_else(|| Error::config(format!("case '{}' has no namespace", case.name)))?;

    // Leftovers from an earlier run would turn an accept case into a conflict
    store.delete(&namespace, &name).await?;

    let submitted = store.create(&case.spec).await;
    let result = match (&case.expectation, submitted) {
        (Expectation::Rejected { error_contains }, Err(e)) => {
            let message = e.to_string();
            if message.contains(error_contains.as_str()) {
                Ok(())
            } else {
                Err(Error::validation_mismatch(
                    &case.name,
                    format!("expected error containing '{error_contains}', got '{message}'"),
                ))
            }
        }
        (Expectation::Rejected { .. }, Ok(())) => Err(Error::validation_mismatch(
            &case.name,
            "submission was accepted but a rejection was expected",
        )),
        (Expectation::Accepted { .. }, Err(e)) => Err(Error::validation_mismatch(
            &case.name,
            format!("submission was rejected: {e}"),
        )),
        (Expectation::Accepted { field }, Ok(())) => {
            check_round_trip(store, case, &namespace, &name, field).await
        }
    };

    if let Err(e) = store.delete(&namespace, &name).await {
        warn!(case = %case.name, error = %e, "failed to clean up validation object");
    }
    result
}

async fn check_round_trip(
    store: &dyn SpecStore,
    case: &ValidationCase,
    namespace: &str,
    name: &str,
    field: &str,
) -> Result<(), Error> {
    let fetched = store.get(namespace, name).await?;

    let submitted = serde_json::to_value(&case.spec)
        .map_err(|e| Error::internal("check_round_trip", e.to_string()))?;
    let persisted = serde_json::to_value(&fetched)
        .map_err(|e| Error::internal("check_round_trip", e.to_string()))?;

    let want = submitted.pointer(field);
    let got = persisted.pointer(field);
    if want == got {
        Ok(())
    } else {
        Err(Error::validation_mismatch(
            &case.name,
            format!("field {field} persisted as {got:?}, submitted {want:?}"),
        ))
    }
}

/// Replica-count cases for FleetConfig admission
///
/// Each case gets its own object name so cases never observe each other.
pub fn replicas_cases(
    namespace: &str,
    instance_type: &str,
    aws: Option<AwsSpec>,
) -> Vec<ValidationCase> {
    let build = |name: &str, replicas: Option<i32>| {
        FleetConfig::build(namespace, name, instance_type, aws.clone(), replicas)
    };
    vec![
        ValidationCase::accepted(
            "replicas field absent",
            build("replicas-absent", None),
            REPLICAS_FIELD,
        ),
        ValidationCase::accepted(
            "replicas field set to 5",
            build("replicas-five", Some(5)),
            REPLICAS_FIELD,
        ),
        ValidationCase::rejected(
            "replicas field value less than 0",
            build("replicas-negative", Some(-1)),
            NEGATIVE_REPLICAS_ERROR,
        ),
    ]
}

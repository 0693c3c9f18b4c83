//! Per-instance credential secret verification
//!
//! For every onboarded instance the controller writes a Secret named after the
//! instance ID, holding a JSON `{"username": .., "password": ..}` payload under
//! a data key equal to the instance ID.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::ControlPlane;
use crate::config::VerifierConfig;
use crate::correlate::InstanceId;
use crate::poll::{poll_until, PollStatus};
use crate::Error;

/// Instance login credentials decoded from a secret
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    /// Login user name
    #[serde(default)]
    pub username: String,
    /// Login password
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    /// Returns true if no field carries a value
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Wait for the credential secret of `id` and decode it
///
/// Uses the fixed single-object deadline; the wait does not depend on fleet
/// size. A payload that is missing, is not valid JSON, or decodes to empty
/// credentials fails immediately with [`Error::MalformedData`].
pub async fn wait_for_credential_secret(
    control_plane: &dyn ControlPlane,
    config: &VerifierConfig,
    id: &InstanceId,
) -> Result<Credentials, Error> {
    let namespace = config.namespace.as_str();
    let key = id.as_str();
    let resource = format!("secret {namespace}/{key}");

    let creds = poll_until(
        config.single_poll(),
        &format!("{resource} to be created"),
        || {
            let resource = resource.as_str();
            async move {
                let Some(secret) = control_plane.get_secret(namespace, key).await? else {
                    info!(
                        namespace = %namespace,
                        instance = %key,
                        "waiting for instance secret to be created"
                    );
                    return Ok(PollStatus::progress("secret not created"));
                };

                let encoded = secret
                    .data
                    .as_ref()
                    .and_then(|data| data.get(key))
                    .ok_or_else(|| {
                        Error::malformed(resource, format!("no data under key '{key}'"))
                    })?;

                let creds: Credentials = serde_json::from_slice(&encoded.0).map_err(|e| {
                    Error::malformed(resource, format!("unmarshalling credentials failed: {e}"))
                })?;
                Ok(PollStatus::Done(creds))
            }
        },
    )
    .await?;

    if creds.is_empty() {
        return Err(Error::malformed(
            resource,
            "expected credentials to be present but got an empty value",
        ));
    }

    debug!(instance = %key, username = %creds.username, "instance secret verified");
    Ok(creds)
}

/// Verify the credential secret of every instance
///
/// At most `config.secret_concurrency` secrets are awaited at once. Every
/// instance is checked; failures are collected into one [`Error::Aggregate`]
/// rather than stopping at the first.
pub async fn verify_instance_secrets(
    control_plane: &dyn ControlPlane,
    config: &VerifierConfig,
    ids: &[InstanceId],
) -> Result<Vec<(InstanceId, Credentials)>, Error> {
    let results: Vec<(InstanceId, Result<Credentials, Error>)> = stream::iter(ids)
        .map(|id| async move {
            let result = wait_for_credential_secret(control_plane, config, id).await;
            (id.clone(), result)
        })
        .buffered(config.secret_concurrency.max(1))
        .collect()
        .await;

    let mut verified = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    for (id, result) in results {
        match result {
            Ok(creds) => verified.push((id, creds)),
            Err(e) => {
                warn!(instance = %id, error = %e, "instance secret verification failed");
                failures.push(format!("{id}: {e}"));
            }
        }
    }

    if failures.is_empty() {
        Ok(verified)
    } else {
        Err(Error::Aggregate {
            stage: "secret verification".to_string(),
            failures,
        })
    }
}

//! FleetConfig admission stories against a real API server
//!
//! The CRD schema carries the replica minimum, so these stories check that the
//! generated schema is what the API server actually enforces.

use fleet_verify::crd::{AwsSpec, FleetConfig};
use fleet_verify::validation::{evaluate, replicas_cases, KubeSpecStore, NEGATIVE_REPLICAS_ERROR};
use kube::api::{Api, PostParams};

use super::helpers::{create_test_namespace, delete_test_namespace, ensure_test_cluster};

fn aws() -> Option<AwsSpec> {
    Some(AwsSpec {
        credential_account_id: "123456789012".to_string(),
        ssh_key_pair: "fleet-key".to_string(),
    })
}

/// Story: the replica table passes end to end
///
/// Absent and positive replica counts round-trip unchanged. A negative count
/// is rejected with the schema minimum message.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_replicas_table_passes() {
    let client = ensure_test_cluster().await.expect("failed to set up test cluster");
    let namespace = create_test_namespace(&client, "validation").await;

    let store = KubeSpecStore::new(client.clone());
    let cases = replicas_cases(&namespace, "m5a.large", aws());
    let report = evaluate(&store, &cases).await;

    for outcome in &report.outcomes {
        println!("  {} -> {:?}", outcome.name, outcome.result);
    }
    delete_test_namespace(&client, &namespace).await;

    assert_eq!(report.passed(), cases.len());
    report.into_result().expect("every replicas case should pass");
}

/// Story: running the table twice is harmless
///
/// Cases clean up after themselves, so a second run sees no conflicts.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_replicas_table_is_repeatable() {
    let client = ensure_test_cluster().await.expect("failed to set up test cluster");
    let namespace = create_test_namespace(&client, "validation-rerun").await;

    let store = KubeSpecStore::new(client.clone());
    let cases = replicas_cases(&namespace, "m5a.large", None);
    let first = evaluate(&store, &cases).await;
    let second = evaluate(&store, &cases).await;
    delete_test_namespace(&client, &namespace).await;

    assert_eq!(first.passed(), cases.len());
    assert_eq!(second.passed(), cases.len());
}

/// Story: the raw API server message matches the expected rejection text
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_negative_replicas_rejected_by_schema() {
    let client = ensure_test_cluster().await.expect("failed to set up test cluster");
    let namespace = create_test_namespace(&client, "negative").await;

    let api: Api<FleetConfig> = Api::namespaced(client.clone(), &namespace);
    let config = FleetConfig::build(&namespace, "negative", "m5a.large", None, Some(-1));
    let result = api.create(&PostParams::default(), &config).await;
    delete_test_namespace(&client, &namespace).await;

    let err = result.expect_err("negative replicas should be rejected");
    assert!(
        err.to_string().contains(NEGATIVE_REPLICAS_ERROR),
        "unexpected rejection: {err}"
    );
}

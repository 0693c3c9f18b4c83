//! Fleet convergence stories
//!
//! kind does not run an onboarding controller, so each story plays the
//! controller itself: it writes the tracking registry and the instance secrets
//! from a background task while the verifier is already polling. kind nodes
//! carry a `kind://docker/<cluster>/<node>` provider ID, which makes the node
//! name the instance ID.

use std::time::Duration;

use kube::Client;

use fleet_verify::client::{ControlPlane, KubeControlPlane};
use fleet_verify::config::VerifierConfig;
use fleet_verify::correlate::instance_ids_of_nodes;
use fleet_verify::fleet::FleetSnapshot;
use fleet_verify::flow::{FleetVerifier, VerificationStage};
use fleet_verify::Error;

use super::helpers::{
    create_test_namespace, delete_test_namespace, ensure_test_cluster, write_instance_secret,
    write_registry,
};

const REGISTRY: &str = "windows-services";
const CREDENTIALS: &[u8] = br#"{"username":"Administrator","password":"kind"}"#;

fn verifier_config(namespace: &str) -> VerifierConfig {
    VerifierConfig::default()
        .with_namespace(namespace)
        .with_registry_name(REGISTRY)
        .with_timing(Duration::from_secs(1), Duration::from_secs(30))
}

/// Capture every node in the cluster, expecting all of them to be tracked
async fn capture_fleet(client: &Client) -> FleetSnapshot {
    let control_plane = KubeControlPlane::new(client.clone());
    let nodes = control_plane
        .list_nodes("")
        .await
        .expect("failed to list nodes")
        .len();
    FleetSnapshot::capture(&control_plane, "", nodes)
        .await
        .expect("failed to capture node inventory")
}

/// Story: the controller registers instances one by one, then writes secrets
///
/// The verifier starts before anything exists. It must keep polling while the
/// registry is missing and while it is partially filled, then converge once
/// every node is tracked and every secret decodes.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_verifier_waits_for_controller_to_catch_up() {
    let client = ensure_test_cluster().await.expect("failed to set up test cluster");
    let namespace = create_test_namespace(&client, "converge").await;

    let fleet = capture_fleet(&client).await;
    let ids: Vec<String> = instance_ids_of_nodes(&fleet)
        .iter()
        .map(|id| id.to_string())
        .collect();
    assert!(!ids.is_empty(), "kind nodes should carry provider IDs");
    println!("Fleet instance IDs: {ids:?}");

    let controller = {
        let client = client.clone();
        let namespace = namespace.clone();
        let ids = ids.clone();
        tokio::spawn(async move {
            for tracked in 1..=ids.len() {
                tokio::time::sleep(Duration::from_secs(2)).await;
                write_registry(&client, &namespace, REGISTRY, &ids[..tracked]).await;
                println!("Controller tracks {tracked}/{} instances", ids.len());
            }
            for id in &ids {
                write_instance_secret(&client, &namespace, id, CREDENTIALS).await;
            }
        })
    };

    let control_plane = KubeControlPlane::new(client.clone());
    let config = verifier_config(&namespace);
    let result = FleetVerifier::new(&control_plane, &config).run(&fleet).await;

    controller.await.expect("controller task panicked");
    delete_test_namespace(&client, &namespace).await;

    let report = result.expect("fleet should converge");
    assert_eq!(report.stages.last(), Some(&VerificationStage::Converged));
    assert_eq!(report.registry.len(), ids.len());
    for instance in &report.instances {
        assert_eq!(instance.username, "Administrator");
        assert_eq!(instance.id.as_str(), instance.node_name);
    }
}

/// Story: the controller never creates the registry
///
/// With no registry object at all the verifier must time out in the registry
/// stage and say what it last saw.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_missing_registry_times_out() {
    let client = ensure_test_cluster().await.expect("failed to set up test cluster");
    let namespace = create_test_namespace(&client, "no-registry").await;

    let fleet = capture_fleet(&client).await;
    let control_plane = KubeControlPlane::new(client.clone());
    let config = VerifierConfig::default()
        .with_namespace(&namespace)
        .with_registry_name(REGISTRY)
        .with_timing(Duration::from_secs(1), Duration::from_secs(3));

    let result = FleetVerifier::new(&control_plane, &config).run(&fleet).await;
    delete_test_namespace(&client, &namespace).await;

    match result {
        Err(Error::Timeout { last_observed, .. }) => {
            assert!(
                last_observed.contains("registry not created"),
                "unexpected progress: {last_observed}"
            );
        }
        other => panic!("expected registry timeout, got {other:?}"),
    }
}

/// Story: the registry tracks every node but one secret holds garbage
///
/// The flow gets past correlation and fails in the secret stage, naming the
/// broken instance.
#[tokio::test]
#[ignore = "requires kind cluster - run with: cargo test --test kind -- --ignored"]
async fn story_corrupt_secret_is_reported_by_instance() {
    let client = ensure_test_cluster().await.expect("failed to set up test cluster");
    let namespace = create_test_namespace(&client, "bad-secret").await;

    let fleet = capture_fleet(&client).await;
    let ids: Vec<String> = instance_ids_of_nodes(&fleet)
        .iter()
        .map(|id| id.to_string())
        .collect();

    write_registry(&client, &namespace, REGISTRY, &ids).await;
    for (i, id) in ids.iter().enumerate() {
        let payload: &[u8] = if i == 0 { b"not json" } else { CREDENTIALS };
        write_instance_secret(&client, &namespace, id, payload).await;
    }

    let control_plane = KubeControlPlane::new(client.clone());
    let config = verifier_config(&namespace);
    let result = FleetVerifier::new(&control_plane, &config).run(&fleet).await;
    delete_test_namespace(&client, &namespace).await;

    match result {
        Err(Error::Aggregate { stage, failures }) => {
            assert_eq!(stage, "secret verification");
            assert_eq!(failures.len(), 1);
            assert!(failures[0].starts_with(&ids[0]));
            assert!(failures[0].contains("unmarshalling credentials failed"));
        }
        other => panic!("expected secret verification failure, got {other:?}"),
    }
}

//! fleet-verify - check that a fleet-onboarding controller has converged

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use kube::CustomResourceExt;

use fleet_verify::client::{create_client, KubeControlPlane};
use fleet_verify::config::{
    VerifierConfig, DEFAULT_NAMESPACE, DEFAULT_NODE_SELECTOR, DEFAULT_REGISTRY_NAME,
    DEFAULT_TAINT, DEFAULT_WORKER_LABEL,
};
use fleet_verify::crd::{AwsSpec, FleetConfig};
use fleet_verify::fleet::{FleetSnapshot, Taint};
use fleet_verify::flow::FleetVerifier;
use fleet_verify::telemetry::init_tracing;
use fleet_verify::validation::{evaluate, replicas_cases, KubeSpecStore};

/// Verify that a fleet-onboarding controller converged to the expected state
#[derive(Parser, Debug)]
#[command(name = "fleet-verify", version, about, long_about = None)]
struct Cli {
    /// Print the FleetConfig CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "FLEET_VERIFY_JSON_LOGS")]
    json_logs: bool,

    /// Path to a kubeconfig file (inferred from the environment when omitted)
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Wait for registry and secrets to converge, then check node labels and taints
    Verify(VerifyArgs),

    /// Run the FleetConfig admission validation table
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
struct VerifyArgs {
    /// Number of instances the controller was asked to onboard
    #[arg(long, env = "FLEET_VERIFY_EXPECTED_NODES")]
    expected_nodes: usize,

    /// Namespace holding the registry and instance secrets
    #[arg(long, env = "FLEET_VERIFY_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Name of the tracking registry ConfigMap
    #[arg(long, env = "FLEET_VERIFY_REGISTRY_NAME", default_value = DEFAULT_REGISTRY_NAME)]
    registry_name: String,

    /// Seconds between poll attempts
    #[arg(long, env = "FLEET_VERIFY_RETRY_INTERVAL_SECS", default_value = "5")]
    retry_interval_secs: u64,

    /// Seconds allowed per node for fleet-wide waits
    #[arg(long, env = "FLEET_VERIFY_TIMEOUT_SECS", default_value = "600")]
    timeout_secs: u64,

    /// Label selector for onboarded nodes
    #[arg(long, env = "FLEET_VERIFY_NODE_SELECTOR", default_value = DEFAULT_NODE_SELECTOR)]
    node_selector: String,

    /// Label key every onboarded node must carry
    #[arg(long, env = "FLEET_VERIFY_WORKER_LABEL", default_value = DEFAULT_WORKER_LABEL)]
    worker_label: String,

    /// Taint every onboarded node must carry, as key=value:Effect
    #[arg(long, env = "FLEET_VERIFY_TAINT", default_value = DEFAULT_TAINT)]
    taint: Taint,

    /// Maximum number of instance secrets awaited at once
    #[arg(long, env = "FLEET_VERIFY_SECRET_CONCURRENCY", default_value = "4")]
    secret_concurrency: usize,
}

impl VerifyArgs {
    fn to_config(&self) -> VerifierConfig {
        VerifierConfig {
            namespace: self.namespace.clone(),
            registry_name: self.registry_name.clone(),
            retry_interval: Duration::from_secs(self.retry_interval_secs),
            base_timeout: Duration::from_secs(self.timeout_secs),
            node_label_selector: self.node_selector.clone(),
            worker_label: self.worker_label.clone(),
            expected_taint: self.taint.clone(),
            secret_concurrency: self.secret_concurrency,
        }
    }
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Namespace to create validation objects in
    #[arg(long, env = "FLEET_VERIFY_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Instance type written into each FleetConfig
    #[arg(long, default_value = "m5a.large")]
    instance_type: String,

    /// AWS account ID for the aws section
    #[arg(long, env = "FLEET_VERIFY_AWS_ACCOUNT_ID")]
    aws_account_id: Option<String>,

    /// EC2 key pair name for the aws section
    #[arg(long, env = "FLEET_VERIFY_SSH_KEY_PAIR")]
    ssh_key_pair: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&FleetConfig::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install the aws-lc-rs crypto provider");
    }

    init_tracing(cli.json_logs)?;

    match cli.command {
        Some(Commands::Verify(args)) => run_verify(cli.kubeconfig, args).await,
        Some(Commands::Validate(args)) => run_validate(cli.kubeconfig, args).await,
        None => anyhow::bail!("no command given; see --help"),
    }
}

async fn run_verify(kubeconfig: Option<PathBuf>, args: VerifyArgs) -> anyhow::Result<()> {
    let config = args.to_config();
    config.validate()?;

    let client = create_client(kubeconfig.as_deref()).await?;
    let control_plane = KubeControlPlane::new(client);

    let fleet =
        FleetSnapshot::capture(&control_plane, &config.node_label_selector, args.expected_nodes)
            .await?;

    let verifier = FleetVerifier::new(&control_plane, &config);
    // Node checks run regardless of the flow outcome so both are reported
    let flow = verifier.run(&fleet).await;
    let nodes = verifier.check_nodes(&fleet);

    if let Ok(report) = &flow {
        println!("=== Fleet converged ===");
        println!("Tracked instances: {}", report.registry.len());
        for instance in &report.instances {
            println!(
                "  {} -> node {} (user {})",
                instance.id, instance.node_name, instance.username
            );
        }
    }

    match (flow, nodes) {
        (Ok(_), Ok(())) => Ok(()),
        (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(e.into()),
        (Err(flow), Err(nodes)) => anyhow::bail!("{flow}; {nodes}"),
    }
}

async fn run_validate(kubeconfig: Option<PathBuf>, args: ValidateArgs) -> anyhow::Result<()> {
    let client = create_client(kubeconfig.as_deref()).await?;
    let store = KubeSpecStore::new(client);

    let aws = match (args.aws_account_id, args.ssh_key_pair) {
        (Some(credential_account_id), Some(ssh_key_pair)) => Some(AwsSpec {
            credential_account_id,
            ssh_key_pair,
        }),
        (None, None) => None,
        _ => anyhow::bail!("--aws-account-id and --ssh-key-pair must be given together"),
    };

    let cases = replicas_cases(&args.namespace, &args.instance_type, aws);
    let report = evaluate(&store, &cases).await;

    println!("=== Validation rules ===");
    for outcome in &report.outcomes {
        let status = if outcome.result.is_ok() { "PASS" } else { "FAIL" };
        println!("  [{status}] {}", outcome.name);
    }
    println!("{}/{} cases passed", report.passed(), report.outcomes.len());

    report.into_result().map_err(Into::into)
}

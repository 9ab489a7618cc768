use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use happy_helm::{
    controller::{self, ControllerState, DeployChartConfig, FailurePolicy},
    crd::{DeployChart, Repository},
    helm::{Helm, HelmCli, DEFAULT_HELM_TIMEOUT},
    values::ValuesMode,
    Error,
};
use kube::api::{Api, ListParams};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the operator
    Run(RunArgs),
    /// Show version information
    Version,
    /// Show managed resources in the cluster
    Info(InfoArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Helm executable to invoke
    #[arg(long, env = "HELM_BINARY", default_value = "helm")]
    helm_binary: String,

    /// Deadline for a single Helm invocation, in seconds
    #[arg(long, env = "HELM_TIMEOUT_SECS", default_value_t = DEFAULT_HELM_TIMEOUT.as_secs())]
    helm_timeout_secs: u64,

    /// What a failed apply does to DeployChart status
    #[arg(long, env = "FAILURE_POLICY", value_enum, default_value_t = FailurePolicy::Retry)]
    failure_policy: FailurePolicy,

    /// How DeployChart values are turned into a values file
    #[arg(long, env = "VALUES_MODE", value_enum, default_value_t = ValuesMode::Verbatim)]
    values_mode: ValuesMode,

    /// Parent directory for rendered values files
    #[arg(long, env = "VALUES_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Only reconcile DeployCharts in this namespace
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Parser, Debug)]
struct InfoArgs {
    /// Count DeployCharts in this namespace only
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("HappyHelm Operator v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Info(info_args) => run_info(info_args).await,
        Commands::Run(run_args) => run_operator(run_args).await,
    }
}

async fn run_info(args: InfoArgs) -> Result<(), Error> {
    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    let deploy_charts: Api<DeployChart> = match &args.namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };
    let repositories: Api<Repository> = Api::all(client);

    let charts = deploy_charts.list(&ListParams::default()).await?;
    let repos = repositories.list(&ListParams::default()).await?;

    println!("Managed DeployCharts: {}", charts.items.len());
    println!("Managed Repositories: {}", repos.items.len());
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

async fn run_operator(args: RunArgs) -> Result<(), Error> {
    init_tracing(args.log_format);

    info!("Starting HappyHelm Operator v{}", env!("CARGO_PKG_VERSION"));

    if let Some(dir) = &args.scratch_dir {
        if !dir.is_dir() {
            return Err(Error::ConfigError(format!(
                "scratch directory {} does not exist",
                dir.display()
            )));
        }
    }

    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;

    info!("Connected to Kubernetes cluster");

    let helm: Arc<dyn Helm> = Arc::new(HelmCli::new(
        args.helm_binary.clone(),
        Duration::from_secs(args.helm_timeout_secs),
    ));
    info!(
        binary = %args.helm_binary,
        timeout_secs = args.helm_timeout_secs,
        failure_policy = ?args.failure_policy,
        values_mode = ?args.values_mode,
        "Configured Helm backend"
    );

    let config = DeployChartConfig {
        failure_policy: args.failure_policy,
        values_mode: args.values_mode,
        scratch_dir: args.scratch_dir,
    };
    let state = Arc::new(ControllerState::new(client, helm, config));

    controller::run_controllers(state, args.watch_namespace).await
}

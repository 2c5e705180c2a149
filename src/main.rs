use std::sync::Arc;

use clap::{Parser, Subcommand};
use originsync::config::{Config, SitePlacement};
use originsync::controller::{run_watcher, Reconciler};
use originsync::xc::OriginPoolClient;
use originsync::Error;
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
    /// Run the synchronizer
    Run(RunArgs),
    /// Show version information
    Version,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Cluster namespace to watch (all namespaces when unset)
    #[arg(long, env = "KUBE_NAMESPACE")]
    kube_namespace: Option<String>,

    /// XC namespace holding the origin pools
    #[arg(long, env = "XC_NAMESPACE")]
    xc_namespace: String,

    /// XC API token
    #[arg(long, env = "XC_TOKEN", hide_env_values = true)]
    xc_token: String,

    /// XC site the origin servers are attached to
    #[arg(long, env = "XC_SITENAME")]
    site_name: String,

    /// Site interface the node addresses live on: inside or outside
    #[arg(long, env = "XC_SITEINTERFACE", value_enum, ignore_case = true)]
    site_interface: SitePlacement,

    /// XC API base URL, e.g. https://tenant.console.ves.volterra.io
    #[arg(long, env = "API_DOMAIN")]
    api_domain: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("OriginSync v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Run(run_args) => run(run_args).await,
    }
}

async fn run(args: RunArgs) -> Result<(), Error> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();

    info!("Starting OriginSync v{}", env!("CARGO_PKG_VERSION"));

    if !args.api_domain.starts_with("https://") && !args.api_domain.starts_with("http://") {
        return Err(Error::ConfigError(format!(
            "API_DOMAIN must be an absolute URL, got {:?}",
            args.api_domain
        )));
    }

    let config = Arc::new(Config {
        kube_namespace: args.kube_namespace,
        xc_namespace: args.xc_namespace,
        xc_token: args.xc_token,
        site_name: args.site_name,
        site_placement: args.site_interface,
        api_domain: args.api_domain.trim_end_matches('/').to_string(),
    });

    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;
    info!("Connected to Kubernetes cluster");

    let pools = OriginPoolClient::new(&config)?;
    let reconciler = Reconciler::new(client.clone(), pools, Arc::clone(&config));

    run_watcher(reconciler, client, config).await
}

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use contrast::{start_proxy, Configuration, DiffMode, ProxyError, TlsOptions};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Port the proxy listens on
    #[clap(long, default_value_t = 8080)]
    port: u16,

    /// Base URL of the primary (baseline) upstream
    #[clap(long, required = true)]
    primary: String,

    /// Base URL of a second baseline instance, required for noise detection
    #[clap(long)]
    secondary: Option<String>,

    /// Base URL of the candidate upstream under test
    #[clap(long, required = true)]
    candidate: String,

    /// File the comparison records are appended to; unset disables storage
    #[clap(long, default_value = "")]
    store_results: String,

    /// Comparison mode: Strict, Subset or Schema
    #[clap(long, default_value = "Strict")]
    difference: String,

    /// Call the baseline twice and strip fields that differ between the runs
    #[clap(long)]
    noise_detection: bool,

    /// Also mirror non-idempotent methods (POST, PUT, ...) to the upstreams
    #[clap(long)]
    allow_unsafe_operations: bool,

    /// Compare response headers as well
    #[clap(long)]
    headers: bool,

    /// JSON pointer pattern always treated as noise; repeatable
    #[clap(long)]
    ignore_values: Vec<String>,

    /// File with one JSON pointer pattern per line
    #[clap(long, default_value = "")]
    ignore_values_file: String,

    /// Skip TLS certificate verification of the upstreams
    #[clap(long)]
    insecure_skip_verify: bool,

    /// CA certificate bundle for the upstream connections (PEM)
    #[clap(long)]
    ca_cert: Option<PathBuf>,

    /// Client certificate presented to the upstreams (PEM)
    #[clap(long)]
    client_cert: Option<PathBuf>,

    /// Private key for the client certificate (PEM)
    #[clap(long)]
    client_key: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "contrast=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let difference_mode = cli
        .difference
        .parse::<DiffMode>()
        .map_err(ProxyError::ConfigInvalid)?;

    let mut config = Configuration {
        port: cli.port,
        primary: cli.primary,
        secondary: cli.secondary.unwrap_or_default(),
        candidate: cli.candidate,
        store_results: cli.store_results,
        difference_mode,
        noise_detection: cli.noise_detection,
        allow_unsafe_operations: cli.allow_unsafe_operations,
        headers: cli.headers,
        ignore_values: cli.ignore_values,
        ignore_values_file: cli.ignore_values_file,
        tls: TlsOptions {
            insecure_skip_verify: cli.insecure_skip_verify,
            ca_cert: cli.ca_cert,
            client_cert: cli.client_cert,
            client_key: cli.client_key,
        },
    };

    config.load_ignore_values_file()?;
    config.validate()?;

    tracing::info!("starting with configuration:\n{}", config);

    start_proxy(config).await
}

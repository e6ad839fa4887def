use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use stubby::config::{DEFAULT_ADMIN_PORT, DEFAULT_LOCATION, DEFAULT_STUBS_PORT};
use stubby::loader::load_data_file;
use stubby::{StartOptions, Stubby};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// HTTP stub server with a REST admin API
#[derive(Parser, Debug)]
#[command(name = "stubby")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port for the stub server
    #[arg(short, long, default_value_t = DEFAULT_STUBS_PORT)]
    stubs: u16,

    /// Port for the admin server
    #[arg(short, long, default_value_t = DEFAULT_ADMIN_PORT)]
    admin: u16,

    /// Hostname or address both servers bind to
    #[arg(short, long, default_value = DEFAULT_LOCATION)]
    location: String,

    /// YAML or JSON file of endpoints to load at startup
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// PEM private key; enables TLS together with --cert
    #[arg(short, long)]
    key: Option<PathBuf>,

    /// PEM certificate; enables TLS together with --key
    #[arg(short = 't', long)]
    cert: Option<PathBuf>,

    /// Path prefix for admin routes, e.g. /api
    #[arg(long)]
    admin_prefix: Option<String>,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Log filter directive, e.g. "debug" or "stubby=trace"
    #[arg(long, env = "STUBBY_LOG")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    let directive = args.log_level.as_deref().unwrap_or(default_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let (data, data_dir) = match &args.data {
        Some(path) => {
            let data_set = load_data_file(path)?;
            info!(
                "Loaded {} endpoint(s) from {}",
                data_set.endpoints.len(),
                path.display()
            );
            (Some(data_set.endpoints), Some(data_set.base_dir))
        }
        None => (None, None),
    };

    let stubby = Stubby::new();
    stubby
        .start(StartOptions {
            stubs: Some(args.stubs),
            admin: Some(args.admin),
            location: Some(args.location),
            data,
            data_dir,
            key: args.key,
            cert: args.cert,
            admin_prefix: args.admin_prefix,
        })
        .await
        .context("Failed to start stubby")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");
    stubby.stop().await;

    Ok(())
}

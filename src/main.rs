use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::EnvFilter;

use gridatlas::config::context::build_context;
use gridatlas::config::schema::{load_config, AccessSettings};
use gridatlas::frontend::http::run_server;

const DEFAULT_CONFIG_PATH: &str = "gridatlas.toml";

#[derive(Debug, Parser)]
#[clap(name = "gridatlas", version, about)]
struct Args {
    #[clap(short, long = "config", default_value = DEFAULT_CONFIG_PATH)]
    config_path: PathBuf,

    #[clap(long, help = "Output logs as JSON lines")]
    json_logs: bool,
}

fn prepare_tracing(json_logs: bool) {
    // Redirect all `log`'s events to our subscriber
    LogTracer::init().expect("Failed to set logger");

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);

    let result = if json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.expect("Error setting the global tracing subscriber");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Error listening for the shutdown signal: {e}");
        return;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    prepare_tracing(args.json_logs);

    info!("Starting gridatlas {}", env!("CARGO_PKG_VERSION"));

    let config = match load_config(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Error loading the config from {:?}: {e}", args.config_path);
            exit(1);
        }
    };

    if config.frontend.http.write_access == AccessSettings::Any {
        warn!("Admin endpoints are open to anyone, set frontend.http.write_access to restrict them");
    }

    let context = match build_context(config).await {
        Ok(context) => Arc::new(context),
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };

    if let Err(e) = run_server(context, shutdown_signal()).await {
        error!("{e}");
        exit(1);
    }
}

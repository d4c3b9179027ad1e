use std::io::{stderr, stdout};
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use schema_manager::config::context::{build_context, setup_metrics};
use schema_manager::config::schema::{load_config, DEFAULT_CONFIG_PATH};
use schema_manager::frontend::http::run_server;
use schema_manager::utils::run_one_off_command;
use tokio::signal::ctrl_c;
use tracing::{error, info, subscriber, warn};
use tracing_log::LogTracer;
use tracing_subscriber::filter::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "schema_manager=info,warp=info";

#[derive(Debug, Parser)]
#[clap(name = "schema-manager", about = "Schema mutation service for Postgres")]
struct Args {
    #[clap(short, long = "config", default_value = DEFAULT_CONFIG_PATH)]
    config_path: PathBuf,

    #[clap(long, help = "Emit logs as JSON")]
    json_logs: bool,

    #[clap(
        long,
        help = "Run a single JSON request against the catalog, print the result and exit"
    )]
    one_off: Option<String>,
}

fn prepare_tracing(json_logs: bool) {
    // Redirect all `log`'s events to our subscriber, to collect the ones from our deps too
    if let Err(e) = LogTracer::init() {
        eprintln!("Error redirecting log events: {e}");
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // Logs go to stderr: stdout carries one-off results
    let result = if json_logs {
        subscriber::set_global_default(
            tracing_subscriber::fmt()
                .json()
                .with_writer(stderr)
                .with_env_filter(env_filter)
                .finish(),
        )
    } else {
        subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_writer(stderr)
                .with_env_filter(env_filter)
                .finish(),
        )
    };

    if let Err(e) = result {
        eprintln!("Error setting up the tracing subscriber: {e}");
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args.config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Error loading the config from {}: {e}",
                args.config_path.display()
            );
            exit(1);
        }
    };

    prepare_tracing(args.json_logs || config.misc.json_logs);

    if let Some(ref metrics) = config.misc.metrics {
        if args.one_off.is_none() {
            if let Err(e) = setup_metrics(metrics) {
                warn!("{e}");
            }
        }
    }

    let context = match build_context(&config).await {
        Ok(context) => context,
        Err(e) => {
            error!("{e}");
            exit(1);
        }
    };

    if let Some(ref request) = args.one_off {
        if let Err(e) = run_one_off_command(&context.service, request, stdout()).await {
            error!("{e}");
            exit(1);
        }
        return;
    }

    let shutdown = async {
        if let Err(e) = ctrl_c().await {
            error!("Error listening for the shutdown signal: {e}");
        }
        info!("Shutting down...");
    };

    if let Err(e) = run_server(Arc::new(context), config.frontend.http.clone(), shutdown).await {
        error!("{e}");
        exit(1);
    }
}

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;

use config::{Config, MetricsConfig};

#[derive(Parser)]
#[command(name = "easel", about = "Drawing-board backend service")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, short, default_value = "easel.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the API server
    Serve,
    /// Validate the config file and exit
    CheckConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)?;

    match cli.command {
        CliCommand::CheckConfig => {
            if let Some(server) = &config.server {
                server.validate()?;
            }
            println!("config ok");
            Ok(())
        }
        CliCommand::Serve => {
            init_tracing();

            // Keep the guard alive for the lifetime of the process.
            let _sentry_guard = config.common.logging.as_ref().map(|logging| {
                sentry::init((
                    logging.sentry_dsn.clone(),
                    sentry::ClientOptions {
                        release: sentry::release_name!(),
                        ..Default::default()
                    },
                ))
            });

            if let Some(metrics_config) = &config.common.metrics {
                install_statsd(metrics_config)?;
            }

            let server = config
                .server
                .ok_or("missing `server` section in config")?;

            tracing::info!("starting easel");
            easel_api::run(server)?;
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn install_statsd(config: &MetricsConfig) -> Result<(), Box<dyn Error>> {
    let recorder = metrics_exporter_statsd::StatsdBuilder::from(
        config.statsd_host.as_str(),
        config.statsd_port,
    )
    .build(Some("easel"))?;

    metrics::set_global_recorder(recorder)
        .map_err(|e| format!("failed to install metrics recorder: {e}"))?;

    shared::metrics_defs::describe_all(easel_api::metrics_defs::ALL_METRICS);
    Ok(())
}

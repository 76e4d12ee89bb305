use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{MasterParams, RegionParams};

#[derive(Parser)]
#[command(
    name = "pawmatch",
    version,
    about = "Multi-city pet adoption directory: master and regional servers",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the master directory server
    Master {
        /// TOML configuration file (otherwise PAWMATCH_* environment)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory for server_registry.json and aggregated_data.json
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Disable CORS
        #[arg(long, default_value = "false")]
        no_cors: bool,

        /// Disable request logging
        #[arg(long, default_value = "false")]
        no_request_logging: bool,
    },

    /// Run a regional server for one city
    Region {
        /// TOML configuration file (otherwise PAWMATCH_* environment)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// City served by this region
        #[arg(long)]
        city: Option<String>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Base URL advertised to the master
        #[arg(long)]
        public_url: Option<String>,

        /// City latitude
        #[arg(long, allow_hyphen_values = true)]
        latitude: Option<f64>,

        /// City longitude
        #[arg(long, allow_hyphen_values = true)]
        longitude: Option<f64>,

        /// Master directory URL
        #[arg(short, long)]
        master_url: Option<String>,

        /// Directory for the region's collection files
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Seconds between two sync pushes
        #[arg(long)]
        sync_interval: Option<u64>,

        /// Timeout in seconds for calls to the master and peers
        #[arg(long)]
        upstream_timeout: Option<u64>,

        /// Disable CORS
        #[arg(long, default_value = "false")]
        no_cors: bool,

        /// Disable request logging
        #[arg(long, default_value = "false")]
        no_request_logging: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    setup_tracing(&cli.log_format, cli.verbose)?;

    match cli.command {
        Commands::Master {
            config,
            host,
            port,
            data_dir,
            no_cors,
            no_request_logging,
        } => {
            commands::master_server(MasterParams {
                config,
                host,
                port,
                data_dir,
                enable_cors: !no_cors,
                enable_logging: !no_request_logging,
            })
            .await?;
        }

        Commands::Region {
            config,
            city,
            host,
            port,
            public_url,
            latitude,
            longitude,
            master_url,
            data_dir,
            sync_interval,
            upstream_timeout,
            no_cors,
            no_request_logging,
        } => {
            commands::region_server(RegionParams {
                config,
                city,
                host,
                port,
                public_url,
                latitude,
                longitude,
                master_url,
                data_dir,
                sync_interval,
                upstream_timeout,
                enable_cors: !no_cors,
                enable_logging: !no_request_logging,
            })
            .await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("pawmatch=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("pawmatch=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use pawmatch::config::{MasterConfig, RegionConfig};
use pawmatch::directory::DirectoryServer;
use pawmatch::region::RegionServer;

// ============================================================================
// Master Server
// ============================================================================

/// Configuration parameters for the master server
pub struct MasterParams {
    pub config: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub data_dir: Option<PathBuf>,
    pub enable_cors: bool,
    pub enable_logging: bool,
}

/// Start the master directory server
pub async fn master_server(params: MasterParams) -> Result<()> {
    let MasterParams {
        config,
        host,
        port,
        data_dir,
        enable_cors,
        enable_logging,
    } = params;

    let mut config = match config {
        Some(path) => MasterConfig::from_file(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => MasterConfig::from_env().context("Invalid PAWMATCH_* environment")?,
    };
    config.bind_address = override_bind(config.bind_address, host.as_deref(), port)?;
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }
    config.enable_cors &= enable_cors;
    config.enable_request_logging &= enable_logging;
    config.validate().context("Invalid master configuration")?;

    println!("Starting Master Directory");
    println!("=========================");
    println!("  Bind: {}", config.bind_address);
    println!("  Data: {}", config.data_dir.display());
    println!(
        "  CORS: {}",
        if config.enable_cors { "enabled" } else { "disabled" }
    );
    println!(
        "  Request Logging: {}",
        if config.enable_request_logging {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    init_metrics();

    let server = DirectoryServer::new(config).context("Failed to create master server")?;
    server.start_with_shutdown(shutdown_signal()).await?;

    println!("Master directory stopped.");
    Ok(())
}

// ============================================================================
// Region Server
// ============================================================================

/// Configuration parameters for a regional server
pub struct RegionParams {
    pub config: Option<PathBuf>,
    pub city: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub master_url: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub sync_interval: Option<u64>,
    pub upstream_timeout: Option<u64>,
    pub enable_cors: bool,
    pub enable_logging: bool,
}

/// Start a regional server
pub async fn region_server(params: RegionParams) -> Result<()> {
    let config = resolve_region_config(params)?;

    println!("Starting Regional Server");
    println!("========================");
    println!("  City: {}", config.city);
    println!("  Bind: {}", config.bind_address);
    println!("  Advertised URL: {}", config.advertised_url());
    println!("  Coordinates: {}, {}", config.latitude, config.longitude);
    println!("  Master: {}", config.master_base_url());
    println!("  Data: {}", config.data_dir.display());
    println!("  Sync Interval: {}s", config.sync_interval_secs);
    println!("  Upstream Timeout: {}s", config.upstream_timeout_secs);
    println!();

    init_metrics();

    let server = RegionServer::new(config).context("Failed to create regional server")?;
    server.start_with_shutdown(shutdown_signal()).await?;

    println!("Regional server stopped.");
    Ok(())
}

fn resolve_region_config(params: RegionParams) -> Result<RegionConfig> {
    let mut config = match &params.config {
        Some(path) => RegionConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None if std::env::var_os("PAWMATCH_CITY").is_some() => {
            RegionConfig::from_env().context("Invalid PAWMATCH_* environment")?
        }
        None => RegionConfig::default(),
    };

    config.bind_address = override_bind(config.bind_address, params.host.as_deref(), params.port)?;
    if let Some(city) = params.city {
        config.city = city;
    }
    if let Some(url) = params.public_url {
        config.public_url = Some(url);
    }
    if let Some(latitude) = params.latitude {
        config.latitude = latitude;
    }
    if let Some(longitude) = params.longitude {
        config.longitude = longitude;
    }
    if let Some(url) = params.master_url {
        config.master_url = url;
    }
    if let Some(dir) = params.data_dir {
        config.data_dir = dir;
    }
    if let Some(secs) = params.sync_interval {
        config.sync_interval_secs = secs;
    }
    if let Some(secs) = params.upstream_timeout {
        config.upstream_timeout_secs = secs;
    }
    config.enable_cors &= params.enable_cors;
    config.enable_request_logging &= params.enable_logging;

    config.validate().context("Invalid region configuration")?;
    Ok(config)
}

// ============================================================================
// Helpers
// ============================================================================

fn override_bind(mut addr: SocketAddr, host: Option<&str>, port: Option<u16>) -> Result<SocketAddr> {
    if let Some(host) = host {
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("Invalid bind host: {host}"))?;
        addr.set_ip(ip);
    }
    if let Some(port) = port {
        addr.set_port(port);
    }
    Ok(addr)
}

fn init_metrics() {
    if let Err(e) = pawmatch::metrics::init_metrics() {
        tracing::warn!("Metrics disabled: {}", e);
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutdown signal received");
        }
        Err(e) => {
            tracing::error!("Failed to wait for Ctrl+C: {}", e);
        }
    }
}

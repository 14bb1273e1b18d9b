#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for soil map unit analysis.
//!
//! Uses `indicatif-log-bridge` (via [`soil_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod analyze;
mod input;
mod summary;
mod watch;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use soil_map_query::{ConfigError, SoilDataServiceConfig};

#[derive(Parser)]
#[command(name = "soil_map", about = "Soil map unit analysis for a study area")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the soil map units intersecting a `GeoJSON` study area
    Analyze {
        /// `GeoJSON` file (`FeatureCollection`, `Feature`, `Polygon` or `MultiPolygon`)
        #[arg(long)]
        input: PathBuf,
        /// Write the result `FeatureCollection` here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print a per-unit summary table to stderr
        #[arg(long)]
        summary: bool,
        #[command(flatten)]
        service: ServiceArgs,
    },
    /// Print the geometry fingerprint of a `GeoJSON` file
    Fingerprint {
        /// `GeoJSON` file to fingerprint
        #[arg(long)]
        input: PathBuf,
    },
    /// Re-run the analysis whenever the study area geometry changes
    Watch {
        /// `GeoJSON` file to watch
        #[arg(long)]
        input: PathBuf,
        /// Seconds between checks of the input file
        #[arg(long, default_value = "2")]
        interval_secs: u64,
        #[command(flatten)]
        service: ServiceArgs,
    },
}

/// Service and run settings shared by the analysis commands.
///
/// Flags override `SOIL_MAP_*` environment variables, which override the
/// embedded defaults.
#[derive(Args)]
struct ServiceArgs {
    /// Keep at most this many map units (0 = no limit)
    #[arg(long, default_value = "0")]
    max_results: usize,
    /// Soil Data Access tabular endpoint
    #[arg(long)]
    endpoint: Option<String>,
    /// Per-attempt timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Attempts per query, including the first
    #[arg(long)]
    max_retries: Option<u32>,
}

impl ServiceArgs {
    fn config(&self) -> Result<SoilDataServiceConfig, ConfigError> {
        let mut config = SoilDataServiceConfig::from_env()?;
        if let Some(endpoint) = &self.endpoint {
            config.endpoint.clone_from(endpoint);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        log::debug!(
            "Using {} (timeout {}s, {} attempts)",
            config.endpoint,
            config.timeout_secs,
            config.max_retries
        );
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = soil_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            output,
            summary,
            service,
        } => {
            let config = service.config()?;
            analyze::run(
                &multi,
                &config,
                &input,
                output.as_deref(),
                service.max_results,
                summary,
            )
            .await?;
        }
        Commands::Fingerprint { input } => {
            let payload = input::read_payload(&input)?;
            let fp = soil_map_geometry::fingerprint(&payload);
            println!("{fp} ({})", fp.value());
        }
        Commands::Watch {
            input,
            interval_secs,
            service,
        } => {
            let config = service.config()?;
            watch::run(&multi, &config, &input, interval_secs, service.max_results).await?;
        }
    }

    Ok(())
}

//! One-shot analysis of a study area file.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use soil_map_analysis::RunOptions;
use soil_map_cli_utils::{AnalysisProgressBar, MultiProgress};
use soil_map_query::{ExecuteOptions, HttpTransport, QueryExecutor, SoilDataServiceConfig};
use tokio_util::sync::CancellationToken;

use crate::{input, summary};

/// Runs the analysis once and writes the result `FeatureCollection`.
///
/// Ctrl-C cancels the run; the error is returned and nothing is written.
pub async fn run(
    multi: &MultiProgress,
    config: &SoilDataServiceConfig,
    input_path: &Path,
    output: Option<&Path>,
    max_results: usize,
    print_summary: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = input::read_payload(input_path)?;
    let executor = QueryExecutor::new(Arc::new(HttpTransport::new(config)?));

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling analysis");
            interrupt.cancel();
        }
    });

    let bar = AnalysisProgressBar::new(multi);
    let options = RunOptions {
        max_results,
        execute: ExecuteOptions::from_config(config, cancel),
        progress: bar.callback(),
    };

    let start = Instant::now();
    let outcome = soil_map_analysis::run(&executor, &payload, &options).await;
    ctrl_c.abort();

    let result = match outcome {
        Ok(result) => {
            bar.finish("Complete");
            result
        }
        Err(e) => {
            bar.finish_and_clear();
            return Err(e.into());
        }
    };

    log::info!(
        "Analyzed {} in {:.1}s",
        input_path.display(),
        start.elapsed().as_secs_f64()
    );

    let json = serde_json::to_string_pretty(&result.to_feature_collection())?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
            log::info!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }

    if print_summary {
        eprint!("{}", summary::format(&result));
    }

    Ok(())
}

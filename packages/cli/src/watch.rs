//! Polls a study area file and re-analyzes it only when its geometry
//! changes.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use soil_map_analysis::{AnalysisSession, ProgressCallback, RunEvent, RunMessage, Submission};
use soil_map_analysis_models::AnalysisResult;
use soil_map_cli_utils::{AnalysisProgressBar, MultiProgress};
use soil_map_query::{ExecuteOptions, HttpTransport, QueryExecutor, SoilDataServiceConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{input, summary};

/// Watches `input_path` until Ctrl-C.
pub async fn run(
    multi: &MultiProgress,
    config: &SoilDataServiceConfig,
    input_path: &Path,
    interval_secs: u64,
    max_results: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let executor = Arc::new(QueryExecutor::new(Arc::new(HttpTransport::new(config)?)));
    let mut session = AnalysisSession::new(
        executor,
        ExecuteOptions::from_config(config, CancellationToken::new()),
        max_results,
    );
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    log::info!("Watching {} (Ctrl-C to stop)", input_path.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
                break;
            }
            _ = ticker.tick() => {}
        }

        let payload = match input::read_payload(input_path) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("{e}");
                continue;
            }
        };

        match session.submit(payload, tx.clone()) {
            Submission::Unchanged(fp) => {
                log::debug!("Geometry {fp} unchanged");
                if let Some(text) = unchanged_summary(session.last_result()) {
                    eprint!("{text}");
                }
            }
            Submission::Started(run_id) => {
                log::info!("Geometry changed, starting {run_id}");
                if !follow_run(multi, &mut session, &mut rx).await {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// The previous result's summary, shown again when the geometry has not
/// changed since it was computed.
fn unchanged_summary(result: Option<&AnalysisResult>) -> Option<String> {
    result.map(summary::format)
}

/// Drives the progress bar until the current run finishes.
///
/// Returns `false` if the user interrupted.
async fn follow_run(
    multi: &MultiProgress,
    session: &mut AnalysisSession,
    rx: &mut mpsc::UnboundedReceiver<RunMessage>,
) -> bool {
    let bar = AnalysisProgressBar::new(multi);

    loop {
        let message = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
                bar.finish_and_clear();
                return false;
            }
            message = rx.recv() => message,
        };

        let Some(message) = message else {
            bar.finish_and_clear();
            return false;
        };

        match session.accept(message) {
            Some(RunEvent::Progress {
                current,
                total,
                message,
            }) => bar.report(current, total, &message),
            Some(RunEvent::Completed(result)) => {
                bar.finish("Complete");
                eprint!("{}", summary::format(&result));
                return true;
            }
            Some(RunEvent::Failed(e)) => {
                bar.finish_and_clear();
                log::error!("Analysis failed: {e}");
                return true;
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unchanged_geometry_reprints_previous_summary() {
        let previous = AnalysisResult::empty(json!({}), None);
        let text = unchanged_summary(Some(&previous)).unwrap();
        assert_eq!(text, summary::format(&previous));
        assert!(text.contains("0 map units, 0.000 acres"));
    }

    #[test]
    fn nothing_to_reprint_without_a_result() {
        assert!(unchanged_summary(None).is_none());
    }
}

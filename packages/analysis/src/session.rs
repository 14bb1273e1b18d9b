//! One logical analysis session with at most one run in flight.
//!
//! Every run gets a fresh, increasing [`RunId`] and its own cancellation
//! token. Starting a run cancels the previous one; messages tagged with a
//! superseded id are dropped by [`AnalysisSession::accept`]. The session
//! also remembers the fingerprint of the last analyzed geometry so an
//! unchanged submission reuses the previous result.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use soil_map_analysis_models::AnalysisResult;
use soil_map_geometry::{ChangeDetector, GeometryFingerprint};
use soil_map_query::{ExecuteOptions, QueryExecutor};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::AnalysisError;
use crate::pipeline::{self, RunOptions};
use crate::progress::ProgressCallback;

/// Identifier of one run within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(u64);

impl RunId {
    /// The numeric value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run #{}", self.0)
    }
}

/// The state a single run carries: its id and cancellation handle.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub id: RunId,
    pub cancel: CancellationToken,
}

/// What happened in a run.
#[derive(Debug)]
pub enum RunEvent {
    Progress {
        current: u64,
        total: u64,
        message: String,
    },
    Completed(Box<AnalysisResult>),
    Failed(AnalysisError),
}

/// A [`RunEvent`] tagged with the run that produced it.
#[derive(Debug)]
pub struct RunMessage {
    pub run_id: RunId,
    pub event: RunEvent,
}

/// Outcome of [`AnalysisSession::submit`].
#[derive(Debug)]
pub enum Submission {
    /// The geometry changed (or there is no previous result); a run was
    /// started.
    Started(RunId),
    /// The geometry is unchanged; the previous result still applies.
    Unchanged(GeometryFingerprint),
}

/// Orchestrates analysis runs for one caller.
pub struct AnalysisSession {
    executor: Arc<QueryExecutor>,
    execute: ExecuteOptions,
    max_results: usize,
    next_id: u64,
    current: Option<RunContext>,
    detector: ChangeDetector,
    last_result: Option<AnalysisResult>,
}

impl fmt::Debug for AnalysisSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisSession")
            .field("max_results", &self.max_results)
            .field("current", &self.current.as_ref().map(|run| run.id))
            .field("detector", &self.detector)
            .finish_non_exhaustive()
    }
}

impl AnalysisSession {
    /// Creates a session. `execute.cancel` is ignored; each run gets its
    /// own token.
    #[must_use]
    pub const fn new(
        executor: Arc<QueryExecutor>,
        execute: ExecuteOptions,
        max_results: usize,
    ) -> Self {
        Self {
            executor,
            execute,
            max_results,
            next_id: 0,
            current: None,
            detector: ChangeDetector::new(),
            last_result: None,
        }
    }

    /// Cancels the current run, if any, and makes a new one current.
    pub fn begin_run(&mut self) -> RunContext {
        self.cancel();
        self.next_id += 1;
        let run = RunContext {
            id: RunId(self.next_id),
            cancel: CancellationToken::new(),
        };
        log::debug!("Starting {}", run.id);
        self.current = Some(run.clone());
        run
    }

    /// Requests cancellation of the current run.
    pub fn cancel(&self) {
        if let Some(run) = &self.current
            && !run.cancel.is_cancelled()
        {
            log::debug!("Cancelling {}", run.id);
            run.cancel.cancel();
        }
    }

    /// The id of the current run.
    #[must_use]
    pub fn current_run(&self) -> Option<RunId> {
        self.current.as_ref().map(|run| run.id)
    }

    /// The most recent completed result of a current run.
    #[must_use]
    pub const fn last_result(&self) -> Option<&AnalysisResult> {
        self.last_result.as_ref()
    }

    /// Starts a new run for `payload` on a tokio task.
    ///
    /// Progress, then exactly one of `Completed` or `Failed`, are sent on
    /// `events`, each tagged with the returned id.
    pub fn spawn(
        &mut self,
        payload: Value,
        events: UnboundedSender<RunMessage>,
    ) -> (RunId, JoinHandle<()>) {
        let run = self.begin_run();
        let run_id = run.id;

        let progress_events = events.clone();
        let progress: Arc<dyn ProgressCallback> =
            Arc::new(move |current: u64, total: u64, message: &str| {
                let _ = progress_events.send(RunMessage {
                    run_id,
                    event: RunEvent::Progress {
                        current,
                        total,
                        message: message.to_string(),
                    },
                });
            });

        let options = RunOptions {
            max_results: self.max_results,
            execute: self.execute.with_cancel(run.cancel),
            progress,
        };
        let executor = Arc::clone(&self.executor);

        let handle = tokio::spawn(async move {
            let event = match pipeline::run(&executor, &payload, &options).await {
                Ok(result) => RunEvent::Completed(Box::new(result)),
                Err(e) => RunEvent::Failed(e),
            };
            if events.send(RunMessage { run_id, event }).is_err() {
                log::debug!("{run_id} finished after its receiver was dropped");
            }
        });

        (run_id, handle)
    }

    /// Starts a run unless `payload` has the same fingerprint as the last
    /// analyzed geometry and its result is still available.
    pub fn submit(&mut self, payload: Value, events: UnboundedSender<RunMessage>) -> Submission {
        let change = self.detector.check(&payload);
        if !change.is_changed() && self.last_result.is_some() {
            log::info!("Geometry unchanged ({}), reusing previous result", change.fingerprint());
            return Submission::Unchanged(change.fingerprint());
        }

        self.detector.record(change.fingerprint());
        self.last_result = None;
        let (run_id, _handle) = self.spawn(payload, events);
        Submission::Started(run_id)
    }

    /// Filters a message from the event channel.
    ///
    /// Returns `None` for messages of a superseded run. A completed result
    /// of the current run is remembered for [`Self::submit`].
    pub fn accept(&mut self, message: RunMessage) -> Option<RunEvent> {
        if self.current_run() != Some(message.run_id) {
            log::debug!("Dropping message from stale {}", message.run_id);
            return None;
        }

        match &message.event {
            RunEvent::Completed(result) => self.last_result = Some((**result).clone()),
            RunEvent::Failed(e) => {
                log::warn!("{} failed: {e}", message.run_id);
                self.detector.reset();
            }
            RunEvent::Progress { .. } => {}
        }

        Some(message.event)
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::test_support::{FakeSoilService, rectangle_collection};

    fn session(service: Arc<FakeSoilService>) -> AnalysisSession {
        AnalysisSession::new(
            Arc::new(QueryExecutor::new(service)),
            ExecuteOptions::default(),
            0,
        )
    }

    async fn finish(
        session: &mut AnalysisSession,
        rx: &mut mpsc::UnboundedReceiver<RunMessage>,
    ) -> RunEvent {
        loop {
            let message = rx.recv().await.unwrap();
            if let Some(event) = session.accept(message)
                && !matches!(event, RunEvent::Progress { .. })
            {
                return event;
            }
        }
    }

    #[test]
    fn begin_run_cancels_previous_run() {
        let mut session = session(Arc::new(FakeSoilService::default()));
        let first = session.begin_run();
        let second = session.begin_run();

        assert!(first.cancel.is_cancelled());
        assert!(!second.cancel.is_cancelled());
        assert!(second.id > first.id);
        assert_eq!(session.current_run(), Some(second.id));
    }

    #[test]
    fn stale_messages_are_dropped() {
        let mut session = session(Arc::new(FakeSoilService::default()));
        let old = session.begin_run();
        let new = session.begin_run();

        let stale = RunMessage {
            run_id: old.id,
            event: RunEvent::Progress {
                current: 40,
                total: 100,
                message: "Retrieving soil properties".to_string(),
            },
        };
        assert!(session.accept(stale).is_none());

        let fresh = RunMessage {
            run_id: new.id,
            event: RunEvent::Progress {
                current: 0,
                total: 100,
                message: "Converting geometry".to_string(),
            },
        };
        assert!(session.accept(fresh).is_some());
    }

    #[tokio::test]
    async fn unchanged_geometry_reuses_previous_result() {
        let service = Arc::new(FakeSoilService::default());
        let mut session = session(service.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let payload = rectangle_collection(0.0, 0.0, 0.01, 0.01);

        let Submission::Started(_) = session.submit(payload.clone(), tx.clone()) else {
            panic!("first submission must start a run");
        };
        assert!(matches!(finish(&mut session, &mut rx).await, RunEvent::Completed(_)));
        assert!(session.last_result().is_some());

        assert!(matches!(
            session.submit(payload, tx.clone()),
            Submission::Unchanged(_)
        ));
        assert_eq!(service.queries().len(), 1);

        let moved = rectangle_collection(0.0, 0.0, 0.01, 0.011);
        assert!(matches!(session.submit(moved, tx), Submission::Started(_)));
        assert!(session.last_result().is_none());
    }

    #[tokio::test]
    async fn superseded_run_results_are_ignored() {
        let service = Arc::new(FakeSoilService::default());
        let mut session = session(service);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let payload = rectangle_collection(0.0, 0.0, 0.01, 0.01);

        let (first, first_task) = session.spawn(payload.clone(), tx.clone());
        let (second, second_task) = session.spawn(payload, tx);
        first_task.await.unwrap();
        second_task.await.unwrap();

        let mut accepted = Vec::new();
        while let Ok(message) = rx.try_recv() {
            let run_id = message.run_id;
            if session.accept(message).is_some() {
                accepted.push(run_id);
            }
        }

        assert!(!accepted.is_empty());
        assert!(accepted.iter().all(|id| *id == second));
        assert!(!accepted.contains(&first));
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::{classify, BatchJob, CommandVerdict, HostOutcome, RunState};
use crate::error_log::{ErrorSink, FileErrorLog};
use crate::event::{BatchEvent, EventSink};
use crate::log::*;
use crate::report::Report;
use crate::session::{RemoteSession, SessionProvider};

/// Flags shared between a running batch and its cancel handles.
#[derive(Debug, Default)]
struct RunSignals {
    cancel: AtomicBool,
    complete: AtomicBool,
}

impl RunSignals {
    fn reset(&self) {
        self.cancel.store(false, Ordering::SeqCst);
        self.complete.store(false, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Returns whether the run was already complete.
    fn mark_complete(&self) -> bool {
        self.complete.swap(true, Ordering::SeqCst)
    }
}

/// Requests cooperative cancellation of a [`BatchRunner`], from any task.
///
/// The runner checks for cancellation before starting each host; a host that
/// is already connecting or executing is allowed to finish.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    signals: Arc<RunSignals>,
    sink: Arc<dyn EventSink>,
}

impl CancelHandle {
    /// Idempotent. Only the first call against a run that has not completed
    /// emits [`BatchEvent::CancellationRequested`].
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self) {
        self.signals.cancel.store(true, Ordering::SeqCst);
        if !self.signals.mark_complete() {
            info!("a cancel operation has been initiated");
            if let Err(err) = self.sink.sink(BatchEvent::CancellationRequested).await {
                warn!("error sinking cancellation event: {}", err);
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.signals.is_cancelled()
    }
}

/// Runs a [`BatchJob`] one host at a time.
#[derive(Debug)]
pub struct BatchRunner<P: SessionProvider> {
    job: BatchJob,
    provider: P,
    sink: Arc<dyn EventSink>,
    error_sink: Arc<dyn ErrorSink>,
    signals: Arc<RunSignals>,
    state: RunState,
}

impl<P: SessionProvider> BatchRunner<P> {
    /// Faults go to `error.log` in the working directory when the job has
    /// error logging enabled; see [`BatchRunner::with_error_sink`].
    pub fn new(job: BatchJob, provider: P, sink: Arc<dyn EventSink>) -> Self {
        Self {
            job,
            provider,
            sink,
            error_sink: Arc::new(FileErrorLog::default()),
            signals: Arc::new(RunSignals::default()),
            state: RunState::default(),
        }
    }

    pub fn with_error_sink(mut self, error_sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = error_sink;
        self
    }

    pub fn job(&self) -> &BatchJob {
        &self.job
    }

    /// State of the current or most recent run.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            signals: self.signals.clone(),
            sink: self.sink.clone(),
        }
    }

    /// Run the batch to completion or cancellation. Per-host failures are
    /// recorded, never raised; the report is emitted exactly once and also
    /// returned.
    #[tracing::instrument(skip(self), fields(hosts = self.job.hosts().len()))]
    pub async fn run(&mut self) -> Report {
        self.signals.reset();
        self.state = RunState::default();
        let started = Instant::now();
        let total = self.job.hosts().len();

        info!("starting batch: '{}' on {} hosts", self.job.command(), total);
        self.emit(BatchEvent::Started { total }).await;

        let mut cancelled = false;
        for host in self.job.hosts() {
            if self.signals.is_cancelled() {
                info!("batch cancelled before host {}", host);
                cancelled = true;
                break;
            }

            self.emit(BatchEvent::AttemptingHost { host: host.clone() })
                .await;
            let outcome = self.process_host(host).await;
            self.state.record(host, &outcome);

            let event = match outcome {
                HostOutcome::CommandOk => BatchEvent::HostSucceeded { host: host.clone() },
                HostOutcome::CommandFailed { reason } | HostOutcome::ConnectionFailed { reason } => {
                    BatchEvent::HostFailed {
                        host: host.clone(),
                        reason: Some(reason),
                    }
                }
            };
            self.emit(event).await;
        }

        self.state.finish(started.elapsed());
        self.signals.mark_complete();

        let report = Report::from_state(&self.state, total, cancelled);
        info!(
            "batch finished: {}/{} succeeded, {} failed",
            report.success(),
            total,
            report.failure()
        );
        self.emit(BatchEvent::Finished(report.clone())).await;
        report
    }

    /// One full session lifecycle. The session, if opened, is closed before
    /// returning on every path.
    #[tracing::instrument(skip(self))]
    async fn process_host(&self, host: &str) -> HostOutcome {
        let opened = self
            .provider
            .open(host, *self.job.port(), self.job.credentials())
            .await;
        let mut session = match opened {
            Ok(session) => session,
            Err(err) => {
                debug!("could not open session to {}: {}", host, err);
                self.record_fault(format!("Error: {}", err)).await;
                return HostOutcome::ConnectionFailed {
                    reason: err.to_string(),
                };
            }
        };

        let outcome = if !session.is_ready() {
            self.record_fault(format!(
                "Failed to connect to {}, are you sure it's up and running?",
                host
            ))
            .await;
            HostOutcome::ConnectionFailed {
                reason: "session is not ready".to_string(),
            }
        } else {
            match session.execute(self.job.command()).await {
                Ok(output) => match classify(output.text()) {
                    CommandVerdict::Ok => HostOutcome::CommandOk,
                    CommandVerdict::Failed => HostOutcome::CommandFailed {
                        reason: format!("command produced output: {}", output.text().trim()),
                    },
                },
                Err(err) => {
                    self.record_fault(format!("Error: {}", err)).await;
                    HostOutcome::CommandFailed {
                        reason: err.to_string(),
                    }
                }
            }
        };

        if let Err(err) = session.close().await {
            debug!("closing session to {} failed: {}", host, err);
        }
        outcome
    }

    async fn record_fault(&self, entry: String) {
        if !*self.job.log_errors() {
            return;
        }
        if let Err(err) = self.error_sink.record(&entry).await {
            error!("error writing to error log: {}", err);
        }
    }

    async fn emit(&self, event: BatchEvent) {
        if let Err(err) = self.sink.sink(event).await {
            warn!("error sinking batch event: {}", err);
        }
    }
}

use super::LOG_TARGET;
use super::job::{Completion, JobId, JobRecord, JobState, ProgressEvent};
use super::publisher::Publisher;
use super::store::JobStore;
use crate::pipeline::Pipeline;
use crate::{Progress, RepoSpec, Result};
use core::any::Any;
use core::time::Duration;
use futures_util::{FutureExt, Stream, stream};
use ohno::app_err;
use std::collections::{HashMap, VecDeque};
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::mpsc::error::TryRecvError;

/// Forwards pipeline progress into a job's queue.
#[derive(Debug)]
struct JobProgress {
    id: JobId,
    tx: UnboundedSender<String>,
}

impl Progress for JobProgress {
    fn set_phase(&self, phase: &str) {
        log::debug!(target: LOG_TARGET, "Job {} entered phase {phase}", self.id);
    }

    fn println(&self, msg: &str) {
        log::info!(target: LOG_TARGET, "[{}] {msg}", self.id);

        // A send only fails once the reader is gone, which must not affect the pipeline
        let _ = self.tx.send(msg.to_string());
    }

    fn done(&self) {}
}

/// Runs pipelines as independent tasks and exposes their progress as streams.
#[derive(Debug)]
pub struct JobCoordinator<P, S, U> {
    pipeline: Arc<P>,
    store: Arc<S>,
    publisher: Arc<U>,
    queues: Arc<Mutex<HashMap<JobId, UnboundedReceiver<String>>>>,
    wait: Duration,
}

impl<P, S, U> Clone for JobCoordinator<P, S, U> {
    fn clone(&self) -> Self {
        Self {
            pipeline: Arc::clone(&self.pipeline),
            store: Arc::clone(&self.store),
            publisher: Arc::clone(&self.publisher),
            queues: Arc::clone(&self.queues),
            wait: self.wait,
        }
    }
}

impl<P: Pipeline, S: JobStore, U: Publisher> JobCoordinator<P, S, U> {
    /// `wait` bounds each blocking receive of the progress stream.
    #[must_use]
    pub fn new(pipeline: P, store: S, publisher: U, wait: Duration) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            store: Arc::new(store),
            publisher: Arc::new(publisher),
            queues: Arc::new(Mutex::new(HashMap::new())),
            wait,
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Launch the pipeline for `repo` on its own task and return immediately.
    ///
    /// The job's progress lines are buffered until read. Callers must either drain them
    /// with [`Self::stream_progress`] or release them with [`Self::forget`] once the job
    /// is finished, otherwise the backlog stays in memory.
    pub async fn start(&self, repo: RepoSpec, identity: &str) -> Result<JobId> {
        let id = JobId::new();
        let mut record = JobRecord::new(id, repo.url().as_str(), identity);
        let object_name = repo.object_name(identity);

        let (tx, rx) = unbounded_channel();
        let _ = self
            .queues
            .lock()
            .map_err(|_poisoned| app_err!("job queue registry lock poisoned"))?
            .insert(id, rx);

        record.transition(JobState::Running)?;
        self.store.put(record.clone()).await?;

        log::info!(target: LOG_TARGET, "Starting job {id} for '{repo}'");

        let this = self.clone();
        let _ = tokio::spawn(async move {
            this.execute(record, repo, object_name, tx).await;
        });

        Ok(id)
    }

    async fn execute(&self, mut record: JobRecord, repo: RepoSpec, object_name: String, tx: UnboundedSender<String>) {
        let id = record.id;
        let progress = Arc::new(JobProgress { id, tx });

        // A panicking pipeline still has to reach a terminal state
        let outcome = AssertUnwindSafe(self.pipeline.run(&repo, Arc::clone(&progress) as Arc<dyn Progress>))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(app_err!("pipeline panicked: {}", panic_message(&*payload))));
        let (state, final_line) = self.settle(&mut record, outcome, &object_name).await;

        progress.println(&final_line);
        if let Err(e) = record.transition(state) {
            log::error!(target: LOG_TARGET, "{e}");
        }

        // The terminal state must be visible before the channel closes
        if let Err(e) = self.store.put(record).await {
            log::error!(target: LOG_TARGET, "Could not record the outcome of job {id}: {e}");
        }

        log::info!(target: LOG_TARGET, "Job {id} finished as {state}");
        drop(progress);
    }

    /// Decide the terminal state from the pipeline outcome and publish on success.
    async fn settle(&self, record: &mut JobRecord, outcome: Result<PathBuf>, object_name: &str) -> (JobState, String) {
        let report_path = match outcome {
            Ok(path) => path,
            Err(e) => return (JobState::Failed, format!("Analysis failed: {e}")),
        };

        if !tokio::fs::try_exists(&report_path).await.unwrap_or(false) {
            return (
                JobState::Failed,
                format!("Analysis finished but the report '{}' was not produced", report_path.display()),
            );
        }

        record.report_path = Some(report_path.clone());

        match self.publisher.publish(&report_path, object_name).await {
            Ok(location) => {
                let line = format!("Report published to {location}");
                record.result_location = Some(location);
                (JobState::Succeeded, line)
            }
            Err(e) => (
                JobState::Failed,
                format!("Analysis succeeded but publishing '{}' failed: {e}", report_path.display()),
            ),
        }
    }

    /// Drop a finished job from the registry, returning its final record.
    ///
    /// Jobs that are still running are left alone.
    pub async fn forget(&self, id: JobId) -> Result<Option<JobRecord>> {
        match self.store.get(id).await? {
            Some(record) if !record.state.is_terminal() => {
                log::debug!(target: LOG_TARGET, "Not forgetting job {id} while it is {}", record.state);
                Ok(None)
            }
            Some(_) => {
                let _ = self
                    .queues
                    .lock()
                    .map_err(|_poisoned| app_err!("job queue registry lock poisoned"))?
                    .remove(&id);
                self.store.delete(id).await
            }
            None => Ok(None),
        }
    }

    /// The progress lines of a job followed by exactly one [`ProgressEvent::Done`].
    ///
    /// Lines are delivered to the first reader only. Later readers see just the
    /// terminal event once the job completes.
    pub fn stream_progress(&self, id: JobId) -> impl Stream<Item = ProgressEvent> + Send + use<P, S, U> {
        let rx = self.queues.lock().ok().and_then(|mut queues| queues.remove(&id));

        let state = StreamState {
            store: Arc::clone(&self.store),
            rx,
            id,
            wait: self.wait,
            pending: VecDeque::new(),
            finished: false,
        };

        stream::unfold(state, |mut state| async move {
            let event = state.next_event().await?;
            Some((event, state))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause")
}

struct StreamState<S> {
    store: Arc<S>,
    rx: Option<UnboundedReceiver<String>>,
    id: JobId,
    wait: Duration,
    pending: VecDeque<ProgressEvent>,
    finished: bool,
}

impl<S: JobStore> StreamState<S> {
    async fn next_event(&mut self) -> Option<ProgressEvent> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        if self.finished {
            return None;
        }

        loop {
            let received = match self.rx.as_mut() {
                Some(rx) => tokio::time::timeout(self.wait, rx.recv()).await,
                None => {
                    tokio::time::sleep(self.wait).await;
                    Ok(None)
                }
            };

            if let Ok(Some(line)) = received {
                return Some(ProgressEvent::Line(line));
            }

            // Timed out or the producer is gone: look at the job's state
            if let Some(completion) = self.terminal_completion().await {
                self.drain();
                self.pending.push_back(ProgressEvent::Done(completion));
                self.finished = true;
                return self.pending.pop_front();
            }

            if matches!(received, Ok(None)) && self.rx.is_some() {
                // Channel closed but the job is not terminal; stop holding the receiver
                self.rx = None;
            }
        }
    }

    /// The completion of a finished job, or of a job that no longer exists.
    async fn terminal_completion(&self) -> Option<Completion> {
        match self.store.get(self.id).await {
            Ok(Some(record)) if record.state.is_terminal() => Some(record.completion()),
            Ok(Some(_)) => None,
            Ok(None) => {
                log::warn!(target: LOG_TARGET, "Job {} is unknown", self.id);
                Some(unknown_job())
            }
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Could not read state of job {}: {e}", self.id);
                None
            }
        }
    }

    /// Move any lines still queued ahead of the terminal event.
    fn drain(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return;
        };

        loop {
            match rx.try_recv() {
                Ok(line) => self.pending.push_back(ProgressEvent::Line(line)),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }
}

const fn unknown_job() -> Completion {
    Completion {
        success: false,
        result_location: None,
        report_path: None,
    }
}

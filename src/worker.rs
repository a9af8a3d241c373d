//! Background organize runs.
//!
//! [`spawn_run`] moves a run off the calling thread. The worker owns its mapping,
//! emits plain [`RunEvent`]s over a channel and never touches caller state; the
//! thread holding the [`RunHandle`] decides when and where to apply them.
use crate::category::CategoryMapping;
use crate::organizer::{OrganizeEngine, OrganizeError, OrganizeResult, RunReport};
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::debug;

/// Messages sent from a worker to its [`RunHandle`].
#[derive(Debug)]
pub enum RunEvent {
    /// One more file was processed.
    Progress { processed: usize, total: usize },
    /// The run ended. Always the last event.
    Finished(OrganizeResult<RunReport>),
}

/// Errors surfaced by [`RunHandle::wait`].
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The worker thread could not be started.
    #[error("failed to start organize worker: {0}")]
    Spawn(#[source] io::Error),
    /// The run itself failed.
    #[error(transparent)]
    Run(#[from] OrganizeError),
    /// The worker exited without reporting a result.
    #[error("organize worker stopped before reporting a result")]
    Disconnected,
}

/// Caller side of a background run.
pub struct RunHandle {
    events: Receiver<RunEvent>,
    thread: Option<JoinHandle<()>>,
}

/// Starts an organize run of `target` on a new thread.
///
/// # Examples
///
/// ```no_run
/// use springclean::category::CategoryMapping;
/// use springclean::worker::spawn_run;
///
/// let handle = spawn_run("/home/user/Downloads".into(), CategoryMapping::builtin())
///     .expect("worker should start");
/// let report = handle
///     .wait(|processed, total| println!("{processed}/{total}"))
///     .expect("run should finish");
/// println!("moved {}", report.moved());
/// ```
pub fn spawn_run(target: PathBuf, mapping: CategoryMapping) -> Result<RunHandle, WorkerError> {
    let (tx, rx) = mpsc::channel();

    let thread = thread::Builder::new()
        .name("springclean-run".to_string())
        .spawn(move || {
            debug!(dir = %target.display(), "worker started");
            let progress_tx = tx.clone();
            let mut sink = move |processed: usize, total: usize| {
                // A handle that went away no longer wants progress.
                let _ = progress_tx.send(RunEvent::Progress { processed, total });
            };
            let result = OrganizeEngine::new(&mapping).run(&target, &mut sink);
            let _ = tx.send(RunEvent::Finished(result));
        })
        .map_err(WorkerError::Spawn)?;

    Ok(RunHandle {
        events: rx,
        thread: Some(thread),
    })
}

impl RunHandle {
    /// Returns the next pending event without blocking, or `Ok(None)` if none is queued.
    ///
    /// Suited to event loops that poll between frames. Once the worker has gone away
    /// and every event is drained this returns [`WorkerError::Disconnected`], including
    /// after [`RunEvent::Finished`] was delivered.
    pub fn poll(&self) -> Result<Option<RunEvent>, WorkerError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(WorkerError::Disconnected),
        }
    }

    /// Blocks until the run ends, feeding progress events to `on_progress`.
    pub fn wait<F>(mut self, mut on_progress: F) -> Result<RunReport, WorkerError>
    where
        F: FnMut(usize, usize),
    {
        let outcome = loop {
            match self.events.recv() {
                Ok(RunEvent::Progress { processed, total }) => on_progress(processed, total),
                Ok(RunEvent::Finished(result)) => break result.map_err(WorkerError::from),
                Err(_) => break Err(WorkerError::Disconnected),
            }
        };
        self.join();
        outcome
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            debug!("organize worker panicked");
        }
    }
}

//! Dedicated-thread executor for window mutations

use crate::models::{FailureReason, WindowHandle};
use crate::platform::WindowSystem;
use crate::{Result, UltrawideError};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

/// Default bound on a single OS mutation
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_millis(1000);

const OPERATOR_THREAD_NAME: &str = "ultrawide-window-operator";

type Job = Box<dyn FnOnce(&dyn WindowSystem) + Send>;

/// Worker threads draining the job queue.
///
/// Normally one thread runs. When a job overruns its timeout the thread
/// running it is written off: a replacement is started so the queue keeps
/// moving, and the stuck thread retires as soon as its job returns.
struct Workers {
    system: Arc<dyn WindowSystem>,
    queue: Mutex<mpsc::UnboundedReceiver<Job>>,
    /// Threads that should exit after their current job
    retiring: AtomicUsize,
    /// Windows with a timed-out call still running
    stalled: Mutex<HashSet<WindowHandle>>,
}

impl Workers {
    fn spawn(self: &Arc<Self>) -> Result<()> {
        let workers = Arc::clone(self);
        std::thread::Builder::new()
            .name(OPERATOR_THREAD_NAME.to_string())
            .spawn(move || workers.drain())
            .map(|_| ())
            .map_err(|e| {
                UltrawideError::PlatformError(format!("Failed to start window operator: {}", e))
                    .into()
            })
    }

    fn drain(&self) {
        debug!("Window operator thread started");
        loop {
            if self.take_retirement() {
                debug!("Window operator thread retired after a timed-out call");
                return;
            }
            let job = match self.queue.lock() {
                Ok(mut queue) => queue.blocking_recv(),
                Err(_) => None,
            };
            let Some(job) = job else {
                break;
            };
            job(self.system.as_ref());
        }
        debug!("Window operator thread stopped");
    }

    fn take_retirement(&self) -> bool {
        self.retiring
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Write off the thread stuck on a timed-out job and start another
    fn replace_stuck_worker(self: &Arc<Self>) {
        self.retiring.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = self.spawn() {
            self.retiring.fetch_sub(1, Ordering::SeqCst);
            warn!("{}", err);
        }
    }

    fn stalled(&self) -> MutexGuard<'_, HashSet<WindowHandle>> {
        self.stalled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs every mutating window call on a dedicated OS thread.
///
/// Native windowing APIs expect affinity with a single thread, so callers
/// submit closures over a channel and await the result with a timeout. A
/// call that does not finish in time is reported as [`FailureReason::TimedOut`]
/// for that window only. Later calls for the same window fail fast until the
/// stuck call returns, and calls for other windows move on to a fresh thread.
pub struct WindowOperator {
    system: Arc<dyn WindowSystem>,
    workers: Arc<Workers>,
    sender: mpsc::UnboundedSender<Job>,
    operation_timeout: Duration,
}

impl WindowOperator {
    pub fn new(system: Arc<dyn WindowSystem>, operation_timeout: Duration) -> Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let workers = Arc::new(Workers {
            system: Arc::clone(&system),
            queue: Mutex::new(receiver),
            retiring: AtomicUsize::new(0),
            stalled: Mutex::new(HashSet::new()),
        });
        workers.spawn()?;

        Ok(Self {
            system,
            workers,
            sender,
            operation_timeout,
        })
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Run `call` against `handle` on the operator thread.
    ///
    /// The handle is re-validated and checked for responsiveness right before
    /// the call is queued.
    pub async fn run<T, F>(&self, handle: WindowHandle, call: F) -> std::result::Result<T, FailureReason>
    where
        T: Send + 'static,
        F: FnOnce(&dyn WindowSystem) -> Result<T> + Send + 'static,
    {
        if !self.system.is_window(handle) {
            return Err(FailureReason::StaleHandle);
        }
        if !self.system.is_responsive(handle) {
            return Err(FailureReason::Unresponsive);
        }
        if self.workers.stalled().contains(&handle) {
            debug!("{} still has a timed-out call running", handle);
            return Err(FailureReason::TimedOut);
        }

        self.submit(Some(handle), call)
            .await
            .map_err(|reason| self.classify(handle, reason))
    }

    /// Run a call that is not tied to a window (for example a process priority change)
    pub async fn run_detached<T, F>(&self, call: F) -> std::result::Result<T, FailureReason>
    where
        T: Send + 'static,
        F: FnOnce(&dyn WindowSystem) -> Result<T> + Send + 'static,
    {
        self.submit(None, call).await
    }

    async fn submit<T, F>(&self, handle: Option<WindowHandle>, call: F) -> std::result::Result<T, FailureReason>
    where
        T: Send + 'static,
        F: FnOnce(&dyn WindowSystem) -> Result<T> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let finished = Arc::new(AtomicBool::new(false));
        let job_finished = Arc::clone(&finished);
        let workers = Arc::clone(&self.workers);

        let job: Job = Box::new(move |system| {
            let result = call(system);
            {
                // flag and set share the lock so a late timeout cannot leave the handle stalled
                let mut stalled = workers.stalled();
                job_finished.store(true, Ordering::SeqCst);
                if let Some(handle) = handle {
                    stalled.remove(&handle);
                }
            }
            // the caller may have timed out and dropped the receiver
            let _ = reply.send(result);
        });

        if self.sender.send(job).is_err() {
            return Err(FailureReason::Platform(
                "window operator thread is not running".into(),
            ));
        }

        match timeout(self.operation_timeout, response).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(reason_for(&err)),
            Ok(Err(_)) => Err(FailureReason::Platform(
                "window operator dropped the request".into(),
            )),
            Err(_) => {
                warn!(
                    "Window operation exceeded {:?}; reporting as timed out",
                    self.operation_timeout
                );
                self.write_off(handle, &finished);
                Err(FailureReason::TimedOut)
            }
        }
    }

    fn write_off(&self, handle: Option<WindowHandle>, finished: &AtomicBool) {
        {
            let mut stalled = self.workers.stalled();
            if finished.load(Ordering::SeqCst) {
                return;
            }
            if let Some(handle) = handle {
                stalled.insert(handle);
            }
        }
        self.workers.replace_stuck_worker();
    }

    fn classify(&self, handle: WindowHandle, reason: FailureReason) -> FailureReason {
        match reason {
            FailureReason::Platform(message) if !self.system.is_window(handle) => {
                trace!("{} closed during operation: {}", handle, message);
                FailureReason::StaleHandle
            }
            other => other,
        }
    }
}

fn reason_for(err: &anyhow::Error) -> FailureReason {
    match err.downcast_ref::<UltrawideError>() {
        Some(UltrawideError::WindowNotFound(_)) | Some(UltrawideError::StaleHandle(_)) => {
            FailureReason::StaleHandle
        }
        _ => FailureReason::Platform(err.to_string()),
    }
}

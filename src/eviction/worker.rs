//! Dedicated cleanup thread for [`CleanupMode::Background`].
//!
//! ```text
//!   put threads                         worker thread
//!   ───────────                         ─────────────
//!   signal() ──► pending = true ──┐     loop {
//!   signal() ──► (already set)    │       wait until pending || shutdown
//!                                 └──►    pending = false
//!                                         task()            ← run_cleanup
//!                                       }
//! ```
//!
//! Signals coalesce: any number of `signal` calls before the worker wakes
//! produce one task run. The signal lock is only held to flip a flag, never
//! while the task runs.
//!
//! [`CleanupMode::Background`]: crate::eviction::CleanupMode::Background

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct SignalState {
    pending: bool,
    shutdown: bool,
}

#[derive(Debug, Default)]
struct WorkerSignal {
    state: Mutex<SignalState>,
    wakeup: Condvar,
    requests: AtomicU64,
    runs: AtomicU64,
}

/// Handle to a running cleanup thread. Stops and joins the thread on drop.
#[derive(Debug)]
pub struct CleanupWorker {
    signal: Arc<WorkerSignal>,
    handle: Option<JoinHandle<()>>,
}

impl CleanupWorker {
    /// Spawns a named thread that runs `task` once per coalesced signal.
    pub fn spawn<F>(name: impl Into<String>, mut task: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let signal = Arc::new(WorkerSignal::default());
        let worker_signal = Arc::clone(&signal);
        let name = name.into();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            tracing::debug!(thread = %name, "cache cleanup worker started");
            loop {
                {
                    let mut state = worker_signal.state.lock();
                    while !state.pending && !state.shutdown {
                        worker_signal.wakeup.wait(&mut state);
                    }
                    if state.shutdown {
                        break;
                    }
                    state.pending = false;
                }
                task();
                worker_signal.runs.fetch_add(1, Ordering::Relaxed);
            }
            tracing::debug!(thread = %name, "cache cleanup worker stopped");
        })?;
        Ok(Self {
            signal,
            handle: Some(handle),
        })
    }

    /// Requests a task run. Never waits for the task.
    pub fn signal(&self) {
        self.signal.requests.fetch_add(1, Ordering::Relaxed);
        let mut state = self.signal.state.lock();
        if !state.pending {
            state.pending = true;
            self.signal.wakeup.notify_one();
        }
    }

    /// Number of `signal` calls so far.
    pub fn requests(&self) -> u64 {
        self.signal.requests.load(Ordering::Relaxed)
    }

    /// Number of completed task runs.
    pub fn runs(&self) -> u64 {
        self.signal.runs.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stops the thread after its current task run and joins it.
    /// Calling it again is a no-op.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        {
            let mut state = self.signal.state.lock();
            state.shutdown = true;
            self.signal.wakeup.notify_all();
        }
        if handle.join().is_err() {
            tracing::error!("cache cleanup worker panicked");
        }
    }
}

impl Drop for CleanupWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

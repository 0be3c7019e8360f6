//! Fixed-size pool of compaction loops sharing one queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::compactor::Compactor;

pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` loops on the current tokio runtime.
    pub fn spawn(compactor: Arc<Compactor>, workers: usize, idle_poll_interval: Duration) -> Self {
        let (shutdown, rx) = watch::channel(false);
        let handles = (0..workers)
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&compactor),
                    idle_poll_interval,
                    rx.clone(),
                ))
            })
            .collect();
        info!(workers, "compaction workers started");
        Self { shutdown, handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signal every loop to stop and wait for them. A pass that is already
    /// running completes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "compaction worker panicked");
            }
        }
        info!("compaction workers stopped");
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.handles.len())
            .finish()
    }
}

async fn run_worker(
    worker: usize,
    compactor: Arc<Compactor>,
    idle_poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!(worker, "compaction worker running");
    loop {
        if *shutdown.borrow() {
            break;
        }
        match compactor.cache().dequeue() {
            Some(item) => {
                compactor.process(item).await;
            }
            None => {
                tokio::select! {
                    _ = tokio::time::sleep(idle_poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    debug!(worker, "compaction worker exiting");
}

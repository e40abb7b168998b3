//! Fire-and-forget background work that must still finish before exit.
//!
//! Cache and KV writes are spawned here so they never delay a response, but
//! the process drains the tracker on shutdown so no accepted write is lost
//! to reclamation. Task failures are logged, never propagated to requests.
use std::future::Future;

use tokio_util::task::TaskTracker;

/// Handle for spawning detached write tasks. Cheap to clone; all clones share
/// one tracker.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Spawn a background task. The task owns its error handling: failures
    /// are logged under `label` and never reach the request path.
    pub fn spawn<F>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = eyre::Result<()>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            if let Err(e) = fut.await {
                tracing::warn!("Background task '{}' failed: {:#}", label, e);
            }
        });
    }

    /// Number of tasks still running.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Wait until every spawned task has finished. The tracker stays usable
    /// afterwards; new tasks may still be spawned.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

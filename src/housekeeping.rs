//! Detached background maintenance.
//!
//! Work runs on the blocking pool. Failures are logged and never reach the
//! command that spawned them.

use std::fmt::Display;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Run `job` in the background. It returns how many items it processed.
///
/// The handle is returned for tests; callers normally drop it.
pub fn spawn<F, E>(name: &'static str, job: F) -> JoinHandle<()>
where
    F: FnOnce() -> Result<usize, E> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::task::spawn_blocking(move || match job() {
        Ok(count) => debug!(task = name, count, "housekeeping finished"),
        Err(e) => warn!(task = name, error = %e, "housekeeping failed"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn runs_job() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        spawn("test", move || {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, std::io::Error>(1)
        })
        .await
        .unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failure_does_not_propagate() {
        let handle = spawn("failing", || Err::<usize, _>("disk on fire"));
        assert!(handle.await.is_ok());
    }
}

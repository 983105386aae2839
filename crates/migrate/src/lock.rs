//! Migration lock coordination
//!
//! [`with_lock`] runs a body while holding the backend's migration lock,
//! giving up when the lock is not obtained within the timeout.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backends::{Backend, DatabasePool};
use crate::error::{MigrateError, MigrateResult};

/// Run `body` while holding the migration lock
///
/// Acquisition is abandoned once `timeout` elapses. The pending acquire is
/// dropped, which closes its session, so a lock granted after the deadline
/// does not outlive this call. On timeout the body never runs.
///
/// When both the body and the release fail, the body's error is returned.
pub async fn with_lock<T, F, Fut>(
    backend: &dyn Backend,
    pool: &DatabasePool,
    timeout: Duration,
    body: F,
) -> MigrateResult<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = MigrateResult<T>>,
{
    debug!(backend = %backend.kind(), timeout_secs = timeout.as_secs(), "acquiring migration lock");

    let token = match tokio::time::timeout(timeout, backend.acquire_lock(pool)).await {
        Ok(acquired) => acquired?,
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs(), "gave up waiting for migration lock");
            return Err(MigrateError::LockTimeout { waited: timeout });
        }
    };
    debug!("migration lock acquired");

    let outcome = body().await;

    match backend.release_lock(token).await {
        Ok(()) => {
            debug!("migration lock released");
            outcome
        }
        Err(release_err) => match outcome {
            Ok(_) => Err(release_err),
            Err(body_err) => {
                warn!(error = %release_err, "failed to release migration lock");
                Err(body_err)
            }
        },
    }
}

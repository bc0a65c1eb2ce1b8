//! Cancellable execution of blocking diesel work
//!
//! Diesel connections are synchronous, so every repository operation runs
//! on the blocking pool. Dropping the caller's future cannot stop a
//! statement that is already on the wire; instead a watcher task waits on
//! the caller's token and asks PostgreSQL to cancel the backend serving the
//! operation. The statement fails, the open transaction rolls back, and the
//! connection goes back to the pool.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::database::connection::DatabasePool;
use crate::database::errors::RepositoryError;

diesel::define_sql_function! {
    /// Process id of the server backend serving the current connection
    fn pg_backend_pid() -> Integer;
}

diesel::define_sql_function! {
    fn pg_cancel_backend(pid: Integer) -> Bool;
}

/// Fail fast once the caller has given up
pub(crate) fn ensure_active(cancel: &CancellationToken) -> Result<(), RepositoryError> {
    if cancel.is_cancelled() {
        return Err(RepositoryError::Cancelled);
    }
    Ok(())
}

/// Backend currently executing an operation
///
/// The pid is only set while the connection is checked out. The watcher
/// holds the lock while cancelling, so the connection cannot be handed to
/// another operation in the meantime.
#[derive(Default)]
struct InFlight {
    pid: Mutex<Option<i32>>,
    finished: CancellationToken,
}

impl InFlight {
    fn lock_pid(&self) -> MutexGuard<'_, Option<i32>> {
        self.pid.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the registered pid on drop, before the connection is released
struct Registration<'a> {
    in_flight: &'a InFlight,
}

impl<'a> Registration<'a> {
    fn new(in_flight: &'a InFlight, pid: i32) -> Self {
        *in_flight.lock_pid() = Some(pid);
        Self { in_flight }
    }
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        *self.in_flight.lock_pid() = None;
    }
}

/// Run `work` on a pooled connection inside `spawn_blocking`
///
/// # Arguments
/// * `pool` - Pool to check the connection out of
/// * `cancel` - Caller's cancellation signal
/// * `operation` - Name used in log lines
/// * `work` - Statements to run; receives the token to re-check between statements
///
/// # Returns
/// * `Err(RepositoryError::Cancelled)` if the token fired and the work did not complete
/// * otherwise whatever `work` returned
pub(crate) async fn run_blocking<T, F>(
    pool: &DatabasePool,
    cancel: &CancellationToken,
    operation: &'static str,
    work: F,
) -> Result<T, RepositoryError>
where
    T: Send + 'static,
    F: FnOnce(&mut PgConnection, &CancellationToken) -> Result<T, RepositoryError> + Send + 'static,
{
    ensure_active(cancel)?;

    let in_flight = Arc::new(InFlight::default());

    let task_pool = pool.clone();
    let task_cancel = cancel.clone();
    let task_in_flight = Arc::clone(&in_flight);
    let handle = tokio::task::spawn_blocking(move || {
        let _finished = task_in_flight.finished.clone().drop_guard();

        let mut conn = task_pool.get_conn()?;
        let pid = diesel::select(pg_backend_pid()).get_result::<i32>(&mut conn)?;
        let _registration = Registration::new(&task_in_flight, pid);

        ensure_active(&task_cancel)?;
        work(&mut conn, &task_cancel)
    });

    tokio::spawn(watch_for_cancellation(
        pool.clone(),
        cancel.clone(),
        in_flight,
        operation,
    ));

    let result = handle
        .await
        .map_err(|e| RepositoryError::TaskFailed(e.to_string()))?;

    match result {
        Err(e) if cancel.is_cancelled() && !e.is_cancelled() => {
            tracing::warn!(operation, error = %e, "Operation aborted by cancellation");
            Err(RepositoryError::Cancelled)
        }
        other => other,
    }
}

async fn watch_for_cancellation(
    pool: DatabasePool,
    cancel: CancellationToken,
    in_flight: Arc<InFlight>,
    operation: &'static str,
) {
    let finished = in_flight.finished.clone();

    tokio::select! {
        _ = finished.cancelled() => {}
        _ = cancel.cancelled() => {
            let outcome = tokio::task::spawn_blocking(move || cancel_backend(&pool, &in_flight)).await;

            match outcome {
                Ok(Ok(Some(pid))) => {
                    tracing::warn!(operation, pid, "Cancelled in-flight statement");
                }
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(operation, error = %e, "Failed to cancel in-flight statement");
                }
                Err(e) => {
                    tracing::warn!(operation, error = %e, "Cancellation task failed");
                }
            }
        }
    }
}

fn cancel_backend(pool: &DatabasePool, in_flight: &InFlight) -> Result<Option<i32>, RepositoryError> {
    if in_flight.lock_pid().is_none() {
        // Connection not checked out yet, or already released
        return Ok(None);
    }

    // Never wait on a pool while holding the pid lock: the worker takes it
    // on release and would keep its connection until the wait gives up
    let mut conn = pool.get_cancel_conn()?;

    let registered = in_flight.lock_pid();
    let Some(pid) = *registered else {
        return Ok(None);
    };

    diesel::select(pg_cancel_backend(pid)).get_result::<bool>(&mut conn)?;

    Ok(Some(pid))
}

use crate::{Error, Result};

use futures::FutureExt;
use tokio::task::JoinHandle;
use tracing::error;

/// One blocking operation running off the scheduling thread.
///
/// A worker is never awaited: the owner polls [Worker::is_finished] from its own
/// schedule and collects the outcome once.
pub struct Worker<T> {
    handle: JoinHandle<T>,
}

impl<T: Send + 'static> Worker<T> {
    pub fn spawn<F>(job: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Worker { handle: tokio::task::spawn_blocking(job) }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Takes the outcome of a finished worker, `None` while it is still running.
    /// Must not be called again once it returned `Some`.
    pub fn try_finish(&mut self) -> Option<Result<T>> {
        (&mut self.handle).now_or_never().map(|joined| {
            joined.map_err(|err| {
                error!("worker failed to join: {}", err);
                Error::JoinError
            })
        })
    }
}

/// Removes every finished worker from `workers`, returning their outcomes keyed by the
/// tag they were tracked with. Workers still running are kept in place.
pub fn drain_finished<K, T: Send + 'static>(workers: &mut Vec<(K, Worker<T>)>) -> Vec<(K, Result<T>)> {
    let (finished, running): (Vec<_>, Vec<_>) =
        workers.drain(..).partition(|(_, worker)| worker.is_finished());
    *workers = running;

    let mut done = vec![];
    for (key, mut worker) in finished {
        match worker.try_finish() {
            Some(outcome) => done.push((key, outcome)),
            // `is_finished` was already observed
            None => workers.push((key, worker)),
        }
    }
    done
}

//! Two-phase handoff between a construction function and its consumer.
//!
//! Construction publishes its value through one oneshot channel and then
//! parks on a second one until the consumer says how to finish:
//!
//! ```text
//! construction                     consumer
//!     | --- value ------------------> |
//!     |        (parked)               | runs test body
//!     | <-- Release::{Destroy,Skip} - |
//!     | runs cleanup, or leaves early |
//! ```
//!
//! On [`Release::Skip`] the expose call returns `Err(Skipped)`, so a
//! construction written as `expose.expose(value).await?` never reaches its
//! cleanup.

use futures::future::{self, BoxFuture, Either, FutureExt};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::error::{FactoryError, Result, Skipped};

/// How the consumer finished with an exposed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Run the cleanup that follows the expose point.
    Destroy,
    /// Finish without cleanup.
    Skip,
}

impl Release {
    pub fn from_should_destroy(should_destroy: bool) -> Self {
        if should_destroy {
            Self::Destroy
        } else {
            Self::Skip
        }
    }
}

/// The construction side of a handoff.
///
/// Passed to callback-style construction functions. Call
/// [`expose`](Self::expose) exactly once and propagate its error with `?`;
/// anything after that point is cleanup.
#[derive(Debug)]
pub struct Expose<T> {
    value_tx: oneshot::Sender<T>,
    release_rx: oneshot::Receiver<Release>,
}

impl<T> Expose<T> {
    /// Publish `value` and wait for the consumer to finish with it.
    ///
    /// Returns `Ok(())` when cleanup should run and [`Skipped`] otherwise. A
    /// consumer that went away counts as a skip.
    pub async fn expose(self, value: T) -> std::result::Result<(), Skipped> {
        if self.value_tx.send(value).is_err() {
            debug!("exposed value has no consumer");
            return Err(Skipped);
        }
        match self.release_rx.await.unwrap_or(Release::Skip) {
            Release::Destroy => Ok(()),
            Release::Skip => Err(Skipped),
        }
    }
}

/// The consumer side of a handoff.
#[derive(Debug)]
pub struct Exposure<T> {
    value_rx: oneshot::Receiver<T>,
    release_tx: oneshot::Sender<Release>,
}

/// Create a connected pair.
pub fn handoff<T>() -> (Expose<T>, Exposure<T>) {
    let (value_tx, value_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel();
    (
        Expose {
            value_tx,
            release_rx,
        },
        Exposure {
            value_rx,
            release_tx,
        },
    )
}

/// A construction parked at its expose point.
pub(crate) struct Suspended {
    factory: String,
    release_tx: oneshot::Sender<Release>,
    task: BoxFuture<'static, Result<()>>,
}

impl Suspended {
    /// Resume the construction and wait for it to complete.
    ///
    /// A construction that leaves with [`Skipped`] completes normally. Other
    /// failures after a [`Release::Skip`] are logged and dropped.
    pub(crate) async fn finish(self, release: Release) -> Result<()> {
        trace!(factory = %self.factory, ?release, "releasing constructed value");
        // the construction may already be gone; its result still tells us how it ended
        let _ = self.release_tx.send(release);
        match (release, self.task.await) {
            (_, Ok(())) => Ok(()),
            (_, Err(err)) if err.is_skipped() => {
                trace!(factory = %self.factory, "construction left without cleanup");
                Ok(())
            }
            (Release::Destroy, Err(err)) => Err(err),
            (Release::Skip, Err(err)) => {
                debug!(
                    factory = %self.factory,
                    error = %err,
                    "discarding failure from skipped cleanup"
                );
                Ok(())
            }
        }
    }
}

/// Drive `task` until it exposes a value through `exposure`.
///
/// Returns the value together with the parked construction. A task that
/// fails first reports its own error; one that completes without exposing
/// anything reports [`FactoryError::NotExposed`].
pub(crate) async fn acquire<T>(
    factory: &str,
    exposure: Exposure<T>,
    task: BoxFuture<'static, Result<()>>,
) -> Result<(T, Suspended)>
where
    T: Send + 'static,
{
    let Exposure {
        value_rx,
        release_tx,
    } = exposure;

    match future::select(value_rx, task).await {
        Either::Left((Ok(value), task)) => Ok((
            value,
            Suspended {
                factory: factory.to_string(),
                release_tx,
                task,
            },
        )),
        // the sender was dropped without a value; the task says why
        Either::Left((Err(_), task)) => {
            task.await?;
            Err(FactoryError::NotExposed {
                factory: factory.to_string(),
            })
        }
        Either::Right((result, _)) => {
            result?;
            Err(FactoryError::NotExposed {
                factory: factory.to_string(),
            })
        }
    }
}

/// Box a construction future and map its error into [`FactoryError`].
pub(crate) fn boxed_task<F>(task: F) -> BoxFuture<'static, Result<()>>
where
    F: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
{
    task.map(|result| result.map_err(FactoryError::Construction))
        .boxed()
}

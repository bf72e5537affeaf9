//! Generic subsystem runtime — shared scaffolding for long-running channels.
//!
//! # Component model
//!
//! A [`Component`] is any independently-runnable unit: the Telegram poller,
//! the HTTP listener. The owner constructs components with their shared
//! state already captured inside them, then hands them to
//! [`spawn_components`].
//!
//! # SubsystemHandle
//!
//! [`spawn_components`] returns a [`SubsystemHandle`] that the caller can
//! `.await` (blocking until all components finish) or hold onto while doing
//! other work — the components run concurrently regardless.
//! Any component error cancels the shared [`CancellationToken`] so sibling
//! components shut down cleanly.

use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::AppError;

// ── Component ─────────────────────────────────────────────────────────────────

/// A boxed, owned future returned by [`Component::run`].
pub type ComponentFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

/// A self-contained, concurrently-runnable unit.
///
/// Implementors capture all shared state (`Arc<CommsState>`, credentials, …)
/// at construction time. [`Component::run`] is called once by
/// [`spawn_components`] and should run until `shutdown` is cancelled or the
/// component's own work is done.
pub trait Component: Send + 'static {
    /// Stable identifier used in log messages.
    fn id(&self) -> &str;

    /// Consume the component and return its async run-loop as a boxed future.
    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture;
}

// ── SubsystemHandle ───────────────────────────────────────────────────────────

/// An opaque handle to a running component set.
pub struct SubsystemHandle {
    inner: JoinHandle<Result<(), AppError>>,
    components: Vec<String>,
}

impl SubsystemHandle {
    /// Ids of the spawned components, in spawn order.
    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Await all components and return the first error, if any.
    pub async fn join(self) -> Result<(), AppError> {
        match self.inner.await {
            Ok(r) => r,
            Err(e) => Err(AppError::Comms(format!("subsystem task panicked: {e}"))),
        }
    }
}

// ── spawn_components ──────────────────────────────────────────────────────────

/// Spawn each [`Component`] as an independent Tokio task and return a
/// [`SubsystemHandle`] that resolves when all components have exited.
///
/// If any component returns `Err` or panics, `shutdown` is cancelled and the
/// first error is returned once the remaining components have drained.
pub fn spawn_components(
    components: Vec<Box<dyn Component>>,
    shutdown: CancellationToken,
) -> SubsystemHandle {
    let ids: Vec<String> = components.iter().map(|c| c.id().to_string()).collect();

    let handle = tokio::spawn(async move {
        let mut set: JoinSet<(String, Result<(), AppError>)> = JoinSet::new();

        for component in components {
            let id = component.id().to_string();
            let run = component.run(shutdown.clone());
            debug!(component = %id, "spawning component");
            set.spawn(async move { (id, run.await) });
        }

        let mut first_err: Option<AppError> = None;

        while let Some(res) = set.join_next().await {
            match res {
                Err(e) => {
                    error!("component panicked: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert_with(|| {
                        AppError::Comms(format!("component panicked: {e}"))
                    });
                }
                Ok((id, Err(e))) => {
                    error!(component = %id, "component failed: {e}");
                    shutdown.cancel();
                    first_err.get_or_insert(e);
                }
                Ok((id, Ok(()))) => {
                    info!(component = %id, "component exited");
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    });

    SubsystemHandle { inner: handle, components: ids }
}

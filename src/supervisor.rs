use crate::error::UnitError;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum UnitOutcome {
    Stopped,
    Failed(UnitError),
}

/// A long-running component the [`Supervisor`] keeps alive.
///
/// A `Failed` outcome (or a panic) gets `run` called again on the same value, so anything
/// that must survive a restart belongs in `self`. `Stopped` is terminal.
pub trait Unit: Send + 'static {
    fn name(&self) -> &'static str;

    fn run(&mut self, stop: CancellationToken) -> impl Future<Output = UnitOutcome> + Send;
}

#[derive(Clone, Debug)]
pub struct UnitHandle {
    name: &'static str,
    stop: CancellationToken,
    done: CancellationToken,
    restarts: Arc<AtomicU64>,
}

impl UnitHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Safe to call any number of times.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Resolves once the supervising task has exited for good.
    pub async fn finished(&self) {
        self.done.cancelled().await;
    }
}

pub struct Supervisor {
    shutdown: CancellationToken,
    restart_spacing: Duration,
    tasks: Vec<(UnitHandle, JoinHandle<()>)>,
}

impl Supervisor {
    pub fn new(restart_spacing: Duration) -> Self {
        Self {
            shutdown: CancellationToken::new(),
            restart_spacing,
            tasks: Vec::new(),
        }
    }

    /// Spawns `unit` on its own task and restarts it after every failure until it stops.
    pub fn start<U: Unit>(&mut self, unit: U) -> UnitHandle {
        let handle = UnitHandle {
            name: unit.name(),
            stop: self.shutdown.child_token(),
            done: CancellationToken::new(),
            restarts: Arc::new(AtomicU64::new(0)),
        };
        let task = tokio::spawn(supervise(unit, handle.clone(), self.restart_spacing));
        self.tasks.push((handle.clone(), task));
        handle
    }

    pub fn handles(&self) -> impl Iterator<Item = &UnitHandle> {
        self.tasks.iter().map(|(handle, _)| handle)
    }

    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for (handle, task) in self.tasks {
            if let Err(err) = task.await {
                tracing::error!(unit = handle.name, error = %err, "supervising task failed");
            }
        }
    }
}

async fn supervise<U: Unit>(mut unit: U, handle: UnitHandle, restart_spacing: Duration) {
    let name = handle.name;
    loop {
        let started = Instant::now();
        tracing::info!(unit = name, "starting");

        let outcome = AssertUnwindSafe(unit.run(handle.stop.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| UnitOutcome::Failed(UnitError::Panicked(panic_message(&*panic))));

        match &outcome {
            UnitOutcome::Stopped => tracing::info!(unit = name, "exiting"),
            UnitOutcome::Failed(err) => tracing::error!(unit = name, error = %err, "unit failed (fatal)"),
        }

        if handle.stop.is_cancelled() || matches!(outcome, UnitOutcome::Stopped) {
            break;
        }

        let wait = restart_spacing.saturating_sub(started.elapsed());
        tokio::select! {
            _ = handle.stop.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        let restarts = handle.restarts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(unit = name, restarts, "restarting unit");
    }
    handle.done.cancel();
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

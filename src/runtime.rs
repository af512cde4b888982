use crate::channel::{MessageChannel, Notifier};
use crate::config::Settings;
use crate::orchestration::engine::Orchestrator;
use crate::storage::BlobStore;
use crate::workflow::store::{DefinitionStore, WorkflowStoreError};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub(crate) fn sleep_with_stop(stop: &AtomicBool, total: Duration) -> bool {
    let mut remaining = total;
    while remaining > Duration::from_millis(0) {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(Duration::from_millis(200));
        thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
    !stop.load(Ordering::Relaxed)
}

/// Background worker driving the engine sweep against the wall clock.
pub struct EngineRuntime {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EngineRuntime {
    pub fn spawn(orchestrator: Arc<Orchestrator>, tick_interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let handle = thread::spawn(move || {
            while !worker_stop.load(Ordering::Relaxed) {
                orchestrator.tick(Utc::now().timestamp());
                if !sleep_with_stop(&worker_stop, tick_interval) {
                    break;
                }
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for EngineRuntime {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Open the definition store under the configured state root, build the
/// orchestrator, and start the sweep worker.
pub fn bootstrap(
    settings: &Settings,
    channel: Arc<dyn MessageChannel>,
    notifier: Arc<dyn Notifier>,
    now: i64,
) -> Result<(Arc<Orchestrator>, EngineRuntime), WorkflowStoreError> {
    let definitions = Arc::new(DefinitionStore::open(
        BlobStore::new(&settings.state_root),
        now,
    )?);
    let orchestrator = Arc::new(Orchestrator::new(definitions, channel, notifier));
    let runtime = EngineRuntime::spawn(
        orchestrator.clone(),
        Duration::from_millis(settings.tick_interval_ms),
    );
    Ok((orchestrator, runtime))
}

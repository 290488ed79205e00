//! The process-wide global-callback registry.
//!
//! Global callbacks run for *every* dispatch in the process, ahead of the
//! matched rule's own callbacks, in registration order. The registry is
//! append-only (there is no removal) and mutex-guarded: registration may
//! race with dispatch when the crate is embedded in a multi-threaded host.

use crate::incident::IncidentCore;
use crate::fault::Fault;
use crate::{GlobalCallback, support};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex, MutexGuard};

static GLOBAL_CALLBACKS: Lazy<Mutex<Vec<GlobalCallback>>> = Lazy::new(|| Mutex::new(Vec::new()));

fn lock() -> MutexGuard<'static, Vec<GlobalCallback>> {
    GLOBAL_CALLBACKS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Register one global callback.
pub fn global_callback<F>(callback: F)
where
    F: Fn(&mut IncidentCore) -> Result<(), Fault> + Send + Sync + 'static,
{
    global_callbacks([Arc::new(callback) as GlobalCallback]);
}

/// Register several global callbacks at once. Already-registered callables
/// (same `Arc`) are skipped.
pub fn global_callbacks(callbacks: impl IntoIterator<Item = GlobalCallback>) {
    let mut registered = lock();
    let merged = support::merge_arcs(std::mem::take(&mut *registered), callbacks);
    *registered = merged;
}

/// The registered callbacks, in registration order, as of this call.
pub(crate) fn snapshot() -> Vec<GlobalCallback> {
    lock().clone()
}

// Registration order, identity-dedup and run-order relative to rule
// callbacks are pinned by the integration suite (tests/dispatch_flow.rs):
// registering anything here would leak into every other unit test's
// dispatches, since the registry is process-wide by design.

//! The fault object the dispatcher intercepts.
//!
//! A [`Fault`] is deliberately plain: a kind identifier that rules match on,
//! a human message that literal/regex filters inspect, and an optional
//! wrapped cause. Each fault carries a process-unique identity assigned at
//! construction; the call-stack tracker keys its bookkeeping on it, and
//! clones share it (a clone is the same occurrence, not a new one).

use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Hand out a fresh process-unique identity. Shared by faults and
/// dispatchers, so ids never collide across the two.
pub(crate) fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// The wildcard kind: a rule listing it catches every fault.
pub const ANY_KIND: &str = "*";

/// An error intercepted (or produced) by a dispatch.
#[derive(Debug, Clone)]
pub struct Fault {
    id: u64,
    kind: String,
    message: String,
    source: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl Fault {
    /// Create a fault with a kind identifier and message.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Fault { id: next_id(), kind: kind.into(), message: message.into(), source: None }
    }

    /// Wrap another error, keeping it as the source and using its display
    /// form as the message.
    pub fn wrap(kind: impl Into<String>, source: impl StdError + Send + Sync + 'static) -> Self {
        let message = source.to_string();
        Fault { id: next_id(), kind: kind.into(), message, source: Some(Arc::new(source)) }
    }

    /// The kind identifier rules match against.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The message literal/regex filters match against.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl StdError for Fault {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_deref().map(|source| source as &(dyn StdError + 'static))
    }
}

/// A caller-visible slot that receives the fault a dispatch intercepted,
/// whether it was rethrown or suppressed.
///
/// Clone the slot and hand one copy to [`Dispatch::capture`]; the slot is
/// cleared at the start of every `execute()` and filled on failure.
///
/// [`Dispatch::capture`]: crate::Dispatch::capture
#[derive(Debug, Clone, Default)]
pub struct FaultSlot {
    inner: Arc<Mutex<Option<Fault>>>,
}

impl FaultSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// The captured fault, if the last execution failed.
    pub fn get(&self) -> Option<Fault> {
        self.lock().clone()
    }

    /// Take the captured fault out, leaving the slot empty.
    pub fn take(&self) -> Option<Fault> {
        self.lock().take()
    }

    pub(crate) fn set(&self, fault: Fault) {
        *self.lock() = Some(fault);
    }

    pub(crate) fn clear(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Fault>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

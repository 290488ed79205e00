//! Declarative catch-and-dispatch for error handling.
//!
//! Callers wrap a unit of work in a [`Dispatch`], describe how faults should
//! be handled with [`CatchRule`]s (which kinds to match, how to report them,
//! whether to rethrow, what default to substitute), and the dispatcher picks
//! the first matching rule and applies its policy deterministically.
//!
//! ```
//! use cordon::{CatchRule, Dispatch, fault};
//!
//! let out = Dispatch::prepare(|| Err::<i32, _>(fault!("db.timeout", "gave up")))
//!     .catch(CatchRule::new().catch(["db.timeout"]).suppress().default(-1))
//!     .and_then(|mut dispatch| dispatch.execute())
//!     .unwrap();
//!
//! assert_eq!(out, Some(-1));
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[macro_use]
mod macros;
pub mod config;
mod engine;
mod error;
mod fault;
mod incident;
mod registry;
pub mod report;
mod rule;
pub mod stack;
mod support;

pub use engine::{Dispatch, Inspector, resolve_rethrow_target};
pub use error::{Error, Result};
pub use fault::{ANY_KIND, Fault, FaultSlot};
pub use incident::{Incident, IncidentCore};
pub use registry::{global_callback, global_callbacks};
pub use report::{ReportSink, install_sink};
pub use rule::CatchRule;

// --- Shared value types ------------------------------------------------------

/// Reporting severity, ordered least to most severe.
///
/// String conversion uses the lowercase names (`"debug"` .. `"emergency"`);
/// anything else is rejected at rule-build time, never at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

impl Severity {
    /// The valid level names, in severity order.
    pub const NAMES: [&'static str; 8] =
        ["debug", "info", "notice", "warning", "error", "critical", "alert", "emergency"];

    /// Parse a level name, failing with [`Error::LevelNotAllowed`] on anything
    /// outside the fixed set.
    pub fn parse(level: &str) -> crate::Result<Self> {
        Self::from_str(level).map_err(|_| Error::LevelNotAllowed(level.to_string()))
    }
}

/// A rethrow decision callback. Receives the fault that occurred and returns
/// the policy to apply in its place.
pub type RethrowDecider = Arc<dyn Fn(&Fault) -> Rethrow + Send + Sync>;

/// What to do with a caught fault once a rule has matched.
///
/// "Unset" is represented as `Option<Rethrow>::None` on the rule, so every
/// variant here is an explicit decision.
#[derive(Clone)]
pub enum Rethrow {
    /// Swallow the fault (the default value is returned instead).
    Reject,
    /// Rethrow the original fault.
    Accept,
    /// Rethrow this fault instead of the original.
    Substitute(Fault),
    /// Defer the decision to a callback. The callback's result is applied the
    /// same way, except that a decider returning another decider is an error.
    Decide(RethrowDecider),
}

impl Rethrow {
    /// Build a [`Rethrow::Decide`] from a closure.
    pub fn decide<F>(decide: F) -> Self
    where
        F: Fn(&Fault) -> Rethrow + Send + Sync + 'static,
    {
        Rethrow::Decide(Arc::new(decide))
    }
}

impl From<bool> for Rethrow {
    fn from(rethrow: bool) -> Self {
        if rethrow { Rethrow::Accept } else { Rethrow::Reject }
    }
}

impl From<Fault> for Rethrow {
    fn from(substitute: Fault) -> Self {
        Rethrow::Substitute(substitute)
    }
}

impl fmt::Debug for Rethrow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rethrow::Reject => f.write_str("Reject"),
            Rethrow::Accept => f.write_str("Accept"),
            Rethrow::Substitute(fault) => f.debug_tuple("Substitute").field(fault).finish(),
            Rethrow::Decide(_) => f.write_str("Decide(<callable>)"),
        }
    }
}

/// A lazily-invoked default-value producer.
pub type Producer<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// The default value a rule substitutes when a fault is swallowed.
///
/// "Unset" is `Option<DefaultValue<T>>::None` on the rule: `Some(Value(v))`
/// where `v` is itself a `None` (for `T = Option<_>`) is an explicitly-set
/// null default, distinct from no default at all.
#[derive(Clone)]
pub enum DefaultValue<T> {
    /// A ready value, cloned out on use.
    Value(T),
    /// A producer invoked each time the default is needed.
    Produce(Producer<T>),
}

impl<T> fmt::Debug for DefaultValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(_) => f.write_str("Value(..)"),
            DefaultValue::Produce(_) => f.write_str("Produce(<callable>)"),
        }
    }
}

/// A per-rule side-effect callback. Runs with the mutable [`Incident`] when
/// its rule matches; a returned fault propagates to the caller uncaught.
pub type Callback<T> = Arc<dyn Fn(&mut Incident<T>) -> std::result::Result<(), Fault> + Send + Sync>;

/// A process-wide callback, run ahead of per-rule callbacks on every dispatch.
/// Type-erased: sees everything on the incident except the typed default slot.
pub type GlobalCallback = Arc<dyn Fn(&mut IncidentCore) -> std::result::Result<(), Fault> + Send + Sync>;

/// A callable guaranteed to run once dispatch completes, success or not. Its
/// own error propagates directly, replacing the dispatch outcome.
pub type Finally = Arc<dyn Fn() -> std::result::Result<(), Fault> + Send + Sync>;

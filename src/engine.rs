//! The rule-matching and dispatch engine.
//!
//! This module is the operational core of the crate, split into two focused
//! submodules:
//!
//! - `inspector.rs` — a read-only view over a pair of rules (a specific rule
//!   plus the dispatcher's fallback rule) that answers "does this fault
//!   match?" and resolves every policy field through the precedence chain
//!   rule → fallback → config → hard default.
//! - `dispatcher.rs` — [`Dispatch`]: runs the protected operation and, on
//!   failure, selects the first matching rule and applies its resolved
//!   policy.
//!
//! At a high level, one `execute()` is a pipeline:
//!
//! ```text
//! push frame ── run operation ──┬─ Ok(value) ─────────────────────────┐
//!   (stack.rs)                  │                                     │
//!                               └─ Err(fault)                         │
//!                                    │                                │
//!                        pick_matching_rule (first match wins)        │
//!                                    │                                │
//!                     ┌─ none ── raise the fault ─────────────────────┤
//!                     │                                               │
//!                     └─ Inspector: resolve policy                    │
//!                           │                                         │
//!                  build Incident ── callbacks ── report ── rethrow?  │
//!                   (incident.rs)    (globals first,                  │
//!                                     short-circuit)                  │
//!                           │                                         │
//!                    default value (suppressed)                       │
//!                           │                                         │
//!                           v                                         v
//!                        finally (rule's overrides instance's) ── pop frame
//! ```
//!
//! The output is deterministic given the same rules, fault, and config: rule
//! evaluation order is registration order, the fallback competes last (when
//! it competes at all), and callbacks run globals-first in registration
//! order.

pub mod dispatcher;
pub mod inspector;

pub use dispatcher::{Dispatch, resolve_rethrow_target};
pub use inspector::Inspector;

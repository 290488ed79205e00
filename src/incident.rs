//! The diagnostic context handed to callbacks.
//!
//! When a rule matches, the dispatcher resolves the rule's policy once and
//! seeds an [`Incident`] with it. Callbacks then run against the incident and
//! may override any of the policy fields; the dispatcher re-reads them after
//! the chain, so a callback can switch off reporting, swap the rethrow
//! decision, or replace the default value.
//!
//! [`IncidentCore`] is the type-erased part: everything except the typed
//! default slot. Global callbacks (which run for every dispatcher in the
//! process, whatever its value type) receive `&mut IncidentCore`; per-rule
//! callbacks receive the full `&mut Incident<T>`.

use crate::fault::Fault;
use crate::{DefaultValue, Producer, Rethrow, Severity};
use std::sync::Arc;

/// The type-erased incident state: the fault, its accumulated known-issue
/// tags, and the mutable policy fields.
#[derive(Debug)]
pub struct IncidentCore {
    fault: Fault,
    known: Vec<String>,
    report: bool,
    rethrow: Rethrow,
    channels: Vec<String>,
    level: Severity,
}

impl IncidentCore {
    /// The fault being handled.
    pub fn fault(&self) -> &Fault {
        &self.fault
    }

    /// Known-issue tags accumulated inner-to-outer across nested dispatches.
    pub fn known(&self) -> &[String] {
        &self.known
    }

    /// Whether the fault will be reported after the callback chain.
    pub fn report(&self) -> bool {
        self.report
    }

    /// Switch reporting on or off.
    pub fn set_report(&mut self, report: bool) {
        self.report = report;
    }

    /// The rethrow decision currently in effect.
    pub fn rethrow(&self) -> &Rethrow {
        &self.rethrow
    }

    /// Replace the rethrow decision: a bool, a substitute [`Fault`], or a
    /// [`Rethrow`] variant (including a decider).
    pub fn set_rethrow(&mut self, rethrow: impl Into<Rethrow>) {
        self.rethrow = rethrow.into();
    }

    /// True unless the current decision is an outright reject. Together with
    /// `report`, this is what keeps the callback chain running.
    pub fn rethrow_engaged(&self) -> bool {
        !matches!(self.rethrow, Rethrow::Reject)
    }

    /// The channels the report will be sent to.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Replace the channel list.
    pub fn set_channels(&mut self, channels: impl IntoIterator<Item = impl Into<String>>) {
        self.channels = channels.into_iter().map(Into::into).collect();
    }

    /// The severity the report will use.
    pub fn level(&self) -> Severity {
        self.level
    }

    /// Replace the severity.
    pub fn set_level(&mut self, level: Severity) {
        self.level = level;
    }
}

/// The full incident, including the typed default-value slot.
pub struct Incident<T> {
    core: IncidentCore,
    default: Option<DefaultValue<T>>,
}

impl<T> Incident<T> {
    pub(crate) fn new(fault: Fault, known: Vec<String>) -> Self {
        Incident {
            core: IncidentCore {
                fault,
                known,
                report: true,
                rethrow: Rethrow::Reject,
                channels: Vec::new(),
                level: Severity::Error,
            },
            default: None,
        }
    }

    /// The type-erased view handed to global callbacks.
    pub fn core(&self) -> &IncidentCore {
        &self.core
    }

    /// Mutable type-erased view.
    pub fn core_mut(&mut self) -> &mut IncidentCore {
        &mut self.core
    }

    /// See [`IncidentCore::fault`].
    pub fn fault(&self) -> &Fault {
        self.core.fault()
    }

    /// See [`IncidentCore::known`].
    pub fn known(&self) -> &[String] {
        self.core.known()
    }

    /// See [`IncidentCore::report`].
    pub fn report(&self) -> bool {
        self.core.report()
    }

    /// See [`IncidentCore::set_report`].
    pub fn set_report(&mut self, report: bool) {
        self.core.set_report(report);
    }

    /// See [`IncidentCore::rethrow`].
    pub fn rethrow(&self) -> &Rethrow {
        self.core.rethrow()
    }

    /// See [`IncidentCore::set_rethrow`].
    pub fn set_rethrow(&mut self, rethrow: impl Into<Rethrow>) {
        self.core.set_rethrow(rethrow);
    }

    /// See [`IncidentCore::rethrow_engaged`].
    pub fn rethrow_engaged(&self) -> bool {
        self.core.rethrow_engaged()
    }

    /// See [`IncidentCore::channels`].
    pub fn channels(&self) -> &[String] {
        self.core.channels()
    }

    /// See [`IncidentCore::set_channels`].
    pub fn set_channels(&mut self, channels: impl IntoIterator<Item = impl Into<String>>) {
        self.core.set_channels(channels);
    }

    /// See [`IncidentCore::level`].
    pub fn level(&self) -> Severity {
        self.core.level()
    }

    /// See [`IncidentCore::set_level`].
    pub fn set_level(&mut self, level: Severity) {
        self.core.set_level(level);
    }

    /// The default-value slot currently in effect.
    pub fn default_slot(&self) -> Option<&DefaultValue<T>> {
        self.default.as_ref()
    }

    pub(crate) fn set_default_slot(&mut self, default: Option<DefaultValue<T>>) {
        self.default = default;
    }

    /// Replace the default with a ready value.
    pub fn set_default(&mut self, value: T) {
        self.default = Some(DefaultValue::Value(value));
    }

    /// Replace the default with a lazily-invoked producer.
    pub fn set_default_with<F>(&mut self, produce: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let produce: Producer<T> = Arc::new(produce);
        self.default = Some(DefaultValue::Produce(produce));
    }

    /// Drop the default, falling back to the matched rule's resolution.
    pub fn clear_default(&mut self) {
        self.default = None;
    }
}

//! The dispatcher: runs a protected operation and applies catch-rule policy.
//!
//! A [`Dispatch`] is built in one of two modes: [`Dispatch::run`] executes
//! the operation immediately after setup, [`Dispatch::prepare`] returns the
//! configured instance for the caller to [`execute`](Dispatch::execute)
//! explicitly (and possibly repeatedly — every execution re-runs the
//! operation from scratch).
//!
//! Fluent setters other than the two constructors target the dispatcher's
//! implicit *fallback rule*: the catch-all that competes last during rule
//! selection and donates unset details to every explicit rule. Explicit
//! rules are added with [`catch`](Dispatch::catch) and evaluated in
//! registration order, first match wins.
//!
//! ## Failure handling, in order
//!
//! On a fault: capture it for the caller, select a rule (none ⇒ raise it
//! untouched), resolve report/rethrow once up front, and then either
//! suppress straight to the default value, raise directly when rethrow is
//! the only work left, or build an [`Incident`], run the callback chain
//! (globals first, short-circuiting once both report and rethrow are off),
//! re-read the possibly-overridden policy, report, rethrow, and fall out to
//! the default. The selected finally — the matched rule's, or the
//! instance's — runs exactly once after the outcome is determined, and is
//! not protected by this dispatcher.

use crate::fault::{Fault, FaultSlot, next_id};
use crate::incident::Incident;
use crate::registry;
use crate::report;
use crate::rule::CatchRule;
use crate::stack;
use crate::{Callback, Error, Finally, GlobalCallback, Rethrow, Severity};
use std::fmt;

use super::inspector::Inspector;

/// Resolve a rethrow policy to a concrete target: `None` (swallow) or the
/// fault to raise.
///
/// A [`Rethrow::Decide`] callback is invoked once and its result mapped the
/// same way; a decider returning another decider fails with
/// [`Error::InvalidRethrowValue`].
pub fn resolve_rethrow_target(policy: Option<Rethrow>, fault: &Fault) -> crate::Result<Option<Fault>> {
    let Some(policy) = policy else {
        return Ok(None);
    };

    let policy = match policy {
        Rethrow::Decide(decide) => decide(fault),
        other => other,
    };

    match policy {
        Rethrow::Reject => Ok(None),
        Rethrow::Accept => Ok(Some(fault.clone())),
        Rethrow::Substitute(substitute) => Ok(Some(substitute)),
        Rethrow::Decide(_) => Err(Error::InvalidRethrowValue),
    }
}

/// Runs a protected operation, catching and dispatching faults per the
/// configured catch rules.
pub struct Dispatch<T> {
    operation: Option<Box<dyn FnMut() -> Result<T, Fault>>>,
    rules: Vec<CatchRule<T>>,
    fallback: CatchRule<T>,
    finally: Option<Finally>,
    capture: Option<FaultSlot>,
    configured: bool,
    identity: u64,
}

impl<T> Default for Dispatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Dispatch<T> {
    /// An unconfigured dispatcher. Every fluent method fails with
    /// [`Error::SetupIncomplete`] until [`prepare`](Self::prepare) or
    /// [`run`](Self::run) has been used instead.
    pub fn new() -> Self {
        Dispatch {
            operation: None,
            rules: Vec::new(),
            fallback: CatchRule::new(),
            finally: None,
            capture: None,
            configured: false,
            identity: next_id(),
        }
    }

    /// Configure a dispatcher around `operation`, ready for rules to be
    /// added and [`execute`](Self::execute) to be called.
    pub fn prepare<F>(operation: F) -> Self
    where
        F: FnMut() -> Result<T, Fault> + 'static,
    {
        let mut dispatch = Self::new();
        dispatch.operation = Some(Box::new(operation));
        dispatch.configured = true;
        dispatch
    }

    /// Like [`prepare`](Self::prepare), with a default value for the
    /// fallback rule in the same call.
    pub fn prepare_with<F>(operation: F, default: T) -> Self
    where
        F: FnMut() -> Result<T, Fault> + 'static,
    {
        let mut dispatch = Self::prepare(operation);
        dispatch.fallback = dispatch.fallback.default(default);
        dispatch
    }

    /// Run `operation` immediately with no explicit rules: the fallback
    /// rule catches everything.
    pub fn run<F>(operation: F) -> crate::Result<Option<T>>
    where
        F: FnMut() -> Result<T, Fault> + 'static,
        T: Clone,
    {
        Self::prepare(operation).execute()
    }

    /// Like [`run`](Self::run), returning `default` when a fault is
    /// swallowed.
    pub fn run_with<F>(operation: F, default: T) -> crate::Result<Option<T>>
    where
        F: FnMut() -> Result<T, Fault> + 'static,
        T: Clone,
    {
        Self::prepare_with(operation, default).execute()
    }

    fn guard(&self, method: &'static str) -> crate::Result<()> {
        if self.configured { Ok(()) } else { Err(Error::SetupIncomplete(method)) }
    }

    // --- Fluent configuration -------------------------------------------------

    /// Add an explicit catch rule. Rules are tried in the order they were
    /// added, before the fallback rule.
    pub fn catch(mut self, rule: CatchRule<T>) -> crate::Result<Self> {
        self.guard("catch")?;
        self.rules.push(rule);
        Ok(self)
    }

    /// Add fault kinds to the fallback rule's kind filter.
    pub fn catch_kinds<I, S>(mut self, kinds: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard("catch_kinds")?;
        self.fallback = self.fallback.catch(kinds);
        Ok(self)
    }

    /// Add literal message filters to the fallback rule.
    pub fn match_message<I, S>(mut self, messages: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard("match_message")?;
        self.fallback = self.fallback.match_message(messages);
        Ok(self)
    }

    /// Add regex message filters to the fallback rule.
    pub fn match_regex<I, S>(mut self, patterns: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard("match_regex")?;
        self.fallback = self.fallback.match_regex(patterns)?;
        Ok(self)
    }

    /// Add a callback to the fallback rule.
    pub fn callback<F>(mut self, callback: F) -> crate::Result<Self>
    where
        F: Fn(&mut Incident<T>) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.guard("callback")?;
        self.fallback = self.fallback.callback(callback);
        Ok(self)
    }

    /// Add callbacks to the fallback rule.
    pub fn callbacks<I>(mut self, callbacks: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = Callback<T>>,
    {
        self.guard("callbacks")?;
        self.fallback = self.fallback.callbacks(callbacks);
        Ok(self)
    }

    /// Tag faults caught by the fallback rule as known issue/s.
    pub fn known<I, S>(mut self, known: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard("known")?;
        self.fallback = self.fallback.known(known);
        Ok(self)
    }

    /// Add a reporting channel to the fallback rule.
    pub fn channel(mut self, channel: impl Into<String>) -> crate::Result<Self> {
        self.guard("channel")?;
        self.fallback = self.fallback.channel(channel);
        Ok(self)
    }

    /// Add reporting channels to the fallback rule.
    pub fn channels<I, S>(mut self, channels: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.guard("channels")?;
        self.fallback = self.fallback.channels(channels);
        Ok(self)
    }

    /// Set the fallback rule's reporting level by name.
    pub fn level(mut self, level: &str) -> crate::Result<Self> {
        self.guard("level")?;
        self.fallback = self.fallback.level(level)?;
        Ok(self)
    }

    /// Set the fallback rule's reporting level.
    pub fn severity(mut self, level: Severity) -> crate::Result<Self> {
        self.guard("severity")?;
        self.fallback = self.fallback.severity(level);
        Ok(self)
    }

    /// Report at `debug` level.
    pub fn debug(self) -> crate::Result<Self> {
        self.severity(Severity::Debug)
    }

    /// Report at `info` level.
    pub fn info(self) -> crate::Result<Self> {
        self.severity(Severity::Info)
    }

    /// Report at `notice` level.
    pub fn notice(self) -> crate::Result<Self> {
        self.severity(Severity::Notice)
    }

    /// Report at `warning` level.
    pub fn warning(self) -> crate::Result<Self> {
        self.severity(Severity::Warning)
    }

    /// Report at `error` level.
    pub fn error(self) -> crate::Result<Self> {
        self.severity(Severity::Error)
    }

    /// Report at `critical` level.
    pub fn critical(self) -> crate::Result<Self> {
        self.severity(Severity::Critical)
    }

    /// Report at `alert` level.
    pub fn alert(self) -> crate::Result<Self> {
        self.severity(Severity::Alert)
    }

    /// Report at `emergency` level.
    pub fn emergency(self) -> crate::Result<Self> {
        self.severity(Severity::Emergency)
    }

    /// Choose whether caught faults are reported.
    pub fn report(mut self, report: bool) -> crate::Result<Self> {
        self.guard("report")?;
        self.fallback = self.fallback.report(report);
        Ok(self)
    }

    /// Caught faults are not reported.
    pub fn dont_report(self) -> crate::Result<Self> {
        self.report(false)
    }

    /// Choose the fallback rule's rethrow policy.
    pub fn rethrow(mut self, rethrow: impl Into<Rethrow>) -> crate::Result<Self> {
        self.guard("rethrow")?;
        self.fallback = self.fallback.rethrow(rethrow);
        Ok(self)
    }

    /// Caught faults are not rethrown.
    pub fn dont_rethrow(self) -> crate::Result<Self> {
        self.rethrow(false)
    }

    /// Suppress caught faults: don't report and don't rethrow.
    pub fn suppress(mut self) -> crate::Result<Self> {
        self.guard("suppress")?;
        self.fallback = self.fallback.suppress();
        Ok(self)
    }

    /// Set the value returned when a caught fault is swallowed.
    pub fn default(mut self, value: T) -> crate::Result<Self> {
        self.guard("default")?;
        self.fallback = self.fallback.default(value);
        Ok(self)
    }

    /// Like [`default`](Self::default), produced lazily.
    pub fn default_with<F>(mut self, produce: F) -> crate::Result<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.guard("default_with")?;
        self.fallback = self.fallback.default_with(produce);
        Ok(self)
    }

    /// Set the instance-level finally, run after every execution unless a
    /// matched rule brings its own.
    pub fn finally<F>(mut self, finally: F) -> crate::Result<Self>
    where
        F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.guard("finally")?;
        self.finally = Some(std::sync::Arc::new(finally));
        Ok(self)
    }

    /// Capture the intercepted fault into `slot`, even when it ends up
    /// suppressed.
    pub fn capture(mut self, slot: &FaultSlot) -> crate::Result<Self> {
        self.guard("capture")?;
        self.capture = Some(slot.clone());
        Ok(self)
    }

    // --- Execution ------------------------------------------------------------

    /// Execute the protected operation and dispatch any fault per the
    /// configured rules.
    ///
    /// Returns `Ok(Some(value))` from a successful run or a substituted
    /// default, `Ok(None)` when the fault was swallowed and no default was
    /// set anywhere, and `Err` when a fault is (re)thrown or rethrow
    /// resolution fails.
    pub fn execute(&mut self) -> crate::Result<Option<T>>
    where
        T: Clone,
    {
        self.guard("execute")?;
        stack::push_frame(self.identity);
        if let Some(slot) = &self.capture {
            slot.clear();
        }

        let run = match self.operation.as_mut() {
            Some(operation) => operation(),
            None => {
                stack::pop_frame(self.identity);
                return Err(Error::SetupIncomplete("execute"));
            }
        };

        let (mut outcome, finally) = match run {
            Ok(value) => (Ok(Some(value)), self.finally.clone()),
            Err(fault) => {
                if let Some(slot) = &self.capture {
                    slot.set(fault.clone());
                }

                match self.pick_matching_rule(&fault) {
                    // Not ours to handle: raise untouched, no callbacks, no
                    // reporting.
                    None => (Err(Error::Fault(fault)), self.finally.clone()),
                    Some(inspector) => {
                        let finally = inspector.finally().cloned().or_else(|| self.finally.clone());
                        let outcome = self.process_fault(fault, &inspector);
                        (outcome, finally)
                    }
                }
            }
        };

        if let Some(finally) = finally {
            if let Err(fault) = finally() {
                outcome = Err(Error::Fault(fault));
            }
        }

        if let Err(Error::Fault(fault)) = &outcome {
            stack::note_unwind(fault.id(), self.identity);
        }
        stack::pop_frame(self.identity);

        outcome
    }

    /// Find the first rule matching `fault`, wrapped in an [`Inspector`]
    /// that inherits from the fallback rule.
    fn pick_matching_rule(&self, fault: &Fault) -> Option<Inspector<'_, T>> {
        for rule in self.candidate_rules() {
            let inspector = Inspector::new(rule, &self.fallback);
            if inspector.matches(fault) {
                return Some(inspector);
            }
        }
        None
    }

    /// Explicit rules in registration order; the fallback competes last,
    /// except when explicit rules exist and the fallback has no kind filter
    /// of its own.
    fn candidate_rules(&self) -> Vec<&CatchRule<T>> {
        let mut candidates: Vec<&CatchRule<T>> = self.rules.iter().collect();
        if candidates.is_empty() || !self.fallback.kinds.is_empty() {
            candidates.push(&self.fallback);
        }
        candidates
    }

    fn process_fault(&self, fault: Fault, inspector: &Inspector<'_, T>) -> crate::Result<Option<T>>
    where
        T: Clone,
    {
        stack::replace_frame_known(self.identity, inspector.resolve_known().to_vec());

        let should_report = inspector.should_report();
        let rethrow_target = resolve_rethrow_target(inspector.pick_rethrow(), &fault)?;

        // Nothing to do at all: suppressed straight to the default value,
        // without running any callbacks.
        if !should_report && rethrow_target.is_none() {
            return Ok(self.resolve_default_value(None, inspector));
        }

        let globals = registry::snapshot();
        let own = inspector.resolve_callbacks().to_vec();

        // Rethrow is the only work left; no incident is built, and the
        // original fault is raised even when the resolved target was a
        // substitute.
        if globals.is_empty() && own.is_empty() && !should_report {
            return Err(Error::Fault(fault));
        }

        let mut incident = Incident::new(fault.clone(), stack::collect_known(fault.id()));
        incident.set_report(should_report);
        incident.set_rethrow(rethrow_target.map_or(Rethrow::Reject, Rethrow::Substitute));
        incident.set_default_slot(inspector.resolve_default().cloned());
        let channels = inspector.resolve_channels();
        if !channels.is_empty() {
            incident.set_channels(channels);
        }
        incident.set_level(inspector.resolve_level());

        stack::register_incident(fault.id(), incident.known().to_vec());
        let finished = Self::run_chain(&mut incident, &globals, &own, &fault);
        stack::forget_incident(fault.id());
        finished?;

        Ok(self.resolve_default_value(Some(&incident), inspector))
    }

    /// Callbacks, then reporting, then rethrow — each step driven by the
    /// incident's current (possibly callback-overridden) state.
    fn run_chain(
        incident: &mut Incident<T>,
        globals: &[GlobalCallback],
        own: &[Callback<T>],
        fault: &Fault,
    ) -> crate::Result<()> {
        Self::run_callbacks(incident, globals, own).map_err(Error::Fault)?;

        if incident.report() {
            report::dispatch(incident.fault(), incident.known(), incident.channels(), incident.level());
        }

        if let Some(raise) = resolve_rethrow_target(Some(incident.rethrow().clone()), fault)? {
            return Err(Error::Fault(raise));
        }
        Ok(())
    }

    /// Run globals then the rule's own callbacks, stopping the chain as soon
    /// as a callback has switched both report and rethrow off.
    fn run_callbacks(
        incident: &mut Incident<T>,
        globals: &[GlobalCallback],
        own: &[Callback<T>],
    ) -> Result<(), Fault> {
        for callback in globals {
            if !incident.report() && !incident.rethrow_engaged() {
                return Ok(());
            }
            callback(incident.core_mut())?;
        }
        for callback in own {
            if !incident.report() && !incident.rethrow_engaged() {
                return Ok(());
            }
            callback(incident)?;
        }
        Ok(())
    }

    /// The value a swallowed fault resolves to: the incident's current
    /// default when one is set, else the matched rule's resolution, with
    /// producers invoked lazily.
    fn resolve_default_value(&self, incident: Option<&Incident<T>>, inspector: &Inspector<'_, T>) -> Option<T>
    where
        T: Clone,
    {
        let slot = incident
            .and_then(|incident| incident.default_slot().cloned())
            .or_else(|| inspector.resolve_default().cloned());

        match slot {
            None => None,
            Some(crate::DefaultValue::Value(value)) => Some(value),
            Some(crate::DefaultValue::Produce(produce)) => Some(produce()),
        }
    }
}

impl<T> fmt::Debug for Dispatch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatch")
            .field("operation", &self.operation.as_ref().map(|_| "<callable>"))
            .field("rules", &self.rules.len())
            .field("fallback", &self.fallback)
            .field("finally", &self.finally.as_ref().map(|_| "<callable>"))
            .field("configured", &self.configured)
            .field("identity", &self.identity)
            .finish()
    }
}

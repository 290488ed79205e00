//! Catch rules: the declarative unit of error policy.
//!
//! A [`CatchRule`] bundles match predicates (fault kinds, literal message
//! strings, message regexes) with a response policy (callbacks, known-issue
//! tags, channels, level, report/rethrow/default/finally). It is a passive
//! value object: no dispatch-time logic lives here, only accumulation and
//! fail-fast validation. Matching and precedence resolution belong to
//! [`Inspector`](crate::Inspector); orchestration belongs to
//! [`Dispatch`](crate::Dispatch).
//!
//! Setters consume and return `self`. Singular fields are last-call-wins;
//! set-valued fields accumulate with first-seen dedup (see `support.rs`).
//! The two fallible setters — `level` (unknown severity name) and
//! `match_regex` (pattern fails to compile) — reject bad input immediately
//! rather than letting it surface mid-dispatch.

use crate::fault::Fault;
use crate::incident::Incident;
use crate::{Callback, DefaultValue, Finally, Producer, Rethrow, Severity, support};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// One matching rule: which faults to pick up, and what to do with them.
///
/// `T` is the dispatch's value type; it only shows up in the default-value
/// slot and the callback signatures.
pub struct CatchRule<T> {
    pub(crate) kinds: Vec<String>,
    pub(crate) match_strings: Vec<String>,
    pub(crate) match_regexes: Vec<Regex>,
    pub(crate) callbacks: Vec<Callback<T>>,
    pub(crate) known: Vec<String>,
    pub(crate) channels: Vec<String>,
    pub(crate) level: Option<Severity>,
    pub(crate) report: Option<bool>,
    pub(crate) rethrow: Option<Rethrow>,
    pub(crate) default: Option<DefaultValue<T>>,
    pub(crate) finally: Option<Finally>,
}

impl<T> Default for CatchRule<T> {
    fn default() -> Self {
        CatchRule {
            kinds: Vec::new(),
            match_strings: Vec::new(),
            match_regexes: Vec::new(),
            callbacks: Vec::new(),
            known: Vec::new(),
            channels: Vec::new(),
            level: None,
            report: None,
            rethrow: None,
            default: None,
            finally: None,
        }
    }
}

impl<T> CatchRule<T> {
    /// An empty rule: matches every fault, decides nothing.
    pub fn new() -> Self {
        <Self as Default>::default()
    }

    /// Add fault kinds to pick up. An empty kind list matches any fault; the
    /// wildcard kind [`ANY_KIND`](crate::ANY_KIND) matches any fault too.
    pub fn catch<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kinds = support::merge_distinct(self.kinds, kinds.into_iter().map(Into::into));
        self
    }

    /// Add literal strings the fault message must equal (when any are set).
    pub fn match_message<I, S>(mut self, messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.match_strings = support::merge_distinct(self.match_strings, messages.into_iter().map(Into::into));
        self
    }

    /// Add regexes the fault message must match (when any are set). Invalid
    /// patterns fail here, not at match time.
    pub fn match_regex<I, S>(mut self, patterns: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut compiled = Vec::new();
        for pattern in patterns {
            let pattern = pattern.into();
            let regex = Regex::new(&pattern)
                .map_err(|source| crate::Error::BadMatchRegex { pattern: pattern.clone(), source })?;
            compiled.push(regex);
        }
        self.match_regexes = support::merge_regexes(self.match_regexes, compiled);
        Ok(self)
    }

    /// Add a callback to run when this rule matches.
    pub fn callback<F>(self, callback: F) -> Self
    where
        F: Fn(&mut Incident<T>) -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.callbacks([Arc::new(callback) as Callback<T>])
    }

    /// Add several callbacks at once (deduplicated by identity).
    pub fn callbacks<I>(mut self, callbacks: I) -> Self
    where
        I: IntoIterator<Item = Callback<T>>,
    {
        self.callbacks = support::merge_arcs(self.callbacks, callbacks);
        self
    }

    /// Tag the fault as belonging to known issue/s (e.g. a ticket reference).
    /// Known-ness steers the config-tier channel and level defaults.
    pub fn known<I, S>(mut self, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known = support::merge_distinct(self.known, known.into_iter().map(Into::into));
        self
    }

    /// Add a reporting channel.
    pub fn channel(self, channel: impl Into<String>) -> Self {
        self.channels([channel.into()])
    }

    /// Add several reporting channels.
    pub fn channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = support::merge_distinct(self.channels, channels.into_iter().map(Into::into));
        self
    }

    /// Set the reporting level by name. Unknown names fail immediately.
    pub fn level(self, level: &str) -> crate::Result<Self> {
        Ok(self.severity(Severity::parse(level)?))
    }

    /// Set the reporting level.
    pub fn severity(mut self, level: Severity) -> Self {
        self.level = Some(level);
        self
    }

    /// Report at `debug` level.
    pub fn debug(self) -> Self {
        self.severity(Severity::Debug)
    }

    /// Report at `info` level.
    pub fn info(self) -> Self {
        self.severity(Severity::Info)
    }

    /// Report at `notice` level.
    pub fn notice(self) -> Self {
        self.severity(Severity::Notice)
    }

    /// Report at `warning` level.
    pub fn warning(self) -> Self {
        self.severity(Severity::Warning)
    }

    /// Report at `error` level.
    pub fn error(self) -> Self {
        self.severity(Severity::Error)
    }

    /// Report at `critical` level.
    pub fn critical(self) -> Self {
        self.severity(Severity::Critical)
    }

    /// Report at `alert` level.
    pub fn alert(self) -> Self {
        self.severity(Severity::Alert)
    }

    /// Report at `emergency` level.
    pub fn emergency(self) -> Self {
        self.severity(Severity::Emergency)
    }

    /// Choose whether matched faults are reported.
    pub fn report(mut self, report: bool) -> Self {
        self.report = Some(report);
        self
    }

    /// Matched faults are not reported.
    pub fn dont_report(self) -> Self {
        self.report(false)
    }

    /// Choose the rethrow policy: a bool, a substitute [`Fault`], or a
    /// [`Rethrow`] variant (including a decider built with
    /// [`Rethrow::decide`]).
    pub fn rethrow(mut self, rethrow: impl Into<Rethrow>) -> Self {
        self.rethrow = Some(rethrow.into());
        self
    }

    /// Matched faults are not rethrown.
    pub fn dont_rethrow(self) -> Self {
        self.rethrow(false)
    }

    /// Suppress matched faults: don't report and don't rethrow, in one call.
    pub fn suppress(self) -> Self {
        self.report(false).dont_rethrow()
    }

    /// Set the value returned when a matched fault is swallowed. Always marks
    /// the default as set, so an explicit `None` (for `T = Option<_>`) is
    /// distinct from no default at all.
    pub fn default(mut self, value: T) -> Self {
        self.default = Some(DefaultValue::Value(value));
        self
    }

    /// Like [`default`](Self::default), but the value is produced lazily each
    /// time it is needed.
    pub fn default_with<F>(mut self, produce: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let produce: Producer<T> = Arc::new(produce);
        self.default = Some(DefaultValue::Produce(produce));
        self
    }

    /// Set a callable to run after dispatch completes for this rule, success
    /// or not. When this rule matches, it fully replaces the dispatcher's own
    /// finally.
    pub fn finally<F>(mut self, finally: F) -> Self
    where
        F: Fn() -> Result<(), Fault> + Send + Sync + 'static,
    {
        self.finally = Some(Arc::new(finally));
        self
    }
}

impl<T> fmt::Debug for CatchRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatchRule")
            .field("kinds", &self.kinds)
            .field("match_strings", &self.match_strings)
            .field("match_regexes", &self.match_regexes)
            .field("callbacks", &format_args!("<{} callables>", self.callbacks.len()))
            .field("known", &self.known)
            .field("channels", &self.channels)
            .field("level", &self.level)
            .field("report", &self.report)
            .field("rethrow", &self.rethrow)
            .field("default", &self.default)
            .field("finally", &self.finally.as_ref().map(|_| "<callable>"))
            .finish()
    }
}

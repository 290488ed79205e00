//! Match testing and precedence resolution over a pair of rules.
//!
//! An [`Inspector`] wraps the rule being considered plus the dispatcher's
//! fallback rule, and is the only place that knows the inheritance story:
//!
//! - message filters fall back to the fallback's filters when the rule sets
//!   none (the kind filter deliberately does not);
//! - callbacks and known tags are supersede-not-merge: a rule's non-empty
//!   list entirely replaces the fallback's;
//! - channels, level and report fall through rule → fallback → ambient
//!   config (keyed by known-ness) → hard default;
//! - rethrow falls through rule → fallback only;
//! - the default value is the one field where "unset" is structural
//!   (`Option`), not value-based;
//! - finally never inherits: each rule's finally is its own.

use crate::config;
use crate::fault::Fault;
use crate::rule::CatchRule;
use crate::{Callback, DefaultValue, Finally, Rethrow, Severity};

/// Read-only view that resolves a rule's effective policy against its
/// fallback, and tests faults for a match.
pub struct Inspector<'a, T> {
    rule: &'a CatchRule<T>,
    fallback: &'a CatchRule<T>,
}

impl<'a, T> Inspector<'a, T> {
    /// Inspect `rule`, inheriting unset details from `fallback`.
    pub fn new(rule: &'a CatchRule<T>, fallback: &'a CatchRule<T>) -> Self {
        Inspector { rule, fallback }
    }

    /// Inspect a rule on its own (it serves as its own fallback). Used for
    /// inspecting a dispatcher's fallback rule directly.
    pub fn solo(rule: &'a CatchRule<T>) -> Self {
        Inspector { rule, fallback: rule }
    }

    // --- Matching -------------------------------------------------------------

    /// Whether this rule picks up the fault.
    pub fn matches(&self, fault: &Fault) -> bool {
        if !self.kind_matches(fault) {
            return false;
        }

        // Tri-state message logic: a filter configured nowhere stays
        // undecided and cannot veto; when both filters are configured,
        // either one succeeding is enough.
        let literal = self.message_matches(fault);
        let regex = self.message_matches_regex(fault);
        if (literal == Some(false) || regex == Some(false)) && literal != Some(true) && regex != Some(true) {
            return false;
        }

        true
    }

    /// Kind test. Uses the rule's own kinds only: an empty list passes
    /// everything, the wildcard kind passes everything.
    fn kind_matches(&self, fault: &Fault) -> bool {
        let kinds = &self.rule.kinds;
        if kinds.is_empty() {
            return true;
        }
        kinds.iter().any(|kind| kind == crate::ANY_KIND || kind == fault.kind())
    }

    /// Literal message test: `None` when no literals are configured on the
    /// rule or its fallback.
    fn message_matches(&self, fault: &Fault) -> Option<bool> {
        let strings =
            if !self.rule.match_strings.is_empty() { &self.rule.match_strings } else { &self.fallback.match_strings };
        if strings.is_empty() {
            return None;
        }
        Some(strings.iter().any(|candidate| candidate == fault.message()))
    }

    /// Regex message test: `None` when no regexes are configured on the rule
    /// or its fallback.
    fn message_matches_regex(&self, fault: &Fault) -> Option<bool> {
        let regexes =
            if !self.rule.match_regexes.is_empty() { &self.rule.match_regexes } else { &self.fallback.match_regexes };
        if regexes.is_empty() {
            return None;
        }
        Some(regexes.iter().any(|regex| regex.is_match(fault.message())))
    }

    // --- Resolution -----------------------------------------------------------

    /// The rule's own kind filter.
    pub fn kinds(&self) -> &[String] {
        &self.rule.kinds
    }

    /// The callbacks to run: the rule's list when non-empty, else the
    /// fallback's. No merging.
    pub fn resolve_callbacks(&self) -> &[Callback<T>] {
        if !self.rule.callbacks.is_empty() { &self.rule.callbacks } else { &self.fallback.callbacks }
    }

    /// The known-issue tags: the rule's list when non-empty, else the
    /// fallback's. No merging.
    pub fn resolve_known(&self) -> &[String] {
        if !self.rule.known.is_empty() { &self.rule.known } else { &self.fallback.known }
    }

    /// Whether any known-issue tags resolved.
    pub fn has_known(&self) -> bool {
        !self.resolve_known().is_empty()
    }

    /// The reporting channels: rule → fallback → config (keyed by
    /// known-ness). Empty means the sink's default destination.
    pub fn resolve_channels(&self) -> Vec<String> {
        if !self.rule.channels.is_empty() {
            return self.rule.channels.clone();
        }
        if !self.fallback.channels.is_empty() {
            return self.fallback.channels.clone();
        }
        config::current().channels_for(self.has_known()).to_vec()
    }

    /// The reporting level: rule → fallback → config (keyed by known-ness)
    /// → `error`.
    pub fn resolve_level(&self) -> Severity {
        self.rule
            .level
            .or(self.fallback.level)
            .or_else(|| config::current().level_for(self.has_known()))
            .unwrap_or(Severity::Error)
    }

    /// Whether the fault should be reported: rule → fallback → config → yes.
    pub fn should_report(&self) -> bool {
        self.rule.report.or(self.fallback.report).or(config::current().report).unwrap_or(true)
    }

    /// The rethrow policy: rule → fallback. `None` means no rethrow; there
    /// is no config tier for rethrow.
    pub fn pick_rethrow(&self) -> Option<Rethrow> {
        self.rule.rethrow.clone().or_else(|| self.fallback.rethrow.clone())
    }

    /// The default value: the rule's, when one was explicitly set, else the
    /// fallback's (whether or not the fallback set one).
    pub fn resolve_default(&self) -> Option<&DefaultValue<T>> {
        self.rule.default.as_ref().or(self.fallback.default.as_ref())
    }

    /// The rule's own finally. Never inherited from the fallback.
    pub fn finally(&self) -> Option<&Finally> {
        self.rule.finally.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::{Arc, Mutex, MutexGuard};

    // Tests that reach the config tier serialize on this lock and restore
    // the default config afterwards; everything else resolves above config.
    fn config_guard() -> MutexGuard<'static, ()> {
        static GUARD: Mutex<()> = Mutex::new(());
        GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn rule() -> CatchRule<i32> {
        CatchRule::new()
    }

    #[test]
    fn empty_kind_list_matches_any_fault() {
        let plain = rule();
        let inspector = Inspector::solo(&plain);
        assert!(inspector.matches(&crate::fault!("anything", "at all")));
    }

    #[test]
    fn kind_test_requires_a_listed_kind_or_the_wildcard() {
        let narrow = rule().catch(["db.timeout"]);
        let inspector = Inspector::solo(&narrow);
        assert!(inspector.matches(&crate::fault!("db.timeout", "x")));
        assert!(!inspector.matches(&crate::fault!("db.gone", "x")));

        let wild = rule().catch([crate::ANY_KIND]);
        let inspector = Inspector::solo(&wild);
        assert!(inspector.matches(&crate::fault!("db.gone", "x")));
    }

    #[test]
    fn kind_test_ignores_the_fallback_kinds() {
        let specific = rule();
        let fallback = rule().catch(["db.timeout"]);
        let inspector = Inspector::new(&specific, &fallback);
        // The rule's own (empty) kind list decides: everything passes.
        assert!(inspector.matches(&crate::fault!("totally.other", "x")));
    }

    #[test]
    fn message_filters_inherit_from_the_fallback() {
        let specific = rule();
        let fallback = rule().match_message(["expected message"]);
        let inspector = Inspector::new(&specific, &fallback);

        assert!(inspector.matches(&crate::fault!("x", "expected message")));
        assert!(!inspector.matches(&crate::fault!("x", "something else")));
    }

    #[test]
    fn rule_message_filters_supersede_the_fallbacks() {
        let specific = rule().match_message(["from the rule"]);
        let fallback = rule().match_message(["from the fallback"]);
        let inspector = Inspector::new(&specific, &fallback);

        assert!(inspector.matches(&crate::fault!("x", "from the rule")));
        assert!(!inspector.matches(&crate::fault!("x", "from the fallback")));
    }

    #[test]
    fn message_logic_tristate_table() {
        // (literal filter, regex filter, message, expected)
        let table: Vec<(Option<&str>, Option<&str>, &str, bool)> = vec![
            // Neither configured: vacuously satisfied.
            (None, None, "anything", true),
            // Only one configured: it alone decides.
            (Some("hit"), None, "hit", true),
            (Some("hit"), None, "miss", false),
            (None, Some("^h"), "hit", true),
            (None, Some("^h"), "miss", false),
            // Both configured: either succeeding is enough.
            (Some("hit"), Some("^zzz"), "hit", true),
            (Some("zzz"), Some("^h"), "hit", true),
            (Some("hit"), Some("^h"), "hit", true),
            // Both configured, both failing: non-match.
            (Some("zzz"), Some("^zzz"), "hit", false),
        ];

        for (literal, regex, message, expected) in table {
            let mut specific = rule();
            if let Some(literal) = literal {
                specific = specific.match_message([literal]);
            }
            if let Some(regex) = regex {
                specific = specific.match_regex([regex]).unwrap();
            }
            let inspector = Inspector::solo(&specific);
            let fault = crate::fault!("x", "{}", message);
            assert_eq!(inspector.matches(&fault), expected, "literal={literal:?} regex={regex:?} message={message:?}");
        }
    }

    #[test]
    fn callbacks_and_known_supersede_not_merge() {
        let recorded = Arc::new(Mutex::new(Vec::<&'static str>::new()));

        let recorded_rule = recorded.clone();
        let specific = rule().known(["RULE-1"]).callback(move |_incident| {
            recorded_rule.lock().unwrap().push("rule");
            Ok(())
        });
        let recorded_fallback = recorded.clone();
        let fallback = rule().known(["FALLBACK-1", "FALLBACK-2"]).callback(move |_incident| {
            recorded_fallback.lock().unwrap().push("fallback");
            Ok(())
        });

        let inspector = Inspector::new(&specific, &fallback);
        assert_eq!(inspector.resolve_known(), ["RULE-1".to_string()]);
        assert_eq!(inspector.resolve_callbacks().len(), 1);

        let bare = rule();
        let inspector = Inspector::new(&bare, &fallback);
        assert_eq!(inspector.resolve_known(), ["FALLBACK-1".to_string(), "FALLBACK-2".to_string()]);
        assert_eq!(inspector.resolve_callbacks().len(), 1);
    }

    #[test]
    fn channels_and_level_fall_through_rule_then_fallback() {
        let specific = rule().channel("rule-channel").notice();
        let fallback = rule().channel("fallback-channel").critical();

        let inspector = Inspector::new(&specific, &fallback);
        assert_eq!(inspector.resolve_channels(), ["rule-channel".to_string()]);
        assert_eq!(inspector.resolve_level(), Severity::Notice);

        let bare = rule();
        let inspector = Inspector::new(&bare, &fallback);
        assert_eq!(inspector.resolve_channels(), ["fallback-channel".to_string()]);
        assert_eq!(inspector.resolve_level(), Severity::Critical);
    }

    #[test]
    fn config_tier_is_keyed_by_known_ness() {
        let _guard = config_guard();
        crate::config::install(Config {
            report: Some(false),
            channels_when_known: vec!["known-channel".to_string()],
            channels_when_not_known: vec!["other-channel".to_string()],
            level_when_known: Some(Severity::Info),
            level_when_not_known: Some(Severity::Warning),
        });

        let tagged = rule().known(["TICKET-1"]);
        let inspector = Inspector::solo(&tagged);
        assert_eq!(inspector.resolve_channels(), ["known-channel".to_string()]);
        assert_eq!(inspector.resolve_level(), Severity::Info);
        assert!(!inspector.should_report());

        let untagged = rule();
        let inspector = Inspector::solo(&untagged);
        assert_eq!(inspector.resolve_channels(), ["other-channel".to_string()]);
        assert_eq!(inspector.resolve_level(), Severity::Warning);

        crate::config::install(Config::default());
    }

    #[test]
    fn hard_defaults_apply_when_nothing_decides() {
        let _guard = config_guard();
        crate::config::install(Config::default());

        let bare = rule();
        let inspector = Inspector::solo(&bare);
        assert_eq!(inspector.resolve_level(), Severity::Error);
        assert!(inspector.should_report());
        assert!(inspector.resolve_channels().is_empty());
        assert!(inspector.pick_rethrow().is_none());
    }

    #[test]
    fn default_distinguishes_unset_from_none() {
        let specific: CatchRule<Option<&str>> = CatchRule::new().default(None);
        let fallback: CatchRule<Option<&str>> = CatchRule::new().default(Some("fallback value"));

        let inspector = Inspector::new(&specific, &fallback);
        assert!(matches!(inspector.resolve_default(), Some(DefaultValue::Value(None))));

        let unset: CatchRule<Option<&str>> = CatchRule::new();
        let inspector = Inspector::new(&unset, &fallback);
        assert!(matches!(inspector.resolve_default(), Some(DefaultValue::Value(Some("fallback value")))));
    }

    #[test]
    fn finally_never_inherits() {
        let specific = rule();
        let fallback = rule().finally(|| Ok(()));
        let inspector = Inspector::new(&specific, &fallback);
        assert!(inspector.finally().is_none());

        let with_finally = rule().finally(|| Ok(()));
        let inspector = Inspector::new(&with_finally, &fallback);
        assert!(inspector.finally().is_some());
    }

    #[test]
    fn rethrow_falls_through_to_the_fallback() {
        let specific = rule();
        let fallback = rule().rethrow(true);
        let inspector = Inspector::new(&specific, &fallback);
        assert!(matches!(inspector.pick_rethrow(), Some(Rethrow::Accept)));

        let overriding = rule().dont_rethrow();
        let inspector = Inspector::new(&overriding, &fallback);
        assert!(matches!(inspector.pick_rethrow(), Some(Rethrow::Reject)));
    }
}

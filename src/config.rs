//! Ambient configuration: the lowest-priority tier of policy resolution.
//!
//! When neither a matched rule nor the dispatcher's fallback rule decides a
//! field, resolution falls through to this process-wide config: a default
//! report flag, and channel lists / severity levels keyed by whether the
//! fault was tagged as a known issue.
//!
//! The config is seeded from the environment on first use and can be
//! replaced at runtime with [`install`]:
//!
//! - `CORDON_REPORT` — `true`/`false` (also `1`/`0`, `on`/`off`, `yes`/`no`)
//! - `CORDON_CHANNELS_WHEN_KNOWN` — comma-separated channel names
//! - `CORDON_CHANNELS_WHEN_NOT_KNOWN` — comma-separated channel names
//! - `CORDON_LEVEL_WHEN_KNOWN` — a severity name (`debug` .. `emergency`)
//! - `CORDON_LEVEL_WHEN_NOT_KNOWN` — a severity name

use crate::Severity;
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

static CURRENT: Lazy<RwLock<Arc<Config>>> = Lazy::new(|| RwLock::new(Arc::new(Config::from_env())));

/// Process-wide fallback policy.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Whether faults should be reported when nothing else decides.
    /// Unset means report.
    pub report: Option<bool>,
    /// Channels used for faults tagged with a known issue.
    pub channels_when_known: Vec<String>,
    /// Channels used for faults with no known-issue tag.
    pub channels_when_not_known: Vec<String>,
    /// Severity used for faults tagged with a known issue.
    pub level_when_known: Option<Severity>,
    /// Severity used for faults with no known-issue tag.
    pub level_when_not_known: Option<Severity>,
}

impl Config {
    /// Build a config from the `CORDON_*` environment variables. Unset or
    /// unparsable values are left unset (a bad level name logs a warning).
    pub fn from_env() -> Self {
        Config {
            report: read("CORDON_REPORT").and_then(|raw| parse_flag(&raw)),
            channels_when_known: read("CORDON_CHANNELS_WHEN_KNOWN").map(|raw| parse_list(&raw)).unwrap_or_default(),
            channels_when_not_known: read("CORDON_CHANNELS_WHEN_NOT_KNOWN")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
            level_when_known: read("CORDON_LEVEL_WHEN_KNOWN").and_then(|raw| parse_level(&raw)),
            level_when_not_known: read("CORDON_LEVEL_WHEN_NOT_KNOWN").and_then(|raw| parse_level(&raw)),
        }
    }

    pub(crate) fn channels_for(&self, known: bool) -> &[String] {
        if known { &self.channels_when_known } else { &self.channels_when_not_known }
    }

    pub(crate) fn level_for(&self, known: bool) -> Option<Severity> {
        if known { self.level_when_known } else { self.level_when_not_known }
    }
}

/// Replace the process-wide config.
pub fn install(config: Config) {
    *CURRENT.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(config);
}

/// The config currently in effect.
pub fn current() -> Arc<Config> {
    Arc::clone(&CURRENT.read().unwrap_or_else(|poisoned| poisoned.into_inner()))
}

fn read(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|part| !part.is_empty()).map(String::from).collect()
}

fn parse_level(raw: &str) -> Option<Severity> {
    match Severity::parse(raw.trim()) {
        Ok(level) => Some(level),
        Err(_) => {
            tracing::warn!(level = raw, "ignoring unparsable severity in config");
            None
        }
    }
}

//! The reporting sink.
//!
//! Reporting is the one side effect the dispatcher performs itself (callbacks
//! belong to the caller), so it sits behind a trait: the default sink emits a
//! structured `tracing` event, and embedders or tests can [`install_sink`] a
//! replacement to route faults elsewhere.

use crate::fault::Fault;
use crate::Severity;
use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};

static SINK: Lazy<RwLock<Arc<dyn ReportSink>>> =
    Lazy::new(|| RwLock::new(Arc::new(TracingSink) as Arc<dyn ReportSink>));

/// Receives the faults a dispatch decided to report, together with the
/// resolved (and possibly callback-overridden) channel list and level.
pub trait ReportSink: Send + Sync {
    /// Emit one fault. Channels may be empty, meaning the sink's default
    /// destination.
    fn report(&self, fault: &Fault, known: &[String], channels: &[String], level: Severity);
}

/// Replace the process-wide sink.
pub fn install_sink(sink: Arc<dyn ReportSink>) {
    *SINK.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = sink;
}

pub(crate) fn dispatch(fault: &Fault, known: &[String], channels: &[String], level: Severity) {
    let sink = Arc::clone(&SINK.read().unwrap_or_else(|poisoned| poisoned.into_inner()));
    sink.report(fault, known, channels, level);
}

/// Default sink: a `tracing` event at the nearest native level, carrying the
/// full severity, channels and known-issue tags as fields.
struct TracingSink;

impl ReportSink for TracingSink {
    fn report(&self, fault: &Fault, known: &[String], channels: &[String], level: Severity) {
        let channels = channels.join(",");
        match level {
            Severity::Debug => {
                tracing::debug!(kind = fault.kind(), severity = %level, %channels, ?known, "{}", fault.message());
            }
            Severity::Info | Severity::Notice => {
                tracing::info!(kind = fault.kind(), severity = %level, %channels, ?known, "{}", fault.message());
            }
            Severity::Warning => {
                tracing::warn!(kind = fault.kind(), severity = %level, %channels, ?known, "{}", fault.message());
            }
            Severity::Error | Severity::Critical | Severity::Alert | Severity::Emergency => {
                tracing::error!(kind = fault.kind(), severity = %level, %channels, ?known, "{}", fault.message());
            }
        }
    }
}

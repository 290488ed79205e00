//! The crate-wide error type.
//!
//! Three groups of failures share the one enum:
//!
//! - builder misuse, surfaced synchronously at the call that caused it
//!   (`SetupIncomplete`, `LevelNotAllowed`, `BadMatchRegex`);
//! - dispatch-time misuse (`InvalidRethrowValue`);
//! - the faults the dispatcher exists to intercept (`Fault`): the protected
//!   operation's own error, rethrown original or substitute, or an error
//!   escaping a user callback / finally.

use crate::fault::Fault;
use thiserror::Error;

/// Everything that can go wrong while configuring or executing a dispatch.
#[derive(Error, Debug)]
pub enum Error {
    /// A fluent method was called before `prepare()` / `run()` completed setup.
    #[error("call prepare() or run() first, before calling {0}()")]
    SetupIncomplete(&'static str),

    /// A reporting level outside the fixed severity set was given.
    #[error("level {0:?} is not allowed; valid levels are: debug, info, notice, warning, error, critical, alert, emergency")]
    LevelNotAllowed(String),

    /// A message-match regex failed to compile.
    #[error("invalid match regex {pattern:?}")]
    BadMatchRegex {
        /// The pattern as given to the setter.
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A rethrow decider resolved to something other than accept, reject, or
    /// a substitute fault.
    #[error("invalid rethrow value: a decider must resolve to accept, reject, or a substitute fault")]
    InvalidRethrowValue,

    /// A fault escaping the dispatcher: rethrown, unmatched, or raised by a
    /// user-supplied callback or finally.
    #[error(transparent)]
    Fault(#[from] Fault),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_not_allowed_lists_the_valid_names() {
        let message = Error::LevelNotAllowed("verbose".to_string()).to_string();
        assert!(message.contains("\"verbose\""));
        assert!(message.contains("notice"));
        assert!(message.contains("emergency"));
    }

    #[test]
    fn fault_variant_is_transparent() {
        let error = Error::from(crate::fault!("io", "disk on fire"));
        assert_eq!(error.to_string(), "[io] disk on fire");
    }
}

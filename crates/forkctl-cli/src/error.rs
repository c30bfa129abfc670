//! The CLI's outward-facing error type.
//!
//! Every variant wraps a leaf or engine error this crate's library exposes.
//! Hand-rolled rather than `thiserror`-derived, matching
//! `bobisme-maw`'s `ManifoldError`: each `Display` arm is self-contained,
//! ending with an actionable next command rather than just a cause chain.

use std::fmt;

use forkctl::EngineError;
use forkctl::advisor::AdvisorError;
use forkctl::config::ConfigError;

/// Unified error type for the `forkctl` binary.
#[derive(Debug)]
pub enum ForkctlError {
    /// Loading or querying the entry configuration failed.
    Config(ConfigError),
    /// Building the advisor client failed (e.g. a malformed endpoint URL).
    Advisor(AdvisorError),
    /// The record/replay engine, or one of the lifecycle commands, failed.
    Engine(EngineError),
    /// An I/O error outside any of the above (creating `.forkctl` roots).
    Io(std::io::Error),
}

impl fmt::Display for ForkctlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{e}\n  To fix: check `.forkctl/config.json` against the entry schema and retry."),
            Self::Advisor(e) => {
                write!(f, "{e}\n  To fix: verify --advisor-endpoint and --advisor-api-key (or FORKCTL_ADVISOR_ENDPOINT/FORKCTL_ADVISOR_API_KEY) are set correctly.")
            }
            Self::Engine(e) => write!(f, "{e}"),
            Self::Io(e) => write!(f, "I/O error: {e}\n  To fix: check file permissions and disk space under .forkctl/."),
        }
    }
}

impl std::error::Error for ForkctlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Advisor(e) => Some(e),
            Self::Engine(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<ConfigError> for ForkctlError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<AdvisorError> for ForkctlError {
    fn from(e: AdvisorError) -> Self {
        Self::Advisor(e)
    }
}

impl From<EngineError> for ForkctlError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl From<std::io::Error> for ForkctlError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_error_display_passes_through_actionable_suggestion() {
        let err = ForkctlError::Engine(EngineError::HeadMismatch {
            name: "acme".to_owned(),
            pinned: "aaa".to_owned(),
            actual: "bbb".to_owned(),
        });
        let msg = format!("{err}");
        assert!(msg.contains("re-run `record acme`"));
    }

    #[test]
    fn advisor_error_display_names_the_flags() {
        let err = ForkctlError::Advisor(AdvisorError::Request("timeout".to_owned()));
        let msg = format!("{err}");
        assert!(msg.contains("--advisor-endpoint"));
        assert!(msg.contains("timeout"));
    }

    #[test]
    fn io_error_source_is_some() {
        let err = ForkctlError::Io(std::io::Error::other("disk full"));
        assert!(std::error::Error::source(&err).is_some());
    }
}

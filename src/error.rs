//! The engine-level error type: what [`crate::record`], [`crate::replay`],
//! and [`crate::status`] return, wrapping every leaf error this crate
//! defines.
//!
//! The CLI's outward-facing `ForkctlError` wraps this (and the leaf types
//! directly, for call sites that never go through an engine function) with a
//! hand-rolled, agent-actionable `Display` — see `forkctl-cli`'s own
//! `error` module.

use thiserror::Error;

use crate::advisor::AdvisorError;
use crate::codec::CodecError;
use crate::config::ConfigError;
use crate::hook::HookError;
use crate::pins::PinError;
use crate::resolver::ResolveError;
use forkctl_vcs::VcsError;

/// Errors surfaced by the record/replay engines and the status predicate.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration lookup failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading or writing a pin artifact failed.
    #[error(transparent)]
    Pin(#[from] PinError),

    /// A VCS operation failed.
    #[error(transparent)]
    Vcs(#[from] VcsError),

    /// The resolution codec rejected a stream or a positional apply.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The conflict resolver failed to produce a resolution.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// An advisor RPC failed outside the resolver's own wrapping.
    #[error(transparent)]
    Advisor(#[from] AdvisorError),

    /// The post-merge hook failed.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// A local patch failed to apply during `save`'s rebuild or during
    /// record/replay's local-patch replay step.
    #[error("local patch `{filename}` failed to apply: {detail}")]
    LocalPatch {
        /// The patch filename that failed.
        filename: String,
        /// The underlying cause.
        detail: String,
    },

    /// An I/O error outside any of the above (staging directory setup,
    /// preserving local patches, atomic swap).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The status predicate reported the clone unsafe to wipe.
    #[error("refusing to run: clone is dirty — {reasons}. Run `status <name>` for detail, or `push`/`save` to land your work, then retry")]
    GuardFailed {
        /// Human-readable join of every dirty reason.
        reasons: String,
    },

    /// A pin expected by replay was absent (distinct from
    /// [`PinError::StateMissing`] — this names a specific artifact such as
    /// `res-<k>.resolution` that the manifest says must exist).
    #[error("missing pin `{what}` for `{name}`: run `record {name}` to regenerate pins")]
    StateMissing {
        /// The managed entry name.
        name: String,
        /// The missing artifact's description.
        what: String,
    },

    /// Replay's freshly built HEAD disagrees with the pinned HEAD.
    #[error(
        "replay of `{name}` produced HEAD {actual} but the pinned HEAD is {pinned}: pins are stale or an upstream ref changed — re-run `record {name}` to refresh them"
    )]
    HeadMismatch {
        /// The managed entry name.
        name: String,
        /// The pinned HEAD SHA.
        pinned: String,
        /// The HEAD SHA replay actually produced.
        actual: String,
    },

    /// The entry's pin state is structurally invalid for the requested
    /// operation (e.g. no manifest but a non-empty `refs` list).
    #[error("invalid state for `{name}`: {detail}")]
    InvalidState {
        /// The managed entry name.
        name: String,
        /// What was wrong.
        detail: String,
    },

    /// A staged operation failed after staging began. The prior clone and
    /// pin directories are untouched; `detail` carries the underlying cause
    /// and, for `record`, where preserved local patches/resolutions were
    /// kept.
    #[error("FAILED — previous state is intact: {detail}")]
    Failed {
        /// The underlying cause plus recovery detail.
        detail: String,
    },
}

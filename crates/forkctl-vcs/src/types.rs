//! Core value types for the forkctl git abstraction layer.

use std::fmt;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The author/committer identity and timestamp applied to a single commit.
///
/// Every commit the core engine produces carries an explicit `Identity`
/// rather than relying on process-global git config or environment state —
/// concurrent resolver threads within one merge step never share mutable
/// identity state (see the concurrency model in the record engine).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Author and committer name.
    pub name: &'static str,
    /// Author and committer email.
    pub email: &'static str,
    /// Author and committer date, as epoch seconds, UTC.
    pub epoch_secs: u64,
}

impl Identity {
    /// The single identity used for every commit the core engine creates.
    pub const CI_NAME: &'static str = "ci";
    /// The single identity used for every commit the core engine creates.
    pub const CI_EMAIL: &'static str = "ci@local";

    /// Build the deterministic `ci <ci@local>` identity for timestamp `t`.
    #[must_use]
    pub const fn ci(epoch_secs: u64) -> Self {
        Self { name: Self::CI_NAME, email: Self::CI_EMAIL, epoch_secs }
    }
}

// ---------------------------------------------------------------------------
// CloneFilter
// ---------------------------------------------------------------------------

/// Partial-clone filter applied when cloning upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloneFilter {
    /// No filter — a full clone.
    None,
    /// `--filter=blob:none`: fetch commits and trees eagerly, blobs on demand.
    BlobNone,
    /// `--depth=1`: a shallow clone of the default branch tip only.
    Shallow,
}

impl CloneFilter {
    /// Render as the `git clone` argument fragment it corresponds to, if any.
    #[must_use]
    pub const fn as_arg(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::BlobNone => Some("--filter=blob:none"),
            Self::Shallow => Some("--depth=1"),
        }
    }
}

// ---------------------------------------------------------------------------
// MergeOutcome
// ---------------------------------------------------------------------------

/// The result of a merge or cherry-pick attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The merge completed with no conflicts.
    Ok,
    /// The merge left unmerged paths in the index.
    Conflicted {
        /// Paths with unresolved conflicts, in the order git reported them.
        paths: Vec<String>,
    },
}

impl MergeOutcome {
    /// `true` if the merge completed cleanly.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for MergeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "merge completed cleanly"),
            Self::Conflicted { paths } => {
                write!(f, "merge conflicted in {} file(s): {}", paths.len(), paths.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_deterministic_for_same_timestamp() {
        let a = Identity::ci(1_700_000_000);
        let b = Identity::ci(1_700_000_000);
        assert_eq!(a, b);
        assert_eq!(a.name, "ci");
        assert_eq!(a.email, "ci@local");
    }

    #[test]
    fn identity_differs_by_timestamp_only() {
        let a = Identity::ci(1);
        let b = Identity::ci(2);
        assert_ne!(a, b);
        assert_eq!(a.name, b.name);
    }

    #[test]
    fn clone_filter_args() {
        assert_eq!(CloneFilter::None.as_arg(), None);
        assert_eq!(CloneFilter::BlobNone.as_arg(), Some("--filter=blob:none"));
        assert_eq!(CloneFilter::Shallow.as_arg(), Some("--depth=1"));
    }

    #[test]
    fn merge_outcome_is_ok() {
        assert!(MergeOutcome::Ok.is_ok());
        assert!(!MergeOutcome::Conflicted { paths: vec!["a.txt".to_owned()] }.is_ok());
    }

    #[test]
    fn merge_outcome_display_lists_paths() {
        let outcome = MergeOutcome::Conflicted { paths: vec!["a.txt".to_owned(), "b.txt".to_owned()] };
        let text = outcome.to_string();
        assert!(text.contains("2 file(s)"));
        assert!(text.contains("a.txt, b.txt"));
    }
}

//! Ref dispatch: classify a merge-ref string as a commit hash, a pull-request
//! number, or a branch name, in that fixed tie-break order.

/// A merge ref, pattern-dispatched from its literal string form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefKind {
    /// A 7-40 character hex commit hash.
    Hash(String),
    /// An all-digit pull-request number.
    Pr(u64),
    /// Anything else — treated as a branch name.
    Branch(String),
}

/// Classify `r` as a hash, PR number, or branch name. The hash pattern
/// (`^[0-9a-f]{7,40}$`) takes priority over the PR pattern (`^[0-9]+$`),
/// which takes priority over branch treatment — so `1234567` routes as a
/// hash even though it is all digits.
#[must_use]
pub fn classify(r: &str) -> RefKind {
    if is_hash(r) {
        return RefKind::Hash(r.to_owned());
    }
    if let Ok(n) = r.parse::<u64>() {
        if r.bytes().all(|b| b.is_ascii_digit()) {
            return RefKind::Pr(n);
        }
    }
    RefKind::Branch(r.to_owned())
}

fn is_hash(r: &str) -> bool {
    (7..=40).contains(&r.len()) && r.bytes().all(|b| b.is_ascii_hexdigit())
}

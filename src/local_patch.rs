//! Local patches: unified diffs layered on top of recorded merges, applied
//! strictly in lexicographic filename order as one deterministic commit each.

/// Sanitize a user-supplied description to `[A-Za-z0-9_-]+`, collapsing runs
/// of disallowed characters into a single `-`, falling back to `local` if
/// nothing survives.
#[must_use]
pub fn sanitize_desc(desc: &str) -> String {
    let mut out = String::new();
    let mut last_was_sep = false;
    for c in desc.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
            last_was_sep = false;
        } else if !last_was_sep && !out.is_empty() {
            out.push('-');
            last_was_sep = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "local".to_owned()
    } else {
        out
    }
}

/// Build the filename `local-<NNN>-<desc>.patch`, `NNN` zero-padded to 3
/// digits.
#[must_use]
pub fn patch_filename(number: u32, desc: &str) -> String {
    format!("local-{number:03}-{}.patch", sanitize_desc(desc))
}

/// The deterministic identity timestamp for the `i`-th (1-based) local
/// patch commit, given the entry's merge count.
#[must_use]
pub const fn patch_identity_secs(merge_count: usize, i: usize) -> u64 {
    (merge_count + 2 + i) as u64
}

/// The deterministic commit message for applying `filename`, derived only
/// from the filename itself so replay reproduces byte-identical commits
/// without consulting anything beyond the pin it is replaying.
#[must_use]
pub fn commit_message(filename: &str) -> String {
    format!("local: {filename}")
}

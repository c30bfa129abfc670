//! Conflict resolver (record-time only): extracts diff3 hunks from a
//! conflicted file and resolves each through the tiered pipeline — Tier 0
//! deterministic, reuse-by-fingerprint, Tier 1 strategy classification,
//! Tier 2 generation — emitting a resolved file plus its resolution
//! sidecar.

use thiserror::Error;

use crate::advisor::{Advisor, AdvisorError, ClassifyItem, GenerateItem, Strategy};
use crate::codec::{self, CodecError, ConflictRecord, FileBlock};

/// One extracted diff3 conflict region.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Hunk {
    ours: Vec<u8>,
    base: Vec<u8>,
    theirs: Vec<u8>,
}

/// Errors resolving a single conflicted file.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The file's diff3 markers were malformed (e.g. `=======` before
    /// `|||||||`, or a hunk never closed).
    #[error("malformed diff3 markers in {path}: {detail}")]
    MalformedMarkers {
        /// The conflicted file's path.
        path: String,
        /// What was wrong.
        detail: String,
    },

    /// An advisor RPC failed.
    #[error("advisor call failed resolving {path}: {source}")]
    Advisor {
        /// The conflicted file's path.
        path: String,
        /// The underlying advisor error.
        #[source]
        source: AdvisorError,
    },

    /// The codec's self-check (re-applying the freshly encoded sidecar)
    /// failed to reproduce the resolved file. This is a resolver bug, not a
    /// condition replay can hit.
    #[error("resolution self-check failed for {path}: {source}")]
    VerificationFailed {
        /// The conflicted file's path.
        path: String,
        /// The codec error surfaced during the self-check.
        #[source]
        source: CodecError,
    },

    /// The resolved file came back empty while the conflicted input was not.
    /// This tier pipeline does not support whole-file deletion via hunk
    /// resolution, so an empty result always indicates a broken resolution
    /// rather than an intentional one.
    #[error("resolution of {path} produced an empty file")]
    EmptyResolution {
        /// The conflicted file's path.
        path: String,
    },
}

fn count_lines(bytes: &[u8]) -> u32 {
    u32::try_from(bytes.iter().filter(|&&b| b == b'\n').count()).unwrap_or(u32::MAX)
}

/// Split a conflicted file into the lines between markers, one [`Hunk`] per
/// `<<<<<<<` region.
fn extract_hunks(path: &str, conflicted: &[u8]) -> Result<Vec<Hunk>, ResolveError> {
    let lines: Vec<&[u8]> = {
        let mut out = Vec::new();
        let mut start = 0;
        for (i, &b) in conflicted.iter().enumerate() {
            if b == b'\n' {
                out.push(&conflicted[start..=i]);
                start = i + 1;
            }
        }
        if start < conflicted.len() {
            out.push(&conflicted[start..]);
        }
        out
    };

    let mut hunks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if !lines[i].starts_with(b"<<<<<<<") {
            i += 1;
            continue;
        }
        i += 1;
        let ours_start = i;
        while i < lines.len() && !lines[i].starts_with(b"|||||||") {
            if lines[i].starts_with(b"<<<<<<<") {
                return Err(ResolveError::MalformedMarkers {
                    path: path.to_owned(),
                    detail: "nested <<<<<<< before ||||||| ".to_owned(),
                });
            }
            i += 1;
        }
        if i >= lines.len() {
            return Err(ResolveError::MalformedMarkers { path: path.to_owned(), detail: "missing |||||||".to_owned() });
        }
        let ours: Vec<u8> = lines[ours_start..i].concat();
        i += 1;
        let base_start = i;
        while i < lines.len() && !lines[i].starts_with(b"=======") {
            i += 1;
        }
        if i >= lines.len() {
            return Err(ResolveError::MalformedMarkers { path: path.to_owned(), detail: "missing =======".to_owned() });
        }
        let base: Vec<u8> = lines[base_start..i].concat();
        i += 1;
        let theirs_start = i;
        while i < lines.len() && !lines[i].starts_with(b">>>>>>>") {
            i += 1;
        }
        if i >= lines.len() {
            return Err(ResolveError::MalformedMarkers { path: path.to_owned(), detail: "missing >>>>>>>".to_owned() });
        }
        let theirs: Vec<u8> = lines[theirs_start..i].concat();
        i += 1;
        hunks.push(Hunk { ours, base, theirs });
    }
    Ok(hunks)
}

/// Tier 0: deterministic resolution when one side matches base or both sides
/// agree. `None` means the hunk must be deferred to reuse/Tier 1/Tier 2.
fn tier0(hunk: &Hunk) -> Option<Vec<u8>> {
    if hunk.ours == hunk.base {
        Some(hunk.theirs.clone())
    } else if hunk.theirs == hunk.base {
        Some(hunk.ours.clone())
    } else if hunk.ours == hunk.theirs {
        Some(hunk.ours.clone())
    } else {
        None
    }
}

/// Reuse a prior resolution block's k-th record if its fingerprint matches
/// (strong) or, absent a fingerprint, its three line counts all match
/// (weak, bootstrap-only).
fn reuse(hunk: &Hunk, prior: Option<&FileBlock>, index: usize) -> Option<Vec<u8>> {
    let record = prior?.conflicts.get(index)?;
    let fp = codec::fingerprint(&hunk.ours, &hunk.base, &hunk.theirs);
    if record.sha == fp {
        return Some(record.resolution.clone());
    }
    if record.sha == [0u8; 32]
        && record.ours == count_lines(&hunk.ours)
        && record.base == count_lines(&hunk.base)
        && record.theirs == count_lines(&hunk.theirs)
    {
        return Some(record.resolution.clone());
    }
    None
}

/// Resolve one conflicted file against the tiered pipeline, returning the
/// resolved bytes and the per-file resolution sidecar.
pub fn resolve_file(
    path: &str,
    conflicted_bytes: &[u8],
    prior: Option<&FileBlock>,
    advisor: &dyn Advisor,
) -> Result<(Vec<u8>, FileBlock), ResolveError> {
    let hunks = extract_hunks(path, conflicted_bytes)?;
    let mut resolutions: Vec<Option<Vec<u8>>> = vec![None; hunks.len()];

    for (i, hunk) in hunks.iter().enumerate() {
        if let Some(r) = tier0(hunk) {
            resolutions[i] = Some(r);
        } else if let Some(r) = reuse(hunk, prior, i) {
            resolutions[i] = Some(r);
        }
    }

    let tier1_indices: Vec<usize> = (0..hunks.len()).filter(|&i| resolutions[i].is_none()).collect();
    if !tier1_indices.is_empty() {
        let batch: Vec<ClassifyItem> = tier1_indices
            .iter()
            .enumerate()
            .map(|(n, &i)| ClassifyItem {
                index: u32::try_from(n + 1).unwrap_or(u32::MAX),
                path: path.to_owned(),
                ours: String::from_utf8_lossy(&hunks[i].ours).into_owned(),
                base: String::from_utf8_lossy(&hunks[i].base).into_owned(),
                theirs: String::from_utf8_lossy(&hunks[i].theirs).into_owned(),
            })
            .collect();
        let strategies = advisor.classify(&batch).map_err(|e| ResolveError::Advisor { path: path.to_owned(), source: e })?;

        let mut generate_indices = Vec::new();
        for (n, &i) in tier1_indices.iter().enumerate() {
            let strategy = strategies.get(n).copied().unwrap_or(Strategy::Generate);
            let hunk = &hunks[i];
            match strategy {
                Strategy::Ours => resolutions[i] = Some(hunk.ours.clone()),
                Strategy::Theirs => resolutions[i] = Some(hunk.theirs.clone()),
                Strategy::BothOt => resolutions[i] = Some([hunk.ours.clone(), hunk.theirs.clone()].concat()),
                Strategy::BothTo => resolutions[i] = Some([hunk.theirs.clone(), hunk.ours.clone()].concat()),
                Strategy::Generate => generate_indices.push(i),
            }
        }

        if !generate_indices.is_empty() {
            let batch: Vec<GenerateItem> = generate_indices
                .iter()
                .enumerate()
                .map(|(n, &i)| GenerateItem {
                    index: u32::try_from(n + 1).unwrap_or(u32::MAX),
                    path: path.to_owned(),
                    ours: String::from_utf8_lossy(&hunks[i].ours).into_owned(),
                    base: String::from_utf8_lossy(&hunks[i].base).into_owned(),
                    theirs: String::from_utf8_lossy(&hunks[i].theirs).into_owned(),
                })
                .collect();
            let generated =
                advisor.generate(&batch).map_err(|e| ResolveError::Advisor { path: path.to_owned(), source: e })?;
            for (n, &i) in generate_indices.iter().enumerate() {
                resolutions[i] = generated.get(n).cloned();
            }
        }
    }

    let mut conflicts = Vec::with_capacity(hunks.len());
    for (hunk, resolution) in hunks.iter().zip(resolutions.into_iter()) {
        let resolution = resolution.unwrap_or_default();
        conflicts.push(ConflictRecord {
            ours: count_lines(&hunk.ours),
            base: count_lines(&hunk.base),
            theirs: count_lines(&hunk.theirs),
            resolution_lines: count_lines(&resolution),
            sha: codec::fingerprint(&hunk.ours, &hunk.base, &hunk.theirs),
            resolution,
        });
    }

    let block = FileBlock { path: path.to_owned(), conflicts: conflicts.clone() };
    let resolved = codec::apply_positional(conflicted_bytes, &conflicts)
        .map_err(|e| ResolveError::VerificationFailed { path: path.to_owned(), source: e })?;
    if resolved.is_empty() && !conflicted_bytes.is_empty() {
        return Err(ResolveError::EmptyResolution { path: path.to_owned() });
    }
    if resolved.windows(7).any(|w| w == b"<<<<<<<") {
        return Err(ResolveError::VerificationFailed {
            path: path.to_owned(),
            source: CodecError::CountMismatch { markers: 1, records: 0 },
        });
    }

    Ok((resolved, block))
}

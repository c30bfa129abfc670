//! The counted-resolution format: parse and emit per-file conflict
//! resolutions, and apply them positionally to a conflicted file.
//!
//! Pure and synchronous — no I/O beyond the byte buffers passed in. This is
//! the Rust-native counterpart of diff3-marker handling generalized from
//! "resolve shared workspace paths" to "apply a previously-recorded,
//! content-independent resolution."

use sha2::{Digest, Sha256};
use thiserror::Error;

/// One resolved conflict hunk within a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConflictRecord {
    /// Line count of the `ours` section.
    pub ours: u32,
    /// Line count of the `base` section.
    pub base: u32,
    /// Line count of the `theirs` section.
    pub theirs: u32,
    /// Line count of `resolution`.
    pub resolution_lines: u32,
    /// SHA-256 fingerprint of the three sections, used only to decide reuse.
    pub sha: [u8; 32],
    /// The resolved bytes to emit in place of the hunk.
    pub resolution: Vec<u8>,
}

/// A conflicted file's block of resolved hunks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileBlock {
    /// Repo-relative path of the conflicted file.
    pub path: String,
    /// Resolutions in the order their markers appear in the file.
    pub conflicts: Vec<ConflictRecord>,
}

/// Errors decoding a resolution stream or applying it to a conflicted file.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// A `CONFLICT` line could not be parsed.
    #[error("malformed CONFLICT line: {0}")]
    MalformedHeader(String),

    /// A `sha=` field was not 64 hex characters.
    #[error("malformed sha field: {0}")]
    MalformedSha(String),

    /// The resolution body ran past the end of the input.
    #[error("truncated resolution data for conflict with {0} resolution lines")]
    TruncatedResolution(u32),

    /// The number of `<<<<<<<` markers in the conflicted file did not equal
    /// the number of `CONFLICT` records supplied.
    #[error("conflict count mismatch: file has {markers} marker(s), resolution has {records} record(s)")]
    CountMismatch {
        /// Markers found in the conflicted file.
        markers: usize,
        /// Records supplied in the resolution.
        records: usize,
    },

    /// A conflict hunk ran off the end of the file before its boundary lines
    /// were consumed.
    #[error("truncated hunk at line {line}: expected {expected} more line(s)")]
    TruncatedHunk {
        /// 0-based line at which truncation was detected.
        line: usize,
        /// How many more lines the hunk required.
        expected: usize,
    },
}

const BOUNDARY: &[u8] = b"\n---BOUNDARY---\n";

/// SHA-256 of `ours \n ---BOUNDARY--- \n base \n ---BOUNDARY--- \n theirs`.
#[must_use]
pub fn fingerprint(ours: &[u8], base: &[u8], theirs: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(ours);
    hasher.update(BOUNDARY);
    hasher.update(base);
    hasher.update(BOUNDARY);
    hasher.update(theirs);
    hasher.finalize().into()
}

fn hex64(bytes: &[u8; 32]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Split `bytes` into lines, each retaining its trailing `\n` if present.
fn split_lines(bytes: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            lines.push(&bytes[start..=i]);
            start = i + 1;
        }
    }
    if start < bytes.len() {
        lines.push(&bytes[start..]);
    }
    lines
}

/// Emit `--- <path>` headers and `CONFLICT ...` records for every block, in
/// order.
#[must_use]
pub fn encode(blocks: &[FileBlock]) -> Vec<u8> {
    let mut out = Vec::new();
    for block in blocks {
        out.extend_from_slice(format!("--- {}\n", block.path).as_bytes());
        for c in &block.conflicts {
            out.extend_from_slice(
                format!(
                    "CONFLICT ours={} base={} theirs={} resolution={} sha={}\n",
                    c.ours,
                    c.base,
                    c.theirs,
                    c.resolution_lines,
                    hex64(&c.sha)
                )
                .as_bytes(),
            );
            out.extend_from_slice(&c.resolution);
        }
    }
    out
}

/// Parse the inverse of [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Vec<FileBlock>, CodecError> {
    let lines = split_lines(bytes);
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let header = std::str::from_utf8(lines[i]).unwrap_or("").trim_end_matches('\n');
        let Some(path) = header.strip_prefix("--- ") else {
            return Err(CodecError::MalformedHeader(header.to_owned()));
        };
        let mut block = FileBlock { path: path.to_owned(), conflicts: Vec::new() };
        i += 1;
        while i < lines.len() {
            let line = std::str::from_utf8(lines[i]).unwrap_or("").trim_end_matches('\n');
            if line.starts_with("--- ") {
                break;
            }
            let Some(fields) = line.strip_prefix("CONFLICT ") else {
                return Err(CodecError::MalformedHeader(line.to_owned()));
            };
            let mut ours = None;
            let mut base = None;
            let mut theirs = None;
            let mut resolution_lines = None;
            let mut sha_hex = None;
            for field in fields.split_whitespace() {
                let Some((key, value)) = field.split_once('=') else {
                    return Err(CodecError::MalformedHeader(line.to_owned()));
                };
                match key {
                    "ours" => ours = value.parse::<u32>().ok(),
                    "base" => base = value.parse::<u32>().ok(),
                    "theirs" => theirs = value.parse::<u32>().ok(),
                    "resolution" => resolution_lines = value.parse::<u32>().ok(),
                    "sha" => sha_hex = Some(value.to_owned()),
                    _ => {}
                }
            }
            let (Some(ours), Some(base), Some(theirs), Some(resolution_lines), Some(sha_hex)) =
                (ours, base, theirs, resolution_lines, sha_hex)
            else {
                return Err(CodecError::MalformedHeader(line.to_owned()));
            };
            let sha = parse_hex64(&sha_hex)?;
            i += 1;
            let mut resolution = Vec::new();
            let mut consumed = 0;
            while consumed < resolution_lines {
                if i >= lines.len() {
                    return Err(CodecError::TruncatedResolution(resolution_lines));
                }
                resolution.extend_from_slice(lines[i]);
                i += 1;
                consumed += 1;
            }
            block.conflicts.push(ConflictRecord { ours, base, theirs, resolution_lines, sha, resolution });
        }
        blocks.push(block);
    }
    Ok(blocks)
}

fn parse_hex64(s: &str) -> Result<[u8; 32], CodecError> {
    if s.len() != 64 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::MalformedSha(s.to_owned()));
    }
    let mut out = [0u8; 32];
    for (i, byte_out) in out.iter_mut().enumerate() {
        *byte_out =
            u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| CodecError::MalformedSha(s.to_owned()))?;
    }
    Ok(out)
}

/// Walk `conflicted_file` line by line; whenever a line begins with
/// `<<<<<<<` (exactly 7 chars), advance the conflict index, consume exactly
/// `ours+1+base+1+theirs+1` lines (the hunk plus its three boundary lines),
/// and emit the recorded resolution in their place. Non-conflict lines pass
/// through unchanged. The parser never inspects hunk content — only counts.
pub fn apply_positional(conflicted_file: &[u8], blocks: &[ConflictRecord]) -> Result<Vec<u8>, CodecError> {
    let lines = split_lines(conflicted_file);
    let markers = lines.iter().filter(|l| l.starts_with(b"<<<<<<<")).count();
    if markers != blocks.len() {
        return Err(CodecError::CountMismatch { markers, records: blocks.len() });
    }

    let mut out = Vec::new();
    let mut k = 0;
    let mut i = 0;
    while i < lines.len() {
        if lines[i].starts_with(b"<<<<<<<") {
            let record = &blocks[k];
            let hunk_lines = record.ours as usize + 1 + record.base as usize + 1 + record.theirs as usize + 1;
            if i + hunk_lines > lines.len() {
                return Err(CodecError::TruncatedHunk { line: i, expected: i + hunk_lines - lines.len() });
            }
            out.extend_from_slice(&record.resolution);
            i += hunk_lines;
            k += 1;
        } else {
            out.extend_from_slice(lines[i]);
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ours: u32, base: u32, theirs: u32, resolution: &[u8]) -> ConflictRecord {
        ConflictRecord {
            ours,
            base,
            theirs,
            resolution_lines: resolution.iter().filter(|&&b| b == b'\n').count() as u32,
            sha: fingerprint(b"o", b"b", b"t"),
            resolution: resolution.to_vec(),
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let blocks = vec![FileBlock {
            path: "src/lib.rs".to_owned(),
            conflicts: vec![record(1, 1, 1, b"resolved\n")],
        }];
        let bytes = encode(&blocks);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, blocks);
    }

    #[test]
    fn apply_positional_basic() {
        let conflicted = b"before\n<<<<<<< HEAD\nours\n||||||| base\nbase\n=======\ntheirs\n>>>>>>> incoming\nafter\n";
        let blocks = vec![record(1, 1, 1, b"resolved\n")];
        let result = apply_positional(conflicted, &blocks).unwrap();
        assert_eq!(result, b"before\nresolved\nafter\n");
    }

    #[test]
    fn apply_positional_ignores_hunk_content() {
        let conflicted_a =
            b"<<<<<<< HEAD\nours-a\n||||||| base\nbase-a\n=======\ntheirs-a\n>>>>>>> incoming\n";
        let conflicted_b =
            b"<<<<<<< HEAD\nXXXXXX\n||||||| base\nYYYYYY\n=======\nZZZZZZ\n>>>>>>> incoming\n";
        let blocks = vec![record(1, 1, 1, b"resolved\n")];
        assert_eq!(apply_positional(conflicted_a, &blocks).unwrap(), apply_positional(conflicted_b, &blocks).unwrap());
    }

    #[test]
    fn apply_positional_count_mismatch() {
        let conflicted = b"<<<<<<< HEAD\nours\n||||||| base\nbase\n=======\ntheirs\n>>>>>>> incoming\n";
        let blocks = vec![record(1, 1, 1, b"a\n"), record(1, 1, 1, b"b\n")];
        let err = apply_positional(conflicted, &blocks).unwrap_err();
        assert_eq!(err, CodecError::CountMismatch { markers: 1, records: 2 });
    }

    #[test]
    fn apply_positional_truncated_hunk() {
        let conflicted = b"<<<<<<< HEAD\nours\n";
        let blocks = vec![record(1, 1, 1, b"x\n")];
        let err = apply_positional(conflicted, &blocks).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedHunk { .. }));
    }

    #[test]
    fn fingerprint_is_stable() {
        let a = fingerprint(b"ours\n", b"base\n", b"theirs\n");
        let b = fingerprint(b"ours\n", b"base\n", b"theirs\n");
        assert_eq!(a, b);
        let c = fingerprint(b"ours2\n", b"base\n", b"theirs\n");
        assert_ne!(a, c);
    }

    #[test]
    fn decode_rejects_malformed_sha() {
        let bytes = b"--- a.txt\nCONFLICT ours=1 base=1 theirs=1 resolution=0 sha=nothex\n";
        let err = decode(bytes).unwrap_err();
        assert!(matches!(err, CodecError::MalformedSha(_)));
    }
}

#[cfg(all(test, feature = "proptests"))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn positional_apply_ignores_filler_bytes(
            filler_a in "[^<][a-zA-Z0-9 ]{0,40}",
            filler_b in "[^<][a-zA-Z0-9 ]{0,40}",
        ) {
            let build = |ours: &str| -> Vec<u8> {
                format!(
                    "<<<<<<< HEAD\n{ours}\n||||||| base\nbase\n=======\ntheirs\n>>>>>>> incoming\n"
                )
                .into_bytes()
            };
            let record = ConflictRecord {
                ours: 1,
                base: 1,
                theirs: 1,
                resolution_lines: 1,
                sha: fingerprint(b"x", b"y", b"z"),
                resolution: b"resolved\n".to_vec(),
            };
            let a = apply_positional(&build(&filler_a), std::slice::from_ref(&record)).unwrap();
            let b = apply_positional(&build(&filler_b), std::slice::from_ref(&record)).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}

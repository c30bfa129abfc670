//! The conflict-resolution oracle boundary: two stateless RPCs invoked only
//! from the record-time resolver.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One hunk submitted to `Advisor::classify`.
#[derive(Clone, Debug, Serialize)]
pub struct ClassifyItem {
    /// 1-based index within the batch, echoed back in the response line.
    pub index: u32,
    /// Repo-relative path of the file this hunk belongs to.
    pub path: String,
    /// The `ours` section.
    pub ours: String,
    /// The `base` section.
    pub base: String,
    /// The `theirs` section.
    pub theirs: String,
}

/// One hunk submitted to `Advisor::generate`.
#[derive(Clone, Debug, Serialize)]
pub struct GenerateItem {
    /// 1-based index within the batch, matching the `=== RESOLUTION N ===`
    /// header expected in the response.
    pub index: u32,
    /// Repo-relative path of the file this hunk belongs to.
    pub path: String,
    /// The `ours` section.
    pub ours: String,
    /// The `base` section.
    pub base: String,
    /// The `theirs` section.
    pub theirs: String,
}

/// A resolution strategy returned by `classify`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Keep the `ours` section.
    Ours,
    /// Keep the `theirs` section.
    Theirs,
    /// `ours` then `theirs`.
    BothOt,
    /// `theirs` then `ours`.
    BothTo,
    /// Defer to Tier 2 generation.
    Generate,
}

impl Strategy {
    /// Parse a strategy token, case-sensitively as advertised in the
    /// contract; unrecognized tokens coerce to [`Strategy::Generate`] rather
    /// than failing the batch.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        match token {
            "OURS" => Self::Ours,
            "THEIRS" => Self::Theirs,
            "BOTH_OT" => Self::BothOt,
            "BOTH_TO" => Self::BothTo,
            _ => Self::Generate,
        }
    }
}

/// Parse `classify`'s response lines of the form `N STRATEGY` into
/// `(1-based index, Strategy)` pairs. Tolerant of extra whitespace; lines
/// whose first token does not parse as an integer are ignored.
#[must_use]
pub fn parse_classify_lines(text: &str) -> Vec<(u32, Strategy)> {
    let mut out = Vec::new();
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        let Some(index_token) = tokens.next() else { continue };
        let Ok(index) = index_token.parse::<u32>() else { continue };
        let strategy = tokens.next().map_or(Strategy::Generate, Strategy::parse);
        out.push((index, strategy));
    }
    out
}

/// Parse `generate`'s response, blocks headed `=== RESOLUTION N ===`
/// containing only the merged code. Leading blank lines within a block are
/// retained verbatim. Returns `(1-based index, body bytes)` pairs.
#[must_use]
pub fn parse_generate_blocks(text: &str) -> Vec<(u32, Vec<u8>)> {
    let mut out = Vec::new();
    let mut current: Option<(u32, Vec<&str>)> = None;
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("=== RESOLUTION ").and_then(|s| s.strip_suffix(" ===")) {
            if let Some((index, lines)) = current.take() {
                out.push((index, lines.join("\n") + if lines.is_empty() { "" } else { "\n" }));
            }
            if let Ok(index) = rest.trim().parse::<u32>() {
                current = Some((index, Vec::new()));
            }
        } else if let Some((_, lines)) = current.as_mut() {
            lines.push(line);
        }
    }
    if let Some((index, lines)) = current.take() {
        out.push((index, lines.join("\n") + if lines.is_empty() { "" } else { "\n" }));
    }
    out.into_iter().map(|(i, s)| (i, s.into_bytes())).collect()
}

/// The advisor boundary: classify hunks into strategies, or generate merged
/// content for hunks that need it. Both RPCs are invoked only by the
/// record-time resolver; replay never calls an advisor.
///
/// `Sync` so the record engine can share one advisor reference across the
/// scoped threads that resolve a merge step's conflicted files in parallel.
pub trait Advisor: Sync {
    /// Classify each hunk in `batch`, returning one strategy per item, in the
    /// same order `batch` was submitted (the advisor may echo indices out of
    /// order in its raw response; the implementation is responsible for
    /// re-sorting before returning).
    fn classify(&self, batch: &[ClassifyItem]) -> Result<Vec<Strategy>, AdvisorError>;

    /// Generate merged content for each hunk in `batch`, returned in the same
    /// order `batch` was submitted.
    fn generate(&self, batch: &[GenerateItem]) -> Result<Vec<Vec<u8>>, AdvisorError>;
}

/// Errors from an advisor RPC.
#[derive(Debug, Error)]
pub enum AdvisorError {
    /// The HTTP request failed (network, timeout, non-2xx status).
    #[error("advisor request failed: {0}")]
    Request(String),

    /// The response body could not be parsed into the expected shape.
    #[error("advisor returned a malformed response: {0}")]
    MalformedResponse(String),

    /// The response was missing an entry for one or more submitted items.
    #[error("advisor response missing {missing} of {expected} expected item(s)")]
    Incomplete {
        /// How many items were expected.
        expected: usize,
        /// How many were missing from the response.
        missing: usize,
    },
}

// ---------------------------------------------------------------------------
// HttpAdvisor
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    items: &'a [ClassifyItem],
}

#[derive(Deserialize)]
struct ClassifyResponse {
    lines: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    items: &'a [GenerateItem],
}

#[derive(Deserialize)]
struct GenerateResponse {
    blocks: String,
}

/// Talks to a configurable HTTP endpoint implementing the two-RPC advisor
/// contract as JSON request/response bodies over a bearer-authenticated
/// connection.
pub struct HttpAdvisor {
    endpoint: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl HttpAdvisor {
    /// Build an advisor client pointed at `endpoint`, authenticating with
    /// `api_key`, bounded by a 30-second request timeout.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, AdvisorError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| AdvisorError::Request(e.to_string()))?;
        Ok(Self { endpoint: endpoint.into(), api_key: api_key.into(), client })
    }
}

impl Advisor for HttpAdvisor {
    fn classify(&self, batch: &[ClassifyItem]) -> Result<Vec<Strategy>, AdvisorError> {
        let response = self
            .client
            .post(format!("{}/classify", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&ClassifyRequest { items: batch })
            .send()
            .map_err(|e| AdvisorError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AdvisorError::Request(format!("classify returned status {}", response.status())));
        }
        let body: ClassifyResponse =
            response.json().map_err(|e| AdvisorError::MalformedResponse(e.to_string()))?;
        let mut by_index = parse_classify_lines(&body.lines);
        by_index.sort_by_key(|(i, _)| *i);
        let strategies: Vec<Strategy> = by_index.into_iter().map(|(_, s)| s).collect();
        if strategies.len() < batch.len() {
            return Err(AdvisorError::Incomplete { expected: batch.len(), missing: batch.len() - strategies.len() });
        }
        Ok(strategies)
    }

    fn generate(&self, batch: &[GenerateItem]) -> Result<Vec<Vec<u8>>, AdvisorError> {
        let response = self
            .client
            .post(format!("{}/generate", self.endpoint))
            .bearer_auth(&self.api_key)
            .json(&GenerateRequest { items: batch })
            .send()
            .map_err(|e| AdvisorError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AdvisorError::Request(format!("generate returned status {}", response.status())));
        }
        let body: GenerateResponse =
            response.json().map_err(|e| AdvisorError::MalformedResponse(e.to_string()))?;
        let mut by_index = parse_generate_blocks(&body.blocks);
        by_index.sort_by_key(|(i, _)| *i);
        let blocks: Vec<Vec<u8>> = by_index.into_iter().map(|(_, b)| b).collect();
        if blocks.len() < batch.len() {
            return Err(AdvisorError::Incomplete { expected: batch.len(), missing: batch.len() - blocks.len() });
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_classify_lines_basic() {
        let parsed = parse_classify_lines("1 OURS\n2 THEIRS\n3 GENERATE\n");
        assert_eq!(parsed, vec![(1, Strategy::Ours), (2, Strategy::Theirs), (3, Strategy::Generate)]);
    }

    #[test]
    fn parse_classify_lines_tolerates_whitespace_and_unknown_tokens() {
        let parsed = parse_classify_lines("  1    OURS  \n2 WEIRD\nnotanumber OURS\n3\n");
        assert_eq!(parsed, vec![(1, Strategy::Ours), (2, Strategy::Generate), (3, Strategy::Generate)]);
    }

    #[test]
    fn parse_generate_blocks_basic() {
        let text = "=== RESOLUTION 1 ===\nfn a() {}\n=== RESOLUTION 2 ===\n\nfn b() {}\n";
        let parsed = parse_generate_blocks(text);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, 1);
        assert_eq!(parsed[0].1, b"fn a() {}\n");
        assert_eq!(parsed[1].0, 2);
        assert_eq!(parsed[1].1, b"\nfn b() {}\n");
    }

    #[test]
    fn strategy_parse_unknown_is_generate() {
        assert_eq!(Strategy::parse("BOGUS"), Strategy::Generate);
        assert_eq!(Strategy::parse("BOTH_OT"), Strategy::BothOt);
    }
}

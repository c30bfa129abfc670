//! Fork entry configuration (`.forkctl/config.json`).
//!
//! Defines the typed configuration document that declares every managed
//! entry: its upstream, optional personal fork remote, ordered merge refs,
//! and workspace-inclusion globs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// The name reserved for the tool itself, never a valid managed entry.
const RESERVED_NAME: &str = "forkctl";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// The full configuration document: one [`Entry`] per managed fork, keyed by
/// name.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    entries: BTreeMap<String, Entry>,
}

impl Config {
    /// Load and parse the configuration document at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::NotFound { path: path.to_path_buf() })?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::Malformed { path: path.to_path_buf(), detail: e.to_string() })
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Result<&Entry, ConfigError> {
        self.entries.get(name).ok_or_else(|| ConfigError::EntryNotFound { name: name.to_owned() })
    }

    /// All entry names, sorted, excluding the tool's own reserved name.
    #[must_use]
    pub fn all_names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).filter(|n| *n != RESERVED_NAME).collect()
    }

    /// Walk up from the current directory looking for a `.git` directory,
    /// returning the first ancestor that has one.
    pub fn repo_root() -> Result<PathBuf, ConfigError> {
        let cwd = std::env::current_dir().map_err(|e| ConfigError::Malformed {
            path: PathBuf::from("."),
            detail: format!("could not determine current directory: {e}"),
        })?;
        let mut dir = cwd.as_path();
        loop {
            if dir.join(".git").exists() {
                return Ok(dir.to_path_buf());
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => {
                    return Err(ConfigError::Malformed {
                        path: cwd.clone(),
                        detail: "no .git directory found in any ancestor".to_owned(),
                    });
                }
            }
        }
    }

    /// Resolve `<repo_root>/.forkctl/config.json` via [`Self::repo_root`].
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::repo_root()?.join(".forkctl").join("config.json"))
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A single managed fork entry.
#[derive(Clone, Debug, Deserialize)]
pub struct Entry {
    /// The upstream repository URL.
    pub upstream: String,
    /// An optional personal fork remote, added as `fork` during record/replay.
    #[serde(default)]
    pub fork: Option<String>,
    /// Ordered merge refs (commit hash, PR number, or branch name).
    #[serde(default)]
    pub refs: Vec<String>,
    /// Workspace-inclusion glob patterns.
    #[serde(default)]
    pub workspace: Option<WorkspaceGlobs>,
    /// An optional shell command run as this entry's post-merge hook
    /// (`sh -c`, working directory set to the clone). Absent means
    /// [`crate::hook::NoopHook`].
    #[serde(default)]
    pub hook: Option<String>,
}

impl Entry {
    /// `true` if this entry has no merge refs configured — it is
    /// reference-only and gets a shallow clone rather than a recorded build.
    #[must_use]
    pub fn is_reference_only(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Workspace-inclusion glob patterns.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WorkspaceGlobs {
    /// Paths to include, as glob patterns.
    #[serde(default)]
    pub include: Vec<String>,
    /// Paths to exclude, as glob patterns.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl WorkspaceGlobs {
    /// Validate every pattern by attempting to compile it with the `glob`
    /// crate, returning the first invalid pattern's error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for pattern in self.include.iter().chain(self.exclude.iter()) {
            glob::Pattern::new(pattern).map_err(|e| ConfigError::Malformed {
                path: PathBuf::new(),
                detail: format!("invalid workspace glob `{pattern}`: {e}"),
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors from loading or querying the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("config file not found at {}", path.display())]
    NotFound {
        /// The path that was probed.
        path: PathBuf,
    },

    /// The configuration file exists but failed to parse.
    #[error("malformed config at {}: {detail}", path.display())]
    Malformed {
        /// The path that was being loaded.
        path: PathBuf,
        /// Human-readable parse detail.
        detail: String,
    },

    /// The requested entry name is not present in the configuration.
    #[error("no entry named `{name}` in config")]
    EntryNotFound {
        /// The entry name that was looked up.
        name: String,
    },
}

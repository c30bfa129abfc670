//! Shared CLI setup: resolving the config, pin root, clone root, and the
//! real [`ProcessVcsDriver`] every subcommand runs against.

use std::path::{Path, PathBuf};

use forkctl::config::Config;
use forkctl::pins::PinStore;
use forkctl_vcs::ProcessVcsDriver;

use crate::error::ForkctlError;

/// Everything a subcommand needs besides its own arguments: the loaded
/// config and the three repo-relative roots (`config.json`'s directory,
/// `pins/`, `clones/`) derived from [`Config::repo_root`].
pub struct Context {
    /// The loaded `.forkctl/config.json`.
    pub config: Config,
    /// `<repo_root>/.forkctl/pins`.
    pub pins_root: PathBuf,
    /// `<repo_root>/.forkctl/clones`.
    pub clones_root: PathBuf,
    /// The real `git`-backed driver every command runs against.
    pub vcs: ProcessVcsDriver,
}

impl Context {
    /// Load the config at `config_path` (or [`Config::default_path`] if
    /// `None`), and derive the pin and clone roots from the same repo root.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ForkctlError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => Config::default_path()?,
        };
        let config = Config::load(&path)?;
        let repo_root = Config::repo_root()?;
        let pins_root = repo_root.join(".forkctl").join("pins");
        let clones_root = repo_root.join(".forkctl").join("clones");
        Ok(Self { config, pins_root, clones_root, vcs: ProcessVcsDriver })
    }

    /// The pin store for `name`.
    #[must_use]
    pub fn pins(&self, name: &str) -> PinStore {
        PinStore::new(&self.pins_root, name)
    }

    /// The clone directory for `name`.
    #[must_use]
    pub fn clone_dir(&self, name: &str) -> PathBuf {
        self.clones_root.join(name)
    }
}

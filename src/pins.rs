//! The pin store — reads and writes the four on-disk pin artifacts for an
//! entry: `HEAD`, `manifest`, `res-<K>.resolution`, `local-<NNN>-<desc>.patch`.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Reads and writes an entry's pin directory.
///
/// Holds a root path and an optional *override* root. During staging, the
/// record and replay engines point the override at a temporary directory so
/// every subprocess and helper observes the same staging view without
/// threading a path through every call site.
#[derive(Clone, Debug)]
pub struct PinStore {
    root: PathBuf,
    name: String,
    r#override: Option<PathBuf>,
}

impl PinStore {
    /// Create a pin store rooted at `<pins_root>/<name>`.
    #[must_use]
    pub fn new(pins_root: &Path, name: &str) -> Self {
        Self { root: pins_root.to_path_buf(), name: name.to_owned(), r#override: None }
    }

    /// Point subsequent operations at `staging_root` instead of the real pin
    /// directory, without changing `self.name`.
    pub fn set_override(&mut self, staging_root: &Path) {
        self.r#override = Some(staging_root.to_path_buf());
    }

    /// Drop the staging override, resuming operations against the real root.
    pub fn clear_override(&mut self) {
        self.r#override = None;
    }

    /// The directory this store currently reads and writes, honoring any
    /// active override.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        self.r#override.as_ref().unwrap_or(&self.root).join(&self.name)
    }

    /// The real (never overridden) pins root, one level above this entry's
    /// directory. Used by the record engine to create a staging sibling on
    /// the same filesystem as the final pin directory.
    #[must_use]
    pub fn real_root(&self) -> &Path {
        &self.root
    }

    /// The entry name this store is rooted at.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn path(&self, leaf: &str) -> PathBuf {
        self.dir().join(leaf)
    }

    /// Read the `HEAD` pin. Errors (rather than returning `None`) if absent —
    /// replay's correctness depends on this pin existing.
    pub fn read_head(&self) -> Result<String, PinError> {
        std::fs::read_to_string(self.path("HEAD"))
            .map(|s| s.trim().to_owned())
            .map_err(|_| PinError::StateMissing { what: "HEAD".to_owned(), dir: self.dir() })
    }

    /// Write the `HEAD` pin.
    pub fn write_head(&self, sha: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(self.dir())?;
        std::fs::write(self.path("HEAD"), format!("{sha}\n"))
    }

    /// Read the manifest, or `None` if absent.
    pub fn read_manifest(&self) -> std::io::Result<Option<String>> {
        match std::fs::read_to_string(self.path("manifest")) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Overwrite the manifest.
    pub fn write_manifest(&self, text: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(self.dir())?;
        std::fs::write(self.path("manifest"), text)
    }

    /// Read `res-<k>.resolution`, or `None` if that merge step had no
    /// conflicts.
    pub fn read_resolution(&self, k: usize) -> std::io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.path(&format!("res-{k}.resolution"))) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write `res-<k>.resolution`.
    pub fn write_resolution(&self, k: usize, bytes: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(self.dir())?;
        std::fs::write(self.path(&format!("res-{k}.resolution")), bytes)
    }

    /// Write a local patch file under this entry's pin directory.
    pub fn write_local_patch(&self, filename: &str, bytes: &[u8]) -> std::io::Result<()> {
        std::fs::create_dir_all(self.dir())?;
        std::fs::write(self.path(filename), bytes)
    }

    /// Read a local patch file's bytes.
    pub fn read_local_patch(&self, filename: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path(filename))
    }

    /// The absolute path of a local patch file, for passing to
    /// [`forkctl_vcs::VcsDriver::apply_patch`].
    #[must_use]
    pub fn local_patch_path(&self, filename: &str) -> PathBuf {
        self.path(filename)
    }

    /// Remove a local patch file, tolerating its absence.
    pub fn remove_local_patch(&self, filename: &str) -> std::io::Result<()> {
        match std::fs::remove_file(self.path(filename)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// List local patch filenames, lexicographically sorted.
    pub fn list_local_patches(&self) -> std::io::Result<Vec<String>> {
        let dir = self.dir();
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with("local-") && name.ends_with(".patch") {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// The number of merge steps recorded in the manifest:
    /// `lines(manifest) - 1` (the base line doesn't count as a step), or `0`
    /// if no manifest exists.
    pub fn merge_count(&self) -> std::io::Result<usize> {
        Ok(self.read_manifest()?.map_or(0, |text| text.lines().filter(|l| !l.is_empty()).count().saturating_sub(1)))
    }
}

/// Errors reading or writing pin artifacts.
#[derive(Debug, Error)]
pub enum PinError {
    /// A pin expected to exist was absent.
    #[error("expected pin `{what}` missing in {}: run `record` to regenerate pins", dir.display())]
    StateMissing {
        /// Which artifact was missing.
        what: String,
        /// The pin directory that was probed.
        dir: PathBuf,
    },

    /// An I/O error occurred reading or writing a pin file.
    #[error("I/O error accessing pins: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_missing_is_state_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = PinStore::new(dir.path(), "acme");
        let err = store.read_head().unwrap_err();
        assert!(matches!(err, PinError::StateMissing { .. }));
    }

    #[test]
    fn head_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PinStore::new(dir.path(), "acme");
        store.write_head("deadbeef").unwrap();
        assert_eq!(store.read_head().unwrap(), "deadbeef");
    }

    #[test]
    fn manifest_absent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = PinStore::new(dir.path(), "acme");
        assert_eq!(store.read_manifest().unwrap(), None);
        assert_eq!(store.merge_count().unwrap(), 0);
    }

    #[test]
    fn merge_count_is_lines_minus_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = PinStore::new(dir.path(), "acme");
        store.write_manifest("base_sha\tmain\nsha1\tfeature\nsha2\tother\n").unwrap();
        assert_eq!(store.merge_count().unwrap(), 2);
    }

    #[test]
    fn resolution_absent_vs_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = PinStore::new(dir.path(), "acme");
        assert_eq!(store.read_resolution(1).unwrap(), None);
        store.write_resolution(1, b"--- a.txt\n").unwrap();
        assert_eq!(store.read_resolution(1).unwrap(), Some(b"--- a.txt\n".to_vec()));
    }

    #[test]
    fn local_patches_sorted_lexicographically() {
        let dir = tempfile::tempdir().unwrap();
        let store = PinStore::new(dir.path(), "acme");
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("local-002-b.patch"), b"").unwrap();
        std::fs::write(store.dir().join("local-001-a.patch"), b"").unwrap();
        std::fs::write(store.dir().join("manifest"), b"").unwrap();
        assert_eq!(
            store.list_local_patches().unwrap(),
            vec!["local-001-a.patch".to_owned(), "local-002-b.patch".to_owned()]
        );
    }

    #[test]
    fn local_patch_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PinStore::new(dir.path(), "acme");
        store.write_local_patch("local-001-fix.patch", b"diff\n").unwrap();
        assert_eq!(store.read_local_patch("local-001-fix.patch").unwrap(), b"diff\n");
        assert_eq!(store.local_patch_path("local-001-fix.patch"), store.dir().join("local-001-fix.patch"));
    }

    #[test]
    fn real_root_ignores_override() {
        let real = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let mut store = PinStore::new(real.path(), "acme");
        assert_eq!(store.real_root(), real.path());
        store.set_override(staging.path());
        assert_eq!(store.real_root(), real.path());
        assert_eq!(store.name(), "acme");
    }

    #[test]
    fn override_redirects_dir() {
        let real = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let mut store = PinStore::new(real.path(), "acme");
        store.write_head("real-sha").unwrap();

        store.set_override(staging.path());
        let err = store.read_head().unwrap_err();
        assert!(matches!(err, PinError::StateMissing { .. }));
        store.write_head("staged-sha").unwrap();
        assert_eq!(store.read_head().unwrap(), "staged-sha");

        store.clear_override();
        assert_eq!(store.read_head().unwrap(), "real-sha");
    }
}

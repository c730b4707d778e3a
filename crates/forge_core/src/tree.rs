//! In-memory project tree.
//!
//! A generated project is handled as an ordered map of relative paths to
//! UTF-8 file contents. Binary assets (icons, fonts) are carried alongside
//! so they can be resolved and written back, but rules never read them.
//! Every phase of a validation run reads and mutates this structure; only
//! the CLI and the build verifier touch the disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{CoreError, CoreResult};

/// Directories never loaded into a tree.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", "dist", "build", ".cache"];

/// A materialized project: relative path -> file content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectTree {
    files: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    binaries: BTreeMap<String, Vec<u8>>,
}

impl ProjectTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from `(path, content)` pairs.
    pub fn from_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Self
    where
        P: Into<String>,
        C: Into<String>,
    {
        Self {
            files: files
                .into_iter()
                .map(|(p, c)| (p.into(), c.into()))
                .collect(),
            binaries: BTreeMap::new(),
        }
    }

    /// Load every file below `root`.
    ///
    /// Dependency and build output directories are skipped. Files that are not
    /// valid UTF-8 are kept as binary assets.
    pub fn load(root: &Path) -> CoreResult<Self> {
        if !root.is_dir() {
            return Err(CoreError::ProjectNotFound(root.to_path_buf()));
        }

        let mut files = BTreeMap::new();
        let mut binaries = BTreeMap::new();
        let walker = WalkDir::new(root).sort_by_file_name().into_iter().filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            !SKIPPED_DIRS.iter().any(|d| *d == name)
        });

        for entry in walker {
            let entry = entry.map_err(|e| CoreError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let bytes = fs::read(path).map_err(|source| CoreError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
            match String::from_utf8(bytes) {
                Ok(content) => {
                    files.insert(key, content);
                }
                Err(e) => {
                    debug!("Keeping binary asset: {}", key);
                    binaries.insert(key, e.into_bytes());
                }
            }
        }

        debug!(
            "Loaded {} files ({} binary) from {:?}",
            files.len(),
            binaries.len(),
            root
        );
        Ok(Self { files, binaries })
    }

    /// Write every file below `root`, creating directories as needed.
    pub fn write_to(&self, root: &Path) -> CoreResult<()> {
        let text = self.files.iter().map(|(p, c)| (p, c.as_bytes()));
        let binary = self.binaries.iter().map(|(p, b)| (p, b.as_slice()));

        for (path, content) in text.chain(binary) {
            let relative = Path::new(path);
            let escapes = relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes || path.contains('\\') {
                return Err(CoreError::InvalidPath(path.clone()));
            }

            let target = root.join(relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, content)?;
        }
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(|s| s.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// True if `path` exists as either a text file or a binary asset.
    pub fn has_file(&self, path: &str) -> bool {
        self.files.contains_key(path) || self.binaries.contains_key(path)
    }

    pub fn insert_binary(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.binaries.insert(path.into(), bytes.into());
    }

    pub fn binary_paths(&self) -> impl Iterator<Item = &str> {
        self.binaries.keys().map(|k| k.as_str())
    }

    /// Insert or replace a file, returning the previous content.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) -> Option<String> {
        self.files.insert(path.into(), content.into())
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(path)
    }

    /// Move a file to a new path. Returns false if `from` does not exist or
    /// `to` is already taken.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from == to || self.has_file(to) {
            return false;
        }
        if let Some(content) = self.files.remove(from) {
            self.files.insert(to.to_string(), content);
            return true;
        }
        match self.binaries.remove(from) {
            Some(bytes) => {
                self.binaries.insert(to.to_string(), bytes);
                true
            }
            None => false,
        }
    }

    /// Paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Mutable access to file contents (paths are fixed).
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut String)> {
        self.files.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    /// Find an existing path (text or binary) equal to `path` ignoring ASCII case.
    pub fn find_case_insensitive(&self, path: &str) -> Option<&str> {
        self.files
            .keys()
            .chain(self.binaries.keys())
            .find(|k| k.eq_ignore_ascii_case(path))
            .map(|k| k.as_str())
    }

    /// Every path, text and binary, in sorted order.
    pub fn all_paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self.paths().chain(self.binary_paths()).collect();
        paths.sort_unstable();
        paths
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_skips_dependency_dirs() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::create_dir_all(temp.path().join("node_modules/react")).unwrap();
        fs::write(temp.path().join("package.json"), "{}").unwrap();
        fs::write(temp.path().join("src/main.jsx"), "import './App';").unwrap();
        fs::write(temp.path().join("node_modules/react/index.js"), "x").unwrap();
        fs::write(temp.path().join("icon.png"), [0xff_u8, 0xfe, 0x00, 0x9f]).unwrap();

        let tree = ProjectTree::load(temp.path()).unwrap();

        assert_eq!(tree.len(), 2);
        assert!(tree.contains("package.json"));
        assert!(tree.contains("src/main.jsx"));
        assert!(!tree.contains("icon.png"));
        assert!(tree.has_file("icon.png"));
    }

    #[test]
    fn test_load_missing_dir() {
        let result = ProjectTree::load(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(CoreError::ProjectNotFound(_))));
    }

    #[test]
    fn test_write_and_reload() {
        let temp = tempdir().unwrap();
        let mut tree = ProjectTree::from_files([
            ("index.html", "<html></html>"),
            ("public/manifest.json", "{}"),
        ]);
        tree.insert_binary("public/icons/icon-192.png", vec![0x89_u8, 0x50, 0xff, 0x00]);

        tree.write_to(temp.path()).unwrap();
        let loaded = ProjectTree::load(temp.path()).unwrap();

        assert_eq!(loaded, tree);
    }

    #[test]
    fn test_write_rejects_escaping_paths() {
        let temp = tempdir().unwrap();
        let tree = ProjectTree::from_files([("../outside.txt", "x")]);

        assert!(matches!(
            tree.write_to(temp.path()),
            Err(CoreError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_rename_and_case_lookup() {
        let mut tree = ProjectTree::from_files([("src/App.jsx", "a"), ("src/main.jsx", "b")]);

        assert_eq!(tree.find_case_insensitive("src/app.jsx"), Some("src/App.jsx"));
        assert!(!tree.rename("src/App.jsx", "src/main.jsx"));
        assert!(tree.rename("src/App.jsx", "src/components/App.jsx"));
        assert_eq!(tree.get("src/components/App.jsx"), Some("a"));
        assert!(!tree.contains("src/App.jsx"));
    }
}

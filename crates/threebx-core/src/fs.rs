//! The file system collaborator seam.
//!
//! [`compile`](crate::compile) never touches `std::fs` directly. Every read
//! goes through a [`FileSystem`] implementation supplied by the caller, so
//! an editor host can substitute in-memory buffers for files currently open
//! and unsaved without the core knowing the difference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Why a read failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    NotFound(PathBuf),
    /// The path exists but its contents are not valid UTF-8, or some other
    /// OS-level failure occurred reading it.
    ReadFailed { path: PathBuf, message: String },
}

impl std::fmt::Display for FsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FsError::NotFound(p) => write!(f, "file not found: {}", p.display()),
            FsError::ReadFailed { path, message } => {
                write!(f, "failed to read {}: {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for FsError {}

/// Read-only, synchronous file access. The one collaborator the core
/// consumes for its own I/O.
pub trait FileSystem {
    /// Reads the full contents of `path` as UTF-8 text.
    fn read(&self, path: &Path) -> Result<String, FsError>;

    /// Returns `true` if `path` can currently be read.
    fn exists(&self, path: &Path) -> bool;
}

/// Reads directly from the host operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> Result<String, FsError> {
        std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FsError::NotFound(path.to_path_buf())
            } else {
                FsError::ReadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            }
        })
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

/// Shadows a handful of paths with in-memory contents — open-in-editor
/// buffers — and falls back to an underlying file system for everything
/// else.
pub struct OverlayFileSystem<'a, F: FileSystem> {
    overlays: HashMap<PathBuf, String>,
    underlying: &'a F,
}

impl<'a, F: FileSystem> OverlayFileSystem<'a, F> {
    pub fn new(underlying: &'a F) -> Self {
        Self {
            overlays: HashMap::new(),
            underlying,
        }
    }

    /// Shadows `path` with `contents`, taking priority over the underlying
    /// file system until [`Self::remove_overlay`] is called.
    pub fn set_overlay(&mut self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.overlays.insert(path.into(), contents.into());
    }

    pub fn remove_overlay(&mut self, path: &Path) {
        self.overlays.remove(path);
    }
}

impl<'a, F: FileSystem> FileSystem for OverlayFileSystem<'a, F> {
    fn read(&self, path: &Path) -> Result<String, FsError> {
        if let Some(contents) = self.overlays.get(path) {
            return Ok(contents.clone());
        }
        self.underlying.read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        self.overlays.contains_key(path) || self.underlying.exists(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeFs(HashMap<PathBuf, String>);

    impl FileSystem for FakeFs {
        fn read(&self, path: &Path) -> Result<String, FsError> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| FsError::NotFound(path.to_path_buf()))
        }

        fn exists(&self, path: &Path) -> bool {
            self.0.contains_key(path)
        }
    }

    #[test]
    fn overlay_shadows_underlying_contents() {
        let mut underlying_map = HashMap::new();
        underlying_map.insert(PathBuf::from("a.3bx"), "on disk".to_string());
        let underlying = FakeFs(underlying_map);

        let mut overlay = OverlayFileSystem::new(&underlying);
        overlay.set_overlay("a.3bx", "in editor");

        assert_eq!(overlay.read(Path::new("a.3bx")).unwrap(), "in editor");
    }

    #[test]
    fn overlay_falls_through_when_no_shadow_present() {
        let mut underlying_map = HashMap::new();
        underlying_map.insert(PathBuf::from("b.3bx"), "on disk".to_string());
        let underlying = FakeFs(underlying_map);

        let overlay = OverlayFileSystem::new(&underlying);
        assert_eq!(overlay.read(Path::new("b.3bx")).unwrap(), "on disk");
    }

    #[test]
    fn overlay_removal_restores_underlying() {
        let mut underlying_map = HashMap::new();
        underlying_map.insert(PathBuf::from("c.3bx"), "on disk".to_string());
        let underlying = FakeFs(underlying_map);

        let mut overlay = OverlayFileSystem::new(&underlying);
        overlay.set_overlay("c.3bx", "in editor");
        overlay.remove_overlay(Path::new("c.3bx"));

        assert_eq!(overlay.read(Path::new("c.3bx")).unwrap(), "on disk");
    }

    #[test]
    fn missing_path_reports_not_found() {
        let underlying = FakeFs(HashMap::new());
        let overlay = OverlayFileSystem::new(&underlying);
        assert!(matches!(
            overlay.read(Path::new("missing.3bx")),
            Err(FsError::NotFound(_))
        ));
    }
}

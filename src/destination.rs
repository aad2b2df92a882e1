//! Destination directory allocation.
//!
//! A package `/path/to/App.pkg` extracts into `/path/to/App`. When the source
//! folder is not writable (a mounted disk image, say) the fallback base is
//! used instead, usually the desktop. Existing names get a numeric suffix:
//! `App`, `App-1`, `App-2`, ...

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ExtractionError, Result};

/// Highest suffix tried before giving up.
pub const MAX_COLLISION_SUFFIX: u32 = 999;

#[derive(Debug, Clone)]
pub struct DirectoryAllocator {
    fallback_base: PathBuf,
}

impl DirectoryAllocator {
    pub fn new(fallback_base: impl Into<PathBuf>) -> Self {
        Self {
            fallback_base: fallback_base.into(),
        }
    }

    /// Pick and create a fresh destination for `package`.
    ///
    /// The returned directory did not exist before this call.
    pub fn allocate(&self, package: &Path) -> Result<PathBuf> {
        let name = package
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| {
                ExtractionError::InvalidPackageFormat(format!(
                    "No package name in {}",
                    package.display()
                ))
            })?;

        let base = self.base_for(package);
        let dest = free_name(&base, &name)?;

        fs::create_dir_all(&dest).map_err(|e| {
            ExtractionError::io(format!("Failed to create {}", dest.display()), e)
        })?;
        debug!("Allocated destination {}", dest.display());
        Ok(dest)
    }

    fn base_for(&self, package: &Path) -> PathBuf {
        match containing_dir(package) {
            Some(parent) if is_writable(parent) => parent.to_path_buf(),
            Some(parent) => {
                debug!(
                    "{} is not writable, using {}",
                    parent.display(),
                    self.fallback_base.display()
                );
                self.fallback_base.clone()
            }
            None => self.fallback_base.clone(),
        }
    }
}

/// Folder holding `package`; `.` for a bare file name.
fn containing_dir(package: &Path) -> Option<&Path> {
    match package.parent() {
        Some(parent) if parent.as_os_str().is_empty() => Some(Path::new(".")),
        other => other,
    }
}

fn free_name(base: &Path, name: &str) -> Result<PathBuf> {
    let candidate = base.join(name);
    if !candidate.exists() {
        return Ok(candidate);
    }
    for suffix in 1..=MAX_COLLISION_SUFFIX {
        let candidate = base.join(format!("{}-{}", name, suffix));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(ExtractionError::TooManyCollisions(name.to_string()))
}

/// Whether the current user may create entries in `dir`.
#[cfg(unix)]
pub fn is_writable(dir: &Path) -> bool {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = CString::new(dir.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    unsafe { libc::access(c_path.as_ptr(), libc::W_OK) == 0 }
}

#[cfg(not(unix))]
pub fn is_writable(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false)
}

/// Default fallback base: the desktop, or `$HOME/Desktop` when the platform
/// reports none.
pub fn default_fallback_base() -> Option<PathBuf> {
    dirs::desktop_dir().or_else(|| dirs::home_dir().map(|home| home.join("Desktop")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_allocates_next_to_package() {
        let dir = tempdir().unwrap();
        let allocator = DirectoryAllocator::new(dir.path().join("desktop"));

        let dest = allocator.allocate(&dir.path().join("App.pkg")).unwrap();
        assert_eq!(dest, dir.path().join("App"));
        assert!(dest.is_dir());
    }

    #[test]
    fn test_successive_calls_add_suffixes() {
        let dir = tempdir().unwrap();
        let allocator = DirectoryAllocator::new(dir.path().join("desktop"));
        let pkg = dir.path().join("App.pkg");

        let names: Vec<PathBuf> = (0..4).map(|_| allocator.allocate(&pkg).unwrap()).collect();
        assert_eq!(
            names,
            vec![
                dir.path().join("App"),
                dir.path().join("App-1"),
                dir.path().join("App-2"),
                dir.path().join("App-3"),
            ]
        );
    }

    #[test]
    fn test_skips_existing_files_too() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("App"), b"not a dir").unwrap();
        let allocator = DirectoryAllocator::new(dir.path().join("desktop"));

        let dest = allocator.allocate(&dir.path().join("App.pkg")).unwrap();
        assert_eq!(dest, dir.path().join("App-1"));
    }

    #[test]
    fn test_unwritable_source_uses_fallback() {
        let dir = tempdir().unwrap();
        let desktop = dir.path().join("desktop");
        let allocator = DirectoryAllocator::new(&desktop);
        // a folder that does not exist cannot be written to
        let source = dir.path().join("ReadOnlyVolume");

        let first = allocator.allocate(&source.join("Tool.pkg")).unwrap();
        let second = allocator.allocate(&source.join("Tool.pkg")).unwrap();

        assert_eq!(first, desktop.join("Tool"));
        assert_eq!(second, desktop.join("Tool-1"));
        assert!(!source.exists());
    }

    #[test]
    fn test_too_many_collisions() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("Busy")).unwrap();
        for i in 1..=MAX_COLLISION_SUFFIX {
            fs::create_dir(dir.path().join(format!("Busy-{}", i))).unwrap();
        }
        let allocator = DirectoryAllocator::new(dir.path().join("desktop"));

        let err = allocator.allocate(&dir.path().join("Busy.pkg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TooManyCollisions);
        assert_eq!(err.to_string(), "Too many naming collisions for: Busy");
    }

    #[test]
    fn test_bare_file_name_uses_working_directory() {
        assert_eq!(containing_dir(Path::new("App.pkg")), Some(Path::new(".")));
        assert_eq!(containing_dir(Path::new("dl/App.pkg")), Some(Path::new("dl")));
        assert_eq!(containing_dir(Path::new("/")), None);
    }

    #[test]
    fn test_relative_package_allocates_next_to_it() {
        let cwd = std::env::current_dir().unwrap();
        let dir = tempfile::tempdir_in(&cwd).unwrap();
        let relative = dir.path().strip_prefix(&cwd).unwrap();
        let allocator = DirectoryAllocator::new(dir.path().join("desktop"));

        let dest = allocator.allocate(&relative.join("App.pkg")).unwrap();
        assert_eq!(dest, relative.join("App"));
        assert!(dir.path().join("App").is_dir());
        assert!(!dir.path().join("desktop").exists());
    }

    #[test]
    fn test_is_writable() {
        let dir = tempdir().unwrap();
        assert!(is_writable(dir.path()));
        assert!(!is_writable(&dir.path().join("missing")));
    }
}

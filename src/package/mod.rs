//! Package references and layout discovery.
//!
//! A [`PackageRef`] is a path plus its kind, fixed when the reference is
//! created. [`PackageRef::layout`] adds the style (modern or legacy) read
//! from disk, giving the [`PackageLayout`] the extractor dispatches on.

pub mod detect;
pub mod locate;

pub use detect::{detect_style, PackageStyle, CONTAINER_MAGIC};
pub use locate::{find_member_packages, find_pax_files, find_payload_files};

use std::path::{Path, PathBuf};

use crate::error::{ExtractionError, Result};

/// Kind of package, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageKind {
    /// `.pkg`
    Package,
    /// `.mpkg`, a bundle of member packages
    Metapackage,
}

impl PackageKind {
    /// Kind for a path; anything that is not `.mpkg` is a single package.
    pub fn from_path(path: &Path) -> Self {
        match extension_lowercase(path).as_deref() {
            Some("mpkg") => PackageKind::Metapackage,
            _ => PackageKind::Package,
        }
    }
}

/// Whether `path` has a `.pkg` or `.mpkg` extension (any case).
pub fn is_package_path(path: &Path) -> bool {
    matches!(extension_lowercase(path).as_deref(), Some("pkg" | "mpkg"))
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Tagged dispatch target for extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageLayout {
    Metapackage,
    Package(PackageStyle),
}

impl PackageLayout {
    pub fn describe(&self) -> &'static str {
        match self {
            PackageLayout::Metapackage => "metapackage",
            PackageLayout::Package(style) => style.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    path: PathBuf,
    kind: PackageKind,
}

impl PackageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = PackageKind::from_path(&path);
        Self { path, kind }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> PackageKind {
        self.kind
    }

    /// File name as shown to the user, e.g. `App.pkg`.
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// File name without extension, e.g. `App`.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.display_name())
    }

    /// Fail with `FileNotReadable` unless the package exists and can be read.
    pub fn ensure_readable(&self) -> Result<()> {
        let readable = match std::fs::metadata(&self.path) {
            Ok(meta) if meta.is_dir() => std::fs::read_dir(&self.path).is_ok(),
            Ok(_) => std::fs::File::open(&self.path).is_ok(),
            Err(_) => false,
        };
        if readable {
            Ok(())
        } else {
            Err(ExtractionError::FileNotReadable(self.display_name()))
        }
    }

    /// The same package with an absolute path.
    ///
    /// The tools run inside scratch and destination directories, so every
    /// path handed to them must be absolute.
    pub fn absolute(&self) -> Result<Self> {
        let path = std::path::absolute(&self.path).map_err(|e| {
            ExtractionError::io(format!("Failed to resolve {}", self.path.display()), e)
        })?;
        Ok(Self {
            path,
            kind: self.kind,
        })
    }

    /// Resolve the layout, reading the header for single packages.
    pub fn layout(&self) -> Result<PackageLayout> {
        match self.kind {
            PackageKind::Metapackage => Ok(PackageLayout::Metapackage),
            PackageKind::Package => Ok(PackageLayout::Package(detect_style(&self.path)?)),
        }
    }
}

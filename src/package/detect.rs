//! Package style detection by magic bytes.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{ExtractionError, Result};

/// Magic that opens every xar container (`xar!`).
pub const CONTAINER_MAGIC: [u8; 4] = *b"xar!";

/// On-disk layout of a single package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageStyle {
    /// Flat xar container (10.5 and later).
    Modern,
    /// Bundle directory with `.pax`/`.pax.gz` archives under `Contents`.
    Legacy,
}

impl PackageStyle {
    pub fn name(&self) -> &'static str {
        match self {
            PackageStyle::Modern => "modern (flat xar container)",
            PackageStyle::Legacy => "legacy (bundle with pax archives)",
        }
    }
}

/// Classify the first four bytes of a package.
///
/// Anything that is not exactly the container magic, including input
/// shorter than four bytes, is legacy.
pub fn classify_header(header: &[u8]) -> PackageStyle {
    if header.starts_with(&CONTAINER_MAGIC) {
        PackageStyle::Modern
    } else {
        PackageStyle::Legacy
    }
}

/// Detect the style of the package at `path`.
///
/// Bundle directories are legacy without being read. Files that cannot be
/// opened or read fail with `FileNotReadable`.
pub fn detect_style(path: &Path) -> Result<PackageStyle> {
    if path.is_dir() {
        return Ok(PackageStyle::Legacy);
    }

    let not_readable = || ExtractionError::FileNotReadable(display_name(path));

    let file = File::open(path).map_err(|_| not_readable())?;
    let mut header = Vec::with_capacity(CONTAINER_MAGIC.len());
    file.take(CONTAINER_MAGIC.len() as u64)
        .read_to_end(&mut header)
        .map_err(|_| not_readable())?;

    Ok(classify_header(&header))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    #[test]
    fn test_classify_header() {
        assert_eq!(classify_header(b"xar!"), PackageStyle::Modern);
        assert_eq!(classify_header(b"xar!\x00\x1c\x00\x01"), PackageStyle::Modern);
        assert_eq!(classify_header(b"xar"), PackageStyle::Legacy);
        assert_eq!(classify_header(b""), PackageStyle::Legacy);
        assert_eq!(classify_header(b"XAR!"), PackageStyle::Legacy);
        assert_eq!(classify_header(b"PK\x03\x04"), PackageStyle::Legacy);
    }

    #[test]
    fn test_detect_modern_file() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("App.pkg");
        std::fs::write(&pkg, b"xar!\x00\x1c rest of toc").unwrap();
        assert_eq!(detect_style(&pkg).unwrap(), PackageStyle::Modern);
    }

    #[test]
    fn test_detect_short_file_is_legacy() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("Tiny.pkg");
        std::fs::write(&pkg, b"xa").unwrap();
        assert_eq!(detect_style(&pkg).unwrap(), PackageStyle::Legacy);
    }

    #[test]
    fn test_detect_bundle_directory_is_legacy() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("Old.pkg");
        std::fs::create_dir_all(pkg.join("Contents")).unwrap();
        assert_eq!(detect_style(&pkg).unwrap(), PackageStyle::Legacy);
    }

    #[test]
    fn test_detect_missing_file_is_not_readable() {
        let dir = tempdir().unwrap();
        let err = detect_style(&dir.path().join("Gone.pkg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotReadable);
        assert_eq!(err.to_string(), "Cannot read file: Gone.pkg");
    }
}

//! Discovery of payload archives and member packages.
//!
//! Every list returned here is sorted, so extraction order is the same on
//! every run regardless of directory enumeration order.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ExtractionError, Result};

const PAYLOAD_PREFIX: &str = "Payload";
const PAYLOAD_NAMES: [&str; 3] = ["Payload.cpio", "Payload.cpio.gz", "Payload.cpio.gzip"];

/// Whether a file inside an unpacked container is a payload archive.
pub fn is_payload_name(name: &str) -> bool {
    name.starts_with(PAYLOAD_PREFIX) || PAYLOAD_NAMES.contains(&name)
}

/// Whether a file inside a legacy bundle is a pax archive.
pub fn is_pax_name(name: &str) -> bool {
    name.ends_with(".pax") || name.ends_with(".pax.gz")
}

/// Payload archives anywhere below an unpacked container, sorted by path.
///
/// An empty result is not an error; a container without payloads simply
/// extracts to an empty directory.
pub fn find_payload_files(container_dir: &Path) -> Result<Vec<PathBuf>> {
    collect_files(container_dir, is_payload_name)
}

/// `.pax`/`.pax.gz` archives under a legacy bundle's `Contents`, sorted by path.
pub fn find_pax_files(bundle: &Path) -> Result<Vec<PathBuf>> {
    let contents = bundle.join("Contents");
    if !contents.exists() {
        return Err(ExtractionError::InvalidPackageFormat(
            "No Contents directory found".to_string(),
        ));
    }

    let files = collect_files(&contents, is_pax_name)?;
    if files.is_empty() {
        return Err(ExtractionError::InvalidPackageFormat(
            "No pax files found in package".to_string(),
        ));
    }
    Ok(files)
}

/// Member packages directly inside `Contents/Packages`, sorted by name.
pub fn find_member_packages(metapackage: &Path) -> Result<Vec<PathBuf>> {
    let packages_dir = metapackage.join("Contents").join("Packages");
    if !packages_dir.exists() {
        return Err(ExtractionError::InvalidPackageFormat(
            "No Packages directory in metapackage".to_string(),
        ));
    }

    let entries = fs::read_dir(&packages_dir).map_err(|e| {
        ExtractionError::io(format!("Failed to list {}", packages_dir.display()), e)
    })?;

    let mut packages = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            ExtractionError::io(format!("Failed to list {}", packages_dir.display()), e)
        })?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "pkg") {
            packages.push(path);
        }
    }

    if packages.is_empty() {
        return Err(ExtractionError::InvalidPackageFormat(
            "No packages found in metapackage".to_string(),
        ));
    }

    packages.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(packages)
}

fn collect_files(root: &Path, matches: fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| {
            let context = format!("Failed to walk {}", root.display());
            match e.into_io_error() {
                Some(source) => ExtractionError::io(context, source),
                None => ExtractionError::io(context, std::io::Error::other("filesystem loop")),
            }
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if matches(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }
    // Full path string order, not component order: `a.pkg/` sorts before `a/`.
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_payload_names() {
        assert!(is_payload_name("Payload"));
        assert!(is_payload_name("Payload.cpio.gz"));
        assert!(is_payload_name("Payload.cpio.gzip"));
        assert!(is_payload_name("Payload~"));
        assert!(!is_payload_name("Bom"));
        assert!(!is_payload_name("PackageInfo"));
        assert!(!is_payload_name("payload"));
    }

    #[test]
    fn test_find_payload_files_sorted() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("b.pkg/Payload"));
        touch(&dir.path().join("a.pkg/Payload"));
        touch(&dir.path().join("a.pkg/Bom"));
        touch(&dir.path().join("Distribution"));

        let payloads = find_payload_files(dir.path()).unwrap();
        assert_eq!(
            payloads,
            vec![dir.path().join("a.pkg/Payload"), dir.path().join("b.pkg/Payload")]
        );

        // unchanged tree, same answer
        assert_eq!(find_payload_files(dir.path()).unwrap(), payloads);
    }

    #[test]
    fn test_find_payload_files_sorted_by_full_path() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("a/Payload"));
        touch(&dir.path().join("a.pkg/Payload"));

        let payloads = find_payload_files(dir.path()).unwrap();
        assert_eq!(
            payloads,
            vec![dir.path().join("a.pkg/Payload"), dir.path().join("a/Payload")]
        );
    }

    #[test]
    fn test_find_payload_files_empty_is_ok() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("Distribution"));
        assert!(find_payload_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_find_pax_files() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("Old.pkg");
        touch(&bundle.join("Contents/Resources/Extra.pax"));
        touch(&bundle.join("Contents/Archive.pax.gz"));
        touch(&bundle.join("Contents/Archive.bom"));

        let pax = find_pax_files(&bundle).unwrap();
        assert_eq!(
            pax,
            vec![
                bundle.join("Contents/Archive.pax.gz"),
                bundle.join("Contents/Resources/Extra.pax"),
            ]
        );
    }

    #[test]
    fn test_find_pax_files_requires_contents() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("Old.pkg");
        fs::create_dir_all(&bundle).unwrap();

        let err = find_pax_files(&bundle).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPackageFormat);
        assert_eq!(err.to_string(), "Invalid package format: No Contents directory found");
    }

    #[test]
    fn test_find_pax_files_requires_archives() {
        let dir = tempdir().unwrap();
        let bundle = dir.path().join("Old.pkg");
        touch(&bundle.join("Contents/Info.plist"));

        let err = find_pax_files(&bundle).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPackageFormat);
    }

    #[test]
    fn test_find_member_packages() {
        let dir = tempdir().unwrap();
        let mpkg = dir.path().join("Suite.mpkg");
        let packages = mpkg.join("Contents/Packages");
        touch(&packages.join("Zeta.pkg"));
        fs::create_dir_all(packages.join("Alpha.pkg/Contents")).unwrap();
        touch(&packages.join("ReadMe.rtf"));
        touch(&packages.join("Nested/Inner.pkg"));

        let members = find_member_packages(&mpkg).unwrap();
        assert_eq!(members, vec![packages.join("Alpha.pkg"), packages.join("Zeta.pkg")]);
    }

    #[test]
    fn test_find_member_packages_errors() {
        let dir = tempdir().unwrap();
        let mpkg = dir.path().join("Suite.mpkg");
        fs::create_dir_all(mpkg.join("Contents")).unwrap();
        let err = find_member_packages(&mpkg).unwrap_err();
        assert_eq!(err.to_string(), "Invalid package format: No Packages directory in metapackage");

        fs::create_dir_all(mpkg.join("Contents/Packages")).unwrap();
        let err = find_member_packages(&mpkg).unwrap_err();
        assert_eq!(err.to_string(), "Invalid package format: No packages found in metapackage");
    }
}

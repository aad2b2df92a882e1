//! Fixed locations and argument conventions of the package tools.
//!
//! | Tool    | Default path     | Used for                                  |
//! |---------|------------------|-------------------------------------------|
//! | `xar`   | `/usr/bin/xar`   | unpacking the container of modern packages |
//! | `cpio`  | `/usr/bin/cpio`  | materializing modern payloads              |
//! | `pax`   | `/bin/pax`       | materializing legacy `.pax` archives        |
//! | `gzcat` | `/usr/bin/gzcat` | decompressing `.gz` payloads into a pipe    |
//!
//! Tools are never looked up in `PATH`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::command::CommandSpec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub xar: PathBuf,
    pub cpio: PathBuf,
    pub pax: PathBuf,
    pub gzcat: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            xar: PathBuf::from("/usr/bin/xar"),
            cpio: PathBuf::from("/usr/bin/cpio"),
            pax: PathBuf::from("/bin/pax"),
            gzcat: PathBuf::from("/usr/bin/gzcat"),
        }
    }
}

impl ToolPaths {
    /// All tools with their role names.
    pub fn entries(&self) -> [(&'static str, &Path); 4] {
        [
            ("xar", self.xar.as_path()),
            ("cpio", self.cpio.as_path()),
            ("pax", self.pax.as_path()),
            ("gzcat", self.gzcat.as_path()),
        ]
    }

    /// `xar -xf <container>`, run inside an empty scratch directory.
    pub fn unpack_container(&self, container: &Path, scratch: &Path) -> CommandSpec {
        CommandSpec::new(&self.xar)
            .arg("-xf")
            .arg(container)
            .current_dir(scratch)
    }

    /// `cpio -idm < <payload>` into `dest`.
    pub fn cpio_from_file(&self, payload: &Path, dest: &Path) -> CommandSpec {
        self.cpio_from_pipe(dest).stdin_file(payload)
    }

    /// `cpio -idm` into `dest`, reading a pipe.
    pub fn cpio_from_pipe(&self, dest: &Path) -> CommandSpec {
        CommandSpec::new(&self.cpio).arg("-idm").current_dir(dest)
    }

    /// `pax -r -f <archive>` into `dest`.
    pub fn pax_from_file(&self, archive: &Path, dest: &Path) -> CommandSpec {
        CommandSpec::new(&self.pax)
            .arg("-r")
            .arg("-f")
            .arg(archive)
            .current_dir(dest)
    }

    /// `pax -r` into `dest`, reading a pipe.
    pub fn pax_from_pipe(&self, dest: &Path) -> CommandSpec {
        CommandSpec::new(&self.pax).arg("-r").current_dir(dest)
    }

    /// `gzcat <file>`, writing to stdout.
    pub fn decompress(&self, file: &Path) -> CommandSpec {
        CommandSpec::new(&self.gzcat).arg(file)
    }
}

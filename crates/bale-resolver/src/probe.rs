//! Memoised filesystem probes.
//!
//! Resolution stats the same paths over and over (extension candidates,
//! index files, `node_modules` levels). Probes are memoised per build and
//! cleared by [`FsProbe::clear`] when a build starts or the watcher reports
//! a change.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    File,
    Dir,
    Missing,
}

/// A stat cache over the project filesystem.
#[derive(Default)]
pub struct FsProbe {
    cache: Mutex<FxHashMap<PathBuf, FileKind>>,
}

impl FsProbe {
    fn kind(&self, path: &Path) -> FileKind {
        if let Some(kind) = self.cache.lock().get(path) {
            return *kind;
        }
        let kind = match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => FileKind::File,
            Ok(meta) if meta.is_dir() => FileKind::Dir,
            _ => FileKind::Missing,
        };
        self.cache.lock().insert(path.to_path_buf(), kind);
        kind
    }

    pub fn is_file(&self, path: &Path) -> bool {
        self.kind(path) == FileKind::File
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        self.kind(path) == FileKind::Dir
    }

    pub fn clear(&self) {
        self.cache.lock().clear();
    }
}

/// Append an extension to a candidate path textually: `./a.b` with `ts`
/// becomes `./a.b.ts`, never replacing the existing suffix.
pub fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_existing_suffix() {
        assert_eq!(
            append_extension(Path::new("/p/a.b"), "ts"),
            PathBuf::from("/p/a.b.ts")
        );
    }

    #[test]
    fn probe_memoises_until_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.js");
        let probe = FsProbe::default();

        assert!(!probe.is_file(&file));
        std::fs::write(&file, "export {}").unwrap();
        // Memoised miss.
        assert!(!probe.is_file(&file));
        probe.clear();
        assert!(probe.is_file(&file));
    }
}

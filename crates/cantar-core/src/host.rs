//! The small host-filesystem capability surface used by the extractor and
//! the tree walker.
//!
//! Keeping filesystem access behind a trait keeps platform differences
//! (symlink support, executable bits, mode propagation) in one place and
//! lets tests substitute an instrumented host.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Coarse file type from an `lstat`-style query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFileType {
    /// Regular file.
    File,
    /// Directory.
    Directory,
    /// Symbolic link (not followed).
    Symlink,
    /// Anything else (sockets, devices, ...).
    Other,
}

/// Result of an `lstat`-style query.
#[derive(Debug, Clone)]
pub struct HostStat {
    /// The file type, links not followed.
    pub file_type: HostFileType,
    /// Size in bytes (files only; zero otherwise).
    pub len: u64,
    /// Permission bits as reported by the host.
    pub mode: u32,
}

impl HostStat {
    fn from_metadata(meta: &fs::Metadata) -> Self {
        let file_type = if meta.file_type().is_symlink() {
            HostFileType::Symlink
        } else if meta.is_dir() {
            HostFileType::Directory
        } else if meta.is_file() {
            HostFileType::File
        } else {
            HostFileType::Other
        };
        Self {
            file_type,
            len: if file_type == HostFileType::File {
                meta.len()
            } else {
                0
            },
            mode: host_mode(meta),
        }
    }
}

#[cfg(unix)]
fn host_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn host_mode(meta: &fs::Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

/// Filesystem operations the engine needs from its host.
pub trait Host {
    /// Stats a path without following a final symlink; `None` if missing.
    fn lstat(&self, path: &Path) -> io::Result<Option<HostStat>>;

    /// Creates a single directory.
    fn mkdir(&self, path: &Path) -> io::Result<()>;

    /// Creates a directory and all missing parents.
    fn mkpath(&self, path: &Path) -> io::Result<()>;

    /// Creates a symlink at `at` pointing to `target`.
    fn symlink(&self, target: &str, at: &Path) -> io::Result<()>;

    /// Reads a symlink's target.
    fn readlink(&self, path: &Path) -> io::Result<PathBuf>;

    /// Removes a file, symlink or directory tree.
    fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Copies a file or directory tree, following symlinks, propagating
    /// permission bits onto the copy.
    fn copy_recursive(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Sets permission bits.
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Probes whether symlinks can be created under `dir`.
    fn can_symlink(&self, dir: &Path) -> bool;

    /// Whether the metadata describes an owner-executable file.
    fn is_executable(&self, meta: &fs::Metadata) -> bool;
}

/// Joins a normalized archive path onto a host root directory.
///
/// The archive root `.` maps to the root itself.
pub(crate) fn sys_path(root: &Path, rel: &str) -> PathBuf {
    if rel == "." {
        root.to_path_buf()
    } else {
        root.join(rel)
    }
}

/// The real local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHost;

impl Host for LocalHost {
    fn lstat(&self, path: &Path) -> io::Result<Option<HostStat>> {
        match fs::symlink_metadata(path) {
            Ok(meta) => Ok(Some(HostStat::from_metadata(&meta))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn mkdir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn mkpath(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    #[cfg(unix)]
    fn symlink(&self, target: &str, at: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(target, at)
    }

    #[cfg(windows)]
    fn symlink(&self, target: &str, at: &Path) -> io::Result<()> {
        // Without looking at the (possibly absent) target there is no way
        // to pick the right flavor; files are the common case.
        std::os::windows::fs::symlink_file(target, at)
    }

    #[cfg(not(any(unix, windows)))]
    fn symlink(&self, _target: &str, _at: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symlinks are not supported on this platform",
        ))
    }

    fn readlink(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn remove_all(&self, path: &Path) -> io::Result<()> {
        let meta = fs::symlink_metadata(path)?;
        if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn copy_recursive(&self, from: &Path, to: &Path) -> io::Result<()> {
        let meta = fs::metadata(from)?;
        if meta.is_dir() {
            fs::create_dir_all(to)?;
            for entry in fs::read_dir(from)? {
                let entry = entry?;
                self.copy_recursive(&entry.path(), &to.join(entry.file_name()))?;
            }
            fs::set_permissions(to, meta.permissions())?;
        } else {
            fs::copy(from, to)?;
            // `fs::copy` propagates permissions on Unix; on Windows the
            // read-only flag must be carried over by hand.
            #[cfg(windows)]
            fs::set_permissions(to, meta.permissions())?;
        }
        Ok(())
    }

    #[cfg(unix)]
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(mode & 0o200 == 0);
        fs::set_permissions(path, perms)
    }

    fn can_symlink(&self, dir: &Path) -> bool {
        let probe = dir.join(format!(".symlink-probe-{}", std::process::id()));
        let ok = self.symlink("probe-target", &probe).is_ok();
        if ok {
            let _ = fs::remove_file(&probe);
        }
        ok
    }

    #[cfg(unix)]
    fn is_executable(&self, meta: &fs::Metadata) -> bool {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o100 != 0
    }

    #[cfg(not(unix))]
    fn is_executable(&self, _meta: &fs::Metadata) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lstat_missing_is_none() {
        let temp = TempDir::new().expect("tempdir");
        let stat = LocalHost.lstat(&temp.path().join("nope")).unwrap();
        assert!(stat.is_none());
    }

    #[test]
    fn lstat_reports_types() {
        let temp = TempDir::new().expect("tempdir");
        std::fs::write(temp.path().join("f"), b"abc").unwrap();
        std::fs::create_dir(temp.path().join("d")).unwrap();

        let f = LocalHost.lstat(&temp.path().join("f")).unwrap().unwrap();
        assert_eq!(f.file_type, HostFileType::File);
        assert_eq!(f.len, 3);
        let d = LocalHost.lstat(&temp.path().join("d")).unwrap().unwrap();
        assert_eq!(d.file_type, HostFileType::Directory);
    }

    #[test]
    #[cfg(unix)]
    fn symlink_probe_succeeds_on_unix() {
        let temp = TempDir::new().expect("tempdir");
        assert!(LocalHost.can_symlink(temp.path()));
        // The probe cleans up after itself.
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn copy_recursive_copies_trees() {
        let temp = TempDir::new().expect("tempdir");
        let src = temp.path().join("src");
        std::fs::create_dir_all(src.join("sub")).unwrap();
        std::fs::write(src.join("a.txt"), b"top").unwrap();
        std::fs::write(src.join("sub/b.txt"), b"nested").unwrap();

        let dst = temp.path().join("dst");
        LocalHost.copy_recursive(&src, &dst).unwrap();
        assert_eq!(std::fs::read(dst.join("a.txt")).unwrap(), b"top");
        assert_eq!(std::fs::read(dst.join("sub/b.txt")).unwrap(), b"nested");
    }

    #[test]
    fn remove_all_handles_files_and_dirs() {
        let temp = TempDir::new().expect("tempdir");
        let file = temp.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        LocalHost.remove_all(&file).unwrap();
        assert!(!file.exists());

        let dir = temp.path().join("d");
        std::fs::create_dir_all(dir.join("inner")).unwrap();
        LocalHost.remove_all(&dir).unwrap();
        assert!(!dir.exists());
    }
}

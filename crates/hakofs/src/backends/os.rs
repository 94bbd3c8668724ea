//! Host filesystem backend.
//!
//! A thin pass-through to `std::fs`. Paths are used as given (relative
//! paths resolve against the process working directory); wrap it in a
//! [`BasePathBackend`](super::BasePathBackend) to confine it to a root.

use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt, PermissionsExt};
use std::path::Path;
use std::time::SystemTime;

use crate::error::{PathError, PathResult, VfsError, VfsResult};
use crate::ops::{VfsFile, VfsOps};
use crate::types::{DirEntry, FileAttr, FileType, MODE_DIR, MODE_PERM, OpenFlags};

/// Mode given to files made by `create`, before the umask.
const CREATE_MODE: u32 = 0o666;

/// Host filesystem backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsBackend;

impl OsBackend {
    /// Create a new host filesystem backend.
    pub fn new() -> Self {
        Self
    }

    /// Get the path string for error messages.
    fn path_str(path: &Path) -> String {
        path.display().to_string()
    }

    fn wrap(op: &'static str, path: &Path) -> impl FnOnce(io::Error) -> PathError {
        let display = Self::path_str(path);
        move |e| PathError::new(op, display, e)
    }

    /// Convert std::fs::Metadata to FileAttr.
    fn metadata_to_attr(name: String, meta: &fs::Metadata) -> FileAttr {
        let (kind, mode, size) = if meta.is_dir() {
            (FileType::Directory, meta.permissions().mode() & MODE_PERM | MODE_DIR, 0)
        } else {
            (FileType::File, meta.permissions().mode() & MODE_PERM, meta.len())
        };
        let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        FileAttr {
            name,
            size,
            kind,
            mode,
            mtime,
            atime: meta.accessed().unwrap_or(mtime),
        }
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| Self::path_str(path))
    }

    fn open_inner(&self, path: &Path, flags: OpenFlags, mode: u32) -> io::Result<OsFile> {
        // std refuses create/truncate without write access, so writes are
        // gated on the handle instead.
        let file = OpenOptions::new()
            .read(flags.readable())
            .write(flags.writable() || flags.create)
            .append(flags.append)
            .truncate(flags.truncate && flags.writable())
            .create(flags.create && !flags.exclusive)
            .create_new(flags.create && flags.exclusive)
            .mode(mode & MODE_PERM)
            .open(path)?;
        Ok(OsFile {
            name: Self::path_str(path),
            file: Some(file),
            flags,
        })
    }
}

impl VfsOps for OsBackend {
    fn name(&self) -> &str {
        "os"
    }

    fn create(&self, path: &Path) -> PathResult<Box<dyn VfsFile>> {
        let file = self
            .open_inner(path, OpenFlags::create_truncate(), CREATE_MODE)
            .map_err(Self::wrap("create", path))?;
        Ok(Box::new(file))
    }

    fn open(&self, path: &Path) -> PathResult<Box<dyn VfsFile>> {
        let file = self
            .open_inner(path, OpenFlags::READ, 0)
            .map_err(Self::wrap("open", path))?;
        Ok(Box::new(file))
    }

    fn open_file(
        &self,
        path: &Path,
        flags: OpenFlags,
        mode: u32,
    ) -> PathResult<Box<dyn VfsFile>> {
        let file = self
            .open_inner(path, flags, mode)
            .map_err(Self::wrap("open", path))?;
        Ok(Box::new(file))
    }

    fn mkdir(&self, path: &Path, mode: u32) -> PathResult<()> {
        fs::DirBuilder::new()
            .mode(mode & MODE_PERM)
            .create(path)
            .map_err(Self::wrap("mkdir", path))
    }

    fn mkdir_all(&self, path: &Path, mode: u32) -> PathResult<()> {
        fs::DirBuilder::new()
            .mode(mode & MODE_PERM)
            .recursive(true)
            .create(path)
            .map_err(Self::wrap("mkdir", path))
    }

    fn remove(&self, path: &Path) -> PathResult<()> {
        let meta = fs::symlink_metadata(path).map_err(Self::wrap("remove", path))?;
        if meta.is_dir() {
            fs::remove_dir(path).map_err(Self::wrap("remove", path))
        } else {
            fs::remove_file(path).map_err(Self::wrap("remove", path))
        }
    }

    fn remove_all(&self, path: &Path) -> PathResult<()> {
        let result = match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
            Ok(_) => fs::remove_file(path),
            Err(e) => Err(e),
        };
        match result {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other.map_err(Self::wrap("remove_all", path)),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> PathResult<()> {
        fs::rename(from, to).map_err(Self::wrap("rename", from))
    }

    fn read_dir(&self, path: &Path) -> PathResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let listing = fs::read_dir(path).map_err(Self::wrap("readdir", path))?;

        for entry in listing {
            let entry = entry.map_err(Self::wrap("readdir", path))?;
            let file_type = entry.file_type().map_err(Self::wrap("readdir", path))?;
            let kind = if file_type.is_dir() {
                FileType::Directory
            } else {
                FileType::File
            };
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn stat(&self, path: &Path) -> PathResult<FileAttr> {
        let meta = fs::metadata(path).map_err(Self::wrap("stat", path))?;
        Ok(Self::metadata_to_attr(Self::file_name(path), &meta))
    }

    fn chmod(&self, path: &Path, mode: u32) -> PathResult<()> {
        let permissions = fs::Permissions::from_mode(mode & MODE_PERM);
        fs::set_permissions(path, permissions).map_err(Self::wrap("chmod", path))
    }

    fn chtimes(&self, path: &Path, atime: SystemTime, mtime: SystemTime) -> PathResult<()> {
        let times = FileTimes::new().set_accessed(atime).set_modified(mtime);
        File::open(path)
            .and_then(|file| file.set_times(times))
            .map_err(Self::wrap("chtimes", path))
    }
}

/// A handle on a host file.
#[derive(Debug)]
pub struct OsFile {
    name: String,
    /// `None` once closed.
    file: Option<File>,
    flags: OpenFlags,
}

impl OsFile {
    fn file(&mut self) -> VfsResult<&mut File> {
        self.file.as_mut().ok_or(VfsError::Closed)
    }

    fn writable_file(&mut self) -> VfsResult<&mut File> {
        if !self.flags.writable() {
            return Err(VfsError::ReadOnly);
        }
        self.file()
    }
}

impl Read for OsFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file()?.read(buf)
    }
}

impl Write for OsFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writable_file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl Seek for OsFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.file()?.seek(pos)
    }
}

impl VfsFile for OsFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn stat(&self) -> VfsResult<FileAttr> {
        let file = self.file.as_ref().ok_or(VfsError::Closed)?;
        let meta = file.metadata()?;
        let name = OsBackend::file_name(Path::new(&self.name));
        Ok(OsBackend::metadata_to_attr(name, &meta))
    }

    fn set_len(&mut self, size: u64) -> VfsResult<()> {
        Ok(self.writable_file()?.set_len(size)?)
    }

    fn close(&mut self) -> VfsResult<()> {
        let file = self.file.take().ok_or(VfsError::Closed)?;
        if self.flags.writable() {
            file.sync_data()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (OsBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        (OsBackend::new(), dir)
    }

    #[test]
    fn test_create_and_read() {
        let (backend, dir) = setup();
        let path = dir.path().join("test.txt");

        let mut f = backend.create(&path).unwrap();
        f.write_all(b"hello world").unwrap();
        f.close().unwrap();

        assert_eq!(backend.read_file(&path).unwrap(), b"hello world");
    }

    #[test]
    fn test_mkdir_and_read_dir() {
        let (backend, dir) = setup();

        backend.mkdir(&dir.path().join("subdir"), 0o755).unwrap();
        backend.create(&dir.path().join("subdir/file.txt")).unwrap();
        backend.create(&dir.path().join("root.txt")).unwrap();

        let entries = backend.read_dir(dir.path()).unwrap();
        assert_eq!(
            entries,
            vec![DirEntry::file("root.txt"), DirEntry::directory("subdir")]
        );
    }

    #[test]
    fn test_stat_projects_dir_flag() {
        let (backend, dir) = setup();
        backend.mkdir(&dir.path().join("d"), 0o755).unwrap();

        let attr = backend.stat(&dir.path().join("d")).unwrap();
        assert!(attr.is_dir());
        assert_eq!(attr.mode & MODE_DIR, MODE_DIR);
        assert_eq!(attr.size, 0);
    }

    #[test]
    fn test_read_only_handle() {
        let (backend, dir) = setup();
        let path = dir.path().join("ro.txt");
        backend.write_file(&path, b"test", 0o644).unwrap();

        let mut f = backend.open_file(&path, OpenFlags::READ, 0).unwrap();
        let err = f.write(b"data").unwrap_err();
        assert!(matches!(VfsError::from(err), VfsError::ReadOnly));
        f.close().unwrap();

        assert_eq!(backend.read_file(&path).unwrap(), b"test");
    }

    #[test]
    fn test_close_twice() {
        let (backend, dir) = setup();
        let mut f = backend.create(&dir.path().join("f")).unwrap();
        f.close().unwrap();
        assert!(matches!(f.close(), Err(VfsError::Closed)));
    }

    #[test]
    fn test_remove_all_missing_is_ok() {
        let (backend, dir) = setup();
        backend.remove_all(&dir.path().join("nope")).unwrap();
    }

    #[test]
    fn test_not_found_is_single_level() {
        let (backend, dir) = setup();
        let err = backend.stat(&dir.path().join("nope")).unwrap_err();
        assert_eq!(err.op, "stat");
        assert!(err.is_not_found());
        assert!(matches!(err.source, VfsError::Io(_)));
    }

    #[test]
    fn test_chmod_and_chtimes() {
        let (backend, dir) = setup();
        let path = dir.path().join("f");
        backend.create(&path).unwrap();

        backend.chmod(&path, 0o600).unwrap();
        assert_eq!(backend.stat(&path).unwrap().mode, 0o600);

        let t = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        backend.chtimes(&path, t, t).unwrap();
        assert_eq!(backend.stat(&path).unwrap().mtime, t);
    }
}

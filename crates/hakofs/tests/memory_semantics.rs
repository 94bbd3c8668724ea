//! Behavioral tests for the in-memory backend through the public API.
//!
//! Covers error shape, modes, handle independence, close-time mtime,
//! prefix-bounded tree operations and concurrent use from several threads.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::SystemTime;

use hakofs::{MODE_DIR, MemoryBackend, OpenFlags, PathError, VfsError, VfsOps};

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Asserts the error names `op` and does not nest another path error.
fn check_path_error(err: PathError, op: &str) {
    assert_eq!(err.op, op, "{err}");
    if let VfsError::Io(inner) = &err.source {
        let nested = inner.get_ref().is_some_and(|e| e.is::<PathError>());
        assert!(!nested, "{op}: {err} contains another path error");
    }
}

/// /{root}
///   root.txt
///   sub/
///     sub.txt
fn create_tree(fs: &dyn VfsOps, root: &str) {
    fs.mkdir_all(&Path::new(root).join("sub"), 0o777).unwrap();
    fs.create(&Path::new(root).join("root.txt")).unwrap();
    fs.create(&Path::new(root).join("sub/sub.txt")).unwrap();
}

fn verify_tree(fs: &dyn VfsOps, root: &str, exists: bool) {
    for rel in ["sub", "sub/sub.txt", "", "root.txt"] {
        let path = Path::new(root).join(rel);
        match fs.stat(&path) {
            Ok(_) => assert!(exists, "{} still exists", path.display()),
            Err(e) => {
                assert!(e.is_not_found(), "{e}");
                assert!(!exists, "{} was not created", path.display());
            }
        }
    }
}

// ============================================================================
// Paths and errors
// ============================================================================

#[test]
fn test_dot_forms_are_root() {
    let fs = MemoryBackend::new();
    for p in ["", ".", "./", "/", "..", "/.."] {
        let attr = fs.stat(Path::new(p)).unwrap();
        assert!(attr.is_dir(), "{p:?}");
        assert_eq!(attr.name, "/");
    }
}

#[test]
fn test_path_errors_are_single_level() {
    let fs = MemoryBackend::new();
    let path = Path::new("./some/path");
    let path2 = Path::new("./different/path");

    check_path_error(fs.chmod(path, 0o755).unwrap_err(), "chmod");
    check_path_error(
        fs.chtimes(path, SystemTime::now(), SystemTime::now()).unwrap_err(),
        "chtimes",
    );

    fs.mkdir(Path::new("./different"), 0o755).unwrap();
    fs.mkdir(path2, 0o755).unwrap();
    check_path_error(fs.mkdir(path2, 0o755).unwrap_err(), "mkdir");
    fs.mkdir_all(path2, 0o755).unwrap();

    check_path_error(fs.open(path).unwrap_err(), "open");
    check_path_error(
        fs.open_file(path, OpenFlags::READ_WRITE, 0o755).unwrap_err(),
        "open",
    );
    check_path_error(fs.remove(path).unwrap_err(), "remove");
    fs.remove_all(path).unwrap();
    check_path_error(fs.rename(path, path2).unwrap_err(), "rename");
    check_path_error(fs.stat(path).unwrap_err(), "stat");
}

#[test]
fn test_path_error_survives_io_round_trip() {
    let fs = MemoryBackend::new();
    let err = fs.stat(Path::new("/nope")).unwrap_err();
    let as_io: io::Error = err.into();
    assert_eq!(as_io.kind(), io::ErrorKind::NotFound);

    let rewrapped = PathError::new("open", "/other", as_io);
    check_path_error(rewrapped, "open");
}

// ============================================================================
// Modes
// ============================================================================

#[test]
fn test_perm_set() {
    let fs = MemoryBackend::new();
    let mode = 0o765;

    let f = fs
        .open_file(Path::new("/myFileTest"), OpenFlags::CREATE, mode)
        .unwrap();
    drop(f);
    let attr = fs.stat(Path::new("/myFileTest")).unwrap();
    assert_eq!(attr.mode, mode);
    assert!(attr.is_file());

    fs.mkdir(Path::new("/myDirTest"), mode).unwrap();
    assert_eq!(fs.stat(Path::new("/myDirTest")).unwrap().mode, mode | MODE_DIR);

    fs.mkdir_all(Path::new("/myDirTestAll"), mode).unwrap();
    assert_eq!(
        fs.stat(Path::new("/myDirTestAll")).unwrap().mode,
        mode | MODE_DIR
    );

    // callers that already include the directory flag get it back unchanged
    fs.mkdir(Path::new("/myDirFlagged"), mode | MODE_DIR).unwrap();
    assert_eq!(
        fs.stat(Path::new("/myDirFlagged")).unwrap().mode,
        mode | MODE_DIR
    );

    fs.mkdir_all(Path::new("/myDirFlaggedAll/inner"), mode | MODE_DIR)
        .unwrap();
    for dir in ["/myDirFlaggedAll", "/myDirFlaggedAll/inner"] {
        assert_eq!(fs.stat(Path::new(dir)).unwrap().mode, mode | MODE_DIR, "{dir}");
    }
}

#[test]
fn test_dir_mode() {
    let fs = MemoryBackend::new();
    fs.mkdir(Path::new("/testDir1"), 0o644).unwrap();
    fs.mkdir_all(Path::new("/sub/testDir2"), 0o644).unwrap();

    for dir in ["/testDir1", "/sub", "/sub/testDir2"] {
        let attr = fs.stat(Path::new(dir)).unwrap();
        assert!(attr.is_dir(), "{dir}");
        assert_eq!(attr.mode & MODE_DIR, MODE_DIR, "{dir}");
        assert_eq!(attr.perm(), 0o644, "{dir}");
    }
}

// ============================================================================
// Handles
// ============================================================================

#[test]
fn test_multiple_open_files() {
    let fs = MemoryBackend::new();
    let path = Path::new("/afero-demo2.txt");

    let mut fh1 = fs.create(path).unwrap();
    fh1.write_all(b"test").unwrap();
    fh1.seek(SeekFrom::Start(0)).unwrap();

    let mut fh2 = fs.open_file(path, OpenFlags::READ_WRITE, 0o777).unwrap();
    fh2.seek(SeekFrom::End(0)).unwrap();
    fh2.write_all(b"data").unwrap();
    fh2.close().unwrap();

    fh1.write_all(b"data").unwrap();
    fh1.close().unwrap();

    assert_eq!(fs.read_file(path).unwrap(), b"datadata");
}

#[test]
fn test_read_only_handles() {
    let fs = MemoryBackend::new();
    let path = Path::new("/testfile.txt");
    fs.write_file(path, b"test", 0o644).unwrap();

    let mut f = fs.open(path).unwrap();
    assert!(f.write(b"data").is_err());
    f.close().unwrap();

    let mut f = fs.open_file(path, OpenFlags::READ, 0o644).unwrap();
    let err = f.write(b"data").unwrap_err();
    assert!(matches!(VfsError::from(err), VfsError::ReadOnly));
    f.close().unwrap();

    assert_eq!(fs.read_file(path).unwrap(), b"test");
}

#[test]
fn test_write_close_time() {
    let fs = MemoryBackend::new();
    let path = Path::new("/afero-demo.txt");

    fs.create(path).unwrap().close().unwrap();

    let mut f = fs.create(path).unwrap();
    let before = f.stat().unwrap().mtime;
    f.write_all(b"test").unwrap();
    f.close().unwrap();

    let after = fs.stat(path).unwrap().mtime;
    assert!(after > before, "mtime was not advanced on close");
}

#[test]
fn test_unexpected_eof() {
    let fs = MemoryBackend::new();
    fs.write_file(Path::new("file.txt"), b"abc", 0o777).unwrap();

    let mut f = fs.open(Path::new("file.txt")).unwrap();
    f.seek(SeekFrom::Start(512)).unwrap();

    let mut buf = [0u8; 256];
    let err = f.read_exact(&mut buf).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
}

#[test]
fn test_write_far_past_end_is_an_error() {
    let fs = MemoryBackend::new();
    let mut f = fs.create(Path::new("/big")).unwrap();
    f.seek(SeekFrom::Start(1u64 << 50)).unwrap();
    assert!(f.write(b"x").is_err());
    assert!(f.set_len(1u64 << 50).is_err());
    f.close().unwrap();
    assert_eq!(fs.stat(Path::new("/big")).unwrap().size, 0);
}

#[test]
fn test_read_at_end_is_zero() {
    let fs = MemoryBackend::new();
    fs.write_file(Path::new("file.txt"), b"abc", 0o644).unwrap();

    let mut f = fs.open(Path::new("file.txt")).unwrap();
    f.seek(SeekFrom::End(0)).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(f.read(&mut buf).unwrap(), 0);
}

// ============================================================================
// Tree operations
// ============================================================================

#[test]
fn test_rename_dir() {
    let fs = MemoryBackend::new();
    fs.mkdir_all(Path::new("/srcy"), 0o777).unwrap();

    create_tree(&fs, "/src");
    verify_tree(&fs, "/src", true);

    fs.rename(Path::new("/src"), Path::new("/dst")).unwrap();
    verify_tree(&fs, "/dst", true);
    verify_tree(&fs, "/src", false);

    create_tree(&fs, "/src");
    verify_tree(&fs, "/src", true);

    assert!(fs.stat(Path::new("/srcy")).is_ok());
}

#[test]
fn test_rename_dir_listing_follows() {
    let fs = MemoryBackend::new();
    create_tree(&fs, "/src");
    fs.mkdir(Path::new("/dst"), 0o755).unwrap();
    fs.rename(Path::new("/src"), Path::new("/dst/moved")).unwrap();

    let names: Vec<_> = fs
        .read_dir(Path::new("/dst/moved"))
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, ["root.txt", "sub"]);
    assert!(fs.read_dir(Path::new("/")).unwrap().iter().all(|e| e.name != "src"));
}

#[test]
fn test_rename_into_itself() {
    let fs = MemoryBackend::new();
    create_tree(&fs, "/src");
    let err = fs
        .rename(Path::new("/src"), Path::new("/src/sub/inner"))
        .unwrap_err();
    assert!(matches!(err.source, VfsError::InvalidInput));
    verify_tree(&fs, "/src", true);
}

#[test]
fn test_walk_tree() {
    let fs = MemoryBackend::new();
    fs.mkdir_all(Path::new("/srcy"), 0o777).unwrap();
    create_tree(&fs, "/src");

    let mut seen = Vec::new();
    fs.walk(Path::new("/src"), &mut |path, attr| {
        seen.push((path.display().to_string(), attr.is_dir()));
        Ok(())
    })
    .unwrap();

    assert_eq!(
        seen,
        [
            ("/src".to_string(), true),
            ("/src/root.txt".to_string(), false),
            ("/src/sub".to_string(), true),
            ("/src/sub/sub.txt".to_string(), false),
        ]
    );
}

#[test]
fn test_remove_all() {
    let fs = MemoryBackend::new();
    fs.mkdir_all(Path::new("/rooty"), 0o777).unwrap();

    create_tree(&fs, "/root");
    verify_tree(&fs, "/root", true);

    fs.remove_all(Path::new("/root")).unwrap();
    verify_tree(&fs, "/root", false);

    assert!(fs.stat(Path::new("/rooty")).is_ok());
}

#[test]
fn test_remove_empty_dir() {
    let fs = MemoryBackend::new();
    fs.mkdir_all(Path::new("/root"), 0o777).unwrap();
    fs.remove(Path::new("/root")).unwrap();
    assert!(fs.stat(Path::new("/root")).unwrap_err().is_not_found());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_racing_delete_and_close() {
    init_tracing();
    let fs = Arc::new(MemoryBackend::new());
    let mut f = fs.create(Path::new("testfile")).unwrap();
    let start = Arc::new(Barrier::new(2));

    let closer = {
        let start = Arc::clone(&start);
        thread::spawn(move || {
            start.wait();
            f.close()
        })
    };
    let remover = {
        let fs = Arc::clone(&fs);
        let start = Arc::clone(&start);
        thread::spawn(move || {
            start.wait();
            fs.remove(Path::new("testfile"))
        })
    };

    closer.join().unwrap().unwrap();
    remover.join().unwrap().unwrap();
    assert!(!fs.exists(Path::new("testfile")));
}

#[test]
fn test_create_remove_against_read_dir() {
    init_tracing();
    const N: usize = 1000;
    let fs = Arc::new(MemoryBackend::new());
    fs.mkdir_all(Path::new("test_dir"), 0o777).unwrap();

    let writer = {
        let fs = Arc::clone(&fs);
        thread::spawn(move || {
            for i in 0..N {
                let name = format!("test_dir/{i}.txt");
                fs.write_file(Path::new(&name), b"", 0o777).unwrap();
                fs.remove(Path::new(&name)).unwrap();
            }
        })
    };

    while !writer.is_finished() {
        let entries = fs.read_dir(Path::new("test_dir")).unwrap();
        assert!(entries.len() <= 1);
    }
    writer.join().unwrap();
    assert!(fs.read_dir(Path::new("test_dir")).unwrap().is_empty());
}

#[test]
fn test_concurrent_writers_distinct_files() {
    let fs = Arc::new(MemoryBackend::new());
    fs.mkdir(Path::new("/w"), 0o755).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let fs = Arc::clone(&fs);
            thread::spawn(move || {
                let path = format!("/w/{t}");
                let mut f = fs.create(Path::new(&path)).unwrap();
                for _ in 0..100 {
                    f.write_all(&[t as u8]).unwrap();
                }
                f.close().unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for t in 0..8u8 {
        let data = fs.read_file(Path::new(&format!("/w/{t}"))).unwrap();
        assert_eq!(data, vec![t; 100]);
    }
    assert_eq!(fs.read_dir(Path::new("/w")).unwrap().len(), 8);
}

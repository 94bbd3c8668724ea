//! Path keys.
//!
//! Every backend addresses nodes by a canonical key: absolute, rooted at
//! `/`, with `.`, `..`, repeated and trailing separators resolved. Any
//! UTF-8 input maps to some valid key; `..` at the root stays at the root.

use std::path::Path;

use crate::error::{VfsError, VfsResult};

/// The path separator used in keys.
pub const SEPARATOR: char = '/';

/// The root key.
pub const ROOT: &str = "/";

/// Key for a caller-supplied path.
///
/// Paths that are not valid UTF-8 fail with [`VfsError::InvalidInput`];
/// a lossy conversion would let two distinct names share one key.
pub fn key(path: &Path) -> VfsResult<String> {
    path.to_str().map(normalize).ok_or(VfsError::InvalidInput)
}

/// Canonicalize `raw` into a key.
pub fn normalize(raw: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }

    let mut key = String::with_capacity(raw.len() + 1);
    for segment in &segments {
        key.push(SEPARATOR);
        key.push_str(segment);
    }
    if key.is_empty() {
        key.push(SEPARATOR);
    }
    key
}

/// Parent key of `key`, or `None` for the root.
pub fn parent(key: &str) -> Option<&str> {
    if key == ROOT {
        return None;
    }
    match key.rfind(SEPARATOR) {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&key[..idx]),
        None => None,
    }
}

/// Final segment of `key`; the root is named `/`.
pub fn file_name(key: &str) -> &str {
    if key == ROOT {
        return ROOT;
    }
    key.rsplit(SEPARATOR).next().unwrap_or(key)
}

/// Join a child name onto a directory key.
pub fn join(dir: &str, name: &str) -> String {
    if dir == ROOT {
        format!("{SEPARATOR}{name}")
    } else {
        format!("{dir}{SEPARATOR}{name}")
    }
}

/// Segment-bounded prefix test: true if `key` is `prefix` itself or lies
/// beneath it. `/src` contains `/src/a` but not `/srcy`.
pub fn is_within(key: &str, prefix: &str) -> bool {
    if prefix == ROOT {
        return key.starts_with(SEPARATOR);
    }
    match key.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// Move `key` from under `from` to under `to`.
///
/// `key` must satisfy [`is_within`]`(key, from)`; otherwise it is returned
/// unchanged.
pub fn rebase(key: &str, from: &str, to: &str) -> String {
    if !is_within(key, from) {
        return key.to_string();
    }
    let rest = if from == ROOT { key } else { &key[from.len()..] };
    if rest.is_empty() || rest == ROOT {
        return to.to_string();
    }
    if to == ROOT {
        rest.to_string()
    } else {
        format!("{to}{rest}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dot_forms_resolve_to_root() {
        for input in [".", "./", "..", "../", "./..", "./../", "", "/", "//"] {
            assert_eq!(normalize(input), ROOT, "input {input:?}");
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("a/b/c"), "/a/b/c");
        assert_eq!(normalize("/a/b/c/"), "/a/b/c");
        assert_eq!(normalize("./some/path"), "/some/path");
        assert_eq!(normalize("a//b/./c/../d"), "/a/b/d");
        assert_eq!(normalize("../../etc/passwd"), "/etc/passwd");
        assert_eq!(normalize("/A/b"), "/A/b");
    }

    #[cfg(unix)]
    #[test]
    fn test_key_rejects_non_utf8() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let a = Path::new(OsStr::from_bytes(b"/bad\xff"));
        let b = Path::new(OsStr::from_bytes(b"/bad\xfe"));
        assert!(matches!(key(a), Err(VfsError::InvalidInput)));
        assert!(matches!(key(b), Err(VfsError::InvalidInput)));
        assert_eq!(key(Path::new("./ok/../fine")).unwrap(), "/fine");
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent("/"), None);
        assert_eq!(parent("/a"), Some("/"));
        assert_eq!(parent("/a/b"), Some("/a"));
        assert_eq!(file_name("/a/b"), "b");
        assert_eq!(file_name("/a"), "a");
        assert_eq!(file_name("/"), "/");
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }

    #[test]
    fn test_is_within_respects_segments() {
        assert!(is_within("/src", "/src"));
        assert!(is_within("/src/sub/sub.txt", "/src"));
        assert!(!is_within("/srcy", "/src"));
        assert!(!is_within("/srcy/file", "/src"));
        assert!(!is_within("/sr", "/src"));
        assert!(is_within("/anything", "/"));
    }

    #[test]
    fn test_rebase() {
        assert_eq!(rebase("/src", "/src", "/dst"), "/dst");
        assert_eq!(rebase("/src/sub/a", "/src", "/dst"), "/dst/sub/a");
        assert_eq!(rebase("/srcy", "/src", "/dst"), "/srcy");
        assert_eq!(rebase("/a/b", "/a", "/"), "/b");
    }
}

//! Depth-first traversal over any [`VfsOps`].
//!
//! Built on `stat` and `read_dir` alone, so every backend walks the same
//! way. Directories are visited before their contents, and siblings come
//! in the lexical order `read_dir` returns.

use std::path::Path;

use crate::error::PathResult;
use crate::ops::VfsOps;
use crate::types::FileAttr;

/// Visitor callback: the path as reached from the walk root, and its
/// metadata. An error stops the walk and is returned from it.
pub type Visit<'a> = dyn FnMut(&Path, &FileAttr) -> PathResult<()> + 'a;

/// Walk `root` and everything beneath it.
///
/// A missing `root` fails with its `stat` error. Entries removed between
/// listing their directory and reaching them are skipped.
pub fn walk<F>(fs: &F, root: &Path, visit: &mut Visit<'_>) -> PathResult<()>
where
    F: VfsOps + ?Sized,
{
    let attr = fs.stat(root)?;
    walk_from(fs, root, &attr, visit)
}

fn walk_from<F>(fs: &F, path: &Path, attr: &FileAttr, visit: &mut Visit<'_>) -> PathResult<()>
where
    F: VfsOps + ?Sized,
{
    visit(path, attr)?;
    if !attr.is_dir() {
        return Ok(());
    }

    for entry in fs.read_dir(path)? {
        let child = path.join(&entry.name);
        let child_attr = match fs.stat(&child) {
            Ok(attr) => attr,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        };
        walk_from(fs, &child, &child_attr, visit)?;
    }
    Ok(())
}

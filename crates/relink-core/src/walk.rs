use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::table::IgnoreList;

/// Callbacks driven by [`walk_tree`].
///
/// Errors returned from `visit_dir` or `visit_file` stop the walk. Filesystem
/// trouble that concerns one entry is handed to `walk_error` instead and the
/// walk moves on to the next sibling.
pub(crate) trait TreeVisitor {
    fn visit_dir(&mut self, dir: &Path) -> Result<()>;
    fn visit_file(&mut self, file: &Path) -> Result<()>;
    fn walk_error(&mut self, path: &Path, message: String);
}

/// Depth-first walk rooted at `root`. A directory is visited before anything
/// inside it, and its files before its subdirectories.
pub(crate) fn walk_tree<V: TreeVisitor>(root: &Path, ignore: &IgnoreList, visitor: &mut V) -> Result<()> {
    walk_directory(root, ignore, visitor)
}

fn walk_directory<V: TreeVisitor>(dir: &Path, ignore: &IgnoreList, visitor: &mut V) -> Result<()> {
    debug!("Scanning directory: {:?}", dir);
    visitor.visit_dir(dir)?;

    let reader = match fs::read_dir(dir) {
        Ok(reader) => reader,
        Err(e) => {
            visitor.walk_error(dir, format!("cannot list directory: {}", e));
            return Ok(());
        }
    };

    let mut entries = Vec::new();
    for entry in reader {
        match entry {
            Ok(entry) => entries.push(entry),
            Err(e) => visitor.walk_error(dir, format!("cannot read directory entry: {}", e)),
        }
    }
    entries.sort_by_key(|entry| entry.file_name());

    let mut subdirs: Vec<PathBuf> = Vec::new();
    for entry in &entries {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                visitor.walk_error(&path, format!("cannot read file type: {}", e));
                continue;
            }
        };

        if file_type.is_dir() {
            let name = entry.file_name();
            if ignore.is_ignored(&name.to_string_lossy()) {
                debug!("Skipping ignored directory: {:?}", path);
                continue;
            }
            subdirs.push(path);
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            visitor.visit_file(&path)?;
        } else {
            debug!("Skipping non-regular entry: {:?}", path);
        }
    }

    for subdir in &subdirs {
        walk_directory(subdir, ignore, visitor)?;
    }

    Ok(())
}

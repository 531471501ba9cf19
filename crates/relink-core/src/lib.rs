//! Rename designated documents and rewrite the links that point at them.
//!
//! A run has two passes over the same tree. The renamer moves
//! `<dir>/<old>.<ext>` to `<dir>/<new>.<ext>` for every [`MoveEntry`]; once it
//! has finished, the link rewriter replaces `dir/old` path segments with
//! `dir/new` in every recognized text file.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

mod renamer;
pub mod report;
pub mod rewriter;
pub mod table;
mod walk;

pub use report::{ItemError, Phase, RenameRecord, RunReport};
pub use rewriter::{compile_patterns, rewrite_all, rewrite_segment, rewrite_with_patterns, LinkPattern, RewriteMatch};
pub use table::{DirectoryMatch, ExtensionSet, IgnoreList, MoveEntry, MoveTable, RelinkOptions};

use renamer::Renamer;
use rewriter::LinkRewriter;

#[derive(thiserror::Error, Debug)]
pub enum RelinkError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid move entry: {message}")]
    InvalidEntry { message: String },
    #[error("Duplicate move entry for '{segment}'")]
    DuplicateEntry { segment: String },
    #[error("Invalid root: {message}")]
    Root { message: String },
}

/// Which passes a run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Passes {
    Both,
    RenameOnly,
    RewriteOnly,
}

impl Passes {
    fn renames(self) -> bool {
        matches!(self, Passes::Both | Passes::RenameOnly)
    }

    fn rewrites(self) -> bool {
        matches!(self, Passes::Both | Passes::RewriteOnly)
    }
}

fn accept_content(_: &Path, _: &str, _: &str, _: &str) -> Result<bool> {
    Ok(true)
}

fn accept_path(_: &Path, _: &Path, _: &str) -> Result<bool> {
    Ok(true)
}

/// Renames every designated file under `root`, then rewrites the links.
pub fn relink(root: &Path, table: &MoveTable, options: &RelinkOptions) -> Result<RunReport> {
    relink_interactive(root, table, options, Passes::Both, accept_content, accept_path)
}

pub fn rename_only(root: &Path, table: &MoveTable, options: &RelinkOptions) -> Result<RunReport> {
    relink_interactive(root, table, options, Passes::RenameOnly, accept_content, accept_path)
}

pub fn rewrite_only(root: &Path, table: &MoveTable, options: &RelinkOptions) -> Result<RunReport> {
    relink_interactive(root, table, options, Passes::RewriteOnly, accept_content, accept_path)
}

/// Like [`relink`], but every change is offered to a callback first.
///
/// `content_callback` receives the file, its current text, the rewritten text
/// and a short description. `path_callback` receives the old path, the new
/// path and the kind of entry. Returning `Ok(false)` skips that change;
/// returning an error aborts the run.
pub fn relink_interactive<F, G>(
    root: &Path,
    table: &MoveTable,
    options: &RelinkOptions,
    passes: Passes,
    content_callback: F,
    path_callback: G,
) -> Result<RunReport>
where
    F: Fn(&Path, &str, &str, &str) -> Result<bool>,
    G: Fn(&Path, &Path, &str) -> Result<bool>,
{
    validate_root(root)?;
    table.check_directory_match(options.directory_match)?;

    info!("Starting relink in: {:?}", root);
    for entry in table.iter() {
        info!("Move entry: {}", entry);
    }

    let mut report = RunReport::default();

    if passes.renames() {
        let mut renamer = Renamer::new(table, options, &path_callback, &mut report);
        walk::walk_tree(root, &options.ignore, &mut renamer)?;
        info!(
            "Rename pass complete: {} renamed, {} already migrated",
            report.renamed, report.already_migrated
        );
    }

    if passes.rewrites() {
        let mut rewriter = LinkRewriter::new(
            root,
            table,
            options,
            !passes.renames(),
            &content_callback,
            &mut report,
        )?;
        walk::walk_tree(root, &options.ignore, &mut rewriter)?;
        info!(
            "Link pass complete: {} links in {} of {} files",
            report.links_rewritten, report.files_rewritten, report.files_scanned
        );
    }

    Ok(report)
}

fn validate_root(root: &Path) -> Result<(), RelinkError> {
    let metadata = std::fs::metadata(root).map_err(|source| RelinkError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    if !metadata.is_dir() {
        return Err(RelinkError::Root {
            message: format!("{:?} is not a directory", root),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_root_is_error() {
        let temp = tempfile::tempdir().unwrap();
        let missing = temp.path().join("nope");

        let result = relink(&missing, &MoveTable::builtin(), &RelinkOptions::default());

        assert!(result.is_err());
    }

    #[test]
    fn test_file_root_is_error() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("index.md");
        fs::write(&file, "x").unwrap();

        let err = relink(&file, &MoveTable::builtin(), &RelinkOptions::default()).unwrap_err();

        assert!(matches!(err.downcast_ref::<RelinkError>(), Some(RelinkError::Root { .. })));
    }

    #[test]
    fn test_case_folded_entries_need_exact_matching() {
        let temp = tempfile::tempdir().unwrap();
        let table = MoveTable::new(vec![
            MoveEntry::new("atlas", "atlas", "x").unwrap(),
            MoveEntry::new("Atlas", "atlas", "y").unwrap(),
        ])
        .unwrap();

        let folded = relink(temp.path(), &table, &RelinkOptions::default()).unwrap_err();
        assert!(matches!(
            folded.downcast_ref::<RelinkError>(),
            Some(RelinkError::DuplicateEntry { .. })
        ));

        let exact = RelinkOptions {
            directory_match: DirectoryMatch::Exact,
            ..Default::default()
        };
        assert!(relink(temp.path(), &table, &exact).is_ok());
    }

    #[test]
    fn test_passes() {
        assert!(Passes::Both.renames() && Passes::Both.rewrites());
        assert!(Passes::RenameOnly.renames() && !Passes::RenameOnly.rewrites());
        assert!(!Passes::RewriteOnly.renames() && Passes::RewriteOnly.rewrites());
    }
}

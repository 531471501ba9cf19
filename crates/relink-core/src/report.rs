use std::fmt;
use std::path::{Path, PathBuf};

/// Which pass of the run produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Walk,
    Rename,
    Rewrite,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Walk => "walk",
            Phase::Rename => "rename",
            Phase::Rewrite => "rewrite",
        };
        f.write_str(name)
    }
}

/// A failure confined to a single file or directory. The run carries on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    pub path: PathBuf,
    pub phase: Phase,
    pub message: String,
}

impl fmt::Display for ItemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.phase, self.path.display(), self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameRecord {
    Renamed { from: PathBuf, to: PathBuf },
    AlreadyMigrated { path: PathBuf },
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub directories_scanned: usize,
    pub files_scanned: usize,
    pub renamed: usize,
    pub already_migrated: usize,
    pub files_rewritten: usize,
    pub links_rewritten: usize,
    pub declined: usize,
    pub renames: Vec<RenameRecord>,
    pub errors: Vec<ItemError>,
}

impl RunReport {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// True when the run neither renamed nor rewrote anything.
    pub fn is_noop(&self) -> bool {
        self.renamed == 0 && self.files_rewritten == 0
    }

    pub(crate) fn record_error(&mut self, path: &Path, phase: Phase, message: impl Into<String>) {
        let error = ItemError {
            path: path.to_path_buf(),
            phase,
            message: message.into(),
        };
        // Both passes walk the same tree and hit the same unreadable directories.
        if self.errors.contains(&error) {
            return;
        }
        tracing::warn!("{}", error);
        self.errors.push(error);
    }
}

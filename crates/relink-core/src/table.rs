//! The Move Table and the other fixed inputs of a run.
//!
//! Everything in here is built once at startup and handed to the renamer and
//! the link rewriter by reference. Nothing is mutated after construction.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::RelinkError;

/// One designated file: `<directory>/<old_stem>.<ext>` becomes
/// `<directory>/<new_stem>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveEntry {
    directory: String,
    old_stem: String,
    new_stem: String,
}

impl MoveEntry {
    pub fn new(directory: &str, old_stem: &str, new_stem: &str) -> Result<Self, RelinkError> {
        for (field, value) in [
            ("directory", directory),
            ("old stem", old_stem),
            ("new stem", new_stem),
        ] {
            if value.is_empty() {
                return Err(RelinkError::InvalidEntry {
                    message: format!("{} must not be empty", field),
                });
            }
            if value.contains(['/', '\\']) {
                return Err(RelinkError::InvalidEntry {
                    message: format!("{} '{}' must be a single path segment", field, value),
                });
            }
        }

        if old_stem == new_stem {
            return Err(RelinkError::InvalidEntry {
                message: format!("old and new stem are both '{}'", old_stem),
            });
        }

        Ok(Self {
            directory: directory.to_string(),
            old_stem: old_stem.to_string(),
            new_stem: new_stem.to_string(),
        })
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn old_stem(&self) -> &str {
        &self.old_stem
    }

    pub fn new_stem(&self) -> &str {
        &self.new_stem
    }

    /// `directory/old_stem`, the text the link rewriter searches for.
    pub fn old_segment(&self) -> String {
        format!("{}/{}", self.directory, self.old_stem)
    }

    /// `directory/new_stem`, the text a matched segment is replaced with.
    pub fn new_segment(&self) -> String {
        format!("{}/{}", self.directory, self.new_stem)
    }

    pub fn old_file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.old_stem, extension)
    }

    pub fn new_file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.new_stem, extension)
    }

    pub(crate) fn matches_directory(&self, name: &str, mode: DirectoryMatch) -> bool {
        match mode {
            DirectoryMatch::CaseInsensitive => name.eq_ignore_ascii_case(&self.directory),
            DirectoryMatch::Exact => name == self.directory,
        }
    }
}

impl fmt::Display for MoveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} -> {}/{}", self.directory, self.old_stem, self.directory, self.new_stem)
    }
}

/// Parses the command line form `directory/old_stem=new_stem`.
impl FromStr for MoveEntry {
    type Err = RelinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RelinkError::InvalidEntry {
            message: format!("expected 'directory/old=new', got '{}'", s),
        };

        let (source, new_stem) = s.split_once('=').ok_or_else(invalid)?;
        let (directory, old_stem) = source.split_once('/').ok_or_else(invalid)?;

        MoveEntry::new(directory.trim(), old_stem.trim(), new_stem.trim())
    }
}

/// Ordered, immutable set of [`MoveEntry`] values for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveTable {
    entries: Vec<MoveEntry>,
}

impl MoveTable {
    pub fn new(entries: Vec<MoveEntry>) -> Result<Self, RelinkError> {
        let table = Self { entries };
        table.check_directory_match(DirectoryMatch::Exact)?;
        Ok(table)
    }

    /// Rejects two entries that would claim the same file once directory
    /// names are compared the way `mode` compares them.
    pub fn check_directory_match(&self, mode: DirectoryMatch) -> Result<(), RelinkError> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            let directory = match mode {
                DirectoryMatch::CaseInsensitive => entry.directory.to_ascii_lowercase(),
                DirectoryMatch::Exact => entry.directory.clone(),
            };
            if !seen.insert((directory, entry.old_stem.as_str())) {
                return Err(RelinkError::DuplicateEntry {
                    segment: entry.old_segment(),
                });
            }
        }
        Ok(())
    }

    /// The table shipped with the tool.
    pub fn builtin() -> Self {
        Self {
            entries: vec![MoveEntry {
                directory: "atlas".to_string(),
                old_stem: "atlas".to_string(),
                new_stem: "ui-graph-and-ontology".to_string(),
            }],
        }
    }

    pub fn entries(&self) -> &[MoveEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &MoveEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// File suffixes eligible for renaming and rewriting, without the leading dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: Vec<String>,
}

impl ExtensionSet {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase();
            if !ext.is_empty() && !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        Self { extensions: normalized }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    pub fn contains(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(extension))
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl Default for ExtensionSet {
    fn default() -> Self {
        Self::new(["md", "mdx"])
    }
}

/// Version control metadata, dependency folders and build or site output.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    "node_modules",
    ".venv",
    "venv",
    "__pycache__",
    "target",
    "dist",
    "build",
    "out",
    "coverage",
    ".cache",
    ".next",
    ".docusaurus",
    ".vitepress",
    "site",
    "_site",
    ".jekyll-cache",
    ".mypy_cache",
    ".pytest_cache",
];

/// Directory base names the walker never descends into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreList {
    names: HashSet<String>,
}

impl IgnoreList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_extra<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn is_ignored(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_DIRS.iter().copied())
    }
}

/// How a directory's base name is compared with [`MoveEntry::directory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryMatch {
    /// ASCII case folding, so `Atlas/` and `ATLAS/` match an `atlas` entry.
    #[default]
    CaseInsensitive,
    Exact,
}

#[derive(Debug, Clone, Default)]
pub struct RelinkOptions {
    pub extensions: ExtensionSet,
    pub ignore: IgnoreList,
    pub directory_match: DirectoryMatch,
    pub dry_run: bool,
}

//! Second pass: rewrite references to renamed files.
//!
//! Matching is literal. A candidate `directory/old_stem` only counts when it
//! is a whole path segment:
//!
//! * the character before it is the start of the text or anything that can
//!   not appear in a path name (`/`, `(`, whitespace, quotes, ...);
//! * the character after it is the end of the text, `/`, `#`, anything else
//!   that can not appear in a path name, a `.` that starts one of the
//!   recognized extensions, or a `.` that ends a sentence (followed by
//!   whitespace or the end of the text).
//!
//! Boundary characters are inspected, never consumed, so they survive the
//! replacement untouched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use regex::Regex;
use tracing::{debug, info};

use crate::report::{Phase, RunReport};
use crate::RelinkError;
use crate::table::{ExtensionSet, MoveEntry, MoveTable, RelinkOptions};
use crate::walk::TreeVisitor;

/// One accepted occurrence of an old path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteMatch {
    pub start: usize,
    pub end: usize,
    /// Character right before the segment, `None` at the start of the text.
    pub leading: Option<char>,
    /// Character right after the segment, `None` at the end of the text.
    pub trailing: Option<char>,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

fn leading_boundary(c: Option<char>) -> bool {
    match c {
        None | Some('/') => true,
        Some(c) => !is_name_char(c),
    }
}

/// `.` followed by whitespace or the end of the text.
fn sentence_end(rest: &str) -> bool {
    let mut chars = rest.chars();
    chars.next() == Some('.') && chars.next().map_or(true, char::is_whitespace)
}

fn trailing_boundary(rest: &str, extensions: &ExtensionSet) -> bool {
    match rest.chars().next() {
        None | Some('/') | Some('#') => true,
        Some('.') => {
            let after_dot = &rest[1..];
            sentence_end(rest)
                || extensions.iter().any(|ext| {
                    after_dot.len() >= ext.len()
                        && after_dot.is_char_boundary(ext.len())
                        && after_dot[..ext.len()].eq_ignore_ascii_case(ext)
                        && ends_name(&after_dot[ext.len()..])
                })
        }
        Some(c) => !is_name_char(c),
    }
}

fn ends_name(rest: &str) -> bool {
    match rest.chars().next() {
        None => true,
        Some('.') => sentence_end(rest),
        Some(c) => !is_name_char(c),
    }
}

/// Compiled search state for one [`MoveEntry`].
#[derive(Debug, Clone)]
pub struct LinkPattern {
    finder: Regex,
    replacement: String,
}

impl LinkPattern {
    pub fn new(entry: &MoveEntry) -> Result<Self, regex::Error> {
        let finder = Regex::new(&regex::escape(&entry.old_segment()))?;
        Ok(Self {
            finder,
            replacement: entry.new_segment(),
        })
    }

    pub fn replacement(&self) -> &str {
        &self.replacement
    }

    pub fn find_matches(&self, text: &str, extensions: &ExtensionSet) -> Vec<RewriteMatch> {
        let mut matches = Vec::new();
        let mut pos = 0;

        while let Some(found) = self.finder.find_at(text, pos) {
            let (start, end) = (found.start(), found.end());
            let leading = text[..start].chars().next_back();

            if leading_boundary(leading) && trailing_boundary(&text[end..], extensions) {
                matches.push(RewriteMatch {
                    start,
                    end,
                    leading,
                    trailing: text[end..].chars().next(),
                });
                pos = end;
            } else {
                // Retry one character further on; a rejected candidate may
                // hide an overlapping one that is properly bounded.
                pos = start + text[start..].chars().next().map_or(1, char::len_utf8);
            }
        }

        matches
    }
}

/// Rewrites every bounded occurrence of `entry`'s old segment in `text`.
/// Returns the new text and the number of replacements.
pub fn rewrite_segment(text: &str, entry: &MoveEntry, extensions: &ExtensionSet) -> Result<(String, usize)> {
    let pattern = LinkPattern::new(entry)?;
    let matches = pattern.find_matches(text, extensions);
    let replacements: Vec<_> = matches.iter().map(|m| (m, pattern.replacement())).collect();
    Ok((splice(text, &replacements), matches.len()))
}

/// Rewrites references for every entry of the table in one pass.
///
/// All entries are matched against the original text, so a replacement made
/// for one entry can never create or hide a match for another.
pub fn rewrite_all(text: &str, table: &MoveTable, extensions: &ExtensionSet) -> Result<(String, usize)> {
    let patterns = compile_patterns(table)?;
    Ok(rewrite_with_patterns(text, &patterns, extensions))
}

/// [`rewrite_all`] with patterns compiled once up front.
pub fn rewrite_with_patterns(text: &str, patterns: &[LinkPattern], extensions: &ExtensionSet) -> (String, usize) {
    let all: Vec<(RewriteMatch, &str)> = patterns
        .iter()
        .flat_map(|pattern| {
            pattern
                .find_matches(text, extensions)
                .into_iter()
                .map(move |m| (m, pattern.replacement()))
        })
        .collect();

    let mut ordered: Vec<&(RewriteMatch, &str)> = all.iter().collect();
    ordered.sort_by(|a, b| a.0.start.cmp(&b.0.start).then(b.0.end.cmp(&a.0.end)));

    let mut accepted: Vec<(&RewriteMatch, &str)> = Vec::with_capacity(ordered.len());
    let mut last_end = 0;
    for (m, replacement) in ordered {
        if m.start < last_end {
            debug!("Dropping overlapping match at byte {}", m.start);
            continue;
        }
        last_end = m.end;
        accepted.push((m, *replacement));
    }

    (splice(text, &accepted), accepted.len())
}

/// Matches must be sorted by position and must not overlap.
fn splice(text: &str, replacements: &[(&RewriteMatch, &str)]) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    for (m, replacement) in replacements {
        output.push_str(&text[cursor..m.start]);
        output.push_str(replacement);
        cursor = m.end;
    }
    output.push_str(&text[cursor..]);
    output
}

pub fn compile_patterns(table: &MoveTable) -> Result<Vec<LinkPattern>> {
    table
        .iter()
        .map(|entry| LinkPattern::new(entry).map_err(anyhow::Error::from))
        .collect()
}

pub(crate) struct LinkRewriter<'a, F> {
    patterns: Vec<LinkPattern>,
    canonical_root: PathBuf,
    count_directories: bool,
    options: &'a RelinkOptions,
    content_callback: &'a F,
    report: &'a mut RunReport,
}

impl<'a, F> LinkRewriter<'a, F>
where
    F: Fn(&Path, &str, &str, &str) -> Result<bool>,
{
    /// `count_directories` is set when the rename pass did not run and so
    /// did not count them already.
    pub(crate) fn new(
        root: &Path,
        table: &MoveTable,
        options: &'a RelinkOptions,
        count_directories: bool,
        content_callback: &'a F,
        report: &'a mut RunReport,
    ) -> Result<Self> {
        let canonical_root = fs::canonicalize(root).map_err(|source| RelinkError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        Ok(Self {
            patterns: compile_patterns(table)?,
            canonical_root,
            count_directories,
            options,
            content_callback,
            report,
        })
    }

    fn is_recognized(&self, file: &Path) -> bool {
        file.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.options.extensions.contains(ext))
    }

    /// A symlinked file is only rewritten when its target lies under the root.
    fn target_outside_root(&mut self, file: &Path) -> bool {
        let is_link = fs::symlink_metadata(file).is_ok_and(|m| m.file_type().is_symlink());
        if !is_link {
            return false;
        }

        match fs::canonicalize(file) {
            Ok(target) if target.starts_with(&self.canonical_root) => false,
            Ok(target) => {
                self.report.record_error(
                    file,
                    Phase::Rewrite,
                    format!("symlink target {:?} outside root, left untouched", target),
                );
                true
            }
            Err(e) => {
                self.report.record_error(file, Phase::Rewrite, format!("cannot resolve symlink: {}", e));
                true
            }
        }
    }
}

impl<F> TreeVisitor for LinkRewriter<'_, F>
where
    F: Fn(&Path, &str, &str, &str) -> Result<bool>,
{
    fn visit_dir(&mut self, _dir: &Path) -> Result<()> {
        if self.count_directories {
            self.report.directories_scanned += 1;
        }
        Ok(())
    }

    fn visit_file(&mut self, file: &Path) -> Result<()> {
        if !self.is_recognized(file) || self.target_outside_root(file) {
            return Ok(());
        }
        debug!("Checking links in: {:?}", file);
        self.report.files_scanned += 1;

        let content = match fs::read_to_string(file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                self.report.record_error(file, Phase::Rewrite, "not valid UTF-8, left untouched");
                return Ok(());
            }
            Err(e) => {
                self.report.record_error(file, Phase::Rewrite, format!("read failed: {}", e));
                return Ok(());
            }
        };

        let (new_content, count) = rewrite_with_patterns(&content, &self.patterns, &self.options.extensions);
        if count == 0 {
            return Ok(());
        }

        if !(self.content_callback)(file, &content, &new_content, "Link update")? {
            debug!("Link update declined: {:?}", file);
            self.report.declined += 1;
            return Ok(());
        }

        if self.options.dry_run {
            info!("Would update {} link(s) in: {:?}", count, file);
        } else if let Err(e) = fs::write(file, &new_content) {
            self.report.record_error(file, Phase::Rewrite, format!("write failed: {}", e));
            return Ok(());
        } else {
            info!("Updated {} link(s) in: {:?}", count, file);
        }

        self.report.files_rewritten += 1;
        self.report.links_rewritten += count;
        Ok(())
    }

    fn walk_error(&mut self, path: &Path, message: String) {
        self.report.record_error(path, Phase::Walk, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atlas() -> MoveEntry {
        MoveEntry::new("atlas", "atlas", "ui-graph-and-ontology").unwrap()
    }

    fn rewrite(text: &str) -> (String, usize) {
        rewrite_segment(text, &atlas(), &ExtensionSet::default()).unwrap()
    }

    #[test]
    fn test_slash_bounded_segment() {
        assert_eq!(
            rewrite("/atlas/atlas/"),
            ("/atlas/ui-graph-and-ontology/".to_string(), 1)
        );
    }

    #[test]
    fn test_fragment_and_parenthesis() {
        assert_eq!(
            rewrite("(atlas/atlas#section)"),
            ("(atlas/ui-graph-and-ontology#section)".to_string(), 1)
        );
        assert_eq!(
            rewrite("See [Atlas](./atlas/atlas#overview)"),
            ("See [Atlas](./atlas/ui-graph-and-ontology#overview)".to_string(), 1)
        );
    }

    #[test]
    fn test_whole_text_is_segment() {
        assert_eq!(rewrite("atlas/atlas"), ("atlas/ui-graph-and-ontology".to_string(), 1));
    }

    #[test]
    fn test_recognized_extension_kept() {
        assert_eq!(
            rewrite("[a](../atlas/atlas.md) and [b](atlas/atlas.MDX#top)"),
            (
                "[a](../atlas/ui-graph-and-ontology.md) and [b](atlas/ui-graph-and-ontology.MDX#top)".to_string(),
                2
            )
        );
    }

    #[test]
    fn test_sentence_final_period() {
        assert_eq!(
            rewrite("Read atlas/atlas.md. Also atlas/atlas."),
            ("Read atlas/ui-graph-and-ontology.md. Also atlas/ui-graph-and-ontology.".to_string(), 2)
        );
        assert_eq!(
            rewrite("See atlas/atlas.\nNext"),
            ("See atlas/ui-graph-and-ontology.\nNext".to_string(), 1)
        );
    }

    #[test]
    fn test_partial_names_untouched() {
        for text in [
            "see also atlasx/atlas-notes",
            "myatlas/atlas/",
            "atlas/atlas-notes",
            "atlas/atlasing",
            "atlas/atlas.v2",
            "atlas/atlas.md.bak",
            "atlas/atlas..",
            "atlas/atlas.mdx2.",
            "x-atlas/atlas",
        ] {
            assert_eq!(rewrite(text), (text.to_string(), 0), "rewrote {:?}", text);
        }
    }

    #[test]
    fn test_three_references_single_pass() {
        let text = "a atlas/atlas b\n[x](/atlas/atlas/)\n<atlas/atlas#top>";
        let (new_text, count) = rewrite(text);

        assert_eq!(count, 3);
        assert_eq!(
            new_text,
            "a atlas/ui-graph-and-ontology b\n[x](/atlas/ui-graph-and-ontology/)\n<atlas/ui-graph-and-ontology#top>"
        );
    }

    #[test]
    fn test_overlapping_candidate_after_rejection() {
        // The first candidate is preceded by 'x'; the one starting inside it is valid.
        let (new_text, count) = rewrite("xatlas/atlas/atlas");

        assert_eq!(count, 1);
        assert_eq!(new_text, "xatlas/atlas/ui-graph-and-ontology");
    }

    #[test]
    fn test_match_records_boundaries() {
        let pattern = LinkPattern::new(&atlas()).unwrap();
        let matches = pattern.find_matches("(atlas/atlas#s) atlas/atlas", &ExtensionSet::default());

        assert_eq!(
            matches,
            vec![
                RewriteMatch { start: 1, end: 12, leading: Some('('), trailing: Some('#') },
                RewriteMatch { start: 16, end: 27, leading: Some(' '), trailing: None },
            ]
        );
    }

    #[test]
    fn test_idempotent() {
        let (once, _) = rewrite("[a](atlas/atlas#x)");
        let (twice, count) = rewrite(&once);

        assert_eq!(count, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_case_sensitive_text_match() {
        assert_eq!(rewrite("Atlas/atlas"), ("Atlas/atlas".to_string(), 0));
    }

    #[test]
    fn test_multiple_entries_independent() {
        let table = MoveTable::new(vec![
            atlas(),
            MoveEntry::new("guides", "index", "getting-started").unwrap(),
        ])
        .unwrap();
        let (text, count) = rewrite_all(
            "[a](atlas/atlas) [b](../guides/index#intro)",
            &table,
            &ExtensionSet::default(),
        )
        .unwrap();

        assert_eq!(count, 2);
        assert_eq!(text, "[a](atlas/ui-graph-and-ontology) [b](../guides/getting-started#intro)");
    }

    #[test]
    fn test_chained_entries_do_not_cascade() {
        let table = MoveTable::new(vec![
            MoveEntry::new("docs", "a", "b").unwrap(),
            MoveEntry::new("docs", "b", "c").unwrap(),
        ])
        .unwrap();
        let patterns = compile_patterns(&table).unwrap();

        let (text, count) = rewrite_with_patterns("docs/a docs/b", &patterns, &ExtensionSet::default());

        assert_eq!(count, 2);
        assert_eq!(text, "docs/b docs/c");
    }

    #[test]
    fn test_no_match_returns_original() {
        let text = "Nothing to see here.\n";
        assert_eq!(rewrite(text), (text.to_string(), 0));
    }

    #[test]
    fn test_non_ascii_neighbours() {
        assert_eq!(
            rewrite("→atlas/atlas→ éatlas/atlas"),
            ("→atlas/ui-graph-and-ontology→ éatlas/atlas".to_string(), 1)
        );
    }
}

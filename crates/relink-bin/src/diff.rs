use anyhow::Result;
use inquire::Confirm;
use similar::{ChangeTag, TextDiff};
use std::fmt::Write;
use std::path::Path;

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

/// Coloured line diff with three lines of context, or `None` when the texts
/// are identical.
pub fn render_diff(old_content: &str, new_content: &str) -> Result<Option<String>> {
    let diff = TextDiff::from_lines(old_content, new_content);
    let mut output = String::new();
    let mut has_changes = false;

    for (i, group) in diff.grouped_ops(3).iter().enumerate() {
        if i > 0 {
            writeln!(output, "{:-^1$}", "", 40)?;
        }
        for op in group {
            for change in diff.iter_changes(op) {
                let (sign, style) = match change.tag() {
                    ChangeTag::Delete => ("- ", RED),
                    ChangeTag::Insert => ("+ ", GREEN),
                    ChangeTag::Equal => ("  ", RESET),
                };
                write!(output, "{}{}{}{}", style, sign, change.value(), RESET)?;
                if change.missing_newline() {
                    writeln!(output)?;
                }
                if change.tag() != ChangeTag::Equal {
                    has_changes = true;
                }
            }
        }
    }

    Ok(has_changes.then_some(output))
}

pub fn show_diff_and_confirm(
    file_path: &Path,
    old_content: &str,
    new_content: &str,
    change_description: &str,
) -> Result<bool> {
    println!("\n📝 {}: {}", change_description, file_path.display());

    let Some(output) = render_diff(old_content, new_content)? else {
        println!("No changes detected.");
        return Ok(false);
    };

    println!("{}", output);

    let apply_change = Confirm::new("Apply this change?")
        .with_default(true)
        .prompt()?;

    Ok(apply_change)
}

pub fn show_path_change_and_confirm(old_path: &Path, new_path: &Path, change_type: &str) -> Result<bool> {
    println!("\n📁 {} rename:", change_type);
    println!("  {}- {}{}", RED, old_path.display(), RESET);
    println!("  {}+ {}{}", GREEN, new_path.display(), RESET);

    let apply_change = Confirm::new("Apply this rename?")
        .with_default(true)
        .prompt()?;

    Ok(apply_change)
}

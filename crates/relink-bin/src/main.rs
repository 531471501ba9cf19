mod cli;
mod diff;

use anyhow::{Context, Result};
use cli::{Cli, Commands, RunArgs};
use relink_core::{
    DirectoryMatch, ExtensionSet, IgnoreList, MoveTable, Passes, RelinkOptions, RenameRecord, RunReport,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    setup_logging(&cli)?;

    info!("Starting relink");

    let (passes, run) = match cli.command {
        None => (Passes::Both, cli.run),
        Some(Commands::Rename { run }) => (Passes::RenameOnly, run),
        Some(Commands::Links { run }) => (Passes::RewriteOnly, run),
        Some(Commands::Table { run }) => return handle_table_command(&run),
    };

    let report = handle_run_command(&run, passes)?;

    if report.has_errors() {
        anyhow::bail!("relink finished with {} error(s)", report.errors.len());
    }

    info!("Relink completed successfully");
    Ok(())
}

fn build_table(run: &RunArgs) -> Result<MoveTable> {
    if run.moves.is_empty() {
        return Ok(MoveTable::builtin());
    }
    Ok(MoveTable::new(run.moves.clone())?)
}

fn build_options(run: &RunArgs) -> Result<RelinkOptions> {
    let extensions = if run.extensions.is_empty() {
        ExtensionSet::default()
    } else {
        ExtensionSet::new(&run.extensions)
    };
    if extensions.is_empty() {
        anyhow::bail!("No usable extensions given");
    }

    Ok(RelinkOptions {
        extensions,
        ignore: IgnoreList::default().with_extra(run.ignore.iter().cloned()),
        directory_match: if run.case_sensitive {
            DirectoryMatch::Exact
        } else {
            DirectoryMatch::CaseInsensitive
        },
        dry_run: run.dry_run,
    })
}

fn resolve_target(target: Option<&Path>) -> Result<PathBuf> {
    match target {
        Some(path) => Ok(path.to_path_buf()),
        None => std::env::current_dir().context("Cannot determine current directory"),
    }
}

fn handle_run_command(run: &RunArgs, passes: Passes) -> Result<RunReport> {
    let target_dir = resolve_target(run.target.as_deref())?;
    let table = build_table(run)?;
    let options = build_options(run)?;

    info!("Target directory: {:?}", target_dir);
    info!("Extensions: {:?}", options.extensions.iter().collect::<Vec<_>>());
    info!("Interactive mode: {}", run.interactive);

    if options.dry_run {
        warn!("Dry run mode - no changes will be made");
    }

    let report = if run.interactive {
        let content_callback = |file_path: &Path, old_content: &str, new_content: &str, description: &str| {
            diff::show_diff_and_confirm(file_path, old_content, new_content, description)
        };

        let path_callback = |old_path: &Path, new_path: &Path, change_type: &str| {
            diff::show_path_change_and_confirm(old_path, new_path, change_type)
        };

        relink_core::relink_interactive(&target_dir, &table, &options, passes, content_callback, path_callback)?
    } else {
        match passes {
            Passes::Both => relink_core::relink(&target_dir, &table, &options)?,
            Passes::RenameOnly => relink_core::rename_only(&target_dir, &table, &options)?,
            Passes::RewriteOnly => relink_core::rewrite_only(&target_dir, &table, &options)?,
        }
    };

    print_summary(&report, &target_dir);

    Ok(report)
}

fn handle_table_command(run: &RunArgs) -> Result<()> {
    let table = build_table(run)?;
    let options = build_options(run)?;

    for entry in table.iter() {
        for ext in options.extensions.iter() {
            println!(
                "{}/{} -> {}/{}",
                entry.directory(),
                entry.old_file_name(ext),
                entry.directory(),
                entry.new_file_name(ext)
            );
        }
    }

    Ok(())
}

fn display_path<'a>(path: &'a Path, root: &Path) -> std::path::Display<'a> {
    path.strip_prefix(root).unwrap_or(path).display()
}

fn print_summary(report: &RunReport, root: &Path) {
    for record in &report.renames {
        match record {
            RenameRecord::Renamed { from, to } => {
                println!("  renamed   {} -> {}", display_path(from, root), display_path(to, root))
            }
            RenameRecord::AlreadyMigrated { path } => {
                println!("  migrated  {} (already in place)", display_path(path, root))
            }
        }
    }
    for error in &report.errors {
        println!("  error     {}", error);
    }

    println!("Relink complete!");
    println!("  Directories scanned: {}", report.directories_scanned);
    println!("  Files renamed: {}", report.renamed);
    println!("  Already migrated: {}", report.already_migrated);
    println!("  Files scanned for links: {}", report.files_scanned);
    println!("  Files rewritten: {}", report.files_rewritten);
    println!("  Links rewritten: {}", report.links_rewritten);
    if report.declined > 0 {
        println!("  Changes declined: {}", report.declined);
    }
    println!("  Errors: {}", report.errors.len());
}

fn setup_logging(cli: &Cli) -> Result<()> {
    let filter = if cli.quiet {
        EnvFilter::new("error")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false)
                .compact(),
        )
        .with(filter)
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn run_args(target: &Path) -> RunArgs {
        RunArgs {
            target: Some(target.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_builtin_table_when_no_moves() {
        let table = build_table(&RunArgs::default()).unwrap();

        assert_eq!(table, MoveTable::builtin());
    }

    #[test]
    fn test_moves_replace_builtin_table() {
        let run = RunArgs {
            moves: vec!["guides/index=getting-started".parse().unwrap()],
            ..Default::default()
        };

        let table = build_table(&run).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.entries()[0].directory(), "guides");
    }

    #[test]
    fn test_options_from_args() {
        let run = RunArgs {
            extensions: vec![".markdown".to_string()],
            ignore: vec!["drafts".to_string()],
            case_sensitive: true,
            dry_run: true,
            ..Default::default()
        };

        let options = build_options(&run).unwrap();

        assert_eq!(options.extensions.iter().collect::<Vec<_>>(), vec!["markdown"]);
        assert!(options.ignore.is_ignored("drafts"));
        assert!(options.ignore.is_ignored(".git"));
        assert_eq!(options.directory_match, DirectoryMatch::Exact);
        assert!(options.dry_run);
    }

    #[test]
    fn test_blank_extensions_rejected() {
        let run = RunArgs {
            extensions: vec![".".to_string()],
            ..Default::default()
        };

        assert!(build_options(&run).is_err());
    }

    #[test]
    fn test_run_command_end_to_end() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("atlas")).unwrap();
        fs::write(root.join("atlas/atlas.md"), "# Atlas").unwrap();
        fs::write(root.join("index.md"), "See [Atlas](./atlas/atlas#overview)").unwrap();

        let report = handle_run_command(&run_args(root), Passes::Both).unwrap();

        assert_eq!(report.renamed, 1);
        assert!(root.join("atlas/ui-graph-and-ontology.md").exists());
        assert_eq!(
            fs::read_to_string(root.join("index.md")).unwrap(),
            "See [Atlas](./atlas/ui-graph-and-ontology#overview)"
        );
    }
}

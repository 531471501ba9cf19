use clap::{Args, Parser, Subcommand};
use relink_core::MoveEntry;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relink")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
#[command(about = "Rename designated documents and rewrite the links that point at them")]
#[command(long_about = "Walks a documentation tree, renames the files listed in the move table to their new names, \
and then rewrites every relative link that still uses the old 'directory/name' path segment.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub run: RunArgs,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Only rename the designated files")]
    Rename {
        #[command(flatten)]
        run: RunArgs,
    },

    #[command(about = "Only rewrite links to the new names")]
    Links {
        #[command(flatten)]
        run: RunArgs,
    },

    #[command(about = "Print the effective move table and exit")]
    Table {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Clone, Debug, Default)]
pub struct RunArgs {
    #[arg(env = "RELINK_TARGET", help = "Root of the documentation tree (defaults to current directory)")]
    pub target: Option<PathBuf>,

    #[arg(
        long = "move",
        value_name = "DIR/OLD=NEW",
        help = "Move table entry; replaces the built-in table when given (repeatable)"
    )]
    pub moves: Vec<MoveEntry>,

    #[arg(long = "ext", value_name = "EXT", help = "Recognized extension; replaces md, mdx when given (repeatable)")]
    pub extensions: Vec<String>,

    #[arg(long = "ignore", value_name = "NAME", help = "Extra directory name to skip (repeatable)")]
    pub ignore: Vec<String>,

    #[arg(long, help = "Match directory names case-sensitively")]
    pub case_sensitive: bool,

    #[arg(long, help = "Perform a dry run without making changes")]
    pub dry_run: bool,

    #[arg(short, long, help = "Interactive mode - prompt for each change")]
    pub interactive: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_arguments() {
        let cli = Cli::try_parse_from(["relink"]).unwrap();

        assert!(cli.command.is_none());
        assert!(cli.run.moves.is_empty());
        assert!(!cli.run.dry_run);
    }

    #[test]
    fn test_default_run_options() {
        let args = vec![
            "relink",
            "docs",
            "--move",
            "atlas/atlas=ui-graph-and-ontology",
            "--move",
            "guides/index=getting-started",
            "--ext",
            "md",
            "--ignore",
            "drafts",
            "--dry-run",
        ];

        let cli = Cli::try_parse_from(args).unwrap();

        assert_eq!(cli.run.target, Some(PathBuf::from("docs")));
        assert_eq!(cli.run.moves.len(), 2);
        assert_eq!(cli.run.moves[1].new_stem(), "getting-started");
        assert_eq!(cli.run.extensions, vec!["md"]);
        assert_eq!(cli.run.ignore, vec!["drafts"]);
        assert!(cli.run.dry_run);
    }

    #[test]
    fn test_invalid_move_rejected() {
        let result = Cli::try_parse_from(["relink", "--move", "atlas=ui"]);

        assert!(result.is_err());
    }

    #[test]
    fn test_rename_command() {
        let cli = Cli::try_parse_from(["relink", "rename", "/docs", "--case-sensitive", "-v"]).unwrap();

        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Rename { run }) => {
                assert_eq!(run.target, Some(PathBuf::from("/docs")));
                assert!(run.case_sensitive);
            }
            _ => panic!("Expected Rename command"),
        }
    }

    #[test]
    fn test_links_command() {
        let cli = Cli::try_parse_from(["relink", "links", "--interactive"]).unwrap();

        match cli.command {
            Some(Commands::Links { run }) => assert!(run.interactive),
            _ => panic!("Expected Links command"),
        }
    }
}

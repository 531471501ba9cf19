use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

/// Workspace chores for relink.
#[derive(Parser, Debug)]
#[command(name = "xtask", version, arg_required_else_help = true)]
struct Xtask {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand, Debug)]
enum Task {
    /// Install the relink binary with `cargo install`
    Install {
        /// Overwrite an installed relink
        #[arg(long)]
        force: bool,
    },
    /// Build relink and run it on the given arguments
    Run {
        /// Build with the release profile
        #[arg(long)]
        release: bool,

        /// Passed through to relink unchanged
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run a test suite
    Test {
        #[arg(value_enum, default_value_t = Suite::All)]
        suite: Suite,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Suite {
    /// Every step below, in order
    All,
    /// Unit and filesystem tests of relink-core
    Core,
    /// CLI parsing and end-to-end tests of relink-bin
    Bin,
    /// Build the binary and exercise a few subcommands
    Integration,
}

impl Suite {
    fn steps(self) -> &'static [Step] {
        match self {
            Suite::All => ALL_STEPS,
            Suite::Core => &[CORE_TESTS],
            Suite::Bin => &[BIN_TESTS],
            Suite::Integration => &[BUILD_BIN, TABLE_SMOKE, LINKS_HELP],
        }
    }
}

fn main() -> Result<()> {
    match Xtask::parse().command {
        Task::Install { force } => install(force),
        Task::Run { release, args } => run(release, &args),
        Task::Test { suite } => run_steps(suite.steps()),
    }
}

fn install(force: bool) -> Result<()> {
    let mut args = vec!["install", "--locked", "--path", "crates/relink-bin"];
    if force {
        args.push("--force");
    }

    cargo(&args).context("installing relink")?;
    println!("✓ relink installed");
    Ok(())
}

fn run(release: bool, passthrough: &[String]) -> Result<()> {
    let mut args = vec!["run", "--bin", "relink"];
    if release {
        args.push("--release");
    }
    args.push("--");
    args.extend(passthrough.iter().map(String::as_str));

    cargo(&args).context("running relink")
}

/// Runs `cargo` with `args` in the current directory, failing on a non-zero exit.
fn cargo(args: &[&str]) -> Result<()> {
    let status = process::Command::new("cargo").args(args).status()?;

    if !status.success() {
        anyhow::bail!("cargo {} exited with {}", args.join(" "), status);
    }
    Ok(())
}

/// A labelled cargo invocation.
struct Step {
    label: &'static str,
    args: &'static [&'static str],
}

const CORE_TESTS: Step = Step {
    label: "relink-core tests",
    args: &["test", "--package", "relink-core"],
};
const BIN_TESTS: Step = Step {
    label: "relink-bin tests",
    args: &["test", "--package", "relink-bin"],
};
const WORKSPACE_TESTS: Step = Step {
    label: "workspace tests",
    args: &["test", "--workspace"],
};
const DOC_TESTS: Step = Step {
    label: "documentation tests",
    args: &["test", "--doc", "--package", "relink-core"],
};
const BUILD_BIN: Step = Step {
    label: "relink binary build",
    args: &["build", "--bin", "relink"],
};
const TABLE_SMOKE: Step = Step {
    label: "move table listing",
    args: &["run", "--bin", "relink", "--", "table"],
};
const LINKS_HELP: Step = Step {
    label: "links subcommand help",
    args: &["run", "--bin", "relink", "--", "links", "--help"],
};
const VERSION: Step = Step {
    label: "CLI version",
    args: &["run", "--bin", "relink", "--", "--version"],
};

const ALL_STEPS: &[Step] = &[
    CORE_TESTS,
    BIN_TESTS,
    WORKSPACE_TESTS,
    DOC_TESTS,
    BUILD_BIN,
    TABLE_SMOKE,
    LINKS_HELP,
    VERSION,
];

fn run_step(step: &Step) -> Result<()> {
    cargo(step.args).with_context(|| format!("{} failed", step.label))
}

fn run_steps(steps: &[Step]) -> Result<()> {
    let mut failed = Vec::new();

    for step in steps {
        println!("🧪 Running {}...", step.label);
        match run_step(step) {
            Ok(()) => println!("✅ {} passed\n", step.label),
            Err(e) => {
                println!("❌ {}\n", e);
                failed.push(step.label);
            }
        }
    }

    if !failed.is_empty() {
        println!("💥 Failed: {}", failed.join(", "));
        anyhow::bail!("Test suite failed");
    }

    println!("🎉 All {} step(s) passed.", steps.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_xtask() {
        Xtask::command().debug_assert();
    }

    #[test]
    fn test_run_passes_hyphen_args_through() {
        let xtask = Xtask::parse_from(["xtask", "run", "--release", "--", "links", "--dry-run"]);

        match xtask.command {
            Task::Run { release, args } => {
                assert!(release);
                assert_eq!(args, vec!["links", "--dry-run"]);
            }
            other => panic!("unexpected task {:?}", other),
        }
    }

    #[test]
    fn test_suite_defaults_to_all() {
        let xtask = Xtask::parse_from(["xtask", "test"]);

        assert!(matches!(xtask.command, Task::Test { suite: Suite::All }));
        assert_eq!(Suite::Integration.steps().len(), 3);
    }
}

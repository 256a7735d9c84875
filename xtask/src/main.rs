//! Build automation tasks for the conn-pool workspace.
//!
//! Run with `cargo xtask <command>`.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

/// Feature sets of `conn-pool` that must each build and pass their tests.
const FEATURE_SETS: &[&[&str]] = &[&[], &["async"], &["serde"], &["async", "serde"]];

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for conn-pool")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Format check, clippy, feature matrix, tests and docs
    Ci,
    /// Run cargo fmt --check
    Fmt,
    /// Run clippy on every target with all features
    Clippy,
    /// Test each conn-pool feature set in isolation
    Features,
    /// Run the workspace tests
    Test,
    /// Repeat the concurrency tests to shake out rare interleavings
    Stress {
        /// Number of repetitions
        #[arg(long, default_value_t = 20)]
        rounds: u32,
        /// Only run tests whose name contains this filter
        filter: Option<String>,
    },
    /// Build documentation with warnings denied
    Doc,
    /// Run the checkout benchmarks
    Bench,
    /// Run the worker-thread demo
    Demo {
        /// Extra arguments passed to the demo binary
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;
    sh.change_dir(workspace_root()?);

    match cli.command {
        Command::Ci => {
            fmt(&sh)?;
            clippy(&sh)?;
            features(&sh)?;
            test(&sh)?;
            doc(&sh)?;
            println!("ci: all checks passed");
        }
        Command::Fmt => fmt(&sh)?,
        Command::Clippy => clippy(&sh)?,
        Command::Features => features(&sh)?,
        Command::Test => test(&sh)?,
        Command::Stress { rounds, filter } => stress(&sh, rounds, filter.as_deref())?,
        Command::Doc => doc(&sh)?,
        Command::Bench => cmd!(sh, "cargo bench -p conn-pool").run()?,
        Command::Demo { args } => cmd!(sh, "cargo run -p conn-pool-demo -- {args...}").run()?,
    }

    Ok(())
}

fn workspace_root() -> Result<PathBuf> {
    let output = std::process::Command::new("cargo")
        .args(["locate-project", "--workspace", "--message-format=plain"])
        .output()
        .context("failed to run cargo locate-project")?;

    let manifest = String::from_utf8(output.stdout).context("invalid UTF-8 in cargo output")?;
    PathBuf::from(manifest.trim())
        .parent()
        .map(PathBuf::from)
        .context("manifest path has no parent directory")
}

fn fmt(sh: &Shell) -> Result<()> {
    println!("fmt: checking formatting");
    cmd!(sh, "cargo fmt --all -- --check").run()?;
    Ok(())
}

fn clippy(sh: &Shell) -> Result<()> {
    println!("clippy: linting all targets");
    cmd!(sh, "cargo clippy --workspace --all-features --all-targets -- -D warnings").run()?;
    Ok(())
}

fn features(sh: &Shell) -> Result<()> {
    for set in FEATURE_SETS {
        let list = set.join(",");
        println!("features: conn-pool [{list}]");
        cmd!(sh, "cargo test -p conn-pool --no-default-features --features={list}").run()?;
    }
    Ok(())
}

fn test(sh: &Shell) -> Result<()> {
    println!("test: workspace");
    cmd!(sh, "cargo test --workspace --all-features").run()?;
    Ok(())
}

fn stress(sh: &Shell, rounds: u32, filter: Option<&str>) -> Result<()> {
    if rounds == 0 {
        bail!("--rounds must be at least 1");
    }
    let filter: Vec<&str> = filter.into_iter().collect();

    // Release mode widens the race windows the scenarios are looking for.
    cmd!(sh, "cargo test -p conn-pool-testing --release --no-run").run()?;
    for round in 1..=rounds {
        println!("stress: round {round}/{rounds}");
        let filter = &filter;
        cmd!(sh, "cargo test -p conn-pool-testing --release -- {filter...}")
            .quiet()
            .run()
            .with_context(|| format!("stress round {round} failed"))?;
    }
    Ok(())
}

fn doc(sh: &Shell) -> Result<()> {
    println!("doc: building API docs");
    cmd!(sh, "cargo doc --workspace --all-features --no-deps")
        .env("RUSTDOCFLAGS", "-D warnings")
        .run()?;
    Ok(())
}

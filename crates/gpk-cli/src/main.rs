#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod logging;

use clap::{CommandFactory, Parser};
use gpk_core::Env;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "gpk")]
#[command(author, version, about = "Git-native, signature-verified package manager", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v for DEBUG, -vv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Operate on the global installation prefix
    #[arg(short = 'g', long, global = true)]
    global: bool,

    /// Skip devDependencies
    #[arg(long, global = true)]
    production: bool,

    /// Override the working directory
    #[arg(long, global = true, value_name = "PATH")]
    cwd: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install dependencies, or add and install the given sources
    Install {
        /// Package sources (e.g. "gh:bcoin#semver:^2.0.0",
        /// "git+https://host/org/repo.git#v1.0.0")
        sources: Vec<String>,
    },

    /// Remove dependencies and prune unreachable modules
    Uninstall {
        /// Dependency names to remove
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Rebuild native addons in the installed tree
    Rebuild,

    /// Run a script from the manifest
    Run {
        /// Script name
        script: String,
    },

    /// Run the test script
    Test,

    /// Create a package.json in the current directory
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = cli
        .cwd
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    logging::init(cli.verbose);

    let env = Env::new();

    let result = match cli.command {
        Some(Commands::Install { sources }) => {
            if cli.global && sources.is_empty() {
                eprintln!("error: global install requires at least one package source");
                std::process::exit(2);
            }
            commands::install::run(&env, &cwd, &sources, cli.global, cli.production)
        }
        Some(Commands::Uninstall { names }) => {
            commands::uninstall::run(&env, &cwd, &names, cli.global, cli.production)
        }
        Some(Commands::Rebuild) => commands::rebuild::run(&env, &cwd),
        Some(Commands::Run { script }) => commands::run::run(&cwd, &script),
        Some(Commands::Test) => commands::run::run(&cwd, "test"),
        Some(Commands::Init) => commands::init::run(&cwd),
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
    };

    result.into_diagnostic()
}

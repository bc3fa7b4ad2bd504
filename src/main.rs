//! envshell CLI
//!
//! Entry point for the `envshell` command-line tool.

use std::io;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use envshell::editor::{self, EditError};
use envshell::{present, resolve, shell, ConfigStore, EnvshellError, ShellLaunch};

/// Environment variable holding a tracing filter directive
const LOG_ENV_VAR: &str = "ENVSHELL_LOG";

#[derive(Parser)]
#[command(name = "envshell")]
#[command(
    about = "Start a shell with configured variables loaded into the environment",
    version
)]
struct Cli {
    /// Path to the variable store (default: ~/.config/envshell/conf.json)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Shell to start (default: $SHELL)
    #[arg(long)]
    shell: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or modify a variable for the current directory
    Set {
        /// Variable name
        variable: String,

        /// Value to store; `-` reads the value from stdin
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Clear a variable set on the current directory
    Clear {
        /// Variable name
        variable: String,
    },

    /// List variables in this environment
    List {
        /// Show the merged environment instead of the per-directory breakdown
        #[arg(long)]
        merged: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(e.exit_code());
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("envshell=debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("envshell=warn"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<i32, EnvshellError> {
    let config_path = match cli.config {
        Some(path) => path,
        None => ConfigStore::default_path()?,
    };

    let mut store = ConfigStore::load(&config_path)?;
    for created in store.created() {
        if created.is_dir() {
            eprintln!("Created directory {}", created.display());
        } else {
            eprintln!("Created file {}", created.display());
        }
    }

    let cwd = std::env::current_dir().map_err(EnvshellError::CurrentDir)?;
    let dir = resolve::absolutize(Path::new("."), &cwd);

    match cli.command {
        None => run_shell(&store, &dir, cli.shell.as_deref()),
        Some(Commands::Set { variable, value }) => run_set(&mut store, &dir, &variable, &value),
        Some(Commands::Clear { variable }) => run_clear(&mut store, &dir, &variable),
        Some(Commands::List { merged, json }) => run_list(&store, &dir, merged, json),
    }
}

fn run_shell(store: &ConfigStore, dir: &Path, shell_override: Option<&str>) -> Result<i32, EnvshellError> {
    shell::check_not_nested(std::env::var(shell::ENVSHELL_MARKER).ok().as_deref())?;

    let chain = resolve::chain(store, dir);
    let env = envshell::merge(&chain);

    print!("{}", present::render_levels(&chain));

    let launch = ShellLaunch::new(shell::shell_program(shell_override), env.into_vars());
    let status = launch.run()?;

    Ok(status.code().unwrap_or(1))
}

fn run_set(store: &mut ConfigStore, dir: &Path, variable: &str, value: &str) -> Result<i32, EnvshellError> {
    editor::validate_name(variable)?;
    let value = editor::read_value(value, io::stdin().lock())?;

    match editor::set(store, dir, variable, &value) {
        Ok(outcome) => {
            println!("Saved {}:{}", outcome.name, outcome.value);
            Ok(0)
        }
        Err(e @ EditError::Store(_)) => {
            eprintln!("Failed to save {}:{}", variable, value);
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn run_clear(store: &mut ConfigStore, dir: &Path, variable: &str) -> Result<i32, EnvshellError> {
    match editor::clear(store, dir, variable) {
        Ok(outcome) => {
            println!("Removed variable {} from the environment", outcome.name);
            Ok(0)
        }
        Err(e @ EditError::Store(_)) => {
            eprintln!("Failed to remove variable {} from the environment", variable);
            Err(e.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn run_list(store: &ConfigStore, dir: &Path, merged: bool, json: bool) -> Result<i32, EnvshellError> {
    let chain = resolve::chain(store, dir);

    let output = match (merged, json) {
        (false, false) => present::render_levels(&chain),
        (true, false) => present::render_merged(&envshell::merge(&chain)),
        (false, true) => present::levels_to_json(&chain)? + "\n",
        (true, true) => present::merged_to_json(&envshell::merge(&chain))? + "\n",
    };
    print!("{}", output);

    Ok(0)
}

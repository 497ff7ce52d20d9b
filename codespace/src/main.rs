//! Inspection CLI for a persisted workspace.
//!
//! Opens the workspace described by `codespace.toml` (or `--storage`), performs
//! one operation, and exits. Every mutation is persisted before exit.

use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;

use codespace::exit_codes;
use codespace::io::config::{load_config, write_config};
use codespace::logging;
use codespace::workspace::Workspace;

#[derive(Parser)]
#[command(
    name = "codespace",
    version,
    about = "Persistent, checkpointed script workspace"
)]
struct Cli {
    /// Config file (TOML). A missing file means defaults.
    #[arg(long, default_value = "codespace.toml")]
    config: PathBuf,

    /// Snapshot file. Overrides `storage_path` from the config.
    #[arg(long)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the effective config (defaults plus `--storage`) to `--config`.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
    /// Run a script against the workspace. Use `-` to read it from stdin.
    Exec {
        /// Command text recorded alongside the code.
        #[arg(long, default_value = "exec")]
        label: String,
        code: String,
    },
    /// Print a variable as JSON.
    Get { name: String },
    /// Set a variable to a JSON value (e.g. `10`, `'"text"'`, `'[1, 2]'`).
    Set { name: String, value: String },
    /// Print the operation transcript.
    History,
    /// List variable names.
    Vars,
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    if let Some(storage) = cli.storage {
        config.storage_path = Some(storage);
    }
    if let Command::Init { force } = cli.command {
        if cli.config.exists() && !force {
            bail!("{} already exists (use --force to overwrite)", cli.config.display());
        }
        write_config(&cli.config, &config)?;
        println!("wrote {}", cli.config.display());
        return Ok(exit_codes::OK);
    }
    let mut workspace = Workspace::open(config)?;

    match cli.command {
        Command::Init { .. } => Ok(exit_codes::OK),
        Command::Exec { label, code } => cmd_exec(&mut workspace, &label, &code),
        Command::Get { name } => cmd_get(&mut workspace, &name),
        Command::Set { name, value } => cmd_set(&mut workspace, name, &value),
        Command::History => {
            let transcript = workspace.render_history();
            if !transcript.is_empty() {
                println!("{transcript}");
            }
            Ok(exit_codes::OK)
        }
        Command::Vars => {
            for name in workspace.environment().keys() {
                println!("{name}");
            }
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_exec(workspace: &mut Workspace, label: &str, code: &str) -> Result<i32> {
    let code = if code == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read script from stdin")?;
        buf
    } else {
        code.to_string()
    };

    let outcome = workspace.run(label, &code);
    print!("{}", outcome.output);
    match outcome.fault {
        None => Ok(exit_codes::OK),
        Some(fault) => {
            eprintln!("error: {fault}");
            Ok(exit_codes::FAULT)
        }
    }
}

fn cmd_get(workspace: &mut Workspace, name: &str) -> Result<i32> {
    match workspace.get(name) {
        Some(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(exit_codes::OK)
        }
        None => {
            eprintln!("variable not found: {name}");
            Ok(exit_codes::NOT_FOUND)
        }
    }
}

fn cmd_set(workspace: &mut Workspace, name: String, raw: &str) -> Result<i32> {
    let value: Value = serde_json::from_str(raw)
        .with_context(|| format!("parse value for `{name}` as JSON (quote strings: '\"text\"')"))?;
    workspace.set(name, value);
    Ok(exit_codes::OK)
}

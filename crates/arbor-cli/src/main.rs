//! arbor
//!
//! Interactive shell for browsing and editing a hierarchical content
//! repository: navigate nodes like directories, inspect and edit
//! properties and mixins, with tab completion of node and property names.
//!
//! Without `--script` or `-c` the shell is interactive; otherwise the given
//! lines run in order and the process exits non-zero on the first failure
//! (unless `--continue-on-error`).

use anyhow::{anyhow, Context, Result};
use arbor_repo::LocationConnector;
use arbor_shell::{Shell, ShellConfig, ShutdownReason};
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "repl-rustyline")]
mod editor;
mod signals;

#[derive(Parser, Debug)]
#[command(name = "arbor")]
#[command(author, version, about = "arbor: interactive shell for content repositories")]
struct Cli {
    /// Repository location: `mem:<name>`, `file:<path>` or `<path>.json`.
    #[arg(long, short = 's', env = "ARBOR_SERVER")]
    server: Option<String>,

    #[arg(long, short = 'u', env = "ARBOR_USER")]
    user: Option<String>,

    #[arg(long, short = 'p', env = "ARBOR_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Workspace to log into (repository default when omitted).
    #[arg(long, short = 'w')]
    workspace: Option<String>,

    /// JSON config file; flags and environment override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Line history file (default `$HOME/.arbor_history`).
    #[arg(long)]
    history_file: Option<PathBuf>,

    /// Run commands from a file (`-` for stdin) instead of interactively.
    #[arg(long)]
    script: Option<PathBuf>,

    /// Run a command; may be repeated. Runs after `--script` lines.
    #[arg(short = 'c', long = "command")]
    commands: Vec<String>,

    /// Keep running script lines after a failure.
    #[arg(long)]
    continue_on_error: bool,

    /// Do not echo script lines or print the farewell.
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Do not print elapsed time after each command.
    #[arg(long)]
    no_timing: bool,

    /// Log in at startup instead of on first use.
    #[arg(long)]
    connect: bool,
}

impl Cli {
    fn is_script(&self) -> bool {
        self.script.is_some() || !self.commands.is_empty()
    }

    fn shell_config(&self) -> Result<ShellConfig> {
        let mut config = match &self.config {
            Some(path) => ShellConfig::from_file(path)?,
            None => ShellConfig::default(),
        };
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(user) = &self.user {
            config.username = user.clone();
        }
        if let Some(password) = &self.password {
            config.password = password.clone();
        }
        if self.workspace.is_some() {
            config.workspace = self.workspace.clone();
        }
        if self.history_file.is_some() {
            config.history_file = self.history_file.clone();
        }
        if self.no_timing {
            config.show_timing = false;
        }
        Ok(config)
    }

    fn script_lines(&self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        if let Some(path) = &self.script {
            let text = if path.as_os_str() == "-" {
                let mut buf = String::new();
                io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                fs::read_to_string(path)
                    .with_context(|| format!("failed to read script {}", path.display()))?
            };
            lines.extend(text.lines().map(str::to_string));
        }
        lines.extend(self.commands.iter().cloned());
        Ok(lines)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ARBOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.shell_config()?;
    tracing::debug!(server = %config.server, user = %config.username, "starting");

    let shell = Shell::new(config, Arc::new(LocationConnector::new()))
        .map_err(|e| anyhow!("failed to register commands: {e}"))?;
    signals::install(shell.shutdown_coordinator().clone())?;

    if cli.connect && !shell.navigator().lock().connect() {
        let reason = shell
            .navigator()
            .lock()
            .take_last_error()
            .unwrap_or_default();
        eprintln!("{} could not log in: {reason}", "error:".red().bold());
    }

    if cli.is_script() {
        run_script(&shell, &cli)
    } else {
        run_interactive(&shell)
    }
}

fn run_script(shell: &Shell, cli: &Cli) -> Result<()> {
    let lines = cli.script_lines()?;
    let mut stdout = io::stdout();
    let result = shell
        .repl()
        .run_script(&lines, cli.continue_on_error, !cli.quiet, &mut stdout);

    let mut farewell: Box<dyn Write> = if cli.quiet {
        Box::new(io::sink())
    } else {
        Box::new(io::stdout())
    };
    shell
        .shutdown_coordinator()
        .shutdown(ShutdownReason::ScriptFinished, &mut farewell);
    result.map_err(|e| anyhow!("{e}"))
}

fn run_interactive(shell: &Shell) -> Result<()> {
    println!("{}", "arbor shell".green().bold());
    println!("Type `help` for commands. Type `exit` to quit.\n");

    #[cfg(feature = "repl-rustyline")]
    let mut reader = editor::EditorReader::new(shell.line_completer(), shell.config().history_path())?;
    #[cfg(not(feature = "repl-rustyline"))]
    let mut reader = arbor_shell::PlainReader::new(io::stdin().lock(), io::stdout());

    shell.repl().run(&mut reader, &mut io::stdout())?;
    Ok(())
}

//! The read-dispatch loop.
//!
//! The loop is generic over a [`LineReader`] so the same code drives an
//! interactive line editor, plain stdin, or a script. Leaving the loop is a
//! returned [`CommandOutcome::Shutdown`], never an error, so no command can
//! swallow it.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use colored::Colorize;
use parking_lot::Mutex;

use crate::{CommandContext, CommandOutcome, CommandRegistry, SessionNavigator, ShellError};

pub const FAREWELL: &str = "Bye bye!";

/// What a reader produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C: drop the current line and prompt again.
    Interrupted,
    /// Ctrl-D or end of input.
    Eof,
}

pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, ShellError>;

    fn add_history(&mut self, _line: &str) {}

    /// Persist history at exit.
    fn save_history(&mut self) -> Result<(), ShellError> {
        Ok(())
    }
}

/// Feeds a fixed list of lines, then reports end of input.
#[derive(Debug, Default)]
pub struct ScriptReader {
    lines: VecDeque<String>,
}

impl ScriptReader {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }
}

impl LineReader for ScriptReader {
    fn read_line(&mut self, _prompt: &str) -> Result<ReadOutcome, ShellError> {
        Ok(match self.lines.pop_front() {
            Some(line) => ReadOutcome::Line(line),
            None => ReadOutcome::Eof,
        })
    }
}

/// Plain buffered input with the prompt written to `prompt_out`.
pub struct PlainReader<R, W> {
    input: R,
    prompt_out: W,
}

impl<R: BufRead, W: Write> PlainReader<R, W> {
    pub fn new(input: R, prompt_out: W) -> Self {
        Self { input, prompt_out }
    }
}

impl<R: BufRead, W: Write> LineReader for PlainReader<R, W> {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, ShellError> {
        write!(self.prompt_out, "{prompt} ")?;
        self.prompt_out.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(ReadOutcome::Eof);
        }
        Ok(ReadOutcome::Line(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Command,
    EndOfInput,
    ScriptFinished,
    /// Reading input or writing output failed.
    Failed,
    Signal(i32),
}

/// Runs logout and the farewell exactly once, whoever gets there first:
/// the loop or a signal handler thread.
pub struct ShutdownCoordinator {
    navigator: Arc<Mutex<SessionNavigator>>,
    done: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(navigator: Arc<Mutex<SessionNavigator>>) -> Self {
        Self {
            navigator,
            done: AtomicBool::new(false),
        }
    }

    /// Returns `false` if shutdown already ran.
    pub fn shutdown(&self, reason: ShutdownReason, out: &mut dyn Write) -> bool {
        if self.done.swap(true, Ordering::SeqCst) {
            return false;
        }
        tracing::info!(?reason, "shutting down");
        self.navigator.lock().logout();
        if let Err(err) = writeln!(out, "{FAREWELL}").and_then(|_| out.flush()) {
            tracing::debug!(error = %err, "could not print farewell");
        }
        true
    }

    pub fn is_complete(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

/// How one input line was handled.
#[derive(Debug)]
pub enum LineOutcome {
    /// Blank or comment.
    Skipped,
    UnknownCommand(String),
    Executed(CommandOutcome),
    Failed(ShellError),
}

impl LineOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            LineOutcome::UnknownCommand(_)
                | LineOutcome::Failed(_)
                | LineOutcome::Executed(CommandOutcome::UsageError)
        )
    }

    pub fn is_shutdown(&self) -> bool {
        matches!(self, LineOutcome::Executed(CommandOutcome::Shutdown))
    }
}

pub struct ReplLoop {
    registry: Arc<CommandRegistry>,
    navigator: Arc<Mutex<SessionNavigator>>,
    shutdown: Arc<ShutdownCoordinator>,
    show_timing: bool,
}

impl ReplLoop {
    pub fn new(
        registry: Arc<CommandRegistry>,
        navigator: Arc<Mutex<SessionNavigator>>,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            registry,
            navigator,
            shutdown,
            show_timing: true,
        }
    }

    pub fn with_timing(mut self, show_timing: bool) -> Self {
        self.show_timing = show_timing;
        self
    }

    /// Interactive loop: read, dispatch, repeat until a shutdown command or
    /// end of input, then save history and shut down. Command failures are
    /// printed and the loop continues. A reader or output error ends the loop
    /// and is returned after the same shutdown sequence.
    pub fn run(&self, reader: &mut dyn LineReader, out: &mut dyn Write) -> Result<(), ShellError> {
        let mut failure = None;
        let reason = loop {
            if self.shutdown.is_complete() {
                break ShutdownReason::Signal(0);
            }
            match self.step(reader, out) {
                Ok(None) => continue,
                Ok(Some(reason)) => break reason,
                Err(err) => {
                    tracing::warn!(error = %err, "input loop failed");
                    failure = Some(err);
                    break ShutdownReason::Failed;
                }
            }
        };

        if let Err(err) = reader.save_history() {
            tracing::warn!(error = %err, "failed to save history");
        }
        self.shutdown.shutdown(reason, out);
        failure.map_or(Ok(()), Err)
    }

    /// Read and handle one line. `Some` when the loop should stop.
    fn step(
        &self,
        reader: &mut dyn LineReader,
        out: &mut dyn Write,
    ) -> Result<Option<ShutdownReason>, ShellError> {
        let prompt = self.navigator.lock().prompt().to_string();
        match reader.read_line(&prompt)? {
            ReadOutcome::Line(line) => {
                let trimmed = line.trim();
                if !trimmed.is_empty() {
                    reader.add_history(trimmed);
                }
                if self.handle_line(&line, out)?.is_shutdown() {
                    return Ok(Some(ShutdownReason::Command));
                }
                Ok(None)
            }
            ReadOutcome::Interrupted => Ok(None),
            ReadOutcome::Eof => Ok(Some(ShutdownReason::EndOfInput)),
        }
    }

    /// Run script lines in order. Stops at the first failing line unless
    /// `continue_on_error`; stops early on a shutdown command. Does not run
    /// the shutdown sequence.
    pub fn run_script<I, S>(
        &self,
        lines: I,
        continue_on_error: bool,
        echo: bool,
        out: &mut dyn Write,
    ) -> Result<(), ShellError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (idx, raw) in lines.into_iter().enumerate() {
            let line = raw.as_ref().trim();
            if echo && !is_skippable(line) {
                let prompt = self.navigator.lock().prompt().to_string();
                writeln!(out, "{prompt} {line}")?;
            }
            let outcome = self.handle_line(line, out)?;
            if outcome.is_shutdown() {
                break;
            }
            if outcome.is_failure() && !continue_on_error {
                return Err(ShellError::Script {
                    line: idx + 1,
                    message: describe_failure(&outcome),
                });
            }
        }
        Ok(())
    }

    /// Tokenise, resolve and run one line. Only output failures are errors.
    pub fn handle_line(&self, line: &str, out: &mut dyn Write) -> Result<LineOutcome, ShellError> {
        let line = line.trim();
        if is_skippable(line) {
            return Ok(LineOutcome::Skipped);
        }
        let args = tokenize(line);
        let Some(first) = args.first() else {
            return Ok(LineOutcome::Skipped);
        };
        let token = first.to_lowercase();
        let Some(descriptor) = self.registry.resolve(&token) else {
            writeln!(out, "{} Unknown command: {token}", "error:".red().bold())?;
            return Ok(LineOutcome::UnknownCommand(token));
        };

        tracing::debug!(command = descriptor.name, args = args.len() - 1, "dispatch");
        let started = Instant::now();
        let result = {
            let mut navigator = self.navigator.lock();
            let mut ctx = CommandContext {
                navigator: &mut navigator,
                registry: &self.registry,
                out: &mut *out,
            };
            (descriptor.execute)(&mut ctx, &args)
        };

        let outcome = match result {
            Ok(CommandOutcome::Shutdown) => return Ok(LineOutcome::Executed(CommandOutcome::Shutdown)),
            Ok(CommandOutcome::UsageError) => {
                writeln!(out, "Usage: {}", descriptor.usage)?;
                writeln!(out, "   {}", descriptor.help)?;
                LineOutcome::Executed(CommandOutcome::UsageError)
            }
            Ok(CommandOutcome::Completed) => LineOutcome::Executed(CommandOutcome::Completed),
            Err(ShellError::Io(err)) => return Err(ShellError::Io(err)),
            Err(err) => {
                tracing::debug!(command = descriptor.name, error = %err, "command failed");
                writeln!(out, "{} {err}", "error:".red().bold())?;
                LineOutcome::Failed(err)
            }
        };

        if self.show_timing {
            writeln!(out, "  completed: {} msecs", started.elapsed().as_millis())?;
        }
        Ok(outcome)
    }
}

fn is_skippable(line: &str) -> bool {
    line.is_empty() || line.starts_with('#')
}

/// Split on runs of whitespace.
pub fn tokenize(line: &str) -> Vec<String> {
    line.split_whitespace().map(str::to_string).collect()
}

fn describe_failure(outcome: &LineOutcome) -> String {
    match outcome {
        LineOutcome::UnknownCommand(token) => format!("unknown command `{token}`"),
        LineOutcome::Failed(err) => err.to_string(),
        LineOutcome::Executed(CommandOutcome::UsageError) => "usage error".to_string(),
        _ => "failed".to_string(),
    }
}

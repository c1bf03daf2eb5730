//! rustyline line editor with node/property/command completion.

use anyhow::{anyhow, Result};
use arbor_shell::{LineCompleter, LineReader, ReadOutcome, ShellError};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, Context, Editor};
use std::path::PathBuf;

pub struct EditorReader {
    editor: Editor<ShellHelper, DefaultHistory>,
    history: Option<PathBuf>,
}

impl EditorReader {
    pub fn new(completer: LineCompleter, history: Option<PathBuf>) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .auto_add_history(false)
            .completion_type(CompletionType::List)
            .build();
        let mut editor: Editor<ShellHelper, DefaultHistory> =
            Editor::with_config(config).map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
        editor.set_helper(Some(ShellHelper { completer }));

        if let Some(path) = history.as_ref().filter(|p| p.exists()) {
            if let Err(err) = editor.load_history(path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to load history");
            }
        }
        Ok(Self { editor, history })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, ShellError> {
        match self.editor.readline(&format!("{prompt} ")) {
            Ok(line) => Ok(ReadOutcome::Line(line)),
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(e) => Err(ShellError::LineEditor(e.to_string())),
        }
    }

    /// Record the line and append it to the history file right away.
    fn add_history(&mut self, line: &str) {
        if let Err(err) = self.editor.add_history_entry(line) {
            tracing::debug!(error = %err, "failed to record history entry");
            return;
        }
        if let Some(path) = &self.history {
            if let Err(err) = self.editor.append_history(path) {
                tracing::warn!(path = %path.display(), error = %err, "failed to append history");
            }
        }
    }

    fn save_history(&mut self) -> Result<(), ShellError> {
        if let Some(path) = &self.history {
            self.editor
                .save_history(path)
                .map_err(|e| ShellError::LineEditor(format!("{}: {e}", path.display())))?;
        }
        Ok(())
    }
}

pub struct ShellHelper {
    completer: LineCompleter,
}

impl rustyline::Helper for ShellHelper {}

impl rustyline::highlight::Highlighter for ShellHelper {}

impl rustyline::hint::Hinter for ShellHelper {
    type Hint = String;
    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl rustyline::validate::Validator for ShellHelper {}

impl Completer for ShellHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let (start, candidates) = self.completer.complete(line, pos);
        let pairs = candidates
            .into_iter()
            .map(|candidate| Pair {
                display: candidate.trim_end().to_string(),
                replacement: candidate,
            })
            .collect();
        Ok((start, pairs))
    }
}

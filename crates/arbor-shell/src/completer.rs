//! Tab completion of node and property names against the name cache.

use std::ops::Bound;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::NameKind;
use crate::{ArgCompletion, CommandRegistry, SessionNavigator};

/// Outcome of one completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Nothing to offer: no prefix match, unresolvable path, or no session.
    NoMatch,
    /// Full replacements for the word being completed, sorted.
    Candidates(Vec<String>),
}

impl Completion {
    pub fn candidates(&self) -> &[String] {
        match self {
            Completion::NoMatch => &[],
            Completion::Candidates(c) => c,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameCompleter {
    kind: NameKind,
}

impl NameCompleter {
    pub fn nodes() -> Self {
        Self {
            kind: NameKind::Nodes,
        }
    }

    pub fn properties() -> Self {
        Self {
            kind: NameKind::Properties,
        }
    }

    pub fn kind(&self) -> NameKind {
        self.kind
    }

    /// Complete the word `buffer[..cursor]`.
    ///
    /// The part before the last `/` is resolved like a `cd` argument and the
    /// rest is matched as a name prefix among that node's children (or
    /// properties). Candidates keep the typed directory prefix. A single
    /// candidate gets `/` appended for nodes and a space for properties.
    /// Never connects; with no live session nothing is offered.
    pub fn complete(&self, navigator: &SessionNavigator, buffer: &str, cursor: usize) -> Completion {
        let word = buffer.get(..cursor).unwrap_or(buffer);
        let (dir, partial) = match word.rfind('/') {
            Some(i) => (Some(&word[..i]), &word[i + 1..]),
            None => (None, word),
        };

        let node = match dir {
            None => navigator.position(),
            Some("") => navigator.root(),
            Some(dir) => navigator.resolve_path(dir),
        };
        let Ok(node) = node else {
            return Completion::NoMatch;
        };
        let names = match navigator.names(&node, self.kind) {
            Ok(names) => names,
            Err(err) => {
                tracing::debug!(path = %node.path, error = %err, "completion lookup failed");
                return Completion::NoMatch;
            }
        };

        let mut candidates: Vec<String> = names
            .range::<str, _>((Bound::Included(partial), Bound::Unbounded))
            .take_while(|name| name.starts_with(partial))
            .map(|name| match dir {
                Some(dir) => format!("{dir}/{name}"),
                None => name.clone(),
            })
            .collect();

        match candidates.len() {
            0 => Completion::NoMatch,
            1 => {
                candidates[0].push(match self.kind {
                    NameKind::Nodes => '/',
                    NameKind::Properties => ' ',
                });
                Completion::Candidates(candidates)
            }
            _ => Completion::Candidates(candidates),
        }
    }
}

/// Whole-line completion: command names for the first word, then node
/// and/or property names as the command's [`ArgCompletion`] says. When both
/// apply, node names are tried first.
#[derive(Clone)]
pub struct LineCompleter {
    registry: Arc<CommandRegistry>,
    navigator: Arc<Mutex<SessionNavigator>>,
}

impl LineCompleter {
    pub fn new(registry: Arc<CommandRegistry>, navigator: Arc<Mutex<SessionNavigator>>) -> Self {
        Self {
            registry,
            navigator,
        }
    }

    /// Returns the start offset of the word ending at `pos` and its
    /// replacement candidates.
    pub fn complete(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        let head = line.get(..pos).unwrap_or(line);
        let start = head
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(0);
        let word = &head[start..];

        let Some(command) = head[..start].split_whitespace().next() else {
            return (start, self.registry.names_with_prefix(word));
        };
        let Some(descriptor) = self.registry.resolve(&command.to_lowercase()) else {
            return (start, Vec::new());
        };
        let completers = match descriptor.arg_completion {
            ArgCompletion::None => vec![],
            ArgCompletion::Nodes => vec![NameCompleter::nodes()],
            ArgCompletion::Properties => vec![NameCompleter::properties()],
            ArgCompletion::NodesThenProperties => {
                vec![NameCompleter::nodes(), NameCompleter::properties()]
            }
        };

        let navigator = self.navigator.lock();
        for completer in &completers {
            if let Completion::Candidates(candidates) =
                completer.complete(&navigator, word, word.len())
            {
                return (start, candidates);
            }
        }
        (start, Vec::new())
    }
}

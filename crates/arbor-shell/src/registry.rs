//! Command registry: canonical names, aliases, usage and help text.
//!
//! The registry is filled once at startup and read-only afterwards, so it is
//! shared behind an `Arc` without locking.

use std::collections::BTreeMap;
use std::io::Write;

use crate::{RegistryError, SessionNavigator, ShellError};

/// What kind of names a command's arguments complete against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgCompletion {
    None,
    Nodes,
    Properties,
    /// Node names first, property names when no node matches.
    NodesThenProperties,
}

/// Result of running one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    /// Wrong arguments; the loop prints usage and help.
    UsageError,
    /// Leave the loop after orderly shutdown.
    Shutdown,
}

/// Everything a command may touch while it runs.
pub struct CommandContext<'a> {
    pub navigator: &'a mut SessionNavigator,
    pub registry: &'a CommandRegistry,
    pub out: &'a mut dyn Write,
}

pub type CommandFn = fn(&mut CommandContext<'_>, &[String]) -> Result<CommandOutcome, ShellError>;

#[derive(Clone)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub help: &'static str,
    pub arg_completion: ArgCompletion,
    pub execute: CommandFn,
}

impl std::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDescriptor")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("usage", &self.usage)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandDescriptor>,
    aliases: BTreeMap<String, String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command and its aliases. Nothing is inserted when any name collides.
    pub fn register(&mut self, descriptor: CommandDescriptor) -> Result<(), RegistryError> {
        let name = descriptor.name;
        if self.commands.contains_key(name) || self.aliases.contains_key(name) {
            return Err(RegistryError::DuplicateCommand(name.to_string()));
        }
        for (i, alias) in descriptor.aliases.iter().enumerate() {
            let taken = self.commands.contains_key(*alias)
                || self.aliases.contains_key(*alias)
                || *alias == name
                || descriptor.aliases[..i].contains(alias);
            if taken {
                return Err(RegistryError::DuplicateAlias {
                    alias: alias.to_string(),
                    command: name.to_string(),
                });
            }
        }

        for alias in descriptor.aliases {
            self.aliases.insert(alias.to_string(), name.to_string());
        }
        self.commands.insert(name.to_string(), descriptor);
        Ok(())
    }

    /// Look up a canonical name or alias. Case-sensitive.
    pub fn resolve(&self, token: &str) -> Option<&CommandDescriptor> {
        let canonical = self.aliases.get(token).map(String::as_str).unwrap_or(token);
        self.commands.get(canonical)
    }

    /// Descriptors sorted by canonical name.
    pub fn list(&self) -> impl Iterator<Item = &CommandDescriptor> {
        self.commands.values()
    }

    /// `(alias, canonical)` pairs sorted by alias.
    pub fn list_aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }

    /// Canonical names and aliases starting with `prefix`, sorted.
    pub fn names_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .keys()
            .chain(self.aliases.keys())
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

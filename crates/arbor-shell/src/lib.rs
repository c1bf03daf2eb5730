//! Navigation and session core of the arbor shell.
//!
//! ```text
//!   LineReader ──line──► ReplLoop ──resolve──► CommandRegistry
//!                           │                        │
//!                           └──execute(ctx, args)◄───┘
//!                                   │
//!                                   ▼
//!                           SessionNavigator ──► Session (arbor-repo)
//!                                   │                 │
//!                                   ▼                 │ change events
//!                               NameCache ◄───────────┘ (background thread)
//!                                   ▲
//!                           NameCompleter (tab completion)
//! ```
//!
//! [`Shell`] builds these once and hands out the shared handles.

pub mod cache;
pub mod commands;
pub mod completer;
pub mod config;
pub mod error;
pub mod navigator;
pub mod registry;
pub mod repl;


use std::sync::Arc;

use arbor_repo::Connector;
use parking_lot::Mutex;

pub use cache::{NameCache, NameKind, NameSet};
pub use completer::{Completion, LineCompleter, NameCompleter};
pub use config::ShellConfig;
pub use error::{RegistryError, ShellError};
pub use navigator::{NavigationState, SessionNavigator};
pub use registry::{
    ArgCompletion, CommandContext, CommandDescriptor, CommandOutcome, CommandRegistry,
};
pub use repl::{
    LineOutcome, LineReader, PlainReader, ReadOutcome, ReplLoop, ScriptReader,
    ShutdownCoordinator, ShutdownReason,
};

/// The shell's shared state, constructed once at startup.
pub struct Shell {
    config: ShellConfig,
    registry: Arc<CommandRegistry>,
    navigator: Arc<Mutex<SessionNavigator>>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl Shell {
    /// Register the built-in commands and create a disconnected navigator.
    pub fn new(config: ShellConfig, connector: Arc<dyn Connector>) -> Result<Self, RegistryError> {
        let mut registry = CommandRegistry::new();
        commands::register_builtin_commands(&mut registry)?;
        tracing::debug!(commands = registry.len(), "command registry ready");

        let navigator = Arc::new(Mutex::new(SessionNavigator::new(&config, connector)));
        let shutdown = Arc::new(ShutdownCoordinator::new(navigator.clone()));
        Ok(Self {
            config,
            registry: Arc::new(registry),
            navigator,
            shutdown,
        })
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    pub fn navigator(&self) -> &Arc<Mutex<SessionNavigator>> {
        &self.navigator
    }

    pub fn shutdown_coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    pub fn repl(&self) -> ReplLoop {
        ReplLoop::new(
            self.registry.clone(),
            self.navigator.clone(),
            self.shutdown.clone(),
        )
        .with_timing(self.config.show_timing)
    }

    pub fn line_completer(&self) -> LineCompleter {
        LineCompleter::new(self.registry.clone(), self.navigator.clone())
    }

    /// See [`LineCompleter::complete`].
    pub fn complete_line(&self, line: &str, pos: usize) -> (usize, Vec<String>) {
        self.line_completer().complete(line, pos)
    }
}

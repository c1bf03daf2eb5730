//! Built-in commands.
//!
//! Each module exposes its descriptors through `commands()`; the registry is
//! filled from [`builtin_commands`] once at startup.

pub mod general;
pub mod navigation;
pub mod nodes;
pub mod properties;
pub mod session;

use arbor_repo::PropertyType;

use crate::{CommandDescriptor, CommandRegistry, RegistryError, ShellError};

pub fn builtin_commands() -> Vec<CommandDescriptor> {
    let mut all = general::commands();
    all.extend(session::commands());
    all.extend(navigation::commands());
    all.extend(nodes::commands());
    all.extend(properties::commands());
    all
}

pub fn register_builtin_commands(registry: &mut CommandRegistry) -> Result<(), RegistryError> {
    for descriptor in builtin_commands() {
        registry.register(descriptor)?;
    }
    Ok(())
}

/// Arguments after the command token, joined by single spaces.
pub(crate) fn rest(args: &[String]) -> String {
    args.get(1..).unwrap_or_default().join(" ")
}

pub(crate) fn parse_type(name: Option<&String>) -> Result<PropertyType, ShellError> {
    match name {
        None => Ok(PropertyType::String),
        Some(name) => name
            .parse()
            .map_err(|_| ShellError::Invalid(format!("Unknown property type: {name}"))),
    }
}

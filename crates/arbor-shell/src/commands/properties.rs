//! Property listing and editing on the current node.

use arbor_repo::{Property, PropertyType};

use super::{parse_type, rest};
use crate::{ArgCompletion, CommandContext, CommandDescriptor, CommandOutcome, ShellError};

const MAX_LISTED_VALUE: usize = 50;
const TRUNCATED_VALUE: usize = 42;

pub fn commands() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor {
            name: "proplist",
            aliases: &["listprops", "list"],
            usage: "proplist [<path>]",
            help: "list the properties of the current node or of <path>",
            arg_completion: ArgCompletion::Nodes,
            execute: prop_list,
        },
        CommandDescriptor {
            name: "propget",
            aliases: &["get", "getprop"],
            usage: "propget <property> [<property> ..]",
            help: "print the value(s) of properties of the current node",
            arg_completion: ArgCompletion::Properties,
            execute: prop_get,
        },
        CommandDescriptor {
            name: "propset",
            aliases: &["setprop", "set"],
            usage: "propset <property> <value> [<type>]",
            help: "set a single-valued property, creating it if needed; default type is String",
            arg_completion: ArgCompletion::Properties,
            execute: prop_set,
        },
        CommandDescriptor {
            name: "propadd",
            aliases: &["addprop"],
            usage: "propadd <property> [<type>]",
            help: "create an empty multi-valued property, default type is String",
            arg_completion: ArgCompletion::None,
            execute: prop_add,
        },
        CommandDescriptor {
            name: "valueadd",
            aliases: &["addvalue"],
            usage: "valueadd <property> <value> [<type>]",
            help: "append a value to a multi-valued property, creating it if needed; default type is String",
            arg_completion: ArgCompletion::Properties,
            execute: value_add,
        },
        CommandDescriptor {
            name: "propdelete",
            aliases: &["deleteprop", "proprm"],
            usage: "propdelete <property> [<property> ..]",
            help: "remove properties from the current node",
            arg_completion: ArgCompletion::Properties,
            execute: prop_delete,
        },
    ]
}

/// One-cell rendering for listings.
pub fn summarize(property: &Property) -> String {
    if property.multiple {
        return "[multivalue]".to_string();
    }
    match property.kind {
        PropertyType::Binary => "[binary data]".to_string(),
        PropertyType::Undefined => "[undefined]".to_string(),
        _ => {
            let value = property.first_value().unwrap_or_default();
            if value.chars().count() > MAX_LISTED_VALUE {
                let head: String = value.chars().take(TRUNCATED_VALUE).collect();
                format!("{head} [more..]")
            } else {
                value.to_string()
            }
        }
    }
}

fn prop_list(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let current = ctx.navigator.current_node()?;
    let node = if args.len() > 1 {
        ctx.navigator.resolve_path(&rest(args))?
    } else {
        current
    };
    let properties = ctx.navigator.properties(&node)?;
    writeln!(ctx.out, "{:<28}{:<12}{}", "Name", "Type", "Value")?;
    writeln!(ctx.out, "{:<28}{:<12}{}", "--------------------", "--------", "--------------------")?;
    for property in &properties {
        writeln!(
            ctx.out,
            "{:<28}{:<12}{}",
            property.name,
            property.kind,
            summarize(property)
        )?;
    }
    writeln!(ctx.out, "{:<28}{:<12}{}", "--------------------", "--------", "--------------------")?;
    Ok(CommandOutcome::Completed)
}

fn prop_get(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() < 2 {
        return Ok(CommandOutcome::UsageError);
    }
    let node = ctx.navigator.current_node()?;
    for name in &args[1..] {
        let property = ctx.navigator.property(&node, name)?;
        writeln!(
            ctx.out,
            " {}\t type:{}\t multi:{}",
            property.name, property.kind, property.multiple
        )?;
        writeln!(ctx.out, " --- ")?;
        for value in &property.values {
            match property.kind {
                PropertyType::Binary => writeln!(ctx.out, "binary data")?,
                PropertyType::Undefined => writeln!(ctx.out, "undefined")?,
                _ => writeln!(ctx.out, "{value}")?,
            }
        }
        writeln!(ctx.out, " --- ")?;
    }
    Ok(CommandOutcome::Completed)
}

fn prop_set(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let (name, value, kind) = match args {
        [_, name, value] => (name, value, parse_type(None)?),
        [_, name, value, kind] => (name, value, parse_type(Some(kind))?),
        _ => return Ok(CommandOutcome::UsageError),
    };
    let node = ctx.navigator.current_node()?;
    if let Some(existing) = ctx.navigator.session()?.property(node.id, name)? {
        if existing.kind != kind {
            return Err(ShellError::Invalid(format!(
                "Property type doesn't match type of current property: {}",
                existing.kind
            )));
        }
        if existing.multiple {
            return Err(ShellError::Invalid(
                "Use valueadd to add values to a multi-valued property.".to_string(),
            ));
        }
    }
    ctx.navigator
        .set_property(&node, Property::single(name.clone(), kind, value.clone()))?;
    writeln!(ctx.out, "Property '{name}' set.")?;
    Ok(CommandOutcome::Completed)
}

fn prop_add(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let (name, kind) = match args {
        [_, name] => (name, parse_type(None)?),
        [_, name, kind] => (name, parse_type(Some(kind))?),
        _ => return Ok(CommandOutcome::UsageError),
    };
    let node = ctx.navigator.current_node()?;
    if ctx.navigator.session()?.property(node.id, name)?.is_some() {
        return Err(ShellError::Invalid(format!("Property '{name}' already exists.")));
    }
    ctx.navigator
        .set_property(&node, Property::multi(name.clone(), kind, Vec::new()))?;
    writeln!(ctx.out, "Property '{name}' created.")?;
    Ok(CommandOutcome::Completed)
}

fn value_add(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let (name, value, kind) = match args {
        [_, name, value] => (name, value, parse_type(None)?),
        [_, name, value, kind] => (name, value, parse_type(Some(kind))?),
        _ => return Ok(CommandOutcome::UsageError),
    };
    let node = ctx.navigator.current_node()?;
    let property = match ctx.navigator.session()?.property(node.id, name)? {
        Some(existing) if existing.kind != kind => {
            return Err(ShellError::Invalid(format!(
                "Property type doesn't match type of current property: {}",
                existing.kind
            )));
        }
        Some(existing) if !existing.multiple => {
            return Err(ShellError::Invalid(format!(
                "Property '{name}' is single-valued, use propset."
            )));
        }
        Some(mut existing) => {
            existing.values.push(value.clone());
            existing
        }
        None => Property::multi(name.clone(), kind, vec![value.clone()]),
    };
    ctx.navigator.set_property(&node, property)?;
    writeln!(ctx.out, "Value added to '{name}'.")?;
    Ok(CommandOutcome::Completed)
}

fn prop_delete(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() < 2 {
        return Ok(CommandOutcome::UsageError);
    }
    let node = ctx.navigator.current_node()?;
    let mut missing = Vec::new();
    for name in &args[1..] {
        if ctx.navigator.session()?.property(node.id, name)?.is_none() {
            writeln!(ctx.out, "Node doesn't have a property with name: {name}")?;
            missing.push(name.as_str());
            continue;
        }
        ctx.navigator.remove_property(&node, name)?;
        writeln!(ctx.out, "Property '{name}' removed.")?;
    }
    if missing.is_empty() {
        Ok(CommandOutcome::Completed)
    } else {
        Err(ShellError::NotFound(format!(
            "not removed: {}",
            missing.join(", ")
        )))
    }
}

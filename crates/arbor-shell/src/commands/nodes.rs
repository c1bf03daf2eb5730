//! Node and mixin mutations.

use arbor_repo::memory::DEFAULT_NODE_TYPE;

use crate::{ArgCompletion, CommandContext, CommandDescriptor, CommandOutcome, ShellError};

pub fn commands() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor {
            name: "nodeadd",
            aliases: &["addnode"],
            usage: "nodeadd <name> [<type>]",
            help: "add a child node to the current node, default type is nt:unstructured",
            arg_completion: ArgCompletion::None,
            execute: node_add,
        },
        CommandDescriptor {
            name: "noderemove",
            aliases: &["removenode", "noderm", "rm", "delete", "nodedel"],
            usage: "noderemove <name> [<name> ..]",
            help: "remove child nodes of the current node",
            arg_completion: ArgCompletion::Nodes,
            execute: node_remove,
        },
        CommandDescriptor {
            name: "nodemove",
            aliases: &["mv", "movenode"],
            usage: "nodemove <src> <dest>",
            help: "move a node; <dest> is the new path, absolute or relative to the current node",
            arg_completion: ArgCompletion::Nodes,
            execute: node_move,
        },
        CommandDescriptor {
            name: "nodecopy",
            aliases: &["cp", "copynode"],
            usage: "nodecopy <src> <dest>",
            help: "copy a node and its subtree to <dest>",
            arg_completion: ArgCompletion::Nodes,
            execute: node_copy,
        },
        CommandDescriptor {
            name: "mixinadd",
            aliases: &["addmixin"],
            usage: "mixinadd <mixin>",
            help: "add a mixin type to the current node",
            arg_completion: ArgCompletion::None,
            execute: mixin_add,
        },
        CommandDescriptor {
            name: "mixinremove",
            aliases: &["removemixin", "rmmixin", "mixindelete"],
            usage: "mixinremove <mixin>",
            help: "remove a mixin type from the current node",
            arg_completion: ArgCompletion::None,
            execute: mixin_remove,
        },
        CommandDescriptor {
            name: "mixinlist",
            aliases: &["listmixins"],
            usage: "mixinlist",
            help: "list the mixin types of the current node",
            arg_completion: ArgCompletion::None,
            execute: mixin_list,
        },
    ]
}

fn node_add(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let (name, node_type) = match args {
        [_, name] => (name, DEFAULT_NODE_TYPE),
        [_, name, node_type] => (name, node_type.as_str()),
        _ => return Ok(CommandOutcome::UsageError),
    };
    let name = name.trim_end_matches('/');
    let parent = ctx.navigator.current_node()?;
    ctx.navigator.add_node(&parent, name, node_type)?;
    writeln!(ctx.out, "Node '{name}' added.")?;
    Ok(CommandOutcome::Completed)
}

fn node_remove(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() < 2 {
        return Ok(CommandOutcome::UsageError);
    }
    ctx.navigator.current_node()?;
    let mut missing = Vec::new();
    for name in &args[1..] {
        let node = match ctx.navigator.lookup(name) {
            Ok(node) => node,
            Err(err) if err.is_not_found() => {
                writeln!(ctx.out, "Node doesn't have a child node with name: {name}")?;
                missing.push(name.as_str());
                continue;
            }
            Err(err) => return Err(err),
        };
        ctx.navigator.remove_node(&node)?;
        writeln!(ctx.out, "Node '{name}' removed.")?;
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

fn node_move(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let [_, src, dest] = args else {
        return Ok(CommandOutcome::UsageError);
    };
    ctx.navigator.current_node()?;
    let node = ctx.navigator.lookup(src)?;
    let dest = ctx.navigator.absolute_path(dest)?;
    ctx.navigator.move_node(&node, &dest)?;
    writeln!(ctx.out, "Node '{}' moved to {dest}.", node.path)?;
    Ok(CommandOutcome::Completed)
}

fn node_copy(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let [_, src, dest] = args else {
        return Ok(CommandOutcome::UsageError);
    };
    ctx.navigator.current_node()?;
    let node = ctx.navigator.lookup(src)?;
    let dest = ctx.navigator.absolute_path(dest)?;
    let copy = ctx.navigator.copy_node(&node, &dest)?;
    writeln!(ctx.out, "Node '{}' copied to {}.", node.path, copy.path)?;
    Ok(CommandOutcome::Completed)
}

fn mixin_add(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let [_, mixin] = args else {
        return Ok(CommandOutcome::UsageError);
    };
    let node = ctx.navigator.current_node()?;
    ctx.navigator.add_mixin(&node, mixin)?;
    writeln!(ctx.out, "Mixin '{mixin}' added.")?;
    Ok(CommandOutcome::Completed)
}

fn mixin_remove(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let [_, mixin] = args else {
        return Ok(CommandOutcome::UsageError);
    };
    let node = ctx.navigator.current_node()?;
    ctx.navigator.remove_mixin(&node, mixin)?;
    writeln!(ctx.out, "Mixin '{mixin}' removed.")?;
    Ok(CommandOutcome::Completed)
}

fn mixin_list(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() != 1 {
        return Ok(CommandOutcome::UsageError);
    }
    let node = ctx.navigator.current_node()?;
    if node.mixins.is_empty() {
        writeln!(ctx.out, "Node has no mixins.")?;
    }
    for mixin in &node.mixins {
        writeln!(ctx.out, "{mixin}")?;
    }
    Ok(CommandOutcome::Completed)
}

//! Moving around the tree and looking at it.

use arbor_repo::{NodeId, NodeInfo};

use super::rest;
use crate::{
    ArgCompletion, CommandContext, CommandDescriptor, CommandOutcome, SessionNavigator, ShellError,
};

pub const DEFAULT_TREE_LEVELS: usize = 3;

pub fn commands() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor {
            name: "cd",
            aliases: &[],
            usage: "cd <path>|<reference property>",
            help: "change the current node; a reference property of the current node is followed",
            arg_completion: ArgCompletion::NodesThenProperties,
            execute: cd,
        },
        CommandDescriptor {
            name: "cdprev",
            aliases: &["p", "back"],
            usage: "cdprev",
            help: "swap the current node with the previous one",
            arg_completion: ArgCompletion::None,
            execute: cd_previous,
        },
        CommandDescriptor {
            name: "cduuid",
            aliases: &[],
            usage: "cduuid <uuid>",
            help: "change the current node to the node with the given identifier",
            arg_completion: ArgCompletion::None,
            execute: cd_uuid,
        },
        CommandDescriptor {
            name: "finduuid",
            aliases: &["uuid"],
            usage: "finduuid <uuid>",
            help: "print the path of the node with the given identifier",
            arg_completion: ArgCompletion::None,
            execute: find_uuid,
        },
        CommandDescriptor {
            name: "ls",
            aliases: &["dir", "nodelist"],
            usage: "ls [<path>]",
            help: "list child nodes of the current node or of <path>",
            arg_completion: ArgCompletion::Nodes,
            execute: list_nodes,
        },
        CommandDescriptor {
            name: "tree",
            aliases: &["nodetree"],
            usage: "tree [<levels>]",
            help: "print the tree below the current node, default is 3 levels deep",
            arg_completion: ArgCompletion::None,
            execute: tree,
        },
    ]
}

fn cd(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() < 2 {
        return Ok(CommandOutcome::UsageError);
    }
    ctx.navigator.try_cd(&rest(args))?;
    Ok(CommandOutcome::Completed)
}

fn cd_previous(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() != 1 {
        return Ok(CommandOutcome::UsageError);
    }
    ctx.navigator.current_node()?;
    if !ctx.navigator.cd_previous()? {
        writeln!(ctx.out, "No previous node.")?;
    }
    Ok(CommandOutcome::Completed)
}

fn parse_id(raw: &str) -> Result<NodeId, ShellError> {
    raw.parse()
        .map_err(|_| ShellError::Invalid(format!("Invalid uuid format: {raw}")))
}

fn find_by_id(navigator: &mut SessionNavigator, raw: &str) -> Result<NodeInfo, ShellError> {
    let id = parse_id(raw)?;
    navigator.ensure_connected()?;
    navigator
        .node_by_id(id)
        .map_err(|_| ShellError::NotFound(format!("UUID not found: {raw}")))
}

fn cd_uuid(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let [_, raw] = args else {
        return Ok(CommandOutcome::UsageError);
    };
    let node = find_by_id(ctx.navigator, raw)?;
    ctx.navigator.cd_by_id(node.id)?;
    Ok(CommandOutcome::Completed)
}

fn find_uuid(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let [_, raw] = args else {
        return Ok(CommandOutcome::UsageError);
    };
    let node = find_by_id(ctx.navigator, raw)?;
    writeln!(ctx.out, "Node found: {}", node.path)?;
    Ok(CommandOutcome::Completed)
}

fn list_nodes(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let current = ctx.navigator.current_node()?;
    let node = if args.len() > 1 {
        ctx.navigator.resolve_path(&rest(args))?
    } else {
        current
    };

    let children = ctx.navigator.children(&node)?;
    writeln!(ctx.out, "{:<40}{}", "Name", "Type")?;
    writeln!(ctx.out, "{:<40}{}", "--------------------", "--------------------")?;
    for child in &children {
        writeln!(ctx.out, "{:<40}{}", child.name, child.primary_type)?;
    }
    writeln!(ctx.out, "{:<40}{}", "--------------------", "--------------------")?;
    writeln!(ctx.out, "Total: {}", children.len())?;
    Ok(CommandOutcome::Completed)
}

fn tree(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let levels = match args {
        [_] => DEFAULT_TREE_LEVELS,
        [_, levels] => match levels.parse() {
            Ok(levels) => levels,
            Err(_) => return Ok(CommandOutcome::UsageError),
        },
        _ => return Ok(CommandOutcome::UsageError),
    };
    let node = ctx.navigator.current_node()?;
    writeln!(ctx.out, "{} {{{}}}", node.name, node.primary_type)?;
    let mut prefix = String::new();
    print_children(ctx, &node, levels, &mut prefix)?;
    Ok(CommandOutcome::Completed)
}

fn print_children(
    ctx: &mut CommandContext<'_>,
    node: &NodeInfo,
    levels_left: usize,
    prefix: &mut String,
) -> Result<(), ShellError> {
    if levels_left == 0 {
        return Ok(());
    }
    let children = ctx.navigator.children(node)?;
    let count = children.len();
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == count;
        let branch = if last { "`--" } else { "|--" };
        writeln!(
            ctx.out,
            "{prefix}{branch}{} {{{}}}",
            child.name, child.primary_type
        )?;
        prefix.push_str(if last { "   " } else { "|  " });
        print_children(ctx, child, levels_left - 1, prefix)?;
        prefix.truncate(prefix.len() - 3);
    }
    Ok(())
}

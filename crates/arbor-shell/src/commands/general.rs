use crate::{ArgCompletion, CommandContext, CommandDescriptor, CommandOutcome, ShellError};

const RULE: &str = "--------------------";

pub fn commands() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor {
            name: "help",
            aliases: &["?", "commands"],
            usage: "help [<command>]",
            help: "print the list of commands, or usage and help of one command",
            arg_completion: ArgCompletion::None,
            execute: help,
        },
        CommandDescriptor {
            name: "aliases",
            aliases: &[],
            usage: "aliases",
            help: "list commands together with their aliases",
            arg_completion: ArgCompletion::None,
            execute: aliases,
        },
        CommandDescriptor {
            name: "exit",
            aliases: &["quit", "bye"],
            usage: "exit",
            help: "log out and leave the shell",
            arg_completion: ArgCompletion::None,
            execute: exit,
        },
    ]
}

fn help(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    match args {
        [_] => {
            writeln!(ctx.out, "{:<20}{}", "Command", "Usage")?;
            writeln!(ctx.out, "{:<20}{}", "--------------", RULE)?;
            for descriptor in ctx.registry.list() {
                writeln!(ctx.out, "{:<20}{}", descriptor.name, descriptor.usage)?;
            }
            writeln!(ctx.out, "{:<20}{}", "--------------", RULE)?;
            Ok(CommandOutcome::Completed)
        }
        [_, command] => {
            let token = command.to_lowercase();
            let descriptor = ctx
                .registry
                .resolve(&token)
                .ok_or_else(|| ShellError::NotFound(format!("Unknown command: {token}")))?;
            writeln!(ctx.out, "Usage: {}", descriptor.usage)?;
            writeln!(ctx.out, "   {}", descriptor.help)?;
            if !descriptor.aliases.is_empty() {
                writeln!(ctx.out, "   aliases: {}", descriptor.aliases.join(", "))?;
            }
            Ok(CommandOutcome::Completed)
        }
        _ => Ok(CommandOutcome::UsageError),
    }
}

fn aliases(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() != 1 {
        return Ok(CommandOutcome::UsageError);
    }
    writeln!(ctx.out, "{:<20}{}", "Command", "Aliases")?;
    writeln!(ctx.out, "{:<20}{}", "--------------", RULE)?;
    for descriptor in ctx.registry.list().filter(|d| !d.aliases.is_empty()) {
        let mut aliases = descriptor.aliases.to_vec();
        aliases.sort_unstable();
        writeln!(ctx.out, "{:<20}{}", descriptor.name, aliases.join(", "))?;
    }
    writeln!(ctx.out, "{:<20}{}", "--------------", RULE)?;
    Ok(CommandOutcome::Completed)
}

fn exit(_ctx: &mut CommandContext<'_>, _args: &[String]) -> Result<CommandOutcome, ShellError> {
    Ok(CommandOutcome::Shutdown)
}

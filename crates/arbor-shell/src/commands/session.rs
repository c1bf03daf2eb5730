//! Connection and session commands.

use arbor_repo::Credentials;

use crate::{ArgCompletion, CommandContext, CommandDescriptor, CommandOutcome, ShellError};

pub fn commands() -> Vec<CommandDescriptor> {
    vec![
        CommandDescriptor {
            name: "login",
            aliases: &[],
            usage: "login [<workspace>]",
            help: "log in to the server, see also server and credentials",
            arg_completion: ArgCompletion::None,
            execute: login,
        },
        CommandDescriptor {
            name: "logout",
            aliases: &["logoff"],
            usage: "logout",
            help: "log out of the server",
            arg_completion: ArgCompletion::None,
            execute: logout,
        },
        CommandDescriptor {
            name: "server",
            aliases: &[],
            usage: "server [<location>]",
            help: "show the current server or set the repository location to connect to",
            arg_completion: ArgCompletion::None,
            execute: server,
        },
        CommandDescriptor {
            name: "credentials",
            aliases: &["username"],
            usage: "credentials <user> [<password>]",
            help: "set the credentials used at the next login",
            arg_completion: ArgCompletion::None,
            execute: credentials,
        },
        CommandDescriptor {
            name: "status",
            aliases: &["info"],
            usage: "status",
            help: "show server and connection status",
            arg_completion: ArgCompletion::None,
            execute: status,
        },
        CommandDescriptor {
            name: "save",
            aliases: &["sessionsave"],
            usage: "save",
            help: "persist all pending changes of the session",
            arg_completion: ArgCompletion::None,
            execute: save,
        },
        CommandDescriptor {
            name: "reset",
            aliases: &["refresh"],
            usage: "reset",
            help: "refresh the session, discarding unsaved changes",
            arg_completion: ArgCompletion::None,
            execute: reset,
        },
    ]
}

fn login(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    match args {
        [_] => ctx.navigator.logout(),
        [_, workspace] => ctx.navigator.set_workspace(Some(workspace.clone())),
        _ => return Ok(CommandOutcome::UsageError),
    }
    if !ctx.navigator.connect() {
        let reason = ctx
            .navigator
            .take_last_error()
            .unwrap_or_else(|| "login failed".to_string());
        return Err(ShellError::NotConnected(reason));
    }
    let node = ctx.navigator.current_node()?;
    writeln!(
        ctx.out,
        "Logged in to {} as {} at {}",
        ctx.navigator.server(),
        ctx.navigator.username(),
        node.path
    )?;
    Ok(CommandOutcome::Completed)
}

fn logout(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() != 1 {
        return Ok(CommandOutcome::UsageError);
    }
    let was_connected = ctx.navigator.is_connected();
    ctx.navigator.logout();
    if was_connected {
        writeln!(ctx.out, "Logged out.")?;
    } else {
        writeln!(ctx.out, "Not logged in.")?;
    }
    Ok(CommandOutcome::Completed)
}

fn server(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    match args {
        [_] => writeln!(ctx.out, "Current server: {}", ctx.navigator.server())?,
        [_, location] => {
            ctx.navigator.set_server(location.clone());
            writeln!(ctx.out, "Server set to {location}. Use login to connect.")?;
        }
        _ => return Ok(CommandOutcome::UsageError),
    }
    Ok(CommandOutcome::Completed)
}

fn credentials(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    let (user, password) = match args {
        [_, user] => (user, ""),
        [_, user, password] => (user, password.as_str()),
        _ => return Ok(CommandOutcome::UsageError),
    };
    ctx.navigator
        .set_credentials(Credentials::new(user.clone(), password));
    writeln!(ctx.out, "Credentials set for user {user}.")?;
    Ok(CommandOutcome::Completed)
}

fn status(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() != 1 {
        return Ok(CommandOutcome::UsageError);
    }
    for line in ctx.navigator.status_lines() {
        writeln!(ctx.out, "{line}")?;
    }
    Ok(CommandOutcome::Completed)
}

fn save(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() != 1 {
        return Ok(CommandOutcome::UsageError);
    }
    ctx.navigator.ensure_connected()?;
    ctx.navigator.save()?;
    writeln!(ctx.out, "Session saved.")?;
    Ok(CommandOutcome::Completed)
}

fn reset(ctx: &mut CommandContext<'_>, args: &[String]) -> Result<CommandOutcome, ShellError> {
    if args.len() != 1 {
        return Ok(CommandOutcome::UsageError);
    }
    ctx.navigator.ensure_connected()?;
    ctx.navigator.refresh(false)?;
    writeln!(ctx.out, "Session refreshed without keeping changes.")?;
    Ok(CommandOutcome::Completed)
}

//! The `core` module: introspection, reload and a few basic commands.

use std::sync::{Arc, Weak};

use anyhow::{anyhow, bail};

use super::{Module, ModuleContext, ModuleLoader};
use crate::command::{ArgHint, CommandBuilder, CommandRegistry, Invocation, Param, Reply, TypeHint};

/// Largest reply `repeat` will build.
const MAX_REPEAT_BYTES: usize = 64 * 1024;

pub struct CoreModule;

impl Module for CoreModule {
    fn name(&self) -> &str {
        "core"
    }

    fn commands(&self, ctx: &ModuleContext) -> Vec<CommandBuilder> {
        vec![
            list(ctx.registry.clone()),
            help(ctx.registry.clone()),
            reload(ctx.loader.clone(), ctx.admins.clone()),
            echo(),
            repeat(),
            whoami(),
            ping(),
        ]
    }
}

fn upgrade(registry: &Weak<CommandRegistry>) -> anyhow::Result<Arc<CommandRegistry>> {
    registry.upgrade().ok_or_else(|| anyhow!("command registry is gone"))
}

/// Every group with its commands, one command per line.
pub fn listing(registry: &CommandRegistry) -> String {
    let mut out = String::new();
    let mut current: Option<String> = None;
    for (group, desc) in registry.list() {
        if current.as_deref() != Some(group.as_str()) {
            out.push_str(&group.to_uppercase());
            out.push('\n');
            current = Some(group);
        }
        match desc.description() {
            Some(d) => out.push_str(&format!("\t{}: {}\n", desc.name(), d)),
            None => out.push_str(&format!("\t{}\n", desc.name())),
        }
    }
    out.trim_end().to_string()
}

fn list(registry: Weak<CommandRegistry>) -> CommandBuilder {
    CommandBuilder::new("list")
        .doc("lists all registered commands.")
        .run(move |inv: &mut Invocation| {
            let registry = upgrade(&registry)?;
            inv.println(&listing(&registry));
            Ok(Reply::Nothing)
        })
}

fn help(registry: Weak<CommandRegistry>) -> CommandBuilder {
    CommandBuilder::new("help")
        .doc("shows the usage of a command.")
        .param(Param::new("command").default(""))
        .arg(ArgHint::positional("command").help("command to describe"))
        .run(move |inv: &mut Invocation| {
            let registry = upgrade(&registry)?;
            let name = inv.str("command").unwrap_or_default().to_string();
            if name.is_empty() {
                inv.println(&listing(&registry));
                return Ok(Reply::Help);
            }

            let Some(desc) = registry.lookup_exact(&name) else {
                inv.println(&format!("no function {} found", name));
                return Ok(Reply::Nothing);
            };
            inv.println(&desc.parser().help());
            Ok(Reply::Help)
        })
}

fn reload(loader: Weak<ModuleLoader>, admins: Vec<String>) -> CommandBuilder {
    CommandBuilder::new("reload")
        .doc("reloads a module.")
        .param(Param::new("user").hint(TypeHint::Identity))
        .param(Param::new("module"))
        .inject_identity("user")
        .run(move |inv: &mut Invocation| {
            let authorized = inv
                .identity()
                .map_or(false, |id| admins.iter().any(|a| a == &id.username));
            if !authorized {
                return Ok(Reply::from("not authorized"));
            }

            let module = inv.str("module").unwrap_or_default().to_string();
            let loader = loader.upgrade().ok_or_else(|| anyhow!("module loader is gone"))?;
            let count = loader.reload(&module)?;
            Ok(Reply::Text(format!("reloaded {} ({} commands)", module, count)))
        })
}

fn echo() -> CommandBuilder {
    CommandBuilder::new("echo")
        .doc("repeats the given text.")
        .param(Param::new("text").hint(TypeHint::Str))
        .run(|inv: &mut Invocation| Ok(Reply::from(inv.str("text").unwrap_or_default())))
}

fn repeat() -> CommandBuilder {
    CommandBuilder::new("repeat")
        .doc("repeats the given text a number of times.")
        .param(Param::new("text").hint(TypeHint::Str))
        .param(Param::new("times").hint(TypeHint::Int))
        .arg(ArgHint::optional("times").short('n').help("how often"))
        .run(|inv: &mut Invocation| {
            let text = inv.str("text").unwrap_or_default();
            let times = inv.int("times").unwrap_or(1);
            let count = usize::try_from(times)
                .map_err(|_| anyhow!("times must not be negative, got {}", times))?;

            let size = text.len().saturating_add(1).saturating_mul(count);
            if size > MAX_REPEAT_BYTES {
                bail!(
                    "output of {} repetitions exceeds the limit of {} bytes",
                    times,
                    MAX_REPEAT_BYTES
                );
            }
            let words = vec![text; count];
            Ok(Reply::Text(words.join(" ")))
        })
}

fn whoami() -> CommandBuilder {
    CommandBuilder::new("whoami")
        .doc("shows who the bot thinks you are.")
        .param(Param::new("context").hint(TypeHint::Context))
        .param(Param::new("user").hint(TypeHint::Identity))
        .inject_context("context")
        .inject_identity("user")
        .run(|inv: &mut Invocation| {
            let Some(message) = inv.context().and_then(|c| c.message.as_ref()) else {
                return Ok(Reply::from("no message context"));
            };
            let nick = message.username.as_deref().unwrap_or("unknown");
            let account = message.account.as_deref().unwrap_or("unknown");
            let text = match inv.identity() {
                Some(id) => format!("{} on {} is {}", nick, account, id.username),
                None => format!("{} on {} is not identified", nick, account),
            };
            Ok(Reply::Text(text))
        })
}

fn ping() -> CommandBuilder {
    CommandBuilder::new("ping")
        .doc("answers ping with pong.")
        .pattern("(?i)ping")
        .run(|_: &mut Invocation| Ok(Reply::from("pong")))
}

/*!
registry.rs - command table built from provider modules.

Each provider exposes a static table of `Builtin { name, summary, run }`
entries; the user provider file contributes endpoint commands at startup.
`Registry::build` merges providers in order and fails on the first name two
providers share.

Names are canonical with underscores (`show_tags`). Dashes (`show-tags`) are
presentation only: `resolve` and `contains` accept either form, `directory`
renders either form.

Entries whose name starts with `_` are private and never registered.
*/

use serde_json::Value;
use std::collections::BTreeMap;

use crate::cmd::args::InvocationArgs;
use crate::cmd::context::RunContext;
use crate::cmd::local::EndpointCommand;
use crate::error::Error;

pub const NO_DESCRIPTION: &str = "(no description)";

/// Lazy single-pass sequence of output records.
pub type Records<'a> = Box<dyn Iterator<Item = anyhow::Result<Value>> + 'a>;

/// What a handler hands back to the dispatcher.
pub enum Outcome<'a> {
    /// Side effects only; nothing to emit.
    Done,
    Records(Records<'a>),
}

impl<'a> Outcome<'a> {
    pub fn records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = anyhow::Result<Value>>,
        I::IntoIter: 'a,
    {
        Outcome::Records(Box::new(records.into_iter()))
    }

    pub fn one(value: Value) -> Self {
        Outcome::records(std::iter::once(Ok(value)))
    }
}

pub type HandlerFn =
    for<'a> fn(&'a RunContext, &'a InvocationArgs) -> anyhow::Result<Outcome<'a>>;

/// Static registration entry of a built-in provider.
pub struct Builtin {
    pub name: &'static str,
    pub summary: &'static str,
    pub run: HandlerFn,
}

pub enum Handler {
    Builtin(HandlerFn),
    Endpoint(EndpointCommand),
}

impl Handler {
    pub fn invoke<'a>(
        &'a self,
        ctx: &'a RunContext,
        args: &'a InvocationArgs,
    ) -> anyhow::Result<Outcome<'a>> {
        match self {
            Handler::Builtin(run) => run(ctx, args),
            Handler::Endpoint(command) => command.run(ctx, args),
        }
    }
}

pub struct CommandDescriptor {
    pub module: String,
    pub name: String,
    pub summary: String,
    pub handler: Handler,
}

impl CommandDescriptor {
    pub fn new(module: &str, name: &str, summary: &str, handler: Handler) -> Self {
        Self {
            module: module.to_string(),
            name: to_underscore(name),
            summary: one_line(summary),
            handler,
        }
    }
}

/// A named group of commands (one provider module).
pub struct Provider {
    pub module: String,
    pub commands: Vec<CommandDescriptor>,
}

impl Provider {
    pub fn builtin(module: &str, table: &[Builtin]) -> Self {
        Self {
            module: module.to_string(),
            commands: table
                .iter()
                .map(|b| CommandDescriptor::new(module, b.name, b.summary, Handler::Builtin(b.run)))
                .collect(),
        }
    }
}

/// One line of the command directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub module: String,
    pub name: String,
    pub summary: String,
}

#[derive(Default)]
pub struct Registry {
    commands: BTreeMap<String, CommandDescriptor>,
}

impl Registry {
    pub fn build(providers: impl IntoIterator<Item = Provider>) -> Result<Self, Error> {
        let mut registry = Registry::default();
        for provider in providers {
            registry.merge(provider)?;
        }
        Ok(registry)
    }

    /// Add one provider's public commands, rejecting names already taken.
    pub fn merge(&mut self, provider: Provider) -> Result<(), Error> {
        for command in provider.commands {
            if command.name.starts_with('_') {
                continue;
            }
            if let Some(existing) = self.commands.get(&command.name) {
                return Err(Error::DuplicateCommand {
                    name: command.name.clone(),
                    first: existing.module.clone(),
                    second: provider.module.clone(),
                });
            }
            self.commands.insert(command.name.clone(), command);
        }
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&CommandDescriptor, Error> {
        self.commands
            .get(&to_underscore(name))
            .ok_or_else(|| Error::UnknownCommand(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(&to_underscore(name))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Commands sorted by (module, name).
    pub fn directory(&self, use_dashes: bool) -> Vec<DirectoryEntry> {
        let mut entries: Vec<DirectoryEntry> = self
            .commands
            .values()
            .map(|c| DirectoryEntry {
                module: c.module.clone(),
                name: if use_dashes {
                    to_dash(&c.name)
                } else {
                    c.name.clone()
                },
                summary: c.summary.clone(),
            })
            .collect();
        entries.sort_by(|a, b| (&a.module, &a.name).cmp(&(&b.module, &b.name)));
        entries
    }

    pub fn names(&self, use_dashes: bool) -> Vec<String> {
        self.directory(use_dashes)
            .into_iter()
            .map(|e| e.name)
            .collect()
    }
}

pub fn to_dash(name: &str) -> String {
    name.replace('_', "-")
}

pub fn to_underscore(name: &str) -> String {
    name.replace('-', "_")
}

/// First non-blank line of a description, whitespace collapsed.
pub fn one_line(doc: &str) -> String {
    doc.lines()
        .map(|l| l.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|l| !l.is_empty())
        .unwrap_or_else(|| NO_DESCRIPTION.to_string())
}

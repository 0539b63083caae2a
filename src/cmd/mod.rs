/*!
Command plumbing and the built-in command providers.

Plumbing:
  args.rs       (InvocationArgs: env < `-a key=value` < reserved flags)
  input.rs      (newline-delimited JSON from stdin, read lazily)
  format.rs     (Format + Sink: one JSON/YAML unit per record, flushed)
  context.rs    (RunContext: api, repository, sink, input, config)
  registry.rs   (Registry: provider tables -> unique command names)
  dispatch.rs   (resolve, invoke, stream records to the sink)
  shared.rs     (status records, stdin name loops, field lookup)

Providers (module name = provider name in the directory):
  repo.rs       (tags, branches, refs, pull requests, releases, ...)
  users.rs      (show / search users)
  general.rs    (rate limit, emojis, octocat, zen)
  team.rs       (organization teams)
  authors.rs    (assemble-authors)
  local.rs      (`ghizmo-commands.yml` endpoint commands)

Conventions:
  - A provider exposes one `COMMANDS: &[Builtin]` table.
  - Handlers return `anyhow::Result<Outcome>`; records are produced lazily
    so output appears while later API pages are still being fetched.
  - Handlers that mutate state honor `dry_run` and return `status` records.
*/

use anyhow::Result;
use std::path::Path;

pub mod args;
pub mod context;
pub mod dispatch;
pub mod format;
pub mod input;
pub mod local;
pub mod registry;
pub mod shared;

pub mod authors;
pub mod general;
pub mod repo;
pub mod team;
pub mod users;

use registry::{Provider, Registry};

/// Built-in providers in registration order.
pub fn builtin_providers() -> Vec<Provider> {
    vec![
        Provider::builtin("repo", repo::COMMANDS),
        Provider::builtin("users", users::COMMANDS),
        Provider::builtin("general", general::COMMANDS),
        Provider::builtin("team", team::COMMANDS),
        Provider::builtin("authors", authors::COMMANDS),
    ]
}

/// Built-ins plus the user provider file found in `cwd`, if any.
pub fn build_registry(cwd: &Path) -> Result<Registry> {
    let mut registry = Registry::build(builtin_providers())?;
    if let Some(provider) = local::load_provider(cwd)? {
        registry.merge(provider)?;
    }
    Ok(registry)
}

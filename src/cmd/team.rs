//! Organization teams.

use anyhow::Result;

use crate::cmd::args::InvocationArgs;
use crate::cmd::context::RunContext;
use crate::cmd::registry::{Builtin, Outcome};
use crate::github::Endpoint;

pub const COMMANDS: &[Builtin] = &[Builtin {
    name: "teams",
    summary: "List teams in a given organization (-a org_name=...).",
    run: teams,
}];

fn teams<'a>(ctx: &'a RunContext, args: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let org = args.get("org_name")?;
    Ok(Outcome::Records(
        ctx.api().list(Endpoint::new(["orgs", org, "teams"])),
    ))
}

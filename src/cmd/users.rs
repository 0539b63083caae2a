//! User commands: lookups by login and user search.

use anyhow::Result;

use crate::cmd::args::InvocationArgs;
use crate::cmd::context::RunContext;
use crate::cmd::registry::{Builtin, Outcome};
use crate::cmd::shared::{each_input_name, require};
use crate::github::Endpoint;

pub const COMMANDS: &[Builtin] = &[
    Builtin {
        name: "show_users",
        summary: "Show user info for usernames supplied on stdin.",
        run: show_users,
    },
    Builtin {
        name: "search_users",
        summary: "Search for users (-a query=... [sort, order, per_page, number]).",
        run: search_users,
    },
];

fn show_users<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let api = ctx.api();
    Ok(each_input_name(ctx, "login", move |login| {
        require(api.get(&Endpoint::new(["users", login.as_str()]))?, "User", &login)
    }))
}

fn search_users<'a>(ctx: &'a RunContext, args: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let mut endpoint = Endpoint::new(["search", "users"]).query("q", args.get("query")?);
    for key in ["sort", "order", "per_page"] {
        if let Some(value) = args.opt(key) {
            endpoint = endpoint.query(key, value);
        }
    }
    // validate before the first request
    args.get_int_opt("per_page")?;
    let users = ctx.api().list(endpoint);
    Ok(match args.get_int_opt("number")? {
        Some(n) => Outcome::records(users.take(n as usize)),
        None => Outcome::Records(users),
    })
}

/*!
`repo.rs`

Repository commands: tags, branches, refs, pull requests, contributors,
collaborators, releases.

Query commands stream one record per resource in API order. Commands
reading stdin expect one JSON string per line (a tag, branch or ref name).
`delete-*` commands honor `--dry-run` (look up, log, but do not delete) and
`--force` (a missing target yields a status record instead of failing).
*/

use anyhow::Result;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::cmd::args::InvocationArgs;
use crate::cmd::context::RunContext;
use crate::cmd::registry::{Builtin, Outcome};
use crate::cmd::shared::{each_input_name, field, require, status};
use crate::error::Error;
use crate::github::Repo;

pub const COMMANDS: &[Builtin] = &[
    Builtin {
        name: "tags",
        summary: "List all tags.",
        run: tags,
    },
    Builtin {
        name: "show_tags",
        summary: "Show info for tags supplied on stdin.",
        run: show_tags,
    },
    Builtin {
        name: "branches",
        summary: "List all branches.",
        run: branches,
    },
    Builtin {
        name: "branches_full",
        summary: "List full info about all branches.",
        run: branches_full,
    },
    Builtin {
        name: "show_branches",
        summary: "Show branches supplied on stdin.",
        run: show_branches,
    },
    Builtin {
        name: "delete_branches",
        summary: "Delete branches supplied on stdin.",
        run: delete_branches,
    },
    Builtin {
        name: "refs",
        summary: "List all refs.",
        run: refs,
    },
    Builtin {
        name: "show_refs",
        summary: "Show refs supplied on stdin.",
        run: show_refs,
    },
    Builtin {
        name: "delete_refs",
        summary: "Delete refs supplied on stdin.",
        run: delete_refs,
    },
    Builtin {
        name: "pull_requests",
        summary: "List all PRs (--state open|closed|all, default open).",
        run: pull_requests,
    },
    Builtin {
        name: "stale_pr_branches",
        summary: "List branches of closed PRs from this repository that still exist.",
        run: stale_pr_branches,
    },
    Builtin {
        name: "contributors",
        summary: "List all contributors.",
        run: contributors,
    },
    Builtin {
        name: "collaborators",
        summary: "List all collaborators.",
        run: collaborators,
    },
    Builtin {
        name: "releases",
        summary: "List all releases.",
        run: releases,
    },
    Builtin {
        name: "create_release",
        summary: "Create a new release (-a tag_name=... [name, target_commitish, body, draft, prerelease]).",
        run: create_release,
    },
];

/* ---- Tags ---- */

fn tags<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    Ok(Outcome::Records(ctx.repo()?.tags()))
}

fn show_tags<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let repo = ctx.repo()?;
    Ok(each_input_name(ctx, "tag", move |name| {
        require(repo.tag(&name)?, "Tag", &name)
    }))
}

/* ---- Branches ---- */

fn branches<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    Ok(Outcome::Records(ctx.repo()?.branches()))
}

fn branches_full<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let repo = ctx.repo()?;
    Ok(Outcome::records(repo.branches().map(move |branch| {
        let branch = branch?;
        let name = field(&branch, "name")
            .ok_or_else(|| Error::Decode(format!("branch without a name: {branch}")))?;
        require(repo.branch(name)?, "Branch", name)
    })))
}

fn show_branches<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let repo = ctx.repo()?;
    Ok(each_input_name(ctx, "branch", move |name| {
        require(repo.branch(&name)?, "Branch", &name)
    }))
}

fn delete_branches<'a>(ctx: &'a RunContext, args: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let repo = ctx.repo()?;
    let (force, dry_run) = (args.force()?, args.dry_run()?);
    Ok(each_input_name(ctx, "branch", move |name| {
        delete_ref(repo, &format!("heads/{name}"), force, dry_run)
    }))
}

/* ---- Refs ---- */

fn refs<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    Ok(Outcome::Records(ctx.repo()?.refs()))
}

fn show_refs<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let repo = ctx.repo()?;
    Ok(each_input_name(ctx, "ref", move |name| {
        require(repo.ref_(&name)?, "Reference", &name)
    }))
}

fn delete_refs<'a>(ctx: &'a RunContext, args: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let repo = ctx.repo()?;
    let (force, dry_run) = (args.force()?, args.dry_run()?);
    Ok(each_input_name(ctx, "ref", move |name| {
        delete_ref(repo, &name, force, dry_run)
    }))
}

fn delete_ref(repo: Repo<'_>, ref_name: &str, force: bool, dry_run: bool) -> Result<Value> {
    if repo.ref_(ref_name)?.is_none() {
        if !force {
            return Err(Error::NotFound("Reference", ref_name.to_string()).into());
        }
        warn!("Reference not found, skipping: {ref_name}");
        return Ok(status(format!("Skipped missing {ref_name}"), dry_run));
    }
    if dry_run {
        warn!("Delete reference (dry run): {ref_name}");
    } else {
        warn!("Delete reference: {ref_name}");
        repo.delete_ref(ref_name)?;
    }
    Ok(status(format!("Deleted {ref_name}"), dry_run))
}

/* ---- Pull requests ---- */

fn pull_requests<'a>(ctx: &'a RunContext, args: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let state = args.get_or("state", "open");
    Ok(Outcome::Records(ctx.repo()?.pull_requests(state)))
}

fn stale_pr_branches<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let repo = ctx.repo()?;
    Ok(Outcome::records(
        repo.pull_requests("closed")
            .map(move |pr| stale_branch(repo, &pr?))
            .filter_map(Result::transpose),
    ))
}

/// A closed PR's head branch is stale when it lives in the base repository
/// (not a fork) and still exists.
fn stale_branch(repo: Repo<'_>, pr: &Value) -> Result<Option<Value>> {
    let head_repo = field(pr, "head/repo/full_name");
    let base_repo = field(pr, "base/repo/full_name");
    let (Some(head_repo), Some(base_repo), Some(head_ref)) =
        (head_repo, base_repo, field(pr, "head/ref"))
    else {
        return Ok(None);
    };
    if head_repo != base_repo || repo.branch(head_ref)?.is_none() {
        return Ok(None);
    }
    info!("Stale branch: {head_ref}");
    Ok(Some(json!({
        "html_url": field(pr, "html_url"),
        "base_branch": field(pr, "base/ref"),
        "head_branch": head_ref,
    })))
}

/* ---- People ---- */

fn contributors<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    Ok(Outcome::Records(ctx.repo()?.contributors()))
}

fn collaborators<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    Ok(Outcome::Records(ctx.repo()?.collaborators()))
}

/* ---- Releases ---- */

fn releases<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    Ok(Outcome::Records(ctx.repo()?.releases()))
}

fn create_release<'a>(ctx: &'a RunContext, args: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let repo = ctx.repo()?;
    let tag_name = args.get("tag_name")?;
    let mut body = json!({
        "tag_name": tag_name,
        "draft": args.get_bool_or("draft", false)?,
        "prerelease": args.get_bool_or("prerelease", false)?,
    });
    for key in ["name", "target_commitish", "body"] {
        if let Some(value) = args.opt(key) {
            body[key] = json!(value);
        }
    }
    if args.dry_run()? {
        warn!("Create release (dry run): {tag_name}");
        return Ok(Outcome::one(status(format!("Created release {tag_name}"), true)));
    }
    warn!("Create release: {tag_name}");
    Ok(Outcome::one(repo.create_release(&body)?))
}

//! Account-independent API information.

use anyhow::Result;
use serde_json::Value;

use crate::cmd::args::InvocationArgs;
use crate::cmd::context::RunContext;
use crate::cmd::registry::{Builtin, Outcome};
use crate::cmd::shared::require;
use crate::github::Endpoint;

pub const COMMANDS: &[Builtin] = &[
    Builtin {
        name: "rate_limit",
        summary: "Current rate limit information.",
        run: rate_limit,
    },
    Builtin {
        name: "emojis",
        summary: "List available emojis.",
        run: emojis,
    },
    Builtin {
        name: "octocat",
        summary: "Easter egg (-a say=...).",
        run: octocat,
    },
    Builtin {
        name: "zen",
        summary: "Easter egg.",
        run: zen,
    },
];

fn rate_limit<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let limits = ctx.api().get(&Endpoint::new(["rate_limit"]))?;
    Ok(Outcome::one(require(limits, "Resource", "rate_limit")?))
}

fn emojis<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let emojis = ctx.api().get(&Endpoint::new(["emojis"]))?;
    Ok(Outcome::one(require(emojis, "Resource", "emojis")?))
}

fn octocat<'a>(ctx: &'a RunContext, args: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let mut endpoint = Endpoint::new(["octocat"]);
    if let Some(say) = args.opt("say") {
        endpoint = endpoint.query("s", say);
    }
    Ok(Outcome::one(Value::String(ctx.api().get_text(&endpoint)?)))
}

fn zen<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    let text = ctx.api().get_text(&Endpoint::new(["zen"]))?;
    Ok(Outcome::one(Value::String(text)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::context::tests::Harness;
    use crate::cmd::dispatch;
    use crate::cmd::registry::{Provider, Registry};
    use crate::github::fake::FakeApi;
    use serde_json::json;

    fn registry() -> Registry {
        Registry::build([Provider::builtin("general", COMMANDS)]).unwrap()
    }

    #[test]
    fn zen_is_a_json_string() {
        let api = FakeApi::default().with_text("zen", "Keep it logically awesome.");
        let h = Harness::new(api, "");
        dispatch::run(&registry(), "zen", &h.ctx, &InvocationArgs::default()).unwrap();
        assert_eq!(h.out.text(), "\"Keep it logically awesome.\"\n");
    }

    #[test]
    fn octocat_passes_say() {
        let api = FakeApi::default().with_text("octocat?s=hi", "MMM hi MMM");
        let h = Harness::new(api, "");
        let args = InvocationArgs::from_pairs([("say", "hi")]);
        dispatch::run(&registry(), "octocat", &h.ctx, &args).unwrap();
        assert_eq!(h.records(), vec![json!("MMM hi MMM")]);
    }

    #[test]
    fn rate_limit_missing_is_an_error() {
        let h = Harness::new(FakeApi::default(), "");
        assert!(dispatch::run(&registry(), "rate-limit", &h.ctx, &InvocationArgs::default()).is_err());
    }
}

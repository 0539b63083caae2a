/*!
shared.rs - helpers shared by command providers.

Focus:
  - status(): the `{message, dry_run}` record mutating handlers yield
  - require(): absent resource -> decode error naming what was asked for
  - each_input_name(): one unit of work + one record per stdin item, or
    nothing at all when stdin is empty
  - field(): string field lookup on a resource mapping
*/

use anyhow::Result;
use serde_json::{Value, json};
use tracing::info;

use crate::cmd::context::RunContext;
use crate::cmd::input::expect_name;
use crate::cmd::registry::Outcome;
use crate::error::Error;

/* ---- Records ---- */

pub fn status(message: impl Into<String>, dry_run: bool) -> Value {
    json!({ "message": message.into(), "dry_run": dry_run })
}

/// Turn an absent resource into an error instead of an emitted `null`.
pub fn require(resource: Option<Value>, kind: &str, name: &str) -> Result<Value> {
    resource.ok_or_else(|| Error::Decode(format!("{kind} not found: {name}")).into())
}

/* ---- Input processing ---- */

/// Apply `f` to every name read from stdin, one output record per item.
/// Empty input is `Outcome::Done`: there is no work and nothing to emit.
pub fn each_input_name<'a, F>(ctx: &'a RunContext, what: &'static str, mut f: F) -> Outcome<'a>
where
    F: FnMut(String) -> Result<Value> + 'a,
{
    let mut lines = ctx.input.lines().peekable();
    if lines.peek().is_none() {
        info!("No {what} names on input");
        return Outcome::Done;
    }
    Outcome::records(lines.map(move |item| {
        let name = expect_name(&item?, what)?;
        f(name)
    }))
}

/* ---- Resource fields ---- */

/// String at a `/`-separated path inside a resource (`head/repo/full_name`).
pub fn field<'v>(value: &'v Value, path: &str) -> Option<&'v str> {
    path.split('/')
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
}

/* ---- Tests ---- */
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::context::tests::Harness;
    use crate::github::fake::FakeApi;

    #[test]
    fn status_shape() {
        assert_eq!(
            status("Deleted heads/x", true),
            json!({"message": "Deleted heads/x", "dry_run": true})
        );
    }

    #[test]
    fn require_names_missing_resource() {
        assert_eq!(require(Some(json!({"a": 1})), "Tag", "v1").unwrap(), json!({"a": 1}));
        let err = require(None, "Tag", "v1.0").unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Decode(_))));
        assert_eq!(err.to_string(), "Tag not found: v1.0");
    }

    #[test]
    fn field_walks_nested_paths() {
        let pr = json!({"head": {"ref": "feat", "repo": {"full_name": "o/r"}}});
        assert_eq!(field(&pr, "head/ref"), Some("feat"));
        assert_eq!(field(&pr, "head/repo/full_name"), Some("o/r"));
        assert_eq!(field(&pr, "base/ref"), None);
    }

    #[test]
    fn each_input_name_maps_items() {
        let h = Harness::new(FakeApi::default(), "\"a\"\n\"b\"\n");
        let Outcome::Records(records) =
            each_input_name(&h.ctx, "name", |n| Ok(json!(n.to_uppercase())))
        else {
            panic!("expected records");
        };
        let got: Vec<Value> = records.map(|r| r.unwrap()).collect();
        assert_eq!(got, vec![json!("A"), json!("B")]);
    }

    #[test]
    fn each_input_name_on_empty_input_is_done() {
        let h = Harness::new(FakeApi::default(), "\n  \n");
        let outcome = each_input_name(&h.ctx, "name", |_| -> Result<Value> {
            panic!("no item to process")
        });
        assert!(matches!(outcome, Outcome::Done));
    }
}

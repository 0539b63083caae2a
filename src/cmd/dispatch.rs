/*!
dispatch.rs - run one command by name.

Records are pulled from the handler one at a time and written to the sink
before the next one is requested. A failure partway through leaves the
records already written in place and surfaces after the last one.
*/

use anyhow::Result;
use tracing::{debug, info};

use crate::cmd::args::InvocationArgs;
use crate::cmd::context::RunContext;
use crate::cmd::registry::{Outcome, Registry};

/// Resolve `name`, invoke it, and stream its records. Returns the number of
/// records emitted.
pub fn run(
    registry: &Registry,
    name: &str,
    ctx: &RunContext,
    args: &InvocationArgs,
) -> Result<usize> {
    let command = registry.resolve(name)?;
    info!("Command '{}' from '{}'", command.name, command.module);
    debug!(
        "Args: {}",
        args.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ")
    );

    let records = match command.handler.invoke(ctx, args)? {
        Outcome::Done => return Ok(0),
        Outcome::Records(records) => records,
    };

    let mut emitted = 0;
    for record in records {
        ctx.sink.emit(&record?)?;
        emitted += 1;
    }
    debug!("Emitted {emitted} {} record(s)", ctx.sink.format());
    Ok(emitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::context::tests::Harness;
    use crate::cmd::format::Format;
    use crate::cmd::registry::{Builtin, Provider};
    use crate::error::Error;
    use crate::github::fake::FakeApi;
    use serde_json::{Value, json};

    fn two_then_fail<'a>(_: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
        Ok(Outcome::records(vec![
            Ok(json!({"n": 1})),
            Ok(json!({"n": 2})),
            Err(anyhow::anyhow!("boom")),
            Ok(json!({"n": 4})),
        ]))
    }

    fn nothing<'a>(_: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
        Ok(Outcome::Done)
    }

    fn echo_ignoring_input<'a>(
        ctx: &'a RunContext,
        _: &'a InvocationArgs,
    ) -> Result<Outcome<'a>> {
        Ok(Outcome::records(
            ctx.input
                .lines()
                .map(|_| Ok(json!({"key": "value", "a": [1]}))),
        ))
    }

    fn yaml_pair<'a>(_: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
        Ok(Outcome::one(json!({"a": 1, "b": 2})))
    }

    const TEST_COMMANDS: &[Builtin] = &[
        Builtin {
            name: "two_then_fail",
            summary: "",
            run: two_then_fail,
        },
        Builtin {
            name: "nothing",
            summary: "",
            run: nothing,
        },
        Builtin {
            name: "echo_ignoring_input",
            summary: "",
            run: echo_ignoring_input,
        },
        Builtin {
            name: "yaml_pair",
            summary: "",
            run: yaml_pair,
        },
    ];

    fn registry() -> Registry {
        Registry::build([Provider::builtin("test", TEST_COMMANDS)]).unwrap()
    }

    #[test]
    fn partial_output_survives_failure() {
        let h = Harness::new(FakeApi::default(), "");
        let err = run(&registry(), "two-then-fail", &h.ctx, &InvocationArgs::default()).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(h.records(), vec![json!({"n": 1}), json!({"n": 2})]);
    }

    #[test]
    fn side_effect_only_handler_emits_nothing() {
        let h = Harness::new(FakeApi::default(), "");
        let n = run(&registry(), "nothing", &h.ctx, &InvocationArgs::default()).unwrap();
        assert_eq!(n, 0);
        assert!(h.out.text().is_empty());
    }

    #[test]
    fn unknown_command_propagates() {
        let h = Harness::new(FakeApi::default(), "");
        let err = run(&registry(), "missing", &h.ctx, &InvocationArgs::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::UnknownCommand(_))
        ));
    }

    #[test]
    fn one_sorted_json_object_per_input_line() {
        let h = Harness::new(FakeApi::default(), "{\"key\":\"value\"}\n{\"key\":\"value\"}\n");
        let n = run(&registry(), "echo_ignoring_input", &h.ctx, &InvocationArgs::default()).unwrap();
        assert_eq!(n, 2);
        let one = "{\n  \"a\": [\n    1\n  ],\n  \"key\": \"value\"\n}\n";
        assert_eq!(h.out.text(), one.repeat(2));
    }

    #[test]
    fn yaml_output_parses_back() {
        let h = Harness::with_format(FakeApi::default(), "", Format::Yaml);
        run(&registry(), "yaml-pair", &h.ctx, &InvocationArgs::default()).unwrap();
        let back: Value = serde_yaml::from_str(&h.out.text()).unwrap();
        assert_eq!(back, json!({"a": 1, "b": 2}));
    }
}

/*!
args.rs - key/value invocation arguments for handlers.

Sources, lowest precedence first:
  1. `GHIZMO_*` environment variables (prefix stripped, lowercased)
  2. `-a key=value` pairs from the command line
  3. reserved flags: `dry_run`, `force`, `format`, and `state` when given

Reserved keys are always present for the booleans and cannot be set with
`-a`; `parse_pair` rejects them.
*/

use std::collections::BTreeMap;

use crate::cmd::format::Format;
use crate::error::{Error, Result};

pub const ENV_PREFIX: &str = "GHIZMO_";
pub const RESERVED_KEYS: &[&str] = &["dry_run", "force", "format", "state"];

/// Reserved flag values gathered from the CLI.
#[derive(Debug, Clone, Default)]
pub struct Reserved {
    pub dry_run: bool,
    pub force: bool,
    pub format: Format,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct InvocationArgs {
    values: BTreeMap<String, String>,
}

impl InvocationArgs {
    /// Assemble arguments from the three sources in precedence order.
    pub fn assemble<E, P>(env: E, pairs: P, reserved: &Reserved) -> Self
    where
        E: IntoIterator<Item = (String, String)>,
        P: IntoIterator<Item = (String, String)>,
    {
        let mut values = BTreeMap::new();
        for (k, v) in env {
            if let Some(key) = k.strip_prefix(ENV_PREFIX)
                && !key.is_empty()
            {
                values.insert(key.to_ascii_lowercase(), v);
            }
        }
        values.extend(pairs);
        values.insert("dry_run".into(), reserved.dry_run.to_string());
        values.insert("force".into(), reserved.force.to_string());
        values.insert("format".into(), reserved.format.to_string());
        match &reserved.state {
            Some(state) => {
                values.insert("state".into(), state.clone());
            }
            None => {
                values.remove("state");
            }
        }
        Self { values }
    }

    #[cfg(test)]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Value for `key`, failing with `MissingArgument` when absent.
    pub fn get(&self, key: &str) -> Result<&str> {
        self.opt(key)
            .ok_or_else(|| Error::MissingArgument(key.to_string()))
    }

    pub fn opt(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.opt(key).unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        to_bool(key, self.get(key)?)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool> {
        if self.opt(key).is_some() {
            self.get_bool(key)
        } else {
            Ok(default)
        }
    }

    pub fn get_int_opt(&self, key: &str) -> Result<Option<u64>> {
        self.opt(key)
            .map(|raw| {
                raw.trim().parse::<u64>().map_err(|_| Error::InvalidArgument {
                    key: key.to_string(),
                    reason: format!("not an integer: {raw:?}"),
                })
            })
            .transpose()
    }

    pub fn dry_run(&self) -> Result<bool> {
        self.get_bool_or("dry_run", false)
    }

    pub fn force(&self) -> Result<bool> {
        self.get_bool_or("force", false)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Strict boolean normalization: `true`/`True` and `false`/`False` only.
pub fn to_bool(key: &str, raw: &str) -> Result<bool> {
    match raw {
        "true" | "True" => Ok(true),
        "false" | "False" => Ok(false),
        other => Err(Error::InvalidArgument {
            key: key.to_string(),
            reason: format!("not a boolean: {other:?}"),
        }),
    }
}

/// Parse one `-a key=value` pair.
pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
    let (k, v) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got: {raw}"))?;
    let key = k.trim();
    if key.is_empty() {
        return Err(format!("empty key in: {raw}"));
    }
    if RESERVED_KEYS.contains(&key) {
        return Err(format!(
            "'{key}' is reserved; use the dedicated flag instead of -a"
        ));
    }
    Ok((key.to_string(), v.to_string()))
}

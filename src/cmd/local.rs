/*!
local.rs - user-defined endpoint commands from `ghizmo-commands.yml`.

The file lives in the working directory and becomes the `ghizmo_commands`
provider:

```yaml
commands:
  open_issues:
    summary: List open issues.
    path: repos/{owner}/{repo}/issues
    query: { state: "{state}" }
    list: true
```

`{key}` placeholders in `path` and query values resolve from the run's
repository (`owner`, `repo`), then from the invocation arguments, and for
`{username}` finally from the config file.
`list: false` fetches a single resource instead of paging a collection.
*/

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::cmd::args::InvocationArgs;
use crate::cmd::context::RunContext;
use crate::cmd::registry::{CommandDescriptor, Handler, NO_DESCRIPTION, Outcome, Provider};
use crate::cmd::shared::require;
use crate::error::Error;
use crate::github::Endpoint;

pub const PROVIDER_FILENAME: &str = "ghizmo-commands.yml";
pub const PROVIDER_MODULE: &str = "ghizmo_commands";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderFile {
    commands: BTreeMap<String, CommandSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandSpec {
    #[serde(default)]
    summary: Option<String>,
    path: String,
    #[serde(default)]
    query: BTreeMap<String, String>,
    #[serde(default = "default_list")]
    list: bool,
}

fn default_list() -> bool {
    true
}

/// A GET against a templated API path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCommand {
    pub path: String,
    pub query: Vec<(String, String)>,
    pub list: bool,
}

impl EndpointCommand {
    pub fn run<'a>(&'a self, ctx: &'a RunContext, args: &'a InvocationArgs) -> Result<Outcome<'a>> {
        let lookup = |key: &str| -> Result<String, Error> {
            let from_repo = ctx.repository.as_ref().and_then(|info| match key {
                "owner" => Some(info.id.owner.clone()),
                "repo" => Some(info.id.name.clone()),
                _ => None,
            });
            if let Some(value) = from_repo {
                return Ok(value);
            }
            match (args.opt(key), key) {
                (Some(value), _) => Ok(value.to_string()),
                (None, "username") => ctx
                    .config
                    .username
                    .clone()
                    .ok_or_else(|| Error::MissingArgument(key.to_string())),
                (None, _) => Err(Error::MissingArgument(key.to_string())),
            }
        };

        let path = expand(&self.path, lookup)?;
        let mut endpoint = Endpoint::new(Vec::<String>::new()).join(&path);
        for (key, template) in &self.query {
            endpoint = endpoint.query(key, expand(template, lookup)?);
        }
        debug!("Endpoint command: {endpoint}");

        if self.list {
            Ok(Outcome::Records(ctx.api().list(endpoint)))
        } else {
            let resource = ctx.api().get(&endpoint)?;
            Ok(Outcome::one(require(resource, "Resource", &path)?))
        }
    }
}

/// Replace every `{key}` in `template`. Braces that do not enclose a plain
/// identifier are kept as written.
pub fn expand<F>(template: &str, lookup: F) -> Result<String, Error>
where
    F: Fn(&str) -> Result<String, Error>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) if is_identifier(&after[..close]) => {
                out.push_str(&lookup(&after[..close])?);
                rest = &after[close + 1..];
            }
            _ => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/* ---- Loading ---- */

/// The provider defined in `dir`, if the file exists there.
pub fn load_provider(dir: &Path) -> Result<Option<Provider>> {
    let path = dir.join(PROVIDER_FILENAME);
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read command file: {}", path.display()))?;
    let provider = parse_provider(&text)
        .with_context(|| format!("Invalid command file: {}", path.display()))?;
    debug!(
        "Loaded {} command(s) from {}",
        provider.commands.len(),
        path.display()
    );
    Ok(Some(provider))
}

pub fn parse_provider(text: &str) -> Result<Provider> {
    let file: ProviderFile = if text.trim().is_empty() {
        ProviderFile::default()
    } else {
        serde_yaml::from_str(text)?
    };
    let commands = file
        .commands
        .into_iter()
        .map(|(name, spec)| {
            let command = EndpointCommand {
                path: spec.path,
                query: spec.query.into_iter().collect(),
                list: spec.list,
            };
            CommandDescriptor::new(
                PROVIDER_MODULE,
                &name,
                spec.summary.as_deref().unwrap_or(NO_DESCRIPTION),
                Handler::Endpoint(command),
            )
        })
        .collect();
    Ok(Provider {
        module: PROVIDER_MODULE.to_string(),
        commands,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::context::tests::Harness;
    use crate::cmd::dispatch;
    use crate::cmd::registry::Registry;
    use crate::github::fake::FakeApi;
    use serde_json::json;

    const FILE: &str = r#"
commands:
  open_issues:
    summary: List open issues.
    path: repos/{owner}/{repo}/issues
    query: { state: "{state}" }
  show-org:
    path: orgs/{org_name}
    list: false
  _scratch:
    path: zen
"#;

    fn registry() -> Registry {
        Registry::build([parse_provider(FILE).unwrap()]).unwrap()
    }

    #[test]
    fn expand_placeholders() {
        let lookup = |k: &str| match k {
            "owner" => Ok("o".to_string()),
            other => Err(Error::MissingArgument(other.to_string())),
        };
        assert_eq!(expand("repos/{owner}/x", lookup).unwrap(), "repos/o/x");
        assert_eq!(expand("a{b c}{", lookup).unwrap(), "a{b c}{");
        assert!(matches!(
            expand("{tag_name}", lookup),
            Err(Error::MissingArgument(k)) if k == "tag_name"
        ));
    }

    #[test]
    fn parsed_commands_register_with_canonical_names() {
        let reg = registry();
        assert_eq!(reg.names(true), vec!["open-issues", "show-org"]);
        let dir = reg.directory(false);
        assert_eq!(dir[0].module, PROVIDER_MODULE);
        assert_eq!(dir[0].summary, "List open issues.");
        assert_eq!(dir[1].summary, NO_DESCRIPTION);
    }

    #[test]
    fn list_command_pages_expanded_endpoint() {
        let api = FakeApi::default().with_list(
            "repos/o/r/issues?state=closed",
            vec![json!({"number": 1}), json!({"number": 2})],
        );
        let h = Harness::new(api, "");
        let args = InvocationArgs::from_pairs([("state", "closed")]);
        let n = dispatch::run(&registry(), "open-issues", &h.ctx, &args).unwrap();
        assert_eq!(n, 2);
        assert_eq!(h.records(), vec![json!({"number": 1}), json!({"number": 2})]);
    }

    #[test]
    fn single_resource_command_uses_args() {
        let api = FakeApi::default().with_resource("orgs/acme", json!({"login": "acme"}));
        let h = Harness::new(api, "");
        let args = InvocationArgs::from_pairs([("org_name", "acme")]);
        dispatch::run(&registry(), "show_org", &h.ctx, &args).unwrap();
        assert_eq!(h.records(), vec![json!({"login": "acme"})]);

        let err = dispatch::run(&registry(), "show_org", &h.ctx, &InvocationArgs::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingArgument(k)) if k == "org_name"
        ));
    }

    #[test]
    fn username_falls_back_to_config() {
        let reg = Registry::build([parse_provider(
            "commands:\n  me:\n    path: users/{username}\n    list: false\n",
        )
        .unwrap()])
        .unwrap();
        let api = FakeApi::default()
            .with_resource("users/mona", json!({"login": "mona"}))
            .with_resource("users/other", json!({"login": "other"}));
        let mut h = Harness::new(api, "");
        h.ctx.config.username = Some("mona".into());
        dispatch::run(&reg, "me", &h.ctx, &InvocationArgs::default()).unwrap();
        dispatch::run(&reg, "me", &h.ctx, &InvocationArgs::from_pairs([("username", "other")]))
            .unwrap();
        assert_eq!(h.records(), vec![json!({"login": "mona"}), json!({"login": "other"})]);
    }

    #[test]
    fn malformed_file_is_rejected() {
        assert!(parse_provider("commands:\n  broken:\n    summary: no path\n").is_err());
        assert!(parse_provider("commands:\n  x:\n    path: a\n    method: POST\n").is_err());
        assert!(parse_provider("").unwrap().commands.is_empty());
    }

    #[test]
    fn load_provider_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_provider(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(PROVIDER_FILENAME), FILE).unwrap();
        let provider = load_provider(dir.path()).unwrap().unwrap();
        assert_eq!(provider.module, PROVIDER_MODULE);
        assert_eq!(provider.commands.len(), 3);

        std::fs::write(dir.path().join(PROVIDER_FILENAME), "commands: [1, 2]\n").unwrap();
        let err = load_provider(dir.path()).err().unwrap();
        assert!(err.to_string().contains(PROVIDER_FILENAME));
    }
}

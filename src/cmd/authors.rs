/*!
`authors.rs`

`assemble-authors`: the author list of a repository, grouped and annotated.

Inputs:
  - contributors of the repository (plus their user records for names)
  - an optional `authors-info.{yml,json}` (also looked up under `admin/`):
        header / footer : free text, passed through
        roles           : login -> role
        groups          : [{name, members?}]; the one group without
                          `members` collects every unassigned login
        exclude         : logins left out of the final list
  - contributor statistics (commit totals) and all issues/PRs (counts)

Output, in order: status records while each stage runs, a summary record per
stage, then one record per author in group order (logins sorted
case-insensitively within a group).

The work is split into stages driven by the iterator, so status records reach
the output while later stages are still talking to the API.
*/

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use tracing::debug;
use url::form_urlencoded::byte_serialize;

use crate::cmd::args::InvocationArgs;
use crate::cmd::context::RunContext;
use crate::cmd::registry::{Builtin, Outcome};
use crate::cmd::shared::{field, status};
use crate::error::Error;
use crate::github::{Endpoint, Repo};

pub const COMMANDS: &[Builtin] = &[Builtin {
    name: "assemble_authors",
    summary: "Assemble the list of authors from repository history and an optional authors-info.{yml,json} file.",
    run: assemble_authors,
}];

/// Later entries take precedence.
const AUTHORS_INFO_FILES: &[&str] = &[
    "authors-info.yml",
    "authors-info.json",
    "admin/authors-info.yml",
    "admin/authors-info.json",
];

const DEFAULT_GROUP: &str = "Contributors";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuthorsInfo {
    header: Option<String>,
    footer: Option<String>,
    roles: BTreeMap<String, String>,
    groups: Vec<Group>,
    exclude: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Group {
    name: String,
    members: Option<Vec<String>>,
}

fn assemble_authors<'a>(ctx: &'a RunContext, _: &'a InvocationArgs) -> Result<Outcome<'a>> {
    Ok(Outcome::records(Assembly::new(ctx.repo()?, Path::new("."))))
}

/* ---- Staged assembly ---- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Info,
    Contributors,
    Commits,
    Issues,
    Authors,
    Done,
}

impl Stage {
    fn next(self) -> Self {
        match self {
            Stage::Info => Stage::Contributors,
            Stage::Contributors => Stage::Commits,
            Stage::Commits => Stage::Issues,
            Stage::Issues => Stage::Authors,
            Stage::Authors | Stage::Done => Stage::Done,
        }
    }
}

struct Assembly<'a> {
    repo: Repo<'a>,
    root: PathBuf,
    stage: Stage,
    queue: VecDeque<Value>,
    info: AuthorsInfo,
    /// login -> user resource; `None` when the API has no such user.
    users: BTreeMap<String, Option<Value>>,
    commits: BTreeMap<String, u64>,
    issues: BTreeMap<String, u64>,
}

impl<'a> Assembly<'a> {
    fn new(repo: Repo<'a>, root: &Path) -> Self {
        Self {
            repo,
            root: root.to_path_buf(),
            stage: Stage::Info,
            queue: VecDeque::new(),
            info: AuthorsInfo::default(),
            users: BTreeMap::new(),
            commits: BTreeMap::new(),
            issues: BTreeMap::new(),
        }
    }

    fn say(&mut self, message: impl Into<String>) {
        self.queue.push_back(status(message, false));
    }

    fn user(&self, login: &str) -> Result<Option<Value>> {
        self.repo.api.get(&Endpoint::new(["users", login]))
    }

    fn run_stage(&mut self, stage: Stage) -> Result<()> {
        match stage {
            Stage::Info => self.load_info(),
            Stage::Contributors => self.collect_contributors(),
            Stage::Commits => self.tally_commits(),
            Stage::Issues => self.tally_issues(),
            Stage::Authors => self.list_authors(),
            Stage::Done => Ok(()),
        }
    }

    fn load_info(&mut self) -> Result<()> {
        let found = AUTHORS_INFO_FILES
            .iter()
            .rev()
            .map(|name| self.root.join(name))
            .find(|path| path.is_file());
        let Some(path) = found else {
            self.say("No roles file");
            return Ok(());
        };
        self.say(format!("Info from: {}", path.display()));
        self.info = read_info(&path)?;
        self.queue.push_back(json!({
            "header": self.info.header,
            "footer": self.info.footer,
            "roles": self.info.roles,
            "groups": self.info.groups.iter().map(|g| json!({"name": g.name, "members": g.members})).collect::<Vec<_>>(),
            "exclude": self.info.exclude,
        }));
        Ok(())
    }

    fn collect_contributors(&mut self) -> Result<()> {
        let mut contributors = Vec::new();
        for contributor in self.repo.contributors() {
            let contributor = contributor?;
            if let Some(login) = field(&contributor, "login") {
                contributors.push(login.to_string());
            }
        }
        for login in &contributors {
            let user = self.user(login)?;
            self.users.insert(login.clone(), user);
        }

        // Logins with a role whose commits the API did not link to an account.
        let mut unknown = Vec::new();
        let roles: Vec<String> = self.info.roles.keys().cloned().collect();
        for login in roles {
            if self.users.contains_key(&login) {
                continue;
            }
            let user = self.user(&login)?;
            if user.is_some() {
                self.say(format!(
                    "Author has a role but is not returned by GitHub as a contributor: {login}"
                ));
            } else {
                self.say(format!(
                    "Author has a role but is not a contributor or a known user: {login}"
                ));
                unknown.push(login.clone());
            }
            self.users.insert(login, user);
        }

        self.say(format!("Found {} authors", self.users.len()));
        self.say(format!("Found without GitHub user info: {unknown:?}"));
        Ok(())
    }

    fn tally_commits(&mut self) -> Result<()> {
        debug!("Contributor statistics for {}", self.repo.id());
        for stat in self.repo.contributor_statistics() {
            let stat = stat?;
            let (Some(login), Some(total)) = (
                field(&stat, "author/login"),
                stat.get("total").and_then(Value::as_u64),
            ) else {
                continue;
            };
            debug!("contributor stat: login '{login}' total {total}");
            self.commits.insert(login.to_string(), total);
        }
        self.say(format!("Read {} contributor stats", self.commits.len()));
        Ok(())
    }

    fn tally_issues(&mut self) -> Result<()> {
        for issue in self.repo.issues("all") {
            let issue = issue?;
            if let Some(login) = field(&issue, "user/login") {
                *self.issues.entry(login.to_string()).or_default() += 1;
            }
        }
        self.say(format!("Read {} issues/PRs", self.issues.len()));
        self.queue.push_back(json!({
            "commit_tallies": self.commits,
            "issue_tallies": self.issues,
        }));
        Ok(())
    }

    fn list_authors(&mut self) -> Result<()> {
        let groups = if self.info.groups.is_empty() {
            vec![Group {
                name: DEFAULT_GROUP.to_string(),
                members: None,
            }]
        } else {
            self.info.groups.clone()
        };

        let open: Vec<usize> = (0..groups.len())
            .filter(|&i| groups[i].members.is_none())
            .collect();
        let [default_group] = open.as_slice() else {
            return Err(Error::Decode(format!(
                "authors info must have exactly one group without explicit members (found {})",
                open.len()
            ))
            .into());
        };

        let mut grouped: Vec<Vec<String>> = groups
            .iter()
            .map(|g| g.members.clone().unwrap_or_default())
            .collect();
        let assigned: BTreeSet<&String> = grouped.iter().flatten().collect();
        let unassigned: Vec<String> = self
            .users
            .keys()
            .filter(|login| !assigned.contains(login))
            .cloned()
            .collect();
        grouped[*default_group].extend(unassigned);
        for logins in &mut grouped {
            logins.sort_by_key(|login| login.to_lowercase());
        }

        let html_url = self.repo.info.html_url.clone();
        for (group, logins) in groups.iter().zip(grouped) {
            for login in logins {
                if self.info.exclude.contains(&login) {
                    continue;
                }
                let user = self.users.get(&login).cloned().flatten();
                let record = json!({
                    "group": group.name,
                    "login": login,
                    "name": user.as_ref().and_then(|u| field(u, "name")),
                    "user_url": user.as_ref().map(|_| format!("https://github.com/{login}")),
                    "role": self.info.roles.get(&login),
                    "commits": self.commits.get(&login).copied().unwrap_or(0),
                    "issues": self.issues.get(&login).copied().unwrap_or(0),
                    "commits_url": format!("{html_url}/commits?author={}", quote_plus(&login)),
                    "issues_url": format!("{html_url}/issues?q={}", quote_plus(&format!("author:{login}"))),
                });
                self.queue.push_back(record);
            }
        }
        Ok(())
    }
}

impl Iterator for Assembly<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.queue.pop_front() {
                return Some(Ok(record));
            }
            let stage = self.stage;
            if stage == Stage::Done {
                return None;
            }
            self.stage = stage.next();
            if let Err(e) = self.run_stage(stage) {
                self.stage = Stage::Done;
                return Some(Err(e));
            }
        }
    }
}

fn read_info(path: &Path) -> Result<AuthorsInfo> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let info: Result<AuthorsInfo> = if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&text).map_err(anyhow::Error::from)
    } else {
        serde_yaml::from_str(&text).map_err(anyhow::Error::from)
    };
    info.with_context(|| format!("Invalid authors info file: {}", path.display()))
}

fn quote_plus(s: &str) -> String {
    byte_serialize(s.as_bytes()).collect()
}

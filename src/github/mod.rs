//! Hosted API adapter.
//!
//! `Api` is the capability seam the command layer depends on; `GithubClient`
//! implements it over HTTP. Resources come back as plain JSON mappings, so the
//! command layer never branches on response shape.
//!
//! parse_repo / infer_repo -> RepoId ; Repo -> per-repository operations.
//!
use anyhow::Result;
use serde_json::Value;
use std::fmt;
use std::process::Command;
use tracing::{debug, info};
use url::Url;

use crate::error::Error;

pub mod client;
#[cfg(test)]
pub mod fake;

pub use client::GithubClient;

/// Lazy, single-pass sequence of resources in the API's natural order.
pub type Resources<'a> = Box<dyn Iterator<Item = Result<Value>> + 'a>;

/* ---- Endpoint ---- */

/// API path as a list of segments plus query pairs. Segments are encoded
/// individually when turned into a URL, so a ref such as `heads/feat/x`
/// keeps its slashes as separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    segments: Vec<String>,
    query: Vec<(String, String)>,
}

impl Endpoint {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
            query: Vec::new(),
        }
    }

    /// Split `path` on `/` and append its non-empty parts.
    pub fn join(mut self, path: &str) -> Self {
        self.segments.extend(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        );
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn has_query(&self, key: &str) -> bool {
        self.query.iter().any(|(k, _)| k == key)
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path())?;
        for (i, (k, v)) in self.query.iter().enumerate() {
            write!(f, "{}{k}={v}", if i == 0 { '?' } else { '&' })?;
        }
        Ok(())
    }
}

/* ---- Capability trait ---- */

pub trait Api {
    /// Fetch one resource; `Ok(None)` when the API reports it absent.
    fn get(&self, endpoint: &Endpoint) -> Result<Option<Value>>;

    /// Fetch a plain-text resource (e.g. `zen`).
    fn get_text(&self, endpoint: &Endpoint) -> Result<String>;

    /// Lazily page through a collection.
    fn list<'a>(&'a self, endpoint: Endpoint) -> Resources<'a>;

    fn post(&self, endpoint: &Endpoint, body: &Value) -> Result<Value>;

    fn delete(&self, endpoint: &Endpoint) -> Result<()>;
}

/* ---- Repository identity ---- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

fn valid_part(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Parse an explicit `--repo OWNER/NAME` value.
pub fn parse_repo(raw: &str) -> Result<RepoId, Error> {
    let trimmed = raw.trim();
    match trimmed.split('/').collect::<Vec<_>>().as_slice() {
        [owner, name] if valid_part(owner) && valid_part(name) => Ok(RepoId {
            owner: owner.to_string(),
            name: name.to_string(),
        }),
        _ => Err(Error::RepositoryResolution(format!(
            "invalid repository '{raw}' (expected OWNER/NAME)"
        ))),
    }
}

/// Extract owner/name from a GitHub remote URL.
///
/// Accepted: `git@github.com:o/n(.git)`, `https://github.com/o/n(.git)`,
/// `ssh://git@github.com/o/n(.git)`.
pub fn parse_remote_url(remote: &str) -> Option<RepoId> {
    let remote = remote.trim();
    let path = if let Some(rest) = remote.strip_prefix("git@github.com:") {
        rest.to_string()
    } else {
        let url = Url::parse(remote).ok()?;
        if url.host_str() != Some("github.com") {
            return None;
        }
        match url.scheme() {
            "https" | "http" | "ssh" | "git" => url.path().trim_start_matches('/').to_string(),
            _ => return None,
        }
    };
    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    parse_repo(path).ok()
}

/// Infer the repository from the current directory's git remote.
pub fn infer_repo(remote_name: &str) -> Option<RepoId> {
    info!(
        "Checking for git remote '{remote_name}' in {}",
        std::env::current_dir()
            .map(|d| d.display().to_string())
            .unwrap_or_default()
    );
    let output = Command::new("git")
        .args(["config", "--get", &format!("remote.{remote_name}.url")])
        .output()
        .ok()?;
    if !output.status.success() {
        debug!("git config lookup failed: {}", output.status);
        return None;
    }
    let url = String::from_utf8_lossy(&output.stdout);
    let repo = parse_remote_url(&url);
    match &repo {
        Some(id) => info!("Inferred repository: {id}"),
        None => info!("Remote URL is not a GitHub repository: {}", url.trim()),
    }
    repo
}

/* ---- Repository handle ---- */

/// A resolved repository: identity plus its web URL.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    pub id: RepoId,
    pub html_url: String,
}

impl RepoInfo {
    /// Look the repository up through the API; absent is an error.
    pub fn fetch(api: &dyn Api, id: RepoId) -> Result<Self> {
        let raw = api
            .get(&Endpoint::new(["repos", id.owner.as_str(), id.name.as_str()]))?
            .ok_or_else(|| {
                Error::RepositoryResolution(format!("Couldn't access repository: {id}"))
            })?;
        let html_url = raw
            .get("html_url")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://github.com/{id}"));
        Ok(Self { id, html_url })
    }
}

/// Repository operations bound to an API handle.
#[derive(Clone, Copy)]
pub struct Repo<'a> {
    pub api: &'a dyn Api,
    pub info: &'a RepoInfo,
}

impl<'a> Repo<'a> {
    pub fn id(&self) -> &'a RepoId {
        &self.info.id
    }

    fn at(&self, path: &str) -> Endpoint {
        Endpoint::new(["repos", self.info.id.owner.as_str(), self.info.id.name.as_str()]).join(path)
    }

    pub fn tags(&self) -> Resources<'a> {
        self.api.list(self.at("tags"))
    }

    pub fn branches(&self) -> Resources<'a> {
        self.api.list(self.at("branches"))
    }

    pub fn refs(&self) -> Resources<'a> {
        self.api.list(self.at("git/refs"))
    }

    pub fn pull_requests(&self, state: &str) -> Resources<'a> {
        self.api.list(self.at("pulls").query("state", state))
    }

    pub fn contributors(&self) -> Resources<'a> {
        self.api.list(self.at("contributors"))
    }

    pub fn collaborators(&self) -> Resources<'a> {
        self.api.list(self.at("collaborators"))
    }

    pub fn releases(&self) -> Resources<'a> {
        self.api.list(self.at("releases"))
    }

    pub fn contributor_statistics(&self) -> Resources<'a> {
        self.api.list(self.at("stats/contributors"))
    }

    pub fn issues(&self, state: &str) -> Resources<'a> {
        self.api.list(self.at("issues").query("state", state))
    }

    /// Tag reference by name (`v1.0` -> `refs/tags/v1.0`).
    pub fn tag(&self, name: &str) -> Result<Option<Value>> {
        self.api.get(&self.at("git/ref/tags").join(name))
    }

    pub fn branch(&self, name: &str) -> Result<Option<Value>> {
        self.api.get(&self.at("branches").join(name))
    }

    /// Reference by its name below `refs/` (`heads/main`, `tags/v1.0`).
    pub fn ref_(&self, name: &str) -> Result<Option<Value>> {
        self.api.get(&self.at("git/ref").join(name))
    }

    pub fn delete_ref(&self, name: &str) -> Result<()> {
        self.api.delete(&self.at("git/refs").join(name))
    }

    pub fn create_release(&self, body: &Value) -> Result<Value> {
        self.api.post(&self.at("releases"), body)
    }
}

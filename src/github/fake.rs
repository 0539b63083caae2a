//! In-memory `Api` for tests. Lookups use the endpoint path, optionally with
//! its query (`repos/o/r/pulls?state=closed`) taking priority.

use anyhow::Result;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use super::{Api, Endpoint, RepoId, RepoInfo, Resources};
use crate::error::Error;

#[derive(Default)]
pub struct FakeApi {
    resources: BTreeMap<String, Value>,
    lists: BTreeMap<String, Vec<Value>>,
    texts: BTreeMap<String, String>,
    /// Destructive calls in order: `DELETE path` / `POST path`.
    calls: Rc<RefCell<Vec<String>>>,
}

fn keys(endpoint: &Endpoint) -> [String; 2] {
    let path = endpoint.path();
    let query = endpoint
        .query_pairs()
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    [format!("{path}?{query}"), path]
}

impl FakeApi {
    pub fn with_resource(mut self, path: &str, value: Value) -> Self {
        self.resources.insert(path.to_string(), value);
        self
    }

    pub fn with_list(mut self, path: &str, items: Vec<Value>) -> Self {
        self.lists.insert(path.to_string(), items);
        self
    }

    pub fn with_text(mut self, path: &str, text: &str) -> Self {
        self.texts.insert(path.to_string(), text.to_string());
        self
    }

    /// Shared view of the call log that stays valid after boxing the fake.
    pub fn call_log(&self) -> Rc<RefCell<Vec<String>>> {
        Rc::clone(&self.calls)
    }

    fn lookup<'a, T>(map: &'a BTreeMap<String, T>, endpoint: &Endpoint) -> Option<&'a T> {
        keys(endpoint).iter().find_map(|k| map.get(k))
    }
}

impl Api for FakeApi {
    fn get(&self, endpoint: &Endpoint) -> Result<Option<Value>> {
        Ok(Self::lookup(&self.resources, endpoint).cloned())
    }

    fn get_text(&self, endpoint: &Endpoint) -> Result<String> {
        Self::lookup(&self.texts, endpoint)
            .cloned()
            .ok_or_else(|| not_found(endpoint))
    }

    fn list<'a>(&'a self, endpoint: Endpoint) -> Resources<'a> {
        match Self::lookup(&self.lists, &endpoint) {
            Some(items) => Box::new(items.iter().cloned().map(Ok)),
            None => Box::new(std::iter::once(Err(not_found(&endpoint)))),
        }
    }

    fn post(&self, endpoint: &Endpoint, body: &Value) -> Result<Value> {
        self.calls.borrow_mut().push(format!("POST {}", endpoint.path()));
        Ok(body.clone())
    }

    fn delete(&self, endpoint: &Endpoint) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("DELETE {}", endpoint.path()));
        Ok(())
    }
}

fn not_found(endpoint: &Endpoint) -> anyhow::Error {
    Error::Api {
        status: 404,
        path: endpoint.to_string(),
        message: "Not Found".into(),
    }
    .into()
}

pub fn repo_info(owner: &str, name: &str) -> RepoInfo {
    RepoInfo {
        id: RepoId {
            owner: owner.into(),
            name: name.into(),
        },
        html_url: format!("https://github.com/{owner}/{name}"),
    }
}

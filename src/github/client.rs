/*!
client.rs - `Api` over the GitHub REST API.

The command core is synchronous; every call here drives an async `reqwest`
request to completion on an owned current-thread Tokio runtime. Collections
are paged lazily: one HTTP request per page, issued only once the previous
page has been consumed.
*/

use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK, USER_AGENT};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::collections::VecDeque;
use tracing::{debug, warn};
use url::Url;

use super::{Api, Endpoint, Resources};
use crate::error::Error;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const PER_PAGE: &str = "100";

pub struct GithubClient {
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(api_url: &str, token: Option<String>) -> Result<Self> {
        let base = Url::parse(api_url).with_context(|| format!("Invalid API URL: {api_url}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("Invalid API URL: {api_url}");
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create Tokio runtime")?;
        Ok(Self {
            runtime,
            http: reqwest::Client::new(),
            base,
            token,
        })
    }

    /// Build a client and check its credentials.
    ///
    /// With a token the login is verified against `/user`; a rejected token is
    /// a `LoginFailure`. Without one the client stays anonymous.
    pub fn login(api_url: &str, token: Option<String>, username: Option<&str>) -> Result<Self> {
        let client = Self::new(api_url, token)?;
        if client.token.is_none() {
            warn!(
                "No access token configured (access_token in ~/.ghizmo.yml or GITHUB_TOKEN); using anonymous access"
            );
            return Ok(client);
        }
        debug!("Using access token authentication");
        let login = client.current_login()?;
        if let Some(expected) = username
            && !expected.eq_ignore_ascii_case(&login)
        {
            warn!("Access token belongs to '{login}', not '{expected}'");
        }
        Ok(client)
    }

    fn current_login(&self) -> Result<String> {
        self.runtime.block_on(self.current_login_async())
    }

    async fn current_login_async(&self) -> Result<String> {
        let endpoint = Endpoint::new(["user"]);
        let resp = self
            .send(Method::GET, self.url_for(&endpoint)?, None)
            .await?;
        if matches!(
            resp.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(Error::LoginFailure(error_message(resp).await).into());
        }
        let user = check_json(resp, &endpoint).await?;
        match user.get("login").and_then(Value::as_str) {
            Some(login) => Ok(login.to_string()),
            None => Err(Error::LoginFailure("no login in /user response".into()).into()),
        }
    }

    fn url_for(&self, endpoint: &Endpoint) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Invalid API URL: {}", self.base))?
            .pop_if_empty()
            .extend(endpoint.segments());
        if !endpoint.query_pairs().is_empty() {
            url.query_pairs_mut().extend_pairs(endpoint.query_pairs());
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut req = self
            .http
            .request(method, url)
            .header(USER_AGENT, concat!("ghizmo/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("token {token}"));
        }
        req
    }

    async fn send(&self, method: Method, url: Url, body: Option<&Value>) -> Result<Response> {
        debug!("{method} {url}");
        let mut req = self.request(method.clone(), url.clone());
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send()
            .await
            .with_context(|| format!("{method} {url} failed"))
    }

    fn fetch_page(&self, url: Url, endpoint: &Endpoint) -> Result<(Vec<Value>, Option<Url>)> {
        self.runtime.block_on(self.fetch_page_async(url, endpoint))
    }

    async fn fetch_page_async(
        &self,
        url: Url,
        endpoint: &Endpoint,
    ) -> Result<(Vec<Value>, Option<Url>)> {
        let resp = self.send(Method::GET, url, None).await?;
        if resp.status() == StatusCode::ACCEPTED {
            return Err(Error::Api {
                status: 202,
                path: endpoint.to_string(),
                message: "results are still being computed; try again shortly".into(),
            }
            .into());
        }
        let next = next_link(resp.headers());
        let body = check_json(resp, endpoint).await?;
        Ok((page_items(body), next))
    }

    async fn get_async(&self, endpoint: &Endpoint) -> Result<Option<Value>> {
        let resp = self.send(Method::GET, self.url_for(endpoint)?, None).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("{endpoint}: not found");
            return Ok(None);
        }
        check_json(resp, endpoint).await.map(Some)
    }

    async fn get_text_async(&self, endpoint: &Endpoint) -> Result<String> {
        let resp = self.send(Method::GET, self.url_for(endpoint)?, None).await?;
        let resp = check_status(resp, endpoint).await?;
        resp.text()
            .await
            .with_context(|| format!("reading {endpoint}"))
    }

    async fn post_async(&self, endpoint: &Endpoint, body: &Value) -> Result<Value> {
        let resp = self
            .send(Method::POST, self.url_for(endpoint)?, Some(body))
            .await?;
        check_json(resp, endpoint).await
    }

    async fn delete_async(&self, endpoint: &Endpoint) -> Result<()> {
        let resp = self
            .send(Method::DELETE, self.url_for(endpoint)?, None)
            .await?;
        check_status(resp, endpoint).await.map(|_| ())
    }
}

impl Api for GithubClient {
    fn get(&self, endpoint: &Endpoint) -> Result<Option<Value>> {
        self.runtime.block_on(self.get_async(endpoint))
    }

    fn get_text(&self, endpoint: &Endpoint) -> Result<String> {
        self.runtime.block_on(self.get_text_async(endpoint))
    }

    fn list<'a>(&'a self, mut endpoint: Endpoint) -> Resources<'a> {
        if !endpoint.has_query("per_page") {
            endpoint = endpoint.query("per_page", PER_PAGE);
        }
        match self.url_for(&endpoint) {
            Ok(url) => Box::new(Pages {
                client: self,
                endpoint,
                next: Some(url),
                buffer: VecDeque::new(),
            }),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn post(&self, endpoint: &Endpoint, body: &Value) -> Result<Value> {
        self.runtime.block_on(self.post_async(endpoint, body))
    }

    fn delete(&self, endpoint: &Endpoint) -> Result<()> {
        self.runtime.block_on(self.delete_async(endpoint))
    }
}

/* ---- Pagination ---- */

struct Pages<'a> {
    client: &'a GithubClient,
    endpoint: Endpoint,
    next: Option<Url>,
    buffer: VecDeque<Value>,
}

impl Iterator for Pages<'_> {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            let url = self.next.take()?;
            match self.client.fetch_page(url, &self.endpoint) {
                Ok((items, next)) => {
                    self.buffer.extend(items);
                    self.next = next;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Items of one page: a bare array, or the `items` of a search response.
fn page_items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("items") {
            Some(Value::Array(items)) => items,
            Some(other) => {
                map.insert("items".into(), other);
                vec![Value::Object(map)]
            }
            None => vec![Value::Object(map)],
        },
        other => vec![other],
    }
}

/// `rel="next"` target of a `Link` header, if any.
fn next_link(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(LINK)?.to_str().ok()?;
    parse_next_link(link)
}

fn parse_next_link(link: &str) -> Option<Url> {
    link.split(',').find_map(|part| {
        let mut pieces = part.split(';').map(str::trim);
        let target = pieces.next()?;
        let is_next = pieces.any(|p| p == r#"rel="next""#);
        if !is_next {
            return None;
        }
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

/* ---- Response checks ---- */

async fn check_status(resp: Response, endpoint: &Endpoint) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    Err(Error::Api {
        status: status.as_u16(),
        path: endpoint.to_string(),
        message: error_message(resp).await,
    }
    .into())
}

async fn check_json(resp: Response, endpoint: &Endpoint) -> Result<Value> {
    let resp = check_status(resp, endpoint).await?;
    resp.json::<Value>()
        .await
        .with_context(|| format!("decoding JSON from {endpoint}"))
}

/// Best-effort `message` field of an error body.
async fn error_message(resp: Response) -> String {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if text.trim().is_empty() {
                status.canonical_reason().unwrap_or("error").to_string()
            } else {
                text.trim().to_string()
            }
        })
}

//! Web operations: page fetches, reachability checks, link extraction

use crate::params::{optional_str, require_str, u64_or};
use crate::registry::Operation;
use planchain_core::{OperationOutput, OperationSchema, ParamDef, ParamType, Params, Result};
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::debug;

const CATEGORY: &str = "web_operations";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 120;
/// Page bodies are cut to this many characters.
pub const MAX_CONTENT_CHARS: usize = 5000;

fn client() -> Client {
    Client::builder()
        .user_agent(concat!("planchain/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Only absolute http(s) URLs are fetched.
fn parse_url(raw: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| format!("Invalid URL {}: {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("Unsupported URL scheme: {}", other)),
    }
}

fn timeout_from(params: &Params) -> Duration {
    let secs = u64_or(params, "timeout", DEFAULT_TIMEOUT_SECS);
    Duration::from_secs(secs.clamp(1, MAX_TIMEOUT_SECS))
}

fn header_map(headers: &HeaderMap) -> Map<String, Value> {
    headers
        .iter()
        .filter_map(|(k, v)| Some((k.to_string(), Value::from(v.to_str().ok()?))))
        .collect()
}

fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((cut, _)) => (text[..cut].to_string(), true),
        None => (text.to_string(), false),
    }
}

/// GET a page body, failing on transport errors and non-2xx statuses.
async fn fetch_text(
    client: &Client,
    url: Url,
    timeout: Duration,
) -> std::result::Result<(reqwest::StatusCode, HeaderMap, Url, String), String> {
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| format!("Failed to fetch {}: {}", url, e))?;
    let status = response.status();
    if !status.is_success() {
        return Err(format!(
            "HTTP error: {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        ));
    }
    let headers = response.headers().clone();
    let final_url = response.url().clone();
    let body = response
        .text()
        .await
        .map_err(|e| format!("Failed to read response body: {}", e))?;
    Ok((status, headers, final_url, body))
}

pub struct FetchWebPage {
    schema: OperationSchema,
    client: Client,
}

impl FetchWebPage {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "fetch_web_page",
                CATEGORY,
                "Fetch content from a web page",
            )
            .param(ParamDef::required("url", ParamType::String, "http or https URL"))
            .param(ParamDef::optional(
                "timeout",
                ParamType::Integer,
                "Deadline in seconds",
                DEFAULT_TIMEOUT_SECS,
            ))
            .returns("content (first 5000 characters), status_code, headers, url")
            .example("fetch_web_page('https://example.com')"),
            client: client(),
        }
    }
}

impl Default for FetchWebPage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for FetchWebPage {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let raw = require_str("fetch_web_page", &params, "url")?;
        let url = match parse_url(raw) {
            Ok(u) => u,
            Err(e) => return Ok(OperationOutput::failure(e)),
        };
        debug!("fetch_web_page: {}", url);

        let (status, headers, final_url, body) =
            match fetch_text(&self.client, url, timeout_from(&params)).await {
                Ok(fetched) => fetched,
                Err(e) => return Ok(OperationOutput::failure(e)),
            };
        let (content, truncated) = truncate_chars(&body, MAX_CONTENT_CHARS);

        Ok(OperationOutput::data(content.clone())
            .with("content", content)
            .with("truncated", truncated)
            .with("status_code", status.as_u16())
            .with("headers", header_map(&headers))
            .with("url", final_url.to_string()))
    }
}

pub struct CheckWebsiteStatus {
    schema: OperationSchema,
    client: Client,
}

impl CheckWebsiteStatus {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "check_website_status",
                CATEGORY,
                "Check if a website is accessible",
            )
            .param(ParamDef::required("url", ParamType::String, "http or https URL"))
            .param(ParamDef::optional(
                "timeout",
                ParamType::Integer,
                "Deadline in seconds",
                DEFAULT_TIMEOUT_SECS,
            ))
            .returns("status_code, accessible, response_time, headers"),
            client: client(),
        }
    }
}

impl Default for CheckWebsiteStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for CheckWebsiteStatus {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let raw = require_str("check_website_status", &params, "url")?;
        let url = match parse_url(raw) {
            Ok(u) => u,
            Err(e) => return Ok(OperationOutput::failure(e).with("accessible", false)),
        };

        let started = Instant::now();
        let sent = self
            .client
            .head(url.clone())
            .timeout(timeout_from(&params))
            .send()
            .await;
        let response = match sent {
            Ok(r) => r,
            Err(e) => {
                return Ok(OperationOutput::failure(format!("{} is unreachable: {}", url, e))
                    .with("accessible", false))
            }
        };

        // Any HTTP answer counts as a completed check; 4xx/5xx mark it inaccessible.
        let code = response.status().as_u16();
        Ok(OperationOutput::data(code < 400)
            .with("status_code", code)
            .with("accessible", code < 400)
            .with("response_time", started.elapsed().as_secs_f64())
            .with("headers", header_map(response.headers())))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub url: String,
    pub text: String,
    pub title: String,
}

/// Anchors with an `href`, in document order. Relative hrefs are joined
/// onto `base` when one is given.
pub fn extract_anchors(html: &str, base: Option<&Url>) -> Vec<Link> {
    let (Some(anchor), Some(href), Some(title), Some(tag)) = (
        Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").ok(),
        Regex::new(r#"(?is)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).ok(),
        Regex::new(r#"(?is)\btitle\s*=\s*(?:"([^"]*)"|'([^']*)')"#).ok(),
        Regex::new(r"<[^>]+>").ok(),
    ) else {
        return Vec::new();
    };
    let attr = |re: &Regex, attrs: &str| -> Option<String> {
        let caps = re.captures(attrs)?;
        (1..caps.len())
            .find_map(|i| caps.get(i))
            .map(|m| m.as_str().to_string())
    };

    anchor
        .captures_iter(html)
        .filter_map(|caps| {
            let attrs = caps.get(1).map_or("", |m| m.as_str());
            let raw_href = attr(&href, attrs)?;
            let url = match base {
                Some(b) => b
                    .join(&raw_href)
                    .map(|u| u.to_string())
                    .unwrap_or(raw_href),
                None => raw_href,
            };
            let inner = caps.get(2).map_or("", |m| m.as_str());
            let text = tag
                .replace_all(inner, "")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            Some(Link {
                url,
                text,
                title: attr(&title, attrs).unwrap_or_default(),
            })
        })
        .collect()
}

pub struct ExtractLinks {
    schema: OperationSchema,
    client: Client,
}

impl ExtractLinks {
    pub fn new() -> Self {
        Self {
            schema: OperationSchema::new(
                "extract_links",
                CATEGORY,
                "Extract all links from a web page",
            )
            .param(ParamDef::required("url", ParamType::String, "Page to scan"))
            .param(ParamDef::optional(
                "base_url",
                ParamType::String,
                "Join relative links onto this URL",
                Value::Null,
            ))
            .returns("links: url, text, title; count"),
            client: client(),
        }
    }
}

impl Default for ExtractLinks {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Operation for ExtractLinks {
    fn schema(&self) -> &OperationSchema {
        &self.schema
    }

    async fn invoke(&self, params: Params) -> Result<OperationOutput> {
        let raw = require_str("extract_links", &params, "url")?;
        let url = match parse_url(raw) {
            Ok(u) => u,
            Err(e) => return Ok(OperationOutput::failure(e)),
        };
        let base = match optional_str(&params, "base_url").map(Url::parse) {
            None => None,
            Some(Ok(b)) => Some(b),
            Some(Err(e)) => {
                return Ok(OperationOutput::failure(format!("Invalid base_url: {}", e)))
            }
        };

        let (_, _, _, body) = match fetch_text(&self.client, url, timeout_from(&params)).await {
            Ok(fetched) => fetched,
            Err(e) => return Ok(OperationOutput::failure(e)),
        };
        let links = extract_anchors(&body, base.as_ref());
        let count = links.len();
        let links = serde_json::to_value(links)?;
        Ok(OperationOutput::data(links.clone())
            .with("links", links)
            .with("count", count))
    }
}

//! Web leaf clients: search gateway and content fetcher.
//!
//! - [`GoogleSearchGateway`]: Google Programmable Search JSON API, paginated.
//! - [`HttpContentFetcher`]: plain HTTP GET with HTML-to-text normalization.
//!
//! Both are cheap to clone and safe to share across concurrent phase tasks.

use async_trait::async_trait;
use delve_core::config::{FetchConfig, SearchConfig};
use delve_core::error::WebError;
use delve_core::research::sources::{
    ContentFetcher, FetchOptions, SearchGateway, SearchOptions, SearchResult,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_SEARCH_BASE_URL: &str = "https://www.googleapis.com";
const SEARCH_PATH: &str = "/customsearch/v1";
/// The JSON API never returns more than ten items per request.
const MAX_PAGE_SIZE: usize = 10;

// ---------------------------------------------------------------------------
// GoogleSearchGateway
// ---------------------------------------------------------------------------

/// Search gateway backed by the Google Programmable Search JSON API.
#[derive(Clone)]
pub struct GoogleSearchGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    engine_id: String,
}

impl std::fmt::Debug for GoogleSearchGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSearchGateway")
            .field("base_url", &self.base_url)
            .field("engine_id", &self.engine_id)
            .finish_non_exhaustive()
    }
}

impl GoogleSearchGateway {
    /// Build a gateway, reading credentials from the environment variables
    /// named in the config.
    pub fn from_config(config: &SearchConfig) -> Result<Self, WebError> {
        Self::from_config_with(config, |var| std::env::var(var).ok())
    }

    /// Like [`from_config`](Self::from_config) with a custom variable lookup.
    pub fn from_config_with(
        config: &SearchConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, WebError> {
        let credential = |var: &str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| WebError::MissingCredentials {
                    var: var.to_string(),
                })
        };
        let api_key = credential(&config.api_key_env)?;
        let engine_id = credential(&config.engine_id_env)?;
        Self::new(
            api_key,
            engine_id,
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn new(
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, WebError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WebError::RequestFailed {
                url: DEFAULT_SEARCH_BASE_URL.to_string(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_SEARCH_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
        })
    }

    fn page_url(&self, query: &str, num: usize, start: usize) -> Result<Url, WebError> {
        search_url(&self.base_url, &self.api_key, &self.engine_id, query, num, start)
    }

    async fn fetch_page(
        &self,
        query: &str,
        num: usize,
        start: usize,
        first_position: usize,
    ) -> Result<Vec<SearchResult>, WebError> {
        let url = self.page_url(query, num, start)?;
        // Never log the full URL: it carries the API key.
        let display_url = format!("{}{}", self.base_url, SEARCH_PATH);

        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| WebError::RequestFailed {
                    url: display_url.clone(),
                    message: e.to_string(),
                })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| WebError::RequestFailed {
                url: display_url.clone(),
                message: format!("Failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            if let Some(message) = api_error_message(&body) {
                warn!(status = status.as_u16(), error = %message, "Search API rejected request");
            }
            return Err(WebError::HttpStatus {
                status: status.as_u16(),
                url: display_url,
            });
        }

        parse_search_response(&body, first_position).map_err(|e| WebError::ResponseParse {
            url: display_url,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl SearchGateway for GoogleSearchGateway {
    async fn search(
        &self,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SearchResult>, WebError> {
        options.validate()?;
        if query.trim().is_empty() {
            return Err(WebError::InvalidArguments {
                operation: "search".into(),
                reason: "query must not be empty".into(),
            });
        }

        let mut results: Vec<SearchResult> = Vec::with_capacity(options.max_results);
        let mut start = options.start_index;
        while results.len() < options.max_results {
            let num = (options.max_results - results.len()).min(MAX_PAGE_SIZE);
            let page = self.fetch_page(query, num, start, results.len() + 1).await?;
            let short = page.len() < num;
            debug!(query, start, returned = page.len(), "Search page received");
            results.extend(page);
            if short {
                break;
            }
            start += num;
        }
        results.truncate(options.max_results);
        Ok(results)
    }
}

/// Build the request URL for one result page.
pub fn search_url(
    base_url: &str,
    api_key: &str,
    engine_id: &str,
    query: &str,
    num: usize,
    start: usize,
) -> Result<Url, WebError> {
    let endpoint = format!("{}{}", base_url.trim_end_matches('/'), SEARCH_PATH);
    let num = num.to_string();
    let start = start.to_string();
    Url::parse_with_params(
        &endpoint,
        &[
            ("key", api_key),
            ("cx", engine_id),
            ("q", query),
            ("num", num.as_str()),
            ("start", start.as_str()),
        ],
    )
    .map_err(|e| WebError::InvalidArguments {
        operation: "search".into(),
        reason: format!("invalid search endpoint {}: {}", endpoint, e),
    })
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: String,
}

/// Parse one JSON API page. Items without a link are skipped; positions
/// count up from `first_position` over the kept items.
pub fn parse_search_response(
    body: &str,
    first_position: usize,
) -> Result<Vec<SearchResult>, serde_json::Error> {
    let page: SearchPage = serde_json::from_str(body)?;
    Ok(page
        .items
        .into_iter()
        .filter_map(|item| {
            let url = item.link.filter(|l| !l.trim().is_empty())?;
            Some((item.title, url, item.snippet))
        })
        .enumerate()
        .map(|(i, (title, url, snippet))| SearchResult {
            title: title.trim().to_string(),
            url,
            snippet: snippet.split_whitespace().collect::<Vec<_>>().join(" "),
            position: first_position + i,
        })
        .collect())
}

/// The `error.message` field of an API error body, if present.
fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// HttpContentFetcher
// ---------------------------------------------------------------------------

/// Fetch a URL and normalize it to readable text.
#[derive(Debug, Clone)]
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn from_config(config: &FetchConfig) -> Result<Self, WebError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| WebError::RequestFailed {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, url: &str, options: FetchOptions) -> Result<String, WebError> {
        let parsed = validate_fetch_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| WebError::RequestFailed {
                url: url.to_string(),
                message: if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    e.to_string()
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        let body = response
            .text()
            .await
            .map_err(|e| WebError::RequestFailed {
                url: url.to_string(),
                message: format!("Failed to read response body: {}", e),
            })?;

        let text = normalize_body(&content_type, &body);
        debug!(url, content_type = %content_type, chars = text.chars().count(), "Fetched page");
        Ok(options.window(&text))
    }
}

fn validate_fetch_url(url: &str) -> Result<Url, WebError> {
    let parsed = Url::parse(url).map_err(|e| WebError::InvalidArguments {
        operation: "fetch".into(),
        reason: format!("invalid URL {}: {}", url, e),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(WebError::InvalidArguments {
            operation: "fetch".into(),
            reason: format!("unsupported URL scheme: {}", other),
        }),
    }
}

/// HTML bodies become text; anything else passes through unchanged.
pub fn normalize_body(content_type: &str, body: &str) -> String {
    let declared_html =
        content_type.contains("text/html") || content_type.contains("application/xhtml");
    if declared_html || looks_like_html(body) {
        extract_text_from_html(body)
    } else {
        body.to_string()
    }
}

fn looks_like_html(body: &str) -> bool {
    let head: String = body
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(15)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Elements that start a new line in extracted text.
const BLOCK_TAGS: &[&str] = &[
    "p", "br", "div", "section", "article", "header", "footer", "h1", "h2", "h3", "h4", "h5",
    "h6", "li", "ul", "ol", "tr", "table", "blockquote", "pre", "hr",
];

/// Elements whose content is never readable text.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Simple HTML-to-text extraction.
///
/// Drops script and style content, breaks lines at block elements, decodes
/// common entities, and collapses blank lines.
pub fn extract_text_from_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len() / 2);
    let mut in_tag = false;
    let mut building_name = false;
    let mut tag_name = String::new();
    let mut skipping: Option<&'static str> = None;

    for ch in html.chars() {
        if ch == '<' {
            in_tag = true;
            building_name = true;
            tag_name.clear();
            continue;
        }
        if in_tag {
            if ch == '>' {
                in_tag = false;
                let name = tag_name.to_ascii_lowercase();
                let (closing, bare) = match name.strip_prefix('/') {
                    Some(rest) => (true, rest),
                    None => (false, name.as_str()),
                };
                match skipping {
                    Some(open) if closing && bare == open => skipping = None,
                    Some(_) => {}
                    None => {
                        if let Some(tag) = SKIPPED_TAGS.iter().find(|t| **t == bare) {
                            if !closing {
                                skipping = Some(*tag);
                            }
                        } else if BLOCK_TAGS.contains(&bare) {
                            text.push('\n');
                        }
                    }
                }
            } else if building_name
                && (ch.is_ascii_alphanumeric() || (ch == '/' && tag_name.is_empty()))
            {
                tag_name.push(ch);
            } else {
                building_name = false;
            }
            continue;
        }
        if skipping.is_none() {
            text.push(ch);
        }
    }

    let text = decode_entities(&text);

    let mut lines: Vec<&str> = text.lines().map(str::trim).collect();
    lines.retain(|l| !l.is_empty());
    lines.join("\n")
}

fn decode_entities(text: &str) -> String {
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&mdash;", "\u{2014}")
        .replace("&ndash;", "\u{2013}");
    decode_numeric_entities(&text).replace("&amp;", "&")
}

/// Decode `&#NNN;` and `&#xHH;` references; malformed ones are left as is.
fn decode_numeric_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(idx) = rest.find("&#") {
        out.push_str(&rest[..idx]);
        let candidate = &rest[idx + 2..];
        let decoded = candidate.find(';').filter(|end| *end <= 8).and_then(|end| {
            let digits = &candidate[..end];
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => digits.parse::<u32>().ok(),
            }?;
            char::from_u32(code).map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &candidate[end + 1..];
            }
            None => {
                out.push_str("&#");
                rest = candidate;
            }
        }
    }
    out.push_str(rest);
    out
}

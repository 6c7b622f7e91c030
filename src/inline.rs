//! Resource inliner – turns a document with externally hosted images into a
//! self-contained one.
//!
//! Absolute HTTP(S) URLs found in `src` attributes and CSS `url(...)`
//! expressions are fetched concurrently and every occurrence that stands as a
//! whole value is replaced by a base64 data URL. A resource that cannot be fetched is left as it is; the
//! render surface later sees a broken reference for that one image, which
//! is a degraded result rather than a failed conversion.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use thiserror::Error;
use tokio::task::JoinSet;

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

/// Raw bytes of a fetched resource and its declared content type.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl FetchedResource {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }
}

/// Why a single resource could not be embedded.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("could not read response body: {0}")]
    Body(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("fetch task failed: {0}")]
    Task(String),
}

/// Source of resource bytes. Implementations block; the inliner runs them on
/// the blocking pool.
pub trait ResourceFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError>;
}

/// Default fetcher backed by a `ureq` agent.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// `timeout` bounds the whole request, body included.
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let mut response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::StatusCode(code) => FetchError::Status(code),
            other => FetchError::Transport(other.to_string()),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response.body().mime_type().map(str::to_string);
        let bytes = response
            .body_mut()
            .read_to_vec()
            .map_err(|e| FetchError::Body(e.to_string()))?;

        Ok(FetchedResource::new(bytes, content_type))
    }
}

// ---------------------------------------------------------------------------
// URL discovery
// ---------------------------------------------------------------------------

/// Distinct absolute HTTP(S) URLs referenced by `src` attributes or CSS
/// `url(...)`, in order of first appearance.
pub fn extract_resource_urls(html: &str) -> Vec<String> {
    let mut found: Vec<(usize, &str)> = src_attribute_values(html);
    found.extend(css_url_values(html));
    found.sort_by_key(|(pos, _)| *pos);

    let mut seen: HashSet<&str> = HashSet::new();
    let mut urls = Vec::new();
    for (_, value) in found {
        let value = value.trim();
        if is_http_url(value) && seen.insert(value) {
            urls.push(value.to_string());
        }
    }
    urls
}

fn is_http_url(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    matches!(rest, Some(r) if !r.is_empty())
}

/// Values of quoted `src` attributes, with their byte offsets.
fn src_attribute_values(html: &str) -> Vec<(usize, &str)> {
    let bytes = html.as_bytes();
    let mut values = Vec::new();

    // ASCII lowercasing keeps every byte offset, so matches index `html` too.
    let lower = html.to_ascii_lowercase();
    for (start, _) in lower.match_indices("src") {
        // Whole attribute name only: `data-src` and `srcset` do not count.
        let boundary = start == 0
            || matches!(bytes[start - 1], b' ' | b'\t' | b'\n' | b'\r' | b'"' | b'\'' | b'/');
        if !boundary {
            continue;
        }
        let mut pos = skip_ascii_whitespace(bytes, start + 3);
        if bytes.get(pos) != Some(&b'=') {
            continue;
        }
        pos = skip_ascii_whitespace(bytes, pos + 1);
        let quote = match bytes.get(pos) {
            Some(q @ (b'"' | b'\'')) => *q,
            _ => continue,
        };
        let value_start = pos + 1;
        if let Some(len) = bytes[value_start..].iter().position(|b| *b == quote) {
            values.push((value_start, &html[value_start..value_start + len]));
        }
    }
    values
}

/// Arguments of CSS `url(...)` functions (quoted or bare), with their byte
/// offsets.
fn css_url_values(html: &str) -> Vec<(usize, &str)> {
    let bytes = html.as_bytes();
    let mut values = Vec::new();

    let lower = html.to_ascii_lowercase();
    for (start, _) in lower.match_indices("url(") {
        let pos = skip_ascii_whitespace(bytes, start + 4);
        match bytes.get(pos) {
            Some(q @ (b'"' | b'\'')) => {
                let quote = *q;
                let value_start = pos + 1;
                if let Some(len) = bytes[value_start..].iter().position(|b| *b == quote) {
                    values.push((value_start, &html[value_start..value_start + len]));
                }
            }
            Some(_) => {
                if let Some(len) = bytes[pos..].iter().position(|b| *b == b')') {
                    values.push((pos, &html[pos..pos + len]));
                }
            }
            None => {}
        }
    }
    values
}

fn skip_ascii_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

// ---------------------------------------------------------------------------
// Data URLs
// ---------------------------------------------------------------------------

/// Encode a fetched resource as `data:<mime>;base64,<payload>`.
pub fn to_data_url(url: &str, resource: &FetchedResource) -> String {
    let mime = resolve_mime(url, resource);
    format!("data:{mime};base64,{}", BASE64_STD.encode(&resource.bytes))
}

/// Split a `data:` URL into its MIME type and decoded payload.
pub fn decode_data_url(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.trim().strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("text/plain")
        .to_string();
    let data = if header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        BASE64_STD.decode(compact).ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn resolve_mime(url: &str, resource: &FetchedResource) -> String {
    if let Some(declared) = &resource.content_type {
        let essence = declared
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        if !essence.is_empty() && essence != "application/octet-stream" {
            return essence;
        }
    }
    if let Ok(format) = image::guess_format(&resource.bytes) {
        return format.to_mime_type().to_string();
    }
    mime_from_extension(url)
        .unwrap_or("application/octet-stream")
        .to_string()
}

fn mime_from_extension(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit_once('.')?.1.to_ascii_lowercase();
    Some(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "ico" => "image/x-icon",
        "css" => "text/css",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Inlining
// ---------------------------------------------------------------------------

/// Result of [`embed_external_resources`].
#[derive(Debug, Clone, Default)]
pub struct InlineOutcome {
    /// The rewritten document.
    pub html: String,
    /// URLs replaced by data URLs, in order of first appearance.
    pub embedded: Vec<String>,
    /// URLs left untouched because fetching failed, in order of first
    /// appearance.
    pub unembedded: Vec<String>,
}

/// Fetch every distinct external resource concurrently and inline the ones
/// that succeed. Never fails; see [`InlineOutcome::unembedded`].
pub async fn embed_external_resources(
    html: &str,
    fetcher: Arc<dyn ResourceFetcher>,
    timeout: Duration,
) -> InlineOutcome {
    let urls = extract_resource_urls(html);
    if urls.is_empty() {
        log::debug!("No external resources to embed");
        return InlineOutcome {
            html: html.to_string(),
            ..InlineOutcome::default()
        };
    }
    log::debug!("Embedding {} external resource(s)", urls.len());

    let mut tasks = JoinSet::new();
    for url in &urls {
        let fetcher = Arc::clone(&fetcher);
        let url = url.clone();
        tasks.spawn(async move {
            let result = fetch_with_timeout(fetcher, url.clone(), timeout).await;
            (url, result)
        });
    }

    let mut resolved: Vec<(String, String)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((url, Ok(resource))) => {
                let data_url = to_data_url(&url, &resource);
                resolved.push((url, data_url));
            }
            Ok((url, Err(e))) => log::warn!("Leaving resource unembedded – {url}: {e}"),
            Err(e) => log::warn!("Resource fetch task aborted: {e}"),
        }
    }

    let out = replace_whole_urls(html, &resolved);

    let resolved_urls: HashSet<&str> = resolved.iter().map(|(u, _)| u.as_str()).collect();
    let (embedded, unembedded): (Vec<String>, Vec<String>) = urls
        .into_iter()
        .partition(|u| resolved_urls.contains(u.as_str()));

    InlineOutcome {
        html: out,
        embedded,
        unembedded,
    }
}

/// Replace every occurrence of each resolved URL that stands as a whole
/// value, i.e. is not directly preceded or followed by more URL text.
///
/// All matches are taken from the original text in a single pass, so a
/// resolved URL that prefixes a longer, unresolved one leaves the longer one
/// intact.
fn replace_whole_urls(html: &str, resolved: &[(String, String)]) -> String {
    let bytes = html.as_bytes();
    let mut matches: Vec<(usize, usize, &str)> = Vec::new();
    for (url, data_url) in resolved {
        for (start, _) in html.match_indices(url.as_str()) {
            let end = start + url.len();
            let opens = start == 0 || opens_value(bytes[start - 1]);
            let closes = end == bytes.len() || closes_value(bytes[end]);
            if opens && closes {
                matches.push((start, end, data_url.as_str()));
            }
        }
    }
    // Earliest first; at the same offset the longer URL wins.
    matches.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for (start, end, data_url) in matches {
        if start < cursor {
            continue;
        }
        out.push_str(&html[cursor..start]);
        out.push_str(data_url);
        cursor = end;
    }
    out.push_str(&html[cursor..]);
    out
}

fn opens_value(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'"' | b'\'' | b'(' | b'=' | b'>')
}

fn closes_value(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'"' | b'\'' | b')' | b'<')
}

async fn fetch_with_timeout(
    fetcher: Arc<dyn ResourceFetcher>,
    url: String,
    timeout: Duration,
) -> Result<FetchedResource, FetchError> {
    let task = tokio::task::spawn_blocking(move || fetcher.fetch(&url));
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(FetchError::Task(join_err.to_string())),
        Err(_) => Err(FetchError::Timeout(timeout.as_millis() as u64)),
    }
}

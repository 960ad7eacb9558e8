use std::thread;
use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::Response;
use serde::Deserialize;

use crate::config::CatalogSettings;
use crate::domain::SearchRequest;
use crate::error::HlsError;
use crate::session::EarthdataSession;

/// One granule as returned by the catalog, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawEntry {
    pub title: String,
    #[serde(default)]
    pub links: Vec<RawLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawLink {
    #[serde(default)]
    pub rel: String,
    pub href: String,
}

impl RawLink {
    pub fn new(rel: &str, href: &str) -> Self {
        Self {
            rel: rel.to_string(),
            href: href.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CmrResponse {
    feed: CmrFeed,
}

#[derive(Debug, Deserialize)]
struct CmrFeed {
    #[serde(default)]
    entry: Vec<RawEntry>,
}

pub trait CatalogClient: Send + Sync {
    fn search(&self, request: &SearchRequest) -> Result<Vec<RawEntry>, HlsError>;
}

/// Granule search against NASA's Common Metadata Repository.
#[derive(Clone)]
pub struct CmrHttpClient {
    session: EarthdataSession,
    settings: CatalogSettings,
}

impl CmrHttpClient {
    pub fn new(session: EarthdataSession, settings: CatalogSettings) -> Self {
        Self { session, settings }
    }

    pub fn search_url(&self, request: &SearchRequest) -> Result<Url, HlsError> {
        let page_size = self.settings.page_size.to_string();
        let temporal = request.temporal();
        Url::parse_with_params(
            &self.settings.url,
            &[
                ("short_name", self.settings.short_name.as_str()),
                ("version", self.settings.version.as_str()),
                ("temporal", temporal.as_str()),
                ("page_size", page_size.as_str()),
            ],
        )
        .map_err(|err| HlsError::CatalogHttp(err.to_string()))
    }

    fn handle_status(response: Response) -> Result<Response, HlsError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "catalog request failed".to_string());
        Err(HlsError::CatalogStatus { status, message })
    }

    fn send_with_retries(&self, url: &Url) -> Result<Response, HlsError> {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            match self.session.send(url.clone()) {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::warn!(status, attempt, "catalog busy, retrying");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        tracing::warn!(error = %err, attempt, "catalog unreachable, retrying");
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(HlsError::CatalogHttp(err.to_string()));
                }
            }
        }
    }
}

impl CatalogClient for CmrHttpClient {
    fn search(&self, request: &SearchRequest) -> Result<Vec<RawEntry>, HlsError> {
        let url = self.search_url(request)?;
        tracing::info!(
            tile = %request.tile(),
            start = %request.start_date(),
            end = %request.end_date(),
            "searching catalog"
        );
        let response = self.send_with_retries(&url)?;
        let response = Self::handle_status(response)?;
        let body = response
            .text()
            .map_err(|err| HlsError::CatalogHttp(err.to_string()))?;
        let entries = parse_feed(&body)?;
        tracing::debug!(entries = entries.len(), "catalog responded");
        Ok(entries)
    }
}

/// Parses a CMR `granules.json` body into raw entries.
pub fn parse_feed(body: &str) -> Result<Vec<RawEntry>, HlsError> {
    let response: CmrResponse =
        serde_json::from_str(body).map_err(|err| HlsError::CatalogParse(err.to_string()))?;
    Ok(response.feed.entry)
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

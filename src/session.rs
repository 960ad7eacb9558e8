use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;

use crate::credentials::Credentials;
use crate::error::HlsError;

pub const EARTHDATA_LOGIN_HOST: &str = "urs.earthdata.nasa.gov";
const MAX_REDIRECTS: usize = 10;
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Persistent HTTP session shared by the catalog and download clients.
///
/// Redirects are followed by hand so that basic auth can be re-attached when
/// the data host bounces the request through the Earthdata login host. The
/// cookie store keeps the resulting session cookie for later requests.
#[derive(Clone)]
pub struct EarthdataSession {
    client: Client,
    credentials: Option<Credentials>,
}

impl EarthdataSession {
    pub fn new(timeout: Duration, credentials: Option<Credentials>) -> Result<Self, HlsError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("hls-fetch/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HlsError::CatalogHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout)
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .map_err(|err| HlsError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            credentials,
        })
    }

    pub fn send(&self, url: Url) -> reqwest::Result<Response> {
        let origin_host = url.host_str().map(str::to_string);
        let mut current = url;
        let mut redirects = 0usize;
        loop {
            let mut request = self.client.get(current.clone());
            if let Some(credentials) = &self.credentials {
                if should_authenticate(&current, origin_host.as_deref()) {
                    request = request.basic_auth(&credentials.username, Some(&credentials.password));
                }
            }
            let response = request.send()?;
            if !response.status().is_redirection() || redirects >= MAX_REDIRECTS {
                return Ok(response);
            }
            let next = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|location| current.join(location).ok());
            let Some(next) = next else {
                return Ok(response);
            };
            tracing::debug!(from = %current, to = %next, "following redirect");
            current = next;
            redirects += 1;
        }
    }
}

fn should_authenticate(url: &Url, origin_host: Option<&str>) -> bool {
    match url.host_str() {
        Some(host) if host == EARTHDATA_LOGIN_HOST => url.scheme() == "https",
        Some(host) => Some(host) == origin_host,
        None => false,
    }
}

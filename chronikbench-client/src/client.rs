use std::sync::Arc;
use std::time::Duration;

use chronikbench::MAX_PAGE_SIZE;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use crate::dns::{DEFAULT_DNS_URL, DohResolver};
use crate::error::{ClientError, Result};
use crate::geo::{DEFAULT_GEO_URL, IpApiLocator};
use crate::node::HttpNodeConnector;

/// Default TCP connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default overall timeout of a single HTTP request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Builder for the HTTP collaborators of a benchmark engine
///
/// All collaborators share one connection pool.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    connect_timeout: Duration,
    request_timeout: Duration,
    dns_url: String,
    geo_url: String,
    page_size: usize,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            dns_url: DEFAULT_DNS_URL.to_string(),
            geo_url: DEFAULT_GEO_URL.to_string(),
            page_size: MAX_PAGE_SIZE,
        }
    }
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the DNS-over-HTTPS JSON endpoint
    pub fn dns_url(mut self, url: impl Into<String>) -> Self {
        self.dns_url = url.into();
        self
    }

    /// Set the geolocation endpoint (without the trailing `/{ip}`)
    pub fn geo_url(mut self, url: impl Into<String>) -> Self {
        self.geo_url = url.into();
        self
    }

    /// Set the gateway page size used when an offset is not page aligned
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Build the collaborators
    pub fn build(self) -> Result<Collaborators> {
        let http = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .build()?;

        let dns_url = Url::parse(&self.dns_url)?;
        let geo_url = Url::parse(&self.geo_url)?;

        Ok(Collaborators {
            connector: Arc::new(HttpNodeConnector::new(http.clone(), self.page_size)),
            resolver: Arc::new(DohResolver::new(http.clone(), dns_url)),
            locator: Arc::new(IpApiLocator::new(http, geo_url)),
        })
    }
}

/// Node connector, name resolver and geolocator over one HTTP client
#[derive(Clone)]
pub struct Collaborators {
    pub connector: Arc<HttpNodeConnector>,
    pub resolver: Arc<DohResolver>,
    pub locator: Arc<IpApiLocator>,
}

/// GET `url` and decode the JSON body
///
/// 404 is reported as [`ClientError::NotFound`] so callers can tell a
/// missing capability from a failing one.
pub(crate) async fn get_json<T: DeserializeOwned>(http: &reqwest::Client, url: Url) -> Result<T> {
    let response = http.get(url.clone()).send().await?;

    match response.status() {
        status if status.is_success() => Ok(response.json::<T>().await?),
        StatusCode::NOT_FOUND => Err(ClientError::NotFound(url.path().to_string())),
        status => Err(ClientError::Status(status.as_u16())),
    }
}

/// Append `segments` to the path of `base`, keeping its query untouched
pub(crate) fn join_path(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidResponse(format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_path_keeps_prefix() {
        let base = Url::parse("https://chronik.pay2stay.com/xec2").unwrap();
        let url = join_path(&base, &["blockchain-info"]).unwrap();
        assert_eq!(url.as_str(), "https://chronik.pay2stay.com/xec2/blockchain-info");
    }

    #[test]
    fn test_join_path_trailing_slash() {
        let base = Url::parse("https://chronik.e.cash/").unwrap();
        let url = join_path(&base, &["address", "ecash:qq", "history"]).unwrap();
        assert_eq!(url.as_str(), "https://chronik.e.cash/address/ecash:qq/history");
    }

    #[test]
    fn test_build_rejects_bad_collaborator_url() {
        let result = ClientBuilder::new().dns_url("not a url").build();
        assert!(matches!(result, Err(ClientError::Url(_))));
    }
}

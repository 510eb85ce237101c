//! Geolocation through the ip-api JSON endpoint
//!
//! The service answers `200` even when it cannot place an address; such
//! answers carry `status: "fail"` and are passed through for the engine to
//! turn into `Unknown`.

use async_trait::async_trait;
use chronikbench::core::client::GeoResponse;
use chronikbench::{GeoLocator, LookupError};
use url::Url;

use crate::client::{get_json, join_path};

/// Geolocation service used when none is configured
pub const DEFAULT_GEO_URL: &str = "http://ip-api.com/json";

const NODE_FIELDS: &str = "status,country,city";
const SELF_FIELDS: &str = "status,country,city,query";

pub struct IpApiLocator {
    http: reqwest::Client,
    url: Url,
}

impl IpApiLocator {
    pub fn new(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }

    fn lookup_url(&self, ip: Option<&str>, fields: &str) -> Result<Url, LookupError> {
        let mut url = match ip {
            Some(ip) => join_path(&self.url, &[ip])?,
            None => join_path(&self.url, &[""])?,
        };
        url.query_pairs_mut().append_pair("fields", fields);
        Ok(url)
    }
}

#[async_trait]
impl GeoLocator for IpApiLocator {
    async fn locate(&self, ip: &str) -> Result<GeoResponse, LookupError> {
        let url = self.lookup_url(Some(ip), NODE_FIELDS)?;
        let mut response: GeoResponse = get_json(&self.http, url).await?;
        response.query.get_or_insert_with(|| ip.to_string());
        Ok(response)
    }

    async fn locate_self(&self) -> Result<GeoResponse, LookupError> {
        let url = self.lookup_url(None, SELF_FIELDS)?;
        Ok(get_json(&self.http, url).await?)
    }
}

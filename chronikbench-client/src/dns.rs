//! Name resolution over a DNS-over-HTTPS JSON API
//!
//! Speaks the `application/dns-json` dialect served by public resolvers:
//! `GET {url}?name=<host>&type=A` answering `{"Answer": [{"type": 1, "data": "..."}]}`.

use async_trait::async_trait;
use chronikbench::core::client::DnsRecord;
use chronikbench::{LookupError, NameResolver};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::client::get_json;

/// Public resolver used when none is configured
pub const DEFAULT_DNS_URL: &str = "https://dns.google/resolve";

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

pub struct DohResolver {
    http: reqwest::Client,
    url: Url,
}

impl DohResolver {
    pub fn new(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }

    fn query_url(&self, name: &str) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("name", name)
            .append_pair("type", "A");
        url
    }
}

#[async_trait]
impl NameResolver for DohResolver {
    async fn lookup(&self, name: &str) -> Result<Vec<DnsRecord>, LookupError> {
        let response: DohResponse = get_json(&self.http, self.query_url(name)).await?;
        debug!("{} answered with {} record(s)", name, response.answer.len());

        Ok(response
            .answer
            .into_iter()
            .map(|answer| DnsRecord::new(answer.record_type, answer.data))
            .collect())
    }
}

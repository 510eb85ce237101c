//! Node capability client for JSON-speaking indexer gateways
//!
//! # Endpoints
//!
//! All paths are relative to the node URL, so path-prefixed deployments
//! (`https://host/xec2`) work unchanged.
//!
//! - `GET /blockchain-info` → `{"tipHash": "...", "tipHeight": 900000}`
//! - `GET /address/{address}/history?page=N&page_size=M` → `{"txs": [...], "numPages": 5, "numTxs": 1000}`
//! - `GET /plugin/agora/{group}/history?page=N&page_size=M` → `{"offers": [...], "numPages": 1, "numTxs": 2}`
//!
//! The agora group of a token is the token id prefixed with the `54` group
//! byte. A `404` on the plugin path means the node does not serve offers.

use std::sync::Arc;

use async_trait::async_trait;
use chronikbench::core::client::{BlockchainInfo, OfferHistory, TxHistoryPage};
use chronikbench::{NodeClient, NodeConnector, NodeEndpoint, NodeError};
use tracing::debug;
use url::Url;

use crate::client::{get_json, join_path};
use crate::error::Result;

/// Agora group prefix selecting offers by token id
pub const AGORA_TOKEN_GROUP_PREFIX: &str = "54";

pub struct HttpNodeConnector {
    http: reqwest::Client,
    page_size: usize,
}

impl HttpNodeConnector {
    pub fn new(http: reqwest::Client, page_size: usize) -> Self {
        Self {
            http,
            page_size: page_size.max(1),
        }
    }
}

impl NodeConnector for HttpNodeConnector {
    fn connect(&self, endpoint: &NodeEndpoint) -> std::result::Result<Arc<dyn NodeClient>, NodeError> {
        let base = endpoint.url()?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(NodeError::InvalidEndpoint(format!(
                "{endpoint}: expected an http(s) URL"
            )));
        }
        Ok(Arc::new(HttpNodeClient {
            http: self.http.clone(),
            base,
            page_size: self.page_size,
        }))
    }
}

pub struct HttpNodeClient {
    http: reqwest::Client,
    base: Url,
    page_size: usize,
}

impl HttpNodeClient {
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn paged_url(&self, segments: &[&str], page: usize, page_size: usize) -> Result<Url> {
        let mut url = join_path(&self.base, segments)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("page_size", &page_size.to_string());
        Ok(url)
    }

    async fn history_page(&self, address: &str, page: usize, page_size: usize) -> Result<TxHistoryPage> {
        let url = self.paged_url(&["address", address, "history"], page, page_size)?;
        get_json(&self.http, url).await
    }
}

/// Page size and first page index covering `offset`
fn page_window(offset: usize, limit: usize, gateway_page_size: usize) -> (usize, usize) {
    if offset % limit == 0 {
        (limit, offset / limit)
    } else {
        (gateway_page_size, offset / gateway_page_size)
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn blockchain_info(&self) -> std::result::Result<BlockchainInfo, NodeError> {
        let url = join_path(&self.base, &["blockchain-info"])?;
        Ok(get_json(&self.http, url).await?)
    }

    async fn address_history(
        &self,
        address: &str,
        offset: usize,
        limit: usize,
    ) -> std::result::Result<TxHistoryPage, NodeError> {
        if limit == 0 {
            return Ok(TxHistoryPage::default());
        }

        let (page_size, mut page) = page_window(offset, limit, self.page_size);
        let mut skip = offset - page * page_size;
        let mut collected = TxHistoryPage::default();

        loop {
            let fetched = self.history_page(address, page, page_size).await?;
            let returned = fetched.txs.len();
            let wanted = limit - collected.txs.len();
            collected
                .txs
                .extend(fetched.txs.into_iter().skip(skip).take(wanted));
            collected.num_pages = fetched.num_pages;
            collected.num_txs = fetched.num_txs;

            if collected.txs.len() >= limit || returned < page_size {
                break;
            }
            debug!("Offset {} spans pages, fetching page {}", offset, page + 1);
            page += 1;
            skip = 0;
        }

        Ok(collected)
    }

    async fn historic_offers(
        &self,
        token_id: &str,
        page: usize,
        page_size: usize,
    ) -> std::result::Result<OfferHistory, NodeError> {
        let group = format!("{AGORA_TOKEN_GROUP_PREFIX}{token_id}");
        let url = self.paged_url(&["plugin", "agora", &group, "history"], page, page_size)?;
        Ok(get_json(&self.http, url).await?)
    }
}

//! Budgeted pagination over a node's address history
//!
//! Pages are requested strictly in offset order. The fetch stops at the
//! record budget, or earlier when a page comes back short, which signals
//! that the node has no more records for the address.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::FetchError;
use super::MAX_PAGE_SIZE;
use super::cancel::{cancellable, check};
use super::client::NodeClient;
use super::payload;

/// Records and payload size accumulated by a fetch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOutcome {
    pub txs: Vec<Value>,
    pub payload_bytes: u64,
    pub pages: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct PaginatedFetcher {
    page_size_ceiling: usize,
}

impl Default for PaginatedFetcher {
    fn default() -> Self {
        Self {
            page_size_ceiling: MAX_PAGE_SIZE,
        }
    }
}

impl PaginatedFetcher {
    pub fn new(page_size_ceiling: usize) -> Self {
        Self {
            page_size_ceiling: page_size_ceiling.max(1),
        }
    }

    pub fn page_size_ceiling(&self) -> usize {
        self.page_size_ceiling
    }

    /// Number of page requests needed to cover `record_budget`
    pub fn page_count(&self, record_budget: usize) -> usize {
        record_budget.div_ceil(self.page_size_ceiling)
    }

    /// Fetch up to `record_budget` history records for `address`
    ///
    /// The cancellation token is checked before every page request; an
    /// abort surfaces as [`FetchError::Cancelled`], never as a node error.
    pub async fn fetch(
        &self,
        client: &dyn NodeClient,
        address: &str,
        record_budget: usize,
        cancel: &CancellationToken,
    ) -> Result<FetchOutcome, FetchError> {
        let mut outcome = FetchOutcome::default();

        for page in 0..self.page_count(record_budget) {
            check(cancel)?;

            let offset = page * self.page_size_ceiling;
            let page_size = self.page_size_ceiling.min(record_budget - offset);
            let history = cancellable(cancel, client.address_history(address, offset, page_size))
                .await??;
            outcome.pages += 1;

            match payload::document_len(&history) {
                Ok(len) => outcome.payload_bytes += len,
                Err(e) => warn!("Error calculating data size: {}", e),
            }

            let returned = history.txs.len();
            outcome.txs.extend(history.txs);

            if returned < page_size {
                debug!(
                    "Short page at offset {} ({} of {}), history exhausted",
                    offset, returned, page_size
                );
                break;
            }
        }

        Ok(outcome)
    }
}

//! Connection latency estimation
//!
//! Round trips are issued one after another, never in parallel, so the
//! result reflects sustained request latency rather than burst throughput.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::cancel::{Cancelled, cancellable};
use super::client::NodeClient;
use super::types::Timing;

/// Number of metadata round trips averaged per probe
pub const PROBE_ROUNDS: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct LatencyProber {
    rounds: u32,
}

impl Default for LatencyProber {
    fn default() -> Self {
        Self {
            rounds: PROBE_ROUNDS,
        }
    }
}

impl LatencyProber {
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds: rounds.max(1),
        }
    }

    /// Mean metadata round-trip time, rounded to the nearest millisecond
    ///
    /// Any failed round abandons the whole probe and yields
    /// [`Timing::NotAvailable`]; partial averages are never reported.
    pub async fn probe(
        &self,
        client: &dyn NodeClient,
        cancel: &CancellationToken,
    ) -> Result<Timing, Cancelled> {
        let mut total_micros: u128 = 0;

        for round in 0..self.rounds {
            let start = Instant::now();
            if let Err(e) = cancellable(cancel, client.blockchain_info()).await? {
                warn!("Response time measurement failed on round {}: {}", round + 1, e);
                return Ok(Timing::NotAvailable);
            }
            total_micros += start.elapsed().as_micros();
        }

        let mean_ms = total_micros as f64 / 1000.0 / f64::from(self.rounds);
        let rounded = mean_ms.round() as u64;
        debug!("Probe mean latency {}ms over {} rounds", rounded, self.rounds);
        Ok(Timing::Millis(rounded))
    }
}

//! Memoized hostname and location lookups
//!
//! The cache is the only state shared between concurrently running
//! sub-tests. Each key maps to at most one value; values are idempotent
//! lookups, so a write simply replaces whatever a concurrent writer stored.
//! Lookups of one key are serialized: a caller that finds a lookup for its
//! key in flight waits for it and re-reads the cache, so concurrent sub-tests
//! of a node share a single collaborator call. Failures are never cached, so
//! the next access retries the collaborator.
//!
//! Entries live for the whole process and survive across runs.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::Mutex as KeyLock;
use tracing::{debug, warn};

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

use super::client::{DnsRecord, GeoLocator, NameResolver};
use super::types::UNKNOWN;

pub struct ResolutionCache {
    resolver: Arc<dyn NameResolver>,
    locator: Arc<dyn GeoLocator>,
    addresses: RwLock<HashMap<String, String>>,
    locations: RwLock<HashMap<String, String>>,
    address_lookups: InFlight,
    location_lookups: InFlight,
}

/// Per-key locks of the lookups currently running
#[derive(Default)]
struct InFlight {
    keys: Mutex<HashMap<String, Arc<KeyLock<()>>>>,
}

impl InFlight {
    fn gate(&self, key: &str) -> Arc<KeyLock<()>> {
        self.keys
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(KeyLock::new(())))
            .clone()
    }

    /// Forget the gate of `key` once no other caller holds it
    fn release(&self, key: &str, gate: Arc<KeyLock<()>>) {
        let mut keys = self.keys.lock();
        let current = keys.get(key).is_some_and(|held| Arc::ptr_eq(held, &gate));
        // one reference in the map, one here
        if current && Arc::strong_count(&gate) <= 2 {
            keys.remove(key);
        }
    }
}

impl ResolutionCache {
    pub fn new(resolver: Arc<dyn NameResolver>, locator: Arc<dyn GeoLocator>) -> Self {
        Self {
            resolver,
            locator,
            addresses: RwLock::new(HashMap::new()),
            locations: RwLock::new(HashMap::new()),
            address_lookups: InFlight::default(),
            location_lookups: InFlight::default(),
        }
    }

    /// Cached address for `hostname`, without touching the network
    pub fn cached_address(&self, hostname: &str) -> Option<String> {
        self.addresses.read().get(hostname).cloned()
    }

    /// Cached location label for `ip`, without touching the network
    pub fn cached_location(&self, ip: &str) -> Option<String> {
        self.locations.read().get(ip).cloned()
    }

    pub fn record_address(&self, hostname: &str, ip: &str) {
        self.addresses
            .write()
            .insert(hostname.to_string(), ip.to_string());
    }

    pub fn record_location(&self, ip: &str, label: &str) {
        self.locations
            .write()
            .insert(ip.to_string(), label.to_string());
    }

    /// Address of `hostname`, resolving and caching it on a miss
    ///
    /// When the direct answer carries no address record, the first answer is
    /// treated as an alias target and looked up once more. There is no
    /// further indirection.
    pub async fn resolve(&self, hostname: &str) -> Option<String> {
        if let Some(ip) = self.cached_address(hostname) {
            return Some(ip);
        }

        let gate = self.address_lookups.gate(hostname);
        let ip = {
            let _guard = gate.lock().await;
            match self.cached_address(hostname) {
                Some(ip) => Some(ip),
                None => self.lookup_address(hostname).await,
            }
        };
        self.address_lookups.release(hostname, gate);
        ip
    }

    async fn lookup_address(&self, hostname: &str) -> Option<String> {
        let records = match self.resolver.lookup(hostname).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Unable to resolve IP address for {}: {}", hostname, e);
                return None;
            }
        };

        let ip = match first_address(&records) {
            Some(ip) => Some(ip),
            None => match records.first() {
                Some(alias) if !alias.data.is_empty() => {
                    debug!("Following alias {} -> {}", hostname, alias.data);
                    match self.resolver.lookup(&alias.data).await {
                        Ok(records) => first_address(&records),
                        Err(e) => {
                            warn!("Unable to resolve alias {}: {}", alias.data, e);
                            None
                        }
                    }
                }
                _ => None,
            },
        };

        if let Some(ip) = &ip {
            self.record_address(hostname, ip);
        }
        ip
    }

    /// Location label for `ip`, or `Unknown` when the lookup fails
    pub async fn locate(&self, ip: &str) -> String {
        if let Some(label) = self.cached_location(ip) {
            return label;
        }

        let gate = self.location_lookups.gate(ip);
        let label = {
            let _guard = gate.lock().await;
            match self.cached_location(ip) {
                Some(label) => label,
                None => self.lookup_location(ip).await,
            }
        };
        self.location_lookups.release(ip, gate);
        label
    }

    async fn lookup_location(&self, ip: &str) -> String {
        match self.locator.locate(ip).await {
            Ok(response) => match response.label() {
                Some(label) => {
                    self.record_location(ip, &label);
                    label
                }
                None => {
                    debug!(
                        "Geolocation of {} failed: {}",
                        ip,
                        response.message.as_deref().unwrap_or(&response.status)
                    );
                    UNKNOWN.to_string()
                }
            },
            Err(e) => {
                warn!("Failed to get IP location information for {}: {}", ip, e);
                UNKNOWN.to_string()
            }
        }
    }

    /// Operator's public IP and location label, never cached
    pub async fn locate_self(&self) -> Option<(String, String)> {
        match self.locator.locate_self().await {
            Ok(response) => {
                let label = response.label()?;
                let ip = response.query.unwrap_or_else(|| UNKNOWN.to_string());
                Some((ip, label))
            }
            Err(e) => {
                warn!("Failed to get user IP information: {}", e);
                None
            }
        }
    }

    pub fn locator(&self) -> &Arc<dyn GeoLocator> {
        &self.locator
    }
}

fn first_address(records: &[DnsRecord]) -> Option<String> {
    records
        .iter()
        .find(|record| record.is_address())
        .map(|record| record.data.clone())
}

//! HTTP collaborators for the chronikbench engine
//!
//! This crate provides the network side of a benchmark: a capability client
//! for JSON-speaking Chronik gateways, name resolution over DNS-over-HTTPS,
//! and geolocation through the ip-api JSON service. All three share one
//! pooled `reqwest` client built by [`ClientBuilder`].

pub mod client;
pub mod dns;
pub mod error;
pub mod geo;
pub mod node;

pub use client::{ClientBuilder, Collaborators};
pub use dns::DohResolver;
pub use error::{ClientError, Result};
pub use geo::IpApiLocator;
pub use node::{HttpNodeClient, HttpNodeConnector};

//! # chronikbench server
//!
//! Benchmark service for Chronik indexer nodes. It measures how fast a list
//! of nodes answers the two queries an eCash wallet leans on: paginated
//! address history and marketplace offer history for a token.
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! chronikbench --help
//!
//! # Serve the run-control API on port 8080
//! chronikbench --http-port 8080
//!
//! # Benchmark the default node list once and print a table
//! chronikbench --once --records 200
//!
//! # Custom node list
//! chronikbench --once --node https://chronik.e.cash,https://xec.paybutton.org
//! ```
//!
//! ## Configuration
//!
//! Configure via CLI arguments or environment variables (CLI takes precedence):
//!
//! ```bash
//! export CHRONIKBENCH_HTTP_PORT=9090
//! export CHRONIKBENCH_RECORDS=600
//! chronikbench
//!
//! # List all available environment variables
//! chronikbench --list-env-vars
//! ```
//!
//! ## What a Run Measures
//!
//! For every node, two capability tests run concurrently:
//!
//! - **Connect latency**: mean of three `blockchain-info` round trips
//! - **History**: time to fetch the configured number of address
//!   transactions, in pages of at most 200
//! - **Offers**: time to fetch the first page of offers for the configured
//!   token, bounded by a 10 second timeout
//!
//! Nodes are tested one after another in list order and results stream in
//! as each node finishes. A failing node is reported and the run moves on.
//!
//! ## Architecture
//!
//! ```text
//!     ┌─────────────┐        ┌───────────────┐
//!     │    HTTP     │        │   --once CLI  │
//!     │  Transport  │        │     table     │
//!     └──────┬──────┘        └───────┬───────┘
//!            │                       │
//!      ┌─────▼─────┐                 │
//!      │   Actor   │                 │
//!      │ (RunState)│                 │
//!      └─────┬─────┘                 │
//!            └───────────┬───────────┘
//!                  ┌─────▼──────┐
//!                  │Orchestrator│
//!                  └─────┬──────┘
//!                  ┌─────▼──────┐
//!                  │  Executor  │──── DNS / geolocation cache
//!                  └────────────┘
//! ```

pub mod actor;
pub mod config;
pub mod metrics;
pub mod transport;
pub mod types;

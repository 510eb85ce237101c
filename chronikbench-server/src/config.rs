//! Server configuration and CLI argument parsing
//!
//! Every option can be given on the command line or through an environment
//! variable with the `CHRONIKBENCH_` prefix.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Serve the run-control API on port 8080
//! chronikbench --http-port 8080
//!
//! # Benchmark two nodes once and exit
//! chronikbench --once --node https://chronik.e.cash,https://xec.paybutton.org --records 200
//!
//! # Mixed (CLI overrides env)
//! export CHRONIKBENCH_RECORDS=50
//! chronikbench --once --records 600  # Fetches 600 records
//! ```

use std::time::Duration;

use anyhow::{Result, anyhow};
use chronikbench::{DEFAULT_RECORD_BUDGET, MAX_RECORD_BUDGET, NodeEndpoint, RunConfig};
use clap::Parser;

/// Wallet address benchmarked when none is given
pub const DEFAULT_ADDRESS: &str = "ecash:qr6lws9uwmjkkaau4w956lugs9nlg9hudqs26lyxkv";

/// Token whose offers are benchmarked when none is given
pub const DEFAULT_TOKEN_ID: &str =
    "ac31bb0bccf33de1683efce4da64f1cb6d8e8d6e098bc01c51d5864deb0e783f";

/// Public Chronik nodes benchmarked when no node list is given
pub const DEFAULT_NODES: [&str; 9] = [
    "https://chronik1.alitayin.com",
    "https://chronik2.alitayin.com",
    "https://chronik.e.cash",
    "https://chronik-native1.fabien.cash",
    "https://chronik-native2.fabien.cash",
    "https://chronik-native3.fabien.cash",
    "https://chronik.pay2stay.com/xec",
    "https://chronik.pay2stay.com/xec2",
    "https://xec.paybutton.org",
];

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    pub http: HttpConfig,
    /// Inputs used when a run request leaves them out, and by `--once`
    pub defaults: RunDefaults,
    pub collaborators: CollaboratorConfig,
    /// Upper bound on the offer fetch of each node
    pub offer_timeout: Duration,
    /// Channel buffer size for actor communication
    pub buffer_size: usize,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
    /// Run the default configuration once and exit instead of serving
    pub once: bool,
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDefaults {
    pub nodes: Vec<NodeEndpoint>,
    pub address: String,
    pub token_id: String,
    pub record_budget: usize,
}

impl RunDefaults {
    pub fn run_config(&self) -> RunConfig {
        RunConfig {
            nodes: self.nodes.clone(),
            address: self.address.clone(),
            token_id: self.token_id.clone(),
            record_budget: self.record_budget,
        }
    }
}

/// Endpoints and timeouts of the outbound HTTP collaborators
#[derive(Debug, Clone)]
pub struct CollaboratorConfig {
    pub dns_url: String,
    pub geo_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

/// Command-line arguments for the server
///
/// All arguments can also be set via environment variables with the
/// CHRONIKBENCH_ prefix. CLI arguments take precedence over environment variables.
#[derive(Parser, Debug)]
#[command(
    name = "chronikbench",
    about = "Chronik node benchmark service",
    long_about = "Benchmarks Chronik indexer nodes on address-history and marketplace-offer retrieval.\n\nBy default an HTTP API is served to start, abort and inspect runs. With --once the configured node list is benchmarked a single time and the results are printed.\n\nEnvironment variables with CHRONIKBENCH_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // HTTP Transport
    #[arg(
        long,
        value_name = "HOST",
        help = "HTTP host",
        default_value = "127.0.0.1",
        env = "CHRONIKBENCH_HTTP_HOST"
    )]
    pub http_host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "HTTP port",
        default_value_t = 8080,
        env = "CHRONIKBENCH_HTTP_PORT"
    )]
    pub http_port: u16,

    // Run defaults
    #[arg(
        long = "node",
        value_name = "URL",
        help = "Node URL to benchmark (repeatable or comma separated)",
        value_delimiter = ',',
        default_values = DEFAULT_NODES,
        env = "CHRONIKBENCH_NODES"
    )]
    pub nodes: Vec<String>,
    #[arg(
        long,
        value_name = "ADDRESS",
        help = "Wallet address whose history is fetched",
        default_value = DEFAULT_ADDRESS,
        env = "CHRONIKBENCH_ADDRESS"
    )]
    pub address: String,
    #[arg(
        long,
        value_name = "TOKEN_ID",
        help = "Token id whose marketplace offers are fetched",
        default_value = DEFAULT_TOKEN_ID,
        env = "CHRONIKBENCH_TOKEN_ID"
    )]
    pub token_id: String,
    #[arg(
        long,
        value_name = "N",
        help = "History records to fetch per node (1-600)",
        default_value_t = DEFAULT_RECORD_BUDGET,
        env = "CHRONIKBENCH_RECORDS"
    )]
    pub records: usize,

    // Collaborators
    #[arg(
        long,
        value_name = "URL",
        help = "DNS-over-HTTPS JSON endpoint",
        default_value = chronikbench_client::dns::DEFAULT_DNS_URL,
        env = "CHRONIKBENCH_DNS_URL"
    )]
    pub dns_url: String,
    #[arg(
        long,
        value_name = "URL",
        help = "Geolocation endpoint",
        default_value = chronikbench_client::geo::DEFAULT_GEO_URL,
        env = "CHRONIKBENCH_GEO_URL"
    )]
    pub geo_url: String,
    #[arg(
        long,
        value_name = "MS",
        help = "Outbound connect timeout (milliseconds)",
        default_value_t = 10_000,
        env = "CHRONIKBENCH_CONNECT_TIMEOUT_MS"
    )]
    pub connect_timeout_ms: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Outbound request timeout (milliseconds)",
        default_value_t = 60_000,
        env = "CHRONIKBENCH_REQUEST_TIMEOUT_MS"
    )]
    pub request_timeout_ms: u64,
    #[arg(
        long,
        value_name = "SECS",
        help = "Offer fetch timeout (seconds)",
        default_value_t = 10,
        env = "CHRONIKBENCH_OFFER_TIMEOUT_SECS"
    )]
    pub offer_timeout_secs: u64,

    // General options
    #[arg(
        long,
        value_name = "SIZE",
        help = "Channel buffer size",
        default_value_t = 1_024,
        env = "CHRONIKBENCH_BUFFER_SIZE"
    )]
    pub buffer_size: usize,
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "CHRONIKBENCH_LOG_LEVEL"
    )]
    pub log_level: String,
    #[arg(
        long,
        help = "Benchmark the configured nodes once, print the results and exit",
        env = "CHRONIKBENCH_ONCE"
    )]
    pub once: bool,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Build and validate configuration from already parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let nodes = args
            .nodes
            .iter()
            .map(|node| NodeEndpoint::new(node.as_str()))
            .filter(|node| !node.as_str().is_empty())
            .collect();

        let config = Config {
            http: HttpConfig {
                host: args.http_host,
                port: args.http_port,
            },
            defaults: RunDefaults {
                nodes,
                address: args.address.trim().to_string(),
                token_id: args.token_id.trim().to_string(),
                record_budget: args.records,
            },
            collaborators: CollaboratorConfig {
                dns_url: args.dns_url,
                geo_url: args.geo_url,
                connect_timeout: Duration::from_millis(args.connect_timeout_ms),
                request_timeout: Duration::from_millis(args.request_timeout_ms),
            },
            offer_timeout: Duration::from_secs(args.offer_timeout_secs),
            buffer_size: args.buffer_size,
            log_level: args.log_level,
            once: args.once,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the default run inputs are unusable or a size or
    /// timeout is zero.
    pub fn validate(&self) -> Result<()> {
        self.defaults
            .run_config()
            .validate()
            .map_err(|e| anyhow!("Invalid default run configuration: {e}"))?;

        if self.buffer_size == 0 {
            return Err(anyhow!("Buffer size must be greater than zero"));
        }
        if self.offer_timeout.is_zero() {
            return Err(anyhow!("Offer timeout must be greater than zero"));
        }
        if self.collaborators.request_timeout.is_zero() {
            return Err(anyhow!("Request timeout must be greater than zero"));
        }

        Ok(())
    }

    /// Print all available environment variables and their descriptions
    fn print_env_vars() {
        println!("chronikbench Environment Variables");
        println!("==================================");
        println!();
        println!("All environment variables use the CHRONIKBENCH_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("HTTP Configuration:");
        println!("  CHRONIKBENCH_HTTP_HOST=<host>              HTTP host [default: 127.0.0.1]");
        println!("  CHRONIKBENCH_HTTP_PORT=<port>              HTTP port [default: 8080]");
        println!();

        println!("Run Defaults:");
        println!("  CHRONIKBENCH_NODES=<url,url,...>           Node URLs [default: 9 public nodes]");
        println!("  CHRONIKBENCH_ADDRESS=<address>             Wallet address [default: {DEFAULT_ADDRESS}]");
        println!("  CHRONIKBENCH_TOKEN_ID=<token id>           Token id [default: {DEFAULT_TOKEN_ID}]");
        println!(
            "  CHRONIKBENCH_RECORDS=<n>                   Records per node, 1-{MAX_RECORD_BUDGET} [default: {DEFAULT_RECORD_BUDGET}]"
        );
        println!();

        println!("Collaborators:");
        println!(
            "  CHRONIKBENCH_DNS_URL=<url>                 DNS-over-HTTPS endpoint [default: {}]",
            chronikbench_client::dns::DEFAULT_DNS_URL
        );
        println!(
            "  CHRONIKBENCH_GEO_URL=<url>                 Geolocation endpoint [default: {}]",
            chronikbench_client::geo::DEFAULT_GEO_URL
        );
        println!("  CHRONIKBENCH_CONNECT_TIMEOUT_MS=<ms>       Connect timeout [default: 10000]");
        println!("  CHRONIKBENCH_REQUEST_TIMEOUT_MS=<ms>       Request timeout [default: 60000]");
        println!("  CHRONIKBENCH_OFFER_TIMEOUT_SECS=<secs>     Offer fetch timeout [default: 10]");
        println!();

        println!("General Configuration:");
        println!("  CHRONIKBENCH_BUFFER_SIZE=<size>            Channel buffer size [default: 1024]");
        println!(
            "  CHRONIKBENCH_LOG_LEVEL=<level>             Log level: error, warn, info, debug, trace [default: info]"
        );
        println!("  CHRONIKBENCH_ONCE=true|false               Run once and exit [default: false]");
        println!();

        println!("Examples:");
        println!("  # Benchmark two nodes with 200 records each");
        println!("  export CHRONIKBENCH_NODES=https://chronik.e.cash,https://xec.paybutton.org");
        println!("  export CHRONIKBENCH_RECORDS=200");
        println!("  chronikbench --once");
        println!();
        println!("  # Serve the API (CLI args override env vars)");
        println!("  chronikbench --http-port 9090");
    }
}

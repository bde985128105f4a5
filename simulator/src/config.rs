//! Configuration management for the simulator.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Unparsable values fall back to the default rather than aborting the run.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use ticket_market_core::MarketConfig;
use ticket_market_core::config::{
    DEFAULT_CUSTOMER_RETRIEVAL_RATE, DEFAULT_MAX_TICKET_CAPACITY, DEFAULT_TICKET_RELEASE_RATE,
    DEFAULT_TOTAL_TICKETS,
};

/// Simulator configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Market parameters handed to the orchestrator
    pub market: MarketConfig,
    /// Scripted actors and timeline
    pub scenario: ScenarioConfig,
    /// `PostgreSQL` URL; the in-memory ledger is used when absent
    pub database_url: Option<String>,
    /// Prometheus exporter settings
    pub metrics: MetricsConfig,
    /// Grace period granted to each actor on stop, in seconds
    pub shutdown_timeout: u64,
}

/// Actors and timeline of a scripted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Vendors added on top of the default vendor
    pub vendors: u32,
    /// Customers to register
    pub customers: u32,
    /// Every n-th customer is a VIP (0 = none)
    pub vip_every: u32,
    /// Total run length in seconds, pause included
    pub run_seconds: u64,
    /// Seconds into the run before pausing (none = never pause)
    pub pause_after_seconds: Option<u64>,
    /// Length of the pause in seconds
    pub pause_seconds: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            vendors: 1,
            customers: 8,
            vip_every: 3,
            run_seconds: 30,
            pause_after_seconds: None,
            pause_seconds: 3,
        }
    }
}

impl ScenarioConfig {
    /// Total run length.
    #[must_use]
    pub const fn run_duration(&self) -> Duration {
        Duration::from_secs(self.run_seconds)
    }

    /// Pause window as `(start offset, length)`, if the pause falls inside the run.
    #[must_use]
    pub fn pause_window(&self) -> Option<(Duration, Duration)> {
        self.pause_after_seconds
            .filter(|after| *after < self.run_seconds && self.pause_seconds > 0)
            .map(|after| (Duration::from_secs(after), Duration::from_secs(self.pause_seconds)))
    }
}

/// Metrics exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Start the Prometheus exporter
    pub enabled: bool,
    /// Metrics server host
    pub host: String,
    /// Metrics server port
    pub port: u16,
}

impl MetricsConfig {
    /// Socket address of the exporter, if the host parses.
    #[must_use]
    pub fn addr(&self) -> Option<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().ok()
    }
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Reads a `.env` file first if one exists.
    #[must_use]
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ScenarioConfig::default();
        Self {
            market: MarketConfig::new(
                parse(&lookup, "MARKET_TOTAL_TICKETS").unwrap_or(DEFAULT_TOTAL_TICKETS),
                parse(&lookup, "MARKET_TICKET_RELEASE_RATE").unwrap_or(DEFAULT_TICKET_RELEASE_RATE),
                parse(&lookup, "MARKET_CUSTOMER_RETRIEVAL_RATE").unwrap_or(DEFAULT_CUSTOMER_RETRIEVAL_RATE),
                parse(&lookup, "MARKET_MAX_TICKET_CAPACITY").unwrap_or(DEFAULT_MAX_TICKET_CAPACITY),
            ),
            scenario: ScenarioConfig {
                vendors: parse(&lookup, "SIM_VENDORS").unwrap_or(defaults.vendors),
                customers: parse(&lookup, "SIM_CUSTOMERS").unwrap_or(defaults.customers),
                vip_every: parse(&lookup, "SIM_VIP_EVERY").unwrap_or(defaults.vip_every),
                run_seconds: parse(&lookup, "SIM_RUN_SECONDS").unwrap_or(defaults.run_seconds),
                pause_after_seconds: parse(&lookup, "SIM_PAUSE_AFTER_SECONDS"),
                pause_seconds: parse(&lookup, "SIM_PAUSE_SECONDS").unwrap_or(defaults.pause_seconds),
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            metrics: MetricsConfig {
                enabled: lookup("METRICS_ENABLED")
                    .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes")),
                host: lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse(&lookup, "METRICS_PORT").unwrap_or(9090),
            },
            shutdown_timeout: parse(&lookup, "SHUTDOWN_TIMEOUT").unwrap_or(1),
        }
    }

    /// Stop grace period per actor.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

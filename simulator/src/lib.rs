//! Scripted ticket market simulator.
//!
//! Loads a [`Config`] from the environment, runs a [`Scenario`] against an
//! orchestrator and renders the sales-over-time report.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Environment configuration
pub mod config;

/// Storage selection and sales report rendering
pub mod report;

/// Scripted runs
pub mod scenario;

pub use config::{Config, MetricsConfig, ScenarioConfig};
pub use report::{SalesStore, render_sales};
pub use scenario::{CustomerPlan, Ending, RunOutcome, Scenario};

//! Sales storage selection and the sales-over-time report.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::Arc;
use ticket_market_core::{PersistenceSink, SalesBucket, SinkError};
use ticket_market_postgres::PostgresStore;
use ticket_market_runtime::InMemoryLedger;

/// Where tickets and customers are persisted for this run.
#[derive(Debug, Clone)]
pub enum SalesStore {
    /// Process-local ledger
    Memory(Arc<InMemoryLedger>),
    /// `PostgreSQL` tables
    Postgres(Arc<PostgresStore>),
}

impl SalesStore {
    /// Connect to Postgres and migrate when a URL is given, otherwise use
    /// an in-memory ledger.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Unavailable`] if the database cannot be reached
    /// or migrated.
    pub async fn open(database_url: Option<&str>) -> Result<Self, SinkError> {
        match database_url {
            Some(url) => {
                let store = PostgresStore::connect(url).await?;
                store.migrate().await?;
                Ok(Self::Postgres(Arc::new(store)))
            },
            None => Ok(Self::Memory(Arc::new(InMemoryLedger::new()))),
        }
    }

    /// Backend name for logs.
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::Postgres(_) => "postgres",
        }
    }

    /// The store as a persistence sink.
    #[must_use]
    pub fn sink(&self) -> Arc<dyn PersistenceSink> {
        match self {
            Self::Memory(ledger) => ledger.clone(),
            Self::Postgres(store) => store.clone(),
        }
    }

    /// Per-second sales in the minute before `until`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ReadFailed`] if the database query fails.
    pub async fn sales_over_time(&self, until: DateTime<Utc>) -> Result<Vec<SalesBucket>, SinkError> {
        match self {
            Self::Memory(ledger) => Ok(ledger.sales_over_time(until).await),
            Self::Postgres(store) => store.sales_over_time(until).await,
        }
    }
}

/// Render buckets as a text bar chart, one line per second.
#[must_use]
pub fn render_sales(buckets: &[SalesBucket]) -> String {
    let mut out = String::from("Sales over time (last 60s)\n");
    if buckets.is_empty() {
        out.push_str("  no sales\n");
        return out;
    }
    let width = buckets.iter().map(|b| b.count).max().unwrap_or(0) as usize;
    let total: u32 = buckets.iter().map(|b| b.count).sum();
    for bucket in buckets {
        let bar = "#".repeat(bucket.count as usize);
        let _ = writeln!(out, "  {} | {bar:<width$} {}", bucket.label, bucket.count);
    }
    let _ = writeln!(out, "  total: {total}");
    out
}

//! `PostgreSQL` persistence sink for the ticket market.
//!
//! Stores one row per ticket and per customer. Every save is an upsert keyed
//! by identifier, so a ticket released as AVAILABLE and later sold ends up as
//! a single SOLD row. The store also answers the sales-over-time report with
//! a per-second aggregate over the last minute.
//!
//! # Example
//!
//! ```ignore
//! use ticket_market_postgres::PostgresStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresStore::connect("postgres://localhost/tickets").await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use ticket_market_core::report::SALES_WINDOW_SECS;
use ticket_market_core::{
    Customer, CustomerId, PersistenceSink, SalesBucket, SinkError, SinkFuture, Ticket, TicketId,
    TicketStatus,
};
use uuid::Uuid;

/// Connections held by [`PostgresStore::connect`].
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Ticket and customer store backed by `PostgreSQL`.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to the database at `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Unavailable`] if no connection can be established.
    pub async fn connect(database_url: &str) -> Result<Self, SinkError> {
        let pool = PgPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(database_url)
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;
        tracing::info!(max_connections = DEFAULT_MAX_CONNECTIONS, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Unavailable`] if a migration cannot be applied.
    pub async fn migrate(&self) -> Result<(), SinkError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| SinkError::Unavailable(format!("Migration failed: {e}")))
    }

    /// Per-second sales in the window `(until - 60s, until]`, oldest first.
    ///
    /// Seconds without a sale are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ReadFailed`] if the query fails.
    pub async fn sales_over_time(
        &self,
        until: DateTime<Utc>,
    ) -> Result<Vec<SalesBucket>, SinkError> {
        let since = until - Duration::seconds(SALES_WINDOW_SECS);
        let rows = sqlx::query(
            r"
            SELECT date_trunc('second', sold_at) AS second, COUNT(*) AS sold
            FROM tickets
            WHERE status = 'SOLD' AND sold_at > $1 AND sold_at <= $2
            GROUP BY 1
            ORDER BY 1
            ",
        )
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        rows.iter()
            .map(|row| {
                let second: DateTime<Utc> = row.try_get("second").map_err(read_failed)?;
                let sold: i64 = row.try_get("sold").map_err(read_failed)?;
                let count = u32::try_from(sold)
                    .map_err(|_| SinkError::ReadFailed(format!("Sale count out of range: {sold}")))?;
                Ok(SalesBucket::new(second, count))
            })
            .collect()
    }

    /// Load a ticket by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ReadFailed`] if the query fails or the row is malformed.
    pub async fn ticket(&self, id: &TicketId) -> Result<Option<Ticket>, SinkError> {
        let row = sqlx::query(
            r"
            SELECT id, name, vendor, status, created_at, sold_at, sold_to
            FROM tickets
            WHERE id = $1
            ",
        )
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(read_failed)?;

        row.as_ref().map(ticket_from_row).transpose()
    }

    /// Number of tickets stored with `status`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ReadFailed`] if the query fails.
    pub async fn count_with_status(&self, status: TicketStatus) -> Result<u64, SinkError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tickets WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(read_failed)?;
        Ok(count.unsigned_abs())
    }

    /// Stored customers, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::ReadFailed`] if the query fails or a row is malformed.
    pub async fn customers(&self) -> Result<Vec<Customer>, SinkError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, is_vip, quota, retrieval_rate
            FROM customers
            ORDER BY name
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(read_failed)?;

        rows.iter().map(customer_from_row).collect()
    }

    async fn upsert_ticket(&self, ticket: &Ticket) -> Result<(), SinkError> {
        sqlx::query(
            r"
            INSERT INTO tickets (id, name, vendor, status, created_at, sold_at, sold_to)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET status = EXCLUDED.status,
                sold_at = EXCLUDED.sold_at,
                sold_to = EXCLUDED.sold_to
            ",
        )
        .bind(*ticket.id.as_uuid())
        .bind(&ticket.name)
        .bind(&ticket.vendor)
        .bind(ticket.status.as_str())
        .bind(ticket.created_at)
        .bind(ticket.sold_at)
        .bind(ticket.sold_to.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| write_failed("ticket", &e))?;

        metrics::counter!("ticket_store_writes_total", "entity" => "ticket").increment(1);
        Ok(())
    }

    async fn upsert_customer(&self, customer: &Customer) -> Result<(), SinkError> {
        sqlx::query(
            r"
            INSERT INTO customers (id, name, is_vip, quota, retrieval_rate)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                is_vip = EXCLUDED.is_vip,
                quota = EXCLUDED.quota,
                retrieval_rate = EXCLUDED.retrieval_rate
            ",
        )
        .bind(*customer.id.as_uuid())
        .bind(&customer.name)
        .bind(customer.vip)
        .bind(customer.quota.map(i64::from))
        .bind(i64::from(customer.retrieval_rate))
        .execute(&self.pool)
        .await
        .map_err(|e| write_failed("customer", &e))?;

        metrics::counter!("ticket_store_writes_total", "entity" => "customer").increment(1);
        Ok(())
    }
}

impl PersistenceSink for PostgresStore {
    fn save_ticket<'a>(&'a self, ticket: &'a Ticket) -> SinkFuture<'a> {
        Box::pin(self.upsert_ticket(ticket))
    }

    fn save_customer<'a>(&'a self, customer: &'a Customer) -> SinkFuture<'a> {
        Box::pin(self.upsert_customer(customer))
    }
}

fn read_failed(error: sqlx::Error) -> SinkError {
    SinkError::ReadFailed(error.to_string())
}

fn write_failed(entity: &'static str, error: &sqlx::Error) -> SinkError {
    tracing::warn!(entity, error = %error, "Failed to persist record");
    metrics::counter!("ticket_store_write_errors_total", "entity" => entity).increment(1);
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            SinkError::Unavailable(error.to_string())
        },
        _ => SinkError::WriteFailed(error.to_string()),
    }
}

fn ticket_from_row(row: &PgRow) -> Result<Ticket, SinkError> {
    let status: String = row.try_get("status").map_err(read_failed)?;
    let status = TicketStatus::parse(&status)
        .ok_or_else(|| SinkError::ReadFailed(format!("Unknown ticket status: {status}")))?;
    Ok(Ticket {
        id: TicketId::from_uuid(row.try_get::<Uuid, _>("id").map_err(read_failed)?),
        name: row.try_get("name").map_err(read_failed)?,
        vendor: row.try_get("vendor").map_err(read_failed)?,
        status,
        created_at: row.try_get("created_at").map_err(read_failed)?,
        sold_at: row.try_get("sold_at").map_err(read_failed)?,
        sold_to: row.try_get("sold_to").map_err(read_failed)?,
    })
}

fn customer_from_row(row: &PgRow) -> Result<Customer, SinkError> {
    let to_u32 = |value: i64| {
        u32::try_from(value)
            .map_err(|_| SinkError::ReadFailed(format!("Customer rate out of range: {value}")))
    };
    let quota: Option<i64> = row.try_get("quota").map_err(read_failed)?;
    let retrieval_rate: i64 = row.try_get("retrieval_rate").map_err(read_failed)?;
    Ok(Customer {
        id: CustomerId::from_uuid(row.try_get::<Uuid, _>("id").map_err(read_failed)?),
        name: row.try_get("name").map_err(read_failed)?,
        vip: row.try_get("is_vip").map_err(read_failed)?,
        quota: quota.map(to_u32).transpose()?,
        retrieval_rate: to_u32(retrieval_rate)?,
    })
}

//! In-memory persistence sink.
//!
//! The default sink when no database is configured. Keeps the latest version
//! of every ticket and customer and answers the sales-over-time query.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use ticket_market_core::{
    Customer, CustomerId, PersistenceSink, SalesBucket, SinkFuture, Ticket, TicketId,
    TicketStatus, sales_per_second,
};
use tokio::sync::RwLock;

/// Ticket and customer records held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryLedger {
    tickets: Arc<RwLock<HashMap<TicketId, Ticket>>>,
    customers: Arc<RwLock<HashMap<CustomerId, Customer>>>,
}

impl InMemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-second sales in the minute before `until`.
    pub async fn sales_over_time(&self, until: DateTime<Utc>) -> Vec<SalesBucket> {
        let tickets = self.tickets.read().await;
        sales_per_second(tickets.values().filter_map(|t| t.sold_at), until)
    }

    /// Latest version of a ticket.
    pub async fn ticket(&self, id: &TicketId) -> Option<Ticket> {
        self.tickets.read().await.get(id).cloned()
    }

    /// Number of stored tickets with the given status.
    pub async fn count_with_status(&self, status: TicketStatus) -> usize {
        self.tickets
            .read()
            .await
            .values()
            .filter(|t| t.status == status)
            .count()
    }

    /// Stored customers, sorted by name.
    pub async fn customers(&self) -> Vec<Customer> {
        let mut customers: Vec<Customer> = self.customers.read().await.values().cloned().collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        customers
    }

    /// Tickets sold to each buyer, sorted by name.
    pub async fn sales_by_customer(&self) -> Vec<(String, u32)> {
        let tickets = self.tickets.read().await;
        let mut totals: HashMap<&str, u32> = HashMap::new();
        for buyer in tickets.values().filter_map(|t| t.sold_to.as_deref()) {
            *totals.entry(buyer).or_default() += 1;
        }
        let mut totals: Vec<(String, u32)> = totals
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        totals.sort();
        totals
    }
}

impl PersistenceSink for InMemoryLedger {
    fn save_ticket<'a>(&'a self, ticket: &'a Ticket) -> SinkFuture<'a> {
        Box::pin(async move {
            self.tickets.write().await.insert(ticket.id, ticket.clone());
            Ok(())
        })
    }

    fn save_customer<'a>(&'a self, customer: &'a Customer) -> SinkFuture<'a> {
        Box::pin(async move {
            self.customers
                .write()
                .await
                .insert(customer.id, customer.clone());
            Ok(())
        })
    }
}

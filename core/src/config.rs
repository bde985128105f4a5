//! Configuration snapshot applied when a run starts.

use crate::error::MarketError;
use serde::{Deserialize, Serialize};

/// Default total supply for a run
pub const DEFAULT_TOTAL_TICKETS: u32 = 100;
/// Default vendor release rate (tickets per tick)
pub const DEFAULT_TICKET_RELEASE_RATE: u32 = 5;
/// Default customer retrieval rate (requests per second)
pub const DEFAULT_CUSTOMER_RETRIEVAL_RATE: u32 = 7;
/// Default pool capacity
pub const DEFAULT_MAX_TICKET_CAPACITY: u32 = 27;

/// Market configuration.
///
/// Immutable once a run has started; the orchestrator only accepts a new
/// snapshot while stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketConfig {
    /// Total tickets that may ever be admitted during a run
    pub total_tickets: u32,
    /// Tickets released by the default vendor per tick
    pub ticket_release_rate: u32,
    /// Requests per second for customers registered without an explicit rate
    pub customer_retrieval_rate: u32,
    /// Maximum number of AVAILABLE tickets held by the pool
    pub max_ticket_capacity: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            total_tickets: DEFAULT_TOTAL_TICKETS,
            ticket_release_rate: DEFAULT_TICKET_RELEASE_RATE,
            customer_retrieval_rate: DEFAULT_CUSTOMER_RETRIEVAL_RATE,
            max_ticket_capacity: DEFAULT_MAX_TICKET_CAPACITY,
        }
    }
}

impl MarketConfig {
    /// Create a configuration from explicit values.
    #[must_use]
    pub const fn new(
        total_tickets: u32,
        ticket_release_rate: u32,
        customer_retrieval_rate: u32,
        max_ticket_capacity: u32,
    ) -> Self {
        Self {
            total_tickets,
            ticket_release_rate,
            customer_retrieval_rate,
            max_ticket_capacity,
        }
    }

    /// Set total supply
    #[must_use]
    pub const fn with_total_tickets(mut self, total: u32) -> Self {
        self.total_tickets = total;
        self
    }

    /// Set the default vendor release rate
    #[must_use]
    pub const fn with_release_rate(mut self, rate: u32) -> Self {
        self.ticket_release_rate = rate;
        self
    }

    /// Set the default customer retrieval rate
    #[must_use]
    pub const fn with_retrieval_rate(mut self, rate: u32) -> Self {
        self.customer_retrieval_rate = rate;
        self
    }

    /// Set pool capacity
    #[must_use]
    pub const fn with_capacity(mut self, capacity: u32) -> Self {
        self.max_ticket_capacity = capacity;
        self
    }

    /// Check that every value keeps the pool arithmetic well defined.
    ///
    /// A total of zero is accepted: the pool stops on the first request.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidArgument`] when a rate or the capacity
    /// is zero.
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.ticket_release_rate == 0 {
            return Err(MarketError::InvalidArgument(
                "ticket release rate must be greater than zero".to_string(),
            ));
        }
        if self.customer_retrieval_rate == 0 {
            return Err(MarketError::InvalidArgument(
                "customer retrieval rate must be greater than zero".to_string(),
            ));
        }
        if self.max_ticket_capacity == 0 {
            return Err(MarketError::InvalidArgument(
                "max ticket capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults() {
        let config = MarketConfig::default();
        assert_eq!(config, MarketConfig::new(100, 5, 7, 27));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_total_is_valid() {
        assert!(MarketConfig::default().with_total_tickets(0).validate().is_ok());
    }

    #[test]
    fn test_zero_rates_and_capacity_are_rejected() {
        for config in [
            MarketConfig::default().with_release_rate(0),
            MarketConfig::default().with_retrieval_rate(0),
            MarketConfig::default().with_capacity(0),
        ] {
            let err = config.validate().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn test_json_uses_camel_case_and_fills_defaults() {
        let config: MarketConfig =
            serde_json::from_str(r#"{"totalTickets": 10, "maxTicketCapacity": 3}"#).unwrap();
        assert_eq!(config.total_tickets, 10);
        assert_eq!(config.max_ticket_capacity, 3);
        assert_eq!(config.ticket_release_rate, DEFAULT_TICKET_RELEASE_RATE);

        let json = serde_json::to_value(config).unwrap();
        assert_eq!(json["customerRetrievalRate"], 7);
    }
}

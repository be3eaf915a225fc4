use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Kind of transport a ticket is sold for.
///
/// Stored as a small integer id; exposed to clients as a lowercase label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    Bus,
    Avia,
    Train,
}

const TRANSPORT_TYPES: [(TransportType, i32, &str); 3] = [
    (TransportType::Bus, 1, "bus"),
    (TransportType::Avia, 2, "avia"),
    (TransportType::Train, 3, "train"),
];

impl TransportType {
    pub fn id(self) -> i32 {
        TRANSPORT_TYPES
            .iter()
            .find(|(t, _, _)| *t == self)
            .map(|(_, id, _)| *id)
            .unwrap_or_default()
    }

    pub fn from_id(id: i32) -> Option<Self> {
        TRANSPORT_TYPES
            .iter()
            .find(|(_, type_id, _)| *type_id == id)
            .map(|(t, _, _)| *t)
    }

    pub fn label(self) -> &'static str {
        TRANSPORT_TYPES
            .iter()
            .find(|(t, _, _)| *t == self)
            .map(|(_, _, label)| *label)
            .unwrap_or_default()
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TransportType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TRANSPORT_TYPES
            .iter()
            .find(|(_, _, label)| *label == s)
            .map(|(t, _, _)| *t)
            .ok_or_else(|| CoreError::ValidationError(format!("Invalid transport type: {}", s)))
    }
}

/// A transport offering with its remaining capacity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ticket {
    pub id: i32,
    pub transport_type: TransportType,
    pub route_id: i32,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: i64,
    pub available_tickets: i32,
    /// Seats originally offered. Restoring credits never exceed it.
    pub capacity: i32,
}

impl Ticket {
    /// Sort key used by keyset pagination.
    pub fn sort_key(&self) -> (DateTime<Utc>, i32) {
        (self.departure_time, self.id)
    }
}

/// Ticket fields supplied by offering management before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub transport_type: TransportType,
    pub route_id: i32,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: i64,
    pub available_tickets: i32,
}

impl NewTicket {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.arrival_time <= self.departure_time {
            return Err(CoreError::ValidationError(
                "Arrival time must be after departure time".to_string(),
            ));
        }
        if self.price <= 0 {
            return Err(CoreError::ValidationError("Price must be positive".to_string()));
        }
        if self.available_tickets < 0 {
            return Err(CoreError::ValidationError(
                "Available tickets cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Ticket as presented to clients, with the route and transport labels filled in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketView {
    pub id: i32,
    pub transport_type: TransportType,
    pub departure_city: String,
    pub arrival_city: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: i64,
    pub available_tickets: i32,
}

impl TicketView {
    pub fn new(ticket: &Ticket, departure_city: &str, arrival_city: &str) -> Self {
        Self {
            id: ticket.id,
            transport_type: ticket.transport_type,
            departure_city: departure_city.to_string(),
            arrival_city: arrival_city.to_string(),
            departure_time: ticket.departure_time,
            arrival_time: ticket.arrival_time,
            price: ticket.price,
            available_tickets: ticket.available_tickets,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_transport_type_mapping_is_bidirectional() {
        for t in [TransportType::Bus, TransportType::Avia, TransportType::Train] {
            assert_eq!(TransportType::from_id(t.id()), Some(t));
            assert_eq!(t.label().parse::<TransportType>().unwrap(), t);
        }
        assert_eq!(TransportType::from_id(0), None);
        assert!("plane".parse::<TransportType>().is_err());
    }

    #[test]
    fn test_transport_type_serde_uses_label() {
        let json = serde_json::to_string(&TransportType::Train).unwrap();
        assert_eq!(json, "\"train\"");
        let parsed: TransportType = serde_json::from_str("\"avia\"").unwrap();
        assert_eq!(parsed, TransportType::Avia);
    }

    #[test]
    fn test_new_ticket_rejects_arrival_before_departure() {
        let departure = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();
        let ticket = NewTicket {
            transport_type: TransportType::Bus,
            route_id: 1,
            departure_time: departure,
            arrival_time: departure - Duration::hours(1),
            price: 100,
            available_tickets: 10,
        };
        assert!(matches!(ticket.validate(), Err(CoreError::ValidationError(_))));
    }
}

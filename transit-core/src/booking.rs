use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Booking status in the lifecycle. `Canceled` is terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "canceled" => Ok(BookingStatus::Canceled),
            other => Err(CoreError::StorageError(format!("Unknown booking status: {}", other))),
        }
    }
}

/// A reservation of `quantity` seats on one ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Booking {
    pub id: i32,
    pub user_id: i64,
    pub ticket_id: i32,
    pub quantity: i32,
    /// Amount debited from the user's balance when the booking was made.
    pub total_price: i64,
    pub booking_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub request_key: String,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Pending
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: i64,
    pub ticket_id: i32,
    pub quantity: i32,
    pub total_price: i64,
    pub booking_time: DateTime<Utc>,
    pub request_key: String,
}

/// Create request as accepted by the coordinator.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBooking {
    pub ticket_id: i32,
    pub quantity: i32,
    /// Idempotency marker of the originating request.
    #[serde(default)]
    pub request_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingView {
    pub id: i32,
    pub user_id: i64,
    pub ticket_id: i32,
    pub ticket_quantity: i32,
    pub total_price: i64,
    pub booking_time: DateTime<Utc>,
    pub status: BookingStatus,
}

impl From<&Booking> for BookingView {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            user_id: booking.user_id,
            ticket_id: booking.ticket_id,
            ticket_quantity: booking.quantity,
            total_price: booking.total_price,
            booking_time: booking.booking_time,
            status: booking.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_storage_label() {
        for status in [BookingStatus::Pending, BookingStatus::Canceled] {
            assert_eq!(status.as_str().parse::<BookingStatus>().unwrap(), status);
        }
        assert!("confirmed".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_create_booking_request_key_is_optional() {
        let json = r#"{ "ticket_id": 7, "quantity": 2 }"#;
        let req: CreateBooking = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(req.ticket_id, 7);
        assert_eq!(req.quantity, 2);
        assert!(req.request_key.is_none());
    }
}

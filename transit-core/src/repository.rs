use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::booking::{Booking, BookingStatus, NewBooking};
use crate::search::{Cursor, SearchQuery};
use crate::ticket::{NewTicket, Ticket};
use crate::CoreResult;

/// Durable ticket records and their remaining capacity.
#[async_trait]
pub trait TicketCatalog: Send + Sync {
    async fn insert(&self, ticket: NewTicket) -> CoreResult<Ticket>;

    async fn get(&self, ticket_id: i32) -> CoreResult<Option<Ticket>>;

    /// Atomically add `delta` to `available_tickets` and return the new value.
    ///
    /// A negative delta that would take the counter below zero fails with
    /// `InsufficientInventory` and leaves the row untouched. Positive deltas
    /// are clamped to the ticket's capacity.
    async fn adjust_availability(&self, ticket_id: i32, delta: i32) -> CoreResult<i32>;

    /// Up to `limit` tickets matching `query` strictly after `cursor`,
    /// ascending by `(departure_time, id)`.
    async fn page(&self, query: &SearchQuery, cursor: &Cursor, limit: u32) -> CoreResult<Vec<Ticket>>;
}

/// Route lookup-or-create keyed by the city pair.
#[async_trait]
pub trait RouteDirectory: Send + Sync {
    async fn find_id(&self, departure_city: &str, arrival_city: &str) -> CoreResult<Option<i32>>;

    async fn find_or_create(&self, departure_city: &str, arrival_city: &str) -> CoreResult<i32>;
}

/// Append-mostly record of bookings. No business validation.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn create(&self, booking: NewBooking) -> CoreResult<Booking>;

    async fn find_by_id(&self, id: i32) -> CoreResult<Option<Booking>>;

    async fn find_by_request_key(&self, user_id: i64, request_key: &str) -> CoreResult<Option<Booking>>;

    /// Newest first.
    async fn find_all_by_user(&self, user_id: i64) -> CoreResult<Vec<Booking>>;

    async fn set_status(&self, id: i32, status: BookingStatus) -> CoreResult<()>;

    /// Compare-and-set on the status. Returns false when the stored status
    /// was not `from`.
    async fn transition_status(&self, id: i32, from: BookingStatus, to: BookingStatus) -> CoreResult<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    Applied,
    Insufficient { available: i64 },
    /// A movement with this reference already exists; nothing was debited.
    DuplicateReference,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceMovement {
    pub user_id: i64,
    pub reference: String,
    pub kind: MovementKind,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Prepaid funds of user accounts. Every movement is journaled under a
/// unique reference.
#[async_trait]
pub trait AccountBalances: Send + Sync {
    async fn balance(&self, user_id: i64) -> CoreResult<Option<i64>>;

    /// Debit only if the balance still covers `amount` at commit time.
    async fn try_debit(&self, user_id: i64, amount: i64, reference: &str) -> CoreResult<DebitOutcome>;

    /// Idempotent per reference: a repeated credit is a no-op.
    async fn credit(&self, user_id: i64, amount: i64, reference: &str) -> CoreResult<()>;

    async fn movement(&self, reference: &str) -> CoreResult<Option<BalanceMovement>>;
}

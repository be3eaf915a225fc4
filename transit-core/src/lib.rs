pub mod ticket;
pub mod booking;
pub mod search;
pub mod repository;
pub mod clock;

pub use booking::{Booking, BookingStatus, BookingView, CreateBooking, NewBooking};
pub use clock::{Clock, FixedClock, SystemClock};
pub use search::{Cursor, SearchQuery, TicketPage, TicketSearchRequest};
pub use ticket::{NewTicket, Ticket, TicketView, TransportType};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Ticket not found: {0}")]
    TicketNotFound(i32),
    #[error("Booking not found: {0}")]
    BookingNotFound(i32),
    #[error("User not found: {0}")]
    UserNotFound(i64),
    #[error("Route not found: {from} -> {to}")]
    RouteNotFound { from: String, to: String },
    #[error("Insufficient inventory for ticket {ticket_id}: requested {requested}, available {available}")]
    InsufficientInventory {
        ticket_id: i32,
        requested: i32,
        available: i32,
    },
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: i64, available: i64 },
    #[error("Booking {booking_id} does not belong to user {user_id}")]
    NotOwner { booking_id: i32, user_id: i64 },
    #[error("Booking {0} is already canceled")]
    AlreadyCanceled(i32),
    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),
    #[error("Compensating credit {reference} ({amount} for user {user_id}) failed: {cause}")]
    RollbackFailed {
        user_id: i64,
        amount: i64,
        reference: String,
        cause: String,
    },
    #[error("Booking {booking_id} canceled without restoring {quantity} seats of ticket {ticket_id}: {cause}")]
    CancelIncomplete {
        booking_id: i32,
        ticket_id: i32,
        quantity: i32,
        cause: String,
    },
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl CoreError {
    /// Business-rule rejections the caller may resubmit with different input.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::InsufficientInventory { .. } | CoreError::InsufficientBalance { .. }
        )
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

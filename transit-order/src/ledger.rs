use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::cmp::Reverse;
use tokio::sync::RwLock;
use transit_core::repository::BookingLedger;
use transit_core::{Booking, BookingStatus, CoreError, CoreResult, NewBooking};

/// In-memory booking ledger. Bookings are never removed.
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

struct LedgerState {
    bookings: BTreeMap<i32, Booking>,
    request_keys: HashMap<(i64, String), i32>,
    next_id: i32,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState {
                bookings: BTreeMap::new(),
                request_keys: HashMap::new(),
                next_id: 1,
            }),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookingLedger for InMemoryLedger {
    async fn create(&self, booking: NewBooking) -> CoreResult<Booking> {
        let mut state = self.state.write().await;
        let key = (booking.user_id, booking.request_key.clone());
        if state.request_keys.contains_key(&key) {
            return Err(CoreError::ConcurrencyConflict(format!(
                "Booking for request {} already exists",
                booking.request_key
            )));
        }

        let id = state.next_id;
        state.next_id += 1;

        let booking = Booking {
            id,
            user_id: booking.user_id,
            ticket_id: booking.ticket_id,
            quantity: booking.quantity,
            total_price: booking.total_price,
            booking_time: booking.booking_time,
            status: BookingStatus::Pending,
            request_key: booking.request_key,
        };
        state.request_keys.insert(key, id);
        state.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn find_by_id(&self, id: i32) -> CoreResult<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn find_by_request_key(&self, user_id: i64, request_key: &str) -> CoreResult<Option<Booking>> {
        let state = self.state.read().await;
        Ok(state
            .request_keys
            .get(&(user_id, request_key.to_string()))
            .and_then(|id| state.bookings.get(id))
            .cloned())
    }

    async fn find_all_by_user(&self, user_id: i64) -> CoreResult<Vec<Booking>> {
        let state = self.state.read().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| Reverse((b.booking_time, b.id)));
        Ok(bookings)
    }

    async fn set_status(&self, id: i32, status: BookingStatus) -> CoreResult<()> {
        let mut state = self.state.write().await;
        let booking = state.bookings.get_mut(&id).ok_or(CoreError::BookingNotFound(id))?;
        booking.status = status;
        Ok(())
    }

    async fn transition_status(&self, id: i32, from: BookingStatus, to: BookingStatus) -> CoreResult<bool> {
        let mut state = self.state.write().await;
        let booking = state.bookings.get_mut(&id).ok_or(CoreError::BookingNotFound(id))?;
        if booking.status != from {
            return Ok(false);
        }
        booking.status = to;
        Ok(true)
    }
}

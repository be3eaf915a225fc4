use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use transit_core::repository::BookingLedger;
use transit_core::{Booking, BookingStatus, CoreError, CoreResult, NewBooking};

use crate::storage_error;

const BOOKING_COLUMNS: &str = "id, user_id, ticket_id, quantity, total_price, booking_time, status, request_key";

pub struct PgBookingLedger {
    pool: PgPool,
}

impl PgBookingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i32,
    user_id: i64,
    ticket_id: i32,
    quantity: i32,
    total_price: i64,
    booking_time: DateTime<Utc>,
    status: String,
    request_key: String,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            user_id: row.user_id,
            ticket_id: row.ticket_id,
            quantity: row.quantity,
            total_price: row.total_price,
            booking_time: row.booking_time,
            status: row.status.parse()?,
            request_key: row.request_key,
        })
    }
}

#[async_trait]
impl BookingLedger for PgBookingLedger {
    async fn create(&self, booking: NewBooking) -> CoreResult<Booking> {
        let result = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            INSERT INTO bookings (user_id, ticket_id, quantity, total_price, booking_time, status, request_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        ))
        .bind(booking.user_id)
        .bind(booking.ticket_id)
        .bind(booking.quantity)
        .bind(booking.total_price)
        .bind(booking.booking_time)
        .bind(BookingStatus::Pending.as_str())
        .bind(&booking.request_key)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Booking::try_from(row),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(CoreError::ConcurrencyConflict(
                format!("Booking for request {} already exists", booking.request_key),
            )),
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn find_by_id(&self, id: i32) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn find_by_request_key(&self, user_id: i64, request_key: &str) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 AND request_key = $2",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .bind(request_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(Booking::try_from).transpose()
    }

    async fn find_all_by_user(&self, user_id: i64) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY booking_time DESC, id DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter().map(Booking::try_from).collect()
    }

    async fn set_status(&self, id: i32, status: BookingStatus) -> CoreResult<()> {
        let result = sqlx::query("UPDATE bookings SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::BookingNotFound(id));
        }
        Ok(())
    }

    async fn transition_status(&self, id: i32, from: BookingStatus, to: BookingStatus) -> CoreResult<bool> {
        let result = sqlx::query("UPDATE bookings SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Distinguish a lost race from a missing row
        let exists = sqlx::query_scalar::<_, i32>("SELECT id FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;
        match exists {
            Some(_) => Ok(false),
            None => Err(CoreError::BookingNotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(status: &str) -> BookingRow {
        BookingRow {
            id: 4,
            user_id: 77,
            ticket_id: 9,
            quantity: 2,
            total_price: 1800,
            booking_time: Utc.with_ymd_and_hms(2030, 5, 5, 10, 0, 0).unwrap(),
            status: status.to_string(),
            request_key: "k".to_string(),
        }
    }

    #[test]
    fn test_row_status_parsed() {
        let booking = Booking::try_from(row("canceled")).unwrap();
        assert_eq!(booking.status, BookingStatus::Canceled);
        assert!(!booking.is_active());
    }

    #[test]
    fn test_unknown_status_is_storage_error() {
        assert!(matches!(Booking::try_from(row("refunded")), Err(CoreError::StorageError(_))));
    }
}

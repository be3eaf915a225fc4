use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use transit_core::repository::TicketCatalog;
use transit_core::{CoreError, CoreResult, Cursor, NewTicket, SearchQuery, Ticket, TransportType};

use crate::storage_error;

const TICKET_COLUMNS: &str =
    "id, transport_type, route_id, departure_time, arrival_time, price, available_tickets, capacity";

pub struct PgTicketCatalog {
    pool: PgPool,
}

impl PgTicketCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    id: i32,
    transport_type: i32,
    route_id: i32,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    price: i64,
    available_tickets: i32,
    capacity: i32,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = CoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        let transport_type = TransportType::from_id(row.transport_type).ok_or_else(|| {
            CoreError::StorageError(format!(
                "Ticket {} has unknown transport type {}",
                row.id, row.transport_type
            ))
        })?;

        Ok(Ticket {
            id: row.id,
            transport_type,
            route_id: row.route_id,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            price: row.price,
            available_tickets: row.available_tickets,
            capacity: row.capacity,
        })
    }
}

#[async_trait]
impl TicketCatalog for PgTicketCatalog {
    async fn insert(&self, ticket: NewTicket) -> CoreResult<Ticket> {
        ticket.validate()?;

        let row = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            INSERT INTO tickets
                (transport_type, route_id, departure_time, arrival_time, price, available_tickets, capacity)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {}
            "#,
            TICKET_COLUMNS
        ))
        .bind(ticket.transport_type.id())
        .bind(ticket.route_id)
        .bind(ticket.departure_time)
        .bind(ticket.arrival_time)
        .bind(ticket.price)
        .bind(ticket.available_tickets)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)?;

        Ticket::try_from(row)
    }

    async fn get(&self, ticket_id: i32) -> CoreResult<Option<Ticket>> {
        let row = sqlx::query_as::<_, TicketRow>(&format!(
            "SELECT {} FROM tickets WHERE id = $1",
            TICKET_COLUMNS
        ))
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        row.map(Ticket::try_from).transpose()
    }

    async fn adjust_availability(&self, ticket_id: i32, delta: i32) -> CoreResult<i32> {
        // The guard and the write are one statement, so concurrent decrements
        // can never take the counter below zero.
        let updated = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE tickets
            SET available_tickets = LEAST(available_tickets + $2, capacity)
            WHERE id = $1 AND available_tickets + $2 >= 0
            RETURNING available_tickets
            "#,
        )
        .bind(ticket_id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        if let Some(available) = updated {
            return Ok(available);
        }

        let current = sqlx::query_scalar::<_, i32>("SELECT available_tickets FROM tickets WHERE id = $1")
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        match current {
            Some(available) => Err(CoreError::InsufficientInventory {
                ticket_id,
                requested: delta.saturating_neg(),
                available,
            }),
            None => Err(CoreError::TicketNotFound(ticket_id)),
        }
    }

    async fn page(&self, query: &SearchQuery, cursor: &Cursor, limit: u32) -> CoreResult<Vec<Ticket>> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            r#"
            SELECT {}
            FROM tickets
            WHERE route_id = $1
              AND ($2::INTEGER IS NULL OR transport_type = $2)
              AND departure_time >= $3
              AND departure_time < $4
              AND available_tickets > 0
              AND (departure_time, id) > ($5, $6)
            ORDER BY departure_time, id
            LIMIT $7
            "#,
            TICKET_COLUMNS
        ))
        .bind(query.route_id)
        .bind(query.transport_type.map(TransportType::id))
        .bind(query.start)
        .bind(query.end)
        .bind(cursor.departure_time)
        .bind(cursor.id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.into_iter().map(Ticket::try_from).collect()
    }
}

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use tracing::debug;
use transit_core::repository::TicketCatalog;
use transit_core::{CoreError, CoreResult, Cursor, NewTicket, SearchQuery, Ticket};

/// In-memory ticket catalog.
///
/// Every availability change runs inside one write-locked critical section,
/// so check-and-mutate is atomic per ticket.
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

struct CatalogState {
    tickets: BTreeMap<i32, Ticket>,
    next_id: i32,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(CatalogState {
                tickets: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Number of tickets currently offered for sale.
    pub async fn len(&self) -> usize {
        self.state.read().await.tickets.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketCatalog for InMemoryCatalog {
    async fn insert(&self, ticket: NewTicket) -> CoreResult<Ticket> {
        ticket.validate()?;

        let mut state = self.state.write().await;
        let id = state.next_id;
        state.next_id += 1;

        let ticket = Ticket {
            id,
            transport_type: ticket.transport_type,
            route_id: ticket.route_id,
            departure_time: ticket.departure_time,
            arrival_time: ticket.arrival_time,
            price: ticket.price,
            available_tickets: ticket.available_tickets,
            capacity: ticket.available_tickets,
        };
        state.tickets.insert(id, ticket.clone());
        Ok(ticket)
    }

    async fn get(&self, ticket_id: i32) -> CoreResult<Option<Ticket>> {
        Ok(self.state.read().await.tickets.get(&ticket_id).cloned())
    }

    async fn adjust_availability(&self, ticket_id: i32, delta: i32) -> CoreResult<i32> {
        let mut state = self.state.write().await;
        let ticket = state
            .tickets
            .get_mut(&ticket_id)
            .ok_or(CoreError::TicketNotFound(ticket_id))?;

        let next = ticket.available_tickets.saturating_add(delta);
        if next < 0 {
            return Err(CoreError::InsufficientInventory {
                ticket_id,
                requested: delta.saturating_neg(),
                available: ticket.available_tickets,
            });
        }

        ticket.available_tickets = next.min(ticket.capacity);
        debug!(ticket_id, delta, available = ticket.available_tickets, "Adjusted availability");
        Ok(ticket.available_tickets)
    }

    async fn page(&self, query: &SearchQuery, cursor: &Cursor, limit: u32) -> CoreResult<Vec<Ticket>> {
        let state = self.state.read().await;
        let mut matches: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| query.matches(t) && cursor.admits(t))
            .cloned()
            .collect();

        matches.sort_by_key(Ticket::sort_key);
        matches.truncate(limit as usize);
        Ok(matches)
    }
}

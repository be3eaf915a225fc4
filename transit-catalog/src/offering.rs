use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use transit_core::repository::{RouteDirectory, TicketCatalog};
use transit_core::{Clock, CoreError, CoreResult, NewTicket, TicketView, TransportType};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTicketRequest {
    #[serde(rename = "type")]
    pub transport_type: TransportType,
    pub from: String,
    pub to: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub price: i64,
    pub available_tickets: i32,
}

/// Puts new transport offerings on sale.
pub struct OfferingService {
    catalog: Arc<dyn TicketCatalog>,
    routes: Arc<dyn RouteDirectory>,
    clock: Arc<dyn Clock>,
}

impl OfferingService {
    pub fn new(catalog: Arc<dyn TicketCatalog>, routes: Arc<dyn RouteDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self { catalog, routes, clock }
    }

    pub async fn create_ticket(&self, request: NewTicketRequest) -> CoreResult<TicketView> {
        if request.from.trim().is_empty() || request.to.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Departure and arrival cities are required".to_string(),
            ));
        }
        if request.departure_time <= self.clock.now() {
            return Err(CoreError::ValidationError(
                "Departure time must be in the future".to_string(),
            ));
        }

        let mut offering = NewTicket {
            transport_type: request.transport_type,
            route_id: 0,
            departure_time: request.departure_time,
            arrival_time: request.arrival_time,
            price: request.price,
            available_tickets: request.available_tickets,
        };
        // Checked before the route is created so a rejected offering leaves nothing behind
        offering.validate()?;

        let route_id = self.routes.find_or_create(&request.from, &request.to).await?;
        offering.route_id = route_id;
        let ticket = self.catalog.insert(offering).await?;

        info!(
            ticket_id = ticket.id,
            route_id,
            transport_type = %ticket.transport_type,
            capacity = ticket.capacity,
            "Ticket offered"
        );
        Ok(TicketView::new(&ticket, &request.from, &request.to))
    }
}

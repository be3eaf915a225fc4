use chrono::Duration;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use transit_core::repository::{RouteDirectory, TicketCatalog};
use transit_core::{
    Clock, CoreError, CoreResult, Cursor, SearchQuery, TicketPage, TicketSearchRequest, TicketView,
};

/// Page size bounds and the default departure window.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SearchLimits {
    pub min_page_size: u32,
    pub max_page_size: u32,
    pub default_page_size: u32,
    /// Length of the default window starting at "now".
    pub horizon_days: i64,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            min_page_size: 5,
            max_page_size: 15,
            default_page_size: 10,
            horizon_days: 3650,
        }
    }
}

/// Keyset-paginated ticket search ordered by `(departure_time, id)`.
pub struct KeysetSearch {
    catalog: Arc<dyn TicketCatalog>,
    routes: Arc<dyn RouteDirectory>,
    clock: Arc<dyn Clock>,
    limits: SearchLimits,
}

impl KeysetSearch {
    pub fn new(
        catalog: Arc<dyn TicketCatalog>,
        routes: Arc<dyn RouteDirectory>,
        clock: Arc<dyn Clock>,
        limits: SearchLimits,
    ) -> Self {
        Self {
            catalog,
            routes,
            clock,
            limits,
        }
    }

    /// Return the page after `cursor` (or the first page) and the cursor of
    /// the next one. `next_cursor` is absent once a short page is returned.
    pub async fn search(&self, request: &TicketSearchRequest, cursor: Option<Cursor>) -> CoreResult<TicketPage> {
        let page_size = self.page_size(request.page_size)?;
        let query = self.resolve(request).await?;
        let cursor = cursor.unwrap_or_default();

        let tickets = self.catalog.page(&query, &cursor, page_size).await?;
        debug!(
            route_id = query.route_id,
            cursor_time = %cursor.departure_time,
            cursor_id = cursor.id,
            returned = tickets.len(),
            "Ticket page fetched"
        );

        let next_cursor = if tickets.len() as u32 == page_size {
            tickets.last().map(Cursor::after)
        } else {
            None
        };

        let tickets = tickets
            .iter()
            .map(|t| TicketView::new(t, &request.from, &request.to))
            .collect();

        Ok(TicketPage { tickets, next_cursor })
    }

    fn page_size(&self, requested: Option<u32>) -> CoreResult<u32> {
        let size = requested.unwrap_or(self.limits.default_page_size);
        if size < self.limits.min_page_size || size > self.limits.max_page_size {
            return Err(CoreError::ValidationError(format!(
                "Page size must be between {} and {}",
                self.limits.min_page_size, self.limits.max_page_size
            )));
        }
        Ok(size)
    }

    async fn resolve(&self, request: &TicketSearchRequest) -> CoreResult<SearchQuery> {
        if request.from.trim().is_empty() || request.to.trim().is_empty() {
            return Err(CoreError::ValidationError(
                "Departure and arrival places are required".to_string(),
            ));
        }

        let now = self.clock.now();
        let start = request.start_time.unwrap_or(now);
        let end = request
            .end_time
            .unwrap_or_else(|| now + Duration::days(self.limits.horizon_days));
        if end <= start {
            return Err(CoreError::ValidationError(
                "End time must be after start time".to_string(),
            ));
        }

        let route_id = self
            .routes
            .find_id(&request.from, &request.to)
            .await?
            .ok_or_else(|| CoreError::RouteNotFound {
                from: request.from.clone(),
                to: request.to.clone(),
            })?;

        Ok(SearchQuery {
            route_id,
            transport_type: request.transport_type,
            start,
            end,
        })
    }
}

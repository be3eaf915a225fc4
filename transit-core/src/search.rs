use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ticket::{Ticket, TicketView, TransportType};

/// Client search request, before the route is resolved.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketSearchRequest {
    #[serde(rename = "type", default)]
    pub transport_type: Option<TransportType>,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

/// Resolved filter handed to the catalog: route, optional transport type and
/// the half-open departure window `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub route_id: i32,
    pub transport_type: Option<TransportType>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SearchQuery {
    /// Whether a ticket passes the filter, ignoring the cursor.
    pub fn matches(&self, ticket: &Ticket) -> bool {
        ticket.route_id == self.route_id
            && self.transport_type.map_or(true, |t| t == ticket.transport_type)
            && ticket.departure_time >= self.start
            && ticket.departure_time < self.end
            && ticket.available_tickets > 0
    }
}

/// Keyset position: the `(departure_time, id)` of the last row already seen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Cursor {
    pub departure_time: DateTime<Utc>,
    pub id: i32,
}

impl Cursor {
    pub fn new(departure_time: DateTime<Utc>, id: i32) -> Self {
        Self { departure_time, id }
    }

    /// Position before every ticket: Unix epoch, id 0.
    pub fn origin() -> Self {
        Self {
            departure_time: DateTime::<Utc>::UNIX_EPOCH,
            id: 0,
        }
    }

    /// `departure_time > cursor.time OR (departure_time = cursor.time AND id > cursor.id)`
    pub fn admits(&self, ticket: &Ticket) -> bool {
        ticket.sort_key() > (self.departure_time, self.id)
    }

    pub fn after(ticket: &Ticket) -> Self {
        Self::new(ticket.departure_time, ticket.id)
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::origin()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TicketPage {
    pub tickets: Vec<TicketView>,
    pub next_cursor: Option<Cursor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ticket(id: i32, hour: u32) -> Ticket {
        let departure = Utc.with_ymd_and_hms(2030, 5, 1, hour, 0, 0).unwrap();
        Ticket {
            id,
            transport_type: TransportType::Train,
            route_id: 1,
            departure_time: departure,
            arrival_time: departure + chrono::Duration::hours(2),
            price: 100,
            available_tickets: 5,
            capacity: 5,
        }
    }

    #[test]
    fn test_cursor_breaks_ties_on_id() {
        let cursor = Cursor::after(&ticket(4, 10));
        assert!(!cursor.admits(&ticket(3, 10)));
        assert!(!cursor.admits(&ticket(4, 10)));
        assert!(cursor.admits(&ticket(5, 10)));
        assert!(cursor.admits(&ticket(1, 11)));
        assert!(!cursor.admits(&ticket(9, 9)));
    }

    #[test]
    fn test_origin_admits_everything_after_epoch() {
        assert!(Cursor::origin().admits(&ticket(1, 0)));
    }

    #[test]
    fn test_query_excludes_sold_out_and_window_end() {
        let query = SearchQuery {
            route_id: 1,
            transport_type: None,
            start: Utc.with_ymd_and_hms(2030, 5, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2030, 5, 1, 12, 0, 0).unwrap(),
        };
        assert!(query.matches(&ticket(1, 11)));
        assert!(!query.matches(&ticket(2, 12)));

        let mut sold_out = ticket(3, 8);
        sold_out.available_tickets = 0;
        assert!(!query.matches(&sold_out));
    }

    #[test]
    fn test_search_request_reads_type_field() {
        let json = r#"{ "type": "bus", "from": "Moscow", "to": "Kazan", "page_size": 5 }"#;
        let req: TicketSearchRequest = serde_json::from_str(json).expect("Failed to deserialize");
        assert_eq!(req.transport_type, Some(TransportType::Bus));
        assert_eq!(req.page_size, Some(5));
        assert!(req.start_time.is_none());
    }
}

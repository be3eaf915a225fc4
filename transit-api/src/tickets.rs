use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use transit_catalog::NewTicketRequest;
use transit_core::{Cursor, TicketPage, TicketSearchRequest, TicketView};

use crate::error::AppError;
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchTicketsBody {
    #[serde(flatten)]
    pub filter: TicketSearchRequest,
    /// Position of the last ticket of the previous page.
    #[serde(default)]
    pub last_departure_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_id: Option<i32>,
}

impl SearchTicketsBody {
    fn cursor(&self) -> Result<Option<Cursor>, AppError> {
        match (self.last_departure_time, self.last_id) {
            (Some(time), Some(id)) => Ok(Some(Cursor::new(time, id))),
            (None, None) => Ok(None),
            _ => Err(AppError::ValidationError(
                "last_departure_time and last_id must be sent together".to_string(),
            )),
        }
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/tickets/create", post(create_ticket))
        .route_layer(from_fn_with_state(state, admin_auth_middleware));

    Router::new()
        .route("/tickets/search", post(search_tickets))
        .merge(admin)
}

async fn search_tickets(
    State(state): State<AppState>,
    Json(body): Json<SearchTicketsBody>,
) -> Result<Json<TicketPage>, AppError> {
    let cursor = body.cursor()?;
    let page = state.search.search(&body.filter, cursor).await?;
    Ok(Json(page))
}

async fn create_ticket(
    State(state): State<AppState>,
    Json(req): Json<NewTicketRequest>,
) -> Result<(StatusCode, Json<TicketView>), AppError> {
    let ticket = state.offerings.create_ticket(req).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

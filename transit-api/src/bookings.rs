use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use transit_core::{BookingView, CreateBooking};

use crate::error::AppError;
use crate::middleware::{user_auth_middleware, UserClaims};
use crate::rate_limit_middleware;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingBody {
    pub ticket_id: i32,
    pub ticket_quantity: i32,
    #[serde(default)]
    pub request_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelBookingBody {
    pub booking_id: i32,
}

pub fn routes(state: AppState) -> Router<AppState> {
    // Last layer added runs first: authenticate, then count against the user
    Router::new()
        .route("/bookings/create", post(create_booking))
        .route("/bookings/list", get(list_bookings))
        .route("/bookings/cancel", post(cancel_booking))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .route_layer(from_fn_with_state(state, user_auth_middleware))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(body): Json<CreateBookingBody>,
) -> Result<Json<BookingView>, AppError> {
    let request = CreateBooking {
        ticket_id: body.ticket_id,
        quantity: body.ticket_quantity,
        request_key: body.request_key,
    };
    let booking = state.bookings.create_booking(claims.id, request).await?;
    Ok(Json(booking))
}

async fn list_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    Ok(Json(state.bookings.list_bookings(claims.id).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<UserClaims>,
    Json(body): Json<CancelBookingBody>,
) -> Result<StatusCode, AppError> {
    state.bookings.cancel_booking(claims.id, body.booking_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

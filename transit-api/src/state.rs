use std::sync::Arc;
use transit_catalog::{KeysetSearch, OfferingService};
use transit_order::BookingCoordinator;
use transit_store::app_config::RateLimitConfig;
use transit_store::RedisClient;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
}

#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingCoordinator>,
    pub search: Arc<KeysetSearch>,
    pub offerings: Arc<OfferingService>,
    /// Rate limiting is skipped when absent.
    pub redis: Option<Arc<RedisClient>>,
    pub rate_limit: RateLimitConfig,
    pub auth: AuthConfig,
}

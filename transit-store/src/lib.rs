pub mod app_config;
pub mod database;
pub mod redis_repo;
pub mod ticket_repo;
pub mod route_repo;
pub mod booking_repo;
pub mod account_repo;

pub use app_config::Config;
pub use database::DbClient;
pub use redis_repo::RedisClient;
pub use ticket_repo::PgTicketCatalog;
pub use route_repo::PgRouteDirectory;
pub use booking_repo::PgBookingLedger;
pub use account_repo::PgAccountBalances;

use transit_core::CoreError;

/// Driver failures surface as `StorageError`; the message never reaches clients.
pub(crate) fn storage_error(e: sqlx::Error) -> CoreError {
    CoreError::StorageError(e.to_string())
}

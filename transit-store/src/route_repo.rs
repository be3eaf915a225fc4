use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use transit_core::repository::RouteDirectory;
use transit_core::CoreResult;

use crate::storage_error;

pub struct PgRouteDirectory {
    pool: PgPool,
}

impl PgRouteDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RouteDirectory for PgRouteDirectory {
    async fn find_id(&self, departure_city: &str, arrival_city: &str) -> CoreResult<Option<i32>> {
        sqlx::query_scalar::<_, i32>(
            "SELECT id FROM routes WHERE departure_city = $1 AND arrival_city = $2",
        )
        .bind(departure_city)
        .bind(arrival_city)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)
    }

    async fn find_or_create(&self, departure_city: &str, arrival_city: &str) -> CoreResult<i32> {
        // DO NOTHING returns no row when the pair already exists
        let created = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO routes (departure_city, arrival_city)
            VALUES ($1, $2)
            ON CONFLICT (departure_city, arrival_city) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(departure_city)
        .bind(arrival_city)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error)?;

        if let Some(id) = created {
            info!(route_id = id, from = departure_city, to = arrival_city, "Route created");
            return Ok(id);
        }

        sqlx::query_scalar::<_, i32>(
            "SELECT id FROM routes WHERE departure_city = $1 AND arrival_city = $2",
        )
        .bind(departure_city)
        .bind(arrival_city)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error)
    }
}

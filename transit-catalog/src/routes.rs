use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;
use transit_core::repository::RouteDirectory;
use transit_core::CoreResult;

/// Route directory keyed by `(departure_city, arrival_city)`.
pub struct InMemoryRoutes {
    state: RwLock<RouteState>,
}

#[derive(Default)]
struct RouteState {
    by_cities: HashMap<(String, String), i32>,
}

impl InMemoryRoutes {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RouteState::default()),
        }
    }
}

impl Default for InMemoryRoutes {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RouteDirectory for InMemoryRoutes {
    async fn find_id(&self, departure_city: &str, arrival_city: &str) -> CoreResult<Option<i32>> {
        let state = self.state.read().await;
        Ok(state
            .by_cities
            .get(&(departure_city.to_string(), arrival_city.to_string()))
            .copied())
    }

    async fn find_or_create(&self, departure_city: &str, arrival_city: &str) -> CoreResult<i32> {
        let mut state = self.state.write().await;
        let key = (departure_city.to_string(), arrival_city.to_string());
        if let Some(id) = state.by_cities.get(&key) {
            return Ok(*id);
        }

        let id = state.by_cities.len() as i32 + 1;
        state.by_cities.insert(key, id);
        info!(route_id = id, departure_city, arrival_city, "Route created");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_or_create_is_stable() {
        let routes = InMemoryRoutes::new();
        assert_eq!(routes.find_id("Moscow", "Kazan").await.unwrap(), None);

        let id = routes.find_or_create("Moscow", "Kazan").await.unwrap();
        assert_eq!(routes.find_or_create("Moscow", "Kazan").await.unwrap(), id);
        assert_eq!(routes.find_id("Moscow", "Kazan").await.unwrap(), Some(id));

        // Direction matters
        let back = routes.find_or_create("Kazan", "Moscow").await.unwrap();
        assert_ne!(back, id);
        assert_eq!(routes.find_id("Kazan", "Moscow").await.unwrap(), Some(back));
    }
}

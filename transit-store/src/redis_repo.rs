use redis::{Client, RedisResult};

/// Fixed-window request counters shared by every API instance.
pub struct RedisClient {
    client: Client,
}

impl RedisClient {
    pub fn new(url: &str) -> RedisResult<Self> {
        let client = Client::open(url)?;
        Ok(Self { client })
    }

    /// Count one request against `key` and report whether it is within
    /// `limit` for the current window. The window starts on first use.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

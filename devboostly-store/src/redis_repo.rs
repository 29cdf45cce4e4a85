use redis::RedisResult;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    pub async fn ping(&self) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Fixed-window counter. Returns false once `key` went over `limit` hits in the window.
    pub async fn check_rate_limit(&self, key: &str, limit: i64, window_seconds: i64) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // NX keeps the first hit's expiry, so the window does not slide on every request
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .cmd("EXPIRE").arg(key).arg(window_seconds).arg("NX").ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count <= limit)
    }
}

/// `ratelimit:{scope}:{window}` where window is the current minute bucket.
pub fn rate_limit_key(scope: &str, now_unix: i64, window_seconds: i64) -> String {
    format!("ratelimit:{}:{}", scope, now_unix / window_seconds.max(1))
}

use crate::error::Result;
use redis::{
    AsyncCommands, Client,
    aio::{ConnectionManager, PubSub},
};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct RedisClient {
    manager: Arc<Mutex<ConnectionManager>>,
    client: Client,
}

impl RedisClient {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client.clone()).await?;
        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
            client,
        })
    }

    // Rate limiting
    pub async fn check_rate_limit(
        &self,
        key: &str,
        limit: u32,
        window_seconds: usize,
    ) -> Result<bool> {
        let mut conn = self.manager.lock().await;

        let current: u32 = conn.get(key).await.unwrap_or(0);

        if current >= limit {
            return Ok(false);
        }

        let _: () = conn.incr(key, 1).await?;
        let _: () = conn.expire(key, window_seconds as i64).await?;

        Ok(true)
    }

    // Real-time fan-out
    pub async fn publish(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self.manager.lock().await;
        let _: () = conn.publish(channel, message).await?;
        Ok(())
    }

    /// Pattern subscription over a dedicated pub/sub connection.
    pub async fn psubscribe(&self, pattern: &str) -> Result<PubSub> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.psubscribe(pattern).await?;
        Ok(pubsub)
    }
}

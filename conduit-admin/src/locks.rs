//! Config-lock key manipulation on a **second, non-pubsub** Redis
//! connection — kept separate from any subscriber client so lock
//! operations never interleave with pub/sub traffic on the same
//! connection.

const LOCK_PREFIX: &str = "config-lock:";

#[derive(Clone)]
pub struct LockStore {
    client: redis::Client,
}

impl LockStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    pub fn from_url(url: &str) -> Result<Self, redis::RedisError> {
        Ok(Self::new(redis::Client::open(url)?))
    }

    async fn connection(&self) -> redis::RedisResult<redis::aio::MultiplexedConnection> {
        self.client.get_multiplexed_async_connection().await
    }

    /// `unlock <file>` — delete the lock key outright.
    pub async fn unlock(&self, file: &str) -> redis::RedisResult<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("DEL").arg(format!("{LOCK_PREFIX}{file}")).query_async(&mut conn).await?;
        Ok(())
    }

    /// `permalock <file> <user>` — set the lock key with no TTL, so it
    /// survives until explicitly unlocked.
    pub async fn permalock(&self, file: &str, user: &str) -> redis::RedisResult<()> {
        let mut conn = self.connection().await?;
        let _: () = redis::cmd("SET").arg(format!("{LOCK_PREFIX}{file}")).arg(user).query_async(&mut conn).await?;
        Ok(())
    }

    /// `listlocks` — every `config-lock:*` key and its holder.
    pub async fn list_locks(&self) -> redis::RedisResult<Vec<(String, String)>> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = redis::cmd("KEYS").arg(format!("{LOCK_PREFIX}*")).query_async(&mut conn).await?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let holder: Option<String> = redis::cmd("GET").arg(&key).query_async(&mut conn).await?;
            let file = key.strip_prefix(LOCK_PREFIX).unwrap_or(&key).to_string();
            out.push((file, holder.unwrap_or_default()));
        }
        Ok(out)
    }
}

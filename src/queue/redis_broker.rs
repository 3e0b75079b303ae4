//! Redis list broker (`RPUSH` / `BLPOP` / `LLEN`).
//!
//! Requires Redis 6.0 or newer: pop waits are sent as fractional `BLPOP`
//! timeouts, which older servers reject.

use super::Broker;
use crate::error::{QueueError, QueueResult};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Oldest server accepting a fractional `BLPOP` timeout.
const MIN_SERVER_VERSION: (u32, u32) = (6, 0);

/// Broker backed by Redis lists.
///
/// Producers go through a reconnecting `ConnectionManager`. Each pop checks
/// out its own connection, so blocked pops run side by side and never stall
/// a push. A connection that fails is discarded and the next pop dials a
/// fresh one.
pub struct RedisBroker {
    client: redis::Client,
    push_conn: ConnectionManager,
    idle: Mutex<Vec<MultiplexedConnection>>,
}

impl fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBroker")
            .field("push_conn", &"ConnectionManager")
            .field("idle_pop_conns", &self.idle_count())
            .finish()
    }
}

impl RedisBroker {
    pub async fn connect(url: &str) -> QueueResult<Self> {
        info!("Connecting to Redis at {}", url);

        let client = redis::Client::open(url)?;
        let push_conn = ConnectionManager::new(client.clone()).await?;
        let mut conn = client.get_multiplexed_async_connection().await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(QueueError::Unavailable(format!(
                "unexpected PING reply: {}",
                pong
            )));
        }

        let info: String = redis::cmd("INFO").arg("server").query_async(&mut conn).await?;
        match parse_redis_version(&info) {
            Some(version) if version < MIN_SERVER_VERSION => {
                return Err(QueueError::Unavailable(format!(
                    "Redis {}.{} is too old, {}.{} or newer is required",
                    version.0, version.1, MIN_SERVER_VERSION.0, MIN_SERVER_VERSION.1
                )));
            }
            Some(version) => debug!(major = version.0, minor = version.1, "Redis server version"),
            None => warn!("Could not read redis_version from INFO, assuming a recent server"),
        }

        info!("Redis has been connected");
        Ok(Self {
            client,
            push_conn,
            idle: Mutex::new(vec![conn]),
        })
    }

    async fn checkout(&self) -> QueueResult<MultiplexedConnection> {
        let idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        match idle {
            Some(conn) => Ok(conn),
            None => Ok(self.client.get_multiplexed_async_connection().await?),
        }
    }

    fn checkin(&self, conn: MultiplexedConnection) {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).push(conn);
    }

    fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn push(&self, channel: &str, payload: &str) -> QueueResult<()> {
        let mut conn = self.push_conn.clone();
        conn.rpush::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn blocking_pop(&self, channel: &str, wait: Duration) -> QueueResult<Option<String>> {
        let mut conn = self.checkout().await?;

        // BLPOP treats a zero timeout as "forever".
        let popped = if wait.is_zero() {
            conn.lpop::<_, Option<String>>(channel, None).await
        } else {
            conn.blpop::<_, Option<(String, String)>>(channel, wait.as_secs_f64())
                .await
                .map(|popped| popped.map(|(_, payload)| payload))
        };

        match popped {
            Ok(payload) => {
                self.checkin(conn);
                Ok(payload)
            }
            Err(e) => {
                debug!(error = %e, "Dropping failed pop connection");
                Err(e.into())
            }
        }
    }

    async fn len(&self, channel: &str) -> QueueResult<usize> {
        let mut conn = self.push_conn.clone();
        let len: usize = conn.llen(channel).await?;
        Ok(len)
    }
}

/// `(major, minor)` from the `redis_version` line of an `INFO` reply.
fn parse_redis_version(info: &str) -> Option<(u32, u32)> {
    let version = info
        .lines()
        .find_map(|line| line.trim().strip_prefix("redis_version:"))?;
    let mut parts = version.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    Some((major, minor))
}

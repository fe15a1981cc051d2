//! Redis-backed key-value store.
//!
//! Layout:
//! - payloads live under `sessionfarm:session:<key>`
//! - the last-accessed index is the sorted set `sessionfarm:last_accessed`,
//!   scored by epoch milliseconds
//!
//! The connection is opened lazily and shared by all callers on the node. An
//! I/O failure drops it so the next call reconnects.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Duration;

use parking_lot::Mutex;
use redis::{Client, Connection, RedisResult};
use tracing::{debug, trace, warn};

use crate::address::Endpoint;
use crate::error::{Error, Result};
use crate::store::{ConnectOptions, KeyValueStore};

const PAYLOAD_PREFIX: &str = "sessionfarm:session:";
const INDEX_KEY: &str = "sessionfarm:last_accessed";

fn payload_key(key: &str) -> String {
    format!("{PAYLOAD_PREFIX}{key}")
}

/// [`KeyValueStore`] talking to one Redis instance.
pub struct RedisStore {
    endpoint: Endpoint,
    client: Client,
    options: ConnectOptions,
    connection: Mutex<Option<Connection>>,
    closed: AtomicBool,
}

impl RedisStore {
    /// Build a store for `endpoint` without connecting.
    pub fn open(endpoint: &Endpoint, options: &ConnectOptions) -> Result<Self> {
        let url = format!("redis://{}:{}/", endpoint.host, endpoint.port);
        let client = Client::open(url.as_str()).map_err(|e| {
            Error::Configuration(format!("cannot use '{endpoint}' as a redis address: {e}"))
        })?;

        Ok(Self {
            endpoint: endpoint.clone(),
            client,
            options: *options,
            connection: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Registry factory.
    pub fn connect(endpoint: &Endpoint, options: &ConnectOptions) -> Result<Arc<dyn KeyValueStore>> {
        Ok(Arc::new(Self::open(endpoint, options)?))
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn open_connection(&self, operation: &'static str) -> Result<Connection> {
        debug!(endpoint = %self.endpoint, "Connecting to redis");
        let timeout = self.options.connect_timeout;
        let connection = self
            .client
            .get_connection_with_timeout(timeout)
            .map_err(|e| Error::access(operation, e))?;
        connection
            .set_read_timeout(Some(timeout))
            .and_then(|()| connection.set_write_timeout(Some(timeout)))
            .map_err(|e| Error::access(operation, e))?;
        Ok(connection)
    }

    /// Run `f` on the shared connection, connecting first if needed.
    fn with_connection<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Connection) -> RedisResult<T>,
    ) -> Result<T> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ServiceUnavailable(format!(
                "redis store {} is closed",
                self.endpoint
            )));
        }

        let mut guard = self.connection.lock();
        if guard.is_none() {
            *guard = Some(self.open_connection(operation)?);
        }
        let result = match guard.as_mut() {
            Some(connection) => f(connection),
            None => {
                return Err(Error::ServiceUnavailable(format!(
                    "no connection to {}",
                    self.endpoint
                )));
            }
        };

        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
                    warn!(endpoint = %self.endpoint, error = %e, "Dropping broken redis connection");
                    *guard = None;
                }
                Err(Error::access(operation, e))
            }
        }
    }
}

impl KeyValueStore for RedisStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        trace!(endpoint = %self.endpoint, key = %key, "GET");
        self.with_connection("fetch", |conn| {
            redis::cmd("GET").arg(payload_key(key)).query(conn)
        })
    }

    fn put(&self, key: &str, value: &[u8], last_accessed_ms: i64) -> Result<()> {
        trace!(endpoint = %self.endpoint, key = %key, last_accessed_ms, "SET + index");
        self.with_connection("persist", |conn| {
            redis::pipe()
                .atomic()
                .cmd("ZREM")
                .arg(INDEX_KEY)
                .arg(key)
                .ignore()
                .cmd("SET")
                .arg(payload_key(key))
                .arg(value)
                .ignore()
                .cmd("ZADD")
                .arg(INDEX_KEY)
                .arg(last_accessed_ms)
                .arg(key)
                .ignore()
                .query(conn)
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        trace!(endpoint = %self.endpoint, key = %key, "DEL + unindex");
        self.with_connection("delete", |conn| {
            redis::pipe()
                .atomic()
                .cmd("DEL")
                .arg(payload_key(key))
                .ignore()
                .cmd("ZREM")
                .arg(INDEX_KEY)
                .arg(key)
                .ignore()
                .query(conn)
        })
    }

    fn scan_index(&self, below_ms: i64, offset: usize, limit: usize) -> Result<Vec<String>> {
        trace!(endpoint = %self.endpoint, below_ms, offset, limit, "ZRANGEBYSCORE");
        self.with_connection("expiry scan", |conn| {
            redis::cmd("ZRANGEBYSCORE")
                .arg(INDEX_KEY)
                .arg(0)
                .arg(format!("({below_ms}"))
                .arg("LIMIT")
                .arg(offset)
                .arg(limit)
                .query(conn)
        })
    }

    fn close(&self, timeout: Duration) {
        self.closed.store(true, Ordering::Release);
        let Some(mut connection) = self.connection.lock().take() else {
            debug!(endpoint = %self.endpoint, "Redis store closed (never connected)");
            return;
        };

        let (tx, rx) = mpsc::channel();
        let endpoint = self.endpoint.clone();
        let spawned = std::thread::Builder::new()
            .name("sessionfarm-redis-close".to_string())
            .spawn(move || {
                if let Err(e) = redis::cmd("QUIT").query::<()>(&mut connection) {
                    debug!(endpoint = %endpoint, error = %e, "QUIT failed, dropping connection");
                }
                drop(connection);
                let _ = tx.send(());
            });

        if let Err(e) = spawned {
            warn!(endpoint = %self.endpoint, error = %e, "Could not spawn close thread");
            return;
        }

        match rx.recv_timeout(timeout) {
            Ok(()) => debug!(endpoint = %self.endpoint, "Redis connection closed"),
            Err(e) => warn!(
                endpoint = %self.endpoint,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                error = %e,
                "Redis connection did not close in time"
            ),
        }
    }
}

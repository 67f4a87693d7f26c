//! Connection pool management via r2d2.
//!
//! The pool keeps `pool_size` connections warm and grows by up to
//! `max_overflow` more under load. Callers beyond that ceiling block until a
//! connection is returned or `timeout` elapses. Every checkout is preceded
//! by a liveness ping when `pre_ping` is set; a connection that fails it is
//! dropped and another one is tried without the caller noticing.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use r2d2::event::{
    AcquireEvent, CheckinEvent, CheckoutEvent, HandleEvent, ReleaseEvent, TimeoutEvent,
};
use r2d2::{HandleError, ManageConnection, Pool};
use realstate_common::{Error, Result};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use serde::Serialize;

use crate::descriptor::{Backend, ConnectionDescriptor, SqliteTarget};
use crate::dialect::{Dialect, SqliteDialect};

/// A pooled connection checked out of a [`ConnectionPool`].
pub type PooledConnection = r2d2::PooledConnection<StoreConnectionManager>;

/// Sizing and liveness settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Connections kept open in steady state.
    pub pool_size: u32,
    /// Extra connections allowed above `pool_size` under load.
    pub max_overflow: u32,
    /// How long `acquire` blocks before failing with `PoolExhausted`.
    pub timeout: Duration,
    /// Idle time after which surplus connections are closed.
    pub idle_timeout: Option<Duration>,
    /// Ping each connection before handing it out.
    pub pre_ping: bool,
    /// SQLite lock wait applied to each connection.
    pub busy_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            pool_size: 10,
            max_overflow: 20,
            timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(300)),
            pre_ping: true,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolOptions {
    /// Hard limit on concurrently open connections.
    pub fn ceiling(&self) -> u32 {
        self.pool_size.saturating_add(self.max_overflow)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ceiling() == 0 {
            return Err(Error::config("pool_size + max_overflow must be at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(Error::config("pool timeout must be greater than zero"));
        }
        if self.idle_timeout.is_some_and(|d| d.is_zero()) {
            return Err(Error::config("idle timeout must be greater than zero"));
        }
        Ok(())
    }
}

/// A SQLite connection plus the pool's view of its health.
#[derive(Debug)]
pub struct StoreConnection {
    conn: Connection,
    broken: bool,
}

impl StoreConnection {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Flag this connection so the pool discards it on release.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }
}

impl std::ops::Deref for StoreConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

/// r2d2 manager opening SQLite connections with the store's pragmas.
#[derive(Debug)]
pub struct StoreConnectionManager {
    /// Path or `file:` URI handed to SQLite.
    target: String,
    file_backed: bool,
    busy_timeout: Duration,
}

impl StoreConnectionManager {
    fn new(target: String, file_backed: bool, busy_timeout: Duration) -> Self {
        Self {
            target,
            file_backed,
            busy_timeout,
        }
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.target)?;
        conn.busy_timeout(self.busy_timeout)?;
        register_functions(&conn)?;
        if self.file_backed {
            conn.execute_batch(
                "PRAGMA foreign_keys = ON;
                 PRAGMA journal_mode = WAL;",
            )?;
        } else {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        }
        Ok(conn)
    }
}

/// SQL functions available on every connection.
///
/// `casefold(text)` lowercases with full Unicode rules; the built-in
/// `lower()` only folds ASCII.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "casefold",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

impl ManageConnection for StoreConnectionManager {
    type Connection = StoreConnection;
    type Error = rusqlite::Error;

    fn connect(&self) -> std::result::Result<StoreConnection, rusqlite::Error> {
        self.open().map(|conn| StoreConnection {
            conn,
            broken: false,
        })
    }

    fn is_valid(&self, conn: &mut StoreConnection) -> std::result::Result<(), rusqlite::Error> {
        conn.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn has_broken(&self, conn: &mut StoreConnection) -> bool {
        conn.broken
    }
}

#[derive(Debug)]
struct TracingEventHandler;

impl HandleEvent for TracingEventHandler {
    fn handle_acquire(&self, event: AcquireEvent) {
        tracing::debug!(connection = event.connection_id(), "opened pooled connection");
    }

    fn handle_release(&self, event: ReleaseEvent) {
        tracing::debug!(
            connection = event.connection_id(),
            age = ?event.age(),
            "closed pooled connection"
        );
    }

    fn handle_checkout(&self, event: CheckoutEvent) {
        tracing::trace!(
            connection = event.connection_id(),
            waited = ?event.duration(),
            "checked out connection"
        );
    }

    fn handle_timeout(&self, event: TimeoutEvent) {
        tracing::warn!(timeout = ?event.timeout(), "timed out waiting for a pooled connection");
    }

    fn handle_checkin(&self, event: CheckinEvent) {
        tracing::trace!(
            connection = event.connection_id(),
            held = ?event.duration(),
            "checked in connection"
        );
    }
}

#[derive(Debug)]
struct TracingErrorHandler;

impl<E: std::fmt::Display> HandleError<E> for TracingErrorHandler {
    fn handle_error(&self, error: E) {
        tracing::warn!("connection error: {error}");
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Open connections, idle or in use.
    pub connections: u32,
    pub idle_connections: u32,
    pub ceiling: u32,
}

impl PoolStatus {
    pub fn in_use(&self) -> u32 {
        self.connections.saturating_sub(self.idle_connections)
    }
}

/// Bounded pool of live store connections, shareable across threads.
pub struct ConnectionPool {
    inner: Pool<StoreConnectionManager>,
    options: PoolOptions,
    descriptor: ConnectionDescriptor,
    dialect: Box<dyn Dialect>,
    // Keeps a private in-memory store alive while pooled connections come
    // and go. Never used for queries.
    _anchor: Option<Mutex<Connection>>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("descriptor", &self.descriptor)
            .field("options", &self.options)
            .field("dialect", &self.dialect.name())
            .finish()
    }
}

impl ConnectionPool {
    /// Open a pool for `descriptor`.
    ///
    /// Blocks until `pool_size` connections are established or `timeout`
    /// elapses.
    pub fn open(descriptor: &ConnectionDescriptor, options: PoolOptions) -> Result<Self> {
        options.validate()?;

        let Backend::Sqlite(target) = descriptor.backend()?;
        let (manager, anchor) = match target {
            SqliteTarget::File(path) => {
                ensure_parent_dir(&path)?;
                let manager = StoreConnectionManager::new(
                    path.to_string_lossy().into_owned(),
                    true,
                    options.busy_timeout,
                );
                (manager, None)
            }
            SqliteTarget::Memory => {
                static COUNTER: AtomicU64 = AtomicU64::new(0);
                let n = COUNTER.fetch_add(1, Ordering::Relaxed);
                // The memdb VFS shares one store between connections that
                // name it with a leading slash, with ordinary file locking.
                let uri = format!("file:/realstate_mem_{}_{n}?vfs=memdb", std::process::id());
                let manager = StoreConnectionManager::new(uri, false, options.busy_timeout);
                let anchor = manager.open().map_err(|e| {
                    Error::database(format!("Failed to open in-memory store: {e}"))
                })?;
                (manager, Some(Mutex::new(anchor)))
            }
        };

        let inner = pool_builder(&options)
            .build(manager)
            .map_err(|e| Error::database(format!("Failed to create connection pool: {e}")))?;

        tracing::info!(
            descriptor = %descriptor,
            pool_size = options.pool_size,
            ceiling = options.ceiling(),
            "connection pool ready"
        );

        Ok(Self {
            inner,
            options,
            descriptor: descriptor.clone(),
            dialect: Box::new(SqliteDialect),
            _anchor: anchor,
        })
    }

    /// Parse `url` and open a pool for it.
    pub fn open_url(url: &str, options: PoolOptions) -> Result<Self> {
        Self::open(&ConnectionDescriptor::parse(url)?, options)
    }

    /// Open a pool over a fresh private in-memory store.
    pub fn memory(options: PoolOptions) -> Result<Self> {
        Self::open_url("sqlite::memory:", options)
    }

    /// Borrow a healthy connection, waiting up to the configured timeout.
    pub fn acquire(&self) -> Result<PooledConnection> {
        self.acquire_timeout(self.options.timeout)
    }

    /// Borrow a healthy connection, waiting up to `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<PooledConnection> {
        self.inner
            .get_timeout(timeout)
            .map_err(|e| Error::PoolExhausted {
                waited: timeout,
                message: e.to_string(),
            })
    }

    /// Return a connection. A connection marked broken is closed instead of
    /// being pooled; a replacement is opened on later demand.
    pub fn release(&self, conn: PooledConnection) {
        if conn.is_broken() {
            tracing::warn!("discarding broken connection");
        }
        drop(conn);
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state();
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
            ceiling: self.options.ceiling(),
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Close the pool. Connections still checked out are closed when their
    /// holders release them.
    pub fn close(self) {
        tracing::info!(descriptor = %self.descriptor, "closing connection pool");
    }
}

/// r2d2 builder configured from `options`.
fn pool_builder<M: ManageConnection>(options: &PoolOptions) -> r2d2::Builder<M> {
    Pool::builder()
        .max_size(options.ceiling())
        .min_idle(Some(options.pool_size))
        .connection_timeout(options.timeout)
        .idle_timeout(options.idle_timeout)
        .test_on_check_out(options.pre_ping)
        .error_handler(Box::new(TracingErrorHandler))
        .event_handler(Box::new(TracingEventHandler))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => {
            std::fs::create_dir_all(dir)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

//! The [`Store`] facade: one pool, one session manager, and the lifecycle
//! entry points used at process start and stop.

use std::sync::Arc;

use realstate_common::{Error, Result};

use crate::config::DatabaseConfig;
use crate::descriptor::ConnectionDescriptor;
use crate::lifecycle::{self, TableStatus};
use crate::pool::{ConnectionPool, PoolOptions, PoolStatus};
use crate::session::{Session, SessionManager};

#[derive(Debug, Clone)]
pub struct Store {
    pool: Arc<ConnectionPool>,
    sessions: SessionManager,
}

impl Store {
    /// Open the pool described by `config`. Does not touch the schema.
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        config.validate()?;
        let descriptor = config.descriptor()?;
        let pool = ConnectionPool::open(&descriptor, config.pool_options())?;
        Ok(Self::from_pool(pool, config.echo))
    }

    pub fn open(descriptor: &ConnectionDescriptor, options: PoolOptions) -> Result<Self> {
        Ok(Self::from_pool(ConnectionPool::open(descriptor, options)?, false))
    }

    pub fn from_pool(pool: ConnectionPool, echo: bool) -> Self {
        let pool = Arc::new(pool);
        let sessions = SessionManager::new(Arc::clone(&pool)).with_echo(echo);
        Self { pool, sessions }
    }

    /// A private in-memory store with the schema already created.
    pub fn memory() -> Result<Self> {
        let store = Self::from_pool(ConnectionPool::memory(PoolOptions::default())?, false);
        store.initialize()?;
        Ok(store)
    }

    pub fn initialize(&self) -> Result<()> {
        lifecycle::initialize(&self.pool)
    }

    /// Drop the whole schema. Destructive.
    pub fn teardown(&self) -> Result<()> {
        lifecycle::teardown(&self.pool)
    }

    pub fn schema_status(&self) -> Result<Vec<TableStatus>> {
        lifecycle::status(&self.pool)
    }

    pub fn open_session(&self) -> Result<Session> {
        self.sessions.open()
    }

    /// See [`SessionManager::with_session`].
    pub fn with_session<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        self.sessions.with_session(f)
    }

    /// Cloneable handle for handing sessions out on other threads.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Borrow a connection and run a trivial query on it.
    pub fn ping(&self) -> Result<()> {
        let conn = self.pool.acquire()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::ConnectionLost(e.to_string()))?;
        Ok(())
    }

    /// Close the pool. If other handles to it are still alive the pool
    /// closes when the last of them is dropped.
    pub fn shutdown(self) {
        let Self { pool, sessions } = self;
        drop(sessions);
        match Arc::try_unwrap(pool) {
            Ok(pool) => pool.close(),
            Err(pool) => tracing::debug!(
                handles = Arc::strong_count(&pool),
                "pool still referenced; closing deferred"
            ),
        }
    }
}

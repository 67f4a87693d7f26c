//! Sessions: one unit of work over one borrowed connection.
//!
//! A [`Session`] holds a pooled connection. Reads run against the latest
//! committed state until the session first writes; the first write takes
//! the store's write lock (`BEGIN IMMEDIATE`, waiting up to the busy
//! timeout) and everything from then on is one transaction. Nothing it
//! writes is durable until [`Session::commit`]. Closing or dropping a
//! session rolls back whatever is uncommitted and hands the connection
//! back to the pool, so release happens on every exit path.
//!
//! Sessions are owned by exactly one caller and passed explicitly; the
//! [`SessionManager`] that creates them is cheap to clone and safe to use
//! from many threads at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use realstate_common::{Error, Result};
use rusqlite::types::{ToSql, ToSqlOutput};
use rusqlite::{Connection, Row};

use crate::errors::from_sqlite;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::repositories::{
    OwnerRepository, PropertyImageRepository, PropertyRepository, PropertyTraceRepository,
};
use crate::schema::{TableDef, Value};

impl ToSql for Value<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Integer(i) => ToSqlOutput::from(*i),
            Value::Text(s) => ToSqlOutput::from(*s),
            Value::Decimal(m) => ToSqlOutput::from(m.cents()),
            Value::Date(d) => ToSqlOutput::from(d.format("%Y-%m-%d").to_string()),
            Value::Blob(b) => ToSqlOutput::from(*b),
            Value::Boolean(b) => ToSqlOutput::from(i64::from(*b)),
        })
    }
}

/// Hands out sessions bound to connections of one pool.
#[derive(Debug, Clone)]
pub struct SessionManager {
    pool: Arc<ConnectionPool>,
    echo: bool,
    next_id: Arc<AtomicU64>,
}

impl SessionManager {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            echo: false,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Log every statement issued by sessions at the `realstate_db::sql`
    /// target.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Borrow a connection and start a unit of work on it.
    ///
    /// Fails with `PoolExhausted` if no connection frees up in time.
    pub fn open(&self) -> Result<Session> {
        let conn = self.pool.acquire()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Session {
            id,
            conn: Some(conn),
            pool: Arc::clone(&self.pool),
            echo: self.echo,
            lost: false,
        };
        tracing::debug!(session = id, "session opened");
        Ok(session)
    }

    /// Run `f` in a fresh session: commit if it returns `Ok`, roll back if it
    /// returns `Err`. The connection is released either way. Never retries.
    pub fn with_session<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut session = self.open()?;
        match f(&mut session) {
            Ok(value) => {
                session.commit()?;
                session.close()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(close_err) = session.close() {
                    tracing::warn!("failed to close session after error: {close_err}");
                }
                Err(e)
            }
        }
    }
}

/// A scoped unit of work. Not shareable between threads.
pub struct Session {
    id: u64,
    conn: Option<PooledConnection>,
    pool: Arc<ConnectionPool>,
    echo: bool,
    lost: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("lost", &self.lost)
            .finish()
    }
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// False once the underlying connection has been lost.
    pub fn is_usable(&self) -> bool {
        !self.lost && self.conn.is_some()
    }

    pub fn owners(&mut self) -> OwnerRepository<'_> {
        OwnerRepository::new(self)
    }

    pub fn properties(&mut self) -> PropertyRepository<'_> {
        PropertyRepository::new(self)
    }

    pub fn property_images(&mut self) -> PropertyImageRepository<'_> {
        PropertyImageRepository::new(self)
    }

    pub fn property_traces(&mut self) -> PropertyTraceRepository<'_> {
        PropertyTraceRepository::new(self)
    }

    /// Whether uncommitted writes are pending.
    pub fn in_transaction(&self) -> bool {
        self.connection().map(|c| !c.is_autocommit()).unwrap_or(false)
    }

    /// Make everything written so far durable and start a new unit of work.
    ///
    /// A commit that fails with `Busy` leaves the writes pending; the caller
    /// may commit again or roll back.
    pub fn commit(&mut self) -> Result<()> {
        if !self.in_transaction() {
            self.connection()?;
            return Ok(());
        }
        self.batch("COMMIT")?;
        tracing::debug!(session = self.id, "committed");
        Ok(())
    }

    /// Discard everything written since the last commit.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.in_transaction() {
            self.connection()?;
            return Ok(());
        }
        self.batch("ROLLBACK")?;
        tracing::debug!(session = self.id, "rolled back");
        Ok(())
    }

    /// Roll back anything uncommitted and release the connection.
    ///
    /// The connection goes back to the pool even when this returns an
    /// error; a lost connection is discarded instead.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        let mut result = Ok(());
        if self.lost {
            conn.mark_broken();
        } else if !conn.is_autocommit() {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                let err = from_sqlite(e);
                if err.is_connection_lost() {
                    conn.mark_broken();
                }
                result = Err(err);
            }
        }

        self.pool.release(conn);
        tracing::debug!(session = self.id, "session closed");
        result
    }

    /// Take the write lock unless this unit of work already holds it.
    fn begin_write(&mut self) -> Result<()> {
        if self.connection()?.is_autocommit() {
            self.batch("BEGIN IMMEDIATE")?;
        }
        Ok(())
    }

    fn connection(&self) -> Result<&Connection> {
        if self.lost {
            return Err(Error::ConnectionLost(format!(
                "session {} is no longer usable",
                self.id
            )));
        }
        self.conn
            .as_ref()
            .map(|c| c.connection())
            .ok_or_else(|| Error::database(format!("session {} is closed", self.id)))
    }

    fn log(&self, sql: &str) {
        if self.echo {
            tracing::info!(target: "realstate_db::sql", session = self.id, "{sql}");
        }
    }

    /// Convert a driver error, retiring the connection if it was lost.
    fn fail(&mut self, e: rusqlite::Error) -> Error {
        let err = from_sqlite(e);
        if err.is_connection_lost() && !self.lost {
            tracing::warn!(session = self.id, "connection lost: {err}");
            self.lost = true;
            if let Some(conn) = self.conn.as_mut() {
                conn.mark_broken();
            }
        }
        err
    }

    fn batch(&mut self, sql: &str) -> Result<()> {
        self.log(sql);
        let result = self.connection()?.execute_batch(sql);
        result.map_err(|e| self.fail(e))
    }

    pub(crate) fn execute(&mut self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        self.begin_write()?;
        self.log(sql);
        let result = self.connection()?.execute(sql, params);
        result.map_err(|e| self.fail(e))
    }

    pub(crate) fn query_opt<T, F>(&mut self, sql: &str, params: &[&dyn ToSql], f: F) -> Result<Option<T>>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.log(sql);
        let result = self.connection()?.query_row(sql, params, f);
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(self.fail(e)),
        }
    }

    pub(crate) fn query_all<T, F>(&mut self, sql: &str, params: &[&dyn ToSql], f: F) -> Result<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.log(sql);
        let result = {
            let conn = self.connection()?;
            match conn.prepare(sql) {
                Ok(mut stmt) => {
                    let rows = stmt
                        .query_map(params, f)
                        .and_then(|mapped| mapped.collect::<rusqlite::Result<Vec<T>>>());
                    rows
                }
                Err(e) => Err(e),
            }
        };
        result.map_err(|e| self.fail(e))
    }

    /// Validate `record` against `table` and insert it, returning the
    /// generated key.
    pub(crate) fn insert(&mut self, table: &TableDef, record: &[(&str, Value<'_>)]) -> Result<i64> {
        table.validate(record)?;

        let columns: Vec<String> = record.iter().map(|(c, _)| format!("\"{c}\"")).collect();
        let placeholders: Vec<String> = (1..=record.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            table.name,
            columns.join(", "),
            placeholders.join(", ")
        );
        let params: Vec<&dyn ToSql> = record.iter().map(|(_, v)| v as &dyn ToSql).collect();

        self.execute(&sql, &params)?;
        Ok(self.connection()?.last_insert_rowid())
    }

    /// Apply a partial update to one row. Returns whether the row exists.
    pub(crate) fn update(
        &mut self,
        table: &TableDef,
        id: i64,
        changes: &[(&str, Value<'_>)],
    ) -> Result<bool> {
        table.validate_partial(changes)?;
        if changes.is_empty() {
            return self.exists(table, id);
        }

        let assignments: Vec<String> = changes
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("\"{c}\" = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE \"{}\" = ?{}",
            table.name,
            assignments.join(", "),
            table.primary_key,
            changes.len() + 1
        );
        let mut params: Vec<&dyn ToSql> = changes.iter().map(|(_, v)| v as &dyn ToSql).collect();
        params.push(&id);

        Ok(self.execute(&sql, &params)? > 0)
    }

    /// Delete one row; dependent rows go with it through the cascading
    /// foreign keys.
    pub(crate) fn delete(&mut self, table: &TableDef, id: i64) -> Result<bool> {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"{}\" = ?1",
            table.name, table.primary_key
        );
        Ok(self.execute(&sql, &[&id])? > 0)
    }

    pub(crate) fn exists(&mut self, table: &TableDef, id: i64) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM \"{}\" WHERE \"{}\" = ?1",
            table.name, table.primary_key
        );
        Ok(self.query_opt(&sql, &[&id], |_| Ok(()))?.is_some())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!(session = self.id, "error releasing session: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle;
    use crate::pool::PoolOptions;
    use crate::schema::OWNER;
    use chrono::NaiveDate;
    use realstate_common::ConstraintKind;
    use std::time::Duration;

    fn manager(pool_size: u32, max_overflow: u32) -> SessionManager {
        let pool = ConnectionPool::memory(PoolOptions {
            pool_size,
            max_overflow,
            timeout: Duration::from_millis(200),
            ..PoolOptions::default()
        })
        .unwrap();
        lifecycle::initialize(&pool).unwrap();
        SessionManager::new(Arc::new(pool))
    }

    fn owner_record() -> Vec<(&'static str, Value<'static>)> {
        vec![
            ("Name", Value::Text("A. Smith")),
            ("Address", Value::Text("1 Main St")),
            ("Birthday", Value::Date(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())),
        ]
    }

    fn owner_count(sessions: &SessionManager) -> i64 {
        let mut s = sessions.open().unwrap();
        s.query_opt("SELECT COUNT(*) FROM \"Owner\"", &[], |row| row.get(0))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn commit_makes_writes_durable() {
        let sessions = manager(1, 1);
        let mut s = sessions.open().unwrap();
        s.insert(&OWNER, &owner_record()).unwrap();
        s.commit().unwrap();
        s.close().unwrap();
        assert_eq!(owner_count(&sessions), 1);
    }

    #[test]
    fn close_without_commit_discards_writes() {
        let sessions = manager(1, 1);
        let mut s = sessions.open().unwrap();
        s.insert(&OWNER, &owner_record()).unwrap();
        s.close().unwrap();
        assert_eq!(owner_count(&sessions), 0);
    }

    #[test]
    fn drop_rolls_back_and_releases() {
        let sessions = manager(1, 0);
        {
            let mut s = sessions.open().unwrap();
            s.insert(&OWNER, &owner_record()).unwrap();
        }
        assert_eq!(sessions.pool().status().idle_connections, 1);
        assert_eq!(owner_count(&sessions), 0);
    }

    #[test]
    fn explicit_rollback_keeps_session_open() {
        let sessions = manager(1, 0);
        let mut s = sessions.open().unwrap();
        s.insert(&OWNER, &owner_record()).unwrap();
        s.rollback().unwrap();
        s.insert(&OWNER, &owner_record()).unwrap();
        s.commit().unwrap();
        s.close().unwrap();
        assert_eq!(owner_count(&sessions), 1);
    }

    #[test]
    fn failed_statement_leaves_session_usable() {
        let sessions = manager(1, 0);
        let mut s = sessions.open().unwrap();
        s.insert(&OWNER, &owner_record()).unwrap();

        // Bypass in-process validation to reach the store's NOT NULL check.
        let err = s
            .execute(
                "INSERT INTO \"Owner\" (\"Name\", \"Address\", \"Birthday\") VALUES (NULL, 'x', '2000-01-01')",
                &[],
            )
            .unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::NotNull));
        assert!(s.is_usable());

        s.commit().unwrap();
        s.close().unwrap();
        assert_eq!(owner_count(&sessions), 1);
    }

    #[test]
    fn lost_connection_is_discarded_on_close() {
        let sessions = manager(0, 2);
        let mut s = sessions.open().unwrap();
        let other = sessions.open().unwrap();
        assert_eq!(sessions.pool().status().connections, 2);

        let err = s.fail(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_IOERR),
            Some("disk I/O error".into()),
        ));
        assert!(err.is_connection_lost());
        assert!(!s.is_usable());
        assert!(matches!(
            s.insert(&OWNER, &owner_record()),
            Err(Error::ConnectionLost(_))
        ));

        s.close().unwrap();
        other.close().unwrap();
        assert_eq!(sessions.pool().status().connections, 1);
    }

    #[test]
    fn with_session_commits_on_ok_and_rolls_back_on_err() {
        let sessions = manager(1, 0);
        sessions
            .with_session(|s| s.insert(&OWNER, &owner_record()))
            .unwrap();
        assert_eq!(owner_count(&sessions), 1);

        let err = sessions
            .with_session(|s| {
                s.insert(&OWNER, &owner_record())?;
                Err::<(), _>(Error::invalid_input("caller gave up"))
            })
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(owner_count(&sessions), 1);
        assert_eq!(sessions.pool().status().idle_connections, 1);
    }

    #[test]
    fn update_and_delete_report_matches() {
        let sessions = manager(1, 0);
        let mut s = sessions.open().unwrap();
        let id = s.insert(&OWNER, &owner_record()).unwrap();
        assert!(s.update(&OWNER, id, &[("Name", Value::Text("B. Jones"))]).unwrap());
        assert!(s.update(&OWNER, id, &[]).unwrap());
        assert!(!s.update(&OWNER, id + 100, &[("Name", Value::Text("x"))]).unwrap());
        assert!(s.delete(&OWNER, id).unwrap());
        assert!(!s.delete(&OWNER, id).unwrap());
        assert!(!s.exists(&OWNER, id).unwrap());
    }

    #[test]
    fn reads_do_not_hold_a_transaction() {
        let sessions = manager(1, 0);
        let mut s = sessions.open().unwrap();
        assert!(!s.in_transaction());
        assert!(!s.exists(&OWNER, 1).unwrap());
        assert!(!s.in_transaction());

        s.insert(&OWNER, &owner_record()).unwrap();
        assert!(s.in_transaction());
        s.commit().unwrap();
        assert!(!s.in_transaction());
        // Nothing pending.
        s.commit().unwrap();
        s.rollback().unwrap();
    }

    #[test]
    fn memory_sessions_see_each_others_commits() {
        let sessions = manager(2, 0);
        let mut a = sessions.open().unwrap();
        let mut b = sessions.open().unwrap();

        let id = a.insert(&OWNER, &owner_record()).unwrap();
        assert!(!b.exists(&OWNER, id).unwrap());

        a.commit().unwrap();
        assert!(b.exists(&OWNER, id).unwrap());

        // Both sessions write in turn without tripping over each other.
        b.update(&OWNER, id, &[("Name", Value::Text("B. Jones"))]).unwrap();
        b.commit().unwrap();
        a.insert(&OWNER, &owner_record()).unwrap();
        a.commit().unwrap();
        drop((a, b));
        assert_eq!(owner_count(&sessions), 2);
    }

    #[test]
    fn memory_writer_waits_for_the_other_writer() {
        let sessions = manager(2, 0);
        let mut a = sessions.open().unwrap();
        a.insert(&OWNER, &owner_record()).unwrap();

        let other = sessions.clone();
        let waiter = std::thread::spawn(move || {
            other.with_session(|s| s.insert(&OWNER, &owner_record()))
        });
        std::thread::sleep(Duration::from_millis(100));
        a.commit().unwrap();
        a.close().unwrap();

        waiter.join().unwrap().unwrap();
        assert_eq!(owner_count(&sessions), 2);
    }

    #[test]
    fn session_ids_are_distinct() {
        let sessions = manager(2, 0);
        let a = sessions.open().unwrap();
        let b = sessions.open().unwrap();
        assert_ne!(a.id(), b.id());
    }
}

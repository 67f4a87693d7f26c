//! Schema lifecycle: create and drop the four tables.
//!
//! Both operations run inside a single transaction, so a failure partway
//! leaves the store as it was and surfaces as `SchemaLifecycle` naming the
//! table that could not be processed.

use realstate_common::{Error, Result};
use serde::Serialize;

use crate::pool::ConnectionPool;
use crate::schema::{dependency_order, TableDef, ALL_TABLES};

/// Existence and size of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStatus {
    pub name: &'static str,
    pub exists: bool,
    /// `None` when the table does not exist.
    pub rows: Option<u64>,
}

/// Create every table that is missing, parents before children. Safe to
/// call on an already initialized store.
pub fn initialize(pool: &ConnectionPool) -> Result<()> {
    let order = dependency_order(&ALL_TABLES)?;
    let dialect = pool.dialect();
    let conn = pool.acquire()?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::schema("initialize", "*", e.to_string()))?;

    for table in &order {
        let mut statements = vec![dialect.create_table(table)];
        statements.extend(dialect.create_indexes(table));
        for sql in &statements {
            tx.execute_batch(sql)
                .map_err(|e| Error::schema("initialize", table.name, e.to_string()))?;
        }
        tracing::debug!(table = table.name, "table ensured");
    }

    tx.commit()
        .map_err(|e| Error::schema("initialize", "*", e.to_string()))?;
    tracing::info!(
        tables = order.len(),
        backend = dialect.name(),
        "schema initialized"
    );
    Ok(())
}

/// Drop every table, children before parents. Destructive.
pub fn teardown(pool: &ConnectionPool) -> Result<()> {
    let mut order: Vec<&TableDef> = dependency_order(&ALL_TABLES)?;
    order.reverse();
    let dialect = pool.dialect();
    let conn = pool.acquire()?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::schema("teardown", "*", e.to_string()))?;

    for table in &order {
        tx.execute_batch(&dialect.drop_table(table))
            .map_err(|e| Error::schema("teardown", table.name, e.to_string()))?;
        tracing::debug!(table = table.name, "table dropped");
    }

    tx.commit()
        .map_err(|e| Error::schema("teardown", "*", e.to_string()))?;
    tracing::warn!(tables = order.len(), "schema torn down");
    Ok(())
}

/// Report which tables exist and how many rows each holds, in creation
/// order.
pub fn status(pool: &ConnectionPool) -> Result<Vec<TableStatus>> {
    let order = dependency_order(&ALL_TABLES)?;
    let dialect = pool.dialect();
    let conn = pool.acquire()?;

    let mut out = Vec::with_capacity(order.len());
    for table in order {
        let found: i64 = conn
            .query_row(dialect.table_exists_sql(), [table.name], |row| row.get(0))
            .map_err(|e| Error::database(e.to_string()))?;
        let rows = if found > 0 {
            let sql = format!("SELECT COUNT(*) FROM {}", dialect.quote(table.name));
            let count: i64 = conn
                .query_row(&sql, [], |row| row.get(0))
                .map_err(|e| Error::database(e.to_string()))?;
            Some(u64::try_from(count).unwrap_or(0))
        } else {
            None
        };
        out.push(TableStatus {
            name: table.name,
            exists: rows.is_some(),
            rows,
        });
    }
    Ok(out)
}

//! SQL rendering of the schema definitions.
//!
//! A [`Dialect`] turns [`TableDef`]s into backend-specific DDL. Swapping the
//! backend means adding a dialect and a connection manager; the schema,
//! session and repository code never see backend syntax beyond standard DML.

use std::fmt;

use crate::schema::{DefaultValue, FieldDef, FieldType, TableDef};

/// Backend-specific DDL rendering.
pub trait Dialect: fmt::Debug + Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Storage type for a semantic column type.
    fn column_type(&self, ty: FieldType) -> &'static str;

    /// Check expression enforcing the column's bounds, if any.
    fn value_check(&self, field: &FieldDef) -> Option<String>;

    fn default_literal(&self, default: DefaultValue) -> String;

    /// Query taking the table name as `?1` and returning 1 if it exists.
    fn table_exists_sql(&self) -> &'static str;

    fn quote(&self, ident: &str) -> String {
        format!("\"{ident}\"")
    }

    fn primary_key_column(&self, name: &str) -> String {
        format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", self.quote(name))
    }

    fn column(&self, field: &FieldDef) -> String {
        let mut col = format!("{} {}", self.quote(field.name), self.column_type(field.ty));
        if !field.nullable {
            col.push_str(" NOT NULL");
        }
        if let Some(default) = field.default {
            col.push_str(" DEFAULT ");
            col.push_str(&self.default_literal(default));
        }
        if let Some(check) = self.value_check(field) {
            if field.nullable {
                col.push_str(&format!(" CHECK ({} IS NULL OR {check})", self.quote(field.name)));
            } else {
                col.push_str(&format!(" CHECK ({check})"));
            }
        }
        col
    }

    /// `CREATE TABLE IF NOT EXISTS` with every constraint of `table`.
    fn create_table(&self, table: &TableDef) -> String {
        let mut lines = vec![self.primary_key_column(table.primary_key)];
        lines.extend(table.fields.iter().map(|f| self.column(f)));
        for column in table.unique {
            lines.push(format!("UNIQUE ({})", self.quote(column)));
        }
        for fk in table.foreign_keys {
            lines.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE",
                self.quote(fk.column),
                self.quote(fk.references),
                self.quote(fk.referenced_column),
            ));
        }
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
            self.quote(table.name),
            lines.join(",\n    ")
        )
    }

    /// One index per foreign-key column.
    fn create_indexes(&self, table: &TableDef) -> Vec<String> {
        table
            .foreign_keys
            .iter()
            .map(|fk| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                    self.quote(&format!("idx_{}_{}", table.name, fk.column)),
                    self.quote(table.name),
                    self.quote(fk.column),
                )
            })
            .collect()
    }

    fn drop_table(&self, table: &TableDef) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote(table.name))
    }
}

/// SQLite rendering. Decimals are stored as exact integer hundredths and
/// dates as ISO-8601 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn column_type(&self, ty: FieldType) -> &'static str {
        match ty {
            FieldType::Integer | FieldType::Decimal { .. } | FieldType::Boolean => "INTEGER",
            FieldType::Text { .. } | FieldType::Date => "TEXT",
            FieldType::Blob => "BLOB",
        }
    }

    fn value_check(&self, field: &FieldDef) -> Option<String> {
        let col = self.quote(field.name);
        match field.ty {
            FieldType::Text { max_len } => Some(format!("length({col}) <= {max_len}")),
            FieldType::Decimal { precision, .. } => {
                Some(format!("abs({col}) < 1{}", "0".repeat(precision as usize)))
            }
            FieldType::Date => Some(format!("date({col}) IS NOT NULL")),
            FieldType::Boolean => Some(format!("{col} IN (0, 1)")),
            FieldType::Integer | FieldType::Blob => None,
        }
    }

    fn default_literal(&self, default: DefaultValue) -> String {
        match default {
            DefaultValue::Bool(b) => u8::from(b).to_string(),
        }
    }

    fn table_exists_sql(&self) -> &'static str {
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1"
    }
}

//! Entity schema: tables, columns, keys and integrity rules.
//!
//! The definitions here are pure data. [`crate::dialect`] renders them to
//! DDL, and [`TableDef::validate`] checks a record against them in-process
//! before any SQL is issued, so both paths share a single source of truth.

use std::collections::HashSet;

use chrono::NaiveDate;
use realstate_common::{ConstraintKind, Error, Money, Result};

/// Semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// 64-bit signed integer.
    Integer,
    /// Text with a maximum length in characters.
    Text { max_len: u32 },
    /// Exact decimal with `precision` total digits and `scale` fractional.
    Decimal { precision: u32, scale: u32 },
    /// Calendar date without time zone.
    Date,
    /// Opaque binary payload.
    Blob,
    Boolean,
}

/// Literal default applied by the store when a column is omitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultValue {
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
}

impl FieldDef {
    const fn required(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            default: None,
        }
    }

    const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
            default: None,
        }
    }

    const fn with_default(self, default: DefaultValue) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    /// Whether an insert must supply this column.
    pub fn is_mandatory(&self) -> bool {
        !self.nullable && self.default.is_none()
    }
}

/// A reference from a child column to its parent's primary key.
///
/// Every foreign key cascades: deleting the parent row deletes the rows
/// referencing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForeignKey {
    /// Referencing column on this table.
    pub column: &'static str,
    /// Referenced (parent) table.
    pub references: &'static str,
    /// Referenced column, the parent's primary key.
    pub referenced_column: &'static str,
}

/// Full description of one table.
#[derive(Debug, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    /// Auto-incrementing integer surrogate key generated on insert.
    pub primary_key: &'static str,
    pub fields: &'static [FieldDef],
    pub foreign_keys: &'static [ForeignKey],
    /// Columns carrying a single-column uniqueness constraint.
    pub unique: &'static [&'static str],
}

const NAME: FieldType = FieldType::Text { max_len: 255 };
const ADDRESS: FieldType = FieldType::Text { max_len: 500 };
const CODE: FieldType = FieldType::Text { max_len: 50 };
const AMOUNT: FieldType = FieldType::Decimal {
    precision: 18,
    scale: 2,
};

pub static OWNER: TableDef = TableDef {
    name: "Owner",
    primary_key: "IdOwner",
    fields: &[
        FieldDef::required("Name", NAME),
        FieldDef::required("Address", ADDRESS),
        FieldDef::optional("Photo", FieldType::Blob),
        FieldDef::required("Birthday", FieldType::Date),
    ],
    foreign_keys: &[],
    unique: &[],
};

pub static PROPERTY: TableDef = TableDef {
    name: "Property",
    primary_key: "IdProperty",
    fields: &[
        FieldDef::required("Name", NAME),
        FieldDef::required("Address", ADDRESS),
        FieldDef::required("Price", AMOUNT),
        FieldDef::required("CodeInternal", CODE),
        FieldDef::required("Year", FieldType::Integer),
        FieldDef::required("IdOwner", FieldType::Integer),
    ],
    foreign_keys: &[ForeignKey {
        column: "IdOwner",
        references: "Owner",
        referenced_column: "IdOwner",
    }],
    unique: &["CodeInternal"],
};

pub static PROPERTY_IMAGE: TableDef = TableDef {
    name: "PropertyImage",
    primary_key: "IdPropertyImage",
    fields: &[
        FieldDef::required("IdProperty", FieldType::Integer),
        FieldDef::required("File", FieldType::Blob),
        FieldDef::required("Enabled", FieldType::Boolean).with_default(DefaultValue::Bool(true)),
    ],
    foreign_keys: &[ForeignKey {
        column: "IdProperty",
        references: "Property",
        referenced_column: "IdProperty",
    }],
    unique: &[],
};

pub static PROPERTY_TRACE: TableDef = TableDef {
    name: "PropertyTrace",
    primary_key: "IdPropertyTrace",
    fields: &[
        FieldDef::required("IdProperty", FieldType::Integer),
        FieldDef::required("DateSale", FieldType::Date),
        FieldDef::required("Name", NAME),
        FieldDef::required("Value", AMOUNT),
        FieldDef::required("Tax", AMOUNT),
    ],
    foreign_keys: &[ForeignKey {
        column: "IdProperty",
        references: "Property",
        referenced_column: "IdProperty",
    }],
    unique: &[],
};

/// Every table of the store.
pub static ALL_TABLES: [&TableDef; 4] = [&OWNER, &PROPERTY, &PROPERTY_IMAGE, &PROPERTY_TRACE];

/// A column value handed to the store. Borrowed so that large blobs are
/// never copied on their way to a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Null,
    Integer(i64),
    Text(&'a str),
    Decimal(Money),
    Date(NaiveDate),
    Blob(&'a [u8]),
    Boolean(bool),
}

impl Value<'_> {
    fn matches(&self, ty: FieldType) -> bool {
        matches!(
            (self, ty),
            (Value::Null, _)
                | (Value::Integer(_), FieldType::Integer)
                | (Value::Text(_), FieldType::Text { .. })
                | (Value::Decimal(_), FieldType::Decimal { .. })
                | (Value::Date(_), FieldType::Date)
                | (Value::Blob(_), FieldType::Blob)
                | (Value::Boolean(_), FieldType::Boolean)
        )
    }
}

/// Column/value pairs for one insert or update.
pub type Record<'a> = Vec<(&'static str, Value<'a>)>;

impl TableDef {
    /// Look up a column definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validate a full record for insertion.
    pub fn validate(&self, record: &[(&str, Value<'_>)]) -> Result<()> {
        self.validate_values(record)?;
        for field in self.fields.iter().filter(|f| f.is_mandatory()) {
            if !record.iter().any(|(name, _)| *name == field.name) {
                return Err(Error::constraint(
                    ConstraintKind::NotNull,
                    format!("{}.{} is required", self.name, field.name),
                ));
            }
        }
        Ok(())
    }

    /// Validate the columns present in a partial update.
    pub fn validate_partial(&self, record: &[(&str, Value<'_>)]) -> Result<()> {
        self.validate_values(record)
    }

    fn validate_values(&self, record: &[(&str, Value<'_>)]) -> Result<()> {
        let mut seen = HashSet::new();
        for (name, value) in record {
            if *name == self.primary_key {
                return Err(Error::constraint(
                    ConstraintKind::UnknownColumn,
                    format!("{}.{name} is generated by the store", self.name),
                ));
            }
            let Some(field) = self.field(name) else {
                return Err(Error::constraint(
                    ConstraintKind::UnknownColumn,
                    format!("{} has no column {name}", self.name),
                ));
            };
            if !seen.insert(*name) {
                return Err(Error::constraint(
                    ConstraintKind::Check,
                    format!("{}.{name} given more than once", self.name),
                ));
            }
            self.check_value(field, value)?;
        }
        Ok(())
    }

    fn check_value(&self, field: &FieldDef, value: &Value<'_>) -> Result<()> {
        let column = format!("{}.{}", self.name, field.name);
        if *value == Value::Null {
            if field.nullable {
                return Ok(());
            }
            return Err(Error::constraint(
                ConstraintKind::NotNull,
                format!("{column} may not be null"),
            ));
        }
        if !value.matches(field.ty) {
            return Err(Error::constraint(
                ConstraintKind::Type,
                format!("{column} expects {:?}, got {value:?}", field.ty),
            ));
        }
        match (field.ty, value) {
            (FieldType::Text { max_len }, Value::Text(s)) if s.chars().count() > max_len as usize => {
                Err(Error::constraint(
                    ConstraintKind::Check,
                    format!("{column} exceeds {max_len} characters"),
                ))
            }
            (FieldType::Decimal { precision, scale }, Value::Decimal(m))
                if !m.fits(precision) =>
            {
                Err(Error::constraint(
                    ConstraintKind::Check,
                    format!("{column} value {m} exceeds NUMERIC({precision}, {scale})"),
                ))
            }
            _ => Ok(()),
        }
    }
}

/// Order tables so that every parent precedes its children.
///
/// Ties keep the input order. A reference to a table outside `tables` is
/// ignored; a cycle is reported as a schema error.
pub fn dependency_order<'t>(tables: &[&'t TableDef]) -> Result<Vec<&'t TableDef>> {
    let mut ordered: Vec<&'t TableDef> = Vec::with_capacity(tables.len());
    let mut remaining: Vec<&'t TableDef> = tables.to_vec();

    while !remaining.is_empty() {
        let ready = remaining.iter().position(|t| {
            t.foreign_keys.iter().all(|fk| {
                fk.references == t.name
                    || ordered.iter().any(|o| o.name == fk.references)
                    || !tables.iter().any(|x| x.name == fk.references)
            })
        });
        match ready {
            Some(idx) => ordered.push(remaining.remove(idx)),
            None => {
                return Err(Error::schema(
                    "initialize",
                    remaining[0].name,
                    "foreign keys form a cycle",
                ))
            }
        }
    }
    Ok(ordered)
}

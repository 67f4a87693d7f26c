//! Property trace (sale history) CRUD operations.

use realstate_common::{Error, PropertyId, PropertyTraceId, Result};

use crate::models::{NewPropertyTrace, PropertyTrace, PropertyTraceChanges};
use crate::schema::PROPERTY_TRACE;
use crate::session::Session;

const COLS: &str = r#""IdPropertyTrace", "IdProperty", "DateSale", "Name", "Value", "Tax""#;

pub struct PropertyTraceRepository<'s> {
    session: &'s mut Session,
}

impl<'s> PropertyTraceRepository<'s> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    pub fn insert(&mut self, new: NewPropertyTrace) -> Result<PropertyTrace> {
        let id = self.session.insert(&PROPERTY_TRACE, &new.record())?;
        Ok(new.into_trace(PropertyTraceId::from(id)))
    }

    pub fn get(&mut self, id: PropertyTraceId) -> Result<Option<PropertyTrace>> {
        let q = format!(r#"SELECT {COLS} FROM "PropertyTrace" WHERE "IdPropertyTrace" = ?1"#);
        self.session.query_opt(&q, &[&id.get()], PropertyTrace::from_row)
    }

    pub fn require(&mut self, id: PropertyTraceId) -> Result<PropertyTrace> {
        self.get(id)?.ok_or_else(|| Error::not_found("PropertyTrace", id))
    }

    pub fn list(&mut self) -> Result<Vec<PropertyTrace>> {
        let q = format!(r#"SELECT {COLS} FROM "PropertyTrace" ORDER BY "IdPropertyTrace" ASC"#);
        self.session.query_all(&q, &[], PropertyTrace::from_row)
    }

    /// Sale history of one property, oldest sale first.
    pub fn list_by_property(&mut self, property: PropertyId) -> Result<Vec<PropertyTrace>> {
        let q = format!(
            r#"SELECT {COLS} FROM "PropertyTrace" WHERE "IdProperty" = ?1
               ORDER BY "DateSale" ASC, "IdPropertyTrace" ASC"#
        );
        self.session.query_all(&q, &[&property.get()], PropertyTrace::from_row)
    }

    pub fn update(&mut self, id: PropertyTraceId, changes: &PropertyTraceChanges) -> Result<bool> {
        self.session.update(&PROPERTY_TRACE, id.get(), &changes.record())
    }

    pub fn delete(&mut self, id: PropertyTraceId) -> Result<bool> {
        self.session.delete(&PROPERTY_TRACE, id.get())
    }
}

//! Property image CRUD operations.

use realstate_common::{Error, PropertyId, PropertyImageId, Result};

use crate::models::{NewPropertyImage, PropertyImage, PropertyImageChanges};
use crate::schema::{Value, PROPERTY_IMAGE};
use crate::session::Session;

const COLS: &str = r#""IdPropertyImage", "IdProperty", "File", "Enabled""#;

pub struct PropertyImageRepository<'s> {
    session: &'s mut Session,
}

impl<'s> PropertyImageRepository<'s> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Insert an image. It starts enabled unless `new.enabled` says otherwise.
    pub fn insert(&mut self, new: NewPropertyImage) -> Result<PropertyImage> {
        let id = self.session.insert(&PROPERTY_IMAGE, &new.record())?;
        self.require(PropertyImageId::from(id))
    }

    pub fn get(&mut self, id: PropertyImageId) -> Result<Option<PropertyImage>> {
        let q = format!(r#"SELECT {COLS} FROM "PropertyImage" WHERE "IdPropertyImage" = ?1"#);
        self.session.query_opt(&q, &[&id.get()], PropertyImage::from_row)
    }

    pub fn require(&mut self, id: PropertyImageId) -> Result<PropertyImage> {
        self.get(id)?.ok_or_else(|| Error::not_found("PropertyImage", id))
    }

    pub fn list(&mut self) -> Result<Vec<PropertyImage>> {
        let q = format!(r#"SELECT {COLS} FROM "PropertyImage" ORDER BY "IdPropertyImage" ASC"#);
        self.session.query_all(&q, &[], PropertyImage::from_row)
    }

    pub fn list_by_property(&mut self, property: PropertyId) -> Result<Vec<PropertyImage>> {
        let q = format!(
            r#"SELECT {COLS} FROM "PropertyImage" WHERE "IdProperty" = ?1 ORDER BY "IdPropertyImage" ASC"#
        );
        self.session.query_all(&q, &[&property.get()], PropertyImage::from_row)
    }

    pub fn list_enabled_by_property(&mut self, property: PropertyId) -> Result<Vec<PropertyImage>> {
        let q = format!(
            r#"SELECT {COLS} FROM "PropertyImage"
               WHERE "IdProperty" = ?1 AND "Enabled" = 1
               ORDER BY "IdPropertyImage" ASC"#
        );
        self.session.query_all(&q, &[&property.get()], PropertyImage::from_row)
    }

    pub fn update(&mut self, id: PropertyImageId, changes: &PropertyImageChanges) -> Result<bool> {
        self.session.update(&PROPERTY_IMAGE, id.get(), &changes.record())
    }

    /// Enable or disable an image. Returns false if no such image exists.
    pub fn set_enabled(&mut self, id: PropertyImageId, enabled: bool) -> Result<bool> {
        self.session
            .update(&PROPERTY_IMAGE, id.get(), &[("Enabled", Value::Boolean(enabled))])
    }

    pub fn delete(&mut self, id: PropertyImageId) -> Result<bool> {
        self.session.delete(&PROPERTY_IMAGE, id.get())
    }
}

//! Owner CRUD operations.

use realstate_common::{Error, OwnerId, Result};

use super::PropertyRepository;
use crate::models::{NewOwner, Owner, OwnerChanges, Property};
use crate::schema::OWNER;
use crate::session::Session;

const COLS: &str = r#""IdOwner", "Name", "Address", "Photo", "Birthday""#;

pub struct OwnerRepository<'s> {
    session: &'s mut Session,
}

impl<'s> OwnerRepository<'s> {
    pub(crate) fn new(session: &'s mut Session) -> Self {
        Self { session }
    }

    /// Insert a new owner and return it with its generated id.
    pub fn insert(&mut self, new: NewOwner) -> Result<Owner> {
        let id = self.session.insert(&OWNER, &new.record())?;
        Ok(new.into_owner(OwnerId::from(id)))
    }

    pub fn get(&mut self, id: OwnerId) -> Result<Option<Owner>> {
        let q = format!(r#"SELECT {COLS} FROM "Owner" WHERE "IdOwner" = ?1"#);
        self.session.query_opt(&q, &[&id.get()], Owner::from_row)
    }

    /// Like [`get`](Self::get), but a missing row is an error.
    pub fn require(&mut self, id: OwnerId) -> Result<Owner> {
        self.get(id)?.ok_or_else(|| Error::not_found("Owner", id))
    }

    /// List all owners ordered by name.
    pub fn list(&mut self) -> Result<Vec<Owner>> {
        let q = format!(r#"SELECT {COLS} FROM "Owner" ORDER BY "Name" ASC, "IdOwner" ASC"#);
        self.session.query_all(&q, &[], Owner::from_row)
    }

    /// Apply `changes`. Returns false if no such owner exists.
    pub fn update(&mut self, id: OwnerId, changes: &OwnerChanges) -> Result<bool> {
        self.session.update(&OWNER, id.get(), &changes.record())
    }

    /// Delete an owner together with its properties, their images and
    /// their traces. Returns true if the owner existed.
    pub fn delete(&mut self, id: OwnerId) -> Result<bool> {
        self.session.delete(&OWNER, id.get())
    }

    /// Properties held by `id`.
    pub fn properties_for_owner(&mut self, id: OwnerId) -> Result<Vec<Property>> {
        PropertyRepository::new(&mut *self.session).list_by_owner(id)
    }
}

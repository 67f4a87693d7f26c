//! Repositories: typed insert/update/delete/query access per entity.
//!
//! A repository borrows a [`crate::Session`] mutably for as long as it is
//! used, so every call runs inside that session's unit of work. Relations
//! are explicit queries (`properties_for_owner`, `images_for_property`);
//! nothing is loaded behind the caller's back.

mod owners;
mod properties;
mod property_images;
mod property_traces;

pub use owners::OwnerRepository;
pub use properties::{PropertyFilter, PropertyRepository};
pub use property_images::PropertyImageRepository;
pub use property_traces::PropertyTraceRepository;

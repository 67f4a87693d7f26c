//! realstate-db: relational persistence for owners, properties, property
//! images and property sale traces.
//!
//! The crate is layered bottom-up:
//!
//! - [`schema`]: table definitions, constraints and in-process validation
//! - [`dialect`]: DDL rendering for the backend
//! - [`descriptor`] and [`pool`]: connection descriptors and a bounded,
//!   pre-pinging connection pool
//! - [`session`]: units of work over one pooled connection
//! - [`repositories`] and [`models`]: typed access per entity
//! - [`lifecycle`]: create / drop the schema
//! - [`store`]: the facade tying it together
//!
//! ```
//! use chrono::NaiveDate;
//! use realstate_db::{models::NewOwner, Store};
//!
//! let store = Store::memory()?;
//! let owner = store.with_session(|s| {
//!     s.owners().insert(NewOwner {
//!         name: "A. Smith".into(),
//!         address: "1 Main St".into(),
//!         photo: None,
//!         birthday: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
//!     })
//! })?;
//! assert_eq!(owner.name, "A. Smith");
//! # Ok::<(), realstate_common::Error>(())
//! ```

pub mod config;
pub mod descriptor;
pub mod dialect;
mod errors;
pub mod lifecycle;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod schema;
pub mod session;
pub mod store;

pub use config::DatabaseConfig;
pub use descriptor::ConnectionDescriptor;
pub use lifecycle::TableStatus;
pub use pool::{ConnectionPool, PoolOptions, PoolStatus};
pub use repositories::PropertyFilter;
pub use session::{Session, SessionManager};
pub use store::Store;

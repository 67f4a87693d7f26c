//! Realstate-Common: shared types used by every realstate crate.
//!
//! - **Typed IDs**: integer newtypes for owners, properties, images, traces
//! - **Money**: exact fixed-point amounts with two fractional digits
//! - **Error Handling**: the unified [`Error`] type and [`Result`] alias
//!
//! # Examples
//!
//! ```
//! use realstate_common::{Money, OwnerId, Error, Result};
//!
//! let owner = OwnerId::from(7);
//! assert_eq!(owner.get(), 7);
//!
//! let price: Money = "250000.50".parse().unwrap();
//! assert_eq!(price.cents(), 25_000_050);
//!
//! fn lookup() -> Result<()> {
//!     Err(Error::not_found("Owner", OwnerId::from(8)))
//! }
//! assert!(lookup().is_err());
//! ```

pub mod error;
pub mod ids;
pub mod money;

pub use error::{ConstraintKind, Error, Result};
pub use ids::*;
pub use money::Money;

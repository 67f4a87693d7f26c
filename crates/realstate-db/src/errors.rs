//! Classification of SQLite failures into the store's error taxonomy.

use realstate_common::{ConstraintKind, Error};
use rusqlite::{ffi, ErrorCode};

/// Map a rusqlite error onto [`Error`].
///
/// Constraint failures keep their kind; a busy or locked store is `Busy`;
/// I/O, corruption and open failures mean the connection can no longer be
/// trusted.
pub(crate) fn from_sqlite(e: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, message) = &e {
        let text = message.clone().unwrap_or_else(|| failure.to_string());
        match failure.code {
            ErrorCode::ConstraintViolation => {
                return Error::constraint(constraint_kind(failure.extended_code), text)
            }
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => return Error::Busy(text),
            ErrorCode::SystemIoFailure
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::NotADatabase
            | ErrorCode::CannotOpen => return Error::ConnectionLost(text),
            _ => {}
        }
    }
    Error::database(e.to_string())
}

fn constraint_kind(extended_code: std::os::raw::c_int) -> ConstraintKind {
    match extended_code {
        ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => ConstraintKind::Unique,
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
        _ => ConstraintKind::Check,
    }
}

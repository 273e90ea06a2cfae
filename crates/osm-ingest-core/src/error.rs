//! Typed errors raised by the core crate.

use thiserror::Error;

/// A single element could not be shaped into a record.
///
/// Both variants are fatal for the element. Whether the surrounding
/// conversion aborts or skips the element is the caller's policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    #[error("{element} {id}: missing required attribute '{attribute}'")]
    MissingAttribute {
        element: String,
        id: String,
        attribute: &'static str,
    },

    #[error("{id}: attribute '{attribute}' is not a number: '{value}'")]
    MalformedCoordinate {
        id: String,
        attribute: &'static str,
        value: String,
    },
}

/// The document store could not be reached or rejected a query.
///
/// Backends wrap their driver errors in this type so callers can tell
/// storage failures apart from data errors. No retry is attempted.
#[derive(Debug, Error)]
#[error("document store unavailable: {0}")]
pub struct StoreUnavailable(pub String);

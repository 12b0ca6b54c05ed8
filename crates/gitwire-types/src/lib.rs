//! Common types used throughout `gitwire`.
//!
//! This crate provides the value types the protocol codecs exchange with
//! the rest of a Git implementation: object identifiers in their wire
//! text form and reference names.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod object_id;
mod reference;

pub use error::{Result, TypesError};
pub use object_id::{ObjectId, HEX_LEN, RAW_LEN};
pub use reference::ReferenceName;

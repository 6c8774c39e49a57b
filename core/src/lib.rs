//! Core library for Folio, a store of Markdown documents organized into
//! schema-validated collections.
//!
//! Start with [`storage::Library`]; everything else is reachable from there.

pub mod error;
pub mod markdown;
pub mod path;
pub mod schema;
pub mod storage;

pub use error::{Error, Result};

//! Filesystem storage of collections and records.
//!
//! # Core Concepts
//!
//! *   **[`Library`]:** The root directory of all managed documents, and the
//!     facade every engine operation hangs off. A library may carry a
//!     `.folio/config.json` holding its [`LibraryConfig`]; without one the
//!     defaults apply. Start with [`Library::open`] or [`Library::create`].
//! *   **[`Collection`]:** A directory of records. Its optional index document
//!     (`index.md`) declares the collection's title, icon, description and
//!     [`Schema`](crate::schema::Schema) in front matter.
//! *   **[`Record`]:** A Markdown file directly inside a collection. Its id is
//!     the file name without extension.
//! *   **Archive:** A sub-directory whose name starts with the archive prefix
//!     (`_` by default). Archived records are not members of the collection
//!     and are left out of the tree, but [`Library::list_archived`] still
//!     enumerates them.
//!
//! # Reserved Names
//!
//! The index document and the readme (`README.md`, any case) are never
//! records. Dot-files and dot-directories, including the internal `.folio`
//! directory, are ignored everywhere.
//!
//! All paths taken and returned by this module are library-relative, use `/`
//! as separator, and are rejected with [`Error::PathViolation`] when they
//! would resolve outside the library root.

mod archive;
mod collection;
mod config;
mod file;
mod library;
mod record;
mod relation;
mod tree;

pub use crate::error::{Error, Result};
pub use collection::{Collection, CollectionMetaUpdate, CollectionView, NormalizeReport};
pub use config::{CONFIG_FILENAME, INTERNAL_DIR_NAME, LibraryConfig};
pub use file::{Entry, EntryKind, FileStore, MOVE_MARKER_SUFFIX};
pub use library::Library;
pub use record::Record;
pub use relation::{Relation, RelationOption};
pub use tree::{NodeKind, TreeNode};

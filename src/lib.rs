//! # fieldwise
//!
//! Schema-directed structured merge and diff with per-manager field
//! ownership.
//!
//! The library maintains, for a single structured document (a tree of
//! maps, lists, and scalars typed by a user-supplied schema), a record of
//! which field paths are owned by which named manager, and performs the
//! write operations that respect those ownerships: apply, force-apply,
//! update, and extract-apply.
//!
//! ## Modules
//!
//! - [`value`] - in-memory representation of YAML/JSON documents
//! - [`path`] - addresses of nodes within a document
//! - [`fieldset`] - trie-shaped sets of paths and the managed-field table
//! - [`schema`] - the type catalog driving the walkers
//! - [`typed`] - values bound to a schema type: validation, path
//!   enumeration, diff, merge, and projection
//! - [`engine`] - the manager-set state machine

pub mod engine;
pub mod fieldset;
pub mod path;
pub mod schema;
pub mod typed;
pub mod value;

pub use engine::{
    ApplyError, Conflict, Conflicts, ConversionError, Engine, EngineBuilder, UpdateError,
    VersionConverter,
};
pub use fieldset::{ApiVersion, FieldSet, ManagedFields, ManagerSet};
pub use path::{KeyFields, Path, PathElement};
pub use schema::Schema;
pub use typed::{deduced_type, Comparison, ParseError, ParseableType, Parser, TypedValue};
pub use value::Value;

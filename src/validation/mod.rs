//! Validation of tilesets.
//!
//! Problems in the validated data are collected as [`ValidationIssue`]s
//! in a [`ValidationContext`]; validators return whether the validated
//! object was valid. Only broken internal assumptions are `Err`s, and
//! those are turned into `INTERNAL_ERROR` issues before they reach the
//! caller of [`TilesetValidator`].
//!
//! - [`TilesetValidator`] - entry point for tileset JSON
//! - [`TilesetTraversingValidator`] - validates the tile hierarchy
//! - [`TileValidator`] / [`TileContentValidator`] - per-tile checks
//! - [`ContentDataValidators`] - content data checks, by content type

mod content;
mod context;
mod extensions;
mod formats;
mod issues;
mod options;
mod schema;
mod state;
mod statistics;
mod tile;
mod tileset;
mod traversing;

pub use content::{
    BasicTileContentValidator, ContentDataValidator, ContentDataValidators, TileContentValidator,
};
pub use context::ValidationContext;
pub use extensions::{ExtensionValidator, ExtensionsValidationResult, ExtensionsValidator};
pub use issues::{IssueType, Severity, ValidationIssue, ValidationResult};
pub use options::ValidationOptions;
pub use schema::SchemaValidator;
pub use state::ValidationState;
pub use statistics::StatisticsValidator;
pub use tile::{BasicTileValidator, TileValidator};
pub use tileset::TilesetValidator;
pub use traversing::TilesetTraversingValidator;

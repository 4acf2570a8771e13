//! # Tileset validator
//!
//! Validation of 3D Tiles tilesets: the tile hierarchy with explicit and
//! implicit tiling, tile contents, and the values of structural metadata.
//!
//! ## Modules
//!
//! - [`util`] - Errors, component types, metadata values
//! - [`io`] - Resource resolution and content type detection
//! - [`structure`] - Tileset, schema and property table JSON models
//! - [`implicit`] - Implicit tiling: coordinates, subtrees, availability
//! - [`traversal`] - Traversal of explicit and implicit tiles
//! - [`metadata`] - Property models and metadata value validation
//! - [`gltf`] - GLB parsing and `EXT_structural_metadata`
//! - [`validation`] - Validators, issues and the validation context
//!
//! ## Example
//!
//! ```ignore
//! use tileset_validator::validation::{TilesetValidator, ValidationOptions};
//!
//! let result = TilesetValidator::validate_file("tileset.json", ValidationOptions::default())?;
//! for issue in &result.issues {
//!     println!("{}", issue);
//! }
//! ```

pub mod util;
pub mod io;
pub mod structure;
pub mod implicit;
pub mod traversal;
pub mod metadata;
pub mod gltf;
pub mod validation;

// Re-export commonly used types
pub use util::{Error, Result};
pub use validation::{TilesetValidator, ValidationOptions, ValidationResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::io::{FileResourceResolver, MemoryResourceResolver, ResourceResolver};
    pub use crate::metadata::{MetadataPropertyModel, MetadataValuesValidator};
    pub use crate::structure::{Schema, Tile, Tileset};
    pub use crate::traversal::{TilesetTraverser, TraversalOrder, TraversedTile};
    pub use crate::util::{Error, MetadataValue, Result};
    pub use crate::validation::{
        IssueType, Severity, TilesetValidator, ValidationContext, ValidationIssue, ValidationOptions,
        ValidationResult,
    };
}

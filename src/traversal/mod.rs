//! Tileset traversal.
//!
//! [`TilesetTraverser`] walks a tileset and hands out [`TraversedTile`]s,
//! which look the same for explicit tiles and for tiles of implicit
//! trees. Implicit tiles are created lazily from subtree availability.

mod overrides;
mod traversed_tile;
mod traverser;

pub use overrides::{apply_metadata_semantics, apply_table_semantics, TILE_GEOMETRIC_ERROR};
pub use traversed_tile::TraversedTile;
pub use traverser::{TilesetTraverser, TraversalOrder};

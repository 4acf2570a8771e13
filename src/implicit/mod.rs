//! Implicit tiling: trees of tiles that are described by subtree files
//! instead of explicit `children` arrays.
//!
//! - [`TreeCoordinates`] - level and x/y(/z) of a node, Morton indices
//! - [`ImplicitTiling`] - a checked `implicitTiling` descriptor
//! - [`SubtreeModel`] - a parsed subtree with decoded availability
//!
//! Every failure in this module is a tiling error
//! ([`Error::ImplicitTiling`](crate::util::Error::ImplicitTiling)).

mod availability;
mod coordinates;
mod subtree;
mod template;
mod tiling;

pub use availability::{Availability, AvailabilityJson, BitstreamSource};
pub use coordinates::{SubdivisionScheme, TreeCoordinates};
pub use subtree::{
    encode_binary_subtree, SubtreeJson, SubtreeModel, SUBTREE_HEADER_SIZE, SUBTREE_MAGIC, SUBTREE_VERSION,
};
pub use template::substitute_template;
pub use tiling::ImplicitTiling;

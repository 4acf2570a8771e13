//! Validated implicit tiling descriptors.

use super::coordinates::SubdivisionScheme;
use crate::structure::TileImplicitTiling;
use crate::util::{Error, Result};

/// The implicit tiling of a tile, with checked values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplicitTiling {
    pub scheme: SubdivisionScheme,
    /// Number of levels in each subtree
    pub subtree_levels: u32,
    /// Number of levels in the whole tree
    pub available_levels: u32,
    /// Template for subtree URIs
    pub subtrees_uri: String,
}

impl ImplicitTiling {
    /// Check a descriptor from tileset JSON. Invalid values are a
    /// tiling error, since no tree can be derived from them.
    pub fn from_descriptor(descriptor: &TileImplicitTiling) -> Result<Self> {
        let scheme = SubdivisionScheme::from_name(&descriptor.subdivision_scheme).ok_or_else(|| {
            Error::tiling(format!(
                "Invalid subdivision scheme '{}'",
                descriptor.subdivision_scheme
            ))
        })?;
        let levels = |name: &str, value: i64| -> Result<u32> {
            u32::try_from(value)
                .ok()
                .filter(|v| (1..32).contains(v))
                .ok_or_else(|| Error::tiling(format!("Invalid {}: {}", name, value)))
        };
        let subtree_levels = levels("subtreeLevels", descriptor.subtree_levels)?;
        let available_levels = levels("availableLevels", descriptor.available_levels)?;
        if descriptor.subtrees.uri.is_empty() {
            return Err(Error::tiling("The subtrees URI template is empty"));
        }
        Ok(Self {
            scheme,
            subtree_levels,
            available_levels,
            subtrees_uri: descriptor.subtrees.uri.clone(),
        })
    }

    /// Number of tiles in a full subtree.
    pub fn tiles_per_subtree(&self) -> Result<u64> {
        self.scheme.level_offset(self.subtree_levels)
    }

    /// Number of child subtrees of a subtree.
    pub fn child_subtrees_per_subtree(&self) -> Result<u64> {
        self.scheme.nodes_in_level(self.subtree_levels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(value: serde_json::Value) -> TileImplicitTiling {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_descriptor() {
        let tiling = ImplicitTiling::from_descriptor(&descriptor(json!({
            "subdivisionScheme": "OCTREE",
            "subtreeLevels": 2,
            "availableLevels": 5,
            "subtrees": { "uri": "s/{level}/{x}/{y}/{z}.subtree" }
        })))
        .unwrap();
        assert_eq!(tiling.scheme, SubdivisionScheme::Octree);
        assert_eq!(tiling.tiles_per_subtree().unwrap(), 9);
        assert_eq!(tiling.child_subtrees_per_subtree().unwrap(), 64);
    }

    #[test]
    fn test_invalid_descriptors() {
        for value in [
            json!({ "subdivisionScheme": "BINARY", "subtreeLevels": 2, "availableLevels": 2, "subtrees": { "uri": "a" } }),
            json!({ "subdivisionScheme": "QUADTREE", "subtreeLevels": 0, "availableLevels": 2, "subtrees": { "uri": "a" } }),
            json!({ "subdivisionScheme": "QUADTREE", "subtreeLevels": 2, "availableLevels": -1, "subtrees": { "uri": "a" } }),
            json!({ "subdivisionScheme": "QUADTREE", "subtreeLevels": 2, "availableLevels": 2, "subtrees": { "uri": "" } }),
        ] {
            let err = ImplicitTiling::from_descriptor(&descriptor(value)).unwrap_err();
            assert!(err.is_tiling_error());
        }
    }
}

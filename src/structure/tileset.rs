//! Tileset JSON structures.
//!
//! These are plain data structures that mirror the JSON. Values that are
//! subject to validation (numbers that must be non-negative, strings that
//! must be from a fixed set) are kept loose here so that invalid values
//! can be reported as issues instead of failing the parse.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Schema;

/// A tileset: the root document of a tile hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tileset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<Asset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<MetadataEntity>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometric_error: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Tile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions_used: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions_required: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tileset_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

/// Statistics about the metadata of a tileset, per class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<BTreeMap<String, Value>>,
}

/// An instance of a metadata class (tileset/group/tile/content metadata).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataEntity {
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

/// One node of the tile hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_volume: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewer_request_volume: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometric_error: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<Vec<Content>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implicit_tiling: Option<TileImplicitTiling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Tile>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

/// A content reference of a tile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// The content URI (`url` in legacy tilesets).
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_volume: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MetadataEntity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

/// The implicit tiling descriptor of a tile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileImplicitTiling {
    pub subdivision_scheme: String,
    pub subtree_levels: i64,
    pub available_levels: i64,
    pub subtrees: SubtreesTemplate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtreesTemplate {
    pub uri: String,
}

impl Tile {
    /// The contents of this tile: empty, the single `content`, or `contents`.
    pub fn all_contents(&self) -> Vec<&Content> {
        if let Some(content) = &self.content {
            return vec![content];
        }
        self.contents.iter().flatten().collect()
    }
}

impl Tileset {
    /// Parse a tileset from JSON bytes.
    pub fn from_slice(data: &[u8]) -> crate::util::Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_tileset() {
        let tileset: Tileset = serde_json::from_value(json!({
            "asset": { "version": "1.1" },
            "geometricError": 100,
            "root": {
                "boundingVolume": { "sphere": [0, 0, 0, 10] },
                "geometricError": 10,
                "refine": "ADD",
                "content": { "url": "a.b3dm" },
                "children": [ { "geometricError": 0 } ]
            }
        }))
        .unwrap();
        let root = tileset.root.as_ref().unwrap();
        assert_eq!(root.geometric_error, Some(10.0));
        assert_eq!(root.content.as_ref().unwrap().uri.as_deref(), Some("a.b3dm"));
        assert_eq!(root.children.as_ref().unwrap().len(), 1);
        assert_eq!(root.all_contents().len(), 1);
    }

    #[test]
    fn test_parse_implicit_tiling() {
        let tile: Tile = serde_json::from_value(json!({
            "geometricError": 5,
            "implicitTiling": {
                "subdivisionScheme": "QUADTREE",
                "subtreeLevels": 2,
                "availableLevels": 4,
                "subtrees": { "uri": "subtrees/{level}.{x}.{y}.subtree" }
            }
        }))
        .unwrap();
        let implicit = tile.implicit_tiling.unwrap();
        assert_eq!(implicit.subtree_levels, 2);
        assert_eq!(implicit.subtrees.uri, "subtrees/{level}.{x}.{y}.subtree");
    }
}

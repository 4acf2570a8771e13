//! Property tables: the JSON part of binary structural metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A property table, as found in subtrees and in `EXT_structural_metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub class: String,
    pub count: usize,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyTableProperty>,
}

/// The storage of one property of a property table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTableProperty {
    /// Buffer view index of the values.
    pub values: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_offsets: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_offsets: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_offset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_offset_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

/// A buffer view: a byte range of a buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    pub buffer: usize,
    #[serde(default)]
    pub byte_offset: usize,
    pub byte_length: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<usize>,
}

/// A buffer: either the binary chunk of the containing file, or external.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    pub byte_length: usize,
}

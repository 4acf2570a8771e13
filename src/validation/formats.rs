//! Validators for the data of tile contents.
//!
//! The legacy binary formats share one header layout:
//!
//! ```text
//! offset  size  field
//! 0       4     magic
//! 4       4     version (1)
//! 8       4     byte length
//! 12      4     feature table JSON byte length
//! 16      4     feature table binary byte length
//! 20      4     batch table JSON byte length
//! 24      4     batch table binary byte length
//! (28     4     glTF format, i3dm only)
//! ```
//!
//! Composites (`cmpt`) have a 16-byte header (magic, version, byte
//! length, number of tiles) followed by the inner tiles.

use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};
use serde_json::Value;

use super::content::ContentDataValidator;
use super::context::ValidationContext;
use super::issues::IssueType;
use super::tileset::TilesetValidator;
use crate::gltf::{validate_structural_metadata, GltfData};
use crate::io::ResourceTypes;

const LEGACY_HEADER_SIZE: usize = 28;
const I3DM_HEADER_SIZE: usize = 32;
const CMPT_HEADER_SIZE: usize = 16;

/// glTF assets, binary or JSON, including their structural metadata.
pub struct GltfContentValidator;

impl ContentDataValidator for GltfContentValidator {
    fn validate_content_data(&self, uri: &str, data: &[u8], context: &mut ValidationContext) -> bool {
        let resolver = Arc::clone(context.resource_resolver());
        let gltf = match GltfData::load(data, resolver.as_ref()) {
            Ok(gltf) => gltf,
            Err(e) => {
                context.report(IssueType::BinaryInvalid, uri, format!("Could not read glTF: {}", e));
                return false;
            }
        };
        validate_structural_metadata(&gltf, resolver.as_ref(), context)
    }
}

/// Batched 3D models.
pub struct B3dmValidator;

impl ContentDataValidator for B3dmValidator {
    fn validate_content_data(&self, uri: &str, data: &[u8], context: &mut ValidationContext) -> bool {
        let Some(layout) = LegacyLayout::read(uri, data, b"b3dm", LEGACY_HEADER_SIZE, context) else {
            return false;
        };
        let tables_valid = layout.validate_tables(uri, data, "BATCH_LENGTH", context);
        let glb_valid = GltfContentValidator.validate_content_data(uri, &data[layout.body_start..], context);
        tables_valid && glb_valid
    }
}

/// Instanced 3D models.
pub struct I3dmValidator;

impl ContentDataValidator for I3dmValidator {
    fn validate_content_data(&self, uri: &str, data: &[u8], context: &mut ValidationContext) -> bool {
        let Some(layout) = LegacyLayout::read(uri, data, b"i3dm", I3DM_HEADER_SIZE, context) else {
            return false;
        };
        let tables_valid = layout.validate_tables(uri, data, "INSTANCES_LENGTH", context);
        let body = &data[layout.body_start..];
        let body_valid = match LittleEndian::read_u32(&data[28..32]) {
            0 => match std::str::from_utf8(body) {
                Ok(gltf_uri) if !gltf_uri.trim_end_matches('\0').is_empty() => true,
                _ => {
                    context.report(IssueType::BinaryInvalid, uri, "The glTF URI of the i3dm is not a valid string");
                    false
                }
            },
            1 => GltfContentValidator.validate_content_data(uri, body, context),
            format => {
                context.report(
                    IssueType::BinaryInvalid,
                    uri,
                    format!("The i3dm glTF format must be 0 or 1, but is {}", format),
                );
                false
            }
        };
        tables_valid && body_valid
    }
}

/// Point clouds.
pub struct PntsValidator;

impl ContentDataValidator for PntsValidator {
    fn validate_content_data(&self, uri: &str, data: &[u8], context: &mut ValidationContext) -> bool {
        let Some(layout) = LegacyLayout::read(uri, data, b"pnts", LEGACY_HEADER_SIZE, context) else {
            return false;
        };
        layout.validate_tables(uri, data, "POINTS_LENGTH", context)
    }
}

/// Composites of other binary tiles.
pub struct CmptValidator;

impl ContentDataValidator for CmptValidator {
    fn validate_content_data(&self, uri: &str, data: &[u8], context: &mut ValidationContext) -> bool {
        if data.len() < CMPT_HEADER_SIZE {
            context.report(
                IssueType::BinaryInvalid,
                uri,
                format!("The cmpt has {} bytes, but the header needs {}", data.len(), CMPT_HEADER_SIZE),
            );
            return false;
        }
        if !check_version_and_length(uri, data, context) {
            return false;
        }
        let tiles_length = LittleEndian::read_u32(&data[12..16]) as usize;
        let mut result = true;
        let mut position = CMPT_HEADER_SIZE;
        for i in 0..tiles_length {
            let inner_uri = format!("{}[{}]", uri, i);
            let Some(header) = data.get(position..position + 12) else {
                context.report(
                    IssueType::BinaryInvalid,
                    &inner_uri,
                    format!("The cmpt declares {} tiles, but data ends before tile {}", tiles_length, i),
                );
                return false;
            };
            let length = LittleEndian::read_u32(&header[8..12]) as usize;
            let Some(inner) = position.checked_add(length).and_then(|end| data.get(position..end)) else {
                context.report(
                    IssueType::BinaryInvalid,
                    &inner_uri,
                    format!("Inner tile {} declares {} bytes, which exceeds the cmpt", i, length),
                );
                return false;
            };
            let valid = if ResourceTypes::is_b3dm(inner) {
                B3dmValidator.validate_content_data(&inner_uri, inner, context)
            } else if ResourceTypes::is_i3dm(inner) {
                I3dmValidator.validate_content_data(&inner_uri, inner, context)
            } else if ResourceTypes::is_pnts(inner) {
                PntsValidator.validate_content_data(&inner_uri, inner, context)
            } else if ResourceTypes::is_cmpt(inner) {
                CmptValidator.validate_content_data(&inner_uri, inner, context)
            } else {
                context.report(IssueType::BinaryInvalid, &inner_uri, "Inner tile has an unknown magic");
                false
            };
            if !valid {
                result = false;
            }
            position += length;
        }
        result
    }
}

/// External tilesets, which are validated completely.
pub struct ExternalTilesetValidator;

impl ContentDataValidator for ExternalTilesetValidator {
    fn validate_content_data(&self, uri: &str, data: &[u8], context: &mut ValidationContext) -> bool {
        tracing::debug!("Validating external tileset {}", uri);
        TilesetValidator::new().validate_json(data, context)
    }
}

fn check_version_and_length(uri: &str, data: &[u8], context: &mut ValidationContext) -> bool {
    let version = LittleEndian::read_u32(&data[4..8]);
    if version != 1 {
        context.report(IssueType::BinaryInvalid, uri, format!("The version must be 1, but is {}", version));
        return false;
    }
    let byte_length = LittleEndian::read_u32(&data[8..12]) as usize;
    if byte_length != data.len() {
        context.report(
            IssueType::BinaryInvalid,
            uri,
            format!("The byteLength is {}, but the data has {} bytes", byte_length, data.len()),
        );
        return false;
    }
    true
}

/// Where the tables and the body of a legacy binary tile are.
struct LegacyLayout {
    feature_table_json: std::ops::Range<usize>,
    feature_table_binary: usize,
    batch_table_json: std::ops::Range<usize>,
    body_start: usize,
}

impl LegacyLayout {
    fn read(
        uri: &str,
        data: &[u8],
        magic: &[u8; 4],
        header_size: usize,
        context: &mut ValidationContext,
    ) -> Option<Self> {
        if data.len() < header_size || !ResourceTypes::starts_with(data, magic) {
            context.report(
                IssueType::BinaryInvalid,
                uri,
                format!(
                    "Expected a {} header of {} bytes",
                    String::from_utf8_lossy(magic),
                    header_size
                ),
            );
            return None;
        }
        if !check_version_and_length(uri, data, context) {
            return None;
        }
        let lengths: Vec<usize> = (0..4)
            .map(|i| LittleEndian::read_u32(&data[12 + i * 4..16 + i * 4]) as usize)
            .collect();
        let total = header_size + lengths.iter().sum::<usize>();
        if total > data.len() {
            context.report(
                IssueType::BinaryInvalid,
                uri,
                format!(
                    "The header and tables need {} bytes, but the data has {} bytes",
                    total,
                    data.len()
                ),
            );
            return None;
        }
        let ft_json_end = header_size + lengths[0];
        let bt_json_start = ft_json_end + lengths[1];
        Some(Self {
            feature_table_json: header_size..ft_json_end,
            feature_table_binary: lengths[1],
            batch_table_json: bt_json_start..bt_json_start + lengths[2],
            body_start: total,
        })
    }

    /// The feature table must be a JSON object with `length_property`,
    /// the batch table (if present) a JSON object.
    fn validate_tables(&self, uri: &str, data: &[u8], length_property: &str, context: &mut ValidationContext) -> bool {
        let mut result = true;
        match parse_table(&data[self.feature_table_json.clone()]) {
            Some(Value::Object(table)) => {
                if !table.get(length_property).is_some_and(|v| v.is_u64() || v.is_object()) {
                    context.report(
                        IssueType::PropertyMissing,
                        uri,
                        format!("The feature table must define '{}'", length_property),
                    );
                    result = false;
                }
            }
            _ => {
                context.report(IssueType::JsonParseError, uri, "The feature table JSON is not a valid JSON object");
                result = false;
            }
        }
        if self.feature_table_binary % 8 != 0 {
            tracing::debug!("Feature table binary of {} is not 8-byte aligned", uri);
        }
        if !self.batch_table_json.is_empty() && !matches!(parse_table(&data[self.batch_table_json.clone()]), Some(Value::Object(_))) {
            context.report(IssueType::JsonParseError, uri, "The batch table JSON is not a valid JSON object");
            result = false;
        }
        result
    }
}

/// Parse table JSON, which may be padded with spaces or zeros.
fn parse_table(bytes: &[u8]) -> Option<Value> {
    let end = bytes.iter().rposition(|b| *b != 0 && *b != b' ').map_or(0, |i| i + 1);
    serde_json::from_slice(&bytes[..end]).ok()
}

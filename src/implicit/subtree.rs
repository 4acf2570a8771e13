//! Subtree files: availability and metadata of one section of an
//! implicit tree.
//!
//! A subtree is either binary (header, JSON chunk, binary chunk) or
//! plain JSON with all buffers external:
//!
//! ```text
//! offset  size  field
//! 0       4     magic "subt"
//! 4       4     version (1)
//! 8       8     JSON byte length
//! 16      8     binary byte length
//! 24      ...   JSON, then binary
//! ```

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::availability::{Availability, AvailabilityJson, BitstreamSource};
use super::coordinates::TreeCoordinates;
use super::tiling::ImplicitTiling;
use crate::io::{ResourceResolver, ResourceTypes};
use crate::structure::{Buffer, BufferView, MetadataEntity, PropertyTable};
use crate::util::{Error, Result};

/// Magic bytes at the start of a binary subtree.
pub const SUBTREE_MAGIC: &[u8; 4] = b"subt";

/// Size of the binary subtree header in bytes.
pub const SUBTREE_HEADER_SIZE: usize = 24;

/// The only supported binary subtree version.
pub const SUBTREE_VERSION: u32 = 1;

/// The JSON part of a subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtreeJson {
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    #[serde(default)]
    pub buffer_views: Vec<BufferView>,
    #[serde(default)]
    pub property_tables: Vec<PropertyTable>,
    pub tile_availability: AvailabilityJson,
    #[serde(default)]
    pub content_availability: Vec<AvailabilityJson>,
    pub child_subtree_availability: AvailabilityJson,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tile_metadata: Option<usize>,
    #[serde(default)]
    pub content_metadata: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtree_metadata: Option<MetadataEntity>,
}

/// A parsed subtree with resolved buffers and decoded availability.
#[derive(Debug, Clone)]
pub struct SubtreeModel {
    pub json: SubtreeJson,
    /// The data of each buffer view
    pub buffer_views: Vec<Vec<u8>>,
    pub tile_availability: Availability,
    pub content_availability: Vec<Availability>,
    pub child_subtree_availability: Availability,
}

/// Split binary subtree data into its JSON and binary chunks.
fn split_binary(data: &[u8]) -> Result<(&[u8], Option<&[u8]>)> {
    if data.len() < SUBTREE_HEADER_SIZE {
        return Err(Error::tiling(format!(
            "Binary subtree has {} bytes, but the header alone needs {}",
            data.len(),
            SUBTREE_HEADER_SIZE
        )));
    }
    let version = LittleEndian::read_u32(&data[4..8]);
    if version != SUBTREE_VERSION {
        return Err(Error::tiling(format!("Unsupported subtree version {}", version)));
    }
    let json_length = LittleEndian::read_u64(&data[8..16]);
    let binary_length = LittleEndian::read_u64(&data[16..24]);
    let total = (SUBTREE_HEADER_SIZE as u64)
        .checked_add(json_length)
        .and_then(|t| t.checked_add(binary_length))
        .filter(|t| *t <= data.len() as u64)
        .ok_or_else(|| {
            Error::tiling(format!(
                "Binary subtree has {} bytes, but the header declares {} JSON and {} binary bytes",
                data.len(),
                json_length,
                binary_length
            ))
        })?;
    let json_end = SUBTREE_HEADER_SIZE + json_length as usize;
    let json = &data[SUBTREE_HEADER_SIZE..json_end];
    let binary = (binary_length > 0).then(|| &data[json_end..total as usize]);
    Ok((json, binary))
}

impl SubtreeModel {
    /// Parse a subtree.
    ///
    /// External buffers are resolved with `resolver`, which must be scoped
    /// to the directory of the subtree file. Every failure is a tiling
    /// error.
    pub fn parse(data: &[u8], resolver: &dyn ResourceResolver, tiling: &ImplicitTiling) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::tiling("Subtree data is empty"));
        }
        let (json_bytes, binary) = if ResourceTypes::starts_with(data, SUBTREE_MAGIC) {
            split_binary(data)?
        } else if ResourceTypes::is_probably_json(data) {
            (data, None)
        } else {
            return Err(Error::tiling("Subtree data is neither binary nor JSON"));
        };
        let json: SubtreeJson = serde_json::from_slice(json_bytes)
            .map_err(|e| Error::tiling(format!("Invalid subtree JSON: {}", e)))?;

        let buffers = Self::resolve_buffers(&json, binary, resolver)?;
        let buffer_views = json
            .buffer_views
            .iter()
            .enumerate()
            .map(|(i, view)| {
                let buffer = buffers.get(view.buffer).ok_or_else(|| {
                    Error::tiling(format!("Buffer view {} refers to missing buffer {}", i, view.buffer))
                })?;
                let end = view.byte_offset.checked_add(view.byte_length);
                end.filter(|e| *e <= buffer.len())
                    .map(|e| buffer[view.byte_offset..e].to_vec())
                    .ok_or_else(|| {
                        Error::tiling(format!(
                            "Buffer view {} (offset {}, length {}) exceeds buffer {} of length {}",
                            i,
                            view.byte_offset,
                            view.byte_length,
                            view.buffer,
                            buffer.len()
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let tiles = tiling.tiles_per_subtree()?;
        let child_subtrees = tiling.child_subtrees_per_subtree()?;
        let tile_availability =
            decode_availability("tileAvailability", &json.tile_availability, &buffer_views, tiles)?;
        let content_availability = json
            .content_availability
            .iter()
            .enumerate()
            .map(|(i, a)| decode_availability(&format!("contentAvailability[{}]", i), a, &buffer_views, tiles))
            .collect::<Result<Vec<_>>>()?;
        let child_subtree_availability = decode_availability(
            "childSubtreeAvailability",
            &json.child_subtree_availability,
            &buffer_views,
            child_subtrees,
        )?;

        let tables = json.property_tables.len();
        for index in json.tile_metadata.iter().chain(json.content_metadata.iter()) {
            if *index >= tables {
                return Err(Error::tiling(format!(
                    "Subtree refers to property table {}, but has only {}",
                    index, tables
                )));
            }
        }

        Ok(Self {
            json,
            buffer_views,
            tile_availability,
            content_availability,
            child_subtree_availability,
        })
    }

    fn resolve_buffers(
        json: &SubtreeJson,
        binary: Option<&[u8]>,
        resolver: &dyn ResourceResolver,
    ) -> Result<Vec<Vec<u8>>> {
        json.buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| {
                let data = match &buffer.uri {
                    Some(uri) => {
                        tracing::debug!("Resolving subtree buffer {}", uri);
                        resolver
                            .resolve(uri)
                            .map_err(|e| Error::tiling(format!("Could not read buffer {}: {}", uri, e)))?
                            .ok_or_else(|| Error::tiling(format!("Could not resolve buffer {}", uri)))?
                    }
                    None => binary
                        .ok_or_else(|| {
                            Error::tiling(format!("Buffer {} has no URI, but the subtree has no binary chunk", i))
                        })?
                        .to_vec(),
                };
                if data.len() < buffer.byte_length {
                    return Err(Error::tiling(format!(
                        "Buffer {} has byteLength {}, but only {} bytes are available",
                        i,
                        buffer.byte_length,
                        data.len()
                    )));
                }
                Ok(data)
            })
            .collect()
    }

    /// Whether the tile at the given subtree-local coordinates exists.
    pub fn is_tile_available(&self, local: &TreeCoordinates) -> Result<bool> {
        Ok(self.tile_availability.is_available(local.tree_index()?))
    }

    /// Whether content `content` of the tile at the local coordinates exists.
    pub fn is_content_available(&self, content: usize, local: &TreeCoordinates) -> Result<bool> {
        let availability = self.content_availability.get(content).ok_or_else(|| {
            Error::tiling(format!("Subtree has no content availability for content {}", content))
        })?;
        Ok(availability.is_available(local.tree_index()?))
    }

    /// Whether a child subtree exists at the given local coordinates,
    /// which are in the level right below this subtree.
    pub fn is_child_subtree_available(&self, local: &TreeCoordinates) -> bool {
        self.child_subtree_availability.is_available(local.morton_index())
    }

    /// The row of the tile metadata table that belongs to the tile at
    /// the local coordinates: the number of available tiles before it.
    pub fn tile_metadata_row(&self, local: &TreeCoordinates) -> Result<usize> {
        let index = local.tree_index()?;
        Ok(self.tile_availability.available_count(index) as usize)
    }

    /// The property table with the metadata of all available tiles.
    pub fn tile_metadata_table(&self) -> Option<&PropertyTable> {
        self.json.tile_metadata.and_then(|i| self.json.property_tables.get(i))
    }

    pub fn property_tables(&self) -> &[PropertyTable] {
        &self.json.property_tables
    }

    pub fn subtree_metadata(&self) -> Option<&MetadataEntity> {
        self.json.subtree_metadata.as_ref()
    }
}

/// Decode one availability, checking that a bitstream has enough bits.
fn decode_availability(
    name: &str,
    json: &AvailabilityJson,
    buffer_views: &[Vec<u8>],
    length: u64,
) -> Result<Availability> {
    let availability = match (&json.constant, &json.bitstream) {
        (Some(_), Some(_)) => {
            return Err(Error::tiling(format!("The {} defines both a constant and a bitstream", name)))
        }
        (None, None) => {
            return Err(Error::tiling(format!("The {} defines neither a constant nor a bitstream", name)))
        }
        (Some(0), None) => Availability::Constant(false),
        (Some(1), None) => Availability::Constant(true),
        (Some(c), None) => {
            return Err(Error::tiling(format!("The {} constant must be 0 or 1, but is {}", name, c)))
        }
        (None, Some(BitstreamSource::BufferView(index))) => {
            let bytes = buffer_views.get(*index).ok_or_else(|| {
                Error::tiling(format!("The {} refers to missing buffer view {}", name, index))
            })?;
            Availability::Bitstream(bytes.clone())
        }
        (None, Some(BitstreamSource::Inline(bytes))) => Availability::Bitstream(bytes.clone()),
    };
    if let Availability::Bitstream(bytes) = &availability {
        let required = length.div_ceil(8);
        if (bytes.len() as u64) < required {
            return Err(Error::tiling(format!(
                "The {} bitstream has {} bytes, but {} bits require {} bytes",
                name,
                bytes.len(),
                length,
                required
            )));
        }
    }
    Ok(availability)
}

/// Build binary subtree data from its JSON and binary chunks.
pub fn encode_binary_subtree(json: &[u8], binary: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(SUBTREE_HEADER_SIZE + json.len() + binary.len());
    data.extend_from_slice(SUBTREE_MAGIC);
    data.extend_from_slice(&SUBTREE_VERSION.to_le_bytes());
    data.extend_from_slice(&(json.len() as u64).to_le_bytes());
    data.extend_from_slice(&(binary.len() as u64).to_le_bytes());
    data.extend_from_slice(json);
    data.extend_from_slice(binary);
    data
}

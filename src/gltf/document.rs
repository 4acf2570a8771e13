//! The parts of a glTF asset that structural metadata refers to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::glb::Glb;
use crate::io::{ResourceResolver, ResourceTypes};
use crate::metadata::{ImageData, VertexAccessor};
use crate::structure::{Buffer, BufferView};
use crate::util::{ComponentType, Error, Result};

/// The glTF JSON, reduced to buffers, accessors, images and meshes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GltfJson {
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    #[serde(default)]
    pub buffer_views: Vec<BufferView>,
    #[serde(default)]
    pub accessors: Vec<Accessor>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub textures: Vec<Texture>,
    #[serde(default)]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions_used: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default)]
    pub byte_offset: usize,
    pub component_type: u32,
    pub count: usize,
    #[serde(rename = "type")]
    pub accessor_type: String,
    #[serde(default)]
    pub normalized: bool,
}

impl Accessor {
    /// Number of components of the accessor type, for SCALAR to VEC4.
    pub fn components(&self) -> Option<usize> {
        match self.accessor_type.as_str() {
            "SCALAR" => Some(1),
            "VEC2" => Some(2),
            "VEC3" => Some(3),
            "VEC4" => Some(4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Texture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(default)]
    pub primitives: Vec<MeshPrimitive>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshPrimitive {
    #[serde(default)]
    pub attributes: BTreeMap<String, usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

/// A glTF asset with all of its buffers loaded.
#[derive(Debug, Clone)]
pub struct GltfData {
    pub json: GltfJson,
    buffers: Vec<Vec<u8>>,
    buffer_views: Vec<Vec<u8>>,
}

impl GltfData {
    /// Load a glTF asset from GLB or glTF JSON data.
    ///
    /// The buffer without URI is the BIN chunk of a GLB. External
    /// buffers are resolved with `resolver`, which must be scoped to
    /// the directory of the asset.
    pub fn load(data: &[u8], resolver: &dyn ResourceResolver) -> Result<Self> {
        let (json_bytes, bin) = if ResourceTypes::is_glb(data) {
            let glb = Glb::parse(data)?;
            (glb.json, glb.bin)
        } else {
            (data, None)
        };
        let json: GltfJson = serde_json::from_slice(json_bytes)?;

        let mut buffers = Vec::with_capacity(json.buffers.len());
        for (i, buffer) in json.buffers.iter().enumerate() {
            let bytes = match &buffer.uri {
                Some(uri) => {
                    tracing::debug!("Resolving glTF buffer {}", uri);
                    resolver.resolve(uri)?.ok_or_else(|| Error::ResourceNotFound(uri.clone()))?
                }
                None if i == 0 => bin
                    .ok_or_else(|| Error::invalid("Buffer 0 has no URI, but there is no BIN chunk"))?
                    .to_vec(),
                None => return Err(Error::invalid(format!("Buffer {} has no URI", i))),
            };
            if bytes.len() < buffer.byte_length {
                return Err(Error::invalid(format!(
                    "Buffer {} has a byteLength of {}, but only {} bytes are present",
                    i,
                    buffer.byte_length,
                    bytes.len()
                )));
            }
            buffers.push(bytes);
        }

        let mut buffer_views = Vec::with_capacity(json.buffer_views.len());
        for (i, view) in json.buffer_views.iter().enumerate() {
            let buffer = buffers
                .get(view.buffer)
                .ok_or_else(|| Error::invalid(format!("Buffer view {} refers to missing buffer {}", i, view.buffer)))?;
            let bytes = view
                .byte_offset
                .checked_add(view.byte_length)
                .and_then(|end| buffer.get(view.byte_offset..end))
                .ok_or_else(|| Error::invalid(format!("Buffer view {} exceeds buffer {}", i, view.buffer)))?;
            buffer_views.push(bytes.to_vec());
        }

        Ok(Self {
            json,
            buffers,
            buffer_views,
        })
    }

    /// The data of all buffer views, in order.
    pub fn buffer_views(&self) -> &[Vec<u8>] {
        &self.buffer_views
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// The extension object with the given name, at the top level.
    pub fn extension(&self, name: &str) -> Option<&Value> {
        self.json.extensions.as_ref()?.get(name)
    }

    /// Read access to the elements of an accessor.
    pub fn accessor(&self, index: usize) -> Result<VertexAccessor<'_>> {
        let accessor = self
            .json
            .accessors
            .get(index)
            .ok_or_else(|| Error::internal(format!("Accessor {} does not exist", index)))?;
        let view_index = accessor
            .buffer_view
            .ok_or_else(|| Error::internal(format!("Accessor {} has no buffer view", index)))?;
        let data = self
            .buffer_views
            .get(view_index)
            .ok_or_else(|| Error::internal(format!("Accessor {} refers to missing buffer view {}", index, view_index)))?;
        let component_type = ComponentType::from_gltf_code(accessor.component_type).ok_or_else(|| {
            Error::internal(format!(
                "Accessor {} has invalid component type {}",
                index, accessor.component_type
            ))
        })?;
        let components = accessor.components().ok_or_else(|| {
            Error::internal(format!("Accessor {} has unsupported type {}", index, accessor.accessor_type))
        })?;
        let vertex_accessor = VertexAccessor {
            data,
            byte_offset: accessor.byte_offset,
            byte_stride: self.json.buffer_views.get(view_index).and_then(|v| v.byte_stride),
            component_type,
            components,
            count: accessor.count,
        };
        if !vertex_accessor.is_in_bounds() {
            return Err(Error::internal(format!(
                "Accessor {} exceeds buffer view {}",
                index, view_index
            )));
        }
        Ok(vertex_accessor)
    }

    /// Decode the image that a texture refers to.
    pub fn texture_image(&self, texture: usize, resolver: &dyn ResourceResolver) -> Result<ImageData> {
        let source = self
            .json
            .textures
            .get(texture)
            .and_then(|t| t.source)
            .ok_or_else(|| Error::invalid(format!("Texture {} does not have a source", texture)))?;
        let image = self
            .json
            .images
            .get(source)
            .ok_or_else(|| Error::invalid(format!("Texture {} refers to missing image {}", texture, source)))?;
        let bytes = match (&image.uri, image.buffer_view) {
            (Some(uri), _) => resolver.resolve(uri)?.ok_or_else(|| Error::ResourceNotFound(uri.clone()))?,
            (None, Some(view)) => self
                .buffer_views
                .get(view)
                .ok_or_else(|| Error::invalid(format!("Image {} refers to missing buffer view {}", source, view)))?
                .clone(),
            (None, None) => return Err(Error::invalid(format!("Image {} has neither uri nor bufferView", source))),
        };
        ImageData::decode(&bytes)
    }
}

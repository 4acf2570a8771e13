//! glTF assets as tile content.
//!
//! Only what structural metadata validation needs is read here: the
//! GLB container, buffers, accessors and images. The structure of the
//! glTF JSON itself is not validated.

mod document;
mod glb;
mod structural_metadata;

pub use document::{Accessor, GltfData, GltfJson, Image, Mesh, MeshPrimitive, Texture};
pub use glb::{encode_glb, Glb, CHUNK_TYPE_BIN, CHUNK_TYPE_JSON, GLB_HEADER_SIZE, GLB_MAGIC};
pub use structural_metadata::{
    validate_structural_metadata, PropertyAttribute, PropertyTexture, StructuralMetadata,
    EXT_STRUCTURAL_METADATA,
};

//! Validation of the values of `EXT_structural_metadata`.
//!
//! Property tables, property textures and property attributes are
//! each turned into the matching property model and checked with the
//! [`MetadataValuesValidator`]. Issues are reported with JSON paths
//! inside the glTF asset.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::document::{GltfData, MeshPrimitive};
use crate::io::ResourceResolver;
use crate::metadata::{
    validate_property_table_values, AttributePropertyModel, BinaryPropertyTable, ImageData,
    MetadataValuesValidator, PropertyAttributeProperty, PropertyTextureProperty, TexturePropertyModel,
};
use crate::structure::{PropertyTable, Schema};
use crate::validation::{IssueType, ValidationContext};

pub const EXT_STRUCTURAL_METADATA: &str = "EXT_structural_metadata";

/// The top-level `EXT_structural_metadata` object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_uri: Option<String>,
    #[serde(default)]
    pub property_tables: Vec<PropertyTable>,
    #[serde(default)]
    pub property_textures: Vec<PropertyTexture>,
    #[serde(default)]
    pub property_attributes: Vec<PropertyAttribute>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyTexture {
    pub class: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyTextureProperty>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyAttribute {
    pub class: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyAttributeProperty>,
}

/// The `EXT_structural_metadata` object of a mesh primitive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PrimitiveStructuralMetadata {
    #[serde(default)]
    property_attributes: Vec<usize>,
}

fn report_result(result: crate::util::Result<bool>, path: &str, context: &mut ValidationContext) -> bool {
    match result {
        Ok(valid) => valid,
        Err(e) => {
            context.add_issue(crate::validation::ValidationIssue::internal_error(path, e.to_string()));
            false
        }
    }
}

/// Validate the structural metadata of a glTF asset, if it has any.
///
/// `resolver` resolves a `schemaUri` and image URIs relative to the asset.
pub fn validate_structural_metadata(
    gltf: &GltfData,
    resolver: &dyn ResourceResolver,
    context: &mut ValidationContext,
) -> bool {
    let Some(value) = gltf.extension(EXT_STRUCTURAL_METADATA) else {
        return true;
    };
    let path = format!("/extensions/{}", EXT_STRUCTURAL_METADATA);
    let metadata: StructuralMetadata = match serde_json::from_value(value.clone()) {
        Ok(metadata) => metadata,
        Err(e) => {
            context.report(IssueType::TypeMismatch, &path, format!("Invalid {}: {}", EXT_STRUCTURAL_METADATA, e));
            return false;
        }
    };
    let Some(schema) = resolve_schema(&metadata, &path, resolver, context) else {
        return false;
    };

    let mut result = true;
    for (i, table) in metadata.property_tables.iter().enumerate() {
        let table_path = format!("{}/propertyTables/{}", path, i);
        let binary = BinaryPropertyTable::new(table, &schema, gltf.buffer_views());
        if !validate_property_table_values(&table_path, &binary, context) {
            result = false;
        }
    }
    for (i, texture) in metadata.property_textures.iter().enumerate() {
        let texture_path = format!("{}/propertyTextures/{}", path, i);
        if !validate_property_texture(&texture_path, texture, &schema, gltf, resolver, context) {
            result = false;
        }
    }
    for (mesh_index, mesh) in gltf.json.meshes.iter().enumerate() {
        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            let primitive_path = format!("/meshes/{}/primitives/{}", mesh_index, primitive_index);
            if !validate_primitive_attributes(&primitive_path, primitive, &metadata, &schema, gltf, context) {
                result = false;
            }
        }
    }
    result
}

fn resolve_schema(
    metadata: &StructuralMetadata,
    path: &str,
    resolver: &dyn ResourceResolver,
    context: &mut ValidationContext,
) -> Option<Schema> {
    match (&metadata.schema, &metadata.schema_uri) {
        (Some(_), Some(_)) => {
            context.report(IssueType::OneOfError, path, "Only one of 'schema' and 'schemaUri' may be defined");
            None
        }
        (Some(schema), None) => Some(schema.clone()),
        (None, Some(uri)) => {
            let uri_path = format!("{}/schemaUri", path);
            match resolver.resolve(uri) {
                Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                    Ok(schema) => Some(schema),
                    Err(e) => {
                        context.report(IssueType::JsonParseError, uri_path, e.to_string());
                        None
                    }
                },
                Ok(None) => {
                    context.report(IssueType::IoError, uri_path, format!("The schema '{}' could not be resolved", uri));
                    None
                }
                Err(e) => {
                    context.report(IssueType::IoError, uri_path, e.to_string());
                    None
                }
            }
        }
        (None, None) => {
            context.report(IssueType::PropertyMissing, path, "One of 'schema' and 'schemaUri' must be defined");
            None
        }
    }
}

fn validate_property_texture(
    path: &str,
    texture: &PropertyTexture,
    schema: &Schema,
    gltf: &GltfData,
    resolver: &dyn ResourceResolver,
    context: &mut ValidationContext,
) -> bool {
    let mut result = true;
    let mut images: BTreeMap<usize, Option<ImageData>> = BTreeMap::new();
    for (name, property) in &texture.properties {
        let property_path = format!("{}/properties/{}", path, name);
        let image = images.entry(property.index).or_insert_with(|| {
            match gltf.texture_image(property.index, resolver) {
                Ok(image) => Some(image),
                Err(e) => {
                    context.report(
                        IssueType::BinaryInvalid,
                        &property_path,
                        format!("Could not read texture {}: {}", property.index, e),
                    );
                    None
                }
            }
        });
        let Some(image) = image.as_ref() else {
            result = false;
            continue;
        };
        let model = match TexturePropertyModel::new(schema, &texture.class, name, property, image) {
            Ok(model) => model,
            Err(e) => {
                context.report(IssueType::TypeMismatch, &property_path, e.to_string());
                result = false;
                continue;
            }
        };
        let validator = MetadataValuesValidator::new(&model, || image.coordinates());
        let valid = validator.validate_property_values(&property_path, context);
        if !report_result(valid, &property_path, context) {
            result = false;
        }
    }
    result
}

fn validate_primitive_attributes(
    path: &str,
    primitive: &MeshPrimitive,
    metadata: &StructuralMetadata,
    schema: &Schema,
    gltf: &GltfData,
    context: &mut ValidationContext,
) -> bool {
    let Some(value) = primitive.extensions.as_ref().and_then(|e| e.get(EXT_STRUCTURAL_METADATA)) else {
        return true;
    };
    let extension_path = format!("{}/extensions/{}", path, EXT_STRUCTURAL_METADATA);
    let indices = match serde_json::from_value::<PrimitiveStructuralMetadata>(value.clone()) {
        Ok(p) => p.property_attributes,
        Err(e) => {
            context.report(IssueType::TypeMismatch, extension_path, e.to_string());
            return false;
        }
    };

    let mut result = true;
    for (i, index) in indices.into_iter().enumerate() {
        let Some(attribute) = metadata.property_attributes.get(index) else {
            context.report(
                IssueType::ValueNotInRange,
                format!("{}/propertyAttributes/{}", extension_path, i),
                format!(
                    "The property attribute index {} is not smaller than the number of property attributes ({})",
                    index,
                    metadata.property_attributes.len()
                ),
            );
            result = false;
            continue;
        };
        let attribute_path = format!("/extensions/{}/propertyAttributes/{}", EXT_STRUCTURAL_METADATA, index);
        if !validate_property_attribute(&attribute_path, attribute, primitive, schema, gltf, context) {
            result = false;
        }
    }
    result
}

fn validate_property_attribute(
    path: &str,
    attribute: &PropertyAttribute,
    primitive: &MeshPrimitive,
    schema: &Schema,
    gltf: &GltfData,
    context: &mut ValidationContext,
) -> bool {
    let mut result = true;
    for (name, property) in &attribute.properties {
        if !primitive.attributes.contains_key(&property.attribute) {
            context.report(
                IssueType::IdentifierNotFound,
                format!("{}/properties/{}", path, name),
                format!(
                    "The property attribute property refers to the attribute {}, which the primitive does not have",
                    property.attribute
                ),
            );
            result = false;
        }
    }
    if !result {
        return false;
    }

    for (name, property) in &attribute.properties {
        let property_path = format!("{}/properties/{}", path, name);
        let accessor = match gltf.accessor(primitive.attributes[&property.attribute]) {
            Ok(accessor) => accessor,
            Err(e) => {
                context.add_issue(crate::validation::ValidationIssue::internal_error(
                    &property_path,
                    format!("Could not read accessor data of attribute {}: {}", property.attribute, e),
                ));
                result = false;
                continue;
            }
        };
        let model = match AttributePropertyModel::new(schema, &attribute.class, name, property, accessor) {
            Ok(model) => model,
            Err(e) => {
                context.report(IssueType::TypeMismatch, &property_path, e.to_string());
                result = false;
                continue;
            }
        };
        let validator = MetadataValuesValidator::new(&model, || 0..model.count());
        let valid = validator.validate_property_values(&property_path, context);
        if !report_result(valid, &property_path, context) {
            result = false;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::encode_glb;
    use crate::io::MemoryResourceResolver;
    use crate::validation::ValidationOptions;
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> ValidationContext {
        ValidationContext::new(Arc::new(MemoryResourceResolver::new()), ValidationOptions::default())
    }

    fn schema() -> serde_json::Value {
        json!({
            "classes": {
                "point": {
                    "properties": {
                        "intensity": { "type": "SCALAR", "componentType": "UINT8", "max": 200 },
                        "kind": { "type": "ENUM", "enumType": "kind" }
                    }
                }
            },
            "enums": {
                "kind": { "valueType": "UINT8", "values": [{ "name": "A", "value": 0 }, { "name": "B", "value": 1 }] }
            }
        })
    }

    fn gltf(intensities: &[u8], kinds: &[u8]) -> GltfData {
        let mut bin = intensities.to_vec();
        let kinds_offset = bin.len();
        bin.extend_from_slice(kinds);
        let json = json!({
            "asset": { "version": "2.0" },
            "buffers": [{ "byteLength": bin.len() }],
            "bufferViews": [
                { "buffer": 0, "byteOffset": 0, "byteLength": intensities.len() },
                { "buffer": 0, "byteOffset": kinds_offset, "byteLength": kinds.len() }
            ],
            "accessors": [
                { "bufferView": 0, "componentType": 5121, "count": intensities.len(), "type": "SCALAR" },
                { "bufferView": 1, "componentType": 5121, "count": kinds.len(), "type": "SCALAR" }
            ],
            "meshes": [{
                "primitives": [{
                    "attributes": { "_INTENSITY": 0, "_KIND": 1 },
                    "extensions": { "EXT_structural_metadata": { "propertyAttributes": [0] } }
                }]
            }],
            "extensions": {
                "EXT_structural_metadata": {
                    "schema": schema(),
                    "propertyAttributes": [{
                        "class": "point",
                        "properties": {
                            "intensity": { "attribute": "_INTENSITY" },
                            "kind": { "attribute": "_KIND" }
                        }
                    }]
                }
            }
        });
        let glb = encode_glb(json.to_string().as_bytes(), &bin);
        GltfData::load(&glb, &MemoryResourceResolver::new()).unwrap()
    }

    #[test]
    fn test_valid_attributes() {
        let data = gltf(&[10, 20, 30], &[0, 1, 1]);
        let mut context = context();
        assert!(validate_structural_metadata(&data, &MemoryResourceResolver::new(), &mut context));
        assert_eq!(context.num_issues(), 0);
    }

    #[test]
    fn test_attribute_values_out_of_range() {
        let data = gltf(&[10, 250, 30], &[0, 5, 7]);
        let mut context = context();
        assert!(!validate_structural_metadata(&data, &MemoryResourceResolver::new(), &mut context));
        let types: Vec<_> = context.issues().iter().map(|i| i.issue_type).collect();
        assert_eq!(
            types,
            [IssueType::MetadataValueNotInRange, IssueType::ValueNotInList, IssueType::ValueNotInList]
        );
        assert_eq!(
            context.issues()[0].path,
            "/extensions/EXT_structural_metadata/propertyAttributes/0/properties/intensity"
        );
    }

    #[test]
    fn test_unusable_accessors() {
        // Two components per vertex do not fit a SCALAR property
        let mut data = gltf(&[10, 20], &[0]);
        data.json.accessors[0].accessor_type = "VEC2".to_string();
        data.json.accessors[0].count = 1;
        let mut context = context();
        assert!(!validate_structural_metadata(&data, &MemoryResourceResolver::new(), &mut context));
        assert!(context.issues().iter().any(|i| i.issue_type == IssueType::TypeMismatch));

        let mut data = gltf(&[10, 20, 30], &[0, 1, 1]);
        data.json.accessors[0].buffer_view = None;
        let mut context = self::context();
        assert!(!validate_structural_metadata(&data, &MemoryResourceResolver::new(), &mut context));
        assert_eq!(context.issues()[0].issue_type, IssueType::InternalError);
    }

    #[test]
    fn test_missing_attribute() {
        let mut data = gltf(&[10], &[0]);
        data.json.meshes[0].primitives[0].attributes.remove("_KIND");
        let mut context = context();
        assert!(!validate_structural_metadata(&data, &MemoryResourceResolver::new(), &mut context));
        assert_eq!(context.issues()[0].issue_type, IssueType::IdentifierNotFound);
    }

    fn png(width: u32, height: u32, pixels: Vec<u8>) -> Vec<u8> {
        let image = image::RgbaImage::from_raw(width, height, pixels).unwrap();
        let mut bytes = std::io::Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    #[test]
    fn test_property_texture() {
        // Red channel holds the intensity, green the kind
        let pixels = vec![10, 0, 0, 255, 220, 1, 0, 255, 30, 9, 0, 255, 40, 1, 0, 255];
        let json = json!({
            "asset": { "version": "2.0" },
            "images": [{ "uri": "texture.png" }],
            "textures": [{ "source": 0 }],
            "extensions": {
                "EXT_structural_metadata": {
                    "schema": schema(),
                    "propertyTextures": [{
                        "class": "point",
                        "properties": {
                            "intensity": { "index": 0, "channels": [0], "max": 220 },
                            "kind": { "index": 0, "channels": [1] }
                        }
                    }]
                }
            }
        });
        let resolver = MemoryResourceResolver::new().with("texture.png", png(2, 2, pixels));
        let data = GltfData::load(json.to_string().as_bytes(), &resolver).unwrap();
        let mut context = context();
        assert!(!validate_structural_metadata(&data, &resolver, &mut context));
        let issues = context.issues();
        assert_eq!(issues.len(), 2);
        // 220 violates the class maximum of 200, the usage maximum of 220 is tight
        assert_eq!(issues[0].issue_type, IssueType::MetadataValueNotInRange);
        assert!(issues[0].message.contains("(1, 0)"));
        assert_eq!(issues[1].issue_type, IssueType::ValueNotInList);
        assert!(issues[1].message.contains("(0, 1)"));
    }
}

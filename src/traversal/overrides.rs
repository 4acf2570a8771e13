//! Tile properties that are overridden by metadata semantics.

use serde_json::Value;

use crate::metadata::{BinaryPropertyTable, MetadataPropertyModel, PropertyDescriptor, PropertyOverrides};
use crate::structure::{MetadataEntity, Schema, Tile};
use crate::util::{Error, MetadataValue, Result};

/// Semantic of a property that overrides `tile.geometricError`.
pub const TILE_GEOMETRIC_ERROR: &str = "TILE_GEOMETRIC_ERROR";

/// Apply the metadata semantics of `entity` to `tile`.
///
/// Returns whether anything was overridden. Metadata that should be
/// used for an override but is invalid (unknown class, value of the
/// wrong type) is a tiling error, since the tile itself can then not
/// be determined.
pub fn apply_metadata_semantics(tile: &mut Tile, entity: &MetadataEntity, schema: &Schema) -> Result<bool> {
    let metadata_class = schema.classes.get(&entity.class).ok_or_else(|| {
        Error::tiling(format!("The metadata class '{}' was not found in the schema", entity.class))
    })?;
    let Some(properties) = &entity.properties else {
        return Ok(false);
    };
    let mut overridden = false;
    for (name, value) in properties {
        let Some(class_property) = metadata_class.properties.get(name) else {
            continue;
        };
        if class_property.semantic.as_deref() != Some(TILE_GEOMETRIC_ERROR) {
            continue;
        }
        let descriptor =
            PropertyDescriptor::from_class_property(schema, name, class_property, PropertyOverrides::default())
                .map_err(|e| Error::tiling(format!("Invalid {} property '{}': {}", TILE_GEOMETRIC_ERROR, name, e)))?;
        let geometric_error = geometric_error_value(&descriptor, value).ok_or_else(|| {
            Error::tiling(format!(
                "The {} property '{}' must be a single number, but is {}",
                TILE_GEOMETRIC_ERROR, name, value
            ))
        })?;
        tile.geometric_error = Some(geometric_error);
        overridden = true;
    }
    Ok(overridden)
}

/// Apply the metadata semantics of row `row` of a binary property table,
/// e.g. the tile metadata of a subtree.
pub fn apply_table_semantics(tile: &mut Tile, table: &BinaryPropertyTable<'_>, row: usize) -> Result<bool> {
    let class_name = &table.property_table.class;
    let metadata_class = table.schema.classes.get(class_name).ok_or_else(|| {
        Error::tiling(format!("The metadata class '{}' was not found in the schema", class_name))
    })?;
    let mut overridden = false;
    for name in table.property_table.properties.keys() {
        let is_geometric_error = metadata_class
            .properties
            .get(name)
            .is_some_and(|p| p.semantic.as_deref() == Some(TILE_GEOMETRIC_ERROR));
        if !is_geometric_error {
            continue;
        }
        let value = table
            .property_model(name)
            .and_then(|model| model.property_value(row))
            .map_err(|e| Error::tiling(format!("Invalid {} property '{}': {}", TILE_GEOMETRIC_ERROR, name, e)))?;
        let geometric_error = value.as_number().ok_or_else(|| {
            Error::tiling(format!(
                "The {} property '{}' must be a single number, but is {}",
                TILE_GEOMETRIC_ERROR, name, value
            ))
        })?;
        tile.geometric_error = Some(geometric_error);
        overridden = true;
    }
    Ok(overridden)
}

fn geometric_error_value(descriptor: &PropertyDescriptor, value: &Value) -> Option<f64> {
    let raw = MetadataValue::from_json(value)?;
    raw.as_number()?;
    descriptor.process(raw).ok()?.as_number()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        serde_json::from_value(json!({
            "classes": {
                "tile": {
                    "properties": {
                        "ge": { "type": "SCALAR", "componentType": "FLOAT32", "semantic": "TILE_GEOMETRIC_ERROR" },
                        "other": { "type": "STRING" }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn entity(value: serde_json::Value) -> MetadataEntity {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_geometric_error_override() {
        let mut tile = Tile { geometric_error: Some(10.0), ..Default::default() };
        let e = entity(json!({ "class": "tile", "properties": { "ge": 4.5, "other": "x" } }));
        assert!(apply_metadata_semantics(&mut tile, &e, &schema()).unwrap());
        assert_eq!(tile.geometric_error, Some(4.5));
    }

    #[test]
    fn test_invalid_override_is_tiling_error() {
        let mut tile = Tile::default();
        let e = entity(json!({ "class": "tile", "properties": { "ge": "big" } }));
        assert!(apply_metadata_semantics(&mut tile, &e, &schema()).unwrap_err().is_tiling_error());

        let e = entity(json!({ "class": "missing" }));
        assert!(apply_metadata_semantics(&mut tile, &e, &schema()).unwrap_err().is_tiling_error());
    }

    #[test]
    fn test_table_override() {
        let schema = schema();
        let table: crate::structure::PropertyTable = serde_json::from_value(json!({
            "class": "tile",
            "count": 2,
            "properties": { "ge": { "values": 0 } }
        }))
        .unwrap();
        let views = vec![[8.0f32.to_le_bytes(), 2.0f32.to_le_bytes()].concat()];
        let binary = BinaryPropertyTable::new(&table, &schema, &views);
        let mut tile = Tile::default();
        assert!(apply_table_semantics(&mut tile, &binary, 1).unwrap());
        assert_eq!(tile.geometric_error, Some(2.0));
        assert!(apply_table_semantics(&mut tile, &binary, 2).unwrap_err().is_tiling_error());
    }

    #[test]
    fn test_no_semantics() {
        let mut tile = Tile { geometric_error: Some(1.0), ..Default::default() };
        let e = entity(json!({ "class": "tile", "properties": { "other": "x" } }));
        assert!(!apply_metadata_semantics(&mut tile, &e, &schema()).unwrap());
        assert_eq!(tile.geometric_error, Some(1.0));
    }
}

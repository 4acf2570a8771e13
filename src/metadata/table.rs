//! Binary property tables: values stored in buffer views, one row per entity.

use std::collections::BTreeMap;

use serde_json::Value;

use super::model::{MetadataPropertyModel, Sealed};
use super::property::{shape_components, PropertyDescriptor, PropertyOverrides};
use crate::structure::{PropertyTable, PropertyType, Schema};
use crate::util::{read_component, read_components, read_offset, ComponentType, Error, MetadataValue, Result};

/// A property table together with the buffer view data it refers to.
#[derive(Clone, Copy)]
pub struct BinaryPropertyTable<'a> {
    pub property_table: &'a PropertyTable,
    pub schema: &'a Schema,
    pub buffer_views: &'a [Vec<u8>],
}

impl<'a> BinaryPropertyTable<'a> {
    pub fn new(property_table: &'a PropertyTable, schema: &'a Schema, buffer_views: &'a [Vec<u8>]) -> Self {
        Self { property_table, schema, buffer_views }
    }

    /// Number of rows.
    pub fn count(&self) -> usize {
        self.property_table.count
    }

    fn buffer_view(&self, index: usize, what: &str) -> Result<&'a [u8]> {
        self.buffer_views
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::invalid(format!("The {} buffer view index {} is invalid", what, index)))
    }

    /// Create the model for the given property.
    pub fn property_model(&self, property_name: &str) -> Result<TablePropertyModel<'a>> {
        let table_property = self.property_table.properties.get(property_name).ok_or_else(|| {
            Error::invalid(format!("Property table does not contain property '{}'", property_name))
        })?;
        let descriptor = PropertyDescriptor::resolve(
            self.schema,
            &self.property_table.class,
            property_name,
            PropertyOverrides::from(table_property),
        )?;
        let values = self.buffer_view(table_property.values, "values")?;
        let array_offsets = match table_property.array_offsets {
            Some(index) => Some((
                self.buffer_view(index, "arrayOffsets")?,
                offset_type(table_property.array_offset_type.as_deref())?,
            )),
            None => None,
        };
        let string_offsets = match table_property.string_offsets {
            Some(index) => Some((
                self.buffer_view(index, "stringOffsets")?,
                offset_type(table_property.string_offset_type.as_deref())?,
            )),
            None => None,
        };
        if descriptor.is_variable_length_array() && array_offsets.is_none() {
            return Err(Error::invalid(format!(
                "Variable-length array property '{}' has no arrayOffsets",
                property_name
            )));
        }
        if descriptor.property_type == PropertyType::String && string_offsets.is_none() {
            return Err(Error::invalid(format!(
                "String property '{}' has no stringOffsets",
                property_name
            )));
        }
        Ok(TablePropertyModel {
            descriptor,
            count: self.property_table.count,
            values,
            array_offsets,
            string_offsets,
        })
    }

    /// The processed values of all properties of one row, as JSON.
    ///
    /// This is the metadata entity that the row represents.
    pub fn entity_values(&self, row: usize) -> Result<BTreeMap<String, Value>> {
        let mut values = BTreeMap::new();
        for property_name in self.property_table.properties.keys() {
            let model = self.property_model(property_name)?;
            let value = model.property_value(row)?;
            values.insert(property_name.clone(), value.to_json());
        }
        Ok(values)
    }
}

fn offset_type(name: Option<&str>) -> Result<ComponentType> {
    let name = name.unwrap_or("UINT32");
    ComponentType::from_name(name)
        .filter(|t| t.is_unsigned())
        .ok_or_else(|| Error::invalid(format!("Invalid offset type '{}'", name)))
}

/// Model of one property of a binary property table, keyed by row index.
#[derive(Debug, Clone)]
pub struct TablePropertyModel<'a> {
    descriptor: PropertyDescriptor,
    count: usize,
    values: &'a [u8],
    array_offsets: Option<(&'a [u8], ComponentType)>,
    string_offsets: Option<(&'a [u8], ComponentType)>,
}

impl TablePropertyModel<'_> {
    pub fn count(&self) -> usize {
        self.count
    }

    /// The element range `[start, end)` of the given row.
    fn element_range(&self, row: usize) -> Result<(usize, usize)> {
        if let Some((offsets, offset_type)) = self.array_offsets.filter(|_| self.descriptor.is_variable_length_array()) {
            let start = read_offset(offsets, row, offset_type)?;
            let end = read_offset(offsets, row + 1, offset_type)?;
            if end < start {
                return Err(Error::invalid(format!(
                    "Array offsets for row {} are decreasing ({} > {})",
                    row, start, end
                )));
            }
            return Ok((start, end));
        }
        let n = self.descriptor.class_property.fixed_count().unwrap_or(1);
        row.checked_mul(n)
            .and_then(|start| Some((start, start.checked_add(n)?)))
            .ok_or_else(|| Error::invalid(format!("Array elements of row {} exceed the addressable range", row)))
    }

    fn read_string(&self, index: usize) -> Result<String> {
        let (offsets, offset_type) = self
            .string_offsets
            .ok_or_else(|| Error::internal("String property without stringOffsets"))?;
        let start = read_offset(offsets, index, offset_type)?;
        let end = read_offset(offsets, index + 1, offset_type)?;
        if end < start || end > self.values.len() {
            return Err(Error::UnexpectedEof(end as u64));
        }
        Ok(std::str::from_utf8(&self.values[start..end])?.to_string())
    }

    fn read_boolean(&self, index: usize) -> Result<bool> {
        let byte = self
            .values
            .get(index / 8)
            .ok_or(Error::UnexpectedEof((index / 8 + 1) as u64))?;
        Ok((byte >> (index % 8)) & 1 == 1)
    }
}

impl Sealed for TablePropertyModel<'_> {}

impl MetadataPropertyModel for TablePropertyModel<'_> {
    type Key = usize;
    const SOURCE: &'static str = "property table";
    const KEY_NAME: &'static str = "index";

    fn descriptor(&self) -> &PropertyDescriptor {
        &self.descriptor
    }

    fn raw_property_value(&self, row: usize) -> Result<MetadataValue> {
        if row >= self.count {
            return Err(Error::internal(format!(
                "Row {} is out of range for a table with {} rows",
                row, self.count
            )));
        }
        let array = self.descriptor.class_property.array;
        let (start, end) = self.element_range(row)?;
        let wrap = |mut items: Vec<MetadataValue>| {
            if array {
                MetadataValue::Array(items)
            } else {
                items.pop().unwrap_or(MetadataValue::Array(Vec::new()))
            }
        };
        match self.descriptor.property_type {
            PropertyType::String => {
                let strings = (start..end)
                    .map(|i| self.read_string(i).map(MetadataValue::String))
                    .collect::<Result<Vec<_>>>()?;
                Ok(wrap(strings))
            }
            PropertyType::Boolean => {
                let bools = (start..end)
                    .map(|i| self.read_boolean(i).map(MetadataValue::Boolean))
                    .collect::<Result<Vec<_>>>()?;
                Ok(wrap(bools))
            }
            property_type => {
                let component_type = self
                    .descriptor
                    .component_type
                    .ok_or_else(|| Error::internal("Numeric property without component type"))?;
                let c = property_type.component_count();
                if !array && c == 1 {
                    return Ok(MetadataValue::Number(read_component(self.values, start, component_type)?));
                }
                let (first, count) = start
                    .checked_mul(c)
                    .zip((end - start).checked_mul(c))
                    .ok_or_else(|| Error::invalid(format!("Components of row {} exceed the addressable range", row)))?;
                let components = read_components(self.values, first, count, component_type)?;
                Ok(shape_components(components, c, array))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        serde_json::from_value(json!({
            "classes": {
                "c": {
                    "properties": {
                        "height": { "type": "SCALAR", "componentType": "UINT16", "offset": 10 },
                        "pos": { "type": "VEC2", "componentType": "INT8" },
                        "list": { "type": "SCALAR", "componentType": "UINT8", "array": true },
                        "name": { "type": "STRING" },
                        "flag": { "type": "BOOLEAN" },
                        "kind": { "type": "ENUM", "enumType": "K" }
                    }
                }
            },
            "enums": { "K": { "valueType": "UINT8", "values": [ { "name": "X", "value": 1 } ] } }
        }))
        .unwrap()
    }

    fn table() -> PropertyTable {
        serde_json::from_value(json!({
            "class": "c",
            "count": 2,
            "properties": {
                "height": { "values": 0 },
                "pos": { "values": 1 },
                "list": { "values": 2, "arrayOffsets": 3, "arrayOffsetType": "UINT8" },
                "name": { "values": 4, "stringOffsets": 5, "stringOffsetType": "UINT8" },
                "flag": { "values": 6 },
                "kind": { "values": 7 }
            }
        }))
        .unwrap()
    }

    fn buffer_views() -> Vec<Vec<u8>> {
        vec![
            [5u16.to_le_bytes(), 7u16.to_le_bytes()].concat(),
            vec![1, 0xFF, 3, 4],
            vec![1, 2, 3],
            vec![0, 1, 3],
            b"abcde".to_vec(),
            vec![0, 2, 5],
            vec![0b10],
            vec![1, 1],
        ]
    }

    #[test]
    fn test_scalar_raw_and_processed() {
        let schema = schema();
        let table = table();
        let views = buffer_views();
        let model = BinaryPropertyTable::new(&table, &schema, &views).property_model("height").unwrap();
        assert_eq!(model.raw_property_value(1).unwrap(), MetadataValue::Number(7.0));
        assert_eq!(model.property_value(1).unwrap(), MetadataValue::Number(17.0));
        assert!(model.raw_property_value(2).is_err());
    }

    #[test]
    fn test_vector_values() {
        let schema = schema();
        let table = table();
        let views = buffer_views();
        let model = BinaryPropertyTable::new(&table, &schema, &views).property_model("pos").unwrap();
        assert_eq!(model.raw_property_value(0).unwrap(), MetadataValue::numbers([1.0, -1.0]));
    }

    #[test]
    fn test_variable_length_arrays() {
        let schema = schema();
        let table = table();
        let views = buffer_views();
        let model = BinaryPropertyTable::new(&table, &schema, &views).property_model("list").unwrap();
        assert_eq!(model.raw_property_value(0).unwrap(), MetadataValue::numbers([1.0]));
        assert_eq!(model.raw_property_value(1).unwrap(), MetadataValue::numbers([2.0, 3.0]));
    }

    #[test]
    fn test_strings_and_booleans() {
        let schema = schema();
        let table = table();
        let views = buffer_views();
        let binary = BinaryPropertyTable::new(&table, &schema, &views);
        let names = binary.property_model("name").unwrap();
        assert_eq!(names.raw_property_value(1).unwrap(), MetadataValue::String("cde".into()));
        let flags = binary.property_model("flag").unwrap();
        assert_eq!(flags.raw_property_value(0).unwrap(), MetadataValue::Boolean(false));
        assert_eq!(flags.raw_property_value(1).unwrap(), MetadataValue::Boolean(true));
    }

    #[test]
    fn test_huge_fixed_array_count() {
        let schema: Schema = serde_json::from_value(json!({
            "classes": { "c": { "properties": {
                "huge": { "type": "VEC4", "componentType": "UINT8", "array": true, "count": 4611686018427387904u64 }
            } } }
        }))
        .unwrap();
        let table: PropertyTable =
            serde_json::from_value(json!({ "class": "c", "count": 2, "properties": { "huge": { "values": 0 } } }))
                .unwrap();
        let views = vec![vec![0u8; 8]];
        let model = BinaryPropertyTable::new(&table, &schema, &views).property_model("huge").unwrap();
        assert!(matches!(model.raw_property_value(0), Err(Error::InvalidStructure(_))));
        assert!(model.raw_property_value(1).is_err());
    }

    #[test]
    fn test_repeated_reads_are_equal() {
        let schema = schema();
        let table = table();
        let views = buffer_views();
        let binary = BinaryPropertyTable::new(&table, &schema, &views);
        for name in ["height", "pos", "list", "name", "flag", "kind"] {
            let model = binary.property_model(name).unwrap();
            for row in 0..model.count() {
                assert_eq!(model.property_value(row).unwrap(), model.property_value(row).unwrap(), "{}", name);
            }
        }
    }

    #[test]
    fn test_identity_transform_keeps_raw_values() {
        let schema: Schema = serde_json::from_value(json!({
            "classes": { "c": { "properties": {
                "p": { "type": "VEC2", "componentType": "FLOAT32", "offset": [0, 0], "scale": [1, 1] }
            } } }
        }))
        .unwrap();
        let table: PropertyTable =
            serde_json::from_value(json!({ "class": "c", "count": 2, "properties": { "p": { "values": 0 } } }))
                .unwrap();
        let views = vec![[0.5f32, -1.25, 3.0, 1e6].iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>()];
        let model = BinaryPropertyTable::new(&table, &schema, &views).property_model("p").unwrap();
        for row in 0..2 {
            assert_eq!(model.property_value(row).unwrap(), model.raw_property_value(row).unwrap());
        }
    }

    #[test]
    fn test_entity_values() {
        let schema = schema();
        let table = table();
        let views = buffer_views();
        let binary = BinaryPropertyTable::new(&table, &schema, &views);
        let entity = binary.entity_values(0).unwrap();
        assert_eq!(entity["kind"], json!("X"));
        assert_eq!(entity["height"], json!(15.0));
    }
}

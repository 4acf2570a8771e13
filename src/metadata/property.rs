//! Resolved property definitions and value processing.
//!
//! A [`PropertyDescriptor`] combines a class property with the schema
//! information that is needed to decode it (component type, enum names)
//! and with the per-usage overrides of a property table, texture or
//! attribute property.

use std::collections::HashMap;

use serde_json::Value;

use crate::structure::{ClassProperty, PropertyTableProperty, PropertyType, Schema};
use crate::util::{ComponentType, Error, MetadataValue, Result};

/// Offset, scale and bounds declared by a property usage.
///
/// Each of these overrides the corresponding value of the class property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyOverrides {
    pub offset: Option<MetadataValue>,
    pub scale: Option<MetadataValue>,
    pub min: Option<MetadataValue>,
    pub max: Option<MetadataValue>,
}

impl PropertyOverrides {
    pub fn from_json(
        offset: Option<&Value>,
        scale: Option<&Value>,
        min: Option<&Value>,
        max: Option<&Value>,
    ) -> Self {
        Self {
            offset: offset.and_then(MetadataValue::from_json),
            scale: scale.and_then(MetadataValue::from_json),
            min: min.and_then(MetadataValue::from_json),
            max: max.and_then(MetadataValue::from_json),
        }
    }
}

impl From<&PropertyTableProperty> for PropertyOverrides {
    fn from(p: &PropertyTableProperty) -> Self {
        Self::from_json(p.offset.as_ref(), p.scale.as_ref(), p.min.as_ref(), p.max.as_ref())
    }
}

/// A class property, resolved against its schema.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub class_property: ClassProperty,
    pub property_type: PropertyType,
    /// Component type of the stored values (enum value type for ENUM)
    pub component_type: Option<ComponentType>,
    /// Code to name mapping, for ENUM properties
    pub enum_names: Option<HashMap<i64, String>>,
    pub overrides: PropertyOverrides,
}

impl PropertyDescriptor {
    /// Resolve the property `property_name` of class `class_name`.
    ///
    /// Fails when the class, property or enum type does not exist, or
    /// when a numeric property has no valid component type.
    pub fn resolve(
        schema: &Schema,
        class_name: &str,
        property_name: &str,
        overrides: PropertyOverrides,
    ) -> Result<Self> {
        let metadata_class = schema
            .classes
            .get(class_name)
            .ok_or_else(|| Error::invalid(format!("Class '{}' not found in schema", class_name)))?;
        let class_property = metadata_class.properties.get(property_name).ok_or_else(|| {
            Error::invalid(format!(
                "Property '{}' not found in class '{}'",
                property_name, class_name
            ))
        })?;
        Self::from_class_property(schema, property_name, class_property, overrides)
    }

    pub fn from_class_property(
        schema: &Schema,
        property_name: &str,
        class_property: &ClassProperty,
        overrides: PropertyOverrides,
    ) -> Result<Self> {
        let property_type = class_property.parsed_type().ok_or_else(|| {
            Error::invalid(format!(
                "Property '{}' has invalid type '{}'",
                property_name, class_property.property_type
            ))
        })?;
        let component_type = class_property.stored_component_type(schema);
        if component_type.is_none() && (property_type.is_numeric() || property_type == PropertyType::Enum) {
            return Err(Error::invalid(format!(
                "Property '{}' has no valid component type",
                property_name
            )));
        }
        let enum_names = if property_type == PropertyType::Enum {
            let enum_type = class_property.enum_type.as_deref().unwrap_or_default();
            Some(schema.enum_value_names(enum_type).ok_or_else(|| {
                Error::invalid(format!("Enum type '{}' not found in schema", enum_type))
            })?)
        } else {
            None
        };
        Ok(Self {
            name: property_name.to_string(),
            class_property: class_property.clone(),
            property_type,
            component_type,
            enum_names,
            overrides,
        })
    }

    /// Whether the property is a variable-length array.
    pub fn is_variable_length_array(&self) -> bool {
        self.class_property.array && self.class_property.fixed_count().is_none()
    }

    /// Effective offset: the override, or the class property default.
    pub fn offset(&self) -> Option<MetadataValue> {
        self.overrides
            .offset
            .clone()
            .or_else(|| self.class_property.offset.as_ref().and_then(MetadataValue::from_json))
    }

    /// Effective scale: the override, or the class property default.
    pub fn scale(&self) -> Option<MetadataValue> {
        self.overrides
            .scale
            .clone()
            .or_else(|| self.class_property.scale.as_ref().and_then(MetadataValue::from_json))
    }

    /// Turn the raw value into the value that the property represents.
    ///
    /// Numeric values are normalized (when `normalized`), scaled and
    /// offset. ENUM codes are mapped to their names; an unknown code is
    /// an error. Other values are returned unchanged.
    pub fn process(&self, raw: MetadataValue) -> Result<MetadataValue> {
        if let Some(names) = &self.enum_names {
            let enum_type = self.class_property.enum_type.as_deref().unwrap_or_default();
            return process_enum_value(enum_type, names, &raw);
        }
        if !self.property_type.is_numeric() {
            return Ok(raw);
        }
        let mut value = raw;
        if self.class_property.normalized {
            if let Some(component_type) = self.component_type {
                value = value.map_numbers(&|v| component_type.normalize(v));
            }
        }
        if let Some(scale) = self.scale() {
            value = value.zip_numbers(&scale, &|v, s| v * s);
        }
        if let Some(offset) = self.offset() {
            value = value.zip_numbers(&offset, &|v, o| v + o);
        }
        Ok(value)
    }
}

/// Map enum codes (scalar or arrays) to their names.
pub fn process_enum_value(
    enum_type: &str,
    names: &HashMap<i64, String>,
    raw: &MetadataValue,
) -> Result<MetadataValue> {
    match raw {
        MetadataValue::Number(code) => {
            let code = *code as i64;
            names
                .get(&code)
                .map(|name| MetadataValue::String(name.clone()))
                .ok_or_else(|| Error::UnknownEnumValue {
                    enum_type: enum_type.to_string(),
                    value: code,
                })
        }
        MetadataValue::Array(items) => items
            .iter()
            .map(|item| process_enum_value(enum_type, names, item))
            .collect::<Result<Vec<_>>>()
            .map(MetadataValue::Array),
        other => Ok(other.clone()),
    }
}

/// Arrange flat components into the shape of a property value:
/// a number, a vector, an array of numbers or an array of vectors.
pub fn shape_components(components: Vec<f64>, type_components: usize, array: bool) -> MetadataValue {
    match (array, type_components) {
        (false, 1) => components
            .first()
            .copied()
            .map(MetadataValue::Number)
            .unwrap_or(MetadataValue::Array(Vec::new())),
        (false, _) => MetadataValue::numbers(components),
        (true, 1) => MetadataValue::numbers(components),
        (true, n) => MetadataValue::Array(
            components
                .chunks(n)
                .map(|c| MetadataValue::numbers(c.iter().copied()))
                .collect(),
        ),
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
                        "n": { "type": "SCALAR", "componentType": "UINT8", "normalized": true },
                        "s": { "type": "VEC2", "componentType": "FLOAT32", "offset": [1, 2], "scale": 2 },
                        "e": { "type": "ENUM", "enumType": "E", "array": true, "count": 2 }
                    }
                }
            },
            "enums": { "E": { "values": [ { "name": "ZERO", "value": 0 }, { "name": "TWO", "value": 2 } ] } }
        }))
        .unwrap()
    }

    #[test]
    fn test_normalized() {
        let d = PropertyDescriptor::resolve(&schema(), "c", "n", PropertyOverrides::default()).unwrap();
        assert_eq!(d.process(MetadataValue::Number(255.0)).unwrap(), MetadataValue::Number(1.0));
    }

    #[test]
    fn test_scale_then_offset_with_override() {
        let d = PropertyDescriptor::resolve(&schema(), "c", "s", PropertyOverrides::default()).unwrap();
        let v = d.process(MetadataValue::numbers([1.0, 1.0])).unwrap();
        assert_eq!(v, MetadataValue::numbers([3.0, 4.0]));

        let overrides = PropertyOverrides { offset: Some(MetadataValue::Number(0.0)), ..Default::default() };
        let d = PropertyDescriptor::resolve(&schema(), "c", "s", overrides).unwrap();
        let v = d.process(MetadataValue::numbers([1.0, 1.0])).unwrap();
        assert_eq!(v, MetadataValue::numbers([2.0, 2.0]));
    }

    #[test]
    fn test_enum_processing() {
        let d = PropertyDescriptor::resolve(&schema(), "c", "e", PropertyOverrides::default()).unwrap();
        let v = d.process(MetadataValue::numbers([0.0, 2.0])).unwrap();
        assert_eq!(
            v,
            MetadataValue::Array(vec![
                MetadataValue::String("ZERO".into()),
                MetadataValue::String("TWO".into())
            ])
        );
        let err = d.process(MetadataValue::numbers([1.0, 2.0])).unwrap_err();
        assert!(matches!(err, Error::UnknownEnumValue { value: 1, .. }));
    }

    #[test]
    fn test_resolve_missing() {
        assert!(PropertyDescriptor::resolve(&schema(), "x", "n", PropertyOverrides::default()).is_err());
        assert!(PropertyDescriptor::resolve(&schema(), "c", "x", PropertyOverrides::default()).is_err());
    }

    #[test]
    fn test_shape_components() {
        assert_eq!(shape_components(vec![4.0], 1, false), MetadataValue::Number(4.0));
        assert_eq!(shape_components(vec![1.0, 2.0], 2, false), MetadataValue::numbers([1.0, 2.0]));
        assert_eq!(
            shape_components(vec![1.0, 2.0, 3.0, 4.0], 2, true),
            MetadataValue::Array(vec![MetadataValue::numbers([1.0, 2.0]), MetadataValue::numbers([3.0, 4.0])])
        );
    }
}

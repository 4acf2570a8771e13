//! Property attributes: values stored in glTF vertex attributes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use super::model::{MetadataPropertyModel, Sealed};
use super::property::{PropertyDescriptor, PropertyOverrides};
use crate::structure::{PropertyType, Schema};
use crate::util::{read_component, ComponentType, Error, MetadataValue, Result};

/// Read access to the elements of a vertex accessor.
#[derive(Debug, Clone, Copy)]
pub struct VertexAccessor<'a> {
    /// The bytes of the buffer view the accessor refers to
    pub data: &'a [u8],
    pub byte_offset: usize,
    /// Distance between elements; `None` for tightly packed elements
    pub byte_stride: Option<usize>,
    pub component_type: ComponentType,
    /// Components per element, 1 (SCALAR) to 4 (VEC4)
    pub components: usize,
    pub count: usize,
}

impl<'a> VertexAccessor<'a> {
    pub fn element_size(&self) -> usize {
        self.components * self.component_type.byte_size()
    }

    fn stride(&self) -> usize {
        self.byte_stride.unwrap_or_else(|| self.element_size())
    }

    /// Whether all `count` elements lie within `data`.
    pub fn is_in_bounds(&self) -> bool {
        if self.count == 0 {
            return true;
        }
        self.stride()
            .checked_mul(self.count - 1)
            .and_then(|last| last.checked_add(self.byte_offset))
            .and_then(|last| last.checked_add(self.element_size()))
            .is_some_and(|end| end <= self.data.len())
    }

    /// Read the components of element `index`.
    pub fn element(&self, index: usize) -> Result<SmallVec<[f64; 4]>> {
        if index >= self.count {
            return Err(Error::internal(format!(
                "Vertex index {} is out of range for an accessor with {} elements",
                index, self.count
            )));
        }
        let start = index
            .checked_mul(self.stride())
            .and_then(|s| s.checked_add(self.byte_offset))
            .ok_or_else(|| Error::internal(format!("Vertex {} lies outside of the addressable range", index)))?;
        let end = start
            .checked_add(self.element_size())
            .ok_or_else(|| Error::internal(format!("Vertex {} lies outside of the addressable range", index)))?;
        let bytes = self
            .data
            .get(start..end)
            .ok_or(Error::UnexpectedEof(end as u64))?;
        (0..self.components)
            .map(|c| read_component(bytes, c, self.component_type))
            .collect()
    }
}

/// One property of a property attribute, as declared in `EXT_structural_metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAttributeProperty {
    /// Name of the vertex attribute, e.g. `_TEMPERATURE`
    pub attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

impl From<&PropertyAttributeProperty> for PropertyOverrides {
    fn from(p: &PropertyAttributeProperty) -> Self {
        Self::from_json(p.offset.as_ref(), p.scale.as_ref(), p.min.as_ref(), p.max.as_ref())
    }
}

/// Model of one property attribute property, keyed by vertex index.
#[derive(Debug, Clone)]
pub struct AttributePropertyModel<'a> {
    descriptor: PropertyDescriptor,
    accessor: VertexAccessor<'a>,
}

impl<'a> AttributePropertyModel<'a> {
    /// Create the model for `property_name` of `class_name`.
    ///
    /// The accessor must provide one element per vertex with as many
    /// components as the property type (times the fixed array count).
    pub fn new(
        schema: &Schema,
        class_name: &str,
        property_name: &str,
        attribute_property: &PropertyAttributeProperty,
        accessor: VertexAccessor<'a>,
    ) -> Result<Self> {
        let descriptor = PropertyDescriptor::resolve(
            schema,
            class_name,
            property_name,
            PropertyOverrides::from(attribute_property),
        )?;
        if matches!(descriptor.property_type, PropertyType::String | PropertyType::Boolean)
            || descriptor.is_variable_length_array()
        {
            return Err(Error::invalid(format!(
                "Property attribute property '{}' cannot be stored in a vertex attribute",
                property_name
            )));
        }
        let count = descriptor.class_property.fixed_count().unwrap_or(1);
        let expected = count.checked_mul(descriptor.property_type.component_count());
        if expected != Some(accessor.components) {
            return Err(Error::invalid(format!(
                "Property attribute property '{}' needs {} components per vertex, but the accessor has {}",
                property_name,
                count.saturating_mul(descriptor.property_type.component_count()),
                accessor.components
            )));
        }
        if Some(accessor.component_type) != descriptor.component_type {
            return Err(Error::TypeMismatch {
                expected: descriptor.component_type.map(|t| t.name()).unwrap_or("none").into(),
                actual: accessor.component_type.name().into(),
            });
        }
        Ok(Self { descriptor, accessor })
    }

    pub fn count(&self) -> usize {
        self.accessor.count
    }
}

impl Sealed for AttributePropertyModel<'_> {}

impl MetadataPropertyModel for AttributePropertyModel<'_> {
    type Key = usize;
    const SOURCE: &'static str = "property attribute";
    const KEY_NAME: &'static str = "vertex";

    fn descriptor(&self) -> &PropertyDescriptor {
        &self.descriptor
    }

    fn raw_property_value(&self, vertex: usize) -> Result<MetadataValue> {
        let element = self.accessor.element(vertex)?;
        if self.descriptor.property_type == PropertyType::Scalar && !self.descriptor.class_property.array {
            return element
                .first()
                .copied()
                .map(MetadataValue::Number)
                .ok_or_else(|| Error::internal("Empty vertex attribute element"));
        }
        Ok(MetadataValue::numbers(element))
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
                        "t": { "type": "SCALAR", "componentType": "FLOAT32", "scale": 2 },
                        "d": { "type": "VEC2", "componentType": "INT16" }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn floats(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn test_scalar_attribute() {
        let data = floats(&[1.5, 2.5, 3.5]);
        let accessor = VertexAccessor {
            data: &data,
            byte_offset: 0,
            byte_stride: None,
            component_type: ComponentType::Float32,
            components: 1,
            count: 3,
        };
        let property = PropertyAttributeProperty { attribute: "_T".into(), ..Default::default() };
        let model = AttributePropertyModel::new(&schema(), "c", "t", &property, accessor).unwrap();
        assert_eq!(model.raw_property_value(2).unwrap(), MetadataValue::Number(3.5));
        assert_eq!(model.property_value(2).unwrap(), MetadataValue::Number(7.0));
        assert!(model.raw_property_value(3).is_err());
    }

    #[test]
    fn test_strided_vector_attribute() {
        // Two VEC2<INT16> elements with a stride of 8 bytes
        let data: Vec<u8> = [1i16, -2, 0, 0, 3, 4, 0, 0].iter().flat_map(|v| v.to_le_bytes()).collect();
        let accessor = VertexAccessor {
            data: &data,
            byte_offset: 0,
            byte_stride: Some(8),
            component_type: ComponentType::Int16,
            components: 2,
            count: 2,
        };
        assert!(accessor.is_in_bounds());
        let property = PropertyAttributeProperty { attribute: "_D".into(), ..Default::default() };
        let model = AttributePropertyModel::new(&schema(), "c", "d", &property, accessor).unwrap();
        assert_eq!(model.raw_property_value(0).unwrap(), MetadataValue::numbers([1.0, -2.0]));
        assert_eq!(model.raw_property_value(1).unwrap(), MetadataValue::numbers([3.0, 4.0]));
    }

    #[test]
    fn test_huge_accessor_is_rejected() {
        let data = floats(&[1.0, 2.0]);
        let huge = VertexAccessor {
            data: &data,
            byte_offset: 0,
            byte_stride: None,
            component_type: ComponentType::Float32,
            components: 1,
            count: 1 << 62,
        };
        assert!(!huge.is_in_bounds());
        assert!(matches!(huge.element(1 << 61), Err(Error::Internal(_))));

        let wide = VertexAccessor { byte_stride: Some(usize::MAX / 2), count: 3, ..huge };
        assert!(!wide.is_in_bounds());
        assert!(matches!(wide.element(2), Err(Error::Internal(_))));
    }

    #[test]
    fn test_mismatched_accessor() {
        let data = floats(&[1.0]);
        let accessor = VertexAccessor {
            data: &data,
            byte_offset: 0,
            byte_stride: None,
            component_type: ComponentType::Float32,
            components: 1,
            count: 1,
        };
        let property = PropertyAttributeProperty { attribute: "_D".into(), ..Default::default() };
        assert!(AttributePropertyModel::new(&schema(), "c", "d", &property, accessor).is_err());
    }
}

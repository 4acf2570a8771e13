//! Metadata schema: classes, class properties and enums.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::ComponentType;

/// A metadata schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub classes: BTreeMap<String, MetadataClass>,
    #[serde(default)]
    pub enums: BTreeMap<String, MetadataEnum>,
}

/// A class: a named set of properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataClass {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, ClassProperty>,
}

/// The definition of one property of a class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassProperty {
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_type: Option<String>,
    #[serde(default)]
    pub array: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default)]
    pub normalized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// An enum: a mapping between integer codes and names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEnum {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default)]
    pub values: Vec<EnumValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The element type of a class property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
    String,
    Boolean,
    Enum,
}

impl PropertyType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SCALAR" => Some(Self::Scalar),
            "VEC2" => Some(Self::Vec2),
            "VEC3" => Some(Self::Vec3),
            "VEC4" => Some(Self::Vec4),
            "MAT2" => Some(Self::Mat2),
            "MAT3" => Some(Self::Mat3),
            "MAT4" => Some(Self::Mat4),
            "STRING" => Some(Self::String),
            "BOOLEAN" => Some(Self::Boolean),
            "ENUM" => Some(Self::Enum),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Vec2 => "VEC2",
            Self::Vec3 => "VEC3",
            Self::Vec4 => "VEC4",
            Self::Mat2 => "MAT2",
            Self::Mat3 => "MAT3",
            Self::Mat4 => "MAT4",
            Self::String => "STRING",
            Self::Boolean => "BOOLEAN",
            Self::Enum => "ENUM",
        }
    }

    /// Number of components of one element of this type.
    pub const fn component_count(self) -> usize {
        match self {
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
            Self::Scalar | Self::String | Self::Boolean | Self::Enum => 1,
        }
    }

    /// Whether values of this type have a numeric component type.
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Scalar | Self::Vec2 | Self::Vec3 | Self::Vec4 | Self::Mat2 | Self::Mat3 | Self::Mat4
        )
    }

    /// Whether this type is represented as a vector of components.
    pub const fn is_vector(self) -> bool {
        self.component_count() > 1
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl ClassProperty {
    /// The parsed `type`, if it is valid.
    pub fn parsed_type(&self) -> Option<PropertyType> {
        PropertyType::from_name(&self.property_type)
    }

    /// Whether this property has a numeric type (SCALAR, VECn or MATn).
    pub fn has_numeric_type(&self) -> bool {
        self.parsed_type().is_some_and(PropertyType::is_numeric)
    }

    /// The component type of the stored values.
    ///
    /// For ENUM properties this is the `valueType` of the enum
    /// (default UINT16). BOOLEAN and STRING have no component type.
    pub fn stored_component_type(&self, schema: &Schema) -> Option<ComponentType> {
        match self.parsed_type()? {
            PropertyType::Enum => {
                let metadata_enum = schema.enums.get(self.enum_type.as_deref()?)?;
                ComponentType::from_name(metadata_enum.value_type.as_deref().unwrap_or("UINT16"))
            }
            PropertyType::String | PropertyType::Boolean => None,
            _ => ComponentType::from_name(self.component_type.as_deref()?),
        }
    }

    /// The fixed array length, when this is a fixed-length array.
    pub fn fixed_count(&self) -> Option<usize> {
        if !self.array {
            return None;
        }
        self.count.filter(|c| *c > 0).map(|c| c as usize)
    }
}

impl Schema {
    /// Look up a class property by class and property name.
    pub fn class_property(&self, class_name: &str, property_name: &str) -> Option<&ClassProperty> {
        self.classes.get(class_name)?.properties.get(property_name)
    }

    /// The mapping from enum codes to enum names.
    pub fn enum_value_names(&self, enum_type: &str) -> Option<HashMap<i64, String>> {
        let metadata_enum = self.enums.get(enum_type)?;
        Some(metadata_enum.values.iter().map(|v| (v.value, v.name.clone())).collect())
    }

    /// All codes that are declared in the given enum.
    pub fn enum_values(&self, enum_type: &str) -> Option<Vec<i64>> {
        let metadata_enum = self.enums.get(enum_type)?;
        Some(metadata_enum.values.iter().map(|v| v.value).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        serde_json::from_value(json!({
            "id": "s",
            "classes": {
                "building": {
                    "properties": {
                        "height": { "type": "SCALAR", "componentType": "FLOAT32" },
                        "kind": { "type": "ENUM", "enumType": "kind" },
                        "name": { "type": "STRING" }
                    }
                }
            },
            "enums": {
                "kind": {
                    "valueType": "UINT8",
                    "values": [ { "name": "A", "value": 0 }, { "name": "B", "value": 3 } ]
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_schema() {
        let schema = schema();
        let height = schema.class_property("building", "height").unwrap();
        assert_eq!(height.parsed_type(), Some(PropertyType::Scalar));
        assert!(height.has_numeric_type());
        assert_eq!(height.stored_component_type(&schema), Some(ComponentType::Float32));
    }

    #[test]
    fn test_enum_component_type() {
        let schema = schema();
        let kind = schema.class_property("building", "kind").unwrap();
        assert!(!kind.has_numeric_type());
        assert_eq!(kind.stored_component_type(&schema), Some(ComponentType::Uint8));
        assert_eq!(schema.enum_values("kind"), Some(vec![0, 3]));
        assert_eq!(schema.enum_value_names("kind").unwrap()[&3], "B");
    }

    #[test]
    fn test_component_counts() {
        assert_eq!(PropertyType::Vec3.component_count(), 3);
        assert_eq!(PropertyType::Mat4.component_count(), 16);
        assert!(!PropertyType::Boolean.is_numeric());
    }
}

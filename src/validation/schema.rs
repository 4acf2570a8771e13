//! Validation of metadata schemas.

use std::collections::BTreeSet;

use serde_json::Value;

use super::context::ValidationContext;
use super::issues::IssueType;
use crate::structure::{ClassProperty, MetadataEnum, PropertyType, Schema};
use crate::util::ComponentType;

const ENUM_VALUE_TYPES: [&str; 8] = ["INT8", "UINT8", "INT16", "UINT16", "INT32", "UINT32", "INT64", "UINT64"];

/// Checks that a schema is consistent in itself: valid property types,
/// resolvable enum references and numeric constraints that fit the
/// property type.
pub struct SchemaValidator;

impl SchemaValidator {
    /// Validate the schema at `path` (e.g. `/schema`).
    pub fn validate_schema(path: &str, schema: &Schema, context: &mut ValidationContext) -> bool {
        let mut result = true;
        for (name, metadata_enum) in &schema.enums {
            result &= validate_enum(&format!("{}/enums/{}", path, name), metadata_enum, context);
        }
        for (class_name, metadata_class) in &schema.classes {
            for (name, property) in &metadata_class.properties {
                let property_path = format!("{}/classes/{}/properties/{}", path, class_name, name);
                result &= validate_class_property(&property_path, property, schema, context);
            }
        }
        tracing::debug!(
            "Validated schema with {} classes and {} enums",
            schema.classes.len(),
            schema.enums.len()
        );
        result
    }

    /// Parse and validate a schema file.
    pub fn validate_json(data: &[u8], context: &mut ValidationContext) -> Option<Schema> {
        match serde_json::from_slice::<Schema>(data) {
            Ok(schema) => Self::validate_schema("", &schema, context).then_some(schema),
            Err(e) => {
                context.report(IssueType::JsonParseError, "", format!("Could not parse schema: {}", e));
                None
            }
        }
    }
}

fn validate_enum(path: &str, metadata_enum: &MetadataEnum, context: &mut ValidationContext) -> bool {
    let mut result = true;
    if let Some(value_type) = &metadata_enum.value_type {
        if !ENUM_VALUE_TYPES.contains(&value_type.as_str()) {
            context.report(
                IssueType::ValueNotInList,
                format!("{}/valueType", path),
                format!("The enum valueType must be one of {:?}, but is {}", ENUM_VALUE_TYPES, value_type),
            );
            result = false;
        }
    }
    if metadata_enum.values.is_empty() {
        context.report(
            IssueType::ArrayLengthMismatch,
            format!("{}/values", path),
            "The enum must define at least one value",
        );
        result = false;
    }
    let mut names = BTreeSet::new();
    let mut values = BTreeSet::new();
    for (i, value) in metadata_enum.values.iter().enumerate() {
        let value_path = format!("{}/values/{}", path, i);
        if !names.insert(value.name.as_str()) {
            context.report(
                IssueType::ValueNotInList,
                format!("{}/name", value_path),
                format!("The enum value name '{}' is not unique", value.name),
            );
            result = false;
        }
        if !values.insert(value.value) {
            context.report(
                IssueType::ValueNotInList,
                format!("{}/value", value_path),
                format!("The enum value {} is not unique", value.value),
            );
            result = false;
        }
    }
    result
}

fn validate_class_property(
    path: &str,
    property: &ClassProperty,
    schema: &Schema,
    context: &mut ValidationContext,
) -> bool {
    let Some(property_type) = property.parsed_type() else {
        context.report(
            IssueType::ValueNotInList,
            format!("{}/type", path),
            format!("The property type '{}' is not valid", property.property_type),
        );
        return false;
    };
    let mut result = true;

    let component_type = match (property_type.is_numeric(), &property.component_type) {
        (true, None) => {
            context.report(
                IssueType::PropertyMissing,
                path,
                format!("The 'componentType' is required for type {}", property_type),
            );
            return false;
        }
        (true, Some(name)) => match ComponentType::from_name(name) {
            Some(component_type) => Some(component_type),
            None => {
                context.report(
                    IssueType::ValueNotInList,
                    format!("{}/componentType", path),
                    format!("The component type '{}' is not valid", name),
                );
                return false;
            }
        },
        (false, Some(_)) => {
            context.report(
                IssueType::TypeMismatch,
                format!("{}/componentType", path),
                format!("A 'componentType' is not allowed for type {}", property_type),
            );
            result = false;
            None
        }
        (false, None) => None,
    };

    if property_type == PropertyType::Enum {
        match &property.enum_type {
            None => {
                context.report(IssueType::PropertyMissing, path, "The 'enumType' is required for type ENUM");
                result = false;
            }
            Some(enum_type) if !schema.enums.contains_key(enum_type) => {
                context.report(
                    IssueType::IdentifierNotFound,
                    format!("{}/enumType", path),
                    format!("The enum type '{}' is not defined in the schema", enum_type),
                );
                result = false;
            }
            Some(_) => {}
        }
    } else if property.enum_type.is_some() {
        context.report(
            IssueType::TypeMismatch,
            format!("{}/enumType", path),
            format!("An 'enumType' is not allowed for type {}", property_type),
        );
        result = false;
    }

    if let Some(count) = property.count {
        if !property.array {
            context.report(
                IssueType::TypeMismatch,
                format!("{}/count", path),
                "A 'count' is only allowed for arrays",
            );
            result = false;
        } else if count < 2 {
            context.report(
                IssueType::ValueNotInRange,
                format!("{}/count", path),
                format!("The array count must be at least 2, but is {}", count),
            );
            result = false;
        }
    }

    let is_integer = component_type.is_some_and(ComponentType::is_integer);
    if property.normalized && !is_integer {
        context.report(
            IssueType::TypeMismatch,
            format!("{}/normalized", path),
            "Only properties with an integer component type can be normalized",
        );
        result = false;
    }

    if property.semantic.as_deref() == Some("TILE_GEOMETRIC_ERROR")
        && (property_type != PropertyType::Scalar || property.array || component_type.is_none())
    {
        context.report(
            IssueType::MetadataSemanticInvalid,
            format!("{}/semantic", path),
            "The semantic TILE_GEOMETRIC_ERROR requires a numeric SCALAR property that is not an array",
        );
        result = false;
    }

    let transformable = component_type.is_some() && (!is_integer || property.normalized);
    let fixed_count = property.fixed_count();
    for (name, value, allowed) in [
        ("offset", &property.offset, transformable),
        ("scale", &property.scale, transformable),
        ("min", &property.min, component_type.is_some()),
        ("max", &property.max, component_type.is_some()),
    ] {
        let Some(value) = value else {
            continue;
        };
        let value_path = format!("{}/{}", path, name);
        if !allowed {
            context.report(
                IssueType::TypeMismatch,
                &value_path,
                format!("The '{}' is not applicable for this property", name),
            );
            result = false;
        } else if !has_numeric_shape(value, property_type.component_count(), property.array, fixed_count) {
            context.report(
                IssueType::TypeMismatch,
                &value_path,
                format!("The '{}' does not have the structure of a {} value", name, property_type),
            );
            result = false;
        }
    }
    result
}

/// Whether `value` is a number, an array of `components` numbers, or
/// (for arrays) an array of those.
fn has_numeric_shape(value: &Value, components: usize, array: bool, count: Option<usize>) -> bool {
    let element = |v: &Value| match (components, v) {
        (1, v) => v.is_number(),
        (n, Value::Array(a)) => a.len() == n && a.iter().all(Value::is_number),
        _ => false,
    };
    if !array {
        return element(value);
    }
    match value {
        Value::Array(elements) => count.map_or(true, |c| elements.len() == c) && elements.iter().all(element),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryResourceResolver;
    use crate::validation::ValidationOptions;
    use serde_json::json;
    use std::sync::Arc;

    fn validate(schema: Value) -> Vec<(IssueType, String)> {
        let mut context =
            ValidationContext::new(Arc::new(MemoryResourceResolver::new()), ValidationOptions::default());
        let schema: Schema = serde_json::from_value(schema).unwrap();
        let valid = SchemaValidator::validate_schema("/schema", &schema, &mut context);
        assert_eq!(valid, context.num_issues() == 0);
        context.issues().iter().map(|i| (i.issue_type, i.path.clone())).collect()
    }

    #[test]
    fn test_valid_schema() {
        let issues = validate(json!({
            "id": "s",
            "enums": { "kind": { "values": [{ "name": "A", "value": 0 }, { "name": "B", "value": 1 }] } },
            "classes": { "c": { "properties": {
                "h": { "type": "SCALAR", "componentType": "UINT8", "normalized": true, "offset": 1, "scale": 2, "max": 3 },
                "p": { "type": "VEC3", "componentType": "FLOAT32", "array": true, "count": 2, "min": [[0, 0, 0], [1, 1, 1]] },
                "k": { "type": "ENUM", "enumType": "kind" },
                "s": { "type": "STRING", "required": true }
            } } }
        }));
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[test]
    fn test_invalid_properties() {
        let issues = validate(json!({
            "id": "s",
            "classes": { "c": { "properties": {
                "a": { "type": "VEC5" },
                "b": { "type": "SCALAR" },
                "c": { "type": "ENUM", "enumType": "missing" },
                "d": { "type": "SCALAR", "componentType": "INT32", "normalized": false, "offset": 1 },
                "e": { "type": "VEC2", "componentType": "FLOAT32", "min": 1 },
                "f": { "type": "SCALAR", "componentType": "FLOAT32", "array": true, "count": 1 }
            } } }
        }));
        assert_eq!(
            issues,
            vec![
                (IssueType::ValueNotInList, "/schema/classes/c/properties/a/type".to_string()),
                (IssueType::PropertyMissing, "/schema/classes/c/properties/b".to_string()),
                (IssueType::IdentifierNotFound, "/schema/classes/c/properties/c/enumType".to_string()),
                (IssueType::TypeMismatch, "/schema/classes/c/properties/d/offset".to_string()),
                (IssueType::TypeMismatch, "/schema/classes/c/properties/e/min".to_string()),
                (IssueType::ValueNotInRange, "/schema/classes/c/properties/f/count".to_string()),
            ]
        );
    }

    #[test]
    fn test_duplicate_enum_values() {
        let issues = validate(json!({
            "enums": { "kind": { "valueType": "FLOAT32", "values": [{ "name": "A", "value": 0 }, { "name": "A", "value": 0 }] } }
        }));
        assert_eq!(
            issues,
            vec![
                (IssueType::ValueNotInList, "/schema/enums/kind/valueType".to_string()),
                (IssueType::ValueNotInList, "/schema/enums/kind/values/1/name".to_string()),
                (IssueType::ValueNotInList, "/schema/enums/kind/values/1/value".to_string()),
            ]
        );
    }

    #[test]
    fn test_geometric_error_semantic() {
        let issues = validate(json!({
            "classes": { "tile": { "properties": {
                "ok": { "type": "SCALAR", "componentType": "FLOAT64", "semantic": "TILE_GEOMETRIC_ERROR" },
                "bad": { "type": "VEC2", "componentType": "FLOAT64", "semantic": "TILE_GEOMETRIC_ERROR" }
            } } }
        }));
        assert_eq!(
            issues,
            vec![(IssueType::MetadataSemanticInvalid, "/schema/classes/tile/properties/bad/semantic".to_string())]
        );
    }
}

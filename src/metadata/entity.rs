//! Validation of metadata entities that are given as JSON: the metadata
//! of tilesets, groups, tiles and contents.

use std::collections::BTreeMap;

use serde_json::Value;

use super::property::{PropertyDescriptor, PropertyOverrides};
use crate::structure::{ClassProperty, MetadataEntity, PropertyType, Schema};
use crate::util::{any_deep_greater_than, any_deep_less_than, MetadataValue};
use crate::validation::{IssueType, ValidationContext};

/// Validate a metadata entity against the schema.
///
/// The class must exist and declare every property of the entity,
/// values must have the shape of their class property, enum names must
/// exist, numeric values must respect the class `min` and `max`, and
/// required properties must be present.
pub fn validate_metadata_entity(
    path: &str,
    entity: &MetadataEntity,
    schema: &Schema,
    context: &mut ValidationContext,
) -> bool {
    let Some(metadata_class) = schema.classes.get(&entity.class) else {
        context.report(
            IssueType::IdentifierNotFound,
            format!("{}/class", path),
            format!("The class '{}' was not found in the schema", entity.class),
        );
        return false;
    };

    let mut result = true;
    let empty = BTreeMap::new();
    let properties = entity.properties.as_ref().unwrap_or(&empty);

    for (name, class_property) in &metadata_class.properties {
        if class_property.required && !properties.contains_key(name) {
            context.report(
                IssueType::MetadataValueRequiredButMissing,
                format!("{}/properties", path),
                format!(
                    "The property '{}' of class '{}' is required, but not present",
                    name, entity.class
                ),
            );
            result = false;
        }
    }

    for (name, value) in properties {
        let property_path = format!("{}/properties/{}", path, name);
        let Some(class_property) = metadata_class.properties.get(name) else {
            context.report(
                IssueType::IdentifierNotFound,
                &property_path,
                format!("The class '{}' does not define a property '{}'", entity.class, name),
            );
            result = false;
            continue;
        };
        if !validate_entity_property(&property_path, name, value, class_property, schema, context) {
            result = false;
        }
    }
    result
}

fn validate_entity_property(
    path: &str,
    name: &str,
    value: &Value,
    class_property: &ClassProperty,
    schema: &Schema,
    context: &mut ValidationContext,
) -> bool {
    let descriptor = match PropertyDescriptor::from_class_property(
        schema,
        name,
        class_property,
        PropertyOverrides::default(),
    ) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            context.report(IssueType::IdentifierNotFound, path, e.to_string());
            return false;
        }
    };

    if class_property.array {
        let Some(items) = value.as_array() else {
            context.report(
                IssueType::TypeMismatch,
                path,
                format!("The value of array property '{}' must be an array, but is {}", name, value),
            );
            return false;
        };
        if let Some(count) = class_property.fixed_count() {
            if items.len() != count {
                context.report(
                    IssueType::ArrayLengthMismatch,
                    path,
                    format!(
                        "The value of property '{}' must have {} elements, but has {}",
                        name,
                        count,
                        items.len()
                    ),
                );
                return false;
            }
        }
        let mut result = true;
        for (i, item) in items.iter().enumerate() {
            if !validate_element(&format!("{}/{}", path, i), &descriptor, item, context) {
                result = false;
            }
        }
        if !result {
            return false;
        }
    } else if !validate_element(path, &descriptor, value, context) {
        return false;
    }

    if descriptor.property_type.is_numeric() {
        return validate_entity_bounds(path, &descriptor, value, context);
    }
    true
}

/// Check the shape of one (non-array) element.
fn validate_element(
    path: &str,
    descriptor: &PropertyDescriptor,
    value: &Value,
    context: &mut ValidationContext,
) -> bool {
    let property_type = descriptor.property_type;
    let valid = match property_type {
        PropertyType::Scalar => value.is_number(),
        PropertyType::String => value.is_string(),
        PropertyType::Boolean => value.is_boolean(),
        PropertyType::Enum => value.is_string(),
        _ => value
            .as_array()
            .is_some_and(|c| c.len() == property_type.component_count() && c.iter().all(Value::is_number)),
    };
    if !valid {
        context.report(
            IssueType::TypeMismatch,
            path,
            format!(
                "The value of property '{}' must be of type {}, but is {}",
                descriptor.name, property_type, value
            ),
        );
        return false;
    }
    if let (Some(names), Some(name)) = (&descriptor.enum_names, value.as_str()) {
        if !names.values().any(|n| n == name) {
            let mut valid_names: Vec<&str> = names.values().map(String::as_str).collect();
            valid_names.sort_unstable();
            context.report(
                IssueType::ValueNotInList,
                path,
                format!(
                    "The value of property '{}' must be one of [{}], but is '{}'",
                    descriptor.name,
                    valid_names.join(", "),
                    name
                ),
            );
            return false;
        }
    }
    true
}

fn validate_entity_bounds(
    path: &str,
    descriptor: &PropertyDescriptor,
    value: &Value,
    context: &mut ValidationContext,
) -> bool {
    let Some(raw) = MetadataValue::from_json(value) else {
        return true;
    };
    let processed = match descriptor.process(raw) {
        Ok(processed) => processed,
        Err(e) => {
            context.report(IssueType::InternalError, path, e.to_string());
            return false;
        }
    };
    let class_property = &descriptor.class_property;
    let mut result = true;
    if let Some(min) = class_property.min.as_ref().and_then(MetadataValue::from_json) {
        if any_deep_less_than(&processed, &min) {
            context.report(
                IssueType::MetadataValueNotInRange,
                path,
                format!(
                    "The value of property '{}' is {}, which is smaller than the minimum {}",
                    descriptor.name, processed, min
                ),
            );
            result = false;
        }
    }
    if let Some(max) = class_property.max.as_ref().and_then(MetadataValue::from_json) {
        if any_deep_greater_than(&processed, &max) {
            context.report(
                IssueType::MetadataValueNotInRange,
                path,
                format!(
                    "The value of property '{}' is {}, which is greater than the maximum {}",
                    descriptor.name, processed, max
                ),
            );
            result = false;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryResourceResolver;
    use crate::validation::ValidationOptions;
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> ValidationContext {
        ValidationContext::new(Arc::new(MemoryResourceResolver::new()), ValidationOptions::default())
    }

    fn schema() -> Schema {
        serde_json::from_value(json!({
            "classes": {
                "building": {
                    "properties": {
                        "height": { "type": "SCALAR", "componentType": "FLOAT32", "min": 0, "max": 100 },
                        "name": { "type": "STRING", "required": true },
                        "kind": { "type": "ENUM", "enumType": "Kind" },
                        "corners": { "type": "VEC2", "componentType": "FLOAT32", "array": true, "count": 2 }
                    }
                }
            },
            "enums": { "Kind": { "values": [ { "name": "HOUSE", "value": 0 } ] } }
        }))
        .unwrap()
    }

    fn entity(value: serde_json::Value) -> MetadataEntity {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_valid_entity() {
        let mut context = context();
        let e = entity(json!({
            "class": "building",
            "properties": { "height": 12.5, "name": "a", "kind": "HOUSE", "corners": [[0, 0], [1, 1]] }
        }));
        assert!(validate_metadata_entity("/metadata", &e, &schema(), &mut context));
        assert_eq!(context.num_issues(), 0);
    }

    #[test]
    fn test_unknown_class_and_property() {
        let mut context = context();
        let e = entity(json!({ "class": "nope" }));
        assert!(!validate_metadata_entity("/metadata", &e, &schema(), &mut context));
        assert_eq!(context.issues()[0].path, "/metadata/class");

        let mut context = self::context();
        let e = entity(json!({ "class": "building", "properties": { "name": "a", "color": 1 } }));
        assert!(!validate_metadata_entity("/metadata", &e, &schema(), &mut context));
        assert_eq!(context.issues()[0].issue_type, IssueType::IdentifierNotFound);
        assert_eq!(context.issues()[0].path, "/metadata/properties/color");
    }

    #[test]
    fn test_value_problems() {
        let mut context = context();
        let e = entity(json!({
            "class": "building",
            "properties": { "height": 120, "kind": "CASTLE", "corners": [[0, 0]] }
        }));
        assert!(!validate_metadata_entity("/m", &e, &schema(), &mut context));
        let types: Vec<_> = context.issues().iter().map(|i| i.issue_type).collect();
        assert_eq!(
            types,
            vec![
                IssueType::MetadataValueRequiredButMissing,
                IssueType::ArrayLengthMismatch,
                IssueType::MetadataValueNotInRange,
                IssueType::ValueNotInList,
            ]
        );
    }
}

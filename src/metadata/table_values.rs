//! Validation of all values of a binary property table.

use super::model::MetadataPropertyModel;
use super::table::BinaryPropertyTable;
use super::values_validator::MetadataValuesValidator;
use crate::validation::{IssueType, ValidationContext};

/// Validate a property table and the values that it stores.
///
/// The class must exist and declare every property of the table, and
/// required properties must be present. Each property is first read
/// completely to make sure that its buffer views are large enough and
/// its offsets are consistent; only then its values are checked with
/// the [`MetadataValuesValidator`], with the keys `0..count`.
///
/// Issues are reported at `{path}/properties/{name}`.
pub fn validate_property_table_values(
    path: &str,
    table: &BinaryPropertyTable<'_>,
    context: &mut ValidationContext,
) -> bool {
    let property_table = table.property_table;
    let Some(metadata_class) = table.schema.classes.get(&property_table.class) else {
        context.report(
            IssueType::IdentifierNotFound,
            format!("{}/class", path),
            format!("The class '{}' was not found in the schema", property_table.class),
        );
        return false;
    };

    let mut result = true;
    for (name, class_property) in &metadata_class.properties {
        if class_property.required && !property_table.properties.contains_key(name) {
            context.report(
                IssueType::MetadataValueRequiredButMissing,
                format!("{}/properties", path),
                format!(
                    "The property '{}' of class '{}' is required, but the property table does not contain it",
                    name, property_table.class
                ),
            );
            result = false;
        }
    }

    for name in property_table.properties.keys() {
        let property_path = format!("{}/properties/{}", path, name);
        if !metadata_class.properties.contains_key(name) {
            context.report(
                IssueType::IdentifierNotFound,
                &property_path,
                format!(
                    "The class '{}' does not define a property '{}'",
                    property_table.class, name
                ),
            );
            result = false;
            continue;
        }
        let model = match table.property_model(name) {
            Ok(model) => model,
            Err(e) => {
                context.report(IssueType::BinaryInvalid, &property_path, e.to_string());
                result = false;
                continue;
            }
        };
        let broken = (0..table.count()).find_map(|row| model.raw_property_value(row).err().map(|e| (row, e)));
        if let Some((row, e)) = broken {
            context.report(
                IssueType::BinaryInvalid,
                &property_path,
                format!("The data of property '{}' at index {} is invalid: {}", name, row, e),
            );
            result = false;
            continue;
        }
        let validator = MetadataValuesValidator::new(&model, || 0..table.count());
        match validator.validate_property_values(&property_path, context) {
            Ok(true) => {}
            Ok(false) => result = false,
            Err(e) => {
                context.report(IssueType::InternalError, &property_path, e.to_string());
                result = false;
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryResourceResolver;
    use crate::structure::{PropertyTable, Schema};
    use crate::validation::ValidationOptions;
    use serde_json::json;
    use std::sync::Arc;

    fn context() -> ValidationContext {
        ValidationContext::new(Arc::new(MemoryResourceResolver::new()), ValidationOptions::default())
    }

    fn schema() -> Schema {
        serde_json::from_value(json!({
            "classes": {
                "c": {
                    "properties": {
                        "a": { "type": "SCALAR", "componentType": "UINT16", "max": 10 },
                        "b": { "type": "STRING", "required": true }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_truncated_buffer_is_reported_once() {
        let schema = schema();
        let table: PropertyTable = serde_json::from_value(json!({
            "class": "c",
            "count": 3,
            "properties": { "a": { "values": 0 } }
        }))
        .unwrap();
        let views = vec![vec![1, 0, 2, 0]];
        let mut context = context();
        let binary = BinaryPropertyTable::new(&table, &schema, &views);
        assert!(!validate_property_table_values("/propertyTables/0", &binary, &mut context));
        let types: Vec<_> = context.issues().iter().map(|i| i.issue_type).collect();
        assert_eq!(types, vec![IssueType::MetadataValueRequiredButMissing, IssueType::BinaryInvalid]);
        assert_eq!(context.issues()[1].path, "/propertyTables/0/properties/a");
    }

    #[test]
    fn test_values_are_validated() {
        let schema = schema();
        let table: PropertyTable = serde_json::from_value(json!({
            "class": "c",
            "count": 2,
            "properties": {
                "a": { "values": 0 },
                "b": { "values": 1, "stringOffsets": 2 }
            }
        }))
        .unwrap();
        let offsets: Vec<u8> = [0u32, 1, 2].iter().flat_map(|o| o.to_le_bytes()).collect();
        let views = vec![vec![1, 0, 20, 0], b"xy".to_vec(), offsets];
        let mut context = context();
        let binary = BinaryPropertyTable::new(&table, &schema, &views);
        assert!(!validate_property_table_values("", &binary, &mut context));
        assert_eq!(context.num_issues(), 1);
        assert_eq!(context.issues()[0].issue_type, IssueType::MetadataValueNotInRange);
    }

    #[test]
    fn test_huge_array_count_is_reported() {
        let schema: Schema = serde_json::from_value(json!({
            "classes": { "c": { "properties": {
                "v": { "type": "VEC4", "componentType": "UINT8", "array": true, "count": 4611686018427387904u64 }
            } } }
        }))
        .unwrap();
        let table: PropertyTable =
            serde_json::from_value(json!({ "class": "c", "count": 1, "properties": { "v": { "values": 0 } } }))
                .unwrap();
        let views = vec![vec![0u8; 4]];
        let mut context = context();
        let binary = BinaryPropertyTable::new(&table, &schema, &views);
        assert!(!validate_property_table_values("/t", &binary, &mut context));
        assert_eq!(context.num_issues(), 1);
        assert_eq!(context.issues()[0].issue_type, IssueType::BinaryInvalid);
        assert_eq!(context.issues()[0].path, "/t/properties/v");
    }

    #[test]
    fn test_unknown_class() {
        let schema = schema();
        let table: PropertyTable = serde_json::from_value(json!({ "class": "x", "count": 1 })).unwrap();
        let mut context = context();
        let binary = BinaryPropertyTable::new(&table, &schema, &[]);
        assert!(!validate_property_table_values("/t", &binary, &mut context));
        assert_eq!(context.issues()[0].path, "/t/class");
    }
}

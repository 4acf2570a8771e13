//! Validation of the `statistics` of a tileset.

use serde_json::Value;

use super::context::ValidationContext;
use super::issues::IssueType;
use super::state::ValidationState;
use crate::structure::{Schema, Statistics};

/// Checks that statistics only refer to classes and properties of the
/// schema.
pub struct StatisticsValidator;

impl StatisticsValidator {
    pub fn validate_statistics(
        path: &str,
        statistics: &Statistics,
        state: &ValidationState<'_>,
        context: &mut ValidationContext,
    ) -> bool {
        let Some(classes) = &statistics.classes else {
            return true;
        };
        let classes_path = format!("{}/classes", path);
        let mut result = true;
        if classes.is_empty() {
            context.report(
                IssueType::ArrayLengthMismatch,
                &classes_path,
                "The 'classes' must define at least one class",
            );
            result = false;
        }
        if !state.has_schema_definition {
            context.report(
                IssueType::PropertyMissing,
                &classes_path,
                "The tileset defines 'statistics.classes' but does not have a schema",
            );
            return false;
        }
        if let Some(schema) = state.validated_schema {
            for (class_name, statistics_class) in classes {
                let class_path = format!("{}/{}", classes_path, class_name);
                result &= validate_statistics_class(&class_path, class_name, statistics_class, schema, context);
            }
        }
        result
    }
}

fn validate_statistics_class(
    path: &str,
    class_name: &str,
    statistics_class: &Value,
    schema: &Schema,
    context: &mut ValidationContext,
) -> bool {
    let Some(statistics_class) = statistics_class.as_object() else {
        context.report(IssueType::TypeMismatch, path, format!("The class '{}' must be an object", class_name));
        return false;
    };
    let Some(schema_class) = schema.classes.get(class_name) else {
        context.report(
            IssueType::IdentifierNotFound,
            path,
            format!(
                "Statistics contain a class name {}, but the schema does not define this class",
                class_name
            ),
        );
        return false;
    };
    let mut result = true;
    let properties = statistics_class.get("properties").and_then(Value::as_object);
    for property_name in properties.into_iter().flat_map(|p| p.keys()) {
        if !schema_class.properties.contains_key(property_name) {
            context.report(
                IssueType::IdentifierNotFound,
                format!("{}/properties/{}", path, property_name),
                format!(
                    "Statistics class '{}' contains a property name '{}', but the schema class does not define this property",
                    class_name, property_name
                ),
            );
            result = false;
        }
    }
    result
}

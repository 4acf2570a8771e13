//! Validation of `extensions` objects.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::context::ValidationContext;
use super::issues::IssueType;

/// Validates the object of one extension.
pub trait ExtensionValidator {
    fn validate_extension(&self, path: &str, extension: &Value, context: &mut ValidationContext) -> bool;
}

impl<F> ExtensionValidator for F
where
    F: Fn(&str, &Value, &mut ValidationContext) -> bool,
{
    fn validate_extension(&self, path: &str, extension: &Value, context: &mut ValidationContext) -> bool {
        self(path, extension, context)
    }
}

struct Registration {
    validator: Box<dyn ExtensionValidator>,
    perform_default_validation: bool,
}

/// The outcome of validating the extensions of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionsValidationResult {
    pub all_valid: bool,
    /// `false` when an extension replaces the validation of the object
    pub perform_default_validation: bool,
}

/// A registry of extension validators.
///
/// Every extension name that is encountered is recorded in the
/// context, so that it can later be compared with `extensionsUsed`.
/// Extensions without a registered validator are reported as not
/// supported.
#[derive(Default)]
pub struct ExtensionsValidator {
    validators: BTreeMap<String, Registration>,
}

impl ExtensionsValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the validators that this crate provides.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("3DTILES_content_gltf", validate_content_gltf, true);
        registry
    }

    /// Register a validator. When `perform_default_validation` is
    /// `false`, objects with this extension skip their default checks.
    pub fn register(
        &mut self,
        name: &str,
        validator: impl ExtensionValidator + 'static,
        perform_default_validation: bool,
    ) {
        self.validators.insert(
            name.to_string(),
            Registration {
                validator: Box::new(validator),
                perform_default_validation,
            },
        );
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    /// Validate the `extensions` of an object at `path`.
    pub fn validate_extensions(
        &self,
        path: &str,
        extensions: Option<&Map<String, Value>>,
        context: &mut ValidationContext,
    ) -> ExtensionsValidationResult {
        let mut result = ExtensionsValidationResult {
            all_valid: true,
            perform_default_validation: true,
        };
        let Some(extensions) = extensions else {
            return result;
        };
        for (name, extension) in extensions {
            context.add_extension_found(name);
            let extension_path = format!("{}/extensions/{}", path, name);
            match self.validators.get(name) {
                None => context.report(
                    IssueType::ExtensionNotSupported,
                    &extension_path,
                    format!("The extension '{}' was found, but is not supported", name),
                ),
                Some(registration) => {
                    if !registration.validator.validate_extension(&extension_path, extension, context) {
                        result.all_valid = false;
                    }
                    if !registration.perform_default_validation {
                        result.perform_default_validation = false;
                    }
                }
            }
        }
        result
    }
}

/// `3DTILES_content_gltf`: the glTF extensions that contents use.
fn validate_content_gltf(path: &str, extension: &Value, context: &mut ValidationContext) -> bool {
    let mut result = true;
    for key in ["extensionsUsed", "extensionsRequired"] {
        let Some(value) = extension.get(key) else {
            continue;
        };
        let valid = value
            .as_array()
            .is_some_and(|a| !a.is_empty() && a.iter().all(Value::is_string));
        if !valid {
            context.report(
                IssueType::TypeMismatch,
                format!("{}/{}", path, key),
                format!("The '{}' must be a non-empty array of strings", key),
            );
            result = false;
        }
    }
    result
}

//! Validation of tile contents and of the data that they refer to.

use std::collections::HashMap;
use std::rc::Rc;

use super::context::ValidationContext;
use super::extensions::ExtensionsValidator;
use super::formats::{
    B3dmValidator, CmptValidator, ExternalTilesetValidator, GltfContentValidator, I3dmValidator, PntsValidator,
};
use super::issues::{IssueType, ValidationIssue};
use super::state::ValidationState;
use super::tile::{validate_bounding_volume, validate_metadata};
use crate::io::{ContentType, ResourceTypes};
use crate::structure::{Content, Tile};

/// Validates the data of one content type.
///
/// The context is scoped to the directory of the content, so that
/// relative URIs in the data resolve correctly.
pub trait ContentDataValidator {
    fn validate_content_data(&self, uri: &str, data: &[u8], context: &mut ValidationContext) -> bool;
}

/// Maps content types to the validators for their data.
#[derive(Default)]
pub struct ContentDataValidators {
    validators: HashMap<ContentType, Rc<dyn ContentDataValidator>>,
}

impl ContentDataValidators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validators for all content types that this crate understands.
    pub fn with_defaults() -> Self {
        let mut validators = Self::new();
        validators.register(ContentType::Glb, GltfContentValidator);
        validators.register(ContentType::Gltf, GltfContentValidator);
        validators.register(ContentType::B3dm, B3dmValidator);
        validators.register(ContentType::I3dm, I3dmValidator);
        validators.register(ContentType::Pnts, PntsValidator);
        validators.register(ContentType::Cmpt, CmptValidator);
        validators.register(ContentType::Tileset, ExternalTilesetValidator);
        validators
    }

    pub fn register(&mut self, content_type: ContentType, validator: impl ContentDataValidator + 'static) {
        self.validators.insert(content_type, Rc::new(validator));
    }

    pub fn get(&self, content_type: ContentType) -> Option<&Rc<dyn ContentDataValidator>> {
        self.validators.get(&content_type)
    }
}

/// Validates one content of a tile.
pub trait TileContentValidator {
    fn validate_tile_content(
        &self,
        path: &str,
        content: &Content,
        tile: &Tile,
        state: &ValidationState<'_>,
        context: &mut ValidationContext,
    ) -> bool;
}

/// Checks the content object, then resolves and validates its data.
pub struct BasicTileContentValidator {
    extensions: Rc<ExtensionsValidator>,
    data_validators: Rc<ContentDataValidators>,
}

impl BasicTileContentValidator {
    pub fn new(extensions: Rc<ExtensionsValidator>, data_validators: Rc<ContentDataValidators>) -> Self {
        Self {
            extensions,
            data_validators,
        }
    }

    fn validate_data(&self, path: &str, uri: &str, context: &mut ValidationContext) -> bool {
        let data = match context.resource_resolver().resolve(uri) {
            Ok(Some(data)) => data,
            Ok(None) => {
                context.report(IssueType::IoError, path, format!("Content {} could not be resolved", uri));
                return false;
            }
            Err(e) => {
                context.report(IssueType::IoError, path, format!("Content {} could not be read: {}", uri, e));
                return false;
            }
        };

        let content_type = ResourceTypes::content_type(uri, &data);
        tracing::debug!("Content {} has type {}", uri, content_type.name());
        if !context.options().includes_content_type(content_type) {
            context.report(
                IssueType::ContentValidationSkipped,
                path,
                format!("Content {} of type {} was excluded by the options", uri, content_type.name()),
            );
            return true;
        }
        let Some(validator) = self.data_validators.get(content_type) else {
            let message = match content_type {
                ContentType::Unknown => format!("The type of content {} could not be determined", uri),
                _ => format!("Content {} of type {} is not validated", uri, content_type.name()),
            };
            context.report(IssueType::ContentValidationSkipped, path, message);
            return true;
        };

        let mut derived = context.derive_for_document(uri);
        let valid = validator.validate_content_data(uri, &data, &mut derived);
        let has_errors = !valid || derived.has_errors_since(0);
        let causes = derived.into_issues();
        if has_errors {
            context.add_issue(
                ValidationIssue::new(
                    IssueType::ContentValidationError,
                    path,
                    format!("Content {} caused validation errors", uri),
                )
                .with_causes(causes),
            );
            false
        } else {
            if !causes.is_empty() {
                context.add_issue(
                    ValidationIssue::new(
                        IssueType::ContentValidationWarning,
                        path,
                        format!("Content {} caused validation warnings", uri),
                    )
                    .with_causes(causes),
                );
            }
            true
        }
    }
}

impl Default for BasicTileContentValidator {
    fn default() -> Self {
        Self::new(
            Rc::new(ExtensionsValidator::with_defaults()),
            Rc::new(ContentDataValidators::with_defaults()),
        )
    }
}

impl TileContentValidator for BasicTileContentValidator {
    fn validate_tile_content(
        &self,
        path: &str,
        content: &Content,
        tile: &Tile,
        state: &ValidationState<'_>,
        context: &mut ValidationContext,
    ) -> bool {
        let extensions = self.extensions.validate_extensions(path, content.extensions.as_ref(), context);
        if !extensions.perform_default_validation {
            return extensions.all_valid;
        }
        let mut result = extensions.all_valid;

        if let Some(volume) = &content.bounding_volume {
            result &= validate_bounding_volume(&format!("{}/boundingVolume", path), volume, context);
        }
        if let Some(metadata) = &content.metadata {
            result &= validate_metadata(&format!("{}/metadata", path), metadata, state, context);
        }
        if let Some(group) = content.group {
            let group_path = format!("{}/group", path);
            if !state.has_groups_definition {
                context.report(
                    IssueType::PropertyMissing,
                    &group_path,
                    "The content refers to a group, but the tileset does not define groups",
                );
                result = false;
            } else if let Some(count) = state.validated_groups {
                if group < 0 || group as usize >= count {
                    context.report(
                        IssueType::ValueNotInRange,
                        &group_path,
                        format!("The group index must be in [0, {}), but is {}", count, group),
                    );
                    result = false;
                }
            }
        }

        let Some(uri) = &content.uri else {
            context.report(IssueType::PropertyMissing, path, "The 'uri' property is required");
            return false;
        };
        // Template URIs of implicit roots are not resources
        if tile.implicit_tiling.is_some() || !context.options().validate_content_data {
            return result;
        }
        if !self.validate_data(path, uri, context) {
            result = false;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gltf::encode_glb;
    use crate::validation::Severity;
    use crate::io::{MemoryResourceResolver, ResourceResolver};
    use crate::validation::ValidationOptions;
    use serde_json::json;
    use std::sync::Arc;

    fn validate(
        resolver: MemoryResourceResolver,
        options: ValidationOptions,
        content: serde_json::Value,
    ) -> (bool, Vec<ValidationIssue>) {
        let resolver: Arc<dyn ResourceResolver> = Arc::new(resolver);
        let mut context = ValidationContext::new(resolver, options);
        let content: Content = serde_json::from_value(content).unwrap();
        let state = ValidationState {
            has_groups_definition: true,
            validated_groups: Some(1),
            ..Default::default()
        };
        let valid = BasicTileContentValidator::default().validate_tile_content(
            "/root/content",
            &content,
            &Tile::default(),
            &state,
            &mut context,
        );
        (valid, context.into_issues())
    }

    #[test]
    fn test_missing_content() {
        let (valid, issues) = validate(MemoryResourceResolver::new(), Default::default(), json!({ "uri": "a.glb" }));
        assert!(!valid);
        assert_eq!(issues[0].issue_type, IssueType::IoError);
    }

    #[test]
    fn test_group_out_of_range() {
        let options = ValidationOptions { validate_content_data: false, ..Default::default() };
        let (valid, issues) = validate(MemoryResourceResolver::new(), options, json!({ "uri": "a.glb", "group": 1 }));
        assert!(!valid);
        assert_eq!(issues[0].issue_type, IssueType::ValueNotInRange);
        assert_eq!(issues[0].path, "/root/content/group");
    }

    #[test]
    fn test_invalid_glb() {
        let resolver = MemoryResourceResolver::new().with("data/a.glb", b"glTF\x02\0\0\0\x0c\0\0\0".to_vec());
        let (valid, issues) = validate(resolver, Default::default(), json!({ "uri": "data/a.glb" }));
        assert!(!valid);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issue_type, IssueType::ContentValidationError);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[0].causes[0].issue_type, IssueType::BinaryInvalid);
    }

    #[test]
    fn test_valid_glb() {
        let glb = encode_glb(br#"{"asset":{"version":"2.0"}}"#, &[]);
        let resolver = MemoryResourceResolver::new().with("a.glb", glb);
        let (valid, issues) = validate(resolver, Default::default(), json!({ "uri": "a.glb" }));
        assert!(valid);
        assert!(issues.is_empty());
    }

    #[test]
    fn test_skipped_content() {
        let resolver = MemoryResourceResolver::new().with("a.b3dm", b"b3dm".to_vec());
        let options = ValidationOptions {
            validated_content_types: Some(vec!["GLB".into()]),
            ..Default::default()
        };
        let (valid, issues) = validate(resolver, options, json!({ "uri": "a.b3dm" }));
        assert!(valid);
        assert_eq!(issues[0].issue_type, IssueType::ContentValidationSkipped);
        assert_eq!(issues[0].severity, Severity::Info);
    }
}

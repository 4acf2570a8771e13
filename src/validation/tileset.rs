//! Validation of complete tilesets.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use super::content::{BasicTileContentValidator, ContentDataValidators};
use super::context::ValidationContext;
use super::extensions::ExtensionsValidator;
use super::issues::{IssueType, ValidationResult};
use super::options::ValidationOptions;
use super::schema::SchemaValidator;
use super::state::ValidationState;
use super::statistics::StatisticsValidator;
use super::tile::{validate_metadata, BasicTileValidator};
use super::traversing::TilesetTraversingValidator;
use crate::io::{FileResourceResolver, ResourceResolver, UnzippingResourceResolver};
use crate::metadata::validate_metadata_entity;
use crate::structure::{Asset, Schema, Tileset};
use crate::util::{Error, Result};

/// Versions of the tileset format that are known.
pub const KNOWN_ASSET_VERSIONS: [&str; 2] = ["1.0", "1.1"];

/// Validates tileset JSON: the top-level properties, the schema, and
/// (through a [`TilesetTraversingValidator`]) all tiles and contents.
pub struct TilesetValidator {
    extensions: Rc<ExtensionsValidator>,
    traversing: TilesetTraversingValidator,
}

impl Default for TilesetValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl TilesetValidator {
    /// A validator with the default tile, content and extension checks.
    pub fn new() -> Self {
        let extensions = Rc::new(ExtensionsValidator::with_defaults());
        let content = BasicTileContentValidator::new(
            Rc::clone(&extensions),
            Rc::new(ContentDataValidators::with_defaults()),
        );
        let traversing = TilesetTraversingValidator::new(
            Rc::new(BasicTileValidator::new(Rc::clone(&extensions))),
            Rc::new(content),
        );
        Self::with_validators(extensions, traversing)
    }

    pub fn with_validators(extensions: Rc<ExtensionsValidator>, traversing: TilesetTraversingValidator) -> Self {
        Self { extensions, traversing }
    }

    /// Validate a tileset file. Resources are resolved relative to the
    /// directory of the file, gzipped resources are inflated.
    pub fn validate_file(path: impl AsRef<Path>, options: ValidationOptions) -> Result<ValidationResult> {
        let path = path.as_ref();
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::invalid(format!("Invalid tileset path {}", path.display())))?;
        let resolver: Arc<dyn ResourceResolver> =
            Arc::new(UnzippingResourceResolver::new(Arc::new(FileResourceResolver::new(directory))));
        let data = resolver
            .resolve(file_name)?
            .ok_or_else(|| Error::ResourceNotFound(path.display().to_string()))?;
        tracing::info!("Validating tileset {}", path.display());

        let mut context = ValidationContext::new(resolver, options).with_document_uri(file_name);
        Self::new().validate_json(&data, &mut context);
        Ok(context.into_result())
    }

    /// Parse and validate tileset JSON. Returns whether no error was
    /// recorded for it.
    pub fn validate_json(&self, data: &[u8], context: &mut ValidationContext) -> bool {
        let first_issue = context.num_issues();
        if !context.enter_tileset() {
            context.report(
                IssueType::ExternalTilesetCycle,
                "",
                format!("The tileset {} refers to itself through external tilesets", context.document_uri()),
            );
            return false;
        }
        let result = match Tileset::from_slice(data) {
            Ok(tileset) => self.validate_tileset(&tileset, context),
            Err(e) => {
                context.report(IssueType::JsonParseError, "", e.to_string());
                false
            }
        };
        context.leave_tileset();
        result && !context.has_errors_since(first_issue)
    }

    pub fn validate_tileset(&self, tileset: &Tileset, context: &mut ValidationContext) -> bool {
        let path = "";
        let extensions = self.extensions.validate_extensions(path, tileset.extensions.as_ref(), context);
        let mut result = extensions.all_valid;

        match &tileset.asset {
            Some(asset) => result &= self.validate_asset(asset, context),
            None => {
                context.report(IssueType::PropertyMissing, path, "The 'asset' property is required");
                result = false;
            }
        }

        if tileset.schema.is_some() && tileset.schema_uri.is_some() {
            context.report(
                IssueType::OneOfError,
                path,
                "The tileset must not define both 'schema' and 'schemaUri'",
            );
            result = false;
        }
        let (schema, schema_resolved) = resolve_tileset_schema(tileset, context);
        result &= schema_resolved;
        let mut state = ValidationState {
            has_schema_definition: tileset.schema.is_some() || tileset.schema_uri.is_some(),
            ..Default::default()
        };
        if let Some(schema) = &schema {
            let schema_path = if tileset.schema.is_some() { "/schema" } else { "/schemaUri" };
            if SchemaValidator::validate_schema(schema_path, schema, context) {
                state.validated_schema = Some(&**schema);
            } else {
                result = false;
            }
        }

        if let Some(groups) = &tileset.groups {
            state.has_groups_definition = true;
            let groups_path = format!("{}/groups", path);
            if !state.has_schema_definition {
                context.report(
                    IssueType::PropertyMissing,
                    &groups_path,
                    "The tileset defines groups, but does not have a schema",
                );
                result = false;
            } else if let Some(schema) = state.validated_schema {
                let mut groups_valid = true;
                for (i, group) in groups.iter().enumerate() {
                    let group_path = format!("{}/{}", groups_path, i);
                    groups_valid &= validate_metadata_entity(&group_path, group, schema, context);
                }
                if groups_valid {
                    state.validated_groups = Some(groups.len());
                }
                result &= groups_valid;
            }
        }

        if let Some(statistics) = &tileset.statistics {
            result &= StatisticsValidator::validate_statistics("/statistics", statistics, &state, context);
        }

        match tileset.geometric_error {
            None => {
                context.report(IssueType::PropertyMissing, path, "The 'geometricError' property is required");
                result = false;
            }
            Some(e) if e < 0.0 => {
                context.report(
                    IssueType::ValueNotInRange,
                    "/geometricError",
                    format!("The geometricError must be at least 0, but is {}", e),
                );
                result = false;
            }
            Some(_) => {}
        }

        if let Some(metadata) = &tileset.metadata {
            result &= validate_metadata("/metadata", metadata, &state, context);
        }

        if tileset.root.is_some() {
            result &= self.traversing.validate_tileset(tileset, &state, context);
        } else {
            context.report(IssueType::PropertyMissing, path, "The 'root' property is required");
            result = false;
        }

        result &= validate_extension_declarations(tileset, context);
        result
    }

    fn validate_asset(&self, asset: &Asset, context: &mut ValidationContext) -> bool {
        let path = "/asset";
        let mut result = self
            .extensions
            .validate_extensions(path, asset.extensions.as_ref(), context)
            .all_valid;
        match &asset.version {
            None => {
                context.report(IssueType::PropertyMissing, path, "The 'version' property is required");
                result = false;
            }
            Some(version) if !KNOWN_ASSET_VERSIONS.contains(&version.as_str()) => context.report(
                IssueType::AssetVersionUnknown,
                format!("{}/version", path),
                format!("The asset version '{}' is not known", version),
            ),
            Some(_) => {}
        }
        result
    }
}

/// The schema of the tileset, and whether resolving it succeeded.
///
/// A `schemaUri` is resolved relative to the tileset.
fn resolve_tileset_schema<'a>(
    tileset: &'a Tileset,
    context: &mut ValidationContext,
) -> (Option<Cow<'a, Schema>>, bool) {
    if let Some(schema) = &tileset.schema {
        return (Some(Cow::Borrowed(schema)), true);
    }
    let Some(uri) = &tileset.schema_uri else {
        return (None, true);
    };
    tracing::debug!("Resolving schema {}", uri);
    let data = match context.resource_resolver().resolve(uri) {
        Ok(Some(data)) => data,
        Ok(None) => {
            context.report(IssueType::IoError, "/schemaUri", format!("The schema URI {} could not be resolved", uri));
            return (None, false);
        }
        Err(e) => {
            context.report(IssueType::IoError, "/schemaUri", format!("The schema {} could not be read: {}", uri, e));
            return (None, false);
        }
    };
    match serde_json::from_slice::<Schema>(&data) {
        Ok(schema) => (Some(Cow::Owned(schema)), true),
        Err(e) => {
            context.report(IssueType::JsonParseError, "/schemaUri", format!("Invalid schema {}: {}", uri, e));
            (None, false)
        }
    }
}

/// Cross-check `extensionsUsed` and `extensionsRequired` with each
/// other and with the extensions that were found during validation.
///
/// Must be called after everything else was validated.
fn validate_extension_declarations(tileset: &Tileset, context: &mut ValidationContext) -> bool {
    let mut result = true;
    let mut declared = |name: &str, list: &Option<Vec<String>>, context: &mut ValidationContext| {
        let Some(list) = list else {
            return BTreeSet::new();
        };
        if list.is_empty() {
            context.report(
                IssueType::ArrayLengthMismatch,
                format!("/{}", name),
                format!("The '{}' must contain at least one element", name),
            );
            result = false;
        }
        list.iter().cloned().collect::<BTreeSet<String>>()
    };
    let used = declared("extensionsUsed", &tileset.extensions_used, context);
    let required = declared("extensionsRequired", &tileset.extensions_required, context);

    for name in required.difference(&used) {
        context.report(
            IssueType::ExtensionRequiredButNotUsed,
            "/extensionsRequired",
            format!("The extension '{}' is required, but not declared in 'extensionsUsed'", name),
        );
        result = false;
    }
    let found = context.extensions_found().clone();
    for name in found.difference(&used) {
        context.report(
            IssueType::ExtensionFoundButNotUsed,
            "/extensionsUsed",
            format!("The extension '{}' was found, but not declared in 'extensionsUsed'", name),
        );
        result = false;
    }
    for name in used.difference(&found) {
        context.report(
            IssueType::ExtensionUsedButNotFound,
            "/extensionsUsed",
            format!("The extension '{}' is declared in 'extensionsUsed', but was not found", name),
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryResourceResolver;
    use serde_json::{json, Value};

    fn validate(tileset: Value, resolver: MemoryResourceResolver) -> ValidationResult {
        let mut context = ValidationContext::new(
            Arc::new(resolver),
            ValidationOptions { validate_content_data: false, ..Default::default() },
        );
        let valid = TilesetValidator::new().validate_json(tileset.to_string().as_bytes(), &mut context);
        let result = context.into_result();
        assert_eq!(valid, result.is_valid(), "{:?}", result.issues);
        result
    }

    fn minimal() -> Value {
        json!({
            "asset": { "version": "1.1" },
            "geometricError": 10,
            "root": { "geometricError": 5, "boundingVolume": { "sphere": [0, 0, 0, 1] } }
        })
    }

    fn types(result: &ValidationResult) -> Vec<IssueType> {
        result.issues.iter().map(|i| i.issue_type).collect()
    }

    #[test]
    fn test_minimal_tileset() {
        let result = validate(minimal(), MemoryResourceResolver::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_invalid_json() {
        let mut context = ValidationContext::new(Arc::new(MemoryResourceResolver::new()), Default::default());
        assert!(!TilesetValidator::new().validate_json(b"{ not json", &mut context));
        assert_eq!(context.issues()[0].issue_type, IssueType::JsonParseError);
        assert_eq!(context.issues()[0].path, "");
    }

    #[test]
    fn test_top_level_properties() {
        let mut tileset = minimal();
        tileset["asset"]["version"] = json!("2.0");
        tileset["geometricError"] = json!(-1);
        let result = validate(tileset, MemoryResourceResolver::new());
        assert_eq!(types(&result), [IssueType::AssetVersionUnknown, IssueType::ValueNotInRange]);
        assert_eq!(result.issues[0].path, "/asset/version");
    }

    #[test]
    fn test_extension_declarations() {
        let mut tileset = minimal();
        tileset["extensionsUsed"] = json!(["EXT_a"]);
        tileset["extensionsRequired"] = json!(["EXT_b"]);
        tileset["root"]["extensions"] = json!({ "3DTILES_content_gltf": {} });
        let result = validate(tileset, MemoryResourceResolver::new());
        assert_eq!(
            types(&result),
            [
                IssueType::ExtensionRequiredButNotUsed,
                IssueType::ExtensionFoundButNotUsed,
                IssueType::ExtensionUsedButNotFound
            ]
        );
    }

    #[test]
    fn test_schema_uri() {
        let schema = json!({
            "id": "s",
            "classes": { "tileset": { "properties": { "name": { "type": "STRING", "required": true } } } }
        });
        let resolver = MemoryResourceResolver::new().with("schema/schema.json", schema.to_string());
        let mut tileset = minimal();
        tileset["schemaUri"] = json!("schema/schema.json");
        tileset["metadata"] = json!({ "class": "tileset", "properties": {} });
        let result = validate(tileset.clone(), resolver.clone());
        assert_eq!(types(&result), [IssueType::MetadataValueRequiredButMissing]);

        tileset["schemaUri"] = json!("missing.json");
        let result = validate(tileset, resolver);
        assert_eq!(types(&result), [IssueType::IoError]);
        assert_eq!(result.issues[0].path, "/schemaUri");
    }

    #[test]
    fn test_groups_and_statistics_need_a_schema() {
        let mut tileset = minimal();
        tileset["groups"] = json!([{ "class": "group" }]);
        tileset["statistics"] = json!({ "classes": { "group": {} } });
        tileset["root"]["content"] = json!({ "uri": "a.glb", "group": 0 });
        let result = validate(tileset, MemoryResourceResolver::new());
        assert_eq!(types(&result), [IssueType::PropertyMissing, IssueType::PropertyMissing]);
    }

    #[test]
    fn test_self_referencing_tileset() {
        let mut tileset = minimal();
        tileset["root"]["content"] = json!({ "uri": "tileset.json" });
        let resolver = MemoryResourceResolver::new().with("tileset.json", tileset.to_string());
        let mut context = ValidationContext::new(Arc::new(resolver), Default::default());
        assert!(!TilesetValidator::new().validate_json(tileset.to_string().as_bytes(), &mut context));

        // The root document has no name, so the cycle closes one level down
        let result = context.into_result();
        assert_eq!(types(&result), [IssueType::ContentValidationError]);
        let nested = &result.issues[0].causes;
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].issue_type, IssueType::ContentValidationError);
        assert_eq!(nested[0].path, "/root/content");
        assert_eq!(nested[0].causes.len(), 1);
        assert_eq!(nested[0].causes[0].issue_type, IssueType::ExternalTilesetCycle);
        assert_eq!(nested[0].causes[0].path, "");
    }

    #[test]
    fn test_validate_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tileset.json"), minimal().to_string()).unwrap();
        let result = TilesetValidator::validate_file(dir.path().join("tileset.json"), Default::default()).unwrap();
        assert!(result.is_valid());
        assert!(TilesetValidator::validate_file(dir.path().join("missing.json"), Default::default()).is_err());
    }
}

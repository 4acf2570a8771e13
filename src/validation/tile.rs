//! Validation of single tiles.

use std::rc::Rc;

use serde_json::Value;

use super::context::ValidationContext;
use super::extensions::ExtensionsValidator;
use super::issues::IssueType;
use super::state::ValidationState;
use crate::implicit::SubdivisionScheme;
use crate::metadata::validate_metadata_entity;
use crate::structure::{MetadataEntity, Tile, TileImplicitTiling};

/// Validates the properties of one tile, without its contents and
/// without looking at other tiles.
pub trait TileValidator {
    /// Returns whether the tile is valid. Traversal does not descend
    /// into invalid tiles.
    fn validate_tile(&self, path: &str, tile: &Tile, state: &ValidationState<'_>, context: &mut ValidationContext)
        -> bool;
}

/// The tile checks of 3D Tiles 1.1.
pub struct BasicTileValidator {
    extensions: Rc<ExtensionsValidator>,
}

impl BasicTileValidator {
    pub fn new(extensions: Rc<ExtensionsValidator>) -> Self {
        Self { extensions }
    }
}

impl Default for BasicTileValidator {
    fn default() -> Self {
        Self::new(Rc::new(ExtensionsValidator::with_defaults()))
    }
}

impl TileValidator for BasicTileValidator {
    fn validate_tile(
        &self,
        path: &str,
        tile: &Tile,
        state: &ValidationState<'_>,
        context: &mut ValidationContext,
    ) -> bool {
        let extensions = self.extensions.validate_extensions(path, tile.extensions.as_ref(), context);
        if !extensions.perform_default_validation {
            return extensions.all_valid;
        }
        let mut result = extensions.all_valid;

        match tile.geometric_error {
            None => {
                context.report(
                    IssueType::PropertyMissing,
                    path,
                    "The 'geometricError' property is required",
                );
                result = false;
            }
            Some(e) if !(e >= 0.0) => {
                context.report(
                    IssueType::ValueNotInRange,
                    format!("{}/geometricError", path),
                    format!("The 'geometricError' must be at least 0.0, but is {}", e),
                );
                result = false;
            }
            Some(_) => {}
        }

        match &tile.bounding_volume {
            None => {
                context.report(IssueType::PropertyMissing, path, "The 'boundingVolume' property is required");
                result = false;
            }
            Some(volume) => {
                if !validate_bounding_volume(&format!("{}/boundingVolume", path), volume, context) {
                    result = false;
                }
            }
        }
        if let Some(volume) = &tile.viewer_request_volume {
            if !validate_bounding_volume(&format!("{}/viewerRequestVolume", path), volume, context) {
                result = false;
            }
        }

        if let Some(refine) = &tile.refine {
            if refine != "ADD" && refine != "REPLACE" {
                context.report(
                    IssueType::ValueNotInList,
                    format!("{}/refine", path),
                    format!("The 'refine' must be one of [ADD, REPLACE], but is '{}'", refine),
                );
                result = false;
            }
        }

        if let Some(transform) = &tile.transform {
            if transform.len() != 16 {
                context.report(
                    IssueType::ArrayLengthMismatch,
                    format!("{}/transform", path),
                    format!("The 'transform' must have 16 elements, but has {}", transform.len()),
                );
                result = false;
            }
        }

        if tile.content.is_some() && tile.contents.is_some() {
            context.report(
                IssueType::OneOfError,
                path,
                "Only one of 'content' and 'contents' may be defined",
            );
            result = false;
        }
        if let Some(contents) = &tile.contents {
            if contents.is_empty() {
                context.report(
                    IssueType::ArrayLengthMismatch,
                    format!("{}/contents", path),
                    "The 'contents' must have at least 1 element",
                );
                result = false;
            }
        }
        if let Some(children) = &tile.children {
            if children.is_empty() {
                context.report(
                    IssueType::ArrayLengthMismatch,
                    format!("{}/children", path),
                    "The 'children' must have at least 1 element",
                );
                result = false;
            }
        }

        if let Some(implicit_tiling) = &tile.implicit_tiling {
            if tile.children.is_some() {
                context.report(
                    IssueType::OneOfError,
                    path,
                    "A tile with 'implicitTiling' must not have 'children'",
                );
                result = false;
            }
            if !validate_implicit_tiling(&format!("{}/implicitTiling", path), implicit_tiling, context) {
                result = false;
            }
        }

        if let Some(metadata) = &tile.metadata {
            if !validate_metadata(&format!("{}/metadata", path), metadata, state, context) {
                result = false;
            }
        }
        result
    }
}

/// Validate a metadata entity against the schema of the tileset.
pub(crate) fn validate_metadata(
    path: &str,
    entity: &MetadataEntity,
    state: &ValidationState<'_>,
    context: &mut ValidationContext,
) -> bool {
    if !state.has_schema_definition {
        context.report(
            IssueType::PropertyMissing,
            path,
            "Metadata is defined, but the tileset does not have a schema",
        );
        return false;
    }
    match state.validated_schema {
        Some(schema) => validate_metadata_entity(path, entity, schema, context),
        // The schema itself was invalid and has been reported
        None => true,
    }
}

/// Validate a `boundingVolume` or `viewerRequestVolume`.
///
/// Exactly one of `box` (12 numbers), `region` (6 numbers, radians and
/// meters) and `sphere` (4 numbers) must be given, unless an extension
/// defines the volume.
pub(crate) fn validate_bounding_volume(path: &str, volume: &Value, context: &mut ValidationContext) -> bool {
    let Some(object) = volume.as_object() else {
        context.report(IssueType::TypeMismatch, path, "The bounding volume must be an object");
        return false;
    };
    let shapes: Vec<(&str, usize)> = [("box", 12), ("region", 6), ("sphere", 4)]
        .into_iter()
        .filter(|(name, _)| object.contains_key(*name))
        .collect();
    let (name, length) = match shapes.as_slice() {
        [] if object.contains_key("extensions") => return true,
        [] => {
            context.report(
                IssueType::BoundingVolumeInvalid,
                path,
                "The bounding volume must have one of 'box', 'region' or 'sphere'",
            );
            return false;
        }
        [shape] => *shape,
        _ => {
            context.report(
                IssueType::OneOfError,
                path,
                "The bounding volume must have only one of 'box', 'region' or 'sphere'",
            );
            return false;
        }
    };

    let shape_path = format!("{}/{}", path, name);
    let values: Option<Vec<f64>> = object[name]
        .as_array()
        .and_then(|a| a.iter().map(Value::as_f64).collect());
    let Some(values) = values else {
        context.report(IssueType::TypeMismatch, &shape_path, format!("The '{}' must be an array of numbers", name));
        return false;
    };
    if values.len() != length {
        context.report(
            IssueType::ArrayLengthMismatch,
            &shape_path,
            format!("The '{}' must have {} elements, but has {}", name, length, values.len()),
        );
        return false;
    }

    let problem = match name {
        "sphere" if values[3] < 0.0 => Some(format!("The sphere radius must not be negative, but is {}", values[3])),
        "region" => region_problem(&values),
        _ => None,
    };
    match problem {
        Some(message) => {
            context.report(IssueType::BoundingVolumeInvalid, &shape_path, message);
            false
        }
        None => true,
    }
}

fn region_problem(region: &[f64]) -> Option<String> {
    use std::f64::consts::{FRAC_PI_2, PI};
    let [west, south, east, north, min_height, max_height] = region else {
        return None;
    };
    let check = |name: &str, value: f64, min: f64, max: f64| {
        (!(min..=max).contains(&value)).then(|| format!("The {} of the region must be in [{}, {}], but is {}", name, min, max, value))
    };
    check("west", *west, -PI, PI)
        .or_else(|| check("east", *east, -PI, PI))
        .or_else(|| check("south", *south, -FRAC_PI_2, FRAC_PI_2))
        .or_else(|| check("north", *north, -FRAC_PI_2, FRAC_PI_2))
        .or_else(|| {
            (south > north).then(|| format!("The south of the region ({}) is greater than the north ({})", south, north))
        })
        .or_else(|| {
            (min_height > max_height).then(|| {
                format!(
                    "The minimum height of the region ({}) is greater than the maximum height ({})",
                    min_height, max_height
                )
            })
        })
}

fn validate_implicit_tiling(path: &str, implicit_tiling: &TileImplicitTiling, context: &mut ValidationContext) -> bool {
    let mut result = true;
    if SubdivisionScheme::from_name(&implicit_tiling.subdivision_scheme).is_none() {
        context.report(
            IssueType::ValueNotInList,
            format!("{}/subdivisionScheme", path),
            format!(
                "The 'subdivisionScheme' must be one of [QUADTREE, OCTREE], but is '{}'",
                implicit_tiling.subdivision_scheme
            ),
        );
        result = false;
    }
    for (name, value) in [
        ("subtreeLevels", implicit_tiling.subtree_levels),
        ("availableLevels", implicit_tiling.available_levels),
    ] {
        if value < 1 {
            context.report(
                IssueType::ValueNotInRange,
                format!("{}/{}", path, name),
                format!("The '{}' must be at least 1, but is {}", name, value),
            );
            result = false;
        }
    }
    if implicit_tiling.subtrees.uri.is_empty() {
        context.report(
            IssueType::PropertyMissing,
            format!("{}/subtrees", path),
            "The 'subtrees' must have a 'uri'",
        );
        result = false;
    }
    result
}

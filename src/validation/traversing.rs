//! Validation of the tile hierarchy.

use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use super::content::{BasicTileContentValidator, TileContentValidator};
use super::context::ValidationContext;
use super::issues::{IssueType, ValidationIssue};
use super::state::ValidationState;
use super::tile::{validate_metadata, BasicTileValidator, TileValidator};
use crate::metadata::{validate_property_table_values, BinaryPropertyTable};
use crate::structure::Tileset;
use crate::traversal::{TilesetTraverser, TraversedTile};
use crate::util::Result;

/// Traverses a tileset and validates every tile and its contents.
///
/// Invalid tiles are not descended into. A tiling error (a subtree that
/// cannot be resolved or decoded, invalid metadata semantics) means that
/// the shape of the tree is unknown: it is reported once, at the empty
/// path, and the traversal is abandoned.
pub struct TilesetTraversingValidator {
    tile_validator: Rc<dyn TileValidator>,
    content_validator: Rc<dyn TileContentValidator>,
}

impl TilesetTraversingValidator {
    pub fn new(tile_validator: Rc<dyn TileValidator>, content_validator: Rc<dyn TileContentValidator>) -> Self {
        Self {
            tile_validator,
            content_validator,
        }
    }

    /// Validate all tiles of the tileset. Returns whether all tiles were
    /// valid and the traversal completed. Issues of tile contents are
    /// only recorded.
    pub fn validate_tileset(
        &self,
        tileset: &Tileset,
        state: &ValidationState<'_>,
        context: &mut ValidationContext,
    ) -> bool {
        let resolver = Arc::clone(context.resource_resolver());
        let traverser = TilesetTraverser::new(tileset, state.validated_schema, resolver);

        let mut result = true;
        let mut visited = 0usize;
        let mut limit_reported = false;
        let mut subtrees = BTreeSet::new();
        let max_traversed_tiles = context.options().max_traversed_tiles;

        let traversal = traverser.traverse(|traversed| {
            if let Some(max) = max_traversed_tiles {
                if visited >= max {
                    if !limit_reported {
                        context.report(
                            IssueType::TraversalLimitReached,
                            traversed.path(),
                            format!("Stopped traversal after {} tiles", max),
                        );
                        limit_reported = true;
                    }
                    return Ok(false);
                }
            }
            visited += 1;

            if let Some(uri) = traversed.subtree_uri() {
                if subtrees.insert(uri.to_string()) && !validate_subtree_metadata(traversed, uri, state, context) {
                    result = false;
                }
            }
            let (valid, descend) = self.validate_traversed_tile(traversed, state, context)?;
            if !valid {
                result = false;
            }
            Ok(descend)
        });

        if let Err(e) = traversal {
            tracing::warn!("Abandoning traversal: {}", e);
            let issue = if e.is_tiling_error() {
                ValidationIssue::new(
                    IssueType::ImplicitTilingError,
                    "",
                    format!("Could not traverse tileset: {}", e),
                )
            } else {
                ValidationIssue::internal_error("", format!("Internal error while traversing tileset: {}", e))
            };
            context.add_issue(issue);
            result = false;
        }
        result
    }

    /// Validate one tile. Returns whether the tile is valid, and whether
    /// its children should be visited.
    fn validate_traversed_tile(
        &self,
        traversed: &Rc<TraversedTile<'_>>,
        state: &ValidationState<'_>,
        context: &mut ValidationContext,
    ) -> Result<(bool, bool)> {
        let path = traversed.path();
        let tile = traversed.as_tile()?;
        if !self.tile_validator.validate_tile(path, &tile, state, context) {
            return Ok((false, false));
        }

        // Content problems are recorded as issues, they do not make the tile invalid
        if let Some(content) = &tile.content {
            self.content_validator
                .validate_tile_content(&format!("{}/content", path), content, &tile, state, context);
        }
        for (i, content) in tile.contents.iter().flatten().enumerate() {
            self.content_validator.validate_tile_content(
                &format!("{}/contents/{}", path, i),
                content,
                &tile,
                state,
                context,
            );
        }

        if let Some(parent) = traversed.parent() {
            let parent_tile = parent.as_tile()?;
            if let (Some(parent_error), Some(error)) = (parent_tile.geometric_error, tile.geometric_error) {
                if parent_error < error {
                    context.report(
                        IssueType::TileGeometricErrorInconsistent,
                        path,
                        format!(
                            "Tile {} has a geometricError of {}, which is larger than the parent geometricError of {}",
                            path, error, parent_error
                        ),
                    );
                }
            }
        }
        Ok((true, true))
    }
}

impl Default for TilesetTraversingValidator {
    fn default() -> Self {
        Self::new(
            Rc::new(BasicTileValidator::default()),
            Rc::new(BasicTileContentValidator::default()),
        )
    }
}

/// Validate the metadata of a subtree that was just entered: the subtree
/// metadata entity and all values of its property tables.
fn validate_subtree_metadata(
    traversed: &TraversedTile<'_>,
    uri: &str,
    state: &ValidationState<'_>,
    context: &mut ValidationContext,
) -> bool {
    let Some(subtree) = traversed.subtree() else {
        return true;
    };
    let mut result = true;
    if let Some(entity) = subtree.subtree_metadata() {
        result &= validate_metadata(&format!("{}/subtreeMetadata", uri), entity, state, context);
    }
    let tables = subtree.property_tables();
    if tables.is_empty() {
        return result;
    }
    let Some(schema) = state.validated_schema else {
        if !state.has_schema_definition {
            context.report(
                IssueType::PropertyMissing,
                format!("{}/propertyTables", uri),
                "The subtree defines property tables, but the tileset does not have a schema",
            );
            result = false;
        }
        return result;
    };
    tracing::debug!("Validating {} property tables of subtree {}", tables.len(), uri);
    for (i, table) in tables.iter().enumerate() {
        let binary = BinaryPropertyTable::new(table, schema, &subtree.buffer_views);
        result &= validate_property_table_values(&format!("{}/propertyTables/{}", uri, i), &binary, context);
    }
    result
}

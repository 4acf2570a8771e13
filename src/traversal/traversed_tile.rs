//! A uniform view on explicit and implicit tiles during traversal.

use std::borrow::Cow;
use std::rc::Rc;
use std::sync::Arc;

use super::overrides::{apply_metadata_semantics, apply_table_semantics};
use crate::implicit::{substitute_template, ImplicitTiling, SubtreeModel, TreeCoordinates};
use crate::io::{uri_directory, ResourceResolver};
use crate::metadata::BinaryPropertyTable;
use crate::structure::{Content, MetadataEntity, Schema, Tile, TileImplicitTiling};
use crate::util::{Error, Result};

/// What is shared by all tiles of one traversal.
pub(crate) struct Session<'a> {
    pub resolver: Arc<dyn ResourceResolver>,
    pub schema: Option<&'a Schema>,
}

/// A node of an implicit tree.
struct ImplicitNode<'a> {
    /// The explicit tile that carries the `implicitTiling`
    implicit_root: &'a Tile,
    tiling: Rc<ImplicitTiling>,
    subtree: Rc<SubtreeModel>,
    subtree_uri: Rc<str>,
    /// Global coordinates of the root of `subtree`
    subtree_root: TreeCoordinates,
    /// Global coordinates of this node
    coordinates: TreeCoordinates,
}

impl ImplicitNode<'_> {
    fn local_coordinates(&self) -> Result<TreeCoordinates> {
        self.coordinates.relative_to(&self.subtree_root)
    }
}

enum TileKind<'a> {
    Explicit(&'a Tile),
    Implicit(ImplicitNode<'a>),
}

/// A tile as it is encountered during traversal.
///
/// Explicit tiles wrap a [`Tile`] of the tileset JSON. Implicit tiles are
/// synthesized from the implicit root tile and the availability of their
/// subtree. Each tile knows its parent; children are materialized on
/// request with [`children`](Self::children), which may have to resolve
/// subtree files.
pub struct TraversedTile<'a> {
    session: Rc<Session<'a>>,
    parent: Option<Rc<TraversedTile<'a>>>,
    level: u32,
    path: String,
    kind: TileKind<'a>,
}

impl<'a> TraversedTile<'a> {
    pub(crate) fn root(session: Rc<Session<'a>>, tile: &'a Tile) -> Self {
        Self {
            session,
            parent: None,
            level: 0,
            path: "/root".to_string(),
            kind: TileKind::Explicit(tile),
        }
    }

    /// Level in the traversed hierarchy, 0 for the root.
    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// A human-readable locator of the tile, e.g. `/root/children/1` or
    /// `/root/[0/0/0]/[1/1/0]` for implicit tiles.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn parent(&self) -> Option<&Rc<TraversedTile<'a>>> {
        self.parent.as_ref()
    }

    pub fn is_implicit(&self) -> bool {
        matches!(self.kind, TileKind::Implicit(_))
    }

    /// Coordinates of an implicit tile in its tree.
    pub fn coordinates(&self) -> Option<TreeCoordinates> {
        match &self.kind {
            TileKind::Implicit(node) => Some(node.coordinates),
            TileKind::Explicit(_) => None,
        }
    }

    /// The tile, with metadata semantics (like `TILE_GEOMETRIC_ERROR`)
    /// already applied.
    ///
    /// Fails with a tiling error when the metadata that the substitution
    /// needs is invalid.
    pub fn as_tile(&self) -> Result<Cow<'a, Tile>> {
        match &self.kind {
            &TileKind::Explicit(tile) => {
                let (Some(entity), Some(schema)) = (&tile.metadata, self.session.schema) else {
                    return Ok(Cow::Borrowed(tile));
                };
                let mut overridden = tile.clone();
                if apply_metadata_semantics(&mut overridden, entity, schema)? {
                    Ok(Cow::Owned(overridden))
                } else {
                    Ok(Cow::Borrowed(tile))
                }
            }
            TileKind::Implicit(node) => self.implicit_tile(node).map(Cow::Owned),
        }
    }

    fn implicit_tile(&self, node: &ImplicitNode<'a>) -> Result<Tile> {
        let root = node.implicit_root;
        let local = node.local_coordinates()?;
        let geometric_error = root
            .geometric_error
            .map(|e| e / f64::powi(2.0, node.coordinates.level as i32));

        let mut contents = Vec::new();
        for (i, content) in root.all_contents().into_iter().enumerate() {
            if !node.subtree.is_content_available(i, &local)? {
                continue;
            }
            let template = content
                .uri
                .as_deref()
                .ok_or_else(|| Error::tiling(format!("Template content {} of the implicit root has no URI", i)))?;
            contents.push(Content {
                uri: Some(substitute_template(template, &node.coordinates)),
                ..content.clone()
            });
        }

        let mut tile = Tile {
            bounding_volume: root.bounding_volume.clone(),
            geometric_error,
            refine: root.refine.clone(),
            transform: None,
            content: None,
            contents: None,
            ..Default::default()
        };
        match contents.len() {
            0 => {}
            1 if root.content.is_some() => tile.content = contents.pop(),
            _ => tile.contents = Some(contents),
        }

        if let (Some(schema), Some(table)) = (self.session.schema, node.subtree.tile_metadata_table()) {
            let binary = BinaryPropertyTable::new(table, schema, &node.subtree.buffer_views);
            let row = node.subtree.tile_metadata_row(&local)?;
            apply_table_semantics(&mut tile, &binary, row)?;
        }
        Ok(tile)
    }

    /// The contents of the tile: none, the single `content`, or `contents`.
    pub fn contents(&self) -> Result<Vec<Content>> {
        Ok(self.as_tile()?.all_contents().into_iter().cloned().collect())
    }

    /// The URI of the subtree, for the root tile of each subtree.
    pub fn subtree_uri(&self) -> Option<&str> {
        match &self.kind {
            TileKind::Implicit(node) if node.coordinates == node.subtree_root => Some(&node.subtree_uri),
            _ => None,
        }
    }

    /// The subtree that an implicit tile belongs to.
    pub fn subtree(&self) -> Option<&SubtreeModel> {
        match &self.kind {
            TileKind::Implicit(node) => Some(&node.subtree),
            TileKind::Explicit(_) => None,
        }
    }

    /// The implicit tiling descriptor: of the tile itself for explicit
    /// tiles, of the implicit root for implicit tiles.
    pub fn implicit_tiling(&self) -> Option<&'a TileImplicitTiling> {
        match &self.kind {
            &TileKind::Explicit(tile) => tile.implicit_tiling.as_ref(),
            TileKind::Implicit(node) => node.implicit_root.implicit_tiling.as_ref(),
        }
    }

    /// The metadata entity of the tile.
    ///
    /// For implicit tiles this is the row of the subtree `tileMetadata`
    /// property table that belongs to the tile, with processed values.
    pub fn metadata(&self) -> Result<Option<MetadataEntity>> {
        match &self.kind {
            TileKind::Explicit(tile) => Ok(tile.metadata.clone()),
            TileKind::Implicit(node) => {
                let (Some(schema), Some(table)) = (self.session.schema, node.subtree.tile_metadata_table()) else {
                    return Ok(None);
                };
                let binary = BinaryPropertyTable::new(table, schema, &node.subtree.buffer_views);
                let row = node.subtree.tile_metadata_row(&node.local_coordinates()?)?;
                let properties = binary
                    .entity_values(row)
                    .map_err(|e| Error::tiling(format!("Invalid tile metadata of {}: {}", self.path, e)))?;
                Ok(Some(MetadataEntity {
                    class: table.class.clone(),
                    properties: Some(properties),
                    extensions: None,
                }))
            }
        }
    }

    /// Materialize the children of this tile.
    ///
    /// Explicit children come in declaration order, implicit children in
    /// Morton order of their coordinates. Only available implicit tiles
    /// are created. Resolving or decoding a subtree fails with a tiling
    /// error that names the subtree URI.
    pub fn children(self: &Rc<Self>) -> Result<Vec<Rc<TraversedTile<'a>>>> {
        match &self.kind {
            &TileKind::Explicit(tile) => {
                if let Some(descriptor) = &tile.implicit_tiling {
                    return self.implicit_root_children(tile, descriptor);
                }
                let children = tile.children.as_deref().unwrap_or_default();
                Ok(children
                    .iter()
                    .enumerate()
                    .map(|(i, child)| {
                        Rc::new(self.child(format!("{}/children/{}", self.path, i), TileKind::Explicit(child)))
                    })
                    .collect())
            }
            TileKind::Implicit(node) => self.implicit_children(node),
        }
    }

    fn child(self: &Rc<Self>, path: String, kind: TileKind<'a>) -> TraversedTile<'a> {
        TraversedTile {
            session: Rc::clone(&self.session),
            parent: Some(Rc::clone(self)),
            level: self.level + 1,
            path,
            kind,
        }
    }

    fn implicit_root_children(
        self: &Rc<Self>,
        tile: &'a Tile,
        descriptor: &TileImplicitTiling,
    ) -> Result<Vec<Rc<TraversedTile<'a>>>> {
        let tiling = Rc::new(ImplicitTiling::from_descriptor(descriptor)?);
        let coordinates = TreeCoordinates::root(tiling.scheme);
        let (subtree, uri) = self.load_subtree(&tiling, &coordinates)?;
        if !subtree.is_tile_available(&TreeCoordinates::root(tiling.scheme))? {
            tracing::debug!("Root tile of subtree {} is not available", uri);
            return Ok(Vec::new());
        }
        let node = ImplicitNode {
            implicit_root: tile,
            tiling,
            subtree,
            subtree_uri: uri,
            subtree_root: coordinates,
            coordinates,
        };
        let path = format!("{}/[{}]", self.path, coordinates);
        Ok(vec![Rc::new(self.child(path, TileKind::Implicit(node)))])
    }

    fn implicit_children(self: &Rc<Self>, node: &ImplicitNode<'a>) -> Result<Vec<Rc<TraversedTile<'a>>>> {
        let tiling = &node.tiling;
        let mut children = Vec::new();
        for coordinates in node.coordinates.children() {
            if coordinates.level >= tiling.available_levels {
                break;
            }
            let local = coordinates.relative_to(&node.subtree_root)?;
            let child = if local.level < tiling.subtree_levels {
                if !node.subtree.is_tile_available(&local)? {
                    continue;
                }
                ImplicitNode {
                    implicit_root: node.implicit_root,
                    tiling: Rc::clone(tiling),
                    subtree: Rc::clone(&node.subtree),
                    subtree_uri: Rc::clone(&node.subtree_uri),
                    subtree_root: node.subtree_root,
                    coordinates,
                }
            } else {
                if !node.subtree.is_child_subtree_available(&local) {
                    continue;
                }
                let (subtree, uri) = self.load_subtree(tiling, &coordinates)?;
                if !subtree.is_tile_available(&TreeCoordinates::root(tiling.scheme))? {
                    return Err(Error::tiling(format!(
                        "The subtree {} is marked as available, but its root tile is not",
                        uri
                    )));
                }
                ImplicitNode {
                    implicit_root: node.implicit_root,
                    tiling: Rc::clone(tiling),
                    subtree,
                    subtree_uri: uri,
                    subtree_root: coordinates,
                    coordinates,
                }
            };
            let path = format!("{}/[{}]", self.path, coordinates);
            children.push(Rc::new(self.child(path, TileKind::Implicit(child))));
        }
        Ok(children)
    }

    /// Resolve and parse the subtree whose root is at `coordinates`.
    fn load_subtree(
        &self,
        tiling: &ImplicitTiling,
        coordinates: &TreeCoordinates,
    ) -> Result<(Rc<SubtreeModel>, Rc<str>)> {
        let uri = substitute_template(&tiling.subtrees_uri, coordinates);
        tracing::debug!("Resolving subtree {} for {}", uri, self.path);
        let data = self
            .session
            .resolver
            .resolve(&uri)
            .map_err(|e| Error::tiling(format!("Could not read subtree {}: {}", uri, e)))?
            .ok_or_else(|| Error::tiling(format!("Could not resolve subtree {}", uri)))?;
        let resolver = self.session.resolver.derive(uri_directory(&uri));
        let subtree = SubtreeModel::parse(&data, resolver.as_ref(), tiling)
            .map_err(|e| Error::tiling(format!("Invalid subtree {}: {}", uri, e)))?;
        Ok((Rc::new(subtree), Rc::from(uri)))
    }
}

impl std::fmt::Debug for TraversedTile<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraversedTile")
            .field("level", &self.level)
            .field("path", &self.path)
            .field("implicit", &self.is_implicit())
            .finish()
    }
}

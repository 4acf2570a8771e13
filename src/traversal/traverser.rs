//! Depth-first and breadth-first traversal of tilesets.

use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use super::traversed_tile::{Session, TraversedTile};
use crate::io::ResourceResolver;
use crate::structure::{Schema, Tileset};
use crate::util::{Error, Result};

/// Order in which tiles are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraversalOrder {
    /// Pre-order: a tile, then the full subtree of its first child, ...
    #[default]
    DepthFirst,
    /// Level by level.
    BreadthFirst,
}

/// Walks the explicit and implicit tiles of a tileset.
pub struct TilesetTraverser<'a> {
    tileset: &'a Tileset,
    schema: Option<&'a Schema>,
    resolver: Arc<dyn ResourceResolver>,
    order: TraversalOrder,
}

impl<'a> TilesetTraverser<'a> {
    /// Create a traverser. `resolver` resolves subtree URIs relative to
    /// the tileset, `schema` enables metadata semantics.
    pub fn new(tileset: &'a Tileset, schema: Option<&'a Schema>, resolver: Arc<dyn ResourceResolver>) -> Self {
        Self {
            tileset,
            schema,
            resolver,
            order: TraversalOrder::default(),
        }
    }

    pub fn with_order(mut self, order: TraversalOrder) -> Self {
        self.order = order;
        self
    }

    /// Visit all tiles.
    ///
    /// `visit` decides whether the children of a tile are visited.
    /// Errors from `visit` and from materializing children stop the
    /// traversal and are returned.
    pub fn traverse<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&Rc<TraversedTile<'a>>) -> Result<bool>,
    {
        let root = self
            .tileset
            .root
            .as_ref()
            .ok_or_else(|| Error::invalid("The tileset does not have a root tile"))?;
        let session = Rc::new(Session {
            resolver: Arc::clone(&self.resolver),
            schema: self.schema,
        });
        let root = Rc::new(TraversedTile::root(session, root));
        tracing::debug!("Traversing tileset ({:?})", self.order);

        let mut pending = VecDeque::from([root]);
        let mut visited = 0usize;
        while let Some(tile) = self.next(&mut pending) {
            visited += 1;
            tracing::trace!("Visiting {}", tile.path());
            if !visit(&tile)? {
                continue;
            }
            let children = tile.children()?;
            match self.order {
                TraversalOrder::DepthFirst => {
                    for child in children.into_iter().rev() {
                        pending.push_back(child);
                    }
                }
                TraversalOrder::BreadthFirst => pending.extend(children),
            }
        }
        tracing::debug!("Visited {} tiles", visited);
        Ok(())
    }

    fn next(&self, pending: &mut VecDeque<Rc<TraversedTile<'a>>>) -> Option<Rc<TraversedTile<'a>>> {
        match self.order {
            TraversalOrder::DepthFirst => pending.pop_back(),
            TraversalOrder::BreadthFirst => pending.pop_front(),
        }
    }
}

//! Coordinates of tiles in quadtrees and octrees.

use std::fmt;

use crate::util::{Error, Result};

/// The subdivision scheme of an implicit tileset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubdivisionScheme {
    Quadtree,
    Octree,
}

impl SubdivisionScheme {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "QUADTREE" => Some(Self::Quadtree),
            "OCTREE" => Some(Self::Octree),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Quadtree => "QUADTREE",
            Self::Octree => "OCTREE",
        }
    }

    /// Number of children of each node (4 or 8).
    #[inline]
    pub const fn branching_factor(self) -> u64 {
        match self {
            Self::Quadtree => 4,
            Self::Octree => 8,
        }
    }

    /// Number of nodes in all levels above `level`: `(N^level - 1) / (N - 1)`.
    pub fn level_offset(self, level: u32) -> Result<u64> {
        let n = self.branching_factor();
        let nodes = n
            .checked_pow(level)
            .ok_or_else(|| Error::tiling(format!("Level {} is too deep for a {}", level, self.name())))?;
        Ok((nodes - 1) / (n - 1))
    }

    /// Number of nodes in the given level: `N^level`.
    pub fn nodes_in_level(self, level: u32) -> Result<u64> {
        self.branching_factor()
            .checked_pow(level)
            .ok_or_else(|| Error::tiling(format!("Level {} is too deep for a {}", level, self.name())))
    }
}

impl fmt::Display for SubdivisionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The position of a node in a quadtree (`z == None`) or octree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TreeCoordinates {
    pub level: u32,
    pub x: u64,
    pub y: u64,
    pub z: Option<u64>,
}

impl TreeCoordinates {
    /// The root of a tree with the given scheme.
    pub fn root(scheme: SubdivisionScheme) -> Self {
        Self {
            level: 0,
            x: 0,
            y: 0,
            z: (scheme == SubdivisionScheme::Octree).then_some(0),
        }
    }

    pub fn scheme(&self) -> SubdivisionScheme {
        if self.z.is_some() {
            SubdivisionScheme::Octree
        } else {
            SubdivisionScheme::Quadtree
        }
    }

    /// The children of this node, in Morton order: x varies fastest,
    /// then y, then z.
    pub fn children(&self) -> Vec<TreeCoordinates> {
        let n = self.scheme().branching_factor();
        (0..n)
            .map(|i| Self {
                level: self.level + 1,
                x: (self.x << 1) | (i & 1),
                y: (self.y << 1) | ((i >> 1) & 1),
                z: self.z.map(|z| (z << 1) | ((i >> 2) & 1)),
            })
            .collect()
    }

    pub fn parent(&self) -> Option<TreeCoordinates> {
        if self.level == 0 {
            return None;
        }
        Some(Self {
            level: self.level - 1,
            x: self.x >> 1,
            y: self.y >> 1,
            z: self.z.map(|z| z >> 1),
        })
    }

    /// Index of this node within its level, interleaving the bits of
    /// x, y (and z).
    pub fn morton_index(&self) -> u64 {
        let dims: u32 = if self.z.is_some() { 3 } else { 2 };
        let mut index = 0u64;
        for bit in 0..self.level {
            index |= ((self.x >> bit) & 1) << (bit * dims);
            index |= ((self.y >> bit) & 1) << (bit * dims + 1);
            if let Some(z) = self.z {
                index |= ((z >> bit) & 1) << (bit * dims + 2);
            }
        }
        index
    }

    /// Index of this node in the level-by-level order of all nodes.
    pub fn tree_index(&self) -> Result<u64> {
        Ok(self.scheme().level_offset(self.level)? + self.morton_index())
    }

    /// These coordinates relative to `root`, which must be an ancestor
    /// (or the node itself).
    pub fn relative_to(&self, root: &TreeCoordinates) -> Result<TreeCoordinates> {
        let delta = self
            .level
            .checked_sub(root.level)
            .filter(|d| *d < 32)
            .ok_or_else(|| Error::tiling(format!("{} is not a descendant of {}", self, root)))?;
        let local = |v: u64, r: u64| -> Result<u64> {
            let origin = r << delta;
            v.checked_sub(origin)
                .filter(|l| *l < (1u64 << delta))
                .ok_or_else(|| Error::tiling(format!("{} is not a descendant of {}", self, root)))
        };
        Ok(Self {
            level: delta,
            x: local(self.x, root.x)?,
            y: local(self.y, root.y)?,
            z: match (self.z, root.z) {
                (Some(z), Some(rz)) => Some(local(z, rz)?),
                (None, None) => None,
                _ => return Err(Error::tiling("Mixed quadtree and octree coordinates")),
            },
        })
    }
}

impl fmt::Display for TreeCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.level, self.x, self.y)?;
        if let Some(z) = self.z {
            write!(f, "/{}", z)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(level: u32, x: u64, y: u64) -> TreeCoordinates {
        TreeCoordinates { level, x, y, z: None }
    }

    #[test]
    fn test_level_offsets() {
        assert_eq!(SubdivisionScheme::Quadtree.level_offset(0).unwrap(), 0);
        assert_eq!(SubdivisionScheme::Quadtree.level_offset(2).unwrap(), 5);
        assert_eq!(SubdivisionScheme::Octree.level_offset(2).unwrap(), 9);
        assert!(SubdivisionScheme::Octree.level_offset(40).is_err());
    }

    #[test]
    fn test_children_order() {
        let children = quad(1, 1, 0).children();
        let xy: Vec<_> = children.iter().map(|c| (c.x, c.y)).collect();
        assert_eq!(xy, vec![(2, 0), (3, 0), (2, 1), (3, 1)]);
        assert!(children.iter().all(|c| c.parent() == Some(quad(1, 1, 0))));

        let octree = TreeCoordinates::root(SubdivisionScheme::Octree).children();
        assert_eq!(octree.len(), 8);
        assert_eq!(octree[4].z, Some(1));
    }

    #[test]
    fn test_morton_index() {
        assert_eq!(quad(2, 0, 0).morton_index(), 0);
        assert_eq!(quad(2, 1, 0).morton_index(), 1);
        assert_eq!(quad(2, 0, 1).morton_index(), 2);
        assert_eq!(quad(2, 2, 0).morton_index(), 4);
        assert_eq!(quad(2, 3, 3).morton_index(), 15);
        assert_eq!(quad(1, 1, 1).tree_index().unwrap(), 4);
    }

    #[test]
    fn test_relative_coordinates() {
        let root = quad(2, 1, 2);
        let local = quad(3, 3, 4).relative_to(&root).unwrap();
        assert_eq!(local, quad(1, 1, 0));
        assert!(quad(3, 0, 0).relative_to(&root).is_err());
        assert!(quad(1, 0, 0).relative_to(&root).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(quad(2, 1, 3).to_string(), "2/1/3");
        let c = TreeCoordinates { level: 1, x: 0, y: 1, z: Some(1) };
        assert_eq!(c.to_string(), "1/0/1/1");
    }
}

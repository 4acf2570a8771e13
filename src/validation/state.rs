//! Facts about a tileset that later validation steps depend on.

use crate::structure::Schema;

/// What the top-level checks found out about the tileset.
///
/// The schema is only stored here when it was valid, so that metadata
/// is never checked against a broken schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationState<'a> {
    /// The schema, if the tileset defines one and it is valid
    pub validated_schema: Option<&'a Schema>,
    /// Whether the tileset has a `schema` or `schemaUri`
    pub has_schema_definition: bool,
    /// Number of groups, if the tileset defines valid groups
    pub validated_groups: Option<usize>,
    /// Whether the tileset has `groups`
    pub has_groups_definition: bool,
}

//! Substitution of tree coordinates into URI templates.

use super::coordinates::TreeCoordinates;

/// Replace `{level}`, `{x}`, `{y}` and `{z}` in the template.
///
/// `{z}` is left untouched for quadtree coordinates.
pub fn substitute_template(template: &str, coordinates: &TreeCoordinates) -> String {
    let mut uri = template
        .replace("{level}", &coordinates.level.to_string())
        .replace("{x}", &coordinates.x.to_string())
        .replace("{y}", &coordinates.y.to_string());
    if let Some(z) = coordinates.z {
        uri = uri.replace("{z}", &z.to_string());
    }
    uri
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitution() {
        let c = TreeCoordinates { level: 3, x: 5, y: 1, z: None };
        assert_eq!(
            substitute_template("subtrees/{level}/{x}/{y}.subtree", &c),
            "subtrees/3/5/1.subtree"
        );
        let c = TreeCoordinates { level: 1, x: 0, y: 1, z: Some(1) };
        assert_eq!(substitute_template("{level}-{x}-{y}-{z}-{x}.glb", &c), "1-0-1-1-0.glb");
    }
}

//! Options that control a validation run.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::io::ContentType;
use crate::util::Result;

/// Validation options, usually read from a JSON options file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidationOptions {
    /// Whether tile content data is resolved and validated
    pub validate_content_data: bool,

    /// Content types that are validated (`GLB`, `B3DM`, `TILESET`, ...).
    /// `None` validates all types.
    pub validated_content_types: Option<Vec<String>>,

    /// Stop descending once this many tiles have been visited
    pub max_traversed_tiles: Option<usize>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            validate_content_data: true,
            validated_content_types: None,
            max_traversed_tiles: None,
        }
    }
}

impl ValidationOptions {
    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Whether content of the given type should be validated.
    pub fn includes_content_type(&self, content_type: ContentType) -> bool {
        if !self.validate_content_data {
            return false;
        }
        match &self.validated_content_types {
            None => true,
            Some(types) => types.iter().any(|t| t.eq_ignore_ascii_case(content_type.name())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options: ValidationOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ValidationOptions::default());
        assert!(options.includes_content_type(ContentType::Glb));
    }

    #[test]
    fn test_content_type_filter() {
        let options = ValidationOptions {
            validated_content_types: Some(vec!["GLB".into()]),
            ..Default::default()
        };
        assert!(options.includes_content_type(ContentType::Glb));
        assert!(!options.includes_content_type(ContentType::B3dm));

        let options = ValidationOptions { validate_content_data: false, ..Default::default() };
        assert!(!options.includes_content_type(ContentType::Glb));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "maxTraversedTiles": 5, "unknownKey": 1 }}"#).unwrap();
        let options = ValidationOptions::load(file.path()).unwrap();
        assert_eq!(options.max_traversed_tiles, Some(5));
        assert!(options.validate_content_data);
    }
}

//! Detection of resource types from magic bytes.

/// Content types that the validator distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentType {
    Glb,
    Gltf,
    B3dm,
    I3dm,
    Pnts,
    Cmpt,
    Subtree,
    Tileset,
    GeoJson,
    Unknown,
}

impl ContentType {
    /// The name used in `validatedContentTypes` options.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Glb => "GLB",
            Self::Gltf => "GLTF",
            Self::B3dm => "B3DM",
            Self::I3dm => "I3DM",
            Self::Pnts => "PNTS",
            Self::Cmpt => "CMPT",
            Self::Subtree => "SUBT",
            Self::Tileset => "TILESET",
            Self::GeoJson => "GEOJSON",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Magic-byte checks for resource data.
pub struct ResourceTypes;

impl ResourceTypes {
    pub fn is_gzipped(data: &[u8]) -> bool {
        data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b
    }

    pub fn starts_with(data: &[u8], magic: &[u8]) -> bool {
        data.len() >= magic.len() && &data[..magic.len()] == magic
    }

    pub fn is_glb(data: &[u8]) -> bool {
        Self::starts_with(data, b"glTF")
    }

    pub fn is_b3dm(data: &[u8]) -> bool {
        Self::starts_with(data, b"b3dm")
    }

    pub fn is_i3dm(data: &[u8]) -> bool {
        Self::starts_with(data, b"i3dm")
    }

    pub fn is_pnts(data: &[u8]) -> bool {
        Self::starts_with(data, b"pnts")
    }

    pub fn is_cmpt(data: &[u8]) -> bool {
        Self::starts_with(data, b"cmpt")
    }

    pub fn is_subt(data: &[u8]) -> bool {
        Self::starts_with(data, b"subt")
    }

    /// Whether the first non-whitespace byte opens a JSON object or array.
    pub fn is_probably_json(data: &[u8]) -> bool {
        data.iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{' || *b == b'[')
    }

    /// Determine the content type of the given data.
    ///
    /// JSON data is classified by looking at its top-level keys:
    /// a tileset has a `root`, glTF has an `asset`, GeoJSON has a `type`.
    pub fn content_type(uri: &str, data: &[u8]) -> ContentType {
        if Self::is_glb(data) {
            return ContentType::Glb;
        }
        if Self::is_b3dm(data) {
            return ContentType::B3dm;
        }
        if Self::is_i3dm(data) {
            return ContentType::I3dm;
        }
        if Self::is_pnts(data) {
            return ContentType::Pnts;
        }
        if Self::is_cmpt(data) {
            return ContentType::Cmpt;
        }
        if Self::is_subt(data) {
            return ContentType::Subtree;
        }
        if Self::is_probably_json(data) {
            if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice(data) {
                if map.contains_key("root") || (map.contains_key("asset") && map.contains_key("geometricError")) {
                    return ContentType::Tileset;
                }
                if map.contains_key("asset") {
                    return ContentType::Gltf;
                }
                if map.contains_key("type") {
                    return ContentType::GeoJson;
                }
            }
            let lower = uri.to_ascii_lowercase();
            if lower.ends_with(".geojson") {
                return ContentType::GeoJson;
            }
            if lower.ends_with(".gltf") {
                return ContentType::Gltf;
            }
        }
        ContentType::Unknown
    }
}

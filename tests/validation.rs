//! End-to-end validation of tilesets on disk.

use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use tileset_validator::gltf::encode_glb;
use tileset_validator::implicit::encode_binary_subtree;
use tileset_validator::validation::{IssueType, Severity, TilesetValidator, ValidationOptions, ValidationResult};

fn write(dir: &Path, name: &str, data: impl AsRef<[u8]>) {
    let path = dir.join(name);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

fn validate(dir: &Path, name: &str) -> ValidationResult {
    TilesetValidator::validate_file(dir.join(name), ValidationOptions::default()).unwrap()
}

fn tile(geometric_error: f64, children: Vec<Value>) -> Value {
    let mut tile = json!({
        "geometricError": geometric_error,
        "boundingVolume": { "box": [0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1] }
    });
    if !children.is_empty() {
        tile["children"] = Value::Array(children);
    }
    tile
}

fn tileset(root: Value) -> Value {
    json!({ "asset": { "version": "1.1" }, "geometricError": 100, "root": root })
}

#[test]
fn test_geometric_error_hierarchy() {
    let dir = tempfile::tempdir().unwrap();
    // The grandchild is only checked when the inconsistent child is descended
    let root = tile(10.0, vec![tile(15.0, vec![tile(20.0, vec![])])]);
    write(dir.path(), "tileset.json", tileset(root).to_string());

    let result = validate(dir.path(), "tileset.json");
    assert!(result.is_valid());
    assert_eq!(result.num_warnings, 2);
    let issue = &result.issues[0];
    assert_eq!(issue.issue_type, IssueType::TileGeometricErrorInconsistent);
    assert_eq!(issue.path, "/root/children/0");
    assert!(issue.message.contains("15"), "{}", issue.message);
    assert_eq!(result.issues[1].issue_type, IssueType::TileGeometricErrorInconsistent);
    assert_eq!(result.issues[1].path, "/root/children/0/children/0");
}

#[test]
fn test_gzipped_tileset() {
    let dir = tempfile::tempdir().unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(tileset(tile(10.0, vec![])).to_string().as_bytes()).unwrap();
    write(dir.path(), "tileset.json", encoder.finish().unwrap());

    let result = validate(dir.path(), "tileset.json");
    assert!(result.is_empty(), "{:?}", result.issues);
}

fn implicit_root() -> Value {
    json!({
        "geometricError": 64,
        "refine": "REPLACE",
        "boundingVolume": { "region": [-1, -1, 1, 1, 0, 100] },
        "implicitTiling": {
            "subdivisionScheme": "QUADTREE",
            "subtreeLevels": 2,
            "availableLevels": 2,
            "subtrees": { "uri": "subtrees/{level}/{x}/{y}.subtree" }
        }
    })
}

#[test]
fn test_empty_subtree_is_one_tiling_error() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "tileset.json", tileset(implicit_root()).to_string());
    write(dir.path(), "subtrees/0/0/0.subtree", []);

    let result = validate(dir.path(), "tileset.json");
    assert!(!result.is_valid());
    assert_eq!(result.len(), 1);
    assert_eq!(result.issues[0].issue_type, IssueType::ImplicitTilingError);
    assert_eq!(result.issues[0].path, "");
}

#[test]
fn test_subtree_tile_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let mut tileset = tileset(implicit_root());
    tileset["schema"] = json!({
        "id": "tiles",
        "classes": { "tile": { "properties": {
            "error": { "type": "SCALAR", "componentType": "FLOAT32", "semantic": "TILE_GEOMETRIC_ERROR" },
            "kind": { "type": "ENUM", "enumType": "kind" }
        } } },
        "enums": { "kind": { "valueType": "UINT8", "values": [
            { "name": "GROUND", "value": 0 }, { "name": "BUILDING", "value": 1 }
        ] } }
    });
    write(dir.path(), "tileset.json", tileset.to_string());

    // The root and its first child are available. The child has a larger
    // geometric error than the root and an enum code that does not exist.
    let mut binary = vec![0u8; 18];
    binary[0] = 0b0000_0011;
    binary[8..12].copy_from_slice(&40.0f32.to_le_bytes());
    binary[12..16].copy_from_slice(&50.0f32.to_le_bytes());
    binary[16] = 0;
    binary[17] = 7;
    let subtree = json!({
        "buffers": [{ "byteLength": 18 }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 1 },
            { "buffer": 0, "byteOffset": 8, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 16, "byteLength": 2 }
        ],
        "propertyTables": [{
            "class": "tile",
            "count": 2,
            "properties": { "error": { "values": 1 }, "kind": { "values": 2 } }
        }],
        "tileMetadata": 0,
        "tileAvailability": { "bitstream": 0 },
        "childSubtreeAvailability": { "constant": 0 }
    });
    write(
        dir.path(),
        "subtrees/0/0/0.subtree",
        encode_binary_subtree(subtree.to_string().as_bytes(), &binary),
    );

    let result = validate(dir.path(), "tileset.json");
    assert!(!result.is_valid());
    assert_eq!(result.len(), 2, "{:?}", result.issues);
    assert_eq!(result.issues[0].severity, Severity::Error);
    assert!(
        result.issues[0]
            .path
            .starts_with("subtrees/0/0/0.subtree/propertyTables/0/properties/kind"),
        "{}",
        result.issues[0].path
    );
    assert_eq!(result.issues[1].issue_type, IssueType::TileGeometricErrorInconsistent);
    assert_eq!(result.issues[1].path, "/root/[0/0/0]/[1/0/0]");
}

#[test]
fn test_external_tileset_content() {
    let dir = tempfile::tempdir().unwrap();
    let mut root = tile(10.0, vec![]);
    root["content"] = json!({ "uri": "sub/tileset.json" });
    write(dir.path(), "tileset.json", tileset(root).to_string());

    let mut external_root = tile(5.0, vec![json!({ "boundingVolume": { "sphere": [0, 0, 0, 1] } })]);
    external_root["content"] = json!({ "uri": "model.glb" });
    write(dir.path(), "sub/tileset.json", tileset(external_root).to_string());
    write(dir.path(), "sub/model.glb", encode_glb(br#"{"asset":{"version":"2.0"}}"#, &[]));

    let result = validate(dir.path(), "tileset.json");
    assert!(!result.is_valid());
    assert_eq!(result.len(), 1);
    let issue = &result.issues[0];
    assert_eq!(issue.issue_type, IssueType::ContentValidationError);
    assert_eq!(issue.path, "/root/content");
    assert_eq!(issue.causes.len(), 1);
    assert_eq!(issue.causes[0].issue_type, IssueType::PropertyMissing);
    assert_eq!(issue.causes[0].path, "/root/children/0");
}

#[test]
fn test_external_tileset_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let mut root = tile(10.0, vec![]);
    root["content"] = json!({ "uri": "a/tileset.json" });
    write(dir.path(), "tileset.json", tileset(root).to_string());

    let mut back = tile(5.0, vec![]);
    back["content"] = json!({ "uri": "../tileset.json" });
    write(dir.path(), "a/tileset.json", tileset(back).to_string());

    let result = validate(dir.path(), "tileset.json");
    assert!(!result.is_valid());
    assert_eq!(result.len(), 1);
    let outer = &result.issues[0];
    assert_eq!(outer.issue_type, IssueType::ContentValidationError);
    assert_eq!(outer.path, "/root/content");
    let inner = &outer.causes[0];
    assert_eq!(inner.issue_type, IssueType::ContentValidationError);
    assert_eq!(inner.causes[0].issue_type, IssueType::ExternalTilesetCycle);
    assert!(inner.causes[0].message.contains("tileset.json"));
}

#[test]
fn test_validation_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let mut root = tile(10.0, vec![tile(20.0, vec![])]);
    root["content"] = json!({ "uri": "missing.glb" });
    write(dir.path(), "tileset.json", tileset(root).to_string());

    let first = validate(dir.path(), "tileset.json");
    let second = validate(dir.path(), "tileset.json");
    assert_eq!(first, second);
    assert_eq!(first.num_errors, 1);
    assert_eq!(first.num_warnings, 1);
}

#[test]
fn test_report_json() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "tileset.json", "{ \"asset\": ");
    let result = validate(dir.path(), "tileset.json");
    let report: Value = serde_json::from_str(&result.to_json_string().unwrap()).unwrap();
    assert_eq!(report["numErrors"], 1);
    assert_eq!(report["issues"][0]["type"], "JSON_PARSE_ERROR");
}

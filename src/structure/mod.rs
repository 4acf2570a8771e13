//! Data model of tilesets, metadata schemas and property tables.
//!
//! - [`Tileset`] / [`Tile`] / [`Content`] - The tile hierarchy
//! - [`Schema`] / [`ClassProperty`] - Metadata schema definitions
//! - [`PropertyTable`] - Binary structural metadata tables

mod property_table;
mod schema;
mod tileset;

pub use property_table::{Buffer, BufferView, PropertyTable, PropertyTableProperty};
pub use schema::{ClassProperty, EnumValue, MetadataClass, MetadataEnum, PropertyType, Schema};
pub use tileset::{
    Asset, Content, MetadataEntity, Statistics, SubtreesTemplate, Tile, TileImplicitTiling,
    Tileset,
};

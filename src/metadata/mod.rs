//! Structural metadata: decoding and validation of property values.
//!
//! Property values are stored in one of three ways, each with its own
//! [`MetadataPropertyModel`]:
//!
//! - [`TablePropertyModel`] - binary property tables, keyed by row
//! - [`TexturePropertyModel`] - channels of texture pixels, keyed by pixel
//! - [`AttributePropertyModel`] - vertex attributes, keyed by vertex
//!
//! The [`MetadataValuesValidator`] checks the values of any model
//! against the bounds and enum definitions of the schema.

mod attribute;
mod entity;
mod model;
mod property;
mod table;
mod table_values;
mod texture;
mod values_validator;

pub use attribute::{AttributePropertyModel, PropertyAttributeProperty, VertexAccessor};
pub use entity::validate_metadata_entity;
pub use model::MetadataPropertyModel;
pub use property::{process_enum_value, shape_components, PropertyDescriptor, PropertyOverrides};
pub use table::{BinaryPropertyTable, TablePropertyModel};
pub use table_values::validate_property_table_values;
pub use texture::{ImageData, PixelCoordinates, PropertyTextureProperty, TexturePropertyModel};
pub use values_validator::MetadataValuesValidator;

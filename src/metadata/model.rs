//! The common capability of the property storage backends.

use std::fmt::Display;

use super::property::PropertyDescriptor;
use crate::util::{MetadataValue, Result};

mod sealed {
    pub trait Sealed {}
}

pub(crate) use sealed::Sealed;

/// Access to the values of one metadata property.
///
/// Implemented by exactly three backends: [`TablePropertyModel`] (keyed
/// by row index), [`TexturePropertyModel`] (keyed by pixel coordinates)
/// and [`AttributePropertyModel`] (keyed by vertex index). Models are
/// immutable; the same key always yields the same value.
///
/// [`TablePropertyModel`]: super::TablePropertyModel
/// [`TexturePropertyModel`]: super::TexturePropertyModel
/// [`AttributePropertyModel`]: super::AttributePropertyModel
pub trait MetadataPropertyModel: Sealed {
    /// The key that identifies one value.
    type Key: Copy + Display;

    /// What the values are stored in, e.g. `property table`.
    const SOURCE: &'static str;

    /// What a key denotes, e.g. `index`.
    const KEY_NAME: &'static str;

    /// The property definition that this model decodes.
    fn descriptor(&self) -> &PropertyDescriptor;

    /// The value as stored: numbers (or arrays of numbers) for numeric
    /// and ENUM properties, booleans and strings otherwise.
    fn raw_property_value(&self, key: Self::Key) -> Result<MetadataValue>;

    /// The value after normalization, scale and offset, or with ENUM
    /// codes replaced by their names.
    fn property_value(&self, key: Self::Key) -> Result<MetadataValue> {
        let raw = self.raw_property_value(key)?;
        self.descriptor().process(raw)
    }
}

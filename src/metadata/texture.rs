//! Property textures: values stored in the channels of texture pixels.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::model::{MetadataPropertyModel, Sealed};
use super::property::{shape_components, PropertyDescriptor, PropertyOverrides};
use crate::structure::{PropertyType, Schema};
use crate::util::{read_components, Error, MetadataValue, Result};

/// Decoded image pixels, always 4 channels (RGBA) with 8 bits each.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(Error::Image(format!(
                "Expected {} bytes for a {}x{} RGBA image, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// Decode a PNG or JPEG image.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).map_err(|e| Error::Image(e.to_string()))?;
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Ok(Self { width, height, pixels: rgba.into_raw() })
    }

    /// The value of `channel` (0..4) at the given pixel.
    #[inline]
    pub fn channel(&self, coordinates: PixelCoordinates, channel: usize) -> Option<u8> {
        if coordinates.x >= self.width || coordinates.y >= self.height || channel >= 4 {
            return None;
        }
        let index = (coordinates.y as usize * self.width as usize + coordinates.x as usize) * 4 + channel;
        self.pixels.get(index).copied()
    }

    /// All pixel coordinates, row by row.
    pub fn coordinates(&self) -> impl Iterator<Item = PixelCoordinates> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| PixelCoordinates { x, y }))
    }
}

/// The key of a property texture value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PixelCoordinates {
    pub x: u32,
    pub y: u32,
}

impl fmt::Display for PixelCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// One property of a property texture, as declared in `EXT_structural_metadata`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyTextureProperty {
    pub index: usize,
    #[serde(default)]
    pub tex_coord: usize,
    #[serde(default = "default_channels")]
    pub channels: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Value>,
}

fn default_channels() -> Vec<usize> {
    vec![0]
}

impl From<&PropertyTextureProperty> for PropertyOverrides {
    fn from(p: &PropertyTextureProperty) -> Self {
        Self::from_json(p.offset.as_ref(), p.scale.as_ref(), p.min.as_ref(), p.max.as_ref())
    }
}

/// Model of one property texture property, keyed by pixel coordinates.
#[derive(Debug, Clone)]
pub struct TexturePropertyModel<'a> {
    descriptor: PropertyDescriptor,
    image: &'a ImageData,
    channels: Vec<usize>,
}

impl<'a> TexturePropertyModel<'a> {
    /// Create the model for `property_name` of `class_name`.
    ///
    /// Only numeric and ENUM properties can be stored in textures, and
    /// arrays need a fixed `count`. The selected channels must provide
    /// exactly the number of bytes that one value occupies.
    pub fn new(
        schema: &Schema,
        class_name: &str,
        property_name: &str,
        texture_property: &PropertyTextureProperty,
        image: &'a ImageData,
    ) -> Result<Self> {
        let descriptor = PropertyDescriptor::resolve(
            schema,
            class_name,
            property_name,
            PropertyOverrides::from(texture_property),
        )?;
        if descriptor.is_variable_length_array() {
            return Err(Error::internal(format!(
                "Property texture property '{}' is a variable-length array",
                property_name
            )));
        }
        let component_type = match descriptor.property_type {
            PropertyType::String | PropertyType::Boolean => None,
            _ => descriptor.component_type,
        }
        .ok_or_else(|| {
            Error::invalid(format!(
                "Property texture property '{}' has type {} which cannot be stored in a texture",
                property_name, descriptor.property_type
            ))
        })?;
        if let Some(&channel) = texture_property.channels.iter().find(|&&c| c > 3) {
            return Err(Error::invalid(format!("Invalid texture channel {}", channel)));
        }
        let count = descriptor.class_property.fixed_count().unwrap_or(1);
        let required = count
            .checked_mul(descriptor.property_type.component_count())
            .and_then(|n| n.checked_mul(component_type.byte_size()));
        if required != Some(texture_property.channels.len()) {
            return Err(Error::invalid(format!(
                "Property texture property '{}' with {} elements per value does not fit the {} given channels",
                property_name,
                count,
                texture_property.channels.len()
            )));
        }
        Ok(Self {
            descriptor,
            image,
            channels: texture_property.channels.clone(),
        })
    }

    pub fn image(&self) -> &ImageData {
        self.image
    }
}

impl Sealed for TexturePropertyModel<'_> {}

impl MetadataPropertyModel for TexturePropertyModel<'_> {
    type Key = PixelCoordinates;
    const SOURCE: &'static str = "property texture";
    const KEY_NAME: &'static str = "pixel";

    fn descriptor(&self) -> &PropertyDescriptor {
        &self.descriptor
    }

    fn raw_property_value(&self, key: PixelCoordinates) -> Result<MetadataValue> {
        let bytes = self
            .channels
            .iter()
            .map(|&c| {
                self.image
                    .channel(key, c)
                    .ok_or_else(|| Error::internal(format!("Pixel {} is outside of the texture", key)))
            })
            .collect::<Result<Vec<u8>>>()?;
        let component_type = self
            .descriptor
            .component_type
            .ok_or_else(|| Error::internal("Texture property without component type"))?;
        let count = bytes.len() / component_type.byte_size();
        let components = read_components(&bytes, 0, count, component_type)?;
        Ok(shape_components(
            components,
            self.descriptor.property_type.component_count(),
            self.descriptor.class_property.array,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        serde_json::from_value(json!({
            "classes": {
                "c": {
                    "properties": {
                        "a": { "type": "SCALAR", "componentType": "UINT8", "normalized": true },
                        "b": { "type": "SCALAR", "componentType": "UINT16" },
                        "v": { "type": "SCALAR", "componentType": "UINT8", "array": true, "count": 2 },
                        "open": { "type": "SCALAR", "componentType": "UINT8", "array": true }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn image() -> ImageData {
        // 2x1: (10, 1, 2, 255), (20, 3, 4, 255)
        ImageData::new(2, 1, vec![10, 1, 2, 255, 20, 3, 4, 255]).unwrap()
    }

    fn texture_property(channels: Vec<usize>) -> PropertyTextureProperty {
        PropertyTextureProperty { channels, ..Default::default() }
    }

    #[test]
    fn test_single_channel() {
        let image = image();
        let model = TexturePropertyModel::new(&schema(), "c", "a", &texture_property(vec![0]), &image).unwrap();
        let key = PixelCoordinates { x: 1, y: 0 };
        assert_eq!(model.raw_property_value(key).unwrap(), MetadataValue::Number(20.0));
        assert_eq!(model.property_value(key).unwrap(), MetadataValue::Number(20.0 / 255.0));
    }

    #[test]
    fn test_multi_byte_components() {
        let image = image();
        let model = TexturePropertyModel::new(&schema(), "c", "b", &texture_property(vec![1, 2]), &image).unwrap();
        let value = model.raw_property_value(PixelCoordinates { x: 0, y: 0 }).unwrap();
        assert_eq!(value, MetadataValue::Number((1 + 2 * 256) as f64));
    }

    #[test]
    fn test_fixed_arrays() {
        let image = image();
        let model = TexturePropertyModel::new(&schema(), "c", "v", &texture_property(vec![2, 0]), &image).unwrap();
        let value = model.raw_property_value(PixelCoordinates { x: 1, y: 0 }).unwrap();
        assert_eq!(value, MetadataValue::numbers([4.0, 20.0]));
    }

    #[test]
    fn test_invalid_layouts() {
        let image = image();
        assert!(TexturePropertyModel::new(&schema(), "c", "open", &texture_property(vec![0]), &image).is_err());
        assert!(TexturePropertyModel::new(&schema(), "c", "b", &texture_property(vec![0]), &image).is_err());
        assert!(TexturePropertyModel::new(&schema(), "c", "a", &texture_property(vec![4]), &image).is_err());
    }

    #[test]
    fn test_huge_array_count() {
        let schema: Schema = serde_json::from_value(json!({
            "classes": { "c": { "properties": {
                "huge": { "type": "VEC4", "componentType": "UINT16", "array": true, "count": 4611686018427387904u64 }
            } } }
        }))
        .unwrap();
        let image = image();
        let result = TexturePropertyModel::new(&schema, "c", "huge", &texture_property(vec![0, 1]), &image);
        assert!(matches!(result, Err(Error::InvalidStructure(_))));
    }

    #[test]
    fn test_repeated_reads_are_equal() {
        let image = image();
        let model = TexturePropertyModel::new(&schema(), "c", "a", &texture_property(vec![0]), &image).unwrap();
        for key in image.coordinates() {
            assert_eq!(model.property_value(key).unwrap(), model.property_value(key).unwrap());
        }
    }

    #[test]
    fn test_coordinates_row_major() {
        let image = ImageData::new(2, 2, vec![0; 16]).unwrap();
        let keys: Vec<_> = image.coordinates().map(|c| (c.x, c.y)).collect();
        assert_eq!(keys, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        assert_eq!(PixelCoordinates { x: 3, y: 4 }.to_string(), "(3, 4)");
    }
}

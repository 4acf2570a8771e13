//! Component types - the fixed-width numeric encodings of metadata values.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use super::{Error, Result};

/// Numeric component type of a metadata property or glTF accessor.
///
/// Values are stored tightly packed and little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentType {
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    Uint8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    Uint16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    Uint32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    Uint64,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
}

impl ComponentType {
    /// Returns the size in bytes of a single component.
    #[inline]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Int64 | Self::Uint64 | Self::Float64 => 8,
        }
    }

    /// Returns the schema name of this type.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int8 => "INT8",
            Self::Uint8 => "UINT8",
            Self::Int16 => "INT16",
            Self::Uint16 => "UINT16",
            Self::Int32 => "INT32",
            Self::Uint32 => "UINT32",
            Self::Int64 => "INT64",
            Self::Uint64 => "UINT64",
            Self::Float32 => "FLOAT32",
            Self::Float64 => "FLOAT64",
        }
    }

    /// Parse a component type from its schema name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "INT8" => Some(Self::Int8),
            "UINT8" => Some(Self::Uint8),
            "INT16" => Some(Self::Int16),
            "UINT16" => Some(Self::Uint16),
            "INT32" => Some(Self::Int32),
            "UINT32" => Some(Self::Uint32),
            "INT64" => Some(Self::Int64),
            "UINT64" => Some(Self::Uint64),
            "FLOAT32" => Some(Self::Float32),
            "FLOAT64" => Some(Self::Float64),
            _ => None,
        }
    }

    /// Parse a component type from a glTF accessor `componentType` code.
    pub fn from_gltf_code(code: u32) -> Option<Self> {
        match code {
            5120 => Some(Self::Int8),
            5121 => Some(Self::Uint8),
            5122 => Some(Self::Int16),
            5123 => Some(Self::Uint16),
            5124 => Some(Self::Int32),
            5125 => Some(Self::Uint32),
            5126 => Some(Self::Float32),
            _ => None,
        }
    }

    /// Returns true if this is an integer type.
    #[inline]
    pub const fn is_integer(self) -> bool {
        !matches!(self, Self::Float32 | Self::Float64)
    }

    /// Returns true if this is an unsigned integer type.
    #[inline]
    pub const fn is_unsigned(self) -> bool {
        matches!(self, Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64)
    }

    /// The largest representable value, used as the normalization divisor.
    pub const fn max_value(self) -> f64 {
        match self {
            Self::Int8 => i8::MAX as f64,
            Self::Uint8 => u8::MAX as f64,
            Self::Int16 => i16::MAX as f64,
            Self::Uint16 => u16::MAX as f64,
            Self::Int32 => i32::MAX as f64,
            Self::Uint32 => u32::MAX as f64,
            Self::Int64 => i64::MAX as f64,
            Self::Uint64 => u64::MAX as f64,
            Self::Float32 => f32::MAX as f64,
            Self::Float64 => f64::MAX,
        }
    }

    /// Normalize an integer value into [0, 1] (unsigned) or [-1, 1] (signed).
    ///
    /// Float values are returned unchanged.
    pub fn normalize(self, value: f64) -> f64 {
        if !self.is_integer() {
            return value;
        }
        let normalized = value / self.max_value();
        if self.is_unsigned() {
            normalized
        } else {
            normalized.max(-1.0)
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Read the `index`-th component of a tightly packed buffer.
pub fn read_component(bytes: &[u8], index: usize, component_type: ComponentType) -> Result<f64> {
    let size = component_type.byte_size();
    let start = index
        .checked_mul(size)
        .ok_or_else(|| Error::invalid("Component index overflow"))?;
    let end = start
        .checked_add(size)
        .ok_or_else(|| Error::invalid("Component index overflow"))?;
    if end > bytes.len() {
        return Err(Error::UnexpectedEof(end as u64));
    }
    let b = &bytes[start..end];
    let value = match component_type {
        ComponentType::Int8 => b[0] as i8 as f64,
        ComponentType::Uint8 => b[0] as f64,
        ComponentType::Int16 => LittleEndian::read_i16(b) as f64,
        ComponentType::Uint16 => LittleEndian::read_u16(b) as f64,
        ComponentType::Int32 => LittleEndian::read_i32(b) as f64,
        ComponentType::Uint32 => LittleEndian::read_u32(b) as f64,
        ComponentType::Int64 => LittleEndian::read_i64(b) as f64,
        ComponentType::Uint64 => LittleEndian::read_u64(b) as f64,
        ComponentType::Float32 => LittleEndian::read_f32(b) as f64,
        ComponentType::Float64 => LittleEndian::read_f64(b),
    };
    Ok(value)
}

/// Read `count` consecutive components starting at component index `first`.
pub fn read_components(
    bytes: &[u8],
    first: usize,
    count: usize,
    component_type: ComponentType,
) -> Result<Vec<f64>> {
    let end = first
        .checked_add(count)
        .ok_or_else(|| Error::invalid("Component range overflow"))?;
    let byte_end = end
        .checked_mul(component_type.byte_size())
        .ok_or_else(|| Error::invalid("Component range overflow"))?;
    if byte_end > bytes.len() {
        return Err(Error::UnexpectedEof(byte_end as u64));
    }
    (first..end).map(|i| read_component(bytes, i, component_type)).collect()
}

/// Read an unsigned integer offset (array or string offsets).
pub fn read_offset(bytes: &[u8], index: usize, offset_type: ComponentType) -> Result<usize> {
    if !offset_type.is_unsigned() {
        return Err(Error::TypeMismatch {
            expected: "unsigned offset type".into(),
            actual: offset_type.name().into(),
        });
    }
    Ok(read_component(bytes, index, offset_type)? as usize)
}

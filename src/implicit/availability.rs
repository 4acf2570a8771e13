//! Availability information of subtrees.

use serde::{Deserialize, Serialize};

/// Availability as declared in subtree JSON.
///
/// Exactly one of `constant` and `bitstream` must be given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityJson {
    #[serde(default, alias = "bufferView", skip_serializing_if = "Option::is_none")]
    pub bitstream: Option<BitstreamSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<u8>,
}

/// Where the bits of an availability bitstream are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BitstreamSource {
    /// Index of a buffer view of the subtree
    BufferView(usize),
    /// The bytes of the bitstream, inline
    Inline(Vec<u8>),
}

/// Decoded availability: one bit per node (or content, or child subtree).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Constant(bool),
    Bitstream(Vec<u8>),
}

impl Availability {
    /// Whether the element with the given index is available.
    ///
    /// Bit `i` is bit `i % 8` (least significant first) of byte `i / 8`.
    pub fn is_available(&self, index: u64) -> bool {
        match self {
            Self::Constant(available) => *available,
            Self::Bitstream(bytes) => {
                let Ok(byte) = usize::try_from(index / 8) else {
                    return false;
                };
                bytes
                    .get(byte)
                    .is_some_and(|b| (b >> (index % 8)) & 1 == 1)
            }
        }
    }

    /// Number of available elements among the first `length`.
    pub fn available_count(&self, length: u64) -> u64 {
        match self {
            Self::Constant(true) => length,
            Self::Constant(false) => 0,
            Self::Bitstream(_) => (0..length).filter(|i| self.is_available(*i)).count() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bit_order() {
        let a = Availability::Bitstream(vec![0b0000_0101, 0b1000_0000]);
        let bits: Vec<_> = (0..16).filter(|i| a.is_available(*i)).collect();
        assert_eq!(bits, vec![0, 2, 15]);
        assert!(!a.is_available(16));
        assert_eq!(a.available_count(16), 3);
        assert_eq!(Availability::Constant(true).available_count(5), 5);
    }

    #[test]
    fn test_parse_sources() {
        let a: AvailabilityJson = serde_json::from_value(json!({ "bitstream": 3, "availableCount": 2 })).unwrap();
        assert_eq!(a.bitstream, Some(BitstreamSource::BufferView(3)));
        let a: AvailabilityJson = serde_json::from_value(json!({ "bufferView": 1 })).unwrap();
        assert_eq!(a.bitstream, Some(BitstreamSource::BufferView(1)));
        let a: AvailabilityJson = serde_json::from_value(json!({ "bitstream": [1, 255] })).unwrap();
        assert_eq!(a.bitstream, Some(BitstreamSource::Inline(vec![1, 255])));
        let a: AvailabilityJson = serde_json::from_value(json!({ "constant": 0 })).unwrap();
        assert_eq!(a.constant, Some(0));
    }
}

//! The binary glTF container.
//!
//! ```text
//! offset  size  field
//! 0       4     magic "glTF"
//! 4       4     version (2)
//! 8       4     total length
//! 12      ...   chunks: u32 length, u32 type, data
//! ```
//!
//! The first chunk is JSON, an optional second chunk is BIN.

use byteorder::{ByteOrder, LittleEndian};

use crate::util::{Error, Result};

pub const GLB_MAGIC: &[u8; 4] = b"glTF";
pub const GLB_HEADER_SIZE: usize = 12;
pub const CHUNK_HEADER_SIZE: usize = 8;
pub const CHUNK_TYPE_JSON: u32 = 0x4E4F_534A;
pub const CHUNK_TYPE_BIN: u32 = 0x004E_4942;

/// The chunks of a GLB file.
#[derive(Debug, Clone, Copy)]
pub struct Glb<'a> {
    pub version: u32,
    pub json: &'a [u8],
    pub bin: Option<&'a [u8]>,
}

impl<'a> Glb<'a> {
    /// Split GLB data into its chunks.
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < GLB_HEADER_SIZE {
            return Err(Error::UnexpectedEof(data.len() as u64));
        }
        if &data[0..4] != GLB_MAGIC {
            return Err(Error::invalid("Invalid GLB magic"));
        }
        let version = LittleEndian::read_u32(&data[4..8]);
        if version != 2 {
            return Err(Error::invalid(format!("Unsupported GLB version {}", version)));
        }
        let length = LittleEndian::read_u32(&data[8..12]) as usize;
        if length > data.len() {
            return Err(Error::invalid(format!(
                "GLB header declares {} bytes, but only {} are present",
                length,
                data.len()
            )));
        }
        let data = &data[..length];

        let mut chunks = Vec::new();
        let mut position = GLB_HEADER_SIZE;
        while position < data.len() {
            let header = data
                .get(position..position + CHUNK_HEADER_SIZE)
                .ok_or(Error::UnexpectedEof(position as u64))?;
            let chunk_length = LittleEndian::read_u32(&header[0..4]) as usize;
            let chunk_type = LittleEndian::read_u32(&header[4..8]);
            let start = position + CHUNK_HEADER_SIZE;
            let chunk = start
                .checked_add(chunk_length)
                .and_then(|end| data.get(start..end))
                .ok_or(Error::UnexpectedEof(data.len() as u64))?;
            chunks.push((chunk_type, chunk));
            position = start + chunk_length;
        }

        let mut chunks = chunks.into_iter();
        let json = match chunks.next() {
            Some((CHUNK_TYPE_JSON, json)) => json,
            _ => return Err(Error::invalid("The first GLB chunk must be the JSON chunk")),
        };
        let bin = match chunks.next() {
            Some((CHUNK_TYPE_BIN, bin)) => Some(bin),
            Some((other, _)) => {
                tracing::debug!("Ignoring GLB chunk of type 0x{:08X}", other);
                None
            }
            None => None,
        };
        Ok(Self { version, json, bin })
    }
}

/// Assemble a GLB from a JSON string and binary data, padding both
/// chunks to 4 bytes.
pub fn encode_glb(json: &[u8], bin: &[u8]) -> Vec<u8> {
    fn padded(bytes: &[u8], pad: u8) -> Vec<u8> {
        let mut v = bytes.to_vec();
        while v.len() % 4 != 0 {
            v.push(pad);
        }
        v
    }
    let json = padded(json, b' ');
    let bin = padded(bin, 0);
    let mut total = GLB_HEADER_SIZE + CHUNK_HEADER_SIZE + json.len();
    if !bin.is_empty() {
        total += CHUNK_HEADER_SIZE + bin.len();
    }

    let mut out = vec![0u8; GLB_HEADER_SIZE];
    out[0..4].copy_from_slice(GLB_MAGIC);
    LittleEndian::write_u32(&mut out[4..8], 2);
    LittleEndian::write_u32(&mut out[8..12], total as u32);
    let mut chunk_header = [0u8; CHUNK_HEADER_SIZE];
    LittleEndian::write_u32(&mut chunk_header[0..4], json.len() as u32);
    LittleEndian::write_u32(&mut chunk_header[4..8], CHUNK_TYPE_JSON);
    out.extend_from_slice(&chunk_header);
    out.extend_from_slice(&json);
    if !bin.is_empty() {
        LittleEndian::write_u32(&mut chunk_header[0..4], bin.len() as u32);
        LittleEndian::write_u32(&mut chunk_header[4..8], CHUNK_TYPE_BIN);
        out.extend_from_slice(&chunk_header);
        out.extend_from_slice(&bin);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks() {
        let data = encode_glb(br#"{"asset":{"version":"2.0"}}"#, &[1, 2, 3]);
        assert_eq!(data.len() % 4, 0);
        let glb = Glb::parse(&data).unwrap();
        assert_eq!(glb.version, 2);
        assert!(glb.json.starts_with(b"{\"asset\""));
        assert_eq!(&glb.bin.unwrap()[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_without_bin() {
        let data = encode_glb(b"{}", &[]);
        assert!(Glb::parse(&data).unwrap().bin.is_none());
    }

    #[test]
    fn test_truncated() {
        let data = encode_glb(b"{}", &[1, 2, 3, 4]);
        assert!(Glb::parse(&data[..data.len() - 2]).is_err());
        assert!(Glb::parse(b"glTF").is_err());

        let mut wrong_version = data.clone();
        wrong_version[4] = 1;
        assert!(Glb::parse(&wrong_version).is_err());
    }
}

//! Wire encoding of the tick-count response
//!
//! Two observed firmware revisions, two encodings of the same 32-bit counter:
//!
//! - **Raw** (canonical): 4 bytes, little-endian — the AVR's native byte
//!   order, written low byte first.
//! - **LegacyHex** (deprecated): 8 ASCII bytes of lowercase hex, most
//!   significant nibble first, from the revision that predates the timeout
//!   watchdog.
//!
//! The two are not interoperable; a connection is pinned to one format.

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// Response encoding used by the rig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireFormat {
    /// 4 raw bytes, little-endian u32
    Raw,
    /// 8 ASCII lowercase-hex bytes, big-endian nibble order
    LegacyHex,
}

impl WireFormat {
    /// Exact response size in bytes
    pub fn response_len(&self) -> usize {
        match self {
            WireFormat::Raw => 4,
            WireFormat::LegacyHex => 8,
        }
    }

    /// Encode a tick count for the wire
    pub fn encode(&self, ticks: u32) -> Vec<u8> {
        match self {
            WireFormat::Raw => {
                let mut bytes = [0u8; 4];
                LittleEndian::write_u32(&mut bytes, ticks);
                bytes.to_vec()
            }
            WireFormat::LegacyHex => format!("{:08x}", ticks).into_bytes(),
        }
    }

    /// Decode a full response buffer back into a tick count
    ///
    /// The buffer must be exactly [`response_len`](Self::response_len) bytes;
    /// anything else is a framing failure, kept distinct from the rig's
    /// timeout sentinel.
    pub fn decode(&self, bytes: &[u8]) -> Result<u32, ProtocolError> {
        if bytes.len() != self.response_len() {
            return Err(ProtocolError::InvalidResponse);
        }
        match self {
            WireFormat::Raw => Ok(LittleEndian::read_u32(bytes)),
            WireFormat::LegacyHex => {
                let text =
                    std::str::from_utf8(bytes).map_err(|_| ProtocolError::InvalidResponse)?;
                u32::from_str_radix(text, 16).map_err(|_| ProtocolError::InvalidResponse)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TIMEOUT_SENTINEL;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_raw_encoding_is_little_endian() {
        assert_eq!(WireFormat::Raw.encode(50_000), vec![0x50, 0xC3, 0x00, 0x00]);
        assert_eq!(
            WireFormat::Raw.encode(TIMEOUT_SENTINEL),
            vec![0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_legacy_hex_encoding_is_big_endian_nibbles() {
        assert_eq!(WireFormat::LegacyHex.encode(50_000), b"0000c350".to_vec());
        assert_eq!(
            WireFormat::LegacyHex.encode(TIMEOUT_SENTINEL),
            b"ffffffff".to_vec()
        );
    }

    #[test]
    fn test_roundtrip_both_formats() {
        for &v in &[0u32, 1, 50_000, 0x0001_86A0, 0xDEAD_BEEF, TIMEOUT_SENTINEL] {
            for format in [WireFormat::Raw, WireFormat::LegacyHex] {
                let encoded = format.encode(v);
                assert_eq!(encoded.len(), format.response_len());
                assert_eq!(format.decode(&encoded).unwrap(), v);
            }
        }
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        assert!(WireFormat::Raw.decode(&[1, 2, 3]).is_err());
        assert!(WireFormat::Raw.decode(&[1, 2, 3, 4, 5]).is_err());
        assert!(WireFormat::LegacyHex.decode(b"c350").is_err());
    }

    #[test]
    fn test_decode_rejects_non_hex_garbage() {
        assert!(WireFormat::LegacyHex.decode(b"0000zz50").is_err());
        assert!(WireFormat::LegacyHex.decode(&[0xFF; 8]).is_err());
    }
}

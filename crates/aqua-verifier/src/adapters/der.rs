//! # DER Encoding
//!
//! Minimal definite-length TLV reader and writer, enough to build an RFC 3161
//! request and walk a timestamp token down to its `TSTInfo`.

use thiserror::Error;

use crate::domain::WitnessError;

/// Universal and context tags used by the timestamp protocol.
pub mod tag {
    /// BOOLEAN
    pub const BOOLEAN: u8 = 0x01;
    /// INTEGER
    pub const INTEGER: u8 = 0x02;
    /// OCTET STRING
    pub const OCTET_STRING: u8 = 0x04;
    /// NULL
    pub const NULL: u8 = 0x05;
    /// OBJECT IDENTIFIER
    pub const OID: u8 = 0x06;
    /// GeneralizedTime
    pub const GENERALIZED_TIME: u8 = 0x18;
    /// SEQUENCE
    pub const SEQUENCE: u8 = 0x30;
    /// SET
    pub const SET: u8 = 0x31;
    /// `[0]` constructed, context specific
    pub const CONTEXT_0: u8 = 0xA0;
}

/// Encoded OID contents.
pub mod oid {
    /// 2.16.840.1.101.3.4.2.1
    pub const SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
    /// 1.2.840.113549.1.7.2
    pub const SIGNED_DATA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x07, 0x02];
    /// 1.2.840.113549.1.9.16.1.4
    pub const TST_INFO: &[u8] = &[
        0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x09, 0x10, 0x01, 0x04,
    ];
}

/// DER decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DerError {
    /// Input ended inside an element.
    #[error("Truncated DER element")]
    Truncated,
    /// Indefinite or oversized length.
    #[error("Unsupported DER length encoding")]
    UnsupportedLength,
    /// A different element was expected.
    #[error("Unexpected DER tag: expected {expected:#04x}, got {actual:#04x}")]
    UnexpectedTag {
        /// Tag required by the structure.
        expected: u8,
        /// Tag found in the input.
        actual: u8,
    },
    /// An element has invalid contents.
    #[error("Invalid DER value: {0}")]
    InvalidValue(String),
}

impl From<DerError> for WitnessError {
    fn from(e: DerError) -> Self {
        WitnessError::Protocol(e.to_string())
    }
}

/// One decoded element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    /// Identifier octet.
    pub tag: u8,
    /// Contents octets.
    pub value: &'a [u8],
    /// Full encoding including tag and length.
    pub raw: &'a [u8],
}

/// Sequential reader over concatenated elements.
#[derive(Debug, Clone)]
pub struct DerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> DerReader<'a> {
    /// Read elements from `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Whether all input was consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Tag of the next element, without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    /// Read the next element.
    pub fn read(&mut self) -> Result<Tlv<'a>, DerError> {
        let start = self.pos;
        let tag = *self.data.get(self.pos).ok_or(DerError::Truncated)?;
        let first = *self.data.get(self.pos + 1).ok_or(DerError::Truncated)?;
        let mut cursor = self.pos + 2;

        let len = if first < 0x80 {
            usize::from(first)
        } else {
            let octets = usize::from(first & 0x7F);
            if octets == 0 || octets > 4 {
                return Err(DerError::UnsupportedLength);
            }
            let bytes = self
                .data
                .get(cursor..cursor + octets)
                .ok_or(DerError::Truncated)?;
            cursor += octets;
            bytes.iter().fold(0usize, |acc, b| (acc << 8) | usize::from(*b))
        };

        let end = cursor.checked_add(len).ok_or(DerError::Truncated)?;
        let value = self.data.get(cursor..end).ok_or(DerError::Truncated)?;
        self.pos = end;
        Ok(Tlv {
            tag,
            value,
            raw: &self.data[start..end],
        })
    }

    /// Read the next element and require `expected` as its tag.
    pub fn expect(&mut self, expected: u8) -> Result<Tlv<'a>, DerError> {
        let tlv = self.read()?;
        if tlv.tag != expected {
            return Err(DerError::UnexpectedTag {
                expected,
                actual: tlv.tag,
            });
        }
        Ok(tlv)
    }

    /// Read the contents of the next element as a nested reader.
    pub fn enter(&mut self, expected: u8) -> Result<DerReader<'a>, DerError> {
        Ok(DerReader::new(self.expect(expected)?.value))
    }

    /// Skip elements until one tagged `expected`.
    pub fn find(&mut self, expected: u8) -> Result<Tlv<'a>, DerError> {
        loop {
            let tlv = self.read()?;
            if tlv.tag == expected {
                return Ok(tlv);
            }
        }
    }
}

/// Decode a non-negative INTEGER that fits in a `u64`.
pub fn decode_u64(value: &[u8]) -> Result<u64, DerError> {
    if value.first().is_some_and(|b| b & 0x80 != 0) {
        return Err(DerError::InvalidValue("negative integer".into()));
    }
    let trimmed = match value {
        [0, rest @ ..] if !rest.is_empty() => rest,
        other => other,
    };
    if trimmed.len() > 8 {
        return Err(DerError::InvalidValue("integer out of range".into()));
    }
    Ok(trimmed.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

// =============================================================================
// WRITER
// =============================================================================

/// Encode one element.
pub fn encode(tag: u8, contents: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = contents.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(contents);
    out
}

/// Encode a constructed element from already-encoded children.
pub fn constructed(tag: u8, children: &[Vec<u8>]) -> Vec<u8> {
    encode(tag, &children.concat())
}

/// SEQUENCE of already-encoded children.
pub fn sequence(children: &[Vec<u8>]) -> Vec<u8> {
    constructed(tag::SEQUENCE, children)
}

/// Non-negative INTEGER from big-endian magnitude bytes.
pub fn integer(magnitude: &[u8]) -> Vec<u8> {
    let start = magnitude.iter().position(|b| *b != 0).unwrap_or(magnitude.len());
    let mut contents = magnitude[start..].to_vec();
    if contents.first().map_or(true, |b| b & 0x80 != 0) {
        contents.insert(0, 0);
    }
    encode(tag::INTEGER, &contents)
}

/// INTEGER from a `u64`.
pub fn integer_u64(value: u64) -> Vec<u8> {
    integer(&value.to_be_bytes())
}

/// OCTET STRING
pub fn octet_string(bytes: &[u8]) -> Vec<u8> {
    encode(tag::OCTET_STRING, bytes)
}

/// OBJECT IDENTIFIER from encoded contents.
pub fn object_identifier(contents: &[u8]) -> Vec<u8> {
    encode(tag::OID, contents)
}

/// NULL
pub fn null() -> Vec<u8> {
    encode(tag::NULL, &[])
}

/// BOOLEAN
pub fn boolean(value: bool) -> Vec<u8> {
    encode(tag::BOOLEAN, &[if value { 0xFF } else { 0x00 }])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_and_long_lengths() {
        let short = octet_string(&[1, 2, 3]);
        assert_eq!(short, vec![0x04, 0x03, 1, 2, 3]);

        let long = octet_string(&[7u8; 300]);
        assert_eq!(&long[..4], &[0x04, 0x82, 0x01, 0x2C]);

        let mut reader = DerReader::new(&long);
        let tlv = reader.expect(tag::OCTET_STRING).unwrap();
        assert_eq!(tlv.value.len(), 300);
        assert_eq!(tlv.raw.len(), long.len());
        assert!(reader.is_empty());
    }

    #[test]
    fn test_integer_encoding() {
        assert_eq!(integer_u64(0), vec![0x02, 0x01, 0x00]);
        assert_eq!(integer_u64(1), vec![0x02, 0x01, 0x01]);
        assert_eq!(integer_u64(0x80), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(decode_u64(&[0x00, 0x80]).unwrap(), 0x80);
        assert_eq!(decode_u64(&[0x01, 0x00]).unwrap(), 256);
        assert!(decode_u64(&[0xFF]).is_err());
    }

    #[test]
    fn test_decode_positive_with_top_bit() {
        for value in [0x80, 0xFF, 0x8000, u64::MAX] {
            let encoded = integer_u64(value);
            let tlv = DerReader::new(&encoded).expect(tag::INTEGER).unwrap();
            assert_eq!(decode_u64(tlv.value).unwrap(), value);
        }
        assert!(decode_u64(&[0x01, 0, 0, 0, 0, 0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_nested_reading() {
        let encoded = sequence(&[integer_u64(1), sequence(&[null(), boolean(true)])]);
        let mut outer = DerReader::new(&encoded);
        let mut seq = outer.enter(tag::SEQUENCE).unwrap();
        assert_eq!(seq.expect(tag::INTEGER).unwrap().value, &[1]);
        let mut inner = seq.enter(tag::SEQUENCE).unwrap();
        assert_eq!(inner.peek_tag(), Some(tag::NULL));
        assert_eq!(inner.find(tag::BOOLEAN).unwrap().value, &[0xFF]);
        assert!(seq.is_empty());
    }

    #[test]
    fn test_truncated_and_unexpected() {
        assert_eq!(DerReader::new(&[0x30, 0x05, 0x01]).read(), Err(DerError::Truncated));
        assert_eq!(
            DerReader::new(&[0x30, 0x80]).read(),
            Err(DerError::UnsupportedLength)
        );
        assert_eq!(
            DerReader::new(&null()).expect(tag::SEQUENCE),
            Err(DerError::UnexpectedTag {
                expected: tag::SEQUENCE,
                actual: tag::NULL
            })
        );
    }
}

//! # Wire encoding
//!
//! Every message starts with a one-byte type tag, followed by fixed-width big-endian fields.
//! Rounds and indices are two bytes wide, vote kinds and booleans one byte. Variable-length byte
//! strings carry a length prefix. Wrapped messages for a child instance end with the child's own
//! encoding, so nesting needs no extra framing.
//!
//! The sender is not part of the encoding: it is known from the transport.

use std::io;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use thiserror::Error;

/// An error decoding a message from its wire form.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum DecodeError {
    /// The input ended before the message was complete.
    #[error("Message is truncated")]
    Truncated,
    /// The leading type tag does not belong to this message type.
    #[error("Unknown message type tag {0:#04x}")]
    UnknownTag(u8),
    /// A wrapped message names a subsystem this protocol does not have.
    #[error("Unknown subsystem {0}")]
    UnknownSubsystem(u8),
    /// A vote or broadcast message kind byte is out of range.
    #[error("Unknown message kind {0}")]
    UnknownKind(u8),
    /// A boolean field is neither `0` nor `1`.
    #[error("Invalid boolean byte {0}")]
    InvalidBool(u8),
    /// A signature share has the wrong length or is not a valid group element.
    #[error("Invalid signature share")]
    InvalidShare,
    /// A complete message was followed by more bytes.
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

impl From<io::Error> for DecodeError {
    fn from(_: io::Error) -> Self {
        // Reading from a byte slice only fails at the end of the input.
        DecodeError::Truncated
    }
}

/// A message with a byte-exact wire encoding.
pub trait WireMessage: Sized {
    /// Appends the encoding of `self` to `buf`.
    fn encode(&self, buf: &mut Vec<u8>);

    /// Decodes a message from the front of `data`, advancing it past the consumed bytes.
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError>;

    /// Returns the encoding of `self`.
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    /// Decodes a message that must span exactly the whole of `data`.
    fn from_bytes(mut data: &[u8]) -> Result<Self, DecodeError> {
        let msg = Self::decode(&mut data)?;
        if !data.is_empty() {
            return Err(DecodeError::TrailingBytes(data.len()));
        }
        Ok(msg)
    }
}

pub(crate) fn put_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub(crate) fn put_bool(buf: &mut Vec<u8>, value: bool) {
    buf.push(value as u8);
}

pub(crate) fn put_u16(buf: &mut Vec<u8>, value: u16) {
    let mut bytes = [0u8; 2];
    BigEndian::write_u16(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, value: u32) {
    let mut bytes = [0u8; 4];
    BigEndian::write_u32(&mut bytes, value);
    buf.extend_from_slice(&bytes);
}

/// Writes a byte string with a two-byte length prefix.
///
/// Only used for signature shares, whose length is a small constant.
pub(crate) fn put_bytes_u16(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u16(buf, bytes.len() as u16);
    buf.extend_from_slice(bytes);
}

/// Writes a byte string with a four-byte length prefix.
pub(crate) fn put_bytes_u32(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(buf, bytes.len() as u32);
    buf.extend_from_slice(bytes);
}

pub(crate) fn get_u8(data: &mut &[u8]) -> Result<u8, DecodeError> {
    Ok(data.read_u8()?)
}

pub(crate) fn get_bool(data: &mut &[u8]) -> Result<bool, DecodeError> {
    match data.read_u8()? {
        0 => Ok(false),
        1 => Ok(true),
        byte => Err(DecodeError::InvalidBool(byte)),
    }
}

pub(crate) fn get_u16(data: &mut &[u8]) -> Result<u16, DecodeError> {
    Ok(data.read_u16::<BigEndian>()?)
}

pub(crate) fn get_u32(data: &mut &[u8]) -> Result<u32, DecodeError> {
    Ok(data.read_u32::<BigEndian>()?)
}

/// Consumes the leading type tag and checks that it is `expected`.
pub(crate) fn expect_tag(data: &mut &[u8], expected: u8) -> Result<(), DecodeError> {
    match get_u8(data)? {
        tag if tag == expected => Ok(()),
        tag => Err(DecodeError::UnknownTag(tag)),
    }
}

fn take<'a>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8], DecodeError> {
    if data.len() < len {
        return Err(DecodeError::Truncated);
    }
    let (bytes, rest) = data.split_at(len);
    *data = rest;
    Ok(bytes)
}

pub(crate) fn get_bytes_u16<'a>(data: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = get_u16(data)? as usize;
    take(data, len)
}

pub(crate) fn get_bytes_u32<'a>(data: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = get_u32(data)? as usize;
    take(data, len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_are_big_endian() {
        let mut buf = Vec::new();
        put_u16(&mut buf, 0x0102);
        put_bool(&mut buf, true);
        put_bytes_u16(&mut buf, b"ab");
        assert_eq!(buf, vec![0x01, 0x02, 0x01, 0x00, 0x02, b'a', b'b']);

        let mut data = &buf[..];
        assert_eq!(get_u16(&mut data), Ok(0x0102));
        assert_eq!(get_bool(&mut data), Ok(true));
        assert_eq!(get_bytes_u16(&mut data), Ok(&b"ab"[..]));
        assert!(data.is_empty());
    }

    #[test]
    fn short_input_is_truncated() {
        let mut data = &[0x00u8][..];
        assert_eq!(get_u16(&mut data), Err(DecodeError::Truncated));
        let mut data = &[0x00u8, 0x05, b'x'][..];
        assert_eq!(get_bytes_u16(&mut data), Err(DecodeError::Truncated));
    }

    #[test]
    fn bool_must_be_zero_or_one() {
        let mut data = &[0x02u8][..];
        assert_eq!(get_bool(&mut data), Err(DecodeError::InvalidBool(2)));
    }
}

//! Binary message builder and reader.
//!
//! Payloads are a flat sequence of little-endian fields with no framing
//! of their own:
//!
//! | type          | encoding                                  |
//! |---------------|-------------------------------------------|
//! | `u8`, `bool`  | 1 byte (`bool` is `0` or `1`)             |
//! | `i32`, `f32`  | 4 bytes, little-endian                    |
//! | `i64`         | 8 bytes, little-endian                    |
//! | string        | `u16` LE byte length, then UTF-8 bytes    |
//!
//! Both sides must agree on the field order. Nothing in the payload
//! describes it.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tidesync_transport::{Delivery, Packet};

use crate::{MessageMark, ProtocolError};

/// An outbound message body under construction.
///
/// The `add_*` methods take and return `self` so fields can be chained:
///
/// ```
/// use tidesync_protocol::Message;
///
/// let msg = Message::new().add_i32(0).add_str("alice").unwrap();
/// assert_eq!(msg.len(), 4 + 2 + 5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    buf: BytesMut,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_u8(mut self, value: u8) -> Self {
        self.buf.put_u8(value);
        self
    }

    pub fn add_bool(mut self, value: bool) -> Self {
        self.buf.put_u8(u8::from(value));
        self
    }

    pub fn add_i32(mut self, value: i32) -> Self {
        self.buf.put_i32_le(value);
        self
    }

    pub fn add_i64(mut self, value: i64) -> Self {
        self.buf.put_i64_le(value);
        self
    }

    pub fn add_f32(mut self, value: f32) -> Self {
        self.buf.put_f32_le(value);
        self
    }

    /// Appends a length-prefixed UTF-8 string.
    ///
    /// # Errors
    /// Returns [`ProtocolError::StringTooLong`] if the string is longer
    /// than `u16::MAX` bytes.
    pub fn add_str(mut self, value: &str) -> Result<Self, ProtocolError> {
        let len = u16::try_from(value.len())
            .map_err(|_| ProtocolError::StringTooLong(value.len()))?;
        self.buf.put_u16_le(len);
        self.buf.put_slice(value.as_bytes());
        Ok(self)
    }

    /// Appends the body of another message.
    pub fn add_message(mut self, other: &Message) -> Self {
        self.buf.put_slice(&other.buf);
        self
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn freeze(self) -> Bytes {
        self.buf.freeze()
    }

    /// Wraps the body in a packet carrying `mark` as its id.
    pub fn into_packet(self, mark: MessageMark, delivery: Delivery) -> Packet {
        Packet {
            id: mark.bits(),
            delivery,
            payload: self.freeze(),
        }
    }
}

/// A read cursor over an inbound message body.
#[derive(Debug, Clone)]
pub struct MessageReader {
    buf: Bytes,
}

impl MessageReader {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < needed {
            return Err(ProtocolError::UnexpectedEnd {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub fn get_u8(&mut self) -> Result<u8, ProtocolError> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    /// Reads a bool. Any non-zero byte is `true`.
    pub fn get_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.get_u8()? != 0)
    }

    pub fn get_i32(&mut self) -> Result<i32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn get_i64(&mut self) -> Result<i64, ProtocolError> {
        self.need(8)?;
        Ok(self.buf.get_i64_le())
    }

    pub fn get_f32(&mut self) -> Result<f32, ProtocolError> {
        self.need(4)?;
        Ok(self.buf.get_f32_le())
    }

    pub fn get_str(&mut self) -> Result<String, ProtocolError> {
        self.need(2)?;
        let len = usize::from(self.buf.get_u16_le());
        self.need(len)?;
        let bytes = self.buf.split_to(len);
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

impl From<Bytes> for MessageReader {
    fn from(buf: Bytes) -> Self {
        Self::new(buf)
    }
}

impl From<Message> for MessageReader {
    fn from(msg: Message) -> Self {
        Self::new(msg.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_fields_writes_little_endian() {
        let msg = Message::new().add_u8(0xAB).add_bool(true).add_i32(1);
        assert_eq!(msg.as_bytes(), &[0xAB, 1, 1, 0, 0, 0]);
    }

    #[test]
    fn test_add_str_writes_length_prefix() {
        let msg = Message::new().add_str("hi").unwrap();
        assert_eq!(msg.as_bytes(), &[2, 0, b'h', b'i']);
    }

    #[test]
    fn test_add_str_too_long_returns_error() {
        let long = "x".repeat(usize::from(u16::MAX) + 1);
        let result = Message::new().add_str(&long);
        assert!(matches!(result, Err(ProtocolError::StringTooLong(65536))));
    }

    #[test]
    fn test_reader_reads_fields_in_order() {
        let msg = Message::new()
            .add_i32(-7)
            .add_str("bob")
            .unwrap()
            .add_i64(1 << 40)
            .add_f32(0.5)
            .add_bool(false);
        let mut reader = MessageReader::from(msg);

        assert_eq!(reader.get_i32().unwrap(), -7);
        assert_eq!(reader.get_str().unwrap(), "bob");
        assert_eq!(reader.get_i64().unwrap(), 1 << 40);
        assert_eq!(reader.get_f32().unwrap(), 0.5);
        assert!(!reader.get_bool().unwrap());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_reader_past_end_returns_error() {
        let mut reader = MessageReader::new(Bytes::from_static(&[1, 2]));
        let result = reader.get_i32();
        assert!(matches!(
            result,
            Err(ProtocolError::UnexpectedEnd { needed: 4, remaining: 2 })
        ));
    }

    #[test]
    fn test_reader_truncated_string_returns_error() {
        let mut reader =
            MessageReader::new(Bytes::from_static(&[5, 0, b'a', b'b']));
        assert!(matches!(
            reader.get_str(),
            Err(ProtocolError::UnexpectedEnd { needed: 5, remaining: 2 })
        ));
    }

    #[test]
    fn test_reader_invalid_utf8_returns_error() {
        let mut reader =
            MessageReader::new(Bytes::from_static(&[2, 0, 0xFF, 0xFE]));
        assert!(matches!(
            reader.get_str(),
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }

    #[test]
    fn test_add_message_appends_body() {
        let inner = Message::new().add_u8(9);
        let outer = Message::new().add_u8(1).add_message(&inner);
        assert_eq!(outer.as_bytes(), &[1, 9]);
    }

    #[test]
    fn test_into_packet_uses_mark_bits() {
        let packet = Message::new()
            .add_u8(3)
            .into_packet(MessageMark::ERROR_403.server(), Delivery::Unreliable);
        assert_eq!(packet.id, MessageMark::ERROR_403.bits() | 1);
        assert_eq!(packet.delivery, Delivery::Unreliable);
        assert_eq!(&packet.payload[..], &[3]);
    }
}

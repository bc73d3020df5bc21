//! The unit of transmission: a message id plus an opaque payload.
//!
//! On the wire a packet is a two-byte little-endian message id followed by
//! the payload bytes:
//!
//! ```text
//! ┌──────────────┬───────────────────────────┐
//! │ id (u16, LE) │ payload (rest of frame)   │
//! └──────────────┴───────────────────────────┘
//! ```
//!
//! The transport never interprets the id. Higher layers use it as the
//! message mark.

use bytes::{BufMut, Bytes, BytesMut};

use crate::TransportError;

/// Size of the frame header (the message id).
pub const FRAME_HEADER_LEN: usize = 2;

/// The delivery guarantee requested for an outbound packet.
///
/// Chosen per message by the sender. Nothing is negotiated with the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delivery {
    /// Delivered in order, no loss.
    #[default]
    Reliable,
    /// May be lost. Used for high-frequency state deltas where only the
    /// latest value matters.
    Unreliable,
}

/// A framed message: numeric id, delivery mode and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Per-message numeric id. Carries the message mark.
    pub id: u16,
    /// Requested delivery mode. Inbound packets are always `Reliable`
    /// because the mode is not part of the frame.
    pub delivery: Delivery,
    /// The message body.
    pub payload: Bytes,
}

impl Packet {
    /// Creates a reliable packet.
    pub fn reliable(id: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            delivery: Delivery::Reliable,
            payload: payload.into(),
        }
    }

    /// Creates an unreliable packet.
    pub fn unreliable(id: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            delivery: Delivery::Unreliable,
            payload: payload.into(),
        }
    }

    /// Encodes the packet into a single frame.
    pub fn encode_frame(&self) -> Bytes {
        let mut frame =
            BytesMut::with_capacity(FRAME_HEADER_LEN + self.payload.len());
        frame.put_u16_le(self.id);
        frame.put_slice(&self.payload);
        frame.freeze()
    }

    /// Decodes a frame received from the network.
    ///
    /// # Errors
    /// Returns [`TransportError::MalformedFrame`] if the frame is shorter
    /// than the header.
    pub fn decode_frame(frame: Bytes) -> Result<Self, TransportError> {
        if frame.len() < FRAME_HEADER_LEN {
            return Err(TransportError::MalformedFrame {
                len: frame.len(),
                needed: FRAME_HEADER_LEN,
            });
        }
        let id = u16::from_le_bytes([frame[0], frame[1]]);
        Ok(Self {
            id,
            delivery: Delivery::Reliable,
            payload: frame.slice(FRAME_HEADER_LEN..),
        })
    }
}

//! Wire protocol for Tidesync.
//!
//! This crate defines what travels inside a transport packet:
//!
//! - **Marks** ([`MessageMark`], [`Role`], [`MessageType`], [`Subtype`]):
//!   the 16-bit header carried as the packet id.
//! - **Messages** ([`Message`], [`MessageReader`]): the little-endian
//!   binary body.
//! - **Delta sync** ([`FieldMask`], [`DeltaState`], [`serialize`],
//!   [`deserialize`], [`apply`]): field-masked partial state.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer sits between transport (packets) and session
//! (players and authority). It knows nothing about connections or
//! rosters.
//!
//! ```text
//! Transport (Packet) → Protocol (MessageMark + Message) → Session
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

pub mod delta;
mod error;
mod mark;
mod message;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use delta::{apply, deserialize, serialize, DeltaState, FieldMask};
pub use error::ProtocolError;
pub use mark::{
    ErrorCode, MessageMark, MessageType, Role, SessionSubtype, Subtype,
    EXTRA_SHIFT, MAX_EXTRA,
};
pub use message::{Message, MessageReader};

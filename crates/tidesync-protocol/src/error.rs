//! Error types for the protocol layer.
//!
//! Each crate in Tidesync defines its own error enum. A `ProtocolError`
//! always means a message could not be built or read, never a network or
//! session problem.

/// Errors that can occur while building or reading protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A read ran past the end of the payload.
    ///
    /// Common causes: a truncated message, or a sender that wrote fewer
    /// fields than its mask announced.
    #[error("unexpected end of message: needed {needed} bytes, {remaining} left")]
    UnexpectedEnd { needed: usize, remaining: usize },

    /// A string field did not contain valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A string is too long for its `u16` length prefix.
    #[error("string of {0} bytes exceeds the 65535-byte limit")]
    StringTooLong(usize),

    /// The extra (subtype) field does not fit in the mark.
    #[error("extra value {0:#x} does not fit in 13 bits")]
    ExtraOutOfRange(u16),

    /// A delta mask selects a field the state does not have.
    #[error("mask {mask:#010b} selects fields beyond the {field_count} the state defines")]
    UnknownFields { mask: u8, field_count: u8 },
}

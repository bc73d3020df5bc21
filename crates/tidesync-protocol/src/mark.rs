//! The Message-Mark: a 16-bit header describing what a message is.
//!
//! Every packet's numeric id is a mark. It packs three fields into a
//! single `u16`:
//!
//! ```text
//!  15                                 3   2   1   0
//! ┌─────────────────────────────────────┬───────┬───┐
//! │ extra (13 bits, meaning per type)   │ type  │ R │
//! └─────────────────────────────────────┴───────┴───┘
//! ```
//!
//! - **R** (bit 0): role. Set when the message comes from, or claims to
//!   come from, the Source-of-Truth. Server replies set it too.
//! - **type** (bits 1–2): [`MessageType`].
//! - **extra** (bits 3–15): a subtype whose meaning depends on the type.
//!   Session messages use [`SessionSubtype`], errors use [`ErrorCode`].
//!
//! Encoding and decoding are a bijection over this layout. Decoding never
//! fails: an extra value with no meaning for its type decodes as
//! [`Subtype::Unknown`].

use std::fmt;

use crate::ProtocolError;

const ROLE_MASK: u16 = 0b1;
const TYPE_SHIFT: u16 = 1;
const TYPE_MASK: u16 = 0b11 << TYPE_SHIFT;

/// Bit position of the extra field.
pub const EXTRA_SHIFT: u16 = 3;
/// Largest value the extra field can hold.
pub const MAX_EXTRA: u16 = u16::MAX >> EXTRA_SHIFT;

// ---------------------------------------------------------------------------
// Field types
// ---------------------------------------------------------------------------

/// Who a message comes from, as far as authority goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// A regular player.
    Ordinary,
    /// The Source-of-Truth, or the server itself.
    SourceOfTruth,
}

/// What a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A full or partial state update.
    Update = 0,
    /// A player-issued command.
    Command = 1,
    /// Session management (join handshake and its reply).
    Session = 2,
    /// An error reply.
    Error = 3,
}

impl MessageType {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Self::Update,
            1 => Self::Command,
            2 => Self::Session,
            _ => Self::Error,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Update => "UPD",
            Self::Command => "COM",
            Self::Session => "SES",
            Self::Error => "ERR",
        }
    }
}

/// Subtypes of [`MessageType::Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionSubtype {
    /// Client to server: request to join a session.
    Connected = 0,
    /// Server to client: the join was accepted.
    Accepted = 1,
}

/// Subtypes of [`MessageType::Error`], named after HTTP status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// 400: the message was malformed or unexpected.
    BadRequest = 0,
    /// 403: the sender is not allowed to do that.
    Forbidden = 1,
    /// 404: no such session, or not on its allow-list.
    NotFound = 2,
}

impl ErrorCode {
    /// Returns the HTTP-style status number.
    pub fn status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
        }
    }
}

/// The extra field interpreted relative to its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subtype {
    /// Update and Command messages define no subtypes.
    None,
    Session(SessionSubtype),
    Error(ErrorCode),
    /// An extra value with no meaning for the mark's type.
    Unknown(u16),
}

// ---------------------------------------------------------------------------
// MessageMark
// ---------------------------------------------------------------------------

/// A 16-bit message header. See the module docs for the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageMark(u16);

impl MessageMark {
    pub const UPDATE: Self = Self::raw(MessageType::Update, 0);
    pub const COMMAND: Self = Self::raw(MessageType::Command, 0);
    pub const CONNECTED: Self =
        Self::raw(MessageType::Session, SessionSubtype::Connected as u16);
    pub const ACCEPTED: Self =
        Self::raw(MessageType::Session, SessionSubtype::Accepted as u16);
    /// A bare error. Shares its bits with [`MessageMark::ERROR_400`].
    pub const ERROR: Self = Self::raw(MessageType::Error, 0);
    pub const ERROR_400: Self =
        Self::raw(MessageType::Error, ErrorCode::BadRequest as u16);
    pub const ERROR_403: Self =
        Self::raw(MessageType::Error, ErrorCode::Forbidden as u16);
    pub const ERROR_404: Self =
        Self::raw(MessageType::Error, ErrorCode::NotFound as u16);

    const fn raw(ty: MessageType, extra: u16) -> Self {
        Self(((ty as u16) << TYPE_SHIFT) | (extra << EXTRA_SHIFT))
    }

    /// Encodes a mark from its three fields.
    ///
    /// # Errors
    /// Returns [`ProtocolError::ExtraOutOfRange`] if `extra` exceeds
    /// [`MAX_EXTRA`].
    pub fn new(
        role: Role,
        ty: MessageType,
        extra: u16,
    ) -> Result<Self, ProtocolError> {
        if extra > MAX_EXTRA {
            return Err(ProtocolError::ExtraOutOfRange(extra));
        }
        Ok(Self::raw(ty, extra).with_role(role))
    }

    /// Wraps raw header bits. Every `u16` is a valid mark.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Returns the raw header bits.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Decodes the mark into `(role, type, extra)`.
    pub fn decode(self) -> (Role, MessageType, u16) {
        (self.role(), self.message_type(), self.extra())
    }

    pub fn role(self) -> Role {
        if self.0 & ROLE_MASK != 0 {
            Role::SourceOfTruth
        } else {
            Role::Ordinary
        }
    }

    pub fn is_source_of_truth(self) -> bool {
        self.role() == Role::SourceOfTruth
    }

    pub fn message_type(self) -> MessageType {
        MessageType::from_bits((self.0 & TYPE_MASK) >> TYPE_SHIFT)
    }

    pub fn extra(self) -> u16 {
        self.0 >> EXTRA_SHIFT
    }

    /// Interprets the extra field relative to the type field.
    pub fn subtype(self) -> Subtype {
        match (self.message_type(), self.extra()) {
            (MessageType::Update | MessageType::Command, 0) => Subtype::None,
            (MessageType::Session, 0) => {
                Subtype::Session(SessionSubtype::Connected)
            }
            (MessageType::Session, 1) => {
                Subtype::Session(SessionSubtype::Accepted)
            }
            (MessageType::Error, 0) => Subtype::Error(ErrorCode::BadRequest),
            (MessageType::Error, 1) => Subtype::Error(ErrorCode::Forbidden),
            (MessageType::Error, 2) => Subtype::Error(ErrorCode::NotFound),
            (_, extra) => Subtype::Unknown(extra),
        }
    }

    /// Returns the same mark with the role bit set as given.
    pub const fn with_role(self, role: Role) -> Self {
        match role {
            Role::Ordinary => Self(self.0 & !ROLE_MASK),
            Role::SourceOfTruth => Self(self.0 | ROLE_MASK),
        }
    }

    /// Shorthand for `with_role(Role::SourceOfTruth)`, used on replies.
    pub const fn server(self) -> Self {
        self.with_role(Role::SourceOfTruth)
    }

    /// Human-readable description, e.g. `SOT,SES,ACC:0000000000001101`.
    ///
    /// Unknown subtypes and the unset role print as `-0-`.
    pub fn describe(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MessageMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role() {
            Role::SourceOfTruth => "SOT",
            Role::Ordinary => "-0-",
        };
        let subtype = match self.subtype() {
            Subtype::Session(SessionSubtype::Connected) => "CON",
            Subtype::Session(SessionSubtype::Accepted) => "ACC",
            Subtype::Error(ErrorCode::BadRequest) => "400",
            Subtype::Error(ErrorCode::Forbidden) => "403",
            Subtype::Error(ErrorCode::NotFound) => "404",
            Subtype::None | Subtype::Unknown(_) => "-0-",
        };
        write!(
            f,
            "{role},{},{subtype}:{:016b}",
            self.message_type().label(),
            self.0
        )
    }
}

impl From<u16> for MessageMark {
    fn from(bits: u16) -> Self {
        Self(bits)
    }
}

impl From<MessageMark> for u16 {
    fn from(mark: MessageMark) -> Self {
        mark.0
    }
}

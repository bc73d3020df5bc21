//! Session management for Tidesync.
//!
//! This crate holds everything that happens inside one game room:
//!
//! 1. **The plugin contract**: what a game supplies ([`Behaviour`])
//! 2. **The state machine**: who is in the room, who holds authority,
//!    and how joins, updates, commands and disconnects are handled
//!    ([`Session`])
//! 3. **Reconnection**: a disconnected player keeps their entry for a
//!    configurable grace period ([`SessionConfig`], [`PendingRemoval`],
//!    [`Expiry`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Router Layer (above)  ← owns sessions, routes connections to them
//!     ↕
//! Session Layer (this crate)  ← roster, authority, behaviour state
//!     ↕
//! Protocol Layer (below)  ← MessageMark, Message, delta sync
//! ```

mod behaviour;
mod error;
mod session;
mod types;

pub use behaviour::{Behaviour, CommandOutcome};
pub use error::SessionError;
pub use session::{Player, Session};
pub use types::{
    Expiry, PendingRemoval, PlayerId, SessionConfig, SessionId,
    SessionSummary,
};

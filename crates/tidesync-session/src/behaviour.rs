//! The `Behaviour` trait: the plugin a game supplies.
//!
//! Tidesync does not know what a game's state looks like. A behaviour
//! defines it, and tells a [`Session`](crate::Session) how to:
//!
//! - build the initial state ([`Behaviour::default_state`])
//! - encode a full snapshot ([`Behaviour::full_message`])
//! - merge an incoming update ([`Behaviour::apply_update`])
//! - react to a player joining ([`Behaviour::on_new_connection`])
//! - turn a player command into an echo plus a delta
//!   ([`Behaviour::extract_command`])
//!
//! Only the first two are required. The hooks return `None` for "nothing
//! changed" by default, so a behaviour that only relays snapshots is a
//! few lines long.
//!
//! A behaviour may mutate the state it is handed and nothing else. The
//! messages it returns are sent as-is; the reader it is given is dropped
//! after the call.

use tidesync_protocol::{Message, MessageMark, MessageReader, ProtocolError};
use tidesync_transport::ConnectionId;

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Echo sent reliably to every player except the sender.
    pub command: Message,
    /// State delta sent unreliably to every player, sender included.
    pub update: Message,
}

/// A game's state-sync strategy.
///
/// # Trait bounds
///
/// One behaviour instance is shared by every session of a router, and
/// the router runs on its own task, so behaviours are `Send + Sync +
/// 'static`. Per-session data belongs in [`Behaviour::State`].
///
/// # Example
///
/// ```rust
/// use tidesync_protocol::{Message, MessageReader, ProtocolError};
/// use tidesync_session::Behaviour;
/// use tidesync_transport::ConnectionId;
///
/// /// Keeps a single counter that the Source-of-Truth overwrites.
/// struct Counter;
///
/// impl Behaviour for Counter {
///     type State = i32;
///
///     fn default_state(&self) -> i32 {
///         0
///     }
///
///     fn full_message(&self, state: &i32) -> Message {
///         Message::new().add_i32(*state)
///     }
///
///     fn apply_update(
///         &self,
///         reader: &mut MessageReader,
///         _sender: ConnectionId,
///         state: &mut i32,
///     ) -> Result<Option<Message>, ProtocolError> {
///         let value = reader.get_i32()?;
///         if value == *state {
///             return Ok(None);
///         }
///         *state = value;
///         Ok(Some(Message::new().add_i32(value)))
///     }
///
///     fn on_new_connection(
///         &self,
///         _connection: ConnectionId,
///         _state: &mut i32,
///     ) -> Option<Message> {
///         Some(Message::new())
///     }
/// }
/// ```
pub trait Behaviour: Send + Sync + 'static {
    /// The per-session game state.
    type State: Send + 'static;

    /// Creates the state a new session starts with.
    fn default_state(&self) -> Self::State;

    /// Encodes the whole state. Sent to everyone after a join and after
    /// a player is removed.
    fn full_message(&self, state: &Self::State) -> Message;

    /// Merges an update into `state`.
    ///
    /// Returns the snapshot to broadcast, or `None` if nothing changed.
    ///
    /// # Errors
    /// A malformed payload. The sender gets a `400`.
    fn apply_update(
        &self,
        reader: &mut MessageReader,
        sender: ConnectionId,
        state: &mut Self::State,
    ) -> Result<Option<Message>, ProtocolError> {
        let _ = (reader, sender, state);
        Ok(None)
    }

    /// Reacts to a player joining.
    ///
    /// `Some(side_effect)` accepts the join; the side effect is the
    /// payload of the `Accepted` reply. `None` answers with an error.
    /// The join itself stands either way.
    fn on_new_connection(
        &self,
        connection: ConnectionId,
        state: &mut Self::State,
    ) -> Option<Message> {
        let _ = (connection, state);
        None
    }

    /// Extracts a command issued by `sender`.
    ///
    /// Returns `None` if the command changed nothing.
    ///
    /// # Errors
    /// A malformed payload. The sender gets a `400`.
    fn extract_command(
        &self,
        reader: &mut MessageReader,
        mark: MessageMark,
        sender: ConnectionId,
        state: &mut Self::State,
    ) -> Result<Option<CommandOutcome>, ProtocolError> {
        let _ = (reader, mark, sender, state);
        Ok(None)
    }
}

//! Two-player Pong synchronized through delta-masked updates.
//!
//! The Source-of-Truth client simulates the game and pushes partial
//! states; the server merges them field by field and relays only what
//! it confirmed.

use tidesync::prelude::*;
use tidesync::protocol::{apply, deserialize, serialize};

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

const IDLE: &str = "Idle";

/// Fields in bit order 0..=7.
#[derive(Debug, Clone, PartialEq)]
pub struct PongState {
    pub packed_ball_xy: i64,
    pub packed_ball_velocity: i64,
    pub left_paddle_y: f32,
    pub right_paddle_y: f32,
    pub left_paddle_direction: String,
    pub right_paddle_direction: String,
    pub score: (i32, i32),
    /// Sent as `""` when unset.
    pub guest_id: Option<String>,
}

impl Default for PongState {
    fn default() -> Self {
        Self {
            packed_ball_xy: 0,
            packed_ball_velocity: 0,
            left_paddle_y: 0.0,
            right_paddle_y: 0.0,
            left_paddle_direction: IDLE.to_string(),
            right_paddle_direction: IDLE.to_string(),
            score: (0, 0),
            guest_id: None,
        }
    }
}

impl DeltaState for PongState {
    const FIELD_COUNT: u8 = 8;

    fn write_field(
        &self,
        field: u8,
        msg: Message,
    ) -> Result<Message, ProtocolError> {
        match field {
            0 => Ok(msg.add_i64(self.packed_ball_xy)),
            1 => Ok(msg.add_i64(self.packed_ball_velocity)),
            2 => Ok(msg.add_f32(self.left_paddle_y)),
            3 => Ok(msg.add_f32(self.right_paddle_y)),
            4 => msg.add_str(&self.left_paddle_direction),
            5 => msg.add_str(&self.right_paddle_direction),
            6 => Ok(msg.add_i32(self.score.0).add_i32(self.score.1)),
            _ => msg.add_str(self.guest_id.as_deref().unwrap_or("")),
        }
    }

    fn read_field(
        &mut self,
        field: u8,
        reader: &mut MessageReader,
    ) -> Result<(), ProtocolError> {
        match field {
            0 => self.packed_ball_xy = reader.get_i64()?,
            1 => self.packed_ball_velocity = reader.get_i64()?,
            2 => self.left_paddle_y = reader.get_f32()?,
            3 => self.right_paddle_y = reader.get_f32()?,
            4 => self.left_paddle_direction = reader.get_str()?,
            5 => self.right_paddle_direction = reader.get_str()?,
            6 => self.score = (reader.get_i32()?, reader.get_i32()?),
            _ => {
                let guest = reader.get_str()?;
                self.guest_id = (!guest.is_empty()).then_some(guest);
            }
        }
        Ok(())
    }

    fn field_eq(&self, other: &Self, field: u8) -> bool {
        match field {
            0 => self.packed_ball_xy == other.packed_ball_xy,
            1 => self.packed_ball_velocity == other.packed_ball_velocity,
            2 => self.left_paddle_y == other.left_paddle_y,
            3 => self.right_paddle_y == other.right_paddle_y,
            4 => self.left_paddle_direction == other.left_paddle_direction,
            5 => self.right_paddle_direction == other.right_paddle_direction,
            6 => self.score == other.score,
            _ => self.guest_id == other.guest_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Behaviour
// ---------------------------------------------------------------------------

pub struct PongBehaviour;

impl Behaviour for PongBehaviour {
    type State = PongState;

    fn default_state(&self) -> PongState {
        PongState::default()
    }

    fn full_message(&self, state: &PongState) -> Message {
        // The full mask writes every field; only an oversized string fails.
        serialize(state, PongState::full_mask()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "pong state too large, sending empty mask");
            Message::new().add_u8(0)
        })
    }

    fn apply_update(
        &self,
        reader: &mut MessageReader,
        sender: ConnectionId,
        state: &mut PongState,
    ) -> Result<Option<Message>, ProtocolError> {
        let (in_mask, incoming) = deserialize::<PongState>(reader)?;
        let out_mask = apply(state, &incoming, in_mask);
        tracing::debug!(%sender, ?in_mask, ?out_mask, "pong update merged");
        if out_mask.is_empty() {
            return Ok(None);
        }
        serialize(state, out_mask).map(Some)
    }

    fn on_new_connection(
        &self,
        _connection: ConnectionId,
        _state: &mut PongState,
    ) -> Option<Message> {
        Some(Message::new())
    }
}

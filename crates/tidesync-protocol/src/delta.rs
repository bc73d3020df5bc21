//! Delta-masked state synchronization.
//!
//! A state with up to eight fields is sent as one mask byte followed by
//! only the fields whose bit is set, in field order:
//!
//! ```text
//! ┌──────┬─────────┬─────────┬─────┐
//! │ mask │ field a │ field b │ ... │   (a < b, both selected in mask)
//! └──────┴─────────┴─────────┴─────┘
//! ```
//!
//! Field `i` owns bit `i` of the mask. A full snapshot selects every
//! field. Unselected fields cost zero bytes and decode to their default.
//!
//! [`apply`] merges an incoming partial state against a resident one and
//! reports which selected fields were confirmed. A field is confirmed
//! only when the incoming value already equals the resident value. A
//! differing value is rejected and its bit cleared. The resident state is
//! never modified. An empty result means nothing to broadcast.

use std::fmt;

use crate::{Message, MessageReader, ProtocolError};

/// Maximum number of fields a mask byte can address.
pub const MAX_FIELDS: u8 = 8;

// ---------------------------------------------------------------------------
// FieldMask
// ---------------------------------------------------------------------------

/// A presence bitmap over a state's fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldMask(u8);

impl FieldMask {
    pub const EMPTY: Self = Self(0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Selects the first `count` fields. Counts above eight saturate.
    pub const fn all(count: u8) -> Self {
        if count >= MAX_FIELDS {
            Self(u8::MAX)
        } else {
            Self((1u8 << count) - 1)
        }
    }

    /// Selects one field. Indices of eight or more select nothing.
    pub const fn single(field: u8) -> Self {
        if field >= MAX_FIELDS {
            Self::EMPTY
        } else {
            Self(1 << field)
        }
    }

    pub const fn contains(self, field: u8) -> bool {
        field < MAX_FIELDS && self.0 & (1 << field) != 0
    }

    pub const fn with(self, field: u8) -> Self {
        Self(self.0 | Self::single(field).0)
    }

    pub const fn without(self, field: u8) -> Self {
        Self(self.0 & !Self::single(field).0)
    }

    pub const fn intersect(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of selected fields.
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }

    /// Selected field indices, ascending.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (0..MAX_FIELDS).filter(move |&field| self.contains(field))
    }
}

impl fmt::Debug for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldMask({:#010b})", self.0)
    }
}

// ---------------------------------------------------------------------------
// DeltaState
// ---------------------------------------------------------------------------

/// A fixed-shape state that can be synchronized field by field.
///
/// Implementors number their fields `0..FIELD_COUNT` and must read and
/// write each field with the same encoding. `Default` supplies the value
/// unselected fields take after [`deserialize`].
pub trait DeltaState: Default {
    /// Number of fields, at most [`MAX_FIELDS`].
    const FIELD_COUNT: u8;

    /// Appends field `field` to `msg`.
    fn write_field(
        &self,
        field: u8,
        msg: Message,
    ) -> Result<Message, ProtocolError>;

    /// Reads field `field` from `reader` into `self`.
    fn read_field(
        &mut self,
        field: u8,
        reader: &mut MessageReader,
    ) -> Result<(), ProtocolError>;

    /// Returns `true` if field `field` holds the same value in both states.
    fn field_eq(&self, other: &Self, field: u8) -> bool;

    /// Mask selecting every field.
    fn full_mask() -> FieldMask {
        FieldMask::all(Self::FIELD_COUNT)
    }
}

/// Encodes the fields of `state` selected by `mask`.
///
/// Bits beyond the state's field count are dropped before writing, so the
/// mask byte on the wire always matches the payload.
pub fn serialize<S: DeltaState>(
    state: &S,
    mask: FieldMask,
) -> Result<Message, ProtocolError> {
    let mask = mask.intersect(S::full_mask());
    let mut msg = Message::new().add_u8(mask.bits());
    for field in mask.iter() {
        msg = state.write_field(field, msg)?;
    }
    Ok(msg)
}

/// Decodes a mask byte and the fields it selects.
///
/// # Errors
/// Fails on truncated input, or if the mask selects a field the state
/// does not define.
pub fn deserialize<S: DeltaState>(
    reader: &mut MessageReader,
) -> Result<(FieldMask, S), ProtocolError> {
    let mask = FieldMask::from_bits(reader.get_u8()?);
    if mask.intersect(S::full_mask()) != mask {
        return Err(ProtocolError::UnknownFields {
            mask: mask.bits(),
            field_count: S::FIELD_COUNT,
        });
    }
    let mut state = S::default();
    for field in mask.iter() {
        state.read_field(field, reader)?;
    }
    Ok((mask, state))
}

/// Merges `incoming` against `resident` for the fields in `in_mask`.
///
/// Returns the confirmed fields: those selected in `in_mask` whose
/// incoming value equals the resident one. Fields outside `in_mask` are
/// never selected in the result.
pub fn apply<S: DeltaState>(
    resident: &S,
    incoming: &S,
    in_mask: FieldMask,
) -> FieldMask {
    in_mask
        .intersect(S::full_mask())
        .iter()
        .filter(|&field| resident.field_eq(incoming, field))
        .fold(FieldMask::EMPTY, FieldMask::with)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Three-field state used to exercise the algorithm.
    #[derive(Debug, Clone, Default, PartialEq)]
    struct Probe {
        a: i32,
        b: String,
        c: bool,
    }

    impl DeltaState for Probe {
        const FIELD_COUNT: u8 = 3;

        fn write_field(
            &self,
            field: u8,
            msg: Message,
        ) -> Result<Message, ProtocolError> {
            match field {
                0 => Ok(msg.add_i32(self.a)),
                1 => msg.add_str(&self.b),
                _ => Ok(msg.add_bool(self.c)),
            }
        }

        fn read_field(
            &mut self,
            field: u8,
            reader: &mut MessageReader,
        ) -> Result<(), ProtocolError> {
            match field {
                0 => self.a = reader.get_i32()?,
                1 => self.b = reader.get_str()?,
                _ => self.c = reader.get_bool()?,
            }
            Ok(())
        }

        fn field_eq(&self, other: &Self, field: u8) -> bool {
            match field {
                0 => self.a == other.a,
                1 => self.b == other.b,
                _ => self.c == other.c,
            }
        }
    }

    fn probe() -> Probe {
        Probe {
            a: 12,
            b: "left".into(),
            c: true,
        }
    }

    // =======================================================================
    // FieldMask
    // =======================================================================

    #[test]
    fn test_field_mask_all_selects_first_n() {
        assert_eq!(FieldMask::all(3).bits(), 0b111);
        assert_eq!(FieldMask::all(8).bits(), 0xFF);
        assert_eq!(FieldMask::all(0), FieldMask::EMPTY);
    }

    #[test]
    fn test_field_mask_with_without_and_iter() {
        let mask = FieldMask::EMPTY.with(0).with(5).with(2).without(0);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![2, 5]);
        assert_eq!(mask.len(), 2);
        assert!(!mask.contains(9));
    }

    // =======================================================================
    // serialize / deserialize
    // =======================================================================

    #[test]
    fn test_serialize_full_mask_roundtrip_reproduces_state() {
        let state = probe();
        let msg = serialize(&state, Probe::full_mask()).unwrap();
        let (mask, decoded) =
            deserialize::<Probe>(&mut MessageReader::from(msg)).unwrap();
        assert_eq!(mask, Probe::full_mask());
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_serialize_partial_mask_writes_only_selected_fields() {
        let msg = serialize(&probe(), FieldMask::single(2)).unwrap();
        assert_eq!(msg.as_bytes(), &[0b100, 1]);
    }

    #[test]
    fn test_serialize_drops_bits_beyond_field_count() {
        let msg =
            serialize(&probe(), FieldMask::from_bits(0b1000_0001)).unwrap();
        assert_eq!(msg.as_bytes(), &[0b001, 12, 0, 0, 0]);
    }

    #[test]
    fn test_deserialize_partial_leaves_defaults() {
        let msg = serialize(&probe(), FieldMask::single(1)).unwrap();
        let (mask, decoded) =
            deserialize::<Probe>(&mut MessageReader::from(msg)).unwrap();
        assert_eq!(mask, FieldMask::single(1));
        assert_eq!(decoded.a, 0);
        assert_eq!(decoded.b, "left");
        assert!(!decoded.c);
    }

    #[test]
    fn test_deserialize_unknown_field_bit_returns_error() {
        let msg = Message::new().add_u8(0b1000);
        let result = deserialize::<Probe>(&mut MessageReader::from(msg));
        assert!(matches!(
            result,
            Err(ProtocolError::UnknownFields { mask: 0b1000, field_count: 3 })
        ));
    }

    #[test]
    fn test_deserialize_truncated_returns_error() {
        let msg = Message::new().add_u8(0b001).add_u8(1);
        let result = deserialize::<Probe>(&mut MessageReader::from(msg));
        assert!(matches!(result, Err(ProtocolError::UnexpectedEnd { .. })));
    }

    // =======================================================================
    // apply
    // =======================================================================

    #[test]
    fn test_apply_equal_field_keeps_bit() {
        let resident = probe();
        let incoming = probe();
        for field in 0..Probe::FIELD_COUNT {
            let out = apply(&resident, &incoming, FieldMask::single(field));
            assert_eq!(out, FieldMask::single(field));
        }
    }

    #[test]
    fn test_apply_differing_field_clears_bit_and_keeps_resident() {
        let resident = probe();
        let incoming = Probe {
            a: 99,
            ..probe()
        };
        let out = apply(&resident, &incoming, FieldMask::single(0));
        assert!(out.is_empty());
        assert_eq!(resident.a, 12);
    }

    #[test]
    fn test_apply_unselected_fields_never_in_output() {
        let resident = probe();
        let incoming = probe();
        let out = apply(&resident, &incoming, FieldMask::single(1));
        assert_eq!(out, FieldMask::single(1));
    }

    #[test]
    fn test_apply_mixed_mask_reports_confirmed_subset() {
        let resident = probe();
        let incoming = Probe {
            a: 12,
            b: "right".into(),
            c: true,
        };
        let out = apply(&resident, &incoming, Probe::full_mask());
        assert_eq!(out.iter().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_apply_ignores_bits_beyond_field_count() {
        let out = apply(&probe(), &probe(), FieldMask::from_bits(0xFF));
        assert_eq!(out, Probe::full_mask());
    }
}

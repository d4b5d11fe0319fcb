//! Binary encode/decode for the link protocol.
//!
//! All integers and doubles are big-endian. Every frame starts with an
//! `i32` opcode. Percept frames carry no length prefix: both ends agree on
//! the observation dimension out of band.
//!
//! | Opcode | Body | Reply |
//! |--------|------|-------|
//! | `1` send percept, receive action | `dim` × f64 | i32 action |
//! | `2` disconnect | none | none |
//! | `3` policy update | i32 count, count × (i64 state, i32 action) | none |

use tether_core::{ActionId, LinkError, Observation, StateId, TablePolicy};

use crate::transport::Transport;

/// Opcode: synchronous observation/action exchange.
pub const OP_SEND_PERCEPT_RECEIVE_ACTION: i32 = 1;
/// Opcode: session end.
pub const OP_DISCONNECT: i32 = 2;
/// Opcode: policy table pushed down the side channel.
pub const OP_POLICY_UPDATE: i32 = 3;

/// Largest policy table accepted off the wire.
pub const MAX_POLICY_ENTRIES: usize = 1 << 24;

/// A decoded frame opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// Observation follows; an action reply is expected.
    SendPerceptReceiveAction,
    /// The sender is ending the session.
    Disconnect,
    /// A policy table follows.
    PolicyUpdate,
}

impl Opcode {
    /// The wire value.
    pub fn code(self) -> i32 {
        match self {
            Self::SendPerceptReceiveAction => OP_SEND_PERCEPT_RECEIVE_ACTION,
            Self::Disconnect => OP_DISCONNECT,
            Self::PolicyUpdate => OP_POLICY_UPDATE,
        }
    }
}

impl TryFrom<i32> for Opcode {
    type Error = LinkError;

    fn try_from(found: i32) -> Result<Self, LinkError> {
        match found {
            OP_SEND_PERCEPT_RECEIVE_ACTION => Ok(Self::SendPerceptReceiveAction),
            OP_DISCONNECT => Ok(Self::Disconnect),
            OP_POLICY_UPDATE => Ok(Self::PolicyUpdate),
            _ => Err(LinkError::UnknownOpcode { found }),
        }
    }
}

// ── Primitive writers ───────────────────────────────────────────

/// Append a big-endian i32.
pub fn put_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Append a big-endian i64.
pub fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

/// Append a big-endian f64.
pub fn put_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

// ── Primitive readers ───────────────────────────────────────────

fn receive_array<const N: usize>(t: &mut dyn Transport) -> Result<[u8; N], LinkError> {
    let bytes = t.receive(N)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| LinkError::MalformedFrame {
            detail: format!("transport returned {} bytes, expected {N}", bytes.len()),
        })
}

/// Read a big-endian i32.
pub fn read_i32(t: &mut dyn Transport) -> Result<i32, LinkError> {
    Ok(i32::from_be_bytes(receive_array(t)?))
}

/// Read a big-endian i64.
pub fn read_i64(t: &mut dyn Transport) -> Result<i64, LinkError> {
    Ok(i64::from_be_bytes(receive_array(t)?))
}

/// Read a big-endian f64.
pub fn read_f64(t: &mut dyn Transport) -> Result<f64, LinkError> {
    Ok(f64::from_be_bytes(receive_array(t)?))
}

/// Read and decode a frame opcode.
pub fn read_opcode(t: &mut dyn Transport) -> Result<Opcode, LinkError> {
    Opcode::try_from(read_i32(t)?)
}

// ── Frames ──────────────────────────────────────────────────────

/// Encode a percept frame: opcode followed by the raw observation values.
pub fn encode_percept(observation: &Observation) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + 8 * observation.len());
    put_i32(&mut buf, OP_SEND_PERCEPT_RECEIVE_ACTION);
    for &v in observation.as_slice() {
        put_f64(&mut buf, v);
    }
    buf
}

/// Read a percept body of `dim` values (the opcode already consumed).
pub fn read_percept_body(t: &mut dyn Transport, dim: usize) -> Result<Observation, LinkError> {
    let bytes = t.receive(dim * 8)?;
    if bytes.len() != dim * 8 {
        return Err(LinkError::MalformedFrame {
            detail: format!("percept body is {} bytes, expected {}", bytes.len(), dim * 8),
        });
    }
    let values = bytes
        .chunks_exact(8)
        .map(|c| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(c);
            f64::from_be_bytes(raw)
        })
        .collect();
    Ok(Observation::new(values))
}

/// Encode an action reply.
pub fn encode_action(action: ActionId) -> Result<Vec<u8>, LinkError> {
    let code = i32::try_from(action.0).map_err(|_| LinkError::MalformedFrame {
        detail: format!("action {action} does not fit an i32"),
    })?;
    let mut buf = Vec::with_capacity(4);
    put_i32(&mut buf, code);
    Ok(buf)
}

/// Read an action reply.
pub fn read_action(t: &mut dyn Transport) -> Result<ActionId, LinkError> {
    let raw = read_i32(t)?;
    u32::try_from(raw)
        .map(ActionId)
        .map_err(|_| LinkError::MalformedFrame {
            detail: format!("negative action id {raw}"),
        })
}

/// Encode a disconnect frame.
pub fn encode_disconnect() -> Vec<u8> {
    OP_DISCONNECT.to_be_bytes().to_vec()
}

/// Encode a policy update frame. Entries are written in table order.
pub fn encode_policy_update(table: &TablePolicy) -> Result<Vec<u8>, LinkError> {
    let count = i32::try_from(table.len()).map_err(|_| LinkError::MalformedFrame {
        detail: format!("policy table has {} entries", table.len()),
    })?;
    let mut buf = Vec::with_capacity(8 + 12 * table.len());
    put_i32(&mut buf, OP_POLICY_UPDATE);
    put_i32(&mut buf, count);
    for (state, action) in table.iter() {
        let state = i64::try_from(state.0).map_err(|_| LinkError::MalformedFrame {
            detail: format!("state {state} does not fit an i64"),
        })?;
        let action = i32::try_from(action.0).map_err(|_| LinkError::MalformedFrame {
            detail: format!("action {action} does not fit an i32"),
        })?;
        put_i64(&mut buf, state);
        put_i32(&mut buf, action);
    }
    Ok(buf)
}

/// Read a policy update body (the opcode already consumed).
pub fn read_policy_body(t: &mut dyn Transport) -> Result<TablePolicy, LinkError> {
    let count = read_i32(t)?;
    let count = usize::try_from(count)
        .ok()
        .filter(|&n| n <= MAX_POLICY_ENTRIES)
        .ok_or_else(|| LinkError::MalformedFrame {
            detail: format!("policy entry count {count} out of range"),
        })?;
    let mut table = TablePolicy::new();
    for _ in 0..count {
        let state = read_i64(t)?;
        let action = read_i32(t)?;
        let (Ok(state), Ok(action)) = (u64::try_from(state), u32::try_from(action)) else {
            return Err(LinkError::MalformedFrame {
                detail: format!("negative policy entry ({state}, {action})"),
            });
        };
        table.insert(StateId(state), ActionId(action));
    }
    Ok(table)
}

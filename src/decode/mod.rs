//! State decoders
//!
//! Each decoder turns one payload into a typed partial update without touching
//! shared state; [`Update::apply`] then writes the fields into a [`SpaState`].
//! Payload lengths are checked before any offset is read.

pub mod change;
pub mod jacuzzi;
pub mod sundance;

pub use self::change::ChangeDetector;

use crate::core::DecodeError;
use crate::protocol::{MessageKind, Topology};
use crate::session::SpaState;

/// Decoder entry point carried by a dialect table
pub type DecodeFn = fn(MessageKind, &[u8], &Topology) -> Result<Option<Update>, DecodeError>;

/// Partial state update produced by a decoder
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    JacuzziStatus(jacuzzi::Status),
    JacuzziLight(jacuzzi::Light),
    PrimaryFilter(jacuzzi::PrimaryFilter),
    SecondaryFilter(jacuzzi::SecondaryFilter),
    PumpState(jacuzzi::PumpState),
    SetupParams(jacuzzi::SetupParams),
    SystemInfo(jacuzzi::SystemInfo),
    ModuleIdent(jacuzzi::ModuleIdent),
    SundanceStatus(sundance::Status),
    SundanceLight(sundance::Light),
}

impl Update {
    /// Writes the decoded fields into `state`
    pub fn apply(&self, state: &mut SpaState) {
        match self {
            Update::JacuzziStatus(u) => u.apply(state),
            Update::JacuzziLight(u) => u.apply(state),
            Update::PrimaryFilter(u) => u.apply(state),
            Update::SecondaryFilter(u) => u.apply(state),
            Update::PumpState(u) => u.apply(state),
            Update::SetupParams(u) => u.apply(state),
            Update::SystemInfo(u) => u.apply(state),
            Update::ModuleIdent(u) => u.apply(state),
            Update::SundanceStatus(u) => u.apply(state),
            Update::SundanceLight(u) => u.apply(state),
        }
    }
}

/// Reads a big-endian pair of bytes
pub(crate) fn word(payload: &[u8], index: usize) -> u16 {
    (payload[index] as u16) << 8 | payload[index + 1] as u16
}

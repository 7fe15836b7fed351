//! Protocol implementation module
//!
//! Framing and checksum of the RS485 bus messages, the dialect tables that
//! give type bytes their meaning, and the channel arbitration state machine.

pub mod arbitration;
pub mod checksum;
pub mod codec;
pub mod dialect;
pub mod message;

pub use self::arbitration::{Action, ArbitrationConfig, ArbitrationPhase, Arbiter};
pub use self::checksum::crc8;
pub use self::codec::{decode, encode, Frame, FrameCodec};
pub use self::dialect::{CommandStyle, DialectTable, Topology};
pub use self::message::MessageKind;

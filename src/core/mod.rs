//! Core types shared by the spa protocol engine
//!
//! This module contains the error taxonomy, the configuration and the
//! small value types used by every other layer.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{DecodeError, Error, FrameError, Result};
pub use self::types::{
    ChangeDetection,
    ClockFormat,
    ConnectionState,
    Dialect,
    SessionConfig,
    TempScale,
};

/// Start and end sentinel of every frame
pub const START_END: u8 = 0x7E;

/// Device flag carried by every frame we send
pub const DEVICE_FLAG: u8 = 0xBF;

/// Smallest legal length byte (no payload)
pub const MIN_FRAME_LEN: u8 = 5;

/// Largest length byte accepted from the bus
pub const MAX_FRAME_LEN: u8 = 128;

/// Number of pump slots a controller can report
pub const MAX_PUMPS: usize = 6;

/// Number of light slots a controller can report
pub const MAX_LIGHTS: usize = 2;

/// Default button-press cycles before claiming a channel
pub const DEFAULT_PROBE_THRESHOLD: u8 = 5;

//! Dialect tables
//!
//! Jacuzzi and Sundance controllers share the arbitration protocol but overlay
//! their own message types and payload layouts on it. Everything that differs
//! between them is captured in a [`DialectTable`] selected once per session.

use std::fmt;

use crate::core::{ChangeDetection, ClockFormat, Dialect, TempScale, MAX_PUMPS};
use crate::decode::{self, DecodeFn};
use super::checksum::crc8;
use super::codec::ChecksumFn;
use super::message::{types, MessageKind};

/// How commands reach the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStyle {
    /// Fully formed command frames
    DirectFrames,
    /// Emulated panel button presses reconciled against status updates
    ButtonPresses,
}

/// Inclusive set point limits for both scales
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempLimits {
    pub celsius: (f64, f64),
    pub fahrenheit: (f64, f64),
}

impl TempLimits {
    /// Limits for the given scale
    pub fn range(&self, scale: TempScale) -> (f64, f64) {
        match scale {
            TempScale::Celsius => self.celsius,
            TempScale::Fahrenheit => self.fahrenheit,
        }
    }

    /// Whether `value` is an acceptable set point in `scale`
    pub fn contains(&self, scale: TempScale, value: f64) -> bool {
        let (min, max) = self.range(scale);
        value >= min && value <= max
    }
}

/// Hardware assumed for a controller family until the bus says otherwise
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Topology {
    /// Highest state of each pump; 0 means the pump is absent
    pub pumps: [u8; MAX_PUMPS],
    /// Number of lights controllable from the panel
    pub lights: usize,
    /// Whether a circulation pump is fitted
    pub circulation_pump: bool,
    pub temp_scale: TempScale,
    pub clock_format: ClockFormat,
    pub limits: TempLimits,
}

/// Everything that differs between the protocol dialects
pub struct DialectTable {
    pub dialect: Dialect,
    pub name: &'static str,
    pub default_port: u16,
    /// Type byte to semantic tag
    pub message_types: &'static [(u8, MessageKind)],
    pub checksum: ChecksumFn,
    /// Payload decoder for the non-arbitration kinds
    pub decoder: DecodeFn,
    /// Default change detection, overridable per session
    pub change_detection: ChangeDetection,
    pub command_style: CommandStyle,
    pub topology: Topology,
    /// Type and payload of the frame declining an empty transmit slot
    pub idle_message: (u8, &'static [u8]),
}

const BASE_TYPES: [(u8, MessageKind); 8] = [
    (types::CLIENT_CLEAR_TO_SEND, MessageKind::ClientClearToSend),
    (types::CHANNEL_ASSIGNMENT_REQUEST, MessageKind::ChannelAssignmentRequest),
    (types::CHANNEL_ASSIGNMENT_RESPONSE, MessageKind::ChannelAssignmentResponse),
    (types::CHANNEL_ASSIGNMENT_ACK, MessageKind::ChannelAssignmentAck),
    (types::EXISTING_CLIENT_REQUEST, MessageKind::ExistingClientRequest),
    (types::EXISTING_CLIENT_RESPONSE, MessageKind::ExistingClientResponse),
    (types::CLEAR_TO_SEND, MessageKind::ClearToSend),
    (types::NOTHING_TO_SEND, MessageKind::NothingToSend),
];

static JACUZZI_TYPES: [(u8, MessageKind); 17] = [
    BASE_TYPES[0],
    BASE_TYPES[1],
    BASE_TYPES[2],
    BASE_TYPES[3],
    BASE_TYPES[4],
    BASE_TYPES[5],
    BASE_TYPES[6],
    BASE_TYPES[7],
    (0x16, MessageKind::StatusUpdate),
    (types::BUTTON_PRESS, MessageKind::ButtonPress),
    (0x1B, MessageKind::PrimaryFilter),
    (0x1C, MessageKind::SecondaryFilter),
    (0x1D, MessageKind::PumpState),
    (0x1E, MessageKind::SetupParams),
    (0x23, MessageKind::LightStatus),
    (0x24, MessageKind::SystemInfo),
    (0x94, MessageKind::ModuleIdent),
];

static SUNDANCE_TYPES: [(u8, MessageKind); 13] = [
    BASE_TYPES[0],
    BASE_TYPES[1],
    BASE_TYPES[2],
    BASE_TYPES[3],
    BASE_TYPES[4],
    BASE_TYPES[5],
    BASE_TYPES[6],
    BASE_TYPES[7],
    (0x16, MessageKind::StatusUpdate),
    (types::BUTTON_PRESS, MessageKind::ButtonPress),
    (0x23, MessageKind::LightStatus),
    (0xC4, MessageKind::StatusUpdate),
    (0xCA, MessageKind::LightStatus),
];

/// Jacuzzi J-series ("ProLink")
pub static JACUZZI: DialectTable = DialectTable {
    dialect: Dialect::Jacuzzi,
    name: "Jacuzzi",
    default_port: 4257,
    message_types: &JACUZZI_TYPES,
    checksum: crc8,
    decoder: decode::jacuzzi::decode,
    change_detection: ChangeDetection::FullPayload,
    command_style: CommandStyle::DirectFrames,
    topology: Topology {
        pumps: [0, 2, 1, 0, 0, 0],
        lights: 0,
        circulation_pump: true,
        temp_scale: TempScale::Celsius,
        clock_format: ClockFormat::TwelveHour,
        limits: TempLimits {
            celsius: (18.5, 40.0),
            fahrenheit: (40.0, 104.0),
        },
    },
    idle_message: (types::NOTHING_TO_SEND, &[]),
};

/// Sundance 780/880 series
pub static SUNDANCE: DialectTable = DialectTable {
    dialect: Dialect::Sundance,
    name: "Sundance",
    default_port: 8899,
    message_types: &SUNDANCE_TYPES,
    checksum: crc8,
    decoder: decode::sundance::decode,
    change_detection: ChangeDetection::FullPayload,
    command_style: CommandStyle::ButtonPresses,
    topology: Topology {
        pumps: [1, 1, 1, 0, 0, 0],
        lights: 2,
        circulation_pump: true,
        temp_scale: TempScale::Celsius,
        clock_format: ClockFormat::TwentyFourHour,
        limits: TempLimits {
            celsius: (26.0, 40.0),
            fahrenheit: (80.0, 104.0),
        },
    },
    idle_message: (types::BUTTON_PRESS, &[0x00, 0x00]),
};

impl DialectTable {
    /// Returns the table for a dialect
    pub fn for_dialect(dialect: Dialect) -> &'static DialectTable {
        match dialect {
            Dialect::Jacuzzi => &JACUZZI,
            Dialect::Sundance => &SUNDANCE,
        }
    }

    /// Resolves a type byte into its semantic tag
    pub fn classify(&self, message_type: u8) -> Option<MessageKind> {
        self.message_types
            .iter()
            .find(|(byte, _)| *byte == message_type)
            .map(|(_, kind)| *kind)
    }
}

impl fmt::Debug for DialectTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialectTable")
            .field("dialect", &self.dialect)
            .field("default_port", &self.default_port)
            .field("command_style", &self.command_style)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_base_protocol() {
        for table in [&JACUZZI, &SUNDANCE] {
            assert_eq!(table.classify(0x00), Some(MessageKind::ClientClearToSend));
            assert_eq!(table.classify(0x06), Some(MessageKind::ClearToSend));
            assert_eq!(table.classify(0x17), Some(MessageKind::ButtonPress));
            assert_eq!(table.classify(0x16), Some(MessageKind::StatusUpdate));
        }
    }

    #[test]
    fn test_dialect_specific_types() {
        assert_eq!(JACUZZI.classify(0x94), Some(MessageKind::ModuleIdent));
        assert_eq!(SUNDANCE.classify(0x94), None);

        assert_eq!(SUNDANCE.classify(0xC4), Some(MessageKind::StatusUpdate));
        assert_eq!(SUNDANCE.classify(0xCA), Some(MessageKind::LightStatus));
        assert_eq!(JACUZZI.classify(0xC4), None);

        assert_eq!(JACUZZI.classify(0x1B), Some(MessageKind::PrimaryFilter));
        assert_eq!(SUNDANCE.classify(0x1B), None);
    }

    #[test]
    fn test_defaults() {
        assert_eq!(DialectTable::for_dialect(Dialect::Jacuzzi).default_port, 4257);
        assert_eq!(DialectTable::for_dialect(Dialect::Sundance).default_port, 8899);
        assert!(JACUZZI.topology.limits.contains(TempScale::Celsius, 18.5));
        assert!(!SUNDANCE.topology.limits.contains(TempScale::Celsius, 25.5));
        assert!(SUNDANCE.topology.limits.contains(TempScale::Fahrenheit, 104.0));
    }

    #[test]
    fn test_debug_lists_table_fields() {
        let text = format!("{:?}", SUNDANCE);
        assert!(text.starts_with("DialectTable"));
        assert!(text.contains("Sundance"));
        assert!(text.contains("ButtonPresses"));
        assert!(!text.contains("encoding"));
    }
}

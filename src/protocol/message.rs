use serde::{Deserialize, Serialize};
use std::fmt;

/// Type bytes of the shared arbitration protocol, identical in every dialect
pub mod types {
    pub const CLIENT_CLEAR_TO_SEND: u8 = 0x00;
    pub const CHANNEL_ASSIGNMENT_REQUEST: u8 = 0x01;
    pub const CHANNEL_ASSIGNMENT_RESPONSE: u8 = 0x02;
    pub const CHANNEL_ASSIGNMENT_ACK: u8 = 0x03;
    pub const EXISTING_CLIENT_REQUEST: u8 = 0x04;
    pub const EXISTING_CLIENT_RESPONSE: u8 = 0x05;
    pub const CLEAR_TO_SEND: u8 = 0x06;
    pub const NOTHING_TO_SEND: u8 = 0x07;
    pub const BUTTON_PRESS: u8 = 0x17;
}

/// Semantic tag of a frame, resolved from its type byte through a dialect table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageKind {
    /// Broadcast probe inviting unassigned clients to ask for a channel
    ClientClearToSend,
    /// Client asks the controller for a channel
    ChannelAssignmentRequest,
    /// Controller offers a channel
    ChannelAssignmentResponse,
    /// Client accepts the offered channel
    ChannelAssignmentAck,
    /// Controller asks whether an assigned client is still present
    ExistingClientRequest,
    /// Client confirms it is still present
    ExistingClientResponse,
    /// Token granting the addressed channel one transmit slot
    ClearToSend,
    /// Client declines its transmit slot
    NothingToSend,
    /// Panel button press broadcast by another bus device
    ButtonPress,
    /// High-rate status broadcast
    StatusUpdate,
    /// Light status broadcast
    LightStatus,
    /// Primary filter cycle response
    PrimaryFilter,
    /// Secondary filter cycle response
    SecondaryFilter,
    /// Pump presence and state response
    PumpState,
    /// Setup parameters response
    SetupParams,
    /// System information response
    SystemInfo,
    /// Module identification response
    ModuleIdent,
}

impl MessageKind {
    /// Whether this tag drives the channel arbitration state machine
    pub fn is_arbitration(self) -> bool {
        matches!(
            self,
            MessageKind::ClientClearToSend
                | MessageKind::ChannelAssignmentRequest
                | MessageKind::ChannelAssignmentResponse
                | MessageKind::ChannelAssignmentAck
                | MessageKind::ExistingClientRequest
                | MessageKind::ExistingClientResponse
                | MessageKind::ClearToSend
                | MessageKind::NothingToSend
                | MessageKind::ButtonPress
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

//! Command frame builders
//!
//! Every builder returns a fully formed outgoing [`Frame`] addressed from the
//! given channel. Nothing here touches the session; validation happens in the
//! caller.

use crate::protocol::{DialectTable, Frame};
use crate::protocol::message::types;

/// Jacuzzi command type bytes
pub mod jacuzzi_types {
    pub const MODULE_IDENT_REQUEST: u8 = 0x04;
    pub const PUMP_PRESS: u8 = 0x17;
    pub const PUMP_PRESS_AUX: u8 = 0x1A;
    pub const SET_CLOCK: u8 = 0x18;
    pub const PANEL_REQUEST: u8 = 0x19;
    pub const PRIMARY_FILTER: u8 = 0x1B;
    pub const SECONDARY_FILTER: u8 = 0x1C;
    pub const SET_TEMPERATURE: u8 = 0x20;
    pub const LIGHT: u8 = 0x21;
}

/// Emulated control panel buttons (Sundance)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    TempUp,
    TempDown,
    Jet1,
    Jet2,
    /// ClearRay / circulation pump
    ClearRay,
    Light,
    LightColour,
    Menu,
}

impl Button {
    /// Code carried in the button-press payload
    pub fn code(self) -> u8 {
        match self {
            Button::TempUp => 0x01,
            Button::TempDown => 0x02,
            Button::Jet1 => 0x04,
            Button::Jet2 => 0x05,
            Button::ClearRay => 0x0F,
            Button::Light => 0x11,
            Button::LightColour => 0x12,
            Button::Menu => 0x1E,
        }
    }

    /// Button cycling pump slot `index`
    pub fn for_pump(index: usize) -> Button {
        match index {
            0 => Button::Jet1,
            1 => Button::Jet2,
            _ => Button::ClearRay,
        }
    }
}

pub fn button_press(channel: u8, button: Button) -> Frame {
    Frame::outgoing(channel, types::BUTTON_PRESS, vec![button.code()])
}

/// Frame declining a transmit slot, in the dialect's own form
pub fn idle(channel: u8, dialect: &DialectTable) -> Frame {
    let (message_type, payload) = dialect.idle_message;
    Frame::outgoing(channel, message_type, payload.to_vec())
}

/// Set point change; `raw` is already scaled for the panel
pub fn set_temperature(channel: u8, raw: u8) -> Frame {
    Frame::outgoing(channel, jacuzzi_types::SET_TEMPERATURE, vec![raw])
}

/// One press of the button for pump slot `index`
pub fn pump_press(channel: u8, index: usize) -> Frame {
    let message_type = match index {
        1..=3 => jacuzzi_types::PUMP_PRESS,
        _ => jacuzzi_types::PUMP_PRESS_AUX,
    };
    Frame::outgoing(channel, message_type, vec![index as u8 + 3])
}

pub fn light_mode(channel: u8, mode: u8) -> Frame {
    Frame::outgoing(
        channel,
        jacuzzi_types::LIGHT,
        vec![0x1F, mode, 0x00, 0x00, 0x00, 0x00, 0xFF, 0x00],
    )
}

pub fn light_brightness(channel: u8, level: u8) -> Frame {
    Frame::outgoing(
        channel,
        jacuzzi_types::LIGHT,
        vec![0x2F, 0x01, 0x00, 0x00, 0x00, 0x00, level, 0x00],
    )
}

pub fn primary_filter(channel: u8, start_hour: u8, duration_hours: u8, frequency: u8) -> Frame {
    Frame::outgoing(
        channel,
        jacuzzi_types::PRIMARY_FILTER,
        vec![start_hour, duration_hours, frequency],
    )
}

pub fn secondary_filter(channel: u8, mode: u8) -> Frame {
    Frame::outgoing(channel, jacuzzi_types::SECONDARY_FILTER, vec![mode, 0x00, 0x00])
}

/// Asks the panel to rebroadcast a settings page (`[1, 0]` primary filter, `[2, 0]` secondary)
pub fn panel_request(channel: u8, page: u8, sub: u8) -> Frame {
    Frame::outgoing(channel, jacuzzi_types::PANEL_REQUEST, vec![page, sub])
}

/// Clock and calendar in one frame; the panel ignores it unless the month's high nibble is set
pub fn set_clock(channel: u8, month: u8, day: u8, year_offset: u8, hour: u8, minute: u8) -> Frame {
    Frame::outgoing(
        channel,
        jacuzzi_types::SET_CLOCK,
        vec![month | 0xF0, day, year_offset, hour, minute],
    )
}

pub fn module_ident_request(channel: u8) -> Frame {
    Frame::outgoing(channel, jacuzzi_types::MODULE_IDENT_REQUEST, Vec::new())
}

//! Jacuzzi ("ProLink") payload layouts
//!
//! Offsets are payload indices (frame index minus five). Several bit positions
//! are known to be uncertain; they are decoded exactly as the controller
//! firmware tables document them.

use crate::core::{ClockFormat, DecodeError, TempScale, MAX_LIGHTS, MAX_PUMPS};
use crate::protocol::{MessageKind, Topology};
use crate::session::state::{HeatStatus, LockState, ServiceHours, SpaDate, SpaTime};
use crate::session::SpaState;
use super::{word, Update};

/// Shortest status payload carrying every mandatory field
pub const STATUS_MIN_LEN: usize = 23;
const OUTER_FILTER_LEN: usize = 25;
const INNER_FILTER_LEN: usize = 27;
const WIFI_LEN: usize = 28;
const EXTRAS_LEN: usize = 32;

/// Decodes a Jacuzzi payload of the given kind
pub fn decode(kind: MessageKind, payload: &[u8], topology: &Topology) -> Result<Option<Update>, DecodeError> {
    let update = match kind {
        MessageKind::StatusUpdate => Update::JacuzziStatus(Status::decode(payload, topology)?),
        MessageKind::LightStatus => Update::JacuzziLight(Light::decode(payload)?),
        MessageKind::PrimaryFilter => Update::PrimaryFilter(PrimaryFilter::decode(payload)?),
        MessageKind::SecondaryFilter => Update::SecondaryFilter(SecondaryFilter::decode(payload)?),
        MessageKind::PumpState => Update::PumpState(PumpState::decode(payload)?),
        MessageKind::SetupParams => Update::SetupParams(SetupParams::decode(payload)?),
        MessageKind::SystemInfo => Update::SystemInfo(SystemInfo::decode(payload)?),
        MessageKind::ModuleIdent => Update::ModuleIdent(ModuleIdent::decode(payload)?),
        _ => return Ok(None),
    };
    Ok(Some(update))
}

/// Status broadcast (type 0x16)
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub temp_scale: TempScale,
    pub clock_format: ClockFormat,
    pub time: SpaTime,
    pub date: SpaDate,
    pub filter2_mode: u8,
    pub heat: HeatStatus,
    pub error_code: u8,
    pub current_temp: Option<f64>,
    pub set_temp: Option<f64>,
    pub pumps: [u8; MAX_PUMPS],
    pub circulation_pump: Option<u8>,
    pub secondary_on: u8,
    pub primary_on: u8,
    pub blower: u8,
    pub uv: u8,
    pub flow_switch: u8,
    pub lights: [u8; MAX_LIGHTS],
    pub locks: LockState,
    /// Plumbing sensor byte, reported unscaled
    pub second_temp: u8,
    pub hours: ServiceHours,
    pub wifi_state: Option<u8>,
    pub opaque: Vec<(&'static str, u8)>,
}

impl Status {
    pub fn decode(p: &[u8], topology: &Topology) -> Result<Self, DecodeError> {
        DecodeError::check_len(MessageKind::StatusUpdate, p, STATUS_MIN_LEN)?;

        // scale and clock first: the temperatures depend on them
        let temp_scale = if p[13] & 0x01 != 0 {
            TempScale::Celsius
        } else {
            TempScale::Fahrenheit
        };
        let clock_format = if p[13] & 0x06 == 0 {
            ClockFormat::TwelveHour
        } else {
            ClockFormat::TwentyFourHour
        };

        let heat_bits = (p[5] >> 4) & 0x03;
        let heat = HeatStatus {
            mode: heat_bits,
            state: (p[5] & 0x30) >> 4,
            mode_state: (p[5] & 0x30) >> 4,
            spa_state: p[5] & 0x0F,
            secondary_state: None,
            mode_code: None,
        };

        let mut pumps = [0u8; MAX_PUMPS];
        for (i, slot) in pumps.iter_mut().enumerate().take(4) {
            if topology.pumps[i] != 0 {
                *slot = (p[10] >> (i * 2)) & 0x03;
            }
        }
        let circulation_pump = topology
            .circulation_pump
            .then_some(u8::from(p[10] & 0x03 != 0));

        let mut lights = [0u8; MAX_LIGHTS];
        for (i, slot) in lights.iter_mut().enumerate().take(topology.lights) {
            *slot = ((p[14] >> (i * 2)) & 0x03) >> 1;
        }

        let mut opaque = vec![
            ("status.p8", p[8]),
            ("status.p14", p[14]),
            ("status.p17", p[17]),
            ("status.p18", p[18]),
        ];
        if p.len() >= EXTRAS_LEN {
            opaque.extend([
                ("status.p28", p[28]),
                ("status.p29", p[29]),
                ("status.p30", p[30]),
                ("status.p31", p[31]),
            ]);
        }

        Ok(Status {
            temp_scale,
            clock_format,
            time: SpaTime {
                hour: p[0],
                minute: p[1],
            },
            date: SpaDate {
                day_of_week: Some((p[2] & 0xE0) >> 5),
                day: p[2] & 0x1F,
                month: p[3],
                year: Some(p[4] as u16 + 2000),
            },
            filter2_mode: (p[5] & 0xC0) >> 6,
            heat,
            error_code: p[6],
            current_temp: temp_scale.decode(p[7]),
            set_temp: temp_scale.decode(p[9]),
            pumps,
            circulation_pump,
            secondary_on: (p[11] & 0xC0) >> 6,
            primary_on: (p[11] & 0x30) >> 4,
            blower: (p[11] & 0x0C) >> 2,
            uv: p[11] & 0x03,
            flow_switch: p[12],
            lights,
            locks: LockState {
                setting: (p[15] & 0x30) >> 4,
                access: (p[15] & 0x0C) >> 2,
                service: p[15] & 0x03,
            },
            second_temp: p[16],
            hours: ServiceHours {
                clear_ray: word(p, 19),
                water: word(p, 21),
                outer_filter: (p.len() >= OUTER_FILTER_LEN).then(|| word(p, 23)),
                inner_filter: (p.len() >= INNER_FILTER_LEN).then(|| word(p, 25)),
            },
            wifi_state: (p.len() >= WIFI_LEN).then(|| (p[27] & 0xF0) >> 4),
            opaque,
        })
    }

    pub fn apply(&self, state: &mut SpaState) {
        state.temp_scale = self.temp_scale;
        state.clock_format = self.clock_format;
        state.time = self.time;
        state.date = self.date;
        state.filter.filter2_mode = self.filter2_mode;
        state.heat = self.heat;
        state.error_code = self.error_code;
        state.current_temp = self.current_temp;
        state.set_temp = self.set_temp;
        state.pumps = self.pumps;
        if let Some(circ) = self.circulation_pump {
            state.circulation_pump = circ;
        }
        state.filter.secondary_on = self.secondary_on;
        state.filter.primary_on = self.primary_on;
        // the primary flag doubles as the filter mode
        state.filter.mode = self.primary_on;
        state.blower = self.blower;
        state.uv = self.uv;
        state.flow_switch = self.flow_switch;
        state.lights.status = self.lights;
        state.locks = self.locks;
        state.second_temp = Some(f64::from(self.second_temp));

        state.hours.clear_ray = self.hours.clear_ray;
        state.hours.water = self.hours.water;
        if self.hours.outer_filter.is_some() {
            state.hours.outer_filter = self.hours.outer_filter;
        }
        if self.hours.inner_filter.is_some() {
            state.hours.inner_filter = self.hours.inner_filter;
        }
        if self.wifi_state.is_some() {
            state.wifi_state = self.wifi_state;
        }
        for (key, value) in &self.opaque {
            state.set_opaque(key, *value);
        }
    }
}

/// Light status broadcast (type 0x23)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Light {
    pub mode: u8,
    pub brightness: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub unknown: u8,
}

impl Light {
    pub fn decode(p: &[u8]) -> Result<Self, DecodeError> {
        DecodeError::check_len(MessageKind::LightStatus, p, 6)?;
        Ok(Light {
            mode: p[0],
            unknown: p[1],
            brightness: p[2],
            red: p[3],
            green: p[4],
            blue: p[5],
        })
    }

    pub fn apply(&self, state: &mut SpaState) {
        state.lights.mode = Some(self.mode);
        state.lights.brightness = Some(self.brightness);
        state.lights.red = Some(self.red);
        state.lights.green = Some(self.green);
        state.lights.blue = Some(self.blue);
        state.set_opaque("light.p1", self.unknown);
    }
}

/// Primary filtration response (type 0x1B)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryFilter {
    pub start_hour: u8,
    pub duration_hours: u8,
    /// Cycles per day, when one of the values the panel accepts
    pub frequency: Option<u8>,
}

impl PrimaryFilter {
    pub fn decode(p: &[u8]) -> Result<Self, DecodeError> {
        DecodeError::check_len(MessageKind::PrimaryFilter, p, 3)?;
        let frequency = match p[2] {
            1..=4 | 8 => Some(p[2]),
            _ => None,
        };
        Ok(PrimaryFilter {
            start_hour: p[0],
            duration_hours: p[1],
            frequency,
        })
    }

    pub fn apply(&self, state: &mut SpaState) {
        state.filter.primary.start_hour = self.start_hour;
        state.filter.primary.duration_hours = self.duration_hours;
        if self.frequency.is_some() {
            state.filter.primary.frequency = self.frequency;
        }
    }
}

/// Secondary filter cycle response (type 0x1C)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondaryFilter {
    /// 0 holiday, 1 light, 2 heavy
    pub mode: u8,
    pub extra: [u8; 2],
}

impl SecondaryFilter {
    pub fn decode(p: &[u8]) -> Result<Self, DecodeError> {
        DecodeError::check_len(MessageKind::SecondaryFilter, p, 3)?;
        Ok(SecondaryFilter {
            mode: p[0],
            extra: [p[1], p[2]],
        })
    }

    pub fn apply(&self, state: &mut SpaState) {
        state.filter.secondary_cycle = Some(self.mode);
        state.set_opaque("secondary_filter.p1", self.extra[0]);
        state.set_opaque("secondary_filter.p2", self.extra[1]);
    }
}

/// Pump presence response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpState {
    /// Two-bit field of each of the four pump slots
    pub fields: [u8; 4],
    pub head: [u8; 6],
    pub tail: [u8; 6],
}

impl PumpState {
    pub fn decode(p: &[u8]) -> Result<Self, DecodeError> {
        DecodeError::check_len(MessageKind::PumpState, p, 13)?;
        let mut head = [0u8; 6];
        head.copy_from_slice(&p[0..6]);
        let mut tail = [0u8; 6];
        tail.copy_from_slice(&p[7..13]);
        Ok(PumpState {
            fields: [p[6] & 0x03, (p[6] & 0x0C) >> 2, (p[6] & 0x30) >> 4, (p[6] & 0xC0) >> 6],
            head,
            tail,
        })
    }

    /// Pumps reporting a non-zero field
    pub fn pump_count(&self) -> u8 {
        self.fields.iter().filter(|f| **f != 0).count() as u8
    }

    pub fn apply(&self, state: &mut SpaState) {
        state.module.pump_count = Some(self.pump_count());
        const HEAD: [&str; 6] = [
            "pump_state.p0",
            "pump_state.p1",
            "pump_state.p2",
            "pump_state.p3",
            "pump_state.p4",
            "pump_state.p5",
        ];
        const TAIL: [&str; 6] = [
            "pump_state.p7",
            "pump_state.p8",
            "pump_state.p9",
            "pump_state.p10",
            "pump_state.p11",
            "pump_state.p12",
        ];
        for (key, value) in HEAD.iter().zip(self.head).chain(TAIL.iter().zip(self.tail)) {
            state.set_opaque(key, value);
        }
    }
}

/// Setup parameters response (type 0x1E)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupParams {
    pub bytes: [u8; 2],
}

impl SetupParams {
    pub fn decode(p: &[u8]) -> Result<Self, DecodeError> {
        DecodeError::check_len(MessageKind::SetupParams, p, 2)?;
        Ok(SetupParams { bytes: [p[0], p[1]] })
    }

    pub fn apply(&self, state: &mut SpaState) {
        state.set_opaque("setup.p0", self.bytes[0]);
        state.set_opaque("setup.p1", self.bytes[1]);
    }
}

/// System information response (type 0x24)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemInfo {
    pub bytes: [u8; 2],
    pub old_version: bool,
}

impl SystemInfo {
    pub fn decode(p: &[u8]) -> Result<Self, DecodeError> {
        DecodeError::check_len(MessageKind::SystemInfo, p, 3)?;
        Ok(SystemInfo {
            bytes: [p[0], p[1]],
            old_version: p[2] < 6,
        })
    }

    pub fn apply(&self, state: &mut SpaState) {
        state.module.old_version = Some(self.old_version);
        state.set_opaque("system_info.p0", self.bytes[0]);
        state.set_opaque("system_info.p1", self.bytes[1]);
    }
}

/// Module identification response (type 0x94)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIdent {
    pub mac_address: String,
    pub device_id: String,
}

impl ModuleIdent {
    pub fn decode(p: &[u8]) -> Result<Self, DecodeError> {
        DecodeError::check_len(MessageKind::ModuleIdent, p, 25)?;
        let mac_address = p[3..9]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(":");
        let device_id = p[9..25]
            .chunks(4)
            .map(|group| group.iter().map(|b| format!("{:02X}", b)).collect::<String>())
            .collect::<Vec<_>>()
            .join("-");
        Ok(ModuleIdent {
            mac_address,
            device_id,
        })
    }

    pub fn apply(&self, state: &mut SpaState) {
        state.module.mac_address = Some(self.mac_address.clone());
        state.module.device_id = Some(self.device_id.clone());
    }
}

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ClockFormat, TempScale, MAX_LIGHTS, MAX_PUMPS};
use crate::protocol::Topology;

/// Panel clock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaTime {
    pub hour: u8,
    pub minute: u8,
}

/// Panel calendar; Sundance panels report no year or weekday
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaDate {
    pub day_of_week: Option<u8>,
    pub day: u8,
    pub month: u8,
    pub year: Option<u16>,
}

/// Heater status fields
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatStatus {
    pub mode: u8,
    pub state: u8,
    pub mode_state: u8,
    pub spa_state: u8,
    /// Second heater flag (Sundance)
    pub secondary_state: Option<u8>,
    /// Raw heat mode code (Sundance)
    pub mode_code: Option<u8>,
}

/// Filter cycle schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCycle {
    pub start_hour: u8,
    pub duration_hours: u8,
    /// Cycles per day
    pub frequency: Option<u8>,
}

impl Default for FilterCycle {
    fn default() -> Self {
        FilterCycle {
            start_hour: 0,
            duration_hours: 8,
            frequency: None,
        }
    }
}

/// Filtration status and schedules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStatus {
    /// Filter mode flag from the status broadcast
    pub mode: u8,
    pub primary_on: u8,
    pub secondary_on: u8,
    /// Secondary filter mode from the status broadcast
    pub filter2_mode: u8,
    pub primary: FilterCycle,
    /// Secondary cycle setting: 0 holiday, 1 light, 2 heavy
    pub secondary_cycle: Option<u8>,
}

/// Light status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightState {
    /// On/off bits from the status broadcast
    pub status: [u8; MAX_LIGHTS],
    pub mode: Option<u8>,
    pub brightness: Option<u8>,
    pub red: Option<u8>,
    pub green: Option<u8>,
    pub blue: Option<u8>,
    pub cycle_time: Option<u8>,
}

/// Panel locks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub setting: u8,
    pub access: u8,
    pub service: u8,
}

/// Circulation pump flags reported by Sundance panels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CirculationFlags {
    pub manual: u8,
    pub auto: u8,
    pub unknown: u8,
}

/// Service hour counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHours {
    pub clear_ray: u16,
    pub water: u16,
    pub outer_filter: Option<u16>,
    pub inner_filter: Option<u16>,
}

/// Identity and housekeeping responses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub mac_address: Option<String>,
    pub device_id: Option<String>,
    pub old_version: Option<bool>,
    pub pump_count: Option<u8>,
}

/// Observable state of one spa, overwritten field by field as frames arrive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaState {
    pub temp_scale: TempScale,
    pub clock_format: ClockFormat,
    pub current_temp: Option<f64>,
    pub set_temp: Option<f64>,
    /// Plumbing temperature sensor, unscaled raw reading
    pub second_temp: Option<f64>,
    pub time: SpaTime,
    pub date: SpaDate,
    /// State of each pump slot: 0 off, 1 low, 2 high
    pub pumps: [u8; MAX_PUMPS],
    pub circulation_pump: u8,
    pub circulation: CirculationFlags,
    pub blower: u8,
    pub uv: u8,
    pub flow_switch: u8,
    pub heat: HeatStatus,
    pub filter: FilterStatus,
    pub lights: LightState,
    pub locks: LockState,
    pub error_code: u8,
    /// Panel display code (Sundance)
    pub display_code: Option<u8>,
    pub hours: ServiceHours,
    pub wifi_state: Option<u8>,
    pub module: ModuleInfo,
    /// Undocumented bytes passed through verbatim, keyed by origin
    pub opaque: BTreeMap<String, u8>,
    /// When a status broadcast last changed
    pub last_update: Option<DateTime<Utc>>,
}

impl SpaState {
    /// Creates an empty snapshot using a dialect's assumed hardware
    pub fn new(topology: &Topology) -> Self {
        SpaState {
            temp_scale: topology.temp_scale,
            clock_format: topology.clock_format,
            current_temp: None,
            set_temp: None,
            second_temp: None,
            time: SpaTime::default(),
            date: SpaDate::default(),
            pumps: [0; MAX_PUMPS],
            circulation_pump: 0,
            circulation: CirculationFlags::default(),
            blower: 0,
            uv: 0,
            flow_switch: 0,
            heat: HeatStatus::default(),
            filter: FilterStatus::default(),
            lights: LightState::default(),
            locks: LockState::default(),
            error_code: 0,
            display_code: None,
            hours: ServiceHours::default(),
            wifi_state: None,
            module: ModuleInfo::default(),
            opaque: BTreeMap::new(),
            last_update: None,
        }
    }

    /// Stores an undocumented byte under `key`
    pub fn set_opaque(&mut self, key: &str, value: u8) {
        self.opaque.insert(key.to_string(), value);
    }

    /// Seconds since the last status change, if any
    pub fn seconds_since_update(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_update
            .map(|at| now.signed_duration_since(at).num_seconds().max(0))
    }
}

//! Sundance (780/880 series) payload layouts
//!
//! Payloads are folded pairwise before any field is read. Temperatures are
//! looked up in fixed tables; bytes the tables do not cover decode as
//! unavailable.

use crate::core::{DecodeError, MAX_PUMPS};
use crate::protocol::{MessageKind, Topology};
use crate::session::state::{CirculationFlags, SpaTime};
use crate::session::SpaState;
use super::Update;

/// Shortest folded status payload
pub const STATUS_MIN_LEN: usize = 15;
/// Shortest folded light payload
pub const LIGHT_MIN_LEN: usize = 10;

const HOUR_XOR: u8 = 6;

/// Undoes the pairwise obfuscation: `x[i] = p[2i] ^ p[2i+1] ^ 1`
pub fn fold(payload: &[u8]) -> Vec<u8> {
    payload
        .chunks_exact(2)
        .map(|pair| pair[0] ^ pair[1] ^ 1)
        .collect()
}

/// Water temperature in Celsius for a folded sensor byte
pub fn water_temperature(raw: u8) -> Option<f64> {
    let value = match raw {
        48 => 24.0,
        47 => 24.5,
        51 => 25.0,
        50 => 25.5,
        53 => 26.0,
        52 => 26.5,
        55 => 27.0,
        54 => 27.5,
        57 => 28.0,
        56 => 28.5,
        59 => 29.0,
        58 => 29.5,
        61 => 30.0,
        60 => 30.5,
        63 => 31.0,
        62 => 31.5,
        65 => 32.0,
        64 => 32.5,
        67 => 33.0,
        66 => 33.5,
        69 => 34.0,
        68 => 34.5,
        71 => 35.0,
        70 => 35.5,
        73 => 36.0,
        72 => 36.5,
        75 => 37.0,
        74 => 37.5,
        77 => 38.0,
        76 => 38.5,
        79 => 39.0,
        78 => 39.5,
        81 => 40.0,
        _ => return None,
    };
    Some(value)
}

/// Set point in Celsius for a folded set point byte
pub fn set_temperature(raw: u8) -> Option<f64> {
    let value = match raw {
        171 => 40.0,
        180 => 39.5,
        181 => 39.0,
        182 => 38.5,
        183 => 38.0,
        176 => 37.5,
        177 => 37.0,
        178 => 36.5,
        179 => 36.0,
        188 => 35.5,
        189 => 35.0,
        190 => 34.5,
        191 => 34.0,
        184 => 33.5,
        185 => 33.0,
        186 => 32.5,
        187 => 32.0,
        196 => 31.5,
        197 => 31.0,
        198 => 30.5,
        199 => 30.0,
        192 => 29.5,
        193 => 29.0,
        194 => 28.5,
        195 => 28.0,
        204 => 27.5,
        205 => 27.0,
        206 => 26.5,
        207 => 26.0,
        200 => 25.5,
        201 => 25.0,
        202 => 24.5,
        203 => 24.0,
        212 => 23.5,
        213 => 23.0,
        214 => 22.5,
        215 => 22.0,
        208 => 21.5,
        209 => 21.0,
        210 => 20.5,
        211 => 20.0,
        220 => 19.5,
        221 => 19.0,
        222 => 18.5,
        _ => return None,
    };
    Some(value)
}

/// Decodes a Sundance payload of the given kind
pub fn decode(kind: MessageKind, payload: &[u8], _topology: &Topology) -> Result<Option<Update>, DecodeError> {
    let update = match kind {
        MessageKind::StatusUpdate => Update::SundanceStatus(Status::decode(payload)?),
        MessageKind::LightStatus => Update::SundanceLight(Light::decode(payload)?),
        _ => return Ok(None),
    };
    Ok(Some(update))
}

/// Status broadcast (types 0x16 / 0xC4)
#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub time: SpaTime,
    pub day: u8,
    pub month: u8,
    /// Pump slots 0..3; slot 2 is the circulation pump
    pub pumps: [u8; 3],
    pub circulation_pump: u8,
    pub circulation: CirculationFlags,
    pub current_temp: Option<f64>,
    pub set_temp: Option<f64>,
    pub second_temp: f64,
    pub heat_state: u8,
    pub heat_state2: u8,
    pub display_code: u8,
    pub heat_mode_code: u8,
    /// Raw sensor bytes x3 and x9
    pub sensors: [u8; 2],
}

impl Status {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let x = fold(payload);
        DecodeError::check_len(MessageKind::StatusUpdate, &x, STATUS_MIN_LEN)?;

        let circulation_pump = (x[1] >> 6) & 1;
        let mut second_temp = x[14] as f64;
        if circulation_pump == 1 {
            second_temp += 32.0;
        }

        Ok(Status {
            time: SpaTime {
                hour: x[0] ^ HOUR_XOR,
                minute: x[11],
            },
            day: x[7] >> 3,
            month: x[7] & 0x07,
            pumps: [(x[2] >> 4) & 1, (x[1] >> 2) & 1, circulation_pump],
            circulation_pump,
            circulation: CirculationFlags {
                manual: (x[1] >> 7) & 1,
                auto: (x[1] >> 6) & 1,
                unknown: (x[4] >> 6) & 1,
            },
            current_temp: water_temperature(x[3]),
            set_temp: set_temperature(x[4]),
            second_temp,
            heat_state: (x[10] >> 6) & 1,
            heat_state2: (x[11] >> 1) & 1,
            display_code: x[13],
            heat_mode_code: x[6],
            sensors: [x[3], x[9]],
        })
    }

    pub fn apply(&self, state: &mut SpaState) {
        state.time = self.time;
        state.date.day = self.day;
        state.date.month = self.month;
        state.pumps[..3].copy_from_slice(&self.pumps);
        state.pumps[3..MAX_PUMPS].fill(0);
        state.circulation_pump = self.circulation_pump;
        state.circulation = self.circulation;
        state.current_temp = self.current_temp;
        state.set_temp = self.set_temp;
        state.second_temp = Some(self.second_temp);
        state.heat.state = self.heat_state;
        state.heat.secondary_state = Some(self.heat_state2);
        state.heat.mode_code = Some(self.heat_mode_code);
        state.display_code = Some(self.display_code);
        state.set_opaque("unknown_field_3", self.sensors[0]);
        state.set_opaque("unknown_field_9", self.sensors[1]);
    }
}

/// Light status broadcast (types 0x23 / 0xCA)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Light {
    pub brightness: u8,
    pub mode: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub cycle_time: u8,
    /// Folded bytes x0, x3, x5 and x7
    pub unknown: [u8; 4],
}

impl Light {
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let x = fold(payload);
        DecodeError::check_len(MessageKind::LightStatus, &x, LIGHT_MIN_LEN)?;
        Ok(Light {
            brightness: x[1],
            mode: x[4],
            blue: x[2],
            green: x[6],
            red: x[8],
            cycle_time: x[9],
            unknown: [x[0], x[3], x[5], x[7]],
        })
    }

    pub fn apply(&self, state: &mut SpaState) {
        state.lights.brightness = Some(self.brightness);
        state.lights.mode = Some(self.mode);
        state.lights.red = Some(self.red);
        state.lights.green = Some(self.green);
        state.lights.blue = Some(self.blue);
        state.lights.cycle_time = Some(self.cycle_time);
        for (key, value) in ["light.x0", "light.x3", "light.x5", "light.x7"]
            .iter()
            .zip(self.unknown)
        {
            state.set_opaque(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode as decode_frame;
    use crate::protocol::dialect::SUNDANCE;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    /// Builds a raw payload whose fold yields `values`
    fn unfold(values: &[u8]) -> Vec<u8> {
        values.iter().flat_map(|v| [v ^ 1, 0x00]).collect()
    }

    #[test]
    fn test_fold() {
        assert_eq!(fold(&[0xAE, 0xA7, 0xAA, 0xAB, 0xFF]), vec![8, 0]);
        assert_eq!(fold(&unfold(&[1, 2, 3])), vec![1, 2, 3]);
    }

    #[test]
    fn test_captured_status() {
        let frame = decode_frame(&hex(
            "7E26FFAFC4AEA7AAABA4A1C95DA5A1C2A19CBDCEBBE2B9BBADB4B5A7B7DFB1B29BD38D8E8F88F97E",
        ))
        .unwrap();
        assert_eq!(frame.message_type, 0xC4);

        let status = Status::decode(&frame.payload).unwrap();
        assert_eq!(status.time, SpaTime { hour: 14, minute: 17 });
        assert_eq!((status.day, status.month), (14, 4));
        assert_eq!(status.pumps, [0, 0, 0]);
        // 149 and 5 are outside the conversion tables
        assert_eq!(status.current_temp, None);
        assert_eq!(status.set_temp, None);
        assert_eq!(status.second_temp, 95.0);
        assert_eq!(status.heat_mode_code, 32);
        assert_eq!(status.display_code, 40);
        assert_eq!(status.sensors, [149, 23]);
    }

    #[test]
    fn test_status_fields() {
        let mut x = [0u8; 16];
        x[0] = 20 ^ HOUR_XOR;
        x[1] = 0b1100_0100;
        x[2] = 0x10;
        x[3] = 75;
        x[4] = 180;
        x[10] = 0x40;
        x[11] = 0x02;
        x[14] = 10;

        let status = Status::decode(&unfold(&x)).unwrap();
        assert_eq!(status.time.hour, 20);
        assert_eq!(status.pumps, [1, 1, 1]);
        assert_eq!(status.circulation_pump, 1);
        assert_eq!(
            status.circulation,
            CirculationFlags {
                manual: 1,
                auto: 1,
                unknown: 0
            }
        );
        assert_eq!(status.current_temp, Some(37.0));
        assert_eq!(status.set_temp, Some(39.5));
        assert_eq!(status.second_temp, 42.0);
        assert_eq!((status.heat_state, status.heat_state2), (1, 1));

        let mut state = SpaState::new(&SUNDANCE.topology);
        status.apply(&mut state);
        assert_eq!(state.pumps, [1, 1, 1, 0, 0, 0]);
        assert_eq!(state.set_temp, Some(39.5));
        assert_eq!(state.opaque.get("unknown_field_3"), Some(&75));
    }

    #[test]
    fn test_truncated_status() {
        let err = Status::decode(&unfold(&[0u8; 14])).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                kind: MessageKind::StatusUpdate,
                needed: STATUS_MIN_LEN,
                actual: 14
            }
        );
    }

    #[test]
    fn test_captured_light() {
        let frame = decode_frame(&hex(
            "7E22FFAFCA8A36CACBC4C5C6FBC0C1C23CDCDDDEDFD8D9DADBD4D5D6D7D0D1D2D3ECE57E",
        ))
        .unwrap();
        let light = Light::decode(&frame.payload).unwrap();
        assert_eq!(light.brightness, 0);
        assert_eq!(light.unknown, [189, 60, 255, 0]);

        let mut state = SpaState::new(&SUNDANCE.topology);
        light.apply(&mut state);
        assert_eq!(state.lights.mode, Some(0));
        assert_eq!(state.opaque.get("light.x5"), Some(&255));
    }

    #[test]
    fn test_lookup_tables() {
        assert_eq!(water_temperature(48), Some(24.0));
        assert_eq!(water_temperature(81), Some(40.0));
        assert_eq!(water_temperature(82), None);
        assert_eq!(set_temperature(171), Some(40.0));
        assert_eq!(set_temperature(222), Some(18.5));
        assert_eq!(set_temperature(5), None);
    }
}

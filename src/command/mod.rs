//! Command encoder and transmit queue
//!
//! Requests are validated against the dialect topology and the latest
//! snapshot, turned into frames by [`encoder`], and parked in the
//! [`queue`] until the controller grants a transmit slot.
//!
//! Panels that only understand button presses get a [`Targets`] record
//! instead: each status broadcast is compared against it and, when the spa
//! has not caught up, one more press is issued.

pub mod encoder;
pub mod queue;

pub use self::encoder::Button;
pub use self::queue::{transmit_queue, QueueReceiver, TransmitQueue};

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use tracing::{debug, info};

use crate::core::{Error, Result, TempScale, MAX_PUMPS};
use crate::protocol::dialect::TempLimits;
use crate::protocol::{Frame, Topology};
use crate::session::SpaState;

/// Status broadcasts to wait after a press before pressing again
pub const CHECKS_BEFORE_RETRY: i32 = 2;

/// Earliest and latest year the panel calendar can hold
pub const YEAR_RANGE: (i32, i32) = (2000, 2255);

/// Set points and pump states requested but not yet reported by the spa
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Targets {
    pub set_temp: Option<f64>,
    pub pumps: [Option<u8>; MAX_PUMPS],
    pub(crate) counter: i32,
}

impl Targets {
    /// Whether any request is still outstanding
    pub fn is_pending(&self) -> bool {
        self.set_temp.is_some() || self.pumps.iter().any(Option::is_some)
    }

    /// Compares the targets with a fresh snapshot and returns the presses to send.
    ///
    /// A reached target is cleared. At most one press goes out per call, and
    /// only once more than [`CHECKS_BEFORE_RETRY`] broadcasts have passed
    /// since the previous one. Presses are dropped when no channel is held.
    pub fn reconcile(&mut self, state: &SpaState, channel: Option<u8>) -> Vec<Frame> {
        let mut buttons = Vec::new();
        let mut waiting = false;

        match (self.set_temp, state.set_temp) {
            (Some(target), Some(current)) if current == target => {
                info!(set_point = target, "set point reached");
                self.set_temp = None;
            }
            (Some(target), Some(current)) if self.counter > CHECKS_BEFORE_RETRY => {
                let button = if target < current {
                    Button::TempDown
                } else {
                    Button::TempUp
                };
                debug!(current, wanted = target, ?button, "set point behind target");
                buttons.push(button);
                self.counter = 0;
            }
            _ => waiting = true,
        }

        for (index, target) in self.pumps.iter_mut().enumerate() {
            match *target {
                Some(wanted) if state.pumps[index] == wanted => {
                    info!(pump = index, state = wanted, "pump reached target");
                    *target = None;
                }
                Some(wanted) => {
                    if self.counter > CHECKS_BEFORE_RETRY {
                        debug!(pump = index, current = state.pumps[index], wanted, "pump behind target");
                        buttons.push(Button::for_pump(index));
                        self.counter = -1;
                    }
                }
                None => waiting = true,
            }
        }

        if waiting {
            self.counter = self.counter.saturating_add(1);
        }

        match channel {
            Some(channel) => buttons
                .into_iter()
                .map(|button| encoder::button_press(channel, button))
                .collect(),
            None => {
                if !buttons.is_empty() {
                    debug!(?buttons, "no channel, dropping button presses");
                }
                Vec::new()
            }
        }
    }

    /// Forgets every outstanding request
    pub fn clear(&mut self) {
        *self = Targets::default();
    }
}

/// Checks a requested set point against the limits of `scale` and rounds it
/// to the panel's resolution
pub fn validate_set_point(limits: &TempLimits, scale: TempScale, value: f64) -> Result<f64> {
    if !value.is_finite() || !limits.contains(scale, value) {
        let (min, max) = limits.range(scale);
        return Err(Error::rejected(format!(
            "set point {} outside {}..={} {}",
            value, min, max, scale
        )));
    }
    Ok(scale.round(value))
}

/// Presses needed to cycle a pump from `current` to `wanted` when it has
/// `max + 1` states; always at least one
pub fn pump_presses(current: u8, wanted: u8, max: u8) -> usize {
    let states = max as i16 + 1;
    (wanted as i16 - current as i16).rem_euclid(states).max(1) as usize
}

/// Validates a pump request and returns the number of presses it takes
pub fn validate_pump(topology: &Topology, state: &SpaState, index: usize, wanted: u8) -> Result<usize> {
    if index >= MAX_PUMPS {
        return Err(Error::rejected(format!("pump {} does not exist", index)));
    }
    let max = topology.pumps[index];
    if wanted > max {
        return Err(Error::rejected(format!(
            "pump {} has no state {} (max {})",
            index, wanted, max
        )));
    }
    let current = state.pumps[index];
    if current == wanted {
        return Err(Error::rejected(format!("pump {} already in state {}", index, wanted)));
    }
    Ok(pump_presses(current, wanted, max))
}

pub fn validate_light(topology: &Topology, index: usize) -> Result<()> {
    if index >= topology.lights {
        return Err(Error::rejected(format!("light {} does not exist", index)));
    }
    Ok(())
}

pub fn validate_primary_filter(start_hour: u8, duration_hours: u8, frequency: u8) -> Result<()> {
    if start_hour > 23 {
        return Err(Error::rejected(format!("filter start hour {} out of range", start_hour)));
    }
    if duration_hours == 0 || duration_hours > 24 {
        return Err(Error::rejected(format!("filter duration {}h out of range", duration_hours)));
    }
    if !matches!(frequency, 1..=4 | 8) {
        return Err(Error::rejected(format!("filter frequency {} not supported", frequency)));
    }
    Ok(())
}

pub fn validate_secondary_filter(mode: u8) -> Result<()> {
    if mode > 2 {
        return Err(Error::rejected(format!("secondary filter mode {} out of range", mode)));
    }
    Ok(())
}

/// Fields of a clock command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockFields {
    pub month: u8,
    pub day: u8,
    /// Years since 2000
    pub year_offset: u8,
    pub hour: u8,
    pub minute: u8,
}

impl ClockFields {
    /// New time of day, keeping the calendar from the snapshot
    pub fn with_time(state: &SpaState, time: NaiveTime) -> Result<Self> {
        let year = state
            .date
            .year
            .ok_or_else(|| Error::rejected("spa calendar not known yet"))?;
        Ok(ClockFields {
            month: state.date.month,
            day: state.date.day,
            year_offset: year_offset(year as i32)?,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        })
    }

    /// New calendar date, keeping the time of day from the snapshot
    pub fn with_date(state: &SpaState, date: NaiveDate) -> Result<Self> {
        if state.date.year.is_none() {
            return Err(Error::rejected("spa clock not known yet"));
        }
        Ok(ClockFields {
            month: date.month() as u8,
            day: date.day() as u8,
            year_offset: year_offset(date.year())?,
            hour: state.time.hour,
            minute: state.time.minute,
        })
    }

    pub fn to_frame(self, channel: u8) -> Frame {
        encoder::set_clock(channel, self.month, self.day, self.year_offset, self.hour, self.minute)
    }
}

fn year_offset(year: i32) -> Result<u8> {
    let (first, last) = YEAR_RANGE;
    if year < first || year > last {
        return Err(Error::rejected(format!("year {} outside {}..={}", year, first, last)));
    }
    Ok((year - first) as u8)
}

//! Per-connection protocol engine
//!
//! Classifies each incoming frame through the dialect table, routes
//! arbitration traffic to the [`Arbiter`] and everything else through change
//! detection into the dialect decoder. It performs no I/O: the receive loop
//! carries out the returned [`Outcome`].

use chrono::Utc;
use tracing::{debug, trace, warn};

use crate::command::Targets;
use crate::core::ChangeDetection;
use crate::decode::ChangeDetector;
use crate::protocol::{Action, ArbitrationConfig, Arbiter, CommandStyle, DialectTable, Frame, MessageKind};
use crate::util::Hex;
use super::SpaState;

/// What the receive loop must do after one frame
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Frames to write immediately
    pub replies: Vec<Frame>,
    /// Our channel holds the transmit token
    pub grant: bool,
    /// Channel newly assigned to us
    pub assigned: Option<u8>,
    /// A status broadcast changed the snapshot
    pub changed: bool,
    /// Button presses to queue
    pub presses: Vec<Frame>,
}

pub struct Engine {
    dialect: &'static DialectTable,
    arbiter: Arbiter,
    changes: ChangeDetector,
}

impl Engine {
    pub fn new(dialect: &'static DialectTable, arbitration: ArbitrationConfig, detection: ChangeDetection) -> Self {
        Engine {
            dialect,
            arbiter: Arbiter::new(arbitration),
            changes: ChangeDetector::new(detection),
        }
    }

    pub fn channel(&self) -> Option<u8> {
        self.arbiter.channel()
    }

    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    /// Processes one frame against the snapshot and the pending targets
    pub fn handle(&mut self, frame: &Frame, state: &mut SpaState, targets: &mut Targets) -> Outcome {
        let mut outcome = Outcome::default();

        let kind = match self.dialect.classify(frame.message_type) {
            Some(kind) => kind,
            None => {
                debug!(
                    channel = frame.channel,
                    message_type = frame.message_type,
                    frame = %Hex(&frame.to_bytes()),
                    "unknown message type"
                );
                return outcome;
            }
        };

        if kind.is_arbitration() {
            for action in self.arbiter.on_message(kind, frame) {
                match action {
                    Action::Reply(reply) => outcome.replies.push(reply),
                    Action::Transmit => outcome.grant = true,
                    Action::Assigned(channel) => outcome.assigned = Some(channel),
                }
            }
            return outcome;
        }

        if self.changes.observe(kind, &frame.payload, frame.checksum) {
            match (self.dialect.decoder)(kind, &frame.payload, &self.dialect.topology) {
                Ok(Some(update)) => {
                    trace!(%kind, "applying update");
                    update.apply(state);
                    if kind == MessageKind::StatusUpdate {
                        state.last_update = Some(Utc::now());
                        outcome.changed = true;
                    }
                }
                Ok(None) => trace!(%kind, "no decoder for message"),
                Err(e) => {
                    warn!(error = %e, frame = %Hex(&frame.to_bytes()), "dropping frame");
                    return outcome;
                }
            }
        }

        if kind == MessageKind::StatusUpdate && self.dialect.command_style == CommandStyle::ButtonPresses {
            outcome.presses = targets.reconcile(state, self.arbiter.channel());
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::dialect::{JACUZZI, SUNDANCE};
    use crate::protocol::message::types;

    fn engine(dialect: &'static DialectTable) -> Engine {
        Engine::new(dialect, ArbitrationConfig::default(), ChangeDetection::FullPayload)
    }

    fn status_payload(set_temp: u8, current_temp: u8) -> Vec<u8> {
        let mut p = vec![0u8; 23];
        p[7] = current_temp;
        p[9] = set_temp;
        p[13] = 0x01;
        p
    }

    fn incoming(channel: u8, message_type: u8, payload: Vec<u8>) -> Frame {
        Frame::new(channel, 0xAF, message_type, payload)
    }

    #[test]
    fn test_status_updates_snapshot() {
        let mut engine = engine(&JACUZZI);
        let mut state = SpaState::new(&JACUZZI.topology);
        let mut targets = Targets::default();

        let outcome = engine.handle(&incoming(0xFF, 0x16, status_payload(140, 142)), &mut state, &mut targets);
        assert!(outcome.changed);
        assert_eq!(state.set_temp, Some(70.0));
        assert_eq!(state.current_temp, Some(71.0));
        assert!(state.last_update.is_some());
    }

    #[test]
    fn test_repeated_status_is_not_a_change() {
        let mut engine = engine(&JACUZZI);
        let mut state = SpaState::new(&JACUZZI.topology);
        let mut targets = Targets::default();
        let frame = incoming(0xFF, 0x16, status_payload(140, 142));

        assert!(engine.handle(&frame, &mut state, &mut targets).changed);
        let first = state.last_update;

        assert!(!engine.handle(&frame, &mut state, &mut targets).changed);
        assert_eq!(state.last_update, first);

        assert!(engine.handle(&incoming(0xFF, 0x16, status_payload(141, 142)), &mut state, &mut targets).changed);
        assert_eq!(state.set_temp, Some(70.5));
    }

    #[test]
    fn test_truncated_frame_is_dropped() {
        let mut engine = engine(&JACUZZI);
        let mut state = SpaState::new(&JACUZZI.topology);
        let mut targets = Targets::default();

        let outcome = engine.handle(&incoming(0xFF, 0x16, vec![0; 10]), &mut state, &mut targets);
        assert_eq!(outcome, Outcome::default());
        assert_eq!(state.last_update, None);
    }

    #[test]
    fn test_unknown_type_is_ignored() {
        let mut engine = engine(&JACUZZI);
        let mut state = SpaState::new(&JACUZZI.topology);
        let before = state.clone();

        let outcome = engine.handle(&incoming(0xFF, 0xC4, vec![0; 30]), &mut state, &mut Targets::default());
        assert_eq!(outcome, Outcome::default());
        assert_eq!(state, before);
    }

    #[test]
    fn test_arbitration_outcomes() {
        let mut engine = engine(&JACUZZI);
        let mut state = SpaState::new(&JACUZZI.topology);
        let mut targets = Targets::default();

        let outcome = engine.handle(
            &incoming(0xFE, types::CHANNEL_ASSIGNMENT_RESPONSE, vec![0x07, 0xF1, 0x73]),
            &mut state,
            &mut targets,
        );
        assert_eq!(outcome.assigned, Some(7));
        assert_eq!(outcome.replies, vec![Frame::outgoing(7, types::CHANNEL_ASSIGNMENT_ACK, Vec::new())]);
        assert_eq!(engine.channel(), Some(7));

        let outcome = engine.handle(&incoming(7, types::CLEAR_TO_SEND, Vec::new()), &mut state, &mut targets);
        assert!(outcome.grant);

        let outcome = engine.handle(&incoming(8, types::CLEAR_TO_SEND, Vec::new()), &mut state, &mut targets);
        assert!(!outcome.grant);
    }

    #[test]
    fn test_sundance_reconciles_on_every_status() {
        let mut engine = engine(&SUNDANCE);
        let mut state = SpaState::new(&SUNDANCE.topology);
        let mut targets = Targets {
            set_temp: Some(38.0),
            ..Default::default()
        };
        engine.handle(
            &incoming(0xFE, types::CHANNEL_ASSIGNMENT_RESPONSE, vec![0x07]),
            &mut state,
            &mut targets,
        );

        // folded x4 = 180 (39.5 C), x3 = 75 (37.0 C)
        let mut x = [0u8; 16];
        x[3] = 75;
        x[4] = 180;
        let payload: Vec<u8> = x.iter().flat_map(|v| [v ^ 1, 0x00]).collect();
        let frame = incoming(0xFF, 0xC4, payload);

        let mut presses = Vec::new();
        for _ in 0..4 {
            presses.extend(engine.handle(&frame, &mut state, &mut targets).presses);
        }
        assert_eq!(state.set_temp, Some(39.5));
        assert_eq!(presses.len(), 1);
        assert_eq!(presses[0].channel, 7);
        assert_eq!(presses[0].payload[0], 0x02);
    }
}

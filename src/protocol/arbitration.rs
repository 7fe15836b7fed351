//! Channel arbitration on the shared bus
//!
//! The controller hands out transmit slots per channel. A client learns which
//! channels exist from the clear-to-send tokens, learns which are busy from the
//! button presses other panels broadcast, and either asks the controller for a
//! channel or, after enough quiet probe cycles, claims a free one outright.
//!
//! [`Arbiter`] is a pure state machine: it consumes classified frames and
//! returns the actions the caller must carry out.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::core::DEFAULT_PROBE_THRESHOLD;
use crate::util::Hex;
use super::codec::Frame;
use super::message::{types, MessageKind};

/// Channel the controller listens on for assignment requests
pub const ASSIGNMENT_CHANNEL: u8 = 0xFE;

/// Progress of the search for a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbitrationPhase {
    /// Nothing learned about the bus yet
    Unassigned,
    /// Counting probe cycles or waiting for an assignment response
    Probing,
    /// Owns the given channel
    Assigned(u8),
}

/// Work the arbiter asks its caller to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write this frame immediately, outside the transmit queue
    Reply(Frame),
    /// Our channel holds the token: send one queued frame
    Transmit,
    /// We now own this channel
    Assigned(u8),
}

/// Arbitration parameters fixed for a connection
#[derive(Debug, Clone)]
pub struct ArbitrationConfig {
    /// Quiet probe cycles before a channel is claimed or requested
    pub probe_threshold: u8,
    /// Magic bytes echoed in the assignment request
    pub nonce: [u8; 2],
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        ArbitrationConfig {
            probe_threshold: DEFAULT_PROBE_THRESHOLD,
            nonce: [0xF1, 0x73],
        }
    }
}

/// Channel arbitration state machine
#[derive(Debug)]
pub struct Arbiter {
    config: ArbitrationConfig,
    assigned: Option<u8>,
    /// Channels the controller grants tokens to
    discovered: BTreeSet<u8>,
    /// Channels seen transacting
    active: BTreeSet<u8>,
    probe_count: u8,
}

impl Arbiter {
    /// Creates an arbiter with nothing learned about the bus
    pub fn new(config: ArbitrationConfig) -> Self {
        Arbiter {
            config,
            assigned: None,
            discovered: BTreeSet::new(),
            active: BTreeSet::new(),
            probe_count: 0,
        }
    }

    /// Current phase
    pub fn phase(&self) -> ArbitrationPhase {
        match self.assigned {
            Some(channel) => ArbitrationPhase::Assigned(channel),
            None if self.probe_count > 0 => ArbitrationPhase::Probing,
            None => ArbitrationPhase::Unassigned,
        }
    }

    /// Our channel, once assigned
    pub fn channel(&self) -> Option<u8> {
        self.assigned
    }

    pub fn discovered(&self) -> &BTreeSet<u8> {
        &self.discovered
    }

    pub fn active(&self) -> &BTreeSet<u8> {
        &self.active
    }

    fn threshold_reached(&self) -> bool {
        self.probe_count >= self.config.probe_threshold
    }

    /// Feeds one classified frame through the state machine
    pub fn on_message(&mut self, kind: MessageKind, frame: &Frame) -> Vec<Action> {
        let sender = frame.channel;
        let mut actions = Vec::new();

        match kind {
            MessageKind::ClientClearToSend => {
                if self.assigned.is_none() && self.threshold_reached() {
                    debug!(nonce = %Hex(&self.config.nonce), "requesting channel assignment");
                    actions.push(Action::Reply(assignment_request(self.config.nonce)));
                }
            }

            MessageKind::ChannelAssignmentResponse => match frame.payload.first() {
                Some(&channel) => {
                    info!(channel, "channel assigned by controller");
                    self.assigned = Some(channel);
                    actions.push(Action::Reply(assignment_ack(channel)));
                    actions.push(Action::Assigned(channel));
                }
                None => debug!("assignment response without a channel"),
            },

            MessageKind::ExistingClientRequest => {
                if let Some(channel) = self.assigned {
                    actions.push(Action::Reply(existing_client_response(channel)));
                }
            }

            MessageKind::ClearToSend => {
                if self.discovered.insert(sender) {
                    info!(channels = ?self.discovered, "discovered channel {}", sender);
                }
                if self.assigned == Some(sender) {
                    actions.push(Action::Transmit);
                }
            }

            MessageKind::ButtonPress => {
                if self.active.insert(sender) {
                    info!(channels = ?self.active, "active channel {}", sender);
                } else if self.assigned.is_none() && !self.threshold_reached() {
                    self.probe_count += 1;
                    if self.threshold_reached() {
                        if let Some(channel) = self.first_free() {
                            info!(channel, "claiming idle channel");
                            self.assigned = Some(channel);
                            actions.push(Action::Assigned(channel));
                        } else {
                            debug!("no idle channel, waiting for assignment probe");
                        }
                    }
                }
                if frame.payload.first().is_some_and(|&code| code != 0) {
                    info!(channel = sender, frame = %Hex(&frame.to_bytes()), "button press");
                }
            }

            _ => {}
        }

        actions
    }

    fn first_free(&self) -> Option<u8> {
        self.discovered
            .iter()
            .copied()
            .find(|channel| !self.active.contains(channel))
    }
}

/// Request for a channel, sent to the assignment channel
pub fn assignment_request(nonce: [u8; 2]) -> Frame {
    Frame::outgoing(
        ASSIGNMENT_CHANNEL,
        types::CHANNEL_ASSIGNMENT_REQUEST,
        vec![0x02, nonce[0], nonce[1]],
    )
}

/// Acceptance of an offered channel
pub fn assignment_ack(channel: u8) -> Frame {
    Frame::outgoing(channel, types::CHANNEL_ASSIGNMENT_ACK, Vec::new())
}

/// Presence confirmation for an existing-client probe
pub fn existing_client_response(channel: u8) -> Frame {
    Frame::outgoing(channel, types::EXISTING_CLIENT_RESPONSE, vec![0x04, 0x08, 0x00])
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn frame(channel: u8, message_type: u8, payload: &[u8]) -> Frame {
        Frame::new(channel, 0xAF, message_type, Bytes::copy_from_slice(payload))
    }

    fn arbiter() -> Arbiter {
        Arbiter::new(ArbitrationConfig::default())
    }

    /// Feeds `n` button presses from `channel` through the arbiter
    fn presses(arbiter: &mut Arbiter, channel: u8, n: usize) -> Vec<Action> {
        let mut actions = Vec::new();
        for _ in 0..n {
            actions.extend(arbiter.on_message(
                MessageKind::ButtonPress,
                &frame(channel, 0x17, &[0x00, 0x00]),
            ));
        }
        actions
    }

    fn acks(actions: &[Action]) -> usize {
        actions
            .iter()
            .filter(|a| matches!(a, Action::Reply(f) if f.message_type == types::CHANNEL_ASSIGNMENT_ACK))
            .count()
    }

    #[test]
    fn test_arbitration_frames() {
        assert_eq!(
            assignment_request([0xF1, 0x73]).to_bytes(),
            Bytes::from_static(&[0x7E, 0x08, 0xFE, 0xBF, 0x01, 0x02, 0xF1, 0x73, 0xB9, 0x7E])
        );
        assert_eq!(
            assignment_ack(0x07).to_bytes(),
            Bytes::from_static(&[0x7E, 0x05, 0x07, 0xBF, 0x03, 0xF3, 0x7E])
        );
        assert_eq!(
            existing_client_response(0x10).to_bytes(),
            Bytes::from_static(&[0x7E, 0x08, 0x10, 0xBF, 0x05, 0x04, 0x08, 0x00, 0x73, 0x7E])
        );
    }

    #[test]
    fn test_probe_then_assignment_response() {
        let mut arbiter = arbiter();
        assert_eq!(arbiter.phase(), ArbitrationPhase::Unassigned);

        // no request before the threshold
        assert!(arbiter
            .on_message(MessageKind::ClientClearToSend, &frame(0xFF, 0x00, &[]))
            .is_empty());

        // one press registers the channel, five more reach the threshold
        presses(&mut arbiter, 0x10, 1);
        assert_eq!(arbiter.phase(), ArbitrationPhase::Unassigned);
        let actions = presses(&mut arbiter, 0x10, 5);
        assert!(actions.is_empty());
        assert_eq!(arbiter.phase(), ArbitrationPhase::Probing);

        let actions = arbiter.on_message(MessageKind::ClientClearToSend, &frame(0xFF, 0x00, &[]));
        assert_eq!(actions, vec![Action::Reply(assignment_request([0xF1, 0x73]))]);

        let actions = arbiter.on_message(
            MessageKind::ChannelAssignmentResponse,
            &frame(0xFE, 0x02, &[0x07, 0xF1, 0x73]),
        );
        assert_eq!(acks(&actions), 1);
        assert!(actions.contains(&Action::Assigned(7)));
        assert_eq!(arbiter.phase(), ArbitrationPhase::Assigned(7));

        // once assigned, client probes are ignored
        assert!(arbiter
            .on_message(MessageKind::ClientClearToSend, &frame(0xFF, 0x00, &[]))
            .is_empty());
    }

    #[test]
    fn test_self_assigns_lowest_free_channel() {
        let mut arbiter = arbiter();
        for channel in [0x12, 0x10, 0x11] {
            arbiter.on_message(MessageKind::ClearToSend, &frame(channel, 0x06, &[]));
        }
        presses(&mut arbiter, 0x10, 1);
        let actions = presses(&mut arbiter, 0x10, 5);

        assert_eq!(actions, vec![Action::Assigned(0x11)]);
        assert_eq!(arbiter.channel(), Some(0x11));

        // further presses leave the assignment alone
        assert!(presses(&mut arbiter, 0x10, 10).is_empty());
        assert_eq!(arbiter.channel(), Some(0x11));
    }

    #[test]
    fn test_no_free_channel_keeps_probing() {
        let mut arbiter = arbiter();
        arbiter.on_message(MessageKind::ClearToSend, &frame(0x10, 0x06, &[]));
        presses(&mut arbiter, 0x10, 20);
        assert_eq!(arbiter.phase(), ArbitrationPhase::Probing);
        assert_eq!(arbiter.discovered().len(), 1);
        assert_eq!(arbiter.active().len(), 1);
    }

    #[test]
    fn test_clear_to_send_grants_only_our_channel() {
        let mut arbiter = arbiter();
        arbiter.on_message(
            MessageKind::ChannelAssignmentResponse,
            &frame(0xFE, 0x02, &[0x10]),
        );

        // first token for our channel both discovers and grants it
        let actions = arbiter.on_message(MessageKind::ClearToSend, &frame(0x10, 0x06, &[]));
        assert_eq!(actions, vec![Action::Transmit]);
        assert!(arbiter.discovered().contains(&0x10));

        assert!(arbiter
            .on_message(MessageKind::ClearToSend, &frame(0x11, 0x06, &[]))
            .is_empty());
    }

    #[test]
    fn test_first_token_on_assigned_channel_grants() {
        let mut arbiter = arbiter();
        arbiter.on_message(
            MessageKind::ChannelAssignmentResponse,
            &frame(0xFE, 0x02, &[0x07]),
        );
        assert!(arbiter.discovered().is_empty());

        for _ in 0..2 {
            let actions = arbiter.on_message(MessageKind::ClearToSend, &frame(0x07, 0x06, &[]));
            assert_eq!(actions, vec![Action::Transmit]);
        }
        assert_eq!(arbiter.discovered().len(), 1);
        assert_eq!(arbiter.phase(), ArbitrationPhase::Assigned(0x07));
    }

    #[test]
    fn test_existing_client_reply_requires_channel() {
        let mut arbiter = arbiter();
        assert!(arbiter
            .on_message(MessageKind::ExistingClientRequest, &frame(0xFF, 0x04, &[]))
            .is_empty());

        arbiter.on_message(
            MessageKind::ChannelAssignmentResponse,
            &frame(0xFE, 0x02, &[0x10]),
        );
        let actions = arbiter.on_message(MessageKind::ExistingClientRequest, &frame(0xFF, 0x04, &[]));
        assert_eq!(actions, vec![Action::Reply(existing_client_response(0x10))]);
    }

    #[test]
    fn test_deterministic_sequence() {
        let run = || {
            let mut arbiter = arbiter();
            let mut all = Vec::new();
            all.extend(presses(&mut arbiter, 0x0A, 6));
            all.extend(arbiter.on_message(MessageKind::ClientClearToSend, &frame(0xFF, 0x00, &[])));
            all.extend(arbiter.on_message(
                MessageKind::ChannelAssignmentResponse,
                &frame(0xFE, 0x02, &[0x07]),
            ));
            (all, arbiter.phase())
        };

        let (first, phase) = run();
        let (second, _) = run();
        assert_eq!(first, second);
        assert_eq!(phase, ArbitrationPhase::Assigned(7));
        assert_eq!(acks(&first), 1);
    }
}

//! Repeated-broadcast suppression
//!
//! Controllers rebroadcast status several times a second. A payload is only
//! decoded when it differs from the previous one of the same kind.

use std::collections::HashMap;

use bytes::Bytes;

use crate::core::ChangeDetection;
use crate::protocol::MessageKind;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Fingerprint {
    Payload(Bytes),
    Checksum(u8),
}

/// Remembers the last payload seen for each message kind
#[derive(Debug)]
pub struct ChangeDetector {
    strategy: ChangeDetection,
    last: HashMap<MessageKind, Fingerprint>,
}

impl ChangeDetector {
    pub fn new(strategy: ChangeDetection) -> Self {
        ChangeDetector {
            strategy,
            last: HashMap::new(),
        }
    }

    pub fn strategy(&self) -> ChangeDetection {
        self.strategy
    }

    /// Records a payload and reports whether it differs from the previous one.
    ///
    /// The first payload of each kind always counts as a change.
    pub fn observe(&mut self, kind: MessageKind, payload: &Bytes, checksum: u8) -> bool {
        let fingerprint = match self.strategy {
            ChangeDetection::FullPayload => Fingerprint::Payload(payload.clone()),
            ChangeDetection::Checksum => Fingerprint::Checksum(checksum),
        };
        match self.last.insert(kind, fingerprint.clone()) {
            Some(previous) => previous != fingerprint,
            None => true,
        }
    }

    /// Forgets everything seen so far
    pub fn reset(&mut self) {
        self.last.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_is_a_change() {
        let mut detector = ChangeDetector::new(ChangeDetection::FullPayload);
        let payload = Bytes::from_static(&[1, 2, 3]);
        assert!(detector.observe(MessageKind::StatusUpdate, &payload, 0x10));
        assert!(!detector.observe(MessageKind::StatusUpdate, &payload, 0x10));
        assert!(!detector.observe(MessageKind::StatusUpdate, &payload, 0x10));

        // kinds are tracked independently
        assert!(detector.observe(MessageKind::LightStatus, &payload, 0x10));
    }

    #[test]
    fn test_full_payload_strategy() {
        let mut detector = ChangeDetector::new(ChangeDetection::FullPayload);
        assert!(detector.observe(MessageKind::StatusUpdate, &Bytes::from_static(&[1, 2]), 0x10));
        // same checksum, different bytes
        assert!(detector.observe(MessageKind::StatusUpdate, &Bytes::from_static(&[1, 3]), 0x10));
    }

    #[test]
    fn test_checksum_strategy() {
        let mut detector = ChangeDetector::new(ChangeDetection::Checksum);
        assert!(detector.observe(MessageKind::StatusUpdate, &Bytes::from_static(&[1, 2]), 0x10));
        assert!(!detector.observe(MessageKind::StatusUpdate, &Bytes::from_static(&[1, 3]), 0x10));
        assert!(detector.observe(MessageKind::StatusUpdate, &Bytes::from_static(&[1, 3]), 0x11));
    }

    #[test]
    fn test_reset() {
        let mut detector = ChangeDetector::new(ChangeDetection::Checksum);
        detector.observe(MessageKind::PumpState, &Bytes::new(), 0x42);
        detector.reset();
        assert!(detector.observe(MessageKind::PumpState, &Bytes::new(), 0x42));
    }
}

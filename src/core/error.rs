use std::io;
use thiserror::Error;

use crate::protocol::MessageKind;

/// Custom error types for the spa protocol engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Connect error: {0}")]
    Connect(String),

    #[error("Command rejected: {0}")]
    CommandRejected(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new connect error
    pub fn connect(msg: impl Into<String>) -> Self {
        Error::Connect(msg.into())
    }

    /// Creates a new command rejection
    pub fn rejected(msg: impl Into<String>) -> Self {
        Error::CommandRejected(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

/// Envelope violations found while scanning the byte stream.
///
/// These never leave the reader: the codec drops one byte and rescans.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("expected 0x7E at byte {position}, found 0x{found:02X}")]
    BadSentinel { position: usize, found: u8 },

    #[error("length byte {0} outside 5..=128")]
    BadLength(u8),

    #[error("checksum mismatch: computed 0x{expected:02X}, frame carries 0x{found:02X}")]
    ChecksumMismatch { expected: u8, found: u8 },

    #[error("frame needs {needed} bytes, have {actual}")]
    Incomplete { needed: usize, actual: usize },
}

/// Payload did not carry the bytes a decoder needs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{kind:?} payload truncated: need {needed} bytes, got {actual}")]
    Truncated {
        kind: MessageKind,
        needed: usize,
        actual: usize,
    },
}

impl DecodeError {
    /// Fails with `Truncated` unless `payload` holds at least `needed` bytes
    pub fn check_len(kind: MessageKind, payload: &[u8], needed: usize) -> std::result::Result<(), Self> {
        if payload.len() < needed {
            Err(DecodeError::Truncated {
                kind,
                needed,
                actual: payload.len(),
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::rejected("pump 7 does not exist");
        assert!(matches!(err, Error::CommandRejected(_)));
        assert_eq!(err.to_string(), "Command rejected: pump 7 does not exist");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));

        let err: Error = FrameError::BadLength(3).into();
        assert_eq!(err.to_string(), "Frame error: length byte 3 outside 5..=128");
    }

    #[test]
    fn test_truncated_check() {
        assert!(DecodeError::check_len(MessageKind::LightStatus, &[0; 6], 6).is_ok());
        let err = DecodeError::check_len(MessageKind::LightStatus, &[0; 4], 6).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                kind: MessageKind::LightStatus,
                needed: 6,
                actual: 4
            }
        );
    }
}

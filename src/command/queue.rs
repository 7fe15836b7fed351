//! Transmit queue
//!
//! Commands are produced from any task but may only go out when the controller
//! grants our channel a slot, so they wait here until the receive loop pops
//! one per grant.

use tokio::sync::mpsc;
use tracing::trace;

use crate::core::{Error, Result};
use crate::protocol::Frame;
use crate::util::Hex;

/// Creates a connected queue handle and receiver
pub fn transmit_queue() -> (TransmitQueue, QueueReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TransmitQueue { tx }, QueueReceiver { rx })
}

/// Producer side, cheap to clone
#[derive(Debug, Clone)]
pub struct TransmitQueue {
    tx: mpsc::UnboundedSender<Frame>,
}

impl TransmitQueue {
    /// Appends a frame to the back of the queue
    pub fn push(&self, frame: Frame) -> Result<()> {
        trace!(frame = %Hex(&frame.to_bytes()), "queueing frame");
        self.tx
            .send(frame)
            .map_err(|_| Error::invalid_state("transmit queue closed"))
    }
}

/// Consumer side, owned by the receive loop
#[derive(Debug)]
pub struct QueueReceiver {
    rx: mpsc::UnboundedReceiver<Frame>,
}

impl QueueReceiver {
    /// Takes the oldest queued frame, if any
    pub fn pop(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }

    /// Discards everything queued, returning how many frames were dropped
    pub fn drain(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

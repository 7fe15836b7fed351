//! Gateway transport
//!
//! The spa bus is reached through an RS485-to-Ethernet bridge that relays the
//! raw byte stream over TCP. This module opens that connection and turns the
//! stream into frames in both directions.

mod connection;

pub use self::connection::{connect, Transport};

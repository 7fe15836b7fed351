//! spa_rs485: protocol engine for Balboa-derived spa controllers
//!
//! Jacuzzi J-series and Sundance 780/880 controllers talk over an RS485
//! multi-drop bus, usually reached through a serial-to-Ethernet gateway. This
//! crate frames and checksums that byte stream, negotiates a bus channel,
//! decodes the status broadcasts into a [`SpaState`] snapshot and sends
//! commands in the controller's own dialect.
//!
//! ```no_run
//! use spa_rs485::{Dialect, Session, SessionConfig};
//!
//! # async fn demo() -> spa_rs485::Result<()> {
//! let session = Session::new(SessionConfig::new("192.168.1.40", Dialect::Jacuzzi))?;
//! let runner = session.clone();
//! tokio::spawn(async move { runner.run().await });
//!
//! session.set_temperature(38.5).await;
//! println!("{}", session.connection_state_text());
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod core;
pub mod decode;
pub mod network;
pub mod protocol;
pub mod session;
pub mod util;

// Re-export commonly used items
pub use crate::core::{ConnectionState, Dialect, Error, Result, SessionConfig, TempScale};
pub use crate::protocol::{DialectTable, Frame, MessageKind};
pub use crate::session::{Link, Session, SpaState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # Firmata Protocol Engine
//!
//! Talks to an Arduino-class microcontroller running Firmata firmware over a
//! serial link: incremental frame decoding, pin state tracking, outbound
//! command encoding, and connection lifecycle management.
//!
//! ## Design
//!
//! Everything is driven by a cooperative pump rather than a reader thread:
//! some serial-port stacks are not safe to read from a background thread, so
//! the caller ticks [`Connection::poll`] periodically and drains decoded
//! events afterwards. Each poll bounds its own work; a burst of input is
//! spread over several ticks instead of monopolizing the thread.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use firmlink::firmata::{Connection, PinMode, SerialTransport};
//!
//! fn main() -> anyhow::Result<()> {
//!     let transport = SerialTransport::new("/dev/ttyUSB0", 57600);
//!     let mut conn = Connection::new(Box::new(transport), Duration::from_secs(3));
//!     conn.open()?;
//!     conn.run_when_ready(|board| {
//!         let _ = board.set_pin_mode(13, PinMode::Output);
//!         let _ = board.digital_write(13, true);
//!     });
//!     loop {
//!         conn.poll()?;
//!         while let Some(event) = conn.next_event() {
//!             println!("{:?}", event);
//!         }
//!         std::thread::sleep(Duration::from_millis(10));
//!     }
//! }
//! ```
//!
//! ## Error classes
//!
//! - Read timeouts are not errors; they end the current poll's work.
//! - Unrecognized commands and SysEx sub-commands are dropped silently, so
//!   newer firmware doesn't break older hosts.
//! - Any other transport failure, and a SysEx payload overflowing its buffer,
//!   are fatal: the connection manager tears the link down.

pub mod board;
pub mod connection;
pub mod decoder;
pub mod protocol;
pub mod transport;

pub use board::Board;
pub use connection::{Connection, LinkState};
pub use decoder::{Decoder, MAX_SYSEX_BYTES, PUMP_BYTE_BUDGET};
pub use protocol::{Capability, FirmataEvent, Pin, PinMode};
pub use transport::{SerialTransport, Transport, TransportError};

use thiserror::Error;

/// Protocol engine errors.
#[derive(Debug, Error)]
pub enum FirmataError {
    /// The transport failed (anything other than a read timeout).
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A SysEx payload exceeded the pending-byte capacity. Fatal: truncating
    /// would corrupt framing for every subsequent byte.
    #[error("sysex payload exceeded the {limit}-byte buffer")]
    SysexOverflow { limit: usize },
    /// A pin index outside the known pin tables was used.
    #[error("pin {pin} is out of range ({pins} pins mapped)")]
    PinOutOfRange { pin: u8, pins: usize },
    /// An analog channel index outside the known channel table was used.
    #[error("analog channel {channel} is out of range ({channels} channels mapped)")]
    ChannelOutOfRange { channel: u8, channels: usize },
}

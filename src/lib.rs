//! # Firmlink - Firmata serial-link client
//!
//! Firmlink talks to Arduino-class microcontrollers running the Firmata
//! firmware over a USB/UART serial link: pin I/O, capability discovery, and
//! connection lifecycle handling, driven by a cooperative polling pump.
//!
//! ## Features
//!
//! - **Incremental decoding**: messages split across arbitrarily many reads
//!   (including variable-length SysEx payloads) decode identically to whole
//!   deliveries, with a per-tick byte budget so bursts can't starve the loop.
//! - **Pin/board model**: last-known digital port and analog channel values,
//!   capability snapshots with analog channel numbering, whole-port digital
//!   writes against a local output latch.
//! - **Lifecycle management**: open → version handshake → reboot settle →
//!   ready, with FIFO-ordered deferred setup actions.
//! - **Cadence tracking**: revolution timing and RPM smoothing from a reed
//!   switch on a digital pin, for exercise-bike style rigs.
//!
//! ## Quick Start
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
//!         let _ = board.query_capabilities();
//!         let _ = board.set_pin_mode(8, PinMode::Input);
//!         let _ = board.report_digital(1, true);
//!     });
//!     // ...then poll the connection periodically and drain events.
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`firmata`] - Protocol engine: transport, decoder, board model, lifecycle
//! - [`cadence`] - Cadence tracker and smoother built on the board model
//! - [`config`] - Configuration management and validation
//! - [`logutil`] - Log sanitization helpers for raw byte traffic

pub mod cadence;
pub mod config;
pub mod firmata;
pub mod logutil;

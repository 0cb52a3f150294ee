//! Incremental Firmata frame decoder.
//!
//! The decoder is fed one byte at a time and reconstructs complete protocol
//! messages across arbitrarily split reads: a two-data-byte message or a
//! SysEx payload may arrive over any number of pump calls and still yield
//! exactly one event. It holds no I/O; the board pump owns the transport and
//! feeds whatever bytes are available each tick.

use log::{debug, trace, warn};

use super::protocol::{
    Capability, FirmataEvent, Pin, PinMode, ANALOG_MESSAGE, CAPABILITY_LIST_END,
    CAPABILITY_RESPONSE, DIGITAL_MESSAGE, END_SYSEX, REPORT_VERSION, START_SYSEX,
};
use super::FirmataError;

/// Bytes processed per pump invocation, at most. Bounds the work one tick can
/// do so a burst of input cannot starve other periodic work on the same
/// thread; leftover bytes are picked up next tick.
pub const PUMP_BYTE_BUDGET: usize = 64;

/// Capacity for buffered SysEx payload bytes. Exceeding it is fatal for the
/// connection: truncating would corrupt framing for every byte that follows.
pub const MAX_SYSEX_BYTES: usize = 4096;

/// Where the decoder is in the byte stream. Exactly one variant is active;
/// a byte belongs to at most one in-flight message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Between messages, expecting a command byte.
    Idle,
    /// A two-data-byte command was seen; `remaining` counts down as data
    /// bytes arrive and doubles as the storage index, so the first-received
    /// byte lands in the high slot and ends up as the low 7 bits of the
    /// reconstructed value.
    AwaitData {
        command: u8,
        channel: u8,
        remaining: usize,
    },
    /// Inside START_SYSEX..END_SYSEX, buffering payload bytes.
    InSysex,
}

/// Incremental protocol state machine. One per transport.
#[derive(Debug)]
pub struct Decoder {
    cursor: Cursor,
    /// Raw bytes of the message in flight: the two data slots of a multi-byte
    /// command, or the growing SysEx payload (markers excluded).
    pending: Vec<u8>,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            cursor: Cursor::Idle,
            pending: Vec::with_capacity(32),
        }
    }

    /// Abandon any half-parsed message. Called when the link closes; no
    /// partial event is emitted for the dropped fragment.
    pub fn reset(&mut self) {
        self.cursor = Cursor::Idle;
        self.pending.clear();
    }

    /// Feed one byte. Returns a complete event when this byte finishes a
    /// message, `None` while a message is still in flight or the byte was
    /// unrecognized (unknown commands are dropped for forward compatibility).
    pub fn feed(&mut self, byte: u8) -> Result<Option<FirmataEvent>, FirmataError> {
        match self.cursor {
            Cursor::InSysex => {
                if byte == END_SYSEX {
                    self.cursor = Cursor::Idle;
                    trace!("received END_SYSEX with {} bytes", self.pending.len());
                    let event = self.parse_sysex();
                    self.pending.clear();
                    return Ok(event);
                }
                if self.pending.len() >= MAX_SYSEX_BYTES {
                    // Surface the overflow once, then go idle so the rest of
                    // the oversized payload falls through the silent-drop path.
                    self.reset();
                    return Err(FirmataError::SysexOverflow {
                        limit: MAX_SYSEX_BYTES,
                    });
                }
                self.pending.push(byte);
                Ok(None)
            }
            Cursor::AwaitData {
                command,
                channel,
                remaining,
            } if byte < 0x80 => {
                let remaining = remaining - 1;
                self.pending[remaining] = byte;
                if remaining > 0 {
                    self.cursor = Cursor::AwaitData {
                        command,
                        channel,
                        remaining,
                    };
                    return Ok(None);
                }
                self.cursor = Cursor::Idle;
                // pending[1] is the first-received data byte, pending[0] the
                // second; values are 7 bits per byte, low bits first.
                let event = match command {
                    DIGITAL_MESSAGE => FirmataEvent::DigitalPort {
                        port: channel,
                        value: self.pending[1] as u16 | ((self.pending[0] as u16) << 7),
                    },
                    ANALOG_MESSAGE => FirmataEvent::AnalogPin {
                        channel,
                        value: self.pending[1] as u16 | ((self.pending[0] as u16) << 7),
                    },
                    REPORT_VERSION => FirmataEvent::Version {
                        minor: self.pending[1],
                        major: self.pending[0],
                    },
                    _ => unreachable!("only two-data-byte commands enter AwaitData"),
                };
                Ok(Some(event))
            }
            // Idle, or a command byte interrupted a multi-byte message.
            _ => {
                let (command, channel) = if byte < 0xF0 {
                    (byte & 0xF0, byte & 0x0F)
                } else {
                    // commands in the 0xF* range don't carry channel data
                    (byte, 0)
                };
                match command {
                    START_SYSEX => {
                        self.cursor = Cursor::InSysex;
                        self.pending.clear();
                    }
                    DIGITAL_MESSAGE | ANALOG_MESSAGE | REPORT_VERSION => {
                        self.cursor = Cursor::AwaitData {
                            command,
                            channel,
                            remaining: 2,
                        };
                        self.pending.clear();
                        self.pending.resize(2, 0);
                    }
                    other => {
                        // Unknown command: drop silently, stay idle.
                        trace!("ignoring unrecognized command byte 0x{:02X}", other);
                    }
                }
                Ok(None)
            }
        }
    }

    /// Parse a completed SysEx payload (markers excluded). Unrecognized
    /// sub-commands yield no event and no error.
    fn parse_sysex(&self) -> Option<FirmataEvent> {
        let sub = *self.pending.first()?;
        match sub {
            CAPABILITY_RESPONSE => Some(FirmataEvent::Capabilities(
                self.parse_capability_response(),
            )),
            other => {
                debug!("ignoring unrecognized sysex sub-command 0x{:02X}", other);
                None
            }
        }
    }

    /// Capability response body: per-pin lists of (mode, resolution) pairs,
    /// each list closed by a 127 sentinel. Pins are numbered in order of
    /// appearance; analog-capable pins additionally get the next sequential
    /// analog channel index.
    fn parse_capability_response(&self) -> Vec<Pin> {
        let body = &self.pending[1..]; // skip the sub-command byte
        let mut pins = Vec::new();
        let mut analog_channel = 0u8;
        let mut offset = 0usize;

        while offset < body.len() {
            let number = pins.len() as u8;
            let mut pin = Pin {
                number,
                analog_channel: None,
                capabilities: Vec::new(),
            };
            while offset < body.len() && body[offset] != CAPABILITY_LIST_END {
                if offset + 1 >= body.len() {
                    warn!(
                        "capability response truncated inside pin {} entry, dropping remainder",
                        number
                    );
                    return pins;
                }
                let cap = Capability {
                    mode: body[offset],
                    resolution: body[offset + 1],
                };
                if cap.mode == PinMode::Analog.value() {
                    pin.analog_channel = Some(analog_channel);
                    analog_channel += 1;
                }
                pin.capabilities.push(cap);
                offset += 2;
            }
            pins.push(pin);
            offset += 1; // skip the 127 pin boundary byte
        }
        pins
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

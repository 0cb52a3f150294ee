//! Firmata wire protocol constants and shared protocol types.
//!
//! Byte values follow the standard Firmata framing: command bytes below 0xF0
//! carry a channel in their low nibble, command bytes at or above 0xF0 do not.
//! See <https://github.com/firmata/protocol> for the upstream definition.

/// Send data for a digital port (channel nibble = port number).
pub const DIGITAL_MESSAGE: u8 = 0x90;
/// Send data for an analog pin or PWM (channel nibble = pin number).
pub const ANALOG_MESSAGE: u8 = 0xE0;
/// Enable/disable analog input reporting by pin (pin in low nibble).
pub const REPORT_ANALOG: u8 = 0xC0;
/// Enable/disable digital input reporting by port (port in low nibble).
pub const REPORT_DIGITAL: u8 = 0xD0;
/// Set a pin to INPUT/OUTPUT/PWM/etc.
pub const SET_PIN_MODE: u8 = 0xF4;
/// Report firmware version.
pub const REPORT_VERSION: u8 = 0xF9;
/// Start a SysEx (extended, variable-length) message.
pub const START_SYSEX: u8 = 0xF0;
/// End a SysEx message.
pub const END_SYSEX: u8 = 0xF7;

/// SysEx sub-command: query capabilities of all pins (empty body).
pub const CAPABILITY_QUERY: u8 = 0x6B;
/// SysEx sub-command: capability response, per-pin lists terminated by 127.
pub const CAPABILITY_RESPONSE: u8 = 0x6C;
/// Terminates one pin's capability list inside a capability response.
pub const CAPABILITY_LIST_END: u8 = 0x7F;

/// Pin mode as used in `SET_PIN_MODE` and capability responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    Input = 0,
    Output = 1,
    Analog = 2,
    Pwm = 3,
    Servo = 4,
    Shift = 5,
    I2c = 6,
}

impl PinMode {
    /// Wire value for this mode.
    pub fn value(self) -> u8 {
        self as u8
    }

    /// Decode a mode byte from a capability response. Unknown values come back
    /// as `None` so future firmware modes don't poison the whole snapshot.
    pub fn from_value(value: u8) -> Option<PinMode> {
        match value {
            0 => Some(PinMode::Input),
            1 => Some(PinMode::Output),
            2 => Some(PinMode::Analog),
            3 => Some(PinMode::Pwm),
            4 => Some(PinMode::Servo),
            5 => Some(PinMode::Shift),
            6 => Some(PinMode::I2c),
            _ => None,
        }
    }
}

/// One supported mode of a pin, as reported by a capability response.
///
/// The raw mode byte is kept so capability lists survive firmware modes this
/// crate doesn't know about yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub mode: u8,
    /// Input or output resolution in bits for this mode.
    pub resolution: u8,
}

impl Capability {
    /// The mode, if it's one we recognize.
    pub fn pin_mode(&self) -> Option<PinMode> {
        PinMode::from_value(self.mode)
    }
}

/// Description of one board I/O line, populated by a capability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    /// Stable pin number, 0-based.
    pub number: u8,
    /// Index in the analog channel numbering; present only if this pin has
    /// analog capability. Channels are assigned sequentially in pin order.
    pub analog_channel: Option<u8>,
    /// Supported modes in the order the firmware listed them.
    pub capabilities: Vec<Capability>,
}

impl Pin {
    /// Digital port this pin belongs to (8 pins per port).
    pub fn port(&self) -> u8 {
        self.number / 8
    }

    /// Whether the firmware listed `mode` for this pin.
    pub fn supports(&self, mode: PinMode) -> bool {
        self.capabilities.iter().any(|c| c.mode == mode.value())
    }
}

/// A complete message decoded off the serial link.
#[derive(Debug, Clone, PartialEq)]
pub enum FirmataEvent {
    /// New bit-packed value for one digital port. Only fires for ports with
    /// reporting enabled via `report_digital`.
    DigitalPort { port: u8, value: u16 },
    /// New reading for one analog channel (0-1023 for stock firmware).
    AnalogPin { channel: u8, value: u16 },
    /// Firmware version report.
    Version { major: u8, minor: u8 },
    /// A capability query completed; carries the full new pin snapshot.
    Capabilities(Vec<Pin>),
}

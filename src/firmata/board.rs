//! Board state, outbound command encoding, and the serial pump.
//!
//! A [`Board`] owns its transport and decoder exclusively: one board per
//! physical link, pumped from a single logical thread. Incoming events update
//! the last-known pin tables and are queued for the caller to drain with
//! [`Board::next_event`]; outbound commands are encoded and written
//! immediately.

use std::collections::VecDeque;

use log::{debug, trace};

use crate::logutil::hex_snippet;

use super::decoder::{Decoder, PUMP_BYTE_BUDGET};
use super::protocol::{
    FirmataEvent, Pin, PinMode, ANALOG_MESSAGE, CAPABILITY_QUERY, DIGITAL_MESSAGE, END_SYSEX,
    REPORT_ANALOG, REPORT_DIGITAL, REPORT_VERSION, SET_PIN_MODE, START_SYSEX,
};
use super::transport::Transport;
use super::FirmataError;

/// Table sizing before a capability snapshot tells us the real pin count.
/// 16 ports covers every stock board; the maps are resized wholesale once
/// capabilities arrive.
const DEFAULT_TABLE_SLOTS: usize = 16;

/// Pin state tables plus the encoder for outbound Firmata commands.
pub struct Board {
    transport: Box<dyn Transport>,
    decoder: Decoder,
    /// Pin snapshot from the last completed capability query. Either empty or
    /// a fully-parsed snapshot; never observed half-built.
    pins: Vec<Pin>,
    /// Last reported bit-packed input value per digital port.
    digital_in: Vec<u8>,
    /// Last commanded output value per digital port. Read-modify-write target
    /// for single-pin writes, since the wire addresses whole ports.
    digital_out: Vec<u8>,
    /// Last reported value per analog channel.
    analog_in: Vec<u16>,
    firmware_version: Option<(u8, u8)>,
    events: VecDeque<FirmataEvent>,
}

impl Board {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            decoder: Decoder::new(),
            pins: Vec::new(),
            digital_in: vec![0; DEFAULT_TABLE_SLOTS],
            digital_out: vec![0; DEFAULT_TABLE_SLOTS],
            analog_in: vec![0; DEFAULT_TABLE_SLOTS],
            firmware_version: None,
            events: VecDeque::new(),
        }
    }

    // ---------- Link control (used by the connection manager) ----------

    pub(crate) fn open_transport(&mut self) -> Result<(), FirmataError> {
        self.transport.open()?;
        Ok(())
    }

    pub(crate) fn close_transport(&mut self) {
        self.transport.close();
        // Abandon any half-parsed message; no partial event is emitted.
        self.decoder.reset();
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Forget everything learned from the device. Called on disconnect so a
    /// reconnect starts from a clean slate.
    pub(crate) fn clear_device_state(&mut self) {
        self.pins.clear();
        self.digital_in = vec![0; DEFAULT_TABLE_SLOTS];
        self.digital_out = vec![0; DEFAULT_TABLE_SLOTS];
        self.analog_in = vec![0; DEFAULT_TABLE_SLOTS];
        self.firmware_version = None;
        self.events.clear();
    }

    // ---------- Pump ----------

    /// Read and decode whatever bytes are waiting, up to the per-call budget.
    ///
    /// Returns as soon as the transport reports no data, so an idle link costs
    /// one poll. A read failure other than timeout propagates; the connection
    /// manager treats it as fatal. Decoded events land in the event queue and
    /// update the pin tables synchronously, in arrival order.
    pub fn pump(&mut self) -> Result<(), FirmataError> {
        for _ in 0..PUMP_BYTE_BUDGET {
            let byte = match self.transport.read_byte() {
                Ok(b) => b,
                Err(e) if e.is_timeout() => return Ok(()),
                Err(e) => return Err(FirmataError::Transport(e)),
            };
            if let Some(event) = self.decoder.feed(byte)? {
                self.apply(&event);
                self.events.push_back(event);
            }
        }
        Ok(())
    }

    /// Pop the oldest undelivered event.
    pub fn next_event(&mut self) -> Option<FirmataEvent> {
        self.events.pop_front()
    }

    fn apply(&mut self, event: &FirmataEvent) {
        match event {
            FirmataEvent::DigitalPort { port, value } => {
                let port = *port as usize;
                if port < self.digital_in.len() {
                    self.digital_in[port] = (*value & 0xFF) as u8;
                } else {
                    debug!("digital update for unmapped port {}, dropped", port);
                }
            }
            FirmataEvent::AnalogPin { channel, value } => {
                let channel = *channel as usize;
                if channel < self.analog_in.len() {
                    self.analog_in[channel] = *value;
                } else {
                    debug!("analog update for unmapped channel {}, dropped", channel);
                }
            }
            FirmataEvent::Version { major, minor } => {
                debug!("firmware reports protocol version {}.{}", major, minor);
                self.firmware_version = Some((*major, *minor));
            }
            FirmataEvent::Capabilities(pins) => {
                debug!("capability snapshot with {} pins", pins.len());
                self.pins = pins.clone();
                // All three tables track the pin count from here on.
                self.digital_in.resize(pins.len(), 0);
                self.digital_out.resize(pins.len(), 0);
                self.analog_in.resize(pins.len(), 0);
            }
        }
    }

    // ---------- Last-known state ----------

    /// Last known level of a digital pin. No side effect.
    pub fn digital_read(&self, pin: u8) -> Result<bool, FirmataError> {
        let port = (pin >> 3) as usize;
        if port >= self.digital_in.len() {
            return Err(FirmataError::PinOutOfRange {
                pin,
                pins: self.digital_in.len() * 8,
            });
        }
        Ok((self.digital_in[port] >> (pin & 0x07)) & 0x01 == 1)
    }

    /// Last reported value of an analog channel; 0 if never reported.
    pub fn analog_read(&self, channel: u8) -> Result<u16, FirmataError> {
        let idx = channel as usize;
        if idx >= self.analog_in.len() {
            return Err(FirmataError::ChannelOutOfRange {
                channel,
                channels: self.analog_in.len(),
            });
        }
        Ok(self.analog_in[idx])
    }

    /// Pins from the last capability snapshot; empty until one completes.
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    /// Firmware version, once a version report has been decoded.
    pub fn firmware_version(&self) -> Option<(u8, u8)> {
        self.firmware_version
    }

    // ---------- Outbound commands ----------

    /// Set a pin to INPUT/OUTPUT/ANALOG/PWM/etc. The mode is not cached
    /// locally; the wire protocol is stateless about it.
    pub fn set_pin_mode(&mut self, pin: u8, mode: PinMode) -> Result<(), FirmataError> {
        if pin > 0x7F {
            return Err(FirmataError::PinOutOfRange { pin, pins: 128 });
        }
        trace!("set_pin_mode pin={} mode={:?}", pin, mode);
        self.send(&[SET_PIN_MODE, pin, mode.value()])
    }

    /// Drive a digital output pin. Updates the pin's bit in the port latch and
    /// writes the whole port value, because the wire addresses 8-bit ports,
    /// not individual pins.
    pub fn digital_write(&mut self, pin: u8, level: bool) -> Result<(), FirmataError> {
        let port = (pin >> 3) as usize;
        if port >= self.digital_out.len() {
            return Err(FirmataError::PinOutOfRange {
                pin,
                pins: self.digital_out.len() * 8,
            });
        }
        // DIGITAL_MESSAGE carries the port in a 4-bit nibble; ports past 15
        // are unrepresentable on the wire even when a large capability
        // snapshot maps them.
        if port > 0x0F {
            return Err(FirmataError::PinOutOfRange { pin, pins: 128 });
        }
        if level {
            self.digital_out[port] |= 1 << (pin & 0x07);
        } else {
            self.digital_out[port] &= !(1 << (pin & 0x07));
        }
        let latch = self.digital_out[port];
        self.send(&[DIGITAL_MESSAGE | port as u8, latch & 0x7F, latch >> 7])
    }

    /// Write a PWM/analog value to a pin.
    pub fn analog_write(&mut self, pin: u8, value: u16) -> Result<(), FirmataError> {
        self.send(&[
            ANALOG_MESSAGE | (pin & 0x0F),
            (value & 0x7F) as u8,
            ((value >> 7) & 0x7F) as u8,
        ])
    }

    /// Enable or disable continuous reporting for a digital port. The default
    /// firmware then scans the port and sends updates on any change.
    pub fn report_digital(&mut self, port: u8, enable: bool) -> Result<(), FirmataError> {
        self.send(&[REPORT_DIGITAL | (port & 0x0F), enable as u8])
    }

    /// Enable or disable continuous reporting for an analog pin (analog
    /// channel numbering).
    pub fn report_analog(&mut self, pin: u8, enable: bool) -> Result<(), FirmataError> {
        self.send(&[REPORT_ANALOG | (pin & 0x0F), enable as u8])
    }

    /// Ask the firmware to report its version. The answer arrives as a
    /// [`FirmataEvent::Version`] on a later pump.
    pub fn report_version(&mut self) -> Result<(), FirmataError> {
        self.send(&[REPORT_VERSION])
    }

    /// Ask the firmware for the capability list of every pin. The answer
    /// arrives as a [`FirmataEvent::Capabilities`] snapshot.
    pub fn query_capabilities(&mut self) -> Result<(), FirmataError> {
        self.send(&[START_SYSEX, CAPABILITY_QUERY, END_SYSEX])
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), FirmataError> {
        trace!("TX {}", hex_snippet(bytes, 16));
        self.transport.write(bytes)?;
        Ok(())
    }
}

//! Shared test support: a scripted in-memory transport so protocol tests run
//! without hardware. Bytes queued through the handle come back from
//! `read_byte`; everything the engine writes is captured for inspection.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use firmlink::firmata::{Transport, TransportError};

#[derive(Default)]
pub struct LinkState {
    pub rx: VecDeque<u8>,
    pub written: Vec<u8>,
    pub open: bool,
    /// When set, the next read fails with a non-timeout error once.
    pub fail_next_read: bool,
    /// When set, every write fails with a non-timeout error.
    pub fail_writes: bool,
}

/// Shared view into the scripted link, held by the test while the transport
/// itself is owned by the engine.
pub type LinkHandle = Arc<Mutex<LinkState>>;

pub struct ScriptedTransport {
    state: LinkHandle,
}

impl ScriptedTransport {
    pub fn new() -> (Self, LinkHandle) {
        let state: LinkHandle = Arc::new(Mutex::new(LinkState::default()));
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }

    /// A transport that is already open, for tests that drive a `Board`
    /// directly without a connection manager.
    pub fn opened() -> (Self, LinkHandle) {
        let (t, handle) = Self::new();
        handle.lock().unwrap().open = true;
        (t, handle)
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        self.state.lock().unwrap().open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().open = false;
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    fn read_byte(&mut self) -> Result<u8, TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.fail_next_read {
            state.fail_next_read = false;
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "wire fault",
            )));
        }
        state.rx.pop_front().ok_or(TransportError::Timeout)
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.fail_writes {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "wire fault",
            )));
        }
        state.written.extend_from_slice(bytes);
        Ok(())
    }
}

/// Queue bytes for the engine to read.
pub fn feed(handle: &LinkHandle, bytes: &[u8]) {
    handle.lock().unwrap().rx.extend(bytes.iter().copied());
}

/// Snapshot and clear the captured outbound bytes.
pub fn take_written(handle: &LinkHandle) -> Vec<u8> {
    std::mem::take(&mut handle.lock().unwrap().written)
}

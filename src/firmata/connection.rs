//! Connection lifecycle: open, version handshake, reboot settle, ready.
//!
//! Arduino-class boards reset when the serial line opens and take measurable
//! wall-clock time to come back up, so a version report alone doesn't mean
//! the board is ready for commands. The manager waits a configurable settle
//! duration after the version arrives before flipping to ready, modeled as a
//! deadline checked on each poll rather than a blocking sleep: other
//! pump-driven I/O keeps making progress while the timer runs.

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::board::Board;
use super::transport::Transport;
use super::FirmataError;

/// Deferred board setup, run once the link is confirmed ready.
pub type SetupAction = Box<dyn FnOnce(&mut Board) + Send>;

/// Link state. The connection manager is the sole writer; everyone else
/// treats it as read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    /// Transport open in progress.
    Opening,
    /// Transport open, version requested, waiting for the report plus the
    /// reboot settle delay.
    AwaitingVersion,
    /// Handshake complete; setup actions have run.
    Ready,
}

/// One managed link to a board running Firmata.
pub struct Connection {
    board: Board,
    state: LinkState,
    settle: Duration,
    /// Set when the version report lands; the link flips to ready once this
    /// deadline passes.
    ready_at: Option<Instant>,
    /// Deferred setup actions, drained FIFO exactly once on becoming ready.
    setup_queue: Vec<SetupAction>,
}

impl Connection {
    /// Stock Firmata boards want a few seconds to reboot after the port opens.
    pub const DEFAULT_SETTLE: Duration = Duration::from_secs(3);

    pub fn new(transport: Box<dyn Transport>, settle: Duration) -> Self {
        Self {
            board: Board::new(transport),
            state: LinkState::Disconnected,
            settle,
            ready_at: None,
            setup_queue: Vec::new(),
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Ready
    }

    /// The board behind this connection. Callers may read state and send
    /// commands at any time the transport is open; for one-time setup prefer
    /// [`Connection::run_when_ready`].
    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Open the transport and start the version handshake.
    ///
    /// Sends a version request right away: some boards (the Micro, for one)
    /// don't announce their version spontaneously after reset.
    pub fn open(&mut self) -> Result<(), FirmataError> {
        self.state = LinkState::Opening;
        if let Err(e) = self.board.open_transport() {
            self.state = LinkState::Disconnected;
            return Err(e);
        }
        if let Err(e) = self.board.report_version() {
            // The port opened but the link is already dead; leave nothing
            // half-connected behind.
            self.teardown();
            return Err(e);
        }
        self.state = LinkState::AwaitingVersion;
        info!("link opened, awaiting firmware version");
        Ok(())
    }

    /// Drive the link: pump the transport, advance the handshake, run any
    /// setup actions that became due. Call this periodically; each call
    /// bounds its own work.
    ///
    /// A transport-fatal error forces the link to disconnected (pending setup
    /// actions are discarded) and is returned to the caller.
    pub fn poll(&mut self) -> Result<(), FirmataError> {
        if self.state == LinkState::Disconnected {
            return Ok(());
        }
        if let Err(e) = self.board.pump() {
            warn!("link failed: {}", e);
            self.teardown();
            return Err(e);
        }
        if self.state == LinkState::AwaitingVersion {
            if self.ready_at.is_none() {
                if let Some((major, minor)) = self.board.firmware_version() {
                    debug!(
                        "version {}.{} received, settling for {:?}",
                        major, minor, self.settle
                    );
                    self.ready_at = Some(Instant::now() + self.settle);
                }
            }
            if matches!(self.ready_at, Some(at) if Instant::now() >= at) {
                self.become_ready();
            }
        }
        Ok(())
    }

    /// Run `action` against the board once the link is ready: immediately and
    /// synchronously if it already is, otherwise queued and executed in FIFO
    /// order (exactly once) on the transition to ready. Use for one-time
    /// board setup such as pin modes and report enables.
    pub fn run_when_ready<F>(&mut self, action: F)
    where
        F: FnOnce(&mut Board) + Send + 'static,
    {
        if self.state == LinkState::Ready {
            action(&mut self.board);
        } else {
            self.setup_queue.push(Box::new(action));
        }
    }

    /// Close the link. Pending setup actions are discarded without running;
    /// cached version and capabilities are cleared.
    pub fn disconnect(&mut self) {
        info!("disconnecting");
        self.teardown();
    }

    /// Pop the oldest undelivered board event.
    pub fn next_event(&mut self) -> Option<super::protocol::FirmataEvent> {
        self.board.next_event()
    }

    fn become_ready(&mut self) {
        self.state = LinkState::Ready;
        self.ready_at = None;
        let queued: Vec<SetupAction> = self.setup_queue.drain(..).collect();
        info!("link ready, running {} setup action(s)", queued.len());
        for action in queued {
            action(&mut self.board);
        }
    }

    fn teardown(&mut self) {
        self.state = LinkState::Disconnected;
        self.ready_at = None;
        self.setup_queue.clear();
        self.board.close_transport();
        self.board.clear_device_state();
    }
}

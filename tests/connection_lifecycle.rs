//! Connection lifecycle: handshake sequencing, the reboot settle delay,
//! deferred setup actions, and fatal-error teardown.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{feed, take_written, ScriptedTransport};
use firmlink::firmata::{Connection, FirmataError, LinkState};

const SETTLE: Duration = Duration::from_millis(40);

fn open_connection() -> (Connection, common::LinkHandle) {
    let (transport, handle) = ScriptedTransport::new();
    let mut conn = Connection::new(Box::new(transport), SETTLE);
    conn.open().unwrap();
    (conn, handle)
}

/// Poll until the settle deadline has passed.
fn poll_through_settle(conn: &mut Connection) {
    for _ in 0..10 {
        conn.poll().unwrap();
        if conn.is_ready() {
            return;
        }
        std::thread::sleep(SETTLE / 4);
    }
    panic!("link never became ready");
}

#[test]
fn open_requests_the_version_as_a_poke() {
    let (conn, handle) = open_connection();
    assert_eq!(conn.state(), LinkState::AwaitingVersion);
    // Boards can be slow to announce spontaneously, so open() asks.
    assert_eq!(take_written(&handle), vec![0xF9]);
}

#[test]
fn version_alone_is_not_ready_until_the_settle_elapses() {
    let (mut conn, handle) = open_connection();
    feed(&handle, &[0xF9, 0x02, 0x00]);
    conn.poll().unwrap();
    assert_eq!(conn.board().firmware_version(), Some((0, 2)));
    assert!(!conn.is_ready(), "ready before the reboot settle elapsed");
    assert_eq!(conn.state(), LinkState::AwaitingVersion);

    poll_through_settle(&mut conn);
    assert_eq!(conn.state(), LinkState::Ready);
}

#[test]
fn io_keeps_flowing_while_the_settle_timer_runs() {
    let (mut conn, handle) = open_connection();
    feed(&handle, &[0xF9, 0x02, 0x00]);
    conn.poll().unwrap();
    assert!(!conn.is_ready());

    // Data arriving during the settle window is still decoded.
    feed(&handle, &[0x90, 0x2A, 0x01]);
    conn.poll().unwrap();
    assert!(conn.board().digital_read(1).unwrap());

    poll_through_settle(&mut conn);
    assert!(conn.is_ready());
}

#[test]
fn setup_actions_run_fifo_exactly_once_then_immediately() {
    let (mut conn, handle) = open_connection();
    let log: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second", "third"] {
        let log = log.clone();
        conn.run_when_ready(move |_board| log.lock().unwrap().push(name));
    }
    assert!(log.lock().unwrap().is_empty(), "ran before ready");

    feed(&handle, &[0xF9, 0x02, 0x00]);
    poll_through_settle(&mut conn);
    assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);

    // After READY the action runs synchronously, never queued.
    let log2 = log.clone();
    conn.run_when_ready(move |_board| log2.lock().unwrap().push("fourth"));
    assert_eq!(
        *log.lock().unwrap(),
        vec!["first", "second", "third", "fourth"]
    );

    // Extra polls must not re-run anything.
    conn.poll().unwrap();
    assert_eq!(log.lock().unwrap().len(), 4);
}

#[test]
fn setup_actions_can_send_commands() {
    let (mut conn, handle) = open_connection();
    conn.run_when_ready(|board| {
        let _ = board.query_capabilities();
    });
    feed(&handle, &[0xF9, 0x02, 0x00]);
    take_written(&handle); // discard the version poke
    poll_through_settle(&mut conn);
    assert_eq!(take_written(&handle), vec![0xF0, 0x6B, 0xF7]);
}

#[test]
fn transport_fault_tears_the_link_down_and_discards_setup() {
    let (mut conn, handle) = open_connection();
    let ran = Arc::new(Mutex::new(false));
    let ran2 = ran.clone();
    conn.run_when_ready(move |_board| *ran2.lock().unwrap() = true);

    handle.lock().unwrap().fail_next_read = true;
    let err = conn.poll().unwrap_err();
    assert!(matches!(err, FirmataError::Transport(_)));
    assert_eq!(conn.state(), LinkState::Disconnected);
    assert!(!handle.lock().unwrap().open, "transport left open");

    // Discarded actions never run, even if the version shows up late.
    feed(&handle, &[0xF9, 0x02, 0x00]);
    std::thread::sleep(SETTLE + Duration::from_millis(10));
    conn.poll().unwrap();
    assert!(!*ran.lock().unwrap());
    assert_eq!(conn.state(), LinkState::Disconnected);
}

#[test]
fn sysex_overflow_is_fatal_for_the_connection() {
    let (mut conn, handle) = open_connection();
    // START_SYSEX followed by more payload than the decoder will buffer.
    let mut stream = vec![0xF0];
    stream.resize(4200, 0x01);
    feed(&handle, &stream);

    let mut fatal = None;
    for _ in 0..200 {
        match conn.poll() {
            Ok(()) => continue,
            Err(e) => {
                fatal = Some(e);
                break;
            }
        }
    }
    assert!(matches!(fatal, Some(FirmataError::SysexOverflow { .. })));
    assert_eq!(conn.state(), LinkState::Disconnected);
}

#[test]
fn disconnect_clears_cached_device_state() {
    let (mut conn, handle) = open_connection();
    feed(&handle, &[0xF9, 0x02, 0x00]);
    poll_through_settle(&mut conn);
    assert!(conn.board().firmware_version().is_some());

    conn.disconnect();
    assert_eq!(conn.state(), LinkState::Disconnected);
    assert!(conn.board().firmware_version().is_none());
    assert!(conn.board().pins().is_empty());
    assert!(!handle.lock().unwrap().open);

    // A disconnected link polls as a no-op.
    conn.poll().unwrap();
    assert!(conn.next_event().is_none());
}

#[test]
fn write_fault_during_open_tears_the_link_down() {
    let (transport, handle) = ScriptedTransport::new();
    let mut conn = Connection::new(Box::new(transport), SETTLE);
    let ran = Arc::new(Mutex::new(false));
    let ran2 = ran.clone();
    conn.run_when_ready(move |_board| *ran2.lock().unwrap() = true);

    // The port opens, but the version poke never makes it onto the wire.
    handle.lock().unwrap().fail_writes = true;
    let err = conn.open().unwrap_err();
    assert!(matches!(err, FirmataError::Transport(_)));
    assert_eq!(conn.state(), LinkState::Disconnected);
    assert!(!conn.board().is_open(), "transport left open");
    assert!(!handle.lock().unwrap().open);

    // The link is inert, not wedged: polls are no-ops and discarded setup
    // actions never run, even if a version shows up somehow.
    handle.lock().unwrap().fail_writes = false;
    feed(&handle, &[0xF9, 0x02, 0x00]);
    for _ in 0..5 {
        conn.poll().unwrap();
    }
    assert_eq!(conn.state(), LinkState::Disconnected);
    assert!(!*ran.lock().unwrap());
}

#[test]
fn failed_open_leaves_the_link_disconnected() {
    struct DeadTransport;
    impl firmlink::firmata::Transport for DeadTransport {
        fn open(&mut self) -> Result<(), firmlink::firmata::TransportError> {
            Err(firmlink::firmata::TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such device",
            )))
        }
        fn close(&mut self) {}
        fn is_open(&self) -> bool {
            false
        }
        fn read_byte(&mut self) -> Result<u8, firmlink::firmata::TransportError> {
            Err(firmlink::firmata::TransportError::NotOpen)
        }
        fn write(&mut self, _: &[u8]) -> Result<(), firmlink::firmata::TransportError> {
            Err(firmlink::firmata::TransportError::NotOpen)
        }
    }

    let mut conn = Connection::new(Box::new(DeadTransport), SETTLE);
    assert!(conn.open().is_err());
    assert_eq!(conn.state(), LinkState::Disconnected);
}

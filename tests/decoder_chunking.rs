//! Delivery-shape invariance: a byte stream must decode to the same event
//! sequence whether it arrives whole, one byte at a time, or interleaved with
//! empty polls, and one pump call must never exceed its byte budget.

mod common;

use common::{feed, ScriptedTransport};
use firmlink::firmata::{Board, FirmataEvent, PUMP_BYTE_BUDGET};

/// A handful of back-to-back messages of every two-data-byte kind.
fn sample_stream() -> Vec<u8> {
    vec![
        0x90, 0x2A, 0x01, // digital port 0 = 170
        0xE3, 0x7F, 0x07, // analog channel 3 = 1023
        0xF9, 0x02, 0x00, // version minor=2 major=0
        0x91, 0x00, 0x01, // digital port 1 = 128
        0xE0, 0x55, 0x02, // analog channel 0 = 341
    ]
}

fn expected_events() -> Vec<FirmataEvent> {
    vec![
        FirmataEvent::DigitalPort { port: 0, value: 170 },
        FirmataEvent::AnalogPin {
            channel: 3,
            value: 1023,
        },
        FirmataEvent::Version { major: 0, minor: 2 },
        FirmataEvent::DigitalPort {
            port: 1,
            value: 128,
        },
        FirmataEvent::AnalogPin {
            channel: 0,
            value: 341,
        },
    ]
}

fn drain(board: &mut Board) -> Vec<FirmataEvent> {
    let mut events = Vec::new();
    while let Some(ev) = board.next_event() {
        events.push(ev);
    }
    events
}

#[test]
fn whole_delivery_decodes_in_order() {
    let (transport, handle) = ScriptedTransport::opened();
    let mut board = Board::new(Box::new(transport));
    feed(&handle, &sample_stream());
    board.pump().unwrap();
    assert_eq!(drain(&mut board), expected_events());
}

#[test]
fn byte_at_a_time_matches_whole_delivery() {
    let (transport, handle) = ScriptedTransport::opened();
    let mut board = Board::new(Box::new(transport));
    let mut events = Vec::new();
    for &b in &sample_stream() {
        // Each byte arrives alone, with an empty poll in between.
        feed(&handle, &[b]);
        board.pump().unwrap();
        board.pump().unwrap();
        events.extend(drain(&mut board));
    }
    assert_eq!(events, expected_events());
}

#[test]
fn ragged_chunks_match_whole_delivery() {
    let stream = sample_stream();
    for chunk_size in [2usize, 4, 7] {
        let (transport, handle) = ScriptedTransport::opened();
        let mut board = Board::new(Box::new(transport));
        let mut events = Vec::new();
        for chunk in stream.chunks(chunk_size) {
            feed(&handle, chunk);
            board.pump().unwrap();
            events.extend(drain(&mut board));
        }
        assert_eq!(events, expected_events(), "chunk size {}", chunk_size);
    }
}

#[test]
fn empty_link_pumps_return_immediately() {
    let (transport, _handle) = ScriptedTransport::opened();
    let mut board = Board::new(Box::new(transport));
    board.pump().unwrap();
    assert!(board.next_event().is_none());
}

#[test]
fn one_pump_call_respects_the_byte_budget() {
    let (transport, handle) = ScriptedTransport::opened();
    let mut board = Board::new(Box::new(transport));
    // 90 analog messages, 270 bytes: several times the per-call budget.
    let mut stream = Vec::new();
    for i in 0..90u16 {
        stream.extend_from_slice(&[0xE1, (i & 0x7F) as u8, (i >> 7) as u8]);
    }
    feed(&handle, &stream);

    board.pump().unwrap();
    let first_batch = drain(&mut board).len();
    assert!(
        first_batch <= PUMP_BYTE_BUDGET / 3 + 1,
        "one pump processed {} events",
        first_batch
    );
    assert!(first_batch > 0);

    // Leftovers are picked up by later pumps, order preserved.
    let mut total = first_batch;
    for _ in 0..10 {
        board.pump().unwrap();
        total += drain(&mut board).len();
    }
    assert_eq!(total, 90);
    assert_eq!(board.analog_read(1).unwrap(), 89);
}

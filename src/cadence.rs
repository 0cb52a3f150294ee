//! Pedal cadence from a reed switch on a digital input pin.
//!
//! The classic exercise-bike rig: a magnet on the crank closes a reed switch
//! once per revolution. The tracker samples the pin each pump tick, times the
//! gap between LOW→HIGH edges, and derives RPM; a trailing-average smoother
//! takes the jitter out of the raw intervals.

use std::time::{Duration, Instant};

use crate::firmata::{Board, FirmataError};

/// Revolution timing from rising edges on one digital pin.
///
/// Feed it one sample per tick via [`CadenceTracker::sample`] (or
/// [`CadenceTracker::update`] with an explicit clock for tests). Reed switch
/// contacts bounce, so after each detected edge a configurable number of
/// ticks is skipped entirely; at typical tick rates one skipped tick
/// debounces tens of milliseconds.
pub struct CadenceTracker {
    pin: u8,
    debounce_ticks: u32,
    /// With no edge for this long, cadence decays to zero (the rider stopped).
    zero_timeout: Duration,
    last_level: bool,
    skip: u32,
    last_edge: Instant,
    interval: Duration,
    revolutions: u32,
}

impl CadenceTracker {
    pub fn new(pin: u8, debounce_ticks: u32, zero_timeout: Duration) -> Self {
        Self {
            pin,
            debounce_ticks,
            zero_timeout,
            last_level: false,
            skip: 0,
            last_edge: Instant::now(),
            interval: Duration::ZERO,
            revolutions: 0,
        }
    }

    /// The digital pin being watched.
    pub fn pin(&self) -> u8 {
        self.pin
    }

    /// Read the pin from the board and update timing.
    pub fn sample(&mut self, board: &Board) -> Result<(), FirmataError> {
        let level = board.digital_read(self.pin)?;
        self.update(level, Instant::now());
        Ok(())
    }

    /// Advance with an explicit level and clock.
    pub fn update(&mut self, level: bool, now: Instant) {
        if self.skip > 0 {
            self.skip -= 1;
            return;
        }
        if !self.last_level && level {
            self.interval = now.duration_since(self.last_edge);
            self.last_edge = now;
            self.revolutions += 1;
            self.skip = self.debounce_ticks;
        } else if now.duration_since(self.last_edge) > self.zero_timeout {
            self.interval = Duration::ZERO;
            self.last_edge = now;
        }
        self.last_level = level;
    }

    /// Milliseconds between the last two revolutions; 0 while stopped.
    pub fn interval_ms(&self) -> f32 {
        self.interval.as_secs_f32() * 1000.0
    }

    /// Revolutions per minute derived from the last interval; 0 while stopped.
    pub fn rpm(&self) -> f32 {
        let ms = self.interval_ms();
        if ms > 0.0 {
            60_000.0 / ms
        } else {
            0.0
        }
    }

    /// Revolutions counted since construction.
    pub fn revolutions(&self) -> u32 {
        self.revolutions
    }
}

/// Trailing average over the last `window` samples.
pub struct CadenceSmoother {
    values: Vec<f32>,
    pointer: usize,
    filled: usize,
}

impl CadenceSmoother {
    pub fn new(window: usize) -> Self {
        Self {
            values: vec![0.0; window.max(1)],
            pointer: 0,
            filled: 0,
        }
    }

    /// Record one sample into the ring.
    pub fn push(&mut self, value: f32) {
        self.values[self.pointer] = value;
        self.pointer = (self.pointer + 1) % self.values.len();
        self.filled = (self.filled + 1).min(self.values.len());
    }

    /// Average of the samples recorded so far (up to the window size).
    pub fn smoothed(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        // Unfilled slots are zero, so summing the whole ring is safe.
        let sum: f32 = self.values.iter().sum();
        sum / self.filled as f32
    }
}

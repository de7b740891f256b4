//! # Software Port
//!
//! A [`Platform`] backed by plain memory: the clock only moves when the
//! caller advances it, log bytes are captured in a buffer, and watchdog
//! feeds are counted instead of petting hardware. This is what the test
//! suite runs on, and it doubles as a simulation harness for running
//! task graphs off-target.

use core::cell::{Cell, RefCell};

use heapless::Vec;

use crate::platform::Platform;

/// Capacity of the captured log buffer. Older bytes are dropped once
/// it fills.
const LOG_CAP: usize = 1024;

/// Deterministic software platform with a manually advanced clock.
pub struct HostPlatform {
    clock_us: Cell<u64>,
    log: RefCell<Vec<u8, LOG_CAP>>,
    watchdog_timeout: Cell<u16>,
    watchdog_feeds: Cell<u32>,
    reset_flags: Cell<u8>,
}

impl HostPlatform {
    /// Platform at time zero with an empty log.
    pub fn new() -> Self {
        Self {
            clock_us: Cell::new(0),
            log: RefCell::new(Vec::new()),
            watchdog_timeout: Cell::new(0),
            watchdog_feeds: Cell::new(0),
            reset_flags: Cell::new(0),
        }
    }

    /// Advance the clock by whole milliseconds.
    pub fn advance_ms(&self, ms: u32) {
        self.advance_us(ms as u64 * 1000);
    }

    /// Advance the clock by microseconds.
    pub fn advance_us(&self, us: u64) {
        self.clock_us.set(self.clock_us.get() + us);
    }

    /// Latch raw reset-cause flags for the next
    /// [`read_and_clear_reset_flags`](Platform::read_and_clear_reset_flags).
    pub fn set_reset_flags(&self, flags: u8) {
        self.reset_flags.set(flags);
    }

    /// Timeout passed to the last watchdog enable, 0 if never enabled.
    pub fn watchdog_timeout(&self) -> u16 {
        self.watchdog_timeout.get()
    }

    /// Number of watchdog feeds so far.
    pub fn watchdog_feeds(&self) -> u32 {
        self.watchdog_feeds.get()
    }

    /// Run a closure over the captured log text.
    pub fn with_log<R>(&self, f: impl FnOnce(&str) -> R) -> R {
        let log = self.log.borrow();
        f(core::str::from_utf8(&log).unwrap_or(""))
    }

    /// Discard captured log bytes.
    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HostPlatform {
    fn now_ms(&self) -> u32 {
        (self.clock_us.get() / 1000) as u32
    }

    fn now_us(&self) -> u32 {
        self.clock_us.get() as u32
    }

    fn write_byte(&self, byte: u8) {
        // Overflow discards the byte; tests read the log long before
        // the buffer fills.
        let _ = self.log.borrow_mut().push(byte);
    }

    fn watchdog_enable(&self, timeout_ms: u16) {
        self.watchdog_timeout.set(timeout_ms);
    }

    fn watchdog_feed(&self) {
        self.watchdog_feeds.set(self.watchdog_feeds.get() + 1);
    }

    fn read_and_clear_reset_flags(&self) -> u8 {
        self.reset_flags.replace(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_only_on_request() {
        let p = HostPlatform::new();
        assert_eq!(p.now_ms(), 0);
        p.advance_ms(5);
        assert_eq!(p.now_ms(), 5);
        assert_eq!(p.now_us(), 5000);
        p.advance_us(250);
        assert_eq!(p.now_us(), 5250);
        assert_eq!(p.now_ms(), 5);
    }

    #[test]
    fn test_log_capture() {
        let p = HostPlatform::new();
        for b in b"hello" {
            p.write_byte(*b);
        }
        p.with_log(|log| assert_eq!(log, "hello"));
        p.clear_log();
        p.with_log(|log| assert!(log.is_empty()));
    }

    #[test]
    fn test_reset_flags_cleared_on_read() {
        let p = HostPlatform::new();
        p.set_reset_flags(0x08);
        assert_eq!(p.read_and_clear_reset_flags(), 0x08);
        assert_eq!(p.read_and_clear_reset_flags(), 0);
    }

    #[test]
    fn test_watchdog_bookkeeping() {
        let p = HostPlatform::new();
        p.watchdog_enable(1000);
        p.watchdog_feed();
        p.watchdog_feed();
        assert_eq!(p.watchdog_timeout(), 1000);
        assert_eq!(p.watchdog_feeds(), 2);
    }
}

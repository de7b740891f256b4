//! # Kernel Logging
//!
//! Minimal leveled logging over the platform byte sink. The scheduler
//! holds the active threshold; records below it are dropped before any
//! formatting work happens. Output is line-oriented plain text so it can
//! be read straight off a serial console:
//!
//! ```text
//! [W] t3: delayed 12ms by t1
//! [E] os: message pool init failed
//! ```

use core::fmt::{self, Write};

use crate::platform::Platform;

/// Severity of a log record. Ordering is by value: a record passes the
/// filter when `level >= threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    /// Verbose diagnostics (per-dispatch traces).
    Debug = 0,
    /// Normal operational events.
    Info = 1,
    /// Unexpected but recoverable conditions.
    Warn = 2,
    /// Resource exhaustion and other failures.
    Error = 3,
}

impl LogLevel {
    /// Single-character tag used in the output line.
    fn tag(self) -> char {
        match self {
            LogLevel::Debug => 'D',
            LogLevel::Info => 'I',
            LogLevel::Warn => 'W',
            LogLevel::Error => 'E',
        }
    }
}

/// `fmt::Write` adapter over the platform byte sink.
struct SinkWriter<'a> {
    platform: &'a dyn Platform,
}

impl fmt::Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.platform.write_byte(byte);
        }
        Ok(())
    }
}

/// Emit one log record if it passes the threshold.
///
/// `task` is the id of the task the record concerns; `None` marks a
/// system-level event and is rendered as `os`.
pub(crate) fn emit(
    platform: &dyn Platform,
    threshold: LogLevel,
    level: LogLevel,
    task: Option<u8>,
    args: fmt::Arguments<'_>,
) {
    if level < threshold {
        return;
    }
    let mut out = SinkWriter { platform };
    // Sink errors are unreportable by construction; formatting into a
    // byte sink cannot fail either, so the result is discarded.
    let _ = match task {
        Some(id) => writeln!(out, "[{}] t{}: {}", level.tag(), id, args),
        None => writeln!(out, "[{}] os: {}", level.tag(), args),
    };
}

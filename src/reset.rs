//! # Reset Causality
//!
//! When a watchdog bites or the supply browns out, the interesting
//! question is *what was running*. This module defines the record that
//! carries that answer across a reset and the decoding of the raw
//! hardware cause flags.
//!
//! The record lives in memory that startup code does not zero (a
//! `.uninit`/`.noinit` section on bare-metal targets; the ARM port
//! provides the static). The scheduler writes the running task's id
//! into it before every entry into task code, so after a watchdog
//! reset the record still names the offender.

/// Sentinel for "no task recorded" in [`ResetInfo::last_task_id`].
pub const NO_TASK: u8 = 255;

/// Raw cause flag: external reset pin.
pub const RESET_FLAG_EXTERNAL: u8 = 0x01;
/// Raw cause flag: brown-out detector.
pub const RESET_FLAG_BROWN_OUT: u8 = 0x02;
/// Raw cause flag: power-on.
pub const RESET_FLAG_POWER_ON: u8 = 0x04;
/// Raw cause flag: watchdog timeout.
pub const RESET_FLAG_WATCHDOG: u8 = 0x08;

const KNOWN_FLAGS: u8 =
    RESET_FLAG_EXTERNAL | RESET_FLAG_BROWN_OUT | RESET_FLAG_POWER_ON | RESET_FLAG_WATCHDOG;

/// Decoded reset cause. Discriminants are stable and may be stored or
/// transmitted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ResetCause {
    /// No known flag was set.
    Unknown = 0,
    /// Power-on reset.
    PowerOn = 1,
    /// External reset pin.
    External = 2,
    /// Brown-out detector fired.
    BrownOut = 3,
    /// Watchdog timeout.
    Watchdog = 4,
    /// More than one cause flag was latched.
    Multiple = 5,
}

impl ResetCause {
    /// Decode raw cause flags. Exactly one known flag maps to its
    /// enumerator; several at once decode to `Multiple`.
    pub fn from_flags(flags: u8) -> Self {
        let known = flags & KNOWN_FLAGS;
        if known.count_ones() > 1 {
            return ResetCause::Multiple;
        }
        match known {
            RESET_FLAG_POWER_ON => ResetCause::PowerOn,
            RESET_FLAG_EXTERNAL => ResetCause::External,
            RESET_FLAG_BROWN_OUT => ResetCause::BrownOut,
            RESET_FLAG_WATCHDOG => ResetCause::Watchdog,
            _ => ResetCause::Unknown,
        }
    }
}

/// Reset-causality record. Survives a reset in uninitialized memory.
///
/// Layout is fixed so the bytes stay meaningful across firmware
/// revisions that agree on this struct.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct ResetInfo {
    /// Raw cause flags latched at boot.
    pub reset_reason: u8,
    /// Kernel time at which the flags were latched (ms).
    pub reset_time: u32,
    /// Watchdog timeout in force, 0 if the watchdog was never armed.
    pub watchdog_timeout: u16,
    /// Id of the task that was executing when the reset hit, or
    /// [`NO_TASK`].
    pub last_task_id: u8,
    /// Raw flags as handed over by the bootloader, when one relays them.
    pub optiboot_flags: u8,
    /// Decoded [`ResetCause`] of `optiboot_flags`, as `u8`.
    pub optiboot_cause: u8,
}

impl ResetInfo {
    /// A cleared record. Real noinit storage starts with garbage
    /// instead; this is for host builds and tests.
    pub const fn new() -> Self {
        Self {
            reset_reason: 0,
            reset_time: 0,
            watchdog_timeout: 0,
            last_task_id: NO_TASK,
            optiboot_flags: 0,
            optiboot_cause: ResetCause::Unknown as u8,
        }
    }

    /// Latch the cause of the reset that just happened. Called from the
    /// startup path before any task runs. `last_task_id` is deliberately
    /// left alone — it holds the pre-reset culprit until read.
    pub fn capture(&mut self, raw_flags: u8, now_ms: u32) {
        self.reset_reason = raw_flags;
        self.reset_time = now_ms;
        self.optiboot_flags = raw_flags;
        self.optiboot_cause = ResetCause::from_flags(raw_flags) as u8;
    }

    /// Decoded cause of the last reset.
    pub fn cause(&self) -> ResetCause {
        ResetCause::from_flags(self.reset_reason)
    }

    /// Take a snapshot and clear `last_task_id` to [`NO_TASK`] so a
    /// later reset is not blamed on a stale id. Intended to be called
    /// once, early in application startup.
    pub fn read(&mut self) -> ResetInfo {
        let snapshot = *self;
        self.last_task_id = NO_TASK;
        snapshot
    }
}

impl Default for ResetInfo {
    fn default() -> Self {
        Self::new()
    }
}

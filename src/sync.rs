//! # Synchronization Primitives
//!
//! Interrupt-safe atomic regions for kernel state that is shared with
//! interrupt handlers: message reference counts, queue cursors, and the
//! system-time counter. On bare-metal single-core targets the region
//! briefly masks interrupts and restores the previous mask on exit; on
//! platforms without interrupts it degenerates to a plain block.
//!
//! The implementation is supplied by whichever `critical-section`
//! provider the final binary links (`cortex-m`'s single-core provider
//! on hardware, the `std` provider in host tests).

use critical_section::CriticalSection;

/// Execute a closure within an atomic region.
///
/// This is the only locking primitive the kernel uses. There is no
/// mutex: the sole contention on a cooperative single-core system is
/// between the foreground and interrupt handlers, and masking
/// interrupts for the duration of a few field updates is both cheaper
/// and sufficient.
///
/// # Usage
/// ```ignore
/// sync::atomic(|_cs| {
///     // Mutate ISR-visible state safely
/// });
/// ```
///
/// # Performance
/// Keep the enclosed work short — every cycle spent here adds directly
/// to interrupt latency.
#[inline]
pub fn atomic<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection) -> R,
{
    critical_section::with(f)
}

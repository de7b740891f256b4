//! # RAM Accounting
//!
//! Stack high-water measurement by canary painting, plus the memory
//! report types the scheduler fills in.
//!
//! The free region between the heap break and the stack pointer is
//! filled with a known byte at startup. The stack grows down into the
//! high end of that region and overwrites the paint; the length of the
//! surviving canary run at the low end is the minimum free RAM ever
//! observed, and its complement is the stack high-water mark.
//!
//! ```text
//! +--------+--------+--------------------------+---------+
//! | static |  heap  |   free ram (painted)     |  stack  |
//! +--------+--------+--------------------------+---------+
//!                   ^                          ^         ^
//!               heap end                      SP      RAM end
//! ```

use crate::config::STACK_CANARY_MARGIN;

/// Byte used to paint the free region.
pub const CANARY_BYTE: u8 = 0xC5;

/// Paint an entire region with the canary byte.
///
/// Callers that paint live RAM must exclude a safety margin below the
/// current stack pointer; [`paint_raw`] does so.
pub fn paint(region: &mut [u8]) {
    region.fill(CANARY_BYTE);
}

/// Length of the untouched canary run at the low end of the region.
/// This is the minimum free RAM observed since the paint.
pub fn untouched(region: &[u8]) -> usize {
    region.iter().take_while(|&&b| b == CANARY_BYTE).count()
}

/// Bytes of the region that have been overwritten since the paint,
/// i.e. the deepest stack excursion into it.
pub fn high_water(region: &[u8]) -> usize {
    region.len() - untouched(region)
}

/// Paint `[start, stack_pointer - STACK_CANARY_MARGIN)` with the canary
/// byte. For use by port startup code with addresses taken from linker
/// symbols and the live stack pointer.
///
/// # Safety
/// `start` must be the beginning of otherwise-unused RAM, and
/// `stack_pointer` the current top of stack in the same region, with
/// `start <= stack_pointer`. No other code may be using the span.
pub unsafe fn paint_raw(start: *mut u8, stack_pointer: *mut u8) {
    let span = stack_pointer as usize - start as usize;
    if span <= STACK_CANARY_MARGIN {
        return;
    }
    let len = span - STACK_CANARY_MARGIN;
    core::ptr::write_bytes(start, CANARY_BYTE, len);
}

/// System-wide memory report.
///
/// RAM figures come from the platform and read 0 on targets that
/// cannot introspect their layout. Message figures are derived from
/// live pool and queue state, never stored.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SystemMemoryInfo {
    /// Free RAM in bytes (0 if unknown).
    pub free_ram: u16,
    /// Total RAM in bytes (0 if unknown).
    pub total_ram: u16,
    /// Deepest stack usage observed, via the canary (0 if unknown).
    pub stack_high_water: u16,
    /// Number of registered tasks.
    pub total_tasks: u8,
    /// Bytes occupied by task objects and their kernel bookkeeping.
    pub task_memory: u16,
    /// Messages currently alive: pooled records in use plus queued
    /// nodes.
    pub active_messages: u8,
    /// Bytes occupied by the message pool and queue backing storage.
    pub message_memory: u16,
}

/// Per-task memory report.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskMemoryInfo {
    /// Task identifier.
    pub task_id: u8,
    /// Size of the concrete task object.
    pub task_struct_size: u16,
    /// Size of the subscription bitfield.
    pub subscription_size: u16,
    /// Capacity in bytes of the suspended-message FIFO.
    pub queue_size: u16,
    /// Total of the above plus kernel bookkeeping.
    pub total_allocated: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paint_and_full_canary() {
        let mut region = [0u8; 64];
        paint(&mut region);
        assert!(region.iter().all(|&b| b == CANARY_BYTE));
        assert_eq!(untouched(&region), 64);
        assert_eq!(high_water(&region), 0);
    }

    #[test]
    fn test_high_water_after_stack_excursion() {
        let mut region = [0u8; 64];
        paint(&mut region);
        // Stack grew 16 bytes down into the high end of the region.
        for b in &mut region[48..] {
            *b = 0xAA;
        }
        assert_eq!(untouched(&region), 48);
        assert_eq!(high_water(&region), 16);
    }

    #[test]
    fn test_canary_byte_written_mid_stack_does_not_hide_usage() {
        let mut region = [0u8; 32];
        paint(&mut region);
        // The stack wrote a value that happens to equal the canary at
        // offset 20, but also touched offset 8 below it. The run stops
        // at the first non-canary byte.
        region[8] = 0x00;
        assert_eq!(untouched(&region), 8);
        assert_eq!(high_water(&region), 24);
    }

    #[test]
    fn test_paint_raw_respects_margin() {
        let mut region = [0u8; 64];
        let start = region.as_mut_ptr();
        // Simulated stack pointer at the end of the buffer.
        let sp = unsafe { start.add(64) };
        unsafe { paint_raw(start, sp) };
        let painted = 64 - STACK_CANARY_MARGIN;
        assert!(region[..painted].iter().all(|&b| b == CANARY_BYTE));
        assert!(region[painted..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_paint_raw_tiny_span_is_noop() {
        let mut region = [0u8; 16];
        let start = region.as_mut_ptr();
        let sp = unsafe { start.add(16) };
        unsafe { paint_raw(start, sp) };
        assert!(region.iter().all(|&b| b == 0));
    }
}

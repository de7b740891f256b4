//! # Cortex-M Port Layer
//!
//! Hardware backing for ARM Cortex-M targets: a SysTick-driven
//! millisecond counter, the DWT cycle counter for microsecond
//! timestamps, and the `.uninit`-section storage for the reset record.
//!
//! The port stays vendor-neutral. Anything that lives in vendor
//! peripherals — the UART behind the log sink, the independent
//! watchdog, the reset-cause register — is injected by board code at
//! construction.

use core::cell::Cell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::peripheral::syst::SystClkSource;

use crate::mem;
use crate::platform::Platform;
use crate::reset::ResetInfo;

/// Millisecond counter advanced by the SysTick handler.
static MILLIS: AtomicU32 = AtomicU32::new(0);

/// Reset record in memory that startup code does not zero. Survives
/// everything short of power loss.
#[link_section = ".uninit.fsmos.RESET_INFO"]
static mut RESET_INFO: MaybeUninit<ResetInfo> = MaybeUninit::uninit();

// Heap start as placed by the linker script; the span up to the stack
// pointer is the free RAM the canary paints.
extern "C" {
    static mut __sheap: u8;
}

/// Call from the application's SysTick exception handler, configured
/// for a 1 kHz tick by [`CortexMPlatform::new`].
pub fn tick_1ms() {
    MILLIS.fetch_add(1, Ordering::Relaxed);
}

/// Access the persistent reset record.
///
/// # Safety
/// Must be called once, before the scheduler is created, and the
/// returned reference must not be aliased.
pub unsafe fn reset_info() -> &'static mut ResetInfo {
    &mut *RESET_INFO.as_mut_ptr()
}

/// [`Platform`] implementation for Cortex-M.
pub struct CortexMPlatform {
    cycles_per_us: u32,
    /// Byte sink for the log, typically a blocking UART write.
    sink: fn(u8),
    /// Raw reset-cause flags captured by board code from its vendor
    /// register, already mapped to the `reset` module's flag values.
    reset_flags: Cell<u8>,
    /// Canary span recorded at paint time.
    canary_start: Cell<*mut u8>,
    canary_len: Cell<usize>,
}

impl CortexMPlatform {
    /// Configure SysTick for a 1 kHz tick, start the DWT cycle counter,
    /// and build the platform.
    pub fn new(peripherals: &mut cortex_m::Peripherals, sysclk_hz: u32, sink: fn(u8), reset_flags: u8) -> Self {
        let syst = &mut peripherals.SYST;
        syst.set_clock_source(SystClkSource::Core);
        syst.set_reload(sysclk_hz / 1000 - 1);
        syst.clear_current();
        syst.enable_counter();
        syst.enable_interrupt();

        peripherals.DCB.enable_trace();
        peripherals.DWT.enable_cycle_counter();

        Self {
            cycles_per_us: sysclk_hz / 1_000_000,
            sink,
            reset_flags: Cell::new(reset_flags),
            canary_start: Cell::new(core::ptr::null_mut()),
            canary_len: Cell::new(0),
        }
    }
}

impl Platform for CortexMPlatform {
    fn now_ms(&self) -> u32 {
        MILLIS.load(Ordering::Relaxed)
    }

    fn now_us(&self) -> u32 {
        cortex_m::peripheral::DWT::cycle_count() / self.cycles_per_us
    }

    fn write_byte(&self, byte: u8) {
        (self.sink)(byte);
    }

    fn read_and_clear_reset_flags(&self) -> u8 {
        self.reset_flags.replace(0)
    }

    fn paint_stack_canary(&self) {
        let start = core::ptr::addr_of_mut!(__sheap);
        let sp = cortex_m::register::msp::read() as *mut u8;
        // Safety: the span between the heap start symbol and the
        // current stack pointer is unused RAM at this point in boot,
        // and paint_raw keeps its margin below the stack pointer.
        unsafe { mem::paint_raw(start, sp) };
        let len = (sp as usize)
            .saturating_sub(start as usize)
            .saturating_sub(crate::config::STACK_CANARY_MARGIN);
        self.canary_start.set(start);
        self.canary_len.set(len);
    }

    fn stack_high_water(&self) -> Option<u16> {
        let start = self.canary_start.get();
        let len = self.canary_len.get();
        if start.is_null() || len == 0 {
            return None;
        }
        // Safety: the span was painted by paint_stack_canary and is
        // only ever read here.
        let region = unsafe { core::slice::from_raw_parts(start, len) };
        Some(mem::high_water(region).min(u16::MAX as usize) as u16)
    }

    fn free_ram(&self) -> Option<u16> {
        let start = core::ptr::addr_of!(__sheap) as usize;
        let sp = cortex_m::register::msp::read() as usize;
        Some(sp.saturating_sub(start).min(u16::MAX as usize) as u16)
    }
}

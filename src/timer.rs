//! # Soft Timers
//!
//! Polled one-shot timers for task state machines. A task that needs to
//! "wait" does not block — it starts a timer, returns from `step()`,
//! and checks [`Timer::expired`] on a later pass.
//!
//! The tick width is generic so short timeouts can be stored compactly:
//! a debounce timer fits in a [`Timer8`] (2 bytes), while an
//! hours-scale timeout needs a [`Timer32`]. Arithmetic is wrapping, so
//! timers stay correct across counter rollover as long as the duration
//! fits the chosen width.

/// Tick storage for a [`Timer`]. Implemented for `u8`, `u16` and `u32`.
pub trait TimerTicks: Copy + PartialEq {
    /// Zero value.
    const ZERO: Self;
    /// Truncate a millisecond count to this width.
    fn truncate(ms: u32) -> Self;
    /// `self - earlier`, wrapping at the width boundary.
    fn elapsed_since(self, earlier: Self) -> Self;
    /// `self >= other` on the truncated scale.
    fn at_least(self, other: Self) -> bool;
}

macro_rules! impl_timer_ticks {
    ($($t:ty),*) => {$(
        impl TimerTicks for $t {
            const ZERO: Self = 0;

            #[inline]
            fn truncate(ms: u32) -> Self {
                ms as $t
            }

            #[inline]
            fn elapsed_since(self, earlier: Self) -> Self {
                self.wrapping_sub(earlier)
            }

            #[inline]
            fn at_least(self, other: Self) -> bool {
                self >= other
            }
        }
    )*};
}

impl_timer_ticks!(u8, u16, u32);

/// One-shot software timer.
///
/// A zero-duration timer is expired immediately, which lets state
/// machines fall through "wait" states without a special case.
#[derive(Debug, Clone, Copy)]
pub struct Timer<T: TimerTicks> {
    start: T,
    duration: T,
}

/// 8-bit timer for durations up to 255 ms (debouncing, short delays).
pub type Timer8 = Timer<u8>;
/// 16-bit timer for durations up to ~65 s. Covers most task timeouts.
pub type Timer16 = Timer<u16>;
/// 32-bit timer for long durations (up to ~49 days).
pub type Timer32 = Timer<u32>;

impl<T: TimerTicks> Timer<T> {
    /// Create an expired timer (zero duration).
    pub const fn new() -> Self {
        Self {
            start: T::ZERO,
            duration: T::ZERO,
        }
    }

    /// Arm the timer for `duration_ms` milliseconds from `now_ms`.
    ///
    /// The duration is truncated to the timer's width; pick a wider
    /// timer type if that loses bits you care about.
    pub fn start(&mut self, now_ms: u32, duration_ms: u32) {
        self.start = T::truncate(now_ms);
        self.duration = T::truncate(duration_ms);
    }

    /// Whether the armed duration has elapsed at `now_ms`.
    pub fn expired(&self, now_ms: u32) -> bool {
        if self.duration == T::ZERO {
            return true;
        }
        T::truncate(now_ms)
            .elapsed_since(self.start)
            .at_least(self.duration)
    }
}

impl<T: TimerTicks> Default for Timer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unarmed_timer_is_expired() {
        let t = Timer16::new();
        assert!(t.expired(0));
        assert!(t.expired(12345));
    }

    #[test]
    fn test_expires_after_duration() {
        let mut t = Timer16::new();
        t.start(1000, 50);
        assert!(!t.expired(1000));
        assert!(!t.expired(1049));
        assert!(t.expired(1050));
        assert!(t.expired(2000));
    }

    #[test]
    fn test_zero_duration_fires_at_once() {
        let mut t = Timer8::new();
        t.start(77, 0);
        assert!(t.expired(77));
    }

    #[test]
    fn test_wrapping_counter() {
        // Armed just before u32 rollover; must expire on the far side.
        let mut t = Timer32::new();
        t.start(u32::MAX - 10, 100);
        assert!(!t.expired(u32::MAX));
        assert!(t.expired(89)); // 11 + 89 = 100 elapsed
    }

    #[test]
    fn test_narrow_timer_wraps_at_width() {
        let mut t = Timer8::new();
        t.start(250, 20);
        // 250 -> 270 wraps to 14 on the 8-bit scale.
        assert!(!t.expired(260));
        assert!(t.expired(270));
    }
}

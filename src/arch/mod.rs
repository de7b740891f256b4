//! # Architecture Ports
//!
//! Implementations of [`crate::platform::Platform`] for the supported
//! environments. Bare-metal ARM builds get the hardware port; every
//! other build (including the test suite) gets the software port with
//! a manually advanced clock.

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m;

#[cfg(not(all(target_arch = "arm", target_os = "none")))]
pub mod host;

//! # FsmOS — a cooperative message-passing microkernel
//!
//! A single-threaded, cooperative kernel for resource-constrained
//! microcontrollers (think 2 KiB of RAM and 32 KiB of flash). A fixed
//! set of long-lived tasks runs at declared periods; tasks talk to each
//! other over one global bus with both direct (point-to-point) and
//! topic-based publish/subscribe delivery.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    Application Tasks                     │
//! │        impl Task { step() · on_msg() · hooks }           │
//! ├──────────────────────────────────────────────────────────┤
//! │                 Scheduler (scheduler.rs)                 │
//! │   loop_once() · add() · tell()/publish() · lifecycle     │
//! ├──────────────┬──────────────────────┬────────────────────┤
//! │ Message Bus  │   Task Model         │   Diagnostics      │
//! │ msg.rs       │   task.rs            │   reset.rs         │
//! │ queue.rs     │   ─ state machine    │   mem.rs           │
//! │ ─ pool       │   ─ subscriptions    │   log.rs           │
//! │ ─ refcounts  │   ─ exec stats       │   timer.rs         │
//! ├──────────────┴──────────────────────┴────────────────────┤
//! │            Platform Capabilities (platform.rs)           │
//! │    time · log sink · watchdog · reset flags · canary     │
//! ├──────────────────────────────────────────────────────────┤
//! │        Ports (arch/): Cortex-M hardware · host sim       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Execution Model
//!
//! There is no preemption, no per-task stack, and no blocking call.
//! Each pass of [`Scheduler::loop_once`]:
//!
//! 1. Refreshes kernel time and advances period countdowns
//! 2. Feeds the watchdog
//! 3. Delivers queued messages (`on_msg` on targets/subscribers)
//! 4. Runs *one* ready task: highest priority, ties to the lowest id,
//!    gated so the queue can absorb the task's declared message budget
//! 5. Reclaims terminated tasks
//!
//! A task "waits" by keeping state and a soft [`Timer`] across `step()`
//! calls, never by spinning. Long operations are decomposed into state
//! machines — that decomposition is the core idea of the kernel, not a
//! limitation to engineer around.
//!
//! ## Diagnostics
//!
//! The kernel answers "what went wrong" after the fact: a reset-cause
//! record survives reboots in uninitialized RAM and names the task that
//! was running when the watchdog bit; a painted stack canary measures
//! worst-case stack depth; per-task statistics track execution times
//! and who delayed whom.
//!
//! ## Example
//!
//! ```ignore
//! use fsmos::{MsgPool, ResetInfo, Scheduler, Task, TaskConfig, TaskContext};
//!
//! struct Blinker;
//!
//! impl Task for Blinker {
//!     fn step(&mut self, ctx: &mut TaskContext<'_, '_>) {
//!         ctx.publish(TOPIC_LED, MSG_TOGGLE, 0);
//!     }
//! }
//!
//! let pool = MsgPool::new();
//! let mut reset = ResetInfo::new();
//! let mut blinker = Blinker;
//! let mut os = Scheduler::new(&pool, &platform, &mut reset);
//! os.add(&mut blinker, TaskConfig { period_ms: 500, ..TaskConfig::new("blink") });
//! os.begin();
//! os.run();
//! ```
//!
//! ## Memory Model
//!
//! - **No heap, no `alloc`**: every structure is fixed-capacity
//! - **Bounded messaging**: one hard cap covers queue nodes and pooled
//!   records; exhaustion surfaces as a `false`/`None` return at the
//!   call site, never as a panic
//! - **Interrupt-safe**: reference counts and queue cursors mutate
//!   inside `critical-section` atomic regions

#![no_std]

pub mod arch;
pub mod config;
pub mod log;
pub mod mem;
pub mod msg;
pub mod platform;
pub mod reset;
pub mod scheduler;
pub mod sync;
pub mod task;
pub mod timer;

mod queue;

pub use config::{TopicMask, MAX_TOPICS};
pub use log::LogLevel;
pub use mem::{SystemMemoryInfo, TaskMemoryInfo};
pub use msg::{MsgData, MsgPool, SharedMsg};
pub use platform::Platform;
pub use reset::{ResetCause, ResetInfo};
pub use scheduler::{Scheduler, TaskContext};
pub use task::{priority, Task, TaskConfig, TaskState, TaskStats};
pub use timer::{Timer, Timer16, Timer32, Timer8};

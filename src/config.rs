//! # FsmOS Configuration
//!
//! Compile-time constants governing the kernel and message system.
//! All limits are fixed at compile time — no dynamic allocation.

/// Hard cap on global queue nodes and pooled message records.
/// Bounds the worst-case RAM consumed by the message system.
pub const MAX_MESSAGE_POOL_SIZE: usize = 32;

/// Number of message-queue nodes provisioned per growth step.
/// The queue starts empty and claims nodes from its backing array
/// in chunks of this size, never exceeding `MAX_MESSAGE_POOL_SIZE`.
pub const MSG_NODE_CHUNK: usize = 4;

/// Initial adaptive window of the message pool. The pool widens past
/// this when sustained load demands it and shrinks back when idle,
/// but never below this floor.
pub const MSG_POOL_INITIAL_SIZE: u8 = 4;

/// Capacity in bytes of the payload buffer retained by each queue node.
/// An enqueue carrying more bytes than this is refused.
pub const MSG_PAYLOAD_CAP: usize = 16;

/// Depth of the per-task FIFO that buffers messages arriving while the
/// task is suspended (when the task opts into suspended queuing).
pub const SUSPEND_QUEUE_CAP: usize = 8;

/// Default task execution period in milliseconds.
pub const DEFAULT_TASK_PERIOD: u16 = 100;

/// Minimum allowed task period in milliseconds. Periods below this are
/// clamped on admission.
pub const MIN_TASK_PERIOD: u16 = 1;

/// Maximum allowed task period in milliseconds.
pub const MAX_TASK_PERIOD: u16 = 65535;

/// Messages a task is assumed to produce per `step()` when it does not
/// declare a budget. The scheduler will not dispatch a task unless the
/// global queue has at least this many free slots.
pub const DEFAULT_TASK_MESSAGE_BUDGET: u8 = 1;

/// Bytes of headroom kept between the painted canary region and the
/// current stack pointer, protecting live frames and ISR stacks from
/// the paint.
pub const STACK_CANARY_MARGIN: usize = 32;

#[cfg(all(feature = "topic-bits-8", feature = "topic-bits-32"))]
compile_error!("select at most one of `topic-bits-8` and `topic-bits-32`");

/// Subscription bitfield, one bit per topic. Width is selected by the
/// `topic-bits-8` / `topic-bits-32` features; the default is 16 bits.
#[cfg(feature = "topic-bits-8")]
pub type TopicMask = u8;
#[cfg(all(not(feature = "topic-bits-8"), not(feature = "topic-bits-32")))]
pub type TopicMask = u16;
#[cfg(feature = "topic-bits-32")]
pub type TopicMask = u32;

/// Number of addressable topics, equal to the bitfield width. Topic 0 is
/// reserved for direct messages, so usable topics are `1..MAX_TOPICS`.
/// This is also the admission cap on simultaneously registered tasks.
pub const MAX_TOPICS: u8 = (core::mem::size_of::<TopicMask>() * 8) as u8;

/// Capacity of the scheduler's task table.
pub const MAX_TASKS: usize = MAX_TOPICS as usize;

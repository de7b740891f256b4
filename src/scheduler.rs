//! # Scheduler
//!
//! The kernel core: owns the task table, the global message queue, and
//! the tick loop that ties timebase, delivery, dispatch and watchdog
//! together.
//!
//! ## Tick Pipeline
//!
//! Every call to [`Scheduler::loop_once`] runs one pass:
//!
//! ```text
//! timebase ──► refresh kernel time
//!                    │
//!                    ▼
//!      advance period countdowns on active tasks
//!                    │
//!                    ▼
//!              feed the watchdog
//!                    │
//!                    ▼
//!      replay suspended-queue backlogs, then drain the
//!      global queue ──► on_msg on target / subscribers
//!                    │
//!                    ▼
//!      pick ONE ready task: highest priority, then lowest id,
//!      gated by free queue slots ≥ its message budget
//!                    │
//!                    ▼
//!      step() ──► timing stats, delay attribution,
//!                 reclamation of terminated tasks
//! ```
//!
//! ## Scheduling Rules
//!
//! A task is *ready* when it is active, its countdown has reached zero,
//! and the global queue has at least `max(budget, 1)` free slots. The
//! budget gate keeps a prolific producer parked until the bus can
//! absorb its declared peak output, so `tell`/`publish` inside one
//! `step()` never fail for lack of capacity.
//!
//! When a task starts later than its due time, the delay is charged to
//! the task that ran immediately before it — on a cooperative kernel
//! the previous task's overrun is the only thing that can push a
//! dispatch late.

use core::fmt;

use crate::config::{
    DEFAULT_TASK_MESSAGE_BUDGET, MAX_TASKS, MAX_TOPICS, MSG_PAYLOAD_CAP, SUSPEND_QUEUE_CAP,
    TopicMask,
};
use crate::log::{self, LogLevel};
use crate::mem::{SystemMemoryInfo, TaskMemoryInfo};
use crate::msg::{MsgData, MsgPool, SharedMsg};
use crate::platform::Platform;
use crate::queue::MsgQueue;
use crate::reset::{ResetCause, ResetInfo};
use crate::task::{PendingHook, Task, TaskConfig, TaskControl, TaskState, TaskStats};

/// Index sentinel for "no slot".
const NIL: u8 = u8::MAX;

/// One entry of the task table: the application object, the kernel
/// bookkeeping, and the intrusive list link.
struct TaskSlot<'a> {
    task: Option<&'a mut dyn Task>,
    tcb: TaskControl<'a>,
    next: u8,
}

impl TaskSlot<'_> {
    fn empty() -> Self {
        Self {
            task: None,
            tcb: TaskControl::new(TaskConfig::default(), DEFAULT_TASK_MESSAGE_BUDGET),
            next: NIL,
        }
    }
}

/// Cooperative periodic scheduler with a global message bus.
///
/// The scheduler borrows its collaborators — the message pool, the
/// platform, the persistent reset record — and the task objects
/// registered with [`add`](Self::add). It never owns application
/// memory; removing or reclaiming a task only recycles the kernel's
/// own slot.
pub struct Scheduler<'a> {
    slots: [TaskSlot<'a>; MAX_TASKS],
    /// Admission-ordered list through `slots`; fan-out delivery and
    /// ready-task scans walk it front to back.
    head: u8,
    tail: u8,
    free_head: u8,
    /// Slots claimed from the backing array so far.
    provisioned: u8,
    task_count: u8,
    next_task_id: u8,
    queue: MsgQueue,
    pool: &'a MsgPool,
    platform: &'a dyn Platform,
    reset: &'a mut ResetInfo,
    /// Kernel time, refreshed from the timebase once per tick.
    system_time: u32,
    running: bool,
    log_level: LogLevel,
    /// Id of the task that ran most recently; delay attribution target.
    /// 0 before the first dispatch.
    last_executed_task_id: u8,
    watchdog_enabled: bool,
}

impl<'a> Scheduler<'a> {
    /// Create an idle scheduler. No tasks run until [`begin`](Self::begin).
    pub fn new(pool: &'a MsgPool, platform: &'a dyn Platform, reset: &'a mut ResetInfo) -> Self {
        let system_time = platform.now_ms();
        Self {
            slots: core::array::from_fn(|_| TaskSlot::empty()),
            head: NIL,
            tail: NIL,
            free_head: NIL,
            provisioned: 0,
            task_count: 0,
            next_task_id: 1,
            queue: MsgQueue::new(),
            pool,
            platform,
            reset,
            system_time,
            running: false,
            log_level: LogLevel::Info,
            last_executed_task_id: 0,
            watchdog_enabled: false,
        }
    }

    // -----------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------

    /// Register a task. Returns its assigned id, or `None` when the
    /// table is full. The task starts `Inactive`; [`begin`](Self::begin)
    /// or [`start_task`](Self::start_task) activates it.
    ///
    /// Ids are assigned from a wrapping counter that skips 0 and any id
    /// still in use, so no two registered tasks ever share one.
    pub fn add(&mut self, task: &'a mut dyn Task, config: TaskConfig) -> Option<u8> {
        if self.task_count as usize >= MAX_TASKS {
            self.log_system(LogLevel::Warn, format_args!("task table full"));
            return None;
        }
        let slot = self.acquire_slot()?;
        let id = self.claim_task_id();
        let budget = task.max_message_budget();
        let mut tcb = TaskControl::new(config, budget);
        tcb.id = id;
        self.slots[slot].tcb = tcb;
        self.slots[slot].task = Some(task);
        self.slots[slot].next = NIL;
        if self.tail == NIL {
            self.head = slot as u8;
        } else {
            self.slots[self.tail as usize].next = slot as u8;
        }
        self.tail = slot as u8;
        self.task_count += 1;
        Some(id)
    }

    /// Unregister a task without running any lifecycle hook. The slot
    /// is recycled; the task object stays with its owner.
    pub fn remove(&mut self, id: u8) -> bool {
        let mut prev = NIL;
        let mut cur = self.head;
        while cur != NIL {
            let next = self.slots[cur as usize].next;
            if self.slots[cur as usize].tcb.id == id {
                self.unlink_and_recycle(cur, prev, next);
                return true;
            }
            prev = cur;
            cur = next;
        }
        false
    }

    fn acquire_slot(&mut self) -> Option<usize> {
        if self.free_head != NIL {
            let idx = self.free_head;
            self.free_head = self.slots[idx as usize].next;
            return Some(idx as usize);
        }
        if (self.provisioned as usize) < MAX_TASKS {
            let idx = self.provisioned;
            self.provisioned += 1;
            return Some(idx as usize);
        }
        None
    }

    /// Next free id from the wrapping counter: 255 rolls over to 1,
    /// never 0, and ids still attached to registered tasks are skipped.
    fn claim_task_id(&mut self) -> u8 {
        loop {
            let id = self.next_task_id;
            self.next_task_id = if id == u8::MAX { 1 } else { id + 1 };
            if self.find_slot(id).is_none() {
                return id;
            }
        }
    }

    fn find_slot(&self, id: u8) -> Option<usize> {
        let mut cur = self.head;
        while cur != NIL {
            if self.slots[cur as usize].tcb.id == id {
                return Some(cur as usize);
            }
            cur = self.slots[cur as usize].next;
        }
        None
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// `Inactive -> Active`. Resets the period countdown and invokes
    /// `on_start`.
    pub fn start_task(&mut self, id: u8) -> bool {
        let Some(slot) = self.find_slot(id) else {
            return false;
        };
        if self.slots[slot].tcb.state != TaskState::Inactive {
            return false;
        }
        let tcb = &mut self.slots[slot].tcb;
        tcb.state = TaskState::Active;
        tcb.remaining_time = tcb.period_ms;
        self.reset.last_task_id = id;
        self.with_task(slot, |task, ctx| task.on_start(ctx));
        self.run_pending_hooks(slot);
        true
    }

    /// `Active | Suspended -> Inactive`. Drops any suspended-queue
    /// backlog and invokes `on_stop`.
    pub fn stop_task(&mut self, id: u8) -> bool {
        let Some(slot) = self.find_slot(id) else {
            return false;
        };
        let tcb = &mut self.slots[slot].tcb;
        if tcb.state != TaskState::Active && tcb.state != TaskState::Suspended {
            return false;
        }
        tcb.state = TaskState::Inactive;
        while tcb.suspended_q.pop_front().is_some() {}
        self.reset.last_task_id = id;
        self.with_task(slot, |task, ctx| task.on_stop(ctx));
        self.run_pending_hooks(slot);
        true
    }

    /// `Active -> Suspended`. The period countdown freezes; message
    /// handling follows the task's suspended-queuing choice.
    pub fn suspend_task(&mut self, id: u8) -> bool {
        let Some(slot) = self.find_slot(id) else {
            return false;
        };
        if self.slots[slot].tcb.state != TaskState::Active {
            return false;
        }
        self.slots[slot].tcb.state = TaskState::Suspended;
        self.reset.last_task_id = id;
        self.with_task(slot, |task, ctx| task.on_suspend(ctx));
        self.run_pending_hooks(slot);
        true
    }

    /// `Suspended -> Active`. Restarts the countdown at a full period;
    /// the buffered backlog replays ahead of fresh delivery on the next
    /// tick.
    pub fn resume_task(&mut self, id: u8) -> bool {
        let Some(slot) = self.find_slot(id) else {
            return false;
        };
        if self.slots[slot].tcb.state != TaskState::Suspended {
            return false;
        }
        let tcb = &mut self.slots[slot].tcb;
        tcb.state = TaskState::Active;
        tcb.remaining_time = tcb.period_ms;
        self.reset.last_task_id = id;
        self.with_task(slot, |task, ctx| task.on_resume(ctx));
        self.run_pending_hooks(slot);
        true
    }

    /// Mark a task `Terminated`. No hook runs; the scheduler unlinks
    /// and recycles the slot at the end of the current tick.
    pub fn terminate_task(&mut self, id: u8) -> bool {
        let Some(slot) = self.find_slot(id) else {
            return false;
        };
        let tcb = &mut self.slots[slot].tcb;
        if tcb.state == TaskState::Terminated {
            return false;
        }
        tcb.state = TaskState::Terminated;
        tcb.pending_hook = None;
        true
    }

    // -----------------------------------------------------------------
    // System control
    // -----------------------------------------------------------------

    /// Bring the kernel up: paint the stack canary, latch the reset
    /// cause into the persistent record, and start every task admitted
    /// so far (in admission order).
    pub fn begin(&mut self) {
        self.platform.paint_stack_canary();
        let flags = self.platform.read_and_clear_reset_flags();
        let now = self.platform.now_ms();
        self.reset.capture(flags, now);
        self.system_time = now;
        self.running = true;
        let mut cur = self.head;
        while cur != NIL {
            let next = self.slots[cur as usize].next;
            let id = self.slots[cur as usize].tcb.id;
            self.start_task(id);
            cur = next;
        }
    }

    /// Halt scheduling. [`run`](Self::run) returns after the current
    /// pass; tasks keep their states.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Arm the hardware watchdog. From now on it is fed once per tick,
    /// so a `step()` that overruns the timeout resets the system — and
    /// the persistent record names the task that was running.
    pub fn enable_watchdog(&mut self, timeout_ms: u16) {
        self.platform.watchdog_enable(timeout_ms);
        self.watchdog_enabled = true;
        self.reset.watchdog_timeout = timeout_ms;
    }

    /// Run ticks until [`stop`](Self::stop) is called.
    pub fn run(&mut self) {
        while self.running {
            self.loop_once();
        }
    }

    /// One pass of the tick pipeline (see module docs).
    pub fn loop_once(&mut self) {
        let now = self.platform.now_ms();
        let elapsed = now.wrapping_sub(self.system_time);
        self.system_time = now;

        if elapsed > 0 {
            self.advance_countdowns(now, elapsed);
        }

        if self.watchdog_enabled {
            self.platform.watchdog_feed();
        }

        self.drain_suspended_queues();
        self.deliver_queue();

        if let Some(slot) = self.select_next() {
            self.dispatch(slot);
        }

        self.reclaim_terminated();
    }

    /// Decrement active countdowns by the elapsed milliseconds. When a
    /// countdown crosses zero, the due instant is back-dated by the
    /// overshoot so late ticks still measure delay from the true due
    /// time.
    fn advance_countdowns(&mut self, now: u32, elapsed: u32) {
        let dec = elapsed.min(u16::MAX as u32) as u16;
        let mut cur = self.head;
        while cur != NIL {
            let slot = &mut self.slots[cur as usize];
            let tcb = &mut slot.tcb;
            if tcb.state == TaskState::Active && tcb.remaining_time > 0 {
                if dec >= tcb.remaining_time {
                    let overshoot = (dec - tcb.remaining_time) as u32;
                    tcb.remaining_time = 0;
                    tcb.due_since = now.wrapping_sub(overshoot);
                } else {
                    tcb.remaining_time -= dec;
                }
            }
            cur = slot.next;
        }
    }

    // -----------------------------------------------------------------
    // Messaging
    // -----------------------------------------------------------------

    /// Enqueue a direct message to the task with the given id.
    /// Delivered in the next tick's drain phase, before any `step()`.
    pub fn tell(&mut self, target: u8, kind: u8, arg: u16) -> bool {
        self.post(target, 0, kind, arg, &[])
    }

    /// [`tell`](Self::tell) with an attached byte payload.
    pub fn tell_with_payload(&mut self, target: u8, kind: u8, arg: u16, payload: &[u8]) -> bool {
        self.post(target, 0, kind, arg, payload)
    }

    /// Enqueue one message that fans out to every subscriber of
    /// `topic` at delivery time. Topic 0 is reserved and refused.
    pub fn publish(&mut self, topic: u8, kind: u8, arg: u16) -> bool {
        if topic == 0 {
            return false;
        }
        self.post(0, topic, kind, arg, &[])
    }

    /// [`publish`](Self::publish) with an attached byte payload.
    pub fn publish_with_payload(&mut self, topic: u8, kind: u8, arg: u16, payload: &[u8]) -> bool {
        if topic == 0 {
            return false;
        }
        self.post(0, topic, kind, arg, payload)
    }

    /// Common enqueue path. Refuses out-of-range topics, messages
    /// nobody would receive, and capacity exhaustion — all surfaced as
    /// a `false` return, never as dropped state.
    fn post(&mut self, target: u8, topic: u8, kind: u8, arg: u16, payload: &[u8]) -> bool {
        if topic >= MAX_TOPICS {
            return false;
        }
        if self.receiver_count(target, topic) == 0 {
            return false;
        }
        self.queue.enqueue(target, topic, kind, arg, payload)
    }

    /// How many registered tasks would currently receive this message.
    fn receiver_count(&self, target: u8, topic: u8) -> u8 {
        let mut count = 0;
        let mut cur = self.head;
        while cur != NIL {
            let tcb = &self.slots[cur as usize].tcb;
            if tcb.state != TaskState::Terminated {
                let hit = if topic == 0 {
                    tcb.id == target
                } else {
                    tcb.is_subscribed(topic)
                };
                if hit {
                    count += 1;
                }
            }
            cur = self.slots[cur as usize].next;
        }
        count
    }

    /// Replay buffered messages of freshly resumed tasks, ahead of any
    /// new bus delivery. Replayed records carry no payload.
    fn drain_suspended_queues(&mut self) {
        let mut cur = self.head;
        while cur != NIL {
            let next = self.slots[cur as usize].next;
            let slot = cur as usize;
            loop {
                if self.slots[slot].tcb.state != TaskState::Active {
                    break;
                }
                let Some(shared) = self.slots[slot].tcb.suspended_q.pop_front() else {
                    break;
                };
                let msg = shared.data();
                self.reset.last_task_id = self.slots[slot].tcb.id;
                self.with_task(slot, |task, ctx| task.on_msg(ctx, &msg, &[]));
                self.run_pending_hooks(slot);
                // `shared` drops here, releasing the pooled record.
            }
            cur = next;
        }
    }

    /// Drain the global queue. Each node is detached before its
    /// handlers run and recycled only afterwards, so handlers may
    /// enqueue freely without disturbing in-flight delivery.
    fn deliver_queue(&mut self) {
        while let Some(node) = self.queue.pop_head() {
            let msg = self.queue.node_msg(node);
            let target = self.queue.node_target(node);
            let mut payload_buf = [0u8; MSG_PAYLOAD_CAP];
            let payload_len = {
                let payload = self.queue.node_payload(node);
                payload_buf[..payload.len()].copy_from_slice(payload);
                payload.len()
            };
            let payload = &payload_buf[..payload_len];

            if msg.topic == 0 {
                if let Some(slot) = self.find_slot(target) {
                    self.deliver_to(slot, msg, payload);
                }
            } else {
                let mut cur = self.head;
                while cur != NIL {
                    let next = self.slots[cur as usize].next;
                    if self.slots[cur as usize].tcb.is_subscribed(msg.topic) {
                        self.deliver_to(cur as usize, msg, payload);
                    }
                    cur = next;
                }
            }
            self.queue.recycle(node);
        }
    }

    /// Hand one message to one task according to its state: active
    /// tasks get `on_msg` immediately, suspended tasks with queuing
    /// enabled get a pooled copy buffered, everyone else drops it.
    fn deliver_to(&mut self, slot: usize, msg: MsgData, payload: &[u8]) {
        let id = self.slots[slot].tcb.id;
        match self.slots[slot].tcb.state {
            TaskState::Active => {
                self.reset.last_task_id = id;
                self.with_task(slot, |task, ctx| task.on_msg(ctx, &msg, payload));
                self.run_pending_hooks(slot);
            }
            TaskState::Suspended if self.slots[slot].tcb.queue_while_suspended => {
                let pool = self.pool;
                match pool.allocate() {
                    Some(shared) => {
                        shared.set_data(msg);
                        if self.slots[slot].tcb.suspended_q.push_back(shared).is_err() {
                            self.log_task(
                                LogLevel::Warn,
                                id,
                                format_args!("suspend queue full, message dropped"),
                            );
                        }
                    }
                    None => {
                        self.log_system(LogLevel::Error, format_args!("message pool exhausted"));
                    }
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------
    // Selection & dispatch
    // -----------------------------------------------------------------

    /// Pick the ready task to run this tick: highest priority wins,
    /// ties go to the smallest id. A task whose message budget exceeds
    /// the queue's free slots is not ready.
    fn select_next(&self) -> Option<usize> {
        let free = self.queue.free_slots();
        let mut best: Option<usize> = None;
        let mut cur = self.head;
        while cur != NIL {
            let tcb = &self.slots[cur as usize].tcb;
            let ready = tcb.state == TaskState::Active
                && tcb.remaining_time == 0
                && free >= tcb.budget.max(1);
            if ready {
                best = match best {
                    None => Some(cur as usize),
                    Some(b) => {
                        let incumbent = &self.slots[b].tcb;
                        let wins = tcb.priority > incumbent.priority
                            || (tcb.priority == incumbent.priority && tcb.id < incumbent.id);
                        if wins {
                            Some(cur as usize)
                        } else {
                            Some(b)
                        }
                    }
                };
            }
            cur = self.slots[cur as usize].next;
        }
        best
    }

    /// Run one task: timing capture, delay attribution, `step()`,
    /// statistics. The persistent record is updated *before* user code
    /// runs so a hang inside `step()` is attributable after the
    /// watchdog reset.
    fn dispatch(&mut self, slot: usize) {
        let now = self.system_time;
        let id;
        let delay;
        {
            let tcb = &mut self.slots[slot].tcb;
            id = tcb.id;
            tcb.stats.scheduled_time = tcb.due_since;
            tcb.stats.actual_start_time = now;
            delay = now.wrapping_sub(tcb.due_since).min(u16::MAX as u32) as u16;
            if delay > 0 {
                tcb.record_delay(delay);
            }
            tcb.remaining_time = tcb.period_ms;
        }

        if delay > 0 {
            let culprit = self.last_executed_task_id;
            if culprit != 0 {
                if let Some(cslot) = self.find_slot(culprit) {
                    let stats = &mut self.slots[cslot].tcb.stats;
                    stats.caused_delay_count = stats.caused_delay_count.saturating_add(1);
                }
                self.log_task(
                    LogLevel::Warn,
                    id,
                    format_args!("delayed {}ms by t{}", delay, culprit),
                );
            } else {
                self.log_task(LogLevel::Warn, id, format_args!("delayed {}ms", delay));
            }
        }

        self.reset.last_task_id = id;
        let started = self.platform.now_us();
        self.with_task(slot, |task, ctx| task.step(ctx));
        let exec_us = self.platform.now_us().wrapping_sub(started);
        self.slots[slot].tcb.record_exec(exec_us);
        self.log_task(LogLevel::Debug, id, format_args!("step {}us", exec_us));
        self.run_pending_hooks(slot);
        self.last_executed_task_id = id;
    }

    /// Unlink every terminated task and recycle its slot. Runs at the
    /// end of each tick.
    fn reclaim_terminated(&mut self) {
        let mut prev = NIL;
        let mut cur = self.head;
        while cur != NIL {
            let next = self.slots[cur as usize].next;
            if self.slots[cur as usize].tcb.state == TaskState::Terminated {
                self.unlink_and_recycle(cur, prev, next);
            } else {
                prev = cur;
            }
            cur = next;
        }
    }

    fn unlink_and_recycle(&mut self, cur: u8, prev: u8, next: u8) {
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev as usize].next = next;
        }
        if self.tail == cur {
            self.tail = prev;
        }
        let slot = &mut self.slots[cur as usize];
        slot.task = None;
        while slot.tcb.suspended_q.pop_front().is_some() {}
        slot.tcb = TaskControl::new(TaskConfig::default(), DEFAULT_TASK_MESSAGE_BUDGET);
        slot.next = self.free_head;
        self.free_head = cur;
        self.task_count -= 1;
    }

    /// Temporarily move the task object out of its slot, hand it a
    /// context over the rest of the kernel, and put it back.
    fn with_task<F>(&mut self, slot: usize, f: F)
    where
        F: FnOnce(&mut dyn Task, &mut TaskContext<'_, 'a>),
    {
        if let Some(task) = self.slots[slot].task.take() {
            let mut ctx = TaskContext {
                os: &mut *self,
                slot,
            };
            f(&mut *task, &mut ctx);
            self.slots[slot].task = Some(task);
        }
    }

    /// Fire the hook for a state change the task requested on itself
    /// from inside its own code, exactly once, after that code
    /// returned. A hook may request one more transition (e.g.
    /// `on_suspend` calling stop), so this loops until quiescent.
    fn run_pending_hooks(&mut self, slot: usize) {
        while let Some(hook) = self.slots[slot].tcb.pending_hook.take() {
            match hook {
                PendingHook::Suspend => {
                    self.with_task(slot, |task, ctx| task.on_suspend(ctx));
                }
                PendingHook::Stop => {
                    while self.slots[slot].tcb.suspended_q.pop_front().is_some() {}
                    self.with_task(slot, |task, ctx| task.on_stop(ctx));
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    /// Kernel time in milliseconds, as of the current tick.
    pub fn now(&self) -> u32 {
        self.system_time
    }

    /// Number of registered tasks.
    pub fn task_count(&self) -> u8 {
        self.task_count
    }

    /// Free slots in the global message queue.
    pub fn free_queue_slots(&self) -> u8 {
        self.queue.free_slots()
    }

    /// Minimum severity that reaches the log sink.
    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }

    pub fn task_state(&self, id: u8) -> Option<TaskState> {
        self.find_slot(id).map(|s| self.slots[s].tcb.state)
    }

    /// Period of a task, after admission clamping.
    pub fn task_period(&self, id: u8) -> Option<u16> {
        self.find_slot(id).map(|s| self.slots[s].tcb.period_ms)
    }

    /// Re-period a task. The new value is clamped to the allowed range
    /// and takes effect from the task's next dispatch.
    pub fn set_task_period(&mut self, id: u8, period_ms: u16) -> bool {
        match self.find_slot(id) {
            Some(s) => {
                self.slots[s].tcb.set_period(period_ms);
                true
            }
            None => false,
        }
    }

    /// Statistics snapshot for one task. The execution-time total is
    /// derived from the run counter and average, not stored.
    pub fn task_stats(&self, id: u8) -> Option<TaskStats> {
        let slot = self.find_slot(id)?;
        let tcb = &self.slots[slot].tcb;
        let s = &tcb.stats;
        Some(TaskStats {
            task_id: id,
            name: tcb.name,
            state: tcb.state,
            period_ms: tcb.period_ms,
            priority: tcb.priority,
            run_count: s.run_count,
            max_exec_time_us: s.max_exec_time_us,
            avg_exec_time_us: s.avg_exec_time_us,
            total_exec_time_us: s.run_count as u32 * s.avg_exec_time_us as u32,
            delay_count: s.delay_count,
            max_delay_ms: s.max_delay_ms,
        })
    }

    /// Id of the task that has pushed the most dispatches late, or 0.
    pub fn most_delaying_task(&self) -> u8 {
        let mut worst_id = 0;
        let mut worst_count = 0;
        let mut cur = self.head;
        while cur != NIL {
            let tcb = &self.slots[cur as usize].tcb;
            if tcb.stats.caused_delay_count > worst_count {
                worst_count = tcb.stats.caused_delay_count;
                worst_id = tcb.id;
            }
            cur = self.slots[cur as usize].next;
        }
        worst_id
    }

    /// Snapshot of the persistent reset record. Reading clears the
    /// recorded task id so a later reset is never blamed on stale data.
    pub fn reset_info(&mut self) -> ResetInfo {
        self.reset.read()
    }

    /// Decoded cause of the reset that preceded this boot.
    pub fn reset_cause(&self) -> ResetCause {
        self.reset.cause()
    }

    /// System-wide memory report. Message figures are derived from
    /// live pool and queue state.
    pub fn system_memory_info(&self) -> SystemMemoryInfo {
        let mut task_memory = 0u16;
        let mut cur = self.head;
        while cur != NIL {
            let slot = &self.slots[cur as usize];
            let object = slot.task.as_ref().map_or(0, |t| t.struct_size());
            task_memory = task_memory
                .saturating_add(object)
                .saturating_add(core::mem::size_of::<TaskControl<'_>>() as u16);
            cur = slot.next;
        }
        SystemMemoryInfo {
            free_ram: self.platform.free_ram().unwrap_or(0),
            total_ram: self.platform.total_ram().unwrap_or(0),
            stack_high_water: self.platform.stack_high_water().unwrap_or(0),
            total_tasks: self.task_count,
            task_memory,
            active_messages: self.pool.in_use() + self.queue.len(),
            message_memory: (core::mem::size_of::<MsgPool>() + core::mem::size_of::<MsgQueue>())
                as u16,
        }
    }

    /// Memory report for one task.
    pub fn task_memory_info(&self, id: u8) -> Option<TaskMemoryInfo> {
        let slot = self.find_slot(id)?;
        let object = self.slots[slot].task.as_ref().map_or(0, |t| t.struct_size());
        let control = core::mem::size_of::<TaskControl<'_>>() as u16;
        Some(TaskMemoryInfo {
            task_id: id,
            task_struct_size: object,
            subscription_size: core::mem::size_of::<TopicMask>() as u16,
            queue_size: (SUSPEND_QUEUE_CAP * core::mem::size_of::<SharedMsg<'_>>()) as u16,
            total_allocated: object.saturating_add(control),
        })
    }

    // -----------------------------------------------------------------
    // Logging
    // -----------------------------------------------------------------

    fn log_system(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        log::emit(self.platform, self.log_level, level, None, args);
    }

    fn log_task(&self, level: LogLevel, id: u8, args: fmt::Arguments<'_>) {
        log::emit(self.platform, self.log_level, level, Some(id), args);
    }
}

/// The kernel as seen from inside a task hook.
///
/// Every hook receives one of these. It carries the task's identity,
/// so publishing, subscribing and self-lifecycle calls need no global
/// state.
pub struct TaskContext<'c, 'a> {
    os: &'c mut Scheduler<'a>,
    slot: usize,
}

impl TaskContext<'_, '_> {
    /// Id of the task this context belongs to.
    pub fn id(&self) -> u8 {
        self.os.slots[self.slot].tcb.id
    }

    /// Kernel time in milliseconds, frozen for the current tick.
    pub fn now_ms(&self) -> u32 {
        self.os.system_time
    }

    /// Live microsecond timestamp from the timebase.
    pub fn now_us(&self) -> u32 {
        self.os.platform.now_us()
    }

    /// Send a direct message to another task.
    pub fn tell(&mut self, target: u8, kind: u8, arg: u16) -> bool {
        self.os.post(target, 0, kind, arg, &[])
    }

    /// [`tell`](Self::tell) with an attached byte payload.
    pub fn tell_with_payload(&mut self, target: u8, kind: u8, arg: u16, payload: &[u8]) -> bool {
        self.os.post(target, 0, kind, arg, payload)
    }

    /// Publish to a topic. Topic 0 is reserved for direct messages and
    /// refused.
    pub fn publish(&mut self, topic: u8, kind: u8, arg: u16) -> bool {
        if topic == 0 {
            return false;
        }
        self.os.post(0, topic, kind, arg, &[])
    }

    /// [`publish`](Self::publish) with an attached byte payload.
    pub fn publish_with_payload(&mut self, topic: u8, kind: u8, arg: u16, payload: &[u8]) -> bool {
        if topic == 0 {
            return false;
        }
        self.os.post(0, topic, kind, arg, payload)
    }

    /// Subscribe this task to a topic.
    pub fn subscribe(&mut self, topic: u8) {
        self.os.slots[self.slot].tcb.subscribe(topic);
    }

    /// Unsubscribe this task from a topic.
    pub fn unsubscribe(&mut self, topic: u8) {
        self.os.slots[self.slot].tcb.unsubscribe(topic);
    }

    pub fn is_subscribed(&self, topic: u8) -> bool {
        self.os.slots[self.slot].tcb.is_subscribed(topic)
    }

    /// Free slots in the global message queue.
    pub fn free_queue_slots(&self) -> u8 {
        self.os.queue.free_slots()
    }

    /// This task's period in milliseconds.
    pub fn period(&self) -> u16 {
        self.os.slots[self.slot].tcb.period_ms
    }

    /// Re-period this task (clamped to the allowed range).
    pub fn set_period(&mut self, period_ms: u16) {
        self.os.slots[self.slot].tcb.set_period(period_ms);
    }

    /// Suspend this task. Takes effect immediately; `on_suspend` runs
    /// once after the current hook returns.
    pub fn suspend(&mut self) {
        let tcb = &mut self.os.slots[self.slot].tcb;
        if tcb.state == TaskState::Active {
            tcb.state = TaskState::Suspended;
            tcb.pending_hook = Some(PendingHook::Suspend);
        }
    }

    /// Stop this task. Takes effect immediately; `on_stop` runs once
    /// after the current hook returns.
    pub fn stop(&mut self) {
        let tcb = &mut self.os.slots[self.slot].tcb;
        if tcb.state == TaskState::Active || tcb.state == TaskState::Suspended {
            tcb.state = TaskState::Inactive;
            tcb.pending_hook = Some(PendingHook::Stop);
        }
    }

    /// Mark this task terminated. No further `step` or `on_msg` will
    /// run; the scheduler reclaims the slot at the end of the tick.
    pub fn terminate(&mut self) {
        let tcb = &mut self.os.slots[self.slot].tcb;
        tcb.state = TaskState::Terminated;
        tcb.pending_hook = None;
    }

    /// Log with this task's id attached.
    pub fn log_debug(&self, msg: &str) {
        self.log(LogLevel::Debug, msg);
    }

    pub fn log_info(&self, msg: &str) {
        self.log(LogLevel::Info, msg);
    }

    pub fn log_warn(&self, msg: &str) {
        self.log(LogLevel::Warn, msg);
    }

    pub fn log_error(&self, msg: &str) {
        self.log(LogLevel::Error, msg);
    }

    fn log(&self, level: LogLevel, msg: &str) {
        let id = self.id();
        self.os.log_task(level, id, format_args!("{}", msg));
    }
}

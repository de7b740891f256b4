//! # Message Records and Pool
//!
//! Inter-task messages are small fixed-size records drawn from a
//! bounded pool. A [`SharedMsg`] is a reference-counted handle over one
//! pooled record: cloning a handle is cheap, and the record returns to
//! the pool when the last handle drops. Reference counts are updated
//! inside atomic regions so handles may be touched from interrupt
//! context.
//!
//! The pool keeps an *adaptive* active window: it hands out records
//! from the first `pool_size` slots and widens or narrows that window
//! with load, within the hard cap. This keeps the scan short when the
//! system is quiet without ever spending more RAM than the cap.

use core::cell::Cell;

use crate::config::{MAX_MESSAGE_POOL_SIZE, MSG_POOL_INITIAL_SIZE};
use crate::sync;

/// One inter-task message.
///
/// `topic == 0` marks a direct message addressed to `target_task_id`;
/// any other topic fans out to subscribers and `target_task_id` is
/// meaningless. The reference count of a pooled record is kept by the
/// pool, not in the record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MsgData {
    /// Application-defined message type.
    pub kind: u8,
    /// Routing topic; 0 is reserved for direct messages.
    pub topic: u8,
    /// Small payload argument.
    pub arg: u16,
    /// Destination task for direct messages.
    pub target_task_id: u8,
}

impl MsgData {
    /// All-zero record, the state of a freshly allocated or freed slot.
    pub const EMPTY: MsgData = MsgData {
        kind: 0,
        topic: 0,
        arg: 0,
        target_task_id: 0,
    };
}

impl Default for MsgData {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// One pool slot: the record plus its reference count.
/// `ref_count == 0` exactly when the pool owns the slot as free.
struct PoolSlot {
    data: Cell<MsgData>,
    ref_count: Cell<u8>,
}

impl PoolSlot {
    const EMPTY: PoolSlot = PoolSlot {
        data: Cell::new(MsgData::EMPTY),
        ref_count: Cell::new(0),
    };
}

/// Bounded pool of message records with an adaptive active window.
///
/// The pool is lazily initialized on the first allocation. All state is
/// interior-mutable so handles can retain and release records through a
/// shared reference; every mutation happens inside an atomic region.
pub struct MsgPool {
    slots: [PoolSlot; MAX_MESSAGE_POOL_SIZE],
    initialized: Cell<bool>,
    /// Active window; allocation scans slots `0..pool_size`.
    pool_size: Cell<u8>,
    current_in_use: Cell<u8>,
    next_free: Cell<u8>,
}

impl MsgPool {
    /// Create an uninitialized pool. Suitable for static storage.
    pub const fn new() -> Self {
        Self {
            slots: [PoolSlot::EMPTY; MAX_MESSAGE_POOL_SIZE],
            initialized: Cell::new(false),
            pool_size: Cell::new(0),
            current_in_use: Cell::new(0),
            next_free: Cell::new(0),
        }
    }

    /// Hard cap on pooled records.
    pub const fn limit(&self) -> u8 {
        MAX_MESSAGE_POOL_SIZE as u8
    }

    /// Current adaptive window (0 before first allocation).
    pub fn pool_size(&self) -> u8 {
        self.pool_size.get()
    }

    /// Number of records currently held by live handles.
    pub fn in_use(&self) -> u8 {
        self.current_in_use.get()
    }

    /// Prepare the pool for use. Called implicitly by the first
    /// [`allocate`](Self::allocate); calling it again is a no-op.
    pub fn initialize(&self) -> bool {
        if self.initialized.get() {
            return false;
        }
        self.pool_size.set(MSG_POOL_INITIAL_SIZE);
        self.current_in_use.set(0);
        self.next_free.set(0);
        self.initialized.set(true);
        true
    }

    /// Allocate a fresh zeroed record, returning a handle with
    /// reference count 1. Returns `None` when the active window is
    /// fully in use (the window is widened for the next attempt when
    /// the cap allows).
    pub fn allocate(&self) -> Option<SharedMsg<'_>> {
        sync::atomic(|_| {
            if !self.initialized.get() {
                self.initialize();
            }
            let size = self.pool_size.get();
            if self.current_in_use.get() >= size {
                // Full window: refuse, but let the adaptive policy
                // widen it so a retry can succeed.
                self.update_adaptive_limit();
                return None;
            }
            let size = size as usize;
            let mut idx = self.next_free.get() as usize % size;
            // in_use < pool_size guarantees a free slot in the window.
            while self.slots[idx].ref_count.get() != 0 {
                idx = (idx + 1) % size;
            }
            let slot = &self.slots[idx];
            slot.data.set(MsgData::EMPTY);
            slot.ref_count.set(1);
            self.current_in_use.set(self.current_in_use.get() + 1);
            self.next_free.set(((idx + 1) % size) as u8);
            self.update_adaptive_limit();
            Some(SharedMsg {
                pool: self,
                idx: idx as u8,
            })
        })
    }

    /// Widen the window past three-quarters occupancy, narrow it below
    /// one quarter. Never exceeds the hard cap, never shrinks below the
    /// initial size.
    fn update_adaptive_limit(&self) {
        let size = self.pool_size.get();
        let in_use = self.current_in_use.get();
        if in_use > (3 * size) / 4 && size < self.limit() {
            self.pool_size.set(size + 1);
        } else if in_use < size / 4 && size > MSG_POOL_INITIAL_SIZE {
            self.pool_size.set(size - 1);
        }
    }

    fn retain(&self, idx: u8) {
        sync::atomic(|_| {
            let rc = &self.slots[idx as usize].ref_count;
            rc.set(rc.get() + 1);
        });
    }

    fn release(&self, idx: u8) {
        sync::atomic(|_| {
            let slot = &self.slots[idx as usize];
            let rc = slot.ref_count.get();
            slot.ref_count.set(rc - 1);
            if rc == 1 {
                // Last holder gone: scrub and return to the pool.
                slot.data.set(MsgData::EMPTY);
                self.current_in_use.set(self.current_in_use.get() - 1);
                self.update_adaptive_limit();
            }
        });
    }
}

impl Default for MsgPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference-counted handle over a pooled message record.
///
/// The record lives exactly as long as its longest-lived handle. A
/// handle always refers to a live record; "no message" is expressed as
/// `Option<SharedMsg>`.
pub struct SharedMsg<'p> {
    pool: &'p MsgPool,
    idx: u8,
}

impl SharedMsg<'_> {
    /// Copy of the referenced record.
    pub fn data(&self) -> MsgData {
        self.pool.slots[self.idx as usize].data.get()
    }

    /// Overwrite the referenced record. Visible through every handle
    /// sharing it.
    pub fn set_data(&self, data: MsgData) {
        self.pool.slots[self.idx as usize].data.set(data);
    }

    /// Current reference count of the record.
    pub fn ref_count(&self) -> u8 {
        self.pool.slots[self.idx as usize].ref_count.get()
    }
}

impl Clone for SharedMsg<'_> {
    fn clone(&self) -> Self {
        self.pool.retain(self.idx);
        Self {
            pool: self.pool,
            idx: self.idx,
        }
    }
}

impl Drop for SharedMsg<'_> {
    fn drop(&mut self) {
        self.pool.release(self.idx);
    }
}

impl core::fmt::Debug for SharedMsg<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedMsg")
            .field("idx", &self.idx)
            .field("data", &self.data())
            .finish()
    }
}

//! # Global Message Queue
//!
//! A single FIFO carries every in-flight message. Nodes hold the
//! message record by value plus an optional payload buffer, and live in
//! a fixed backing array: the queue and its free-list are index-linked
//! chains through that array, so there is no allocator and no pointer
//! juggling. Nodes are claimed from the backing array in small chunks
//! as load grows, up to the hard cap.
//!
//! Delivery detaches a node from the queue *before* invoking handlers
//! and recycles it only afterwards, so a handler that enqueues new
//! messages can never observe its own message's storage being reused.

use heapless::Vec;

use crate::config::{MAX_MESSAGE_POOL_SIZE, MSG_NODE_CHUNK, MSG_PAYLOAD_CAP};
use crate::msg::MsgData;
use crate::sync;

/// Index sentinel for "no node".
const NIL: u8 = u8::MAX;

/// One queue node: routing key, embedded record, retained payload.
/// The payload buffer keeps its storage when the node is recycled.
struct MsgNode {
    next: u8,
    target_task_id: u8,
    msg: MsgData,
    payload: Vec<u8, MSG_PAYLOAD_CAP>,
}

impl MsgNode {
    const EMPTY: MsgNode = MsgNode {
        next: NIL,
        target_task_id: 0,
        msg: MsgData::EMPTY,
        payload: Vec::new(),
    };
}

/// Bounded FIFO of queued messages with an attached node free-list.
pub(crate) struct MsgQueue {
    nodes: [MsgNode; MAX_MESSAGE_POOL_SIZE],
    head: u8,
    tail: u8,
    free_head: u8,
    msg_count: u8,
    /// Nodes claimed from the backing array so far.
    total_nodes: u8,
}

impl MsgQueue {
    pub(crate) const fn new() -> Self {
        Self {
            nodes: [MsgNode::EMPTY; MAX_MESSAGE_POOL_SIZE],
            head: NIL,
            tail: NIL,
            free_head: NIL,
            msg_count: 0,
            total_nodes: 0,
        }
    }

    /// Number of queued messages.
    pub(crate) fn len(&self) -> u8 {
        self.msg_count
    }

    /// Enqueue capacity remaining before the hard cap.
    pub(crate) fn free_slots(&self) -> u8 {
        MAX_MESSAGE_POOL_SIZE as u8 - self.msg_count
    }

    /// Claim up to a chunk of fresh nodes from the backing array onto
    /// the free-list. Returns how many were claimed.
    fn grow_chunk(&mut self) -> u8 {
        let avail = MAX_MESSAGE_POOL_SIZE - self.total_nodes as usize;
        let claim = MSG_NODE_CHUNK.min(avail);
        for _ in 0..claim {
            let idx = self.total_nodes;
            self.nodes[idx as usize].next = self.free_head;
            self.free_head = idx;
            self.total_nodes += 1;
        }
        claim as u8
    }

    fn acquire(&mut self) -> Option<u8> {
        if self.free_head == NIL && self.grow_chunk() == 0 {
            return None;
        }
        let idx = self.free_head;
        self.free_head = self.nodes[idx as usize].next;
        Some(idx)
    }

    fn release(&mut self, idx: u8) {
        self.nodes[idx as usize].next = self.free_head;
        self.free_head = idx;
    }

    /// Append a message. Fails when the queue is at the hard cap, no
    /// node can be claimed, or the payload exceeds the node buffer (in
    /// which case the claimed node goes straight back to the free-list).
    pub(crate) fn enqueue(
        &mut self,
        target: u8,
        topic: u8,
        kind: u8,
        arg: u16,
        payload: &[u8],
    ) -> bool {
        sync::atomic(|_| {
            if self.msg_count as usize >= MAX_MESSAGE_POOL_SIZE {
                return false;
            }
            let Some(idx) = self.acquire() else {
                return false;
            };
            let node = &mut self.nodes[idx as usize];
            node.target_task_id = target;
            node.msg = MsgData {
                kind,
                topic,
                arg,
                target_task_id: target,
            };
            node.payload.clear();
            if node.payload.extend_from_slice(payload).is_err() {
                self.release(idx);
                return false;
            }
            node.next = NIL;
            if self.tail == NIL {
                self.head = idx;
            } else {
                self.nodes[self.tail as usize].next = idx;
            }
            self.tail = idx;
            self.msg_count += 1;
            true
        })
    }

    /// Detach the head node. The node stays off the free-list until
    /// [`recycle`](Self::recycle) so its contents remain stable while
    /// handlers run.
    pub(crate) fn pop_head(&mut self) -> Option<u8> {
        sync::atomic(|_| {
            if self.head == NIL {
                return None;
            }
            let idx = self.head;
            self.head = self.nodes[idx as usize].next;
            if self.head == NIL {
                self.tail = NIL;
            }
            self.msg_count -= 1;
            Some(idx)
        })
    }

    /// Return a detached node to the free-list. The payload buffer is
    /// retained for reuse.
    pub(crate) fn recycle(&mut self, idx: u8) {
        sync::atomic(|_| self.release(idx));
    }

    pub(crate) fn node_msg(&self, idx: u8) -> MsgData {
        self.nodes[idx as usize].msg
    }

    pub(crate) fn node_target(&self, idx: u8) -> u8 {
        self.nodes[idx as usize].target_task_id
    }

    pub(crate) fn node_payload(&self, idx: u8) -> &[u8] {
        &self.nodes[idx as usize].payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain_one(q: &mut MsgQueue) -> Option<(u8, MsgData)> {
        let idx = q.pop_head()?;
        let out = (q.node_target(idx), q.node_msg(idx));
        q.recycle(idx);
        Some(out)
    }

    #[test]
    fn test_fifo_order() {
        let mut q = MsgQueue::new();
        assert!(q.enqueue(1, 0, 10, 100, &[]));
        assert!(q.enqueue(1, 0, 11, 101, &[]));
        assert!(q.enqueue(2, 5, 12, 102, &[]));
        assert_eq!(q.len(), 3);

        let (t, m) = drain_one(&mut q).unwrap();
        assert_eq!((t, m.kind, m.arg), (1, 10, 100));
        let (_, m) = drain_one(&mut q).unwrap();
        assert_eq!((m.kind, m.arg), (11, 101));
        let (t, m) = drain_one(&mut q).unwrap();
        assert_eq!((t, m.topic), (2, 5));
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_nodes_claimed_in_chunks() {
        let mut q = MsgQueue::new();
        assert_eq!(q.total_nodes, 0);
        assert!(q.enqueue(1, 0, 1, 0, &[]));
        assert_eq!(q.total_nodes as usize, MSG_NODE_CHUNK);
        for _ in 0..MSG_NODE_CHUNK {
            assert!(q.enqueue(1, 0, 1, 0, &[]));
        }
        assert_eq!(q.total_nodes as usize, 2 * MSG_NODE_CHUNK);
    }

    #[test]
    fn test_hard_cap_refusal_and_recovery() {
        let mut q = MsgQueue::new();
        for i in 0..MAX_MESSAGE_POOL_SIZE {
            assert!(q.enqueue(1, 0, i as u8, 0, &[]), "enqueue {} failed", i);
        }
        assert_eq!(q.free_slots(), 0);
        assert!(!q.enqueue(1, 0, 0xEE, 0, &[]));
        // Freeing one slot makes the next enqueue succeed again.
        drain_one(&mut q).unwrap();
        assert!(q.enqueue(1, 0, 0xEE, 0, &[]));
        assert_eq!(q.len() as usize, MAX_MESSAGE_POOL_SIZE);
    }

    #[test]
    fn test_payload_roundtrip() {
        let mut q = MsgQueue::new();
        assert!(q.enqueue(3, 0, 1, 0, b"sensor"));
        let idx = q.pop_head().unwrap();
        assert_eq!(q.node_payload(idx), b"sensor");
        q.recycle(idx);
    }

    #[test]
    fn test_oversize_payload_refused_without_leaking_node() {
        let mut q = MsgQueue::new();
        let too_big = [0u8; MSG_PAYLOAD_CAP + 1];
        assert!(!q.enqueue(1, 0, 1, 0, &too_big));
        assert_eq!(q.len(), 0);
        // The claimed node went back to the free-list: the queue can
        // still reach its full capacity.
        for _ in 0..MAX_MESSAGE_POOL_SIZE {
            assert!(q.enqueue(1, 0, 1, 0, &[]));
        }
    }

    #[test]
    fn test_payload_cleared_on_node_reuse() {
        let mut q = MsgQueue::new();
        assert!(q.enqueue(1, 0, 1, 0, b"abc"));
        drain_one(&mut q).unwrap();
        // Same node comes back off the free-list; stale payload must
        // not leak into the new message.
        assert!(q.enqueue(1, 0, 2, 0, &[]));
        let idx = q.pop_head().unwrap();
        assert_eq!(q.node_payload(idx), b"");
        q.recycle(idx);
    }

    #[test]
    fn test_node_conservation() {
        let mut q = MsgQueue::new();
        for i in 0..10 {
            assert!(q.enqueue(1, 0, i, 0, &[]));
        }
        for _ in 0..4 {
            drain_one(&mut q).unwrap();
        }
        // Every claimed node is either queued or free.
        let mut free = 0;
        let mut cursor = q.free_head;
        while cursor != NIL {
            free += 1;
            cursor = q.nodes[cursor as usize].next;
        }
        let mut queued = 0;
        let mut cursor = q.head;
        while cursor != NIL {
            queued += 1;
            cursor = q.nodes[cursor as usize].next;
        }
        assert_eq!(queued, q.msg_count);
        assert_eq!(queued + free, q.total_nodes);
    }
}

// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Synchronization objects and their waiting-thread lists.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::context::KernelContext;
use crate::thread::KThread;

/// Identifier of a node inside a [`WaitList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitNode(usize);

struct Node {
    value: Option<Arc<KThread>>,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly-linked waiter list over an index arena.
///
/// Insertion order is preserved and removal by node id is O(1), so a
/// thread waiting on many objects can drop out of each list without
/// scanning.
pub struct WaitList {
    nodes: Vec<Node>,
    head: Option<usize>,
    tail: Option<usize>,
    free: Vec<usize>,
}

impl WaitList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self { nodes: Vec::new(), head: None, tail: None, free: Vec::new() }
    }

    /// Appends a thread and returns the node id for later removal.
    pub fn push_back(&mut self, thread: Arc<KThread>) -> WaitNode {
        let node = Node { value: Some(thread), prev: self.tail, next: None };
        let index = match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        match self.tail {
            Some(tail) => self.nodes[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        WaitNode(index)
    }

    /// Unlinks a node. Removing a node twice is a no-op.
    pub fn remove(&mut self, node: WaitNode) {
        if self.nodes[node.0].value.take().is_none() {
            return;
        }
        let (prev, next) = (self.nodes[node.0].prev, self.nodes[node.0].next);
        match prev {
            Some(prev) => self.nodes[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.nodes[next].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[node.0].prev = None;
        self.nodes[node.0].next = None;
        self.free.push(node.0);
    }

    /// Iterates waiters head-to-tail.
    pub fn iter(&self) -> WaitListIter<'_> {
        WaitListIter { list: self, cursor: self.head }
    }

    /// Number of linked waiters.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no waiter is linked.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl Default for WaitList {
    fn default() -> Self {
        Self::new()
    }
}

/// Head-to-tail iterator over a [`WaitList`].
pub struct WaitListIter<'a> {
    list: &'a WaitList,
    cursor: Option<usize>,
}

impl<'a> Iterator for WaitListIter<'a> {
    type Item = &'a Arc<KThread>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        let node = &self.list.nodes[index];
        self.cursor = node.next;
        node.value.as_ref()
    }
}

/// State every synchronization object embeds.
pub struct SyncObjectBase {
    waiting: Mutex<WaitList>,
}

impl SyncObjectBase {
    /// Creates the base with no waiters.
    pub fn new() -> Self {
        Self { waiting: Mutex::new(WaitList::new()) }
    }

    pub(crate) fn add_waiting_thread(&self, thread: Arc<KThread>) -> WaitNode {
        self.waiting.lock().push_back(thread)
    }

    pub(crate) fn remove_waiting_thread(&self, node: WaitNode) {
        self.waiting.lock().remove(node)
    }

    pub(crate) fn waiting_threads(&self) -> Vec<Arc<KThread>> {
        self.waiting.lock().iter().cloned().collect()
    }
}

impl Default for SyncObjectBase {
    fn default() -> Self {
        Self::new()
    }
}

/// Waitable kernel object.
pub trait KSynchronizationObject: Send + Sync {
    /// Waiting-list state shared with the wait machinery.
    fn base(&self) -> &SyncObjectBase;

    /// Signaled predicate; a wait on a signaled object completes
    /// immediately.
    fn is_signaled(&self) -> bool;
}

/// Compares two objects by identity.
pub(crate) fn same_object(
    a: &Arc<dyn KSynchronizationObject>,
    b: &Arc<dyn KSynchronizationObject>,
) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Manually signalable event, the canonical synchronization object.
///
/// The signaled predicate is sticky: consumers that drained the condition
/// the event advertises call [`clear`](Self::clear) before waiting again.
pub struct KEvent {
    me: Weak<KEvent>,
    context: Arc<KernelContext>,
    base: SyncObjectBase,
    signaled: AtomicBool,
}

impl KEvent {
    /// Creates an unsignaled event bound to `context`.
    pub fn new(context: Arc<KernelContext>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            context,
            base: SyncObjectBase::new(),
            signaled: AtomicBool::new(false),
        })
    }

    /// Sets the signaled predicate and wakes eligible waiters.
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
        let me: Arc<dyn KSynchronizationObject> =
            self.me.upgrade().expect("event outlives its signal");
        self.context.synchronization().signal_object(&me);
    }

    /// Clears the signaled predicate; the next wait parks again.
    pub fn clear(&self) {
        self.signaled.store(false, Ordering::Release);
    }
}

impl KSynchronizationObject for KEvent {
    fn base(&self) -> &SyncObjectBase {
        &self.base
    }

    fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }
}

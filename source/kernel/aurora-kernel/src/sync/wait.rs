// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Multi-object wait and signal.

use std::sync::{Arc, Weak};

use crate::context::KernelContext;
use crate::sync::sync_object::{same_object, KSynchronizationObject};
use crate::sync::time_manager::FutureScheduledObject;
use crate::thread::{current_thread, ThreadSchedState};
use crate::types::{KResult, KernelError};

/// Multi-object wait primitive composing the critical section and the
/// time manager.
pub struct KSynchronization {
    context: Weak<KernelContext>,
}

impl KSynchronization {
    pub(crate) fn new(context: Weak<KernelContext>) -> Self {
        Self { context }
    }

    fn context(&self) -> Arc<KernelContext> {
        self.context.upgrade().expect("kernel context outlives waits")
    }

    /// Waits until one of `objects` is signaled and returns its index.
    ///
    /// `timeout_ns` follows the guest convention: zero polls, negative
    /// waits forever. An already-signaled object completes the wait
    /// without registering; a pending termination or cancel request wins
    /// over the wait path.
    pub fn wait_for(
        &self,
        objects: &[Arc<dyn KSynchronizationObject>],
        timeout_ns: i64,
    ) -> KResult<usize> {
        let context = self.context();
        let critical_section = context.critical_section();
        critical_section.enter();

        for (index, object) in objects.iter().enumerate() {
            if object.is_signaled() {
                critical_section.leave();
                return Ok(index);
            }
        }

        if timeout_ns == 0 {
            critical_section.leave();
            return Err(KernelError::TimedOut);
        }

        let current = current_thread().expect("wait_for requires a bound guest thread");

        let result = if current.termination_requested() {
            Err(KernelError::ThreadTerminating)
        } else if current.take_sync_cancelled() {
            Err(KernelError::Cancelled)
        } else {
            let nodes: Vec<_> = objects
                .iter()
                .map(|object| object.base().add_waiting_thread(Arc::clone(&current)))
                .collect();

            current.begin_sync_wait();
            current.reschedule(ThreadSchedState::PAUSED);
            if timeout_ns > 0 {
                let timer_target: Arc<dyn FutureScheduledObject> = current.clone();
                context.time_manager().schedule_future_invocation(timer_target, timeout_ns);
            }

            // The outermost leave parks this host thread until a signal,
            // the timeout, a cancel or a termination request resumes it.
            critical_section.leave();

            current.end_sync_wait();
            if timeout_ns > 0 {
                let timer_target: Arc<dyn FutureScheduledObject> = current.clone();
                context.time_manager().unschedule_future_invocation(&timer_target);
            }

            critical_section.enter();
            let wait_result = current.obj_sync_result();
            let signaled = current.take_signaled_obj();
            let mut signaled_index = None;
            for (index, object) in objects.iter().enumerate() {
                object.base().remove_waiting_thread(nodes[index]);
                if let Some(signaled) = &signaled {
                    if same_object(object, signaled) {
                        signaled_index = Some(index);
                    }
                }
            }
            wait_result
                .map(|()| signaled_index.expect("successful wait recorded no signaled object"))
        };

        critical_section.leave();
        result
    }

    /// Wakes every paused waiter of `object` while its signaled predicate
    /// holds. The waiting list is walked head-to-tail and every eligible
    /// thread resumes: signalling is a broadcast.
    pub fn signal_object(&self, object: &Arc<dyn KSynchronizationObject>) {
        let context = self.context();
        let critical_section = context.critical_section();
        critical_section.enter();
        if object.is_signaled() {
            for thread in object.base().waiting_threads() {
                if thread.sched_state().low() == ThreadSchedState::PAUSED {
                    thread.set_signaled(Arc::clone(object));
                    thread.reschedule(ThreadSchedState::RUNNING);
                }
            }
        }
        critical_section.leave();
    }
}

// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Guest thread state as seen by the synchronization core.
//!
//! A guest thread is bound one-to-one to a host thread. The fields below
//! are mutated under the critical section; the wake gate is the only piece
//! other host threads touch directly, and it is signaled, never waited,
//! while the lock is held.

use std::cell::RefCell;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use bitflags::bitflags;
use parking_lot::Mutex;

use aurora_timing::WakeEvent;

use crate::context::KernelContext;
use crate::sync::time_manager::FutureScheduledObject;
use crate::sync::KSynchronizationObject;
use crate::types::{KResult, KernelError};

bitflags! {
    /// Scheduling-state word; the low nibble holds the run state.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ThreadSchedState: u8 {
        /// Mask of the run-state bits.
        const LOW_MASK = 0x0f;
        /// Mask of the modifier bits.
        const HIGH_MASK = 0xf0;
    }
}

impl ThreadSchedState {
    /// Not yet started.
    pub const NONE: Self = Self::empty();
    /// Descheduled; the host thread parks at the next gate.
    pub const PAUSED: Self = Self::from_bits_retain(1);
    /// Selected to run.
    pub const RUNNING: Self = Self::from_bits_retain(2);
    /// Terminating; treated as not selectable.
    pub const TERMINATION_PENDING: Self = Self::from_bits_retain(3);

    /// Run-state bits of the word.
    pub fn low(self) -> Self {
        self.intersection(Self::LOW_MASK)
    }
}

struct WaitState {
    sched: ThreadSchedState,
    waiting_sync: bool,
    sync_cancelled: bool,
    signaled_obj: Option<Arc<dyn KSynchronizationObject>>,
    obj_sync_result: KResult,
}

/// One guest thread.
pub struct KThread {
    me: Weak<KThread>,
    context: Arc<KernelContext>,
    core: u32,
    schedulable: bool,
    termination_requested: AtomicBool,
    host_running: AtomicBool,
    wake_event: WakeEvent,
    state: Mutex<WaitState>,
}

thread_local! {
    static CURRENT_THREAD: RefCell<Option<Arc<KThread>>> = const { RefCell::new(None) };
}

/// Guest thread bound to the calling host thread, if any.
pub fn current_thread() -> Option<Arc<KThread>> {
    CURRENT_THREAD.with(|slot| slot.borrow().clone())
}

fn set_current_thread(thread: Option<Arc<KThread>>) {
    CURRENT_THREAD.with(|slot| *slot.borrow_mut() = thread);
}

impl KThread {
    /// Creates a thread in the Running state on simulated core `core`.
    /// Threads created for HLE service loops pass `schedulable = false`.
    pub fn new(context: Arc<KernelContext>, core: u32, schedulable: bool) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            context,
            core,
            schedulable,
            termination_requested: AtomicBool::new(false),
            host_running: AtomicBool::new(false),
            wake_event: WakeEvent::new(true),
            state: Mutex::new(WaitState {
                sched: ThreadSchedState::RUNNING,
                waiting_sync: false,
                sync_cancelled: false,
                signaled_obj: None,
                obj_sync_result: Ok(()),
            }),
        })
    }

    /// Spawns a host thread bound to this guest thread, runs `body`, then
    /// retires the guest context.
    pub fn start<F>(&self, name: &str, body: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        let thread = self.me.upgrade().expect("thread outlives its start");
        std::thread::Builder::new().name(name.to_owned()).spawn(move || {
            thread.host_running.store(true, Ordering::Release);
            set_current_thread(Some(Arc::clone(&thread)));
            body();
            thread.exit();
            set_current_thread(None);
        })
    }

    /// Simulated core this thread runs on.
    pub fn core(&self) -> u32 {
        self.core
    }

    /// Whether the guest scheduler drives this thread.
    pub fn is_schedulable(&self) -> bool {
        self.schedulable
    }

    /// Whether the host thread is still executing guest code.
    pub fn host_context_running(&self) -> bool {
        self.host_running.load(Ordering::Acquire)
    }

    /// Whether termination has been requested.
    pub fn termination_requested(&self) -> bool {
        self.termination_requested.load(Ordering::Acquire)
    }

    /// Scheduling-state word. Caller holds the critical section.
    pub fn sched_state(&self) -> ThreadSchedState {
        self.state.lock().sched
    }

    /// Moves the run state, propagating the change to the scheduler.
    /// Caller holds the critical section.
    pub(crate) fn reschedule(&self, new_state: ThreadSchedState) {
        let changed = {
            let mut state = self.state.lock();
            let old = state.sched;
            state.sched = (old & ThreadSchedState::HIGH_MASK) | new_state.low();
            state.sched != old
        };
        if !changed {
            return;
        }
        if self.schedulable {
            let me = self.me.upgrade().expect("thread outlives its reschedule");
            self.context.scheduler().note_transition(&me);
        } else {
            self.apply_wake_state();
        }
    }

    /// Opens or closes the wake gate to match the current run state. The
    /// state lock is held across the flip so a concurrent transition can
    /// never interleave a stale gate value over a fresh one.
    pub(crate) fn apply_wake_state(&self) {
        let state = self.state.lock();
        if state.sched.low() == ThreadSchedState::RUNNING {
            self.wake_event.signal();
        } else {
            self.wake_event.reset();
        }
    }

    /// Parks the calling host thread until this thread is selected.
    pub(crate) fn wait_until_selected(&self) {
        self.wake_event.wait();
    }

    // Wait-path bookkeeping, all called under the critical section.

    pub(crate) fn begin_sync_wait(&self) {
        let mut state = self.state.lock();
        state.waiting_sync = true;
        state.signaled_obj = None;
        state.obj_sync_result = Err(KernelError::TimedOut);
    }

    pub(crate) fn end_sync_wait(&self) {
        self.state.lock().waiting_sync = false;
    }

    pub(crate) fn take_sync_cancelled(&self) -> bool {
        let mut state = self.state.lock();
        let cancelled = state.sync_cancelled;
        state.sync_cancelled = false;
        cancelled
    }

    pub(crate) fn obj_sync_result(&self) -> KResult {
        self.state.lock().obj_sync_result
    }

    pub(crate) fn take_signaled_obj(&self) -> Option<Arc<dyn KSynchronizationObject>> {
        self.state.lock().signaled_obj.take()
    }

    pub(crate) fn set_signaled(&self, object: Arc<dyn KSynchronizationObject>) {
        let mut state = self.state.lock();
        state.signaled_obj = Some(object);
        state.obj_sync_result = Ok(());
    }

    /// Requests cancellation of the thread's current or next wait.
    ///
    /// A thread parked in a wait resumes with `Cancelled`; otherwise the
    /// flag is left set for the next wait to observe.
    pub fn cancel_synchronization(&self) {
        let critical_section = self.context.critical_section();
        critical_section.enter();
        let resume = {
            let mut state = self.state.lock();
            if state.sched.low() != ThreadSchedState::PAUSED || !state.waiting_sync {
                state.sync_cancelled = true;
                false
            } else {
                state.signaled_obj = None;
                state.obj_sync_result = Err(KernelError::Cancelled);
                state.sync_cancelled = false;
                true
            }
        };
        if resume {
            self.reschedule(ThreadSchedState::RUNNING);
        }
        critical_section.leave();
    }

    /// Marks the thread as terminating and resumes it out of any wait with
    /// `ThreadTerminating`.
    pub fn request_termination(&self) {
        let critical_section = self.context.critical_section();
        critical_section.enter();
        self.termination_requested.store(true, Ordering::Release);
        let resume = {
            let mut state = self.state.lock();
            if state.sched.low() == ThreadSchedState::PAUSED && state.waiting_sync {
                state.signaled_obj = None;
                state.obj_sync_result = Err(KernelError::ThreadTerminating);
                true
            } else {
                false
            }
        };
        if resume {
            self.reschedule(ThreadSchedState::RUNNING);
        }
        critical_section.leave();
    }

    /// Resumes the thread out of a paused wait, leaving the pending result
    /// in place.
    fn release_and_resume(&self) {
        let critical_section = self.context.critical_section();
        critical_section.enter();
        let paused = self.state.lock().sched.low() == ThreadSchedState::PAUSED;
        if paused {
            self.reschedule(ThreadSchedState::RUNNING);
        }
        critical_section.leave();
    }

    fn exit(&self) {
        let critical_section = self.context.critical_section();
        critical_section.enter();
        self.host_running.store(false, Ordering::Release);
        self.reschedule(ThreadSchedState::TERMINATION_PENDING);
        critical_section.leave();
    }
}

impl FutureScheduledObject for KThread {
    /// Wait deadline fired: resume the waiter. The timed-out result was
    /// installed when the wait began.
    fn time_up(&self) {
        self.release_and_resume();
    }
}

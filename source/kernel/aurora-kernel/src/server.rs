// Copyright 2026 Aurora Contributors
// SPDX-License-Identifier: Apache-2.0

//! Long-lived service loop primitive.
//!
//! A server loop is one host thread, invisible to the guest scheduler,
//! that snapshots its port and session handles, performs a combined
//! reply-and-receive over them, and hands new connections and requests to
//! the attached [`SessionHandler`]. Replies always pair with the handle
//! that delivered the request, and no reply is sent when no request was
//! received. IPC marshalling stays outside the core.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::context::KernelContext;
use crate::sync::KSynchronizationObject;
use crate::thread::KThread;
use crate::types::{Handle, HandleTable, KResult, KernelError};

/// Receive timeout of one loop iteration.
const RECEIVE_TIMEOUT_NS: i64 = 1_000_000;

/// Service-side behavior attached to a [`ServerLoop`].
///
/// Handlers own the signaled state of their objects: accepting a
/// connection or consuming a request must clear the corresponding
/// object's signal, or the loop will observe it again immediately.
pub trait SessionHandler: Send + Sync + 'static {
    /// Accepts the pending connection on `port`, returning the new
    /// session's synchronization object.
    fn accept_session(&self, port: Handle) -> KResult<Arc<dyn KSynchronizationObject>>;

    /// Processes the request pending on `session`. Returning `true` asks
    /// the loop to pair a reply with this same handle.
    fn process_request(&self, session: Handle) -> KResult<bool>;

    /// Sends the reply for the request previously received on `session`.
    fn send_reply(&self, session: Handle) -> KResult<()>;
}

struct HandleSets {
    ports: Vec<Handle>,
    sessions: Vec<Handle>,
}

/// Server loop state shared between the owner and the loop thread.
pub struct ServerLoop<H: SessionHandler> {
    me: Weak<Self>,
    context: Arc<KernelContext>,
    handler: H,
    table: HandleTable,
    handles: Mutex<HandleSets>,
    stop: AtomicBool,
}

impl<H: SessionHandler> ServerLoop<H> {
    /// Creates a loop with no registered handles.
    pub fn new(context: Arc<KernelContext>, handler: H) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            context,
            handler,
            table: HandleTable::new(),
            handles: Mutex::new(HandleSets { ports: Vec::new(), sessions: Vec::new() }),
            stop: AtomicBool::new(false),
        })
    }

    /// Registers a port object whose signal announces new connections.
    pub fn add_port(&self, object: Arc<dyn KSynchronizationObject>) -> Handle {
        let handle = self.table.insert(object);
        self.handles.lock().ports.push(handle);
        handle
    }

    /// Spawns the loop's host thread. The thread is not schedulable by
    /// the guest scheduler.
    pub fn start(&self, name: &str) -> std::io::Result<JoinHandle<()>> {
        let this = self.me.upgrade().expect("server loop outlives its start");
        let thread = KThread::new(Arc::clone(&self.context), 0, false);
        thread.start(name, move || {
            if let Err(err) = this.serve() {
                warn!(target: "server", "server loop stopped: {err}");
            }
        })
    }

    /// Asks the loop to exit; the next receive timeout observes the flag.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    fn serve(&self) -> KResult<()> {
        debug!(target: "server", "server loop running");
        let mut reply_target: Option<Handle> = None;
        while !self.stop.load(Ordering::Acquire) {
            let (handles, port_count) = {
                let sets = self.handles.lock();
                let mut handles = sets.ports.clone();
                handles.extend_from_slice(&sets.sessions);
                (handles, sets.ports.len())
            };

            match self.reply_and_receive(&handles, reply_target.take()) {
                Ok(index) if index < port_count => {
                    // A port fired: accept the session so future requests
                    // on it are seen.
                    match self.handler.accept_session(handles[index]) {
                        Ok(object) => {
                            let session = self.table.insert(object);
                            self.handles.lock().sessions.push(session);
                        }
                        Err(err) => {
                            warn!(target: "server", "accept failed: {err}");
                        }
                    }
                }
                Ok(index) => {
                    let session = handles[index];
                    match self.handler.process_request(session) {
                        Ok(true) => reply_target = Some(session),
                        Ok(false) => {}
                        Err(err) => {
                            warn!(target: "server", "request failed: {err}");
                            self.remove_session(session);
                        }
                    }
                }
                Err(KernelError::TimedOut) => {}
                Err(err) => return Err(err),
            }
        }
        debug!(target: "server", "server loop exiting");
        Ok(())
    }

    /// Sends the pending reply, then blocks on the handle set.
    fn reply_and_receive(
        &self,
        handles: &[Handle],
        reply_target: Option<Handle>,
    ) -> KResult<usize> {
        if let Some(target) = reply_target {
            self.handler.send_reply(target)?;
        }
        let objects: Vec<Arc<dyn KSynchronizationObject>> = handles
            .iter()
            .map(|handle| self.table.get(*handle).ok_or(KernelError::InvalidArgument))
            .collect::<KResult<_>>()?;
        self.context.synchronization().wait_for(&objects, RECEIVE_TIMEOUT_NS)
    }

    fn remove_session(&self, session: Handle) {
        self.handles.lock().sessions.retain(|handle| *handle != session);
        let _ = self.table.remove(session);
    }
}

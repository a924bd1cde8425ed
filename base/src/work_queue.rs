// Copyright 2026 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Single-item background work queue.

use std::io;
use std::panic;
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use sync::Condvar;
use sync::Mutex;

#[derive(Default)]
struct WorkState {
    queued: bool,
    running: bool,
    stop: bool,
}

struct Shared {
    state: Mutex<WorkState>,
    cond: Condvar,
}

/// A dedicated thread running one bound work function on request.
///
/// At most one invocation is pending at any time: queueing while an invocation is already pending
/// does nothing. An invocation that is already running does not count as pending, so it can be
/// queued again from inside the work function or from another thread.
pub struct WorkQueue {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl WorkQueue {
    /// Starts a worker thread named `thread_name` that runs `work` once per [`queue()`] call.
    ///
    /// [`queue()`]: Self::queue
    pub fn start<F>(thread_name: impl Into<String>, work: F) -> io::Result<WorkQueue>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(WorkState::default()),
            cond: Condvar::new(),
        });
        let thread_shared = shared.clone();

        let worker = thread::Builder::new()
            .name(thread_name.into())
            .spawn(move || run_worker(&thread_shared, work))?;

        Ok(WorkQueue {
            shared,
            worker: Some(worker),
        })
    }

    /// Queues one invocation of the work function.
    ///
    /// Returns `false` if an invocation was already pending.
    pub fn queue(&self) -> bool {
        let mut state = self.shared.state.lock();
        if state.queued || state.stop {
            return false;
        }
        state.queued = true;
        self.shared.cond.notify_all();
        true
    }

    /// Drops a pending invocation and waits for a running one to return.
    ///
    /// Only sleeps when the work function is executing at the time of the call. Must not be called
    /// from the work function itself. Returns whether a pending invocation was dropped.
    pub fn cancel_sync(&self) -> bool {
        let mut state = self.shared.state.lock();
        let canceled = std::mem::replace(&mut state.queued, false);
        let _state = self.shared.cond.wait_while(state, |s| s.running);
        canceled
    }

    /// Waits until nothing is pending or running.
    pub fn flush(&self) {
        let _state = self
            .shared
            .cond
            .wait_while(self.shared.state.lock(), |s| s.running || (s.queued && !s.stop));
    }

    /// Whether an invocation is pending or running.
    pub fn is_busy(&self) -> bool {
        let state = self.shared.state.lock();
        state.queued || state.running
    }

    /// Stops the worker thread after the current invocation, discarding any pending one.
    pub fn stop(mut self) {
        self.stop_internal();
    }

    // `stop_internal` takes a reference so it can be called from `drop`.
    fn stop_internal(&mut self) {
        if let Some(worker) = self.worker.take() {
            {
                let mut state = self.shared.state.lock();
                state.stop = true;
                state.queued = false;
            }
            self.shared.cond.notify_all();

            if let Err(e) = worker.join() {
                panic::resume_unwind(e);
            }
        }
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.stop_internal();
    }
}

// Clears `running` even when the work function unwinds so waiters in `cancel_sync` wake up.
struct RunningGuard<'a>(&'a Shared);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.state.lock().running = false;
        self.0.cond.notify_all();
    }
}

fn run_worker<F: FnMut()>(shared: &Shared, mut work: F) {
    loop {
        {
            let mut state = shared
                .cond
                .wait_while(shared.state.lock(), |s| !s.queued && !s.stop);
            if state.stop {
                return;
            }
            state.queued = false;
            state.running = true;
        }

        let _running = RunningGuard(shared);
        work();
    }
}

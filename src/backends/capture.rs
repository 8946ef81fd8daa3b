// SPDX-License-Identifier: GPL-3.0-only

//! Capture-thread lifecycle
//!
//! Every open sensor owns one capture loop that polls its vendor driver and
//! publishes frames into the mailboxes. Shutdown order is mandatory: the
//! loop is signalled to stop and joined before any buffer it might still be
//! writing into is released; [`CaptureLoop::stop_and_join`] enforces that
//! and `Drop` falls back to it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Action returned by one capture iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Keep polling the driver
    Continue,
    /// End the loop (driver disconnected or stream ended)
    Stop,
}

/// Handle to a running capture thread
pub struct CaptureLoop {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    name: &'static str,
}

impl CaptureLoop {
    /// Spawn the capture thread; `iterate` is called until it returns
    /// [`LoopAction::Stop`] or the loop is stopped from outside.
    ///
    /// A spawn failure is a resource-exhaustion condition the caller must
    /// surface; there is no degraded threadless mode.
    pub fn spawn<F>(name: &'static str, mut iterate: F) -> std::io::Result<Self>
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        debug!(name, "Starting capture loop");
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::SeqCst) {
                    if iterate() == LoopAction::Stop {
                        debug!(name, "Capture loop ended by driver");
                        break;
                    }
                }
                debug!(name, "Capture loop thread exiting");
            })?;

        Ok(Self {
            handle: Some(handle),
            stop,
            name,
        })
    }

    /// Whether the thread is still alive
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop to stop and wait for the thread to finish
    ///
    /// Must complete before the frame buffers the loop writes into are
    /// released.
    pub fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(name = self.name, "Capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop_and_join();
        }
    }
}

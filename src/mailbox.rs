// SPDX-License-Identifier: GPL-3.0-only

//! Single-slot mailbox between a capture thread and its consumer
//!
//! The producer overwrites the slot with the newest frame; the consumer
//! attempts a non-blocking take each cycle and keeps its previously uploaded
//! buffer when nothing new is there. Latest-wins, drop-the-rest: after
//! writes A then B with no read in between, a read observes exactly B or
//! nothing new. It can never observe A or a torn mixture.
//!
//! The slot content is only ever replaced whole under the mutex, so a
//! half-written frame can never become visible.

use std::sync::{Arc, Mutex};

/// Error returned by [`FrameReceiver::try_recv`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// No new frame is ready (or the producer holds the slot right now);
    /// keep using the previous buffer
    Empty,
    /// The producer side was dropped; no frame will ever arrive again
    Disconnected,
}

struct Slot<T> {
    value: Option<T>,
    disconnected: bool,
}

/// Producer half of a single-slot mailbox, owned by the capture thread
pub struct FrameSender<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

/// Consumer half of a single-slot mailbox
pub struct FrameReceiver<T> {
    slot: Arc<Mutex<Slot<T>>>,
}

/// Create a connected sender/receiver pair with an empty slot
pub fn mailbox<T>() -> (FrameSender<T>, FrameReceiver<T>) {
    let slot = Arc::new(Mutex::new(Slot {
        value: None,
        disconnected: false,
    }));
    (
        FrameSender {
            slot: Arc::clone(&slot),
        },
        FrameReceiver { slot },
    )
}

impl<T> FrameSender<T> {
    /// Publish a frame, replacing any unconsumed predecessor
    ///
    /// Blocks only for the duration of the consumer's take, which never
    /// includes frame processing.
    pub fn send(&self, value: T) {
        let mut slot = match self.slot.lock() {
            Ok(slot) => slot,
            // A poisoned slot means the consumer died mid-take; the frame
            // content is still replaced whole, so publishing stays safe.
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.value = Some(value);
    }
}

impl<T> Drop for FrameSender<T> {
    fn drop(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.disconnected = true;
        }
    }
}

impl<T> FrameReceiver<T> {
    /// Take the newest frame if one is ready, without ever blocking
    ///
    /// `Err(Empty)` also covers the producer momentarily holding the slot;
    /// both cases mean "reuse the previous buffer this cycle".
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        let mut slot = match self.slot.try_lock() {
            Ok(slot) => slot,
            Err(_) => return Err(TryRecvError::Empty),
        };
        match slot.value.take() {
            Some(value) => Ok(value),
            None if slot.disconnected => Err(TryRecvError::Disconnected),
            None => Err(TryRecvError::Empty),
        }
    }
}

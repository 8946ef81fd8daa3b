// SPDX-License-Identifier: GPL-3.0-only

//! Error types for sensor backends and the reconstruction pipeline

use std::fmt;

/// Result type alias for sensor operations
pub type SensorResult<T> = Result<T, SensorError>;

/// Errors surfaced by sensor backends
///
/// Construction and `open()` failures are reported exactly once and leave the
/// instance permanently closed. Per-frame conditions (a driver producing
/// nothing within its expected window, consumer-side lock contention) are
/// absorbed by reusing the previously delivered buffers and never reach the
/// caller as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// No hardware found, or the requested instance count exceeds the number
    /// of connected devices. Non-recoverable for this instance.
    DeviceUnavailable(String),
    /// The driver rejected the requested resolution/mode/frame rate.
    /// Non-recoverable for this instance.
    StreamNegotiation(String),
    /// No hardware frame has arrived yet. Returned by accessors until the
    /// first frame lands; after that they silently reuse the previous buffer
    /// instead.
    FrameTimeout,
    /// Host buffer allocation failed. Fatal, propagated to the caller.
    Allocation(String),
    /// The instance is closed (never opened, failed to open, or shut down).
    /// Every accessor is guarded by this so a closed sensor can never
    /// silently appear open.
    NotOpen,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::DeviceUnavailable(msg) => write!(f, "Device unavailable: {}", msg),
            SensorError::StreamNegotiation(msg) => {
                write!(f, "Stream negotiation failed: {}", msg)
            }
            SensorError::FrameTimeout => write!(f, "No new frame within the expected window"),
            SensorError::Allocation(msg) => write!(f, "Buffer allocation failed: {}", msg),
            SensorError::NotOpen => write!(f, "Sensor is not open"),
        }
    }
}

impl std::error::Error for SensorError {}

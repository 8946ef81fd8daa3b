// SPDX-License-Identifier: GPL-3.0-only

//! RGB-D sensor streaming and reconstruction
//!
//! Depth sensors from several vendor families are exposed behind one
//! [`SensorBackend`] surface: a capture thread per sensor feeds latest-wins
//! mailboxes, and the consumer side turns raw depth into metric depth
//! images, 3-D point clouds, depth-to-color texture coordinates and
//! per-point normals, recomputing each only when a fresh frame arrived.
//! Shared scratch and mesh index templates live in a [`SensorContext`]
//! passed to every sensor instance.

pub mod backends;
pub mod calib;
pub mod constants;
pub mod context;
pub mod crossmap;
pub mod errors;
pub mod filter;
pub mod frame;
pub mod mailbox;
pub mod normals;
pub mod reconstruct;

pub use backends::driver::{CaptureDriver, StreamMode, StreamProfile};
pub use backends::SensorBackend;
pub use calib::{Attitude, CameraIntrinsics, Extrinsics};
pub use context::SensorContext;
pub use errors::{SensorError, SensorResult};
pub use filter::BilateralWeights;
pub use frame::{ColorFrame, DepthFrame, DepthImage, NormalBuffer, PointCloud, UvMap};

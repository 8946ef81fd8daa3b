// SPDX-License-Identifier: GPL-3.0-only

//! Session constants shared across the reconstruction pipeline

/// Maximum depth sentinel in meters.
///
/// Unmeasurable depth samples (zero or saturated) are reconstructed at this
/// distance along their undistorted ray instead of collapsing to the origin.
pub const MAX_DEPTH_M: f32 = 10.0;

/// Bilateral filter kernel size (odd, center-peaked)
pub const FILTER_SIZE: usize = 5;

/// Kernel center offset for [`FILTER_SIZE`]-tap kernels
pub const FILTER_OFFSET: f32 = (FILTER_SIZE / 2) as f32;

/// Default spatial variance for both 1-D bilateral kernels
pub const DEFAULT_SPATIAL_VARIANCE: f32 = 1.0;

/// Default value-domain (range) variance in meters squared
pub const DEFAULT_VALUE_VARIANCE: f32 = 0.01;

/// Millimeters to meters, the common raw-unit scale of the supported sensors
pub const MM_TO_M: f32 = 0.001;

/// Raw depth value above which time-of-flight samples are saturated
pub const TOF_SATURATION_RAW: u16 = 32000;

/// Idle sleep in microseconds between capture-loop polls when the driver has
/// nothing new
pub const CAPTURE_IDLE_SLEEP_US: u64 = 100;

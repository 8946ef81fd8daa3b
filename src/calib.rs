// SPDX-License-Identifier: GPL-3.0-only

//! Camera calibration: intrinsics, extrinsics and the sensor attitude
//!
//! Calibration values are retrieved once at device open and are immutable for
//! the life of the sensor instance. All of them serialize, so a calibration
//! set can be stored as JSON and replayed.

use nalgebra::{Isometry3, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Pinhole camera intrinsics with radial distortion
///
/// One instance per physical camera (depth, color). Focal length and
/// principal point are in pixels at the session resolution; `k1..k3` are the
/// radial distortion coefficients of the polynomial
/// `q = 1 + r*(k1 + r*(k2 + r*k3))` with `r = x² + y²` in normalized screen
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Sensor width in pixels
    pub width: u32,
    /// Sensor height in pixels
    pub height: u32,
    /// Focal length X (pixels)
    pub fx: f32,
    /// Focal length Y (pixels)
    pub fy: f32,
    /// Principal point X (pixels)
    pub cx: f32,
    /// Principal point Y (pixels)
    pub cy: f32,
    /// Radial distortion coefficient, 1st order
    pub k1: f32,
    /// Radial distortion coefficient, 2nd order
    pub k2: f32,
    /// Radial distortion coefficient, 3rd order
    pub k3: f32,
}

impl CameraIntrinsics {
    /// Distortion-free intrinsics with the principal point at the image
    /// center, the usual nominal model for sensors that do not report
    /// calibration at runtime.
    pub fn nominal(width: u32, height: u32, fx: f32, fy: f32) -> Self {
        Self {
            width,
            height,
            fx,
            fy,
            cx: width as f32 / 2.0,
            cy: height as f32 / 2.0,
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
        }
    }

    /// Radial distortion factor `q` for normalized screen coordinates
    pub fn distortion_factor(&self, x: f32, y: f32) -> f32 {
        let r = x * x + y * y;
        1.0 + r * (self.k1 + r * (self.k2 + r * self.k3))
    }

    /// Number of pixels in one frame from this camera
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Rigid transform mapping depth-camera space to color-camera space
///
/// Immutable for the session. `p_color = rotation * p_depth + translation`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extrinsics {
    /// 3x3 rotation, depth frame to color frame
    pub rotation: Matrix3<f32>,
    /// Translation in meters, depth frame to color frame
    pub translation: Vector3<f32>,
}

impl Extrinsics {
    /// Identity rotation with a pure baseline translation, the common case
    /// for rigidly mounted stereo pairs.
    pub fn baseline(translation: Vector3<f32>) -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation,
        }
    }

    /// Express a depth-camera-space point in color-camera space
    pub fn transform(&self, p: [f32; 3]) -> [f32; 3] {
        let v = self.rotation * Vector3::new(p[0], p[1], p[2]) + self.translation;
        [v.x, v.y, v.z]
    }
}

impl Default for Extrinsics {
    fn default() -> Self {
        Self::baseline(Vector3::zeros())
    }
}

/// Externally settable rigid pose of a sensor
///
/// Carried by every sensor instance but never interpreted by the pipeline;
/// the renderer consumes it to compose multiple sensors into one scene.
pub type Attitude = Isometry3<f32>;

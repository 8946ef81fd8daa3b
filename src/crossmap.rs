// SPDX-License-Identifier: GPL-3.0-only

//! Cross-camera UV mapping
//!
//! Maps each reconstructed depth-camera point into the paired color camera
//! and stores the matching texture coordinate. Recomputed every consume
//! cycle alongside the point cloud because it depends on the live depth.

use crate::calib::{CameraIntrinsics, Extrinsics};
use crate::frame::{PointCloud, UvMap};

/// Normalized color texture coordinate for one depth-camera-space point
///
/// `p` is expressed in color-camera space via the extrinsics, forward
/// projected with the color camera's own radial model, and normalized to
/// [0, 1] texture space with v measured from the top of the image. The y
/// axis points toward the image bottom, same as the reconstruction side, so
/// identity extrinsics with matching intrinsics point every coordinate back
/// at its source pixel.
#[inline]
pub fn map_point(p: [f32; 3], extr: &Extrinsics, color: &CameraIntrinsics) -> [f32; 2] {
    let pc = extr.transform(p);
    let z = pc[2].abs().max(f32::EPSILON);
    let x = pc[0] / z;
    let y = pc[1] / z;
    let q = color.distortion_factor(x, y);
    let px = color.cx + (x / q) * color.fx;
    let py = color.cy + (y / q) * color.fy;
    [px / color.width as f32, py / color.height as f32]
}

/// Fill the UV map for a whole point cloud
pub fn map_cloud(cloud: &PointCloud, extr: &Extrinsics, color: &CameraIntrinsics, out: &mut UvMap) {
    debug_assert_eq!(cloud.as_slice().len(), out.as_slice().len());
    for (uv, &p) in out.as_mut_slice().iter_mut().zip(cloud.as_slice()) {
        *uv = map_point(p, extr, color);
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Depth sample to camera-space point conversion
//!
//! Free functions over plain calibration data; every vendor backend composes
//! these instead of inheriting shared state. Internal convention: depth in
//! meters, camera looks down -z, so a stored point has `z = -depth`.

use crate::calib::CameraIntrinsics;
use crate::constants::MAX_DEPTH_M;
use crate::frame::{DepthImage, PointCloud};

/// Convert one raw depth sample to meters, substituting the far sentinel for
/// unmeasurable pixels
///
/// A sample of zero or at/above the vendor saturation threshold lands at
/// [`MAX_DEPTH_M`] so the pixel stays on its undistorted ray instead of
/// collapsing to the origin.
#[inline]
pub fn metric_depth(raw: u16, unit_m: f32, saturation: u16) -> f32 {
    if raw == 0 || raw >= saturation {
        MAX_DEPTH_M
    } else {
        f32::from(raw) * unit_m
    }
}

/// Convert a raw depth frame into the metric staging plane
pub fn convert_raw_depth(raw: &[u16], unit_m: f32, saturation: u16, out: &mut DepthImage) {
    debug_assert_eq!(raw.len(), out.as_slice().len());
    for (dst, &d) in out.as_mut_slice().iter_mut().zip(raw) {
        *dst = metric_depth(d, unit_m, saturation);
    }
}

/// Undistorted normalized screen coordinates for pixel (u, v)
///
/// Screen coordinates use the +0.5 pixel-center offset; the radial
/// polynomial divides them back onto the undistorted ray.
#[inline]
pub fn undistorted_ray(intr: &CameraIntrinsics, u: u32, v: u32) -> (f32, f32) {
    let dx = (u as f32 - intr.cx + 0.5) / intr.fx;
    let dy = (v as f32 - intr.cy + 0.5) / intr.fy;
    let q = intr.distortion_factor(dx, dy);
    (dx / q, dy / q)
}

/// Camera-space point for pixel (u, v) at metric depth `z_m` (positive meters)
#[inline]
pub fn reconstruct_point(intr: &CameraIntrinsics, u: u32, v: u32, z_m: f32) -> [f32; 3] {
    let (x, y) = undistorted_ray(intr, u, v);
    [x * z_m, y * z_m, -z_m]
}

/// Project a camera-space point back to pixel coordinates
///
/// Exact inverse of [`reconstruct_point`] for zero distortion; with radial
/// coefficients it applies the same polynomial on the normalized
/// coordinates, as the vendor reference projections do.
#[inline]
pub fn project(intr: &CameraIntrinsics, p: [f32; 3]) -> [f32; 2] {
    let z = p[2].abs().max(f32::EPSILON);
    let x = p[0] / z;
    let y = p[1] / z;
    let q = intr.distortion_factor(x, y);
    [
        (x / q) * intr.fx + intr.cx - 0.5,
        (y / q) * intr.fy + intr.cy - 0.5,
    ]
}

/// Reconstruct the whole metric depth plane into a point cloud
pub fn reconstruct_cloud(depth: &DepthImage, intr: &CameraIntrinsics, out: &mut PointCloud) {
    let width = depth.width();
    let height = depth.height();
    debug_assert_eq!(out.width(), width);
    debug_assert_eq!(out.height(), height);

    let depths = depth.as_slice();
    let points = out.as_mut_slice();
    for v in 0..height {
        for u in 0..width {
            let i = (v * width + u) as usize;
            points[i] = reconstruct_point(intr, u, v, depths[i]);
        }
    }
}

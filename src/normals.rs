// SPDX-License-Identifier: GPL-3.0-only

//! Per-pixel surface normal estimation
//!
//! Forward-difference tangent vectors toward +u and +v, cross-multiplied
//! and normalized. The last column and row fall back to the backward
//! difference; a pixel whose own point or whose used tangent neighbor sits
//! at sentinel depth emits the zero vector, which the renderer ignores
//! (w is always 0).

use crate::constants::MAX_DEPTH_M;
use crate::frame::{NormalBuffer, PointCloud};

/// Depth magnitude at or beyond this is treated as the far sentinel.
/// Slightly under the sentinel itself to tolerate smoothing residue.
const SENTINEL_CUTOFF: f32 = MAX_DEPTH_M * 0.999;

#[inline]
fn is_sentinel(p: [f32; 3]) -> bool {
    p[2].abs() >= SENTINEL_CUTOFF
}

#[inline]
fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// Estimate normals for the whole point cloud
pub fn estimate_normals(cloud: &PointCloud, out: &mut NormalBuffer) {
    let width = cloud.width();
    let height = cloud.height();
    debug_assert_eq!(out.width(), width);
    debug_assert_eq!(out.height(), height);

    let normals = out.as_mut_slice();
    // A 1-pixel-wide or -tall cloud has no tangent pair anywhere.
    if width < 2 || height < 2 {
        normals.fill([0.0; 4]);
        return;
    }
    for v in 0..height {
        for u in 0..width {
            normals[(v * width + u) as usize] = normal_at(cloud, u, v);
        }
    }
}

fn normal_at(cloud: &PointCloud, u: u32, v: u32) -> [f32; 4] {
    let width = cloud.width();
    let height = cloud.height();

    let center = cloud.at(u, v);
    if is_sentinel(center) {
        return [0.0; 4];
    }

    // Forward differences toward +u/+v; the last column and row fall back
    // to the backward difference so every pixel still gets a tangent pair.
    let (tangent_u, u_neighbor) = if u + 1 < width {
        (sub(cloud.at(u + 1, v), center), cloud.at(u + 1, v))
    } else {
        (sub(center, cloud.at(u - 1, v)), cloud.at(u - 1, v))
    };
    let (tangent_v, v_neighbor) = if v + 1 < height {
        (sub(cloud.at(u, v + 1), center), cloud.at(u, v + 1))
    } else {
        (sub(center, cloud.at(u, v - 1)), cloud.at(u, v - 1))
    };
    if is_sentinel(u_neighbor) || is_sentinel(v_neighbor) {
        return [0.0; 4];
    }

    let n = cross(tangent_u, tangent_v);
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    if len <= f32::EPSILON {
        return [0.0; 4];
    }
    [n[0] / len, n[1] / len, n[2] / len, 0.0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calib::CameraIntrinsics;
    use crate::frame::DepthImage;
    use crate::reconstruct::reconstruct_cloud;
    use approx::assert_relative_eq;

    fn flat_cloud(depth_m: f32) -> PointCloud {
        let intr = CameraIntrinsics::nominal(16, 12, 20.0, 20.0);
        let mut depth = DepthImage::new(16, 12);
        depth.as_mut_slice().fill(depth_m);
        let mut cloud = PointCloud::new(16, 12);
        reconstruct_cloud(&depth, &intr, &mut cloud);
        cloud
    }

    #[test]
    fn flat_plane_faces_the_camera() {
        let cloud = flat_cloud(1.5);
        let mut normals = NormalBuffer::new(16, 12);
        estimate_normals(&cloud, &mut normals);
        let n = normals.at(8, 6);
        assert!(n[0].abs() < 0.05);
        assert!(n[1].abs() < 0.05);
        assert_relative_eq!(n[2].abs(), 1.0, epsilon = 0.01);
        assert_relative_eq!(n[3], 0.0);
    }

    #[test]
    fn border_pixels_still_get_normals() {
        let cloud = flat_cloud(2.0);
        let mut normals = NormalBuffer::new(16, 12);
        estimate_normals(&cloud, &mut normals);
        for (u, v) in [(0, 0), (15, 0), (0, 11), (15, 11)] {
            let n = normals.at(u, v);
            assert_relative_eq!(n[2].abs(), 1.0, epsilon = 0.05);
        }
    }

    #[test]
    fn only_the_forward_tangent_neighbors_gate_a_pixel() {
        let mut cloud = flat_cloud(1.5);
        // Knock one point out to the sentinel plane.
        cloud.as_mut_slice()[6 * 16 + 3] = [0.0, 0.0, -MAX_DEPTH_M];
        let mut normals = NormalBuffer::new(16, 12);
        estimate_normals(&cloud, &mut normals);
        // The pixel to its left uses it as the +u neighbor and drops out.
        assert_eq!(normals.at(2, 6), [0.0; 4]);
        // The pixel to its right only looks toward +u/+v and keeps a normal.
        let n = normals.at(4, 6);
        assert_relative_eq!(n[2].abs(), 1.0, epsilon = 0.01);
        // The knocked-out pixel itself has no normal.
        assert_eq!(normals.at(3, 6), [0.0; 4]);
    }

    #[test]
    fn sentinel_neighbors_yield_zero_vector() {
        let cloud = flat_cloud(MAX_DEPTH_M);
        let mut normals = NormalBuffer::new(16, 12);
        estimate_normals(&cloud, &mut normals);
        assert_eq!(normals.at(8, 6), [0.0; 4]);
    }
}

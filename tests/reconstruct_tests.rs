// SPDX-License-Identifier: GPL-3.0-only

//! End-to-end reconstruction pipeline: raw samples to metric depth, points,
//! texture coordinates and normals.

use approx::assert_relative_eq;
use nalgebra::Vector3;

use rgbd_stream::constants::{MAX_DEPTH_M, MM_TO_M};
use rgbd_stream::frame::{DepthImage, NormalBuffer, PointCloud, UvMap};
use rgbd_stream::{crossmap, normals, reconstruct};
use rgbd_stream::{CameraIntrinsics, Extrinsics};

const W: u32 = 320;
const H: u32 = 240;
const FX: f32 = 286.2;

fn intrinsics() -> CameraIntrinsics {
    CameraIntrinsics::nominal(W, H, FX, FX)
}

/// Raw millimeter plane at constant depth with a hole of invalid samples
fn raw_plane(depth_mm: u16) -> Vec<u16> {
    let mut raw = vec![depth_mm; (W * H) as usize];
    raw[0] = 0;
    raw[1] = 0;
    raw
}

#[test]
fn raw_plane_reconstructs_to_metric_points() {
    let intr = intrinsics();
    let raw = raw_plane(1000);
    let mut depth = DepthImage::new(W, H);
    reconstruct::convert_raw_depth(&raw, MM_TO_M, u16::MAX, &mut depth);
    let mut cloud = PointCloud::new(W, H);
    reconstruct::reconstruct_cloud(&depth, &intr, &mut cloud);

    // The center pixel's ray is almost the optical axis.
    let p = cloud.at(W / 2, H / 2);
    assert!(p[0].abs() < 0.01);
    assert!(p[1].abs() < 0.01);
    assert_relative_eq!(p[2], -1.0, epsilon = 1e-6);

    // Invalid raw samples land on the far sentinel plane.
    assert_relative_eq!(cloud.at(0, 0)[2], -MAX_DEPTH_M, epsilon = 1e-3);

    // All points on the plane share the same depth.
    let corner = cloud.at(W - 1, H - 1);
    assert_relative_eq!(corner[2], -1.0, epsilon = 1e-6);
    // The corner ray leans away from the axis, so x and y are nonzero.
    assert!(corner[0].abs() > 0.1);
}

#[test]
fn projection_inverts_reconstruction() {
    let intr = intrinsics();
    for &(u, v) in &[(0u32, 0u32), (W / 2, H / 2), (W - 1, H - 1), (17, 203)] {
        let p = reconstruct::reconstruct_point(&intr, u, v, 2.5);
        let px = reconstruct::project(&intr, p);
        assert_relative_eq!(px[0], u as f32, epsilon = 1e-3);
        assert_relative_eq!(px[1], v as f32, epsilon = 1e-3);
    }
}

#[test]
fn cross_mapping_shows_parallax_along_the_baseline() {
    let color = intrinsics();
    let extr = Extrinsics::baseline(Vector3::new(0.05, 0.0, 0.0));

    let near = crossmap::map_point([0.0, 0.0, -1.0], &extr, &color);
    let far = crossmap::map_point([0.0, 0.0, -4.0], &extr, &color);
    let centered = crossmap::map_point([0.0, 0.0, -1.0], &Extrinsics::default(), &color);

    // Identity extrinsics map the axis point to the image center.
    assert_relative_eq!(centered[0] * W as f32, W as f32 / 2.0, epsilon = 0.51);

    // A 5 cm baseline shifts the near point by about fx * 0.05 pixels.
    let offset_px = (near[0] - centered[0]) * W as f32;
    assert_relative_eq!(offset_px, FX * 0.05, epsilon = 0.1);

    // Parallax shrinks with distance.
    let far_offset_px = (far[0] - centered[0]) * W as f32;
    assert!(far_offset_px < offset_px);
    assert!(far_offset_px > 0.0);
}

#[test]
fn uv_map_of_a_plane_stays_inside_the_image() {
    let intr = intrinsics();
    let raw = raw_plane(1500);
    let mut depth = DepthImage::new(W, H);
    reconstruct::convert_raw_depth(&raw, MM_TO_M, u16::MAX, &mut depth);
    let mut cloud = PointCloud::new(W, H);
    reconstruct::reconstruct_cloud(&depth, &intr, &mut cloud);
    let mut uv = UvMap::new(W, H);
    crossmap::map_cloud(&cloud, &Extrinsics::default(), &intr, &mut uv);

    // With identity extrinsics the mapping is the identity up to the +0.5
    // texel center, including well below and above the principal point.
    let center = uv.at(W / 2, H / 2);
    assert_relative_eq!(center[0], 0.5, epsilon = 0.01);
    assert_relative_eq!(center[1], 0.5, epsilon = 0.01);
    for v in (0..H).step_by(40) {
        for u in (0..W).step_by(40) {
            let t = uv.at(u, v);
            assert_relative_eq!(t[0] * W as f32, u as f32 + 0.5, epsilon = 1e-2);
            assert_relative_eq!(t[1] * H as f32, v as f32 + 0.5, epsilon = 1e-2);
        }
    }
}

#[test]
fn normals_of_a_frontal_plane_face_the_camera() {
    let intr = intrinsics();
    let raw = raw_plane(2000);
    let mut depth = DepthImage::new(W, H);
    reconstruct::convert_raw_depth(&raw, MM_TO_M, u16::MAX, &mut depth);
    let mut cloud = PointCloud::new(W, H);
    reconstruct::reconstruct_cloud(&depth, &intr, &mut cloud);
    let mut nb = NormalBuffer::new(W, H);
    normals::estimate_normals(&cloud, &mut nb);

    for v in (1..H - 1).step_by(37) {
        for u in (1..W - 1).step_by(37) {
            // Skip the invalid hole and its neighbors.
            if v <= 1 && u <= 2 {
                continue;
            }
            let n = nb.at(u, v);
            assert!(
                n[2].abs() > 0.999,
                "normal at ({u},{v}) not frontal: {n:?}"
            );
        }
    }
}

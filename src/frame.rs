// SPDX-License-Identifier: GPL-3.0-only

//! Capture frames and per-pixel output buffers
//!
//! [`DepthFrame`] and [`ColorFrame`] are produced by the capture thread, one
//! per hardware callback, and handed through the mailbox. [`PointCloud`],
//! [`UvMap`] and [`NormalBuffer`] are owned by the sensor instance and
//! recomputed each consume cycle; their element counts equal
//! `depth_width * depth_height` for the life of the instance.

use std::time::Instant;

/// One raw depth frame from the capture thread
///
/// Samples are vendor raw units (typically millimeters) after the vendor's
/// bit-level unpacking; zero or saturated values mark unmeasurable pixels.
#[derive(Debug, Clone)]
pub struct DepthFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Raw depth samples, row-major, `width * height` elements
    pub samples: Vec<u16>,
    /// Monotonic frame sequence number
    pub sequence: u64,
    /// Timestamp when the frame was captured
    pub captured_at: Instant,
}

/// One color frame from the capture thread, RGB triplets
#[derive(Debug, Clone)]
pub struct ColorFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// RGB bytes, row-major, `width * height * 3` elements
    pub pixels: Vec<u8>,
    /// Monotonic frame sequence number
    pub sequence: u64,
}

impl ColorFrame {
    /// Allocate a black frame of the given resolution
    pub fn black(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 3],
            sequence: 0,
        }
    }
}

/// Camera-space points, one per depth pixel
#[derive(Debug, Clone)]
pub struct PointCloud {
    width: u32,
    height: u32,
    points: Vec<[f32; 3]>,
}

impl PointCloud {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            points: vec![[0.0; 3]; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Point at pixel (u, v)
    pub fn at(&self, u: u32, v: u32) -> [f32; 3] {
        self.points[(v * self.width + u) as usize]
    }

    pub fn as_slice(&self) -> &[[f32; 3]] {
        &self.points
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [[f32; 3]] {
        &mut self.points
    }

    /// Raw bytes for renderer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.points)
    }
}

/// Normalized color texture coordinates, one per depth pixel
#[derive(Debug, Clone)]
pub struct UvMap {
    width: u32,
    height: u32,
    coords: Vec<[f32; 2]>,
}

impl UvMap {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            coords: vec![[0.0; 2]; width as usize * height as usize],
        }
    }

    /// Texture coordinate for depth pixel (u, v)
    pub fn at(&self, u: u32, v: u32) -> [f32; 2] {
        self.coords[(v * self.width + u) as usize]
    }

    pub fn as_slice(&self) -> &[[f32; 2]] {
        &self.coords
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [[f32; 2]] {
        &mut self.coords
    }

    /// Raw bytes for renderer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.coords)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Per-pixel surface normals, `[x, y, z, 0]` with w unused
///
/// The fourth component keeps renderer-side vec4 alignment; a zero vector
/// marks a pixel without a usable normal (boundary or sentinel neighbor).
#[derive(Debug, Clone)]
pub struct NormalBuffer {
    width: u32,
    height: u32,
    normals: Vec<[f32; 4]>,
}

impl NormalBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            normals: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    /// Normal at pixel (u, v)
    pub fn at(&self, u: u32, v: u32) -> [f32; 4] {
        self.normals[(v * self.width + u) as usize]
    }

    pub fn as_slice(&self) -> &[[f32; 4]] {
        &self.normals
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [[f32; 4]] {
        &mut self.normals
    }

    /// Raw bytes for renderer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

/// Metric depth plane in meters, the staging form the reconstruction and
/// smoothing passes work on
#[derive(Debug, Clone)]
pub struct DepthImage {
    width: u32,
    height: u32,
    depths: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depths: vec![0.0; width as usize * height as usize],
        }
    }

    /// Depth in meters at pixel (u, v)
    pub fn at(&self, u: u32, v: u32) -> f32 {
        self.depths[(v * self.width + u) as usize]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.depths
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.depths
    }

    /// Raw bytes for renderer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.depths)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

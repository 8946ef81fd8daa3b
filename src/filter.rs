// SPDX-License-Identifier: GPL-3.0-only

//! Bilateral depth smoothing
//!
//! A separable edge-preserving filter applied to the metric depth plane
//! before reconstruction: each tap combines a spatial Gaussian weight with a
//! value-domain Gaussian on the depth difference, so noise is suppressed
//! while depth discontinuities (and the far sentinel plane) stay sharp.

use crate::constants::{FILTER_OFFSET, FILTER_SIZE};
use crate::frame::DepthImage;

/// Separable smoothing-kernel table plus value-domain variance
///
/// Replaced wholesale by `set_variance`; never partially mutated while a
/// reconstruction pass might be reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct BilateralWeights {
    /// Spatial weights across columns, center-peaked
    pub column: [f32; FILTER_SIZE],
    /// Spatial weights across rows, center-peaked
    pub row: [f32; FILTER_SIZE],
    /// Variance of the value-domain (range) term, meters squared
    pub value_variance: f32,
}

impl BilateralWeights {
    /// Build both 1-D Gaussian kernels from their variances
    ///
    /// `weight[i] = exp(-0.5 * (i - offset)² / variance)`; non-positive
    /// variances collapse the kernel to its center tap, which disables
    /// smoothing along that axis.
    pub fn new(column_variance: f32, row_variance: f32, value_variance: f32) -> Self {
        Self {
            column: gaussian_kernel(column_variance),
            row: gaussian_kernel(row_variance),
            value_variance: value_variance.max(f32::EPSILON),
        }
    }
}

impl Default for BilateralWeights {
    fn default() -> Self {
        Self::new(
            crate::constants::DEFAULT_SPATIAL_VARIANCE,
            crate::constants::DEFAULT_SPATIAL_VARIANCE,
            crate::constants::DEFAULT_VALUE_VARIANCE,
        )
    }
}

fn gaussian_kernel(variance: f32) -> [f32; FILTER_SIZE] {
    let mut kernel = [0.0; FILTER_SIZE];
    if variance <= 0.0 {
        kernel[FILTER_SIZE / 2] = 1.0;
        return kernel;
    }
    for (i, w) in kernel.iter_mut().enumerate() {
        let d = i as f32 - FILTER_OFFSET;
        *w = (-0.5 * d * d / variance).exp();
    }
    kernel
}

/// Value-domain weight for a depth difference
#[inline]
fn range_weight(delta: f32, value_variance: f32) -> f32 {
    (-0.5 * delta * delta / value_variance).exp()
}

/// Smooth a metric depth plane with the separable bilateral filter
///
/// `scratch` holds the horizontal pass result and is resized to the plane;
/// edge pixels clamp their taps to the image border. `src` and `dst` must
/// share the same resolution.
pub fn smooth_depth(
    src: &DepthImage,
    dst: &mut DepthImage,
    scratch: &mut Vec<f32>,
    weights: &BilateralWeights,
) {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let radius = FILTER_SIZE / 2;
    scratch.clear();
    scratch.resize(width * height, 0.0);

    let input = src.as_slice();

    // Horizontal pass
    for v in 0..height {
        let row = &input[v * width..(v + 1) * width];
        for u in 0..width {
            let center = row[u];
            let mut sum = 0.0;
            let mut norm = 0.0;
            for (tap, &sw) in weights.column.iter().enumerate() {
                let uu = (u + tap).saturating_sub(radius).min(width - 1);
                let sample = row[uu];
                let w = sw * range_weight(sample - center, weights.value_variance);
                sum += w * sample;
                norm += w;
            }
            scratch[v * width + u] = sum / norm;
        }
    }

    // Vertical pass
    let output = dst.as_mut_slice();
    for v in 0..height {
        for u in 0..width {
            let center = scratch[v * width + u];
            let mut sum = 0.0;
            let mut norm = 0.0;
            for (tap, &sw) in weights.row.iter().enumerate() {
                let vv = (v + tap).saturating_sub(radius).min(height - 1);
                let sample = scratch[vv * width + u];
                let w = sw * range_weight(sample - center, weights.value_variance);
                sum += w * sample;
                norm += w;
            }
            output[v * width + u] = sum / norm;
        }
    }
}

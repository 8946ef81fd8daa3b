// SPDX-License-Identifier: GPL-3.0-only

//! Shared heavyweight resources
//!
//! The application builds one [`SensorContext`] and passes it into every
//! sensor instance. It owns the resources that are expensive to build and
//! identical across instances: the smoothing scratch plane and the drawable
//! mesh templates. The context lives as long as any instance holds its
//! `Arc`, so nothing is freed while a sensor still uses it, and there is no
//! mutable global state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Triangle-grid index template the renderer draws a depth mesh with
///
/// Two triangles per pixel quad over a `width` x `height` vertex grid;
/// vertex positions come from the point cloud, so one template serves every
/// sensor at the same resolution.
#[derive(Debug)]
pub struct MeshTemplate {
    width: u32,
    height: u32,
    indices: Vec<u32>,
}

impl MeshTemplate {
    fn build(width: u32, height: u32) -> Self {
        let quads = (width.saturating_sub(1) * height.saturating_sub(1)) as usize;
        let mut indices = Vec::with_capacity(quads * 6);
        for v in 0..height.saturating_sub(1) {
            for u in 0..width.saturating_sub(1) {
                let i = v * width + u;
                indices.extend_from_slice(&[i, i + 1, i + width]);
                indices.extend_from_slice(&[i + 1, i + width + 1, i + width]);
            }
        }
        Self {
            width,
            height,
            indices,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Raw bytes for renderer index-buffer upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Process-wide shared resources, explicitly constructed and `Arc`-shared
pub struct SensorContext {
    scratch: Mutex<Vec<f32>>,
    templates: Mutex<HashMap<(u32, u32), Arc<MeshTemplate>>>,
}

impl SensorContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scratch: Mutex::new(Vec::new()),
            templates: Mutex::new(HashMap::new()),
        })
    }

    /// Mesh template for a resolution, built once and shared afterwards
    pub fn mesh_template(&self, width: u32, height: u32) -> Arc<MeshTemplate> {
        let mut templates = match self.templates.lock() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(templates.entry((width, height)).or_insert_with(|| {
            debug!(width, height, "Building shared mesh template");
            Arc::new(MeshTemplate::build(width, height))
        }))
    }

    /// Run a pass that needs the shared smoothing scratch plane
    pub(crate) fn with_scratch<R>(&self, f: impl FnOnce(&mut Vec<f32>) -> R) -> R {
        let mut scratch = match self.scratch.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut scratch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_template_is_built_once_per_resolution() {
        let ctx = SensorContext::new();
        let a = ctx.mesh_template(320, 240);
        let b = ctx.mesh_template(320, 240);
        assert!(Arc::ptr_eq(&a, &b));
        let c = ctx.mesh_template(640, 480);
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn mesh_template_covers_every_quad() {
        let ctx = SensorContext::new();
        let t = ctx.mesh_template(4, 3);
        // (4-1) * (3-1) quads, two triangles each
        assert_eq!(t.indices().len(), 3 * 2 * 6);
        assert!(t.indices().iter().all(|&i| i < 12));
    }
}

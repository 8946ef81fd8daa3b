// SPDX-License-Identifier: GPL-3.0-only

//! Structured-light sensor backend
//!
//! First-generation structured-light devices pack a body index into the low
//! bits of every raw depth sample and publish no per-device calibration, so
//! this backend shifts the index bits out on the capture thread and builds
//! nominal zero-distortion intrinsics from the documented inverse focal
//! length. Raw zero marks an invalid sample; there is no saturation cutoff.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backends::driver::{CaptureDriver, StreamMode, StreamProfile};
use crate::backends::{DepthConversion, SensorBackend, SensorCore};
use crate::calib::{Attitude, CameraIntrinsics, Extrinsics};
use crate::constants::MM_TO_M;
use crate::context::{MeshTemplate, SensorContext};
use crate::errors::{SensorError, SensorResult};
use crate::frame::{ColorFrame, DepthImage, NormalBuffer, PointCloud, UvMap};

const NAME: &str = "structured-light";

/// Bits of body index packed below the depth value
const PLAYER_INDEX_SHIFT: u8 = 3;

/// Documented nominal inverse focal length, 1/pixels at 320x240
const NOMINAL_INVERSE_FOCAL: f32 = 3.501e-3;

/// Depth modes the hardware supports
const DEPTH_MODES: [(u32, u32, u32); 2] = [(640, 480, 30), (320, 240, 30)];

/// Nominal focal length in pixels for a depth plane of the given width
fn nominal_focal(width: u32) -> f32 {
    (1.0 / NOMINAL_INVERSE_FOCAL) * (width as f32 / 320.0)
}

pub struct StructuredLightSensor {
    context: Arc<SensorContext>,
    driver: Option<Box<dyn CaptureDriver>>,
    core: Option<SensorCore>,
    failed: bool,
    attitude: Attitude,
}

impl StructuredLightSensor {
    pub fn new(context: Arc<SensorContext>, driver: Box<dyn CaptureDriver>) -> Self {
        Self {
            context,
            driver: Some(driver),
            core: None,
            failed: false,
            attitude: Attitude::identity(),
        }
    }

    fn core(&self) -> SensorResult<&SensorCore> {
        self.core.as_ref().ok_or(SensorError::NotOpen)
    }

    fn core_mut(&mut self) -> SensorResult<&mut SensorCore> {
        self.core.as_mut().ok_or(SensorError::NotOpen)
    }
}

/// Discard the driver's placeholder calibration in favor of the documented
/// nominal model; depth and color streams are registered on this hardware
fn adapt_profile(mode: StreamMode) -> impl FnOnce(StreamProfile) -> StreamProfile {
    move |_| {
        let focal = nominal_focal(mode.depth_width);
        StreamProfile {
            depth_intrinsics: CameraIntrinsics::nominal(
                mode.depth_width,
                mode.depth_height,
                focal,
                focal,
            ),
            color_intrinsics: CameraIntrinsics::nominal(
                mode.color_width,
                mode.color_height,
                nominal_focal(mode.color_width),
                nominal_focal(mode.color_width),
            ),
            extrinsics: Extrinsics::default(),
            depth_unit_m: MM_TO_M,
        }
    }
}

impl SensorBackend for StructuredLightSensor {
    fn open(&mut self, mode: &StreamMode) -> SensorResult<()> {
        if self.failed {
            return Err(SensorError::NotOpen);
        }
        if self.core.is_some() {
            return Ok(());
        }
        let Some(driver) = self.driver.take() else {
            return Err(SensorError::NotOpen);
        };
        if !DEPTH_MODES.contains(&(mode.depth_width, mode.depth_height, mode.depth_fps)) {
            self.failed = true;
            return Err(SensorError::StreamNegotiation(format!(
                "unsupported structured-light mode: {mode}"
            )));
        }
        let conversion = DepthConversion {
            raw_shift: PLAYER_INDEX_SHIFT,
            saturation: u16::MAX,
        };
        match SensorCore::open(
            NAME,
            Arc::clone(&self.context),
            driver,
            mode,
            conversion,
            adapt_profile(*mode),
        ) {
            Ok(core) => {
                info!(%mode, "structured-light sensor opened");
                self.core = Some(core);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "structured-light open failed");
                self.failed = true;
                Err(err)
            }
        }
    }

    fn is_open(&self) -> bool {
        self.core.is_some()
    }

    fn depth_resolution(&self) -> SensorResult<(u32, u32)> {
        Ok(self.core()?.depth_resolution())
    }

    fn color_resolution(&self) -> SensorResult<(u32, u32)> {
        Ok(self.core()?.color_resolution())
    }

    fn get_depth(&mut self) -> SensorResult<&DepthImage> {
        self.core_mut()?.get_depth()
    }

    fn get_color(&mut self) -> SensorResult<&ColorFrame> {
        self.core_mut()?.get_color()
    }

    fn get_point(&mut self) -> SensorResult<&PointCloud> {
        self.core_mut()?.get_point()
    }

    fn get_position(&mut self) -> SensorResult<&PointCloud> {
        self.core_mut()?.get_position()
    }

    fn get_normal(&mut self) -> SensorResult<&NormalBuffer> {
        self.core_mut()?.get_normal()
    }

    fn get_uvmap(&self) -> SensorResult<&UvMap> {
        Ok(self.core()?.get_uvmap())
    }

    fn set_variance(&mut self, column: f32, row: f32, value: f32) -> SensorResult<()> {
        self.core_mut()?.set_variance(column, row, value);
        Ok(())
    }

    fn mesh_template(&self) -> SensorResult<Arc<MeshTemplate>> {
        Ok(self.core()?.mesh_template())
    }

    fn frame_sequence(&self) -> SensorResult<u64> {
        Ok(self.core()?.frame_sequence())
    }

    fn attitude(&self) -> Attitude {
        self.attitude
    }

    fn set_attitude(&mut self, attitude: Attitude) {
        self.attitude = attitude;
    }
}

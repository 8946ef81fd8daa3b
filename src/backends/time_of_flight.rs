// SPDX-License-Identifier: GPL-3.0-only

//! Time-of-flight sensor backend
//!
//! Time-of-flight devices publish their factory calibration over the wire
//! once the stream is up, including radial distortion terms and the
//! depth-to-color extrinsics, so this backend takes the negotiated profile
//! as-is. Raw samples are millimeters; values at or above the saturation
//! cutoff mark pixels the modulated pulse overwhelmed and are treated as
//! invalid alongside raw zero. Color arrives YUY2-encoded and is unpacked
//! to RGB on the capture thread.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backends::driver::{CaptureDriver, StreamMode, StreamProfile};
use crate::backends::{DepthConversion, SensorBackend, SensorCore};
use crate::calib::Attitude;
use crate::constants::{MM_TO_M, TOF_SATURATION_RAW};
use crate::context::{MeshTemplate, SensorContext};
use crate::errors::{SensorError, SensorResult};
use crate::frame::{ColorFrame, DepthImage, NormalBuffer, PointCloud, UvMap};

const NAME: &str = "time-of-flight";

pub struct TimeOfFlightSensor {
    context: Arc<SensorContext>,
    driver: Option<Box<dyn CaptureDriver>>,
    core: Option<SensorCore>,
    failed: bool,
    attitude: Attitude,
}

impl TimeOfFlightSensor {
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

impl SensorBackend for TimeOfFlightSensor {
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
        let conversion = DepthConversion {
            raw_shift: 0,
            saturation: TOF_SATURATION_RAW,
        };
        // Keep the device calibration; only the raw unit is a fixed vendor
        // convention.
        let adapt = |profile: StreamProfile| StreamProfile {
            depth_unit_m: MM_TO_M,
            ..profile
        };
        match SensorCore::open(
            NAME,
            Arc::clone(&self.context),
            driver,
            mode,
            conversion,
            adapt,
        ) {
            Ok(core) => {
                info!(%mode, "time-of-flight sensor opened");
                self.core = Some(core);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "time-of-flight open failed");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::replay::ReplayDriver;

    #[test]
    fn open_keeps_driver_calibration() {
        let context = SensorContext::new();
        let mut sensor = TimeOfFlightSensor::new(context, Box::new(ReplayDriver::new()));
        sensor.open(&StreamMode::default()).unwrap();
        let core = sensor.core().unwrap();
        // The negotiated focal length survives, unlike the structured-light
        // backend which replaces it with a nominal model.
        assert!((core.profile().depth_intrinsics.fx - 571.4).abs() < 0.1);
        assert_eq!(core.profile().depth_unit_m, MM_TO_M);
    }

    #[test]
    fn absent_device_latches_closed() {
        let context = SensorContext::new();
        let mut sensor =
            TimeOfFlightSensor::new(context, Box::new(ReplayDriver::disconnected()));
        assert!(matches!(
            sensor.open(&StreamMode::default()),
            Err(SensorError::DeviceUnavailable(_))
        ));
        assert!(matches!(
            sensor.open(&StreamMode::default()),
            Err(SensorError::NotOpen)
        ));
        assert!(matches!(sensor.get_depth(), Err(SensorError::NotOpen)));
    }
}

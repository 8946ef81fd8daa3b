// SPDX-License-Identifier: GPL-3.0-only

//! Active-stereo sensor backend
//!
//! Active IR stereo devices expose a list of native modes and a queryable
//! depth unit scale (1 mm on most firmware, but configurable). This backend
//! lets the driver negotiate from its mode list and takes both the
//! calibration and the unit scale from the negotiated profile. Raw zero and
//! the all-ones pattern mark pixels the correlator could not match.

use std::sync::Arc;

use tracing::{info, warn};

use crate::backends::driver::{CaptureDriver, StreamMode};
use crate::backends::{DepthConversion, SensorBackend, SensorCore};
use crate::calib::Attitude;
use crate::context::{MeshTemplate, SensorContext};
use crate::errors::{SensorError, SensorResult};
use crate::frame::{ColorFrame, DepthImage, NormalBuffer, PointCloud, UvMap};

const NAME: &str = "active-stereo";

pub struct ActiveStereoSensor {
    context: Arc<SensorContext>,
    driver: Option<Box<dyn CaptureDriver>>,
    core: Option<SensorCore>,
    failed: bool,
    attitude: Attitude,
}

impl ActiveStereoSensor {
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

impl SensorBackend for ActiveStereoSensor {
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
            saturation: u16::MAX,
        };
        match SensorCore::open(
            NAME,
            Arc::clone(&self.context),
            driver,
            mode,
            conversion,
            |profile| profile,
        ) {
            Ok(core) => {
                info!(
                    %mode,
                    unit_m = core.profile().depth_unit_m,
                    "active-stereo sensor opened"
                );
                self.core = Some(core);
                Ok(())
            }
            Err(err) => {
                warn!(%err, "active-stereo open failed");
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
    use crate::constants::MM_TO_M;

    #[test]
    fn unit_scale_comes_from_negotiation() {
        let context = SensorContext::new();
        let mut sensor = ActiveStereoSensor::new(context, Box::new(ReplayDriver::new()));
        sensor.open(&StreamMode::default()).unwrap();
        assert_eq!(sensor.core().unwrap().profile().depth_unit_m, MM_TO_M);
    }

    #[test]
    fn attitude_round_trips_uninterpreted() {
        let context = SensorContext::new();
        let mut sensor = ActiveStereoSensor::new(context, Box::new(ReplayDriver::new()));
        let pose = Attitude::translation(0.1, -0.2, 0.3);
        sensor.set_attitude(pose);
        assert_eq!(sensor.attitude(), pose);
    }
}

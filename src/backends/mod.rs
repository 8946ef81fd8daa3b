// SPDX-License-Identifier: GPL-3.0-only

//! Sensor backends
//!
//! Every depth sensor family implements [`SensorBackend`] on top of a shared
//! [`SensorCore`]: a capture thread feeds single-slot mailboxes, and the
//! consumer-side accessors drain them and recompute derived buffers only when
//! a fresh frame actually arrived. Calling the same accessor twice with no
//! new frame returns the identical buffer without recomputation.

pub mod active_stereo;
pub mod capture;
pub mod driver;
pub mod replay;
pub mod structured_light;
pub mod time_of_flight;

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::calib::Attitude;
use crate::constants::CAPTURE_IDLE_SLEEP_US;
use crate::context::{MeshTemplate, SensorContext};
use crate::errors::{SensorError, SensorResult};
use crate::filter::BilateralWeights;
use crate::frame::{ColorFrame, DepthFrame, DepthImage, NormalBuffer, PointCloud, UvMap};
use crate::mailbox::{mailbox, FrameReceiver, TryRecvError};
use crate::{crossmap, filter, normals, reconstruct};

use capture::{CaptureLoop, LoopAction};
use driver::{CaptureDriver, DriverPoll, NegotiationError, StreamMode, StreamProfile};

/// Uniform sensor surface over the vendor backends
///
/// Accessors taking `&mut self` may drain the capture mailbox and recompute
/// derived buffers; the returned reference stays valid until the next call
/// on the same instance.
pub trait SensorBackend {
    /// Negotiate the stream and start the capture thread
    ///
    /// A failed open leaves the instance permanently closed; every later
    /// call, including a retried `open`, reports [`SensorError::NotOpen`].
    fn open(&mut self, mode: &StreamMode) -> SensorResult<()>;

    fn is_open(&self) -> bool;

    fn depth_resolution(&self) -> SensorResult<(u32, u32)>;

    fn color_resolution(&self) -> SensorResult<(u32, u32)>;

    /// Metric depth image of the most recent frame
    fn get_depth(&mut self) -> SensorResult<&DepthImage>;

    /// RGB image of the most recent color frame
    fn get_color(&mut self) -> SensorResult<&ColorFrame>;

    /// Point cloud reconstructed from unfiltered depth
    fn get_point(&mut self) -> SensorResult<&PointCloud>;

    /// Point cloud reconstructed from bilaterally smoothed depth
    fn get_position(&mut self) -> SensorResult<&PointCloud>;

    /// Per-point normals for the most recently reconstructed cloud
    fn get_normal(&mut self) -> SensorResult<&NormalBuffer>;

    /// Depth-to-color texture coordinates matching the last reconstruction
    fn get_uvmap(&self) -> SensorResult<&UvMap>;

    /// Replace the smoothing weights; takes effect on the next
    /// [`get_position`](Self::get_position)
    fn set_variance(&mut self, column: f32, row: f32, value: f32) -> SensorResult<()>;

    /// Triangle index template matching the depth resolution
    fn mesh_template(&self) -> SensorResult<Arc<MeshTemplate>>;

    /// Sequence number of the last depth frame taken from the capture
    /// thread, 0 before the first frame
    fn frame_sequence(&self) -> SensorResult<u64>;

    /// Caller-owned pose, carried uninterpreted
    fn attitude(&self) -> Attitude;

    fn set_attitude(&mut self, attitude: Attitude);
}

/// Vendor raw-depth interpretation applied on the capture thread
#[derive(Debug, Clone, Copy)]
pub(crate) struct DepthConversion {
    /// Bits of packed metadata to shift out of each raw sample
    pub raw_shift: u8,
    /// Raw values at or above this are invalid (saturated); `u16::MAX`
    /// disables the cutoff short of the all-ones pattern
    pub saturation: u16,
}

/// Which depth image the current cloud was reconstructed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloudSource {
    Raw,
    Smoothed,
}

/// Shared consumer state behind every backend
///
/// Owns the capture thread and all derived buffers. Dropping the core stops
/// and joins the thread before the buffers are freed.
pub(crate) struct SensorCore {
    context: Arc<SensorContext>,
    profile: StreamProfile,
    conversion: DepthConversion,
    depth_rx: FrameReceiver<DepthFrame>,
    color_rx: FrameReceiver<ColorFrame>,
    capture: CaptureLoop,
    raw: Vec<u16>,
    raw_sequence: u64,
    depth_m: DepthImage,
    smoothed: DepthImage,
    color: ColorFrame,
    points: PointCloud,
    uvmap: UvMap,
    normals: NormalBuffer,
    weights: Mutex<Arc<BilateralWeights>>,
    metric_stale: bool,
    cloud_stale: bool,
    normals_stale: bool,
    cloud_source: CloudSource,
    has_frame: bool,
}

impl SensorCore {
    /// Negotiate the stream, allocate the derived buffers and start the
    /// capture thread
    pub(crate) fn open(
        name: &'static str,
        context: Arc<SensorContext>,
        mut drv: Box<dyn CaptureDriver>,
        mode: &StreamMode,
        conversion: DepthConversion,
        adapt_profile: impl FnOnce(StreamProfile) -> StreamProfile,
    ) -> SensorResult<Self> {
        let profile = drv.negotiate(mode).map_err(|err| match err {
            NegotiationError::NoDevice(detail) => SensorError::DeviceUnavailable(detail),
            NegotiationError::ModeRejected(detail) => SensorError::StreamNegotiation(detail),
        })?;
        let profile = adapt_profile(profile);

        let depth_count = checked_pixel_count(
            profile.depth_intrinsics.width,
            profile.depth_intrinsics.height,
        )?;
        let color_count = checked_pixel_count(
            profile.color_intrinsics.width,
            profile.color_intrinsics.height,
        )?;
        if !(profile.depth_unit_m.is_finite() && profile.depth_unit_m > 0.0) {
            return Err(SensorError::StreamNegotiation(format!(
                "invalid depth unit {} m",
                profile.depth_unit_m
            )));
        }
        debug!(
            backend = name,
            depth_pixels = depth_count,
            color_pixels = color_count,
            unit_m = profile.depth_unit_m,
            "stream negotiated"
        );

        let (depth_tx, depth_rx) = mailbox::<DepthFrame>();
        let (color_tx, color_rx) = mailbox::<ColorFrame>();
        let shift = conversion.raw_shift;
        let (dw, dh) = (
            profile.depth_intrinsics.width,
            profile.depth_intrinsics.height,
        );
        let capture = CaptureLoop::spawn(name, move || {
            let mut idle = true;
            match drv.poll_depth() {
                DriverPoll::Sample(sample) => {
                    idle = false;
                    if sample.width != dw || sample.height != dh {
                        warn!(
                            backend = name,
                            width = sample.width,
                            height = sample.height,
                            "dropping depth sample with unexpected resolution"
                        );
                    } else {
                        let samples = if shift > 0 {
                            sample.samples.iter().map(|&d| d >> shift).collect()
                        } else {
                            sample.samples
                        };
                        depth_tx.send(DepthFrame {
                            width: sample.width,
                            height: sample.height,
                            samples,
                            sequence: sample.sequence,
                            captured_at: Instant::now(),
                        });
                    }
                }
                DriverPoll::Pending => {}
                DriverPoll::Ended => {
                    info!(backend = name, "capture stream ended");
                    return LoopAction::Stop;
                }
            }
            match drv.poll_color() {
                DriverPoll::Sample(sample) => {
                    idle = false;
                    let (width, height, sequence) =
                        (sample.width, sample.height, sample.sequence);
                    color_tx.send(ColorFrame {
                        width,
                        height,
                        pixels: sample.into_rgb(),
                        sequence,
                    });
                }
                DriverPoll::Pending => {}
                DriverPoll::Ended => {
                    info!(backend = name, "capture stream ended");
                    return LoopAction::Stop;
                }
            }
            if idle {
                std::thread::sleep(std::time::Duration::from_micros(CAPTURE_IDLE_SLEEP_US));
            }
            LoopAction::Continue
        })
        .map_err(|err| SensorError::Allocation(format!("capture thread: {err}")))?;

        let (cw, ch) = (
            profile.color_intrinsics.width,
            profile.color_intrinsics.height,
        );
        Ok(Self {
            context,
            conversion,
            depth_rx,
            color_rx,
            capture,
            raw: vec![0; depth_count],
            raw_sequence: 0,
            depth_m: DepthImage::new(dw, dh),
            smoothed: DepthImage::new(dw, dh),
            color: ColorFrame::black(cw, ch),
            points: PointCloud::new(dw, dh),
            uvmap: UvMap::new(dw, dh),
            normals: NormalBuffer::new(dw, dh),
            weights: Mutex::new(Arc::new(BilateralWeights::default())),
            metric_stale: false,
            cloud_stale: false,
            normals_stale: false,
            cloud_source: CloudSource::Raw,
            has_frame: false,
            profile,
        })
    }

    pub(crate) fn depth_resolution(&self) -> (u32, u32) {
        (
            self.profile.depth_intrinsics.width,
            self.profile.depth_intrinsics.height,
        )
    }

    pub(crate) fn color_resolution(&self) -> (u32, u32) {
        (
            self.profile.color_intrinsics.width,
            self.profile.color_intrinsics.height,
        )
    }

    /// Drain the mailboxes without blocking, marking derived buffers stale
    /// when a fresh depth frame landed
    fn drain(&mut self) {
        match self.depth_rx.try_recv() {
            Ok(frame) => {
                if frame.samples.len() == self.raw.len() {
                    self.raw.copy_from_slice(&frame.samples);
                    self.raw_sequence = frame.sequence;
                    self.metric_stale = true;
                    self.cloud_stale = true;
                    self.normals_stale = true;
                    self.has_frame = true;
                } else {
                    warn!(
                        got = frame.samples.len(),
                        want = self.raw.len(),
                        "dropping depth frame with mismatched sample count"
                    );
                }
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                debug!("depth mailbox disconnected, reusing last frame");
            }
        }
        match self.color_rx.try_recv() {
            Ok(frame) => self.color = frame,
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
        }
    }

    fn require_frame(&self) -> SensorResult<()> {
        if self.has_frame {
            Ok(())
        } else {
            Err(SensorError::FrameTimeout)
        }
    }

    fn ensure_metric(&mut self) {
        if self.metric_stale {
            reconstruct::convert_raw_depth(
                &self.raw,
                self.profile.depth_unit_m,
                self.conversion.saturation,
                &mut self.depth_m,
            );
            self.metric_stale = false;
        }
    }

    /// Rebuild points and uv coordinates from the requested depth image if
    /// the cloud is stale or was built from the other source
    fn ensure_cloud(&mut self, source: CloudSource) {
        self.ensure_metric();
        if !self.cloud_stale && self.cloud_source == source {
            return;
        }
        match source {
            CloudSource::Raw => {
                reconstruct::reconstruct_cloud(
                    &self.depth_m,
                    &self.profile.depth_intrinsics,
                    &mut self.points,
                );
            }
            CloudSource::Smoothed => {
                let weights = {
                    // Clone the handle so the filter runs outside the lock.
                    let guard = match self.weights.lock() {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    Arc::clone(&guard)
                };
                let (depth_m, smoothed) = (&self.depth_m, &mut self.smoothed);
                self.context.with_scratch(|scratch| {
                    filter::smooth_depth(depth_m, smoothed, scratch, &weights);
                });
                reconstruct::reconstruct_cloud(
                    &self.smoothed,
                    &self.profile.depth_intrinsics,
                    &mut self.points,
                );
            }
        }
        crossmap::map_cloud(
            &self.points,
            &self.profile.extrinsics,
            &self.profile.color_intrinsics,
            &mut self.uvmap,
        );
        self.cloud_stale = false;
        self.normals_stale = true;
        self.cloud_source = source;
    }

    pub(crate) fn get_depth(&mut self) -> SensorResult<&DepthImage> {
        self.drain();
        self.require_frame()?;
        self.ensure_metric();
        Ok(&self.depth_m)
    }

    pub(crate) fn get_color(&mut self) -> SensorResult<&ColorFrame> {
        self.drain();
        Ok(&self.color)
    }

    pub(crate) fn get_point(&mut self) -> SensorResult<&PointCloud> {
        self.drain();
        self.require_frame()?;
        self.ensure_cloud(CloudSource::Raw);
        Ok(&self.points)
    }

    pub(crate) fn get_position(&mut self) -> SensorResult<&PointCloud> {
        self.drain();
        self.require_frame()?;
        self.ensure_cloud(CloudSource::Smoothed);
        Ok(&self.points)
    }

    pub(crate) fn get_normal(&mut self) -> SensorResult<&NormalBuffer> {
        self.drain();
        self.require_frame()?;
        self.ensure_cloud(self.cloud_source);
        if self.normals_stale {
            normals::estimate_normals(&self.points, &mut self.normals);
            self.normals_stale = false;
        }
        Ok(&self.normals)
    }

    pub(crate) fn get_uvmap(&self) -> &UvMap {
        &self.uvmap
    }

    pub(crate) fn set_variance(&mut self, column: f32, row: f32, value: f32) {
        let next = Arc::new(BilateralWeights::new(column, row, value));
        let mut guard = match self.weights.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = next;
        drop(guard);
        // Force the next smoothed reconstruction to pick up the new weights.
        if self.cloud_source == CloudSource::Smoothed {
            self.cloud_stale = true;
        }
        debug!(column, row, value, "smoothing variances replaced");
    }

    pub(crate) fn mesh_template(&self) -> Arc<MeshTemplate> {
        let (width, height) = self.depth_resolution();
        self.context.mesh_template(width, height)
    }

    pub(crate) fn frame_sequence(&self) -> u64 {
        self.raw_sequence
    }

    /// Whether the capture thread is still polling the driver
    pub(crate) fn is_capturing(&self) -> bool {
        self.capture.is_running()
    }

    pub(crate) fn profile(&self) -> &StreamProfile {
        &self.profile
    }
}

fn checked_pixel_count(width: u32, height: u32) -> SensorResult<usize> {
    if width == 0 || height == 0 {
        return Err(SensorError::Allocation(format!(
            "degenerate resolution {width}x{height}"
        )));
    }
    (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| SensorError::Allocation(format!("resolution {width}x{height} overflows")))
}

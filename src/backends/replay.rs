// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic replay driver
//!
//! A [`CaptureDriver`] that needs no hardware: it synthesizes a slanted
//! depth plane with an invalid band plus a color gradient, paced at the
//! negotiated frame rate. Used by the demo binary and as the test double
//! for the backend state machine.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::backends::driver::{
    CaptureDriver, ColorEncoding, DriverPoll, NegotiationError, RawColorSample, RawDepthSample,
    StreamMode, StreamProfile,
};

/// Nominal focal length of the synthetic depth camera, pixels at 640x480
const REPLAY_FOCAL: f32 = 571.4;

/// Modes the synthetic device accepts
const SUPPORTED: [(u32, u32); 2] = [(640, 480), (320, 240)];

pub struct ReplayDriver {
    connected: bool,
    /// Packed metadata bits below the depth value, as some vendor streams
    /// carry; the consuming backend shifts them back out
    raw_shift: u8,
    interval: Duration,
    frame_limit: Option<u64>,
    mode: Option<StreamMode>,
    profile_override: Option<StreamProfile>,
    next_due: Instant,
    sequence: u64,
    pending_color: Option<RawColorSample>,
}

impl ReplayDriver {
    pub fn new() -> Self {
        Self {
            connected: true,
            raw_shift: 0,
            interval: Duration::ZERO,
            frame_limit: None,
            mode: None,
            profile_override: None,
            next_due: Instant::now(),
            sequence: 0,
            pending_color: None,
        }
    }

    /// A driver whose device is absent; `negotiate` always fails
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Self::new()
        }
    }

    /// Left-shift every raw depth sample, emulating packed metadata bits
    pub fn with_packed_shift(mut self, shift: u8) -> Self {
        self.raw_shift = shift;
        self
    }

    /// End the stream after this many depth frames
    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    /// Report this calibration instead of the synthetic nominal profile
    pub fn with_profile(mut self, profile: StreamProfile) -> Self {
        self.profile_override = Some(profile);
        self
    }

    fn synthesize(&mut self, mode: &StreamMode) -> RawDepthSample {
        self.sequence += 1;
        let (w, h) = (mode.depth_width as usize, mode.depth_height as usize);
        let mut samples = vec![0u16; w * h];
        for v in 0..h {
            for u in 0..w {
                // Plane from 0.8 m to ~2 m across the width, with an invalid
                // band in the upper left and a slow sway over time.
                let mm = 800
                    + (1200 * u / w.max(1)) as u32
                    + (self.sequence % 16) as u32;
                let raw = if v < h / 8 && u < w / 8 {
                    0
                } else {
                    (mm as u16) << self.raw_shift
                };
                samples[v * w + u] = raw;
            }
        }
        let depth = RawDepthSample {
            width: mode.depth_width,
            height: mode.depth_height,
            samples,
            sequence: self.sequence,
        };
        let (cw, ch) = (mode.color_width as usize, mode.color_height as usize);
        let mut bytes = vec![0u8; cw * ch * 3];
        for v in 0..ch {
            for u in 0..cw {
                let i = (v * cw + u) * 3;
                bytes[i] = (255 * u / cw.max(1)) as u8;
                bytes[i + 1] = (255 * v / ch.max(1)) as u8;
                bytes[i + 2] = (self.sequence * 8 % 256) as u8;
            }
        }
        self.pending_color = Some(RawColorSample {
            width: mode.color_width,
            height: mode.color_height,
            encoding: ColorEncoding::Rgb,
            bytes,
            sequence: self.sequence,
        });
        depth
    }
}

impl Default for ReplayDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDriver for ReplayDriver {
    fn negotiate(&mut self, mode: &StreamMode) -> Result<StreamProfile, NegotiationError> {
        if !self.connected {
            return Err(NegotiationError::NoDevice(
                "no replay device".to_string(),
            ));
        }
        let depth_ok = SUPPORTED.contains(&(mode.depth_width, mode.depth_height));
        let color_ok = mode.color_width == mode.depth_width
            && mode.color_height == mode.depth_height;
        if !depth_ok || !color_ok || mode.depth_fps == 0 {
            return Err(NegotiationError::ModeRejected(format!(
                "unsupported mode: {mode}"
            )));
        }
        self.interval = Duration::from_secs(1) / mode.depth_fps;
        self.next_due = Instant::now();
        self.mode = Some(*mode);
        debug!(%mode, "replay stream negotiated");
        if let Some(profile) = self.profile_override.clone() {
            return Ok(profile);
        }
        // Focal scales with resolution so the field of view stays fixed.
        let focal = REPLAY_FOCAL * mode.depth_width as f32 / 640.0;
        Ok(StreamProfile::nominal(mode, focal, focal))
    }

    fn poll_depth(&mut self) -> DriverPoll<RawDepthSample> {
        let Some(mode) = self.mode else {
            return DriverPoll::Ended;
        };
        if let Some(limit) = self.frame_limit {
            if self.sequence >= limit {
                return DriverPoll::Ended;
            }
        }
        if Instant::now() < self.next_due {
            return DriverPoll::Pending;
        }
        self.next_due += self.interval;
        DriverPoll::Sample(self.synthesize(&mode))
    }

    fn poll_color(&mut self) -> DriverPoll<RawColorSample> {
        if self.mode.is_none() {
            return DriverPoll::Ended;
        }
        match self.pending_color.take() {
            Some(color) => DriverPoll::Sample(color),
            None => DriverPoll::Pending,
        }
    }
}

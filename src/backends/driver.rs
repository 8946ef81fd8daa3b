// SPDX-License-Identifier: GPL-3.0-only

//! Vendor driver boundary
//!
//! A [`CaptureDriver`] is the seam to a vendor capture stack: it negotiates
//! a stream and hands out raw samples when polled from the capture thread.
//! Device enumeration, USB bring-up and SDK event plumbing live behind this
//! trait and outside this crate's concern; the backends only interpret the
//! raw samples per their vendor's conventions.

use crate::calib::{CameraIntrinsics, Extrinsics};
use crate::constants::MM_TO_M;
use serde::{Deserialize, Serialize};

/// Requested stream configuration, negotiated at open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMode {
    pub depth_width: u32,
    pub depth_height: u32,
    pub depth_fps: u32,
    pub color_width: u32,
    pub color_height: u32,
    pub color_fps: u32,
}

impl Default for StreamMode {
    fn default() -> Self {
        Self {
            depth_width: 640,
            depth_height: 480,
            depth_fps: 30,
            color_width: 640,
            color_height: 480,
            color_fps: 30,
        }
    }
}

impl std::fmt::Display for StreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "depth {}x{}@{}fps / color {}x{}@{}fps",
            self.depth_width,
            self.depth_height,
            self.depth_fps,
            self.color_width,
            self.color_height,
            self.color_fps
        )
    }
}

/// Negotiated stream: session calibration plus the vendor raw depth unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamProfile {
    pub depth_intrinsics: CameraIntrinsics,
    pub color_intrinsics: CameraIntrinsics,
    pub extrinsics: Extrinsics,
    /// Meters per raw depth unit (queried from the device; 1 mm for most)
    pub depth_unit_m: f32,
}

impl StreamProfile {
    /// Distortion-free profile for a mode, the baseline most drivers start
    /// from before filling in device calibration
    pub fn nominal(mode: &StreamMode, depth_focal: f32, color_focal: f32) -> Self {
        Self {
            depth_intrinsics: CameraIntrinsics::nominal(
                mode.depth_width,
                mode.depth_height,
                depth_focal,
                depth_focal,
            ),
            color_intrinsics: CameraIntrinsics::nominal(
                mode.color_width,
                mode.color_height,
                color_focal,
                color_focal,
            ),
            extrinsics: Extrinsics::default(),
            depth_unit_m: MM_TO_M,
        }
    }
}

/// Negotiation failure, mapped onto the sensor error taxonomy by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    /// No device (left) to open
    NoDevice(String),
    /// The device exists but rejected the requested mode
    ModeRejected(String),
}

/// One raw depth sample array from the vendor stream
#[derive(Debug, Clone)]
pub struct RawDepthSample {
    pub width: u32,
    pub height: u32,
    /// Vendor raw units, possibly with packed metadata bits (backend shifts
    /// them out)
    pub samples: Vec<u16>,
    pub sequence: u64,
}

/// Byte encoding of a raw color sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorEncoding {
    /// Packed RGB triplets
    Rgb,
    /// YUY2 (YUYV 4:2:2), two pixels per four bytes
    Yuy2,
}

/// One raw color sample array from the vendor stream
#[derive(Debug, Clone)]
pub struct RawColorSample {
    pub width: u32,
    pub height: u32,
    pub encoding: ColorEncoding,
    pub bytes: Vec<u8>,
    pub sequence: u64,
}

impl RawColorSample {
    /// Decode to packed RGB, converting YUY2 with the BT.601 coefficients
    pub fn into_rgb(self) -> Vec<u8> {
        match self.encoding {
            ColorEncoding::Rgb => self.bytes,
            ColorEncoding::Yuy2 => yuy2_to_rgb(&self.bytes, self.width, self.height),
        }
    }
}

/// YUY2 (Y0 U Y1 V) to packed RGB, ITU-R BT.601
fn yuy2_to_rgb(bytes: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixels = width as usize * height as usize;
    let mut rgb = vec![0u8; pixels * 3];
    for i in 0..pixels {
        let iy = i * 2;
        let iu = (iy & !3) + 1;
        let iv = iu + 2;
        if iv >= bytes.len() {
            break;
        }
        let y = f32::from(bytes[iy].saturating_sub(16));
        let u = f32::from(bytes[iu]) - 128.0;
        let v = f32::from(bytes[iv]) - 128.0;
        let r = y + 1.402 * v;
        let g = y - 0.344_136 * u - 0.714_136 * v;
        let b = y + 1.772 * u;
        rgb[i * 3] = r.clamp(0.0, 255.0) as u8;
        rgb[i * 3 + 1] = g.clamp(0.0, 255.0) as u8;
        rgb[i * 3 + 2] = b.clamp(0.0, 255.0) as u8;
    }
    rgb
}

/// Result of polling a driver for its next sample
#[derive(Debug, Clone)]
pub enum DriverPoll<T> {
    /// A new sample is ready
    Sample(T),
    /// Nothing new yet; poll again later
    Pending,
    /// The stream ended (device unplugged or replay exhausted)
    Ended,
}

/// Vendor capture stack boundary
///
/// Polled exclusively from the sensor's capture thread; any blocking the
/// vendor stack does while waiting for hardware happens inside `poll_*` and
/// never reaches the consumer path.
pub trait CaptureDriver: Send {
    /// Negotiate a stream at the requested mode and return the session
    /// calibration
    fn negotiate(&mut self, mode: &StreamMode) -> Result<StreamProfile, NegotiationError>;

    /// Next depth sample, if one arrived since the last poll
    fn poll_depth(&mut self) -> DriverPoll<RawDepthSample>;

    /// Next color sample, if one arrived since the last poll
    fn poll_color(&mut self) -> DriverPoll<RawColorSample>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yuy2_grey_decodes_to_grey() {
        // Y = 144, U = V = 128 is a neutral grey of 128 after BT.601 offset.
        let sample = RawColorSample {
            width: 2,
            height: 1,
            encoding: ColorEncoding::Yuy2,
            bytes: vec![144, 128, 144, 128],
            sequence: 0,
        };
        let rgb = sample.into_rgb();
        assert_eq!(rgb, vec![128, 128, 128, 128, 128, 128]);
    }

    #[test]
    fn rgb_passthrough_is_untouched() {
        let sample = RawColorSample {
            width: 1,
            height: 1,
            encoding: ColorEncoding::Rgb,
            bytes: vec![1, 2, 3],
            sequence: 0,
        };
        assert_eq!(sample.into_rgb(), vec![1, 2, 3]);
    }
}

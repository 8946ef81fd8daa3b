// SPDX-License-Identifier: GPL-3.0-only

//! Backend lifecycle: open/close latching, frame consumption, shared
//! context reuse and smoothing control, all driven by the replay driver.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rgbd_stream::backends::replay::ReplayDriver;
use rgbd_stream::backends::time_of_flight::TimeOfFlightSensor;
use rgbd_stream::{SensorBackend, SensorContext, SensorError, StreamMode};

fn wait_for_frame(sensor: &mut dyn SensorBackend) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match sensor.get_depth() {
            Ok(_) => return,
            Err(SensorError::FrameTimeout) => {
                assert!(Instant::now() < deadline, "no frame arrived");
                thread::sleep(Duration::from_millis(1));
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
}

fn wait_for_sequence(sensor: &mut dyn SensorBackend, target: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        wait_for_frame(sensor);
        if sensor.frame_sequence().unwrap() >= target {
            return;
        }
        assert!(Instant::now() < deadline, "sequence never reached {target}");
        thread::sleep(Duration::from_millis(1));
    }
}

fn open_sensor(context: Arc<SensorContext>, driver: ReplayDriver) -> TimeOfFlightSensor {
    let mut sensor = TimeOfFlightSensor::new(context, Box::new(driver));
    sensor.open(&StreamMode::default()).unwrap();
    sensor
}

#[test]
fn accessors_before_open_report_not_open() {
    let context = SensorContext::new();
    let mut sensor = TimeOfFlightSensor::new(context, Box::new(ReplayDriver::new()));
    assert!(!sensor.is_open());
    assert!(matches!(sensor.get_depth(), Err(SensorError::NotOpen)));
    assert!(matches!(sensor.get_point(), Err(SensorError::NotOpen)));
    assert!(matches!(sensor.get_uvmap(), Err(SensorError::NotOpen)));
    assert!(matches!(
        sensor.depth_resolution(),
        Err(SensorError::NotOpen)
    ));
}

#[test]
fn open_is_idempotent_while_streaming() {
    let context = SensorContext::new();
    let mut sensor = open_sensor(context, ReplayDriver::new());
    assert!(sensor.is_open());
    sensor.open(&StreamMode::default()).unwrap();
    assert!(sensor.is_open());
}

#[test]
fn instances_share_one_mesh_template_per_resolution() {
    let context = SensorContext::new();
    let mut a = open_sensor(Arc::clone(&context), ReplayDriver::new());
    let mut b = open_sensor(Arc::clone(&context), ReplayDriver::new());
    // The application handle can go away first; instances keep the context
    // alive through their own Arc.
    drop(context);
    wait_for_frame(&mut a);
    wait_for_frame(&mut b);

    let ta = a.mesh_template().unwrap();
    let tb = b.mesh_template().unwrap();
    assert!(Arc::ptr_eq(&ta, &tb));
    // Two triangles per quad, three indices each.
    assert_eq!(ta.indices().len() as u32, 639 * 479 * 6);
}

#[test]
fn ended_stream_keeps_serving_the_last_frame() {
    let context = SensorContext::new();
    let mut sensor = open_sensor(context, ReplayDriver::new().with_frame_limit(1));
    wait_for_sequence(&mut sensor, 1);

    let first = {
        let cloud = sensor.get_point().unwrap();
        cloud.at(320, 240)
    };
    // Give the capture thread time to observe the end of the stream.
    thread::sleep(Duration::from_millis(50));
    let again = {
        let cloud = sensor.get_point().unwrap();
        cloud.at(320, 240)
    };
    assert_eq!(first, again);
    assert_eq!(sensor.frame_sequence().unwrap(), 1);
}

#[test]
fn repeated_get_point_without_new_frame_is_stable() {
    let context = SensorContext::new();
    let mut sensor = open_sensor(context, ReplayDriver::new().with_frame_limit(1));
    wait_for_sequence(&mut sensor, 1);

    let a = sensor.get_point().unwrap().at(100, 100);
    let b = sensor.get_point().unwrap().at(100, 100);
    assert_eq!(a, b);
}

#[test]
fn variance_update_applies_to_the_next_position() {
    let context = SensorContext::new();
    let mut sensor = open_sensor(context, ReplayDriver::new().with_frame_limit(1));
    wait_for_sequence(&mut sensor, 1);

    // A pixel whose filter window overlaps the invalid band, where the
    // sentinel plane sits far from the measured surface.
    let (u, v) = (80, 10);
    let raw = sensor.get_point().unwrap().at(u, v);

    // Zero spatial variance collapses the kernel to its center tap, so
    // smoothing is the identity.
    sensor.set_variance(0.0, 0.0, 0.01).unwrap();
    let identity = sensor.get_position().unwrap().at(u, v);
    assert_eq!(identity, raw);

    // A huge value variance lets the sentinel taps bleed in, so the same
    // pixel moves.
    sensor.set_variance(1.0, 1.0, 1.0e6).unwrap();
    let smeared = sensor.get_position().unwrap().at(u, v);
    assert!(
        (smeared[2] - raw[2]).abs() > 0.01,
        "sentinel taps did not blend: {} vs {}",
        smeared[2],
        raw[2]
    );
}

#[test]
fn color_frames_arrive_with_the_gradient() {
    let context = SensorContext::new();
    let mut sensor = open_sensor(context, ReplayDriver::new());
    wait_for_frame(&mut sensor);

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let frame = sensor.get_color().unwrap();
        // Right half of the gradient has a strong red channel.
        let i = ((240 * frame.width + 600) * 3) as usize;
        if frame.sequence > 0 {
            assert!(frame.pixels[i] > 200);
            return;
        }
        assert!(Instant::now() < deadline, "no color frame arrived");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn normals_face_the_camera_on_the_synthetic_plane() {
    let context = SensorContext::new();
    let mut sensor = open_sensor(context, ReplayDriver::new().with_frame_limit(1));
    wait_for_sequence(&mut sensor, 1);

    // The synthetic plane slants in depth along u, so the normal leans in x
    // but still faces the camera.
    let n = sensor.get_normal().unwrap().at(320, 240);
    assert!(n[2].abs() > 0.5, "normal not facing the camera: {n:?}");
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    assert!((len - 1.0).abs() < 1e-3);
}

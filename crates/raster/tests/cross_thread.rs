use std::thread;
use std::time::Duration;

use raster::{staging, Geometry, PixelRenderer, RasterError, Signal, VideoSpec};

fn signal(x: u32, y: u32, color_index: u8) -> Signal {
    Signal {
        horizontal_position: x,
        scanline: y,
        color_index,
        vblank: false,
        is_current: false,
    }
}

#[test]
fn resize_from_emulation_thread_waits_for_render_thread() {
    let (mut plotter, mut stager) = staging(Geometry::default_for(VideoSpec::NTSC)).unwrap();

    let emulation = thread::spawn(move || {
        let result = plotter.resize(VideoSpec::PAL, 44, 228);
        (plotter, result)
    });

    while !emulation.is_finished() {
        stager.service_resizes();
        thread::sleep(Duration::from_millis(1));
    }
    let (plotter, result) = emulation.join().unwrap();
    result.unwrap();

    assert_eq!(plotter.geometry(), Geometry::new(VideoSpec::PAL, 44, 228));
    for size in stager.allocated_sizes() {
        assert_eq!(size, (228, 312));
    }
}

#[test]
fn rejected_resize_is_reported_to_the_requester() {
    let (mut plotter, mut stager) = staging(Geometry::default_for(VideoSpec::NTSC)).unwrap();

    let emulation = thread::spawn(move || plotter.resize(VideoSpec::NTSC, 100, 200));
    while !emulation.is_finished() {
        stager.service_resizes();
        thread::sleep(Duration::from_millis(1));
    }
    let err = emulation.join().unwrap().unwrap_err();
    assert!(matches!(err, RasterError::InvalidGeometry { .. }));
    assert_eq!(stager.geometry(), Geometry::default_for(VideoSpec::NTSC));
}

#[test]
fn resize_after_stager_dropped_is_closed() {
    let (mut plotter, stager) = staging(Geometry::default_for(VideoSpec::NTSC)).unwrap();
    drop(stager);

    let result = thread::spawn(move || plotter.resize(VideoSpec::PAL, 44, 228))
        .join()
        .unwrap();
    assert_eq!(result, Err(RasterError::Closed));
}

#[test]
fn resize_in_flight_when_stager_drops_is_closed() {
    let (mut plotter, stager) = staging(Geometry::default_for(VideoSpec::NTSC)).unwrap();

    let emulation = thread::spawn(move || plotter.resize(VideoSpec::PAL, 44, 228));
    thread::sleep(Duration::from_millis(20));
    drop(stager);

    assert_eq!(emulation.join().unwrap(), Err(RasterError::Closed));
}

#[test]
fn staged_frames_are_never_torn() {
    const FRAMES: u64 = 40;
    let geometry = Geometry::default_for(VideoSpec::NTSC);
    let (width, height) = geometry.spec.raster_size();
    let (mut plotter, mut stager) = staging(geometry).unwrap();

    let emulation = thread::spawn(move || {
        for frame in 1..=FRAMES {
            let color_index = ((frame as u8) % 64) << 1;
            let mut batch = plotter.begin_update();
            for y in 0..height {
                for x in 0..width {
                    batch.set_pixel(signal(x, y, color_index));
                }
            }
            batch.end_update();
            plotter.new_frame(frame, true).unwrap();
        }
        plotter.end_rendering().unwrap();
    });

    let mut seen = 0;
    let mut last_frame = 0;
    loop {
        let ended = stager.is_ended();
        if let Some(staged) = stager.render() {
            let first = staged.frame.pixels()[0];
            assert!(
                staged.frame.pixels().iter().all(|cell| *cell == first),
                "frame {} mixes two updates",
                staged.info.frame_number
            );
            assert!(staged.info.frame_number > last_frame);
            last_frame = staged.info.frame_number;
            seen += 1;
        } else if ended {
            break;
        }
    }
    emulation.join().unwrap();

    assert!(seen >= 1);
    assert_eq!(last_frame, FRAMES);
}

use crtconfig::PipelineConfig;
use raster::{
    staging, Annotation, FrameStager, Geometry, Palette, PixelPlotter, PixelRenderer, Signal,
    VideoSpec,
};
use renderer::software::SoftwareDevice;
use renderer::{
    DeviceError, FrameOutput, OutputTarget, Pipeline, PipelineError, RenderDevice, SeededClock,
    SequencerState, SlotName, UniformValue,
};

const WIDTH: u32 = 228;
const ROWS: u32 = 4;
const SIZE: (u32, u32) = (WIDTH, ROWS);

fn setup() -> (PixelPlotter, FrameStager) {
    staging(Geometry::new(VideoSpec::NTSC, 0, ROWS)).unwrap()
}

fn pipeline(device: &mut SoftwareDevice) -> Pipeline {
    Pipeline::new(device, Box::new(SeededClock::new(7, 60.0))).unwrap()
}

/// Plots a full frame, using `color_of(x, y)` for every cell.
fn plot_frame(plotter: &mut PixelPlotter, frame: u64, color_of: impl Fn(u32, u32) -> u8) {
    let mut batch = plotter.begin_update();
    for scanline in 0..ROWS {
        for x in 0..WIDTH {
            batch.set_pixel(Signal {
                horizontal_position: x,
                scanline,
                color_index: color_of(x, scanline),
                vblank: false,
                is_current: false,
            });
        }
    }
    batch.end_update();
    plotter.new_frame(frame, true).unwrap();
}

fn expected(color_index: u8) -> [f32; 3] {
    let rgba = Palette::new(VideoSpec::NTSC.palette).lookup(color_index);
    [
        f32::from(rgba[0]) / 255.0,
        f32::from(rgba[1]) / 255.0,
        f32::from(rgba[2]) / 255.0,
    ]
}

fn assert_close(actual: [f32; 4], expected: [f32; 3], context: &str) {
    for channel in 0..3 {
        assert!(
            (actual[channel] - expected[channel]).abs() < 1e-3,
            "{context}: channel {channel} is {} but expected {}",
            actual[channel],
            expected[channel]
        );
    }
}

/// Runs one frame through the pipeline and returns what it produced.
fn run_frame(
    pipeline: &mut Pipeline,
    device: &mut SoftwareDevice,
    stager: &mut FrameStager,
    config: &PipelineConfig,
    output: OutputTarget,
) -> FrameOutput {
    let staged = stager.render().expect("frame staged");
    pipeline
        .process_frame(device, &staged, config, SIZE, output)
        .unwrap()
}

#[test]
fn neutral_config_reproduces_the_raster() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    let color_of = |x: u32, y: u32| if (x + y) % 2 == 0 { 0x0E } else { 0x44 };
    plot_frame(&mut plotter, 1, color_of);

    let output = run_frame(
        &mut pipeline,
        &mut device,
        &mut stager,
        &PipelineConfig::default(),
        OutputTarget::Present,
    );
    assert_eq!(output, FrameOutput::Presented);

    let screen = device.read_default().unwrap();
    for y in 0..ROWS {
        for x in 0..WIDTH {
            let pixel = screen.pixel(x, y).unwrap();
            assert_close(pixel, expected(color_of(x, y)), &format!("pixel ({x}, {y})"));
            assert_eq!(pixel[3], 1.0);
        }
    }
}

#[test]
fn phosphor_converges_towards_the_source() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    let config = PipelineConfig {
        phosphor: true,
        phosphor_latency: 0.5,
        ..PipelineConfig::default()
    };
    let target = expected(0x0E);

    // Three settling passes on the first frame, one per frame afterwards.
    let mut previous = 0.0;
    for (frame, remaining) in [(1, 0.125), (2, 0.0625), (3, 0.03125)] {
        plot_frame(&mut plotter, frame, |_, _| 0x0E);
        run_frame(
            &mut pipeline,
            &mut device,
            &mut stager,
            &config,
            OutputTarget::Present,
        );

        let phosphor = pipeline.sequencer().texture(SlotName::Phosphor).unwrap();
        let pixel = device.read_texture(phosphor).unwrap().pixel(3, 1).unwrap();
        let expected_value = target[0] * (1.0 - remaining);
        assert!(
            (pixel[0] - expected_value).abs() < 1e-4,
            "frame {frame}: {} != {expected_value}",
            pixel[0]
        );
        assert!(pixel[0] >= previous);
        assert!(pixel[0] <= target[0] + 1e-6);
        previous = pixel[0];
    }
}

#[test]
fn settling_passes_run_only_after_reallocation() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    let config = PipelineConfig::default();
    let phosphor_draws = |device: &mut SoftwareDevice| {
        device
            .take_draws()
            .iter()
            .filter(|draw| draw.label == "phosphor")
            .count()
    };

    plot_frame(&mut plotter, 1, |_, _| 0x0E);
    run_frame(&mut pipeline, &mut device, &mut stager, &config, OutputTarget::Present);
    assert_eq!(phosphor_draws(&mut device), 3);

    plot_frame(&mut plotter, 2, |_, _| 0x0E);
    run_frame(&mut pipeline, &mut device, &mut stager, &config, OutputTarget::Present);
    assert_eq!(phosphor_draws(&mut device), 1);

    device.resize_default(WIDTH / 2, ROWS * 2);
    pipeline
        .run(&mut device, &config, (WIDTH / 2, ROWS * 2), OutputTarget::Present)
        .unwrap();
    assert_eq!(phosphor_draws(&mut device), 3);
}

#[test]
fn reallocation_discards_accumulated_phosphor() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    let config = PipelineConfig {
        phosphor: true,
        phosphor_latency: 0.5,
        ..PipelineConfig::default()
    };
    for frame in 1..=5 {
        plot_frame(&mut plotter, frame, |_, _| 0x0E);
        run_frame(&mut pipeline, &mut device, &mut stager, &config, OutputTarget::Present);
    }

    let resized = (WIDTH / 2, ROWS * 2);
    device.resize_default(resized.0, resized.1);
    plot_frame(&mut plotter, 6, |_, _| 0x00);
    let staged = stager.render().expect("frame staged");
    pipeline
        .process_frame(&mut device, &staged, &config, resized, OutputTarget::Present)
        .unwrap();
    assert_eq!(
        pipeline.sequencer().state(),
        SequencerState::Ready {
            width: resized.0,
            height: resized.1
        }
    );

    // Three settling passes from transparent black leave 1/8 of nothing behind.
    let phosphor = pipeline.sequencer().texture(SlotName::Phosphor).unwrap();
    let texture = device.read_texture(phosphor).unwrap();
    assert_eq!((texture.width(), texture.height()), resized);
    let dark = expected(0x00);
    for pixel in texture.texels() {
        assert_close(*pixel, dark.map(|channel| channel * 0.875), "after resize");
        assert!((pixel[3] - 0.875).abs() < 1e-4, "alpha {}", pixel[3]);
    }
}

#[test]
fn bloomed_accumulation_never_saturates() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    let config = PipelineConfig {
        phosphor: true,
        phosphor_latency: 0.9,
        phosphor_bloom: 2.0,
        ..PipelineConfig::default()
    };

    for frame in 1..=24 {
        plot_frame(&mut plotter, frame, |x, _| if x % 2 == 0 { 0x0E } else { 0x00 });
        run_frame(&mut pipeline, &mut device, &mut stager, &config, OutputTarget::Present);

        for slot in [SlotName::Phosphor, SlotName::Bloom] {
            let texture = pipeline.sequencer().texture(slot).unwrap();
            for pixel in device.read_texture(texture).unwrap().texels() {
                assert!(
                    pixel.iter().all(|channel| (0.0..=1.0 + 1e-6).contains(channel)),
                    "frame {frame} {slot:?}: {pixel:?}"
                );
            }
        }
    }
}

#[test]
fn stage_order_follows_the_chain() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    let config = PipelineConfig {
        ghosting: true,
        phosphor: true,
        phosphor_bloom: 1.0,
        scanlines: true,
        ..PipelineConfig::default()
    };
    plot_frame(&mut plotter, 1, |_, _| 0x0E);
    run_frame(&mut pipeline, &mut device, &mut stager, &config, OutputTarget::Present);
    device.take_draws();

    plot_frame(&mut plotter, 2, |_, _| 0x0E);
    run_frame(&mut pipeline, &mut device, &mut stager, &config, OutputTarget::Present);
    let labels: Vec<_> = device.take_draws().iter().map(|draw| draw.label).collect();
    assert_eq!(
        labels,
        [
            "scale",
            "ghosting",
            "phosphor bloom",
            "phosphor",
            "black level",
            "blur",
            "blend",
            "effects"
        ]
    );
}

#[test]
fn uniforms_follow_the_config() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    let config = PipelineConfig {
        ghosting: true,
        ghosting_amount: 0.4,
        scanlines: true,
        scanlines_intensity: 0.3,
        sharpness: 2.0,
        pixel_perfect_fade: 0.2,
        ..PipelineConfig::default()
    };
    plot_frame(&mut plotter, 1, |_, _| 0x0E);
    run_frame(&mut pipeline, &mut device, &mut stager, &config, OutputTarget::Present);

    let draws = device.take_draws();
    let find = |label: &str| {
        draws
            .iter()
            .find(|draw| draw.label == label)
            .unwrap_or_else(|| panic!("no {label} draw"))
    };
    assert_eq!(
        find("ghosting").uniform("u_ghosting_amount"),
        Some(UniformValue::Float(0.4))
    );
    assert_eq!(
        find("phosphor").uniform("u_latency"),
        Some(UniformValue::Float(0.2))
    );
    assert_eq!(
        find("blur").uniform("u_blur_offset"),
        Some(UniformValue::Vec2(renderer::uniforms::blur_offset(2.0, SIZE)))
    );
    let effects = find("effects");
    assert_eq!(effects.uniform("u_scanlines"), Some(UniformValue::Int(1)));
    assert_eq!(effects.uniform("u_mask"), Some(UniformValue::Int(0)));
    assert_eq!(
        effects.uniform("u_scanlines_intensity"),
        Some(UniformValue::Float(0.3))
    );
    assert_eq!(
        effects.uniform("u_resolution"),
        Some(UniformValue::Vec2([WIDTH as f32, ROWS as f32]))
    );
    assert!(draws.iter().all(|draw| draw.label != "passthrough"));
    assert!(draws.iter().all(|draw| draw.label != "blend"));
}

#[test]
fn scanlines_darken_odd_rows() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    let config = PipelineConfig {
        scanlines: true,
        scanlines_intensity: 0.5,
        ..PipelineConfig::default()
    };
    plot_frame(&mut plotter, 1, |_, _| 0x0E);
    run_frame(&mut pipeline, &mut device, &mut stager, &config, OutputTarget::Present);

    let screen = device.read_default().unwrap();
    let bright = expected(0x0E);
    let dim = bright.map(|channel| channel * 0.5);
    assert_close(screen.pixel(20, 0).unwrap(), bright, "even row");
    assert_close(screen.pixel(20, 1).unwrap(), dim, "odd row");
    assert_close(screen.pixel(20, 2).unwrap(), bright, "even row");
    assert_close(screen.pixel(20, 3).unwrap(), dim, "odd row");
}

#[test]
fn overlay_is_composited_over_the_image() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);

    let mut batch = plotter.begin_update();
    for scanline in 0..ROWS {
        for x in 0..WIDTH {
            batch.set_pixel(Signal {
                horizontal_position: x,
                scanline,
                color_index: 0x0E,
                ..Signal::default()
            });
            if (x, scanline) == (10, 1) {
                batch.reflect(Annotation::Custom([255, 0, 0, 255]));
            }
        }
    }
    batch.end_update();
    plotter.new_frame(1, true).unwrap();

    run_frame(
        &mut pipeline,
        &mut device,
        &mut stager,
        &PipelineConfig::default(),
        OutputTarget::Present,
    );
    let screen = device.read_default().unwrap();
    assert_close(screen.pixel(10, 1).unwrap(), [1.0, 0.0, 0.0], "annotated pixel");
    assert_close(screen.pixel(11, 1).unwrap(), expected(0x0E), "plain pixel");
}

#[test]
fn scratch_output_is_flipped_and_leaves_the_screen_alone() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    let rows = [0x0E, 0x44, 0x86, 0x1E];
    plot_frame(&mut plotter, 1, |_, y| rows[y as usize]);

    let output = run_frame(
        &mut pipeline,
        &mut device,
        &mut stager,
        &PipelineConfig::default(),
        OutputTarget::Scratch,
    );
    let FrameOutput::Scratch(texture) = output else {
        panic!("expected scratch output, got {output:?}");
    };
    assert_eq!(
        Some(texture),
        pipeline
            .sequencer()
            .slot(SlotName::Output)
            .map(|slot| slot.texture())
    );
    let screen = device.read_default().unwrap();
    assert!(screen.texels().iter().all(|texel| *texel == [0.0; 4]));

    let scratch = device.read_texture(texture).unwrap();
    for y in 0..ROWS {
        let source_row = rows[(ROWS - 1 - y) as usize];
        assert_close(scratch.pixel(5, y).unwrap(), expected(source_row), "scratch row");
    }

    let output = pipeline
        .run(&mut device, &PipelineConfig::default(), SIZE, OutputTarget::Present)
        .unwrap();
    assert_eq!(output, FrameOutput::Presented);
    let screen = device.read_default().unwrap();
    for (y, row) in rows.iter().enumerate() {
        assert_close(screen.pixel(5, y as u32).unwrap(), expected(*row), "screen row");
    }
}

#[test]
fn presenting_without_a_surface_fails() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::headless();
    let mut pipeline = pipeline(&mut device);
    plot_frame(&mut plotter, 1, |_, _| 0x0E);

    let staged = stager.render().unwrap();
    let err = pipeline
        .process_frame(
            &mut device,
            &staged,
            &PipelineConfig::default(),
            SIZE,
            OutputTarget::Present,
        )
        .unwrap_err();
    assert_eq!(err, PipelineError::Device(DeviceError::NoDefaultTarget));
}

#[test]
fn failed_frame_settles_again_on_the_next_run() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::headless();
    let mut pipeline = pipeline(&mut device);
    let config = PipelineConfig::default();
    plot_frame(&mut plotter, 1, |_, _| 0x0E);
    let staged = stager.render().unwrap();
    pipeline
        .process_frame(&mut device, &staged, &config, SIZE, OutputTarget::Present)
        .unwrap_err();
    assert_eq!(
        pipeline.sequencer().state(),
        SequencerState::Resizing {
            width: WIDTH,
            height: ROWS
        }
    );
    device.take_draws();

    let output = pipeline
        .run(&mut device, &config, SIZE, OutputTarget::Scratch)
        .unwrap();
    assert!(matches!(output, FrameOutput::Scratch(_)));
    let phosphor = device
        .take_draws()
        .iter()
        .filter(|draw| draw.label == "phosphor")
        .count();
    assert_eq!(phosphor, 3);
    assert_eq!(
        pipeline.sequencer().state(),
        SequencerState::Ready {
            width: WIDTH,
            height: ROWS
        }
    );
}

#[test]
fn run_before_any_upload_is_idle() {
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    let output = pipeline
        .run(&mut device, &PipelineConfig::default(), SIZE, OutputTarget::Present)
        .unwrap();
    assert_eq!(output, FrameOutput::Idle);
    assert!(device.draws().is_empty());
}

#[test]
fn compile_failure_is_fatal_and_leaks_nothing() {
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    device.reject_program("phosphor bloom");

    let err = Pipeline::new(&mut device, Box::new(SeededClock::new(1, 60.0)))
        .err()
        .expect("pipeline construction must fail");
    match err {
        PipelineError::Compile { stage, source } => {
            assert_eq!(stage, "phosphor bloom");
            assert!(matches!(source, DeviceError::Compile { .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(device.live_programs(), 0);
}

#[test]
fn destroy_releases_everything_and_is_terminal() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    plot_frame(&mut plotter, 1, |_, _| 0x0E);
    run_frame(
        &mut pipeline,
        &mut device,
        &mut stager,
        &PipelineConfig::default(),
        OutputTarget::Present,
    );
    assert!(device.live_textures() > 0);

    pipeline.destroy(&mut device);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_framebuffers(), 0);
    assert_eq!(device.live_programs(), 0);
    assert!(pipeline.stage_names().is_empty());

    let err = pipeline
        .run(&mut device, &PipelineConfig::default(), SIZE, OutputTarget::Present)
        .unwrap_err();
    assert_eq!(err, PipelineError::Destroyed);

    plot_frame(&mut plotter, 2, |_, _| 0x0E);
    let staged = stager.render().unwrap();
    assert_eq!(
        pipeline.upload(&mut device, &staged).unwrap_err(),
        PipelineError::Destroyed
    );
}

#[test]
fn raster_textures_follow_the_visible_window() {
    let (mut plotter, mut stager) = setup();
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let mut pipeline = pipeline(&mut device);
    plot_frame(&mut plotter, 1, |_, _| 0x0E);
    run_frame(
        &mut pipeline,
        &mut device,
        &mut stager,
        &PipelineConfig::default(),
        OutputTarget::Present,
    );
    assert_eq!(pipeline.uploader().size(), Some(SIZE));

    plotter.resize(VideoSpec::PAL, 10, 6).unwrap();
    plot_frame(&mut plotter, 2, |_, _| 0x0E);
    let staged = stager.render().unwrap();
    pipeline.upload(&mut device, &staged).unwrap();
    assert_eq!(pipeline.uploader().size(), Some((WIDTH, 6)));
    assert_eq!(pipeline.uploader().uploads(), 2);
}

#[test]
fn stage_names_list_the_chain() {
    let mut device = SoftwareDevice::new(WIDTH, ROWS);
    let pipeline = pipeline(&mut device);
    assert_eq!(
        pipeline.stage_names(),
        [
            "scale",
            "ghosting",
            "phosphor",
            "black level",
            "blur",
            "blend",
            "effects",
            "passthrough"
        ]
    );
    assert_eq!(device.default_target_size(), Some(SIZE));
}

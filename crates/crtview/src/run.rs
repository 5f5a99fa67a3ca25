use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use crtconfig::{PipelineConfig, PresetFile};
use raster::{FrameStager, Geometry};
use renderer::gpu::{GpuContext, SurfaceFrame, WgpuDevice};
use renderer::{clock_for_seed, OutputTarget, Pipeline};
use tracing_subscriber::EnvFilter;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::cli::Cli;
use crate::frame::draw_frame;
use crate::testcard::Emulation;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli, presets: PresetFile) -> Result<()> {
    let mut preset = match cli.preset.clone() {
        Some(name) => name,
        None => presets.default_preset().to_string(),
    };
    let config = presets
        .resolve(Some(&preset))
        .with_context(|| format!("failed to resolve preset '{preset}'"))?;
    tracing::info!(preset = %preset, spec = cli.spec.id, "starting viewer");

    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window = WindowBuilder::new()
        .with_title(title(&preset, cli.spec.id))
        .with_inner_size(PhysicalSize::new(cli.size.0, cli.size.1))
        .build(&event_loop)
        .context("failed to create viewer window")?;
    let window = Arc::new(window);

    let mut state = ViewerState::new(window, &cli, config)?;
    state.window.request_redraw();

    let output = if cli.scratch {
        OutputTarget::Scratch
    } else {
        OutputTarget::Present
    };
    let mut result = Ok(());
    let run_result = event_loop.run(|event, elwt| match event {
        Event::WindowEvent { window_id, event } if window_id == state.window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
            WindowEvent::Resized(new_size) => state.context.resize(new_size),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.logical_key {
                    Key::Named(NamedKey::Escape) => elwt.exit(),
                    Key::Character(ref value) if value.as_str() == "p" => {
                        preset = next_preset(&presets, &preset);
                        match presets.resolve(Some(&preset)) {
                            Ok(config) => {
                                tracing::info!(preset = %preset, "switched preset");
                                state.config = config;
                                state.refresh_title(&preset);
                            }
                            Err(err) => tracing::warn!(error = %err, "failed to switch preset"),
                        }
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => match state.render_frame(output) {
                Ok(_) => {}
                Err(err) => {
                    tracing::error!("unrecoverable render failure: {err:?}");
                    result = Err(err);
                    elwt.exit();
                }
            },
            _ => {}
        },
        Event::AboutToWait => {
            let serviced = state
                .stager
                .as_mut()
                .map_or(0, |stager| stager.service_resizes());
            if serviced > 0 {
                state.refresh_title(&preset);
            }
            state.window.request_redraw();
            elwt.set_control_flow(ControlFlow::Poll);
        }
        Event::LoopExiting => state.shutdown(),
        _ => {}
    });

    run_result.map_err(|err| anyhow!("event loop terminated abnormally: {err}"))?;
    result
}

fn title(preset: &str, spec: &str) -> String {
    format!("crtview - {preset} ({spec})")
}

/// Preset after `current` in name order, wrapping around.
fn next_preset(presets: &PresetFile, current: &str) -> String {
    let names: Vec<&str> = presets.names().collect();
    let index = names.iter().position(|name| *name == current);
    let next = match index {
        Some(index) => names[(index + 1) % names.len()],
        None => presets.default_preset(),
    };
    next.to_string()
}

/// Everything the render thread owns. Field order is drop order: the GPU
/// context must go before the window its surface was created from.
struct ViewerState {
    pipeline: Pipeline,
    device: WgpuDevice,
    context: GpuContext,
    stager: Option<FrameStager>,
    emulation: Option<Emulation>,
    config: PipelineConfig,
    window: Arc<Window>,
}

impl ViewerState {
    fn new(window: Arc<Window>, cli: &Cli, config: PipelineConfig) -> Result<Self> {
        let context = GpuContext::new(&*window, window.inner_size())?;
        let mut device = context.create_device();
        let pipeline = Pipeline::new(&mut device, clock_for_seed(cli.seed, cli.spec.refresh_rate))
            .context("failed to compile post-processing pipeline")?;

        let (plotter, stager) = raster::staging(Geometry::default_for(cli.spec))
            .context("failed to allocate raster staging buffer")?;
        let emulation = Emulation::spawn(plotter, cli.switch_every)
            .context("failed to spawn emulation thread")?;

        Ok(Self {
            pipeline,
            device,
            context,
            stager: Some(stager),
            emulation: Some(emulation),
            config,
            window,
        })
    }

    fn stager(&mut self) -> Result<&mut FrameStager> {
        self.stager
            .as_mut()
            .ok_or_else(|| anyhow!("viewer has shut down"))
    }

    fn render_frame(&mut self, output: OutputTarget) -> Result<SurfaceFrame> {
        let output_size = self.context.size();
        let config = &self.config;
        let pipeline = &mut self.pipeline;
        let stager = self
            .stager
            .as_mut()
            .ok_or_else(|| anyhow!("viewer has shut down"))?;
        self.context.render(&mut self.device, |device| {
            draw_frame(device, stager, pipeline, config, output_size, output).map(|_| ())
        })
    }

    fn refresh_title(&mut self, preset: &str) {
        let spec = match self.stager() {
            Ok(stager) => stager.geometry().spec.id,
            Err(_) => return,
        };
        self.window.set_title(&title(preset, spec));
    }

    /// Stops the emulation thread and releases GPU resources. The stager goes
    /// first so a resize the emulation is blocked on fails instead of hanging.
    fn shutdown(&mut self) {
        self.stager.take();
        if let Some(mut emulation) = self.emulation.take() {
            emulation.stop();
        }
        self.pipeline.destroy(&mut self.device);
        tracing::info!("viewer shut down");
    }
}

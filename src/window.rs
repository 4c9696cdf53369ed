use std::sync::Arc;

use plume::gpu::{Camera, GpuContext, SpritePipeline};
use plume::{DemoError, FrameClock, GpuError, SmokeConfig, SmokeSystem, SpriteTexture};
use rand::rngs::StdRng;
use rand::SeedableRng;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.05,
    g: 0.06,
    b: 0.08,
    a: 1.0,
};
/// Path of an optional sprite image overriding the procedural puff.
const SPRITE_ENV: &str = "PLUME_SPRITE";
const STATS_EVERY: u64 = 240;

struct DemoState {
    surface: wgpu::Surface<'static>,
    ctx: GpuContext,
    config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    sprites: SpritePipeline,
    smoke: SmokeSystem,
    camera: Camera,
    clock: FrameClock,
    rng: StdRng,
}

impl DemoState {
    async fn new(window: Arc<Window>) -> Result<Self, DemoError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window).map_err(GpuError::from)?;
        let ctx = GpuContext::request(&instance, Some(&surface)).await?;

        let caps = surface.get_capabilities(&ctx.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&ctx.device, &config);
        let depth_view = create_depth_texture(&ctx.device, &config);

        let texture = match std::env::var(SPRITE_ENV) {
            Ok(path) => SpriteTexture::from_file(&path).unwrap_or_else(|e| {
                log::warn!("could not load sprite '{}': {}", path, e);
                SpriteTexture::puff(64, 0.35, 7)
            }),
            Err(_) => SpriteTexture::puff(64, 0.35, 7),
        };
        let sprites = SpritePipeline::new(&ctx, format, Some(DEPTH_FORMAT), &texture);

        let smoke_config = SmokeConfig::default();
        let smoke = SmokeSystem::from_config(&smoke_config, Some(&ctx));
        let camera = Camera::looking_at(smoke_config.boundary_center, 40.0);

        Ok(Self {
            surface,
            ctx,
            config,
            depth_view,
            sprites,
            smoke,
            camera,
            clock: FrameClock::new(),
            rng: StdRng::from_entropy(),
        })
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.ctx.device, &self.config);
        self.depth_view = create_depth_texture(&self.ctx.device, &self.config);
    }

    fn reconfigure(&mut self) {
        self.resize(self.config.width, self.config.height);
    }

    fn update(&mut self) {
        let tick = self.clock.tick();
        let view = self.camera.view_matrix();
        let stats = self.smoke.frame(tick.delta, tick.time, &mut self.rng, &view);
        if tick.frame % STATS_EVERY == 0 {
            log::info!(
                "{:.0} fps, {} alive / {} slots{}",
                self.clock.fps(),
                stats.alive,
                stats.total,
                if stats.compacted { ", compacted" } else { "" }
            );
        }

        let aspect = self.config.width as f32 / self.config.height as f32;
        self.sprites.set_projection(self.camera.projection_matrix(aspect));
        self.smoke.submit(&mut self.sprites);
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Smoke Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.sprites.draw(&mut pass);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn create_depth_texture(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

/// Orbit-camera smoke viewer. Drag to orbit, scroll to zoom, space to pause.
pub struct App {
    window: Option<Arc<Window>>,
    state: Option<DemoState>,
    error: Option<DemoError>,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
}

impl App {
    pub fn new() -> Self {
        Self {
            window: None,
            state: None,
            error: None,
            mouse_pressed: false,
            last_mouse_pos: None,
        }
    }

    /// The error that stopped the event loop, if any.
    pub fn finish(self) -> Result<(), DemoError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), DemoError> {
        let attrs = Window::default_attributes()
            .with_title("plume - smoke")
            .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
        let window = Arc::new(event_loop.create_window(attrs)?);
        self.window = Some(window.clone());
        self.state = Some(pollster::block_on(DemoState::new(window))?);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            log::error!("demo startup failed: {}", e);
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(state) = &mut self.state {
                    state.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && event.logical_key == Key::Named(NamedKey::Space) {
                    if let Some(state) = &mut self.state {
                        state.clock.toggle_pause();
                    }
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.mouse_pressed = state == ElementState::Pressed;
                    if !self.mouse_pressed {
                        self.last_mouse_pos = None;
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let (Some((last_x, last_y)), Some(state)) = (self.last_mouse_pos, &mut self.state) {
                        let dx = (position.x - last_x) as f32;
                        let dy = (position.y - last_y) as f32;
                        state.camera.orbit(-dx * 0.005, dy * 0.005);
                    }
                    self.last_mouse_pos = Some((position.x, position.y));
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                };
                if let Some(state) = &mut self.state {
                    state.camera.zoom(1.0 - scroll * 0.1);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(state) = &mut self.state {
                    state.update();
                    match state.render() {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => state.reconfigure(),
                        Err(wgpu::SurfaceError::OutOfMemory) => event_loop.exit(),
                        Err(e) => log::warn!("render error: {:?}", e),
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

//! Preview window
//!
//! Shows the mirrored camera feed with the detected hand skeleton and an
//! FPS readout painted on top. Built on winit + wgpu with egui doing the
//! 2D drawing; the window is driven synchronously from the gesture loop
//! through winit's pump-events API so the loop stays single-threaded,
//! with a bounded 1 ms poll for keyboard input.

use std::sync::Arc;
use std::time::Duration;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::camera::CameraFrame;
use crate::hand::{HandPose, HAND_CONNECTIONS};

const DEFAULT_WIDTH: u32 = 1280;
const DEFAULT_HEIGHT: u32 = 720;
/// Bounded wait for the per-iteration key poll.
const KEY_POLL: Duration = Duration::from_millis(1);

/// Keys the gesture loop cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    /// Operator requested termination (Q, Escape, or window close).
    Quit,
}

/// Drawing and display surface for the gesture loop. `draw_landmarks`
/// and `put_text` buffer overlay items that the next `show` paints over
/// the frame. Implemented by the real window and by fakes in tests.
pub trait Display {
    fn draw_landmarks(&mut self, pose: &HandPose);
    fn put_text(&mut self, text: &str, position: (u32, u32));
    fn show(&mut self, frame: &CameraFrame);
    fn poll_key(&mut self) -> Option<Key>;
}

/// Overlay items buffered between `draw_landmarks`/`put_text` and `show`.
#[derive(Default)]
struct Overlay {
    poses: Vec<HandPose>,
    texts: Vec<(String, (u32, u32))>,
}

/// Windowed display implementation.
pub struct WindowDisplay {
    event_loop: EventLoop<()>,
    handler: PreviewHandler,
}

impl WindowDisplay {
    /// Open the preview window with the given title. Blocks pumping the
    /// event loop until the platform has delivered the window.
    pub fn open(title: &str) -> Result<Self, String> {
        let event_loop =
            EventLoop::new().map_err(|e| format!("Failed to create event loop: {e}"))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut display = Self {
            event_loop,
            handler: PreviewHandler::new(title),
        };

        // The window is created on the first Resumed event; give the
        // platform a bounded number of pumps to deliver it.
        for _ in 0..100 {
            display.pump(Duration::from_millis(10));
            if display.handler.gfx.is_some() {
                log::info!("Preview window ready");
                return Ok(display);
            }
        }

        Err("Preview window was never created".to_string())
    }

    fn pump(&mut self, timeout: Duration) {
        let status = self
            .event_loop
            .pump_app_events(Some(timeout), &mut self.handler);
        if let PumpStatus::Exit(_) = status {
            self.handler.pending_key = Some(Key::Quit);
        }
    }
}

impl Display for WindowDisplay {
    fn draw_landmarks(&mut self, pose: &HandPose) {
        self.handler.overlay.poses.push(pose.clone());
    }

    fn put_text(&mut self, text: &str, position: (u32, u32)) {
        self.handler.overlay.texts.push((text.to_string(), position));
    }

    fn show(&mut self, frame: &CameraFrame) {
        let overlay = std::mem::take(&mut self.handler.overlay);
        if let Some(gfx) = self.handler.gfx.as_mut() {
            match gfx.render(frame, &overlay) {
                Ok(()) => {}
                Err(wgpu::SurfaceError::Lost) => {
                    log::warn!("Surface lost, reconfiguring...");
                    gfx.resize(gfx.size);
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    log::error!("Out of GPU memory!");
                    self.handler.pending_key = Some(Key::Quit);
                }
                Err(e) => {
                    log::warn!("Surface error: {:?}", e);
                }
            }
        }
    }

    fn poll_key(&mut self) -> Option<Key> {
        self.pump(KEY_POLL);
        self.handler.pending_key.take()
    }
}

/// winit application handler owning the window and graphics state.
struct PreviewHandler {
    title: String,
    gfx: Option<Gfx>,
    overlay: Overlay,
    pending_key: Option<Key>,
}

impl PreviewHandler {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            gfx: None,
            overlay: Overlay::default(),
            pending_key: None,
        }
    }
}

impl ApplicationHandler for PreviewHandler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gfx.is_some() {
            return;
        }

        log::info!("Creating window...");
        let window_attributes = WindowAttributes::default()
            .with_title(&self.title)
            .with_inner_size(LogicalSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT));

        match event_loop.create_window(window_attributes) {
            Ok(window) => {
                let window = Arc::new(window);
                log::info!(
                    "Window created: {}x{}",
                    window.inner_size().width,
                    window.inner_size().height
                );
                self.gfx = Some(pollster::block_on(Gfx::new(window)));
            }
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(gfx) = self.gfx.as_mut() else {
            return;
        };

        let response = gfx.egui_state.on_window_event(&gfx.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                self.pending_key = Some(Key::Quit);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } if !response.consumed => match key_code {
                KeyCode::KeyQ | KeyCode::Escape => {
                    self.pending_key = Some(Key::Quit);
                }
                _ => {}
            },
            WindowEvent::Resized(physical_size) => {
                gfx.resize(physical_size);
            }
            _ => {}
        }
    }
}

/// wgpu surface plus egui integration for one window.
struct Gfx {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,

    egui_ctx: egui::Context,
    egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,

    /// Camera frame uploaded as an egui texture each iteration.
    camera_texture: Option<egui::TextureHandle>,
}

impl Gfx {
    async fn new(window: Arc<Window>) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("Failed to create surface");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to find suitable GPU adapter");

        log::info!("Using GPU: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Gesture Cam Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .expect("Failed to create device");

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };
        surface.configure(&device, &config);

        let egui_ctx = egui::Context::default();
        let mut style = (*egui_ctx.style()).clone();
        style.visuals.window_shadow = egui::epaint::Shadow::NONE;
        egui_ctx.set_style(style);

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        Self {
            window,
            surface,
            device,
            queue,
            config,
            size,
            egui_ctx,
            egui_state,
            egui_renderer,
            camera_texture: None,
        }
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&self.device, &self.config);
        }
    }

    fn render(&mut self, frame: &CameraFrame, overlay: &Overlay) -> Result<(), wgpu::SurfaceError> {
        // Upload the frame into an egui-managed texture.
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [frame.width as usize, frame.height as usize],
            &frame.data,
        );
        match self.camera_texture.as_mut() {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.camera_texture = Some(self.egui_ctx.load_texture(
                    "camera-frame",
                    image,
                    egui::TextureOptions::LINEAR,
                ));
            }
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let raw_input = self.egui_state.take_egui_input(&self.window);

        let ctx = self.egui_ctx.clone();
        let texture = self.camera_texture.clone();
        let frame_size = egui::vec2(frame.width as f32, frame.height as f32);

        let full_output = ctx.run(raw_input, |ctx| {
            egui::CentralPanel::default()
                .frame(egui::Frame::NONE.fill(egui::Color32::BLACK))
                .show(ctx, |ui| {
                    let Some(texture) = texture.as_ref() else {
                        return;
                    };

                    // Fit the frame into the window, preserving aspect.
                    let avail = ui.available_size();
                    let scale = (avail.x / frame_size.x).min(avail.y / frame_size.y);
                    let shown = frame_size * scale;
                    let response =
                        ui.add(egui::Image::new(texture).fit_to_exact_size(shown));
                    let origin = response.rect.min;

                    let to_screen = |x: u32, y: u32| {
                        origin + egui::vec2(x as f32 * scale, y as f32 * scale)
                    };

                    let painter = ui.painter();
                    for pose in &overlay.poses {
                        for (a, b) in HAND_CONNECTIONS {
                            let pa = pose.points()[a];
                            let pb = pose.points()[b];
                            painter.line_segment(
                                [to_screen(pa.x, pa.y), to_screen(pb.x, pb.y)],
                                egui::Stroke::new(2.0, egui::Color32::GREEN),
                            );
                        }
                        for point in pose.points() {
                            painter.circle_filled(
                                to_screen(point.x, point.y),
                                4.0,
                                egui::Color32::RED,
                            );
                        }
                    }

                    for (text, (x, y)) in &overlay.texts {
                        painter.text(
                            to_screen(*x, *y),
                            egui::Align2::LEFT_BOTTOM,
                            text,
                            egui::FontId::monospace(28.0 * scale),
                            egui::Color32::WHITE,
                        );
                    }
                });
        });

        self.egui_state
            .handle_platform_output(&self.window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.egui_renderer
                .update_texture(&self.device, &self.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: self.window.scale_factor() as f32,
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Preview Encoder"),
            });

        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &paint_jobs,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Preview Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            // egui-wgpu wants a 'static render pass lifetime.
            let render_pass_static: &mut wgpu::RenderPass<'static> =
                unsafe { std::mem::transmute(&mut render_pass) };

            self.egui_renderer
                .render(render_pass_static, &paint_jobs, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

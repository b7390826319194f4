//! Application runner and event loop.

use std::sync::Arc;

use monocube_gpu::{FrameDriver, FrameOutcome, GpuContext, GpuContextBuilder, SurfaceContext, WindowSurface};
use monocube_render::CubeRenderer;
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};

/// Per-step timeout for acquire and each fence wait attempt.
const FRAME_TIMEOUT_NS: u64 = 1_000_000_000;
/// Timed-out fence waits retried before the frame fails.
const FENCE_WAIT_RETRIES: u32 = 3;

/// Application configuration.
#[derive(Clone)]
pub struct ViewerConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Enable vsync.
    pub vsync: bool,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            title: "Monocube".to_string(),
            width: 800,
            height: 600,
            vsync: true,
            validation: cfg!(debug_assertions),
        }
    }
}

impl ViewerConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable vsync.
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }
}

/// Run the viewer: render one frame, then exit.
///
/// Any failure surfaces here as the process result; the caller maps it
/// to the exit status.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    info!("{} starting...", config.title);

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer {
        config,
        state: None,
        rendered: false,
        error: None,
    };

    event_loop.run_app(&mut viewer)?;

    match viewer.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Internal application runner that implements winit's ApplicationHandler.
struct Viewer {
    config: ViewerConfig,
    state: Option<ViewerState>,
    rendered: bool,
    error: Option<anyhow::Error>,
}

/// Window, GPU context, and the frame driver.
struct ViewerState {
    window: Arc<Window>,
    gpu: GpuContext,
    surface: SurfaceContext,
    driver: FrameDriver<CubeRenderer>,
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        match self.create_state(event_loop) {
            Ok(state) => {
                state.window.request_redraw();
                self.state = Some(state);
            }
            Err(e) => {
                error!("Failed to initialize: {e}");
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key: Key::Named(NamedKey::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => {
                info!("Close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::RedrawRequested => {
                if self.rendered {
                    return;
                }
                self.rendered = true;

                if let Some(state) = &mut self.state {
                    match state.render_once() {
                        Ok(outcome) => {
                            info!("Frame presented: {outcome:?}");
                            if outcome == FrameOutcome::Suboptimal {
                                info!("Surface geometry changed; presentation still succeeded");
                            }
                        }
                        Err(e) => {
                            error!("Render error: {e}");
                            self.error = Some(e);
                        }
                    }
                }

                self.shutdown(event_loop);
            }
            _ => {}
        }
    }
}

impl Viewer {
    fn create_state(&self, event_loop: &ActiveEventLoop) -> anyhow::Result<ViewerState> {
        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(event_loop.create_window(window_attrs)?);

        // The one surface acquisition strategy: this window's handles.
        let strategy = WindowSurface::new(window.clone());

        let (gpu, surface) = GpuContextBuilder::new()
            .app_name(&self.config.title)
            .validation(self.config.validation)
            .build(&strategy)?;

        info!("GPU: {}", gpu.capabilities().summary());

        let size = window.inner_size();
        let renderer = unsafe {
            CubeRenderer::new(
                &gpu,
                &surface,
                size.width.max(1),
                size.height.max(1),
                self.config.vsync,
            )?
        };

        let driver = FrameDriver::new(renderer).with_wait_retries(FENCE_WAIT_RETRIES);

        Ok(ViewerState {
            window,
            gpu,
            surface,
            driver,
        })
    }

    /// Tear down and exit. Teardown is symmetric on every exit path:
    /// device idle-wait, then resource release in reverse acquisition
    /// order.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(state) = self.state.take() {
            state.cleanup();
        }
        event_loop.exit();
    }
}

impl ViewerState {
    fn render_once(&mut self) -> anyhow::Result<FrameOutcome> {
        let request = self.driver.backend().frame_request();
        let outcome = self.driver.submit_frame(&request, FRAME_TIMEOUT_NS)?;
        Ok(outcome)
    }

    fn cleanup(self) {
        info!("Starting cleanup...");

        let mut driver = self.driver;
        if let Err(e) = driver.wait_idle() {
            error!("Failed to wait idle: {e}");
        }

        let mut renderer = driver.into_backend();
        unsafe {
            renderer.destroy(&self.gpu);
            self.surface.destroy();
        }
        // GpuContext drop waits for the device and destroys it, then
        // the instance.
        drop(self.gpu);

        info!("Cleanup complete");
    }
}

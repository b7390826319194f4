//! Presentation surface acquisition.
//!
//! Surface acquisition is a single polymorphic capability: a strategy
//! names the instance extensions it needs and creates the surface.
//! Exactly one concrete strategy is selected at configuration time;
//! there are no alternate dead code paths.

use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;

/// How a presentation surface is obtained.
pub trait SurfaceStrategy {
    /// Instance extensions that must be enabled for `create_surface`.
    fn instance_extensions(&self) -> Result<Vec<&'static CStr>>;

    /// Create the presentation surface.
    ///
    /// # Safety
    /// The entry and instance must be valid, and the instance must have
    /// been created with the extensions from `instance_extensions`.
    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR>;
}

/// Surface acquisition from a window's raw handles (the one concrete
/// strategy: winit windows via ash-window).
pub struct WindowSurface<W> {
    window: W,
}

impl<W> WindowSurface<W>
where
    W: HasDisplayHandle + HasWindowHandle,
{
    /// Wrap a window.
    pub fn new(window: W) -> Self {
        Self { window }
    }
}

impl<W> SurfaceStrategy for WindowSurface<W>
where
    W: HasDisplayHandle + HasWindowHandle,
{
    fn instance_extensions(&self) -> Result<Vec<&'static CStr>> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;

        let extensions = ash_window::enumerate_required_extensions(display.as_raw())
            .map_err(GpuError::from)?;

        // SAFETY: ash-window returns static, NUL-terminated extension names
        Ok(extensions
            .iter()
            .map(|&ptr| unsafe { CStr::from_ptr(ptr) })
            .collect())
    }

    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        let display = self
            .window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
        let window_handle = self
            .window
            .window_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                display.as_raw(),
                window_handle.as_raw(),
                None,
            )
        }
        .map_err(|e| GpuError::SurfaceCreation(e.to_string()))
    }
}

/// Surface context for windowed rendering.
///
/// Owns the Vulkan surface and the extension loaders needed to query,
/// acquire from, and present to it.
pub struct SurfaceContext {
    /// The Vulkan surface handle.
    pub surface: vk::SurfaceKHR,
    /// Surface extension loader.
    pub surface_loader: ash::khr::surface::Instance,
    /// Swapchain extension loader.
    pub swapchain_loader: ash::khr::swapchain::Device,
}

impl SurfaceContext {
    /// Query surface capabilities, formats, and present modes.
    pub fn capabilities(&self, gpu: &GpuContext) -> Result<SurfaceCapabilities> {
        unsafe {
            let caps = self
                .surface_loader
                .get_physical_device_surface_capabilities(gpu.physical_device(), self.surface)?;

            let formats = self
                .surface_loader
                .get_physical_device_surface_formats(gpu.physical_device(), self.surface)?;

            let present_modes = self
                .surface_loader
                .get_physical_device_surface_present_modes(gpu.physical_device(), self.surface)?;

            Ok(SurfaceCapabilities {
                capabilities: caps,
                formats,
                present_modes,
            })
        }
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// The surface must not be in use, and must be destroyed before the
    /// instance.
    pub unsafe fn destroy(&self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

/// Surface capabilities query result.
pub struct SurfaceCapabilities {
    /// Raw surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

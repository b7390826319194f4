//! GPU context management.

use crate::capabilities::GpuCapabilities;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, select_physical_device};
use crate::memory::GpuAllocator;
use crate::surface::{SurfaceContext, SurfaceStrategy};
use ash::vk;
use parking_lot::Mutex;
use std::ffi::CStr;
use std::sync::Arc;

/// Main GPU context holding Vulkan resources.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    pub(crate) entry: ash::Entry,
    pub(crate) instance: ash::Instance,
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) device: Arc<ash::Device>,
    pub(crate) capabilities: GpuCapabilities,
    pub(crate) allocator: Mutex<GpuAllocator>,

    // Queue families and queues
    pub(crate) graphics_queue_family: u32,
    pub(crate) present_queue_family: u32,
    pub(crate) graphics_queue: vk::Queue,
    pub(crate) present_queue: vk::Queue,
}

impl GpuContext {
    /// Get the Vulkan device handle.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the physical device handle.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Get GPU capabilities.
    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the presentation queue. Same handle as the graphics queue
    /// when one family serves both.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get the graphics queue family index.
    pub fn graphics_queue_family(&self) -> u32 {
        self.graphics_queue_family
    }

    /// Get the presentation queue family index.
    pub fn present_queue_family(&self) -> u32 {
        self.present_queue_family
    }

    /// Get the Vulkan instance handle.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get access to the GPU allocator.
    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // Shutdown allocator BEFORE destroying device
            // This frees all VkDeviceMemory allocations
            self.allocator.lock().shutdown();

            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "Monocube".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the GPU context and its presentation surface.
    ///
    /// The strategy supplies the instance extensions and creates the
    /// surface; the present queue family is chosen against that surface.
    pub fn build(self, strategy: &dyn SurfaceStrategy) -> Result<(GpuContext, SurfaceContext)> {
        // Load Vulkan entry point
        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Other(format!("Failed to load Vulkan: {e}")))?;

        // Create Vulkan instance with the strategy's extensions
        let surface_extensions = strategy.instance_extensions()?;
        let instance = unsafe {
            create_instance(
                &entry,
                &self.app_name,
                &surface_extensions,
                self.enable_validation,
            )
        }?;

        // Create the presentation surface
        let surface = unsafe { strategy.create_surface(&entry, &instance) }?;
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        // Select best physical device
        let physical_device = unsafe { select_physical_device(&instance) }?;

        // Query capabilities
        let capabilities = unsafe { GpuCapabilities::query(&instance, physical_device) };

        // Validate requirements
        if !capabilities.meets_requirements() {
            return Err(GpuError::NoSuitableDevice);
        }

        tracing::info!("Selected GPU: {}", capabilities.summary());

        // Find queue families against the surface
        let queue_families = unsafe {
            find_queue_families(&instance, physical_device, &surface_loader, surface)
        }?;

        // Create logical device
        let (device, graphics_queue, present_queue) =
            unsafe { create_device(&instance, physical_device, &queue_families)? };

        let device = Arc::new(device);

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        // Create GPU allocator
        let allocator = unsafe { GpuAllocator::new(&instance, device.clone(), physical_device) }?;

        let gpu = GpuContext {
            entry,
            instance,
            physical_device,
            device,
            capabilities,
            allocator: Mutex::new(allocator),
            graphics_queue_family: queue_families.graphics,
            present_queue_family: queue_families.present,
            graphics_queue,
            present_queue,
        };

        let surface_ctx = SurfaceContext {
            surface,
            surface_loader,
            swapchain_loader,
        };

        Ok((gpu, surface_ctx))
    }
}

/// Queue family indices.
struct QueueFamilyIndices {
    graphics: u32,
    present: u32,
}

/// Find a graphics queue family and a family able to present to the
/// surface. One family serving both is preferred.
///
/// # Safety
/// All handles must be valid.
unsafe fn find_queue_families(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<QueueFamilyIndices> {
    let queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    let mut graphics_family = None;
    let mut present_family = None;

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;

        let supports_graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let supports_present = unsafe {
            surface_loader
                .get_physical_device_surface_support(physical_device, i, surface)
                .unwrap_or(false)
        };

        if supports_graphics && supports_present {
            // One family for both; no cross-queue ownership transfers
            return Ok(QueueFamilyIndices {
                graphics: i,
                present: i,
            });
        }

        if supports_graphics && graphics_family.is_none() {
            graphics_family = Some(i);
        }
        if supports_present && present_family.is_none() {
            present_family = Some(i);
        }
    }

    let graphics = graphics_family.ok_or(GpuError::NoSuitableDevice)?;
    let present = present_family.ok_or(GpuError::NoSuitableDevice)?;

    Ok(QueueFamilyIndices { graphics, present })
}

/// Required device extensions.
fn required_device_extensions() -> Vec<&'static CStr> {
    vec![ash::khr::swapchain::NAME]
}

/// Create the logical device and retrieve queues.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: &QueueFamilyIndices,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    // Collect unique queue families
    let mut unique_families = std::collections::HashSet::new();
    unique_families.insert(queue_families.graphics);
    unique_families.insert(queue_families.present);

    // Create queue create infos
    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    // Get required extensions
    let extensions = required_device_extensions();
    let extension_names: Vec<*const i8> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    // Enable Vulkan 1.3 features
    let mut vulkan_1_3_features = vk::PhysicalDeviceVulkan13Features::default()
        .dynamic_rendering(true)
        .synchronization2(true);

    let mut features2 =
        vk::PhysicalDeviceFeatures2::default().push_next(&mut vulkan_1_3_features);

    // Create the device
    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .push_next(&mut features2);

    let device = unsafe {
        instance
            .create_device(physical_device, &device_create_info, None)
            .map_err(GpuError::from)?
    };

    // Get queue handles
    let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
    let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };

    Ok((device, graphics_queue, present_queue))
}

//! Vulkan abstraction layer for monocube.
//!
//! This crate provides:
//! - Vulkan instance and device management
//! - GPU capability detection
//! - Surface and swapchain handling
//! - Memory allocation via gpu-allocator
//! - Command buffer and pipeline helpers
//! - The one-shot frame submission driver

pub mod capabilities;
pub mod command;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod frame;
pub mod instance;
pub mod memory;
pub mod pipeline;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use capabilities::{GpuCapabilities, GpuVendor};
pub use context::{GpuContext, GpuContextBuilder};
pub use descriptors::{write_uniform_buffer, DescriptorPool, DescriptorSetLayoutBuilder};
pub use error::{GpuError, Result};
pub use frame::{
    AcquiredImage, DrawCall, FenceStatus, FrameBackend, FrameDriver, FrameError, FrameErrorKind,
    FrameOutcome, FramePhase, FrameRequest, PresentStatus,
};
pub use memory::{GpuAllocator, GpuBuffer, GpuImage};
pub use pipeline::{GraphicsPipeline, GraphicsPipelineConfig};
pub use surface::{SurfaceContext, SurfaceStrategy, WindowSurface};
pub use swapchain::Swapchain;
pub use sync::{create_fence, create_semaphore, FrameSync};

//! The cube renderer: the production frame backend.
//!
//! Owns every presentation-side resource the one-shot frame needs
//! (swapchain, depth attachment, pipeline, buffers, command buffers,
//! and the frame synchronization pair) and records the cube pass for
//! whichever swapchain image was acquired.

use ash::vk;
use glam::Mat4;
use gpu_allocator::MemoryLocation;

use monocube_gpu::command::{begin_command_buffer, end_command_buffer, submit_command_buffers, CommandPool};
use monocube_gpu::swapchain::{calculate_extent, select_present_mode, select_surface_format};
use monocube_gpu::sync::{wait_for_fence, FrameSync};
use monocube_gpu::{
    write_uniform_buffer, AcquiredImage, DescriptorPool, DescriptorSetLayoutBuilder, DrawCall,
    FenceStatus, FrameBackend, FrameError, FrameRequest, GpuBuffer, GpuContext, GpuError,
    GpuImage, GraphicsPipeline, GraphicsPipelineConfig, PresentStatus, Result, SurfaceContext,
    Swapchain,
};

use crate::camera::Camera;
use crate::cube::{Vertex, CUBE_VERTICES};

/// Clear color of the demo frame.
pub const CLEAR_COLOR: [f32; 4] = [0.3, 0.2, 0.2, 0.2];

/// Depth attachment format.
const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Renders the hard-coded cube to the swapchain.
pub struct CubeRenderer {
    device: ash::Device,
    swapchain_loader: ash::khr::swapchain::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,

    swapchain: Swapchain,
    depth_image: GpuImage,
    depth_view: vk::ImageView,

    descriptor_layout: vk::DescriptorSetLayout,
    descriptor_pool: DescriptorPool,
    descriptor_set: vk::DescriptorSet,
    pipeline: GraphicsPipeline,

    vertex_buffer: GpuBuffer,
    uniform_buffer: GpuBuffer,

    command_pool: CommandPool,
    /// One command buffer per swapchain image.
    command_buffers: Vec<vk::CommandBuffer>,
    sync: FrameSync,
}

impl CubeRenderer {
    /// Create the renderer and all its presentation resources.
    ///
    /// # Safety
    /// The GPU context and surface must be valid.
    pub unsafe fn new(
        gpu: &GpuContext,
        surface: &SurfaceContext,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<Self> {
        let device = gpu.device().clone();
        let swapchain_loader = surface.swapchain_loader.clone();

        // Negotiate and create the swapchain
        let caps = surface.capabilities(gpu)?;
        let surface_format = select_surface_format(&caps.formats);
        let present_mode = select_present_mode(&caps.present_modes, vsync);
        let extent = calculate_extent(&caps.capabilities, width, height);

        let swapchain = unsafe {
            Swapchain::new(
                &device,
                &swapchain_loader,
                surface.surface,
                &caps.capabilities,
                surface_format,
                present_mode,
                extent,
                gpu.graphics_queue_family(),
            )?
        };

        tracing::info!(
            "Swapchain created: {}x{} ({} images)",
            swapchain.extent.width,
            swapchain.extent.height,
            swapchain.images.len()
        );

        // Depth attachment
        let depth_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let depth_image =
            gpu.allocator()
                .lock()
                .create_image(&depth_info, MemoryLocation::GpuOnly, "depth")?;

        let depth_view_info = vk::ImageViewCreateInfo::default()
            .image(depth_image.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::DEPTH)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        let depth_view = unsafe { device.create_image_view(&depth_view_info, None)? };

        // Geometry and uniforms
        let mut vertex_buffer = gpu.allocator().lock().create_buffer(
            std::mem::size_of_val(&CUBE_VERTICES) as u64,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            MemoryLocation::CpuToGpu,
            "cube vertices",
        )?;
        vertex_buffer.write(&CUBE_VERTICES)?;

        let mut camera = Camera::default();
        camera.set_aspect(extent.width as f32 / extent.height as f32);
        let uniforms = camera.uniforms(Mat4::IDENTITY);

        let mut uniform_buffer = gpu.allocator().lock().create_buffer(
            std::mem::size_of_val(&uniforms) as u64,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::CpuToGpu,
            "scene uniforms",
        )?;
        uniform_buffer.write(&[uniforms])?;

        // Descriptors
        let descriptor_layout = unsafe {
            DescriptorSetLayoutBuilder::new()
                .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
                .build(&device)?
        };

        let pool_sizes = [vk::DescriptorPoolSize::default()
            .ty(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)];
        let descriptor_pool = unsafe { DescriptorPool::new(&device, 1, &pool_sizes)? };
        let descriptor_set = unsafe { descriptor_pool.allocate(&device, &[descriptor_layout])?[0] };

        unsafe {
            write_uniform_buffer(
                &device,
                descriptor_set,
                0,
                uniform_buffer.buffer,
                0,
                uniform_buffer.size,
            );
        }

        // Pipeline
        let pipeline_config = GraphicsPipelineConfig {
            vertex_shader: monocube_shaders::cube_vertex_shader().to_vec(),
            fragment_shader: monocube_shaders::cube_fragment_shader().to_vec(),
            vertex_bindings: vec![Vertex::binding_description()],
            vertex_attributes: Vertex::attribute_descriptions().to_vec(),
            color_formats: vec![swapchain.format],
            depth_format: Some(DEPTH_FORMAT),
            ..Default::default()
        };

        let pipeline =
            unsafe { GraphicsPipeline::new(&device, &pipeline_config, &[descriptor_layout])? };

        // Command buffers, one per swapchain image
        let command_pool = unsafe {
            CommandPool::new(
                &device,
                gpu.graphics_queue_family(),
                vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            )?
        };
        let command_buffers = unsafe {
            command_pool.allocate_command_buffers(
                &device,
                vk::CommandBufferLevel::PRIMARY,
                swapchain.image_count(),
            )?
        };

        let sync = unsafe { FrameSync::new(&device)? };

        Ok(Self {
            device,
            swapchain_loader,
            graphics_queue: gpu.graphics_queue(),
            present_queue: gpu.present_queue(),
            swapchain,
            depth_image,
            depth_view,
            descriptor_layout,
            descriptor_pool,
            descriptor_set,
            pipeline,
            vertex_buffer,
            uniform_buffer,
            command_pool,
            command_buffers,
            sync,
        })
    }

    /// Current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    /// The canonical one-shot request: full-extent render area, the
    /// demo clear values, one 36-vertex cube draw.
    pub fn frame_request(&self) -> FrameRequest {
        let render_area = vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent: self.swapchain.extent,
        };
        FrameRequest::new(render_area)
            .with_clear_color(CLEAR_COLOR)
            .with_clear_depth(1.0)
            .with_draw(DrawCall::new(CUBE_VERTICES.len() as u32))
    }

    /// Destroy all resources in reverse acquisition order.
    ///
    /// # Safety
    /// The device must be idle.
    pub unsafe fn destroy(&mut self, gpu: &GpuContext) {
        unsafe {
            self.sync.destroy(&self.device);
            self.command_pool.destroy(&self.device);
            self.pipeline.destroy(&self.device);
            self.descriptor_pool.destroy(&self.device);
            self.device
                .destroy_descriptor_set_layout(self.descriptor_layout, None);

            let mut allocator = gpu.allocator().lock();
            if let Err(e) = allocator.free_buffer(&mut self.uniform_buffer) {
                tracing::warn!("Failed to free uniform buffer: {e}");
            }
            if let Err(e) = allocator.free_buffer(&mut self.vertex_buffer) {
                tracing::warn!("Failed to free vertex buffer: {e}");
            }

            self.device.destroy_image_view(self.depth_view, None);
            if let Err(e) = allocator.free_image(&mut self.depth_image) {
                tracing::warn!("Failed to free depth image: {e}");
            }

            self.swapchain.destroy(&self.device, &self.swapchain_loader);
        }
    }
}

impl FrameBackend for CubeRenderer {
    fn image_count(&self) -> u32 {
        self.swapchain.image_count()
    }

    fn acquire_image(&mut self, timeout_ns: u64) -> std::result::Result<AcquiredImage, FrameError> {
        let acquired = unsafe {
            self.swapchain.acquire_next_image(
                &self.swapchain_loader,
                self.sync.image_available,
                timeout_ns,
            )?
        };

        // Reset the fence only after a successful acquire, so a failed
        // frame leaves it signaled.
        unsafe { self.sync.reset(&self.device)? };

        Ok(acquired)
    }

    fn record(
        &mut self,
        image_index: u32,
        request: &FrameRequest,
    ) -> std::result::Result<(), FrameError> {
        let image_count = self.swapchain.image_count();
        if image_index >= image_count {
            return Err(FrameError::InvalidImageIndex {
                index: image_index,
                image_count,
            });
        }
        let idx = image_index as usize;
        let cmd = self.command_buffers[idx];

        unsafe {
            self.device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(GpuError::from)?;
            begin_command_buffer(&self.device, cmd, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;

            // Attachments into renderable layouts
            let color_range = vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .level_count(1)
                .layer_count(1);
            let depth_range = vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::DEPTH)
                .level_count(1)
                .layer_count(1);

            let to_renderable = [
                vk::ImageMemoryBarrier::default()
                    .src_access_mask(vk::AccessFlags::empty())
                    .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(self.swapchain.images[idx])
                    .subresource_range(color_range),
                vk::ImageMemoryBarrier::default()
                    .src_access_mask(vk::AccessFlags::empty())
                    .dst_access_mask(
                        vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
                    )
                    .old_layout(vk::ImageLayout::UNDEFINED)
                    .new_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                    .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                    .image(self.depth_image.image)
                    .subresource_range(depth_range),
            ];

            self.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::TOP_OF_PIPE,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &to_renderable,
            );

            // Cube pass
            let clear_color = vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: request.clear_color,
                },
            };
            let clear_depth = vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: request.clear_depth,
                    stencil: 0,
                },
            };

            let color_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(self.swapchain.image_views[idx])
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(clear_color);

            let depth_attachment = vk::RenderingAttachmentInfo::default()
                .image_view(self.depth_view)
                .image_layout(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .clear_value(clear_depth);

            let rendering_info = vk::RenderingInfo::default()
                .render_area(request.render_area)
                .layer_count(1)
                .color_attachments(std::slice::from_ref(&color_attachment))
                .depth_attachment(&depth_attachment);

            self.device.cmd_begin_rendering(cmd, &rendering_info);

            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);
            self.device.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout,
                0,
                &[self.descriptor_set],
                &[],
            );
            self.device
                .cmd_bind_vertex_buffers(cmd, 0, &[self.vertex_buffer.buffer], &[0]);

            let viewport = vk::Viewport::default()
                .x(request.render_area.offset.x as f32)
                .y(request.render_area.offset.y as f32)
                .width(request.render_area.extent.width as f32)
                .height(request.render_area.extent.height as f32)
                .min_depth(0.0)
                .max_depth(1.0);
            self.device.cmd_set_viewport(cmd, 0, &[viewport]);
            self.device.cmd_set_scissor(cmd, 0, &[request.render_area]);

            for draw in &request.draws {
                self.device.cmd_draw(
                    cmd,
                    draw.vertex_count,
                    draw.instance_count,
                    draw.first_vertex,
                    draw.first_instance,
                );
            }

            self.device.cmd_end_rendering(cmd);

            // Color attachment into presentable layout
            let to_present = vk::ImageMemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
                .dst_access_mask(vk::AccessFlags::empty())
                .old_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .new_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(self.swapchain.images[idx])
                .subresource_range(color_range);

            self.device.cmd_pipeline_barrier(
                cmd,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                vk::PipelineStageFlags::BOTTOM_OF_PIPE,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[to_present],
            );

            end_command_buffer(&self.device, cmd)?;
        }

        Ok(())
    }

    fn submit(&mut self, image_index: u32) -> std::result::Result<(), FrameError> {
        let cmd = self.command_buffers[image_index as usize];

        let command_buffers = [cmd];
        let wait_semaphores = [self.sync.image_available];
        // Color writes wait for the acquired image; earlier stages overlap
        // with acquisition.
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [self.sync.render_finished];

        unsafe {
            submit_command_buffers(
                &self.device,
                self.graphics_queue,
                &command_buffers,
                &wait_semaphores,
                &wait_stages,
                &signal_semaphores,
                self.sync.in_flight,
            )?;
        }
        Ok(())
    }

    fn wait_render_fence(
        &mut self,
        timeout_ns: u64,
    ) -> std::result::Result<FenceStatus, FrameError> {
        let status = unsafe { wait_for_fence(&self.device, self.sync.in_flight, timeout_ns)? };
        Ok(status)
    }

    fn present(&mut self, image_index: u32) -> std::result::Result<PresentStatus, FrameError> {
        unsafe {
            self.swapchain.present(
                &self.swapchain_loader,
                self.present_queue,
                image_index,
                &[self.sync.render_finished],
            )
        }
    }

    fn wait_idle(&mut self) -> std::result::Result<(), FrameError> {
        unsafe {
            self.device
                .device_wait_idle()
                .map_err(GpuError::from)?;
        }
        Ok(())
    }
}

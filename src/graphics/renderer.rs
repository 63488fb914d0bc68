//! Frame renderer: command buffer lifecycle, matrix uploads and draw submission
//!
//! The renderer records into one command buffer per frame:
//! 1. [`Renderer::begin_command_buffer`] selects the swapchain image's matrix pool
//! 2. [`Renderer::render`] and [`Renderer::dispatch`] record work, skipping
//!    redundant pipeline binds and re-uploading matrices only when they changed
//! 3. [`Renderer::end_command_buffer`] hands the buffer back for submission

use crate::config::RendererConfig;
use crate::error::{CrateResult, RenderError};
use crate::graphics::buffer::HostBuffer;
use crate::graphics::frame_cache::{MatrixBlockCache, MatrixResourceAllocator};
use ash::{vk, Device};
use glam::Mat4;
use shared::MatrixBlock;

/// What the renderer needs to know about the swapchain
pub trait SwapchainInfo {
    /// Index of the image acquired for the frame being recorded
    fn image_index(&self) -> u32;
    fn image_count(&self) -> u32;
}

/// Render pass, framebuffer and pipeline a [`RasterData`] draws with
#[derive(Copy, Clone, Debug)]
pub struct GraphicsPipelineTarget {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub extent: vk::Extent2D,
}

/// Geometry of one draw
#[derive(Clone, Debug)]
pub struct RasterData {
    pub target: GraphicsPipelineTarget,
    pub vertex_buffers: Vec<vk::Buffer>,
    pub index_buffer: Option<(vk::Buffer, vk::IndexType)>,
    pub num_vertices: u32,
    pub num_indices: u32,
    pub num_instances: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct ComputeData {
    pub pipeline: vk::Pipeline,
}

/// Allocates matrix uniform buffers and their descriptor sets
pub struct VulkanMatrixAllocator {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    set_layout: vk::DescriptorSetLayout,
    pool: vk::DescriptorPool,
}

impl VulkanMatrixAllocator {
    fn new(
        device: Device,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
        max_sets: u32,
    ) -> CrateResult<Self> {
        unsafe {
            let set_layout = device.create_descriptor_set_layout(
                &vk::DescriptorSetLayoutCreateInfo::default().bindings(&[
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(0)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .descriptor_count(1)
                        .stage_flags(vk::ShaderStageFlags::VERTEX),
                ]),
                None,
            )?;

            let pool = device.create_descriptor_pool(
                &vk::DescriptorPoolCreateInfo::default()
                    .max_sets(max_sets)
                    .pool_sizes(&[vk::DescriptorPoolSize::default()
                        .ty(vk::DescriptorType::UNIFORM_BUFFER)
                        .descriptor_count(max_sets)])
                    // Sets are freed one by one when the ring shrinks
                    .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET),
                None,
            );
            let pool = match pool {
                Ok(pool) => pool,
                Err(err) => {
                    device.destroy_descriptor_set_layout(set_layout, None);
                    return Err(err.into());
                }
            };

            Ok(Self {
                device,
                memory_properties,
                set_layout,
                pool,
            })
        }
    }
}

impl MatrixResourceAllocator for VulkanMatrixAllocator {
    type Buffer = HostBuffer;
    type Set = vk::DescriptorSet;

    fn allocate(&mut self) -> CrateResult<(HostBuffer, vk::DescriptorSet)> {
        let mut buffer = HostBuffer::new(
            &self.device,
            &self.memory_properties,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MatrixBlock::SIZE as vk::DeviceSize,
        )?;

        let sets = unsafe {
            self.device.allocate_descriptor_sets(
                &vk::DescriptorSetAllocateInfo::default()
                    .descriptor_pool(self.pool)
                    .set_layouts(&[self.set_layout]),
            )
        };
        let set = match sets.map(|sets| sets.into_iter().next()) {
            Ok(Some(set)) => set,
            Ok(None) => {
                buffer.destroy(&self.device);
                return Err(RenderError::Other("no descriptor set allocated".to_string()));
            }
            Err(err) => {
                buffer.destroy(&self.device);
                return Err(err.into());
            }
        };

        unsafe {
            self.device.update_descriptor_sets(
                &[vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&[vk::DescriptorBufferInfo::default()
                        .buffer(buffer.handle())
                        .offset(0)
                        .range(MatrixBlock::SIZE as vk::DeviceSize)])],
                &[],
            );
        }
        Ok((buffer, set))
    }

    fn write(&mut self, buffer: &HostBuffer, block: &MatrixBlock) -> CrateResult<()> {
        buffer.write(&self.device, bytemuck::bytes_of(block))
    }

    fn release(&mut self, mut buffer: HostBuffer, set: vk::DescriptorSet) {
        unsafe {
            // Freeing can only fail for pools without FREE_DESCRIPTOR_SET
            let _ = self.device.free_descriptor_sets(self.pool, &[set]);
        }
        buffer.destroy(&self.device);
    }
}

impl Drop for VulkanMatrixAllocator {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
            self.device
                .destroy_descriptor_set_layout(self.set_layout, None);
        }
    }
}

pub struct Renderer {
    device: Device,
    config: RendererConfig,
    command_buffer: vk::CommandBuffer,
    allocator: VulkanMatrixAllocator,
    matrices: MatrixBlockCache<HostBuffer, vk::DescriptorSet>,
    matrix_set: Option<vk::DescriptorSet>,
    graphics_pipeline: Option<vk::Pipeline>,
    compute_pipeline: Option<vk::Pipeline>,
    recording_started: bool,
    clear_color: vk::ClearColorValue,
    clear_depth_stencil: vk::ClearDepthStencilValue,
}

impl Renderer {
    pub fn new(
        device: Device,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
        command_buffer: vk::CommandBuffer,
        config: RendererConfig,
    ) -> CrateResult<Self> {
        let allocator =
            VulkanMatrixAllocator::new(device.clone(), memory_properties, config.max_frame_cache_size)?;
        Ok(Self {
            device,
            config,
            command_buffer,
            allocator,
            matrices: MatrixBlockCache::new(config.max_frame_cache_size as usize),
            matrix_set: None,
            graphics_pipeline: None,
            compute_pipeline: None,
            recording_started: false,
            clear_color: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
            clear_depth_stencil: vk::ClearDepthStencilValue {
                depth: 1.0,
                stencil: 0,
            },
        })
    }

    /// Layout of the matrix block set; pipelines must place it at
    /// [`RendererConfig::matrix_set_index`]
    pub fn matrix_set_layout(&self) -> vk::DescriptorSetLayout {
        self.allocator.set_layout
    }

    pub fn set_command_buffer(&mut self, command_buffer: vk::CommandBuffer) {
        self.command_buffer = command_buffer;
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = vk::ClearColorValue { float32: color };
    }

    pub fn set_model_matrix(&mut self, matrix: Mat4) {
        self.matrices.set_model_matrix(matrix);
    }

    pub fn set_view_matrix(&mut self, matrix: Mat4) {
        self.matrices.set_view_matrix(matrix);
    }

    pub fn set_projection_matrix(&mut self, matrix: Mat4) {
        self.matrices.set_projection_matrix(matrix);
    }

    pub fn matrix_block(&self) -> &MatrixBlock {
        self.matrices.block()
    }

    pub fn begin_command_buffer(&mut self, swapchain: &dyn SwapchainInfo) -> CrateResult<()> {
        let allocator = &mut self.allocator;
        self.matrices.begin_frame(
            swapchain.image_index() as usize,
            swapchain.image_count() as usize,
            |buffer, set| allocator.release(buffer, set),
        );

        unsafe {
            self.device.begin_command_buffer(
                self.command_buffer,
                &vk::CommandBufferBeginInfo::default(),
            )?;
        }

        // A fresh command buffer has nothing bound
        self.graphics_pipeline = None;
        self.compute_pipeline = None;
        self.recording_started = true;
        Ok(())
    }

    pub fn end_command_buffer(&mut self) -> CrateResult<vk::CommandBuffer> {
        unsafe {
            self.device.end_command_buffer(self.command_buffer)?;
        }
        Ok(self.command_buffer)
    }

    /// Upload the matrix block if it changed; returns whether it did
    pub fn update_matrix_block(&mut self) -> CrateResult<bool> {
        match self.matrices.update(&mut self.allocator)? {
            Some(set) => {
                self.matrix_set = Some(set);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Record one draw inside its own render pass
    pub fn render(&mut self, data: &RasterData) -> CrateResult<()> {
        let target = &data.target;
        let is_new_pipeline = self.graphics_pipeline != Some(target.pipeline);
        self.graphics_pipeline = Some(target.pipeline);

        let updated = self.update_matrix_block()?;
        let cmd = self.command_buffer;

        unsafe {
            if updated || self.recording_started {
                if let Some(set) = self.matrix_set {
                    self.device.cmd_bind_descriptor_sets(
                        cmd,
                        vk::PipelineBindPoint::GRAPHICS,
                        target.layout,
                        self.config.matrix_set_index,
                        &[set],
                        &[],
                    );
                    self.recording_started = false;
                }
            }

            let clear_values = [
                vk::ClearValue {
                    color: self.clear_color,
                },
                vk::ClearValue {
                    depth_stencil: self.clear_depth_stencil,
                },
            ];
            self.device.cmd_begin_render_pass(
                cmd,
                &vk::RenderPassBeginInfo::default()
                    .render_pass(target.render_pass)
                    .framebuffer(target.framebuffer)
                    .render_area(vk::Rect2D {
                        offset: vk::Offset2D { x: 0, y: 0 },
                        extent: target.extent,
                    })
                    .clear_values(&clear_values),
                vk::SubpassContents::INLINE,
            );

            if is_new_pipeline {
                self.device
                    .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, target.pipeline);
            }

            if let Some((index_buffer, index_type)) = data.index_buffer {
                self.device
                    .cmd_bind_index_buffer(cmd, index_buffer, 0, index_type);
            }
            if !data.vertex_buffers.is_empty() {
                let offsets = vec![0; data.vertex_buffers.len()];
                self.device
                    .cmd_bind_vertex_buffers(cmd, 0, &data.vertex_buffers, &offsets);
            }

            if data.index_buffer.is_some() {
                self.device
                    .cmd_draw_indexed(cmd, data.num_indices, data.num_instances, 0, 0, 0);
            } else {
                self.device
                    .cmd_draw(cmd, data.num_vertices, data.num_instances, 0, 0);
            }

            self.device.cmd_end_render_pass(cmd);
        }
        Ok(())
    }

    /// Record a compute dispatch, binding the pipeline only when it changed
    pub fn dispatch(&mut self, data: &ComputeData, groups: [u32; 3]) {
        let cmd = self.command_buffer;
        unsafe {
            if self.compute_pipeline != Some(data.pipeline) {
                self.device
                    .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::COMPUTE, data.pipeline);
                self.compute_pipeline = Some(data.pipeline);
            }
            self.device
                .cmd_dispatch(cmd, groups[0], groups[1], groups[2]);
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let allocator = &mut self.allocator;
        self.matrices
            .drain(|buffer, set| allocator.release(buffer, set));
    }
}

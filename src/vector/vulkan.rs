//! Vulkan implementation of [`VectorDevice`]
//!
//! Per frame the device owns three host-visible buffers (vertices, strided
//! fragment uniforms, view size) and one descriptor pool sized for the
//! frame's draw calls. Every descriptor set binds:
//! - binding 0: view uniforms (vertex stage)
//! - binding 1: one fragment uniform block at the call's offset
//! - binding 2: the call's texture, or a 1×1 placeholder

use crate::error::{CrateResult, RenderError};
use crate::graphics::buffer::HostBuffer;
use crate::graphics::device::find_memory_type;
use crate::vector::device::{
    DescriptorPoolPlan, FrameUpload, PoolAction, TextureDesc, TextureRegion, VectorDevice,
};
use crate::vector::pipeline::{
    CompareOp, CullMode, PipelineDescription, StencilFace, StencilOp, Topology,
};
use crate::vector::types::{BlendFactor, ImageFlags, TextureKind};
use crate::vector::uniforms::UniformOffset;
use ash::{vk, Device};
use shared::{FragUniforms, Vertex, ViewUniforms, VERTEX_UV_OFFSET};
use std::ffi::CStr;

const SHADER_ENTRY: &CStr = c"main";

/// SPIR-V words of the fill shaders
#[derive(Copy, Clone, Debug)]
pub struct ShaderSet<'a> {
    pub vertex: &'a [u32],
    pub fragment: &'a [u32],
    /// Fragment variant that applies the stroke anti-aliasing mask
    pub fragment_edge_aa: &'a [u32],
}

/// Everything the device borrows from the embedding application
#[derive(Clone)]
pub struct VulkanVectorDeviceInfo<'a> {
    pub device: Device,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub min_uniform_alignment: vk::DeviceSize,
    pub queue: vk::Queue,
    pub queue_family_index: u32,
    /// Render pass the pipelines are compiled against; needs a depth/stencil attachment
    pub render_pass: vk::RenderPass,
    pub shaders: ShaderSet<'a>,
}

/// Linear-tiled, host-visible image with its view and sampler
#[derive(Debug)]
pub struct VulkanTexture {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: vk::Sampler,
}

impl VulkanTexture {
    pub fn image(&self) -> vk::Image {
        self.image
    }

    fn destroy(self, device: &Device) {
        unsafe {
            device.destroy_sampler(self.sampler, None);
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

pub struct VulkanVectorDevice {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    min_uniform_alignment: usize,
    queue: vk::Queue,
    render_pass: vk::RenderPass,
    command_buffer: vk::CommandBuffer,
    upload_pool: vk::CommandPool,
    vertex_shader: vk::ShaderModule,
    fragment_shader: vk::ShaderModule,
    fragment_shader_aa: vk::ShaderModule,
    set_layout: vk::DescriptorSetLayout,
    pipeline_layout: vk::PipelineLayout,
    descriptor_pool: vk::DescriptorPool,
    pool_plan: DescriptorPoolPlan,
    vertex_buffer: Option<HostBuffer>,
    fragment_buffer: Option<HostBuffer>,
    view_buffer: Option<HostBuffer>,
    placeholder: Option<VulkanTexture>,
}

fn create_shader_module(device: &Device, code: &[u32]) -> CrateResult<vk::ShaderModule> {
    let module =
        unsafe { device.create_shader_module(&vk::ShaderModuleCreateInfo::default().code(code), None)? };
    Ok(module)
}

fn vk_topology(topology: Topology) -> vk::PrimitiveTopology {
    match topology {
        Topology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        Topology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        Topology::TriangleFan => vk::PrimitiveTopology::TRIANGLE_FAN,
    }
}

fn vk_blend_factor(factor: BlendFactor) -> vk::BlendFactor {
    match factor {
        BlendFactor::Zero => vk::BlendFactor::ZERO,
        BlendFactor::One => vk::BlendFactor::ONE,
        BlendFactor::SrcColor => vk::BlendFactor::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => vk::BlendFactor::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => vk::BlendFactor::DST_COLOR,
        BlendFactor::OneMinusDstColor => vk::BlendFactor::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => vk::BlendFactor::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => vk::BlendFactor::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => vk::BlendFactor::ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcAlphaSaturate => vk::BlendFactor::SRC_ALPHA_SATURATE,
    }
}

fn vk_compare_op(op: CompareOp) -> vk::CompareOp {
    match op {
        CompareOp::Never => vk::CompareOp::NEVER,
        CompareOp::Less => vk::CompareOp::LESS,
        CompareOp::Equal => vk::CompareOp::EQUAL,
        CompareOp::LessOrEqual => vk::CompareOp::LESS_OR_EQUAL,
        CompareOp::Greater => vk::CompareOp::GREATER,
        CompareOp::NotEqual => vk::CompareOp::NOT_EQUAL,
        CompareOp::GreaterOrEqual => vk::CompareOp::GREATER_OR_EQUAL,
        CompareOp::Always => vk::CompareOp::ALWAYS,
    }
}

fn vk_stencil_op(op: StencilOp) -> vk::StencilOp {
    match op {
        StencilOp::Keep => vk::StencilOp::KEEP,
        StencilOp::Zero => vk::StencilOp::ZERO,
        StencilOp::Replace => vk::StencilOp::REPLACE,
        StencilOp::IncrementAndClamp => vk::StencilOp::INCREMENT_AND_CLAMP,
        StencilOp::DecrementAndClamp => vk::StencilOp::DECREMENT_AND_CLAMP,
        StencilOp::Invert => vk::StencilOp::INVERT,
        StencilOp::IncrementAndWrap => vk::StencilOp::INCREMENT_AND_WRAP,
        StencilOp::DecrementAndWrap => vk::StencilOp::DECREMENT_AND_WRAP,
    }
}

fn vk_stencil_face(face: &StencilFace) -> vk::StencilOpState {
    vk::StencilOpState {
        fail_op: vk_stencil_op(face.fail),
        pass_op: vk_stencil_op(face.pass),
        depth_fail_op: vk_stencil_op(face.depth_fail),
        compare_op: vk_compare_op(face.compare),
        compare_mask: face.compare_mask,
        write_mask: face.write_mask,
        reference: face.reference,
    }
}

fn sampler_address_mode(repeat: bool) -> vk::SamplerAddressMode {
    if repeat {
        vk::SamplerAddressMode::MIRRORED_REPEAT
    } else {
        vk::SamplerAddressMode::CLAMP_TO_EDGE
    }
}

fn texture_format(kind: TextureKind) -> vk::Format {
    match kind {
        TextureKind::Rgba => vk::Format::R8G8B8A8_UNORM,
        TextureKind::Alpha => vk::Format::R8_UNORM,
    }
}

impl VulkanVectorDevice {
    pub fn new(info: VulkanVectorDeviceInfo<'_>) -> CrateResult<Self> {
        let device = info.device;
        unsafe {
            let vertex_shader = create_shader_module(&device, info.shaders.vertex)?;
            let fragment_shader = create_shader_module(&device, info.shaders.fragment)?;
            let fragment_shader_aa = create_shader_module(&device, info.shaders.fragment_edge_aa)?;

            let set_layout = device.create_descriptor_set_layout(
                &vk::DescriptorSetLayoutCreateInfo::default().bindings(&[
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(0)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .descriptor_count(1)
                        .stage_flags(vk::ShaderStageFlags::VERTEX),
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(1)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .descriptor_count(1)
                        .stage_flags(vk::ShaderStageFlags::FRAGMENT),
                    vk::DescriptorSetLayoutBinding::default()
                        .binding(2)
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .descriptor_count(1)
                        .stage_flags(vk::ShaderStageFlags::FRAGMENT),
                ]),
                None,
            )?;

            let pipeline_layout = device.create_pipeline_layout(
                &vk::PipelineLayoutCreateInfo::default().set_layouts(&[set_layout]),
                None,
            )?;

            let upload_pool = device.create_command_pool(
                &vk::CommandPoolCreateInfo::default()
                    .flags(vk::CommandPoolCreateFlags::TRANSIENT)
                    .queue_family_index(info.queue_family_index),
                None,
            )?;

            let mut this = Self {
                device,
                memory_properties: info.memory_properties,
                min_uniform_alignment: info.min_uniform_alignment.max(1) as usize,
                queue: info.queue,
                render_pass: info.render_pass,
                command_buffer: vk::CommandBuffer::null(),
                upload_pool,
                vertex_shader,
                fragment_shader,
                fragment_shader_aa,
                set_layout,
                pipeline_layout,
                descriptor_pool: vk::DescriptorPool::null(),
                pool_plan: DescriptorPoolPlan::default(),
                vertex_buffer: None,
                fragment_buffer: None,
                view_buffer: None,
                placeholder: None,
            };

            let placeholder_desc = TextureDesc {
                kind: TextureKind::Rgba,
                width: 1,
                height: 1,
                flags: ImageFlags::NEAREST,
            };
            this.placeholder = Some(this.create_texture(&placeholder_desc, None)?);
            Ok(this)
        }
    }

    /// Command buffer that subsequent flushes record into.
    ///
    /// It must be inside a render pass compatible with the one the device was
    /// created with, with viewport and scissor set.
    pub fn set_command_buffer(&mut self, command_buffer: vk::CommandBuffer) {
        self.command_buffer = command_buffer;
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    fn upload_buffer(
        slot: &mut Option<HostBuffer>,
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> CrateResult<()> {
        match slot {
            Some(buffer) => {
                buffer.upload(device, memory_properties, data)?;
            }
            None => {
                *slot = Some(HostBuffer::with_data(device, memory_properties, usage, data)?);
            }
        }
        Ok(())
    }

    fn recreate_descriptor_pool(&mut self, calls: usize) -> CrateResult<()> {
        let (max_sets, uniform_buffers, samplers) = DescriptorPoolPlan::pool_sizes(calls.max(1))?;
        unsafe {
            if self.descriptor_pool != vk::DescriptorPool::null() {
                self.device.destroy_descriptor_pool(self.descriptor_pool, None);
                self.descriptor_pool = vk::DescriptorPool::null();
            }
            self.descriptor_pool = self.device.create_descriptor_pool(
                &vk::DescriptorPoolCreateInfo::default()
                    .max_sets(max_sets)
                    .pool_sizes(&[
                        vk::DescriptorPoolSize::default()
                            .ty(vk::DescriptorType::UNIFORM_BUFFER)
                            .descriptor_count(uniform_buffers),
                        vk::DescriptorPoolSize::default()
                            .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                            .descriptor_count(samplers),
                    ]),
                None,
            )?;
        }
        log::debug!("descriptor pool recreated for {calls} draw calls");
        Ok(())
    }

    /// Copy `region` rows of `data` into the mapped image memory
    fn write_texels(
        &self,
        texture: &VulkanTexture,
        desc: &TextureDesc,
        region: TextureRegion,
        data: Option<&[u8]>,
    ) -> CrateResult<()> {
        let bpp = desc.kind.bytes_per_pixel();
        unsafe {
            let layout = self.device.get_image_subresource_layout(
                texture.image,
                vk::ImageSubresource {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    array_layer: 0,
                },
            );
            let ptr = self.device.map_memory(
                texture.memory,
                0,
                vk::WHOLE_SIZE,
                vk::MemoryMapFlags::empty(),
            )? as *mut u8;
            let mapped = std::slice::from_raw_parts_mut(
                ptr.add(layout.offset as usize),
                layout.size as usize,
            );

            match data {
                Some(data) => {
                    let row_bytes = region.width as usize * bpp;
                    for row in region.y..region.y + region.height {
                        let src = (row as usize * desc.width as usize + region.x as usize) * bpp;
                        let dst = row as usize * layout.row_pitch as usize + region.x as usize * bpp;
                        mapped[dst..dst + row_bytes].copy_from_slice(&data[src..src + row_bytes]);
                    }
                }
                None => mapped.fill(0),
            }

            self.device.unmap_memory(texture.memory);
        }
        Ok(())
    }

    /// Move a freshly written image to `SHADER_READ_ONLY_OPTIMAL`
    fn transition_to_shader_read(&self, image: vk::Image) -> CrateResult<()> {
        unsafe {
            let command_buffer = self
                .device
                .allocate_command_buffers(
                    &vk::CommandBufferAllocateInfo::default()
                        .command_pool(self.upload_pool)
                        .level(vk::CommandBufferLevel::PRIMARY)
                        .command_buffer_count(1),
                )?
                .into_iter()
                .next()
                .ok_or_else(|| RenderError::Other("no command buffer allocated".to_string()))?;

            self.device.begin_command_buffer(
                command_buffer,
                &vk::CommandBufferBeginInfo::default()
                    .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT),
            )?;

            let barrier = vk::ImageMemoryBarrier::default()
                .src_access_mask(vk::AccessFlags::HOST_WRITE)
                .dst_access_mask(vk::AccessFlags::SHADER_READ)
                .old_layout(vk::ImageLayout::PREINITIALIZED)
                .new_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
                .image(image)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            self.device.cmd_pipeline_barrier(
                command_buffer,
                vk::PipelineStageFlags::HOST,
                vk::PipelineStageFlags::FRAGMENT_SHADER,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier],
            );
            self.device.end_command_buffer(command_buffer)?;

            self.device.queue_submit(
                self.queue,
                &[vk::SubmitInfo::default().command_buffers(&[command_buffer])],
                vk::Fence::null(),
            )?;
            self.device.queue_wait_idle(self.queue)?;
            self.device
                .free_command_buffers(self.upload_pool, &[command_buffer]);
        }
        Ok(())
    }
}

impl VectorDevice for VulkanVectorDevice {
    type Pipeline = vk::Pipeline;
    type DescriptorSet = vk::DescriptorSet;
    type Texture = VulkanTexture;

    fn min_uniform_alignment(&self) -> usize {
        self.min_uniform_alignment
    }

    fn create_pipeline(&mut self, description: &PipelineDescription) -> CrateResult<vk::Pipeline> {
        let fragment = if description.edge_aa_shader {
            self.fragment_shader_aa
        } else {
            self.fragment_shader
        };
        let stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(self.vertex_shader)
                .name(SHADER_ENTRY),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(fragment)
                .name(SHADER_ENTRY),
        ];

        let bindings = [vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(std::mem::size_of::<Vertex>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)];
        let attributes = [
            vk::VertexInputAttributeDescription::default()
                .location(0)
                .binding(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(0),
            vk::VertexInputAttributeDescription::default()
                .location(1)
                .binding(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(VERTEX_UV_OFFSET),
        ];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(vk_topology(description.topology));

        let rasterization = vk::PipelineRasterizationStateCreateInfo::default()
            .polygon_mode(vk::PolygonMode::FILL)
            .cull_mode(match description.cull {
                CullMode::None => vk::CullModeFlags::NONE,
                CullMode::Back => vk::CullModeFlags::BACK,
            })
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .line_width(1.0);

        let blend = description.blend;
        let attachments = [vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(true)
            .src_color_blend_factor(vk_blend_factor(blend.src_rgb))
            .dst_color_blend_factor(vk_blend_factor(blend.dst_rgb))
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk_blend_factor(blend.src_alpha))
            .dst_alpha_blend_factor(vk_blend_factor(blend.dst_alpha))
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(if description.color_write {
                vk::ColorComponentFlags::RGBA
            } else {
                vk::ColorComponentFlags::empty()
            })];
        let color_blend = vk::PipelineColorBlendStateCreateInfo::default().attachments(&attachments);

        let viewport = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

        let ds = &description.depth_stencil;
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::default()
            .depth_test_enable(ds.depth_test)
            .depth_write_enable(ds.depth_write)
            .depth_compare_op(vk_compare_op(ds.depth_compare))
            .depth_bounds_test_enable(false)
            .stencil_test_enable(ds.stencil_test)
            .front(vk_stencil_face(&ds.front))
            .back(vk_stencil_face(&ds.back));

        let multisample = vk::PipelineMultisampleStateCreateInfo::default()
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let create_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport)
            .rasterization_state(&rasterization)
            .multisample_state(&multisample)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blend)
            .dynamic_state(&dynamic)
            .layout(self.pipeline_layout)
            .render_pass(self.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
                .map_err(|(_, e)| e)?
        };
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| RenderError::Other("no pipeline created".to_string()))
    }

    fn destroy_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.destroy_pipeline(pipeline, None);
        }
    }

    fn upload(&mut self, frame: &FrameUpload<'_>) -> CrateResult<()> {
        Self::upload_buffer(
            &mut self.vertex_buffer,
            &self.device,
            &self.memory_properties,
            vk::BufferUsageFlags::VERTEX_BUFFER,
            frame.vertices,
        )?;
        Self::upload_buffer(
            &mut self.fragment_buffer,
            &self.device,
            &self.memory_properties,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            frame.uniforms,
        )?;
        Self::upload_buffer(
            &mut self.view_buffer,
            &self.device,
            &self.memory_properties,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            bytemuck::bytes_of(&frame.view),
        )
    }

    fn prepare_descriptors(&mut self, call_count: usize) -> CrateResult<()> {
        match self.pool_plan.prepare(call_count) {
            PoolAction::Recreate(calls) => {
                let recreated = self.recreate_descriptor_pool(calls);
                if recreated.is_err() {
                    self.pool_plan.invalidate();
                }
                recreated
            }
            PoolAction::Reset => {
                unsafe {
                    self.device.reset_descriptor_pool(
                        self.descriptor_pool,
                        vk::DescriptorPoolResetFlags::empty(),
                    )?;
                }
                Ok(())
            }
        }
    }

    fn allocate_descriptor_set(
        &mut self,
        uniform: UniformOffset,
        texture: Option<&VulkanTexture>,
    ) -> CrateResult<vk::DescriptorSet> {
        let (Some(view_buffer), Some(fragment_buffer)) = (&self.view_buffer, &self.fragment_buffer)
        else {
            return Err(RenderError::Other(
                "descriptor set requested before upload".to_string(),
            ));
        };
        let texture = texture
            .or(self.placeholder.as_ref())
            .ok_or_else(|| RenderError::Other("placeholder texture missing".to_string()))?;

        unsafe {
            let set = self
                .device
                .allocate_descriptor_sets(
                    &vk::DescriptorSetAllocateInfo::default()
                        .descriptor_pool(self.descriptor_pool)
                        .set_layouts(&[self.set_layout]),
                )?
                .into_iter()
                .next()
                .ok_or_else(|| RenderError::Other("no descriptor set allocated".to_string()))?;

            let view_info = [vk::DescriptorBufferInfo::default()
                .buffer(view_buffer.handle())
                .offset(0)
                .range(std::mem::size_of::<ViewUniforms>() as vk::DeviceSize)];
            let fragment_info = [vk::DescriptorBufferInfo::default()
                .buffer(fragment_buffer.handle())
                .offset(uniform.bytes() as vk::DeviceSize)
                .range(FragUniforms::SIZE as vk::DeviceSize)];
            let image_info = [vk::DescriptorImageInfo::default()
                .image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_view(texture.view)
                .sampler(texture.sampler)];

            self.device.update_descriptor_sets(
                &[
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(0)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(&view_info),
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(1)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                        .buffer_info(&fragment_info),
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(2)
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(&image_info),
                ],
                &[],
            );
            Ok(set)
        }
    }

    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    fn bind_descriptor_set(&mut self, set: vk::DescriptorSet) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline_layout,
                0,
                &[set],
                &[],
            );
        }
    }

    fn draw(&mut self, first_vertex: u32, vertex_count: u32) {
        let Some(vertex_buffer) = &self.vertex_buffer else {
            return;
        };
        let offset = first_vertex as vk::DeviceSize * std::mem::size_of::<Vertex>() as vk::DeviceSize;
        unsafe {
            self.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                0,
                &[vertex_buffer.handle()],
                &[offset],
            );
            self.device
                .cmd_draw(self.command_buffer, vertex_count, 1, 0, 0);
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc, data: Option<&[u8]>) -> CrateResult<VulkanTexture> {
        let format = texture_format(desc.kind);
        unsafe {
            let image = self.device.create_image(
                &vk::ImageCreateInfo::default()
                    .image_type(vk::ImageType::TYPE_2D)
                    .format(format)
                    .extent(vk::Extent3D {
                        width: desc.width,
                        height: desc.height,
                        depth: 1,
                    })
                    .mip_levels(1)
                    .array_layers(1)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .tiling(vk::ImageTiling::LINEAR)
                    .usage(vk::ImageUsageFlags::SAMPLED)
                    .sharing_mode(vk::SharingMode::EXCLUSIVE)
                    .initial_layout(vk::ImageLayout::PREINITIALIZED),
                None,
            )?;

            let requirements = self.device.get_image_memory_requirements(image);
            let memory_type_index = find_memory_type(
                &self.memory_properties,
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            )?;
            let memory = self.device.allocate_memory(
                &vk::MemoryAllocateInfo::default()
                    .allocation_size(requirements.size)
                    .memory_type_index(memory_type_index),
                None,
            )?;
            self.device.bind_image_memory(image, memory, 0)?;

            let filter = if desc.flags.contains(ImageFlags::NEAREST) {
                vk::Filter::NEAREST
            } else {
                vk::Filter::LINEAR
            };
            let sampler = self.device.create_sampler(
                &vk::SamplerCreateInfo::default()
                    .mag_filter(filter)
                    .min_filter(filter)
                    .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
                    .address_mode_u(sampler_address_mode(desc.flags.contains(ImageFlags::REPEAT_X)))
                    .address_mode_v(sampler_address_mode(desc.flags.contains(ImageFlags::REPEAT_Y)))
                    .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE)
                    .max_anisotropy(1.0)
                    .compare_op(vk::CompareOp::NEVER)
                    .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE),
                None,
            )?;

            let view = self.device.create_image_view(
                &vk::ImageViewCreateInfo::default()
                    .image(image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    }),
                None,
            )?;

            let texture = VulkanTexture {
                image,
                memory,
                view,
                sampler,
            };
            let full = TextureRegion {
                x: 0,
                y: 0,
                width: desc.width,
                height: desc.height,
            };
            let initialised = self
                .write_texels(&texture, desc, full, data)
                .and_then(|()| self.transition_to_shader_read(image));
            match initialised {
                Ok(()) => Ok(texture),
                Err(err) => {
                    texture.destroy(&self.device);
                    Err(err)
                }
            }
        }
    }

    fn update_texture(
        &mut self,
        texture: &mut VulkanTexture,
        desc: &TextureDesc,
        region: TextureRegion,
        data: &[u8],
    ) -> CrateResult<()> {
        self.write_texels(texture, desc, region, Some(data))
    }

    fn destroy_texture(&mut self, texture: VulkanTexture) {
        texture.destroy(&self.device);
    }

    fn wait_idle(&mut self) {
        if let Err(err) = unsafe { self.device.device_wait_idle() } {
            log::warn!("waiting for the device before teardown failed: {err}");
        }
    }
}

impl Drop for VulkanVectorDevice {
    fn drop(&mut self) {
        unsafe {
            // Nothing useful can be done with a failure during teardown
            let _ = self.device.device_wait_idle();

            if let Some(placeholder) = self.placeholder.take() {
                placeholder.destroy(&self.device);
            }
            for mut buffer in [
                self.vertex_buffer.take(),
                self.fragment_buffer.take(),
                self.view_buffer.take(),
            ]
            .into_iter()
            .flatten()
            {
                buffer.destroy(&self.device);
            }
            if self.descriptor_pool != vk::DescriptorPool::null() {
                self.device.destroy_descriptor_pool(self.descriptor_pool, None);
            }
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
            self.device
                .destroy_descriptor_set_layout(self.set_layout, None);
            self.device.destroy_shader_module(self.vertex_shader, None);
            self.device.destroy_shader_module(self.fragment_shader, None);
            self.device
                .destroy_shader_module(self.fragment_shader_aa, None);
            self.device.destroy_command_pool(self.upload_pool, None);
        }
    }
}

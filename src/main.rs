//! Headless demo: draws a few fills and strokes into an offscreen target
//!
//! SPIR-V for the fill shaders is read from the directory given as the first
//! argument, or `CANVAS_VK_SHADER_DIR`, or `shaders/spirv`:
//! `fill.vert.spv`, `fill.frag.spv` and `fill_edge_aa.frag.spv`.

use std::f32::consts::TAU;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use ash::{vk, Device};
use canvas_vk::{
    graphics::device::{find_memory_type, VulkanContext},
    logging::{init_logging, LoggingConfig},
    vector::{
        vulkan::{ShaderSet, VulkanVectorDevice, VulkanVectorDeviceInfo},
        Bounds, Color, DrawState, Paint, PathData, VectorRenderer, Vertex,
    },
    CanvasConfig,
};
use glam::Vec2;

const WIDTH: u32 = 512;
const HEIGHT: u32 = 512;
const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

fn load_spirv(dir: &Path, name: &str) -> Result<Vec<u32>> {
    let path = dir.join(name);
    let mut file = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    ash::util::read_spv(&mut file).with_context(|| format!("parsing {}", path.display()))
}

fn shader_dir() -> PathBuf {
    std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CANVAS_VK_SHADER_DIR").ok())
        .unwrap_or_else(|| "shaders/spirv".to_string())
        .into()
}

/// Colour and depth/stencil attachments plus the render pass drawing into them
struct OffscreenTarget {
    images: Vec<(vk::Image, vk::DeviceMemory, vk::ImageView)>,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
}

impl OffscreenTarget {
    fn new(context: &VulkanContext) -> Result<Self> {
        let device = context.device();
        let depth_format = [
            vk::Format::D24_UNORM_S8_UINT,
            vk::Format::D32_SFLOAT_S8_UINT,
            vk::Format::D16_UNORM_S8_UINT,
        ]
        .into_iter()
        .find(|&format| unsafe {
            context
                .instance()
                .get_physical_device_format_properties(context.physical_device(), format)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| anyhow!("no depth/stencil format supported"))?;

        let mut target = Self {
            images: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffer: vk::Framebuffer::null(),
        };
        let color = create_attachment(
            context,
            COLOR_FORMAT,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC,
            vk::ImageAspectFlags::COLOR,
        )?;
        target.images.push(color);
        let depth = create_attachment(
            context,
            depth_format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        )?;
        target.images.push(depth);

        let attachments = [
            vk::AttachmentDescription::default()
                .format(COLOR_FORMAT)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL),
            vk::AttachmentDescription::default()
                .format(depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];
        let color_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];

        unsafe {
            target.render_pass = device.create_render_pass(
                &vk::RenderPassCreateInfo::default()
                    .attachments(&attachments)
                    .subpasses(&subpasses),
                None,
            )?;
            let views = [target.images[0].2, target.images[1].2];
            target.framebuffer = device.create_framebuffer(
                &vk::FramebufferCreateInfo::default()
                    .render_pass(target.render_pass)
                    .attachments(&views)
                    .width(WIDTH)
                    .height(HEIGHT)
                    .layers(1),
                None,
            )?;
        }
        Ok(target)
    }

    fn destroy(&mut self, device: &Device) {
        unsafe {
            device.destroy_framebuffer(self.framebuffer, None);
            device.destroy_render_pass(self.render_pass, None);
            for (image, memory, view) in self.images.drain(..) {
                device.destroy_image_view(view, None);
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
        }
    }
}

fn create_attachment(
    context: &VulkanContext,
    format: vk::Format,
    usage: vk::ImageUsageFlags,
    aspect_mask: vk::ImageAspectFlags,
) -> Result<(vk::Image, vk::DeviceMemory, vk::ImageView)> {
    let device = context.device();
    unsafe {
        let image = device.create_image(
            &vk::ImageCreateInfo::default()
                .image_type(vk::ImageType::TYPE_2D)
                .format(format)
                .extent(vk::Extent3D {
                    width: WIDTH,
                    height: HEIGHT,
                    depth: 1,
                })
                .mip_levels(1)
                .array_layers(1)
                .samples(vk::SampleCountFlags::TYPE_1)
                .tiling(vk::ImageTiling::OPTIMAL)
                .usage(usage)
                .sharing_mode(vk::SharingMode::EXCLUSIVE)
                .initial_layout(vk::ImageLayout::UNDEFINED),
            None,
        )?;
        let requirements = device.get_image_memory_requirements(image);
        let memory = device.allocate_memory(
            &vk::MemoryAllocateInfo::default()
                .allocation_size(requirements.size)
                .memory_type_index(find_memory_type(
                    context.memory_properties(),
                    requirements.memory_type_bits,
                    vk::MemoryPropertyFlags::DEVICE_LOCAL,
                )?),
            None,
        )?;
        device.bind_image_memory(image, memory, 0)?;
        let view = device.create_image_view(
            &vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                }),
            None,
        )?;
        Ok((image, memory, view))
    }
}

/// Outline of a five-pointed star, which is concave
fn star(center: Vec2, outer: f32, inner: f32) -> Vec<Vertex> {
    (0..10)
        .map(|i| {
            let radius = if i % 2 == 0 { outer } else { inner };
            let angle = i as f32 / 10.0 * TAU;
            let p = center + Vec2::new(angle.sin(), -angle.cos()) * radius;
            Vertex::new(p.x, p.y, 0.5, 1.0)
        })
        .collect()
}

/// Closed stroke strip around `points`, `half_width` to each side
fn outline(points: &[Vertex], half_width: f32) -> Vec<Vertex> {
    let n = points.len();
    let mut strip = Vec::with_capacity(2 * n + 2);
    for i in 0..=n {
        let prev = points[(i + n - 1) % n];
        let curr = points[i % n];
        let next = points[(i + 1) % n];
        let dir = (Vec2::new(next.x, next.y) - Vec2::new(prev.x, prev.y)).normalize_or_zero();
        let normal = Vec2::new(dir.y, -dir.x) * half_width;
        strip.push(Vertex::new(curr.x + normal.x, curr.y + normal.y, 0.0, 1.0));
        strip.push(Vertex::new(curr.x - normal.x, curr.y - normal.y, 1.0, 1.0));
    }
    strip
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let dir = shader_dir();
    let vertex = load_spirv(&dir, "fill.vert.spv")?;
    let fragment = load_spirv(&dir, "fill.frag.spv")?;
    let fragment_edge_aa = load_spirv(&dir, "fill_edge_aa.frag.spv")?;

    let context = VulkanContext::new("canvas-vk-demo")?;
    let mut target = OffscreenTarget::new(&context)?;

    let device = VulkanVectorDevice::new(VulkanVectorDeviceInfo {
        device: context.device().clone(),
        memory_properties: *context.memory_properties(),
        min_uniform_alignment: context.min_uniform_alignment(),
        queue: context.queue(),
        queue_family_index: context.queue_family_index(),
        render_pass: target.render_pass,
        shaders: ShaderSet {
            vertex: &vertex,
            fragment: &fragment,
            fragment_edge_aa: &fragment_edge_aa,
        },
    })?;
    let mut canvas = VectorRenderer::new(device, CanvasConfig::default());

    let command_buffer = context.allocate_command_buffer()?;
    canvas.device_mut().set_command_buffer(command_buffer);
    canvas.begin_frame(WIDTH as f32, HEIGHT as f32, 1.0);

    let square = [
        Vertex::new(64.0, 64.0, 0.5, 1.0),
        Vertex::new(64.0, 192.0, 0.5, 1.0),
        Vertex::new(192.0, 192.0, 0.5, 1.0),
        Vertex::new(192.0, 64.0, 0.5, 1.0),
    ];
    let square_outline = outline(&square, 2.0);
    let star_points = star(Vec2::new(340.0, 320.0), 140.0, 60.0);
    let star_outline = outline(&star_points, 3.0);

    let fringe = canvas.fringe_width();
    let mut fill = DrawState::new(Paint::color(Color::rgba8(220, 80, 40, 255)));
    fill.fringe = fringe;
    let gradient = Paint::linear_gradient(
        Vec2::new(200.0, 180.0),
        Vec2::new(480.0, 460.0),
        Color::rgba8(40, 120, 220, 255),
        Color::rgba8(20, 200, 120, 255),
    );
    let mut star_fill = DrawState::new(gradient);
    star_fill.fringe = fringe;
    let mut stroke = DrawState::new(Paint::color(Color::BLACK));
    stroke.fringe = fringe;

    let recorded = [
        canvas.fill(
            &fill,
            Bounds::new(64.0, 64.0, 192.0, 192.0),
            &[PathData {
                fill: &square,
                stroke: &square_outline,
                convex: true,
            }],
        ),
        canvas.fill(
            &star_fill,
            Bounds::from_points(star_points.iter().map(|v| Vec2::new(v.x, v.y))),
            &[PathData {
                fill: &star_points,
                stroke: &[],
                convex: false,
            }],
        ),
        canvas.stroke(
            &stroke,
            6.0,
            &[PathData {
                fill: &[],
                stroke: &star_outline,
                convex: false,
            }],
        ),
    ];
    if recorded.contains(&false) {
        log::warn!("some draw calls were dropped");
    }

    let device = context.device();
    unsafe {
        device.begin_command_buffer(command_buffer, &vk::CommandBufferBeginInfo::default())?;
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [1.0, 1.0, 1.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];
        let extent = vk::Extent2D {
            width: WIDTH,
            height: HEIGHT,
        };
        device.cmd_begin_render_pass(
            command_buffer,
            &vk::RenderPassBeginInfo::default()
                .render_pass(target.render_pass)
                .framebuffer(target.framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent,
                })
                .clear_values(&clear_values),
            vk::SubpassContents::INLINE,
        );
        device.cmd_set_viewport(
            command_buffer,
            0,
            &[vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: WIDTH as f32,
                height: HEIGHT as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
        );
        device.cmd_set_scissor(
            command_buffer,
            0,
            &[vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            }],
        );
    }

    let stats = canvas.flush()?;

    unsafe {
        device.cmd_end_render_pass(command_buffer);
        device.end_command_buffer(command_buffer)?;
    }
    context.submit_and_wait(command_buffer)?;

    log::info!(
        "rendered {} calls with {} draws and {} pipelines on {}",
        stats.calls,
        stats.draws,
        canvas.pipeline_count(),
        context.device_name()
    );

    drop(canvas);
    target.destroy(context.device());
    Ok(())
}

//! Drives whole frames through the vector renderer on a device that only
//! records the commands it receives.

use std::cell::RefCell;
use std::rc::Rc;

use canvas_vk::config::{CanvasConfig, FillTopology, WidgetSettings};
use canvas_vk::error::{CrateResult, RenderError};
use canvas_vk::logging::{init_logging, LoggingConfig};
use canvas_vk::vector::device::{DescriptorPoolPlan, PoolAction};
use canvas_vk::vector::pipeline::{CompareOp, CullMode, StencilOp};
use canvas_vk::vector::{
    Bounds, Color, CompositeOp, DrawState, FrameUpload, ImageFlags, Paint, PathData,
    PipelineDescription, StencilStroke, TextureDesc, TextureKind, TextureRegion, Topology,
    UniformOffset, VectorDevice, VectorRenderer, Vertex,
};
use canvas_vk::widget::{BackendRegistry, CanvasBackend, FrameInfo, VectorBackend, VectorWidget};
use glam::Vec2;

const ALIGNMENT: usize = 256;

#[derive(Clone, Debug, PartialEq)]
enum Command {
    CreatePipeline(u32, PipelineDescription),
    DestroyPipeline(u32),
    Upload { vertices: usize, uniform_bytes: usize, view: [f32; 2] },
    Pool(PoolAction),
    AllocateSet { set: u32, offset: u32, texture: Option<u32> },
    BindPipeline(u32),
    BindSet(u32),
    Draw(u32, u32),
    CreateTexture(u32, TextureDesc),
    UpdateTexture(u32, TextureRegion),
    DestroyTexture(u32),
    WaitIdle,
}

type Log = Rc<RefCell<Vec<Command>>>;

#[derive(Default)]
struct RecordingDevice {
    log: Log,
    next_pipeline: u32,
    next_set: u32,
    next_texture: u32,
    pool: DescriptorPoolPlan,
}

impl RecordingDevice {
    fn with_log(log: Log) -> Self {
        Self {
            log,
            ..Self::default()
        }
    }

    fn push(&self, command: Command) {
        self.log.borrow_mut().push(command);
    }
}

impl VectorDevice for RecordingDevice {
    type Pipeline = u32;
    type DescriptorSet = u32;
    type Texture = u32;

    fn min_uniform_alignment(&self) -> usize {
        ALIGNMENT
    }

    fn create_pipeline(&mut self, description: &PipelineDescription) -> CrateResult<u32> {
        let id = self.next_pipeline;
        self.next_pipeline += 1;
        self.push(Command::CreatePipeline(id, *description));
        Ok(id)
    }

    fn destroy_pipeline(&mut self, pipeline: u32) {
        self.push(Command::DestroyPipeline(pipeline));
    }

    fn upload(&mut self, frame: &FrameUpload<'_>) -> CrateResult<()> {
        self.push(Command::Upload {
            vertices: frame.vertices.len() / std::mem::size_of::<Vertex>(),
            uniform_bytes: frame.uniforms.len(),
            view: frame.view.view_size,
        });
        Ok(())
    }

    fn prepare_descriptors(&mut self, call_count: usize) -> CrateResult<()> {
        let action = self.pool.prepare(call_count);
        self.push(Command::Pool(action));
        Ok(())
    }

    fn allocate_descriptor_set(&mut self, uniform: UniformOffset, texture: Option<&u32>) -> CrateResult<u32> {
        let set = self.next_set;
        self.next_set += 1;
        self.push(Command::AllocateSet {
            set,
            offset: uniform.bytes(),
            texture: texture.copied(),
        });
        Ok(set)
    }

    fn bind_pipeline(&mut self, pipeline: u32) {
        self.push(Command::BindPipeline(pipeline));
    }

    fn bind_descriptor_set(&mut self, set: u32) {
        self.push(Command::BindSet(set));
    }

    fn draw(&mut self, first_vertex: u32, vertex_count: u32) {
        self.push(Command::Draw(first_vertex, vertex_count));
    }

    fn create_texture(&mut self, desc: &TextureDesc, _data: Option<&[u8]>) -> CrateResult<u32> {
        let id = self.next_texture;
        self.next_texture += 1;
        self.push(Command::CreateTexture(id, *desc));
        Ok(id)
    }

    fn update_texture(
        &mut self,
        texture: &mut u32,
        _desc: &TextureDesc,
        region: TextureRegion,
        _data: &[u8],
    ) -> CrateResult<()> {
        self.push(Command::UpdateTexture(*texture, region));
        Ok(())
    }

    fn destroy_texture(&mut self, texture: u32) {
        self.push(Command::DestroyTexture(texture));
    }

    fn wait_idle(&mut self) {
        self.push(Command::WaitIdle);
    }
}

fn renderer(config: CanvasConfig) -> (VectorRenderer<RecordingDevice>, Log) {
    init_logging(LoggingConfig::for_tests());
    let log = Log::default();
    let mut renderer = VectorRenderer::new(RecordingDevice::with_log(log.clone()), config);
    renderer.begin_frame(800.0, 600.0, 1.0);
    (renderer, log)
}

fn take(log: &Log) -> Vec<Command> {
    std::mem::take(&mut *log.borrow_mut())
}

fn created(commands: &[Command]) -> Vec<PipelineDescription> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::CreatePipeline(_, description) => Some(*description),
            _ => None,
        })
        .collect()
}

fn draws(commands: &[Command]) -> Vec<(u32, u32)> {
    commands
        .iter()
        .filter_map(|c| match c {
            Command::Draw(first, count) => Some((*first, *count)),
            _ => None,
        })
        .collect()
}

fn v(x: f32, y: f32) -> Vertex {
    Vertex::new(x, y, 0.5, 1.0)
}

fn square() -> [Vertex; 4] {
    [v(0.0, 0.0), v(0.0, 10.0), v(10.0, 10.0), v(10.0, 0.0)]
}

fn strip(n: usize) -> Vec<Vertex> {
    (0..n).map(|i| Vertex::new(i as f32, (i % 2) as f32, 0.0, 1.0)).collect()
}

fn solid() -> DrawState {
    DrawState::new(Paint::color(Color::rgba(0.2, 0.4, 0.6, 1.0)))
}

#[test]
fn convex_fill_draws_fan_then_fringe() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    let fill = square();
    let fringe = strip(10);
    assert!(canvas.fill(
        &solid(),
        Bounds::new(0.0, 0.0, 10.0, 10.0),
        &[PathData { fill: &fill, stroke: &fringe, convex: true }],
    ));

    let stats = canvas.flush().unwrap();
    assert_eq!(stats.calls, 1);
    assert_eq!(stats.draws, 2);
    assert_eq!(stats.descriptor_sets, 1);

    let commands = take(&log);
    let descriptions = created(&commands);
    assert_eq!(descriptions.len(), 2);
    assert_eq!(descriptions[0].topology, Topology::TriangleList);
    assert_eq!(descriptions[1].topology, Topology::TriangleStrip);
    assert!(descriptions.iter().all(|d| !d.depth_stencil.stencil_test));
    assert!(descriptions.iter().all(|d| d.cull == CullMode::Back && d.color_write));

    assert_eq!(
        commands[..2],
        [
            Command::Upload { vertices: 16, uniform_bytes: ALIGNMENT, view: [800.0, 600.0] },
            Command::Pool(PoolAction::Recreate(1)),
        ]
    );
    assert_eq!(draws(&commands), vec![(0, 6), (6, 10)]);
}

#[test]
fn concave_fill_uses_stencil_then_cover() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    let outline = [v(0.0, 0.0), v(5.0, 2.0), v(10.0, 0.0), v(10.0, 10.0), v(0.0, 10.0)];
    let fringe = strip(12);
    assert!(canvas.fill(
        &solid(),
        Bounds::new(0.0, 0.0, 10.0, 10.0),
        &[PathData { fill: &outline, stroke: &fringe, convex: false }],
    ));
    let stats = canvas.flush().unwrap();
    assert_eq!(stats.descriptor_sets, 2);

    let commands = take(&log);
    let descriptions = created(&commands);
    assert_eq!(descriptions.len(), 3);

    let stencil = descriptions[0];
    assert_eq!(stencil.cull, CullMode::None);
    assert!(!stencil.color_write);
    assert_eq!(stencil.depth_stencil.front.pass, StencilOp::IncrementAndWrap);
    assert_eq!(stencil.depth_stencil.back.pass, StencilOp::DecrementAndWrap);
    assert_eq!(stencil.depth_stencil.front.compare, CompareOp::Always);

    let fringe_pass = descriptions[1];
    assert_eq!(fringe_pass.topology, Topology::TriangleStrip);
    assert_eq!(fringe_pass.depth_stencil.front.compare, CompareOp::Equal);
    assert_eq!(fringe_pass.depth_stencil.front.pass, StencilOp::Keep);

    let cover = descriptions[2];
    assert_eq!(cover.depth_stencil.front.compare, CompareOp::NotEqual);
    assert_eq!(cover.depth_stencil.front.pass, StencilOp::Zero);
    assert!(cover.color_write);

    // 3 fan triangles, the fringe strip, then the bounding quad
    assert_eq!(draws(&commands), vec![(0, 9), (9, 12), (21, 4)]);

    let offsets: Vec<u32> = commands
        .iter()
        .filter_map(|c| match c {
            Command::AllocateSet { offset, .. } => Some(*offset),
            _ => None,
        })
        .collect();
    assert_eq!(offsets, vec![0, ALIGNMENT as u32]);
}

#[test]
fn fan_topology_keeps_vertices_verbatim() {
    let config = CanvasConfig {
        fill_topology: FillTopology::TriangleFan,
        antialias: false,
        ..CanvasConfig::default()
    };
    let (mut canvas, log) = renderer(config);
    let fill = square();
    canvas.fill(
        &solid(),
        Bounds::new(0.0, 0.0, 10.0, 10.0),
        &[PathData { fill: &fill, stroke: &[], convex: true }],
    );
    canvas.flush().unwrap();

    let commands = take(&log);
    assert_eq!(created(&commands)[0].topology, Topology::TriangleFan);
    assert!(created(&commands).iter().all(|d| !d.edge_aa_shader));
    assert_eq!(draws(&commands), vec![(0, 4)]);
}

#[test]
fn pipelines_are_created_once_per_state() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    let fill = square();
    let fringe = strip(4);
    let path = [PathData { fill: &fill, stroke: &fringe, convex: true }];
    let bounds = Bounds::new(0.0, 0.0, 10.0, 10.0);

    for _ in 0..3 {
        canvas.fill(&solid(), bounds, &path);
    }
    canvas.flush().unwrap();
    assert_eq!(canvas.pipeline_count(), 2);

    let first = take(&log);
    let binds = first.iter().filter(|c| matches!(c, Command::BindPipeline(_))).count();
    // fan and fringe pipelines alternate, so every pass rebinds
    assert_eq!(binds, 6);

    canvas.fill(&solid(), bounds, &path);
    canvas.flush().unwrap();
    let second = take(&log);
    assert!(created(&second).is_empty());
    assert_eq!(
        second.iter().find(|c| matches!(c, Command::BindPipeline(_))),
        Some(&Command::BindPipeline(0))
    );

    let mut additive = solid();
    additive.composite = CompositeOp::Lighter.into();
    canvas.fill(&additive, bounds, &path);
    canvas.flush().unwrap();
    assert_eq!(canvas.pipeline_count(), 4);
}

#[test]
fn repeated_state_is_bound_once() {
    let config = CanvasConfig {
        antialias: false,
        stencil_strokes: false,
        ..CanvasConfig::default()
    };
    let (mut canvas, log) = renderer(config);
    let line = strip(6);
    for _ in 0..4 {
        canvas.stroke(&solid(), 2.0, &[PathData { fill: &[], stroke: &line, convex: false }]);
    }
    let stats = canvas.flush().unwrap();
    assert_eq!(stats.draws, 4);

    let commands = take(&log);
    let binds = commands.iter().filter(|c| matches!(c, Command::BindPipeline(_))).count();
    assert_eq!(binds, 1);
}

#[test]
fn stencil_strokes_take_three_passes() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    let line = strip(8);
    assert!(canvas.stroke(&solid(), 3.0, &[PathData { fill: &[], stroke: &line, convex: false }]));
    let stats = canvas.flush().unwrap();
    assert_eq!(stats.draws, 3);
    assert_eq!(stats.descriptor_sets, 2);

    let commands = take(&log);
    let descriptions = created(&commands);
    assert_eq!(descriptions.len(), 3);
    assert_eq!(descriptions[0].depth_stencil.front.pass, StencilOp::IncrementAndClamp);
    assert_eq!(descriptions[0].depth_stencil.back.pass, StencilOp::DecrementAndClamp);
    assert_eq!(descriptions[1].depth_stencil.front.pass, StencilOp::Keep);
    assert_eq!(descriptions[2].depth_stencil.front.compare, CompareOp::Always);
    assert!(!descriptions[2].color_write);
    assert_eq!(draws(&commands), vec![(0, 8); 3]);

    // The thresholded block drives the first pass
    let offsets: Vec<u32> = commands
        .iter()
        .filter_map(|c| match c {
            Command::AllocateSet { offset, .. } => Some(*offset),
            _ => None,
        })
        .collect();
    assert_eq!(offsets, vec![ALIGNMENT as u32, 0]);
}

#[test]
fn plain_strokes_skip_the_stencil() {
    let config = CanvasConfig {
        stencil_strokes: false,
        ..CanvasConfig::default()
    };
    let (mut canvas, log) = renderer(config);
    let line = strip(8);
    canvas.stroke(&solid(), 3.0, &[PathData { fill: &[], stroke: &line, convex: false }]);
    canvas.flush().unwrap();

    let commands = take(&log);
    let descriptions = created(&commands);
    assert_eq!(descriptions.len(), 1);
    assert!(!descriptions[0].depth_stencil.stencil_test);
    assert_eq!(draws(&commands), vec![(0, 8)]);
}

#[test]
fn calls_replay_in_submission_order() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    let tri = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)];
    let line = strip(4);
    let fill = square();

    canvas.triangles(&solid(), &tri);
    canvas.fill(
        &solid(),
        Bounds::new(0.0, 0.0, 10.0, 10.0),
        &[PathData { fill: &fill, stroke: &[], convex: true }],
    );
    canvas.stroke(&solid(), 1.0, &[PathData { fill: &[], stroke: &line, convex: false }]);
    let stats = canvas.flush().unwrap();
    assert_eq!(stats.calls, 3);

    let firsts: Vec<u32> = draws(&take(&log)).iter().map(|(first, _)| *first).collect();
    assert_eq!(firsts, vec![0, 3, 9, 9, 9]);
}

#[test]
fn descriptor_pool_grows_only_when_exceeded() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    let tri = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)];
    let mut frame = |calls: usize| {
        for _ in 0..calls {
            canvas.triangles(&solid(), &tri);
        }
        canvas.flush().unwrap();
        take(&log)
            .into_iter()
            .find_map(|c| match c {
                Command::Pool(action) => Some(action),
                _ => None,
            })
    };

    assert_eq!(frame(3), Some(PoolAction::Recreate(3)));
    assert_eq!(frame(2), Some(PoolAction::Reset));
    assert_eq!(frame(3), Some(PoolAction::Reset));
    assert_eq!(frame(5), Some(PoolAction::Recreate(5)));
    assert_eq!(frame(0), None);
}

#[test]
fn cancel_discards_the_frame() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    let tri = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)];
    canvas.triangles(&solid(), &tri);
    canvas.cancel();
    assert!(canvas.recorder().is_empty());

    let stats = canvas.flush().unwrap();
    assert_eq!(stats.calls, 0);
    assert!(take(&log).is_empty());
}

#[test]
fn uniform_blocks_use_the_aligned_stride() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    let tri = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)];
    canvas.triangles(&solid(), &tri);
    canvas.triangles(&solid(), &tri);
    canvas.flush().unwrap();

    let commands = take(&log);
    assert!(matches!(
        commands[0],
        Command::Upload { uniform_bytes, .. } if uniform_bytes == 2 * ALIGNMENT
    ));
}

#[test]
fn texture_lifecycle() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    let pixels = vec![255u8; 4 * 4 * 4];
    let id = canvas
        .create_texture(TextureKind::Rgba, 4, 4, ImageFlags::REPEAT_X, Some(&pixels))
        .unwrap();
    assert_eq!(id.get(), 1);
    assert_eq!(canvas.texture_size(id), Some((4, 4)));

    let region = TextureRegion { x: 1, y: 1, width: 2, height: 2 };
    canvas.update_texture(id, region, &pixels).unwrap();
    let outside = TextureRegion { x: 3, y: 0, width: 2, height: 1 };
    assert!(matches!(
        canvas.update_texture(id, outside, &pixels),
        Err(RenderError::InvalidArgument(_))
    ));

    let paint = Paint::image_pattern(Vec2::ZERO, Vec2::splat(4.0), 0.0, id, 1.0);
    let tri = [v(0.0, 0.0), v(4.0, 0.0), v(0.0, 4.0)];
    assert!(canvas.triangles(&DrawState::new(paint), &tri));
    canvas.flush().unwrap();

    let commands = take(&log);
    assert!(commands.contains(&Command::UpdateTexture(0, region)));
    assert!(commands
        .iter()
        .any(|c| matches!(c, Command::AllocateSet { texture: Some(0), .. })));

    assert!(canvas.delete_texture(id));
    assert!(!canvas.delete_texture(id));
    assert_eq!(canvas.texture_size(id), None);
    // A draw naming a deleted image is dropped whole
    assert!(!canvas.triangles(&DrawState::new(paint), &tri));
    assert!(canvas.recorder().is_empty());

    let again = canvas
        .create_texture(TextureKind::Alpha, 2, 2, ImageFlags::empty(), None)
        .unwrap();
    assert_eq!(again, id);
    assert!(canvas
        .create_texture(TextureKind::Alpha, 2, 2, ImageFlags::empty(), Some(&[0u8; 3]))
        .is_err());
}

#[test]
fn dropping_the_renderer_releases_resources() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    canvas
        .create_texture(TextureKind::Alpha, 8, 8, ImageFlags::NEAREST, None)
        .unwrap();
    let tri = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)];
    canvas.triangles(&solid(), &tri);
    canvas.flush().unwrap();
    take(&log);

    drop(canvas);
    let commands = take(&log);
    assert_eq!(commands.first(), Some(&Command::WaitIdle));
    assert!(commands.contains(&Command::DestroyTexture(0)));
    assert!(commands.contains(&Command::DestroyPipeline(0)));
}

#[test]
fn canvas_backend_keeps_one_context_per_slot() {
    init_logging(LoggingConfig::for_tests());
    let log = Log::default();
    let device_log = log.clone();
    let settings = WidgetSettings::default();

    let mut registry = BackendRegistry::new();
    registry.register_if_supported(
        CanvasBackend::<RecordingDevice>::ID,
        || true,
        Box::new(move |settings| {
            let device_log = device_log.clone();
            let backend = CanvasBackend::<RecordingDevice>::new(
                CanvasConfig::default(),
                settings,
                Box::new(move |_slot| Ok(RecordingDevice::with_log(device_log.clone()))),
            );
            Ok(Box::new(backend) as Box<dyn VectorBackend>)
        }),
        Box::new(|backend| {
            let canvas = backend
                .as_any_mut()
                .downcast_mut::<CanvasBackend<RecordingDevice>>()
                .ok_or_else(|| RenderError::Other("unexpected backend".to_string()))?;
            let context = canvas
                .context_mut()
                .ok_or_else(|| RenderError::Other("no active context".to_string()))?;
            let tri = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)];
            context.triangles(&solid(), &tri);
            Ok(())
        }),
    );

    let mut widget = VectorWidget::new(settings, registry);
    widget.set_window_rect(0.0, 0.0, 100.0, 50.0).unwrap();
    widget.render(&FrameInfo { slot: 0, slot_count: 3 }).unwrap();
    widget.render(&FrameInfo { slot: 2, slot_count: 3 }).unwrap();

    let canvas = widget
        .backend_mut::<CanvasBackend<RecordingDevice>>()
        .unwrap();
    assert_eq!(canvas.slot_count(), 3);
    assert_eq!(canvas.last_stats().calls, 1);
    assert_eq!(canvas.clear_color(), Some(glam::Vec4::ZERO));
    // Supersampled framebuffer, logical view size
    assert_eq!(canvas.context(2).unwrap().view_size(), [100.0, 50.0]);
    assert_eq!(canvas.context(2).unwrap().fringe_width(), 0.25);

    // Each slot compiled its own pipeline and owns its own pool
    let commands = take(&log);
    let pools = commands.iter().filter(|c| matches!(c, Command::Pool(PoolAction::Recreate(1)))).count();
    assert_eq!(pools, 2);
    assert_eq!(created(&commands).len(), 2);

    assert!(widget.render(&FrameInfo { slot: 3, slot_count: 3 }).is_err());
}

fn canvas_widget(log: &Log) -> VectorWidget {
    let device_log = log.clone();
    let mut registry = BackendRegistry::new();
    registry.register_if_supported(
        CanvasBackend::<RecordingDevice>::ID,
        || true,
        Box::new(move |settings| {
            let device_log = device_log.clone();
            let backend = CanvasBackend::<RecordingDevice>::new(
                CanvasConfig::default(),
                settings,
                Box::new(move |_slot| Ok(RecordingDevice::with_log(device_log.clone()))),
            );
            Ok(Box::new(backend) as Box<dyn VectorBackend>)
        }),
        Box::new(|backend| {
            let canvas = backend
                .as_any_mut()
                .downcast_mut::<CanvasBackend<RecordingDevice>>()
                .ok_or_else(|| RenderError::Other("unexpected backend".to_string()))?;
            let context = canvas
                .context_mut()
                .ok_or_else(|| RenderError::Other("no active context".to_string()))?;
            let tri = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)];
            context.triangles(&solid(), &tri);
            Ok(())
        }),
    );
    VectorWidget::new(WidgetSettings::default(), registry)
}

#[test]
fn shrinking_the_swapchain_waits_before_releasing_slots() {
    let log = Log::default();
    let mut widget = canvas_widget(&log);
    for slot in 0..3 {
        widget.render(&FrameInfo { slot, slot_count: 3 }).unwrap();
    }
    take(&log);

    widget.render(&FrameInfo { slot: 0, slot_count: 1 }).unwrap();
    let canvas = widget
        .backend_mut::<CanvasBackend<RecordingDevice>>()
        .unwrap();
    assert_eq!(canvas.slot_count(), 1);

    // Slots 1 and 2 each wait, then destroy their one pipeline
    let commands = take(&log);
    let teardown: Vec<_> = commands
        .iter()
        .filter(|c| matches!(c, Command::WaitIdle | Command::DestroyPipeline(_)))
        .cloned()
        .collect();
    assert_eq!(
        teardown,
        vec![
            Command::WaitIdle,
            Command::DestroyPipeline(0),
            Command::WaitIdle,
            Command::DestroyPipeline(0),
        ]
    );
    // Slot 0 keeps its pipeline and records the frame as before
    assert!(commands.contains(&Command::Pool(PoolAction::Reset)));
}

#[test]
fn stencil_stroke_keys_differ_only_in_stroke_pass() {
    use canvas_vk::vector::PipelineKey;
    let base = PipelineKey {
        topology: Topology::TriangleStrip,
        ..PipelineKey::default()
    };
    let passes = [StencilStroke::Fill, StencilStroke::DrawAa, StencilStroke::Clear];
    let descriptions: Vec<_> = passes
        .iter()
        .map(|&stencil_stroke| PipelineDescription::for_key(&PipelineKey { stencil_stroke, ..base }))
        .collect();
    assert!(descriptions.iter().all(|d| d.depth_stencil.stencil_test));
    assert!(descriptions.iter().all(|d| d.depth_stencil.depth_test && !d.depth_stencil.depth_write));
    assert_ne!(descriptions[0], descriptions[1]);
    assert_ne!(descriptions[1], descriptions[2]);
}

#[test]
fn concave_quad_binds_three_pipelines() {
    let (mut canvas, log) = renderer(CanvasConfig::default());
    let quad = [v(0.0, 0.0), v(10.0, 0.0), v(10.0, 10.0), v(0.0, 10.0)];
    let fringe = strip(10);
    canvas.fill(
        &solid(),
        Bounds::new(0.0, 0.0, 10.0, 10.0),
        &[PathData { fill: &quad, stroke: &fringe, convex: false }],
    );
    let call = canvas.recorder().calls()[0];
    assert_eq!(call.triangles.count, 4);
    assert_eq!(canvas.recorder().uniforms().len(), 2);

    canvas.flush().unwrap();
    let commands = take(&log);
    let binds = commands.iter().filter(|c| matches!(c, Command::BindPipeline(_))).count();
    assert_eq!(binds, 3);
}

#[test]
fn every_submission_replays_once_in_order() {
    let config = CanvasConfig {
        antialias: false,
        stencil_strokes: false,
        ..CanvasConfig::default()
    };
    let (mut canvas, log) = renderer(config);
    let fill = square();
    let line = strip(4);
    let tri = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)];
    for i in 0..12 {
        match i % 3 {
            0 => canvas.fill(
                &solid(),
                Bounds::new(0.0, 0.0, 10.0, 10.0),
                &[PathData { fill: &fill, stroke: &[], convex: true }],
            ),
            1 => canvas.stroke(&solid(), 1.0, &[PathData { fill: &[], stroke: &line, convex: false }]),
            _ => canvas.triangles(&solid(), &tri),
        };
    }
    let stats = canvas.flush().unwrap();
    assert_eq!(stats.calls, 12);
    assert_eq!(stats.draws, 12);

    let firsts: Vec<u32> = draws(&take(&log)).iter().map(|(first, _)| *first).collect();
    assert!(firsts.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn one_blend_factor_is_enough_for_a_new_pipeline() {
    let (mut canvas, _log) = renderer(CanvasConfig {
        antialias: false,
        ..CanvasConfig::default()
    });
    let tri = [v(0.0, 0.0), v(1.0, 0.0), v(0.0, 1.0)];

    let mut state = solid();
    canvas.triangles(&state, &tri);
    // Field-wise equal key built from the named operation
    state.composite = CompositeOp::SourceOver.into();
    canvas.triangles(&state, &tri);
    canvas.flush().unwrap();
    assert_eq!(canvas.pipeline_count(), 1);

    state.composite.src_rgb = canvas_vk::vector::BlendFactor::SrcAlpha;
    canvas.triangles(&state, &tri);
    canvas.flush().unwrap();
    assert_eq!(canvas.pipeline_count(), 2);
}

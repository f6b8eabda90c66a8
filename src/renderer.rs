//! The renderer: public surface and per-frame orchestration.
//!
//! Frame order is fixed: frame uniform → simulation ticks → density passes →
//! composite (edges, nodes, heatmap, contours, labels) → picking → one queue
//! submission → statistics.  The host drives `render_frame` from its own
//! animation loop; nothing in here blocks on the GPU.

use std::sync::mpsc::Receiver;
use std::time::Instant;

use glam::Vec2;

use crate::camera::Camera;
use crate::color::Color;
use crate::context::{GpuContext, GpuContextOptions};
use crate::error::{GraphError, Result};
use crate::graph::{GraphBuffers, GraphData, GraphStore};
use crate::layers::contour::{ContourConfigPatch, ContourLayer};
use crate::layers::edges::EdgeLayer;
use crate::layers::heatmap::{HeatmapConfigPatch, HeatmapLayer};
use crate::layers::labels::{LabelSpec, LabelsConfigPatch, LabelsLayer};
use crate::layers::nodes::NodeLayer;
use crate::layers::picking::PickingLayer;
use crate::layers::FrameCommon;
use crate::sim::{Simulation, SimulationParams};

/// CPU position mirror refresh cadence (frames between readbacks).
const MIRROR_INTERVAL: u64 = 8;

// ── Options & stats ───────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct RendererOptions {
    pub width: u32,
    pub height: u32,
    pub dpr: f32,
    pub max_nodes: u32,
    pub debug: bool,
    pub background: Color,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            dpr: 1.0,
            max_nodes: 1 << 21,
            debug: false,
            background: Color::rgba(0.02, 0.02, 0.03, 1.0),
        }
    }
}

/// Frame statistics maintained only by the orchestrator.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameStats {
    /// FPS over the trailing 30-frame window.
    pub fps: f32,
    /// Exponential moving average of frame duration in milliseconds.
    pub avg_frame_time_ms: f32,
}

struct StatsTracker {
    stats: FrameStats,
    window: [f32; 30],
    cursor: usize,
    filled: usize,
}

impl StatsTracker {
    fn new() -> Self {
        Self { stats: FrameStats::default(), window: [0.0; 30], cursor: 0, filled: 0 }
    }

    fn update(&mut self, frame_ms: f32) {
        self.stats.avg_frame_time_ms = if self.filled == 0 {
            frame_ms
        } else {
            self.stats.avg_frame_time_ms * 0.9 + frame_ms * 0.1
        };
        self.window[self.cursor] = frame_ms;
        self.cursor = (self.cursor + 1) % self.window.len();
        self.filled = (self.filled + 1).min(self.window.len());
        let sum: f32 = self.window[..self.filled].iter().sum();
        if sum > 0.0 {
            self.stats.fps = self.filled as f32 * 1000.0 / sum;
        }
    }
}

// ── Renderer ──────────────────────────────────────────────────────────────────

pub struct Renderer {
    ctx: GpuContext,
    camera: Camera,
    store: GraphStore,
    graph: GraphBuffers,
    sim: Simulation,
    frame: FrameCommon,
    edges: EdgeLayer,
    nodes: NodeLayer,
    heatmap: HeatmapLayer,
    contour: ContourLayer,
    labels: LabelsLayer,
    picking: PickingLayer,
    stats: StatsTracker,
    background: wgpu::Color,
    started: Instant,
    last_frame: Option<Instant>,
    frame_index: u64,
    shaped_counts: (u32, u32),
    load_generation: u64,
    mirror_staging: wgpu::Buffer,
    mirror_pending: Option<Receiver<std::result::Result<(), wgpu::BufferAsyncError>>>,
    mirror_copied: bool,
}

impl Renderer {
    /// Initialise against a live surface (window / canvas).  Fails with
    /// [`GraphError::Unsupported`] when the GPU stack is unsuitable; no
    /// panic escapes.
    pub async fn new(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        options: RendererOptions,
    ) -> Result<Self> {
        let ctx_options = GpuContextOptions { max_nodes: options.max_nodes, debug: options.debug };
        let ctx =
            GpuContext::for_surface(target, options.width, options.height, &ctx_options).await?;
        Ok(Self::from_context(ctx, options))
    }

    /// Headless initialisation rendering into an offscreen RGBA target;
    /// drives tests and image export.
    pub async fn new_offscreen(options: RendererOptions) -> Result<Self> {
        let ctx_options = GpuContextOptions { max_nodes: options.max_nodes, debug: options.debug };
        let ctx = GpuContext::offscreen(options.width, options.height, &ctx_options).await?;
        Ok(Self::from_context(ctx, options))
    }

    fn from_context(mut ctx: GpuContext, options: RendererOptions) -> Self {
        let camera = Camera::new(options.width as f32, options.height as f32, options.dpr);
        let store = GraphStore::new();
        let graph = GraphBuffers::new(&ctx);
        let sim = Simulation::new(&ctx, &graph);
        let frame = FrameCommon::new(&ctx);
        let edges = EdgeLayer::new(&ctx, &frame.layout);
        let nodes = NodeLayer::new(&ctx, &frame.layout);
        let mut heatmap = HeatmapLayer::new(&mut ctx, &frame.layout);
        // The density target tracks viewport ÷ dpr from the start.
        heatmap.resize(&ctx, options.width, options.height, options.dpr);
        let contour = ContourLayer::new(&ctx, &frame.layout);
        let labels = LabelsLayer::new(&ctx, &frame.layout);
        let picking = PickingLayer::new(&ctx, &frame.layout);
        let mirror_staging = ctx.readback_buffer("position_mirror", 16);
        let [r, g, b, a] = options.background.to_array();
        tracing::info!(
            width = options.width,
            height = options.height,
            dpr = options.dpr,
            "renderer initialised"
        );

        Self {
            ctx,
            camera,
            store,
            graph,
            sim,
            frame,
            edges,
            nodes,
            heatmap,
            contour,
            labels,
            picking,
            stats: StatsTracker::new(),
            background: wgpu::Color { r: r as f64, g: g as f64, b: b as f64, a: a as f64 },
            started: Instant::now(),
            last_frame: None,
            frame_index: 0,
            shaped_counts: (u32::MAX, u32::MAX),
            load_generation: 0,
            mirror_staging,
            mirror_pending: None,
            mirror_copied: false,
        }
    }

    // ── Loading ───────────────────────────────────────────────────────────

    /// Replace the graph.  Awaits the GPU upload; a concurrent `load` makes
    /// this one reject with [`GraphError::LoadSuperseded`] while the newer
    /// one proceeds.  A validation failure leaves the previous graph intact.
    pub async fn load(&mut self, data: GraphData) -> Result<()> {
        if self.ctx.is_lost() {
            return Err(GraphError::DeviceLost);
        }
        self.load_generation += 1;
        let generation = self.load_generation;

        self.store.load(data)?;
        self.picking.clear_hover();
        self.sync_graph();

        // Flush the uploads and await their completion on the GPU timeline.
        self.ctx.queue.submit(std::iter::empty());
        self.ctx.submitted_work_done().await;
        if self.load_generation != generation {
            return Err(GraphError::LoadSuperseded);
        }
        tracing::info!(
            nodes = self.store.node_count(),
            edges = self.store.edge_count(),
            dropped_self_loops = self.store.self_loops_dropped(),
            "graph loaded"
        );
        Ok(())
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut GraphStore {
        &mut self.store
    }

    pub fn node_count(&self) -> usize {
        self.store.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.store.edge_count()
    }

    // ── Camera ────────────────────────────────────────────────────────────

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn pan(&mut self, dx_px: f32, dy_px: f32) {
        self.camera.pan(dx_px, dy_px);
    }

    pub fn zoom(&mut self, factor: f32) {
        self.camera.zoom_by(factor, None);
    }

    pub fn zoom_at(&mut self, factor: f32, anchor_px: Vec2) {
        self.camera.zoom_by(factor, Some(anchor_px));
    }

    /// Frame the current positions (CPU mirror) with 10% padding.
    pub fn fit_to_view(&mut self) {
        if let Some((min, max)) = self.store.positions_bbox() {
            self.camera.fit_to_view(min, max, 0.10);
        }
    }

    pub fn resize(&mut self, width_px: u32, height_px: u32) {
        if self.ctx.is_lost() || width_px == 0 || height_px == 0 {
            return;
        }
        self.ctx.resize(width_px, height_px);
        self.camera.set_viewport(width_px as f32, height_px as f32);
        self.picking.resize(&self.ctx, width_px, height_px);
        if self.heatmap.resize(&self.ctx, width_px, height_px, self.camera.dpr()) {
            self.contour.sync_density(&self.ctx, &self.heatmap);
        }
    }

    // ── Simulation ────────────────────────────────────────────────────────

    pub fn start_simulation(&mut self) {
        self.sim.running = true;
    }

    pub fn pause_simulation(&mut self) {
        // Takes effect at the next frame boundary, never mid-tick.
        self.sim.running = false;
    }

    pub fn simulation_running(&self) -> bool {
        self.sim.running
    }

    pub fn tick_once(&mut self) {
        self.sim.tick_once();
    }

    pub fn simulation_params(&self) -> SimulationParams {
        self.sim.params()
    }

    pub fn set_simulation_params(&mut self, params: SimulationParams) {
        self.sim.set_params(params);
    }

    // ── Layer configuration ───────────────────────────────────────────────

    pub fn enable_heatmap(&mut self, config: Option<HeatmapConfigPatch>) {
        if let Some(patch) = config {
            self.heatmap.set_config(&mut self.ctx, &patch);
        }
        self.heatmap.visible = true;
        self.contour.sync_density(&self.ctx, &self.heatmap);
    }

    pub fn disable_heatmap(&mut self) {
        self.heatmap.visible = false;
    }

    pub fn set_heatmap_config(&mut self, patch: HeatmapConfigPatch) {
        self.heatmap.set_config(&mut self.ctx, &patch);
        // Contour thresholds share the heatmap's normalisation.
        self.contour.sync_density(&self.ctx, &self.heatmap);
    }

    pub fn enable_contour(&mut self, config: Option<ContourConfigPatch>) {
        if let Some(patch) = config {
            self.contour.config.apply(&patch);
        }
        self.contour.visible = true;
        self.contour.sync_density(&self.ctx, &self.heatmap);
    }

    pub fn disable_contour(&mut self) {
        self.contour.visible = false;
    }

    pub fn set_contour_config(&mut self, patch: ContourConfigPatch) {
        self.contour.set_config(&self.ctx, &self.heatmap, &patch);
    }

    /// Enable labels with a host-resolved atlas (metadata JSON + PNG bytes).
    /// Atlas failures leave labels disabled and every other layer untouched.
    pub async fn enable_labels(
        &mut self,
        atlas_json: &str,
        atlas_png: &[u8],
        config: Option<LabelsConfigPatch>,
    ) -> Result<()> {
        if self.ctx.is_lost() {
            return Err(GraphError::DeviceLost);
        }
        if let Some(patch) = config {
            self.labels.config.apply(&patch);
        }
        if !self.labels.has_atlas() {
            self.labels.set_atlas(&self.ctx, atlas_json, atlas_png)?;
            self.labels.rebuild(&self.ctx, &self.graph);
            // The atlas upload is the one real suspension point here.
            self.ctx.queue.submit(std::iter::empty());
            self.ctx.submitted_work_done().await;
        }
        self.labels.visible = true;
        Ok(())
    }

    pub fn disable_labels(&mut self) {
        self.labels.visible = false;
    }

    pub fn set_labels_config(&mut self, patch: LabelsConfigPatch) {
        self.labels.config.apply(&patch);
    }

    pub fn set_labels(&mut self, labels: Vec<LabelSpec>) {
        self.labels.set_labels(labels);
    }

    pub fn set_node_scaling_zoom_invariant(&mut self, zoom_invariant: bool) {
        self.nodes.set_zoom_invariant(&self.ctx, zoom_invariant);
    }

    // ── Picking ───────────────────────────────────────────────────────────

    /// Feed the cursor position (device pixels); the hit resolves over the
    /// next frame or two.
    pub fn hover(&mut self, x_px: f32, y_px: f32) {
        self.picking.request(x_px, y_px);
    }

    /// Id of the node under the cursor from the most recent completed
    /// readback, or `None` over empty space.
    pub fn hovered_node_id(&self) -> Option<&str> {
        self.store.id_of(self.picking.hovered_index()?)
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats.stats
    }

    /// Offscreen targets only: read the composited frame back as RGBA bytes.
    pub fn read_pixels(&self) -> Option<Vec<u8>> {
        self.ctx.read_target_pixels()
    }

    /// Blocking snapshot of the front position buffer (x, y, vx, vy per
    /// slot).  Diagnostics only — the frame loop uses the async mirror.
    pub fn debug_read_positions(&self) -> Vec<[f32; 4]> {
        let bytes = self
            .ctx
            .read_buffer_bytes(self.graph.front(), self.graph.node_slots as u64 * 16);
        bytemuck::cast_slice(&bytes).to_vec()
    }

    /// Blocking snapshot of the quadtree cell buffer plus its level shape
    /// from the most recent tick.  Diagnostics only.
    pub fn debug_read_quadtree(
        &self,
    ) -> (Vec<crate::sim::quadtree::Cell>, crate::sim::quadtree::TreeLevels) {
        let (cells, levels) = self.sim.quadtree();
        let bytes = self.ctx.read_buffer_bytes(
            cells,
            levels.total as u64 * std::mem::size_of::<crate::sim::quadtree::Cell>() as u64,
        );
        (bytemuck::cast_slice(&bytes).to_vec(), levels.clone())
    }

    // ── Frame loop ────────────────────────────────────────────────────────

    /// Render one frame.  Call from the host's animation callback.
    pub fn render_frame(&mut self) -> std::result::Result<(), wgpu::SurfaceError> {
        if self.ctx.is_lost() {
            return Ok(());
        }
        let frame_start = Instant::now();
        self.sync_graph();

        // Labels lay out against the CPU mirror before any encoding.
        if self.labels.prepare(&self.ctx, &self.store, &self.camera) {
            self.labels.rebuild(&self.ctx, &self.graph);
        }

        let time = self.started.elapsed().as_secs_f32();
        self.frame.write(&self.ctx, &self.camera.frame_uniform(time));
        self.sim.prepare(&self.ctx, &self.graph);

        let target = match self.ctx.begin_frame() {
            Ok(target) => target,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (w, h) = self.ctx.target_size();
                self.ctx.resize(w, h);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        // 1. Simulation ticks (quadtree rebuild + forces + integration).
        self.sim.encode_ticks(&mut encoder, &mut self.graph);
        let front = self.graph.front_index();
        let node_slots = self.graph.node_slots;
        let edge_count = self.graph.edge_count;

        // 2. Density production feeding heatmap + contours.
        let density_needed = self.heatmap.visible || self.contour.visible;
        if density_needed {
            self.heatmap
                .encode_density(&mut encoder, &self.frame.bind_group, front, node_slots);
        }
        if self.contour.visible {
            self.contour.encode_extract(&mut encoder);
        }

        // 3. Composite pass in declared z-order.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("composite_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            self.edges
                .encode(&mut pass, &self.frame.bind_group, front, edge_count);
            self.nodes
                .encode(&mut pass, &self.frame.bind_group, front, node_slots);
            if self.heatmap.visible {
                self.heatmap.encode_composite(&mut pass, &self.frame.bind_group);
            }
            if self.contour.visible {
                self.contour.encode_composite(&mut pass, &self.frame.bind_group);
            }
            self.labels
                .encode_composite(&mut pass, &self.frame.bind_group, front);
        }

        // 4. Picking pass when a hover is pending.
        if self.picking.wants_pass() {
            self.picking
                .encode(&mut encoder, &self.frame.bind_group, front, node_slots);
        }

        // 5. Periodic lossy position readback for the CPU mirror.
        if self.frame_index % MIRROR_INTERVAL == 0
            && self.mirror_pending.is_none()
            && node_slots > 0
        {
            encoder.copy_buffer_to_buffer(
                self.graph.front(),
                0,
                &self.mirror_staging,
                0,
                node_slots as u64 * 16,
            );
            self.mirror_copied = true;
        }

        // 6. One submission for the whole frame.
        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        target.present();

        self.picking.after_submit();
        self.mirror_after_submit();

        // Non-blocking maintenance: fires completed map callbacks.
        let _ = self.ctx.device.poll(wgpu::PollType::Poll);
        self.picking.update();
        self.mirror_update();

        if let Some(last) = self.last_frame {
            self.stats.update(last.elapsed().as_secs_f32() * 1000.0);
        }
        self.last_frame = Some(frame_start);
        self.frame_index += 1;
        Ok(())
    }

    // ── Internals ─────────────────────────────────────────────────────────

    /// Upload dirty store state and, when topology or buffer identity
    /// changed, reshape the simulation and rebuild every dependent bind
    /// group.
    fn sync_graph(&mut self) {
        let reallocated = self.graph.sync(&self.ctx, &mut self.store);
        let counts = (self.graph.node_slots, self.graph.edge_count);
        if !reallocated && counts == self.shaped_counts {
            return;
        }
        self.sim.reshape(&self.ctx, &self.graph);
        self.edges.rebuild(&self.ctx, &self.graph);
        self.nodes.rebuild(&self.ctx, &self.graph);
        self.heatmap.rebuild(&self.ctx, &self.graph);
        self.labels.rebuild(&self.ctx, &self.graph);
        self.picking.rebuild(&self.ctx, &self.graph);
        self.mirror_staging = self
            .ctx
            .readback_buffer("position_mirror", (counts.0 as u64 * 16).max(16));
        self.mirror_pending = None;
        self.mirror_copied = false;
        self.shaped_counts = counts;
    }

    fn mirror_after_submit(&mut self) {
        if !self.mirror_copied {
            return;
        }
        self.mirror_copied = false;
        let (tx, rx) = std::sync::mpsc::channel();
        self.mirror_staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
        self.mirror_pending = Some(rx);
    }

    fn mirror_update(&mut self) {
        let Some(rx) = &self.mirror_pending else { return };
        let received = rx.try_recv();
        match received {
            Ok(Ok(())) => {
                {
                    let mapped = self.mirror_staging.slice(..).get_mapped_range();
                    let states: &[[f32; 4]] = bytemuck::cast_slice(&mapped);
                    self.store.apply_position_readback(states);
                }
                self.mirror_staging.unmap();
                self.mirror_pending = None;
            }
            Ok(Err(_)) | Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                self.mirror_pending = None;
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => {}
        }
    }
}

//! Force-directed simulation: per tick, the quadtree is rebuilt on the GPU,
//! forces accumulate, and the adaptive-speed integrator writes the next
//! positions into the back ping-pong buffer.
//!
//! The host only encodes dispatches — it never reads simulation state back
//! inside the frame loop.

pub mod forces;
pub mod quadtree;

use forces::{create_force_pipelines, ForceBuffers, ForcePipelines, SimParamsUniform};
use quadtree::{
    create_quadtree_pipelines, dispatch_size, sort_workgroups, QuadtreeBuffers,
    QuadtreePipelines,
};

use crate::context::GpuContext;
use crate::graph::GraphBuffers;

// ── SimulationParams ──────────────────────────────────────────────────────────

/// Tunable simulation constants.  Every field maps onto one symbol in the
/// force model; defaults are the reference values.
#[derive(Copy, Clone, Debug)]
pub struct SimulationParams {
    /// Barnes–Hut opening criterion θ.
    pub theta: f32,
    /// t-force exponent γ (> 1).
    pub gamma: f32,
    /// Repulsion strength scale.
    pub repulsion: f32,
    /// Linear attraction weight α.
    pub spring_k: f32,
    /// Short-range t-attraction weight β.
    pub t_attraction: f32,
    /// Adaptive-speed tolerance τ.
    pub tolerance: f32,
    /// Velocity damping per tick.
    pub damping: f32,
    /// Quadtree bbox expansion margin (fraction per side).
    pub bounds_margin: f32,
    /// Simulation ticks encoded per rendered frame.
    pub ticks_per_frame: u32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            theta: 2.0,
            gamma: 2.0,
            repulsion: 1.0,
            spring_k: 0.1,
            t_attraction: 8.0,
            tolerance: 1.0,
            damping: 0.9,
            bounds_margin: 0.01,
            ticks_per_frame: 1,
        }
    }
}

// ── Simulation ────────────────────────────────────────────────────────────────

/// Bind groups that depend on which position buffer is the tick's front.
struct TickBindGroups {
    bounds: wgpu::BindGroup,
    hilbert: wgpu::BindGroup,
    tree: wgpu::BindGroup,
    repulsion: wgpu::BindGroup,
    attraction: wgpu::BindGroup,
    integrate: wgpu::BindGroup,
}

pub struct Simulation {
    qt_pipelines: QuadtreePipelines,
    force_pipelines: ForcePipelines,
    qt_buffers: QuadtreeBuffers,
    force_buffers: ForceBuffers,
    /// Index 0: positions\[0\] is front; index 1: positions\[1\] is front.
    tick_groups: Option<[TickBindGroups; 2]>,
    sort_groups: Vec<wgpu::BindGroup>,
    level_groups: Vec<wgpu::BindGroup>,
    speed_reduce_group: Option<wgpu::BindGroup>,
    speed_finalize_group: Option<wgpu::BindGroup>,
    params: SimulationParams,
    params_dirty: bool,
    uniform_counts: (u32, u32),
    pub running: bool,
    pending_ticks: u32,
    ticks_done: u64,
}

impl Simulation {
    pub fn new(ctx: &GpuContext, graph: &GraphBuffers) -> Self {
        let params = SimulationParams::default();
        let qt_pipelines = create_quadtree_pipelines(&ctx.device);
        let force_pipelines = create_force_pipelines(&ctx.device);
        let qt_buffers = QuadtreeBuffers::new(ctx, graph.node_slots, params.bounds_margin);
        let force_buffers = ForceBuffers::new(ctx, graph.node_slots);
        let mut sim = Self {
            qt_pipelines,
            force_pipelines,
            qt_buffers,
            force_buffers,
            tick_groups: None,
            sort_groups: Vec::new(),
            level_groups: Vec::new(),
            speed_reduce_group: None,
            speed_finalize_group: None,
            params,
            params_dirty: true,
            uniform_counts: (u32::MAX, u32::MAX),
            running: false,
            pending_ticks: 0,
            ticks_done: 0,
        };
        sim.rebuild_bind_groups(ctx, graph);
        sim
    }

    pub fn params(&self) -> SimulationParams {
        self.params
    }

    pub fn set_params(&mut self, params: SimulationParams) {
        self.params = params;
        self.params_dirty = true;
    }

    pub fn ticks_done(&self) -> u64 {
        self.ticks_done
    }

    /// Queue exactly one tick for the next frame without resuming.
    pub fn tick_once(&mut self) {
        self.pending_ticks = self.pending_ticks.saturating_add(1);
    }

    /// Follow a topology change: resize count-dependent buffers and rebuild
    /// every bind group that references them.
    pub fn reshape(&mut self, ctx: &GpuContext, graph: &GraphBuffers) {
        self.qt_buffers
            .reshape(ctx, graph.node_slots, self.params.bounds_margin);
        self.force_buffers.reshape(ctx, graph.node_slots);
        self.rebuild_bind_groups(ctx, graph);
        self.params_dirty = true;
    }

    /// Flush the shared uniform if parameters or counts changed.  Must run
    /// before `encode_ticks` in any frame that encodes simulation work.
    pub fn prepare(&mut self, ctx: &GpuContext, graph: &GraphBuffers) {
        let counts = (graph.node_slots, graph.edge_count);
        if !self.params_dirty && counts == self.uniform_counts {
            return;
        }
        let uniform = SimParamsUniform {
            node_count: graph.node_slots,
            edge_count: graph.edge_count,
            root_index: self.qt_buffers.levels.root_index(),
            cell_count: self.qt_buffers.levels.total,
            theta: self.params.theta,
            gamma: self.params.gamma.max(1.0 + f32::EPSILON),
            repulsion: self.params.repulsion,
            spring_k: self.params.spring_k,
            t_attraction: self.params.t_attraction,
            tolerance: self.params.tolerance,
            damping: self.params.damping.clamp(0.0, 1.0),
            _pad: 0.0,
        };
        ctx.queue
            .write_buffer(&self.force_buffers.sim_params, 0, bytemuck::bytes_of(&uniform));
        self.params_dirty = false;
        self.uniform_counts = counts;
    }

    /// Encode this frame's simulation work: `ticks_per_frame` ticks while
    /// running, otherwise whatever `tick_once` queued.
    pub fn encode_ticks(&mut self, encoder: &mut wgpu::CommandEncoder, graph: &mut GraphBuffers) {
        let ticks = if self.running {
            self.params.ticks_per_frame.max(1) + std::mem::take(&mut self.pending_ticks)
        } else {
            std::mem::take(&mut self.pending_ticks)
        };
        if graph.node_slots == 0 {
            return;
        }
        for _ in 0..ticks {
            self.encode_tick(encoder, graph);
        }
    }

    fn encode_tick(&mut self, encoder: &mut wgpu::CommandEncoder, graph: &mut GraphBuffers) {
        let Some(tick_groups) = &self.tick_groups else { return };
        let groups = &tick_groups[graph.front_index()];
        let n = graph.node_slots.max(1);
        let m = graph.edge_count;
        let node_wg = dispatch_size(n);
        let sort_wg = sort_workgroups(n);

        // ── Quadtree rebuild ──────────────────────────────────────────────
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("quadtree_build"),
                timestamp_writes: None,
            });
            pass.set_bind_group(0, &groups.bounds, &[]);
            pass.set_pipeline(&self.qt_pipelines.bounds_reset);
            pass.dispatch_workgroups(1, 1, 1);
            pass.set_pipeline(&self.qt_pipelines.bounds_reduce);
            pass.dispatch_workgroups(node_wg, 1, 1);
            pass.set_pipeline(&self.qt_pipelines.bounds_finalize);
            pass.dispatch_workgroups(1, 1, 1);

            pass.set_bind_group(0, &groups.hilbert, &[]);
            pass.set_pipeline(&self.qt_pipelines.hilbert_assign);
            pass.dispatch_workgroups(node_wg, 1, 1);

            for group in &self.sort_groups {
                pass.set_bind_group(0, group, &[]);
                pass.set_pipeline(&self.qt_pipelines.sort_histogram);
                pass.dispatch_workgroups(sort_wg, 1, 1);
                pass.set_pipeline(&self.qt_pipelines.sort_scan);
                pass.dispatch_workgroups(1, 1, 1);
                pass.set_pipeline(&self.qt_pipelines.sort_scatter);
                pass.dispatch_workgroups(sort_wg, 1, 1);
            }

            pass.set_bind_group(0, &groups.tree, &[]);
            pass.set_pipeline(&self.qt_pipelines.leaf_init);
            pass.dispatch_workgroups(node_wg, 1, 1);

            pass.set_pipeline(&self.qt_pipelines.merge_level);
            let steps: Vec<_> = self.qt_buffers.levels.merge_steps().collect();
            for (step, group) in steps.iter().zip(&self.level_groups) {
                pass.set_bind_group(1, group, &[]);
                pass.dispatch_workgroups(dispatch_size(step.dst_count), 1, 1);
            }
        }

        // ── Force accumulation ────────────────────────────────────────────
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("force_accumulate"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.force_pipelines.repulsion);
            pass.set_bind_group(0, &groups.repulsion, &[]);
            pass.dispatch_workgroups(node_wg, 1, 1);
            if m > 0 {
                pass.set_pipeline(&self.force_pipelines.attraction);
                pass.set_bind_group(0, &groups.attraction, &[]);
                pass.dispatch_workgroups(dispatch_size(m), 1, 1);
            }
        }

        // ── Adaptive speed + integration ──────────────────────────────────
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("integrate"),
                timestamp_writes: None,
            });
            if let (Some(reduce), Some(finalize)) =
                (&self.speed_reduce_group, &self.speed_finalize_group)
            {
                pass.set_pipeline(&self.force_pipelines.speed_reduce);
                pass.set_bind_group(0, reduce, &[]);
                pass.dispatch_workgroups(node_wg, 1, 1);
                pass.set_pipeline(&self.force_pipelines.speed_finalize);
                pass.set_bind_group(0, finalize, &[]);
                pass.dispatch_workgroups(1, 1, 1);
            }
            pass.set_pipeline(&self.force_pipelines.integrate);
            pass.set_bind_group(0, &groups.integrate, &[]);
            pass.dispatch_workgroups(node_wg, 1, 1);
        }

        graph.swap();
        self.ticks_done += 1;
    }

    /// The quadtree cell buffer and tree shape (exposed for diagnostics and
    /// the GPU test harness).
    pub fn quadtree(&self) -> (&wgpu::Buffer, &quadtree::TreeLevels) {
        (&self.qt_buffers.cells, &self.qt_buffers.levels)
    }

    fn rebuild_bind_groups(&mut self, ctx: &GpuContext, graph: &GraphBuffers) {
        let device = &ctx.device;
        let qt = &self.qt_buffers;
        let fb = &self.force_buffers;

        let tick_for = |front: usize| {
            let pos_in = graph.position_buffer(front);
            let pos_out = graph.position_buffer(1 - front);
            TickBindGroups {
                bounds: device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("qt_bounds_bg"),
                    layout: &self.qt_pipelines.bounds_layout,
                    entries: &[
                        entry(0, &qt.qt_params),
                        entry(1, pos_in),
                        entry(2, graph.styles()),
                        entry(3, &qt.bounds_atomic),
                        entry(4, &qt.bounds),
                    ],
                }),
                hilbert: device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("qt_hilbert_bg"),
                    layout: &self.qt_pipelines.hilbert_layout,
                    entries: &[
                        entry(0, &qt.qt_params),
                        entry(1, pos_in),
                        entry(2, graph.styles()),
                        entry(3, &qt.bounds),
                        entry(4, &qt.pairs[0]),
                    ],
                }),
                tree: device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("qt_tree_bg"),
                    layout: &self.qt_pipelines.tree_layout,
                    entries: &[
                        entry(0, &qt.qt_params),
                        entry(1, pos_in),
                        entry(2, graph.styles()),
                        entry(3, &qt.pairs[0]),
                        entry(4, &qt.cells),
                    ],
                }),
                repulsion: device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("force_repulsion_bg"),
                    layout: &self.force_pipelines.repulsion_layout,
                    entries: &[
                        entry(0, &fb.sim_params),
                        entry(1, pos_in),
                        entry(2, graph.styles()),
                        entry(3, &qt.cells),
                        entry(4, &qt.bounds),
                        entry(5, &fb.rep_forces),
                    ],
                }),
                attraction: device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("force_attraction_bg"),
                    layout: &self.force_pipelines.attraction_layout,
                    entries: &[
                        entry(0, &fb.sim_params),
                        entry(1, pos_in),
                        entry(2, graph.styles()),
                        entry(3, graph.edges()),
                        entry(4, &fb.attr_forces),
                    ],
                }),
                integrate: device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("force_integrate_bg"),
                    layout: &self.force_pipelines.integrate_layout,
                    entries: &[
                        entry(0, &fb.sim_params),
                        entry(1, pos_in),
                        entry(2, pos_out),
                        entry(3, graph.styles()),
                        entry(5, &qt.bounds),
                        entry(6, &fb.rep_forces),
                        entry(7, &fb.attr_forces),
                        entry(8, &fb.prev_forces),
                        entry(9, &fb.speed),
                    ],
                }),
            }
        };
        self.tick_groups = Some([tick_for(0), tick_for(1)]);

        // Radix passes alternate the pair buffers: a→b, b→a, a→b, b→a.
        self.sort_groups = (0..4)
            .map(|k| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("qt_sort_bg"),
                    layout: &self.qt_pipelines.sort_layout,
                    entries: &[
                        entry(0, &qt.sort_params[k]),
                        entry(1, &qt.pairs[k % 2]),
                        entry(2, &qt.pairs[1 - k % 2]),
                        entry(3, &qt.histograms),
                        entry(4, &qt.digit_offsets),
                    ],
                })
            })
            .collect();

        self.level_groups = qt
            .level_params
            .iter()
            .map(|buffer| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("qt_level_bg"),
                    layout: &self.qt_pipelines.level_layout,
                    entries: &[entry(0, buffer)],
                })
            })
            .collect();

        self.speed_reduce_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("speed_reduce_bg"),
            layout: &self.force_pipelines.speed_reduce_layout,
            entries: &[
                entry(0, &fb.sim_params),
                entry(4, graph.degrees()),
                entry(6, &fb.rep_forces),
                entry(7, &fb.attr_forces),
                entry(8, &fb.prev_forces),
                entry(9, &fb.speed),
            ],
        }));
        self.speed_finalize_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("speed_finalize_bg"),
            layout: &self.force_pipelines.speed_finalize_layout,
            entries: &[entry(0, &fb.sim_params), entry(9, &fb.speed)],
        }));
    }
}

fn entry(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry { binding, resource: buffer.as_entire_binding() }
}

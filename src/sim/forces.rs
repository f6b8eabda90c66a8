//! Force accumulation and adaptive-speed integration pipelines.

use bytemuck::Zeroable;

use crate::context::{storage_entry, uniform_entry, GpuContext};

// ── CPU-visible layouts ───────────────────────────────────────────────────────

/// Uniform shared by every force pass (matches `SimParams` in the shaders).
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SimParamsUniform {
    pub node_count: u32,
    pub edge_count: u32,
    pub root_index: u32,
    pub cell_count: u32,
    pub theta: f32,
    pub gamma: f32,
    pub repulsion: f32,
    pub spring_k: f32,
    pub t_attraction: f32,
    pub tolerance: f32,
    pub damping: f32,
    pub _pad: f32,
}

// ── Pipelines ─────────────────────────────────────────────────────────────────

pub struct ForcePipelines {
    pub repulsion: wgpu::ComputePipeline,
    pub attraction: wgpu::ComputePipeline,
    pub speed_reduce: wgpu::ComputePipeline,
    pub speed_finalize: wgpu::ComputePipeline,
    pub integrate: wgpu::ComputePipeline,
    pub repulsion_layout: wgpu::BindGroupLayout,
    pub attraction_layout: wgpu::BindGroupLayout,
    pub speed_reduce_layout: wgpu::BindGroupLayout,
    pub speed_finalize_layout: wgpu::BindGroupLayout,
    pub integrate_layout: wgpu::BindGroupLayout,
}

pub fn create_force_pipelines(device: &wgpu::Device) -> ForcePipelines {
    let repulsion_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("repulsion_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/repulsion.wgsl").into()),
    });
    let attraction_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("attraction_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/attraction.wgsl").into()),
    });
    let integrate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("integrate_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/integrate.wgsl").into()),
    });

    let repulsion_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("repulsion_bgl"),
        entries: &[
            uniform_entry(0),
            storage_entry(1, true),  // positions (front)
            storage_entry(2, true),  // styles
            storage_entry(3, true),  // cells
            storage_entry(4, true),  // bounds
            storage_entry(5, false), // rep forces
        ],
    });
    let attraction_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("attraction_bgl"),
        entries: &[
            uniform_entry(0),
            storage_entry(1, true),  // positions (front)
            storage_entry(2, true),  // styles
            storage_entry(3, true),  // edges
            storage_entry(4, false), // attraction accumulator
        ],
    });
    // The integrate module declares bindings 0–9; each entry point's layout
    // carries only the subset it statically uses.
    let speed_reduce_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("speed_reduce_bgl"),
        entries: &[
            uniform_entry(0),
            storage_entry(4, true),  // degrees
            storage_entry(6, true),  // rep forces
            storage_entry(7, false), // attraction accumulator
            storage_entry(8, false), // previous forces
            storage_entry(9, false), // speed state
        ],
    });
    let speed_finalize_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("speed_finalize_bgl"),
            entries: &[uniform_entry(0), storage_entry(9, false)],
        });
    let integrate_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("integrate_bgl"),
        entries: &[
            uniform_entry(0),
            storage_entry(1, true),  // positions in (front)
            storage_entry(2, false), // positions out (back)
            storage_entry(3, true),  // styles
            storage_entry(5, true),  // bounds
            storage_entry(6, true),  // rep forces
            storage_entry(7, false), // attraction accumulator
            storage_entry(8, false), // previous forces
            storage_entry(9, false), // speed state
        ],
    });

    let pipeline = |label: &str,
                    module: &wgpu::ShaderModule,
                    entry: &str,
                    layout: &wgpu::BindGroupLayout| {
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[layout],
            ..Default::default()
        });
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module,
            entry_point: Some(entry),
            compilation_options: Default::default(),
            cache: None,
        })
    };

    ForcePipelines {
        repulsion: pipeline("force_repulsion", &repulsion_shader, "repulsion", &repulsion_layout),
        attraction: pipeline(
            "force_attraction",
            &attraction_shader,
            "attraction",
            &attraction_layout,
        ),
        speed_reduce: pipeline(
            "force_speed_reduce",
            &integrate_shader,
            "speed_reduce",
            &speed_reduce_layout,
        ),
        speed_finalize: pipeline(
            "force_speed_finalize",
            &integrate_shader,
            "speed_finalize",
            &speed_finalize_layout,
        ),
        integrate: pipeline("force_integrate", &integrate_shader, "integrate", &integrate_layout),
        repulsion_layout,
        attraction_layout,
        speed_reduce_layout,
        speed_finalize_layout,
        integrate_layout,
    }
}

// ── Buffers ───────────────────────────────────────────────────────────────────

pub struct ForceBuffers {
    /// Per-node repulsion, plain f32 pairs (one writer per slot).
    pub rep_forces: wgpu::Buffer,
    /// Per-node attraction, fixed-point i32 pairs shared across edge threads.
    pub attr_forces: wgpu::Buffer,
    /// F_{t−1} per node for the swinging/traction measures.
    pub prev_forces: wgpu::Buffer,
    /// Swinging/traction sums + global speed (16 bytes).
    pub speed: wgpu::Buffer,
    pub sim_params: wgpu::Buffer,
    node_capacity: u32,
}

impl ForceBuffers {
    pub fn new(ctx: &GpuContext, node_slots: u32) -> Self {
        let n = node_slots.max(1);
        Self {
            rep_forces: ctx.storage_buffer("force_repulsion_buf", n as u64 * 8, false),
            attr_forces: ctx.storage_buffer("force_attraction_buf", n as u64 * 8, false),
            prev_forces: ctx.storage_buffer("force_prev_buf", n as u64 * 8, false),
            speed: ctx.storage_buffer("force_speed_state", 16, false),
            sim_params: ctx.uniform_init("sim_params", &SimParamsUniform::zeroed()),
            node_capacity: n,
        }
    }

    /// Grow per-node buffers when the slot count outgrows them.  New buffers
    /// come back zeroed, which is exactly the state a fresh tick expects.
    pub fn reshape(&mut self, ctx: &GpuContext, node_slots: u32) -> bool {
        let n = node_slots.max(1);
        if n <= self.node_capacity {
            return false;
        }
        let cap = n.next_power_of_two();
        self.rep_forces = ctx.storage_buffer("force_repulsion_buf", cap as u64 * 8, false);
        self.attr_forces = ctx.storage_buffer("force_attraction_buf", cap as u64 * 8, false);
        self.prev_forces = ctx.storage_buffer("force_prev_buf", cap as u64 * 8, false);
        self.speed = ctx.storage_buffer("force_speed_state", 16, false);
        self.node_capacity = cap;
        true
    }
}

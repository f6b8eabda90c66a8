//! GPU quadtree construction (bounds → Hilbert codes → radix sort → leaves →
//! bottom-up merge).
//!
//! The tree is rebuilt from scratch every simulation tick into one linear
//! cell buffer; level offsets are computed host-side and handed to the merge
//! passes as per-level uniforms so a whole rebuild encodes without any
//! readback.

use crate::context::{storage_entry, uniform_entry, GpuContext};

pub const WORKGROUP_SIZE: u32 = 256;
const RADIX: u32 = 256;

/// Sentinel child index for "no child" (mirrors EMPTY in the shaders).
pub const EMPTY_CELL: u32 = u32::MAX;

// ── CPU-visible layouts ───────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QtParams {
    pub count: u32,
    pub margin: f32,
    pub _pad0: u32,
    pub _pad1: u32,
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SortParams {
    pub shift: u32,
    pub count: u32,
    pub num_wg: u32,
    pub _pad: u32,
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LevelParams {
    pub src_offset: u32,
    pub src_count: u32,
    pub dst_offset: u32,
    pub dst_count: u32,
}

/// One quadtree cell, leaf or internal (48 bytes, matches `Cell` in WGSL).
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Cell {
    pub com: [f32; 2],
    pub mass: f32,
    /// Side length in normalised domain units (1 = whole bbox).
    pub side: f32,
    pub children: [u32; 4],
    pub code: u32,
    pub prefix_len: u32,
    pub node_index: u32,
    pub _pad: u32,
}

/// CPU reference of the shader's Hilbert encoding: (x, y) on the 2¹⁶ grid →
/// 32-bit d-index.  Kept bit-for-bit in sync with `hilbert.wgsl`; tests and
/// diagnostics compare against this.
pub fn hilbert_d(x: u16, y: u16) -> u32 {
    let mut x = x as u32;
    let mut y = y as u32;
    let mut d = 0u32;
    let mut s = 1u32 << 15;
    while s > 0 {
        let rx = u32::from(x & s != 0);
        let ry = u32::from(y & s != 0);
        d += s * s * ((3 * rx) ^ ry);
        if ry == 0 {
            if rx == 1 {
                x = 65535 - x;
                y = 65535 - y;
            }
            std::mem::swap(&mut x, &mut y);
        }
        s >>= 1;
    }
    d
}

// ── Level geometry ────────────────────────────────────────────────────────────

/// Host-side shape of the tree for a given node count: per-level offsets and
/// counts inside the linear cell buffer, leaves first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeLevels {
    pub offsets: Vec<u32>,
    pub counts: Vec<u32>,
    pub total: u32,
}

impl TreeLevels {
    /// Level 0 holds `n` leaves; each level above merges groups of ≤4 until a
    /// single root remains (⌈log₄ n⌉ merge steps).
    pub fn for_node_count(n: u32) -> Self {
        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        let mut offset = 0u32;
        let mut count = n.max(1);
        loop {
            offsets.push(offset);
            counts.push(count);
            offset += count;
            if count == 1 {
                break;
            }
            count = count.div_ceil(4);
        }
        Self { offsets, counts, total: offset }
    }

    pub fn root_index(&self) -> u32 {
        self.total - 1
    }

    /// Merge-step parameters, bottom level first.
    pub fn merge_steps(&self) -> impl Iterator<Item = LevelParams> + '_ {
        (0..self.counts.len().saturating_sub(1)).map(|i| LevelParams {
            src_offset: self.offsets[i],
            src_count: self.counts[i],
            dst_offset: self.offsets[i + 1],
            dst_count: self.counts[i + 1],
        })
    }
}

pub fn dispatch_size(threads: u32) -> u32 {
    threads.div_ceil(WORKGROUP_SIZE)
}

pub fn sort_workgroups(n: u32) -> u32 {
    n.max(1).div_ceil(WORKGROUP_SIZE)
}

// ── Pipelines ─────────────────────────────────────────────────────────────────

pub struct QuadtreePipelines {
    pub bounds_reset: wgpu::ComputePipeline,
    pub bounds_reduce: wgpu::ComputePipeline,
    pub bounds_finalize: wgpu::ComputePipeline,
    pub hilbert_assign: wgpu::ComputePipeline,
    pub sort_histogram: wgpu::ComputePipeline,
    pub sort_scan: wgpu::ComputePipeline,
    pub sort_scatter: wgpu::ComputePipeline,
    pub leaf_init: wgpu::ComputePipeline,
    pub merge_level: wgpu::ComputePipeline,
    pub bounds_layout: wgpu::BindGroupLayout,
    pub hilbert_layout: wgpu::BindGroupLayout,
    pub sort_layout: wgpu::BindGroupLayout,
    pub tree_layout: wgpu::BindGroupLayout,
    pub level_layout: wgpu::BindGroupLayout,
}

pub fn create_quadtree_pipelines(device: &wgpu::Device) -> QuadtreePipelines {
    let bounds_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("quadtree_bounds_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/bounds.wgsl").into()),
    });
    let hilbert_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("quadtree_hilbert_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/hilbert.wgsl").into()),
    });
    let sort_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("quadtree_sort_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/sort.wgsl").into()),
    });
    let tree_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("quadtree_tree_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/tree.wgsl").into()),
    });

    let bounds_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("quadtree_bounds_bgl"),
        entries: &[
            uniform_entry(0),
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, false),
            storage_entry(4, false),
        ],
    });
    let hilbert_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("quadtree_hilbert_bgl"),
        entries: &[
            uniform_entry(0),
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, true),
            storage_entry(4, false),
        ],
    });
    let sort_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("quadtree_sort_bgl"),
        entries: &[
            uniform_entry(0),
            storage_entry(1, true),
            storage_entry(2, false),
            storage_entry(3, false),
            storage_entry(4, false),
        ],
    });
    let tree_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("quadtree_tree_bgl"),
        entries: &[
            uniform_entry(0),
            storage_entry(1, true),
            storage_entry(2, true),
            storage_entry(3, true),
            storage_entry(4, false),
        ],
    });
    let level_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("quadtree_level_bgl"),
        entries: &[uniform_entry(0)],
    });

    let pipeline = |label: &str,
                    module: &wgpu::ShaderModule,
                    entry: &str,
                    layouts: &[&wgpu::BindGroupLayout]| {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: layouts,
            ..Default::default()
        });
        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&layout),
            module,
            entry_point: Some(entry),
            compilation_options: Default::default(),
            cache: None,
        })
    };

    QuadtreePipelines {
        bounds_reset: pipeline("qt_bounds_reset", &bounds_shader, "bounds_reset", &[&bounds_layout]),
        bounds_reduce: pipeline("qt_bounds_reduce", &bounds_shader, "bounds_reduce", &[&bounds_layout]),
        bounds_finalize: pipeline("qt_bounds_finalize", &bounds_shader, "bounds_finalize", &[&bounds_layout]),
        hilbert_assign: pipeline("qt_hilbert_assign", &hilbert_shader, "hilbert_assign", &[&hilbert_layout]),
        sort_histogram: pipeline("qt_sort_histogram", &sort_shader, "sort_histogram", &[&sort_layout]),
        sort_scan: pipeline("qt_sort_scan", &sort_shader, "sort_scan", &[&sort_layout]),
        sort_scatter: pipeline("qt_sort_scatter", &sort_shader, "sort_scatter", &[&sort_layout]),
        leaf_init: pipeline("qt_leaf_init", &tree_shader, "leaf_init", &[&tree_layout]),
        merge_level: pipeline(
            "qt_merge_level",
            &tree_shader,
            "merge_level",
            &[&tree_layout, &level_layout],
        ),
        bounds_layout,
        hilbert_layout,
        sort_layout,
        tree_layout,
        level_layout,
    }
}

// ── Buffers ───────────────────────────────────────────────────────────────────

pub struct QuadtreeBuffers {
    pub bounds_atomic: wgpu::Buffer,
    pub bounds: wgpu::Buffer,
    /// (code, index) pair ping-pong for the radix sort; sorted data ends in
    /// `pairs[0]` after the four passes.
    pub pairs: [wgpu::Buffer; 2],
    pub histograms: wgpu::Buffer,
    pub digit_offsets: wgpu::Buffer,
    pub cells: wgpu::Buffer,
    pub qt_params: wgpu::Buffer,
    pub sort_params: [wgpu::Buffer; 4],
    pub level_params: Vec<wgpu::Buffer>,
    pub levels: TreeLevels,
    node_capacity: u32,
}

impl QuadtreeBuffers {
    pub fn new(ctx: &GpuContext, node_slots: u32, margin: f32) -> Self {
        let n = node_slots.max(1);
        let levels = TreeLevels::for_node_count(n);
        let num_wg = sort_workgroups(n);

        let qt_params = ctx.uniform_init(
            "qt_params",
            &QtParams { count: n, margin, _pad0: 0, _pad1: 0 },
        );
        let sort_params = [0u32, 8, 16, 24].map(|shift| {
            ctx.uniform_init(
                "qt_sort_params",
                &SortParams { shift, count: n, num_wg, _pad: 0 },
            )
        });
        let level_params = levels
            .merge_steps()
            .map(|step| ctx.uniform_init("qt_level_params", &step))
            .collect();

        Self {
            bounds_atomic: ctx.storage_buffer("qt_bounds_atomic", 16, false),
            bounds: ctx.storage_buffer("qt_bounds", 32, false),
            pairs: [
                ctx.storage_buffer("qt_pairs_a", n as u64 * 8, false),
                ctx.storage_buffer("qt_pairs_b", n as u64 * 8, false),
            ],
            histograms: ctx.storage_buffer("qt_histograms", num_wg as u64 * RADIX as u64 * 4, false),
            digit_offsets: ctx.storage_buffer(
                "qt_digit_offsets",
                num_wg as u64 * RADIX as u64 * 4,
                false,
            ),
            cells: ctx.storage_buffer(
                "qt_cells",
                levels.total as u64 * std::mem::size_of::<Cell>() as u64,
                true,
            ),
            qt_params,
            sort_params,
            level_params,
            levels,
            node_capacity: n,
        }
    }

    /// Follow a node-count change: reallocate the count-dependent buffers and
    /// rewrite every derived uniform.  Returns `true` when buffer objects
    /// changed (bind groups must be rebuilt).
    pub fn reshape(&mut self, ctx: &GpuContext, node_slots: u32, margin: f32) -> bool {
        let n = node_slots.max(1);
        let levels = TreeLevels::for_node_count(n);
        let num_wg = sort_workgroups(n);
        let grew = n > self.node_capacity;

        if grew {
            let cap = n.next_power_of_two();
            self.pairs = [
                ctx.storage_buffer("qt_pairs_a", cap as u64 * 8, false),
                ctx.storage_buffer("qt_pairs_b", cap as u64 * 8, false),
            ];
            let cap_wg = sort_workgroups(cap);
            self.histograms =
                ctx.storage_buffer("qt_histograms", cap_wg as u64 * RADIX as u64 * 4, false);
            self.digit_offsets =
                ctx.storage_buffer("qt_digit_offsets", cap_wg as u64 * RADIX as u64 * 4, false);
            let cap_levels = TreeLevels::for_node_count(cap);
            self.cells = ctx.storage_buffer(
                "qt_cells",
                cap_levels.total as u64 * std::mem::size_of::<Cell>() as u64,
                true,
            );
            self.node_capacity = cap;
        }

        ctx.queue.write_buffer(
            &self.qt_params,
            0,
            bytemuck::bytes_of(&QtParams { count: n, margin, _pad0: 0, _pad1: 0 }),
        );
        for (buffer, shift) in self.sort_params.iter().zip([0u32, 8, 16, 24]) {
            ctx.queue.write_buffer(
                buffer,
                0,
                bytemuck::bytes_of(&SortParams { shift, count: n, num_wg, _pad: 0 }),
            );
        }

        // Per-level uniforms are tiny; rebuild rather than patch.
        self.level_params = levels
            .merge_steps()
            .map(|step| ctx.uniform_init("qt_level_params", &step))
            .collect();
        self.levels = levels;
        grew
    }
}

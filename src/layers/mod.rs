//! Render layers.  Each layer owns its pipelines, bind-group layouts and
//! layer-private buffers; they all share the frame uniform at group(0) and
//! read node positions straight from the simulation's front ping-pong
//! buffer, so there is no per-frame vertex upload for graph geometry.

pub mod contour;
pub mod edges;
pub mod heatmap;
pub mod labels;
pub mod nodes;
pub mod picking;

use crate::camera::FrameUniform;
use crate::context::{uniform_entry_vis, GpuContext};

// ── FrameCommon ───────────────────────────────────────────────────────────────

/// The per-frame uniform buffer plus the group(0) layout/bind-group every
/// layer shares.  Written once per frame before any pass.
pub struct FrameCommon {
    pub buffer: wgpu::Buffer,
    pub layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
}

impl FrameCommon {
    pub fn new(ctx: &GpuContext) -> Self {
        let buffer = ctx.uniform_init("frame_uniform", &FrameUniform::identity());
        let layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("frame_bgl"),
                entries: &[uniform_entry_vis(
                    0,
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                )],
            });
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame_bg"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, layout, bind_group }
    }

    pub fn write(&self, ctx: &GpuContext, uniform: &FrameUniform) {
        ctx.queue
            .write_buffer(&self.buffer, 0, bytemuck::bytes_of(uniform));
    }
}

impl FrameUniform {
    fn identity() -> Self {
        Self {
            clip_from_world_x: [1.0, 0.0, 0.0, 0.0],
            clip_from_world_y: [0.0, 1.0, 0.0, 0.0],
            viewport: [1.0, 1.0],
            dpr: 1.0,
            time: 0.0,
        }
    }
}

// ── InstanceBuffer ────────────────────────────────────────────────────────────

/// Capacity-doubling storage buffer for CPU-generated instance data (glyphs,
/// label backgrounds).  Reallocates only when the element count outgrows the
/// capacity, then writes fresh data each frame.
pub struct InstanceBuffer {
    label: &'static str,
    buffer: wgpu::Buffer,
    capacity: u32,
    pub len: u32,
}

impl InstanceBuffer {
    pub fn new(ctx: &GpuContext, label: &'static str, element_size: u64) -> Self {
        let capacity = 256;
        Self {
            label,
            buffer: ctx.storage_buffer(label, capacity as u64 * element_size, false),
            capacity,
            len: 0,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Upload `data`, growing the buffer when needed.  Returns `true` when
    /// the buffer object was replaced (dependent bind groups are stale).
    pub fn upload<T: bytemuck::Pod>(&mut self, ctx: &GpuContext, data: &[T]) -> bool {
        self.len = data.len() as u32;
        if data.is_empty() {
            return false;
        }
        let mut reallocated = false;
        if self.len > self.capacity {
            let capacity = self.len.next_power_of_two();
            self.buffer = ctx.storage_buffer(
                self.label,
                capacity as u64 * std::mem::size_of::<T>() as u64,
                false,
            );
            self.capacity = capacity;
            reallocated = true;
        }
        ctx.queue
            .write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
        reallocated
    }
}

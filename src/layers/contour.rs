use crate::color::Color;
use crate::context::{
    storage_entry, storage_entry_vis, texture_entry, uniform_entry, uniform_entry_vis, GpuContext,
};
use crate::layers::heatmap::HeatmapLayer;

/// Hard cap on marching-squares output per frame; the finalize kernel clamps
/// the indirect instance count to this.
const MAX_SEGMENTS: u32 = 1 << 17;
/// The params uniform carries thresholds as two vec4s.
pub const MAX_THRESHOLDS: usize = 8;

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ContourConfig {
    /// Iso-values in the normalised density range, ascending.  At most
    /// [`MAX_THRESHOLDS`] are used.
    pub thresholds: Vec<f32>,
    pub stroke_width: f32,
    pub stroke_color: Color,
    pub opacity: f32,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            thresholds: vec![0.3, 0.5, 0.7],
            stroke_width: 2.0,
            stroke_color: Color::WHITE,
            opacity: 1.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ContourConfigPatch {
    pub thresholds: Option<Vec<f32>>,
    pub stroke_width: Option<f32>,
    pub stroke_color: Option<Color>,
    pub opacity: Option<f32>,
}

impl ContourConfig {
    pub fn apply(&mut self, patch: &ContourConfigPatch) {
        if let Some(v) = &patch.thresholds {
            let mut t: Vec<f32> = v.iter().copied().filter(|x| x.is_finite()).collect();
            t.sort_by(|a, b| a.total_cmp(b));
            t.truncate(MAX_THRESHOLDS);
            self.thresholds = t;
        }
        if let Some(v) = patch.stroke_width {
            self.stroke_width = v.max(0.1);
        }
        if let Some(v) = patch.stroke_color {
            self.stroke_color = v;
        }
        if let Some(v) = patch.opacity {
            self.opacity = v.clamp(0.0, 1.0);
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ContourParams {
    thresholds0: [f32; 4],
    thresholds1: [f32; 4],
    threshold_count: u32,
    normalize: u32,
    max_density: f32,
    max_segments: u32,
    tex_width: u32,
    tex_height: u32,
    _pad0: u32,
    _pad1: u32,
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct ContourDrawParams {
    stroke_color: [f32; 4],
    stroke_width: f32,
    opacity: f32,
    tex_width: f32,
    tex_height: f32,
}

// ── ContourLayer ──────────────────────────────────────────────────────────────

/// Marching-squares iso-lines over the heatmap's density texture.  Segment
/// extraction runs in compute and feeds an indirect instanced draw; the host
/// never reads the segment count.
pub struct ContourLayer {
    reset_pipeline: wgpu::ComputePipeline,
    emit_pipeline: wgpu::ComputePipeline,
    finalize_pipeline: wgpu::ComputePipeline,
    draw_pipeline: wgpu::RenderPipeline,
    compute_layout: wgpu::BindGroupLayout,
    draw_layout: wgpu::BindGroupLayout,
    compute_group: Option<wgpu::BindGroup>,
    draw_group: wgpu::BindGroup,
    params: wgpu::Buffer,
    draw_params: wgpu::Buffer,
    segments: wgpu::Buffer,
    counter: wgpu::Buffer,
    indirect: wgpu::Buffer,
    density_size: (u32, u32),
    pub config: ContourConfig,
    pub visible: bool,
}

impl ContourLayer {
    pub fn new(ctx: &GpuContext, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let config = ContourConfig::default();
        let device = &ctx.device;
        let compute_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("contour_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/contour.wgsl").into()),
        });
        let draw_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("contour_draw_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/contour_draw.wgsl").into()),
        });

        let compute_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("contour_compute_bgl"),
            entries: &[
                uniform_entry(0),
                texture_entry(1, wgpu::ShaderStages::COMPUTE, true),
                storage_entry(2, true),
                storage_entry(3, false),
                storage_entry(4, false),
                storage_entry(5, false),
            ],
        });
        let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("contour_draw_bgl"),
            entries: &[
                storage_entry_vis(0, true, wgpu::ShaderStages::VERTEX),
                uniform_entry_vis(1, wgpu::ShaderStages::VERTEX),
            ],
        });

        let compute_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("contour_compute_pipeline_layout"),
                bind_group_layouts: &[&compute_layout],
                ..Default::default()
            });
        let compute = |label: &str, entry: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&compute_pipeline_layout),
                module: &compute_shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let reset_pipeline = compute("contour_reset", "contour_reset");
        let emit_pipeline = compute("contour_emit", "contour_emit");
        let finalize_pipeline = compute("contour_finalize", "contour_finalize");

        let draw_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("contour_draw_pipeline_layout"),
            bind_group_layouts: &[frame_layout, &draw_layout],
            ..Default::default()
        });
        let draw_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("contour_draw_pipeline"),
            layout: Some(&draw_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &draw_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &draw_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.target_format(),
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let params = ctx.uniform_init("contour_params", &ContourParams::default_zeroed());
        let draw_params = ctx.uniform_init(
            "contour_draw_params",
            &ContourDrawParams {
                stroke_color: config.stroke_color.to_array(),
                stroke_width: config.stroke_width,
                opacity: config.opacity,
                tex_width: 1.0,
                tex_height: 1.0,
            },
        );
        let segments = ctx.storage_buffer("contour_segments", MAX_SEGMENTS as u64 * 16, false);
        let counter = ctx.storage_buffer("contour_counter", 4, false);
        let indirect = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("contour_indirect"),
            size: 16,
            usage: wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let draw_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("contour_draw_bg"),
            layout: &draw_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: segments.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: draw_params.as_entire_binding() },
            ],
        });

        Self {
            reset_pipeline,
            emit_pipeline,
            finalize_pipeline,
            draw_pipeline,
            compute_layout,
            draw_layout,
            compute_group: None,
            draw_group,
            params,
            draw_params,
            segments,
            counter,
            indirect,
            density_size: (1, 1),
            config,
            visible: false,
        }
    }

    /// Re-sync against the heatmap's density output: texture size, the
    /// normalisation the thresholds are interpreted in, and the bind group
    /// referencing the (possibly re-created) density view.
    pub fn sync_density(&mut self, ctx: &GpuContext, heatmap: &HeatmapLayer) {
        self.density_size = heatmap.density_size();
        self.write_params(ctx, heatmap);
        self.compute_group = Some(ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("contour_compute_bg"),
            layout: &self.compute_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.params.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(heatmap.density_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: heatmap.stats_buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.segments.as_entire_binding(),
                },
                wgpu::BindGroupEntry { binding: 4, resource: self.counter.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: self.indirect.as_entire_binding() },
            ],
        }));
    }

    pub fn set_config(&mut self, ctx: &GpuContext, heatmap: &HeatmapLayer, patch: &ContourConfigPatch) {
        self.config.apply(patch);
        self.write_params(ctx, heatmap);
    }

    fn write_params(&self, ctx: &GpuContext, heatmap: &HeatmapLayer) {
        let mut thresholds = [0.0f32; MAX_THRESHOLDS];
        for (slot, value) in thresholds.iter_mut().zip(&self.config.thresholds) {
            *slot = *value;
        }
        let (w, h) = self.density_size;
        let params = ContourParams {
            thresholds0: [thresholds[0], thresholds[1], thresholds[2], thresholds[3]],
            thresholds1: [thresholds[4], thresholds[5], thresholds[6], thresholds[7]],
            threshold_count: self.config.thresholds.len().min(MAX_THRESHOLDS) as u32,
            normalize: heatmap.config.normalize as u32,
            max_density: heatmap.config.max_density,
            max_segments: MAX_SEGMENTS,
            tex_width: w,
            tex_height: h,
            _pad0: 0,
            _pad1: 0,
        };
        ctx.queue
            .write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
        let draw = ContourDrawParams {
            stroke_color: self.config.stroke_color.to_array(),
            stroke_width: self.config.stroke_width,
            opacity: self.config.opacity,
            tex_width: w as f32,
            tex_height: h as f32,
        };
        ctx.queue
            .write_buffer(&self.draw_params, 0, bytemuck::bytes_of(&draw));
    }

    /// Marching-squares extraction into the segment + indirect buffers.
    pub fn encode_extract(&self, encoder: &mut wgpu::CommandEncoder) {
        let Some(group) = &self.compute_group else { return };
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("contour_extract"),
            timestamp_writes: None,
        });
        pass.set_bind_group(0, group, &[]);
        pass.set_pipeline(&self.reset_pipeline);
        pass.dispatch_workgroups(1, 1, 1);
        pass.set_pipeline(&self.emit_pipeline);
        pass.dispatch_workgroups(
            self.density_size.0.div_ceil(16),
            self.density_size.1.div_ceil(16),
            1,
        );
        pass.set_pipeline(&self.finalize_pipeline);
        pass.dispatch_workgroups(1, 1, 1);
    }

    /// Indirect instanced line-quad draw inside the composite pass.
    pub fn encode_composite(&self, pass: &mut wgpu::RenderPass<'_>, frame_bg: &wgpu::BindGroup) {
        pass.set_pipeline(&self.draw_pipeline);
        pass.set_bind_group(0, frame_bg, &[]);
        pass.set_bind_group(1, &self.draw_group, &[]);
        pass.draw_indirect(&self.indirect, 0);
    }
}

impl ContourParams {
    fn default_zeroed() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

use crate::colormap::ColorScale;
use crate::context::{
    sampler_entry, storage_entry, storage_entry_vis, texture_entry, uniform_entry,
    uniform_entry_vis, GpuContext,
};
use crate::graph::GraphBuffers;

/// Upper bound on the density texture's edge length.
pub const MAX_DENSITY_TEXTURE_SIZE: u32 = 1024;

/// Density target format: blendable and filterable everywhere, which the
/// init-time capability probe verifies.
pub(crate) const DENSITY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
pub struct HeatmapConfig {
    pub color_scale: ColorScale,
    /// Splat radius in screen pixels (dpr-scaled, zoom-independent).
    pub radius: f32,
    pub intensity: f32,
    pub opacity: f32,
    /// Clamp ceiling applied to raw density before any mapping.
    pub max_density: f32,
    /// Rescale by the frame's reduced maximum (capped at `max_density`) so
    /// the hottest clamped point maps to 1.0; off divides by `max_density`.
    pub normalize: bool,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            color_scale: ColorScale::Viridis,
            radius: 40.0,
            intensity: 0.1,
            opacity: 0.7,
            max_density: 1.0,
            normalize: true,
        }
    }
}

/// Partial update; unset keys keep their current value.
#[derive(Copy, Clone, Debug, Default)]
pub struct HeatmapConfigPatch {
    pub color_scale: Option<ColorScale>,
    pub radius: Option<f32>,
    pub intensity: Option<f32>,
    pub opacity: Option<f32>,
    pub max_density: Option<f32>,
    pub normalize: Option<bool>,
}

impl HeatmapConfig {
    pub fn apply(&mut self, patch: &HeatmapConfigPatch) {
        if let Some(v) = patch.color_scale {
            self.color_scale = v;
        }
        if let Some(v) = patch.radius {
            self.radius = v.max(1.0);
        }
        if let Some(v) = patch.intensity {
            self.intensity = v.max(0.0);
        }
        if let Some(v) = patch.opacity {
            self.opacity = v.clamp(0.0, 1.0);
        }
        if let Some(v) = patch.max_density {
            self.max_density = v.max(1e-6);
        }
        if let Some(v) = patch.normalize {
            self.normalize = v;
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct HeatmapParams {
    radius: f32,
    intensity: f32,
    opacity: f32,
    max_density: f32,
    normalize: u32,
    tex_width: u32,
    tex_height: u32,
    _pad: u32,
}

// ── HeatmapLayer ──────────────────────────────────────────────────────────────

/// Gaussian density accumulation plus a colormapped fullscreen composite.
/// The density texture stays alive as this layer's output so the contour
/// layer can sample it.
pub struct HeatmapLayer {
    splat_pipeline: wgpu::RenderPipeline,
    reset_pipeline: wgpu::ComputePipeline,
    max_pipeline: wgpu::ComputePipeline,
    colormap_pipeline: wgpu::RenderPipeline,
    splat_layout: wgpu::BindGroupLayout,
    max_layout: wgpu::BindGroupLayout,
    colormap_layout: wgpu::BindGroupLayout,
    splat_groups: Option<[wgpu::BindGroup; 2]>,
    max_group: wgpu::BindGroup,
    colormap_group: wgpu::BindGroup,
    /// Keeps the density target alive; passes reference it through the view.
    #[allow(dead_code)]
    density_texture: wgpu::Texture,
    density_view: wgpu::TextureView,
    density_size: (u32, u32),
    stats: wgpu::Buffer,
    params: wgpu::Buffer,
    sampler: wgpu::Sampler,
    lut_view: wgpu::TextureView,
    pub config: HeatmapConfig,
    pub visible: bool,
}

impl HeatmapLayer {
    pub fn new(ctx: &mut GpuContext, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let config = HeatmapConfig::default();
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("heatmap_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/heatmap.wgsl").into()),
        });

        let splat_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("heatmap_splat_bgl"),
            entries: &[
                storage_entry_vis(0, true, wgpu::ShaderStages::VERTEX),
                storage_entry_vis(1, true, wgpu::ShaderStages::VERTEX),
                uniform_entry_vis(2, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let max_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("heatmap_max_bgl"),
            entries: &[
                uniform_entry(2),
                texture_entry(3, wgpu::ShaderStages::COMPUTE, true),
                storage_entry(4, false),
            ],
        });
        let colormap_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("heatmap_colormap_bgl"),
            entries: &[
                uniform_entry_vis(2, wgpu::ShaderStages::FRAGMENT),
                texture_entry(3, wgpu::ShaderStages::FRAGMENT, true),
                sampler_entry(5, wgpu::ShaderStages::FRAGMENT),
                texture_entry(6, wgpu::ShaderStages::FRAGMENT, true),
                sampler_entry(7, wgpu::ShaderStages::FRAGMENT),
                storage_entry_vis(8, true, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let splat_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("heatmap_splat_pipeline_layout"),
                bind_group_layouts: &[frame_layout, &splat_layout],
                ..Default::default()
            });
        let additive = wgpu::BlendState {
            color: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            alpha: wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
        };
        let splat_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("heatmap_splat_pipeline"),
            layout: Some(&splat_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_splat"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_splat"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: DENSITY_FORMAT,
                    blend: Some(additive),
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

        let compute = |label: &str, entry: &str, layout: &wgpu::BindGroupLayout| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[frame_layout, layout],
                ..Default::default()
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };
        let reset_pipeline = compute("heatmap_density_reset", "density_reset", &max_layout);
        let max_pipeline = compute("heatmap_density_max", "density_max", &max_layout);

        let colormap_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("heatmap_colormap_pipeline_layout"),
                bind_group_layouts: &[frame_layout, &colormap_layout],
                ..Default::default()
            });
        let colormap_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("heatmap_colormap_pipeline"),
            layout: Some(&colormap_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_colormap"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_colormap"),
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

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("heatmap_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let (width, height) = ctx.target_size();
        let density_size = density_texture_size(width, height, 1.0);
        let (density_texture, density_view) =
            create_density_texture(device, density_size.0, density_size.1);
        let stats = ctx.storage_buffer("heatmap_stats", 4, false);
        let params = ctx.uniform_init(
            "heatmap_params",
            &params_from(&config, density_size),
        );
        let lut_view = ctx.colormap_view(config.color_scale);

        let max_group = build_max_group(ctx, &max_layout, &params, &density_view, &stats);
        let colormap_group = build_colormap_group(
            ctx,
            &colormap_layout,
            &params,
            &density_view,
            &sampler,
            &lut_view,
            &stats,
        );

        Self {
            splat_pipeline,
            reset_pipeline,
            max_pipeline,
            colormap_pipeline,
            splat_layout,
            max_layout,
            colormap_layout,
            splat_groups: None,
            max_group,
            colormap_group,
            density_texture,
            density_view,
            density_size,
            stats,
            params,
            sampler,
            lut_view,
            config,
            visible: false,
        }
    }

    pub fn density_view(&self) -> &wgpu::TextureView {
        &self.density_view
    }

    pub fn density_size(&self) -> (u32, u32) {
        self.density_size
    }

    pub fn stats_buffer(&self) -> &wgpu::Buffer {
        &self.stats
    }

    /// `true` when the density texture object changed (contour bind groups
    /// referencing it are stale).
    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32, dpr: f32) -> bool {
        let size = density_texture_size(width, height, dpr);
        if size == self.density_size {
            return false;
        }
        let (texture, view) = create_density_texture(&ctx.device, size.0, size.1);
        self.density_texture = texture;
        self.density_view = view;
        self.density_size = size;
        self.write_params(ctx);
        self.max_group =
            build_max_group(ctx, &self.max_layout, &self.params, &self.density_view, &self.stats);
        self.colormap_group = build_colormap_group(
            ctx,
            &self.colormap_layout,
            &self.params,
            &self.density_view,
            &self.sampler,
            &self.lut_view,
            &self.stats,
        );
        true
    }

    pub fn set_config(&mut self, ctx: &mut GpuContext, patch: &HeatmapConfigPatch) {
        let old_scale = self.config.color_scale;
        self.config.apply(patch);
        self.write_params(ctx);
        if self.config.color_scale != old_scale {
            self.lut_view = ctx.colormap_view(self.config.color_scale);
            self.colormap_group = build_colormap_group(
                ctx,
                &self.colormap_layout,
                &self.params,
                &self.density_view,
                &self.sampler,
                &self.lut_view,
                &self.stats,
            );
        }
    }

    fn write_params(&self, ctx: &GpuContext) {
        ctx.queue.write_buffer(
            &self.params,
            0,
            bytemuck::bytes_of(&params_from(&self.config, self.density_size)),
        );
    }

    pub fn rebuild(&mut self, ctx: &GpuContext, graph: &GraphBuffers) {
        let group = |front: usize| {
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("heatmap_splat_bg"),
                layout: &self.splat_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: graph.position_buffer(front).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: graph.styles().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.params.as_entire_binding(),
                    },
                ],
            })
        };
        self.splat_groups = Some([group(0), group(1)]);
    }

    /// Splat accumulation and the max reduction; cleared and rebuilt every
    /// frame the layer is visible.
    pub fn encode_density(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        frame_bg: &wgpu::BindGroup,
        front: usize,
        node_count: u32,
    ) {
        let Some(groups) = &self.splat_groups else { return };
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("heatmap_splat_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.density_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            if node_count > 0 {
                pass.set_pipeline(&self.splat_pipeline);
                pass.set_bind_group(0, frame_bg, &[]);
                pass.set_bind_group(1, &groups[front], &[]);
                pass.draw(0..6, 0..node_count);
            }
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("heatmap_density_max"),
                timestamp_writes: None,
            });
            pass.set_bind_group(0, frame_bg, &[]);
            pass.set_bind_group(1, &self.max_group, &[]);
            pass.set_pipeline(&self.reset_pipeline);
            pass.dispatch_workgroups(1, 1, 1);
            pass.set_pipeline(&self.max_pipeline);
            pass.dispatch_workgroups(
                self.density_size.0.div_ceil(16),
                self.density_size.1.div_ceil(16),
                1,
            );
        }
    }

    /// The colour-mapped fullscreen blend into the composite pass.
    pub fn encode_composite(&self, pass: &mut wgpu::RenderPass<'_>, frame_bg: &wgpu::BindGroup) {
        pass.set_pipeline(&self.colormap_pipeline);
        pass.set_bind_group(0, frame_bg, &[]);
        pass.set_bind_group(1, &self.colormap_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

fn params_from(config: &HeatmapConfig, size: (u32, u32)) -> HeatmapParams {
    HeatmapParams {
        radius: config.radius,
        intensity: config.intensity,
        opacity: config.opacity,
        max_density: config.max_density,
        normalize: config.normalize as u32,
        tex_width: size.0,
        tex_height: size.1,
        _pad: 0,
    }
}

/// Density resolution follows viewport ÷ dpr, clamped to the configured cap.
fn density_texture_size(width: u32, height: u32, dpr: f32) -> (u32, u32) {
    let w = ((width as f32 / dpr.max(0.1)) as u32).clamp(1, MAX_DENSITY_TEXTURE_SIZE);
    let h = ((height as f32 / dpr.max(0.1)) as u32).clamp(1, MAX_DENSITY_TEXTURE_SIZE);
    (w, h)
}

fn create_density_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("heatmap_density"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DENSITY_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn build_max_group(
    ctx: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    params: &wgpu::Buffer,
    density_view: &wgpu::TextureView,
    stats: &wgpu::Buffer,
) -> wgpu::BindGroup {
    ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("heatmap_max_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 2, resource: params.as_entire_binding() },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(density_view),
            },
            wgpu::BindGroupEntry { binding: 4, resource: stats.as_entire_binding() },
        ],
    })
}

fn build_colormap_group(
    ctx: &GpuContext,
    layout: &wgpu::BindGroupLayout,
    params: &wgpu::Buffer,
    density_view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
    lut_view: &wgpu::TextureView,
    stats: &wgpu::Buffer,
) -> wgpu::BindGroup {
    ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("heatmap_colormap_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 2, resource: params.as_entire_binding() },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(density_view),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry {
                binding: 6,
                resource: wgpu::BindingResource::TextureView(lut_view),
            },
            wgpu::BindGroupEntry {
                binding: 7,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
            wgpu::BindGroupEntry { binding: 8, resource: stats.as_entire_binding() },
        ],
    })
}

use crate::context::{storage_entry_vis, GpuContext};
use crate::graph::GraphBuffers;

/// Instanced line-quad rendering of every edge.  Drawn before nodes so node
/// discs occlude the endpoints.
pub struct EdgeLayer {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_groups: Option<[wgpu::BindGroup; 2]>,
    pub visible: bool,
}

impl EdgeLayer {
    pub fn new(ctx: &GpuContext, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("edge_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/edges.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("edge_bgl"),
            entries: &[
                storage_entry_vis(0, true, wgpu::ShaderStages::VERTEX),
                storage_entry_vis(1, true, wgpu::ShaderStages::VERTEX),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("edge_pipeline_layout"),
            bind_group_layouts: &[frame_layout, &layout],
            ..Default::default()
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("edge_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
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

        Self { pipeline, layout, bind_groups: None, visible: true }
    }

    pub fn rebuild(&mut self, ctx: &GpuContext, graph: &GraphBuffers) {
        let group = |front: usize| {
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("edge_bg"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: graph.position_buffer(front).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: graph.edges().as_entire_binding(),
                    },
                ],
            })
        };
        self.bind_groups = Some([group(0), group(1)]);
    }

    pub fn encode(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        frame_bg: &wgpu::BindGroup,
        front: usize,
        edge_count: u32,
    ) {
        let Some(groups) = &self.bind_groups else { return };
        if !self.visible || edge_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, frame_bg, &[]);
        pass.set_bind_group(1, &groups[front], &[]);
        pass.draw(0..6, 0..edge_count);
    }
}

use crate::context::{storage_entry_vis, uniform_entry_vis, GpuContext};
use crate::graph::GraphBuffers;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct NodeParams {
    zoom_invariant: u32,
    _pad0: u32,
    _pad1: u32,
    _pad2: u32,
}

/// Instanced disc rendering of every node, with a 1-pixel anti-aliased edge.
pub struct NodeLayer {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    bind_groups: Option<[wgpu::BindGroup; 2]>,
    zoom_invariant: bool,
    pub visible: bool,
}

impl NodeLayer {
    pub fn new(ctx: &GpuContext, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("node_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/nodes.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("node_bgl"),
            entries: &[
                storage_entry_vis(0, true, wgpu::ShaderStages::VERTEX),
                storage_entry_vis(1, true, wgpu::ShaderStages::VERTEX),
                uniform_entry_vis(2, wgpu::ShaderStages::VERTEX),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("node_pipeline_layout"),
            bind_group_layouts: &[frame_layout, &layout],
            ..Default::default()
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("node_pipeline"),
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

        let params = ctx.uniform_init(
            "node_params",
            &NodeParams { zoom_invariant: 0, _pad0: 0, _pad1: 0, _pad2: 0 },
        );

        Self {
            pipeline,
            layout,
            params,
            bind_groups: None,
            zoom_invariant: false,
            visible: true,
        }
    }

    /// Switch between zoom-scaled (world-unit) and dpr-scaled (screen-pixel)
    /// node radii.
    pub fn set_zoom_invariant(&mut self, ctx: &GpuContext, zoom_invariant: bool) {
        if self.zoom_invariant == zoom_invariant {
            return;
        }
        self.zoom_invariant = zoom_invariant;
        let params = NodeParams {
            zoom_invariant: zoom_invariant as u32,
            _pad0: 0,
            _pad1: 0,
            _pad2: 0,
        };
        ctx.queue
            .write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
    }

    pub fn rebuild(&mut self, ctx: &GpuContext, graph: &GraphBuffers) {
        let group = |front: usize| {
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("node_bg"),
                layout: &self.layout,
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
        self.bind_groups = Some([group(0), group(1)]);
    }

    pub fn encode(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        frame_bg: &wgpu::BindGroup,
        front: usize,
        node_count: u32,
    ) {
        let Some(groups) = &self.bind_groups else { return };
        if !self.visible || node_count == 0 {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, frame_bg, &[]);
        pass.set_bind_group(1, &groups[front], &[]);
        pass.draw(0..6, 0..node_count);
    }
}

use std::sync::mpsc::Receiver;

use crate::context::{storage_entry_vis, GpuContext};
use crate::graph::GraphBuffers;

/// Hover hit-testing through a per-pixel id texture.
///
/// Nodes render (ids offset by one) into an `R32Uint` texture; a 1×1 copy at
/// the cursor maps asynchronously.  The hot path never blocks — `hovered`
/// keeps returning the last completed result until the next readback lands,
/// and only the most recent request matters.
pub struct PickingLayer {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_groups: Option<[wgpu::BindGroup; 2]>,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
    staging: wgpu::Buffer,
    cursor: Option<(u32, u32)>,
    copied: bool,
    pending: Option<Receiver<Result<(), wgpu::BufferAsyncError>>>,
    hovered: Option<u32>,
}

impl PickingLayer {
    pub fn new(ctx: &GpuContext, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("picking_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/picking.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("picking_bgl"),
            entries: &[
                storage_entry_vis(0, true, wgpu::ShaderStages::VERTEX),
                storage_entry_vis(1, true, wgpu::ShaderStages::VERTEX),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("picking_pipeline_layout"),
            bind_group_layouts: &[frame_layout, &layout],
            ..Default::default()
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("picking_pipeline"),
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
                    format: wgpu::TextureFormat::R32Uint,
                    blend: None,
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

        let (width, height) = ctx.target_size();
        let (texture, view) = id_texture(device, width, height);
        let staging = ctx.readback_buffer("picking_staging", 256);

        Self {
            pipeline,
            layout,
            bind_groups: None,
            texture,
            view,
            width,
            height,
            staging,
            cursor: None,
            copied: false,
            pending: None,
            hovered: None,
        }
    }

    pub fn resize(&mut self, ctx: &GpuContext, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        let (texture, view) = id_texture(&ctx.device, width, height);
        self.texture = texture;
        self.view = view;
        self.width = width;
        self.height = height;
    }

    pub fn rebuild(&mut self, ctx: &GpuContext, graph: &GraphBuffers) {
        let group = |front: usize| {
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("picking_bg"),
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
                ],
            })
        };
        self.bind_groups = Some([group(0), group(1)]);
    }

    /// Remember the cursor position to resolve next frame.  Repeated calls
    /// before the pass runs simply replace the position (lossy by design).
    pub fn request(&mut self, x_px: f32, y_px: f32) {
        if x_px < 0.0 || y_px < 0.0 {
            return;
        }
        let x = (x_px as u32).min(self.width.saturating_sub(1));
        let y = (y_px as u32).min(self.height.saturating_sub(1));
        self.cursor = Some((x, y));
    }

    /// Whether a pick pass should be encoded this frame.
    pub fn wants_pass(&self) -> bool {
        self.cursor.is_some() && self.pending.is_none()
    }

    pub fn encode(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        frame_bg: &wgpu::BindGroup,
        front: usize,
        node_count: u32,
    ) {
        let Some(groups) = &self.bind_groups else { return };
        let Some((x, y)) = self.cursor.take() else { return };
        if self.pending.is_some() {
            // A readback is still in flight; drop this request (lossy).
            return;
        }
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("picking_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.view,
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
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, frame_bg, &[]);
                pass.set_bind_group(1, &groups[front], &[]);
                pass.draw(0..6, 0..node_count);
            }
        }
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(256),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
        );
        self.copied = true;
    }

    /// Kick off the async map once the frame's commands are submitted.
    pub fn after_submit(&mut self) {
        if !self.copied {
            return;
        }
        self.copied = false;
        let (tx, rx) = std::sync::mpsc::channel();
        self.staging.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.pending = Some(rx);
    }

    /// Drain a completed readback, if any.  Called once per frame after a
    /// non-blocking device poll.
    pub fn update(&mut self) {
        let Some(rx) = &self.pending else { return };
        let received = rx.try_recv();
        match received {
            Ok(Ok(())) => {
                {
                    let mapped = self.staging.slice(..).get_mapped_range();
                    let id = u32::from_le_bytes([mapped[0], mapped[1], mapped[2], mapped[3]]);
                    self.hovered = id.checked_sub(1);
                }
                self.staging.unmap();
                self.pending = None;
            }
            Ok(Err(_)) => {
                self.pending = None;
            }
            Err(std::sync::mpsc::TryRecvError::Empty) => {}
            Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                self.pending = None;
            }
        }
    }

    /// Dense index of the node under the cursor from the most recent
    /// completed readback.
    pub fn hovered_index(&self) -> Option<u32> {
        self.hovered
    }

    /// Forget stale results (called on reload).
    pub fn clear_hover(&mut self) {
        self.hovered = None;
    }
}

fn id_texture(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("picking_id_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::R32Uint,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

use std::collections::HashMap;

use glam::Vec2;
use serde::Deserialize;

use crate::camera::Camera;
use crate::color::Color;
use crate::context::{sampler_entry, storage_entry_vis, texture_entry, GpuContext};
use crate::error::{GraphError, Result};
use crate::graph::GraphBuffers;
use crate::graph::GraphStore;
use crate::layers::InstanceBuffer;

// ── MsdfFont ──────────────────────────────────────────────────────────────────

/// Metrics for one glyph.  Plane bounds are em units relative to the
/// baseline-left pen position (y-down, top above the baseline is negative);
/// atlas bounds are pixels in the atlas bitmap (y-down).  Whitespace glyphs
/// carry an advance but no bounds.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub advance: f32,
    pub plane: Option<[f32; 4]>, // left, top, right, bottom
    pub atlas: Option<[f32; 4]>, // left, top, right, bottom
}

/// An msdf-atlas-gen font: glyph map, kerning pairs, vertical metrics and
/// the distance-field spread.  Loaded once at labels-enable time; immutable
/// afterwards.
pub struct MsdfFont {
    pub glyphs: HashMap<char, Glyph>,
    pub kerning: HashMap<(char, char), f32>,
    pub line_height: f32,
    pub ascender: f32,
    pub descender: f32,
    pub atlas_width: u32,
    pub atlas_height: u32,
    pub distance_range: f32,
}

impl MsdfFont {
    /// Parse the metadata JSON emitted by msdf-atlas-gen.  Code points that
    /// are not Unicode scalar values are skipped.
    pub fn from_json(json: &str) -> std::result::Result<Self, serde_json::Error> {
        let raw: RawFont = serde_json::from_str(json)?;

        let glyphs = raw
            .glyphs
            .into_iter()
            .filter_map(|g| {
                char::from_u32(g.unicode).map(|ch| {
                    (ch, Glyph {
                        advance: g.advance,
                        plane: g.plane_bounds.map(|b| [b.left, b.top, b.right, b.bottom]),
                        atlas: g.atlas_bounds.map(|b| [b.left, b.top, b.right, b.bottom]),
                    })
                })
            })
            .collect();

        let kerning = raw
            .kerning
            .into_iter()
            .filter_map(|k| {
                let a = char::from_u32(k.unicode1)?;
                let b = char::from_u32(k.unicode2)?;
                Some(((a, b), k.advance))
            })
            .collect();

        Ok(Self {
            glyphs,
            kerning,
            line_height: raw.metrics.line_height,
            ascender: raw.metrics.ascender,
            descender: raw.metrics.descender,
            atlas_width: raw.atlas.width,
            atlas_height: raw.atlas.height,
            distance_range: raw.atlas.distance_range,
        })
    }

    /// Glyph lookup with replacement-character fallback.
    fn glyph(&self, ch: char) -> Option<&Glyph> {
        self.glyphs
            .get(&ch)
            .or_else(|| self.glyphs.get(&'\u{FFFD}'))
            .or_else(|| self.glyphs.get(&'?'))
    }
}

#[derive(Deserialize)]
struct RawBounds {
    left: f32,
    bottom: f32,
    right: f32,
    top: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGlyph {
    unicode: u32,
    advance: f32,
    #[serde(default)]
    plane_bounds: Option<RawBounds>,
    #[serde(default)]
    atlas_bounds: Option<RawBounds>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAtlas {
    width: u32,
    height: u32,
    #[serde(default = "default_distance_range")]
    distance_range: f32,
}

fn default_distance_range() -> f32 {
    4.0
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetrics {
    line_height: f32,
    #[serde(default)]
    ascender: f32,
    #[serde(default)]
    descender: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKerning {
    unicode1: u32,
    unicode2: u32,
    advance: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFont {
    atlas: RawAtlas,
    metrics: RawMetrics,
    glyphs: Vec<RawGlyph>,
    #[serde(default)]
    kerning: Vec<RawKerning>,
}

// ── Text layout ───────────────────────────────────────────────────────────────

/// One positioned glyph quad, relative to the baseline-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphQuad {
    pub offset: [f32; 2],
    pub size: [f32; 2],
    pub uv_min: [f32; 2],
    pub uv_max: [f32; 2],
}

/// Lay `text` out glyph by glyph at `font_px` pixels per em, applying
/// kerning.  Returns the quads plus the tight bbox (min, max) around them;
/// an all-whitespace string yields an advance-only bbox of zero height.
pub fn layout_text(font: &MsdfFont, text: &str, font_px: f32) -> (Vec<GlyphQuad>, Vec2, Vec2) {
    let tw = font.atlas_width.max(1) as f32;
    let th = font.atlas_height.max(1) as f32;
    let mut quads = Vec::with_capacity(text.chars().count());
    let mut pen_x = 0.0f32;
    let mut bb_min = Vec2::new(f32::MAX, f32::MAX);
    let mut bb_max = Vec2::new(f32::MIN, f32::MIN);
    let mut prev: Option<char> = None;

    for ch in text.chars() {
        let Some(glyph) = font.glyph(ch) else {
            prev = None;
            continue;
        };
        if let Some(p) = prev {
            if let Some(kern) = font.kerning.get(&(p, ch)) {
                pen_x += kern * font_px;
            }
        }
        if let (Some(plane), Some(atlas)) = (&glyph.plane, &glyph.atlas) {
            let offset = [pen_x + plane[0] * font_px, plane[1] * font_px];
            let size = [
                (plane[2] - plane[0]) * font_px,
                (plane[3] - plane[1]) * font_px,
            ];
            if size[0] > 0.0 && size[1] > 0.0 {
                quads.push(GlyphQuad {
                    offset,
                    size,
                    uv_min: [atlas[0] / tw, atlas[1] / th],
                    uv_max: [atlas[2] / tw, atlas[3] / th],
                });
                bb_min = bb_min.min(Vec2::new(offset[0], offset[1]));
                bb_max = bb_max.max(Vec2::new(offset[0] + size[0], offset[1] + size[1]));
            }
        }
        pen_x += glyph.advance * font_px;
        prev = Some(ch);
    }

    if quads.is_empty() {
        bb_min = Vec2::ZERO;
        bb_max = Vec2::new(pen_x, 0.0);
    }
    (quads, bb_min, bb_max)
}

// ── Collision grid ────────────────────────────────────────────────────────────

/// Screen-space occupancy for greedy label placement: a uniform hash grid of
/// placed bboxes.  Cells are sized so a typical label touches only a few.
pub struct CollisionGrid {
    cell: f32,
    boxes: Vec<[f32; 4]>,
    grid: HashMap<(i32, i32), Vec<usize>>,
}

impl CollisionGrid {
    pub fn new(cell: f32) -> Self {
        Self { cell: cell.max(1.0), boxes: Vec::new(), grid: HashMap::new() }
    }

    /// Insert `bbox` (min_x, min_y, max_x, max_y) unless it overlaps a
    /// previously placed box; returns whether it was placed.
    pub fn try_insert(&mut self, bbox: [f32; 4]) -> bool {
        let cells = self.cells_of(bbox);
        for cell in &cells {
            if let Some(indices) = self.grid.get(cell) {
                for &i in indices {
                    let other = self.boxes[i];
                    let disjoint = bbox[2] <= other[0]
                        || other[2] <= bbox[0]
                        || bbox[3] <= other[1]
                        || other[3] <= bbox[1];
                    if !disjoint {
                        return false;
                    }
                }
            }
        }
        let index = self.boxes.len();
        self.boxes.push(bbox);
        for cell in cells {
            self.grid.entry(cell).or_default().push(index);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    fn cells_of(&self, bbox: [f32; 4]) -> Vec<(i32, i32)> {
        let x0 = (bbox[0] / self.cell).floor() as i32;
        let y0 = (bbox[1] / self.cell).floor() as i32;
        let x1 = (bbox[2] / self.cell).floor() as i32;
        let y1 = (bbox[3] / self.cell).floor() as i32;
        let mut cells = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)).max(1) as usize);
        for y in y0..=y1 {
            for x in x0..=x1 {
                cells.push((x, y));
            }
        }
        cells
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum LabelPriority {
    #[default]
    Importance,
    Degree,
}

#[derive(Clone, Debug)]
pub struct LabelsConfig {
    pub font_size: f32,
    pub font_color: Color,
    /// Labels are hidden entirely below this zoom.
    pub min_zoom: f32,
    pub max_labels: usize,
    pub priority: LabelPriority,
    pub label_padding: f32,
    /// Screen pixels the baseline sits above the node centre.
    pub vertical_offset: f32,
    pub background_color: Option<Color>,
    pub background_padding: f32,
    pub background_radius: f32,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            font_color: Color::WHITE,
            min_zoom: 0.3,
            max_labels: 1000,
            priority: LabelPriority::Importance,
            label_padding: 4.0,
            vertical_offset: 12.0,
            background_color: None,
            background_padding: 3.0,
            background_radius: 4.0,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LabelsConfigPatch {
    pub font_size: Option<f32>,
    pub font_color: Option<Color>,
    pub min_zoom: Option<f32>,
    pub max_labels: Option<usize>,
    pub priority: Option<LabelPriority>,
    pub label_padding: Option<f32>,
    pub vertical_offset: Option<f32>,
    /// `Some(None)` clears the background.
    pub background_color: Option<Option<Color>>,
    pub background_padding: Option<f32>,
    pub background_radius: Option<f32>,
}

impl LabelsConfig {
    pub fn apply(&mut self, patch: &LabelsConfigPatch) {
        if let Some(v) = patch.font_size {
            self.font_size = v.max(1.0);
        }
        if let Some(v) = patch.font_color {
            self.font_color = v;
        }
        if let Some(v) = patch.min_zoom {
            self.min_zoom = v.max(0.0);
        }
        if let Some(v) = patch.max_labels {
            self.max_labels = v;
        }
        if let Some(v) = patch.priority {
            self.priority = v;
        }
        if let Some(v) = patch.label_padding {
            self.label_padding = v.max(0.0);
        }
        if let Some(v) = patch.vertical_offset {
            self.vertical_offset = v;
        }
        if let Some(v) = patch.background_color {
            self.background_color = v;
        }
        if let Some(v) = patch.background_padding {
            self.background_padding = v.max(0.0);
        }
        if let Some(v) = patch.background_radius {
            self.background_radius = v.max(0.0);
        }
    }
}

/// Explicit label supplied through `set_labels`, overriding node attributes.
#[derive(Clone, Debug)]
pub struct LabelSpec {
    pub id: String,
    pub text: String,
    pub min_zoom: Option<f32>,
    pub priority: Option<f32>,
}

// ── GPU instances ─────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct GlyphInstance {
    color: [f32; 4],
    offset_px: [f32; 2],
    size_px: [f32; 2],
    uv_min: [f32; 2],
    uv_max: [f32; 2],
    node_index: u32,
    _pad: [u32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct RectInstance {
    color: [f32; 4],
    offset_px: [f32; 2],
    size_px: [f32; 2],
    radius_px: f32,
    node_index: u32,
    _pad: [u32; 2],
}

// ── LabelsLayer ───────────────────────────────────────────────────────────────

/// MSDF labels: CPU-side priority + collision culling each frame, GPU-side
/// glyph quads anchored to live node positions.
pub struct LabelsLayer {
    glyph_pipeline: wgpu::RenderPipeline,
    rect_pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    bind_groups: Option<[wgpu::BindGroup; 2]>,
    sampler: wgpu::Sampler,
    #[allow(dead_code)]
    atlas_texture: Option<wgpu::Texture>,
    atlas_view: Option<wgpu::TextureView>,
    font: Option<MsdfFont>,
    glyph_buffer: InstanceBuffer,
    rect_buffer: InstanceBuffer,
    glyph_scratch: Vec<GlyphInstance>,
    rect_scratch: Vec<RectInstance>,
    explicit_labels: Vec<LabelSpec>,
    pub config: LabelsConfig,
    pub visible: bool,
}

impl LabelsLayer {
    pub fn new(ctx: &GpuContext, frame_layout: &wgpu::BindGroupLayout) -> Self {
        let device = &ctx.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("labels_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/labels.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("labels_bgl"),
            entries: &[
                storage_entry_vis(0, true, wgpu::ShaderStages::VERTEX),
                storage_entry_vis(1, true, wgpu::ShaderStages::VERTEX),
                storage_entry_vis(2, true, wgpu::ShaderStages::VERTEX),
                texture_entry(3, wgpu::ShaderStages::FRAGMENT, true),
                sampler_entry(4, wgpu::ShaderStages::FRAGMENT),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("labels_pipeline_layout"),
            bind_group_layouts: &[frame_layout, &layout],
            ..Default::default()
        });

        let render_pipeline = |label: &str, vs: &str, fs: &str| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some(vs),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(fs),
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
            })
        };
        let glyph_pipeline = render_pipeline("labels_glyph_pipeline", "vs_glyph", "fs_glyph");
        let rect_pipeline = render_pipeline("labels_rect_pipeline", "vs_rect", "fs_rect");

        // Linear filtering is required for SDF reconstruction.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("labels_atlas_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            glyph_pipeline,
            rect_pipeline,
            layout,
            bind_groups: None,
            sampler,
            atlas_texture: None,
            atlas_view: None,
            font: None,
            glyph_buffer: InstanceBuffer::new(ctx, "labels_glyph_instances", 64),
            rect_buffer: InstanceBuffer::new(ctx, "labels_rect_instances", 48),
            glyph_scratch: Vec::new(),
            rect_scratch: Vec::new(),
            explicit_labels: Vec::new(),
            config: LabelsConfig::default(),
            visible: false,
        }
    }

    pub fn has_atlas(&self) -> bool {
        self.font.is_some()
    }

    /// Decode and upload the MSDF atlas.  The metadata JSON and the PNG are
    /// host-resolved byte buffers; any decode failure maps to
    /// [`GraphError::AtlasFetchFailed`] and leaves labels disabled.
    pub fn set_atlas(&mut self, ctx: &GpuContext, metadata_json: &str, png: &[u8]) -> Result<()> {
        let font = MsdfFont::from_json(metadata_json).map_err(|e| {
            GraphError::AtlasFetchFailed { reason: format!("metadata parse: {e}") }
        })?;
        let img = image::load_from_memory(png)
            .map_err(|e| GraphError::AtlasFetchFailed { reason: format!("png decode: {e}") })?
            .to_rgba8();
        let (w, h) = img.dimensions();

        use wgpu::util::DeviceExt;
        // Rgba8Unorm (not sRGB): distance values are linear.
        let texture = ctx.device.create_texture_with_data(
            &ctx.queue,
            &wgpu::TextureDescriptor {
                label: Some("labels_msdf_atlas"),
                size: wgpu::Extent3d { width: w, height: h, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &img,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        tracing::info!(glyphs = font.glyphs.len(), atlas = ?(w, h), "labels atlas loaded");
        self.font = Some(font);
        self.atlas_texture = Some(texture);
        self.atlas_view = Some(view);
        Ok(())
    }

    pub fn set_labels(&mut self, labels: Vec<LabelSpec>) {
        self.explicit_labels = labels;
    }

    pub fn rebuild(&mut self, ctx: &GpuContext, graph: &GraphBuffers) {
        let Some(atlas_view) = &self.atlas_view else {
            self.bind_groups = None;
            return;
        };
        let group = |front: usize| {
            ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("labels_bg"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: graph.position_buffer(front).as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: self.glyph_buffer.buffer().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: self.rect_buffer.buffer().as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(atlas_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            })
        };
        self.bind_groups = Some([group(0), group(1)]);
    }

    /// Per-frame culling, collision placement and instance upload.  Uses the
    /// CPU position mirror for placement (a frame or two stale) while the
    /// shader anchors accepted glyphs to live GPU positions.  Returns `true`
    /// when an instance buffer was reallocated and bind groups went stale.
    pub fn prepare(&mut self, ctx: &GpuContext, store: &GraphStore, camera: &Camera) -> bool {
        self.glyph_scratch.clear();
        self.rect_scratch.clear();
        let Some(font) = &self.font else {
            return self.upload(ctx);
        };
        if !self.visible || camera.zoom < self.config.min_zoom {
            return self.upload(ctx);
        }

        let dpr = camera.dpr();
        let font_px = self.config.font_size * dpr;
        let pad = self.config.label_padding * dpr;

        // Candidate set: explicit labels when supplied, node attributes
        // otherwise.
        struct Candidate<'t> {
            index: u32,
            text: &'t str,
            priority: f32,
            min_zoom: f32,
        }
        let mut candidates: Vec<Candidate> = Vec::new();
        if self.explicit_labels.is_empty() {
            for (index, _id) in store.iter_ids() {
                let Some(text) = store.label_of(index) else { continue };
                if text.is_empty() {
                    continue;
                }
                let priority = match self.config.priority {
                    LabelPriority::Importance => store.styles()[index as usize].importance,
                    LabelPriority::Degree => store.degrees()[index as usize] as f32,
                };
                candidates.push(Candidate { index, text, priority, min_zoom: 0.0 });
            }
        } else {
            for spec in &self.explicit_labels {
                let Some(index) = store.index_of(&spec.id) else { continue };
                if spec.text.is_empty() {
                    continue;
                }
                let priority = spec.priority.unwrap_or_else(|| match self.config.priority {
                    LabelPriority::Importance => store.styles()[index as usize].importance,
                    LabelPriority::Degree => store.degrees()[index as usize] as f32,
                });
                candidates.push(Candidate {
                    index,
                    text: &spec.text,
                    priority,
                    min_zoom: spec.min_zoom.unwrap_or(0.0),
                });
            }
        }
        candidates.sort_by(|a, b| b.priority.total_cmp(&a.priority));

        let mut grid = CollisionGrid::new(font_px + pad);
        let color = self.config.font_color.to_array();
        let vertical_offset = self.config.vertical_offset * dpr;

        for candidate in candidates {
            if grid.len() >= self.config.max_labels {
                break;
            }
            if candidate.min_zoom > camera.zoom {
                continue;
            }
            let state = store.states()[candidate.index as usize];
            let anchor = camera.world_to_screen(Vec2::new(state[0], state[1]));

            let (quads, bb_min, bb_max) = layout_text(font, candidate.text, font_px);
            if quads.is_empty() {
                continue;
            }
            // Centre horizontally, baseline `vertical_offset` px above the node.
            let base = Vec2::new(-(bb_min.x + bb_max.x) * 0.5, -vertical_offset);
            let bbox = [
                anchor.x + base.x + bb_min.x - pad,
                anchor.y + base.y + bb_min.y - pad,
                anchor.x + base.x + bb_max.x + pad,
                anchor.y + base.y + bb_max.y + pad,
            ];
            if !grid.try_insert(bbox) {
                continue;
            }

            if let Some(bg) = self.config.background_color {
                let bg_pad = self.config.background_padding * dpr;
                self.rect_scratch.push(RectInstance {
                    color: bg.to_array(),
                    offset_px: [base.x + bb_min.x - bg_pad, base.y + bb_min.y - bg_pad],
                    size_px: [
                        bb_max.x - bb_min.x + 2.0 * bg_pad,
                        bb_max.y - bb_min.y + 2.0 * bg_pad,
                    ],
                    radius_px: self.config.background_radius * dpr,
                    node_index: candidate.index,
                    _pad: [0; 2],
                });
            }
            for quad in quads {
                self.glyph_scratch.push(GlyphInstance {
                    color,
                    offset_px: [base.x + quad.offset[0], base.y + quad.offset[1]],
                    size_px: quad.size,
                    uv_min: quad.uv_min,
                    uv_max: quad.uv_max,
                    node_index: candidate.index,
                    _pad: [0; 3],
                });
            }
        }
        self.upload(ctx)
    }

    fn upload(&mut self, ctx: &GpuContext) -> bool {
        let a = self.glyph_buffer.upload(ctx, &self.glyph_scratch);
        let b = self.rect_buffer.upload(ctx, &self.rect_scratch);
        a || b
    }

    pub fn encode_composite(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        frame_bg: &wgpu::BindGroup,
        front: usize,
    ) {
        let Some(groups) = &self.bind_groups else { return };
        if !self.visible || self.glyph_buffer.len == 0 {
            return;
        }
        if self.rect_buffer.len > 0 {
            pass.set_pipeline(&self.rect_pipeline);
            pass.set_bind_group(0, frame_bg, &[]);
            pass.set_bind_group(1, &groups[front], &[]);
            pass.draw(0..6, 0..self.rect_buffer.len);
        }
        pass.set_pipeline(&self.glyph_pipeline);
        pass.set_bind_group(0, frame_bg, &[]);
        pass.set_bind_group(1, &groups[front], &[]);
        pass.draw(0..6, 0..self.glyph_buffer.len);
    }
}

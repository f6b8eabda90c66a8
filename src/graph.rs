use std::collections::HashMap;

use glam::Vec2;

use crate::color::{Color, ColorSpec};
use crate::context::GpuContext;
use crate::error::{GraphError, Result};

/// Node flag: excluded from force accumulation and integration.
pub const NODE_PINNED: u32 = 1;
/// Node flag: tombstoned slot awaiting compaction.  Dead nodes have zero
/// mass, zero radius and are skipped by every layer.
pub const NODE_DEAD: u32 = 2;

const DEFAULT_NODE_RADIUS: f32 = 5.0;
const DEFAULT_NODE_COLOR: [f32; 4] = [0.36, 0.56, 0.92, 1.0];
const DEFAULT_EDGE_WIDTH: f32 = 1.0;
const DEFAULT_EDGE_COLOR: [f32; 4] = [0.62, 0.62, 0.66, 0.7];

/// Compact when more than a quarter of the slots are tombstones.
const TOMBSTONE_COMPACT_RATIO: f32 = 0.25;

// ── Loader contract ───────────────────────────────────────────────────────────

/// One node as supplied by the host loader.
#[derive(Clone, Debug, Default)]
pub struct NodeData {
    pub id: String,
    pub x: Option<f32>,
    pub y: Option<f32>,
    pub radius: Option<f32>,
    pub color: Option<ColorSpec>,
    pub importance: Option<f32>,
    pub label: Option<String>,
    pub pinned: bool,
}

impl NodeData {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), ..Default::default() }
    }
}

/// One edge as supplied by the host loader.  Endpoints are node ids.
#[derive(Clone, Debug)]
pub struct EdgeData {
    pub source: String,
    pub target: String,
    pub weight: Option<f32>,
    pub width: Option<f32>,
    pub color: Option<ColorSpec>,
}

impl EdgeData {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight: None,
            width: None,
            color: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GraphData {
    pub nodes: Vec<NodeData>,
    pub edges: Vec<EdgeData>,
}

// ── GPU-facing records ────────────────────────────────────────────────────────

/// Per-node style, uploaded on attribute change only.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeStyle {
    pub color: [f32; 4],
    pub radius: f32,
    pub importance: f32,
    pub flags: u32,
    pub _pad: u32,
}

/// Per-edge record: endpoint indices plus draw attributes.
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct EdgeRecord {
    pub source: u32,
    pub target: u32,
    pub weight: f32,
    pub width: f32,
    pub color: [f32; 4],
}

// ── GraphStore ────────────────────────────────────────────────────────────────

/// CPU side of the graph: node/edge arrays, the id↔index map, degrees and
/// dirty flags.  String ids never cross into the GPU path; external callers
/// never see indices.
pub struct GraphStore {
    /// Dense id table; `None` marks a tombstone.
    ids: Vec<Option<String>>,
    index: HashMap<String, u32>,
    /// CPU mirror of (x, y, vx, vy).  Positions go stale while the simulation
    /// runs and are refreshed by the lossy async readback.
    states: Vec<[f32; 4]>,
    styles: Vec<NodeStyle>,
    labels: Vec<Option<String>>,
    degrees: Vec<u32>,
    edges: Vec<EdgeRecord>,
    tombstones: usize,
    self_loops_dropped: usize,
    /// Styles changed since the last upload.
    pub style_dirty: bool,
    /// Node count / edge list / positions changed since the last upload.
    pub topology_dirty: bool,
}

impl GraphStore {
    pub fn new() -> Self {
        Self {
            ids: Vec::new(),
            index: HashMap::new(),
            states: Vec::new(),
            styles: Vec::new(),
            labels: Vec::new(),
            degrees: Vec::new(),
            edges: Vec::new(),
            tombstones: 0,
            self_loops_dropped: 0,
            style_dirty: false,
            topology_dirty: false,
        }
    }

    /// Live node count (slots minus tombstones).
    pub fn node_count(&self) -> usize {
        self.ids.len() - self.tombstones
    }

    /// Total slot count, including tombstones — the size GPU buffers need.
    pub fn slot_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn self_loops_dropped(&self) -> usize {
        self.self_loops_dropped
    }

    pub fn states(&self) -> &[[f32; 4]] {
        &self.states
    }

    pub fn styles(&self) -> &[NodeStyle] {
        &self.styles
    }

    pub fn degrees(&self) -> &[u32] {
        &self.degrees
    }

    pub fn edges(&self) -> &[EdgeRecord] {
        &self.edges
    }

    pub fn index_of(&self, id: &str) -> Option<u32> {
        self.index.get(id).copied()
    }

    pub fn id_of(&self, index: u32) -> Option<&str> {
        self.ids.get(index as usize)?.as_deref()
    }

    pub fn label_of(&self, index: u32) -> Option<&str> {
        self.labels.get(index as usize)?.as_deref()
    }

    /// Iterate live `(index, id)` pairs.
    pub fn iter_ids(&self) -> impl Iterator<Item = (u32, &str)> {
        self.ids
            .iter()
            .enumerate()
            .filter_map(|(i, id)| Some((i as u32, id.as_deref()?)))
    }

    /// Replace the whole graph.  Validation happens against the incoming data
    /// before any state is touched, so a failed load leaves the previous
    /// graph intact.
    pub fn load(&mut self, data: GraphData) -> Result<()> {
        let mut index: HashMap<String, u32> = HashMap::with_capacity(data.nodes.len());
        let mut styles = Vec::with_capacity(data.nodes.len());
        let mut labels = Vec::with_capacity(data.nodes.len());
        let mut ids = Vec::with_capacity(data.nodes.len());
        // Which input entry each dense slot came from (duplicates collapse).
        let mut sources = Vec::with_capacity(data.nodes.len());

        for (source, node) in data.nodes.iter().enumerate() {
            // Last occurrence of a duplicate id wins, matching setter order.
            if let Some(&prev) = index.get(&node.id) {
                styles[prev as usize] = node_style(node)?;
                labels[prev as usize] = node.label.clone();
                sources[prev as usize] = source;
                continue;
            }
            index.insert(node.id.clone(), ids.len() as u32);
            ids.push(Some(node.id.clone()));
            styles.push(node_style(node)?);
            labels.push(node.label.clone());
            sources.push(source);
        }

        let mut edges = Vec::with_capacity(data.edges.len());
        let mut degrees = vec![0u32; ids.len()];
        let mut self_loops = 0usize;
        for edge in &data.edges {
            let source = *index.get(&edge.source).ok_or_else(|| {
                GraphError::InvalidTopology { id: edge.source.clone() }
            })?;
            let target = *index.get(&edge.target).ok_or_else(|| {
                GraphError::InvalidTopology { id: edge.target.clone() }
            })?;
            if source == target {
                self_loops += 1;
                continue;
            }
            let color = match &edge.color {
                Some(spec) => spec.resolve()?.to_array(),
                None => DEFAULT_EDGE_COLOR,
            };
            edges.push(EdgeRecord {
                source,
                target,
                weight: edge.weight.unwrap_or(1.0).max(0.0),
                width: edge.width.unwrap_or(DEFAULT_EDGE_WIDTH).max(0.01),
                color,
            });
            degrees[source as usize] += 1;
            degrees[target as usize] += 1;
        }

        // Validation passed — commit.
        let n = ids.len();
        let mut states = Vec::with_capacity(n);
        let mut placer = DiscPlacer::new(n);
        for &source in &sources {
            let node = &data.nodes[source];
            let (px, py) = match (node.x, node.y) {
                (Some(x), Some(y)) => (x, y),
                _ => placer.next(),
            };
            states.push([px, py, 0.0, 0.0]);
        }

        if self_loops > 0 {
            tracing::debug!(count = self_loops, "dropped self-loop edges at load");
        }

        self.ids = ids;
        self.index = index;
        self.states = states;
        self.styles = styles;
        self.labels = labels;
        self.degrees = degrees;
        self.edges = edges;
        self.tombstones = 0;
        self.self_loops_dropped = self_loops;
        self.style_dirty = true;
        self.topology_dirty = true;
        Ok(())
    }

    /// Append nodes.  Ids that already exist update attributes in place.
    pub fn add_nodes(&mut self, nodes: &[NodeData]) -> Result<()> {
        // Validate colors up front so a bad entry mutates nothing.
        for node in nodes {
            if let Some(spec) = &node.color {
                spec.resolve()?;
            }
        }
        let mut placer = DiscPlacer::new(self.ids.len() + nodes.len());
        for node in nodes {
            if let Some(&idx) = self.index.get(&node.id) {
                self.styles[idx as usize] = node_style(node)?;
                self.labels[idx as usize] = node.label.clone();
                self.style_dirty = true;
                continue;
            }
            let (px, py) = match (node.x, node.y) {
                (Some(x), Some(y)) => (x, y),
                _ => placer.next(),
            };
            let idx = self.ids.len() as u32;
            self.index.insert(node.id.clone(), idx);
            self.ids.push(Some(node.id.clone()));
            self.states.push([px, py, 0.0, 0.0]);
            self.styles.push(node_style(node)?);
            self.labels.push(node.label.clone());
            self.degrees.push(0);
            self.topology_dirty = true;
        }
        Ok(())
    }

    /// Append edges between already-loaded nodes.
    pub fn add_edges(&mut self, edges: &[EdgeData]) -> Result<()> {
        let mut resolved = Vec::with_capacity(edges.len());
        for edge in edges {
            let source = self.index_of(&edge.source).ok_or_else(|| {
                GraphError::InvalidTopology { id: edge.source.clone() }
            })?;
            let target = self.index_of(&edge.target).ok_or_else(|| {
                GraphError::InvalidTopology { id: edge.target.clone() }
            })?;
            if source == target {
                self.self_loops_dropped += 1;
                continue;
            }
            let color = match &edge.color {
                Some(spec) => spec.resolve()?.to_array(),
                None => DEFAULT_EDGE_COLOR,
            };
            resolved.push(EdgeRecord {
                source,
                target,
                weight: edge.weight.unwrap_or(1.0).max(0.0),
                width: edge.width.unwrap_or(DEFAULT_EDGE_WIDTH).max(0.01),
                color,
            });
        }
        for record in resolved {
            self.degrees[record.source as usize] += 1;
            self.degrees[record.target as usize] += 1;
            self.edges.push(record);
            self.topology_dirty = true;
        }
        Ok(())
    }

    /// Tombstone a node and drop its incident edges.  Returns `false` when
    /// the id is unknown.  Compacts once tombstones exceed 25% of slots.
    pub fn remove_by_id(&mut self, id: &str) -> bool {
        let Some(idx) = self.index.remove(id) else {
            return false;
        };
        let i = idx as usize;
        self.ids[i] = None;
        self.labels[i] = None;
        self.styles[i].flags |= NODE_DEAD;
        self.styles[i].radius = 0.0;
        self.tombstones += 1;

        self.edges.retain(|e| {
            let keep = e.source != idx && e.target != idx;
            if !keep {
                // The removed endpoint's degree slot is about to die anyway.
                for end in [e.source, e.target] {
                    if end != idx {
                        self.degrees[end as usize] =
                            self.degrees[end as usize].saturating_sub(1);
                    }
                }
            }
            keep
        });
        self.degrees[i] = 0;
        self.style_dirty = true;
        self.topology_dirty = true;

        if self.tombstones as f32 > self.ids.len() as f32 * TOMBSTONE_COMPACT_RATIO {
            self.compact();
        }
        true
    }

    pub fn set_node_radius(&mut self, id: &str, radius: f32) -> bool {
        self.with_style(id, |s| s.radius = radius.max(0.01))
    }

    pub fn set_node_color(&mut self, id: &str, color: Color) -> bool {
        self.with_style(id, |s| s.color = color.to_array())
    }

    pub fn set_node_importance(&mut self, id: &str, importance: f32) -> bool {
        self.with_style(id, |s| s.importance = importance.clamp(0.0, 1.0))
    }

    pub fn set_node_pinned(&mut self, id: &str, pinned: bool) -> bool {
        self.with_style(id, |s| {
            if pinned {
                s.flags |= NODE_PINNED;
            } else {
                s.flags &= !NODE_PINNED;
            }
        })
    }

    pub fn set_node_label(&mut self, id: &str, label: Option<String>) -> bool {
        let Some(idx) = self.index_of(id) else { return false };
        self.labels[idx as usize] = label;
        true
    }

    fn with_style(&mut self, id: &str, f: impl FnOnce(&mut NodeStyle)) -> bool {
        let Some(idx) = self.index_of(id) else { return false };
        f(&mut self.styles[idx as usize]);
        self.style_dirty = true;
        true
    }

    /// Axis-aligned bbox of live positions in the CPU mirror; `None` when the
    /// graph is empty.
    pub fn positions_bbox(&self) -> Option<(Vec2, Vec2)> {
        let mut bounds: Option<(Vec2, Vec2)> = None;
        for (i, state) in self.states.iter().enumerate() {
            if self.ids[i].is_none() {
                continue;
            }
            let p = Vec2::new(state[0], state[1]);
            bounds = Some(match bounds {
                None => (p, p),
                Some((lo, hi)) => (lo.min(p), hi.max(p)),
            });
        }
        bounds
    }

    /// Overwrite the CPU position mirror from a completed GPU readback.
    /// Length mismatches (a reload raced the readback) are ignored.
    pub fn apply_position_readback(&mut self, states: &[[f32; 4]]) {
        if states.len() == self.states.len() {
            self.states.copy_from_slice(states);
        }
    }

    /// Rebuild dense arrays without tombstones, remapping edge endpoints.
    fn compact(&mut self) {
        let mut remap = vec![u32::MAX; self.ids.len()];
        let mut ids = Vec::with_capacity(self.node_count());
        let mut states = Vec::with_capacity(self.node_count());
        let mut styles = Vec::with_capacity(self.node_count());
        let mut labels = Vec::with_capacity(self.node_count());
        let mut degrees = Vec::with_capacity(self.node_count());

        for (old, id) in self.ids.iter().enumerate() {
            let Some(id) = id else { continue };
            remap[old] = ids.len() as u32;
            ids.push(Some(id.clone()));
            states.push(self.states[old]);
            styles.push(self.styles[old]);
            labels.push(self.labels[old].take());
            degrees.push(self.degrees[old]);
        }
        for edge in &mut self.edges {
            edge.source = remap[edge.source as usize];
            edge.target = remap[edge.target as usize];
        }
        self.index = ids
            .iter()
            .enumerate()
            .filter_map(|(i, id)| Some((id.clone()?, i as u32)))
            .collect();
        self.ids = ids;
        self.states = states;
        self.styles = styles;
        self.labels = labels;
        self.degrees = degrees;
        self.tombstones = 0;
        self.style_dirty = true;
        self.topology_dirty = true;
        tracing::debug!(nodes = self.ids.len(), "compacted tombstoned graph store");
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

fn node_style(node: &NodeData) -> Result<NodeStyle> {
    let color = match &node.color {
        Some(spec) => spec.resolve()?.to_array(),
        None => DEFAULT_NODE_COLOR,
    };
    let mut flags = 0;
    if node.pinned {
        flags |= NODE_PINNED;
    }
    Ok(NodeStyle {
        color,
        radius: node.radius.unwrap_or(DEFAULT_NODE_RADIUS).max(0.01),
        importance: node.importance.unwrap_or(0.0).clamp(0.0, 1.0),
        flags,
        _pad: 0,
    })
}

// ── Deterministic initial placement ───────────────────────────────────────────

/// Places nodes without caller-supplied positions uniformly on a disc of
/// radius √n.  Seeded by the node count alone so a given graph shape always
/// lays out the same way.
struct DiscPlacer {
    rng: SplitMix64,
    radius: f32,
}

impl DiscPlacer {
    fn new(n: usize) -> Self {
        Self {
            rng: SplitMix64::new(0x9e37_79b9 ^ n as u64),
            radius: (n.max(1) as f32).sqrt(),
        }
    }

    fn next(&mut self) -> (f32, f32) {
        // sqrt on the radial draw gives area-uniform density.
        let r = self.rng.next_f32().sqrt() * self.radius;
        let angle = self.rng.next_f32() * std::f32::consts::TAU;
        (r * angle.cos(), r * angle.sin())
    }
}

/// splitmix64 — tiny deterministic generator for reproducible placement.
struct SplitMix64(u64);

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

// ── GraphBuffers ──────────────────────────────────────────────────────────────

/// GPU residency of the store: the position ping-pong pair plus style, edge
/// and degree storage.  Buffers reallocate with capacity doubling and only
/// when counts outgrow them.
pub struct GraphBuffers {
    positions: [wgpu::Buffer; 2],
    styles: wgpu::Buffer,
    edges: wgpu::Buffer,
    degrees: wgpu::Buffer,
    node_capacity: u32,
    edge_capacity: u32,
    front: usize,
    /// Slot count most recently uploaded (what the GPU currently simulates).
    pub node_slots: u32,
    pub edge_count: u32,
}

impl GraphBuffers {
    pub fn new(ctx: &GpuContext) -> Self {
        let node_capacity = 256;
        let edge_capacity = 256;
        Self {
            positions: [
                ctx.storage_buffer("node_positions_a", node_capacity as u64 * 16, true),
                ctx.storage_buffer("node_positions_b", node_capacity as u64 * 16, true),
            ],
            styles: ctx.storage_buffer(
                "node_styles",
                node_capacity as u64 * std::mem::size_of::<NodeStyle>() as u64,
                false,
            ),
            edges: ctx.storage_buffer(
                "edge_records",
                edge_capacity as u64 * std::mem::size_of::<EdgeRecord>() as u64,
                false,
            ),
            degrees: ctx.storage_buffer("node_degrees", node_capacity as u64 * 4, false),
            node_capacity,
            edge_capacity,
            front: 0,
            node_slots: 0,
            edge_count: 0,
        }
    }

    /// Position buffer render layers and the repulsion pass read this tick.
    pub fn front(&self) -> &wgpu::Buffer {
        &self.positions[self.front]
    }

    /// Which ping-pong slot is currently the front (0 or 1).
    pub fn front_index(&self) -> usize {
        self.front
    }

    /// Direct slot access, used to pre-build bind groups for both ping-pong
    /// orientations.
    pub fn position_buffer(&self, index: usize) -> &wgpu::Buffer {
        &self.positions[index]
    }

    /// Position buffer the integration pass writes this tick.
    pub fn back(&self) -> &wgpu::Buffer {
        &self.positions[1 - self.front]
    }

    /// Swap front/back roles at end of tick.
    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }

    pub fn styles(&self) -> &wgpu::Buffer {
        &self.styles
    }

    pub fn edges(&self) -> &wgpu::Buffer {
        &self.edges
    }

    pub fn degrees(&self) -> &wgpu::Buffer {
        &self.degrees
    }

    /// Upload everything the store marked dirty.  Returns `true` when any
    /// buffer object was re-created (bind groups referencing them must be
    /// rebuilt).
    pub fn sync(&mut self, ctx: &GpuContext, store: &mut GraphStore) -> bool {
        let n = store.slot_count().max(1) as u32;
        let m = store.edge_count().max(1) as u32;
        let mut reallocated = false;

        if n > self.node_capacity {
            let cap = n.next_power_of_two();
            self.positions = [
                ctx.storage_buffer("node_positions_a", cap as u64 * 16, true),
                ctx.storage_buffer("node_positions_b", cap as u64 * 16, true),
            ];
            self.styles = ctx.storage_buffer(
                "node_styles",
                cap as u64 * std::mem::size_of::<NodeStyle>() as u64,
                false,
            );
            self.degrees = ctx.storage_buffer("node_degrees", cap as u64 * 4, false);
            self.node_capacity = cap;
            reallocated = true;
        }
        if m > self.edge_capacity {
            let cap = m.next_power_of_two();
            self.edges = ctx.storage_buffer(
                "edge_records",
                cap as u64 * std::mem::size_of::<EdgeRecord>() as u64,
                false,
            );
            self.edge_capacity = cap;
            reallocated = true;
        }

        if store.topology_dirty || reallocated {
            if !store.states().is_empty() {
                // Seed both ping-pong buffers so either front works.
                for buffer in &self.positions {
                    ctx.queue
                        .write_buffer(buffer, 0, bytemuck::cast_slice(store.states()));
                }
                ctx.queue
                    .write_buffer(&self.degrees, 0, bytemuck::cast_slice(store.degrees()));
            }
            if !store.edges().is_empty() {
                ctx.queue
                    .write_buffer(&self.edges, 0, bytemuck::cast_slice(store.edges()));
            }
            self.node_slots = store.slot_count() as u32;
            self.edge_count = store.edge_count() as u32;
            self.front = 0;
            store.topology_dirty = false;
            store.style_dirty = true;
        }
        if store.style_dirty {
            if !store.styles().is_empty() {
                ctx.queue
                    .write_buffer(&self.styles, 0, bytemuck::cast_slice(store.styles()));
            }
            store.style_dirty = false;
        }
        reallocated
    }
}

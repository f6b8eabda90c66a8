use glam::Vec2;

/// Smallest and largest permitted zoom (2⁻¹⁰ … 2¹⁰).
pub const ZOOM_MIN: f32 = 1.0 / 1024.0;
pub const ZOOM_MAX: f32 = 1024.0;

// ── FrameUniform ──────────────────────────────────────────────────────────────

/// Per-frame uniform uploaded once before any pass.
///
/// The clip-from-world transform is a 3×2 affine stored as two row vectors so
/// the shader computes `clip.x = dot(row_x, vec4(p, 0, 1))` (and likewise for
/// y).  Layout matches WGSL:
/// ```text
/// struct Frame {
///     clip_from_world_x: vec4<f32>,   // (m00, m01, 0, tx)
///     clip_from_world_y: vec4<f32>,   // (m10, m11, 0, ty)
///     viewport:          vec2<f32>,   // device pixels
///     dpr:               f32,
///     time:              f32,         // seconds since renderer creation
/// }
/// ```
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniform {
    pub clip_from_world_x: [f32; 4],
    pub clip_from_world_y: [f32; 4],
    pub viewport: [f32; 2],
    pub dpr: f32,
    pub time: f32,
}

// ── Camera ────────────────────────────────────────────────────────────────────

/// 2D world camera shared by every pass.
///
/// World space is y-up; screen space is y-down device pixels; `zoom` is the
/// number of device pixels covered by one world unit.  The world-to-clip
/// transform is affine and reversible — the inverse drives picking and pan
/// deltas.
pub struct Camera {
    /// World-space point at the viewport centre.
    pub center: Vec2,
    /// Device pixels per world unit, clamped to `[ZOOM_MIN, ZOOM_MAX]`.
    pub zoom: f32,
    /// Viewport extent in device pixels.
    viewport: Vec2,
    /// Device pixel ratio of the host canvas.
    dpr: f32,
}

impl Camera {
    pub fn new(viewport_w: f32, viewport_h: f32, dpr: f32) -> Self {
        Self {
            center: Vec2::ZERO,
            zoom: 1.0,
            viewport: Vec2::new(viewport_w.max(1.0), viewport_h.max(1.0)),
            dpr: dpr.max(0.1),
        }
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn dpr(&self) -> f32 {
        self.dpr
    }

    pub fn set_viewport(&mut self, width_px: f32, height_px: f32) {
        self.viewport = Vec2::new(width_px.max(1.0), height_px.max(1.0));
    }

    pub fn set_dpr(&mut self, dpr: f32) {
        self.dpr = dpr.max(0.1);
    }

    /// Shift the view by a screen-space delta in device pixels, as produced
    /// by a pointer drag: content follows the pointer.
    pub fn pan(&mut self, dx_px: f32, dy_px: f32) {
        self.center.x -= dx_px / self.zoom;
        self.center.y += dy_px / self.zoom;
    }

    /// Multiply zoom by `factor`, optionally keeping the world point under
    /// `anchor_px` (device pixels, y-down) fixed on screen.
    pub fn zoom_by(&mut self, factor: f32, anchor_px: Option<Vec2>) {
        let anchor_world = anchor_px.map(|px| self.screen_to_world(px));
        self.zoom = (self.zoom * factor).clamp(ZOOM_MIN, ZOOM_MAX);
        if let (Some(px), Some(world)) = (anchor_px, anchor_world) {
            // Re-solve the centre so `world` projects back onto `px`.
            let half = self.viewport * 0.5;
            self.center.x = world.x - (px.x - half.x) / self.zoom;
            self.center.y = world.y + (px.y - half.y) / self.zoom;
        }
    }

    /// Frame an axis-aligned world bbox: centre on it and choose the zoom at
    /// which the longer axis fits with `padding` (fraction of the extent,
    /// default 0.10) left around it.  A degenerate bbox only recentres.
    pub fn fit_to_view(&mut self, min: Vec2, max: Vec2, padding: f32) {
        self.center = (min + max) * 0.5;
        let extent = (max - min) * (1.0 + 2.0 * padding.max(0.0));
        if extent.x <= 0.0 && extent.y <= 0.0 {
            return;
        }
        let zx = self.viewport.x / extent.x.max(f32::EPSILON);
        let zy = self.viewport.y / extent.y.max(f32::EPSILON);
        self.zoom = zx.min(zy).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    /// World → clip (NDC, y-up).
    pub fn world_to_clip(&self, p: Vec2) -> Vec2 {
        let s = self.scale();
        (p - self.center) * s
    }

    /// Clip (NDC, y-up) → world.  Exact inverse of [`Self::world_to_clip`].
    pub fn clip_to_world(&self, clip: Vec2) -> Vec2 {
        let s = self.scale();
        clip / s + self.center
    }

    /// World → screen device pixels (y-down, origin top-left).
    pub fn world_to_screen(&self, p: Vec2) -> Vec2 {
        let clip = self.world_to_clip(p);
        Vec2::new(
            (clip.x + 1.0) * 0.5 * self.viewport.x,
            (1.0 - clip.y) * 0.5 * self.viewport.y,
        )
    }

    /// Screen device pixels (y-down) → world.
    pub fn screen_to_world(&self, px: Vec2) -> Vec2 {
        let clip = Vec2::new(
            px.x / self.viewport.x * 2.0 - 1.0,
            1.0 - px.y / self.viewport.y * 2.0,
        );
        self.clip_to_world(clip)
    }

    /// Build the GPU frame uniform for this camera state.
    pub fn frame_uniform(&self, time: f32) -> FrameUniform {
        let s = self.scale();
        FrameUniform {
            clip_from_world_x: [s.x, 0.0, 0.0, -s.x * self.center.x],
            clip_from_world_y: [0.0, s.y, 0.0, -s.y * self.center.y],
            viewport: [self.viewport.x, self.viewport.y],
            dpr: self.dpr,
            time,
        }
    }

    /// Per-axis clip scale: `2·zoom / viewport`.
    fn scale(&self) -> Vec2 {
        Vec2::new(
            2.0 * self.zoom / self.viewport.x,
            2.0 * self.zoom / self.viewport.y,
        )
    }
}

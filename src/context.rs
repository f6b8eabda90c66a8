use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use wgpu::util::DeviceExt;

use crate::colormap::ColorScale;
use crate::error::{GraphError, Result};

/// Bytes per node in the position ping-pong buffers (x, y, vx, vy as f32).
const NODE_STATE_STRIDE: u64 = 16;

// ── Options ───────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct GpuContextOptions {
    /// Upper bound used by the capability probe to size storage-buffer
    /// requirements.  Not a hard allocation; buffers grow on demand.
    pub max_nodes: u32,
    /// Ask wgpu for a validating debug device where available.
    pub debug: bool,
}

impl Default for GpuContextOptions {
    fn default() -> Self {
        Self { max_nodes: 1 << 21, debug: false }
    }
}

// ── Render target ─────────────────────────────────────────────────────────────

/// Where composited frames land: a live swap-chain surface, or an offscreen
/// texture (headless tests, image export).
enum RenderTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
        width: u32,
        height: u32,
    },
}

/// One acquired frame.  For surfaces the swap-chain texture must be presented
/// after submit; offscreen frames have nothing to present.
pub struct FrameTarget {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl FrameTarget {
    pub fn present(self) {
        if let Some(frame) = self.surface_texture {
            frame.present();
        }
    }
}

const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// ── GpuContext ────────────────────────────────────────────────────────────────

/// Owner of the adapter, device, queue and every shared GPU resource.
/// Construction runs the capability probe; an unsuitable stack yields
/// [`GraphError::Unsupported`] with a readable reason and never panics.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    target: RenderTarget,
    lost: Arc<AtomicBool>,
    /// Color-scale LUT textures, built once per scale on first use.
    colormap_luts: HashMap<ColorScale, wgpu::TextureView>,
}

impl GpuContext {
    /// Initialise against a live surface (canvas / window).
    pub async fn for_surface(
        target: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
        options: &GpuContextOptions,
    ) -> Result<Self> {
        let instance = create_instance(options);
        let surface = instance.create_surface(target).map_err(|e| {
            GraphError::Unsupported { reason: format!("surface creation failed: {e}") }
        })?;
        let (adapter, device, queue) =
            request_device(&instance, Some(&surface), options).await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps.formats.first().copied().ok_or_else(|| {
            GraphError::Unsupported { reason: "surface reports no formats".into() }
        })?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self::finish(device, queue, RenderTarget::Surface { surface, config }))
    }

    /// Initialise without a surface, rendering into an offscreen RGBA target.
    pub async fn offscreen(
        width: u32,
        height: u32,
        options: &GpuContextOptions,
    ) -> Result<Self> {
        let instance = create_instance(options);
        let (_adapter, device, queue) = request_device(&instance, None, options).await?;
        let (texture, view) = offscreen_texture(&device, width.max(1), height.max(1));
        let target = RenderTarget::Offscreen {
            texture,
            view,
            width: width.max(1),
            height: height.max(1),
        };
        Ok(Self::finish(device, queue, target))
    }

    fn finish(device: wgpu::Device, queue: wgpu::Queue, target: RenderTarget) -> Self {
        let lost = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&lost);
        device.set_device_lost_callback(move |reason, message| {
            tracing::error!(?reason, message, "gpu device lost");
            flag.store(true, Ordering::Release);
        });
        Self { device, queue, target, lost, colormap_luts: HashMap::new() }
    }

    /// Terminal-state check: once the device is lost every renderer method
    /// degrades to a no-op.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    pub fn target_format(&self) -> wgpu::TextureFormat {
        match &self.target {
            RenderTarget::Surface { config, .. } => config.format,
            RenderTarget::Offscreen { .. } => OFFSCREEN_FORMAT,
        }
    }

    pub fn target_size(&self) -> (u32, u32) {
        match &self.target {
            RenderTarget::Surface { config, .. } => (config.width, config.height),
            RenderTarget::Offscreen { width, height, .. } => (*width, *height),
        }
    }

    /// Reconfigure the swap chain (or rebuild the offscreen target).  Only
    /// viewport-sized resources downstream need to follow; persistent buffers
    /// are untouched.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        match &mut self.target {
            RenderTarget::Surface { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(&self.device, config);
            }
            RenderTarget::Offscreen { texture, view, width: w, height: h } => {
                let (t, v) = offscreen_texture(&self.device, width, height);
                *texture = t;
                *view = v;
                *w = width;
                *h = height;
            }
        }
    }

    pub fn begin_frame(&self) -> std::result::Result<FrameTarget, wgpu::SurfaceError> {
        match &self.target {
            RenderTarget::Surface { surface, .. } => {
                let frame = surface.get_current_texture()?;
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(FrameTarget { view, surface_texture: Some(frame) })
            }
            RenderTarget::Offscreen { view, .. } => Ok(FrameTarget {
                view: view.clone(),
                surface_texture: None,
            }),
        }
    }

    // ── Resource factories ────────────────────────────────────────────────

    pub fn storage_buffer(&self, label: &str, size: u64, copy_src: bool) -> wgpu::Buffer {
        let mut usage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST;
        if copy_src {
            usage |= wgpu::BufferUsages::COPY_SRC;
        }
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(4),
            usage,
            mapped_at_creation: false,
        })
    }

    pub fn uniform_init<T: bytemuck::Pod>(&self, label: &str, value: &T) -> wgpu::Buffer {
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(value),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        })
    }

    pub fn readback_buffer(&self, label: &str, size: u64) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(4),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Fetch (building on first use) the 256×1 LUT texture for a color scale.
    pub fn colormap_view(&mut self, scale: ColorScale) -> wgpu::TextureView {
        if let Some(view) = self.colormap_luts.get(&scale) {
            return view.clone();
        }
        let pixels = crate::colormap::lut_rgba8(scale);
        let texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some("colormap_lut"),
                size: wgpu::Extent3d { width: 256, height: 1, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            bytemuck::cast_slice(&pixels),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.colormap_luts.insert(scale, view.clone());
        view
    }

    /// A future resolving when all work submitted so far has completed on the
    /// GPU.  This is the awaited point inside `load`.
    pub fn submitted_work_done(&self) -> GpuFence {
        let state = Arc::new(Mutex::new(FenceState { done: false, waker: None }));
        let shared = Arc::clone(&state);
        self.queue.on_submitted_work_done(move || {
            let mut guard = shared.lock().expect("fence state poisoned");
            guard.done = true;
            if let Some(waker) = guard.waker.take() {
                waker.wake();
            }
        });
        GpuFence { state, device: self.device.clone() }
    }

    /// Read the offscreen target back as tightly-packed RGBA bytes.  Returns
    /// `None` when rendering to a surface.  Blocks on the copy; intended for
    /// export and tests, never the frame loop.
    pub fn read_target_pixels(&self) -> Option<Vec<u8>> {
        let RenderTarget::Offscreen { texture, width, height, .. } = &self.target else {
            return None;
        };
        Some(read_texture_rgba(&self.device, &self.queue, texture, *width, *height))
    }

    /// Blocking read of the first `size` bytes of a COPY_SRC buffer.  For
    /// diagnostics and tests only; the frame loop uses the async paths.
    pub fn read_buffer_bytes(&self, buffer: &wgpu::Buffer, size: u64) -> Vec<u8> {
        let size = size.min(buffer.size());
        let staging = self.readback_buffer("debug_readback", size);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        if rx.recv().map(|r| r.is_err()).unwrap_or(true) {
            return Vec::new();
        }
        let mapped = slice.get_mapped_range();
        let bytes = mapped.to_vec();
        drop(mapped);
        staging.unmap();
        bytes
    }
}

// ── GpuFence ──────────────────────────────────────────────────────────────────

struct FenceState {
    done: bool,
    waker: Option<Waker>,
}

/// Completion future for [`GpuContext::submitted_work_done`].  Polling drives
/// the device so the future resolves under a plain block-on executor.
pub struct GpuFence {
    state: Arc<Mutex<FenceState>>,
    device: wgpu::Device,
}

impl Future for GpuFence {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        {
            let mut guard = self.state.lock().expect("fence state poisoned");
            if guard.done {
                return Poll::Ready(());
            }
            guard.waker = Some(cx.waker().clone());
        }
        // The submitted-work-done callback only fires from device maintenance;
        // wait here so a bare block_on cannot deadlock.
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        let guard = self.state.lock().expect("fence state poisoned");
        if guard.done { Poll::Ready(()) } else { Poll::Pending }
    }
}

// ── Probe & acquisition ───────────────────────────────────────────────────────

fn create_instance(options: &GpuContextOptions) -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        flags: if options.debug {
            wgpu::InstanceFlags::debugging()
        } else {
            wgpu::InstanceFlags::default()
        },
        ..Default::default()
    })
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'static>>,
    options: &GpuContextOptions,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue)> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            compatible_surface: surface,
            ..Default::default()
        })
        .await
        .map_err(|e| GraphError::Unsupported {
            reason: format!("no suitable GPU adapter: {e}"),
        })?;

    probe_adapter(&adapter, options)?;

    let mut limits = wgpu::Limits::default();
    let needed = options.max_nodes as u64 * NODE_STATE_STRIDE;
    if needed > limits.max_storage_buffer_binding_size as u64 {
        limits.max_storage_buffer_binding_size = needed as u32;
    }

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("heroine_graph_device"),
            required_limits: limits,
            ..Default::default()
        })
        .await
        .map_err(|e| GraphError::Unsupported {
            reason: format!("device creation failed: {e}"),
        })?;

    Ok((adapter, device, queue))
}

/// Pre-flight capability probe.  Each failure names the missing capability so
/// the host can show a meaningful message.
fn probe_adapter(adapter: &wgpu::Adapter, options: &GpuContextOptions) -> Result<()> {
    let downlevel = adapter.get_downlevel_capabilities();
    if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
        return Err(GraphError::Unsupported {
            reason: "adapter has no compute shader support".into(),
        });
    }
    if !downlevel.flags.contains(wgpu::DownlevelFlags::VERTEX_STORAGE) {
        return Err(GraphError::Unsupported {
            reason: "adapter cannot bind storage buffers in vertex shaders".into(),
        });
    }

    // 32-bit float storage: R32Float textures must take a storage binding.
    let float_storage = adapter.get_texture_format_features(wgpu::TextureFormat::R32Float);
    if !float_storage
        .allowed_usages
        .contains(wgpu::TextureUsages::STORAGE_BINDING)
    {
        return Err(GraphError::Unsupported {
            reason: "adapter has no 32-bit float storage texture support".into(),
        });
    }

    // Density target: the float format the heatmap accumulates into must be
    // renderable, sampleable, and blendable/filterable for the splat pass.
    let density =
        adapter.get_texture_format_features(crate::layers::heatmap::DENSITY_FORMAT);
    if !density
        .allowed_usages
        .contains(wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING)
        || !density.flags.contains(
            wgpu::TextureFormatFeatureFlags::FILTERABLE
                | wgpu::TextureFormatFeatureFlags::BLENDABLE,
        )
    {
        return Err(GraphError::Unsupported {
            reason: "adapter cannot render and sample the float density target".into(),
        });
    }

    let limits = adapter.limits();
    let needed = options.max_nodes as u64 * NODE_STATE_STRIDE;
    if (limits.max_storage_buffer_binding_size as u64) < needed {
        return Err(GraphError::Unsupported {
            reason: format!(
                "max_storage_buffer_binding_size {} below the {} bytes needed for {} nodes",
                limits.max_storage_buffer_binding_size, needed, options.max_nodes
            ),
        });
    }
    if limits.max_compute_workgroup_size_x < 256
        || limits.max_compute_invocations_per_workgroup < 256
    {
        return Err(GraphError::Unsupported {
            reason: "adapter compute workgroups are smaller than 256 lanes".into(),
        });
    }
    Ok(())
}

// ── Bind group layout entry helpers ───────────────────────────────────────────
//
// Compute-visible by default; render layers pass explicit stages where a
// binding is vertex- or fragment-only.

pub(crate) fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    storage_entry_vis(binding, read_only, wgpu::ShaderStages::COMPUTE)
}

pub(crate) fn storage_entry_vis(
    binding: u32,
    read_only: bool,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    uniform_entry_vis(binding, wgpu::ShaderStages::COMPUTE)
}

pub(crate) fn uniform_entry_vis(
    binding: u32,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(crate) fn texture_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    filterable: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

pub(crate) fn sampler_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn offscreen_texture(
    device: &wgpu::Device,
    width: u32,
    height: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen_target"),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Copy a texture to a padded staging buffer, map it, and strip row padding.
fn read_texture_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let bytes_per_pixel = 4u32;
    let unpadded = width * bytes_per_pixel;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded = unpadded.div_ceil(align) * align;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("target_readback"),
        size: (padded * height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder =
        device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = device.poll(wgpu::PollType::wait_indefinitely());
    if rx.recv().map(|r| r.is_err()).unwrap_or(true) {
        return Vec::new();
    }

    let mapped = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity((unpadded * height) as usize);
    for row in 0..height {
        let start = (row * padded) as usize;
        pixels.extend_from_slice(&mapped[start..start + unpadded as usize]);
    }
    drop(mapped);
    staging.unmap();
    pixels
}

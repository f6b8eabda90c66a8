//! Interactive demo viewer: a procedurally generated clustered graph with
//! mouse pan/zoom, hover picking and layer toggles.
//!
//! Keys: Space = pause/resume, F = fit to view, H = heatmap, C = contours,
//! T = tick once while paused, Escape = quit.  Drag to pan, wheel to zoom.

use std::sync::Arc;

use glam::Vec2;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use heroine_graph::{EdgeData, GraphData, NodeData, Renderer, RendererOptions};

// ── Demo graph ────────────────────────────────────────────────────────────────

/// Small deterministic generator so every run shows the same graph.
struct XorShift(u64);

impl XorShift {
    fn next_f32(&mut self) -> f32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 >> 40) as f32 / (1u64 << 24) as f32
    }

    fn next_index(&mut self, n: usize) -> usize {
        (self.next_f32() * n as f32) as usize % n.max(1)
    }
}

/// Three dense clusters with a sparse web of bridges between them.
fn demo_graph() -> GraphData {
    const CLUSTERS: usize = 3;
    const PER_CLUSTER: usize = 300;
    const INTRA_EDGES: usize = 3;
    const BRIDGES: usize = 12;
    let palette = ["#6fa8ff", "#ff9a6f", "#8fe08a"];

    let mut rng = XorShift(0x3779_2025);
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    for c in 0..CLUSTERS {
        for i in 0..PER_CLUSTER {
            let id = format!("c{c}-n{i}");
            let mut node = NodeData::new(id.clone());
            node.radius = Some(2.0 + rng.next_f32() * 3.0);
            node.color = Some(palette[c].into());
            node.importance = Some(rng.next_f32());
            if i % 25 == 0 {
                node.label = Some(format!("hub {c}.{}", i / 25));
            }
            nodes.push(node);

            for _ in 0..INTRA_EDGES {
                let other = rng.next_index(PER_CLUSTER);
                if other != i {
                    edges.push(EdgeData::new(id.clone(), format!("c{c}-n{other}")));
                }
            }
        }
    }
    for _ in 0..BRIDGES {
        let a = rng.next_index(CLUSTERS);
        let b = (a + 1 + rng.next_index(CLUSTERS - 1)) % CLUSTERS;
        let mut edge = EdgeData::new(
            format!("c{a}-n{}", rng.next_index(PER_CLUSTER)),
            format!("c{b}-n{}", rng.next_index(PER_CLUSTER)),
        );
        edge.width = Some(2.0);
        edge.color = Some("#ffffff55".into());
        edges.push(edge);
    }

    GraphData { nodes, edges }
}

// ── App ───────────────────────────────────────────────────────────────────────

struct App {
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    cursor: Vec2,
    dragging: bool,
    heatmap_on: bool,
    contour_on: bool,
}

impl App {
    fn new() -> Self {
        Self {
            window: None,
            renderer: None,
            cursor: Vec2::ZERO,
            dragging: false,
            heatmap_on: false,
            contour_on: false,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let window = Arc::new(
            event_loop
                .create_window(
                    Window::default_attributes()
                        .with_title("heroine-graph")
                        .with_inner_size(winit::dpi::LogicalSize::new(1280, 800)),
                )
                .expect("window creation failed"),
        );
        let size = window.inner_size();
        let options = RendererOptions {
            width: size.width.max(1),
            height: size.height.max(1),
            dpr: window.scale_factor() as f32,
            ..Default::default()
        };

        let mut renderer = match pollster::block_on(Renderer::new(Arc::clone(&window), options)) {
            Ok(renderer) => renderer,
            Err(e) => {
                eprintln!("cannot initialise GPU renderer: {e}");
                event_loop.exit();
                return;
            }
        };
        pollster::block_on(renderer.load(demo_graph())).expect("demo graph is well-formed");
        renderer.fit_to_view();
        renderer.start_simulation();

        self.window = Some(window);
        self.renderer = Some(renderer);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::Resized(size) => {
                renderer.resize(size.width, size.height);
            }

            WindowEvent::RedrawRequested => {
                if let Err(e) = renderer.render_frame() {
                    eprintln!("render error: {e}");
                }
                if let (Some(window), Some(id)) = (&self.window, renderer.hovered_node_id()) {
                    window.set_title(&format!("heroine-graph — {id}"));
                }
            }

            WindowEvent::CursorMoved { position, .. } => {
                let next = Vec2::new(position.x as f32, position.y as f32);
                if self.dragging {
                    let delta = next - self.cursor;
                    renderer.pan(delta.x, delta.y);
                } else {
                    renderer.hover(next.x, next.y);
                }
                self.cursor = next;
            }

            WindowEvent::MouseInput { button: MouseButton::Left, state, .. } => {
                self.dragging = state == ElementState::Pressed;
            }

            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 40.0,
                };
                renderer.zoom_at(1.1f32.powf(steps), self.cursor);
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match code {
                KeyCode::Escape => event_loop.exit(),
                KeyCode::Space => {
                    if renderer.simulation_running() {
                        renderer.pause_simulation();
                    } else {
                        renderer.start_simulation();
                    }
                }
                KeyCode::KeyF => renderer.fit_to_view(),
                KeyCode::KeyT => renderer.tick_once(),
                KeyCode::KeyH => {
                    self.heatmap_on = !self.heatmap_on;
                    if self.heatmap_on {
                        renderer.enable_heatmap(None);
                    } else {
                        renderer.disable_heatmap();
                    }
                }
                KeyCode::KeyC => {
                    self.contour_on = !self.contour_on;
                    if self.contour_on {
                        renderer.enable_contour(None);
                    } else {
                        renderer.disable_contour();
                    }
                }
                _ => {}
            },

            _ => {}
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,wgpu=warn")),
        )
        .init();

    let event_loop = EventLoop::new().expect("event loop creation failed");
    let mut app = App::new();
    event_loop.run_app(&mut app).expect("event loop failed");
}

pub mod camera;
pub mod color;
pub mod colormap;
pub mod context;
pub mod error;
pub mod graph;
pub mod layers;
pub mod renderer;
pub mod sim;

pub use camera::Camera;
pub use color::{Color, ColorSpec};
pub use colormap::ColorScale;
pub use error::GraphError;
pub use graph::{EdgeData, GraphData, NodeData};
pub use layers::contour::{ContourConfig, ContourConfigPatch};
pub use layers::heatmap::{HeatmapConfig, HeatmapConfigPatch};
pub use layers::labels::{LabelPriority, LabelSpec, LabelsConfig, LabelsConfigPatch};
pub use renderer::{FrameStats, Renderer, RendererOptions};
pub use sim::SimulationParams;

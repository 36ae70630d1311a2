#[cfg(feature = "cli")]
pub mod cli;
pub mod color;
pub mod config;
pub mod geometry;
pub mod ir;
pub mod layout;
pub mod parser;
pub mod render;
pub mod scene_dump;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::{Rendered, render_diagram, run};
pub use config::{Config, LayoutConfig};
pub use geometry::{Scene, resolve_scene};
pub use ir::Graph;
pub use layout::compute_layout;
pub use parser::{ParseOutput, parse, parse_document, parse_with_theme};
pub use render::render_svg;
pub use theme::Theme;

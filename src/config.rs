use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    /// Gap between neighbouring nodes within a layer.
    pub node_spacing: f32,
    /// Gap between consecutive layers.
    pub rank_spacing: f32,
    pub margin: f32,
    pub label_line_height: f32,
    pub flowchart: FlowchartLayoutConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: crate::ir::DEFAULT_NODE_WIDTH,
            node_height: crate::ir::DEFAULT_NODE_HEIGHT,
            node_spacing: 40.0,
            rank_spacing: 80.0,
            margin: 24.0,
            label_line_height: 1.5,
            flowchart: FlowchartLayoutConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowchartLayoutConfig {
    pub corner_radius: f32,
    pub double_rect_inset: f32,
    pub arrow_size: f32,
    pub edge_label_font_size: f32,
    /// Minimum clearance added to a label's width along its segment.
    pub edge_label_padding: f32,
    /// Perpendicular distance between a segment and its label box.
    pub edge_label_gap: f32,
    pub node_font_min: f32,
    pub node_font_max: f32,
    pub node_text_padding: f32,
    pub subgraph_margin: f32,
    pub subgraph_label_inset: f32,
}

impl Default for FlowchartLayoutConfig {
    fn default() -> Self {
        Self {
            corner_radius: 8.0,
            double_rect_inset: 4.0,
            arrow_size: 8.0,
            edge_label_font_size: 12.0,
            edge_label_padding: 8.0,
            edge_label_gap: 4.0,
            node_font_min: 9.0,
            node_font_max: 16.0,
            node_text_padding: 12.0,
            subgraph_margin: 16.0,
            subgraph_label_inset: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::mermaid_default();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<NumberOrString>,
    primary_color: Option<String>,
    primary_text_color: Option<String>,
    primary_border_color: Option<String>,
    line_color: Option<String>,
    edge_label_background: Option<String>,
    cluster_bkg: Option<String>,
    cluster_border: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowchartConfigFile {
    node_width: Option<f32>,
    node_height: Option<f32>,
    node_spacing: Option<f32>,
    rank_spacing: Option<f32>,
    diagram_padding: Option<f32>,
    corner_radius: Option<f32>,
    arrow_size: Option<f32>,
    edge_label_font_size: Option<f32>,
    edge_label_padding: Option<f32>,
    subgraph_margin: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f32),
    String(String),
}

impl NumberOrString {
    fn as_f32(&self) -> Option<f32> {
        match self {
            NumberOrString::Number(value) => Some(*value),
            NumberOrString::String(value) => value.trim().trim_end_matches("px").parse().ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    flowchart: Option<FlowchartConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = serde_json::from_str(&contents)?;
    tracing::debug!(path = %path.display(), "loaded config file");
    apply_config_file(&mut config, parsed);
    Ok(config)
}

/// Merges a `%%{init: ...}%%` payload into `config`. Unknown or malformed
/// sections are ignored.
pub fn merge_init_config(mut config: Config, init: serde_json::Value) -> Config {
    match serde_json::from_value::<ConfigFile>(init) {
        Ok(parsed) => apply_config_file(&mut config, parsed),
        Err(err) => tracing::warn!(%err, "ignoring malformed init directive"),
    }
    config
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) {
    if let Some(theme) = parsed.theme.as_deref().and_then(Theme::by_name) {
        config.theme = theme;
        config.render.background = config.theme.background.clone();
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size.as_ref().and_then(NumberOrString::as_f32) {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.primary_color {
            config.theme.primary_color = v;
        }
        if let Some(v) = vars.primary_text_color {
            config.theme.primary_text_color = v;
        }
        if let Some(v) = vars.primary_border_color {
            config.theme.primary_border_color = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.edge_label_background {
            config.theme.edge_label_background = v;
        }
        if let Some(v) = vars.cluster_bkg {
            config.theme.cluster_background = v;
        }
        if let Some(v) = vars.cluster_border {
            config.theme.cluster_border = v;
        }
        if let Some(v) = vars.background {
            config.render.background = v.clone();
            config.theme.background = v;
        }
    }

    if let Some(flow) = parsed.flowchart {
        let layout = &mut config.layout;
        if let Some(v) = flow.node_width {
            layout.node_width = v;
        }
        if let Some(v) = flow.node_height {
            layout.node_height = v;
        }
        if let Some(v) = flow.node_spacing {
            layout.node_spacing = v;
        }
        if let Some(v) = flow.rank_spacing {
            layout.rank_spacing = v;
        }
        if let Some(v) = flow.diagram_padding {
            layout.margin = v;
        }
        if let Some(v) = flow.corner_radius {
            layout.flowchart.corner_radius = v;
        }
        if let Some(v) = flow.arrow_size {
            layout.flowchart.arrow_size = v;
        }
        if let Some(v) = flow.edge_label_font_size {
            layout.flowchart.edge_label_font_size = v;
        }
        if let Some(v) = flow.edge_label_padding {
            layout.flowchart.edge_label_padding = v;
        }
        if let Some(v) = flow.subgraph_margin {
            layout.flowchart.subgraph_margin = v;
        }
    }
}

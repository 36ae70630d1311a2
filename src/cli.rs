use crate::config::{Config, load_config, merge_init_config};
use crate::geometry::{Scene, resolve_scene};
use crate::ir::Graph;
use crate::layout::compute_layout;
use crate::parser::parse_with_theme;
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::scene_dump::{scene_dump_json, write_scene_dump};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "flowscribe", version, about = "Flowchart DSL to SVG/PNG/JSON")]
pub struct Args {
    /// Input file (.mmd or .md) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables, flowchart spacing)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Default canvas width for PNG rasterization
    #[arg(short = 'w', long = "width", default_value_t = 1200.0)]
    pub width: f32,

    /// Default canvas height for PNG rasterization
    #[arg(short = 'H', long = "height", default_value_t = 800.0)]
    pub height: f32,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Json => "json",
        }
    }
}

/// One diagram carried through every stage, with the config it was
/// rendered under.
pub struct Rendered {
    pub config: Config,
    pub graph: Graph,
    pub scene: Scene,
}

/// Parses, lays out and resolves one diagram under `base`, honoring any
/// init directive it carries.
pub fn render_diagram(source: &str, base: &Config) -> Rendered {
    let output = parse_with_theme(source, &base.theme);
    let mut config = base.clone();
    if let Some(init) = output.init_config {
        config = merge_init_config(config, init);
    }
    // Re-parse so entity defaults reflect a theme chosen by the directive.
    let mut graph = if config.theme.primary_color != base.theme.primary_color
        || config.theme.primary_border_color != base.theme.primary_border_color
        || config.theme.primary_text_color != base.theme.primary_text_color
        || config.theme.line_color != base.theme.line_color
    {
        parse_with_theme(source, &config.theme).graph
    } else {
        output.graph
    };
    compute_layout(&mut graph, &config.layout);
    let scene = resolve_scene(&graph, &config.layout);
    Rendered {
        config,
        graph,
        scene,
    }
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let mut base_config = load_config(args.config.as_deref())?;
    base_config.render.width = args.width;
    base_config.render.height = args.height;

    let (input, is_markdown) = read_input(args.input.as_deref())?;
    let diagrams = if is_markdown {
        extract_mermaid_blocks(&input)
    } else {
        vec![input]
    };

    if diagrams.is_empty() {
        return Err(anyhow::anyhow!("No flowchart diagrams found in input"));
    }

    if diagrams.len() == 1 {
        let rendered = render_diagram(&diagrams[0], &base_config);
        return write_rendered(&rendered, args.output_format, args.output.as_deref());
    }

    let outputs = resolve_multi_outputs(args.output.as_deref(), args.output_format, diagrams.len())?;
    for (diagram, output) in diagrams.iter().zip(&outputs) {
        let rendered = render_diagram(diagram, &base_config);
        write_rendered(&rendered, args.output_format, Some(output))?;
    }
    tracing::info!(count = diagrams.len(), "rendered markdown diagrams");

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn write_rendered(rendered: &Rendered, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    match format {
        OutputFormat::Svg => {
            let svg = render_svg(&rendered.scene, &rendered.config.theme);
            write_output_svg(&svg, output)?;
        }
        OutputFormat::Png => {
            let output = ensure_output(output, format.extension())?;
            let svg = render_svg(&rendered.scene, &rendered.config.theme);
            write_output_png(&svg, output, &rendered.config.render, &rendered.config.theme)?;
        }
        OutputFormat::Json => match output {
            Some(path) => write_scene_dump(path, &rendered.scene, &rendered.graph)?,
            None => println!("{}", scene_dump_json(&rendered.scene, &rendered.graph)?),
        },
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok((buf, false));
        }
        let content = std::fs::read_to_string(path)?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| matches!(ext, "md" | "markdown"))
            .unwrap_or(false);
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

fn ensure_output<'a>(output: Option<&'a Path>, ext: &str) -> Result<&'a Path> {
    output.ok_or_else(|| anyhow::anyhow!("Output path required for {} output", ext))
}

fn extract_mermaid_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut in_block = false;
    let mut current = Vec::new();
    let mut fence = String::new();

    for line in input.lines() {
        let trimmed = line.trim();
        if !in_block {
            if let Some(start_fence) = detect_diagram_fence(trimmed) {
                in_block = true;
                fence = start_fence;
                continue;
            }
        } else if is_fence_end(trimmed, &fence) {
            in_block = false;
            blocks.push(current.join("\n"));
            current.clear();
            continue;
        }

        if in_block {
            current.push(line.to_string());
        }
    }

    blocks
}

fn detect_diagram_fence(line: &str) -> Option<String> {
    for marker in ['`', '~'] {
        let fence: String = std::iter::repeat_n(marker, 3).collect();
        if line.starts_with(&fence) {
            let info = line.trim_start_matches(marker).trim();
            if info.starts_with("mermaid") || info.starts_with("flowchart") {
                return Some(fence);
            }
        }
    }
    None
}

fn is_fence_end(line: &str, fence: &str) -> bool {
    if !line.starts_with(fence) {
        return false;
    }
    line[fence.len()..].trim().is_empty()
}

fn resolve_multi_outputs(
    output: Option<&Path>,
    format: OutputFormat,
    count: usize,
) -> Result<Vec<PathBuf>> {
    let ext = format.extension();
    let base = output.ok_or_else(|| anyhow::anyhow!("Output path required for markdown input"))?;
    if base.is_dir() {
        return Ok((0..count)
            .map(|idx| base.join(format!("diagram-{}.{}", idx + 1, ext)))
            .collect());
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("diagram");
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    Ok((0..count)
        .map(|idx| parent.join(format!("{}-{}.{}", stem, idx + 1, ext)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_diagram_blocks() {
        let input = r#"
text
``` mermaid
flowchart LR
  A --> B
```
more
~~~flowchart
X --> Y
~~~
```rust
fn main() {}
```
"#;
        let blocks = extract_mermaid_blocks(input);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("A --> B"));
        assert_eq!(blocks[1], "X --> Y");
    }

    #[test]
    fn multi_outputs_are_numbered() {
        let outputs =
            resolve_multi_outputs(Some(Path::new("out/chart.svg")), OutputFormat::Svg, 2).unwrap();
        assert_eq!(
            outputs,
            vec![PathBuf::from("out/chart-1.svg"), PathBuf::from("out/chart-2.svg")]
        );
        assert!(resolve_multi_outputs(None, OutputFormat::Json, 2).is_err());
    }

    #[test]
    fn init_directive_theme_reaches_nodes() {
        let source = "%%{init: {\"themeVariables\": {\"primaryColor\": \"#ff0000\"}}}%%\nA --> B";
        let rendered = render_diagram(source, &Config::default());
        assert_eq!(rendered.config.theme.primary_color, "#ff0000");
        assert_eq!(rendered.scene.nodes[0].fill, crate::color::Color::rgb(0xff, 0, 0));
    }

    #[test]
    fn render_diagram_runs_all_stages() {
        let rendered = render_diagram("flowchart LR\nA --> B", &Config::default());
        assert_eq!(rendered.scene.nodes.len(), 2);
        assert_eq!(rendered.scene.edges.len(), 1);
        assert!(rendered.graph.nodes["B"].is_placed());
    }
}

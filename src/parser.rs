use crate::color::{Color, parse_color_or_default};
use crate::ir::{Arrowhead, Direction, Edge, EdgeStyle, Graph, Node, NodeShape};
use crate::theme::Theme;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:flowchart|graph)(?:\s+(\w+))?\s*$").unwrap());
static SUBGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^subgraph(?:\s+(.*))?$").unwrap());
static INIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^%%\{\s*init\s*:\s*(\{.*\})\s*\}%%").unwrap());

/// Connector markers in match priority order. Where two markers can start at
/// the same position the longer, more specific one comes first.
const CONNECTORS: &[Connector] = &[
    Connector::new("-.->", EdgeStyle::Dashed, Arrowhead::Arrow),
    Connector::new("-.-", EdgeStyle::Dotted, Arrowhead::None),
    Connector::new("==>>", EdgeStyle::Thick, Arrowhead::Open),
    Connector::new("==>", EdgeStyle::Thick, Arrowhead::Arrow),
    Connector::new("===", EdgeStyle::Thick, Arrowhead::None),
    Connector::new("-->>", EdgeStyle::Solid, Arrowhead::Open),
    Connector::new("--x", EdgeStyle::Solid, Arrowhead::Cross),
    Connector::new("--o", EdgeStyle::Solid, Arrowhead::Circle),
    Connector::new("-->", EdgeStyle::Solid, Arrowhead::Arrow),
    Connector::new("---", EdgeStyle::Solid, Arrowhead::None),
];

/// Node shape wrappers in match priority order.
const SHAPE_WRAPPERS: &[(&str, &str, NodeShape)] = &[
    ("[[", "]]", NodeShape::DoubleRect),
    ("([", "])", NodeShape::Stadium),
    ("[(", ")]", NodeShape::RoundRect),
    ("{{", "}}", NodeShape::Hexagon),
    ("(", ")", NodeShape::Circle),
    ("<", ">", NodeShape::Diamond),
    ("{", "}", NodeShape::Diamond),
    ("[", "]", NodeShape::Rectangle),
];

const SHAPE_OPENERS: [char; 4] = ['[', '(', '{', '<'];
const EDGE_STYLE_SEPARATOR: &str = "->";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Connector {
    marker: &'static str,
    style: EdgeStyle,
    arrowhead: Arrowhead,
}

impl Connector {
    const fn new(marker: &'static str, style: EdgeStyle, arrowhead: Arrowhead) -> Self {
        Self {
            marker,
            style,
            arrowhead,
        }
    }
}

/// Style properties keyed by lowercased property name, in declaration order.
type StyleProps = IndexMap<String, String>;

#[derive(Debug, Default)]
pub struct ParseOutput {
    pub graph: Graph,
    pub init_config: Option<serde_json::Value>,
}

/// Parses flowchart source into a styled graph. Never fails: unrecognized or
/// malformed lines are skipped.
pub fn parse(input: &str) -> Graph {
    parse_document(input).graph
}

/// Like [`parse`], also returning any `%%{init: ...}%%` directive payload.
pub fn parse_document(input: &str) -> ParseOutput {
    parse_with_theme(input, &Theme::mermaid_default())
}

/// Parses with node and edge defaults taken from `theme`.
pub fn parse_with_theme(input: &str, theme: &Theme) -> ParseOutput {
    FlowchartParser::new(theme).run(input)
}

#[derive(Debug, Clone, Copy)]
struct EntityDefaults {
    fill: Color,
    border: Color,
    text: Color,
    edge: Color,
}

#[derive(Debug, Clone, PartialEq)]
struct NodeRef {
    id: String,
    label: Option<String>,
    shape: Option<NodeShape>,
    classes: Vec<String>,
}

/// Parse-local state: the graph under construction, subgraph context and the
/// three cascade dictionaries. Dropped once `run` returns.
struct FlowchartParser {
    graph: Graph,
    defaults: EntityDefaults,
    current_subgraph: Option<String>,
    subgraph_stack: Vec<Option<String>>,
    in_note: bool,
    node_styles: IndexMap<String, StyleProps>,
    edge_styles: HashMap<(String, String), StyleProps>,
    class_defs: HashMap<String, StyleProps>,
    class_assignments: IndexMap<String, Vec<String>>,
    init_config: Option<serde_json::Value>,
}

impl FlowchartParser {
    fn new(theme: &Theme) -> Self {
        Self {
            graph: Graph::new(),
            defaults: EntityDefaults {
                fill: theme.node_fill(),
                border: theme.node_border(),
                text: theme.text_color(),
                edge: theme.edge_color(),
            },
            current_subgraph: None,
            subgraph_stack: Vec::new(),
            in_note: false,
            node_styles: IndexMap::new(),
            edge_styles: HashMap::new(),
            class_defs: HashMap::new(),
            class_assignments: IndexMap::new(),
            init_config: None,
        }
    }

    fn run(mut self, input: &str) -> ParseOutput {
        for raw_line in input.lines() {
            let trimmed = raw_line.trim();
            if trimmed.is_empty() {
                continue;
            }

            if self.in_note {
                if is_note_end(trimmed) {
                    self.in_note = false;
                }
                continue;
            }

            if let Some(caps) = INIT_RE.captures(trimmed) {
                if let Some(json_str) = caps.get(1).map(|m| m.as_str()) {
                    self.init_config = parse_init_payload(json_str);
                }
                continue;
            }
            if trimmed.starts_with("%%") {
                continue;
            }

            let line = strip_trailing_comment(trimmed);
            if line.is_empty() {
                continue;
            }

            if is_note_start(&line) {
                // `note ... : text` is complete on one line.
                if !line.contains(':') {
                    self.in_note = true;
                }
                continue;
            }

            for statement in split_statements(&line) {
                self.parse_statement(&statement);
            }
        }

        self.apply_cascade();

        tracing::debug!(
            nodes = self.graph.nodes.len(),
            edges = self.graph.edges.len(),
            "parsed flowchart"
        );
        ParseOutput {
            graph: self.graph,
            init_config: self.init_config,
        }
    }

    fn parse_statement(&mut self, line: &str) {
        if let Some(caps) = HEADER_RE.captures(line) {
            let token = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            self.graph.direction = Direction::from_token(token);
            return;
        }

        if line == "end" {
            self.current_subgraph = self.subgraph_stack.pop().flatten();
            return;
        }

        if let Some(caps) = SUBGRAPH_RE.captures(line) {
            let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let previous = self.current_subgraph.take();
            self.subgraph_stack.push(previous);
            self.current_subgraph = Some(strip_quotes(name));
            return;
        }

        if let Some(rest) = strip_keyword(line, "classDef") {
            self.parse_class_def(rest);
            return;
        }

        if let Some(rest) = strip_keyword(line, "class") {
            self.parse_class_line(rest);
            return;
        }

        if let Some(rest) = strip_keyword(line, "style") {
            self.parse_style_line(rest);
            return;
        }

        if let Some(rest) = strip_keyword(line, "linkStyle") {
            self.parse_link_style_line(rest);
            return;
        }

        if self.parse_connector_line(line) {
            return;
        }

        if !self.parse_standalone_node(line) {
            tracing::trace!(line, "skipping unrecognized line");
        }
    }

    fn parse_class_def(&mut self, rest: &str) {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let names = parts.next().unwrap_or("").trim();
        let props = parse_style_props(parts.next().unwrap_or(""));
        if names.is_empty() || props.is_empty() {
            return;
        }
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            self.class_defs.insert(name.to_string(), props.clone());
        }
    }

    fn parse_class_line(&mut self, rest: &str) {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() < 2 {
            return;
        }
        let class_names: Vec<&str> = parts[parts.len() - 1]
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        let ids = parts[..parts.len() - 1].join(" ");
        for id in ids.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            for class_name in &class_names {
                self.assign_class(id, class_name);
            }
        }
    }

    fn assign_class(&mut self, id: &str, class_name: &str) {
        let classes = self.class_assignments.entry(id.to_string()).or_default();
        if !classes.iter().any(|existing| existing == class_name) {
            classes.push(class_name.to_string());
        }
    }

    fn parse_style_line(&mut self, rest: &str) {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let target = parts.next().unwrap_or("").trim();
        let props = parse_style_props(parts.next().unwrap_or(""));
        if target.is_empty() || props.is_empty() {
            return;
        }

        if let Some((from, to)) = target.split_once(EDGE_STYLE_SEPARATOR) {
            let from = from.trim_end_matches('-').trim();
            let to = to.trim();
            if from.is_empty() || to.is_empty() {
                return;
            }
            self.edge_styles
                .entry((from.to_string(), to.to_string()))
                .or_default()
                .extend(props);
            return;
        }

        for id in target.split(',').map(str::trim).filter(|id| !id.is_empty()) {
            let node_ref = NodeRef {
                id: id.to_string(),
                label: None,
                shape: None,
                classes: Vec::new(),
            };
            self.touch_node(&node_ref);
            self.node_styles
                .entry(id.to_string())
                .or_default()
                .extend(props.clone());
        }
    }

    fn parse_link_style_line(&mut self, rest: &str) {
        let mut parts = rest.splitn(2, char::is_whitespace);
        let targets = parts.next().unwrap_or("").trim();
        let props = parse_style_props(parts.next().unwrap_or(""));
        if targets.is_empty() || props.is_empty() {
            return;
        }
        if targets == "default" {
            for edge in &mut self.graph.edges {
                apply_edge_style(edge, &props);
            }
            return;
        }
        for token in targets.split(',') {
            if let Ok(index) = token.trim().parse::<usize>()
                && let Some(edge) = self.graph.edges.get_mut(index)
            {
                apply_edge_style(edge, &props);
            }
        }
    }

    /// Parses `A --> B`, chains and `&` groups. Returns false when the line
    /// holds no connector or any node token is malformed; nothing is created
    /// in that case.
    fn parse_connector_line(&mut self, line: &str) -> bool {
        let Some((tokens, connectors)) = split_connectors(line) else {
            return false;
        };

        let mut labels: Vec<Option<String>> = vec![None; connectors.len()];
        let mut groups: Vec<Vec<NodeRef>> = Vec::with_capacity(tokens.len());
        for (idx, token) in tokens.iter().enumerate() {
            let (label, remainder) = extract_pipe_label(token);
            if let Some(label) = label {
                let slot = idx.saturating_sub(1).min(connectors.len() - 1);
                if labels[slot].is_none() {
                    labels[slot] = Some(label);
                }
            }
            let mut group = Vec::new();
            for part in split_node_group(&remainder) {
                match parse_node_ref(part) {
                    Some(node_ref) => group.push(node_ref),
                    None => {
                        tracing::debug!(line, token = part, "skipping edge with malformed node");
                        return false;
                    }
                }
            }
            groups.push(group);
        }

        for group in &groups {
            for node_ref in group {
                self.touch_node(node_ref);
            }
        }

        for (idx, connector) in connectors.iter().enumerate() {
            for from in &groups[idx] {
                for to in &groups[idx + 1] {
                    self.push_edge(&from.id, &to.id, labels[idx].clone(), connector);
                }
            }
        }
        true
    }

    fn parse_standalone_node(&mut self, line: &str) -> bool {
        let Some(node_ref) = parse_node_ref(line) else {
            return false;
        };
        if node_ref.id.chars().any(char::is_whitespace) {
            return false;
        }
        self.touch_node(&node_ref);
        true
    }

    /// Creates the node on first reference, stamping the active subgraph,
    /// and records any `:::class` shorthand.
    fn touch_node(&mut self, node_ref: &NodeRef) {
        let is_new = !self.graph.nodes.contains_key(&node_ref.id);
        let defaults = self.defaults;
        let node = self.graph.ensure_node(
            &node_ref.id,
            node_ref.label.as_deref(),
            node_ref.shape,
            self.current_subgraph.as_deref(),
        );
        if is_new {
            node.fill = defaults.fill;
            node.border = defaults.border;
            node.text_color = defaults.text;
        }
        for class_name in &node_ref.classes {
            self.assign_class(&node_ref.id, class_name);
        }
    }

    fn push_edge(&mut self, from: &str, to: &str, label: Option<String>, connector: &Connector) {
        let mut edge = Edge::new(from, to, label, connector.style, connector.arrowhead);
        edge.color = self.defaults.edge;
        if let Some(props) = self.edge_styles.get(&(from.to_string(), to.to_string())) {
            apply_edge_style(&mut edge, props);
        }
        self.graph.edges.push(edge);
    }

    /// Inline node styles first, then class styles in assignment order; a
    /// later write wins on the same property.
    fn apply_cascade(&mut self) {
        for (id, props) in &self.node_styles {
            if let Some(node) = self.graph.nodes.get_mut(id) {
                apply_node_style(node, props);
            }
        }
        for (id, classes) in &self.class_assignments {
            let Some(node) = self.graph.nodes.get_mut(id) else {
                continue;
            };
            for class_name in classes {
                if let Some(props) = self.class_defs.get(class_name) {
                    apply_node_style(node, props);
                }
            }
        }
    }
}

fn apply_node_style(node: &mut Node, props: &StyleProps) {
    for (key, value) in props {
        match key.as_str() {
            "fill" => node.fill = parse_color_or_default(value),
            "stroke" => node.border = parse_color_or_default(value),
            "stroke-width" => {
                if let Some(width) = parse_length(value) {
                    node.border_width = width;
                }
            }
            "color" => node.text_color = parse_color_or_default(value),
            _ => {}
        }
    }
}

fn apply_edge_style(edge: &mut Edge, props: &StyleProps) {
    for (key, value) in props {
        match key.as_str() {
            "stroke" => edge.color = parse_color_or_default(value),
            "stroke-width" => {
                if let Some(width) = parse_length(value) {
                    edge.stroke_width = width;
                    if edge.style == EdgeStyle::Solid {
                        if width >= 4.0 {
                            edge.style = EdgeStyle::Thick;
                        } else if width >= 2.0 {
                            edge.style = EdgeStyle::Bold;
                        }
                    }
                }
            }
            "stroke-dasharray" => {
                let value = value.trim();
                if !value.is_empty() && value != "0" && value != "none" {
                    edge.style = EdgeStyle::Dashed;
                }
            }
            _ => {}
        }
    }
}

fn parse_length(value: &str) -> Option<f32> {
    value
        .trim()
        .trim_end_matches("px")
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|width| width.is_finite() && *width >= 0.0)
}

fn parse_style_props(input: &str) -> StyleProps {
    let mut props = StyleProps::new();
    for part in input.split(',') {
        let mut kv = part.splitn(2, ':');
        let key = kv.next().unwrap_or("").trim();
        let value = kv.next().unwrap_or("").trim();
        if key.is_empty() || value.is_empty() {
            continue;
        }
        props.insert(key.to_ascii_lowercase(), value.to_string());
    }
    props
}

fn parse_init_payload(json_str: &str) -> Option<serde_json::Value> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(json_str) {
        return Some(value);
    }
    match json5::from_str::<serde_json::Value>(json_str) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::debug!(%err, "ignoring unparsable init directive");
            None
        }
    }
}

/// Parses a node reference such as `A`, `A[Start]`, `B((End))` or `C{{Hex}}`.
fn parse_node_ref(token: &str) -> Option<NodeRef> {
    let (base, classes) = split_inline_classes(token);
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Some(open) = trimmed.find(SHAPE_OPENERS) else {
        return Some(NodeRef {
            id: trimmed.to_string(),
            label: None,
            shape: None,
            classes,
        });
    };

    let Some((text, shape)) = detect_shape(&trimmed[open..]) else {
        return Some(NodeRef {
            id: trimmed.to_string(),
            label: None,
            shape: None,
            classes,
        });
    };

    let mut id = trimmed[..open].trim().to_string();
    if id.is_empty() {
        id = text.clone();
    }
    if id.is_empty() {
        return None;
    }
    Some(NodeRef {
        id,
        label: Some(text),
        shape: Some(shape),
        classes,
    })
}

fn detect_shape(raw: &str) -> Option<(String, NodeShape)> {
    for (open, close, shape) in SHAPE_WRAPPERS {
        if raw.len() >= open.len() + close.len() && raw.starts_with(open) && raw.ends_with(close)
        {
            let inner = &raw[open.len()..raw.len() - close.len()];
            return Some((strip_quotes(inner), *shape));
        }
    }
    None
}

fn split_inline_classes(token: &str) -> (String, Vec<String>) {
    let mut parts = token.split(":::");
    let base = parts.next().unwrap_or("").trim().to_string();
    let classes = parts
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>();
    (base, classes)
}

/// Splits a connector line into node tokens and the connectors between them.
/// At each position the first matching table entry wins, so `-->>` is never
/// read as `-->` followed by a stray `>`.
fn split_connectors(line: &str) -> Option<(Vec<String>, Vec<Connector>)> {
    let masked = mask_bracket_content(line);
    let mut tokens = Vec::new();
    let mut connectors = Vec::new();
    let mut cursor = 0;
    while let Some((start, connector)) = find_connector(&masked, cursor) {
        tokens.push(line[cursor..start].to_string());
        connectors.push(connector);
        cursor = start + connector.marker.len();
    }
    if connectors.is_empty() {
        return None;
    }
    tokens.push(line[cursor..].to_string());
    Some((tokens, connectors))
}

fn find_connector(masked: &str, from: usize) -> Option<(usize, Connector)> {
    let bytes = masked.as_bytes();
    for start in from..bytes.len() {
        if !matches!(bytes[start], b'-' | b'=') {
            continue;
        }
        let rest = &masked[start..];
        if let Some(connector) = CONNECTORS.iter().find(|c| rest.starts_with(c.marker)) {
            return Some((start, *connector));
        }
    }
    None
}

/// Removes the first `|label|` from `token`, returning the trimmed label.
fn extract_pipe_label(token: &str) -> (Option<String>, String) {
    let pipes = top_level_pipes(token);
    let (Some(&open), Some(&close)) = (pipes.first(), pipes.get(1)) else {
        return (None, token.to_string());
    };
    let label = strip_quotes(&token[open + 1..close]);
    let mut remainder = String::with_capacity(token.len());
    remainder.push_str(&token[..open]);
    remainder.push_str(&token[close + 1..]);
    let label = if label.is_empty() { None } else { Some(label) };
    (label, remainder)
}

/// Byte offsets of `|` characters outside brackets and quotes.
fn top_level_pipes(token: &str) -> Vec<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut pipes = Vec::new();
    for (idx, ch) in token.char_indices() {
        match ch {
            _ if quote == Some(ch) => quote = None,
            _ if quote.is_some() => {}
            '"' => quote = Some(ch),
            '[' | '(' | '{' => depth += 1,
            ']' | ')' | '}' => depth = depth.saturating_sub(1),
            '|' if depth == 0 => pipes.push(idx),
            _ => {}
        }
    }
    pipes
}

/// Blanks out text inside brackets, quotes and `|...|` labels so connector
/// search ignores dashes there. Byte offsets are preserved.
fn mask_bracket_content(line: &str) -> String {
    let mut result = String::with_capacity(line.len());
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut in_pipe = false;

    for ch in line.chars() {
        let masked = match ch {
            _ if quote == Some(ch) => {
                quote = None;
                true
            }
            _ if quote.is_some() => true,
            '"' => {
                quote = Some(ch);
                true
            }
            '|' if depth == 0 => {
                in_pipe = !in_pipe;
                true
            }
            _ if in_pipe => true,
            '[' | '(' | '{' => {
                depth += 1;
                true
            }
            ']' | ')' | '}' => {
                depth = depth.saturating_sub(1);
                true
            }
            _ => depth > 0,
        };
        if masked {
            result.extend(std::iter::repeat_n(' ', ch.len_utf8()));
        } else {
            result.push(ch);
        }
    }
    result
}

fn strip_keyword<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Splits `A & B[x & y]` on top-level ampersands.
fn split_node_group(token: &str) -> Vec<&str> {
    let masked = mask_bracket_content(token);
    let mut parts = Vec::new();
    let mut start = 0;
    for (idx, byte) in masked.bytes().enumerate() {
        if byte == b'&' {
            parts.push(&token[start..idx]);
            start = idx + 1;
        }
    }
    parts.push(&token[start..]);
    parts
}

fn is_note_start(line: &str) -> bool {
    let mut words = line.split_whitespace();
    let is_keyword = words
        .next()
        .map(|word| word.eq_ignore_ascii_case("note"))
        .unwrap_or(false);
    if !is_keyword {
        return false;
    }
    // A bare `note` word is not a note.
    let positioned = words
        .next()
        .map(|word| matches!(word.to_ascii_lowercase().as_str(), "left" | "right" | "over"))
        .unwrap_or(false);
    positioned || (line.contains(':') && find_connector(&mask_bracket_content(line), 0).is_none())
}

fn is_note_end(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().collect();
    words.len() == 2 && words[0].eq_ignore_ascii_case("end") && words[1].eq_ignore_ascii_case("note")
}

fn split_statements(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut in_pipe = false;

    for ch in line.chars() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            current.push(ch);
            continue;
        }

        match ch {
            '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '|' if depth == 0 => {
                in_pipe = !in_pipe;
                current.push(ch);
            }
            _ if in_pipe => current.push(ch),
            '[' | '(' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ']' | ')' | '}' => {
                depth = (depth - 1).max(0);
                current.push(ch);
            }
            ';' if depth == 0 => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    parts
}

fn strip_trailing_comment(line: &str) -> String {
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();
    let mut out = String::new();
    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
            out.push(ch);
            continue;
        }
        if ch == '"' {
            quote = Some(ch);
            out.push(ch);
            continue;
        }
        if ch == '%'
            && let Some('%') = chars.peek().copied()
        {
            break;
        }
        out.push(ch);
    }
    out.trim().to_string()
}

fn strip_quotes(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

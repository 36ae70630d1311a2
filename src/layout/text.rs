use serde::Serialize;

/// Mean glyph advance as a fraction of the font size.
pub(crate) const AVERAGE_CHAR_FACTOR: f32 = 0.56;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub width: f32,
    pub height: f32,
}

pub(crate) fn measure_text(text: &str, font_size: f32, line_height: f32) -> TextBlock {
    let mut lines = split_lines(text);
    if lines.is_empty() {
        lines.push(String::new());
    }
    let width = lines
        .iter()
        .map(|line| text_width(line, font_size))
        .fold(0.0, f32::max);
    let height = lines.len() as f32 * font_size * line_height;
    TextBlock {
        lines,
        width,
        height,
    }
}

/// Largest font size in `[min, max]` at which the longest line of `text`
/// fits into `available` width, using the average glyph advance.
pub(crate) fn fit_font_size(text: &str, available: f32, min: f32, max: f32) -> f32 {
    let longest = split_lines(text)
        .iter()
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0);
    if longest == 0 || !available.is_finite() || available <= 0.0 {
        return if longest == 0 { max } else { min };
    }
    let fitted = available / (longest as f32 * AVERAGE_CHAR_FACTOR);
    fitted.clamp(min, max.max(min))
}

pub(crate) fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width_factor).sum::<f32>() * font_size
}

pub(crate) fn char_width_factor(ch: char) -> f32 {
    match ch {
        ' ' => 0.306,
        '\\' | '.' | ',' | ':' | ';' | '|' | '!' | '(' | ')' | '[' | ']' | '{' | '}' => 0.321,
        'I' | 'i' | 'j' | 'l' => 0.25,
        'f' | 't' | 'r' => 0.34,
        'M' | 'W' | 'm' | 'w' => 0.86,
        'A'..='Z' => 0.66,
        'a'..='z' => 0.56,
        '0'..='9' => 0.6,
        '@' | '#' | '%' | '&' => 0.946,
        _ if ch.is_ascii() => 0.568,
        // CJK and other wide glyphs.
        _ => 1.0,
    }
}

/// Splits on explicit line breaks only; labels are never wrapped.
pub(crate) fn split_lines(text: &str) -> Vec<String> {
    let normalized = text
        .replace("<br/>", "\n")
        .replace("<br>", "\n")
        .replace("\\n", "\n");
    normalized
        .split('\n')
        .map(|line| line.trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_lines_handles_br_tags() {
        assert_eq!(split_lines("a<br/>b"), vec!["a", "b"]);
        assert_eq!(split_lines("a<br>b"), vec!["a", "b"]);
        assert_eq!(split_lines("a\\nb"), vec!["a", "b"]);
    }

    #[test]
    fn width_scales_with_font_size() {
        let w12 = text_width("Hello", 12.0);
        let w24 = text_width("Hello", 24.0);
        assert!((w24 - w12 * 2.0).abs() < 0.01);
    }

    #[test]
    fn measure_uses_widest_line() {
        let block = measure_text("ab<br>abcdef", 10.0, 1.5);
        assert_eq!(block.lines.len(), 2);
        assert!((block.width - text_width("abcdef", 10.0)).abs() < 1e-4);
        assert!((block.height - 30.0).abs() < 1e-4);
    }

    #[test]
    fn font_fit_is_clamped() {
        assert_eq!(fit_font_size("a", 1000.0, 9.0, 16.0), 16.0);
        assert_eq!(fit_font_size(&"x".repeat(200), 100.0, 9.0, 16.0), 9.0);
        let mid = fit_font_size("abcdefghij", 67.2, 9.0, 16.0);
        assert!((mid - 12.0).abs() < 1e-3, "got {mid}");
        assert_eq!(fit_font_size("", 100.0, 9.0, 16.0), 16.0);
    }
}

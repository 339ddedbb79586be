//! Greedy single-column word wrap.
//!
//! Tokens are accumulated onto a candidate line and measured with the caller's
//! `measure` function, which must reflect the font, size and style the text will
//! be drawn with. The output is a pure function of its inputs.

/// One wrapped line and the baseline it is drawn on.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLine {
    pub text: String,
    pub x: f32,
    pub baseline_y: f32,
}

/// The lines of one text block plus the baseline the next line would sit on.
///
/// `cursor_y` equals the origin's `y` when the input had no tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct WrappedBlock {
    pub lines: Vec<LayoutLine>,
    pub cursor_y: f32,
}

/// Wraps `text` into lines no wider than `max_width_px`, starting at `origin`.
///
/// A token that is wider than `max_width_px` on its own is placed on its own line
/// unsplit; that line overflows.
pub fn wrap_text<F>(
    text: &str,
    max_width_px: f32,
    line_height_px: f32,
    origin: (f32, f32),
    measure: F,
) -> WrappedBlock
where
    F: Fn(&str) -> f32,
{
    let (x, mut y) = origin;
    let mut lines = Vec::new();
    let mut current = String::new();

    for token in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(token);
            continue;
        }

        let candidate = format!("{current} {token}");
        if measure(&candidate) <= max_width_px {
            current = candidate;
        } else {
            lines.push(LayoutLine {
                text: std::mem::take(&mut current),
                x,
                baseline_y: y,
            });
            y += line_height_px;
            current.push_str(token);
        }
    }

    if !current.is_empty() {
        lines.push(LayoutLine {
            text: current,
            x,
            baseline_y: y,
        });
        y += line_height_px;
    }

    WrappedBlock { lines, cursor_y: y }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

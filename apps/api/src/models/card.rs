use bytes::Bytes;
use thiserror::Error;

/// Upper bound on bullet points a card can carry.
pub const MAX_POINTS: usize = 5;

/// Drops characters the SVG text layer cannot carry: C0 controls other than
/// tab, newline and carriage return, plus the noncharacters U+FFFE and U+FFFF.
pub fn strip_undrawable(text: &str) -> String {
    text.chars()
        .filter(|c| match *c {
            '\t' | '\n' | '\r' => true,
            '\u{0}'..='\u{1F}' | '\u{FFFE}' | '\u{FFFF}' => false,
            _ => true,
        })
        .collect()
}

/// A generation request as received from either the HTTP API or the chat webhook.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("card title is empty")]
    EmptyTitle,

    #[error("card point {index} is empty")]
    EmptyPoint { index: usize },

    #[error("card has {count} points (max {MAX_POINTS})")]
    TooManyPoints { count: usize },
}

/// The structured content drawn on a card.
///
/// Invariants, enforced by [`CardContent::new`]: the title is non-empty after
/// trimming, there are at most [`MAX_POINTS`] points, and no point is blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardContent {
    title: String,
    points: Vec<String>,
}

impl CardContent {
    pub fn new(title: impl Into<String>, points: Vec<String>) -> Result<Self, ContentError> {
        let title = strip_undrawable(&title.into()).trim().to_string();
        if title.is_empty() {
            return Err(ContentError::EmptyTitle);
        }
        if points.len() > MAX_POINTS {
            return Err(ContentError::TooManyPoints {
                count: points.len(),
            });
        }
        let points = points
            .into_iter()
            .enumerate()
            .map(|(index, p)| {
                let p = strip_undrawable(&p).trim().to_string();
                if p.is_empty() {
                    Err(ContentError::EmptyPoint { index })
                } else {
                    Ok(p)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { title, points })
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn points(&self) -> &[String] {
        &self.points
    }
}

/// A finished card: PNG bytes plus pixel dimensions. Never cached or shared
/// across requests; `Bytes` only makes hand-off to the delivery side cheap.
#[derive(Debug, Clone)]
pub struct CardImage {
    pub png: Bytes,
    pub width: u32,
    pub height: u32,
}

pub mod card;

pub use card::{strip_undrawable, CardContent, CardImage, ContentError, RawRequest, MAX_POINTS};

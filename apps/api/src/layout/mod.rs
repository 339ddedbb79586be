// Text layout: the registered card font and greedy line wrapping.
// Pure and synchronous; callers run it inside the compositor's blocking task.

pub mod font_metrics;
pub mod wrap;

pub use font_metrics::FontRegistry;
pub use wrap::{wrap_text, LayoutLine, WrappedBlock};

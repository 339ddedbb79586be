// Card generation: content resolution, background synthesis and composition.
// All synthesis calls go through llm_client::SynthesisBackend.

pub mod content;
pub mod handlers;
pub mod pipeline;
pub mod prompts;

pub use content::{validate_text, InputError};
pub use pipeline::{CardPipeline, PipelineError, PipelineMode};

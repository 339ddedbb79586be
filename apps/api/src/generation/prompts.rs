// Prompt constants for the generation pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{JSON_ONLY_INSTRUCTION, NO_TEXT_IN_IMAGE};

/// Stage B, first call: Tamil text → one English visual description.
pub const PROMPT_SYNTHESIS_SYSTEM: &str =
    "Convert the Tamil information into ONE clear English description for an \
    informative illustration. Focus on scene, objects and mood. \
    Do not include any text in the image. One short paragraph only.";

/// Stage B, second call: wraps the synthesized description for the image model.
pub fn image_prompt(description: &str) -> String {
    format!("{description}\n\n{NO_TEXT_IN_IMAGE}")
}

/// Stage A, external extraction: Tamil text → `{title, points}`.
pub fn content_extraction_system() -> String {
    format!(
        "You turn Tamil news or announcements into an informational card. \
        Keep the original language (Tamil). \
        Return a JSON object with this EXACT schema (no extra fields):\n\
        {{\"title\": \"short headline\", \"points\": [\"key point\", \"key point\"]}}\n\
        Rules: the title is one line; give between 2 and 5 points; each point is a single \
        short sentence; never invent facts that are not in the input.\n\
        {JSON_ONLY_INSTRUCTION}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_prompt_forbids_text() {
        let prompt = image_prompt("A village square at dawn");
        assert!(prompt.starts_with("A village square at dawn"));
        assert!(prompt.contains("Do not include any text"));
    }

    #[test]
    fn test_extraction_prompt_names_schema() {
        let system = content_extraction_system();
        assert!(system.contains("\"title\""));
        assert!(system.contains("\"points\""));
        assert!(system.contains("valid JSON"));
    }
}

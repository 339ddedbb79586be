// Shared prompt fragments.
// Each stage that calls the synthesis backend keeps its own prompts.rs alongside it;
// this file only holds cross-cutting pieces.

/// Appended to every system prompt that expects a JSON object back.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with a single valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps the illustration free of glyphs; the card draws its own text layer.
pub const NO_TEXT_IN_IMAGE: &str = "Do not include any text, letters, numbers, captions, \
    signage or watermarks in the image.";

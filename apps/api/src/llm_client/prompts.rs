// Shared prompt fragments. Each stage that calls the orchestrator keeps its own
// prompts.rs alongside it; only cross-cutting rules live here.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

// Program generation pipeline: analysis → blueprint → fitting.
// Every model call goes through llm_client::LlmOrchestrator; no stage talks to a
// provider directly.

pub mod analysis;
pub mod blueprint;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod validation;

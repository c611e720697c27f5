// Resume analysis pipeline
// Implements: prompt building, one-shot analysis with bounded retries, streaming decode,
// output contract validation, legacy conversion, robustness audit.
// All inference calls go through llm_client::InferenceService.

pub mod contract;
pub mod errors;
pub mod handlers;
pub mod input;
pub mod legacy;
pub mod orchestrator;
pub mod prompts;
pub mod robustness;
pub mod streaming;

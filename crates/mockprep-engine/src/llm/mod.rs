pub mod client;
pub mod models;
pub mod prompts;

pub use client::GeminiClient;
pub use models::Usage;
pub use prompts::{answer_analysis_prompt, question_generation_prompt, MAX_TRANSCRIPT_CHARS};

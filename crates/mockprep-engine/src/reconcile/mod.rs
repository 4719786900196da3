//! Turning untrusted model output into validated interview data.
//!
//! Questions: extract → parse → validate, failing with a typed error.
//! Analysis: direct parse → fenced/chatty extraction → placeholder, never failing.
//! Both are pure functions over the completion text.

mod analysis;
mod extract;
mod fallback;
mod questions;
mod schema;

pub use analysis::{reconcile_analysis, reconcile_analysis_traced, AnalysisOutcome, AnalysisSource};
pub use fallback::{fallback_analysis, FALLBACK_IMPROVEMENTS, FALLBACK_SCORE, FALLBACK_STRENGTHS};
pub use questions::reconcile_questions;

#[cfg(test)]
mod tests;

//! Question generation, answer scoring, and the reconciliation of model
//! output that both depend on.

pub mod interview;
pub mod llm;
pub mod reconcile;
mod text;

pub use interview::{build_report, prepare_interview, score_interview};
pub use reconcile::{reconcile_analysis, reconcile_analysis_traced, reconcile_questions};

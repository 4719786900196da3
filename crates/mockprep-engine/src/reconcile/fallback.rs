use mockprep_core::{
    AnalysisResult, CategoryScore, GeneratedQuestion, QuestionAnalysis, ANALYSIS_CATEGORIES,
};

/// Neutral score used throughout the placeholder analysis.
pub const FALLBACK_SCORE: f64 = 50.0;

pub const FALLBACK_STRENGTHS: [&str; 3] = [
    "Completed the interview process",
    "Provided responses to questions",
    "Demonstrated engagement",
];

pub const FALLBACK_IMPROVEMENTS: [&str; 3] = [
    "Analysis unavailable due to processing error",
    "Please try the interview again for detailed feedback",
    "Consider speaking more clearly for better transcription",
];

const UNAVAILABLE: &str = "Analysis unavailable";

/// Placeholder analysis shown when the model's feedback can't be recovered.
///
/// Always structurally complete: every category, and one entry per question
/// in the order given.
pub fn fallback_analysis(questions: &[GeneratedQuestion]) -> AnalysisResult {
    AnalysisResult {
        overall_score: FALLBACK_SCORE,
        categories: ANALYSIS_CATEGORIES
            .iter()
            .map(|name| CategoryScore {
                name: (*name).to_string(),
                score: FALLBACK_SCORE,
            })
            .collect(),
        strengths: to_strings(&FALLBACK_STRENGTHS),
        improvements: to_strings(&FALLBACK_IMPROVEMENTS),
        question_analysis: questions
            .iter()
            .map(|q| QuestionAnalysis {
                id: q.id,
                score: FALLBACK_SCORE,
                strengths: vec!["Response provided".to_string()],
                improvements: vec![UNAVAILABLE.to_string()],
                time_assessment: UNAVAILABLE.to_string(),
                key_points: vec![UNAVAILABLE.to_string()],
            })
            .collect(),
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

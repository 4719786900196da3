//! End-to-end interview flows over a `CompletionProvider`.

use crate::llm::prompts::{answer_analysis_prompt, question_generation_prompt};
use crate::reconcile::{fallback_analysis, reconcile_analysis_traced, reconcile_questions};
use mockprep_core::{
    AnalysisResult, AnswerSheet, CompletionProvider, GeneratedQuestion, GenerationRequest,
    InterviewError, InterviewInfo, InterviewReport,
};
use tracing::{info, warn};

/// Ask the provider for questions and reconcile its reply.
pub async fn prepare_interview(
    provider: &dyn CompletionProvider,
    request: &GenerationRequest,
) -> Result<Vec<GeneratedQuestion>, InterviewError> {
    let prompt = question_generation_prompt(request);
    let raw = provider.generate(&prompt).await.map_err(|err| {
        warn!(provider = provider.name(), error = %err, "Question generation failed");
        InterviewError::from(err)
    })?;

    let questions = reconcile_questions(&raw, request.desired_count)?;
    info!(
        provider = provider.name(),
        count = questions.len(),
        "Prepared interview questions"
    );
    Ok(questions)
}

/// Score the answers. Any failure, transport or content, degrades to the
/// placeholder analysis.
pub async fn score_interview(
    provider: &dyn CompletionProvider,
    info: &InterviewInfo,
    questions: &[GeneratedQuestion],
    answers: &AnswerSheet,
) -> AnalysisResult {
    let prompt = answer_analysis_prompt(info, questions, answers);
    let raw = match provider.generate(&prompt).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(
                provider = provider.name(),
                error = %err,
                "Answer analysis request failed, using placeholder feedback"
            );
            return fallback_analysis(questions);
        }
    };

    let outcome = reconcile_analysis_traced(&raw, questions);
    info!(
        provider = provider.name(),
        source = ?outcome.source,
        overall_score = outcome.result.overall_score,
        "Scored interview"
    );
    outcome.result
}

pub fn build_report(
    info: InterviewInfo,
    questions: Vec<GeneratedQuestion>,
    answers: AnswerSheet,
    analysis: AnalysisResult,
) -> InterviewReport {
    InterviewReport::new(info, questions, answers, analysis)
}

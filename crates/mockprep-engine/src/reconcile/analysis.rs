use super::extract::{outer_brace_span, strip_markdown_fences};
use super::fallback::fallback_analysis;
use super::schema::Checker;
use crate::text::truncate_str;
use mockprep_core::{
    AnalysisResult, CategoryScore, GeneratedQuestion, QuestionAnalysis, ReconcileError,
};
use serde_json::Value;
use tracing::{debug, warn};

/// Which step of the cascade produced an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisSource {
    /// The completion was a bare JSON object.
    Direct,
    /// The object was cut out of fenced or chatty text.
    Extracted,
    /// Nothing usable; the placeholder analysis was synthesized.
    Fallback { reason: ReconcileError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub source: AnalysisSource,
}

impl AnalysisOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, AnalysisSource::Fallback { .. })
    }
}

/// Recover the answer analysis from a raw completion. Never fails: anything
/// unrecoverable yields `fallback_analysis(fallback_questions)`.
pub fn reconcile_analysis(raw_text: &str, fallback_questions: &[GeneratedQuestion]) -> AnalysisResult {
    reconcile_analysis_traced(raw_text, fallback_questions).result
}

/// Same as [`reconcile_analysis`], also reporting which stage succeeded.
pub fn reconcile_analysis_traced(
    raw_text: &str,
    fallback_questions: &[GeneratedQuestion],
) -> AnalysisOutcome {
    let parsed = match parse_direct(raw_text) {
        Ok(value) => Ok((value, AnalysisSource::Direct)),
        Err(direct_err) => {
            debug!(error = %direct_err, "Direct analysis parse failed, trying extraction");
            parse_extracted(raw_text).map(|value| (value, AnalysisSource::Extracted))
        }
    };

    let (value, source) = match parsed {
        Ok(parsed) => parsed,
        Err(reason) => return fallback(raw_text, fallback_questions, reason),
    };

    match validate_analysis(&value) {
        Ok(result) => {
            debug!(source = ?source, "Reconciled interview analysis");
            AnalysisOutcome { result, source }
        }
        Err(reason) => fallback(raw_text, fallback_questions, reason),
    }
}

fn parse_direct(raw_text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(raw_text.trim())
}

fn parse_extracted(raw_text: &str) -> Result<Value, ReconcileError> {
    let cleaned = strip_markdown_fences(raw_text);
    let candidate = outer_brace_span(&cleaned).ok_or(ReconcileError::ExtractionFailed)?;
    serde_json::from_str(candidate).map_err(|err| ReconcileError::ParseFailed {
        detail: err.to_string(),
    })
}

fn fallback(
    raw_text: &str,
    questions: &[GeneratedQuestion],
    reason: ReconcileError,
) -> AnalysisOutcome {
    warn!(
        reason = %reason,
        response_len = raw_text.len(),
        "Could not recover interview analysis, using placeholder feedback"
    );
    debug!(response = truncate_str(raw_text, 500), "Unrecoverable analysis response");
    AnalysisOutcome {
        result: fallback_analysis(questions),
        source: AnalysisSource::Fallback { reason },
    }
}

/// Convert a parsed payload into a typed analysis.
///
/// Only the top-level shape gates the result: `overallScore` must be a
/// number and the four lists must be arrays. Inside the lists, unusable
/// categories and question entries are dropped, missing per-question fields
/// default to empty, and each repair is logged with its path. Score ranges
/// are not enforced.
pub(crate) fn validate_analysis(value: &Value) -> Result<AnalysisResult, ReconcileError> {
    let mut check = Checker::new();
    let Some(obj) = check.object(value, "$") else {
        return Err(ReconcileError::ValidationFailed {
            issues: check.into_issues(),
        });
    };

    let overall_score = check.number(obj.get("overallScore"), "$.overallScore");
    let categories = check.array(obj.get("categories"), "$.categories");
    let strengths = check.array(obj.get("strengths"), "$.strengths");
    let improvements = check.array(obj.get("improvements"), "$.improvements");
    let question_analysis = check.array(obj.get("questionAnalysis"), "$.questionAnalysis");

    let (
        Some(overall_score),
        Some(categories),
        Some(strengths),
        Some(improvements),
        Some(question_analysis),
    ) = (
        overall_score,
        categories,
        strengths,
        improvements,
        question_analysis,
    )
    else {
        return Err(ReconcileError::ValidationFailed {
            issues: check.into_issues(),
        });
    };

    let mut repairs = Checker::new();
    let mut result = AnalysisResult {
        overall_score,
        categories: Vec::with_capacity(categories.len()),
        strengths: string_items(&mut repairs, strengths, "$.strengths"),
        improvements: string_items(&mut repairs, improvements, "$.improvements"),
        question_analysis: Vec::with_capacity(question_analysis.len()),
    };
    for (i, item) in categories.iter().enumerate() {
        if let Some(category) = category(&mut repairs, item, &format!("$.categories[{}]", i)) {
            result.categories.push(category);
        }
    }
    for (i, item) in question_analysis.iter().enumerate() {
        let path = format!("$.questionAnalysis[{}]", i);
        if let Some(entry) = question_analysis_entry(&mut repairs, item, &path) {
            result.question_analysis.push(entry);
        }
    }

    for issue in repairs.into_issues() {
        warn!(%issue, "Repaired malformed element in AI analysis");
    }
    Ok(result)
}

/// Keep the string items of a list, noting the rest.
fn string_items(check: &mut Checker, items: &[Value], path: &str) -> Vec<String> {
    items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| check.string(Some(item), &format!("{}[{}]", path, i)))
        .collect()
}

fn optional_string_list(check: &mut Checker, value: Option<&Value>, path: &str) -> Vec<String> {
    match check.array(value, path) {
        Some(items) => string_items(check, items, path),
        None => Vec::new(),
    }
}

/// A category needs a name and a numeric score; anything less is dropped.
fn category(check: &mut Checker, item: &Value, path: &str) -> Option<CategoryScore> {
    let obj = check.object(item, path)?;
    let name = check.string(obj.get("name"), &format!("{}.name", path));
    let score = check.number(obj.get("score"), &format!("{}.score", path));
    Some(CategoryScore {
        name: name?,
        score: score?,
    })
}

/// An entry needs `id` and `score`; the descriptive fields default to empty.
fn question_analysis_entry(
    check: &mut Checker,
    item: &Value,
    path: &str,
) -> Option<QuestionAnalysis> {
    let obj = check.object(item, path)?;
    let id = check.uint(obj.get("id"), &format!("{}.id", path));
    let score = check.number(obj.get("score"), &format!("{}.score", path));
    let (id, score) = (id?, score?);

    Some(QuestionAnalysis {
        id,
        score,
        strengths: optional_string_list(check, obj.get("strengths"), &format!("{}.strengths", path)),
        improvements: optional_string_list(
            check,
            obj.get("improvements"),
            &format!("{}.improvements", path),
        ),
        time_assessment: check
            .string(obj.get("timeAssessment"), &format!("{}.timeAssessment", path))
            .unwrap_or_default(),
        key_points: optional_string_list(check, obj.get("keyPoints"), &format!("{}.keyPoints", path)),
    })
}

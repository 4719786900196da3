use super::extract::{balanced_fragment_from, find_object_array};
use super::schema::{field, Checker};
use crate::text::truncate_str;
use mockprep_core::{GeneratedQuestion, ReconcileError, ValidationIssue};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

const DURATION_KEYS: [&str; 2] = ["expectedDuration", "expectedDurationSeconds"];

/// Recover the generated question list from a raw completion.
///
/// The requested count is advisory: every well-formed element is returned
/// in source order, whatever their number. Malformed elements are dropped
/// and logged; only a payload with nothing usable is an error.
pub fn reconcile_questions(
    raw_text: &str,
    desired_count: u32,
) -> Result<Vec<GeneratedQuestion>, ReconcileError> {
    let Some(span) = find_object_array(raw_text) else {
        warn!(
            response_len = raw_text.len(),
            "No question array found in AI response"
        );
        return Err(ReconcileError::ExtractionFailed);
    };

    let value = parse_candidate(raw_text, span.start, span.text)?;
    let questions = validate_questions(&value)?;

    if questions.len() != desired_count as usize {
        warn!(
            desired = desired_count,
            received = questions.len(),
            "AI returned a different number of questions than requested"
        );
    }
    debug!(count = questions.len(), "Reconciled generated questions");
    Ok(questions)
}

/// Parse the greedy span; if that fails, retry on the balanced value that
/// opens at the same bracket before reporting the greedy parse error.
fn parse_candidate(raw_text: &str, start: usize, greedy: &str) -> Result<Value, ReconcileError> {
    let greedy_err = match serde_json::from_str::<Value>(greedy) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    if let Some(balanced) = balanced_fragment_from(raw_text, start).filter(|b| *b != greedy) {
        if let Ok(value) = serde_json::from_str::<Value>(balanced) {
            debug!("Greedy question span failed to parse; balanced span succeeded");
            return Ok(value);
        }
    }

    warn!(
        error = %greedy_err,
        candidate = truncate_str(greedy, 200),
        "Failed to parse questions JSON"
    );
    Err(ReconcileError::ParseFailed {
        detail: greedy_err.to_string(),
    })
}

fn validate_questions(value: &Value) -> Result<Vec<GeneratedQuestion>, ReconcileError> {
    let mut check = Checker::new();
    let Some(items) = check.array(Some(value), "$") else {
        return Err(ReconcileError::ValidationFailed {
            issues: check.into_issues(),
        });
    };

    let mut seen_ids = HashSet::new();
    let mut questions = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = format!("$[{}]", i);
        let Some(question) = validate_question(&mut check, item, &path) else {
            continue;
        };
        if !seen_ids.insert(question.id) {
            check.issue(format!("{}.id", path), format!("duplicate id {}", question.id));
            continue;
        }
        questions.push(question);
    }

    let issues = check.into_issues();
    if questions.is_empty() {
        if issues.is_empty() {
            return Err(ReconcileError::ValidationFailed {
                issues: vec![ValidationIssue::new("$", "expected at least one question")],
            });
        }
        return Err(ReconcileError::ValidationFailed { issues });
    }
    for issue in &issues {
        warn!(%issue, "Dropped malformed question from AI response");
    }
    Ok(questions)
}

fn validate_question(check: &mut Checker, item: &Value, path: &str) -> Option<GeneratedQuestion> {
    let obj = check.object(item, path)?;
    let before = check.issue_count();

    let id = check.uint(obj.get("id"), &format!("{}.id", path));
    let text = check.non_empty_string(obj.get("text"), &format!("{}.text", path));
    let duration = check.uint(
        field(obj, &DURATION_KEYS),
        &format!("{}.expectedDuration", path),
    );
    let tips = check.string(obj.get("tips"), &format!("{}.tips", path));

    if check.issue_count() != before {
        return None;
    }
    Some(GeneratedQuestion {
        id: id?,
        text: text?,
        expected_duration_secs: duration?,
        tips: tips?,
    })
}

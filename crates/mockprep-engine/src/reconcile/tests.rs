use super::analysis::validate_analysis;
use super::*;
use mockprep_core::{GeneratedQuestion, ReconcileError, ANALYSIS_CATEGORIES};
use serde_json::json;

const TWO_QUESTIONS: &str = r#"[
  {"id": 1, "text": "Tell me about a time you scaled a service.", "expectedDuration": 120, "tips": "Use STAR."},
  {"id": 2, "text": "How do you review code?", "expectedDuration": 90, "tips": "Mention empathy."}
]"#;

const VALID_ANALYSIS: &str = r#"{"overallScore":82,"categories":[{"name":"Technical Knowledge","score":80},{"name":"Communication Skills","score":85},{"name":"Problem Solving","score":78},{"name":"Role Relevance","score":90},{"name":"Overall Impression","score":77}],"strengths":["a","b","c"],"improvements":["x","y","z"],"questionAnalysis":[{"id":1,"score":80,"strengths":["s"],"improvements":["i"],"timeAssessment":"ok","keyPoints":["k"]}]}"#;

fn question(id: u32) -> GeneratedQuestion {
    GeneratedQuestion {
        id,
        text: format!("Question {}", id),
        expected_duration_secs: 120,
        tips: String::new(),
    }
}

fn expected_valid_analysis() -> mockprep_core::AnalysisResult {
    let value: serde_json::Value = serde_json::from_str(VALID_ANALYSIS).unwrap();
    serde_json::from_value(value).unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════
//  QUESTIONS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn questions_bare_array_round_trips_fields_in_order() {
    let questions = reconcile_questions(TWO_QUESTIONS, 2).unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0].id, 1);
    assert_eq!(questions[0].text, "Tell me about a time you scaled a service.");
    assert_eq!(questions[0].expected_duration_secs, 120);
    assert_eq!(questions[0].tips, "Use STAR.");
    assert_eq!(questions[1].id, 2);
    assert_eq!(questions[1].expected_duration_secs, 90);

    // Same input, same output.
    assert_eq!(reconcile_questions(TWO_QUESTIONS, 2).unwrap(), questions);
}

#[test]
fn questions_survive_leading_and_trailing_commentary() {
    let raw = format!("Here are your questions:\n{}\nEnjoy!", TWO_QUESTIONS);
    let questions = reconcile_questions(&raw, 2).unwrap();
    assert_eq!(questions, reconcile_questions(TWO_QUESTIONS, 2).unwrap());
}

#[test]
fn questions_inside_markdown_fence() {
    let raw = format!("```json\n{}\n```", TWO_QUESTIONS);
    assert_eq!(reconcile_questions(&raw, 2).unwrap().len(), 2);
}

#[test]
fn questions_without_brackets_fail_extraction() {
    let err = reconcile_questions("I'm sorry, I can't help with that.", 2).unwrap_err();
    assert_eq!(err, ReconcileError::ExtractionFailed);

    let err = reconcile_questions("", 2).unwrap_err();
    assert_eq!(err, ReconcileError::ExtractionFailed);
}

#[test]
fn questions_with_trailing_comma_fail_parse() {
    let raw = r#"[{"id": 1, "text": "Q?", "expectedDuration": 60, "tips": "t",}]"#;
    match reconcile_questions(raw, 1).unwrap_err() {
        ReconcileError::ParseFailed { detail } => assert!(!detail.is_empty()),
        other => panic!("expected ParseFailed, got {:?}", other),
    }
}

#[test]
fn questions_trailing_comma_after_last_object_fails_extraction() {
    let raw = r#"[{"id": 1, "text": "Q?", "expectedDuration": 60, "tips": "t"},]"#;
    assert_eq!(reconcile_questions(raw, 1).unwrap_err(), ReconcileError::ExtractionFailed);
}

#[test]
fn questions_count_mismatch_is_not_an_error() {
    assert_eq!(reconcile_questions(TWO_QUESTIONS, 5).unwrap().len(), 2);
    assert_eq!(reconcile_questions(TWO_QUESTIONS, 1).unwrap().len(), 2);
}

#[test]
fn questions_drop_malformed_elements_and_keep_the_rest() {
    let raw = r#"[
      {"id": 1, "text": "", "expectedDuration": 60, "tips": "t"},
      {"id": 2, "text": "Valid?", "expectedDuration": 75, "tips": "t"},
      {"id": "3", "text": "String id", "expectedDuration": 60, "tips": "t"},
      {"id": 4, "text": "No tips", "expectedDuration": 60}
    ]"#;
    let questions = reconcile_questions(raw, 4).unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].id, 2);
}

#[test]
fn questions_all_malformed_fail_validation_with_paths() {
    let raw = r#"[{"id": 1, "text": "   ", "expectedDuration": 60, "tips": "t"}, {"question": "wrong keys"}]"#;
    match reconcile_questions(raw, 2).unwrap_err() {
        ReconcileError::ValidationFailed { issues } => {
            assert!(issues.iter().any(|i| i.path == "$[0].text"));
            assert!(issues.iter().any(|i| i.path == "$[1].id"));
            assert!(issues.iter().any(|i| i.path == "$[1].tips"));
        }
        other => panic!("expected ValidationFailed, got {:?}", other),
    }
}

#[test]
fn questions_duplicate_ids_keep_first() {
    let raw = r#"[
      {"id": 1, "text": "First", "expectedDuration": 60, "tips": ""},
      {"id": 1, "text": "Second", "expectedDuration": 60, "tips": ""}
    ]"#;
    let questions = reconcile_questions(raw, 2).unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].text, "First");
}

#[test]
fn questions_accept_seconds_alias_and_keep_out_of_range_durations() {
    let raw = r#"[{"id": 7, "text": "Q", "expectedDurationSeconds": 300, "tips": ""}]"#;
    let questions = reconcile_questions(raw, 1).unwrap();
    assert_eq!(questions[0].expected_duration_secs, 300);
    assert!(!questions[0].duration_in_suggested_range());
}

#[test]
fn questions_trailing_bracket_noise_recovered_by_balanced_scan() {
    // The greedy span runs into the footnote and does not parse on its own.
    let raw = r#"[{"id": 1, "text": "Q?", "expectedDuration": 60, "tips": "t"}]
See also [{ "note" }]"#;
    let questions = reconcile_questions(raw, 1).unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].id, 1);
}

#[test]
fn questions_brackets_inside_strings_are_preserved() {
    let raw = r#"Sure: [{"id": 1, "text": "What does arr[0] = {x} do?", "expectedDuration": 60, "tips": "Mention [] and {}."}] done"#;
    let questions = reconcile_questions(raw, 1).unwrap();
    assert_eq!(questions[0].text, "What does arr[0] = {x} do?");
    assert_eq!(questions[0].tips, "Mention [] and {}.");
}

#[test]
fn questions_object_instead_of_array_fails_validation() {
    // The array pattern matches the nested list, which holds plain objects
    // of the wrong shape.
    let raw = r#"{"questions": [{"q": 1}]}"#;
    assert!(matches!(
        reconcile_questions(raw, 1),
        Err(ReconcileError::ValidationFailed { .. })
    ));
}

// ═══════════════════════════════════════════════════════════════════════════
//  ANALYSIS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn analysis_valid_object_takes_direct_path() {
    let outcome = reconcile_analysis_traced(VALID_ANALYSIS, &[question(1)]);
    assert_eq!(outcome.source, AnalysisSource::Direct);
    assert_eq!(outcome.result, expected_valid_analysis());
    assert_eq!(outcome.result.overall_score, 82.0);
    assert_eq!(outcome.result.categories.len(), 5);
    assert_eq!(outcome.result.question_analysis[0].key_points, vec!["k"]);
}

#[test]
fn analysis_fenced_object_takes_extraction_path() {
    let raw = format!("```json\n{}\n```", VALID_ANALYSIS);
    let outcome = reconcile_analysis_traced(&raw, &[question(1)]);
    assert_eq!(outcome.source, AnalysisSource::Extracted);
    assert_eq!(outcome.result, expected_valid_analysis());
}

#[test]
fn analysis_chatty_wrapper_takes_extraction_path() {
    let raw = format!(
        "Here is the analysis you asked for:\n{}\nLet me know if you need more.",
        VALID_ANALYSIS
    );
    let outcome = reconcile_analysis_traced(&raw, &[]);
    assert_eq!(outcome.source, AnalysisSource::Extracted);
    assert_eq!(outcome.result.overall_score, 82.0);
}

#[test]
fn analysis_garbage_falls_back_with_question_ids_in_order() {
    let questions = vec![question(3), question(1), question(2)];
    let outcome = reconcile_analysis_traced("totally not json", &questions);
    assert!(outcome.is_fallback());
    assert_eq!(outcome.result.overall_score, 50.0);
    let ids: Vec<u32> = outcome
        .result
        .question_analysis
        .iter()
        .map(|q| q.id)
        .collect();
    assert_eq!(ids, vec![3, 1, 2]);
}

#[test]
fn fallback_has_one_entry_per_question_regardless_of_input() {
    let questions = vec![question(1), question(2)];
    for raw in ["", "{", "}{", "```json\n```", "{\"overallScore\": \"high\"}"] {
        let result = reconcile_analysis(raw, &questions);
        assert_eq!(result.question_analysis.len(), 2, "input {:?}", raw);
        assert_eq!(result.question_analysis[0].id, 1);
        assert_eq!(result.question_analysis[1].id, 2);
    }
}

#[test]
fn fallback_content_is_the_fixed_placeholder() {
    let result = fallback_analysis(&[question(9)]);
    let names: Vec<&str> = result.categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ANALYSIS_CATEGORIES.to_vec());
    assert!(result.categories.iter().all(|c| c.score == FALLBACK_SCORE));
    assert_eq!(result.strengths, FALLBACK_STRENGTHS.to_vec());
    assert_eq!(result.improvements, FALLBACK_IMPROVEMENTS.to_vec());

    let entry = &result.question_analysis[0];
    assert_eq!(entry.id, 9);
    assert_eq!(entry.score, 50.0);
    assert_eq!(entry.strengths, vec!["Response provided"]);
    assert_eq!(entry.improvements, vec!["Analysis unavailable"]);
    assert_eq!(entry.time_assessment, "Analysis unavailable");
    assert_eq!(entry.key_points, vec!["Analysis unavailable"]);
}

#[test]
fn analysis_with_no_braces_reports_extraction_failure() {
    let outcome = reconcile_analysis_traced("no object here", &[]);
    assert_eq!(
        outcome.source,
        AnalysisSource::Fallback {
            reason: ReconcileError::ExtractionFailed
        }
    );
    assert!(outcome.result.question_analysis.is_empty());
}

#[test]
fn analysis_truncated_object_reports_parse_failure() {
    let truncated = &VALID_ANALYSIS[..VALID_ANALYSIS.len() / 2];
    let raw = format!("{} }}", truncated);
    let outcome = reconcile_analysis_traced(&raw, &[question(1)]);
    assert!(matches!(
        outcome.source,
        AnalysisSource::Fallback {
            reason: ReconcileError::ParseFailed { .. }
        }
    ));
}

#[test]
fn analysis_wrong_shape_falls_back_with_validation_reason() {
    let raw = r#"{"overallScore": 70, "categories": {}, "strengths": [], "improvements": []}"#;
    let outcome = reconcile_analysis_traced(raw, &[question(1)]);
    match outcome.source {
        AnalysisSource::Fallback {
            reason: ReconcileError::ValidationFailed { issues },
        } => {
            assert!(issues.iter().any(|i| i.path == "$.categories"));
            assert!(issues.iter().any(|i| i.path == "$.questionAnalysis"));
        }
        other => panic!("expected validation fallback, got {:?}", other),
    }
    assert_eq!(outcome.result.overall_score, 50.0);
}

#[test]
fn analysis_direct_parse_of_non_object_does_not_retry_extraction() {
    // Valid JSON but not an object: validation fails straight to fallback.
    let raw = format!("[{}]", VALID_ANALYSIS);
    let outcome = reconcile_analysis_traced(&raw, &[]);
    assert!(outcome.is_fallback());
}

#[test]
fn analysis_out_of_range_scores_pass_through() {
    let raw = VALID_ANALYSIS.replace("\"overallScore\":82", "\"overallScore\":150");
    let outcome = reconcile_analysis_traced(&raw, &[]);
    assert_eq!(outcome.source, AnalysisSource::Direct);
    assert_eq!(outcome.result.overall_score, 150.0);
}

#[test]
fn analysis_extra_fields_are_ignored() {
    let mut value: serde_json::Value = serde_json::from_str(VALID_ANALYSIS).unwrap();
    value["summary"] = json!("extra commentary");
    let result = validate_analysis(&value).unwrap();
    assert_eq!(result, expected_valid_analysis());
}

#[test]
fn analysis_question_entry_missing_key_points_is_kept() {
    let raw = r#"{"overallScore":88,"categories":[{"name":"Technical Knowledge","score":90}],"strengths":["depth"],"improvements":["pace"],"questionAnalysis":[{"id":1,"score":85,"strengths":["clear"],"improvements":["examples"],"timeAssessment":"on time"}]}"#;
    let outcome = reconcile_analysis_traced(raw, &[question(1)]);
    assert_eq!(outcome.source, AnalysisSource::Direct);
    assert_eq!(outcome.result.overall_score, 88.0);
    let entry = outcome.result.question(1).unwrap();
    assert_eq!(entry.score, 85.0);
    assert!(entry.key_points.is_empty());
    assert_eq!(entry.strengths, vec!["clear".to_string()]);
}

#[test]
fn analysis_category_with_string_score_is_dropped() {
    let raw = r#"{"overallScore":74,"categories":[{"name":"Technical Knowledge","score":"90"},{"name":"Problem Solving","score":70}],"strengths":[],"improvements":[],"questionAnalysis":[]}"#;
    let outcome = reconcile_analysis_traced(raw, &[question(1)]);
    assert_eq!(outcome.source, AnalysisSource::Direct);
    assert_eq!(outcome.result.overall_score, 74.0);
    let names: Vec<&str> = outcome.result.categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Problem Solving"]);
}

#[test]
fn analysis_unusable_elements_are_dropped_and_gaps_defaulted() {
    let value = json!({
        "overallScore": 60,
        "categories": [{"name": "Technical Knowledge", "score": "80"}, "oops", {"name": "Role Relevance", "score": 65}],
        "strengths": ["ok", 3],
        "improvements": ["ok"],
        "questionAnalysis": [
            {"id": 1, "score": 60, "strengths": [], "improvements": [], "keyPoints": []},
            {"id": "2", "score": 50},
            {"id": 3, "score": 40, "strengths": "fine", "keyPoints": ["k", null]}
        ]
    });
    let result = validate_analysis(&value).unwrap();
    assert_eq!(result.categories.len(), 1);
    assert_eq!(result.categories[0].name, "Role Relevance");
    assert_eq!(result.strengths, vec!["ok".to_string()]);

    let ids: Vec<u32> = result.question_analysis.iter().map(|q| q.id).collect();
    assert_eq!(ids, vec![1, 3]);
    assert_eq!(result.question_analysis[0].time_assessment, "");
    let third = &result.question_analysis[1];
    assert!(third.strengths.is_empty());
    assert!(third.improvements.is_empty());
    assert_eq!(third.key_points, vec!["k".to_string()]);
}

#[test]
fn analysis_top_level_violations_are_located() {
    let value = json!({"overallScore": "60", "categories": [], "strengths": [], "improvements": []});
    match validate_analysis(&value).unwrap_err() {
        ReconcileError::ValidationFailed { issues } => {
            let paths: Vec<&str> = issues.iter().map(|i| i.path.as_str()).collect();
            assert_eq!(paths, vec!["$.overallScore", "$.questionAnalysis"]);
        }
        other => panic!("expected ValidationFailed, got {:?}", other),
    }
}

#[test]
fn analysis_never_panics_on_hostile_input() {
    let questions = vec![question(1)];
    let long_noise = "{[\"".repeat(50_000);
    let binary: String = (0u8..=255).map(char::from).collect();
    let inputs = [
        String::new(),
        "\u{0}\u{1}\u{2}".to_string(),
        binary,
        long_noise,
        "}}}}{{{{".to_string(),
        "```json".to_string(),
        format!("{}{}", "a".repeat(1_000_000), VALID_ANALYSIS),
    ];
    for raw in &inputs {
        let result = reconcile_analysis(raw, &questions);
        assert_eq!(result.categories.len(), 5);
        assert!(!result.question_analysis.is_empty());
    }
}

#[test]
fn questions_never_panic_on_hostile_input() {
    let inputs = [
        "[{".repeat(20_000),
        "[{}]".to_string(),
        "[{\"id\": 99999999999}]".to_string(),
        "\u{feff}[{\"id\":1,\"text\":\"é\",\"expectedDuration\":60,\"tips\":\"ü\"}]".to_string(),
    ];
    for raw in &inputs {
        let _ = reconcile_questions(raw, 1);
    }
    let unicode = reconcile_questions(&inputs[3], 1).unwrap();
    assert_eq!(unicode[0].text, "é");
}

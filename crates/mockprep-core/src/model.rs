use crate::error::ModelError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The five scoring categories every analysis reports on, in display order.
pub const ANALYSIS_CATEGORIES: [&str; 5] = [
    "Technical Knowledge",
    "Communication Skills",
    "Problem Solving",
    "Role Relevance",
    "Overall Impression",
];

/// Suggested answer window the prompts ask the model to stay within.
pub const MIN_EXPECTED_DURATION_SECS: u32 = 60;
pub const MAX_EXPECTED_DURATION_SECS: u32 = 180;

/// What the interview-setup form collects before questions are generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewInfo {
    pub title: String,
    pub position: String,
    pub experience: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

impl InterviewInfo {
    pub fn generation_request(&self, desired_count: u32) -> Result<GenerationRequest, ModelError> {
        GenerationRequest::new(
            self.position.clone(),
            self.experience.clone(),
            self.description.clone(),
            desired_count,
        )
    }

    /// Company name for display, "Not specified" when the form left it blank.
    pub fn company_or_default(&self) -> &str {
        self.company
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or("Not specified")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub subject_role: String,
    pub experience_level: String,
    pub job_description: String,
    pub desired_count: u32,
}

impl GenerationRequest {
    pub fn new(
        subject_role: impl Into<String>,
        experience_level: impl Into<String>,
        job_description: impl Into<String>,
        desired_count: u32,
    ) -> Result<Self, ModelError> {
        if desired_count == 0 {
            return Err(ModelError::ZeroQuestionCount);
        }
        Ok(Self {
            subject_role: subject_role.into(),
            experience_level: experience_level.into(),
            job_description: job_description.into(),
            desired_count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub id: u32,
    pub text: String,
    #[serde(rename = "expectedDuration", alias = "expectedDurationSeconds")]
    pub expected_duration_secs: u32,
    pub tips: String,
}

impl GeneratedQuestion {
    /// Whether the model respected the suggested 60-180 second window.
    pub fn duration_in_suggested_range(&self) -> bool {
        (MIN_EXPECTED_DURATION_SECS..=MAX_EXPECTED_DURATION_SECS)
            .contains(&self.expected_duration_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: u32,
    #[serde(rename = "duration", alias = "durationSeconds")]
    pub duration_secs: u32,
    #[serde(default)]
    pub transcript: String,
}

impl AnswerRecord {
    pub fn has_transcript(&self) -> bool {
        !self.transcript.trim().is_empty()
    }
}

/// Answers keyed by the question they respond to.
///
/// Serialized as a plain list of records; when the list repeats a question id
/// the later record wins, matching a user re-recording an answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<AnswerRecord>", into = "Vec<AnswerRecord>")]
pub struct AnswerSheet {
    answers: BTreeMap<u32, AnswerRecord>,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: AnswerRecord) {
        self.answers.insert(record.question_id, record);
    }

    pub fn get(&self, question_id: u32) -> Option<&AnswerRecord> {
        self.answers.get(&question_id)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.answers.values().map(|a| u64::from(a.duration_secs)).sum()
    }
}

impl From<Vec<AnswerRecord>> for AnswerSheet {
    fn from(records: Vec<AnswerRecord>) -> Self {
        let mut sheet = AnswerSheet::new();
        for record in records {
            sheet.insert(record);
        }
        sheet
    }
}

impl From<AnswerSheet> for Vec<AnswerRecord> {
    fn from(sheet: AnswerSheet) -> Self {
        sheet.answers.into_values().collect()
    }
}

impl FromIterator<AnswerRecord> for AnswerSheet {
    fn from_iter<I: IntoIterator<Item = AnswerRecord>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub name: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalysis {
    pub id: u32,
    pub score: f64,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub time_assessment: String,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub overall_score: f64,
    pub categories: Vec<CategoryScore>,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub question_analysis: Vec<QuestionAnalysis>,
}

impl AnalysisResult {
    pub fn question(&self, id: u32) -> Option<&QuestionAnalysis> {
        self.question_analysis.iter().find(|q| q.id == id)
    }

    pub fn category(&self, name: &str) -> Option<&CategoryScore> {
        self.categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Everything a finished interview produces, ready to hand to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub info: InterviewInfo,
    pub questions: Vec<GeneratedQuestion>,
    pub answers: AnswerSheet,
    pub analysis: AnalysisResult,
    pub total_duration_minutes: u64,
}

impl InterviewReport {
    pub fn new(
        info: InterviewInfo,
        questions: Vec<GeneratedQuestion>,
        answers: AnswerSheet,
        analysis: AnalysisResult,
    ) -> Self {
        let total_duration_minutes = answers.total_duration_secs().div_ceil(60);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            info,
            questions,
            answers,
            analysis,
            total_duration_minutes,
        }
    }
}

use crate::text::truncate_middle;
use mockprep_core::{
    AnswerSheet, GeneratedQuestion, GenerationRequest, InterviewInfo, MAX_EXPECTED_DURATION_SECS,
    MIN_EXPECTED_DURATION_SECS,
};

/// Per-answer transcript cap inside the analysis prompt.
pub const MAX_TRANSCRIPT_CHARS: usize = 6_000;

const NO_ANSWER: &str = "No answer provided";

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT SHAPES
// ═══════════════════════════════════════════════════════════════════════════════

const QUESTION_ARRAY_EXAMPLE: &str = r#"[
  {
    "id": 1,
    "text": "Question text here?",
    "expectedDuration": 120,
    "tips": "Tips for answering this question effectively."
  },
  {
    "id": 2,
    "text": "Question text here?",
    "expectedDuration": 90,
    "tips": "Tips for answering this question effectively."
  }
]"#;

const ANALYSIS_OBJECT_EXAMPLE: &str = r#"{
  "overallScore": 75,
  "categories": [
    {"name": "Technical Knowledge", "score": 80},
    {"name": "Communication Skills", "score": 70},
    {"name": "Problem Solving", "score": 75},
    {"name": "Role Relevance", "score": 85},
    {"name": "Overall Impression", "score": 75}
  ],
  "strengths": [
    "Clear communication style",
    "Relevant experience mentioned",
    "Good understanding of role requirements"
  ],
  "improvements": [
    "Provide more specific examples",
    "Structure answers better using STAR method",
    "Expand on technical details"
  ],
  "questionAnalysis": [
    {
      "id": 1,
      "score": 75,
      "strengths": ["Good initial approach", "Clear thinking process"],
      "improvements": ["Need more specific examples", "Could be more structured"],
      "timeAssessment": "Appropriate duration for the response",
      "keyPoints": ["Mentioned key concepts", "Showed problem-solving approach"]
    }
  ]
}"#;

// ═══════════════════════════════════════════════════════════════════════════════
// PROMPTS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn question_generation_prompt(request: &GenerationRequest) -> String {
    format!(
        r#"Generate {count} interview questions for a {role} position that requires {experience} experience.

Job Description: {description}

For each question, include:
1. A challenging, open-ended interview question relevant to the position
2. The expected duration to answer in seconds (between {min}-{max} seconds)
3. Tips for the candidate on how to structure a good answer

Return the questions in a valid JSON array format exactly as shown below:
{example}

Number the questions with "id" starting at 1.
Do not include any explanations or additional text outside of the JSON array.
Ensure the questions are challenging and specific to the {role} role."#,
        count = request.desired_count,
        role = request.subject_role.trim(),
        experience = request.experience_level.trim(),
        description = request.job_description.trim(),
        min = MIN_EXPECTED_DURATION_SECS,
        max = MAX_EXPECTED_DURATION_SECS,
        example = QUESTION_ARRAY_EXAMPLE,
    )
}

pub fn answer_analysis_prompt(
    info: &InterviewInfo,
    questions: &[GeneratedQuestion],
    answers: &AnswerSheet,
) -> String {
    let mut prompt = format!(
        r#"You are an expert interviewer analyzing interview responses. You MUST return ONLY valid JSON with no additional text.

INTERVIEW DETAILS:
Position: {}
Experience Level: {}
Job Description: {}

QUESTIONS AND ANSWERS:
"#,
        info.position.trim(),
        info.experience.trim(),
        info.description.trim(),
    );

    for question in questions {
        let answer = answers.get(question.id);
        let duration = answer.map(|a| a.duration_secs).unwrap_or(0);
        let transcript = answer
            .filter(|a| a.has_transcript())
            .map(|a| truncate_middle(a.transcript.trim(), MAX_TRANSCRIPT_CHARS))
            .unwrap_or_else(|| NO_ANSWER.to_string());

        prompt.push_str(&format!(
            "\nQuestion {}: {}\nExpected Duration: {} seconds\nActual Duration: {} seconds\nAnswer: {}\n",
            question.id, question.text, question.expected_duration_secs, duration, transcript
        ));
    }

    prompt.push_str(
        "\nReturn ONLY this exact JSON structure with no extra text, with one \
         questionAnalysis entry per question above using the same ids:\n",
    );
    prompt.push_str(ANALYSIS_OBJECT_EXAMPLE);
    prompt
}

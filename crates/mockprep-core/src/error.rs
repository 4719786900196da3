use std::fmt;

/// Invalid values passed to model constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    ZeroQuestionCount,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::ZeroQuestionCount => write!(f, "desired question count must be at least 1"),
        }
    }
}

impl std::error::Error for ModelError {}

/// One schema violation, located by a JSON path such as `$[1].text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub path: String,
    pub problem: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.problem)
    }
}

/// Why a completion could not be turned into structured data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    /// No JSON-shaped substring in the completion.
    ExtractionFailed,
    /// A candidate was found but is not valid JSON.
    ParseFailed { detail: String },
    /// Valid JSON that does not have the required shape.
    ValidationFailed { issues: Vec<ValidationIssue> },
}

impl ReconcileError {
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::ExtractionFailed => "extraction_failed",
            ReconcileError::ParseFailed { .. } => "parse_failed",
            ReconcileError::ValidationFailed { .. } => "validation_failed",
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::ExtractionFailed => {
                write!(f, "Failed to extract valid JSON from AI response")
            }
            ReconcileError::ParseFailed { detail } => {
                write!(f, "Failed to parse AI response JSON: {}", detail)
            }
            ReconcileError::ValidationFailed { issues } => {
                write!(f, "AI response JSON has an unexpected shape")?;
                for (i, issue) in issues.iter().take(3).enumerate() {
                    let sep = if i == 0 { ": " } else { "; " };
                    write!(f, "{}{}", sep, issue)?;
                }
                if issues.len() > 3 {
                    write!(f, " ({} more)", issues.len() - 3)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ReconcileError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    MissingApiKey,
    Network,
    Timeout,
    RateLimited,
    Server,
    Auth,
    Refused,
    EmptyResponse,
    InvalidResponse,
}

impl ProviderErrorKind {
    /// Transient failures worth retrying with backoff.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ProviderErrorKind::Network
                | ProviderErrorKind::Timeout
                | ProviderErrorKind::RateLimited
                | ProviderErrorKind::Server
        )
    }
}

/// A failed completion call. Messages are already safe to show a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ProviderError {}

/// Failure of the interview-setup flow. Scoring never fails outward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterviewError {
    Provider(ProviderError),
    Reconcile(ReconcileError),
}

impl InterviewError {
    pub const USER_MESSAGE: &'static str = "Could not prepare the interview, please retry.";
}

impl fmt::Display for InterviewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterviewError::Provider(err) => write!(f, "{} ({})", Self::USER_MESSAGE, err),
            InterviewError::Reconcile(err) => write!(f, "{} ({})", Self::USER_MESSAGE, err),
        }
    }
}

impl std::error::Error for InterviewError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            InterviewError::Provider(err) => Some(err),
            InterviewError::Reconcile(err) => Some(err),
        }
    }
}

impl From<ProviderError> for InterviewError {
    fn from(err: ProviderError) -> Self {
        InterviewError::Provider(err)
    }
}

impl From<ReconcileError> for InterviewError {
    fn from(err: ReconcileError) -> Self {
        InterviewError::Reconcile(err)
    }
}

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wire shape the backend is instructed to honor. Every field is optional
/// at decode time; missing optional fields default instead of faulting.
#[derive(Debug, Deserialize)]
struct RawAnswer {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    follow_up_questions: Option<Vec<String>>,
}

/// Parsed result of one exchange. Produced fresh per exchange; only
/// `answer` flows back into the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredAnswer {
    pub answer: String,
    pub topic: Option<String>,
    pub follow_ups: Vec<String>,
}

impl StructuredAnswer {
    /// An exchange succeeded if and only if the answer is non-empty.
    /// Missing topic or follow-ups are valid, non-erroneous forms.
    pub fn is_success(&self) -> bool {
        !self.answer.is_empty()
    }
}

/// Strict decode of the raw backend text. Entries are trimmed; follow-up
/// questions beyond the requested count are preserved as-is.
pub fn parse_answer(raw: &str) -> Result<StructuredAnswer, ParseError> {
    let decoded: RawAnswer = serde_json::from_str(raw)?;

    let answer = decoded.answer.map(|a| a.trim().to_string()).unwrap_or_default();
    let topic = decoded
        .topic
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let follow_ups = decoded
        .follow_up_questions
        .unwrap_or_default()
        .into_iter()
        .map(|q| q.trim().to_string())
        .collect();

    Ok(StructuredAnswer {
        answer,
        topic,
        follow_ups,
    })
}

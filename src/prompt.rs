use crate::context::{ChatMessage, ConversationState};

/// Exact response template the backend is instructed to fill in. The parser
/// in `response.rs` depends on this schema.
pub const ANSWER_TEMPLATE: &str = r#"{"answer": "<YOUR_ANSWER>", "topic": "<TOPIC>", "follow_up_questions": ["<follow_up_question_1>", "<follow_up_question_2>", "<follow_up_question_3>", "<follow_up_question_4>", "<follow_up_question_5>", "<follow_up_question_6>"]}"#;

pub const FOLLOW_UPS_WITHOUT_TOPIC: usize = 5;
pub const FOLLOW_UPS_WITH_TOPIC: usize = 6;

/// One directive builder for every prompt variant, instead of per-variant
/// copies of the wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectiveParams {
    pub has_topic: bool,
    pub has_history: bool,
    pub follow_up_count: usize,
}

impl DirectiveParams {
    /// Derives the parameters for the next exchange. `state` is the
    /// conversation before the pending question is appended.
    pub fn for_state(state: &ConversationState) -> Self {
        let has_topic = state.topic().is_some();
        Self {
            has_topic,
            has_history: !state.is_empty(),
            follow_up_count: if has_topic {
                FOLLOW_UPS_WITH_TOPIC
            } else {
                FOLLOW_UPS_WITHOUT_TOPIC
            },
        }
    }
}

/// Builds the system directive text. Content depends on whether a topic is
/// tracked and whether history exists.
pub fn build_directive(params: &DirectiveParams, topic: Option<&str>) -> String {
    let mut directives = vec![
        "You are an AI research assistant that answers questions factually correct, \
the answers should lead to curiosity. Elaborate on the answers as much as possible. \
Here are your directives:"
            .to_string(),
        "1. Answer the user question.".to_string(),
    ];

    if params.has_topic {
        directives.push(
            "2. Come up with a topic that suits the latest 3 user questions, \
the topic should be short and descriptive."
                .to_string(),
        );
    }

    let number = if params.has_topic { 3 } else { 2 };
    let mut follow_up_directive = format!(
        "{number}. Create {} follow-up questions for your current answer.",
        params.follow_up_count
    );
    if let Some(topic) = topic.filter(|_| params.has_topic) {
        follow_up_directive.push_str(&format!(
            " Try and stay as close to the topic \"{topic}\" as possible, unless the \
user clearly changes interest. The 6th follow-up question should derive from the \
topic a bit, while still being related to the last user message."
        ));
    }
    directives.push(follow_up_directive);

    let mut parts = vec![directives.join("\n")];
    if params.has_history {
        parts.push(
            "Decrease repetition of answers and follow-up questions by analyzing the \
chat history. Also, stay away from repetitive follow-up questions in general."
                .to_string(),
        );
    }
    parts.push(format!(
        "IMPORTANT: Only respond in JSON formatting using the following template \
exactly:\n\n{ANSWER_TEMPLATE}"
    ));

    parts.join("\n\n")
}

/// Produces the ordered message sequence to send: directive first, then the
/// (already trimmed) history verbatim. The pending user question is expected
/// to be the last turn of `state`. No mutation, no side effects.
pub fn assemble(directive: &str, state: &ConversationState) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(state.len() + 1);
    messages.push(ChatMessage::system(directive));
    messages.extend(state.turns().iter().map(|t| t.to_message()));
    messages
}

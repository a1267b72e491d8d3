use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tokens::TokenEstimator;

/// Who authored a turn. Order of turns is the dialogue causality and is
/// sent to the backend verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Assistant => write!(f, "Assistant"),
        }
    }
}

/// One `{role, content}` pair on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// A single dialogue message. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn to_message(&self) -> ChatMessage {
        ChatMessage::new(self.role.as_str(), self.content.clone())
    }
}

/// The conversation owned by the session controller. Turns are append-only
/// and only appended after a successful exchange; a failed exchange never
/// touches this.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    turns: Vec<ConversationTurn>,
    topic: Option<String>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Carry-over semantics: an empty or absent topic never erases an
    /// established one.
    pub fn update_topic(&mut self, topic: Option<String>) {
        if let Some(topic) = topic {
            let trimmed = topic.trim();
            if !trimmed.is_empty() {
                self.topic = Some(trimmed.to_string());
            }
        }
    }

    /// Token cost of the serialized conversation plus the system directive,
    /// under the estimator's accounting rule.
    pub fn estimated_tokens(&self, estimator: &TokenEstimator, system_text: &str) -> usize {
        let mut total = estimator.count_message("system", system_text);
        for turn in &self.turns {
            total += estimator.count_message(turn.role.as_str(), &turn.content);
        }
        total + estimator.reply_primer()
    }

    /// Evicts oldest turns until the estimate fits `budget` or a single
    /// turn remains (the irreducible case is accepted as-is). The system
    /// directive is counted but never evicted. A no-op on compliant
    /// histories. Returns the number of evicted turns.
    pub fn trim_to_budget(
        &mut self,
        estimator: &TokenEstimator,
        budget: usize,
        system_text: &str,
    ) -> usize {
        let costs: Vec<usize> = self
            .turns
            .iter()
            .map(|t| estimator.count_message(t.role.as_str(), &t.content))
            .collect();
        let mut total = estimator.count_message("system", system_text)
            + costs.iter().sum::<usize>()
            + estimator.reply_primer();

        // Iterative on purpose: one eviction per step, bounded by history
        // length.
        let mut evicted = 0;
        while total > budget && self.turns.len() - evicted > 1 {
            total -= costs[evicted];
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(evicted, remaining_tokens = total, "trimmed history to budget");
            self.turns.drain(..evicted);
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> TokenEstimator {
        TokenEstimator::new("gpt-3.5-turbo").unwrap()
    }

    fn filled(contents: &[&str]) -> ConversationState {
        let mut state = ConversationState::new();
        for (i, content) in contents.iter().enumerate() {
            if i % 2 == 0 {
                state.push(ConversationTurn::user(*content));
            } else {
                state.push(ConversationTurn::assistant(*content));
            }
        }
        state
    }

    #[test]
    fn turns_keep_insertion_order() {
        let state = filled(&["one", "two", "three"]);
        let contents: Vec<&str> = state.turns().iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(state.turns()[0].role, Role::User);
        assert_eq!(state.turns()[1].role, Role::Assistant);
    }

    #[test]
    fn topic_carry_over() {
        let mut state = ConversationState::new();
        state.update_topic(Some("space".to_string()));
        assert_eq!(state.topic(), Some("space"));

        state.update_topic(None);
        assert_eq!(state.topic(), Some("space"));

        state.update_topic(Some("   ".to_string()));
        assert_eq!(state.topic(), Some("space"));

        state.update_topic(Some("rockets".to_string()));
        assert_eq!(state.topic(), Some("rockets"));
    }

    #[test]
    fn trim_respects_budget() {
        let est = estimator();
        let long = "entropy measures disorder in a thermodynamic system ".repeat(4);
        let mut state = filled(&[&long, &long, &long, &long, &long, &long]);

        let budget = 200;
        state.trim_to_budget(&est, budget, "answer factually");
        assert!(state.estimated_tokens(&est, "answer factually") <= budget);
        assert!(!state.is_empty());
    }

    #[test]
    fn trim_is_idempotent_on_compliant_history() {
        let est = estimator();
        let mut state = filled(&["short question", "short answer"]);
        let before: Vec<String> = state.turns().iter().map(|t| t.content.clone()).collect();

        let evicted = state.trim_to_budget(&est, 10_000, "directive");
        assert_eq!(evicted, 0);
        let after: Vec<String> = state.turns().iter().map(|t| t.content.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn trim_keeps_single_irreducible_turn() {
        let est = estimator();
        let huge = "a long sentence about the heat death of the universe ".repeat(50);
        let mut state = filled(&["old question", "old answer", &huge]);

        state.trim_to_budget(&est, 5, "directive");
        assert_eq!(state.len(), 1);
        assert_eq!(state.turns()[0].content, huge);
    }

    #[test]
    fn trim_evicts_oldest_first() {
        let est = estimator();
        let padding = "some moderately long filler text about stars ".repeat(3);
        let newest = "newest question";
        let mut state = filled(&[&padding, &padding, &padding, newest]);

        state.trim_to_budget(&est, 80, "directive");
        assert_eq!(
            state.turns().last().map(|t| t.content.as_str()),
            Some(newest)
        );
    }
}

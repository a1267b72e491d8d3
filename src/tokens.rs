use tiktoken_rs::{cl100k_base, CoreBPE};

use crate::config::ConfigError;
use crate::context::ChatMessage;

/// Model ids the estimator knows accounting constants for, with their
/// family. The single lookup table: `for_model` consults it and the
/// unsupported-model error lists it. Anything else is rejected at startup
/// instead of being mis-estimated silently.
pub const SUPPORTED_MODELS: &[(&str, ModelFamily)] = &[
    ("gpt-3.5-turbo", ModelFamily::Gpt35),
    ("gpt-3.5-turbo-0301", ModelFamily::Gpt35),
    ("gpt-3.5-turbo-16k", ModelFamily::Gpt35),
    ("gpt-4", ModelFamily::Gpt4),
    ("gpt-4-0613", ModelFamily::Gpt4),
    ("gpt-4-32k", ModelFamily::Gpt4),
    ("gpt-4-turbo", ModelFamily::Gpt4),
    ("gpt-4o", ModelFamily::Gpt4),
];

pub fn supported_model_ids() -> Vec<&'static str> {
    SUPPORTED_MODELS.iter().map(|(id, _)| *id).collect()
}

/// Backend families with distinct per-message priming constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFamily {
    Gpt35,
    Gpt4,
}

impl ModelFamily {
    /// Exact-match lookup against [`SUPPORTED_MODELS`]; unknown ids fail
    /// closed.
    pub fn for_model(model: &str) -> Result<Self, ConfigError> {
        SUPPORTED_MODELS
            .iter()
            .find(|(id, _)| *id == model)
            .map(|(_, family)| *family)
            .ok_or_else(|| ConfigError::UnsupportedModel {
                model: model.to_string(),
                supported: supported_model_ids().join(", "),
            })
    }

    /// Priming tokens charged per message by the chat wire format.
    fn tokens_per_message(self) -> usize {
        match self {
            ModelFamily::Gpt35 => 4,
            ModelFamily::Gpt4 => 3,
        }
    }
}

/// Counts backend tokens for an ordered message sequence. Counting is
/// additive per message, so appending content never decreases the total.
pub struct TokenEstimator {
    bpe: CoreBPE,
    family: ModelFamily,
}

impl TokenEstimator {
    pub fn new(model: &str) -> Result<Self, ConfigError> {
        let family = ModelFamily::for_model(model)?;
        let bpe = cl100k_base().map_err(|e| ConfigError::Tokenizer(e.to_string()))?;
        Ok(Self { bpe, family })
    }

    pub fn family(&self) -> ModelFamily {
        self.family
    }

    /// Tokens charged once per request for the backend's reply priming.
    pub fn reply_primer(&self) -> usize {
        3
    }

    pub fn count_text(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Cost of a single message: priming plus role plus content.
    pub fn count_message(&self, role: &str, content: &str) -> usize {
        self.family.tokens_per_message() + self.count_text(role) + self.count_text(content)
    }

    /// Cost of a full outbound prompt, including the reply primer.
    pub fn count_prompt(&self, messages: &[ChatMessage]) -> usize {
        messages
            .iter()
            .map(|m| self.count_message(&m.role, &m.content))
            .sum::<usize>()
            + self.reply_primer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_lookup_is_exact_match() {
        assert_eq!(
            ModelFamily::for_model("gpt-3.5-turbo").unwrap(),
            ModelFamily::Gpt35
        );
        assert_eq!(ModelFamily::for_model("gpt-4o").unwrap(), ModelFamily::Gpt4);
    }

    #[test]
    fn unknown_model_fails_closed() {
        let err = ModelFamily::for_model("gpt-5-nano").unwrap_err();
        assert!(
            matches!(err, ConfigError::UnsupportedModel { ref model, .. } if model == "gpt-5-nano")
        );
        // The error surfaces the table so the user can pick a valid id.
        assert!(err.to_string().contains("gpt-3.5-turbo"));
        assert!(err.to_string().contains("gpt-4o"));

        // Prefix similarity is not enough.
        assert!(ModelFamily::for_model("gpt-4o-mini").is_err());
        assert!(ModelFamily::for_model("").is_err());
    }

    #[test]
    fn every_table_entry_resolves_to_its_family() {
        for (model, family) in SUPPORTED_MODELS {
            assert_eq!(ModelFamily::for_model(model).unwrap(), *family);
            assert_eq!(TokenEstimator::new(model).unwrap().family(), *family);
        }
    }

    #[test]
    fn counting_is_monotonic_when_appending() {
        let est = TokenEstimator::new("gpt-3.5-turbo").unwrap();
        let mut messages = Vec::new();
        let mut previous = est.count_prompt(&messages);
        for i in 0..10 {
            messages.push(ChatMessage::new("user", format!("question number {i}")));
            let current = est.count_prompt(&messages);
            assert!(current > previous);
            previous = current;
        }
    }

    #[test]
    fn families_charge_different_priming() {
        let gpt35 = TokenEstimator::new("gpt-3.5-turbo").unwrap();
        let gpt4 = TokenEstimator::new("gpt-4").unwrap();
        let messages = vec![
            ChatMessage::system("directive"),
            ChatMessage::new("user", "what is entropy?"),
        ];
        // Same BPE, so the counts differ by exactly one priming token per
        // message.
        assert_eq!(
            gpt35.count_prompt(&messages),
            gpt4.count_prompt(&messages) + messages.len()
        );
    }

    #[test]
    fn empty_prompt_still_charges_reply_primer() {
        let est = TokenEstimator::new("gpt-4").unwrap();
        assert_eq!(est.count_prompt(&[]), est.reply_primer());
    }
}

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::context::{ConversationState, ConversationTurn};
use crate::llm_client::{CompletionClient, LlmError};
use crate::prompt::{assemble, build_directive, DirectiveParams};
use crate::response::{parse_answer, ParseError, StructuredAnswer};
use crate::tokens::TokenEstimator;
use crate::transcript::TranscriptWriter;

/// Case-insensitive input that ends the session from any state.
pub const EXIT_SENTINEL: &str = "exit";

pub const FAILURE_MESSAGE: &str =
    "Sorry, I couldn't find an answer to your question. Try another one.";

/// Everything that can go wrong inside one exchange. All variants are
/// caught at the exchange boundary and become the `Failed` transition;
/// none propagate past the controller.
#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("request failed: {0}")]
    Request(#[from] LlmError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("backend returned an empty answer")]
    EmptyAnswer,
}

/// Rendering seam. The CLI implementation prints colored lines; tests
/// record the calls instead.
#[async_trait]
pub trait SessionOutput: Send + Sync {
    async fn answer(&self, text: &str);
    async fn follow_ups(&self, options: &[String]);
    async fn failure(&self, text: &str);
    async fn notice(&self, text: &str);
    async fn thinking_started(&self) {}
    async fn thinking_finished(&self) {}
}

/// Where the read loop stands between inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    AwaitingQuestion,
    AwaitingSelection { options: Vec<String> },
    Exiting,
}

pub fn is_exit(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case(EXIT_SENTINEL)
}

/// Maps a selection-prompt input to the next question. In-range 1-based
/// integers pick that follow-up verbatim; everything else, out-of-range
/// integers included, is the literal next question.
pub fn resolve_selection(input: &str, options: &[String]) -> String {
    let trimmed = input.trim();
    if let Ok(n) = trimmed.parse::<usize>() {
        if n >= 1 && n <= options.len() {
            return options[n - 1].clone();
        }
    }
    trimmed.to_string()
}

pub struct SessionController {
    client: Arc<dyn CompletionClient>,
    estimator: TokenEstimator,
    output: Arc<dyn SessionOutput>,
    transcript: Option<TranscriptWriter>,
    conversation: ConversationState,
    state: SessionState,
    max_history_tokens: usize,
    debug: bool,
}

impl SessionController {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        estimator: TokenEstimator,
        output: Arc<dyn SessionOutput>,
        transcript: Option<TranscriptWriter>,
        max_history_tokens: usize,
        debug: bool,
    ) -> Self {
        Self {
            client,
            estimator,
            output,
            transcript,
            conversation: ConversationState::new(),
            state: SessionState::AwaitingQuestion,
            max_history_tokens,
            debug,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    /// Terminates the loop without further backend calls (exit sentinel or
    /// interrupt).
    pub fn request_exit(&mut self) {
        self.state = SessionState::Exiting;
    }

    /// The read-loop prompt matching the current state.
    pub fn prompt_text(&self) -> String {
        match &self.state {
            SessionState::AwaitingSelection { options } => format!(
                "\nChoose a follow-up question by entering the corresponding number \
(1-{}) or type a custom question (type 'exit' to quit):\n",
                options.len()
            ),
            _ if self.conversation.is_empty() => {
                "\nEnter a question or type 'exit' to quit:\n".to_string()
            }
            _ => "\nAsk a follow-up question:\n".to_string(),
        }
    }

    /// Drives one iteration of the state machine from one line of input.
    pub async fn handle_input(&mut self, input: &str) {
        let input = input.trim();
        if input.is_empty() {
            return;
        }
        if is_exit(input) {
            self.state = SessionState::Exiting;
            return;
        }

        let question = match &self.state {
            SessionState::AwaitingSelection { options } => resolve_selection(input, options),
            _ => input.to_string(),
        };

        match self.exchange(&question).await {
            Ok(answer) => {
                self.output.answer(&answer.answer).await;
                if answer.follow_ups.is_empty() {
                    self.state = SessionState::AwaitingQuestion;
                } else {
                    self.output.follow_ups(&answer.follow_ups).await;
                    self.state = SessionState::AwaitingSelection {
                        options: answer.follow_ups,
                    };
                }
            }
            Err(e) => {
                tracing::warn!("exchange failed: {e}");
                self.output.failure(FAILURE_MESSAGE).await;
                self.state = SessionState::AwaitingQuestion;
            }
        }
    }

    /// One full exchange. Works on a copy of the conversation and commits
    /// it only on success, so every failure leaves the state exactly as it
    /// was (neither the question nor a partial answer is kept).
    async fn exchange(&mut self, question: &str) -> Result<StructuredAnswer, ExchangeError> {
        let params = DirectiveParams::for_state(&self.conversation);
        let directive = build_directive(&params, self.conversation.topic());

        let mut working = self.conversation.clone();
        working.push(ConversationTurn::user(question));
        working.trim_to_budget(&self.estimator, self.max_history_tokens, &directive);

        let messages = assemble(&directive, &working);
        if self.debug {
            match serde_json::to_string_pretty(&messages) {
                Ok(dump) => tracing::debug!("outbound prompt: {dump}"),
                Err(e) => tracing::debug!("outbound prompt not serializable: {e}"),
            }
        }

        self.output.thinking_started().await;
        let raw = self.client.complete(&messages).await;
        self.output.thinking_finished().await;
        let raw = raw?;

        let parsed = match parse_answer(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                if self.debug {
                    self.output
                        .notice(&format!(
                            "Could not parse response answer, topic or options from: {raw}"
                        ))
                        .await;
                }
                return Err(e.into());
            }
        };
        tracing::debug!(topic = ?parsed.topic, "current topic");
        if self.debug
            && (!parsed.is_success() || parsed.topic.is_none() || parsed.follow_ups.is_empty())
        {
            self.output
                .notice(&format!(
                    "Could not parse response answer, topic or options from: {raw}"
                ))
                .await;
        }
        if !parsed.is_success() {
            return Err(ExchangeError::EmptyAnswer);
        }

        working.push(ConversationTurn::assistant(&parsed.answer));
        working.update_topic(parsed.topic.clone());
        if let Some(transcript) = &self.transcript {
            let appended = &working.turns()[working.len() - 2..];
            transcript.append(appended);
        }
        self.conversation = working;

        Ok(parsed)
    }
}

//! Conversational assistant over a chat-completion backend.
//!
//! Keeps an in-memory ChatML history seeded with a system prompt. The
//! history is capped: the system message always survives, older turns are
//! dropped first. Transport faults are retried up to three times with a
//! linear backoff before the turn fails.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AppError, Result};

const ATTEMPTS: u32 = 3;
const BACKOFF_STEP: Duration = Duration::from_millis(600);

/// One ChatML message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Produces one completion for a message history.
pub trait ChatTransport: Send {
    fn complete(&mut self, messages: &[ChatMessage]) -> Result<String>;
}

pub struct Assistant {
    transport: Box<dyn ChatTransport>,
    history: Vec<ChatMessage>,
    /// Maximum history length in messages, system message included.
    max_turns: usize,
    backoff_step: Duration,
}

impl Assistant {
    pub fn new(transport: Box<dyn ChatTransport>, system_prompt: &str, max_turns: usize) -> Self {
        Self {
            transport,
            history: vec![ChatMessage::system(system_prompt)],
            max_turns: max_turns.max(2),
            backoff_step: BACKOFF_STEP,
        }
    }

    /// Override the retry backoff step (tests use zero).
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Send one user turn and return the assistant's reply.
    ///
    /// The user message enters the history before the request, so a later
    /// retry or follow-up sees it; the reply is trimmed and appended on
    /// success.
    pub fn chat(&mut self, user_text: &str) -> Result<String> {
        self.history.push(ChatMessage::user(user_text));
        self.trim_history();

        let mut last_err = None;
        for attempt in 0..ATTEMPTS {
            if attempt > 0 {
                thread::sleep(self.backoff_step * attempt);
            }
            match self.transport.complete(&self.history) {
                Ok(reply) => {
                    let reply = reply.trim().to_owned();
                    debug!(turns = self.history.len(), "chat turn completed");
                    self.history.push(ChatMessage::assistant(&reply));
                    return Ok(reply);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "chat attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AppError::Chat("no completion attempts ran".into())))
    }

    /// Drop everything except the system message.
    pub fn clear_history(&mut self) {
        self.history.truncate(1);
    }

    /// Keep the system message plus the most recent messages.
    fn trim_history(&mut self) {
        if self.history.len() > self.max_turns {
            let keep_from = self.history.len() - (self.max_turns - 1);
            self.history.drain(1..keep_from);
        }
    }
}

/// OpenAI chat-completions transport.
pub struct OpenAiChat {
    client: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_completion_tokens: u32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_completion_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

impl OpenAiChat {
    pub fn new(api_key: String, base_url: String, model: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_key,
            base_url,
            model,
            max_completion_tokens: 300,
        }
    }
}

impl ChatTransport for OpenAiChat {
    fn complete(&mut self, messages: &[ChatMessage]) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&CompletionRequest {
                model: &self.model,
                messages,
                max_completion_tokens: self.max_completion_tokens,
            })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AppError::Chat(format!("HTTP {status}: {body}")));
        }

        let completion: CompletionResponse = response.json()?;
        let reply = completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if reply.is_empty() {
            return Err(AppError::Chat("empty completion".into()));
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedTransport {
        replies: VecDeque<Result<String>>,
        calls: usize,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies: replies.into(),
                calls: 0,
            }
        }
    }

    impl ChatTransport for ScriptedTransport {
        fn complete(&mut self, _messages: &[ChatMessage]) -> Result<String> {
            self.calls += 1;
            self.replies
                .pop_front()
                .unwrap_or_else(|| Err(AppError::Chat("script exhausted".into())))
        }
    }

    fn assistant_with(replies: Vec<Result<String>>) -> Assistant {
        Assistant::new(
            Box::new(ScriptedTransport::new(replies)),
            "be brief",
            12,
        )
        .with_backoff_step(Duration::ZERO)
    }

    #[test]
    fn reply_is_trimmed_and_recorded_in_history() {
        let mut assistant = assistant_with(vec![Ok("  the answer  ".into())]);
        let reply = assistant.chat("question").unwrap();

        assert_eq!(reply, "the answer");
        assert_eq!(
            assistant.history(),
            &[
                ChatMessage::system("be brief"),
                ChatMessage::user("question"),
                ChatMessage::assistant("the answer"),
            ]
        );
    }

    #[test]
    fn retries_after_transient_failures() {
        let mut assistant = assistant_with(vec![
            Err(AppError::Chat("timeout".into())),
            Err(AppError::Chat("timeout".into())),
            Ok("finally".into()),
        ]);
        assert_eq!(assistant.chat("question").unwrap(), "finally");
    }

    #[test]
    fn gives_up_after_three_attempts() {
        let mut assistant = assistant_with(vec![
            Err(AppError::Chat("down".into())),
            Err(AppError::Chat("down".into())),
            Err(AppError::Chat("down".into())),
            Ok("never reached".into()),
        ]);
        assert!(assistant.chat("question").is_err());
    }

    #[test]
    fn history_is_capped_keeping_the_system_message() {
        let replies: Vec<Result<String>> = (0..20).map(|i| Ok(format!("reply {i}"))).collect();
        let mut assistant = Assistant::new(
            Box::new(ScriptedTransport::new(replies)),
            "be brief",
            6,
        )
        .with_backoff_step(Duration::ZERO);

        for i in 0..10 {
            assistant.chat(&format!("question {i}")).unwrap();
        }

        let history = assistant.history();
        assert!(history.len() <= 7); // system + cap, reply appended after trim
        assert_eq!(history[0], ChatMessage::system("be brief"));
        // The newest turn always survives.
        assert_eq!(history.last().unwrap(), &ChatMessage::assistant("reply 9"));
    }

    #[test]
    fn clear_history_keeps_only_the_system_message() {
        let mut assistant = assistant_with(vec![Ok("reply".into())]);
        assistant.chat("question").unwrap();
        assistant.clear_history();
        assert_eq!(assistant.history(), &[ChatMessage::system("be brief")]);
    }
}

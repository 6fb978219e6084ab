// ============================================
// chat.rs - Chat assistant session
// ============================================

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::Diagnostician;
use crate::export::{escape_csv_field, iso_timestamp};

pub const CHAT_CSV_HEADERS: [&str; 5] = ["prompt", "Answer", "OutputToken", "InputToken", "Time"];

/// One model answer with its usage figures.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatReply {
    pub answer: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Wall-clock seconds spent waiting for the answer.
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

/// The last completed exchange, kept for CSV export.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResult {
    pub prompt: String,
    pub answer: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub elapsed_secs: f64,
}

impl ChatResult {
    fn new(prompt: &str, reply: &ChatReply) -> Self {
        Self {
            prompt: prompt.to_string(),
            answer: reply.answer.clone(),
            input_tokens: reply.input_tokens,
            output_tokens: reply.output_tokens,
            elapsed_secs: reply.elapsed_secs,
        }
    }
}

pub fn chat_result_to_csv(result: &ChatResult) -> String {
    let row = [
        escape_csv_field(&result.prompt),
        escape_csv_field(&result.answer),
        result.output_tokens.to_string(),
        result.input_tokens.to_string(),
        format!("{:.4}", result.elapsed_secs),
    ];
    format!("{}\n{}", CHAT_CSV_HEADERS.join(","), row.join(","))
}

/// `ai-chat-response-<ISO timestamp>.csv`, with `:` replaced so the name is
/// valid on every filesystem.
pub fn chat_csv_filename(at: DateTime<Utc>) -> String {
    format!("ai-chat-response-{}.csv", iso_timestamp(at).replace(':', "-"))
}

#[derive(Debug, Default)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    last_result: Option<ChatResult>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last_result(&self) -> Option<&ChatResult> {
        self.last_result.as_ref()
    }

    /// Send a prompt. Blank prompts are ignored (`Ok(None)`). The user
    /// message stays in the transcript even when the call fails.
    pub async fn send<D: Diagnostician + ?Sized>(
        &mut self,
        backend: &D,
        prompt: &str,
    ) -> Result<Option<ChatReply>> {
        if prompt.trim().is_empty() {
            return Ok(None);
        }

        self.messages.push(ChatMessage {
            role: Role::User,
            text: prompt.to_string(),
        });
        self.last_result = None;

        let reply = backend.chat(prompt).await?;
        debug!(
            "Chat reply: {} input tokens, {} output tokens, {:.2}s",
            reply.input_tokens, reply.output_tokens, reply.elapsed_secs
        );

        self.messages.push(ChatMessage {
            role: Role::Model,
            text: reply.answer.clone(),
        });
        self.last_result = Some(ChatResult::new(prompt, &reply));

        Ok(Some(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::MockDiagnostician;
    use chrono::TimeZone;

    fn reply(answer: &str) -> ChatReply {
        ChatReply {
            answer: answer.to_string(),
            input_tokens: 12,
            output_tokens: 34,
            elapsed_secs: 1.23456,
        }
    }

    #[tokio::test]
    async fn test_send_records_exchange() {
        let mut backend = MockDiagnostician::new();
        backend
            .expect_chat()
            .withf(|prompt| prompt == "How do I treat rust?")
            .times(1)
            .returning(|_| Ok(reply("Remove infected leaves.")));

        let mut session = ChatSession::new();
        let answer = session
            .send(&backend, "How do I treat rust?")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(answer.answer, "Remove infected leaves.");
        assert_eq!(session.messages().len(), 2);
        assert_eq!(session.messages()[1].role, Role::Model);
        assert_eq!(session.last_result().unwrap().prompt, "How do I treat rust?");
    }

    #[tokio::test]
    async fn test_blank_prompt_ignored() {
        let mut backend = MockDiagnostician::new();
        backend.expect_chat().never();

        let mut session = ChatSession::new();
        assert!(session.send(&backend, "   ").await.unwrap().is_none());
        assert!(session.messages().is_empty());
    }

    #[tokio::test]
    async fn test_failed_call_keeps_user_message() {
        let mut backend = MockDiagnostician::new();
        backend
            .expect_chat()
            .returning(|_| Err(anyhow::anyhow!("network down")));

        let mut session = ChatSession::new();
        assert!(session.send(&backend, "hello").await.is_err());
        assert_eq!(
            session.messages(),
            &[ChatMessage {
                role: Role::User,
                text: "hello".to_string()
            }]
        );
        assert!(session.last_result().is_none());
    }

    #[test]
    fn test_chat_csv() {
        let result = ChatResult::new("Why, though?", &reply("Because \"fungus\"."));
        assert_eq!(
            chat_result_to_csv(&result),
            "prompt,Answer,OutputToken,InputToken,Time\n\"Why, though?\",\"Because \"\"fungus\"\".\",34,12,1.2346"
        );
    }

    #[test]
    fn test_chat_csv_filename() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(chat_csv_filename(at), "ai-chat-response-2024-05-01T09-30-00.000Z.csv");
    }
}

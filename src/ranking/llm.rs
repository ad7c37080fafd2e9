//! Language-model ranking backend.
//!
//! Sends the policy, the reference time and the task list to a chat model
//! and reads back the reordered list.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use super::{RankingCapability, RankingError, RankingRequest};
use crate::llm::{ChatMessage, ChatOptions, LlmClient};
use crate::prioritizer::policy::{build_user_prompt, SYSTEM_PROMPT};
use crate::task::{PriorityLabel, TaskDescriptor, TaskId};

const MAX_LOG_CHARS: usize = 4_000;

#[derive(Debug, Clone)]
pub struct LlmRankerConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u64>,
}

impl Default for LlmRankerConfig {
    fn default() -> Self {
        Self {
            model: "google/gemini-2.0-flash-001".to_string(),
            temperature: 0.2,
            max_tokens: None,
        }
    }
}

pub struct LlmRanker {
    client: Arc<dyn LlmClient>,
    config: LlmRankerConfig,
}

impl LlmRanker {
    pub fn new(client: Arc<dyn LlmClient>, config: LlmRankerConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl RankingCapability for LlmRanker {
    fn name(&self) -> &str {
        "llm"
    }

    async fn rank(&self, request: RankingRequest) -> Result<Vec<TaskDescriptor>, RankingError> {
        let user = build_user_prompt(&request.policy, &request.tasks, request.now);
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(prompt = %truncate_for_log(&user, MAX_LOG_CHARS), "ranking prompt");
        }

        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)];
        let options = ChatOptions {
            temperature: Some(self.config.temperature),
            max_tokens: self.config.max_tokens,
            json_response: true,
        };

        let response = self
            .client
            .chat_completion(&self.config.model, &messages, options)
            .await
            .map_err(|e| RankingError::Unavailable(e.to_string()))?;

        if let Some(usage) = &response.usage {
            info!(
                model = %self.config.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "ranking completion received"
            );
        }

        let content = response
            .content
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| RankingError::Unusable("empty completion".to_string()))?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            debug!(output = %truncate_for_log(&content, MAX_LOG_CHARS), "ranking raw output");
        }

        parse_ranked_tasks(&content)
    }
}

/// Read the reordered list out of a model answer.
///
/// Accepts a bare array or a `{"tasks": [...]}` object, optionally wrapped in
/// prose or markdown fences. Entries are read leniently: a missing or
/// non-string `id` yields an empty identity for the validator to reject,
/// and unparseable optional fields are dropped.
pub(crate) fn parse_ranked_tasks(content: &str) -> Result<Vec<TaskDescriptor>, RankingError> {
    let entries = extract_task_array(content)
        .ok_or_else(|| RankingError::Unusable("answer did not contain a task list".to_string()))?;
    Ok(entries.iter().map(descriptor_from_value).collect())
}

fn extract_task_array(content: &str) -> Option<Vec<serde_json::Value>> {
    let trimmed = content.trim();
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(entries) = unwrap_task_array(value) {
            return Some(entries);
        }
    }

    // Prose or fenced output: try the outermost object, then the outermost array.
    for (open, close) in [('{', '}'), ('[', ']')] {
        let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) else {
            continue;
        };
        if end <= start {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end]) {
            if let Some(entries) = unwrap_task_array(value) {
                return Some(entries);
            }
        }
    }
    None
}

fn unwrap_task_array(value: serde_json::Value) -> Option<Vec<serde_json::Value>> {
    match value {
        serde_json::Value::Array(entries) => Some(entries),
        serde_json::Value::Object(mut map) => match map.remove("tasks") {
            Some(serde_json::Value::Array(entries)) => Some(entries),
            _ => None,
        },
        _ => None,
    }
}

fn descriptor_from_value(value: &serde_json::Value) -> TaskDescriptor {
    let id = match &value["id"] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    TaskDescriptor {
        id: TaskId::from(id),
        title: value["title"].as_str().unwrap_or_default().to_string(),
        deadline: value["deadline"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc)),
        priority: value["priority"].as_str().and_then(PriorityLabel::parse),
        description: value["description"].as_str().map(str::to_string),
    }
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatResponse, LlmError};
    use crate::prioritizer::policy::{render_task_list, RANKING_POLICY};
    use chrono::TimeZone;
    use std::sync::Mutex;

    struct CannedClient {
        reply: Result<Option<String>, LlmError>,
        seen: Mutex<Vec<ChatMessage>>,
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            options: ChatOptions,
        ) -> Result<ChatResponse, LlmError> {
            assert!(options.json_response);
            self.seen.lock().unwrap().extend_from_slice(messages);
            self.reply.clone().map(|content| ChatResponse {
                content,
                ..Default::default()
            })
        }
    }

    fn ranker(reply: Result<Option<String>, LlmError>) -> (LlmRanker, Arc<CannedClient>) {
        let client = Arc::new(CannedClient {
            reply,
            seen: Mutex::new(Vec::new()),
        });
        (
            LlmRanker::new(client.clone(), LlmRankerConfig::default()),
            client,
        )
    }

    fn request() -> RankingRequest {
        RankingRequest {
            tasks: vec![
                TaskDescriptor::new("a", "Reply to email"),
                TaskDescriptor::new("b", "Write report"),
            ],
            policy: RANKING_POLICY.to_string(),
            now: Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn reads_wrapped_task_list() {
        let reply = r#"{"tasks": [{"id": "b", "title": "Write report"}, {"id": "a", "title": "Reply to email"}]}"#;
        let (ranker, client) = ranker(Ok(Some(reply.to_string())));
        let ranked = ranker.rank(request()).await.unwrap();
        let ids: Vec<&str> = ranked.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].content.contains("2026-05-01T09:00:00Z"));
    }

    #[test]
    fn reads_fenced_bare_array() {
        let reply = "Here you go:\n```json\n[{\"id\": \"a\", \"title\": \"x\", \"priority\": \"High\"}]\n```";
        let ranked = parse_ranked_tasks(reply).unwrap();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].priority, Some(PriorityLabel::High));
    }

    #[test]
    fn verbatim_echo_of_prompt_list_matches_input() {
        let due = Utc.with_ymd_and_hms(2026, 5, 1, 17, 0, 0).unwrap()
            + chrono::Duration::milliseconds(123);
        let tasks = vec![
            TaskDescriptor::new("a", "Send invoice")
                .with_deadline(due)
                .with_priority(PriorityLabel::High)
                .with_description("client X"),
            TaskDescriptor::new("b", "Water plants"),
        ];
        let echoed = render_task_list(&tasks);
        assert_eq!(parse_ranked_tasks(&echoed).unwrap(), tasks);
    }

    #[test]
    fn missing_id_becomes_empty_identity() {
        let ranked = parse_ranked_tasks(r#"[{"title": "orphan"}, {"id": 7, "title": "n"}]"#).unwrap();
        assert!(ranked[0].id.is_empty());
        assert_eq!(ranked[1].id.as_str(), "7");
    }

    #[test]
    fn prose_without_list_is_unusable() {
        assert!(matches!(
            parse_ranked_tasks("I cannot help with that."),
            Err(RankingError::Unusable(_))
        ));
        assert!(matches!(
            parse_ranked_tasks(r#"{"result": "done"}"#),
            Err(RankingError::Unusable(_))
        ));
    }

    #[tokio::test]
    async fn transport_failure_is_unavailable() {
        let (ranker, _) = ranker(Err(LlmError::network_error("connection refused".into())));
        assert!(matches!(
            ranker.rank(request()).await,
            Err(RankingError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn blank_completion_is_unusable() {
        let (ranker, _) = ranker(Ok(Some("   ".into())));
        assert!(matches!(
            ranker.rank(request()).await,
            Err(RankingError::Unusable(_))
        ));
    }
}

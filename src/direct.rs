//! Instagram Direct conversations.
//!
//! `total_count` always equals the number of stored messages. Inbound messages
//! raise `unread_count` until staff mark the conversation read.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{EngagementError, Result};
use crate::models::{new_id, ConversationStatus, DirectConversation, DirectMessage, ReplySuggestion, Sender};
use crate::store::{collections, RecordStore};
use crate::validation::InputValidator;

/// Reply suggestions shown per conversation
pub const MAX_REPLY_SUGGESTIONS: usize = 3;

/// Parse stored AI reply suggestions.
///
/// The stored value may be JSON text, possibly stringified twice. An object
/// maps to `(key, text)` pairs; an array maps items with `id`/`texto`, falling
/// back to positional ids `sugestao_N`. Any other shape yields no suggestions.
#[must_use]
pub fn parse_reply_suggestions(raw: &Value) -> Vec<ReplySuggestion> {
    let mut value = raw.clone();
    for _ in 0..2 {
        let Value::String(text) = &value else { break };
        match serde_json::from_str::<Value>(text) {
            Ok(decoded) => value = decoded,
            Err(e) => {
                debug!(error = %e, "Discarding unparseable reply suggestions");
                return Vec::new();
            }
        }
    }

    match value {
        Value::Object(entries) => entries
            .into_iter()
            .take(MAX_REPLY_SUGGESTIONS)
            .map(|(id, text)| ReplySuggestion { id, text: value_text(&text) })
            .collect(),
        Value::Array(items) => items
            .iter()
            .take(MAX_REPLY_SUGGESTIONS)
            .enumerate()
            .map(|(idx, item)| ReplySuggestion {
                id: item
                    .get("id")
                    .and_then(non_empty_text)
                    .unwrap_or_else(|| format!("sugestao_{}", idx + 1)),
                text: item
                    .get("texto")
                    .and_then(non_empty_text)
                    .unwrap_or_else(|| value_text(item)),
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn non_empty_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Message and status operations on Direct conversations
#[derive(Clone)]
pub struct DirectService {
    store: Arc<dyn RecordStore>,
}

impl DirectService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Start a conversation with an Instagram user
    pub async fn open_conversation(
        &self,
        unit_id: &str,
        external_user_id: &str,
        display_name: Option<&str>,
    ) -> Result<DirectConversation> {
        InputValidator::validate_unit_id(unit_id)?;
        InputValidator::validate_id("instagram user", external_user_id)?;
        if self.store.get_unit(unit_id).await?.is_none() {
            return Err(EngagementError::not_found(collections::UNITS, unit_id));
        }

        let now = Utc::now();
        let conversation = DirectConversation {
            id: new_id(),
            unit_id: unit_id.to_string(),
            external_user_id: external_user_id.to_string(),
            display_name: display_name.map(str::to_string),
            messages: Vec::new(),
            unread_count: 0,
            total_count: 0,
            status: ConversationStatus::Active,
            metadata: Value::Object(serde_json::Map::new()),
            ai_suggestions: None,
            created_at: now,
            updated_at: now,
        };
        self.store.save_conversation(&conversation).await?;
        Ok(conversation)
    }

    /// Conversations of a unit, most recently updated first
    pub async fn conversations(&self, unit_id: &str) -> Result<Vec<DirectConversation>> {
        InputValidator::validate_unit_id(unit_id)?;
        self.store.conversations_for_unit(unit_id).await
    }

    /// Record a message from the Instagram user.
    ///
    /// Archived conversations are reopened; blocked ones reject the message.
    pub async fn record_inbound(&self, conversation_id: &str, text: &str) -> Result<DirectConversation> {
        let mut conversation = self.load(conversation_id).await?;
        if conversation.status == ConversationStatus::Blocked {
            return Err(EngagementError::validation(format!(
                "conversation {conversation_id} is blocked"
            )));
        }
        conversation.status = ConversationStatus::Active;
        push_message(&mut conversation, Sender::Them, text)?;
        conversation.unread_count += 1;
        self.save(conversation).await
    }

    /// Record a reply sent by the unit
    pub async fn record_outbound(&self, conversation_id: &str, text: &str) -> Result<DirectConversation> {
        let mut conversation = self.load(conversation_id).await?;
        if conversation.status != ConversationStatus::Active {
            return Err(EngagementError::validation(format!(
                "conversation {conversation_id} is {}",
                conversation.status
            )));
        }
        push_message(&mut conversation, Sender::Me, text)?;
        self.save(conversation).await
    }

    /// Clear the unread counter
    pub async fn mark_read(&self, conversation_id: &str) -> Result<DirectConversation> {
        let mut conversation = self.load(conversation_id).await?;
        conversation.unread_count = 0;
        self.save(conversation).await
    }

    /// Archive a conversation
    pub async fn archive(&self, conversation_id: &str) -> Result<DirectConversation> {
        self.set_status(conversation_id, ConversationStatus::Archived).await
    }

    /// Block the other side of a conversation
    pub async fn block(&self, conversation_id: &str) -> Result<DirectConversation> {
        self.set_status(conversation_id, ConversationStatus::Blocked).await
    }

    /// Undo an archive or block
    pub async fn reactivate(&self, conversation_id: &str) -> Result<DirectConversation> {
        self.set_status(conversation_id, ConversationStatus::Active).await
    }

    /// Reply suggestions stored on a conversation
    pub async fn reply_suggestions(&self, conversation_id: &str) -> Result<Vec<ReplySuggestion>> {
        let conversation = self.load(conversation_id).await?;
        Ok(conversation
            .ai_suggestions
            .as_ref()
            .map(parse_reply_suggestions)
            .unwrap_or_default())
    }

    async fn set_status(&self, conversation_id: &str, status: ConversationStatus) -> Result<DirectConversation> {
        let mut conversation = self.load(conversation_id).await?;
        info!(conversation_id, from = %conversation.status, to = %status, "Conversation status changed");
        conversation.status = status;
        self.save(conversation).await
    }

    async fn load(&self, conversation_id: &str) -> Result<DirectConversation> {
        InputValidator::validate_id("conversation", conversation_id)?;
        self.store
            .get_conversation(conversation_id)
            .await?
            .ok_or_else(|| EngagementError::not_found(collections::CONVERSATIONS, conversation_id))
    }

    async fn save(&self, mut conversation: DirectConversation) -> Result<DirectConversation> {
        conversation.updated_at = Utc::now();
        self.store.save_conversation(&conversation).await?;
        Ok(conversation)
    }
}

fn push_message(conversation: &mut DirectConversation, sender: Sender, text: &str) -> Result<()> {
    InputValidator::validate_message_text(text)?;
    conversation.messages.push(DirectMessage {
        id: new_id(),
        sender,
        text: InputValidator::sanitize_text(text),
        timestamp: Utc::now(),
    });
    conversation.total_count = u32::try_from(conversation.messages.len())
        .map_err(|_| EngagementError::validation("conversation has too many messages"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::memory::{FallbackDataset, InMemoryStore};
    use serde_json::json;

    async fn direct() -> DirectService {
        let store = Arc::new(InMemoryStore::new());
        store.load(FallbackDataset::sample()).await;
        DirectService::new(store)
    }

    #[test]
    fn suggestions_from_object_keep_three_entries() {
        let raw = json!({ "a": "Olá!", "b": "Obrigado!", "c": "Volte sempre", "d": "Extra" });
        let parsed = parse_reply_suggestions(&raw);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0], ReplySuggestion { id: "a".into(), text: "Olá!".into() });
    }

    #[test]
    fn suggestions_survive_double_stringification() {
        let inner = json!([{ "id": "s1", "texto": "Oi" }, "Tudo bem?"]).to_string();
        let raw = Value::String(Value::String(inner).to_string());
        let parsed = parse_reply_suggestions(&raw);
        assert_eq!(parsed[0].id, "s1");
        assert_eq!(parsed[1], ReplySuggestion { id: "sugestao_2".into(), text: "Tudo bem?".into() });
    }

    #[test]
    fn junk_suggestions_are_empty() {
        assert!(parse_reply_suggestions(&Value::Null).is_empty());
        assert!(parse_reply_suggestions(&json!("{not json")).is_empty());
        assert!(parse_reply_suggestions(&json!(42)).is_empty());
    }

    #[tokio::test]
    async fn counts_follow_messages() {
        let direct = direct().await;
        let conversation = direct.record_inbound("mock-direct-1", "Ainda estão abertos?").await.expect("inbound");
        assert_eq!(conversation.total_count, 3);
        assert_eq!(conversation.unread_count, 2);

        let conversation = direct.record_outbound("mock-direct-1", "Sim!").await.expect("outbound");
        assert_eq!(conversation.total_count, 4);
        assert_eq!(conversation.total_count as usize, conversation.messages.len());

        let conversation = direct.mark_read("mock-direct-1").await.expect("read");
        assert_eq!(conversation.unread_count, 0);
    }

    #[tokio::test]
    async fn blocked_conversations_reject_messages_until_reactivated() {
        let direct = direct().await;
        direct.block("mock-direct-1").await.expect("block");

        let err = direct.record_inbound("mock-direct-1", "Oi").await.expect_err("blocked");
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        direct.reactivate("mock-direct-1").await.expect("reactivate");
        direct.record_outbound("mock-direct-1", "Olá").await.expect("active again");
    }

    #[tokio::test]
    async fn inbound_message_reopens_archived_conversation() {
        let direct = direct().await;
        direct.archive("mock-direct-1").await.expect("archive");
        let conversation = direct.record_inbound("mock-direct-1", "Voltei").await.expect("inbound");
        assert_eq!(conversation.status, ConversationStatus::Active);
    }
}

//! Chat service: the entry point wiring validation, conversation state,
//! routing, handlers, and the audit log.

use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use labkeeper_core::config::LabConfig;
use labkeeper_core::traits::{ConversationStore, LabReader};
use labkeeper_core::types::{AuditEntry, Role};

use crate::context::ChatContext;
use crate::error::{format_error, ChatError};
use crate::facade::LabData;
use crate::handlers::{dispatch, Turn};
use crate::router::{route, Intent};
use crate::validation::{coerce_user_id, sanitize, validate_message, validate_role, validate_user_id};

/// An inbound chat message as it arrives over the wire.
///
/// Fields are loosely typed on purpose: `user_id` may be a number or a
/// numeric string, and missing fields are reported as validation errors
/// rather than deserialization failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_id: Value,
    #[serde(default)]
    pub role: Option<String>,
}

impl ChatRequest {
    pub fn new(message: &str, user_id: i64, role: Role) -> Self {
        Self {
            message: Some(message.to_string()),
            user_id: Value::from(user_id),
            role: Some(role.to_string()),
        }
    }
}

/// The answer to one chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub reply: String,
    /// `None` when the message failed before routing.
    pub intent: Option<Intent>,
    pub conversation_id: Option<Uuid>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    /// Error kind (`validation_error`, `database_error`, `error`) when the
    /// reply is a formatted failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatReply {
    fn failure(err: &ChatError) -> Self {
        Self {
            reply: format_error(err),
            intent: None,
            conversation_id: None,
            suggestions: Vec::new(),
            error: Some(err.kind().to_string()),
        }
    }
}

/// Processes chat messages against the lab inventory.
pub struct ChatService {
    data: LabData,
    store: Arc<dyn ConversationStore>,
    max_message_length: usize,
    booking_window_days: i64,
}

impl ChatService {
    pub fn new(
        reader: Arc<dyn LabReader>,
        store: Arc<dyn ConversationStore>,
        config: &LabConfig,
    ) -> Self {
        Self {
            data: LabData::new(reader, &config.chat, &config.inventory),
            store,
            max_message_length: config.chat.max_message_length,
            booking_window_days: config.chat.booking_window_days,
        }
    }

    /// Handle one message. Never fails: any error is formatted into the reply.
    pub fn process_message(&self, request: &ChatRequest) -> ChatReply {
        self.process_message_on(request, today())
    }

    /// [`process_message`](Self::process_message) with an explicit "today".
    pub fn process_message_on(&self, request: &ChatRequest, today: NaiveDate) -> ChatReply {
        match self.try_process_on(request, today) {
            Ok(reply) => reply,
            Err(e) => {
                match &e {
                    ChatError::Validation(v) => debug!(field = %v.field, "Rejected chat message: {}", v.message),
                    other => warn!(error = %other, "Chat message failed"),
                }
                let reply = ChatReply::failure(&e);
                if let Ok(user_id) = coerce_user_id(&request.user_id) {
                    let text = request.message.as_deref().unwrap_or_default().trim();
                    self.audit(user_id, text, &reply.reply, e.kind());
                }
                reply
            }
        }
    }

    /// Handle one message, returning the typed failure instead of a reply.
    pub fn try_process(&self, request: &ChatRequest) -> Result<ChatReply, ChatError> {
        self.try_process_on(request, today())
    }

    /// [`try_process`](Self::try_process) with an explicit "today".
    pub fn try_process_on(
        &self,
        request: &ChatRequest,
        today: NaiveDate,
    ) -> Result<ChatReply, ChatError> {
        let message = validate_message(request.message.as_deref(), self.max_message_length)?;
        let user = validate_user_id(&request.user_id, self.data.reader())?;
        let role = validate_role(request.role.as_deref())?;
        let lowered = sanitize(message).to_lowercase();

        let conversation = self.store.get_or_create_conversation(user.id)?;
        let before = ChatContext::from_map(&self.store.get_context(conversation.id)?);
        let mut ctx = before.clone();

        let intent = route(&lowered, &ctx);
        debug!(user_id = user.id, intent = intent.as_str(), "Routed chat message");
        if intent != Intent::FollowUp {
            // A new question supersedes an unanswered "which one?".
            ctx.awaiting_clarification = false;
        }

        let turn = Turn {
            message: &lowered,
            user: &user,
            role,
            today,
            data: &self.data,
            booking_window_days: self.booking_window_days,
        };
        let reply = dispatch(intent, &turn, &mut ctx)?;

        self.persist_context(conversation.id, &ctx, &before);
        if let Err(e) = self.store.touch_conversation(conversation.id) {
            warn!(conversation_id = %conversation.id, error = %e, "Failed to touch conversation");
        }
        self.audit(user.id, message, &reply.text, intent.as_str());

        Ok(ChatReply {
            reply: reply.text,
            intent: Some(intent),
            conversation_id: Some(conversation.id),
            suggestions: reply.suggestions,
            error: None,
        })
    }

    /// The context of the user's active conversation, empty if there is none.
    pub fn context(&self, user_id: i64) -> Result<ChatContext, ChatError> {
        match self.store.active_conversation(user_id)? {
            Some(conversation) => Ok(ChatContext::from_map(
                &self.store.get_context(conversation.id)?,
            )),
            None => Ok(ChatContext::default()),
        }
    }

    /// Forget everything the bot remembers about the user's conversation.
    pub fn clear_context(&self, user_id: i64) -> Result<(), ChatError> {
        if let Some(conversation) = self.store.active_conversation(user_id)? {
            self.store.clear_context(conversation.id, None)?;
        }
        Ok(())
    }

    /// The user's most recent messages and replies, newest first.
    pub fn history(&self, user_id: i64, limit: usize) -> Result<Vec<AuditEntry>, ChatError> {
        Ok(self.store.recent_audit(user_id, limit)?)
    }

    /// Drop cached listings, e.g. after an inventory write.
    pub fn invalidate_cache(&self) {
        self.data.invalidate();
    }

    /// Write only the keys that changed. A failed write is logged and the
    /// reply still goes out; the next message sees the older context.
    fn persist_context(&self, conversation_id: Uuid, ctx: &ChatContext, before: &ChatContext) {
        let (upserts, deletes) = ctx.diff(before);
        for (key, value) in &upserts {
            if let Err(e) = self.store.set_context(conversation_id, key, value) {
                warn!(%conversation_id, key = %key, error = %e, "Failed to save context");
            }
        }
        for key in &deletes {
            if let Err(e) = self.store.clear_context(conversation_id, Some(key)) {
                warn!(%conversation_id, key = %key, error = %e, "Failed to clear context");
            }
        }
    }

    fn audit(&self, user_id: i64, query: &str, response: &str, query_type: &str) {
        let entry = AuditEntry {
            user_id,
            query_text: query.to_string(),
            response_text: response.to_string(),
            query_type: query_type.to_string(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.append_audit(&entry) {
            warn!(user_id, error = %e, "Failed to write chat audit entry");
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PendingAction, Topic};
    use crate::testing::{date, fixtures, FlakyReader};
    use labkeeper_core::types::NewChemical;
    use labkeeper_storage::ConversationRepository;

    fn service() -> (ChatService, Arc<FlakyReader>, Arc<ConversationRepository>, i64) {
        let (reader, store) = fixtures();
        let user = reader
            .inventory()
            .add_user("Ada", "ada@lab.test", Role::Borrower)
            .unwrap();
        let svc = ChatService::new(reader.clone(), store.clone(), &LabConfig::default());
        (svc, reader, store, user.id)
    }

    fn sunday() -> NaiveDate {
        date(2026, 10, 18)
    }

    #[test]
    fn test_empty_message_is_a_validation_reply() {
        let (svc, _, _, uid) = service();
        let reply = svc.process_message_on(&ChatRequest::new("   ", uid, Role::Borrower), sunday());
        assert_eq!(reply.error.as_deref(), Some("validation_error"));
        assert!(reply.reply.contains("Invalid message"));
        assert!(reply.intent.is_none());
    }

    #[test]
    fn test_try_process_exposes_typed_errors() {
        let (svc, _, _, uid) = service();
        let mut request = ChatRequest::new("help", uid, Role::Borrower);
        request.role = Some("janitor".to_string());
        let err = svc.try_process_on(&request, sunday()).unwrap_err();
        assert!(matches!(err, ChatError::Validation(ref v) if v.field == "role"));

        let request = ChatRequest::new("help", uid + 100, Role::Borrower);
        let err = svc.try_process_on(&request, sunday()).unwrap_err();
        assert!(matches!(err, ChatError::Validation(ref v) if v.field == "user_id"));
    }

    #[test]
    fn test_user_id_is_checked_before_role() {
        let (svc, _, _, uid) = service();
        let mut request = ChatRequest::new("help", uid + 100, Role::Borrower);
        request.role = Some("janitor".to_string());
        let err = svc.try_process_on(&request, sunday()).unwrap_err();
        assert!(matches!(err, ChatError::Validation(ref v) if v.field == "user_id"));
    }

    #[test]
    fn test_unrelated_question_gets_the_summary() {
        let (svc, _, _, uid) = service();
        let reply = svc.process_message_on(
            &ChatRequest::new("what is the time", uid, Role::Borrower),
            sunday(),
        );
        assert_eq!(reply.intent, Some(Intent::Summary));
        assert!(reply.reply.contains("quick overview"), "{}", reply.reply);
        assert!(!reply.reply.contains("couldn't find"));
    }

    #[test]
    fn test_summary_answers_items_missing_from_keyword_tables() {
        let (svc, reader, _, uid) = service();
        reader
            .inventory()
            .add_chemical(&NewChemical::new("Glycerol", "Polyol", 500.0, "mL"))
            .unwrap();

        let reply = svc.process_message_on(
            &ChatRequest::new("Tell me about glycerol", uid, Role::Borrower),
            sunday(),
        );
        assert_eq!(reply.intent, Some(Intent::Summary));
        assert!(reply.reply.contains("Glycerol (Polyol)"), "{}", reply.reply);
        assert_eq!(svc.context(uid).unwrap().last_chemical.as_deref(), Some("Glycerol"));
    }

    #[test]
    fn test_context_survives_between_messages() {
        let (svc, reader, _, uid) = service();
        reader
            .inventory()
            .add_chemical(&NewChemical::new("Ethanol", "Solvent", 2.5, "L"))
            .unwrap();

        let first = svc.process_message_on(
            &ChatRequest::new("Tell me the details of ethanol", uid, Role::Borrower),
            sunday(),
        );
        assert_eq!(first.intent, Some(Intent::ChemicalDetails));
        let ctx = svc.context(uid).unwrap();
        assert_eq!(ctx.last_chemical.as_deref(), Some("Ethanol"));
        assert_eq!(ctx.last_topic, Some(Topic::Chemicals));

        let second = svc.process_message_on(
            &ChatRequest::new("how much is left?", uid, Role::Borrower),
            sunday(),
        );
        assert_eq!(second.intent, Some(Intent::FollowUp));
        assert!(second.reply.contains("2.5 L"), "{}", second.reply);
        assert_eq!(first.conversation_id, second.conversation_id);
    }

    #[test]
    fn test_purchase_flow_resumes_on_quantity() {
        let (svc, _, _, uid) = service();
        let reply = svc.process_message_on(
            &ChatRequest::new("I need to order more acetone", uid, Role::Borrower),
            sunday(),
        );
        assert_eq!(reply.intent, Some(Intent::PurchaseRequest));
        let ctx = svc.context(uid).unwrap();
        assert!(ctx.awaiting_quantity);
        assert!(matches!(ctx.pending_action, Some(PendingAction::PurchaseRequest { .. })));

        let reply = svc.process_message_on(&ChatRequest::new("5 L", uid, Role::Borrower), sunday());
        assert_eq!(reply.intent, Some(Intent::FollowUp));
        assert!(reply.reply.contains("5 L"), "{}", reply.reply);
        let ctx = svc.context(uid).unwrap();
        assert!(ctx.pending_action.is_none());
        assert!(!ctx.awaiting_quantity);
    }

    #[test]
    fn test_database_failure_uses_database_template() {
        let (svc, reader, _, uid) = service();
        reader.set_failing(true);
        let reply = svc.process_message_on(&ChatRequest::new("help", uid, Role::Borrower), sunday());
        assert_eq!(reply.error.as_deref(), Some("database_error"));
        assert!(reply.reply.contains("try again"));
    }

    #[test]
    fn test_audit_and_history() {
        let (svc, _, _, uid) = service();
        svc.process_message_on(&ChatRequest::new("help", uid, Role::Borrower), sunday());
        svc.process_message_on(&ChatRequest::new("", uid, Role::Borrower), sunday());

        let history = svc.history(uid, 10).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].query_type, "validation_error");
        assert_eq!(history[1].query_type, "help");
        assert_eq!(history[1].query_text, "help");
    }

    #[test]
    fn test_clear_context() {
        let (svc, _, _, uid) = service();
        // No conversation yet: nothing to clear.
        svc.clear_context(uid).unwrap();
        assert_eq!(svc.context(uid).unwrap(), ChatContext::default());

        svc.process_message_on(&ChatRequest::new("order some glycerol", uid, Role::Borrower), sunday());
        assert!(svc.context(uid).unwrap().has_state());
        svc.clear_context(uid).unwrap();
        assert!(!svc.context(uid).unwrap().has_state());
    }
}

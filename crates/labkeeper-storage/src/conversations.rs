//! Conversation repository: chat conversations, their key/value context
//! bags, and the chat audit log.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use labkeeper_core::error::LabError;
use labkeeper_core::traits::ConversationStore;
use labkeeper_core::types::{AuditEntry, Conversation, ConversationStatus, ConversationType};

use crate::db::{storage_err, Database};
use crate::inventory::timestamp;

/// SQLite-backed implementation of [`ConversationStore`].
pub struct ConversationRepository {
    db: Arc<Database>,
}

impl ConversationRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Change a conversation's status, e.g. to close it.
    pub fn set_status(&self, conversation_id: Uuid, status: ConversationStatus) -> Result<(), LabError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.to_string(), Utc::now().timestamp(), conversation_id.to_string()],
            )
            .map_err(storage_err)?;
            Ok(())
        })
    }
}

impl ConversationStore for ConversationRepository {
    fn get_or_create_conversation(&self, user_id: i64) -> Result<Conversation, LabError> {
        if let Some(existing) = self.active_conversation(user_id)? {
            return Ok(existing);
        }

        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            conversation_type: ConversationType::Bot,
            status: ConversationStatus::Active,
            created_at: timestamp(now.timestamp()),
            updated_at: timestamp(now.timestamp()),
        };
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, conversation_type, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    conversation.id.to_string(),
                    user_id,
                    conversation.conversation_type.to_string(),
                    conversation.status.to_string(),
                    now.timestamp(),
                ],
            )
            .map_err(storage_err)?;
            Ok(())
        })?;
        debug!(user_id, conversation_id = %conversation.id, "Created bot conversation");
        Ok(conversation)
    }

    fn touch_conversation(&self, conversation_id: Uuid) -> Result<(), LabError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![Utc::now().timestamp(), conversation_id.to_string()],
            )
            .map_err(storage_err)?;
            Ok(())
        })
    }

    fn active_conversation(&self, user_id: i64) -> Result<Option<Conversation>, LabError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, conversation_type, status, created_at, updated_at
                 FROM conversations
                 WHERE user_id = ?1 AND conversation_type = 'bot' AND status = 'active'
                 ORDER BY updated_at DESC, created_at DESC
                 LIMIT 1",
                [user_id],
                row_to_conversation,
            )
            .optional()
            .map_err(storage_err)
        })
    }

    fn get_context(&self, conversation_id: Uuid) -> Result<HashMap<String, String>, LabError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT context_key, context_value FROM conversation_context
                     WHERE conversation_id = ?1",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map([conversation_id.to_string()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(storage_err)?;
            rows.collect::<Result<HashMap<_, _>, _>>()
                .map_err(storage_err)
        })
    }

    fn set_context(&self, conversation_id: Uuid, key: &str, value: &str) -> Result<(), LabError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversation_context (conversation_id, context_key, context_value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (conversation_id, context_key)
                 DO UPDATE SET context_value = excluded.context_value,
                               updated_at = excluded.updated_at",
                params![conversation_id.to_string(), key, value, Utc::now().timestamp()],
            )
            .map_err(storage_err)?;
            Ok(())
        })
    }

    fn clear_context(&self, conversation_id: Uuid, key: Option<&str>) -> Result<(), LabError> {
        self.db.with_conn(|conn| {
            let deleted = match key {
                Some(key) => conn.execute(
                    "DELETE FROM conversation_context WHERE conversation_id = ?1 AND context_key = ?2",
                    params![conversation_id.to_string(), key],
                ),
                None => conn.execute(
                    "DELETE FROM conversation_context WHERE conversation_id = ?1",
                    [conversation_id.to_string()],
                ),
            };
            deleted.map_err(storage_err)?;
            Ok(())
        })
    }

    fn append_audit(&self, entry: &AuditEntry) -> Result<(), LabError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chatbot_queries (user_id, query_text, response_text, query_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.user_id,
                    entry.query_text,
                    entry.response_text,
                    entry.query_type,
                    entry.created_at.timestamp(),
                ],
            )
            .map_err(storage_err)?;
            Ok(())
        })
    }

    fn recent_audit(&self, user_id: i64, limit: usize) -> Result<Vec<AuditEntry>, LabError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT user_id, query_text, response_text, query_type, created_at
                     FROM chatbot_queries
                     WHERE user_id = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT ?2",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(params![user_id, limit as i64], |row| {
                    Ok(AuditEntry {
                        user_id: row.get(0)?,
                        query_text: row.get(1)?,
                        response_text: row.get(2)?,
                        query_type: row.get(3)?,
                        created_at: timestamp(row.get(4)?),
                    })
                })
                .map_err(storage_err)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(storage_err)
        })
    }
}

fn row_to_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let id: String = row.get(0)?;
    let kind: String = row.get(2)?;
    let status: String = row.get(3)?;
    let invalid = |idx: usize, msg: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
    };
    Ok(Conversation {
        id: Uuid::parse_str(&id).map_err(|e| invalid(0, e.to_string()))?,
        user_id: row.get(1)?,
        conversation_type: kind.parse().map_err(|e| invalid(2, e))?,
        status: status.parse().map_err(|e| invalid(3, e))?,
        created_at: timestamp(row.get(4)?),
        updated_at: timestamp(row.get(5)?),
    })
}

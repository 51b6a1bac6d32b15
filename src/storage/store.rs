//! Conversation Store
//!
//! Persistence trait for conversation history and undo entries, with an
//! in-memory implementation for tests and ephemeral runs. The SQLite
//! implementation lives in `storage::database`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use cellflow_llm::Message;

use crate::models::UndoAction;
use crate::utils::error::AppResult;

/// Storage surface used by the agent loop and the undo ledger.
///
/// Implementations are synchronous; callers on async paths hold them behind
/// an `Arc` and the calls are short enough not to warrant `spawn_blocking`.
pub trait ConversationStore: Send + Sync {
    // Messages

    fn append_message(&self, conversation_id: &str, message: &Message) -> AppResult<()>;
    /// Full history in insertion order, hidden messages included.
    fn messages(&self, conversation_id: &str) -> AppResult<Vec<Message>>;

    // Undo entries

    /// Insert an entry, returning its assigned id.
    fn insert_undo(&self, action: &UndoAction) -> AppResult<i64>;
    /// Pending (unapproved) entries for a conversation, newest first.
    fn pending_undo(&self, conversation_id: &str) -> AppResult<Vec<UndoAction>>;
    fn delete_undo(&self, id: i64) -> AppResult<()>;
    /// Mark every entry of a batch approved; returns the number touched.
    fn approve_batch(&self, conversation_id: &str, batch_id: u64) -> AppResult<usize>;

    // Conversations

    /// Record that a conversation exists / was active.
    fn touch_conversation(&self, conversation_id: &str) -> AppResult<()>;
    fn conversations(&self) -> AppResult<Vec<String>>;
}

/// In-memory store backed by mutex-guarded maps.
#[derive(Default)]
pub struct MemoryStore {
    messages: Mutex<HashMap<String, Vec<Message>>>,
    undo: Mutex<Vec<UndoAction>>,
    known: Mutex<Vec<String>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            ..Self::default()
        }
    }
}

impl ConversationStore for MemoryStore {
    fn append_message(&self, conversation_id: &str, message: &Message) -> AppResult<()> {
        self.touch_conversation(conversation_id)?;
        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        messages
            .entry(conversation_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    fn messages(&self, conversation_id: &str) -> AppResult<Vec<Message>> {
        let messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        Ok(messages.get(conversation_id).cloned().unwrap_or_default())
    }

    fn insert_undo(&self, action: &UndoAction) -> AppResult<i64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut entry = action.clone();
        entry.id = id;
        let mut undo = self.undo.lock().unwrap_or_else(|e| e.into_inner());
        undo.push(entry);
        Ok(id)
    }

    fn pending_undo(&self, conversation_id: &str) -> AppResult<Vec<UndoAction>> {
        let undo = self.undo.lock().unwrap_or_else(|e| e.into_inner());
        let mut pending: Vec<UndoAction> = undo
            .iter()
            .filter(|a| a.conversation_id == conversation_id && !a.approved)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(pending)
    }

    fn delete_undo(&self, id: i64) -> AppResult<()> {
        let mut undo = self.undo.lock().unwrap_or_else(|e| e.into_inner());
        undo.retain(|a| a.id != id);
        Ok(())
    }

    fn approve_batch(&self, conversation_id: &str, batch_id: u64) -> AppResult<usize> {
        let mut undo = self.undo.lock().unwrap_or_else(|e| e.into_inner());
        let mut touched = 0;
        for action in undo.iter_mut() {
            if action.conversation_id == conversation_id
                && action.batch_id == batch_id
                && !action.approved
            {
                action.approved = true;
                touched += 1;
            }
        }
        Ok(touched)
    }

    fn touch_conversation(&self, conversation_id: &str) -> AppResult<()> {
        let mut known = self.known.lock().unwrap_or_else(|e| e.into_inner());
        if !known.iter().any(|c| c == conversation_id) {
            known.push(conversation_id.to_string());
        }
        Ok(())
    }

    fn conversations(&self) -> AppResult<Vec<String>> {
        let known = self.known.lock().unwrap_or_else(|e| e.into_inner());
        Ok(known.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UndoOperation;

    #[test]
    fn test_message_roundtrip() {
        let store = MemoryStore::new();
        store
            .append_message("c1", &Message::user("olá"))
            .unwrap();
        store
            .append_message("c1", &Message::assistant("hi"))
            .unwrap();
        let history = store.messages("c1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "olá");
        assert!(store.messages("c2").unwrap().is_empty());
        assert_eq!(store.conversations().unwrap(), vec!["c1"]);
    }

    #[test]
    fn test_pending_undo_newest_first() {
        let store = MemoryStore::new();
        for target in ["A1", "A2", "A3"] {
            store
                .insert_undo(&UndoAction::new("c1", "Sheet1", target, UndoOperation::None))
                .unwrap();
        }
        let pending = store.pending_undo("c1").unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].target, "A3");
        assert_eq!(pending[2].target, "A1");
    }

    #[test]
    fn test_approve_batch_excludes_from_pending() {
        let store = MemoryStore::new();
        store
            .insert_undo(
                &UndoAction::new("c1", "Sheet1", "A1", UndoOperation::None).with_batch(7),
            )
            .unwrap();
        store
            .insert_undo(
                &UndoAction::new("c1", "Sheet1", "A2", UndoOperation::None).with_batch(7),
            )
            .unwrap();
        assert_eq!(store.approve_batch("c1", 7).unwrap(), 2);
        assert!(store.pending_undo("c1").unwrap().is_empty());
        // Second approval is a no-op
        assert_eq!(store.approve_batch("c1", 7).unwrap(), 0);
    }

    #[test]
    fn test_delete_undo() {
        let store = MemoryStore::new();
        let id = store
            .insert_undo(&UndoAction::new("c1", "Sheet1", "A1", UndoOperation::None))
            .unwrap();
        store.delete_undo(id).unwrap();
        assert!(store.pending_undo("c1").unwrap().is_empty());
    }
}

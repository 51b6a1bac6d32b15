//! SQLite Store
//!
//! Persistent `ConversationStore` using rusqlite with r2d2 connection
//! pooling. Schema is created on open; indices cover the hot lookups
//! (history by conversation, pending undo newest-first).

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use cellflow_llm::{Message, Role};

use crate::models::{UndoAction, UndoOperation};
use crate::storage::store::ConversationStore;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::{database_path, ensure_cellflow_dir};

/// Type alias for the connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// SQLite-backed conversation store
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn role_from_str(s: &str) -> AppResult<Role> {
    match s {
        "system" => Ok(Role::System),
        "user" => Ok(Role::User),
        "assistant" => Ok(Role::Assistant),
        other => Err(AppError::database(format!("unknown message role: {other}"))),
    }
}

impl SqliteStore {
    /// Open (or create) the store at the default data path.
    pub fn new() -> AppResult<Self> {
        ensure_cellflow_dir()?;
        Self::open(database_path()?)
    }

    /// Open (or create) a store at an explicit database file path.
    pub fn open(path: impl AsRef<std::path::Path>) -> AppResult<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// Pool size 1 so every caller sees the same in-memory database.
    pub fn new_in_memory() -> AppResult<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| AppError::database(format!("Failed to create connection pool: {}", e)))?;

        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> AppResult<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| AppError::database(format!("Failed to get connection: {}", e)))
    }

    /// Initialize the database schema
    fn init_schema(&self) -> AppResult<()> {
        let conn = self.conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                hidden INTEGER NOT NULL DEFAULT 0,
                tool_call_id TEXT,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation
                ON messages (conversation_id, created_at)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS undo_actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id TEXT NOT NULL,
                document TEXT NOT NULL DEFAULT '',
                sheet TEXT NOT NULL DEFAULT '',
                target TEXT NOT NULL DEFAULT '',
                operation TEXT NOT NULL,
                batch_id INTEGER NOT NULL DEFAULT 0,
                approved INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_undo_conversation
                ON undo_actions (conversation_id, created_at)",
            [],
        )?;

        Ok(())
    }
}

impl ConversationStore for SqliteStore {
    fn append_message(&self, conversation_id: &str, message: &Message) -> AppResult<()> {
        self.touch_conversation(conversation_id)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO messages (conversation_id, role, content, timestamp, hidden, tool_call_id)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                conversation_id,
                role_to_str(message.role),
                message.content,
                message.timestamp,
                message.hidden as i64,
                message.tool_call_id,
            ],
        )?;
        Ok(())
    }

    fn messages(&self, conversation_id: &str) -> AppResult<Vec<Message>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT role, content, timestamp, hidden, tool_call_id
                FROM messages WHERE conversation_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
            ))
        })?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, content, timestamp, hidden, tool_call_id) = row?;
            messages.push(Message {
                role: role_from_str(&role)?,
                content,
                timestamp,
                hidden: hidden != 0,
                tool_call_id,
            });
        }
        Ok(messages)
    }

    fn insert_undo(&self, action: &UndoAction) -> AppResult<i64> {
        let conn = self.conn()?;
        let operation = serde_json::to_string(&action.operation)?;
        conn.execute(
            "INSERT INTO undo_actions
                (conversation_id, document, sheet, target, operation, batch_id, approved, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                action.conversation_id,
                action.document,
                action.sheet,
                action.target,
                operation,
                action.batch_id as i64,
                action.approved as i64,
                action.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn pending_undo(&self, conversation_id: &str) -> AppResult<Vec<UndoAction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, document, sheet, target, operation, batch_id, created_at
                FROM undo_actions
                WHERE conversation_id = ?1 AND approved = 0
                ORDER BY id DESC",
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut actions = Vec::new();
        for row in rows {
            let (id, conversation_id, document, sheet, target, operation, batch_id, created_at) =
                row?;
            let operation: UndoOperation = serde_json::from_str(&operation)?;
            actions.push(UndoAction {
                id,
                conversation_id,
                document,
                sheet,
                target,
                operation,
                batch_id: batch_id as u64,
                approved: false,
                created_at,
            });
        }
        Ok(actions)
    }

    fn delete_undo(&self, id: i64) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM undo_actions WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn approve_batch(&self, conversation_id: &str, batch_id: u64) -> AppResult<usize> {
        let conn = self.conn()?;
        let touched = conn.execute(
            "UPDATE undo_actions SET approved = 1
                WHERE conversation_id = ?1 AND batch_id = ?2 AND approved = 0",
            params![conversation_id, batch_id as i64],
        )?;
        Ok(touched)
    }

    fn touch_conversation(&self, conversation_id: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversations (id) VALUES (?1)
                ON CONFLICT(id) DO UPDATE SET updated_at = CURRENT_TIMESTAMP",
            params![conversation_id],
        )?;
        Ok(())
    }

    fn conversations(&self) -> AppResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM conversations ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }
}

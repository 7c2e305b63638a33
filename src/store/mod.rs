//! Record store for the four persisted record kinds
//!
//! Backend is chosen at startup: in-memory by default, Postgres when
//! DATABASE_URL / POSTGRES_URL is set. Every operation fails with
//! StorageUnavailable until `initialize` has completed.

use crate::error::AssistantError;
use crate::models::{ChatMessage, JournalEntry, Mood, ScheduleItem, Transaction, TransactionKind};
use crate::Result;
use sqlx::{PgPool, Row};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Only the most recent N chat messages are retained; eviction is oldest-first.
pub const CHAT_RETENTION_LIMIT: usize = 100;

#[derive(Default)]
struct Records {
    transactions: Vec<Transaction>,
    schedule_items: Vec<ScheduleItem>,
    journal_entries: Vec<JournalEntry>,
    chat_messages: Vec<ChatMessage>,
}

enum StoreBackend {
    InMemory {
        records: RwLock<Records>,
    },
    Postgres {
        pool: PgPool,
        schema_ready: OnceCell<()>,
    },
}

pub struct RecordStore {
    backend: StoreBackend,
    ready: AtomicBool,
}

impl RecordStore {
    /// Pick a backend from the environment, falling back to in-memory.
    pub fn from_env() -> Self {
        let database_url = env::var("POSTGRES_URL")
            .or_else(|_| env::var("DATABASE_URL"))
            .ok();

        if let Some(url) = database_url {
            match sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect_lazy(&url)
            {
                Ok(pool) => {
                    info!("Record store backend: postgres");
                    return Self {
                        backend: StoreBackend::Postgres {
                            pool,
                            schema_ready: OnceCell::new(),
                        },
                        ready: AtomicBool::new(false),
                    };
                }
                Err(error) => {
                    warn!(
                        "Failed to initialize postgres record store, falling back to in-memory: {}",
                        error
                    );
                }
            }
        }

        info!("Record store backend: in-memory");
        Self::in_memory()
    }

    pub fn in_memory() -> Self {
        Self {
            backend: StoreBackend::InMemory {
                records: RwLock::new(Records::default()),
            },
            ready: AtomicBool::new(false),
        }
    }

    /// Must complete before any read or write is accepted.
    pub async fn initialize(&self) -> Result<()> {
        if let StoreBackend::Postgres { pool, schema_ready } = &self.backend {
            schema_ready
                .get_or_try_init(|| async {
                    sqlx::query(
                        r#"
                        CREATE TABLE IF NOT EXISTS assistant_transactions (
                          id UUID PRIMARY KEY,
                          amount DOUBLE PRECISION NOT NULL,
                          kind TEXT NOT NULL,
                          category TEXT NOT NULL,
                          description TEXT NOT NULL,
                          occurred_at TIMESTAMPTZ NOT NULL
                        );
                        "#,
                    )
                    .execute(pool)
                    .await?;

                    sqlx::query(
                        r#"
                        CREATE TABLE IF NOT EXISTS assistant_schedule_items (
                          id UUID PRIMARY KEY,
                          title TEXT NOT NULL,
                          description TEXT,
                          date DATE NOT NULL,
                          time TIME NOT NULL,
                          reminder_lead_minutes INTEGER
                        );
                        "#,
                    )
                    .execute(pool)
                    .await?;

                    sqlx::query(
                        r#"
                        CREATE TABLE IF NOT EXISTS assistant_journal_entries (
                          id UUID PRIMARY KEY,
                          content TEXT NOT NULL,
                          mood TEXT NOT NULL,
                          occurred_at TIMESTAMPTZ NOT NULL
                        );
                        "#,
                    )
                    .execute(pool)
                    .await?;

                    sqlx::query(
                        r#"
                        CREATE TABLE IF NOT EXISTS assistant_chat_messages (
                          id UUID PRIMARY KEY,
                          text TEXT NOT NULL,
                          from_user BOOLEAN NOT NULL,
                          persona_tag TEXT,
                          created_at TIMESTAMPTZ NOT NULL
                        );
                        "#,
                    )
                    .execute(pool)
                    .await?;

                    Ok::<(), sqlx::Error>(())
                })
                .await
                .map_err(|e| {
                    AssistantError::StorageError(format!(
                        "Failed to initialize record store schema: {}",
                        e
                    ))
                })?;
        }

        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(AssistantError::StorageUnavailable)
        }
    }

    fn kind_from_db(kind: &str) -> TransactionKind {
        match kind.to_lowercase().as_str() {
            "income" => TransactionKind::Income,
            _ => TransactionKind::Expense,
        }
    }

    fn mood_from_db(mood: &str) -> Mood {
        match mood.to_lowercase().as_str() {
            "happy" => Mood::Happy,
            "sad" => Mood::Sad,
            "energetic" => Mood::Energetic,
            "calm" => Mood::Calm,
            _ => Mood::Neutral,
        }
    }

    // =============================
    // Transactions (newest-first)
    // =============================

    pub async fn insert_transaction(&self, tx: Transaction) -> Result<()> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                records.write().await.transactions.push(tx);
                Ok(())
            }
            StoreBackend::Postgres { pool, .. } => {
                sqlx::query(
                    r#"
                    INSERT INTO assistant_transactions
                      (id, amount, kind, category, description, occurred_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(tx.id)
                .bind(tx.amount)
                .bind(tx.kind.to_string())
                .bind(&tx.category)
                .bind(&tx.description)
                .bind(tx.occurred_at)
                .execute(pool)
                .await
                .map_err(|e| {
                    AssistantError::StorageError(format!("Failed to insert transaction: {}", e))
                })?;
                Ok(())
            }
        }
    }

    pub async fn list_transactions(&self) -> Result<Vec<Transaction>> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                let mut items = records.read().await.transactions.clone();
                items.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
                Ok(items)
            }
            StoreBackend::Postgres { pool, .. } => {
                let rows = sqlx::query(
                    r#"
                    SELECT id, amount, kind, category, description, occurred_at
                    FROM assistant_transactions
                    ORDER BY occurred_at DESC
                    "#,
                )
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    AssistantError::StorageError(format!("Failed to list transactions: {}", e))
                })?;

                Ok(rows
                    .into_iter()
                    .map(|row| Transaction {
                        id: row.try_get("id").unwrap_or_else(|_| Uuid::new_v4()),
                        amount: row.try_get("amount").unwrap_or(0.0),
                        kind: Self::kind_from_db(
                            &row.try_get::<String, _>("kind").unwrap_or_default(),
                        ),
                        category: row.try_get("category").unwrap_or_default(),
                        description: row.try_get("description").unwrap_or_default(),
                        occurred_at: row
                            .try_get("occurred_at")
                            .unwrap_or_else(|_| chrono::Utc::now()),
                    })
                    .collect())
            }
        }
    }

    pub async fn delete_transaction(&self, id: Uuid) -> Result<bool> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                let mut locked = records.write().await;
                let before = locked.transactions.len();
                locked.transactions.retain(|t| t.id != id);
                Ok(locked.transactions.len() < before)
            }
            StoreBackend::Postgres { pool, .. } => {
                let result = sqlx::query("DELETE FROM assistant_transactions WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await
                    .map_err(|e| {
                        AssistantError::StorageError(format!("Failed to delete transaction: {}", e))
                    })?;
                Ok(result.rows_affected() > 0)
            }
        }
    }

    // =============================
    // Schedule Items (oldest-first)
    // =============================

    pub async fn insert_schedule_item(&self, item: ScheduleItem) -> Result<()> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                records.write().await.schedule_items.push(item);
                Ok(())
            }
            StoreBackend::Postgres { pool, .. } => {
                sqlx::query(
                    r#"
                    INSERT INTO assistant_schedule_items
                      (id, title, description, date, time, reminder_lead_minutes)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(item.id)
                .bind(&item.title)
                .bind(&item.description)
                .bind(item.date)
                .bind(item.time)
                .bind(item.reminder_lead_minutes.map(|m| m as i32))
                .execute(pool)
                .await
                .map_err(|e| {
                    AssistantError::StorageError(format!("Failed to insert schedule item: {}", e))
                })?;
                Ok(())
            }
        }
    }

    pub async fn list_schedule_items(&self) -> Result<Vec<ScheduleItem>> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                let mut items = records.read().await.schedule_items.clone();
                items.sort_by_key(|item| item.starts_at());
                Ok(items)
            }
            StoreBackend::Postgres { pool, .. } => {
                let rows = sqlx::query(
                    r#"
                    SELECT id, title, description, date, time, reminder_lead_minutes
                    FROM assistant_schedule_items
                    ORDER BY date ASC, time ASC
                    "#,
                )
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    AssistantError::StorageError(format!("Failed to list schedule items: {}", e))
                })?;

                Ok(rows
                    .into_iter()
                    .map(|row| ScheduleItem {
                        id: row.try_get("id").unwrap_or_else(|_| Uuid::new_v4()),
                        title: row.try_get("title").unwrap_or_default(),
                        description: row.try_get("description").ok(),
                        date: row
                            .try_get("date")
                            .unwrap_or_else(|_| chrono::Utc::now().date_naive()),
                        time: row
                            .try_get("time")
                            .unwrap_or_else(|_| chrono::NaiveTime::MIN),
                        reminder_lead_minutes: row
                            .try_get::<Option<i32>, _>("reminder_lead_minutes")
                            .ok()
                            .flatten()
                            .map(|m| m.max(0) as u32),
                    })
                    .collect())
            }
        }
    }

    pub async fn delete_schedule_item(&self, id: Uuid) -> Result<bool> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                let mut locked = records.write().await;
                let before = locked.schedule_items.len();
                locked.schedule_items.retain(|item| item.id != id);
                Ok(locked.schedule_items.len() < before)
            }
            StoreBackend::Postgres { pool, .. } => {
                let result = sqlx::query("DELETE FROM assistant_schedule_items WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await
                    .map_err(|e| {
                        AssistantError::StorageError(format!(
                            "Failed to delete schedule item: {}",
                            e
                        ))
                    })?;
                Ok(result.rows_affected() > 0)
            }
        }
    }

    // =============================
    // Journal Entries (newest-first)
    // =============================

    pub async fn insert_journal_entry(&self, entry: JournalEntry) -> Result<()> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                records.write().await.journal_entries.push(entry);
                Ok(())
            }
            StoreBackend::Postgres { pool, .. } => {
                sqlx::query(
                    r#"
                    INSERT INTO assistant_journal_entries (id, content, mood, occurred_at)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(entry.id)
                .bind(&entry.content)
                .bind(entry.mood.to_string())
                .bind(entry.occurred_at)
                .execute(pool)
                .await
                .map_err(|e| {
                    AssistantError::StorageError(format!("Failed to insert journal entry: {}", e))
                })?;
                Ok(())
            }
        }
    }

    pub async fn list_journal_entries(&self) -> Result<Vec<JournalEntry>> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                let mut items = records.read().await.journal_entries.clone();
                items.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
                Ok(items)
            }
            StoreBackend::Postgres { pool, .. } => {
                let rows = sqlx::query(
                    r#"
                    SELECT id, content, mood, occurred_at
                    FROM assistant_journal_entries
                    ORDER BY occurred_at DESC
                    "#,
                )
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    AssistantError::StorageError(format!("Failed to list journal entries: {}", e))
                })?;

                Ok(rows
                    .into_iter()
                    .map(|row| JournalEntry {
                        id: row.try_get("id").unwrap_or_else(|_| Uuid::new_v4()),
                        content: row.try_get("content").unwrap_or_default(),
                        mood: Self::mood_from_db(
                            &row.try_get::<String, _>("mood").unwrap_or_default(),
                        ),
                        occurred_at: row
                            .try_get("occurred_at")
                            .unwrap_or_else(|_| chrono::Utc::now()),
                    })
                    .collect())
            }
        }
    }

    pub async fn delete_journal_entry(&self, id: Uuid) -> Result<bool> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                let mut locked = records.write().await;
                let before = locked.journal_entries.len();
                locked.journal_entries.retain(|entry| entry.id != id);
                Ok(locked.journal_entries.len() < before)
            }
            StoreBackend::Postgres { pool, .. } => {
                let result = sqlx::query("DELETE FROM assistant_journal_entries WHERE id = $1")
                    .bind(id)
                    .execute(pool)
                    .await
                    .map_err(|e| {
                        AssistantError::StorageError(format!(
                            "Failed to delete journal entry: {}",
                            e
                        ))
                    })?;
                Ok(result.rows_affected() > 0)
            }
        }
    }

    // =============================
    // Chat Messages (ascending, retention-trimmed)
    // =============================

    /// Append a chat message; the same logical write trims the history to the
    /// retention limit, evicting oldest-first.
    pub async fn insert_chat_message(&self, message: ChatMessage) -> Result<()> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                let mut locked = records.write().await;
                locked.chat_messages.push(message);
                if locked.chat_messages.len() > CHAT_RETENTION_LIMIT {
                    locked.chat_messages.sort_by_key(|m| m.timestamp);
                    let excess = locked.chat_messages.len() - CHAT_RETENTION_LIMIT;
                    locked.chat_messages.drain(0..excess);
                }
                Ok(())
            }
            StoreBackend::Postgres { pool, .. } => {
                sqlx::query(
                    r#"
                    INSERT INTO assistant_chat_messages
                      (id, text, from_user, persona_tag, created_at)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(message.id)
                .bind(&message.text)
                .bind(message.from_user)
                .bind(&message.persona_tag)
                .bind(message.timestamp)
                .execute(pool)
                .await
                .map_err(|e| {
                    AssistantError::StorageError(format!("Failed to insert chat message: {}", e))
                })?;

                sqlx::query(
                    r#"
                    DELETE FROM assistant_chat_messages
                    WHERE id NOT IN (
                      SELECT id FROM assistant_chat_messages
                      ORDER BY created_at DESC
                      LIMIT $1
                    )
                    "#,
                )
                .bind(CHAT_RETENTION_LIMIT as i64)
                .execute(pool)
                .await
                .map_err(|e| {
                    AssistantError::StorageError(format!("Failed to trim chat history: {}", e))
                })?;

                Ok(())
            }
        }
    }

    pub async fn list_chat_messages(&self) -> Result<Vec<ChatMessage>> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                let mut items = records.read().await.chat_messages.clone();
                items.sort_by_key(|m| m.timestamp);
                Ok(items)
            }
            StoreBackend::Postgres { pool, .. } => {
                let rows = sqlx::query(
                    r#"
                    SELECT id, text, from_user, persona_tag, created_at
                    FROM assistant_chat_messages
                    ORDER BY created_at ASC
                    "#,
                )
                .fetch_all(pool)
                .await
                .map_err(|e| {
                    AssistantError::StorageError(format!("Failed to list chat messages: {}", e))
                })?;

                Ok(rows
                    .into_iter()
                    .map(|row| ChatMessage {
                        id: row.try_get("id").unwrap_or_else(|_| Uuid::new_v4()),
                        text: row.try_get("text").unwrap_or_default(),
                        from_user: row.try_get("from_user").unwrap_or(false),
                        timestamp: row
                            .try_get("created_at")
                            .unwrap_or_else(|_| chrono::Utc::now()),
                        persona_tag: row.try_get("persona_tag").ok().flatten(),
                    })
                    .collect())
            }
        }
    }

    // =============================
    // Clear
    // =============================

    pub async fn clear(&self) -> Result<()> {
        self.ensure_ready()?;

        match &self.backend {
            StoreBackend::InMemory { records } => {
                let mut locked = records.write().await;
                *locked = Records::default();
                Ok(())
            }
            StoreBackend::Postgres { pool, .. } => {
                for table in [
                    "assistant_transactions",
                    "assistant_schedule_items",
                    "assistant_journal_entries",
                    "assistant_chat_messages",
                ] {
                    sqlx::query(&format!("DELETE FROM {}", table))
                        .execute(pool)
                        .await
                        .map_err(|e| {
                            AssistantError::StorageError(format!(
                                "Failed to clear {}: {}",
                                table, e
                            ))
                        })?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Persona;
    use chrono::{Duration, NaiveDate, NaiveTime, Utc};

    async fn ready_store() -> RecordStore {
        let store = RecordStore::in_memory();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_uninitialized_store_is_unavailable() {
        let store = RecordStore::in_memory();
        let result = store.list_transactions().await;
        assert!(matches!(result, Err(AssistantError::StorageUnavailable)));
    }

    #[tokio::test]
    async fn test_transactions_list_newest_first() {
        let store = ready_store().await;

        let mut older = Transaction::new(
            10.0,
            TransactionKind::Expense,
            "Food".to_string(),
            "coffee".to_string(),
        );
        older.occurred_at = Utc::now() - Duration::hours(2);
        let newer = Transaction::new(
            2500.0,
            TransactionKind::Income,
            "Salary".to_string(),
            "paycheck".to_string(),
        );

        store.insert_transaction(older.clone()).await.unwrap();
        store.insert_transaction(newer.clone()).await.unwrap();

        let listed = store.list_transactions().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }

    #[tokio::test]
    async fn test_schedule_items_list_oldest_first() {
        let store = ready_store().await;

        let later = ScheduleItem {
            id: Uuid::new_v4(),
            title: "Review".to_string(),
            description: None,
            date: NaiveDate::from_ymd_opt(2025, 6, 2).unwrap(),
            time: NaiveTime::from_hms_opt(15, 0, 0).unwrap(),
            reminder_lead_minutes: None,
        };
        let earlier = ScheduleItem {
            id: Uuid::new_v4(),
            title: "Standup".to_string(),
            description: None,
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            reminder_lead_minutes: Some(15),
        };

        store.insert_schedule_item(later.clone()).await.unwrap();
        store.insert_schedule_item(earlier.clone()).await.unwrap();

        let listed = store.list_schedule_items().await.unwrap();
        assert_eq!(listed[0].id, earlier.id);
        assert_eq!(listed[1].id, later.id);
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one_record() {
        let store = ready_store().await;

        let keep = Transaction::new(
            5.0,
            TransactionKind::Expense,
            "Misc".to_string(),
            "keep".to_string(),
        );
        let drop = Transaction::new(
            7.0,
            TransactionKind::Expense,
            "Misc".to_string(),
            "drop".to_string(),
        );
        store.insert_transaction(keep.clone()).await.unwrap();
        store.insert_transaction(drop.clone()).await.unwrap();

        assert!(store.delete_transaction(drop.id).await.unwrap());

        let listed = store.list_transactions().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_delete_nonexistent_is_noop() {
        let store = ready_store().await;
        assert!(!store.delete_journal_entry(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_chat_retention_evicts_oldest() {
        let store = ready_store().await;
        let base = Utc::now() - Duration::hours(5);

        for i in 0..CHAT_RETENTION_LIMIT {
            let mut msg = ChatMessage::user(format!("message {}", i), Persona::GeneralAssistant);
            msg.timestamp = base + Duration::seconds(i as i64);
            store.insert_chat_message(msg).await.unwrap();
        }

        let mut newest = ChatMessage::user("the newest".to_string(), Persona::GeneralAssistant);
        newest.timestamp = base + Duration::seconds(CHAT_RETENTION_LIMIT as i64);
        store.insert_chat_message(newest).await.unwrap();

        let messages = store.list_chat_messages().await.unwrap();
        assert_eq!(messages.len(), CHAT_RETENTION_LIMIT);
        // "message 0" was evicted; newest survived.
        assert_eq!(messages.first().unwrap().text, "message 1");
        assert_eq!(messages.last().unwrap().text, "the newest");
    }

    #[tokio::test]
    async fn test_clear_empties_all_kinds() {
        let store = ready_store().await;

        store
            .insert_journal_entry(JournalEntry::new("fine day".to_string(), Mood::Happy))
            .await
            .unwrap();
        store
            .insert_chat_message(ChatMessage::user(
                "hello".to_string(),
                Persona::GeneralAssistant,
            ))
            .await
            .unwrap();

        store.clear().await.unwrap();

        assert!(store.list_journal_entries().await.unwrap().is_empty());
        assert!(store.list_chat_messages().await.unwrap().is_empty());
    }
}

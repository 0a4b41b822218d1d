//! SQLite 上下文持久化（sqlx 异步）
//!
//! 三张表：user_contexts（用户级）、thread_contexts（线程级）、interaction_history（线程交互日志）。
//! record_interaction 在单个事务内完成线程创建、日志追加与用户时间戳更新；
//! 同一 thread_id 的读写通过 ThreadLocks 串行化。

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use super::locks::ThreadLocks;
use super::store::ContextStore;
use super::types::{
    ContextMap, InteractionRecord, MergedContext, ScopeKind, StoreError, ThreadContext,
    UserContext,
};

pub struct SqliteContextStore {
    pool: SqlitePool,
    locks: ThreadLocks,
    /// 用户级数据的读改写（update_scope）按 user_id 串行化
    user_locks: ThreadLocks,
}

impl SqliteContextStore {
    /// 打开（不存在则创建）数据库文件并建表
    pub async fn open(db_path: impl AsRef<Path>, max_connections: u32) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }
        let db_url = format!("sqlite:{}?mode=rwc", db_path.as_ref().display());

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(&db_url)
            .await?;

        let store = Self::from_pool(pool);
        store.init_tables().await?;
        Ok(store)
    }

    /// 从连接池创建（调用方负责建表前的连接配置）
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            locks: ThreadLocks::new(),
            user_locks: ThreadLocks::new(),
        }
    }

    async fn init_tables(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_contexts (
                user_id TEXT PRIMARY KEY,
                context_data TEXT NOT NULL,
                last_interaction_at TEXT,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS thread_contexts (
                thread_id TEXT PRIMARY KEY,
                user_id TEXT,
                context_data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS interaction_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                question TEXT NOT NULL,
                response TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_history_thread ON interaction_history(thread_id, id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_user(&self, user_id: &str) -> Result<Option<UserContext>, StoreError> {
        let row = sqlx::query(
            "SELECT context_data, last_interaction_at, updated_at FROM user_contexts WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let last: Option<String> = row.try_get("last_interaction_at")?;
        Ok(Some(UserContext {
            user_id: user_id.to_string(),
            data: decode_map(&row.try_get::<String, _>("context_data")?)?,
            last_interaction_at: last.as_deref().map(parse_timestamp).transpose()?,
            updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
        }))
    }

    async fn load_thread(&self, thread_id: &str) -> Result<Option<ThreadContext>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, context_data, updated_at FROM thread_contexts WHERE thread_id = ?",
        )
        .bind(thread_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history = sqlx::query(
            "SELECT question, response, created_at FROM interaction_history
             WHERE thread_id = ? ORDER BY id ASC",
        )
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await?;

        let log = history
            .iter()
            .map(|r| {
                Ok(InteractionRecord {
                    timestamp: parse_timestamp(&r.try_get::<String, _>("created_at")?)?,
                    question: r.try_get("question")?,
                    serialized_response: r.try_get("response")?,
                })
            })
            .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(Some(ThreadContext {
            thread_id: thread_id.to_string(),
            user_id: row.try_get("user_id")?,
            data: decode_map(&row.try_get::<String, _>("context_data")?)?,
            log,
            updated_at: parse_timestamp(&row.try_get::<String, _>("updated_at")?)?,
        }))
    }

    async fn scope_lock(
        &self,
        scope: ScopeKind,
        key: &str,
    ) -> tokio::sync::OwnedMutexGuard<()> {
        match scope {
            ScopeKind::User => self.user_locks.acquire(key).await,
            ScopeKind::Thread => self.locks.acquire(key).await,
        }
    }

    async fn read_scope(
        &self,
        scope: ScopeKind,
        key: &str,
    ) -> Result<Option<ContextMap>, StoreError> {
        let sql = match scope {
            ScopeKind::User => "SELECT context_data FROM user_contexts WHERE user_id = ?",
            ScopeKind::Thread => "SELECT context_data FROM thread_contexts WHERE thread_id = ?",
        };
        let row = sqlx::query(sql).bind(key).fetch_optional(&self.pool).await?;
        row.map(|r| decode_map(&r.try_get::<String, _>("context_data")?))
            .transpose()
    }

    /// 整体写入作用域数据；线程不存在时创建（尚未绑定 user_id），不触碰交互日志
    async fn write_scope(
        &self,
        scope: ScopeKind,
        key: &str,
        data: &ContextMap,
    ) -> Result<(), StoreError> {
        let payload = serde_json::to_string(data)?;
        let ts = Utc::now().to_rfc3339();
        let sql = match scope {
            ScopeKind::User => {
                "INSERT INTO user_contexts (user_id, context_data, last_interaction_at, updated_at)
                 VALUES (?, ?, NULL, ?)
                 ON CONFLICT(user_id) DO UPDATE SET
                    context_data = excluded.context_data,
                    updated_at = excluded.updated_at"
            }
            ScopeKind::Thread => {
                "INSERT INTO thread_contexts (thread_id, user_id, context_data, updated_at)
                 VALUES (?, NULL, ?, ?)
                 ON CONFLICT(thread_id) DO UPDATE SET
                    context_data = excluded.context_data,
                    updated_at = excluded.updated_at"
            }
        };
        sqlx::query(sql)
            .bind(key)
            .bind(&payload)
            .bind(&ts)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// 关闭连接池
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn decode_map(raw: &str) -> Result<ContextMap, StoreError> {
    if raw.is_empty() {
        return Ok(ContextMap::new());
    }
    Ok(serde_json::from_str(raw)?)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Unavailable(format!("corrupt timestamp {:?}: {}", raw, e)))
}

#[async_trait]
impl ContextStore for SqliteContextStore {
    async fn get_merged(
        &self,
        user_id: &str,
        thread_id: &str,
    ) -> Result<MergedContext, StoreError> {
        let _guard = self.locks.acquire(thread_id).await;
        let user = self.load_user(user_id).await?;
        let thread = self.load_thread(thread_id).await?;
        Ok(MergedContext::merge(user.as_ref(), thread.as_ref()))
    }

    async fn record_interaction(
        &self,
        user_id: &str,
        thread_id: &str,
        question: &str,
        response: &str,
    ) -> Result<InteractionRecord, StoreError> {
        let _guard = self.locks.acquire(thread_id).await;
        let now = Utc::now();
        let ts = now.to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO thread_contexts (thread_id, user_id, context_data, updated_at)
             VALUES (?, ?, '{}', ?)
             ON CONFLICT(thread_id) DO UPDATE SET
                user_id = COALESCE(thread_contexts.user_id, excluded.user_id),
                updated_at = excluded.updated_at",
        )
        .bind(thread_id)
        .bind(user_id)
        .bind(&ts)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO interaction_history (thread_id, user_id, question, response, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(thread_id)
        .bind(user_id)
        .bind(question)
        .bind(response)
        .bind(&ts)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO user_contexts (user_id, context_data, last_interaction_at, updated_at)
             VALUES (?, '{}', ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                last_interaction_at = excluded.last_interaction_at,
                updated_at = excluded.updated_at",
        )
        .bind(user_id)
        .bind(&ts)
        .bind(&ts)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!("Recorded interaction for user {} in thread {}", user_id, thread_id);

        Ok(InteractionRecord {
            timestamp: parse_timestamp(&ts)?,
            question: question.to_string(),
            serialized_response: response.to_string(),
        })
    }

    async fn save_scope(
        &self,
        scope: ScopeKind,
        key: &str,
        data: ContextMap,
    ) -> Result<(), StoreError> {
        let _guard = self.scope_lock(scope, key).await;
        self.write_scope(scope, key, &data).await?;
        tracing::info!("Replaced {:?} context {}", scope, key);
        Ok(())
    }

    async fn update_scope(
        &self,
        scope: ScopeKind,
        key: &str,
        updates: ContextMap,
    ) -> Result<(), StoreError> {
        let _guard = self.scope_lock(scope, key).await;
        let mut data = self.read_scope(scope, key).await?.unwrap_or_default();
        let keys = updates.len();
        for (k, v) in updates {
            data.insert(k, v);
        }
        self.write_scope(scope, key, &data).await?;
        tracing::info!("Merged {} keys into {:?} context {}", keys, scope, key);
        Ok(())
    }

    async fn list_threads(&self, user_id: Option<&str>) -> Result<Vec<String>, StoreError> {
        let rows = match user_id {
            Some(uid) => {
                sqlx::query(
                    "SELECT thread_id FROM thread_contexts WHERE user_id = ? ORDER BY thread_id",
                )
                .bind(uid)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT thread_id FROM thread_contexts ORDER BY thread_id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter()
            .map(|r| r.try_get::<String, _>("thread_id").map_err(StoreError::from))
            .collect()
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<bool, StoreError> {
        let _guard = self.locks.acquire(thread_id).await;
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM thread_contexts WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM interaction_history WHERE thread_id = ?")
            .bind(thread_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        if deleted > 0 {
            tracing::info!("Deleted context for thread {}", thread_id);
        }
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn map(v: serde_json::Value) -> ContextMap {
        v.as_object().cloned().unwrap()
    }

    async fn open_store(dir: &TempDir) -> SqliteContextStore {
        SqliteContextStore::open(dir.path().join("context/context.db"), 5)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_context_persistence() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .save_scope(ScopeKind::User, "u1", map(json!({"preference": "detailed_analysis"})))
            .await
            .unwrap();
        store
            .save_scope(ScopeKind::Thread, "t1", map(json!({"last_brand": "TechCorp"})))
            .await
            .unwrap();

        let merged = store.get_merged("u1", "t1").await.unwrap();
        assert_eq!(merged.values["preference"], json!("detailed_analysis"));
        assert_eq!(merged.values["last_brand"], json!("TechCorp"));
        assert!(merged.last_interaction_at.is_none());
    }

    #[tokio::test]
    async fn test_record_interaction_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .record_interaction("u1", "t1", "What percentage of respondents are female?", "{}")
            .await
            .unwrap();
        store
            .record_interaction("u1", "t1", "And male?", "{}")
            .await
            .unwrap();
        store.close().await;

        let reopened = open_store(&temp_dir).await;
        let merged = reopened.get_merged("u1", "t1").await.unwrap();
        assert_eq!(merged.log.len(), 2);
        assert_eq!(merged.log[0].question, "What percentage of respondents are female?");
        assert_eq!(merged.log[1].question, "And male?");
        assert!(merged.last_interaction_at.is_some());
        assert_eq!(reopened.list_threads(Some("u1")).await.unwrap(), vec!["t1"]);
    }

    #[tokio::test]
    async fn test_save_scope_keeps_log_and_binding() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store.record_interaction("u1", "t1", "q", "r").await.unwrap();
        store
            .save_scope(ScopeKind::Thread, "t1", map(json!({"focus": "ratings"})))
            .await
            .unwrap();

        let merged = store.get_merged("u1", "t1").await.unwrap();
        assert_eq!(merged.values, map(json!({"focus": "ratings"})));
        assert_eq!(merged.log.len(), 1);
        assert_eq!(store.list_threads(Some("u1")).await.unwrap(), vec!["t1"]);
    }

    #[tokio::test]
    async fn test_get_merged_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        store.record_interaction("u1", "t1", "q", "r").await.unwrap();

        let a = store.get_merged("u1", "t1").await.unwrap();
        let b = store.get_merged("u1", "t1").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_concurrent_records_on_same_thread() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(open_store(&temp_dir).await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .record_interaction("u1", "t1", &format!("question {}", i), "{}")
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let merged = store.get_merged("u1", "t1").await.unwrap();
        assert_eq!(merged.log.len(), 8);
    }

    #[tokio::test]
    async fn test_delete_thread_removes_log() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        store.record_interaction("u1", "t1", "q", "r").await.unwrap();
        store.record_interaction("u2", "t2", "q", "r").await.unwrap();

        assert!(store.delete_thread("t1").await.unwrap());
        assert!(!store.delete_thread("t1").await.unwrap());
        assert!(store.get_merged("u1", "t1").await.unwrap().log.is_empty());
        assert_eq!(store.list_threads(None).await.unwrap(), vec!["t2"]);
    }

    #[tokio::test]
    async fn test_update_scope_merges_shallowly() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        store.record_interaction("u1", "t1", "q", "r").await.unwrap();
        store
            .save_scope(
                ScopeKind::Thread,
                "t1",
                map(json!({"brand_id": "TechCorp", "filters": {"age": "18-24"}})),
            )
            .await
            .unwrap();
        store
            .update_scope(
                ScopeKind::Thread,
                "t1",
                map(json!({"filters": {"gender": "Female"}, "survey_id": "S1"})),
            )
            .await
            .unwrap();
        store
            .update_scope(ScopeKind::User, "u1", map(json!({"tone": "brief"})))
            .await
            .unwrap();

        let merged = store.get_merged("u1", "t1").await.unwrap();
        assert_eq!(
            merged.values,
            map(json!({
                "tone": "brief",
                "brand_id": "TechCorp",
                "filters": {"gender": "Female"},
                "survey_id": "S1"
            }))
        );
        assert_eq!(merged.log.len(), 1);
        assert!(merged.last_interaction_at.is_some());
    }

    #[tokio::test]
    async fn test_update_scope_creates_missing_thread() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;
        store
            .update_scope(ScopeKind::Thread, "fresh", map(json!({"survey_id": "S2"})))
            .await
            .unwrap();

        let merged = store.get_merged("nobody", "fresh").await.unwrap();
        assert_eq!(merged.values["survey_id"], json!("S2"));
        assert!(merged.log.is_empty());
        assert_eq!(store.list_threads(None).await.unwrap(), vec!["fresh"]);
    }
}

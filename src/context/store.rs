//! 上下文存储抽象层
//!
//! 定义统一的双作用域（用户 + 线程）上下文接口，支持内存和 SQLite 持久化两种实现

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::sqlite::SqliteContextStore;
use super::types::{
    ContextMap, InteractionRecord, MergedContext, ScopeKind, StoreError, ThreadContext,
    UserContext,
};
use crate::config::ContextSection;

/// 上下文存储接口
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// 读取用户级与线程级上下文并合并（线程级优先）；不存在的作用域视为空
    async fn get_merged(&self, user_id: &str, thread_id: &str)
        -> Result<MergedContext, StoreError>;

    /// 向线程日志追加一条交互（线程不存在时创建并绑定 user_id），并更新用户的 last_interaction_at
    async fn record_interaction(
        &self,
        user_id: &str,
        thread_id: &str,
        question: &str,
        response: &str,
    ) -> Result<InteractionRecord, StoreError>;

    /// 整体替换某作用域的数据（不做深合并，不影响线程日志）
    async fn save_scope(
        &self,
        scope: ScopeKind,
        key: &str,
        data: ContextMap,
    ) -> Result<(), StoreError>;

    /// 浅合并：updates 中的键覆盖同名顶层键，其余键保留；作用域不存在时创建，不影响线程日志
    async fn update_scope(
        &self,
        scope: ScopeKind,
        key: &str,
        updates: ContextMap,
    ) -> Result<(), StoreError>;

    /// 列出线程 ID，可按用户过滤
    async fn list_threads(&self, user_id: Option<&str>) -> Result<Vec<String>, StoreError>;

    /// 删除线程上下文及其交互日志；不存在时返回 false
    async fn delete_thread(&self, thread_id: &str) -> Result<bool, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<String, UserContext>,
    threads: HashMap<String, ThreadContext>,
}

impl MemoryState {
    /// 取作用域数据的可变引用（不存在时创建）并刷新 updated_at
    fn scope_data_mut(&mut self, scope: ScopeKind, key: &str) -> &mut ContextMap {
        let now = Utc::now();
        match scope {
            ScopeKind::User => {
                let user = self
                    .users
                    .entry(key.to_string())
                    .or_insert_with(|| UserContext {
                        user_id: key.to_string(),
                        data: ContextMap::new(),
                        last_interaction_at: None,
                        updated_at: now,
                    });
                user.updated_at = now;
                &mut user.data
            }
            ScopeKind::Thread => {
                let thread = self
                    .threads
                    .entry(key.to_string())
                    .or_insert_with(|| ThreadContext {
                        thread_id: key.to_string(),
                        user_id: None,
                        data: ContextMap::new(),
                        log: Vec::new(),
                        updated_at: now,
                    });
                thread.updated_at = now;
                &mut thread.data
            }
        }
    }
}

/// 内存上下文存储：单把读写锁保证同一线程的读写不交错
#[derive(Debug, Default)]
pub struct MemoryContextStore {
    state: RwLock<MemoryState>,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn get_merged(
        &self,
        user_id: &str,
        thread_id: &str,
    ) -> Result<MergedContext, StoreError> {
        let state = self.state.read().await;
        Ok(MergedContext::merge(
            state.users.get(user_id),
            state.threads.get(thread_id),
        ))
    }

    async fn record_interaction(
        &self,
        user_id: &str,
        thread_id: &str,
        question: &str,
        response: &str,
    ) -> Result<InteractionRecord, StoreError> {
        let now = Utc::now();
        let record = InteractionRecord {
            timestamp: now,
            question: question.to_string(),
            serialized_response: response.to_string(),
        };

        let mut state = self.state.write().await;
        let thread = state
            .threads
            .entry(thread_id.to_string())
            .or_insert_with(|| ThreadContext {
                thread_id: thread_id.to_string(),
                user_id: None,
                data: ContextMap::new(),
                log: Vec::new(),
                updated_at: now,
            });
        if thread.user_id.is_none() {
            thread.user_id = Some(user_id.to_string());
        }
        thread.log.push(record.clone());
        thread.updated_at = now;

        let user = state
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserContext {
                user_id: user_id.to_string(),
                data: ContextMap::new(),
                last_interaction_at: None,
                updated_at: now,
            });
        user.last_interaction_at = Some(now);
        user.updated_at = now;

        Ok(record)
    }

    async fn save_scope(
        &self,
        scope: ScopeKind,
        key: &str,
        data: ContextMap,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        *state.scope_data_mut(scope, key) = data;
        Ok(())
    }

    async fn update_scope(
        &self,
        scope: ScopeKind,
        key: &str,
        updates: ContextMap,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let data = state.scope_data_mut(scope, key);
        for (k, v) in updates {
            data.insert(k, v);
        }
        Ok(())
    }

    async fn list_threads(&self, user_id: Option<&str>) -> Result<Vec<String>, StoreError> {
        let state = self.state.read().await;
        let mut ids: Vec<String> = state
            .threads
            .values()
            .filter(|t| user_id.is_none() || t.user_id.as_deref() == user_id)
            .map(|t| t.thread_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        Ok(state.threads.remove(thread_id).is_some())
    }
}

/// 创建上下文存储
///
/// 默认使用 SQLite，打开失败直接返回错误（不静默降级到内存）；
/// 仅在显式 in_memory 或未配置 db_path 时使用内存存储
pub async fn create_context_store(
    section: &ContextSection,
) -> Result<Arc<dyn ContextStore>, StoreError> {
    match section.db_path.as_ref().filter(|_| !section.in_memory) {
        Some(path) => {
            let store = SqliteContextStore::open(path, section.max_connections).await?;
            tracing::info!("Using SQLite context store: {:?}", path);
            Ok(Arc::new(store))
        }
        None => {
            tracing::info!("Using in-memory context store");
            Ok(Arc::new(MemoryContextStore::new()))
        }
    }
}

//! 会话上下文：用户级 + 线程级双作用域存储、合并视图、交互日志

pub mod locks;
pub mod sqlite;
pub mod store;
pub mod types;

pub use locks::ThreadLocks;
pub use sqlite::SqliteContextStore;
pub use store::{create_context_store, ContextStore, MemoryContextStore};
pub use types::{
    ContextMap, InteractionRecord, MergedContext, ScopeKind, StoreError, ThreadContext,
    UserContext, RECENT_QUESTIONS_KEY,
};

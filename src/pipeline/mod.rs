//! 问答流水线：分类 → 分派（结构化查询 / 洞察）

pub mod dispatcher;
pub mod extract;
pub mod prompts;
pub mod router;
pub mod types;

pub use dispatcher::{DispatchOutcome, PipelineDispatcher};
pub use extract::extract_fenced_query;
pub use router::{Classification, ClassificationRouter};
pub use types::{
    AggregateResponse, AnalyticalResult, ClassificationLabel, InsightResult, ResultEntry,
    SubPipeline, NO_QUERY_FOUND,
};

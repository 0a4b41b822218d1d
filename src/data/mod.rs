//! 数据层：Parquet 数据源、schema 目录、SQL 执行与结果转换

pub mod catalog;
pub mod convert;
pub mod executor;
pub mod source;

pub use catalog::{ColumnDescriptor, SchemaCatalog, SchemaDescriptor};
pub use executor::{DataFusionExecutor, ExecutionError, QueryExecutor};
pub use source::{CatalogError, SurveyDataSource};

/// 一行查询结果：列名 → 标量（保持结果集列顺序）
pub type Record = serde_json::Map<String, serde_json::Value>;

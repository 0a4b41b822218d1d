//! 问卷数据源：扫描 Parquet 文件并注册为 DataFusion 关系
//!
//! 每个文件一个关系（文件名去扩展名），另有一个覆盖整个目录的合并视图。
//! 目录中没有任何数据文件时初始化失败，服务拒绝启动。

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use datafusion::execution::context::SessionContext;
use datafusion::prelude::ParquetReadOptions;
use futures_util::future::try_join_all;
use thiserror::Error;

use super::catalog::{ColumnDescriptor, SchemaCatalog, SchemaDescriptor};
use super::executor::DataFusionExecutor;
use crate::config::{DataSection, QuerySection};

/// 数据源初始化错误（均为致命）
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("No data files matching *{extension} found in {dir:?}")]
    NoRelations { dir: PathBuf, extension: String },

    #[error("Failed to scan data directory {dir:?}: {source}")]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to register relation {relation}: {message}")]
    Engine { relation: String, message: String },
}

/// 已加载的数据源：共享的 SessionContext + schema 快照
pub struct SurveyDataSource {
    ctx: SessionContext,
    catalog: SchemaCatalog,
}

impl SurveyDataSource {
    pub async fn open(section: &DataSection) -> Result<Self, CatalogError> {
        let files = scan_data_files(&section.dir, &section.file_extension)?;
        if files.is_empty() {
            return Err(CatalogError::NoRelations {
                dir: section.dir.clone(),
                extension: section.file_extension.clone(),
            });
        }

        let ctx = SessionContext::new();
        let combined = section.combined_view.to_lowercase();
        let mut taken = HashSet::from([combined.clone()]);
        let mut relations = Vec::with_capacity(files.len() + 1);

        for file in &files {
            let relation = unique_relation_name(relation_name(file), &mut taken);
            let path = file.to_string_lossy().replace('\\', "/");
            register(&ctx, &relation, &path, &section.file_extension).await?;
            relations.push(relation);
        }

        let mut dir = section.dir.to_string_lossy().replace('\\', "/");
        if !dir.ends_with('/') {
            dir.push('/');
        }
        register(&ctx, &combined, &dir, &section.file_extension).await?;
        relations.push(combined);

        let catalog = describe_relations(&ctx, &relations).await?;
        tracing::info!(
            "Loaded {} data files into DataFusion ({} relations)",
            files.len(),
            catalog.describe().len()
        );
        Ok(Self { ctx, catalog })
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn executor(&self, query: &QuerySection) -> DataFusionExecutor {
        DataFusionExecutor::new(
            self.ctx.clone(),
            Duration::from_secs(query.timeout_secs),
            query.max_rows,
        )
    }
}

fn scan_data_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, CatalogError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(CatalogError::Io {
                dir: dir.to_path_buf(),
                source: e,
            })
        }
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| CatalogError::Io {
            dir: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(extension))
            .unwrap_or(false);
        if path.is_file() && matches {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// 名称已被占用（其他文件或合并视图）时追加 `_2`、`_3` 后缀
fn unique_relation_name(base: String, taken: &mut HashSet<String>) -> String {
    let mut name = base.clone();
    let mut n = 2;
    while !taken.insert(name.clone()) {
        name = format!("{}_{}", base, n);
        n += 1;
    }
    if name != base {
        tracing::warn!("Relation name {} already in use, registering as {}", base, name);
    }
    name
}

/// 文件名去扩展名，非字母数字字符替换为下划线并转小写，保证可直接在 SQL 中引用
pub(crate) fn relation_name(file: &Path) -> String {
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("relation");
    let mut name: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if name.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(true) {
        name.insert(0, 't');
        name.insert(1, '_');
    }
    name
}

async fn register(
    ctx: &SessionContext,
    relation: &str,
    path: &str,
    extension: &str,
) -> Result<(), CatalogError> {
    let options = ParquetReadOptions {
        file_extension: extension,
        ..Default::default()
    };
    ctx.register_parquet(relation, path, options)
    .await
    .map_err(|e| CatalogError::Engine {
        relation: relation.to_string(),
        message: e.to_string(),
    })
}

async fn describe_relations(
    ctx: &SessionContext,
    relations: &[String],
) -> Result<SchemaCatalog, CatalogError> {
    let described = try_join_all(relations.iter().map(|relation| async move {
        let df = ctx.table(relation.as_str()).await.map_err(|e| CatalogError::Engine {
            relation: relation.clone(),
            message: e.to_string(),
        })?;
        let columns = df
            .schema()
            .fields()
            .iter()
            .map(|f| ColumnDescriptor::new(f.name().clone(), f.data_type().to_string()))
            .collect::<Vec<_>>();
        Ok::<_, CatalogError>((relation.clone(), columns))
    }))
    .await?;

    Ok(SchemaCatalog::new(described.into_iter().collect::<SchemaDescriptor>()))
}

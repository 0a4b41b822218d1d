//! 数据目录：可查询的表/视图及其列描述
//!
//! 在数据源初始化时一次性生成快照，进程生命周期内只读；用于为 SQL 生成提供 schema 依据。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 单列描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub column_name: String,
    pub column_type: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            column_name: name.into(),
            column_type: data_type.into(),
        }
    }
}

/// 关系名 → 有序列描述
pub type SchemaDescriptor = BTreeMap<String, Vec<ColumnDescriptor>>;

/// 只读 schema 快照，可在各请求间无锁共享
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaCatalog {
    descriptor: SchemaDescriptor,
}

impl SchemaCatalog {
    /// 由快照构建；空快照由调用方（数据源加载）拒绝
    pub fn new(descriptor: SchemaDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn describe(&self) -> &SchemaDescriptor {
        &self.descriptor
    }

    pub fn relation_names(&self) -> Vec<&str> {
        self.descriptor.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptor.is_empty()
    }

    /// 提示词中的 schema 段落：每个关系一行
    pub fn render_for_prompt(&self) -> String {
        self.descriptor
            .iter()
            .map(|(name, columns)| {
                let cols = columns
                    .iter()
                    .map(|c| format!("{} {}", c.column_name, c.column_type))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("- {}({})", name, cols)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_for_prompt() {
        let mut descriptor = SchemaDescriptor::new();
        descriptor.insert(
            "survey_responses".into(),
            vec![
                ColumnDescriptor::new("gender", "Utf8"),
                ColumnDescriptor::new("answer", "Utf8"),
            ],
        );
        descriptor.insert("all_responses".into(), vec![ColumnDescriptor::new("gender", "Utf8")]);

        let catalog = SchemaCatalog::new(descriptor);
        assert_eq!(catalog.relation_names(), vec!["all_responses", "survey_responses"]);
        assert_eq!(
            catalog.render_for_prompt(),
            "- all_responses(gender Utf8)\n- survey_responses(gender Utf8, answer Utf8)"
        );
    }
}

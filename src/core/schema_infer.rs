use std::collections::BTreeSet;

use crate::error::QueryError;
use crate::models::operation::Operation;

/// 只包含本次请求所引用列的合成表描述
///
/// 不做远端 schema 探测：列类型与编译无关，只需要列名。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferredTable {
    pub name: String,
    pub columns: Vec<String>,
}

impl InferredTable {
    pub fn column(&self, field: &str) -> Result<&str, QueryError> {
        self.columns
            .binary_search_by(|c| c.as_str().cmp(field))
            .map(|idx| self.columns[idx].as_str())
            .map_err(|_| QueryError::UnknownField(field.to_string()))
    }
}

/// 列集合 = 过滤字段目录 ∪ 写入字段 ∪ 排序字段，按字典序输出
pub fn infer(operation: &Operation) -> InferredTable {
    let mut columns: BTreeSet<&str> = BTreeSet::new();
    if let Some(filters) = operation.filters() {
        columns.extend(filters.fields.keys().map(String::as_str));
    }
    if let Some(writes) = operation.writes() {
        columns.extend(writes.keys().map(String::as_str));
    }
    columns.extend(operation.sort().iter().map(|item| item.field.as_str()));

    InferredTable {
        name: operation.resource().unwrap_or_default().to_string(),
        columns: columns.into_iter().map(str::to_string).collect(),
    }
}

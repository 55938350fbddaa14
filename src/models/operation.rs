use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::QueryError;
use crate::models::filter::FilterClause;

/// 请求信封：连接描述 + 一个操作
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEnvelope {
    pub connection_descriptor: ConnectionDescriptor,
    pub operation: Operation,
}

impl QueryEnvelope {
    /// 编译前的结构校验
    pub fn validate(&self, max_filter_depth: usize) -> Result<(), QueryError> {
        if let Some(resource) = self.operation.resource() {
            if resource.trim().is_empty() {
                return Err(QueryError::RequestShape("resource must not be empty".into()));
            }
        }
        if let Some(filters) = self.operation.filters() {
            let depth = filters.tree.depth();
            if depth > max_filter_depth {
                return Err(QueryError::RequestShape(format!(
                    "filter tree is {depth} levels deep, limit is {max_filter_depth}"
                )));
            }
        }
        if let Operation::Update(op) = &self.operation {
            if op.writes.is_empty() {
                return Err(QueryError::RequestShape("update needs at least one write".into()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionDescriptor {
    pub uri: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum Operation {
    Select(SelectOp),
    Insert(InsertOp),
    Update(UpdateOp),
    Delete(DeleteOp),
    Inspect(InspectOp),
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Select(_) => "select",
            Operation::Insert(_) => "insert",
            Operation::Update(_) => "update",
            Operation::Delete(_) => "delete",
            Operation::Inspect(_) => "inspect",
        }
    }

    pub fn resource(&self) -> Option<&str> {
        match self {
            Operation::Select(op) => Some(&op.resource),
            Operation::Insert(op) => Some(&op.resource),
            Operation::Update(op) => Some(&op.resource),
            Operation::Delete(op) => Some(&op.resource),
            Operation::Inspect(_) => None,
        }
    }

    pub fn filters(&self) -> Option<&FilterClause> {
        match self {
            Operation::Select(op) => op.filters.as_ref(),
            Operation::Update(op) => op.filters.as_ref(),
            Operation::Delete(op) => op.filters.as_ref(),
            Operation::Insert(_) | Operation::Inspect(_) => None,
        }
    }

    pub fn writes(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Operation::Insert(op) => Some(&op.writes),
            Operation::Update(op) => Some(&op.writes),
            _ => None,
        }
    }

    pub fn sort(&self) -> &[SortItem] {
        match self {
            Operation::Select(op) => op.sort.as_deref().unwrap_or_default(),
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectOp {
    pub resource: String,
    #[serde(default)]
    pub filters: Option<FilterClause>,
    #[serde(default)]
    pub sort: Option<Vec<SortItem>>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsertOp {
    pub resource: String,
    pub writes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOp {
    pub resource: String,
    #[serde(default)]
    pub filters: Option<FilterClause>,
    pub writes: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteOp {
    pub resource: String,
    #[serde(default)]
    pub filters: Option<FilterClause>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectOp {
    #[serde(default)]
    pub inspect_tables: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortItem {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page_size: u64,
    pub page_index: u64,
}

/// 单列的元数据 (inspect 结果)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

/// 表名 -> 列目录；内省失败的表为 null
pub type ColumnCatalog = BTreeMap<String, Option<Vec<ColumnInfo>>>;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Rows(Vec<Value>),
    Catalog(ColumnCatalog),
    Empty,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub result: Value,
}

impl From<ExecutionResult> for QueryResponse {
    fn from(result: ExecutionResult) -> Self {
        let result = match result {
            ExecutionResult::Rows(rows) => Value::Array(rows),
            ExecutionResult::Catalog(catalog) => {
                serde_json::to_value(catalog).unwrap_or(Value::Null)
            }
            ExecutionResult::Empty => Value::Null,
        };
        QueryResponse { result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(operation: Value) -> QueryEnvelope {
        serde_json::from_value(json!({
            "connectionDescriptor": { "uri": "postgres://localhost/app" },
            "operation": operation,
        }))
        .unwrap()
    }

    #[test]
    fn discriminates_on_op_tag() {
        let env = envelope(json!({
            "op": "select", "resource": "users",
            "sort": [{ "field": "name", "order": "desc" }],
            "pagination": { "pageSize": 10, "pageIndex": 2 }
        }));
        assert_eq!(env.operation.kind(), "select");
        assert_eq!(env.operation.sort()[0].order, SortOrder::Desc);
        assert!(env.connection_descriptor.options.is_empty());

        let env = envelope(json!({ "op": "inspect", "inspectTables": ["orders"] }));
        match env.operation {
            Operation::Inspect(op) => assert_eq!(op.inspect_tables, Some(vec!["orders".into()])),
            other => panic!("expected inspect, got {other:?}"),
        }
    }

    #[test]
    fn missing_discriminator_is_rejected() {
        let res = serde_json::from_value::<QueryEnvelope>(json!({
            "connectionDescriptor": { "uri": "postgres://localhost/app" },
            "operation": { "resource": "users" }
        }));
        assert!(res.is_err());
    }

    #[test]
    fn negative_pagination_is_rejected() {
        let res = serde_json::from_value::<Pagination>(json!({ "pageSize": -1, "pageIndex": 0 }));
        assert!(res.is_err());
    }

    #[test]
    fn validate_caps_filter_depth() {
        let mut tree = json!({ "type": "rule", "properties": { "field": "a", "operator": "is_null", "value": [] } });
        for _ in 0..5 {
            tree = json!({ "type": "group", "properties": { "conjunction": "AND" }, "children1": [tree] });
        }
        let env = envelope(json!({
            "op": "delete", "resource": "t",
            "filters": { "tree": tree, "fields": { "a": { "type": "text", "label": "A" } } }
        }));
        assert!(env.validate(6).is_ok());
        assert!(matches!(env.validate(5), Err(QueryError::RequestShape(_))));
    }

    #[test]
    fn validate_rejects_empty_update_and_resource() {
        let env = envelope(json!({ "op": "update", "resource": "t", "writes": {} }));
        assert!(matches!(env.validate(32), Err(QueryError::RequestShape(_))));

        let env = envelope(json!({ "op": "insert", "resource": " ", "writes": { "a": 1 } }));
        assert!(matches!(env.validate(32), Err(QueryError::RequestShape(_))));
    }

    #[test]
    fn empty_result_serializes_as_null() {
        let body = serde_json::to_value(QueryResponse::from(ExecutionResult::Empty)).unwrap();
        assert_eq!(body, json!({ "result": null }));

        let mut catalog = ColumnCatalog::new();
        catalog.insert("missing".into(), None);
        let body = serde_json::to_value(QueryResponse::from(ExecutionResult::Catalog(catalog))).unwrap();
        assert_eq!(body, json!({ "result": { "missing": null } }));
    }
}

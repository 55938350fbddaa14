use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

use crate::core::capabilities::{Backend, Capabilities};
use crate::core::filter_compiler::{self, Predicate};
use crate::core::schema_infer::{self, InferredTable};
use crate::core::sql::SqlWriter;
use crate::core::value_parser::TypedValue;
use crate::error::QueryError;
use crate::models::operation::{Operation, SortOrder};

/// 待执行的单条语句
#[derive(Debug, Clone, PartialEq)]
pub struct StatementPlan {
    pub sql: String,
    pub params: Vec<TypedValue>,
    /// 是否需要取回结果行
    pub returns_rows: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Statement(StatementPlan),
    /// `None` 表示内省连接可见的全部表
    Inspect { tables: Option<Vec<String>> },
}

pub fn plan(operation: &Operation, caps: &Capabilities) -> Result<Plan, QueryError> {
    // inspect 不经过 schema 推断与过滤编译
    if let Operation::Inspect(op) = operation {
        return Ok(Plan::Inspect {
            tables: op.inspect_tables.clone(),
        });
    }

    let table = schema_infer::infer(operation);
    debug!(table = %table.name, columns = ?table.columns, "推断出最小表结构");
    let predicate = filter_compiler::compile_clause(operation.filters(), &table)?;

    let mut w = SqlWriter::new(caps.backend);
    let returns_rows = match operation {
        Operation::Select(op) => {
            w.push("SELECT * FROM ").push_ident(&table.name);
            push_where(&mut w, &predicate);
            let sort = op.sort.as_deref().unwrap_or_default();
            for (idx, item) in sort.iter().enumerate() {
                w.push(if idx == 0 { " ORDER BY " } else { ", " })
                    .push_ident(table.column(&item.field)?)
                    .push(match item.order {
                        SortOrder::Asc => " ASC",
                        SortOrder::Desc => " DESC",
                    });
            }
            match op.pagination {
                Some(page) if caps.supports_pagination => {
                    let offset = page.page_index.saturating_mul(page.page_size);
                    w.push(&format!(" LIMIT {} OFFSET {}", page.page_size, offset));
                }
                Some(_) => debug!(backend = ?caps.backend, "后端不支持分页，忽略 pagination"),
                None => {}
            }
            true
        }
        Operation::Insert(op) => {
            push_insert(&mut w, caps.backend, &table, &op.writes)?;
            push_returning(&mut w, caps)
        }
        Operation::Update(op) => {
            w.push("UPDATE ").push_ident(&table.name).push(" SET ");
            for (idx, (column, value)) in op.writes.iter().enumerate() {
                if idx > 0 {
                    w.push(", ");
                }
                w.push_ident(table.column(column)?)
                    .push(" = ")
                    .push_value(TypedValue::from_json(value));
            }
            push_where(&mut w, &predicate);
            push_returning(&mut w, caps)
        }
        Operation::Delete(_) => {
            w.push("DELETE FROM ").push_ident(&table.name);
            push_where(&mut w, &predicate);
            push_returning(&mut w, caps)
        }
        Operation::Inspect(_) => {
            return Err(QueryError::RequestShape("inspect has no statement form".into()));
        }
    };

    let (sql, params) = w.finish();
    Ok(Plan::Statement(StatementPlan {
        sql,
        params,
        returns_rows,
    }))
}

// 缺省谓词为 TRUE：不带过滤的 update/delete 作用于全表
fn push_where(w: &mut SqlWriter, predicate: &Predicate) {
    w.push(" WHERE ").push_predicate(predicate);
}

fn push_insert(
    w: &mut SqlWriter,
    backend: Backend,
    table: &InferredTable,
    writes: &BTreeMap<String, Value>,
) -> Result<(), QueryError> {
    w.push("INSERT INTO ").push_ident(&table.name);
    if writes.is_empty() {
        w.push(match backend {
            Backend::MySql => " () VALUES ()",
            Backend::Postgres | Backend::Sqlite => " DEFAULT VALUES",
        });
        return Ok(());
    }
    w.push(" (");
    for (idx, column) in writes.keys().enumerate() {
        if idx > 0 {
            w.push(", ");
        }
        w.push_ident(table.column(column)?);
    }
    w.push(") VALUES (");
    for (idx, value) in writes.values().enumerate() {
        if idx > 0 {
            w.push(", ");
        }
        w.push_value(TypedValue::from_json(value));
    }
    w.push(")");
    Ok(())
}

fn push_returning(w: &mut SqlWriter, caps: &Capabilities) -> bool {
    if caps.supports_returning {
        w.push(" RETURNING *");
        true
    } else {
        false
    }
}

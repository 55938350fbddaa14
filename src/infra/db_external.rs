use serde_json::{Map, Value};
use sqlx::{
    mysql::{MySql, MySqlConnectOptions, MySqlConnection, MySqlSslMode},
    postgres::{PgConnectOptions, PgConnection, PgSslMode, Postgres},
    sqlite::{Sqlite, SqliteConnectOptions, SqliteConnection},
    types::Json,
    ConnectOptions, Connection, Row,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::capabilities::{Backend, Capabilities};
use crate::core::planner::{Plan, StatementPlan};
use crate::core::value_parser::TypedValue;
use crate::error::QueryError;
use crate::infra::utils::{mysql_row_to_json, pg_row_to_json, sqlite_row_to_json};
use crate::models::operation::{ColumnCatalog, ColumnInfo, ConnectionDescriptor, ExecutionResult};

/// 连接描述里 `options` 的解析结果，按后端区分可用的键
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConnectionOptions {
    pub statement_timeout: Option<Duration>,
    pub application_name: Option<String>,
    pub ssl_mode: Option<String>,
    pub charset: Option<String>,
    pub statement_cache_capacity: Option<usize>,
    pub read_only: Option<bool>,
    pub create_if_missing: Option<bool>,
    pub busy_timeout: Option<Duration>,
}

impl ConnectionOptions {
    pub fn parse(backend: Backend, options: &Map<String, Value>) -> Result<Self, QueryError> {
        let mut parsed = Self::default();
        for (key, value) in options {
            match (backend, key.as_str()) {
                (_, "statement_timeout_secs") => {
                    parsed.statement_timeout = Some(option_secs(key, value)?)
                }
                (_, "statement_cache_capacity") => {
                    let capacity = value.as_u64().ok_or_else(|| option_error(key, "an unsigned integer"))?;
                    parsed.statement_cache_capacity = Some(capacity as usize);
                }
                (Backend::Postgres, "application_name") => {
                    parsed.application_name = Some(option_str(key, value)?)
                }
                (Backend::Postgres | Backend::MySql, "ssl_mode") => {
                    parsed.ssl_mode = Some(option_str(key, value)?)
                }
                (Backend::MySql, "charset") => parsed.charset = Some(option_str(key, value)?),
                (Backend::Sqlite, "read_only") => parsed.read_only = Some(option_bool(key, value)?),
                (Backend::Sqlite, "create_if_missing") => {
                    parsed.create_if_missing = Some(option_bool(key, value)?)
                }
                (Backend::Sqlite, "busy_timeout_secs") => {
                    parsed.busy_timeout = Some(option_secs(key, value)?)
                }
                _ => {
                    return Err(QueryError::RequestShape(format!(
                        "unsupported connection option `{key}` for {}",
                        backend.scheme()
                    )))
                }
            }
        }
        Ok(parsed)
    }
}

fn option_error(key: &str, expected: &str) -> QueryError {
    QueryError::RequestShape(format!("connection option `{key}` must be {expected}"))
}

fn option_str(key: &str, value: &Value) -> Result<String, QueryError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| option_error(key, "a string"))
}

fn option_bool(key: &str, value: &Value) -> Result<bool, QueryError> {
    value.as_bool().ok_or_else(|| option_error(key, "a boolean"))
}

fn option_secs(key: &str, value: &Value) -> Result<Duration, QueryError> {
    value
        .as_f64()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| option_error(key, "a non-negative number of seconds"))
}

fn bad_uri(err: sqlx::Error) -> QueryError {
    QueryError::RequestShape(format!("invalid connection uri: {err}"))
}

/// 单次请求独占的外部数据库连接，用完即关，不做池化
pub enum DynamicConnection {
    Postgres(PgConnection),
    MySql(MySqlConnection),
    Sqlite(SqliteConnection),
}

macro_rules! bind_params {
    ($db:ty, $sql:expr, $params:expr) => {{
        let mut query = sqlx::query::<$db>($sql);
        for param in $params {
            query = match param.clone() {
                TypedValue::Null => query.bind(None::<String>),
                TypedValue::Bool(v) => query.bind(v),
                TypedValue::Int(v) => query.bind(v),
                TypedValue::Float(v) => query.bind(v),
                TypedValue::Text(v) => query.bind(v),
                TypedValue::Date(v) => query.bind(v),
                TypedValue::Time(v) => query.bind(v),
                TypedValue::DateTime(v) => query.bind(v),
                TypedValue::DateTimeUtc(v) => query.bind(v),
                TypedValue::Json(v) => query.bind(Json(v)),
            };
        }
        query
    }};
}

macro_rules! run_statement {
    ($db:ty, $conn:expr, $plan:expr, $to_json:path) => {{
        let query = bind_params!($db, $plan.sql.as_str(), &$plan.params);
        if $plan.returns_rows {
            let rows = query.fetch_all(&mut *$conn).await?;
            ExecutionResult::Rows(rows.iter().map($to_json).collect())
        } else {
            let done = query.execute(&mut *$conn).await?;
            debug!(rows_affected = done.rows_affected(), "语句已执行，后端不返回结果行");
            ExecutionResult::Empty
        }
    }};
}

impl DynamicConnection {
    pub async fn open(
        uri: &str,
        backend: Backend,
        options: &ConnectionOptions,
    ) -> Result<Self, QueryError> {
        let conn = match backend {
            Backend::Postgres => {
                let mut opts = PgConnectOptions::from_str(uri).map_err(bad_uri)?;
                if let Some(name) = &options.application_name {
                    opts = opts.application_name(name);
                }
                if let Some(mode) = &options.ssl_mode {
                    opts = opts.ssl_mode(PgSslMode::from_str(mode).map_err(bad_uri)?);
                }
                if let Some(capacity) = options.statement_cache_capacity {
                    opts = opts.statement_cache_capacity(capacity);
                }
                DynamicConnection::Postgres(opts.connect().await?)
            }
            Backend::MySql => {
                let mut opts = MySqlConnectOptions::from_str(uri).map_err(bad_uri)?;
                if let Some(mode) = &options.ssl_mode {
                    opts = opts.ssl_mode(MySqlSslMode::from_str(mode).map_err(bad_uri)?);
                }
                if let Some(charset) = &options.charset {
                    opts = opts.charset(charset);
                }
                if let Some(capacity) = options.statement_cache_capacity {
                    opts = opts.statement_cache_capacity(capacity);
                }
                DynamicConnection::MySql(opts.connect().await?)
            }
            Backend::Sqlite => {
                let mut opts = SqliteConnectOptions::from_str(uri).map_err(bad_uri)?;
                if let Some(read_only) = options.read_only {
                    opts = opts.read_only(read_only);
                }
                if let Some(create) = options.create_if_missing {
                    opts = opts.create_if_missing(create);
                }
                if let Some(timeout) = options.busy_timeout {
                    opts = opts.busy_timeout(timeout);
                }
                if let Some(capacity) = options.statement_cache_capacity {
                    opts = opts.statement_cache_capacity(capacity);
                }
                DynamicConnection::Sqlite(opts.connect().await?)
            }
        };
        Ok(conn)
    }

    /// 关闭失败只记日志，不覆盖语句本身的结果
    pub async fn close(self) {
        let res = match self {
            DynamicConnection::Postgres(c) => c.close().await,
            DynamicConnection::MySql(c) => c.close().await,
            DynamicConnection::Sqlite(c) => c.close().await,
        };
        if let Err(e) = res {
            warn!(error = %e, "关闭外部连接失败");
        }
    }

    pub async fn run(&mut self, plan: &StatementPlan) -> Result<ExecutionResult, QueryError> {
        let result = match self {
            DynamicConnection::Postgres(conn) => {
                run_statement!(Postgres, conn, plan, pg_row_to_json)
            }
            DynamicConnection::MySql(conn) => run_statement!(MySql, conn, plan, mysql_row_to_json),
            DynamicConnection::Sqlite(conn) => {
                run_statement!(Sqlite, conn, plan, sqlite_row_to_json)
            }
        };
        Ok(result)
    }

    /// 探测连接可见的所有表名
    pub async fn list_tables(&mut self) -> Result<Vec<String>, QueryError> {
        let tables = match self {
            DynamicConnection::Postgres(conn) => {
                let rows = sqlx::query(
                    "SELECT tablename::text FROM pg_catalog.pg_tables WHERE schemaname = current_schema() ORDER BY tablename",
                )
                .fetch_all(&mut *conn)
                .await?;
                rows.into_iter().filter_map(|r| r.try_get::<String, _>(0).ok()).collect()
            }
            DynamicConnection::MySql(conn) => {
                let rows = sqlx::query(
                    "SELECT CAST(TABLE_NAME AS CHAR) FROM information_schema.TABLES WHERE TABLE_SCHEMA = DATABASE() ORDER BY TABLE_NAME",
                )
                .fetch_all(&mut *conn)
                .await?;
                rows.into_iter().filter_map(|r| r.try_get::<String, _>(0).ok()).collect()
            }
            DynamicConnection::Sqlite(conn) => {
                let rows = sqlx::query(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                )
                .fetch_all(&mut *conn)
                .await?;
                rows.into_iter().filter_map(|r| r.try_get::<String, _>(0).ok()).collect()
            }
        };
        Ok(tables)
    }

    /// 探测指定表的列目录；表不存在时返回空列表
    pub async fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>, QueryError> {
        let columns = match self {
            DynamicConnection::Postgres(conn) => {
                let rows = sqlx::query(
                    "SELECT column_name::text, data_type::text, is_nullable::text, column_default::text
                     FROM information_schema.columns
                     WHERE table_schema = current_schema() AND table_name = $1
                     ORDER BY ordinal_position",
                )
                .bind(table)
                .fetch_all(&mut *conn)
                .await?;
                rows.iter()
                    .map(|r| -> Result<ColumnInfo, sqlx::Error> {
                        Ok(ColumnInfo {
                            name: r.try_get(0)?,
                            column_type: r.try_get(1)?,
                            nullable: r.try_get::<String, _>(2)? == "YES",
                            default: r.try_get(3)?,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            DynamicConnection::MySql(conn) => {
                let rows = sqlx::query(
                    "SELECT CAST(COLUMN_NAME AS CHAR), CAST(COLUMN_TYPE AS CHAR), CAST(IS_NULLABLE AS CHAR), CAST(COLUMN_DEFAULT AS CHAR)
                     FROM information_schema.COLUMNS
                     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
                     ORDER BY ORDINAL_POSITION",
                )
                .bind(table)
                .fetch_all(&mut *conn)
                .await?;
                rows.iter()
                    .map(|r| -> Result<ColumnInfo, sqlx::Error> {
                        Ok(ColumnInfo {
                            name: r.try_get(0)?,
                            column_type: r.try_get(1)?,
                            nullable: r.try_get::<String, _>(2)? == "YES",
                            default: r.try_get(3)?,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            DynamicConnection::Sqlite(conn) => {
                let rows = sqlx::query(
                    "SELECT name, type, \"notnull\", dflt_value FROM pragma_table_info(?1) ORDER BY cid",
                )
                .bind(table)
                .fetch_all(&mut *conn)
                .await?;
                rows.iter()
                    .map(|r| -> Result<ColumnInfo, sqlx::Error> {
                        Ok(ColumnInfo {
                            name: r.try_get(0)?,
                            column_type: r.try_get(1)?,
                            nullable: r.try_get::<i64, _>(2)? == 0,
                            default: r.try_get(3)?,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(columns)
    }

    /// 逐表内省，单表失败置为 null，不影响其它表；认证失效直接中止
    pub async fn inspect(&mut self, tables: Option<&[String]>) -> Result<ColumnCatalog, QueryError> {
        let tables = match tables {
            Some(tables) => tables.to_vec(),
            None => self.list_tables().await?,
        };
        let mut catalog = ColumnCatalog::new();
        for table in tables {
            let entry = match self.list_columns(&table).await {
                Ok(columns) if columns.is_empty() => Err(QueryError::Introspection {
                    table: table.clone(),
                    reason: "table not found".to_string(),
                }),
                other => other,
            };
            match entry {
                Ok(columns) => {
                    catalog.insert(table, Some(columns));
                }
                Err(e @ QueryError::AuthenticationExpired(_)) => return Err(e),
                Err(e) => {
                    warn!(table = %table, error = %e, "表内省失败，结果置为 null");
                    catalog.insert(table, None);
                }
            }
        }
        Ok(catalog)
    }
}

/// 打开连接、执行计划、关闭连接；任何退出路径都会释放连接
pub async fn execute(
    descriptor: &ConnectionDescriptor,
    caps: &Capabilities,
    plan: &Plan,
    default_timeout: Duration,
) -> Result<ExecutionResult, QueryError> {
    let options = ConnectionOptions::parse(caps.backend, &descriptor.options)?;
    let limit = options.statement_timeout.unwrap_or(default_timeout);
    let uri = caps.connect_uri(&descriptor.uri);

    let mut conn = tokio::time::timeout(limit, DynamicConnection::open(&uri, caps.backend, &options))
        .await
        .map_err(|_| QueryError::Execution(format!("connect timed out after {limit:?}")))??;

    let outcome = match plan {
        Plan::Statement(statement) => tokio::time::timeout(limit, conn.run(statement)).await,
        Plan::Inspect { tables } => tokio::time::timeout(limit, async {
            conn.inspect(tables.as_deref()).await.map(ExecutionResult::Catalog)
        })
        .await,
    };
    conn.close().await;

    outcome.map_err(|_| QueryError::Execution(format!("statement timed out after {limit:?}")))?
}

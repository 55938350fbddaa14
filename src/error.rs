use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::{error::DatabaseError, sqlite::SqliteError};
use thiserror::Error;

/// 网关的统一错误分类
///
/// 编译期错误（请求结构、取值解析、字段/操作符）在打开连接之前返回；
/// 执行期错误（认证失效、后端失败）在语句尝试之后返回。
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("malformed request: {0}")]
    RequestShape(String),

    #[error("unsupported value type `{0}`")]
    UnsupportedValueType(String),

    #[error("cannot parse {value} as {value_type}: {reason}")]
    ValueFormat {
        value_type: String,
        value: String,
        reason: String,
    },

    #[error("operator `{operator}` needs {expected} values, got {found}")]
    Arity {
        operator: String,
        expected: usize,
        found: usize,
    },

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("unknown conjunction `{0}`")]
    UnknownConjunction(String),

    #[error("unsupported backend scheme `{0}`")]
    UnsupportedBackend(String),

    #[error("authentication expired: {0}")]
    AuthenticationExpired(String),

    #[error("cannot inspect table `{table}`: {reason}")]
    Introspection { table: String, reason: String },

    #[error("execution failed: {0}")]
    Execution(String),
}

const SQLITE_AUTH: i32 = 23;

/// SQLSTATE 28xxx 为认证失败（Postgres、MySQL）
pub fn is_sqlstate_auth(code: Option<&str>) -> bool {
    code.is_some_and(|code| code.starts_with("28"))
}

/// SQLite 报的是扩展错误码，低 8 位为主错误码，如 SQLITE_AUTH_USER = 279
pub fn is_sqlite_auth(code: Option<&str>) -> bool {
    code.and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| code & 0xff == SQLITE_AUTH)
}

fn is_auth_failure(db: &(dyn DatabaseError + 'static)) -> bool {
    let code = db.code();
    if db.try_downcast_ref::<SqliteError>().is_some() {
        is_sqlite_auth(code.as_deref())
    } else {
        is_sqlstate_auth(code.as_deref())
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if is_auth_failure(&**db) => {
                QueryError::AuthenticationExpired(db.message().to_string())
            }
            sqlx::Error::Database(db) => QueryError::Execution(db.message().to_string()),
            _ => QueryError::Execution(err.to_string()),
        }
    }
}

impl QueryError {
    pub fn status(&self) -> StatusCode {
        match self {
            QueryError::RequestShape(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QueryError::AuthenticationExpired(_) => StatusCode::UNAUTHORIZED,
            QueryError::Execution(_) | QueryError::Introspection { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            QueryError::RequestShape(message) => json!({
                "status_code": 10422,
                "message": message,
                "data": null,
            }),
            QueryError::AuthenticationExpired(_) => json!({ "result": null }),
            other => json!({ "message": other.to_string(), "result": null }),
        };
        (status, Json(body)).into_response()
    }
}

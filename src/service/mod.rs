use tracing::{debug, info, instrument};

use crate::core::capabilities::Capabilities;
use crate::core::planner::{self, Plan};
use crate::error::QueryError;
use crate::infra::config::AppConfig;
use crate::infra::db_external;
use crate::models::operation::{ExecutionResult, QueryEnvelope};

/// 处理一个请求信封：校验 -> 推断 -> 编译 -> 规划 -> 执行
///
/// 编译期错误在打开连接之前返回。
#[instrument(skip_all, fields(op = envelope.operation.kind()))]
pub async fn run_envelope(
    config: &AppConfig,
    envelope: &QueryEnvelope,
) -> Result<ExecutionResult, QueryError> {
    envelope.validate(config.max_filter_depth)?;
    let caps = Capabilities::for_uri(&envelope.connection_descriptor.uri)?;
    let plan = planner::plan(&envelope.operation, &caps)?;

    match &plan {
        Plan::Statement(statement) => {
            info!(backend = ?caps.backend, sql = %statement.sql, "执行编译后的语句");
            debug!(params = ?statement.params, returns_rows = statement.returns_rows, "语句参数");
        }
        Plan::Inspect { tables } => {
            info!(backend = ?caps.backend, tables = ?tables, "开始内省表结构");
        }
    }

    db_external::execute(
        &envelope.connection_descriptor,
        &caps,
        &plan,
        config.statement_timeout,
    )
    .await
}

use axum::{
    extract::{rejection::JsonRejection, State},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::{error, warn};

use crate::ax_state::AppState;
use crate::error::QueryError;
use crate::models::operation::{QueryEnvelope, QueryResponse};
use crate::service::run_envelope;

/// 通用数据访问入口：请求体为 `{connectionDescriptor, operation}`
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryEnvelope>, JsonRejection>,
) -> Response {
    let Json(envelope) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            let message = rejection.body_text().replace('\n', " ");
            warn!("请求结构校验失败: {}", message);
            return QueryError::RequestShape(message).into_response();
        }
    };

    match run_envelope(&state.config, &envelope).await {
        Ok(result) => Json(QueryResponse::from(result)).into_response(),
        Err(e) => {
            match &e {
                QueryError::AuthenticationExpired(_) => warn!("外部数据源认证失效: {}", e),
                QueryError::Execution(_) => error!("语句执行失败: {}", e),
                _ => warn!("请求被拒绝: {}", e),
            }
            e.into_response()
        }
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub mod api;
pub mod core;
pub mod error;
pub mod infra;
pub mod models;
pub mod service;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::query::{execute_query, healthz};
use crate::infra::config::AppConfig;

pub mod ax_state {
    use crate::infra::config::AppConfig;

    /// 无共享可变状态：每个请求各自打开、关闭外部连接
    pub struct AppState {
        pub config: AppConfig,
    }
}

pub fn router(config: AppConfig) -> Router {
    let state = Arc::new(ax_state::AppState { config });
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/v1/query", post(execute_query))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

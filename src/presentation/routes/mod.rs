// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::presentation::handlers::crawl_handler;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// 创建应用路由
///
/// 调用方需要以 `Extension<Arc<SubmitCrawlUseCase>>` 注入提交用例
///
/// # 返回值
///
/// 返回配置好的路由
pub fn routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/crawl", post(crawl_handler::submit_crawl))
        .layer(TraceLayer::new_for_http())
}

/// 健康检查
async fn health_check() -> &'static str {
    "OK"
}

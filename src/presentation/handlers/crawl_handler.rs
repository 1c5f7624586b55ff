// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use crate::application::{
    dto::crawl_request::{CrawlRequestDto, CrawlSubmittedDto},
    use_cases::submit_crawl::{SubmitCrawlUseCase, SubmitError},
};

/// 提交新的爬取作业
///
/// 成功时返回 200 和 `{"data": {"job_id", "status", "message"}}`，
/// 请求无效或发布失败时返回 400 和 `{"data": null, "message"}`
pub async fn submit_crawl(
    Extension(use_case): Extension<Arc<SubmitCrawlUseCase>>,
    payload: Result<Json<CrawlRequestDto>, JsonRejection>,
) -> impl IntoResponse {
    let Json(dto) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid request: {}", rejection.body_text()),
            )
        }
    };

    match use_case.submit(dto).await {
        Ok(job) => (
            StatusCode::OK,
            Json(json!({ "data": CrawlSubmittedDto::pending(job.id) })),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Crawl submission rejected");
            let (status, msg): (StatusCode, String) = e.into();
            error_response(status, msg)
        }
    }
}

fn error_response(status: StatusCode, message: String) -> axum::response::Response {
    (status, Json(json!({ "data": null, "message": message }))).into_response()
}

impl From<SubmitError> for (StatusCode, String) {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            SubmitError::Queue(e) => (
                StatusCode::BAD_REQUEST,
                format!("Failed to enqueue crawl job: {}", e),
            ),
        }
    }
}

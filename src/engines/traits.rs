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

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

/// 抓取错误类型
#[derive(Error, Debug)]
pub enum FetchError {
    /// 请求失败（连接、TLS、读取响应体等）
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// 非2xx状态码
    #[error("Unexpected status code: {0}")]
    Status(u16),
    /// 超时
    #[error("Timeout")]
    Timeout,
}

impl FetchError {
    /// 判断错误是否可重试
    ///
    /// # 返回值
    ///
    /// 如果错误是可重试的则返回true，否则返回false
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Request(e) => e.is_timeout() || e.is_connect(),
            FetchError::Status(code) => *code >= 500 || *code == 429,
            FetchError::Timeout => true,
        }
    }
}

/// 抓取响应
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// HTTP状态码
    pub status_code: u16,
    /// 原始响应体
    pub body: Bytes,
    /// 内容类型
    pub content_type: Option<String>,
    /// 响应时间（毫秒）
    pub response_time_ms: u64,
}

/// 页面抓取特质
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// 以GET方式抓取页面，只有2xx状态码视为成功
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;

    /// 引擎名称
    fn name(&self) -> &'static str;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        (**self).fetch(url).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

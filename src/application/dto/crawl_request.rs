// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// 可接受的最大递归深度，与页面表中 `depth_level` 的整数范围一致
pub const MAX_CRAWL_DEPTH: u32 = i32::MAX as u32;

/// 提交爬取请求
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CrawlRequestDto {
    #[validate(length(min = 1, message = "url is required"))]
    pub url: String,
    /// 递归深度，0 表示只抓取种子页面
    #[serde(default)]
    #[validate(range(max = MAX_CRAWL_DEPTH, message = "depth is out of range"))]
    pub depth: u32,
    #[serde(default)]
    pub selectors: Vec<String>,
}

/// 提交成功后的响应数据
#[derive(Debug, Deserialize, Serialize)]
pub struct CrawlSubmittedDto {
    pub job_id: Uuid,
    pub status: String,
    pub message: String,
}

impl CrawlSubmittedDto {
    pub fn pending(job_id: Uuid) -> Self {
        Self {
            job_id,
            status: "pending".to_string(),
            message: "Crawl job submitted".to_string(),
        }
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::models::crawl_job::CrawlJob;

/// 页面处理状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageStatus {
    /// 抓取、提取和原始内容保存均已完成
    Completed,
    /// 失败记录（由外部回填流程写入）
    Failed,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Completed => "completed",
            PageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(PageStatus::Completed),
            "failed" => Ok(PageStatus::Failed),
            other => Err(format!("Unknown page status: {}", other)),
        }
    }
}

/// 爬取页面记录
///
/// 处理一个作业后持久化的结果。`id` 与来源作业的ID相同，
/// 因此重复投递只会覆盖同一条记录，而不会产生重复行。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlPage {
    /// 等于来源作业的ID
    pub id: Uuid,
    /// 父作业ID
    pub parent_id: Option<Uuid>,
    /// 页面URL
    pub url: String,
    /// 去除首尾空白的页面标题
    pub title: String,
    /// 原始内容的存储位置
    pub file_path: String,
    /// 选择器 -> 提取文本
    pub parsed_data: BTreeMap<String, String>,
    /// 处理状态
    pub status: PageStatus,
    /// 处理时作业的剩余深度
    pub depth_level: u32,
    /// 创建时间
    pub created_at: DateTime<Utc>,
}

impl CrawlPage {
    /// 根据作业和提取结果构建已完成的页面记录
    pub fn completed(
        job: &CrawlJob,
        title: String,
        file_path: String,
        parsed_data: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: job.id,
            parent_id: job.parent_id,
            url: job.url.clone(),
            title,
            file_path,
            parsed_data,
            status: PageStatus::Completed,
            depth_level: job.depth,
            created_at: Utc::now(),
        }
    }
}

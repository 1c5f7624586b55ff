// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// 爬取作业
///
/// 分发到队列中的最小工作单元：一个URL加上剩余的递归深度预算。
/// 作业只以队列消息的形式存在，本身从不持久化。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlJob {
    /// 作业唯一标识符，创建时生成，永不复用
    pub id: Uuid,
    /// 发现此作业的父作业ID，根作业为空
    ///
    /// 仅为尽力而为的血缘指针，不保证父作业已经持久化
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub parent_id: Option<Uuid>,
    /// 需要抓取的绝对URL
    pub url: String,
    /// 剩余递归深度，每生成一代子作业减一
    pub depth: u32,
    /// CSS选择器列表，原样传递给所有子作业
    #[serde(default, deserialize_with = "null_as_empty")]
    pub selectors: Vec<String>,
    /// 创建时间
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl CrawlJob {
    /// 创建根作业
    pub fn root(url: impl Into<String>, depth: u32, selectors: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            url: url.into(),
            depth,
            selectors,
            created_at: Utc::now(),
        }
    }

    /// 基于父作业创建子作业
    ///
    /// 子作业获得新的ID，深度减一，并继承父作业的选择器。
    /// 调用方必须保证 `parent.depth > 0`。
    pub fn child(parent: &CrawlJob, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: Some(parent.id),
            url: url.into(),
            depth: parent.depth.saturating_sub(1),
            selectors: parent.selectors.clone(),
            created_at: Utc::now(),
        }
    }

    /// 消息键，即作业ID的字符串形式
    pub fn key(&self) -> String {
        self.id.to_string()
    }

    /// 编码为队列消息体
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// 从队列消息体解码
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

// Older producers write an empty string instead of omitting the field.
fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

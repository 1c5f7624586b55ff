// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::url_utils::{has_http_scheme, resolve_url};
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// 链接发现器
///
/// 负责从页面中发现可递归抓取的子链接
pub struct LinkDiscoverer;

impl LinkDiscoverer {
    /// 从HTML文档中提取链接
    ///
    /// 每个 `<a href>` 都相对页面自身的URL解析为绝对URL，
    /// 丢弃解析失败、非 HTTP(S) 以及本次扫描中已出现过的链接。
    /// 去重集合只属于这一次调用，不在作业之间共享
    ///
    /// # 参数
    ///
    /// * `document` - 已解析的HTML文档
    /// * `base_url` - 页面URL
    ///
    /// # 返回值
    ///
    /// 按文档顺序排列的唯一绝对URL
    pub fn discover_links(document: &Html, base_url: &Url) -> Vec<String> {
        let selector = match Selector::parse("a[href]") {
            Ok(selector) => selector,
            Err(_) => return Vec::new(),
        };

        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };

            let Ok(resolved) = resolve_url(base_url, href.trim()) else {
                continue;
            };

            if !has_http_scheme(&resolved) {
                continue;
            }

            let link = resolved.to_string();
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }

        links
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 判断字符串是否以 HTTP(S) 协议开头
///
/// 作业在进行任何网络请求之前使用此检查进行校验
pub fn is_http_url(url: &str) -> bool {
    let lower = url.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// 判断已解析的URL是否为 HTTP(S) 协议
pub fn has_http_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// 未提供选择器时，默认提取结果使用的键
pub const META_DESCRIPTION_KEY: &str = "meta_description";

/// 在文档开头查找 `<meta charset>` 的字节数
const META_PRESCAN_BYTES: usize = 1024;

/// 提取错误类型
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// 响应声明了无法识别的字符集
    #[error("Unsupported charset: {0}")]
    UnsupportedCharset(String),
}

/// 从单个页面中提取的数据
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    /// 去除首尾空白的页面标题
    pub title: String,
    /// 选择器 -> 文本
    pub parsed_data: BTreeMap<String, String>,
}

/// 提取服务
///
/// 负责将响应体解码为文本，并从 HTML 文档中提取标题和选择器数据
pub struct ExtractionService;

impl ExtractionService {
    /// 将响应体解码为文本
    ///
    /// 优先使用 Content-Type 中声明的字符集；未声明时依次参考 BOM、
    /// 文档开头的 `<meta charset>`，最后由 chardetng 猜测。
    /// 非法字节会被替换而不是报错
    ///
    /// # 参数
    ///
    /// * `body` - 原始响应体
    /// * `content_type` - 响应的 Content-Type 头
    ///
    /// # 返回值
    ///
    /// * `Ok(String)` - 解码后的文本
    /// * `Err(ExtractionError)` - Content-Type 声明了无法识别的字符集
    pub fn decode_body(body: &[u8], content_type: Option<&str>) -> Result<String, ExtractionError> {
        let encoding = match content_type.and_then(charset_label) {
            Some(label) => Encoding::for_label(label.as_bytes())
                .ok_or_else(|| ExtractionError::UnsupportedCharset(label.to_string()))?,
            None => sniff_encoding(body),
        };

        let (decoded, used, had_errors) = encoding.decode(body);
        if had_errors {
            warn!(charset = used.name(), "Body contained malformed sequences");
        }
        Ok(decoded.into_owned())
    }

    /// 提取标题和选择器数据
    ///
    /// 每个选择器取所有匹配元素的文本拼接后去除首尾空白，非空才记录；
    /// 选择器列表为空时，若存在 `meta[name="description"]` 则记录其 content。
    /// 无效的选择器会被跳过
    pub fn extract(document: &Html, selectors: &[String]) -> ExtractedPage {
        let title = match Selector::parse("title") {
            Ok(selector) => collect_text(document, &selector),
            Err(_) => String::new(),
        };

        let mut parsed_data = BTreeMap::new();

        if selectors.is_empty() {
            if let Ok(selector) = Selector::parse(r#"meta[name="description"]"#) {
                if let Some(content) = document
                    .select(&selector)
                    .next()
                    .and_then(|element| element.value().attr("content"))
                {
                    parsed_data.insert(META_DESCRIPTION_KEY.to_string(), content.to_string());
                }
            }
        }

        for raw in selectors {
            let selector = match Selector::parse(raw) {
                Ok(selector) => selector,
                Err(e) => {
                    warn!(selector = %raw, error = ?e, "Skipping invalid selector");
                    continue;
                }
            };

            let text = collect_text(document, &selector);
            if !text.is_empty() {
                parsed_data.insert(raw.clone(), text);
            }
        }

        ExtractedPage { title, parsed_data }
    }
}

fn collect_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .flat_map(|element| element.text())
        .collect::<String>()
        .trim()
        .to_string()
}

fn sniff_encoding(body: &[u8]) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(body) {
        return encoding;
    }
    if let Some(encoding) = meta_charset(body) {
        return encoding;
    }
    if std::str::from_utf8(body).is_ok() {
        return UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    debug!(charset = encoding.name(), "Detected body encoding");
    encoding
}

/// 在文档开头的 `<meta>` 标签中查找字符集声明
///
/// 同时识别 `<meta charset=...>` 和 `<meta http-equiv content="...; charset=...">`
fn meta_charset(body: &[u8]) -> Option<&'static Encoding> {
    let head = &body[..body.len().min(META_PRESCAN_BYTES)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    let mut rest = head.as_str();
    while let Some(start) = rest.find("<meta") {
        let tag = &rest[start..];
        let tag = &tag[..tag.find('>').unwrap_or(tag.len())];
        if let Some(pos) = tag.find("charset=") {
            let label: String = tag[pos + "charset=".len()..]
                .trim_start_matches(['"', '\'', ' '])
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
                .collect();
            if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
                // A UTF-16 declaration inside an ASCII-compatible prescan means UTF-8
                if encoding == UTF_16LE || encoding == UTF_16BE {
                    return Some(UTF_8);
                }
                return Some(encoding);
            }
        }
        rest = &rest[start + "<meta".len()..];
    }
    None
}

fn charset_label(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            Some(value.trim().trim_matches('"'))
        } else {
            None
        }
    })
}

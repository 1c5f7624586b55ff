// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域服务模块
///
/// 包含的服务：
/// - 爬取服务（crawl_service）：从页面中发现待递归的子链接
/// - 提取服务（extraction_service）：解码响应体并提取标题和选择器数据
///
/// 两者都只操作已解析的文档，不做任何I/O。
pub mod crawl_service;
pub mod extraction_service;

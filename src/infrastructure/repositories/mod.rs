// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供页面仓库接口的 sea-orm 实现和内存实现
pub mod crawl_page_repo_impl;
pub mod in_memory_page_repo;

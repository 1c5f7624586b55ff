// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域模型模块
///
/// 该模块定义了系统的核心业务实体，包括：
/// - 爬取作业（crawl_job）：在队列中流转的工作单元
/// - 爬取页面（crawl_page）：处理一个作业后持久化的结果
pub mod crawl_job;
pub mod crawl_page;

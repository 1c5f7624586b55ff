// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 具体实现由基础设施层提供：
/// - 爬取页面仓库（crawl_page_repository）：页面元数据的插入或覆盖
/// - 存储仓库（storage_repository）：原始页面内容的保存
pub mod crawl_page_repository;
pub mod storage_repository;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 作业队列接口与投递类型
pub mod job_queue;
/// Kafka实现
pub mod kafka;
/// 内存实现
pub mod memory;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_job::CrawlJob;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// Broker 不可用或客户端创建失败
    #[error("Broker unavailable: {0}")]
    BrokerUnavailable(String),

    /// 发布在确认超时内未得到确认
    #[error("Publish timed out")]
    PublishTimeout,

    /// 消费错误
    #[error("Consume error: {0}")]
    Consume(String),

    /// 位点提交错误
    #[error("Commit error: {0}")]
    Commit(String),

    /// 分区已被重新分配给其他消费者，不能再提交位点
    #[error("Partition {0} is no longer assigned to this consumer")]
    PartitionRevoked(i32),

    /// 作业编码错误
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// 位点确认器
///
/// 由具体队列实现提供，`Delivery::ack` 通过它提交消费位点
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// 提交下一条待消费的位点
    async fn commit(&self, topic: &str, partition: i32, next_offset: i64) -> Result<(), QueueError>;
}

/// 一条已投递的消息
///
/// 只有在处理完成后调用 `ack` 才会推进消费组位点；
/// 未确认的消息在重新平衡或重启后会被再次投递
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Vec<u8>,
    acker: Arc<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        topic: String,
        partition: i32,
        offset: i64,
        key: Option<Vec<u8>>,
        payload: Vec<u8>,
        acker: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            topic,
            partition,
            offset,
            key,
            payload,
            acker,
        }
    }

    /// 确认消息，提交 `offset + 1`
    pub async fn ack(&self) -> Result<(), QueueError> {
        self.acker
            .commit(&self.topic, self.partition, self.offset + 1)
            .await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("topic", &self.topic)
            .field("partition", &self.partition)
            .field("offset", &self.offset)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// 订阅流中的事件
#[derive(Debug)]
pub enum QueueEvent {
    /// 一条待处理的消息
    Delivery(Delivery),
    /// 这些分区已被收回，之后对它们的提交都会失败
    Revoked(Vec<i32>),
}

impl QueueEvent {
    pub fn into_delivery(self) -> Option<Delivery> {
        match self {
            QueueEvent::Delivery(delivery) => Some(delivery),
            QueueEvent::Revoked(_) => None,
        }
    }
}

/// 订阅事件流
pub type EventStream = BoxStream<'static, Result<QueueEvent, QueueError>>;

/// 消息队列特质
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// 发布消息并等待 broker 确认
    ///
    /// # 参数
    ///
    /// * `topic` - 目标主题
    /// * `key` - 分区键
    /// * `payload` - 消息体
    ///
    /// # 返回值
    ///
    /// * `Ok((partition, offset))` - 确认后的分区与位点
    /// * `Err(QueueError)` - 发布失败或超时
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(i32, i64), QueueError>;

    /// 以消费组身份订阅主题
    ///
    /// 返回的流按分区保序地产出消息，位点不会自动提交；
    /// 消费组重新平衡收回分区时产出 `QueueEvent::Revoked`
    async fn subscribe(&self, topic: &str, group_id: &str) -> Result<EventStream, QueueError>;

    /// 编码并发布作业，以作业ID作为分区键
    async fn publish_job(&self, topic: &str, job: &CrawlJob) -> Result<(i32, i64), QueueError> {
        let payload = job.encode()?;
        self.publish(topic, &job.key(), &payload).await
    }
}

#[async_trait]
impl<T: MessageQueue + ?Sized> MessageQueue for Arc<T> {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(i32, i64), QueueError> {
        (**self).publish(topic, key, payload).await
    }

    async fn subscribe(&self, topic: &str, group_id: &str) -> Result<EventStream, QueueError> {
        (**self).subscribe(topic, group_id).await
    }
}

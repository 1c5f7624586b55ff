// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_queue::{
    Acknowledger, Delivery, EventStream, MessageQueue, QueueError, QueueEvent,
};
use crate::config::settings::KafkaSettings;
use async_trait::async_trait;
use parking_lot::RwLock;
use rdkafka::consumer::{CommitMode, Consumer, ConsumerContext, Rebalance, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{ClientConfig, ClientContext, Offset, TopicPartitionList};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Kafka消息队列
///
/// 生产端使用 `acks=all` 并等待确认；消费端关闭自动提交，
/// 由 `Delivery::ack` 在处理完成后显式提交位点
pub struct KafkaQueue {
    producer: FutureProducer,
    bootstrap_servers: String,
    publish_timeout: Duration,
    session_timeout_ms: u64,
}

impl KafkaQueue {
    /// 创建新的Kafka队列实例
    ///
    /// # 参数
    ///
    /// * `settings` - Kafka配置
    ///
    /// # 返回值
    ///
    /// * `Ok(KafkaQueue)` - 生产者创建成功
    /// * `Err(QueueError)` - 客户端配置无效
    pub fn new(settings: &KafkaSettings) -> Result<Self, QueueError> {
        let bootstrap_servers = settings.bootstrap_servers();
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &bootstrap_servers)
            .set("acks", "all")
            .set("message.timeout.ms", settings.publish_timeout_ms.to_string())
            .create()
            .map_err(|e| QueueError::BrokerUnavailable(e.to_string()))?;

        info!("Kafka producer created for brokers {}", bootstrap_servers);

        Ok(Self {
            producer,
            bootstrap_servers,
            publish_timeout: settings.publish_timeout(),
            session_timeout_ms: settings.session_timeout_ms,
        })
    }
}

fn map_publish_error(err: KafkaError) -> QueueError {
    match err {
        KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut) => QueueError::PublishTimeout,
        other => QueueError::BrokerUnavailable(other.to_string()),
    }
}

/// 跟踪消费组分配给本消费者的分区
///
/// 回调在 librdkafka 的轮询线程上同步执行，只更新分区集合并发送通知
struct RebalanceContext {
    topic: String,
    assigned: Arc<RwLock<HashSet<i32>>>,
    revoked_tx: mpsc::UnboundedSender<Vec<i32>>,
}

impl RebalanceContext {
    fn partitions(&self, tpl: &TopicPartitionList) -> Vec<i32> {
        tpl.elements_for_topic(&self.topic)
            .iter()
            .map(|elem| elem.partition())
            .collect()
    }
}

impl ClientContext for RebalanceContext {}

impl ConsumerContext for RebalanceContext {
    fn pre_rebalance<'a>(&self, rebalance: &Rebalance<'a>) {
        if let Rebalance::Revoke(tpl) = rebalance {
            let partitions = self.partitions(tpl);
            if partitions.is_empty() {
                return;
            }
            {
                let mut assigned = self.assigned.write();
                for partition in &partitions {
                    assigned.remove(partition);
                }
            }
            info!(topic = %self.topic, ?partitions, "Partitions revoked");
            // the receiver is gone once the stream is dropped
            let _ = self.revoked_tx.send(partitions);
        }
    }

    fn post_rebalance<'a>(&self, rebalance: &Rebalance<'a>) {
        match rebalance {
            Rebalance::Assign(tpl) => {
                let partitions = self.partitions(tpl);
                self.assigned.write().extend(partitions.iter().copied());
                info!(topic = %self.topic, ?partitions, "Partitions assigned");
            }
            Rebalance::Revoke(_) => {}
            Rebalance::Error(e) => warn!(topic = %self.topic, error = %e, "Rebalance failed"),
        }
    }
}

type RebalancingConsumer = StreamConsumer<RebalanceContext>;

struct KafkaAcker {
    consumer: Arc<RebalancingConsumer>,
    assigned: Arc<RwLock<HashSet<i32>>>,
}

#[async_trait]
impl Acknowledger for KafkaAcker {
    async fn commit(&self, topic: &str, partition: i32, next_offset: i64) -> Result<(), QueueError> {
        if !self.assigned.read().contains(&partition) {
            return Err(QueueError::PartitionRevoked(partition));
        }
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, Offset::Offset(next_offset))
            .map_err(|e| QueueError::Commit(e.to_string()))?;
        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(|e| QueueError::Commit(e.to_string()))
    }
}

#[async_trait]
impl MessageQueue for KafkaQueue {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(i32, i64), QueueError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);
        let (partition, offset) = self
            .producer
            .send(record, Timeout::After(self.publish_timeout))
            .await
            .map_err(|(err, _)| map_publish_error(err))?;

        debug!(topic, key, partition, offset, "Message acknowledged");
        Ok((partition, offset))
    }

    async fn subscribe(&self, topic: &str, group_id: &str) -> Result<EventStream, QueueError> {
        let assigned = Arc::new(RwLock::new(HashSet::new()));
        let (revoked_tx, revoked_rx) = mpsc::unbounded_channel();
        let context = RebalanceContext {
            topic: topic.to_string(),
            assigned: assigned.clone(),
            revoked_tx,
        };

        let consumer: RebalancingConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .create_with_context(context)
            .map_err(|e| QueueError::BrokerUnavailable(e.to_string()))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| QueueError::Consume(e.to_string()))?;

        info!("Subscribed to topic {} as group {}", topic, group_id);

        let consumer = Arc::new(consumer);
        let acker: Arc<dyn Acknowledger> = Arc::new(KafkaAcker {
            consumer: consumer.clone(),
            assigned,
        });

        let stream = futures::stream::unfold(
            (consumer, acker, revoked_rx),
            |(consumer, acker, mut revoked_rx)| async move {
                let item = tokio::select! {
                    biased;
                    Some(partitions) = revoked_rx.recv() => Ok(QueueEvent::Revoked(partitions)),
                    received = consumer.recv() => match received {
                        Ok(msg) => Ok(QueueEvent::Delivery(Delivery::new(
                            msg.topic().to_string(),
                            msg.partition(),
                            msg.offset(),
                            msg.key().map(|k| k.to_vec()),
                            msg.payload().map(|p| p.to_vec()).unwrap_or_default(),
                            acker.clone(),
                        ))),
                        Err(e) => Err(QueueError::Consume(e.to_string())),
                    },
                };
                Some((item, (consumer, acker, revoked_rx)))
            },
        );

        Ok(Box::pin(stream))
    }
}

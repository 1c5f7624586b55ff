// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::job_queue::{Acknowledger, Delivery, EventStream, MessageQueue, QueueError, QueueEvent};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Clone)]
struct Record {
    key: Vec<u8>,
    payload: Vec<u8>,
}

#[derive(Default)]
struct State {
    /// topic -> partition -> records
    topics: HashMap<String, Vec<Vec<Record>>>,
    /// (group, topic, partition) -> next offset
    committed: HashMap<(String, String, i32), i64>,
    subscriptions: HashMap<u64, Subscription>,
    next_subscription: u64,
    fail_publish: bool,
}

struct Subscription {
    group_id: String,
    topic: String,
    owned: HashSet<i32>,
    pending_revoked: Vec<i32>,
}

struct Inner {
    partitions: usize,
    state: Mutex<State>,
    notify: Notify,
}

/// 内存消息队列
///
/// 按键哈希分区、分区内保序、按消费组记录已提交位点。
/// 重新订阅时从已提交位点继续，用于本地运行和测试
#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<Inner>,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(4)
    }
}

impl InMemoryQueue {
    pub fn new(partitions: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                partitions: partitions.max(1),
                state: Mutex::new(State::default()),
                notify: Notify::new(),
            }),
        }
    }

    fn partition_for(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.inner.partitions as u64) as usize
    }

    /// 使后续发布全部失败，模拟 broker 不可用
    pub fn set_fail_publish(&self, fail: bool) {
        self.inner.state.lock().fail_publish = fail;
    }

    /// 模拟消费组重新平衡：把分区从该组现有订阅中收回
    ///
    /// 订阅流随后产出 `QueueEvent::Revoked`，已投递但未提交的消息
    /// 再也无法提交，留给下一个订阅者重新消费
    pub fn revoke(&self, group_id: &str, topic: &str, partition: i32) {
        {
            let mut state = self.inner.state.lock();
            for sub in state.subscriptions.values_mut() {
                if sub.group_id == group_id && sub.topic == topic && sub.owned.remove(&partition) {
                    sub.pending_revoked.push(partition);
                }
            }
        }
        self.inner.notify.notify_waiters();
    }

    /// 某主题中已发布的全部消息体，按分区再按位点排列
    pub fn published(&self, topic: &str) -> Vec<Vec<u8>> {
        let state = self.inner.state.lock();
        state
            .topics
            .get(topic)
            .map(|parts| {
                parts
                    .iter()
                    .flat_map(|records| records.iter().map(|r| r.payload.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 消费组在某分区上已提交的下一位点
    pub fn committed(&self, group_id: &str, topic: &str, partition: i32) -> Option<i64> {
        self.inner
            .state
            .lock()
            .committed
            .get(&(group_id.to_string(), topic.to_string(), partition))
            .copied()
    }

    /// 消费组在某主题所有分区上尚未提交的消息数
    pub fn lag(&self, group_id: &str, topic: &str) -> i64 {
        let state = self.inner.state.lock();
        let Some(parts) = state.topics.get(topic) else {
            return 0;
        };
        parts
            .iter()
            .enumerate()
            .map(|(partition, records)| {
                let next = state
                    .committed
                    .get(&(group_id.to_string(), topic.to_string(), partition as i32))
                    .copied()
                    .unwrap_or(0);
                records.len() as i64 - next
            })
            .sum()
    }
}

struct MemoryAcker {
    inner: Arc<Inner>,
    group_id: String,
    subscription: u64,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn commit(&self, topic: &str, partition: i32, next_offset: i64) -> Result<(), QueueError> {
        let mut state = self.inner.state.lock();
        let owned = state
            .subscriptions
            .get(&self.subscription)
            .is_some_and(|sub| sub.owned.contains(&partition));
        if !owned {
            return Err(QueueError::PartitionRevoked(partition));
        }
        let entry = state
            .committed
            .entry((self.group_id.clone(), topic.to_string(), partition))
            .or_insert(0);
        *entry = (*entry).max(next_offset);
        Ok(())
    }
}

struct Cursor {
    inner: Arc<Inner>,
    acker: Arc<dyn Acknowledger>,
    subscription: u64,
    topic: String,
    positions: Vec<i64>,
    next_partition: usize,
}

impl Cursor {
    fn poll_next(&mut self) -> Option<QueueEvent> {
        let mut state = self.inner.state.lock();
        let sub = state.subscriptions.get_mut(&self.subscription)?;
        if !sub.pending_revoked.is_empty() {
            return Some(QueueEvent::Revoked(std::mem::take(&mut sub.pending_revoked)));
        }
        let owned = sub.owned.clone();
        let parts = state.topics.get(&self.topic)?;
        for step in 0..self.positions.len() {
            let partition = (self.next_partition + step) % self.positions.len();
            if !owned.contains(&(partition as i32)) {
                continue;
            }
            let position = self.positions[partition];
            if let Some(record) = parts[partition].get(position as usize) {
                self.positions[partition] += 1;
                self.next_partition = (partition + 1) % self.positions.len();
                return Some(QueueEvent::Delivery(Delivery::new(
                    self.topic.clone(),
                    partition as i32,
                    position,
                    Some(record.key.clone()),
                    record.payload.clone(),
                    self.acker.clone(),
                )));
            }
        }
        None
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        self.inner.state.lock().subscriptions.remove(&self.subscription);
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn publish(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(i32, i64), QueueError> {
        let partition = self.partition_for(key);
        let offset = {
            let mut state = self.inner.state.lock();
            if state.fail_publish {
                return Err(QueueError::BrokerUnavailable(
                    "in-memory queue set to fail".to_string(),
                ));
            }
            let parts = state
                .topics
                .entry(topic.to_string())
                .or_insert_with(|| vec![Vec::new(); self.inner.partitions]);
            parts[partition].push(Record {
                key: key.as_bytes().to_vec(),
                payload: payload.to_vec(),
            });
            parts[partition].len() as i64 - 1
        };
        self.inner.notify.notify_waiters();
        Ok((partition as i32, offset))
    }

    async fn subscribe(&self, topic: &str, group_id: &str) -> Result<EventStream, QueueError> {
        let (subscription, positions) = {
            let mut state = self.inner.state.lock();
            let positions = (0..self.inner.partitions)
                .map(|p| {
                    state
                        .committed
                        .get(&(group_id.to_string(), topic.to_string(), p as i32))
                        .copied()
                        .unwrap_or(0)
                })
                .collect();
            let id = state.next_subscription;
            state.next_subscription += 1;
            state.subscriptions.insert(
                id,
                Subscription {
                    group_id: group_id.to_string(),
                    topic: topic.to_string(),
                    owned: (0..self.inner.partitions as i32).collect(),
                    pending_revoked: Vec::new(),
                },
            );
            (id, positions)
        };

        let cursor = Cursor {
            inner: self.inner.clone(),
            acker: Arc::new(MemoryAcker {
                inner: self.inner.clone(),
                group_id: group_id.to_string(),
                subscription,
            }),
            subscription,
            topic: topic.to_string(),
            positions,
            next_partition: 0,
        };

        let stream = futures::stream::unfold(cursor, |mut cursor| async move {
            loop {
                let inner = cursor.inner.clone();
                let notified = inner.notify.notified();
                if let Some(event) = cursor.poll_next() {
                    return Some((Ok(event), cursor));
                }
                notified.await;
            }
        });

        Ok(Box::pin(stream))
    }
}

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::crawl_job::CrawlJob;
use crate::domain::repositories::crawl_page_repository::CrawlPageRepository;
use crate::domain::repositories::storage_repository::StorageRepository;
use crate::infrastructure::metrics;
use crate::queue::job_queue::{Delivery, MessageQueue, QueueError, QueueEvent};
use crate::utils::errors::WorkerError;
use crate::workers::crawl_worker::CrawlWorker;
use futures::{FutureExt, StreamExt};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 工作管理器
///
/// 以消费组身份订阅作业主题，为每个分区启动一个独立的工作任务。
/// 同一分区内的消息严格按顺序处理，处理完成后才提交位点。
/// 分区被收回时停止该分区的工作任务，进行中的作业允许完成，
/// 已缓冲的消息保持未确认
pub struct WorkerManager<S, P, Q>
where
    S: StorageRepository + ?Sized + 'static,
    P: CrawlPageRepository + ?Sized + 'static,
    Q: MessageQueue + ?Sized + 'static,
{
    worker: Arc<CrawlWorker<S, P, Q>>,
    queue: Arc<Q>,
    topic: String,
    group_id: String,
    partition_buffer: usize,
    shutdown_grace: Duration,
}

impl<S, P, Q> WorkerManager<S, P, Q>
where
    S: StorageRepository + ?Sized + 'static,
    P: CrawlPageRepository + ?Sized + 'static,
    Q: MessageQueue + ?Sized + 'static,
{
    pub fn new(
        worker: Arc<CrawlWorker<S, P, Q>>,
        queue: Arc<Q>,
        topic: impl Into<String>,
        group_id: impl Into<String>,
    ) -> Self {
        Self {
            worker,
            queue,
            topic: topic.into(),
            group_id: group_id.into(),
            partition_buffer: 16,
            shutdown_grace: Duration::from_secs(30),
        }
    }

    /// 每个分区等待处理的消息缓冲区大小
    pub fn with_partition_buffer(mut self, partition_buffer: usize) -> Self {
        self.partition_buffer = partition_buffer.max(1);
        self
    }

    /// 关闭时等待进行中作业完成的最长时间
    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }

    /// 运行消费循环直到收到关闭信号
    ///
    /// # 参数
    ///
    /// * `shutdown` - 关闭信号
    ///
    /// # 返回值
    ///
    /// * `Ok(())` - 正常关闭
    /// * `Err(WorkerError)` - 订阅失败或某个分区任务异常退出
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), WorkerError> {
        let mut stream = self.queue.subscribe(&self.topic, &self.group_id).await?;
        info!(
            topic = %self.topic,
            group_id = %self.group_id,
            "Consumer runtime started"
        );

        let stop = shutdown.child_token();
        let mut senders: HashMap<i32, PartitionHandle> = HashMap::new();
        // outlives revocation so a reassigned partition waits for the old in-flight job
        let mut serial: HashMap<i32, Arc<Mutex<()>>> = HashMap::new();
        let mut tasks: JoinSet<Result<(), i32>> = JoinSet::new();
        let mut failure: Option<WorkerError> = None;

        loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    info!("Shutdown requested, no longer pulling messages");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Some(err) = task_failure(joined) {
                        failure = Some(err);
                        break;
                    }
                }
                next = stream.next() => {
                    let delivery = match next {
                        Some(Ok(QueueEvent::Delivery(delivery))) => delivery,
                        Some(Ok(QueueEvent::Revoked(partitions))) => {
                            for partition in partitions {
                                if let Some(handle) = senders.remove(&partition) {
                                    handle.stop.cancel();
                                    info!(partition, "Partition revoked, worker stopping after in-flight job");
                                }
                            }
                            continue;
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "Error receiving message");
                            continue;
                        }
                        None => {
                            info!("Message stream ended");
                            break;
                        }
                    };

                    let partition = delivery.partition;
                    let handle = senders.entry(partition).or_insert_with(|| {
                        let (tx, rx) = mpsc::channel(self.partition_buffer);
                        let partition_stop = stop.child_token();
                        let lock = serial.entry(partition).or_default().clone();
                        tasks.spawn(partition_loop(
                            self.worker.clone(),
                            partition,
                            rx,
                            lock,
                            partition_stop.clone(),
                        ));
                        info!(partition, "Partition worker started");
                        PartitionHandle { tx, stop: partition_stop }
                    });

                    tokio::select! {
                        _ = stop.cancelled() => break,
                        sent = handle.tx.send(delivery) => {
                            if sent.is_err() {
                                warn!(partition, "Partition worker is gone, message left unacknowledged");
                            }
                        }
                    }
                }
            }
        }

        stop.cancel();
        drop(senders);

        let drain = async {
            while let Some(joined) = tasks.join_next().await {
                if let Some(err) = task_failure(joined) {
                    failure.get_or_insert(err);
                }
            }
        };
        if tokio::time::timeout(self.shutdown_grace, drain).await.is_err() {
            warn!(
                grace_secs = self.shutdown_grace.as_secs(),
                "Shutdown grace period elapsed, aborting in-flight jobs"
            );
            tasks.abort_all();
        }

        // Dropping the stream releases group membership
        drop(stream);
        info!("Consumer runtime stopped");

        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

struct PartitionHandle {
    tx: mpsc::Sender<Delivery>,
    stop: CancellationToken,
}

fn task_failure(joined: Result<Result<(), i32>, tokio::task::JoinError>) -> Option<WorkerError> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(partition)) => Some(WorkerError::PartitionFailed { partition }),
        Err(e) if e.is_cancelled() => None,
        Err(e) => Some(WorkerError::TaskFailed(e.to_string())),
    }
}

/// 单个分区的顺序处理循环
///
/// 已缓冲但尚未开始处理的消息在关闭或分区被收回时保持未确认状态
async fn partition_loop<S, P, Q>(
    worker: Arc<CrawlWorker<S, P, Q>>,
    partition: i32,
    mut rx: mpsc::Receiver<Delivery>,
    serial: Arc<Mutex<()>>,
    stop: CancellationToken,
) -> Result<(), i32>
where
    S: StorageRepository + ?Sized + 'static,
    P: CrawlPageRepository + ?Sized + 'static,
    Q: MessageQueue + ?Sized + 'static,
{
    loop {
        let delivery = tokio::select! {
            biased;
            _ = stop.cancelled() => break,
            next = rx.recv() => match next {
                Some(delivery) => delivery,
                None => break,
            },
        };

        let _serial = serial.lock().await;

        match CrawlJob::decode(&delivery.payload) {
            Ok(job) => {
                let processed = AssertUnwindSafe(worker.process(&job)).catch_unwind().await;
                if processed.is_err() {
                    error!(
                        partition,
                        offset = delivery.offset,
                        job_id = %job.id,
                        "Job processing panicked, message left unacknowledged"
                    );
                    return Err(partition);
                }
            }
            Err(e) => {
                warn!(
                    partition,
                    offset = delivery.offset,
                    error = %e,
                    "Dropping undecodable message"
                );
                metrics::record_poison_message();
            }
        }

        match delivery.ack().await {
            Ok(()) => debug!(partition, offset = delivery.offset, "Offset committed"),
            Err(QueueError::PartitionRevoked(_)) => warn!(
                partition,
                offset = delivery.offset,
                "Partition revoked before commit, message will be redelivered"
            ),
            Err(e) => error!(partition, offset = delivery.offset, error = %e, "Failed to commit offset"),
        }
    }

    debug!(partition, "Partition worker stopped");
    Ok(())
}

//! 通知队列
//!
//! 容量为 1 的有界队列。BLE 回调线程用 `push` 投递，满时丢弃新到的通知，
//! 绝不阻塞回调；应答等待方用 `recv_timeout` 消费，新传输开始前用 `drain` 清空。

use crate::BleError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use std::time::Duration;
use tracing::trace;

/// 通知队列容量
pub const NOTIFICATION_QUEUE_CAPACITY: usize = 1;

#[derive(Debug, Clone)]
pub struct NotificationQueue {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        let (tx, rx) = bounded(NOTIFICATION_QUEUE_CAPACITY);
        Self { tx, rx }
    }

    /// 投递一条通知，返回是否入队（队列满时丢弃）
    pub fn push(&self, data: Vec<u8>) -> bool {
        match self.tx.try_send(data) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                trace!("notification queue full, dropping {:02X?}", dropped);
                false
            },
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// 阻塞等待一条通知
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Vec<u8>, BleError> {
        match self.rx.recv_timeout(timeout) {
            Ok(data) => Ok(data),
            Err(RecvTimeoutError::Timeout) => Err(BleError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(BleError::NotConnected),
        }
    }

    /// 清空残留通知，返回丢弃的条数
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for NotificationQueue {
    fn default() -> Self {
        Self::new()
    }
}

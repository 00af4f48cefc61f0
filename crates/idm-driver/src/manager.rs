//! 连接管理器
//!
//! 每个进程（或每个测试）持有一个 [`ConnectionManager`]，它拥有唯一的当前会话：
//!
//! - 后台线程循环调用 [`Connector::connect`]，失败后按 `reconnect_interval_ms` 重试；
//!   同一时刻最多一个重试线程。
//! - [`ConnectionManager::with_device`] 是所有操作的入口。未连接时立即拒绝；
//!   操作返回的错误被判定为连接丢失时，状态切到 `Reconnecting`，启动重连，
//!   调用方收到 [`DriverError::Reconnecting`]。
//! - 串行化策略见 [`SerializationPolicy`]。
//!
//! # Example
//!
//! ```no_run
//! use idm_ble::BleConnector;
//! use idm_driver::{ConnectionManager, DriverConfig};
//!
//! let manager = ConnectionManager::new(BleConnector::new()?, DriverConfig::default());
//! manager.start();
//! manager.with_commander(|cmd| cmd.set_power(true))?;
//! manager.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::classify::is_connection_error;
use crate::commander::Commander;
use crate::config::{DriverConfig, SerializationPolicy};
use crate::error::DriverError;
use crate::state::{ConnectionEvent, ConnectionState};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use idm_ble::{Connector, Transport};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 状态 + 当前会话，只在同一把锁下修改
struct Slot<T> {
    state: ConnectionState,
    session: Option<Arc<T>>,
}

struct Shared<C: Connector> {
    connector: C,
    config: DriverConfig,
    slot: Mutex<Slot<C::Transport>>,
    /// `Exclusive` 策略下整个操作期间持有
    io_lock: Mutex<()>,
    /// 重试线程是否在运行
    retrying: AtomicBool,
    shutting_down: AtomicBool,
    /// 关闭时 drop 发送端，唤醒正在等待的重试线程
    shutdown_tx: Mutex<Option<Sender<()>>>,
    shutdown_rx: Receiver<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Connector> Shared<C> {
    /// 在锁内应用一个事件，返回新状态
    fn apply(slot: &mut Slot<C::Transport>, event: ConnectionEvent) -> ConnectionState {
        match slot.state.transition(event) {
            Some(next) => {
                if next != slot.state {
                    info!("Connection state: {} -> {} ({:?})", slot.state, next, event);
                }
                slot.state = next;
            },
            None => debug!("Ignoring {:?} in state {}", event, slot.state),
        }
        slot.state
    }

    /// 等待一段时间；收到关闭信号返回 true
    fn wait_or_shutdown(&self, delay: Duration) -> bool {
        if self.shutting_down.load(Ordering::Acquire) {
            return true;
        }
        match self.shutdown_rx.recv_timeout(delay) {
            Err(RecvTimeoutError::Timeout) => self.shutting_down.load(Ordering::Acquire),
            _ => true,
        }
    }

    /// 安装新会话，旧会话（如果还在）被替换并断开
    ///
    /// 重试标志和 `Connected` 在同一把锁内发布：锁一释放，
    /// 新的连接丢失就能启动下一个重试线程。
    fn install(&self, transport: C::Transport) {
        let transport = Arc::new(transport);
        let previous = {
            let mut slot = self.slot.lock();
            self.retrying.store(false, Ordering::Release);
            if self.shutting_down.load(Ordering::Acquire) {
                drop(slot);
                let _ = transport.disconnect();
                return;
            }
            let previous = slot.session.replace(transport.clone());
            Self::apply(&mut slot, ConnectionEvent::Connected);
            previous
        };
        if let Some(old) = previous {
            debug!("Superseding session {}", old.address());
            if let Err(e) = old.disconnect() {
                debug!("Failed to disconnect superseded session: {}", e);
            }
        }
        info!("Device connected: {}", transport.address());
    }

    /// 重试循环；`delay_first` 为 true 时第一次尝试前也等待
    fn retry_loop(&self, delay_first: bool) {
        let interval = self.config.reconnect_interval();
        let target = self.config.target.as_deref();
        let mut attempt = 0usize;

        loop {
            if (delay_first || attempt > 0) && self.wait_or_shutdown(interval) {
                debug!("Retry loop stopped by shutdown");
                break;
            }
            if self.shutting_down.load(Ordering::Acquire) {
                break;
            }
            attempt += 1;
            debug!("Connection attempt {} (target: {:?})", attempt, target);

            match self.connector.connect(target, self.config.scan_timeout()) {
                Ok(transport) => {
                    // install 已清除重试标志，这里不能再碰它
                    self.install(transport);
                    return;
                },
                Err(e) => {
                    warn!("Device connection failed, retrying: {}", e);
                    Self::apply(&mut self.slot.lock(), ConnectionEvent::ConnectFailed);
                },
            }
        }
        self.retrying.store(false, Ordering::Release);
    }
}

/// 连接管理器（克隆共享同一个实例）
pub struct ConnectionManager<C: Connector> {
    inner: Arc<Shared<C>>,
}

impl<C: Connector> Clone for ConnectionManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Connector> ConnectionManager<C> {
    pub fn new(connector: C, config: DriverConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = bounded(0);
        Self {
            inner: Arc::new(Shared {
                connector,
                config,
                slot: Mutex::new(Slot {
                    state: ConnectionState::Disconnected,
                    session: None,
                }),
                io_lock: Mutex::new(()),
                retrying: AtomicBool::new(false),
                shutting_down: AtomicBool::new(false),
                shutdown_tx: Mutex::new(Some(shutdown_tx)),
                shutdown_rx,
                worker: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.inner.config
    }

    pub fn connector(&self) -> &C {
        &self.inner.connector
    }

    /// 启动后台连接（重复调用无效）
    pub fn start(&self) {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return;
        }
        {
            let mut slot = self.inner.slot.lock();
            if slot.state != ConnectionState::Disconnected {
                return;
            }
            Shared::<C>::apply(&mut slot, ConnectionEvent::ConnectRequested);
        }
        info!(
            "Starting device connection in background (target: {:?})",
            self.inner.config.target
        );
        self.spawn_retry_loop(false);
    }

    fn spawn_retry_loop(&self, delay_first: bool) {
        if self
            .inner
            .retrying
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Retry loop already running");
            return;
        }

        let shared = self.inner.clone();
        let spawned = std::thread::Builder::new()
            .name("idm-connect".to_string())
            .spawn(move || shared.retry_loop(delay_first));

        match spawned {
            Ok(handle) => {
                // 上一个重试线程最多只剩安装后的收尾，句柄直接替换
                *self.inner.worker.lock() = Some(handle);
            },
            Err(e) => {
                error!("Failed to spawn connection thread: {}", e);
                self.inner.retrying.store(false, Ordering::Release);
            },
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.slot.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// 阻塞等待连接成功（超时返回 false）
    pub fn wait_connected(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if self.is_connected() {
                return true;
            }
            if std::time::Instant::now() >= deadline
                || self.inner.shutting_down.load(Ordering::Acquire)
            {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// 在当前会话上执行一个操作
    pub fn with_device<R>(
        &self,
        f: impl FnOnce(&C::Transport) -> Result<R, DriverError>,
    ) -> Result<R, DriverError> {
        if self.inner.shutting_down.load(Ordering::Acquire) {
            return Err(DriverError::ShuttingDown);
        }

        let _io_guard = match self.inner.config.serialization {
            SerializationPolicy::Exclusive => Some(self.inner.io_lock.lock()),
            SerializationPolicy::BestEffort => None,
        };

        let session = {
            let slot = self.inner.slot.lock();
            match (&slot.session, slot.state) {
                (Some(session), ConnectionState::Connected) => session.clone(),
                _ => return Err(DriverError::NotConnected),
            }
        };

        match f(session.as_ref()) {
            Err(e) if is_connection_error(&e) => {
                warn!("Connection lost during operation: {}", e);
                self.connection_lost(&session);
                Err(DriverError::Reconnecting)
            },
            other => other,
        }
    }

    /// 用 [`Commander`] 执行一个操作
    pub fn with_commander<R>(
        &self,
        f: impl FnOnce(&Commander<'_, C::Transport>) -> Result<R, DriverError>,
    ) -> Result<R, DriverError> {
        let config = &self.inner.config;
        self.with_device(|transport| f(&Commander::new(transport, config)))
    }

    /// 标记会话丢失；只有它仍是当前会话时才切换状态并启动重连
    fn connection_lost(&self, session: &Arc<C::Transport>) {
        let stale = {
            let mut slot = self.inner.slot.lock();
            let is_current = slot.session.as_ref().is_some_and(|s| Arc::ptr_eq(s, session));
            if !is_current || slot.state != ConnectionState::Connected {
                return;
            }
            Shared::<C>::apply(&mut slot, ConnectionEvent::ConnectionLost);
            slot.session.take()
        };

        if let Some(old) = stale {
            if let Err(e) = old.disconnect() {
                debug!("Failed to disconnect lost session: {}", e);
            }
        }
        info!("Starting reconnection loop");
        self.spawn_retry_loop(true);
    }

    /// 关闭：拒绝新操作，停止重试，断开当前会话
    pub fn shutdown(&self) {
        if self.inner.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Shutting down connection manager");
        self.inner.shutdown_tx.lock().take();

        if let Some(handle) = self.inner.worker.lock().take() {
            if handle.join().is_err() {
                error!("Connection thread panicked");
            }
        }

        // 等待进行中的独占操作结束
        let _io_guard = self.inner.io_lock.lock();
        let session = {
            let mut slot = self.inner.slot.lock();
            Shared::<C>::apply(&mut slot, ConnectionEvent::Shutdown);
            slot.session.take()
        };
        if let Some(session) = session {
            match session.disconnect() {
                Ok(()) => info!("Disconnected from device"),
                Err(e) => error!("Failed to disconnect device: {}", e),
            }
        }
    }
}

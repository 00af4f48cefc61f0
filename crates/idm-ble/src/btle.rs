//! btleplug 后端
//!
//! btleplug 是异步 API；这里由 [`BleConnector`] 持有一个小型 tokio 运行时，
//! 对外暴露同步的 [`Transport`] / [`Connector`]，上层全部用普通线程驱动。
//!
//! 注意：同步方法内部使用 `block_on`，不能在 tokio 运行时线程里调用。

use crate::queue::NotificationQueue;
use crate::{
    BleError, Connector, DiscoveredDevice, SERVICE_UUID, Transport, describe_target,
    matches_target, negotiate_characteristics,
};
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

fn backend(e: btleplug::Error) -> BleError {
    BleError::Backend(e.to_string())
}

/// 基于 btleplug 的连接器（持有运行时和第一个蓝牙适配器）
pub struct BleConnector {
    runtime: Arc<Runtime>,
    adapter: Adapter,
}

impl BleConnector {
    /// 创建运行时并打开第一个蓝牙适配器
    pub fn new() -> Result<Self, BleError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("idm-ble")
            .enable_all()
            .build()
            .map_err(|e| BleError::Backend(format!("failed to start runtime: {}", e)))?;

        let adapter = runtime.block_on(async {
            let manager = Manager::new().await.map_err(backend)?;
            let adapters = manager.adapters().await.map_err(backend)?;
            adapters.into_iter().next().ok_or(BleError::AdapterUnavailable)
        })?;

        Ok(Self {
            runtime: Arc::new(runtime),
            adapter,
        })
    }

    async fn describe(peripheral: &Peripheral) -> DiscoveredDevice {
        let props = peripheral.properties().await.ok().flatten();
        DiscoveredDevice {
            address: peripheral.address().to_string(),
            name: props.as_ref().and_then(|p| p.local_name.clone()),
            rssi: props.as_ref().and_then(|p| p.rssi),
        }
    }

    /// 扫描直到第一个匹配的设备出现
    async fn find_peripheral(
        &self,
        target: Option<&str>,
        scan_timeout: Duration,
    ) -> Result<(Peripheral, DiscoveredDevice), BleError> {
        let mut events = self.adapter.events().await.map_err(backend)?;
        self.adapter.start_scan(ScanFilter::default()).await.map_err(backend)?;
        info!("Scanning for {} ({:?})", describe_target(target), scan_timeout);

        let search = async {
            while let Some(event) = events.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Ok(peripheral) = self.adapter.peripheral(&id).await else {
                    continue;
                };
                let device = Self::describe(&peripheral).await;
                debug!(
                    "Advertisement: {} name={:?} rssi={:?}",
                    device.address, device.name, device.rssi
                );
                if matches_target(target, &device.address, device.name.as_deref()) {
                    return Some((peripheral, device));
                }
            }
            None
        };

        let found = tokio::time::timeout(scan_timeout, search).await.ok().flatten();
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        found.ok_or_else(|| BleError::DiscoveryFailed {
            target: describe_target(target),
        })
    }

    async fn establish(
        &self,
        peripheral: Peripheral,
        device: DiscoveredDevice,
    ) -> Result<BleTransport, BleError> {
        peripheral.connect().await.map_err(backend)?;
        peripheral.discover_services().await.map_err(backend)?;

        let service = peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == SERVICE_UUID)
            .ok_or_else(|| BleError::ServiceMissing(format!("service {}", SERVICE_UUID)))?;
        let characteristics: Vec<Characteristic> = service.characteristics.into_iter().collect();
        let (write, notify) = negotiate_characteristics(&characteristics, |c| c.uuid)?;
        let (write, notify) = (write.clone(), notify.clone());

        peripheral.subscribe(&notify).await.map_err(backend)?;

        let queue = NotificationQueue::new();
        let mut stream = peripheral.notifications().await.map_err(backend)?;
        let forward_queue = queue.clone();
        let notify_uuid = notify.uuid;
        let forwarder = tokio::spawn(async move {
            while let Some(n) = stream.next().await {
                if n.uuid == notify_uuid {
                    trace!("Notification: {:02X?}", n.value);
                    forward_queue.push(n.value);
                }
            }
            debug!("Notification stream closed");
        });

        info!("Connected to {} ({:?})", device.address, device.name);
        Ok(BleTransport {
            runtime: self.runtime.clone(),
            peripheral,
            write_char: write,
            queue,
            address: device.address,
            name: device.name,
            notifications_enabled: AtomicBool::new(true),
            connected: AtomicBool::new(true),
            forwarder: Mutex::new(Some(forwarder)),
        })
    }
}

impl Connector for BleConnector {
    type Transport = BleTransport;

    fn connect(
        &self,
        target: Option<&str>,
        scan_timeout: Duration,
    ) -> Result<BleTransport, BleError> {
        self.runtime.block_on(async {
            let (peripheral, device) = self.find_peripheral(target, scan_timeout).await?;
            info!("Selected {} ({:?})", device.address, device.name);
            match self.establish(peripheral.clone(), device).await {
                Ok(transport) => Ok(transport),
                Err(e) => {
                    // 协商失败时不保留半开的链路
                    let _ = peripheral.disconnect().await;
                    Err(e)
                },
            }
        })
    }

    fn scan(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>, BleError> {
        self.runtime.block_on(async {
            let mut events = self.adapter.events().await.map_err(backend)?;
            self.adapter.start_scan(ScanFilter::default()).await.map_err(backend)?;
            info!("Scanning for {:?}", duration);

            let mut seen: HashMap<PeripheralId, DiscoveredDevice> = HashMap::new();
            let mut order: Vec<PeripheralId> = Vec::new();
            let collect = async {
                while let Some(event) = events.next().await {
                    let id = match event {
                        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                        _ => continue,
                    };
                    let Ok(peripheral) = self.adapter.peripheral(&id).await else {
                        continue;
                    };
                    let device = Self::describe(&peripheral).await;
                    debug!(
                        "Advertisement: {} name={:?} rssi={:?}",
                        device.address, device.name, device.rssi
                    );
                    if !seen.contains_key(&id) {
                        order.push(id.clone());
                    }
                    // 保留最新的名字和信号强度
                    seen.insert(id, device);
                }
            };
            let _ = tokio::time::timeout(duration, collect).await;

            if let Err(e) = self.adapter.stop_scan().await {
                warn!("Failed to stop scan: {}", e);
            }
            Ok(order.into_iter().filter_map(|id| seen.remove(&id)).collect())
        })
    }
}

/// 基于 btleplug 的会话
pub struct BleTransport {
    runtime: Arc<Runtime>,
    peripheral: Peripheral,
    write_char: Characteristic,
    queue: NotificationQueue,
    address: String,
    name: Option<String>,
    notifications_enabled: AtomicBool,
    connected: AtomicBool,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl BleTransport {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

impl Transport for BleTransport {
    fn write_packet(&self, packet: &[u8]) -> Result<(), BleError> {
        if !self.is_connected() {
            return Err(BleError::NotConnected);
        }
        self.runtime
            .block_on(self.peripheral.write(&self.write_char, packet, WriteType::WithoutResponse))
            .map_err(|e| BleError::Write(e.to_string()))
    }

    fn read_response(&self, timeout: Duration) -> Result<Vec<u8>, BleError> {
        if !self.notifications_enabled.load(Ordering::Acquire) {
            return Err(BleError::NotificationsDisabled);
        }
        self.queue.recv_timeout(timeout)
    }

    fn drain_responses(&self) -> usize {
        let dropped = self.queue.drain();
        if dropped > 0 {
            debug!("Drained {} stale notification(s)", dropped);
        }
        dropped
    }

    fn disconnect(&self) -> Result<(), BleError> {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        self.notifications_enabled.store(false, Ordering::Release);
        if let Some(handle) = self.forwarder.lock().take() {
            handle.abort();
        }
        self.runtime.block_on(self.peripheral.disconnect()).map_err(backend)?;
        info!("Disconnected from {}", self.address);
        Ok(())
    }

    fn address(&self) -> &str {
        &self.address
    }
}

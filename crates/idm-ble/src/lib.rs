//! # iDotMatrix BLE Transport Layer
//!
//! BLE 传输抽象层：设备发现、GATT 协商、通知订阅、裸包写入、带超时的回复读取。
//!
//! - [`Transport`]：一个已连接的会话（写特征 + 通知特征 + 通知队列）
//! - [`Connector`]：扫描并建立会话
//! - `btle`：基于 btleplug 的真实后端（`btleplug` feature）
//! - `mock`：脚本化的模拟设备（`mock` feature）
//!
//! 传输层不做分片，调用方负责遵守链路写入大小。

use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

pub mod queue;

#[cfg(feature = "btleplug")]
pub mod btle;

#[cfg(feature = "btleplug")]
pub use btle::{BleConnector, BleTransport};

#[cfg(feature = "mock")]
pub mod mock;

pub use queue::NotificationQueue;

use idm_protocol::{
    DEVICE_NAME_PREFIX, NOTIFY_CHARACTERISTIC_UUID16, SERVICE_UUID16, WRITE_CHARACTERISTIC_UUID16,
};

/// BLE 传输层统一错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BleError {
    /// 扫描窗口内没有找到匹配的设备
    #[error("Device not found: {target}")]
    DiscoveryFailed { target: String },

    /// 设备上缺少期望的服务或特征
    #[error("Service missing: {0}")]
    ServiceMissing(String),

    /// 特征数量或身份与协议不符
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// 等待设备回复超时
    #[error("Read timeout")]
    Timeout,

    /// 底层链路写入失败
    #[error("Write failed: {0}")]
    Write(String),

    /// 通知未订阅，无法读取回复
    #[error("Notifications not enabled")]
    NotificationsDisabled,

    /// 会话已断开
    #[error("Device not connected")]
    NotConnected,

    /// 没有可用的蓝牙适配器
    #[error("No Bluetooth adapter available")]
    AdapterUnavailable,

    /// 后端（btleplug / 运行时）错误
    #[error("BLE backend error: {0}")]
    Backend(String),
}

/// 扫描到的广播设备
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub address: String,
    pub name: Option<String>,
    pub rssi: Option<i16>,
}

impl DiscoveredDevice {
    /// 广播名是否带 iDotMatrix 前缀
    pub fn is_idm(&self) -> bool {
        self.name.as_deref().is_some_and(|n| n.starts_with(DEVICE_NAME_PREFIX))
    }
}

/// 一个已建立的 BLE 会话
///
/// 所有方法都只借用 `&self`，同一个会话可以被多个线程共享；
/// 写入的串行化由上层（连接管理器）决定。
pub trait Transport: Send + Sync {
    /// 写入一个链路包（Write Without Response，不分片）
    fn write_packet(&self, packet: &[u8]) -> Result<(), BleError>;

    /// 阻塞等待一条通知，超时返回 [`BleError::Timeout`]
    fn read_response(&self, timeout: Duration) -> Result<Vec<u8>, BleError>;

    /// 非阻塞清空残留通知，返回丢弃的条数
    fn drain_responses(&self) -> usize;

    /// 断开连接（幂等）
    fn disconnect(&self) -> Result<(), BleError>;

    /// 对端地址
    fn address(&self) -> &str;
}

/// 设备发现与会话建立
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport + 'static;

    /// 扫描并连接
    ///
    /// - `target = Some(addr)`：地址不区分大小写匹配
    /// - `target = None`：第一个广播名带前缀的设备（先到先得）
    fn connect(
        &self,
        target: Option<&str>,
        scan_timeout: Duration,
    ) -> Result<Self::Transport, BleError>;

    /// 扫描一段时间，返回去重后的广播设备列表
    fn scan(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>, BleError>;
}

/// 判断一个广播是否是要连接的设备
pub fn matches_target(target: Option<&str>, address: &str, name: Option<&str>) -> bool {
    match target {
        Some(t) => address.eq_ignore_ascii_case(t.trim()),
        None => name.is_some_and(|n| n.starts_with(DEVICE_NAME_PREFIX)),
    }
}

/// `DiscoveryFailed` 中的目标描述
pub fn describe_target(target: Option<&str>) -> String {
    match target {
        Some(t) => t.to_string(),
        None => format!("any device named {}*", DEVICE_NAME_PREFIX),
    }
}

/// 16-bit UUID 转换为蓝牙基础 UUID
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | 0x0000_0000_0000_1000_8000_0080_5F9B_34FB)
}

pub const SERVICE_UUID: Uuid = uuid_from_u16(SERVICE_UUID16);
pub const WRITE_CHARACTERISTIC_UUID: Uuid = uuid_from_u16(WRITE_CHARACTERISTIC_UUID16);
pub const NOTIFY_CHARACTERISTIC_UUID: Uuid = uuid_from_u16(NOTIFY_CHARACTERISTIC_UUID16);

/// 从服务的特征列表中挑出 (写特征, 通知特征)
///
/// 只考虑两个协议 UUID；一个都没有视为服务缺失，
/// 数量或身份不对视为协议不匹配。
pub fn negotiate_characteristics<T>(
    characteristics: &[T],
    uuid_of: impl Fn(&T) -> Uuid,
) -> Result<(&T, &T), BleError> {
    let relevant: Vec<&T> = characteristics
        .iter()
        .filter(|c| {
            let uuid = uuid_of(*c);
            uuid == WRITE_CHARACTERISTIC_UUID || uuid == NOTIFY_CHARACTERISTIC_UUID
        })
        .collect();

    if relevant.is_empty() {
        return Err(BleError::ServiceMissing(format!(
            "no characteristics {} / {} under service {}",
            WRITE_CHARACTERISTIC_UUID, NOTIFY_CHARACTERISTIC_UUID, SERVICE_UUID
        )));
    }
    if relevant.len() != 2 {
        return Err(BleError::ProtocolMismatch(format!(
            "expected 2 characteristics, found {}",
            relevant.len()
        )));
    }

    let write = relevant.iter().copied().find(|c| uuid_of(*c) == WRITE_CHARACTERISTIC_UUID);
    let notify = relevant.iter().copied().find(|c| uuid_of(*c) == NOTIFY_CHARACTERISTIC_UUID);
    match (write, notify) {
        (Some(w), Some(n)) => Ok((w, n)),
        _ => Err(BleError::ProtocolMismatch(
            "write/notify characteristic pair incomplete".to_string(),
        )),
    }
}

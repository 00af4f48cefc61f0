//! Mock 传输层（无硬件依赖）
//!
//! [`MockTransport`] 记录所有写入的链路包，按脚本返回设备回复；
//! 脚本耗尽时 `read_response` 立即返回 [`BleError::Timeout`]。
//! [`MockConnector`] 按脚本或模拟广播列表建立会话。

use crate::{BleError, Connector, DiscoveredDevice, Transport, describe_target, matches_target};
use idm_protocol::DeviceStatus;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct TransportState {
    written: Vec<Vec<u8>>,
    /// 残留通知（`drain_responses` 会清掉）
    stale: VecDeque<Vec<u8>>,
    /// 脚本化回复（按读取顺序）
    replies: VecDeque<Result<Vec<u8>, BleError>>,
    /// 第 N 次写入（从 0 计）开始失败
    fail_from_write: Option<(usize, BleError)>,
    drain_calls: usize,
    disconnect_calls: usize,
    disconnected: bool,
}

/// 模拟会话（克隆共享同一个内部状态，便于测试端观察）
#[derive(Debug, Clone)]
pub struct MockTransport {
    address: Arc<str>,
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::with_address("00:11:22:33:44:55")
    }

    pub fn with_address(address: &str) -> Self {
        Self {
            address: Arc::from(address),
            state: Arc::new(Mutex::new(TransportState::default())),
        }
    }

    /// 追加一条设备回复
    pub fn push_reply(&self, reply: impl Into<Vec<u8>>) -> &Self {
        self.state.lock().replies.push_back(Ok(reply.into()));
        self
    }

    /// 追加一条状态帧回复
    pub fn push_status(&self, status: DeviceStatus) -> &Self {
        self.push_reply(status.to_bytes())
    }

    /// 追加一次读取错误
    pub fn push_read_error(&self, error: BleError) -> &Self {
        self.state.lock().replies.push_back(Err(error));
        self
    }

    /// 模拟上一次操作留下的通知
    pub fn inject_stale(&self, notification: impl Into<Vec<u8>>) {
        self.state.lock().stale.push_back(notification.into());
    }

    /// 从第 `n` 次写入开始所有写入都失败
    pub fn fail_writes_from(&self, n: usize, error: BleError) {
        self.state.lock().fail_from_write = Some((n, error));
    }

    /// 已写入的链路包
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.lock().written.clone()
    }

    pub fn write_count(&self) -> usize {
        self.state.lock().written.len()
    }

    /// 所有写入按顺序拼接成的字节流
    pub fn stream(&self) -> Vec<u8> {
        self.state.lock().written.concat()
    }

    pub fn clear_written(&self) {
        self.state.lock().written.clear();
    }

    pub fn remaining_replies(&self) -> usize {
        self.state.lock().replies.len()
    }

    pub fn drain_calls(&self) -> usize {
        self.state.lock().drain_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.lock().disconnect_calls
    }

    pub fn is_disconnected(&self) -> bool {
        self.state.lock().disconnected
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn write_packet(&self, packet: &[u8]) -> Result<(), BleError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(BleError::NotConnected);
        }
        if let Some((n, error)) = &state.fail_from_write {
            if state.written.len() >= *n {
                return Err(error.clone());
            }
        }
        state.written.push(packet.to_vec());
        Ok(())
    }

    fn read_response(&self, _timeout: Duration) -> Result<Vec<u8>, BleError> {
        let mut state = self.state.lock();
        if state.disconnected {
            return Err(BleError::NotConnected);
        }
        if let Some(stale) = state.stale.pop_front() {
            return Ok(stale);
        }
        state.replies.pop_front().unwrap_or(Err(BleError::Timeout))
    }

    fn drain_responses(&self) -> usize {
        let mut state = self.state.lock();
        state.drain_calls += 1;
        let dropped = state.stale.len();
        state.stale.clear();
        dropped
    }

    fn disconnect(&self) -> Result<(), BleError> {
        let mut state = self.state.lock();
        state.disconnect_calls += 1;
        state.disconnected = true;
        Ok(())
    }

    fn address(&self) -> &str {
        &self.address
    }
}

#[derive(Debug, Default)]
struct ConnectorState {
    /// 脚本化的连接结果（优先于广播列表）
    script: VecDeque<Result<MockTransport, BleError>>,
    /// 模拟的广播设备
    advertisements: Vec<DiscoveredDevice>,
    attempts: usize,
    sessions: Vec<MockTransport>,
}

/// 模拟连接器
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 模拟空中的广播设备
    pub fn with_advertisements(devices: Vec<DiscoveredDevice>) -> Self {
        let connector = Self::default();
        connector.state.lock().advertisements = devices;
        connector
    }

    /// 下一次连接返回这个会话
    pub fn push_session(&self, transport: MockTransport) -> &Self {
        self.state.lock().script.push_back(Ok(transport));
        self
    }

    /// 下一次连接失败
    pub fn push_failure(&self, error: BleError) -> &Self {
        self.state.lock().script.push_back(Err(error));
        self
    }

    /// 累计连接尝试次数
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts
    }

    /// 成功建立过的会话
    pub fn sessions(&self) -> Vec<MockTransport> {
        self.state.lock().sessions.clone()
    }
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    fn connect(
        &self,
        target: Option<&str>,
        _scan_timeout: Duration,
    ) -> Result<MockTransport, BleError> {
        let mut state = self.state.lock();
        state.attempts += 1;

        let result = match state.script.pop_front() {
            Some(scripted) => scripted,
            None => state
                .advertisements
                .iter()
                .find(|d| matches_target(target, &d.address, d.name.as_deref()))
                .map(|d| MockTransport::with_address(&d.address))
                .ok_or_else(|| BleError::DiscoveryFailed {
                    target: describe_target(target),
                }),
        };

        if let Ok(transport) = &result {
            state.sessions.push(transport.clone());
        }
        result
    }

    fn scan(&self, _duration: Duration) -> Result<Vec<DiscoveredDevice>, BleError> {
        Ok(self.state.lock().advertisements.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_writes() {
        let mock = MockTransport::new();
        mock.write_packet(&[1, 2]).unwrap();
        mock.write_packet(&[3]).unwrap();
        assert_eq!(mock.written(), vec![vec![1, 2], vec![3]]);
        assert_eq!(mock.stream(), vec![1, 2, 3]);
    }

    #[test]
    fn test_mock_replies_then_timeout() {
        let mock = MockTransport::new();
        mock.push_status(DeviceStatus::Continue);
        assert_eq!(mock.read_response(Duration::ZERO).unwrap(), vec![5, 0, 1, 0, 1]);
        assert_eq!(mock.read_response(Duration::ZERO), Err(BleError::Timeout));
    }

    #[test]
    fn test_mock_drain_only_clears_stale() {
        let mock = MockTransport::new();
        mock.inject_stale(vec![0xFF]);
        mock.push_status(DeviceStatus::Complete);
        assert_eq!(mock.drain_responses(), 1);
        assert_eq!(mock.read_response(Duration::ZERO).unwrap(), vec![5, 0, 1, 0, 3]);
    }

    #[test]
    fn test_mock_write_failure() {
        let mock = MockTransport::new();
        mock.fail_writes_from(1, BleError::Write("link lost".to_string()));
        assert!(mock.write_packet(&[1]).is_ok());
        assert!(matches!(mock.write_packet(&[2]), Err(BleError::Write(_))));
        assert_eq!(mock.write_count(), 1);
    }

    #[test]
    fn test_mock_disconnect_is_idempotent() {
        let mock = MockTransport::new();
        assert!(mock.disconnect().is_ok());
        assert!(mock.disconnect().is_ok());
        assert!(mock.is_disconnected());
        assert_eq!(mock.write_packet(&[1]), Err(BleError::NotConnected));
    }

    #[test]
    fn test_connector_selects_first_prefixed_device() {
        let connector = MockConnector::with_advertisements(vec![
            DiscoveredDevice {
                address: "AA:00:00:00:00:01".to_string(),
                name: Some("Headphones".to_string()),
                rssi: Some(-40),
            },
            DiscoveredDevice {
                address: "AA:00:00:00:00:02".to_string(),
                name: Some("IDM-A1".to_string()),
                rssi: Some(-80),
            },
            DiscoveredDevice {
                address: "AA:00:00:00:00:03".to_string(),
                name: Some("IDM-B2".to_string()),
                rssi: Some(-30),
            },
        ]);
        let session = connector.connect(None, Duration::from_secs(1)).unwrap();
        assert_eq!(session.address(), "AA:00:00:00:00:02");

        let session = connector.connect(Some("aa:00:00:00:00:03"), Duration::from_secs(1)).unwrap();
        assert_eq!(session.address(), "AA:00:00:00:00:03");
        assert_eq!(connector.attempts(), 2);
    }

    #[test]
    fn test_connector_discovery_failure() {
        let connector = MockConnector::with_advertisements(vec![DiscoveredDevice {
            address: "AA:00:00:00:00:01".to_string(),
            name: Some("Keyboard".to_string()),
            rssi: None,
        }]);
        assert!(matches!(
            connector.connect(None, Duration::from_secs(1)),
            Err(BleError::DiscoveryFailed { .. })
        ));
    }
}

//! 驱动层错误类型定义

use idm_ble::BleError;
use idm_protocol::ProtocolError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// BLE 传输错误
    #[error("BLE transport error: {0}")]
    Ble(#[from] BleError),

    /// 协议编码/解析错误
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 动图分块等待设备回复超时（分块序号从 1 开始）
    #[error("Timeout waiting for response to chunk {chunk}")]
    ResponseTimeout { chunk: usize },

    /// 设备在中间分块回复了“完成”
    #[error(
        "Chunk {chunk}/{total}: device returned 'upload complete' prematurely (expected 'continue')"
    )]
    PrematureComplete { chunk: usize, total: usize },

    /// 未知状态码
    #[error("Chunk {chunk}: unexpected response code: {code}")]
    UnexpectedStatus { chunk: usize, code: u8 },

    /// 回复格式错误（十六进制）
    #[error("Chunk {chunk}: unexpected response format: {reply}")]
    MalformedReply { chunk: usize, reply: String },

    /// 尚未连接（后台仍在尝试）
    #[error("device not connected, waiting for connection...")]
    NotConnected,

    /// 会话丢失，后台正在重连
    #[error("device disconnected, reconnecting...")]
    Reconnecting,

    /// 管理器已关闭，不再接受新的操作
    #[error("Manager is shutting down")]
    ShuttingDown,

    /// 配置错误
    #[error("Config error: {0}")]
    Config(String),
}

impl DriverError {
    /// 设备违反动图应答协议
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            DriverError::PrematureComplete { .. }
                | DriverError::UnexpectedStatus { .. }
                | DriverError::MalformedReply { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::DriverError;
    use idm_ble::BleError;
    use idm_protocol::ProtocolError;

    #[test]
    fn test_driver_error_display() {
        let msg = DriverError::Ble(BleError::Timeout).to_string();
        assert!(msg.contains("Read timeout"), "Ble error message: {}", msg);

        let msg = DriverError::PrematureComplete { chunk: 2, total: 3 }.to_string();
        assert!(msg.starts_with("Chunk 2/3"));
        assert!(msg.contains("prematurely"));

        assert_eq!(
            DriverError::Reconnecting.to_string(),
            "device disconnected, reconnecting..."
        );
        assert_eq!(
            DriverError::NotConnected.to_string(),
            "device not connected, waiting for connection..."
        );
    }

    #[test]
    fn test_from_protocol_error() {
        let driver_error: DriverError = ProtocolError::EmptyPayload.into();
        assert!(matches!(driver_error, DriverError::Protocol(ProtocolError::EmptyPayload)));
    }

    #[test]
    fn test_is_protocol_violation() {
        assert!(DriverError::PrematureComplete { chunk: 2, total: 3 }.is_protocol_violation());
        assert!(DriverError::UnexpectedStatus { chunk: 1, code: 9 }.is_protocol_violation());
        assert!(
            DriverError::MalformedReply {
                chunk: 1,
                reply: "0500".to_string()
            }
            .is_protocol_violation()
        );
        assert!(!DriverError::ResponseTimeout { chunk: 1 }.is_protocol_violation());
        assert!(!DriverError::NotConnected.is_protocol_violation());
    }
}

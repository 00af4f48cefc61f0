//! 动图上传状态帧
//!
//! 每个动图分块写完后设备回复一帧：`0x05,0x00,0x01,0x00,X`
//! - `X = 1`：继续发送下一个分块
//! - `X = 3`：上传完成（若出现在第一个分块之后，说明设备已缓存该动图）
//!
//! 长于 5 字节的回复同样接受，多余字节忽略。

use crate::ProtocolError;

/// 状态帧固定前缀
pub const STATUS_PREFIX: [u8; 4] = [0x05, 0x00, 0x01, 0x00];

/// 状态帧最小长度
pub const STATUS_LEN: usize = 5;

/// 设备回复的上传状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    /// 继续发送下一个分块
    Continue = 0x01,
    /// 上传完成
    Complete = 0x03,
}

impl DeviceStatus {
    /// 解析一条通知
    pub fn parse(reply: &[u8]) -> Result<Self, ProtocolError> {
        if reply.len() < STATUS_LEN || reply[..4] != STATUS_PREFIX {
            return Err(ProtocolError::MalformedReply(reply.to_vec()));
        }
        match reply[4] {
            0x01 => Ok(DeviceStatus::Continue),
            0x03 => Ok(DeviceStatus::Complete),
            code => Err(ProtocolError::UnexpectedStatus { code }),
        }
    }

    pub fn to_bytes(self) -> [u8; STATUS_LEN] {
        [0x05, 0x00, 0x01, 0x00, self as u8]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_continue_and_complete() {
        assert_eq!(DeviceStatus::parse(&[5, 0, 1, 0, 1]).unwrap(), DeviceStatus::Continue);
        assert_eq!(DeviceStatus::parse(&[5, 0, 1, 0, 3]).unwrap(), DeviceStatus::Complete);
    }

    #[test]
    fn test_parse_accepts_trailing_bytes() {
        assert_eq!(
            DeviceStatus::parse(&[5, 0, 1, 0, 3, 0xAA, 0xBB]).unwrap(),
            DeviceStatus::Complete
        );
    }

    #[test]
    fn test_parse_unknown_code() {
        assert_eq!(
            DeviceStatus::parse(&[5, 0, 1, 0, 2]),
            Err(ProtocolError::UnexpectedStatus { code: 2 })
        );
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(
            DeviceStatus::parse(&[5, 0, 1, 0]),
            Err(ProtocolError::MalformedReply(_))
        ));
        assert!(matches!(
            DeviceStatus::parse(&[5, 0, 2, 0, 1]),
            Err(ProtocolError::MalformedReply(_))
        ));
        assert!(matches!(DeviceStatus::parse(&[]), Err(ProtocolError::MalformedReply(_))));
    }

    #[test]
    fn test_to_bytes() {
        assert_eq!(DeviceStatus::Continue.to_bytes(), [5, 0, 1, 0, 1]);
        assert_eq!(DeviceStatus::Complete.to_bytes(), [5, 0, 1, 0, 3]);
    }
}

//! 连接丢失判定
//!
//! 目前按错误消息做子串匹配。所有调用方都经过 [`is_connection_error`]，
//! 以后换成结构化的错误类型判断只需改这一处。

use crate::error::DriverError;

/// 视为连接丢失的关键字（小写）
const CONNECTION_ERROR_MARKERS: [&str; 4] = ["disconnected", "not connected", "connection", "timeout"];

/// 错误是否意味着 BLE 会话已失效
pub fn is_connection_error(err: &DriverError) -> bool {
    let msg = err.to_string().to_lowercase();
    CONNECTION_ERROR_MARKERS.iter().any(|marker| msg.contains(marker))
}

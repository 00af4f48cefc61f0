//! 连接状态机
//!
//! ```text
//! Disconnected ──ConnectRequested──▶ Connecting ──Connected──▶ Connected
//!                                        │ ▲                      │
//!                                        └─┘ConnectFailed         │ConnectionLost
//!                                                                 ▼
//!                          Connected ◀──Connected── Reconnecting ◀┘
//!                                                     │ ▲
//!                                                     └─┘ConnectFailed
//! ```
//!
//! 任意状态收到 `Shutdown` 都回到 `Disconnected`。表中没有的组合返回 `None`，
//! 调用方保持原状态。

use std::fmt;

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// 未连接（初始状态 / 已关闭）
    #[default]
    Disconnected,
    /// 首次连接中
    Connecting,
    /// 会话可用
    Connected,
    /// 会话丢失，后台重连中
    Reconnecting,
}

/// 驱动状态机的事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// 启动后台连接
    ConnectRequested,
    /// 一次连接尝试成功
    Connected,
    /// 一次连接尝试失败
    ConnectFailed,
    /// 操作过程中判定会话丢失
    ConnectionLost,
    /// 关闭
    Shutdown,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// 后台是否正在尝试连接
    pub fn is_connecting(self) -> bool {
        matches!(self, Self::Connecting | Self::Reconnecting)
    }

    /// 状态转移表
    pub fn transition(self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        match (self, event) {
            (_, E::Shutdown) => Some(S::Disconnected),
            (S::Disconnected, E::ConnectRequested) => Some(S::Connecting),
            (S::Connecting, E::Connected) | (S::Reconnecting, E::Connected) => Some(S::Connected),
            (S::Connecting, E::ConnectFailed) => Some(S::Connecting),
            (S::Reconnecting, E::ConnectFailed) => Some(S::Reconnecting),
            (S::Connected, E::ConnectionLost) => Some(S::Reconnecting),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionEvent as E;
    use super::ConnectionState as S;

    #[test]
    fn test_happy_path() {
        let s = S::Disconnected.transition(E::ConnectRequested).unwrap();
        assert_eq!(s, S::Connecting);
        let s = s.transition(E::ConnectFailed).unwrap();
        assert_eq!(s, S::Connecting);
        let s = s.transition(E::Connected).unwrap();
        assert!(s.is_connected());
    }

    #[test]
    fn test_loss_and_recovery() {
        let s = S::Connected.transition(E::ConnectionLost).unwrap();
        assert_eq!(s, S::Reconnecting);
        assert!(s.is_connecting());
        assert_eq!(s.transition(E::ConnectFailed), Some(S::Reconnecting));
        assert_eq!(s.transition(E::Connected), Some(S::Connected));
    }

    #[test]
    fn test_invalid_transitions() {
        assert_eq!(S::Disconnected.transition(E::Connected), None);
        assert_eq!(S::Connected.transition(E::ConnectRequested), None);
        // 重连中再次报告丢失不重复触发
        assert_eq!(S::Reconnecting.transition(E::ConnectionLost), None);
        assert_eq!(S::Connecting.transition(E::ConnectionLost), None);
    }

    #[test]
    fn test_shutdown_from_any_state() {
        for s in [S::Disconnected, S::Connecting, S::Connected, S::Reconnecting] {
            assert_eq!(s.transition(E::Shutdown), Some(S::Disconnected));
        }
    }

    #[test]
    fn test_status_predicates() {
        assert!(S::Connecting.is_connecting());
        assert!(S::Reconnecting.is_connecting());
        assert!(!S::Connected.is_connecting());
        assert!(!S::Disconnected.is_connecting());
        assert_eq!(S::Reconnecting.to_string(), "reconnecting");
    }
}

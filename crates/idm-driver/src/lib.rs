//! 驱动层模块
//!
//! 在 [`idm_ble::Transport`] 之上提供：
//! - 指令层（[`Commander`]）：电源、亮度、时钟、涂鸦、静态图、动图
//! - 上传引擎：无应答的静态图路径，逐分块应答的动图路径（含设备缓存短路）
//! - 连接管理（[`ConnectionManager`]）：后台连接/重连、串行化入口、连接丢失判定
//! - 配置（[`DriverConfig`]，TOML）
//!
//! # 使用场景
//!
//! 一次性命令（CLI）直接在 [`Connector::connect`](idm_ble::Connector::connect)
//! 返回的会话上构建 [`Commander`]；长期运行的进程使用 [`ConnectionManager`]。

mod classify;
mod commander;
mod config;
mod error;
mod manager;
pub mod state;
pub mod upload;

pub use classify::is_connection_error;
pub use commander::Commander;
pub use config::{CONFIG_KEYS, DriverConfig, SerializationPolicy};
pub use error::DriverError;
pub use manager::ConnectionManager;
pub use state::{ConnectionEvent, ConnectionState};
pub use upload::{ChunkAction, GifTransfer, UploadOutcome};

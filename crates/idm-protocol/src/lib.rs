//! # iDotMatrix Protocol
//!
//! 64×64 像素屏 BLE 私有协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `constants`: GATT UUID、分块大小等协议常量
//! - `color`: RGB 颜色与像素坐标
//! - `command`: 单包控制指令（绘图模式、电源、亮度、时钟、校时）
//! - `pixel`: 涂鸦指令（单像素 / 同色像素批）
//! - `framing`: 静态图 / 动图的分块头与链路分片
//! - `status`: 动图上传过程中设备回复的状态帧
//!
//! ## 字节序
//!
//! 协议中所有多字节整数均为小端字节序（Little Endian）。

pub mod color;
pub mod command;
pub mod constants;
pub mod framing;
pub mod pixel;
pub mod status;

// 重新导出常用类型
pub use color::{Point, Rgb};
pub use command::*;
pub use constants::*;
pub use framing::*;
pub use pixel::{PixelBatch, PixelCommand};
pub use status::DeviceStatus;

use thiserror::Error;

/// 协议编码/解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Payload too large: {len} bytes exceeds max {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Payload is empty")]
    EmptyPayload,

    #[error("Invalid image length: expected {expected} bytes, got {actual}")]
    InvalidImageLength { expected: usize, actual: usize },

    #[error("Invalid chunk header: {0}")]
    InvalidHeader(String),

    #[error("Unexpected response format: {0:02X?}")]
    MalformedReply(Vec<u8>),

    #[error("Unexpected response code: {code}")]
    UnexpectedStatus { code: u8 },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },

    #[error("Unknown color: {0}")]
    InvalidColor(String),
}

/// 计算整个载荷的 CRC-32/IEEE 校验和
///
/// 动图上传时对完整载荷计算一次，所有分块头复用同一个值。
pub fn checksum(payload: &[u8]) -> u32 {
    crc32fast::hash(payload)
}

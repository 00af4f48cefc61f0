//! 协议常量定义
//!
//! 集中定义所有设备相关的常量，避免在代码中散落"魔法数"。

/// 设备广播名前缀（自动发现时按前缀匹配）
pub const DEVICE_NAME_PREFIX: &str = "IDM-";

/// GATT 服务 16-bit UUID
pub const SERVICE_UUID16: u16 = 0x00FA;

/// 写特征 16-bit UUID（Write Without Response）
pub const WRITE_CHARACTERISTIC_UUID16: u16 = 0xFA02;

/// 通知特征 16-bit UUID
pub const NOTIFY_CHARACTERISTIC_UUID16: u16 = 0xFA03;

/// 屏幕宽度（像素）
pub const DISPLAY_WIDTH: usize = 64;

/// 屏幕高度（像素）
pub const DISPLAY_HEIGHT: usize = 64;

/// 原始 RGB 图像字节数（行优先，每像素 3 字节）
pub const RAW_IMAGE_LEN: usize = DISPLAY_WIDTH * DISPLAY_HEIGHT * 3;

/// 协议分块大小（静态图与动图相同）
pub const PROTOCOL_CHUNK_SIZE: usize = 4096;

/// 静态图分块头长度
pub const IMAGE_HEADER_LEN: usize = 9;

/// 动图分块头长度
pub const GIF_HEADER_LEN: usize = 16;

/// 静态图路径的链路分片大小（设备 MTU 上限 514）
pub const IMAGE_LINK_PACKET_SIZE: usize = 514;

/// 动图路径的链路分片大小
pub const GIF_LINK_PACKET_SIZE: usize = 509;

/// 动图类型：无时间签名（NO_TIME_SIGNATURE）
pub const GIF_TYPE_NO_TIME_SIGNATURE: u8 = 0x0C;

/// 单个涂鸦包最多携带的像素坐标数
pub const MAX_PIXELS_PER_PACKET: usize = 255;

/// 静态图命令字
pub const CMD_IMAGE: u8 = 0x00;

/// 动图命令字
pub const CMD_GIF: u8 = 0x01;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_sizes() {
        assert_eq!(RAW_IMAGE_LEN, 12288);
        // 12288 字节正好 3 个协议分块
        assert_eq!(RAW_IMAGE_LEN / PROTOCOL_CHUNK_SIZE, 3);
        assert!(GIF_LINK_PACKET_SIZE < IMAGE_LINK_PACKET_SIZE);
    }
}

//! 涂鸦指令（单像素 / 同色像素批）

use crate::color::{Point, Rgb};
use crate::constants::MAX_PIXELS_PER_PACKET;

/// 单像素指令
///
/// 布局：`0x0A,0x00,0x05,0x01,0x00, R,G,B, X,Y`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelCommand {
    pub point: Point,
    pub color: Rgb,
}

impl PixelCommand {
    pub fn new(x: u8, y: u8, color: Rgb) -> Self {
        Self {
            point: Point::new(x, y),
            color,
        }
    }

    pub fn to_bytes(self) -> [u8; 10] {
        let [r, g, b] = self.color.to_bytes();
        [0x0A, 0x00, 0x05, 0x01, 0x00, r, g, b, self.point.x, self.point.y]
    }
}

/// 同色像素批
///
/// 布局：`size:u16 LE, 0x05,0x01,0x00, R,G,B, (X,Y)×N`，其中 `size = 8 + 2N`。
/// 超过 [`MAX_PIXELS_PER_PACKET`] 的坐标会被截断。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBatch {
    color: Rgb,
    points: Vec<Point>,
}

impl PixelBatch {
    /// 构建像素批（超出上限的坐标被丢弃）
    pub fn new(color: Rgb, points: &[Point]) -> Self {
        let len = points.len().min(MAX_PIXELS_PER_PACKET);
        Self {
            color,
            points: points[..len].to_vec(),
        }
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 声明的包长度字段
    pub fn declared_size(&self) -> u16 {
        // 点数最多 255，不会溢出 u16
        (8 + 2 * self.points.len()) as u16
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(self.declared_size() as usize);
        packet.extend_from_slice(&self.declared_size().to_le_bytes());
        packet.extend_from_slice(&[0x05, 0x01, 0x00]);
        packet.extend_from_slice(&self.color.to_bytes());
        for p in &self.points {
            packet.push(p.x);
            packet.push(p.y);
        }
        packet
    }
}

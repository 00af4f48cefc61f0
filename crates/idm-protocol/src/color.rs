//! 颜色与坐标类型

use crate::ProtocolError;
use std::fmt;
use std::str::FromStr;

/// RGB 颜色（每通道 8 bit）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const CYAN: Rgb = Rgb::new(0, 255, 255);
    pub const MAGENTA: Rgb = Rgb::new(255, 0, 255);
    pub const ORANGE: Rgb = Rgb::new(255, 150, 0);
    pub const GRAY: Rgb = Rgb::new(128, 128, 128);
    pub const PURPLE: Rgb = Rgb::new(128, 0, 128);
    pub const PINK: Rgb = Rgb::new(255, 105, 180);

    /// 可通过名称解析的颜色表
    pub const NAMED: &'static [(&'static str, Rgb)] = &[
        ("black", Rgb::BLACK),
        ("white", Rgb::WHITE),
        ("red", Rgb::RED),
        ("green", Rgb::GREEN),
        ("blue", Rgb::BLUE),
        ("yellow", Rgb::YELLOW),
        ("cyan", Rgb::CYAN),
        ("magenta", Rgb::MAGENTA),
        ("orange", Rgb::ORANGE),
        ("gray", Rgb::GRAY),
        ("grey", Rgb::GRAY),
        ("purple", Rgb::PURPLE),
        ("pink", Rgb::PINK),
    ];

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 按线路顺序返回三个字节
    pub const fn to_bytes(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// 所有可用颜色名（逗号分隔，用于错误提示）
    pub fn names() -> String {
        Self::NAMED.iter().map(|(name, _)| *name).collect::<Vec<_>>().join(", ")
    }
}

impl From<[u8; 3]> for Rgb {
    fn from(value: [u8; 3]) -> Self {
        Self::new(value[0], value[1], value[2])
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// 解析颜色名（不区分大小写）或 `#RRGGBB` 十六进制
impl FromStr for Rgb {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();

        if let Some(hex) = name.strip_prefix('#') {
            if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
                if let (Ok(r), Ok(g), Ok(b)) = (channel(0), channel(2), channel(4)) {
                    return Ok(Rgb::new(r, g, b));
                }
            }
            return Err(ProtocolError::InvalidColor(s.to_string()));
        }

        Self::NAMED
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
            .ok_or_else(|| ProtocolError::InvalidColor(s.to_string()))
    }
}

/// 屏幕坐标（0..64）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: u8,
    pub y: u8,
}

impl Point {
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }
}

impl From<(u8, u8)> for Point {
    fn from((x, y): (u8, u8)) -> Self {
        Self::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_named_colors() {
        assert_eq!("red".parse::<Rgb>().unwrap(), Rgb::RED);
        assert_eq!(" White ".parse::<Rgb>().unwrap(), Rgb::WHITE);
        assert_eq!("grey".parse::<Rgb>().unwrap(), "gray".parse::<Rgb>().unwrap());
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!("#FF9600".parse::<Rgb>().unwrap(), Rgb::ORANGE);
        assert_eq!("#00ff00".parse::<Rgb>().unwrap(), Rgb::GREEN);
    }

    #[test]
    fn test_parse_invalid_color() {
        assert!(matches!("teal".parse::<Rgb>(), Err(ProtocolError::InvalidColor(_))));
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("#GG0000".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_hex() {
        let color = Rgb::new(1, 2, 254);
        assert_eq!(color.to_string(), "#0102FE");
        assert_eq!(color.to_string().parse::<Rgb>().unwrap(), color);
    }
}

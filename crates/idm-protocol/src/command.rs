//! 单包控制指令
//!
//! 每条指令都是其类型化参数到字节序列的纯函数，不读取设备状态。
//! 布局：`len:u16 LE, cmd, sub, payload...`

use crate::ProtocolError;
use crate::color::Rgb;

// ============================================================================
// 绘图模式
// ============================================================================

/// 绘图模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawMode {
    /// 设备默认显示模式
    #[default]
    Normal = 0x00,
    /// 涂鸦（DIY）模式，静态图上传前必须切换到此模式
    Diy = 0x01,
}

impl TryFrom<u8> for DrawMode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(DrawMode::Normal),
            0x01 => Ok(DrawMode::Diy),
            _ => Err(ProtocolError::InvalidValue {
                field: "DrawMode".to_string(),
                value,
            }),
        }
    }
}

/// 绘图模式切换指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawModeCommand {
    pub mode: DrawMode,
}

impl DrawModeCommand {
    pub fn new(mode: DrawMode) -> Self {
        Self { mode }
    }

    pub fn to_bytes(self) -> [u8; 5] {
        [0x05, 0x00, 0x04, 0x01, self.mode as u8]
    }
}

// ============================================================================
// 电源 / 亮度
// ============================================================================

/// 屏幕开关指令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerCommand {
    pub on: bool,
}

impl PowerCommand {
    pub fn new(on: bool) -> Self {
        Self { on }
    }

    pub fn to_bytes(self) -> [u8; 5] {
        [0x05, 0x00, 0x07, 0x01, u8::from(self.on)]
    }
}

/// 屏幕亮度指令（百分比，5..=100）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrightnessCommand {
    percent: u8,
}

impl BrightnessCommand {
    /// 设备接受的最低亮度
    pub const MIN_PERCENT: u8 = 5;
    /// 设备接受的最高亮度
    pub const MAX_PERCENT: u8 = 100;

    pub fn new(percent: u8) -> Result<Self, ProtocolError> {
        if !(Self::MIN_PERCENT..=Self::MAX_PERCENT).contains(&percent) {
            return Err(ProtocolError::InvalidValue {
                field: "brightness".to_string(),
                value: percent,
            });
        }
        Ok(Self { percent })
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn to_bytes(self) -> [u8; 5] {
        [0x05, 0x00, 0x04, 0x80, self.percent]
    }
}

// ============================================================================
// 时钟
// ============================================================================

/// 时钟样式
///
/// 已知样式有名字；固件支持的其它编号（最大 `0x3F`）用 [`ClockStyle::Raw`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockStyle {
    Default,
    Christmas,
    Racing,
    Inverted,
    #[default]
    AnimatedHourGlass,
    Raw(u8),
}

impl ClockStyle {
    /// 样式编号上限
    pub const MAX_CODE: u8 = 0x3F;

    /// 样式编号（`Raw` 超出 6 bit 的部分被截掉）
    pub fn code(self) -> u8 {
        match self {
            ClockStyle::Default => 0,
            ClockStyle::Christmas => 1,
            ClockStyle::Racing => 2,
            ClockStyle::Inverted => 3,
            ClockStyle::AnimatedHourGlass => 4,
            ClockStyle::Raw(code) => code & Self::MAX_CODE,
        }
    }
}

impl TryFrom<u8> for ClockStyle {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ClockStyle::Default),
            1 => Ok(ClockStyle::Christmas),
            2 => Ok(ClockStyle::Racing),
            3 => Ok(ClockStyle::Inverted),
            4 => Ok(ClockStyle::AnimatedHourGlass),
            5..=Self::MAX_CODE => Ok(ClockStyle::Raw(value)),
            _ => Err(ProtocolError::InvalidValue {
                field: "ClockStyle".to_string(),
                value,
            }),
        }
    }
}

/// 时钟模式指令
///
/// 样式字节：bit 0-5 样式编号，`0x40` 24 小时制，`0x80` 显示日期。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockModeCommand {
    pub style: ClockStyle,
    pub show_date: bool,
    pub hour24: bool,
    pub color: Rgb,
}

impl ClockModeCommand {
    const FLAG_24H: u8 = 0x40;
    const FLAG_SHOW_DATE: u8 = 0x80;

    pub fn new(style: ClockStyle, show_date: bool, hour24: bool, color: Rgb) -> Self {
        Self {
            style,
            show_date,
            hour24,
            color,
        }
    }

    /// 组合样式字节
    pub fn style_byte(&self) -> u8 {
        let mut sb = self.style.code();
        if self.show_date {
            sb |= Self::FLAG_SHOW_DATE;
        }
        if self.hour24 {
            sb |= Self::FLAG_24H;
        }
        sb
    }

    pub fn to_bytes(self) -> [u8; 8] {
        let [r, g, b] = self.color.to_bytes();
        [0x08, 0x00, 0x06, 0x01, self.style_byte(), r, g, b]
    }
}

/// 校时指令
///
/// 年份按两位数编码；星期为 1..=7（周一 = 1）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTimeCommand {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl SetTimeCommand {
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        weekday: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, ProtocolError> {
        let check = |field: &str, value: u8, range: std::ops::RangeInclusive<u8>| {
            if range.contains(&value) {
                Ok(())
            } else {
                Err(ProtocolError::InvalidValue {
                    field: field.to_string(),
                    value,
                })
            }
        };
        check("month", month, 1..=12)?;
        check("day", day, 1..=31)?;
        check("weekday", weekday, 1..=7)?;
        check("hour", hour, 0..=23)?;
        check("minute", minute, 0..=59)?;
        check("second", second, 0..=59)?;

        Ok(Self {
            year,
            month,
            day,
            weekday,
            hour,
            minute,
            second,
        })
    }

    pub fn to_bytes(self) -> [u8; 11] {
        [
            0x0B,
            0x00,
            0x01,
            0x80,
            (self.year % 100) as u8,
            self.month,
            self.day,
            self.weekday,
            self.hour,
            self.minute,
            self.second,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_mode_bytes() {
        assert_eq!(DrawModeCommand::new(DrawMode::Normal).to_bytes(), [5, 0, 4, 1, 0]);
        assert_eq!(DrawModeCommand::new(DrawMode::Diy).to_bytes(), [5, 0, 4, 1, 1]);
        assert_eq!(DrawMode::try_from(1).unwrap(), DrawMode::Diy);
        assert!(DrawMode::try_from(2).is_err());
    }

    #[test]
    fn test_power_bytes() {
        assert_eq!(PowerCommand::new(true).to_bytes(), [5, 0, 7, 1, 1]);
        assert_eq!(PowerCommand::new(false).to_bytes(), [5, 0, 7, 1, 0]);
    }

    #[test]
    fn test_brightness_range() {
        assert_eq!(BrightnessCommand::new(50).unwrap().to_bytes(), [5, 0, 4, 0x80, 50]);
        assert!(BrightnessCommand::new(4).is_err());
        assert!(BrightnessCommand::new(101).is_err());
        assert_eq!(BrightnessCommand::new(100).unwrap().percent(), 100);
    }

    #[test]
    fn test_clock_mode_bytes() {
        let cmd = ClockModeCommand::new(ClockStyle::Christmas, true, true, Rgb::RED);
        assert_eq!(cmd.style_byte(), 0xC1);
        assert_eq!(cmd.to_bytes(), [0x08, 0x00, 0x06, 0x01, 0xC1, 255, 0, 0]);

        let cmd = ClockModeCommand::new(ClockStyle::Default, false, false, Rgb::WHITE);
        assert_eq!(cmd.to_bytes(), [8, 0, 6, 1, 0, 255, 255, 255]);

        let cmd = ClockModeCommand::new(ClockStyle::Default, true, false, Rgb::WHITE);
        assert_eq!(cmd.style_byte(), 0x80);

        let cmd = ClockModeCommand::new(ClockStyle::Default, false, true, Rgb::WHITE);
        assert_eq!(cmd.style_byte(), 0x40);
    }

    #[test]
    fn test_clock_style_codes() {
        assert_eq!(ClockStyle::try_from(4).unwrap(), ClockStyle::AnimatedHourGlass);
        assert_eq!(ClockStyle::try_from(9).unwrap(), ClockStyle::Raw(9));
        assert_eq!(ClockStyle::try_from(0x3F).unwrap(), ClockStyle::Raw(0x3F));
        assert!(ClockStyle::try_from(0x40).is_err());

        let cmd = ClockModeCommand::new(ClockStyle::Raw(9), true, true, Rgb::BLUE);
        assert_eq!(cmd.style_byte(), 0xC9);
        // 越界的原始编号不会污染日期 / 24 小时标志位
        assert_eq!(ClockModeCommand::new(ClockStyle::Raw(0x41), false, false, Rgb::BLUE).style_byte(), 0x01);
    }

    #[test]
    fn test_set_time_bytes() {
        let cmd = SetTimeCommand::new(2024, 12, 25, 3, 14, 30, 45).unwrap();
        assert_eq!(cmd.to_bytes(), [11, 0, 1, 128, 24, 12, 25, 3, 14, 30, 45]);
    }

    #[test]
    fn test_set_time_rejects_out_of_range() {
        assert!(SetTimeCommand::new(2024, 13, 1, 1, 0, 0, 0).is_err());
        assert!(SetTimeCommand::new(2024, 1, 1, 0, 0, 0, 0).is_err());
        assert!(SetTimeCommand::new(2024, 1, 1, 8, 0, 0, 0).is_err());
        assert!(SetTimeCommand::new(2024, 1, 1, 1, 24, 0, 0).is_err());
    }
}

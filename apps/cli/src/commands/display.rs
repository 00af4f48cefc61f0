//! 显示控制命令（亮度 / 时钟 / 像素）

use super::Action;
use anyhow::{Context, Result};
use chrono::{Datelike, Local, Timelike};
use clap::Args;
use idm_protocol::{ClockModeCommand, ClockStyle, DISPLAY_HEIGHT, DISPLAY_WIDTH, Rgb, SetTimeCommand};

/// 亮度命令参数
#[derive(Args, Debug)]
pub struct BrightnessCommand {
    /// 亮度百分比（5-100）
    #[arg(value_parser = clap::value_parser!(u8).range(5..=100))]
    pub percent: u8,
}

impl BrightnessCommand {
    pub fn into_action(self) -> Action {
        Action::Brightness(self.percent)
    }
}

/// 时钟命令参数
#[derive(Args, Debug)]
pub struct ClockCommand {
    /// 样式：default / christmas / racing / inverted / hourglass，或 0-63 的编号
    #[arg(short, long, default_value = "hourglass", value_parser = parse_clock_style)]
    pub style: ClockStyle,

    /// 数字颜色（颜色名或 #RRGGBB）
    #[arg(short, long, default_value = "white")]
    pub color: Rgb,

    /// 不显示日期
    #[arg(long)]
    pub hide_date: bool,

    /// 12 小时制
    #[arg(long = "12h")]
    pub twelve_hour: bool,

    /// 不用本机时间校时
    #[arg(long)]
    pub no_sync: bool,
}

impl ClockCommand {
    pub fn into_action(self) -> Result<Action> {
        let time = if self.no_sync { None } else { Some(local_time()?) };
        Ok(Action::Clock {
            mode: ClockModeCommand::new(self.style, !self.hide_date, !self.twelve_hour, self.color),
            time,
        })
    }
}

/// 像素命令参数
#[derive(Args, Debug)]
pub struct PixelCommand {
    /// 列（0-63）
    #[arg(value_parser = clap::value_parser!(u8).range(0..DISPLAY_WIDTH as i64))]
    pub x: u8,

    /// 行（0-63）
    #[arg(value_parser = clap::value_parser!(u8).range(0..DISPLAY_HEIGHT as i64))]
    pub y: u8,

    /// 颜色名或 #RRGGBB
    #[arg(default_value = "white")]
    pub color: Rgb,
}

impl PixelCommand {
    pub fn into_action(self) -> Action {
        Action::Pixel {
            x: self.x,
            y: self.y,
            color: self.color,
        }
    }
}

/// 解析时钟样式（名称不区分大小写）
pub fn parse_clock_style(s: &str) -> Result<ClockStyle, String> {
    let style = match s.trim().to_ascii_lowercase().as_str() {
        "default" => ClockStyle::Default,
        "christmas" => ClockStyle::Christmas,
        "racing" => ClockStyle::Racing,
        "inverted" => ClockStyle::Inverted,
        "hourglass" | "animated-hourglass" => ClockStyle::AnimatedHourGlass,
        other => {
            let n: u8 = other.parse().map_err(|_| format!("未知时钟样式: {}", s))?;
            ClockStyle::try_from(n).map_err(|e| e.to_string())?
        },
    };
    Ok(style)
}

/// 本机当前时间（两位年份，周一 = 1）
fn local_time() -> Result<SetTimeCommand> {
    let now = Local::now();
    SetTimeCommand::new(
        now.year() as u16,
        now.month() as u8,
        now.day() as u8,
        now.weekday().number_from_monday() as u8,
        now.hour() as u8,
        now.minute() as u8,
        now.second() as u8,
    )
    .context("读取本机时间失败")
}

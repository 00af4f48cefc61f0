//! 命令定义和实现
//!
//! 每个设备命令先被解析成一个 [`Action`]（读文件、解码图片都在连接之前完成），
//! 再由 One-shot 模式或 REPL 模式在一个会话上执行。

pub mod config;
pub mod discover;
pub mod display;
pub mod media;

pub use config::ConfigCommand;
pub use discover::DiscoverCommand;
pub use display::{BrightnessCommand, ClockCommand, PixelCommand};
pub use media::{ShowGifCommand, ShowImageCommand};

use idm_ble::Transport;
use idm_driver::{Commander, DriverError, UploadOutcome};
use idm_protocol::{ClockModeCommand, DrawMode, RawImage, Rgb, SetTimeCommand};

/// 一次设备操作
#[derive(Debug, Clone)]
pub enum Action {
    Power(bool),
    Brightness(u8),
    Clock {
        mode: ClockModeCommand,
        time: Option<SetTimeCommand>,
    },
    Pixel {
        x: u8,
        y: u8,
        color: Rgb,
    },
    Image(RawImage),
    Gif(Vec<u8>),
}

impl Action {
    /// 进度提示
    pub fn describe(&self) -> String {
        match self {
            Action::Power(true) => "打开屏幕".to_string(),
            Action::Power(false) => "关闭屏幕".to_string(),
            Action::Brightness(p) => format!("设置亮度 {}%", p),
            Action::Clock { mode, time } => format!(
                "切换时钟 (样式 {:?}, 颜色 {}{})",
                mode.style,
                mode.color,
                if time.is_some() { ", 同步时间" } else { "" }
            ),
            Action::Pixel { x, y, color } => format!("绘制像素 ({}, {}) {}", x, y, color),
            Action::Image(_) => "上传静态图".to_string(),
            Action::Gif(bytes) => format!("上传动图 ({} 字节)", bytes.len()),
        }
    }

    /// 在一个会话上执行；只有动图返回上传结果
    pub fn apply<T: Transport + ?Sized>(
        &self,
        cmd: &Commander<'_, T>,
    ) -> Result<Option<UploadOutcome>, DriverError> {
        match self {
            Action::Power(on) => cmd.set_power(*on)?,
            Action::Brightness(percent) => cmd.set_brightness(*percent)?,
            Action::Clock { mode, time } => {
                if let Some(time) = time {
                    cmd.set_time(*time)?;
                }
                cmd.set_clock_mode(*mode)?;
            },
            Action::Pixel { x, y, color } => {
                cmd.set_draw_mode(DrawMode::Diy)?;
                cmd.set_pixel(*x, *y, *color)?;
            },
            Action::Image(image) => {
                cmd.show_image(image)?;
            },
            Action::Gif(bytes) => return cmd.send_gif(bytes).map(Some),
        }
        Ok(None)
    }
}

/// 打印执行结果
pub fn report(outcome: Option<UploadOutcome>) {
    match outcome {
        Some(UploadOutcome::Cached) => println!("✅ 设备已缓存该动图，跳过上传"),
        Some(UploadOutcome::Completed { chunks }) => {
            println!("✅ 动图上传完成（{} 个分块）", chunks)
        },
        None => println!("✅ 完成"),
    }
}

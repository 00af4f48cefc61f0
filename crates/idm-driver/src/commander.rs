//! 指令层
//!
//! [`Commander`] 借用一个会话和一份配置，把类型化的操作翻译成协议字节写出。
//! 它本身不保存任何设备状态，可以随用随建。
//!
//! # Example
//!
//! ```no_run
//! # fn demo<T: idm_ble::Transport>(transport: &T) -> Result<(), idm_driver::DriverError> {
//! use idm_driver::{Commander, DriverConfig};
//! use idm_protocol::Rgb;
//!
//! let config = DriverConfig::default();
//! let cmd = Commander::new(transport, &config);
//! cmd.set_power(true)?;
//! cmd.set_pixel(63, 63, Rgb::GREEN)?;
//! cmd.settle();
//! # Ok(())
//! # }
//! ```

use crate::config::DriverConfig;
use crate::error::DriverError;
use crate::upload::{self, UploadOutcome};
use idm_ble::Transport;
use idm_protocol::{
    BrightnessCommand, ClockModeCommand, DrawMode, DrawModeCommand, MAX_PIXELS_PER_PACKET,
    PixelBatch, PixelCommand, Point, PowerCommand, RawImage, Rgb, SetTimeCommand,
};
use tracing::debug;

pub struct Commander<'a, T: Transport + ?Sized> {
    transport: &'a T,
    config: &'a DriverConfig,
}

impl<'a, T: Transport + ?Sized> Commander<'a, T> {
    pub fn new(transport: &'a T, config: &'a DriverConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &'a T {
        self.transport
    }

    pub fn config(&self) -> &'a DriverConfig {
        self.config
    }

    pub fn set_draw_mode(&self, mode: DrawMode) -> Result<(), DriverError> {
        upload::write_data(self.transport, &DrawModeCommand::new(mode).to_bytes())
    }

    pub fn set_power(&self, on: bool) -> Result<(), DriverError> {
        upload::write_data(self.transport, &PowerCommand::new(on).to_bytes())
    }

    /// 设置亮度（5..=100）
    pub fn set_brightness(&self, percent: u8) -> Result<(), DriverError> {
        let cmd = BrightnessCommand::new(percent)?;
        upload::write_data(self.transport, &cmd.to_bytes())
    }

    pub fn set_clock_mode(&self, clock: ClockModeCommand) -> Result<(), DriverError> {
        upload::write_data(self.transport, &clock.to_bytes())
    }

    pub fn set_time(&self, time: SetTimeCommand) -> Result<(), DriverError> {
        upload::write_data(self.transport, &time.to_bytes())
    }

    /// 画一个像素（需要先切到 DIY 模式）
    pub fn set_pixel(&self, x: u8, y: u8, color: Rgb) -> Result<(), DriverError> {
        self.transport.write_packet(&PixelCommand::new(x, y, color).to_bytes())?;
        Ok(())
    }

    /// 一次画一批同色像素（超过 255 个的坐标被丢弃，空列表不发送）
    ///
    /// 整包直接写出，不按链路大小切片。
    pub fn set_pixels(&self, color: Rgb, points: &[Point]) -> Result<(), DriverError> {
        let batch = PixelBatch::new(color, points);
        if batch.is_empty() {
            return Ok(());
        }
        self.transport.write_packet(&batch.to_bytes())?;
        Ok(())
    }

    /// 画任意数量的同色像素：按 255 个一批发送，批之间等待
    /// `pixel_batch_delay_ms`。返回发送的批数。
    pub fn draw_pixels(&self, color: Rgb, points: &[Point]) -> Result<usize, DriverError> {
        let delay = self.config.pixel_batch_delay();
        let mut batches = 0;
        for (i, batch) in points.chunks(MAX_PIXELS_PER_PACKET).enumerate() {
            if i > 0 && !delay.is_zero() {
                std::thread::sleep(delay);
            }
            self.set_pixels(color, batch)?;
            batches += 1;
        }
        debug!("Drew {} pixel(s) in {} batch(es)", points.len(), batches);
        Ok(batches)
    }

    /// 发送静态图（不切换模式，无应答）
    pub fn send_image(&self, image: &RawImage) -> Result<usize, DriverError> {
        upload::send_image(self.transport, image.as_bytes())
    }

    /// 切到 DIY 模式后发送静态图
    pub fn show_image(&self, image: &RawImage) -> Result<usize, DriverError> {
        self.set_draw_mode(DrawMode::Diy)?;
        self.send_image(image)
    }

    /// 发送动图（逐分块应答，可能命中设备缓存）
    pub fn send_gif(&self, payload: &[u8]) -> Result<UploadOutcome, DriverError> {
        upload::send_gif(self.transport, payload, self.config)
    }

    /// 无应答写入之后的固定等待
    pub fn settle(&self) {
        let delay = self.config.settle_delay();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

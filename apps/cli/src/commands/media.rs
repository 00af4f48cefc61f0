//! 图片命令（静态图 / 动图）
//!
//! 文件在连接设备之前读取并校验，尺寸不对时不会建立连接。

use super::Action;
use anyhow::{Context, Result, bail};
use clap::Args;
use idm_protocol::{DISPLAY_HEIGHT, DISPLAY_WIDTH, RawImage};
use image::ImageDecoder;
use image::codecs::gif::GifDecoder;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// 静态图命令参数
#[derive(Args, Debug)]
pub struct ShowImageCommand {
    /// 64×64 的 PNG / JPEG / GIF（GIF 只取第一帧）
    pub path: PathBuf,
}

impl ShowImageCommand {
    pub fn into_action(self) -> Result<Action> {
        Ok(Action::Image(load_image(&self.path)?))
    }
}

/// 动图命令参数
#[derive(Args, Debug)]
pub struct ShowGifCommand {
    /// 64×64 的 GIF 文件（原样发送，不转码）
    pub path: PathBuf,
}

impl ShowGifCommand {
    pub fn into_action(self) -> Result<Action> {
        Ok(Action::Gif(load_gif(&self.path)?))
    }
}

fn check_size(path: &Path, width: u32, height: u32) -> Result<()> {
    if width as usize != DISPLAY_WIDTH || height as usize != DISPLAY_HEIGHT {
        bail!(
            "{}: 图片尺寸为 {}×{}，需要 {}×{}",
            path.display(),
            width,
            height,
            DISPLAY_WIDTH,
            DISPLAY_HEIGHT
        );
    }
    Ok(())
}

/// 解码为行优先 RGB
pub fn load_image(path: &Path) -> Result<RawImage> {
    let img = image::open(path).with_context(|| format!("读取图片失败: {}", path.display()))?;
    check_size(path, img.width(), img.height())?;
    Ok(RawImage::new(img.to_rgb8().into_raw())?)
}

/// 读取 GIF 原始字节，只校验格式和尺寸
pub fn load_gif(path: &Path) -> Result<Vec<u8>> {
    let bytes = fs::read(path).with_context(|| format!("读取动图失败: {}", path.display()))?;
    let decoder = GifDecoder::new(Cursor::new(&bytes))
        .with_context(|| format!("不是有效的 GIF: {}", path.display()))?;
    let (width, height) = decoder.dimensions();
    check_size(path, width, height)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Frame, RgbImage, RgbaImage};
    use tempfile::TempDir;

    fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            encoder.encode_frame(Frame::new(RgbaImage::new(width, height))).unwrap();
        }
        bytes
    }

    #[test]
    fn test_load_png_as_rgb() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("red.png");
        RgbImage::from_pixel(64, 64, image::Rgb([255, 0, 0])).save(&path).unwrap();

        let raw = load_image(&path).unwrap();
        assert_eq!(raw.as_bytes().len(), 64 * 64 * 3);
        assert_eq!(&raw.as_bytes()[..6], &[255, 0, 0, 255, 0, 0]);
    }

    #[test]
    fn test_load_image_rejects_wrong_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("small.png");
        RgbImage::new(32, 32).save(&path).unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(err.to_string().contains("32×32"));
    }

    #[test]
    fn test_load_gif_keeps_bytes_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anim.gif");
        let bytes = gif_bytes(64, 64);
        fs::write(&path, &bytes).unwrap();

        assert_eq!(load_gif(&path).unwrap(), bytes);
    }

    #[test]
    fn test_load_gif_rejects_wrong_size_and_format() {
        let dir = TempDir::new().unwrap();
        let wide = dir.path().join("wide.gif");
        fs::write(&wide, gif_bytes(128, 64)).unwrap();
        assert!(load_gif(&wide).is_err());

        let png = dir.path().join("not-a.gif");
        RgbImage::new(64, 64).save(&png).unwrap();
        assert!(load_gif(&png).is_err());
    }
}

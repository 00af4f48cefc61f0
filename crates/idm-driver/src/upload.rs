//! 上传引擎
//!
//! 两条路径的可靠性约定不同，这是设备协议本身的区别：
//!
//! - 静态图：分块 + 分片后连续写出，不等待任何应答。可靠性完全依赖链路，
//!   调用方在最后一次写入后等待一段固定时间即可。
//! - 动图：每个分块写完后阻塞读取一条状态帧，由 [`GifTransfer`] 决定下一步。
//!   设备按 CRC32 识别出已缓存的动图时，第一个分块就会回复“完成”。

use crate::config::DriverConfig;
use crate::error::DriverError;
use idm_ble::{BleError, Transport};
use idm_protocol::{
    DeviceStatus, GIF_LINK_PACKET_SIZE, IMAGE_LINK_PACKET_SIZE, ProtocolError, fragment,
    frame_gif, frame_image,
};
use std::time::Duration;
use tracing::{debug, info};

/// 动图上传结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// 全部分块发送完毕
    Completed { chunks: usize },
    /// 设备已缓存该动图，只发送了第一个分块
    Cached,
}

/// 把一个分块按链路大小切片写出，返回写入的分片数
///
/// `pace` 不为空时每个分片写完后等待一次。
pub fn write_fragmented<T: Transport + ?Sized>(
    transport: &T,
    packet: &[u8],
    link_size: usize,
    pace: Option<Duration>,
) -> Result<usize, DriverError> {
    let mut count = 0;
    for piece in fragment(packet, link_size) {
        transport.write_packet(piece)?;
        count += 1;
        if let Some(delay) = pace.filter(|d| !d.is_zero()) {
            std::thread::sleep(delay);
        }
    }
    Ok(count)
}

/// 写出一个通用数据包（按静态图链路大小分片，无间隔）
pub fn write_data<T: Transport + ?Sized>(transport: &T, data: &[u8]) -> Result<(), DriverError> {
    write_fragmented(transport, data, IMAGE_LINK_PACKET_SIZE, None).map(|_| ())
}

/// 发送静态图载荷（无应答），返回协议分块数
pub fn send_image<T: Transport + ?Sized>(
    transport: &T,
    payload: &[u8],
) -> Result<usize, DriverError> {
    let packets = frame_image(payload)?;
    for packet in &packets {
        write_data(transport, packet)?;
    }
    debug!("Image sent: {} bytes in {} chunk(s)", payload.len(), packets.len());
    Ok(packets.len())
}

/// 动图分块应答之后的动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkAction {
    /// 发送下一个分块
    Next,
    /// 传输结束
    Finished(UploadOutcome),
}

/// 动图应答状态机
///
/// 只跟踪当前分块序号；校验和在分块头里，不参与判定。
#[derive(Debug, Clone)]
pub struct GifTransfer {
    total: usize,
    index: usize,
}

impl GifTransfer {
    pub fn new(total_chunks: usize) -> Self {
        Self {
            total: total_chunks,
            index: 0,
        }
    }

    /// 当前等待应答的分块（从 0 计）
    pub fn current(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// 处理当前分块的设备回复
    pub fn on_reply(&mut self, reply: &[u8]) -> Result<ChunkAction, DriverError> {
        let chunk = self.index + 1;
        let status = DeviceStatus::parse(reply).map_err(|e| match e {
            ProtocolError::UnexpectedStatus { code } => DriverError::UnexpectedStatus { chunk, code },
            _ => DriverError::MalformedReply {
                chunk,
                reply: hex::encode_upper(reply),
            },
        })?;

        let is_first = self.index == 0;
        let is_last = chunk == self.total;

        match status {
            DeviceStatus::Continue if is_last => Ok(ChunkAction::Finished(UploadOutcome::Completed {
                chunks: self.total,
            })),
            DeviceStatus::Continue => {
                self.index += 1;
                Ok(ChunkAction::Next)
            },
            DeviceStatus::Complete if is_last => Ok(ChunkAction::Finished(UploadOutcome::Completed {
                chunks: self.total,
            })),
            DeviceStatus::Complete if is_first => Ok(ChunkAction::Finished(UploadOutcome::Cached)),
            DeviceStatus::Complete => Err(DriverError::PrematureComplete {
                chunk,
                total: self.total,
            }),
        }
    }
}

/// 发送动图载荷（逐分块应答）
///
/// 失败时整个传输终止，重试需要从第一个分块重新开始。
pub fn send_gif<T: Transport + ?Sized>(
    transport: &T,
    payload: &[u8],
    config: &DriverConfig,
) -> Result<UploadOutcome, DriverError> {
    let frames = frame_gif(payload)?;

    transport.drain_responses();
    let stabilize = config.gif_stabilize_delay();
    if !stabilize.is_zero() {
        std::thread::sleep(stabilize);
    }

    debug!(
        "GIF upload starting: size={} crc32=0x{:08X}",
        payload.len(),
        frames.crc32
    );
    debug!("Split into {} chunk(s)", frames.len());

    let mut transfer = GifTransfer::new(frames.len());
    for (i, packet) in frames.chunks.iter().enumerate() {
        let pieces = write_fragmented(
            transport,
            packet,
            GIF_LINK_PACKET_SIZE,
            Some(config.gif_packet_delay()),
        )?;
        debug!("Sent chunk {}/{} ({} BLE packets)", i + 1, frames.len(), pieces);

        let reply = match transport.read_response(config.response_timeout()) {
            Ok(reply) => reply,
            Err(BleError::Timeout) => return Err(DriverError::ResponseTimeout { chunk: i + 1 }),
            Err(e) => return Err(e.into()),
        };
        debug!("Response for chunk {}: {}", i + 1, hex::encode_upper(&reply));

        match transfer.on_reply(&reply)? {
            ChunkAction::Next => {},
            ChunkAction::Finished(UploadOutcome::Cached) => {
                debug!("GIF already cached on device (crc32=0x{:08X})", frames.crc32);
                info!("GIF upload skipped: device cache hit");
                return Ok(UploadOutcome::Cached);
            },
            ChunkAction::Finished(outcome) => {
                info!("GIF upload complete: {} bytes, {} chunk(s)", payload.len(), frames.len());
                return Ok(outcome);
            },
        }
    }

    // 最后一个分块的应答总会结束传输
    Ok(UploadOutcome::Completed {
        chunks: frames.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTINUE: [u8; 5] = [5, 0, 1, 0, 1];
    const COMPLETE: [u8; 5] = [5, 0, 1, 0, 3];

    #[test]
    fn test_single_chunk_complete() {
        let mut t = GifTransfer::new(1);
        assert_eq!(
            t.on_reply(&COMPLETE).unwrap(),
            ChunkAction::Finished(UploadOutcome::Completed { chunks: 1 })
        );
    }

    #[test]
    fn test_continue_then_complete() {
        let mut t = GifTransfer::new(2);
        assert_eq!(t.on_reply(&CONTINUE).unwrap(), ChunkAction::Next);
        assert_eq!(t.current(), 1);
        assert_eq!(
            t.on_reply(&COMPLETE).unwrap(),
            ChunkAction::Finished(UploadOutcome::Completed { chunks: 2 })
        );
    }

    #[test]
    fn test_cache_hit_on_first_chunk() {
        let mut t = GifTransfer::new(5);
        assert_eq!(t.on_reply(&COMPLETE).unwrap(), ChunkAction::Finished(UploadOutcome::Cached));
    }

    #[test]
    fn test_complete_on_middle_chunk_is_violation() {
        let mut t = GifTransfer::new(3);
        t.on_reply(&CONTINUE).unwrap();
        let err = t.on_reply(&COMPLETE).unwrap_err();
        assert!(matches!(err, DriverError::PrematureComplete { chunk: 2, total: 3 }));
    }

    #[test]
    fn test_continue_on_last_chunk_finishes() {
        let mut t = GifTransfer::new(2);
        t.on_reply(&CONTINUE).unwrap();
        assert_eq!(
            t.on_reply(&CONTINUE).unwrap(),
            ChunkAction::Finished(UploadOutcome::Completed { chunks: 2 })
        );
    }

    #[test]
    fn test_bad_replies() {
        let mut t = GifTransfer::new(2);
        assert!(matches!(
            t.on_reply(&[5, 0, 1, 0, 7]),
            Err(DriverError::UnexpectedStatus { chunk: 1, code: 7 })
        ));
        match t.on_reply(&[5, 0, 1]) {
            Err(DriverError::MalformedReply { chunk, reply }) => {
                assert_eq!(chunk, 1);
                assert_eq!(reply, "050001");
            },
            other => panic!("Expected MalformedReply, got {:?}", other),
        }
    }

    #[test]
    fn test_long_reply_accepted() {
        let mut t = GifTransfer::new(1);
        assert!(t.on_reply(&[5, 0, 1, 0, 3, 0, 0]).is_ok());
    }
}

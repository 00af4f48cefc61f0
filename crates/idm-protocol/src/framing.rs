//! 分块与分片
//!
//! 一个逻辑载荷（原始 RGB 图像或编码后的动图）先按 [`PROTOCOL_CHUNK_SIZE`]
//! 切成协议分块，每个分块加上自己的分块头；分块头 + 分块数据再按链路
//! 写入大小切成链路分片（分片本身没有头）。
//!
//! ```text
//! payload ──chunk(4096)──▶ [header|chunk] ──fragment(link size)──▶ BLE writes
//! ```
//!
//! 静态图分块头（9 字节）：
//! `len:u16, 0x00, 0x00, flag, total:u32`
//!
//! 动图分块头（16 字节）：
//! `len:u16, 0x01, 0x00, flag, total:u32, crc32:u32, 0x00, 0x00, 0x0C`

use crate::constants::*;
use crate::{ProtocolError, checksum};
use std::slice::Chunks;

/// 分块序号标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFlag {
    /// 第一个分块
    First = 0x00,
    /// 后续分块
    Continuation = 0x02,
}

impl ChunkFlag {
    pub fn for_index(index: usize) -> Self {
        if index == 0 {
            ChunkFlag::First
        } else {
            ChunkFlag::Continuation
        }
    }
}

impl TryFrom<u8> for ChunkFlag {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(ChunkFlag::First),
            0x02 => Ok(ChunkFlag::Continuation),
            _ => Err(ProtocolError::InvalidValue {
                field: "ChunkFlag".to_string(),
                value,
            }),
        }
    }
}

/// 按协议分块大小切分载荷
///
/// 空载荷产生零个分块。
pub fn chunk_payload(payload: &[u8], chunk_size: usize) -> Chunks<'_, u8> {
    payload.chunks(chunk_size)
}

/// 把一个分块（含头）切成链路分片
pub fn fragment(packet: &[u8], link_size: usize) -> Chunks<'_, u8> {
    packet.chunks(link_size)
}

fn check_total_len(payload: &[u8]) -> Result<u32, ProtocolError> {
    u32::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })
}

// ============================================================================
// 静态图
// ============================================================================

/// 64×64 原始 RGB 图像（行优先，正好 [`RAW_IMAGE_LEN`] 字节）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage(Vec<u8>);

impl RawImage {
    pub fn new(data: Vec<u8>) -> Result<Self, ProtocolError> {
        if data.len() != RAW_IMAGE_LEN {
            return Err(ProtocolError::InvalidImageLength {
                expected: RAW_IMAGE_LEN,
                actual: data.len(),
            });
        }
        Ok(Self(data))
    }

    /// 纯色图像
    pub fn filled(color: crate::Rgb) -> Self {
        Self(color.to_bytes().repeat(DISPLAY_WIDTH * DISPLAY_HEIGHT))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for RawImage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// 静态图分块头（9 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageChunkHeader {
    pub packet_len: u16,
    pub flag: ChunkFlag,
    pub total_len: u32,
}

impl ImageChunkHeader {
    pub fn new(chunk_len: usize, index: usize, total_len: u32) -> Self {
        Self {
            // chunk_len <= PROTOCOL_CHUNK_SIZE，不会溢出
            packet_len: (chunk_len + IMAGE_HEADER_LEN) as u16,
            flag: ChunkFlag::for_index(index),
            total_len,
        }
    }

    pub fn to_bytes(self) -> [u8; IMAGE_HEADER_LEN] {
        let mut h = [0u8; IMAGE_HEADER_LEN];
        h[0..2].copy_from_slice(&self.packet_len.to_le_bytes());
        h[2] = CMD_IMAGE;
        h[3] = 0x00;
        h[4] = self.flag as u8;
        h[5..9].copy_from_slice(&self.total_len.to_le_bytes());
        h
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < IMAGE_HEADER_LEN {
            return Err(ProtocolError::InvalidHeader(format!(
                "image header needs {} bytes, got {}",
                IMAGE_HEADER_LEN,
                bytes.len()
            )));
        }
        if bytes[2] != CMD_IMAGE || bytes[3] != 0x00 {
            return Err(ProtocolError::InvalidHeader(format!(
                "not an image chunk: cmd=0x{:02X} sub=0x{:02X}",
                bytes[2], bytes[3]
            )));
        }
        Ok(Self {
            packet_len: u16::from_le_bytes([bytes[0], bytes[1]]),
            flag: ChunkFlag::try_from(bytes[4])?,
            total_len: u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
        })
    }
}

/// 构建静态图的所有协议分块（分块头 + 数据）
pub fn frame_image(payload: &[u8]) -> Result<Vec<Vec<u8>>, ProtocolError> {
    let total_len = check_total_len(payload)?;

    Ok(chunk_payload(payload, PROTOCOL_CHUNK_SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            let header = ImageChunkHeader::new(chunk.len(), index, total_len);
            let mut packet = Vec::with_capacity(IMAGE_HEADER_LEN + chunk.len());
            packet.extend_from_slice(&header.to_bytes());
            packet.extend_from_slice(chunk);
            packet
        })
        .collect())
}

// ============================================================================
// 动图
// ============================================================================

/// 动图分块头（16 字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifChunkHeader {
    pub packet_len: u16,
    pub flag: ChunkFlag,
    pub total_len: u32,
    pub crc32: u32,
}

impl GifChunkHeader {
    pub fn new(chunk_len: usize, index: usize, total_len: u32, crc32: u32) -> Self {
        Self {
            packet_len: (chunk_len + GIF_HEADER_LEN) as u16,
            flag: ChunkFlag::for_index(index),
            total_len,
            crc32,
        }
    }

    pub fn to_bytes(self) -> [u8; GIF_HEADER_LEN] {
        let mut h = [0u8; GIF_HEADER_LEN];
        h[0..2].copy_from_slice(&self.packet_len.to_le_bytes());
        h[2] = CMD_GIF;
        h[3] = 0x00;
        h[4] = self.flag as u8;
        h[5..9].copy_from_slice(&self.total_len.to_le_bytes());
        h[9..13].copy_from_slice(&self.crc32.to_le_bytes());
        // Byte 13-14: 时间签名，固定 0
        h[15] = GIF_TYPE_NO_TIME_SIGNATURE;
        h
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < GIF_HEADER_LEN {
            return Err(ProtocolError::InvalidHeader(format!(
                "gif header needs {} bytes, got {}",
                GIF_HEADER_LEN,
                bytes.len()
            )));
        }
        if bytes[2] != CMD_GIF || bytes[3] != 0x00 {
            return Err(ProtocolError::InvalidHeader(format!(
                "not a gif chunk: cmd=0x{:02X} sub=0x{:02X}",
                bytes[2], bytes[3]
            )));
        }
        if bytes[13] != 0 || bytes[14] != 0 || bytes[15] != GIF_TYPE_NO_TIME_SIGNATURE {
            return Err(ProtocolError::InvalidHeader(format!(
                "unexpected gif tail: {:02X?}",
                &bytes[13..16]
            )));
        }
        Ok(Self {
            packet_len: u16::from_le_bytes([bytes[0], bytes[1]]),
            flag: ChunkFlag::try_from(bytes[4])?,
            total_len: u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]),
            crc32: u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]),
        })
    }
}

/// 动图的协议分块集合
///
/// 校验和只计算一次，每个分块头都带同一个值。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GifFrames {
    pub crc32: u32,
    pub total_len: u32,
    pub chunks: Vec<Vec<u8>>,
}

impl GifFrames {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// 构建动图的所有协议分块（分块头 + 数据）
pub fn frame_gif(payload: &[u8]) -> Result<GifFrames, ProtocolError> {
    if payload.is_empty() {
        return Err(ProtocolError::EmptyPayload);
    }
    let total_len = check_total_len(payload)?;
    let crc32 = checksum(payload);

    let chunks = chunk_payload(payload, PROTOCOL_CHUNK_SIZE)
        .enumerate()
        .map(|(index, chunk)| {
            let header = GifChunkHeader::new(chunk.len(), index, total_len, crc32);
            let mut packet = Vec::with_capacity(GIF_HEADER_LEN + chunk.len());
            packet.extend_from_slice(&header.to_bytes());
            packet.extend_from_slice(chunk);
            packet
        })
        .collect();

    Ok(GifFrames {
        crc32,
        total_len,
        chunks,
    })
}

// ============================================================================
// 接收端解码（设备视角，用于模拟设备和测试）
// ============================================================================

/// 从连续字节流中还原静态图载荷
pub fn decode_image_stream(stream: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let mut payload = Vec::new();
    let mut cursor = 0;
    while cursor < stream.len() {
        let header = ImageChunkHeader::parse(&stream[cursor..])?;
        let expected_flag = ChunkFlag::for_index(if payload.is_empty() { 0 } else { 1 });
        if header.flag != expected_flag {
            return Err(ProtocolError::InvalidHeader(format!(
                "chunk at offset {} has flag {:?}",
                cursor, header.flag
            )));
        }
        let end = cursor + header.packet_len as usize;
        if header.packet_len as usize <= IMAGE_HEADER_LEN || end > stream.len() {
            return Err(ProtocolError::InvalidHeader(format!(
                "truncated chunk at offset {}",
                cursor
            )));
        }
        payload.extend_from_slice(&stream[cursor + IMAGE_HEADER_LEN..end]);
        if payload.len() > header.total_len as usize {
            return Err(ProtocolError::InvalidHeader("payload exceeds declared total".to_string()));
        }
        cursor = end;
    }
    Ok(payload)
}

/// 从一个动图分块（含头）中取出分块头和数据
pub fn split_gif_chunk(packet: &[u8]) -> Result<(GifChunkHeader, &[u8]), ProtocolError> {
    let header = GifChunkHeader::parse(packet)?;
    if header.packet_len as usize != packet.len() {
        return Err(ProtocolError::InvalidHeader(format!(
            "declared length {} but chunk has {} bytes",
            header.packet_len,
            packet.len()
        )));
    }
    Ok((header, &packet[GIF_HEADER_LEN..]))
}

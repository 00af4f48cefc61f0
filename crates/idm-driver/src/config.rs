//! 驱动配置
//!
//! 所有时间参数以毫秒为单位，可从 TOML 加载：
//!
//! ```toml
//! target = "AA:BB:CC:DD:EE:FF"
//! response_timeout_ms = 2000
//! serialization = "exclusive"
//! ```

use crate::error::DriverError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// 多个调用方共享一个会话时的串行化策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SerializationPolicy {
    /// 整个操作期间持有 IO 锁，不同操作的写入不会交错
    #[default]
    Exclusive,
    /// 只在读取会话时加锁，IO 期间释放；并发调用的写入可能交错
    BestEffort,
}

impl std::str::FromStr for SerializationPolicy {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "exclusive" => Ok(Self::Exclusive),
            "best_effort" => Ok(Self::BestEffort),
            other => Err(DriverError::Config(format!(
                "unknown serialization policy '{}' (expected exclusive or best_effort)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SerializationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exclusive => write!(f, "exclusive"),
            Self::BestEffort => write!(f, "best_effort"),
        }
    }
}

/// 驱动配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// 目标设备地址（为空时按名称前缀自动发现）
    pub target: Option<String>,
    /// 扫描超时
    pub scan_timeout_ms: u64,
    /// 动图分块等待设备回复的超时
    pub response_timeout_ms: u64,
    /// 重连间隔
    pub reconnect_interval_ms: u64,
    /// 动图上传前的稳定等待
    pub gif_stabilize_delay_ms: u64,
    /// 动图链路分片之间的间隔
    pub gif_packet_delay_ms: u64,
    /// 无应答写入之后的等待
    pub settle_delay_ms: u64,
    /// 像素批之间的间隔
    pub pixel_batch_delay_ms: u64,
    pub serialization: SerializationPolicy,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            target: None,
            scan_timeout_ms: 10_000,
            response_timeout_ms: 2_000,
            reconnect_interval_ms: 2_000,
            gif_stabilize_delay_ms: 100,
            gif_packet_delay_ms: 10,
            settle_delay_ms: 500,
            pixel_batch_delay_ms: 20,
            serialization: SerializationPolicy::Exclusive,
        }
    }
}

/// `get`/`set` 支持的键
pub const CONFIG_KEYS: &[&str] = &[
    "target",
    "scan_timeout_ms",
    "response_timeout_ms",
    "reconnect_interval_ms",
    "gif_stabilize_delay_ms",
    "gif_packet_delay_ms",
    "settle_delay_ms",
    "pixel_batch_delay_ms",
    "serialization",
];

impl DriverConfig {
    /// 所有延时为 0 的配置（测试用）
    pub fn immediate() -> Self {
        Self {
            reconnect_interval_ms: 0,
            gif_stabilize_delay_ms: 0,
            gif_packet_delay_ms: 0,
            settle_delay_ms: 0,
            pixel_batch_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, DriverError> {
        let config: Self = toml::from_str(s).map_err(|e| DriverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, DriverError> {
        toml::to_string(self).map_err(|e| DriverError::Config(e.to_string()))
    }

    /// 从文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DriverError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DriverError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// 保存到文件（自动创建父目录）
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DriverError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DriverError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, self.to_toml_string()?)
            .map_err(|e| DriverError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> Result<(), DriverError> {
        if self.scan_timeout_ms == 0 {
            return Err(DriverError::Config("scan_timeout_ms must be > 0".to_string()));
        }
        if self.response_timeout_ms == 0 {
            return Err(DriverError::Config("response_timeout_ms must be > 0".to_string()));
        }
        if let Some(target) = &self.target {
            if target.trim().is_empty() {
                return Err(DriverError::Config("target must not be empty".to_string()));
            }
        }
        Ok(())
    }

    /// 读取单个键
    pub fn get(&self, key: &str) -> Result<String, DriverError> {
        let value = match key {
            "target" => self.target.clone().unwrap_or_default(),
            "scan_timeout_ms" => self.scan_timeout_ms.to_string(),
            "response_timeout_ms" => self.response_timeout_ms.to_string(),
            "reconnect_interval_ms" => self.reconnect_interval_ms.to_string(),
            "gif_stabilize_delay_ms" => self.gif_stabilize_delay_ms.to_string(),
            "gif_packet_delay_ms" => self.gif_packet_delay_ms.to_string(),
            "settle_delay_ms" => self.settle_delay_ms.to_string(),
            "pixel_batch_delay_ms" => self.pixel_batch_delay_ms.to_string(),
            "serialization" => self.serialization.to_string(),
            _ => return Err(unknown_key(key)),
        };
        Ok(value)
    }

    /// 设置单个键（`target` 设为空字符串表示清除）
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), DriverError> {
        let millis = |v: &str| {
            v.trim()
                .parse::<u64>()
                .map_err(|e| DriverError::Config(format!("{} = '{}': {}", key, v, e)))
        };
        match key {
            "target" => {
                let v = value.trim();
                self.target = (!v.is_empty()).then(|| v.to_string());
            },
            "scan_timeout_ms" => self.scan_timeout_ms = millis(value)?,
            "response_timeout_ms" => self.response_timeout_ms = millis(value)?,
            "reconnect_interval_ms" => self.reconnect_interval_ms = millis(value)?,
            "gif_stabilize_delay_ms" => self.gif_stabilize_delay_ms = millis(value)?,
            "gif_packet_delay_ms" => self.gif_packet_delay_ms = millis(value)?,
            "settle_delay_ms" => self.settle_delay_ms = millis(value)?,
            "pixel_batch_delay_ms" => self.pixel_batch_delay_ms = millis(value)?,
            "serialization" => self.serialization = value.parse()?,
            _ => return Err(unknown_key(key)),
        }
        self.validate()
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn gif_stabilize_delay(&self) -> Duration {
        Duration::from_millis(self.gif_stabilize_delay_ms)
    }

    pub fn gif_packet_delay(&self) -> Duration {
        Duration::from_millis(self.gif_packet_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn pixel_batch_delay(&self) -> Duration {
        Duration::from_millis(self.pixel_batch_delay_ms)
    }
}

fn unknown_key(key: &str) -> DriverError {
    DriverError::Config(format!(
        "unknown key '{}' (expected one of: {})",
        key,
        CONFIG_KEYS.join(", ")
    ))
}

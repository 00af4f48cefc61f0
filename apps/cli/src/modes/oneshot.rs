//! One-shot 模式
//!
//! 每个命令独立执行：
//! 1. 读取配置（命令行 `--target` 优先）
//! 2. 扫描并连接设备
//! 3. 执行操作并等待设备处理
//! 4. 断开连接

use crate::commands::{Action, report};
use anyhow::{Context, Result};
use idm_ble::{BleConnector, Connector, Transport};
use idm_driver::{Commander, DriverConfig};
use tracing::warn;

/// One-shot 模式
pub struct OneShotMode {
    config: DriverConfig,
}

impl OneShotMode {
    pub fn new(config: DriverConfig) -> Self {
        Self { config }
    }

    /// 连接、执行、断开
    pub fn run(&self, action: Action) -> Result<()> {
        let connector = BleConnector::new().context("初始化蓝牙失败")?;
        self.run_with(&connector, action)
    }

    pub fn run_with<C: Connector>(&self, connector: &C, action: Action) -> Result<()> {
        match &self.config.target {
            Some(target) => println!("⏳ 连接到 {}...", target),
            None => println!("⏳ 搜索设备..."),
        }
        let transport = connector
            .connect(self.config.target.as_deref(), self.config.scan_timeout())
            .context("连接设备失败")?;
        println!("✅ 已连接 {}", transport.address());

        println!("⏳ {}...", action.describe());
        let cmd = Commander::new(&transport, &self.config);
        let result = action.apply(&cmd);
        if result.is_ok() {
            cmd.settle();
        }

        if let Err(e) = transport.disconnect() {
            warn!("Failed to disconnect: {}", e);
        }

        report(result?);
        Ok(())
    }
}

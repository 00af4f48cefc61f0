//! 扫描命令
//!
//! 列出扫描期间出现的广播设备（每个设备一行）

use anyhow::{Context, Result};
use clap::Args;
use idm_ble::{Connector, DiscoveredDevice};
use std::time::Duration;

/// 扫描命令参数
#[derive(Args, Debug)]
pub struct DiscoverCommand {
    /// 扫描时长（秒）
    #[arg(short, long, default_value_t = 5)]
    pub duration: u64,

    /// 显示所有广播设备（默认只显示 IDM-*）
    #[arg(short, long)]
    pub all: bool,
}

impl DiscoverCommand {
    pub fn execute(&self, connector: &impl Connector) -> Result<()> {
        println!("🔍 扫描 {} 秒...", self.duration);
        let devices = connector
            .scan(Duration::from_secs(self.duration))
            .context("扫描失败")?;
        let devices = self.filter(devices);

        if devices.is_empty() {
            println!("⚠️  没有发现设备");
            return Ok(());
        }

        println!("📡 发现 {} 个设备:", devices.len());
        for device in &devices {
            println!(
                "  {}  {:<20}  {}",
                device.address,
                device.name.as_deref().unwrap_or("(无名称)"),
                device.rssi.map_or_else(|| "-".to_string(), |r| format!("{} dBm", r))
            );
        }
        Ok(())
    }

    fn filter(&self, devices: Vec<DiscoveredDevice>) -> Vec<DiscoveredDevice> {
        if self.all {
            devices
        } else {
            devices.into_iter().filter(DiscoveredDevice::is_idm).collect()
        }
    }
}

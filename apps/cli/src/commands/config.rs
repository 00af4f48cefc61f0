//! 配置管理命令
//!
//! 配置保存在 `<config_dir>/idm/config.toml`，内容就是 [`DriverConfig`] 的 TOML 形式。

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use idm_driver::{CONFIG_KEYS, DriverConfig};
use std::path::PathBuf;

/// 配置文件路径
pub fn config_file() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("idm");
    path.push("config.toml");
    Ok(path)
}

/// 加载配置（文件不存在时使用默认值）
pub fn load_config() -> Result<DriverConfig> {
    let path = config_file()?;
    if !path.exists() {
        return Ok(DriverConfig::default());
    }
    DriverConfig::load(&path).with_context(|| format!("读取配置文件失败: {}", path.display()))
}

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 设置配置项（target 设为空字符串表示自动发现）
    Set {
        /// 配置项名称
        key: String,

        /// 新值
        value: String,
    },

    /// 获取配置项
    Get {
        /// 配置项名称
        #[arg(default_value = "all")]
        key: String,
    },

    /// 检查配置
    Check,
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        let path = config_file()?;
        match self {
            ConfigCommand::Set { key, value } => {
                let mut config = load_config()?;
                set_(&mut config, &key, &value)?;
                config.save(&path).context("写入配置文件失败")?;
                println!("✅ 设置 {} = {}", key, config.get(&key)?);
                Ok(())
            },

            ConfigCommand::Get { key } => {
                let config = load_config()?;
                for line in get_(&config, &key)? {
                    println!("{}", line);
                }
                Ok(())
            },

            ConfigCommand::Check => {
                println!("配置文件: {}", path.display());
                if !path.exists() {
                    println!("⚠️  文件不存在，使用默认配置");
                }
                let config = load_config()?;
                for line in get_(&config, "all")? {
                    println!("  {}", line);
                }
                println!("✅ 配置有效");
                Ok(())
            },
        }
    }
}

fn set_(config: &mut DriverConfig, key: &str, value: &str) -> Result<()> {
    config.set(key, value)?;
    Ok(())
}

fn get_(config: &DriverConfig, key: &str) -> Result<Vec<String>> {
    if key == "all" {
        return CONFIG_KEYS
            .iter()
            .map(|k| Ok(format!("{} = {}", k, display_value(&config.get(k)?))))
            .collect();
    }
    if !CONFIG_KEYS.contains(&key) {
        bail!("未知配置项: {}（可用: {}）", key, CONFIG_KEYS.join(", "));
    }
    Ok(vec![display_value(&config.get(key)?)])
}

fn display_value(value: &str) -> String {
    if value.is_empty() {
        "(未设置)".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_all_lists_every_key() {
        let lines = get_(&DriverConfig::default(), "all").unwrap();
        assert_eq!(lines.len(), CONFIG_KEYS.len());
        assert_eq!(lines[0], "target = (未设置)");
    }

    #[test]
    fn test_set_then_get() {
        let mut config = DriverConfig::default();
        set_(&mut config, "target", "AA:BB:CC:DD:EE:FF").unwrap();
        assert_eq!(get_(&config, "target").unwrap(), vec!["AA:BB:CC:DD:EE:FF"]);

        set_(&mut config, "target", "").unwrap();
        assert_eq!(get_(&config, "target").unwrap(), vec!["(未设置)"]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(get_(&DriverConfig::default(), "interface").is_err());
        assert!(set_(&mut DriverConfig::default(), "interface", "can0").is_err());
    }
}

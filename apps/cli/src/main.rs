//! # iDotMatrix CLI
//!
//! Command-line interface for iDotMatrix 64×64 BLE pixel displays.
//!
//! ## 双模式架构
//!
//! ### One-shot 模式（推荐用于脚本）
//!
//! ```bash
//! # 配置默认设备（不配置则自动发现第一个 IDM-* 设备）
//! idm-cli config set target AA:BB:CC:DD:EE:FF
//!
//! # 执行操作（内部：连接 -> 发送 -> 断开）
//! idm-cli show-image logo.png
//! idm-cli clock --style racing --color orange
//! ```
//!
//! ### REPL 模式（设备在后台保持连接并自动重连）
//!
//! ```bash
//! $ idm-cli shell
//! idm> status
//! idm> brightness 60
//! idm> gif nyan.gif
//! idm> exit
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod modes;

use commands::{
    Action, BrightnessCommand, ClockCommand, ConfigCommand, DiscoverCommand, PixelCommand,
    ShowGifCommand, ShowImageCommand,
};
use modes::oneshot::OneShotMode;
use modes::repl::run_repl;

/// iDotMatrix CLI - 像素屏命令行工具
#[derive(Parser, Debug)]
#[command(name = "idm-cli")]
#[command(about = "Command-line interface for iDotMatrix 64x64 BLE pixel displays", long_about = None)]
#[command(version)]
struct Cli {
    /// 设备地址（覆盖配置文件）
    #[arg(short, long, global = true)]
    target: Option<String>,

    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 扫描附近的设备
    Discover {
        #[command(flatten)]
        args: DiscoverCommand,
    },

    /// 打开屏幕
    On,

    /// 关闭屏幕
    Off,

    /// 设置亮度
    Brightness {
        #[command(flatten)]
        args: BrightnessCommand,
    },

    /// 切换时钟模式（默认同步本机时间）
    Clock {
        #[command(flatten)]
        args: ClockCommand,
    },

    /// 绘制一个像素
    Pixel {
        #[command(flatten)]
        args: PixelCommand,
    },

    /// 显示 64×64 静态图
    ShowImage {
        #[command(flatten)]
        args: ShowImageCommand,
    },

    /// 上传 64×64 动图
    ShowGif {
        #[command(flatten)]
        args: ShowGifCommand,
    },

    /// 启动交互式 Shell（REPL 模式）
    Shell,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    let level = if cli.verbose { "idm=debug" } else { "idm=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?),
        )
        .init();

    let target = cli.target;
    match cli.command {
        Commands::Config(cmd) => cmd.execute(),

        Commands::Discover { args } => {
            let connector = idm_ble::BleConnector::new()?;
            args.execute(&connector)
        },

        Commands::Shell => run_repl(driver_config(target)?),

        Commands::On => run_oneshot(target, Action::Power(true)),
        Commands::Off => run_oneshot(target, Action::Power(false)),
        Commands::Brightness { args } => run_oneshot(target, args.into_action()),
        Commands::Clock { args } => run_oneshot(target, args.into_action()?),
        Commands::Pixel { args } => run_oneshot(target, args.into_action()),
        Commands::ShowImage { args } => run_oneshot(target, args.into_action()?),
        Commands::ShowGif { args } => run_oneshot(target, args.into_action()?),
    }
}

/// 配置文件 + `--target` 覆盖
fn driver_config(target: Option<String>) -> Result<idm_driver::DriverConfig> {
    let mut config = commands::config::load_config()?;
    if target.is_some() {
        config.target = target;
    }
    Ok(config)
}

fn run_oneshot(target: Option<String>, action: Action) -> Result<()> {
    OneShotMode::new(driver_config(target)?).run(action)
}

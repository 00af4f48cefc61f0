//! REPL 模式（交互式 Shell）
//!
//! 专用输入线程 + crossbeam 通道：rustyline 在输入线程里阻塞读取，
//! 主线程通过 [`ConnectionManager`] 执行命令。设备断开时管理器在后台重连，
//! 期间的命令直接返回 "device not connected" / "reconnecting" 错误。

use crate::commands::{
    Action, BrightnessCommand, ClockCommand, PixelCommand, ShowGifCommand, ShowImageCommand,
    report,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{Receiver, bounded, select};
use idm_ble::{BleConnector, Connector};
use idm_driver::{ConnectionManager, DriverConfig};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::thread;

const HISTORY_FILE: &str = ".idm_history";

/// 一行 Shell 输入
#[derive(Parser, Debug)]
#[command(multicall = true)]
struct ReplLine {
    #[command(subcommand)]
    command: ReplCommand,
}

#[derive(Subcommand, Debug)]
enum ReplCommand {
    /// 显示连接状态
    Status,
    /// 打开屏幕
    On,
    /// 关闭屏幕
    Off,
    /// 设置亮度
    Brightness(BrightnessCommand),
    /// 切换时钟
    Clock(ClockCommand),
    /// 绘制一个像素
    Pixel(PixelCommand),
    /// 显示 64×64 静态图
    Image(ShowImageCommand),
    /// 上传 64×64 动图
    Gif(ShowGifCommand),
    /// 退出
    #[command(alias = "quit")]
    Exit,
}

/// 解析结果
#[derive(Debug)]
enum Parsed {
    Status,
    Exit,
    Device(Action),
}

fn parse_line(line: &str) -> Result<Parsed> {
    let words = line.split_whitespace();
    let parsed = ReplLine::try_parse_from(words)?;
    Ok(match parsed.command {
        ReplCommand::Status => Parsed::Status,
        ReplCommand::Exit => Parsed::Exit,
        ReplCommand::On => Parsed::Device(Action::Power(true)),
        ReplCommand::Off => Parsed::Device(Action::Power(false)),
        ReplCommand::Brightness(args) => Parsed::Device(args.into_action()),
        ReplCommand::Clock(args) => Parsed::Device(args.into_action()?),
        ReplCommand::Pixel(args) => Parsed::Device(args.into_action()),
        ReplCommand::Image(args) => Parsed::Device(args.into_action()?),
        ReplCommand::Gif(args) => Parsed::Device(args.into_action()?),
    })
}

/// REPL 输入（专用输入线程）
pub struct ReplInput {
    command_rx: Receiver<String>,
    _input_thread: thread::JoinHandle<()>,
}

impl ReplInput {
    /// 创建专用输入线程（保留历史记录）
    pub fn new() -> Result<Self> {
        let (command_tx, command_rx) = bounded::<String>(10);

        // Editor 在输入线程内创建，生命周期与 REPL 会话相同
        let input_thread = thread::Builder::new()
            .name("idm-repl-input".to_string())
            .spawn(move || {
                let mut rl = match DefaultEditor::new() {
                    Ok(rl) => rl,
                    Err(err) => {
                        eprintln!("❌ 初始化 readline 失败: {}", err);
                        let _ = command_tx.send("exit".to_string());
                        return;
                    },
                };
                rl.load_history(HISTORY_FILE).ok();

                loop {
                    match rl.readline("idm> ") {
                        Ok(line) => {
                            let line = line.trim().to_string();
                            if line.is_empty() {
                                continue;
                            }
                            let _ = rl.add_history_entry(line.as_str());
                            if command_tx.send(line).is_err() {
                                break;
                            }
                        },
                        // Ctrl+C 只清空当前行
                        Err(ReadlineError::Interrupted) => println!("^C"),
                        Err(ReadlineError::Eof) => {
                            let _ = command_tx.send("exit".to_string());
                            break;
                        },
                        Err(err) => {
                            eprintln!("Error: {:?}", err);
                            let _ = command_tx.send("exit".to_string());
                            break;
                        },
                    }
                }
                rl.save_history(HISTORY_FILE).ok();
            })
            .context("创建输入线程失败")?;

        Ok(Self {
            command_rx,
            _input_thread: input_thread,
        })
    }
}

/// 运行 REPL 模式
pub fn run_repl(config: DriverConfig) -> Result<()> {
    let connector = BleConnector::new().context("初始化蓝牙失败")?;
    let manager = ConnectionManager::new(connector, config);
    manager.start();

    // 输入线程之外收到的 Ctrl+C（例如命令执行期间）
    let (signal_tx, signal_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = signal_tx.try_send(());
    })
    .context("注册 Ctrl+C 处理器失败")?;

    let input = ReplInput::new()?;
    println!("iDotMatrix CLI v{} - 交互式 Shell", env!("CARGO_PKG_VERSION"));
    println!("输入 'help' 查看帮助，'exit' 退出");
    println!("💡 设备在后台连接，使用 'status' 查看连接状态");
    println!();

    loop {
        let keep_going = select! {
            recv(input.command_rx) -> line => match line {
                Ok(line) => handle_line(&manager, &line),
                Err(_) => false,
            },
            recv(signal_rx) -> _ => {
                eprintln!("\n🛑 收到 Ctrl+C");
                false
            },
        };
        if !keep_going {
            break;
        }
    }

    println!("⏳ 断开连接...");
    manager.shutdown();
    println!("👋 再见！");
    Ok(())
}

/// 处理一行输入，返回 false 表示退出
fn handle_line<C: Connector>(manager: &ConnectionManager<C>, line: &str) -> bool {
    let parsed = match parse_line(line) {
        Ok(parsed) => parsed,
        Err(err) => {
            // clap 的帮助和用法错误原样输出
            match err.downcast_ref::<clap::Error>() {
                Some(clap_err) => {
                    let _ = clap_err.print();
                },
                None => eprintln!("❌ Error: {:#}", err),
            }
            return true;
        },
    };

    match parsed {
        Parsed::Exit => false,
        Parsed::Status => {
            let state = manager.state();
            println!("📊 状态: {}", state);
            if state.is_connecting() {
                println!("💡 后台正在连接设备，请稍候");
            }
            true
        },
        Parsed::Device(action) => {
            println!("⏳ {}...", action.describe());
            match manager.with_commander(|cmd| action.apply(cmd)) {
                Ok(outcome) => report(outcome),
                Err(err) => eprintln!("❌ Error: {}", err),
            }
            true
        },
    }
}

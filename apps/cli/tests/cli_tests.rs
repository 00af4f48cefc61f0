//! 命令行参数测试（不需要蓝牙设备：所有用例都在连接之前失败或退出）

use assert_cmd::Command;
use predicates::prelude::*;

fn cli() -> Command {
    Command::cargo_bin("idm-cli").unwrap()
}

#[test]
fn test_help_lists_commands() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("discover"))
        .stdout(predicate::str::contains("show-gif"))
        .stdout(predicate::str::contains("shell"));
}

#[test]
fn test_brightness_out_of_range_rejected() {
    cli().args(["brightness", "3"]).assert().failure();
    cli().args(["brightness", "101"]).assert().failure();
}

#[test]
fn test_unknown_color_rejected() {
    cli()
        .args(["pixel", "1", "1", "teal"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("teal"));
}

#[test]
fn test_missing_image_fails_before_connecting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.png");
    cli()
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .args(["show-image", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("读取图片失败"))
        .stdout(predicate::str::contains("连接").not());
}

#[test]
fn test_config_round_trip_without_device() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .args(["config", "set", "target", "AA:BB:CC:DD:EE:FF"])
        .assert()
        .success();
    cli()
        .env("XDG_CONFIG_HOME", dir.path())
        .env("HOME", dir.path())
        .args(["config", "get", "target"])
        .assert()
        .success()
        .stdout(predicate::str::contains("AA:BB:CC:DD:EE:FF"));
    assert!(dir.path().join("idm").join("config.toml").exists());
}

//! 连接管理器集成测试
//!
//! 每个测试持有自己的 `ConnectionManager` 和脚本化的 `MockConnector`，互不影响。

use idm_ble::mock::{MockConnector, MockTransport};
use idm_ble::{BleError, Connector, DiscoveredDevice, Transport};
use idm_driver::{
    ConnectionManager, ConnectionState, DriverConfig, DriverError, SerializationPolicy,
};
use crossbeam_channel::bounded;
use idm_protocol::{RawImage, Rgb, decode_image_stream};
use std::sync::{Arc, Barrier};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(3);

fn fast_config() -> DriverConfig {
    DriverConfig {
        reconnect_interval_ms: 10,
        ..DriverConfig::immediate()
    }
}

#[test]
fn test_retries_until_discovery_succeeds() {
    let connector = MockConnector::new();
    connector
        .push_failure(BleError::DiscoveryFailed {
            target: "any".to_string(),
        })
        .push_failure(BleError::ServiceMissing("service 0xFA".to_string()))
        .push_session(MockTransport::with_address("AA:BB:CC:DD:EE:01"));

    let manager = ConnectionManager::new(connector.clone(), fast_config());
    manager.start();

    assert!(manager.wait_connected(WAIT));
    assert_eq!(connector.attempts(), 3);
    assert_eq!(manager.with_device(|t| Ok(t.address().to_string())).unwrap(), "AA:BB:CC:DD:EE:01");
    manager.shutdown();
}

#[test]
fn test_discovery_without_matching_advertisement_fails() {
    let connector = MockConnector::with_advertisements(vec![DiscoveredDevice {
        address: "AA:BB:CC:DD:EE:02".to_string(),
        name: Some("Soundbar".to_string()),
        rssi: Some(-50),
    }]);

    let err = connector.connect(None, Duration::from_millis(100)).unwrap_err();
    assert!(matches!(err, BleError::DiscoveryFailed { .. }));

    // 管理器持续重试，但始终不可用
    let manager = ConnectionManager::new(connector.clone(), fast_config());
    manager.start();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert!(matches!(manager.with_device(|_| Ok(())), Err(DriverError::NotConnected)));
    manager.shutdown();
    assert!(connector.attempts() >= 2);
}

#[test]
fn test_connection_loss_triggers_reconnect() {
    let first = MockTransport::with_address("AA:BB:CC:DD:EE:01");
    first.fail_writes_from(0, BleError::Write("Peripheral disconnected".to_string()));
    let second = MockTransport::with_address("AA:BB:CC:DD:EE:01");

    let connector = MockConnector::new();
    connector.push_session(first.clone()).push_session(second.clone());

    let manager = ConnectionManager::new(connector.clone(), fast_config());
    manager.start();
    assert!(manager.wait_connected(WAIT));

    let err = manager.with_commander(|cmd| cmd.set_power(true)).unwrap_err();
    assert!(matches!(err, DriverError::Reconnecting));
    assert_eq!(err.to_string(), "device disconnected, reconnecting...");
    assert!(first.is_disconnected());

    assert!(manager.wait_connected(WAIT));
    manager.with_commander(|cmd| cmd.set_power(true)).unwrap();
    assert_eq!(second.written(), vec![vec![5, 0, 7, 1, 1]]);
    assert_eq!(connector.attempts(), 2);
    manager.shutdown();
}

#[test]
fn test_gif_timeout_is_treated_as_connection_loss() {
    // 没有脚本化回复：第一个分块就会超时
    let silent = MockTransport::new();
    let connector = MockConnector::new();
    connector.push_session(silent.clone()).push_session(MockTransport::new());

    let manager = ConnectionManager::new(connector.clone(), fast_config());
    manager.start();
    assert!(manager.wait_connected(WAIT));

    let err = manager.with_commander(|cmd| cmd.send_gif(&[0x47, 0x49, 0x46])).unwrap_err();
    assert!(matches!(err, DriverError::Reconnecting));
    assert!(silent.is_disconnected());
    assert!(manager.wait_connected(WAIT));
    manager.shutdown();
}

#[test]
fn test_protocol_violation_does_not_reconnect() {
    let session = MockTransport::new();
    session.push_reply(vec![5, 0, 1, 0, 9]);
    let connector = MockConnector::new();
    connector.push_session(session.clone());

    let manager = ConnectionManager::new(connector.clone(), fast_config());
    manager.start();
    assert!(manager.wait_connected(WAIT));

    let err = manager.with_commander(|cmd| cmd.send_gif(&[1, 2, 3])).unwrap_err();
    assert!(matches!(err, DriverError::UnexpectedStatus { chunk: 1, code: 9 }));
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert!(!session.is_disconnected());
    assert_eq!(connector.attempts(), 1);
    manager.shutdown();
}

#[test]
fn test_exclusive_policy_keeps_transfers_contiguous() {
    let session = MockTransport::new();
    let connector = MockConnector::new();
    connector.push_session(session.clone());

    let config = DriverConfig {
        serialization: SerializationPolicy::Exclusive,
        ..fast_config()
    };
    let manager = ConnectionManager::new(connector, config);
    manager.start();
    assert!(manager.wait_connected(WAIT));

    let red = RawImage::filled(Rgb::RED);
    let blue = RawImage::filled(Rgb::BLUE);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [red.clone(), blue.clone()]
        .into_iter()
        .map(|image| {
            let manager = manager.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                manager.with_commander(|cmd| cmd.send_image(&image)).unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), 3);
    }

    // 每张图 3 个分块 × 8 个分片，两张图的分片不会交错
    let written = session.written();
    assert_eq!(written.len(), 48);
    let first = decode_image_stream(&written[..24].concat()).unwrap();
    let second = decode_image_stream(&written[24..].concat()).unwrap();
    assert!(
        (first == red.as_bytes() && second == blue.as_bytes())
            || (first == blue.as_bytes() && second == red.as_bytes())
    );
    manager.shutdown();
}

#[test]
fn test_new_session_supersedes_lost_one() {
    let first = MockTransport::with_address("AA:00:00:00:00:01");
    let second = MockTransport::with_address("AA:00:00:00:00:02");
    let connector = MockConnector::new();
    connector.push_session(first.clone()).push_session(second.clone());

    let manager = ConnectionManager::new(connector, fast_config());
    manager.start();
    assert!(manager.wait_connected(WAIT));

    let err = manager
        .with_device(|_| -> Result<(), DriverError> { Err(DriverError::Ble(BleError::NotConnected)) })
        .unwrap_err();
    assert!(matches!(err, DriverError::Reconnecting));

    assert!(manager.wait_connected(WAIT));
    let address = manager.with_device(|t| Ok(t.address().to_string())).unwrap();
    assert_eq!(address, "AA:00:00:00:00:02");
    assert!(first.is_disconnected());
    assert!(!second.is_disconnected());

    manager.shutdown();
    assert!(second.is_disconnected());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

/// 第一个操作阻塞在 `with_device` 里时，第二个操作能否在 `window` 内完成
fn second_call_overlaps_first(policy: SerializationPolicy, window: Duration) -> bool {
    let connector = MockConnector::new();
    connector.push_session(MockTransport::new());
    let config = DriverConfig {
        serialization: policy,
        ..fast_config()
    };
    let manager = ConnectionManager::new(connector, config);
    manager.start();
    assert!(manager.wait_connected(WAIT));

    let (entered_tx, entered_rx) = bounded::<()>(1);
    let (release_tx, release_rx) = bounded::<()>(1);
    let first = {
        let manager = manager.clone();
        std::thread::spawn(move || {
            manager
                .with_device(|_| {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                    Ok(())
                })
                .unwrap()
        })
    };
    entered_rx.recv_timeout(WAIT).unwrap();

    let (done_tx, done_rx) = bounded::<()>(1);
    let second = {
        let manager = manager.clone();
        std::thread::spawn(move || {
            manager.with_device(|_| Ok(())).unwrap();
            done_tx.send(()).unwrap();
        })
    };
    let overlapped = done_rx.recv_timeout(window).is_ok();

    release_tx.send(()).unwrap();
    first.join().unwrap();
    second.join().unwrap();
    if !overlapped {
        // 释放之后第二个操作照常完成
        done_rx.recv_timeout(WAIT).unwrap();
    }
    manager.shutdown();
    overlapped
}

#[test]
fn test_best_effort_runs_concurrent_units_of_work() {
    assert!(second_call_overlaps_first(SerializationPolicy::BestEffort, WAIT));
}

#[test]
fn test_exclusive_blocks_second_unit_of_work() {
    assert!(!second_call_overlaps_first(SerializationPolicy::Exclusive, Duration::from_millis(200)));
}

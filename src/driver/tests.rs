//! Unit tests for the async driver.
//! 异步驱动器的单元测试。

use super::*;
use crate::{engine::EngineStatus, test_utils::Fixture};
use std::time::Duration;
use tokio::time::Instant;

fn driver_config(open_timeout: Option<Duration>) -> DriverConfig {
    DriverConfig {
        poll_interval: Duration::from_millis(10),
        open_timeout,
    }
}

#[tokio::test(start_paused = true)]
async fn test_open_returns_once_opened() {
    let mut fixture = Fixture::new(true, true);
    fixture.probe.open_after(Layer::Connection, 2);
    fixture.probe.open_after(Layer::Session, 3);
    fixture.probe.open_after(Layer::Cbs, 5);
    let mut connection = fixture.create();

    open(&mut connection, &driver_config(Some(Duration::from_secs(1))))
        .await
        .unwrap();

    assert_eq!(connection.state(), AmqpConnectionState::Opened);
    assert_eq!(fixture.probe.work_count(Layer::Cbs), 5);
    assert_eq!(
        fixture.notifications(),
        vec![(AmqpConnectionState::Closed, AmqpConnectionState::Opened)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_times_out() {
    let mut fixture = Fixture::new(false, false);
    let mut connection = fixture.create();
    let start = Instant::now();

    let result = open(&mut connection, &driver_config(Some(Duration::from_millis(500)))).await;

    assert!(matches!(result, Err(Error::OpenTimeout(limit)) if limit == Duration::from_millis(500)));
    assert!(start.elapsed() >= Duration::from_millis(500));
    // Timing out is the owner's policy; the instance itself is untouched.
    assert_eq!(connection.state(), AmqpConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_open_reports_fault() {
    let mut fixture = Fixture::new(false, true);
    fixture
        .probe
        .set_status(Layer::Cbs, EngineStatus::Error("token rejected".into()));
    let mut connection = fixture.create();

    let result = open(&mut connection, &driver_config(None)).await;

    match result {
        Err(Error::ConnectionFaulted(fault)) => {
            assert_eq!(fault.layer, Layer::Cbs);
            assert_eq!(fault.reason, "token rejected");
        }
        other => panic!("expected a fault, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_run_until_peer_closes() {
    let mut fixture = Fixture::new(false, false);
    fixture.probe.open_after(Layer::Connection, 1);
    fixture.probe.open_after(Layer::Session, 1);
    let mut connection = fixture.create();
    let config = driver_config(None);
    open(&mut connection, &config).await.unwrap();

    let probe = fixture.probe.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        probe.set_status(Layer::Session, EngineStatus::Closed);
    });

    let state = run(&mut connection, &config).await.unwrap();

    assert_eq!(state, AmqpConnectionState::Closed);
    assert_eq!(connection.transitions(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_run_reports_fault() {
    let mut fixture = Fixture::new(false, false);
    fixture.probe.open_after(Layer::Connection, 1);
    fixture.probe.open_after(Layer::Session, 1);
    let mut connection = fixture.create();
    let config = driver_config(None);
    open(&mut connection, &config).await.unwrap();

    fixture
        .probe
        .set_status(Layer::Connection, EngineStatus::Error("io error".into()));
    let result = run(&mut connection, &config).await;

    assert!(matches!(
        result,
        Err(Error::ConnectionFaulted(Fault {
            layer: Layer::Connection,
            ..
        }))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_run_returns_immediately_when_not_opened() {
    let mut fixture = Fixture::new(false, false);
    let mut connection = fixture.create();

    let state = run(&mut connection, &driver_config(None)).await.unwrap();

    assert_eq!(state, AmqpConnectionState::Closed);
    assert_eq!(fixture.probe.work_count(Layer::Connection), 0);
}

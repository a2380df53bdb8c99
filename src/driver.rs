//! An optional owner-side loop for async applications.
//!
//! The connection manager itself never spawns or sleeps. These helpers pump
//! it on a `tokio` interval and layer an open timeout on top, which is a
//! policy the manager leaves to its owner.
//!
//! 面向异步应用的可选所有者侧循环。
//!
//! 连接管理器本身从不创建任务或休眠。这些辅助函数在 `tokio` 定时器上驱动它，
//! 并在其上叠加打开超时，这是管理器留给其所有者的策略。

use crate::{
    config::DriverConfig,
    connection::AmqpConnection,
    engine::EngineFactory,
    error::{Error, Result},
    state::{AmqpConnectionState, Fault, Layer},
};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

fn faulted<F: EngineFactory>(connection: &AmqpConnection<F>) -> Error {
    let fault = connection.fault().cloned().unwrap_or_else(|| Fault {
        layer: Layer::Connection,
        reason: "unknown failure".to_string(),
    });
    Error::ConnectionFaulted(fault)
}

/// Pumps `connection` until it is opened.
///
/// Fails with [`Error::ConnectionFaulted`] if the connection enters the error
/// state, or [`Error::OpenTimeout`] if `config.open_timeout` elapses first.
///
/// 驱动 `connection` 直到其打开。
///
/// 如果连接进入错误状态，则以 [`Error::ConnectionFaulted`] 失败；
/// 如果 `config.open_timeout` 先到期，则以 [`Error::OpenTimeout`] 失败。
pub async fn open<F: EngineFactory>(
    connection: &mut AmqpConnection<F>,
    config: &DriverConfig,
) -> Result<()> {
    let mut interval = time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let pump = async {
        loop {
            match connection.state() {
                AmqpConnectionState::Opened => return Ok(()),
                AmqpConnectionState::Error => return Err(faulted(connection)),
                AmqpConnectionState::Closed => {}
            }
            interval.tick().await;
            connection.do_work();
        }
    };

    match config.open_timeout {
        Some(limit) => match time::timeout(limit, pump).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    container_id = %connection.container_id(),
                    ?limit,
                    "AMQP connection did not open in time"
                );
                Err(Error::OpenTimeout(limit))
            }
        },
        None => pump.await,
    }
}

/// Pumps an opened `connection` until it leaves the opened state.
///
/// Returns `Ok(Closed)` when the peer ends the connection in an orderly way
/// and [`Error::ConnectionFaulted`] when a sub-engine fails. Returns
/// immediately with the current state if the connection is not opened.
///
/// 驱动已打开的 `connection`，直到其离开打开状态。
pub async fn run<F: EngineFactory>(
    connection: &mut AmqpConnection<F>,
    config: &DriverConfig,
) -> Result<AmqpConnectionState> {
    let mut interval = time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while connection.state() == AmqpConnectionState::Opened {
        interval.tick().await;
        connection.do_work();
    }

    match connection.state() {
        AmqpConnectionState::Error => Err(faulted(connection)),
        state => {
            debug!(container_id = %connection.container_id(), %state, "Driver loop finished");
            Ok(state)
        }
    }
}

#[cfg(test)]
mod tests;

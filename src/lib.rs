#![deny(clippy::expect_used, clippy::unwrap_used)]

//! AMQP connection lifecycle manager.
//! AMQP 连接生命周期管理器。
//!
//! Orchestrates an optional SASL adapter, an AMQP connection, an AMQP session
//! and an optional CBS link over a caller-supplied transport, and folds their
//! individual states into one connection-level state.
//!
//! 在调用方提供的传输之上协调可选的SASL适配器、AMQP连接、AMQP会话以及可选的CBS链路，
//! 并将它们各自的状态汇总为一个连接级状态。

pub mod config;
pub mod connection;
pub mod driver;
pub mod engine;
pub mod error;
pub mod state;
pub mod testing;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use connection::AmqpConnection;
pub use error::{Error, Result};
pub use state::{AmqpConnectionState, Fault, Layer, StateChange};

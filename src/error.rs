//! 定义了库中所有可能的错误类型。
//! Defines all possible error types in the library.

use crate::state::{Fault, Layer};
use std::time::Duration;
use thiserror::Error;

/// The primary error type for the connection manager.
/// 连接管理器的主要错误类型。
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O error occurred on the transport.
    /// 传输上发生了底层的I/O错误。
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No transport was supplied in the configuration.
    /// 配置中未提供传输。
    #[error("no underlying transport was supplied")]
    MissingTransport,

    /// The configured host name was empty.
    /// 配置的主机名为空。
    #[error("host name must not be empty")]
    EmptyHostName,

    /// A sub-engine could not be created.
    /// 无法创建子引擎。
    #[error("failed to create {layer}: {reason}")]
    EngineCreation { layer: Layer, reason: String },

    /// The CBS handle was requested but CBS was not configured.
    /// 请求了CBS句柄，但未配置CBS。
    #[error("CBS was not requested for this connection")]
    CbsNotConfigured,

    /// A sub-engine rejected the trace option.
    /// 子引擎拒绝了跟踪选项。
    #[error("{layer} rejected the trace option: {reason}")]
    TraceOption { layer: Layer, reason: String },

    /// The shared transport lock was poisoned by a panicking holder.
    /// 共享传输锁因持有者panic而中毒。
    #[error("transport lock is poisoned")]
    TransportPoisoned,

    /// The connection did not open within the allotted time.
    /// 连接未在规定时间内打开。
    #[error("connection did not open within {0:?}")]
    OpenTimeout(Duration),

    /// The connection entered the terminal error state.
    /// 连接进入了终止错误状态。
    #[error("connection faulted: {0}")]
    ConnectionFaulted(Fault),
}

/// A specialized `Result` type for this library.
/// 本库专用的 `Result` 类型。
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        use std::io::ErrorKind;
        match err {
            Error::Io(e) => e,
            Error::MissingTransport => ErrorKind::NotConnected.into(),
            Error::EmptyHostName => ErrorKind::InvalidInput.into(),
            Error::EngineCreation { .. } => ErrorKind::Other.into(),
            Error::CbsNotConfigured => ErrorKind::Unsupported.into(),
            Error::TraceOption { .. } => ErrorKind::InvalidInput.into(),
            Error::TransportPoisoned => ErrorKind::BrokenPipe.into(),
            Error::OpenTimeout(_) => ErrorKind::TimedOut.into(),
            Error::ConnectionFaulted(_) => ErrorKind::ConnectionAborted.into(),
        }
    }
}

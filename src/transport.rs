//! Abstraction over the caller-supplied byte-stream transport.
//!
//! 对调用方提供的字节流传输的抽象。

use crate::error::{Error, Result};
use bytes::BytesMut;
use std::sync::{Arc, Mutex};

/// A non-blocking byte-stream transport (TLS, socket, ...).
///
/// Implementations must return promptly: `receive` yields `Ok(0)` when no
/// bytes are ready instead of waiting.
///
/// 非阻塞字节流传输（TLS、套接字等）。
///
/// 实现必须立即返回：当没有可用字节时，`receive` 返回 `Ok(0)` 而不是等待。
pub trait Transport {
    /// Starts opening the transport.
    /// 开始打开传输。
    fn open(&mut self) -> Result<()>;

    /// Closes the transport.
    /// 关闭传输。
    fn close(&mut self) -> Result<()>;

    /// Queues `data` for sending.
    /// 将 `data` 排队发送。
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Appends whatever bytes are ready to `buf` and returns how many were read.
    /// 将已就绪的字节追加到 `buf`，并返回读取的字节数。
    fn receive(&mut self, buf: &mut BytesMut) -> Result<usize>;

    fn is_open(&self) -> bool;
}

/// A shared handle to a transport.
///
/// The caller keeps one clone for itself; engines keep their own. Dropping an
/// engine's clone never closes the transport.
///
/// 传输的共享句柄。调用方为自己保留一个克隆；引擎保留各自的克隆。
/// 丢弃引擎的克隆永远不会关闭传输。
pub type TransportHandle = Arc<Mutex<dyn Transport + Send>>;

/// Wraps a transport into a [`TransportHandle`].
pub fn shared<T: Transport + Send + 'static>(transport: T) -> TransportHandle {
    Arc::new(Mutex::new(transport))
}

/// Runs `f` with exclusive access to the transport behind `handle`.
///
/// 以独占方式访问 `handle` 背后的传输并运行 `f`。
pub fn with_transport<R>(
    handle: &TransportHandle,
    f: impl FnOnce(&mut (dyn Transport + Send + 'static)) -> Result<R>,
) -> Result<R> {
    let mut guard = handle.lock().map_err(|_| Error::TransportPoisoned)?;
    f(&mut *guard)
}

//! The seam between the connection manager and the external AMQP engine.
//!
//! The manager never speaks AMQP itself. It asks an [`EngineFactory`] for a
//! fixed set of sub-engines and drives them through the uniform
//! [`EngineWork`] capability.
//!
//! 连接管理器与外部AMQP引擎之间的接缝。
//!
//! 管理器本身从不处理AMQP协议。它向 [`EngineFactory`] 请求一组固定的子引擎，
//! 并通过统一的 [`EngineWork`] 能力驱动它们。

use crate::config::{ConnectionOptions, SessionConfig};
use crate::error::Result;
use crate::transport::TransportHandle;

/// The state a sub-engine reports after being pumped.
/// 子引擎在被驱动后报告的状态。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// Created, no negotiation started yet.
    /// 已创建，尚未开始协商。
    Idle,
    /// Open negotiation is in progress.
    /// 打开协商正在进行中。
    Opening,
    /// Open negotiation completed.
    /// 打开协商已完成。
    Open,
    /// The layer was ended in an orderly way.
    /// 该层已被有序结束。
    Closed,
    /// The layer failed and will not recover.
    /// 该层已失败且不会恢复。
    Error(String),
}

impl EngineStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns the failure reason if the layer failed.
    /// 如果该层失败，则返回失败原因。
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Error(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Runtime control over wire-level tracing.
/// 对线路级跟踪的运行时控制。
pub trait TraceControl {
    fn set_trace(&mut self, on: bool) -> Result<()>;
}

/// The uniform capability every pumped sub-engine exposes.
///
/// `do_work` must never block; progress is discovered by calling it again.
///
/// 每个被驱动的子引擎都暴露的统一能力。`do_work` 绝不能阻塞。
pub trait EngineWork: TraceControl {
    /// Advances the engine's own state machine by whatever is ready.
    /// 根据已就绪的内容推进引擎自身的状态机。
    fn do_work(&mut self);

    /// The engine's latest reported state.
    /// 引擎最近报告的状态。
    fn status(&self) -> EngineStatus;
}

/// The I/O the AMQP connection engine runs over.
/// AMQP 连接引擎所运行的I/O。
pub enum IoLayer<'a, S> {
    /// The caller's transport, unwrapped.
    /// 调用方的传输，未包装。
    Raw(&'a TransportHandle),
    /// The SASL adapter wrapping the caller's transport.
    /// 包装调用方传输的SASL适配器。
    Sasl(&'a S),
}

/// Everything the connection engine needs besides its I/O.
/// 连接引擎除I/O之外所需的一切。
#[derive(Debug, Clone, Copy)]
pub struct ConnectionParams<'a> {
    pub host_fqdn: &'a str,
    pub container_id: &'a str,
    pub options: &'a ConnectionOptions,
}

/// Creates the sub-engines owned by an [`AmqpConnection`](crate::AmqpConnection).
///
/// Creation must not perform network I/O; negotiation starts on the first
/// `do_work`.
///
/// 创建由 [`AmqpConnection`](crate::AmqpConnection) 拥有的子引擎。
/// 创建过程不得执行网络I/O；协商从第一次 `do_work` 开始。
pub trait EngineFactory {
    type SaslIo: TraceControl;
    type Connection: EngineWork;
    type Session: EngineWork;
    type Cbs: EngineWork;

    /// Wraps `transport` in a SASL adapter.
    fn create_sasl_io(&mut self, transport: &TransportHandle) -> Result<Self::SaslIo>;

    /// Creates the AMQP connection over `io`.
    fn create_connection(
        &mut self,
        io: IoLayer<'_, Self::SaslIo>,
        params: ConnectionParams<'_>,
    ) -> Result<Self::Connection>;

    /// Begins a session on `connection`.
    fn create_session(
        &mut self,
        connection: &mut Self::Connection,
        config: &SessionConfig,
    ) -> Result<Self::Session>;

    /// Creates the CBS link on `session`.
    fn create_cbs(&mut self, session: &mut Self::Session) -> Result<Self::Cbs>;
}

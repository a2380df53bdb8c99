//! Defines the aggregate connection state and the vocabulary used to report
//! transitions and faults.
//!
//! 定义聚合连接状态以及用于报告状态转换和故障的词汇。

use std::fmt;

/// The aggregate state of an [`AmqpConnection`](crate::AmqpConnection).
/// [`AmqpConnection`](crate::AmqpConnection) 的聚合状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmqpConnectionState {
    /// Connection, session and (if requested) CBS have all completed their
    /// open negotiation.
    /// 连接、会话以及（如已请求）CBS 均已完成各自的打开协商。
    Opened,
    /// Nothing has been negotiated yet, or the peer ended an opened connection.
    /// 尚未协商任何内容，或对端结束了已打开的连接。
    Closed,
    /// A sub-engine reported an unrecoverable error. Terminal for the instance.
    /// 某个子引擎报告了不可恢复的错误。对该实例而言是终止状态。
    Error,
}

impl AmqpConnectionState {
    /// Returns a static name for the state, used in logs.
    /// 返回状态的静态名称，用于日志。
    pub fn name(&self) -> &'static str {
        match self {
            Self::Opened => "Opened",
            Self::Closed => "Closed",
            Self::Error => "Error",
        }
    }

    /// Whether no further transition can happen.
    /// 是否不会再发生任何状态转换。
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error)
    }
}

impl fmt::Display for AmqpConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The protocol layers owned by the connection manager, in creation order.
/// 连接管理器拥有的协议层，按创建顺序排列。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    /// The SASL adapter wrapping the transport.
    /// 包装传输的SASL适配器。
    SaslIo,
    /// The AMQP connection.
    /// AMQP 连接。
    Connection,
    /// The AMQP session on the connection.
    /// 连接上的AMQP会话。
    Session,
    /// The CBS link on the session.
    /// 会话上的CBS链路。
    Cbs,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SaslIo => "SASL adapter",
            Self::Connection => "AMQP connection",
            Self::Session => "AMQP session",
            Self::Cbs => "CBS link",
        })
    }
}

/// The first error observed on an instance, and the layer that reported it.
/// 实例上观察到的第一个错误，以及报告该错误的层。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub layer: Layer,
    pub reason: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.layer, self.reason)
    }
}

/// The outcome of a single pump of the connection manager.
///
/// Returned from [`AmqpConnection::do_work`](crate::AmqpConnection::do_work)
/// alongside the optional state-change callback.
///
/// 连接管理器单次驱动的结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    /// The aggregate state did not change.
    /// 聚合状态未发生变化。
    Unchanged,
    /// The aggregate state moved from `previous` to `current`.
    /// 聚合状态从 `previous` 转换到了 `current`。
    Transitioned {
        previous: AmqpConnectionState,
        current: AmqpConnectionState,
    },
}

impl StateChange {
    /// Returns the new state if a transition happened.
    pub fn new_state(&self) -> Option<AmqpConnectionState> {
        match self {
            Self::Unchanged => None,
            Self::Transitioned { current, .. } => Some(*current),
        }
    }
}

//! 定义了连接管理器的可配置参数。
//! Defines configurable parameters for the connection manager.

use crate::state::AmqpConnectionState;
use crate::transport::TransportHandle;
use std::fmt;
use std::time::Duration;

/// Callback invoked synchronously from the pump with `(previous, current)`.
///
/// Runs inline within [`AmqpConnection::do_work`](crate::AmqpConnection::do_work),
/// so it must not block.
///
/// 在驱动调用中同步调用的回调，参数为 `(previous, current)`。它不能阻塞。
pub type StateChangedCallback =
    Box<dyn FnMut(AmqpConnectionState, AmqpConnectionState) + Send + 'static>;

/// A structure containing all configurable parameters for a connection manager.
///
/// 包含连接管理器所有可配置参数的结构体。
pub struct Config {
    /// Fully qualified host name of the AMQP peer.
    /// AMQP 对端的完全限定主机名。
    pub host_fqdn: String,

    /// The caller's byte-stream transport. The manager uses it but never
    /// closes it; the caller keeps its own handle.
    /// 调用方的字节流传输。管理器使用它但从不关闭它；调用方保留自己的句柄。
    pub transport: Option<TransportHandle>,

    /// Wrap the transport in a SASL adapter before AMQP framing starts.
    /// 在AMQP帧开始之前用SASL适配器包装传输。
    pub create_sasl_io: bool,

    /// Negotiate a CBS link on top of the session.
    /// 在会话之上协商CBS链路。
    pub create_cbs_connection: bool,

    /// Initial value of wire-level tracing.
    /// 线路级跟踪的初始值。
    pub is_trace_on: bool,

    /// Notified once per aggregate state transition.
    /// 每次聚合状态转换时通知一次。
    pub on_state_changed: Option<StateChangedCallback>,

    /// AMQP connection-level parameters.
    /// AMQP 连接级参数。
    pub connection: ConnectionOptions,

    /// AMQP session-level parameters.
    /// AMQP 会话级参数。
    pub session: SessionConfig,
}

/// AMQP connection-level parameters handed to the connection engine.
///
/// AMQP 连接级参数，传递给连接引擎。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Largest frame the connection will accept.
    /// 连接接受的最大帧。
    pub max_frame_size: u32,
    /// Highest channel number usable on the connection.
    /// 连接上可用的最高通道号。
    pub channel_max: u16,
    /// Idle timeout advertised to the peer.
    /// 向对端通告的空闲超时。
    pub idle_timeout: Duration,
}

/// AMQP session flow-control windows.
///
/// AMQP 会话流量控制窗口。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub incoming_window: u32,
    pub outgoing_window: u32,
}

/// Parameters of the optional async driver in [`crate::driver`].
///
/// [`crate::driver`] 中可选异步驱动器的参数。
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Delay between two pumps.
    /// 两次驱动之间的间隔。
    pub poll_interval: Duration,
    /// Upper bound on the open negotiation. `None` waits forever.
    /// 打开协商的上限。`None` 表示无限等待。
    pub open_timeout: Option<Duration>,
}

impl Config {
    /// Creates a configuration for `host_fqdn` over `transport` with every
    /// other parameter at its default.
    pub fn new(host_fqdn: impl Into<String>, transport: TransportHandle) -> Self {
        Self {
            host_fqdn: host_fqdn.into(),
            transport: Some(transport),
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host_fqdn: String::new(),
            transport: None,
            create_sasl_io: false,
            create_cbs_connection: false,
            is_trace_on: false,
            on_state_changed: None,
            connection: ConnectionOptions::default(),
            session: SessionConfig::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host_fqdn", &self.host_fqdn)
            .field("has_transport", &self.transport.is_some())
            .field("create_sasl_io", &self.create_sasl_io)
            .field("create_cbs_connection", &self.create_cbs_connection)
            .field("is_trace_on", &self.is_trace_on)
            .field("has_state_callback", &self.on_state_changed.is_some())
            .field("connection", &self.connection)
            .field("session", &self.session)
            .finish()
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_frame_size: 65536,
            channel_max: 65535,
            idle_timeout: Duration::from_secs(240),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            incoming_window: u32::MAX,
            outgoing_window: 100,
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            open_timeout: Some(Duration::from_secs(30)),
        }
    }
}

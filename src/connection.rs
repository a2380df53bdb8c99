//! 定义了AMQP连接管理器。
//! Defines the AMQP connection manager.
//!
//! [`AmqpConnection`] owns the SASL adapter, AMQP connection, AMQP session and
//! CBS link created by an [`EngineFactory`], pumps them in dependency order
//! and folds their statuses into one [`AmqpConnectionState`].
//!
//! [`AmqpConnection`] 拥有由 [`EngineFactory`] 创建的SASL适配器、AMQP连接、
//! AMQP会话和CBS链路，按依赖顺序驱动它们，并将其状态汇总为一个 [`AmqpConnectionState`]。

use crate::{
    config::{Config, StateChangedCallback},
    engine::{ConnectionParams, EngineFactory, EngineStatus, EngineWork, IoLayer, TraceControl},
    error::{Error, Result},
    state::{AmqpConnectionState, Fault, Layer, StateChange},
};
use std::fmt;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// The sub-engines of one connection.
///
/// Fields are declared in reverse creation order: Rust drops struct fields in
/// declaration order, so dropping `Engines` releases CBS, session, connection
/// and SASL adapter, in that order.
///
/// 一个连接的子引擎。字段按创建顺序的逆序声明：Rust 按声明顺序丢弃字段，
/// 因此丢弃 `Engines` 会依次释放CBS、会话、连接和SASL适配器。
struct Engines<F: EngineFactory> {
    cbs: Option<F::Cbs>,
    session: F::Session,
    connection: F::Connection,
    sasl_io: Option<F::SaslIo>,
}

impl<F: EngineFactory> Engines<F> {
    /// Pumps connection, session and CBS, in that order.
    /// 按顺序驱动连接、会话和CBS。
    fn pump(&mut self) {
        self.connection.do_work();
        self.session.do_work();
        if let Some(cbs) = self.cbs.as_mut() {
            cbs.do_work();
        }
    }

    /// Latest statuses in dependency order.
    /// 按依赖顺序排列的最新状态。
    fn statuses(&self) -> Vec<(Layer, EngineStatus)> {
        let mut statuses = Vec::with_capacity(3);
        statuses.push((Layer::Connection, self.connection.status()));
        statuses.push((Layer::Session, self.session.status()));
        if let Some(cbs) = self.cbs.as_ref() {
            statuses.push((Layer::Cbs, cbs.status()));
        }
        statuses
    }

    /// Sets the trace flag of one layer. Absent layers are skipped.
    fn set_layer_trace(&mut self, layer: Layer, on: bool) -> Result<()> {
        let result = match layer {
            Layer::SaslIo => self.sasl_io.as_mut().map_or(Ok(()), |e| e.set_trace(on)),
            Layer::Connection => self.connection.set_trace(on),
            Layer::Session => self.session.set_trace(on),
            Layer::Cbs => self.cbs.as_mut().map_or(Ok(()), |e| e.set_trace(on)),
        };
        result.map_err(|e| trace_error(layer, e))
    }

    /// Applies `on` to every sub-engine in creation order.
    ///
    /// All-or-nothing: if one layer rejects the change, the layers already
    /// switched are set back to `previous` and the rejection is returned.
    ///
    /// 按创建顺序将 `on` 应用到每个子引擎。全有或全无：如果某一层拒绝更改，
    /// 已切换的层会恢复为 `previous`，并返回该拒绝错误。
    fn set_trace(&mut self, on: bool, previous: bool) -> Result<()> {
        let mut applied = Vec::with_capacity(4);
        for layer in [Layer::SaslIo, Layer::Connection, Layer::Session, Layer::Cbs] {
            if let Err(e) = self.set_layer_trace(layer, on) {
                for done in applied.into_iter().rev() {
                    if let Err(undo) = self.set_layer_trace(done, previous) {
                        warn!(layer = ?done, error = %undo, "Could not restore trace setting");
                    }
                }
                return Err(e);
            }
            applied.push(layer);
        }
        Ok(())
    }
}

fn creation_error(layer: Layer, err: Error) -> Error {
    match err {
        err @ Error::EngineCreation { .. } => err,
        other => Error::EngineCreation {
            layer,
            reason: other.to_string(),
        },
    }
}

fn trace_error(layer: Layer, err: Error) -> Error {
    match err {
        err @ Error::TraceOption { .. } => err,
        other => Error::TraceOption {
            layer,
            reason: other.to_string(),
        },
    }
}

/// Manages the lifecycle of a single AMQP connection.
///
/// All methods run on the owner's thread. Nothing blocks: progress is made by
/// calling [`do_work`](Self::do_work) repeatedly.
///
/// 管理单个AMQP连接的生命周期。
///
/// 所有方法都在所有者的线程上运行。没有任何操作会阻塞：通过反复调用
/// [`do_work`](Self::do_work) 来推进进度。
pub struct AmqpConnection<F: EngineFactory> {
    host_fqdn: String,
    container_id: String,
    is_trace_on: bool,
    engines: Engines<F>,
    state: AmqpConnectionState,
    /// Set once the peer ends an opened connection; it never reopens.
    /// 对端结束已打开的连接后置位；连接不会再次打开。
    ended: bool,
    fault: Option<Fault>,
    transitions: u64,
    on_state_changed: Option<StateChangedCallback>,
}

impl<F: EngineFactory> AmqpConnection<F> {
    /// Creates every sub-engine the configuration asks for.
    ///
    /// Creation is eager and all-or-nothing: if any sub-engine fails, those
    /// already created are released in reverse order and the error is
    /// returned. No I/O happens here.
    ///
    /// 创建配置所要求的所有子引擎。
    ///
    /// 创建是急切且全有或全无的：如果任何子引擎失败，已创建的子引擎将按相反顺序释放，
    /// 并返回错误。此处不发生任何I/O。
    pub fn create(config: Config, factory: &mut F) -> Result<Self> {
        let Config {
            host_fqdn,
            transport,
            create_sasl_io,
            create_cbs_connection,
            is_trace_on,
            on_state_changed,
            connection: connection_options,
            session: session_config,
        } = config;

        let transport = transport.ok_or(Error::MissingTransport)?;
        if host_fqdn.is_empty() {
            return Err(Error::EmptyHostName);
        }
        let container_id = Uuid::new_v4().to_string();

        // Locals drop in reverse declaration order, which rolls back a
        // partial construction in reverse creation order.
        let sasl_io = if create_sasl_io {
            let sasl_io = factory
                .create_sasl_io(&transport)
                .map_err(|e| creation_error(Layer::SaslIo, e))?;
            debug!(%container_id, layer = ?Layer::SaslIo, "Created sub-engine");
            Some(sasl_io)
        } else {
            None
        };

        let io = match sasl_io.as_ref() {
            Some(sasl_io) => IoLayer::Sasl(sasl_io),
            None => IoLayer::Raw(&transport),
        };
        let params = ConnectionParams {
            host_fqdn: &host_fqdn,
            container_id: &container_id,
            options: &connection_options,
        };
        let mut connection = factory
            .create_connection(io, params)
            .map_err(|e| creation_error(Layer::Connection, e))?;
        debug!(%container_id, layer = ?Layer::Connection, "Created sub-engine");

        let mut session = factory
            .create_session(&mut connection, &session_config)
            .map_err(|e| creation_error(Layer::Session, e))?;
        debug!(%container_id, layer = ?Layer::Session, "Created sub-engine");

        let cbs = if create_cbs_connection {
            let cbs = factory
                .create_cbs(&mut session)
                .map_err(|e| creation_error(Layer::Cbs, e))?;
            debug!(%container_id, layer = ?Layer::Cbs, "Created sub-engine");
            Some(cbs)
        } else {
            None
        };

        let mut this = Self {
            host_fqdn,
            container_id,
            is_trace_on,
            engines: Engines {
                cbs,
                session,
                connection,
                sasl_io,
            },
            state: AmqpConnectionState::Closed,
            ended: false,
            fault: None,
            transitions: 0,
            on_state_changed,
        };

        // Engines start untraced; a rejected initial setting leaves them so.
        if let Err(e) = this.engines.set_trace(is_trace_on, false) {
            warn!(container_id = %this.container_id, error = %e, "Could not apply initial trace setting");
            this.is_trace_on = false;
        }

        info!(
            container_id = %this.container_id,
            host = %this.host_fqdn,
            sasl = create_sasl_io,
            cbs = create_cbs_connection,
            "AMQP connection created"
        );
        Ok(this)
    }

    /// Pumps every sub-engine once and re-evaluates the aggregate state.
    ///
    /// Returns promptly whether or not progress occurred. On a transition the
    /// configured callback is invoked once, inline, before returning. Once
    /// the state is [`AmqpConnectionState::Error`] the engines are no longer
    /// pumped and this always returns [`StateChange::Unchanged`].
    ///
    /// 驱动每个子引擎一次并重新评估聚合状态。
    ///
    /// 无论是否取得进展都会立即返回。发生转换时，配置的回调在返回前被内联调用一次。
    /// 一旦状态为 [`AmqpConnectionState::Error`]，引擎将不再被驱动，
    /// 并且总是返回 [`StateChange::Unchanged`]。
    pub fn do_work(&mut self) -> StateChange {
        if self.state.is_terminal() {
            trace!(container_id = %self.container_id, "Pump skipped, connection is in error");
            return StateChange::Unchanged;
        }

        self.engines.pump();
        let next = self.evaluate();
        self.update_state(next)
    }

    /// Derives the next aggregate state from the sub-engine statuses.
    ///
    /// Errors are looked for in dependency order, so a connection error wins
    /// over a session or CBS error reported during the same pump.
    fn evaluate(&mut self) -> AmqpConnectionState {
        let statuses = self.engines.statuses();
        trace!(container_id = %self.container_id, ?statuses, "Sub-engine statuses");

        if let Some((layer, reason)) = statuses
            .iter()
            .find_map(|(layer, status)| status.error().map(|reason| (*layer, reason)))
        {
            let fault = Fault {
                layer,
                reason: reason.to_string(),
            };
            warn!(container_id = %self.container_id, %fault, "Sub-engine failed");
            self.fault = Some(fault);
            return AmqpConnectionState::Error;
        }

        if self.ended {
            return AmqpConnectionState::Closed;
        }

        // Only the connection or session ending closes the whole instance.
        if self.state == AmqpConnectionState::Opened
            && statuses.iter().any(|(layer, status)| {
                matches!(layer, Layer::Connection | Layer::Session) && status.is_closed()
            })
        {
            self.ended = true;
            return AmqpConnectionState::Closed;
        }

        if statuses.iter().all(|(_, status)| status.is_open()) {
            return AmqpConnectionState::Opened;
        }

        self.state
    }

    fn update_state(&mut self, next: AmqpConnectionState) -> StateChange {
        if next == self.state {
            return StateChange::Unchanged;
        }

        let previous = std::mem::replace(&mut self.state, next);
        self.transitions += 1;
        info!(
            container_id = %self.container_id,
            from = previous.name(),
            to = next.name(),
            "AMQP connection state changed"
        );

        if let Some(callback) = self.on_state_changed.as_mut() {
            callback(previous, next);
        }

        StateChange::Transitioned {
            previous,
            current: next,
        }
    }

    /// Returns the session engine for use by higher layers.
    ///
    /// Safe to call at any point; callers are expected to wait for
    /// [`AmqpConnectionState::Opened`] before using it.
    ///
    /// 返回会话引擎供上层使用。
    pub fn session_handle(&self) -> &F::Session {
        &self.engines.session
    }

    pub fn session_handle_mut(&mut self) -> &mut F::Session {
        &mut self.engines.session
    }

    /// Returns the CBS engine. Fails with [`Error::CbsNotConfigured`] when
    /// CBS was not requested.
    ///
    /// 返回CBS引擎。未请求CBS时以 [`Error::CbsNotConfigured`] 失败。
    pub fn cbs_handle(&self) -> Result<&F::Cbs> {
        self.engines.cbs.as_ref().ok_or(Error::CbsNotConfigured)
    }

    pub fn cbs_handle_mut(&mut self) -> Result<&mut F::Cbs> {
        self.engines.cbs.as_mut().ok_or(Error::CbsNotConfigured)
    }

    /// Turns wire-level tracing on or off on every existing sub-engine.
    ///
    /// Does not touch the aggregate state.
    ///
    /// 在每个现有子引擎上开启或关闭线路级跟踪。不影响聚合状态。
    ///
    /// If any engine rejects the change, the others are restored and
    /// [`is_trace_on`](Self::is_trace_on) keeps its previous value.
    pub fn set_logging(&mut self, is_trace_on: bool) -> Result<()> {
        self.engines.set_trace(is_trace_on, self.is_trace_on)?;
        self.is_trace_on = is_trace_on;
        debug!(container_id = %self.container_id, is_trace_on, "Trace setting changed");
        Ok(())
    }

    pub fn state(&self) -> AmqpConnectionState {
        self.state
    }

    /// The first error observed, if the connection is in error.
    /// 如果连接处于错误状态，返回观察到的第一个错误。
    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn host_fqdn(&self) -> &str {
        &self.host_fqdn
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn is_trace_on(&self) -> bool {
        self.is_trace_on
    }

    /// Number of aggregate state transitions observed so far.
    /// 迄今为止观察到的聚合状态转换次数。
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Releases every sub-engine in reverse creation order.
    ///
    /// The caller's transport is never closed.
    ///
    /// 按相反的创建顺序释放每个子引擎。调用方的传输永远不会被关闭。
    pub fn destroy(self) {
        drop(self);
    }
}

impl<F: EngineFactory> Drop for AmqpConnection<F> {
    fn drop(&mut self) {
        // `engines` is dropped right after this, in reverse creation order.
        debug!(container_id = %self.container_id, "Releasing AMQP connection sub-engines");
    }
}

impl<F: EngineFactory> fmt::Debug for AmqpConnection<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmqpConnection")
            .field("host_fqdn", &self.host_fqdn)
            .field("container_id", &self.container_id)
            .field("state", &self.state)
            .field("fault", &self.fault)
            .field("is_trace_on", &self.is_trace_on)
            .field("has_sasl_io", &self.engines.sasl_io.is_some())
            .field("has_cbs", &self.engines.cbs.is_some())
            .finish()
    }
}

//! 测试辅助工具模块
//! Test utilities module
//!
//! Scripted sub-engines and a recording transport that let tests (and
//! downstream crates) drive an [`AmqpConnection`](crate::AmqpConnection)
//! deterministically without a real AMQP peer.
//!
//! 脚本化的子引擎和记录型传输，使测试（以及下游crate）无需真实的AMQP对端即可确定性地
//! 驱动 [`AmqpConnection`](crate::AmqpConnection)。

use crate::{
    config::{ConnectionOptions, SessionConfig},
    engine::{ConnectionParams, EngineFactory, EngineStatus, EngineWork, IoLayer, TraceControl},
    error::{Error, Result},
    state::Layer,
    transport::{with_transport, Transport, TransportHandle},
};
use bytes::{Bytes, BytesMut};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// --- Recording transport ---

#[derive(Debug, Default)]
struct TransportRecord {
    is_open: bool,
    open_calls: usize,
    close_calls: usize,
    sent: Vec<Bytes>,
    inbound: VecDeque<Bytes>,
}

/// A transport that records every call made on it.
///
/// 记录对其进行的每次调用的传输。
#[derive(Debug)]
pub struct RecordingTransport {
    record: Arc<Mutex<TransportRecord>>,
}

/// The observer side of a [`RecordingTransport`].
/// [`RecordingTransport`] 的观察端。
#[derive(Debug, Clone)]
pub struct TransportLog {
    record: Arc<Mutex<TransportRecord>>,
}

impl RecordingTransport {
    pub fn new() -> (Self, TransportLog) {
        let record = Arc::new(Mutex::new(TransportRecord::default()));
        (
            Self {
                record: record.clone(),
            },
            TransportLog { record },
        )
    }
}

impl Transport for RecordingTransport {
    fn open(&mut self) -> Result<()> {
        let mut record = lock(&self.record);
        record.open_calls += 1;
        record.is_open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut record = lock(&self.record);
        record.close_calls += 1;
        record.is_open = false;
        Ok(())
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut record = lock(&self.record);
        if !record.is_open {
            return Err(Error::Io(std::io::ErrorKind::NotConnected.into()));
        }
        record.sent.push(Bytes::copy_from_slice(data));
        Ok(())
    }

    fn receive(&mut self, buf: &mut BytesMut) -> Result<usize> {
        let mut record = lock(&self.record);
        match record.inbound.pop_front() {
            Some(chunk) => {
                buf.extend_from_slice(&chunk);
                Ok(chunk.len())
            }
            None => Ok(0),
        }
    }

    fn is_open(&self) -> bool {
        lock(&self.record).is_open
    }
}

impl TransportLog {
    pub fn open_calls(&self) -> usize {
        lock(&self.record).open_calls
    }

    pub fn close_calls(&self) -> usize {
        lock(&self.record).close_calls
    }

    pub fn sent(&self) -> Vec<Bytes> {
        lock(&self.record).sent.clone()
    }

    /// Queues bytes to be returned by the next `receive`.
    pub fn push_inbound(&self, data: impl Into<Bytes>) {
        lock(&self.record).inbound.push_back(data.into());
    }
}

// --- Scripted engines ---

/// Which I/O the scripted connection engine was created over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    Raw,
    Sasl,
}

#[derive(Debug)]
struct Script {
    status: EngineStatus,
    open_after: Option<u32>,
    work_count: u32,
    trace: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            status: EngineStatus::Idle,
            open_after: None,
            work_count: 0,
            trace: false,
        }
    }
}

#[derive(Debug, Default)]
struct ProbeState {
    scripts: HashMap<Layer, Script>,
    fail_creation: Option<Layer>,
    reject_trace: Option<Layer>,
    created: Vec<Layer>,
    released: Vec<Layer>,
    connection_io: Option<IoKind>,
    host_fqdn: Option<String>,
    container_id: Option<String>,
    connection_options: Option<ConnectionOptions>,
    session_config: Option<SessionConfig>,
}

/// Shared control and observation point for the scripted engines.
///
/// Tests script each layer (`open_after`, `set_status`, `fail_creation_of`)
/// and then inspect what the connection manager did with it.
///
/// 脚本化引擎的共享控制与观察点。
#[derive(Debug, Clone, Default)]
pub struct Probe {
    state: Arc<Mutex<ProbeState>>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `layer` report `Open` once it has been pumped `pumps` times.
    /// 使 `layer` 在被驱动 `pumps` 次后报告 `Open`。
    pub fn open_after(&self, layer: Layer, pumps: u32) {
        lock(&self.state).scripts.entry(layer).or_default().open_after = Some(pumps);
    }

    /// Forces the status `layer` reports from now on.
    /// 强制设置 `layer` 此后报告的状态。
    pub fn set_status(&self, layer: Layer, status: EngineStatus) {
        lock(&self.state).scripts.entry(layer).or_default().status = status;
    }

    /// Makes the factory fail when asked to create `layer`.
    pub fn fail_creation_of(&self, layer: Layer) {
        lock(&self.state).fail_creation = Some(layer);
    }

    /// Makes `layer` reject trace changes.
    pub fn reject_trace_on(&self, layer: Layer) {
        lock(&self.state).reject_trace = Some(layer);
    }

    pub fn status(&self, layer: Layer) -> EngineStatus {
        lock(&self.state)
            .scripts
            .get(&layer)
            .map(|script| script.status.clone())
            .unwrap_or(EngineStatus::Idle)
    }

    pub fn work_count(&self, layer: Layer) -> u32 {
        lock(&self.state)
            .scripts
            .get(&layer)
            .map_or(0, |script| script.work_count)
    }

    /// The trace flag of `layer`, or `None` if it was never created.
    pub fn trace_enabled(&self, layer: Layer) -> Option<bool> {
        let state = lock(&self.state);
        if !state.created.contains(&layer) {
            return None;
        }
        Some(state.scripts.get(&layer).is_some_and(|script| script.trace))
    }

    pub fn created(&self) -> Vec<Layer> {
        lock(&self.state).created.clone()
    }

    pub fn released(&self) -> Vec<Layer> {
        lock(&self.state).released.clone()
    }

    /// Sub-engines created and not yet released.
    pub fn live(&self) -> Vec<Layer> {
        let state = lock(&self.state);
        state
            .created
            .iter()
            .filter(|layer| !state.released.contains(layer))
            .copied()
            .collect()
    }

    pub fn connection_io(&self) -> Option<IoKind> {
        lock(&self.state).connection_io
    }

    pub fn host_fqdn(&self) -> Option<String> {
        lock(&self.state).host_fqdn.clone()
    }

    pub fn container_id(&self) -> Option<String> {
        lock(&self.state).container_id.clone()
    }

    pub fn connection_options(&self) -> Option<ConnectionOptions> {
        lock(&self.state).connection_options.clone()
    }

    pub fn session_config(&self) -> Option<SessionConfig> {
        lock(&self.state).session_config.clone()
    }

    fn check_creation(&self, layer: Layer) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_creation == Some(layer) {
            return Err(Error::EngineCreation {
                layer,
                reason: "scripted creation failure".to_string(),
            });
        }
        state.created.push(layer);
        state.scripts.entry(layer).or_default();
        Ok(())
    }

    fn set_trace(&self, layer: Layer, on: bool) -> Result<()> {
        let mut state = lock(&self.state);
        if state.reject_trace == Some(layer) {
            return Err(Error::TraceOption {
                layer,
                reason: "scripted trace rejection".to_string(),
            });
        }
        state.scripts.entry(layer).or_default().trace = on;
        Ok(())
    }

    fn work(&self, layer: Layer) {
        let mut state = lock(&self.state);
        let script = state.scripts.entry(layer).or_default();
        script.work_count += 1;
        if script.status == EngineStatus::Idle {
            script.status = EngineStatus::Opening;
        }
        if script.status == EngineStatus::Opening
            && script
                .open_after
                .is_some_and(|pumps| script.work_count >= pumps)
        {
            script.status = EngineStatus::Open;
        }
    }

    fn release(&self, layer: Layer) {
        lock(&self.state).released.push(layer);
    }
}

/// SASL adapter double. Holds the transport it wraps.
pub struct ScriptedSaslIo {
    probe: Probe,
    transport: TransportHandle,
}

impl TraceControl for ScriptedSaslIo {
    fn set_trace(&mut self, on: bool) -> Result<()> {
        self.probe.set_trace(Layer::SaslIo, on)
    }
}

impl Drop for ScriptedSaslIo {
    fn drop(&mut self) {
        self.probe.release(Layer::SaslIo);
    }
}

/// Connection, session or CBS double, following the [`Probe`] script.
///
/// The connection double opens its underlying transport on its first pump.
pub struct ScriptedEngine {
    layer: Layer,
    probe: Probe,
    io: Option<TransportHandle>,
    io_opened: bool,
}

impl ScriptedEngine {
    fn new(layer: Layer, probe: Probe, io: Option<TransportHandle>) -> Self {
        Self {
            layer,
            probe,
            io,
            io_opened: false,
        }
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }
}

impl TraceControl for ScriptedEngine {
    fn set_trace(&mut self, on: bool) -> Result<()> {
        self.probe.set_trace(self.layer, on)
    }
}

impl EngineWork for ScriptedEngine {
    fn do_work(&mut self) {
        if !self.io_opened {
            if let Some(io) = self.io.as_ref() {
                self.io_opened = true;
                if let Err(e) = with_transport(io, |transport| transport.open()) {
                    self.probe
                        .set_status(self.layer, EngineStatus::Error(e.to_string()));
                    return;
                }
            }
        }
        self.probe.work(self.layer);
    }

    fn status(&self) -> EngineStatus {
        self.probe.status(self.layer)
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.probe.release(self.layer);
    }
}

/// An [`EngineFactory`] producing scripted engines bound to one [`Probe`].
///
/// 生成绑定到同一个 [`Probe`] 的脚本化引擎的 [`EngineFactory`]。
#[derive(Debug, Clone)]
pub struct ScriptedFactory {
    probe: Probe,
}

impl ScriptedFactory {
    pub fn new(probe: Probe) -> Self {
        Self { probe }
    }
}

impl EngineFactory for ScriptedFactory {
    type SaslIo = ScriptedSaslIo;
    type Connection = ScriptedEngine;
    type Session = ScriptedEngine;
    type Cbs = ScriptedEngine;

    fn create_sasl_io(&mut self, transport: &TransportHandle) -> Result<Self::SaslIo> {
        self.probe.check_creation(Layer::SaslIo)?;
        Ok(ScriptedSaslIo {
            probe: self.probe.clone(),
            transport: transport.clone(),
        })
    }

    fn create_connection(
        &mut self,
        io: IoLayer<'_, Self::SaslIo>,
        params: ConnectionParams<'_>,
    ) -> Result<Self::Connection> {
        self.probe.check_creation(Layer::Connection)?;
        let (kind, transport) = match io {
            IoLayer::Raw(transport) => (IoKind::Raw, transport.clone()),
            IoLayer::Sasl(sasl_io) => (IoKind::Sasl, sasl_io.transport.clone()),
        };
        {
            let mut state = lock(&self.probe.state);
            state.connection_io = Some(kind);
            state.host_fqdn = Some(params.host_fqdn.to_string());
            state.container_id = Some(params.container_id.to_string());
            state.connection_options = Some(params.options.clone());
        }
        Ok(ScriptedEngine::new(
            Layer::Connection,
            self.probe.clone(),
            Some(transport),
        ))
    }

    fn create_session(
        &mut self,
        _connection: &mut Self::Connection,
        config: &SessionConfig,
    ) -> Result<Self::Session> {
        self.probe.check_creation(Layer::Session)?;
        lock(&self.probe.state).session_config = Some(config.clone());
        Ok(ScriptedEngine::new(Layer::Session, self.probe.clone(), None))
    }

    fn create_cbs(&mut self, _session: &mut Self::Session) -> Result<Self::Cbs> {
        self.probe.check_creation(Layer::Cbs)?;
        Ok(ScriptedEngine::new(Layer::Cbs, self.probe.clone(), None))
    }
}

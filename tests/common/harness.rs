//! tests/common/harness.rs
use amqp_connection::{
    config::Config,
    state::AmqpConnectionState,
    testing::{Probe, RecordingTransport, ScriptedFactory, TransportLog},
    transport, AmqpConnection,
};
use std::sync::{Arc, Mutex, Once};

pub const HOST: &str = "contoso.azure-devices.net";

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter = std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "amqp_connection=debug,lifecycle=info".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

pub type Transitions = Arc<Mutex<Vec<(AmqpConnectionState, AmqpConnectionState)>>>;

/// Builds a configuration over a fresh recording transport whose state
/// callback appends to the returned list.
pub fn config_with_recorder(
    create_sasl_io: bool,
    create_cbs_connection: bool,
) -> (Config, TransportLog, Transitions) {
    init_tracing();
    let (recording, log) = RecordingTransport::new();
    let transitions: Transitions = Arc::default();
    let sink = transitions.clone();

    let mut config = Config::new(HOST, transport::shared(recording));
    config.create_sasl_io = create_sasl_io;
    config.create_cbs_connection = create_cbs_connection;
    config.on_state_changed = Some(Box::new(move |previous, current| {
        sink.lock().unwrap().push((previous, current));
    }));
    (config, log, transitions)
}

/// A test harness wrapping a connection built from scripted engines.
pub struct TestHarness {
    pub probe: Probe,
    pub log: TransportLog,
    pub transitions: Transitions,
    pub connection: AmqpConnection<ScriptedFactory>,
}

impl TestHarness {
    pub fn new(create_sasl_io: bool, create_cbs_connection: bool) -> Self {
        let (config, log, transitions) = config_with_recorder(create_sasl_io, create_cbs_connection);
        let probe = Probe::new();
        let mut factory = ScriptedFactory::new(probe.clone());
        let connection = AmqpConnection::create(config, &mut factory).unwrap();
        Self {
            probe,
            log,
            transitions,
            connection,
        }
    }

    pub fn pump(&mut self, times: usize) {
        for _ in 0..times {
            self.connection.do_work();
        }
    }

    pub fn transitions(&self) -> Vec<(AmqpConnectionState, AmqpConnectionState)> {
        self.transitions.lock().unwrap().clone()
    }
}

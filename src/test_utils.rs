//! Common testing infrastructure for unit tests.

use crate::{
    config::Config,
    connection::AmqpConnection,
    state::AmqpConnectionState,
    testing::{Probe, RecordingTransport, ScriptedFactory, TransportLog},
    transport,
};
use std::sync::{Arc, Mutex, Once};

pub const TEST_HOST: &str = "test-hub.azure-devices.net";

/// Initializes tracing for tests, ensuring it's only done once.
pub fn init_tracing() {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| {
        let filter =
            std::env::var("RUST_LOG").unwrap_or_else(|_| "amqp_connection=trace".to_string());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// Every `(previous, current)` pair the state callback has seen.
pub type Notifications = Arc<Mutex<Vec<(AmqpConnectionState, AmqpConnectionState)>>>;

/// Everything a unit test needs to build and observe one connection.
pub struct Fixture {
    pub probe: Probe,
    pub factory: ScriptedFactory,
    pub transport_log: TransportLog,
    pub notifications: Notifications,
    pub config: Config,
}

impl Fixture {
    pub fn new(create_sasl_io: bool, create_cbs_connection: bool) -> Self {
        init_tracing();
        let probe = Probe::new();
        let factory = ScriptedFactory::new(probe.clone());
        let (recording, transport_log) = RecordingTransport::new();
        let notifications: Notifications = Arc::default();

        let sink = notifications.clone();
        let mut config = Config::new(TEST_HOST, transport::shared(recording));
        config.create_sasl_io = create_sasl_io;
        config.create_cbs_connection = create_cbs_connection;
        config.on_state_changed = Some(Box::new(move |previous, current| {
            sink.lock().unwrap().push((previous, current));
        }));

        Self {
            probe,
            factory,
            transport_log,
            notifications,
            config,
        }
    }

    /// Builds the connection, leaving the probe and logs in the fixture.
    pub fn create(&mut self) -> AmqpConnection<ScriptedFactory> {
        let config = std::mem::take(&mut self.config);
        AmqpConnection::create(config, &mut self.factory).unwrap()
    }

    pub fn notifications(&self) -> Vec<(AmqpConnectionState, AmqpConnectionState)> {
        self.notifications.lock().unwrap().clone()
    }
}

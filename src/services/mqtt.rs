//! MQTT client handler for the display controller.
//!
//! **Subscribe Topics** (QoS 2, one wildcard subscription `epaper/cmnd/#`):
//! - `epaper/cmnd/update-qr` - New QR fallback image (raw image bytes)
//! - `epaper/cmnd/image/add/<id>` - New drawing with id `<id>` (raw image bytes)
//! - `epaper/cmnd/image/remove` - Remove a drawing, payload is the id
//! - `epaper/cmnd/blank` - `"true"` or `"false"`
//!
//! **Publish Topics:**
//! - `epaper/online` - UTC timestamp, sent on every (re)connect
//!
//! The connection is retried forever with exponential backoff. Controller
//! state survives reconnects.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::commands::{Command, CommandOutcome};
use crate::config::MqttConfig;
use crate::coordinator::Coordinator;
use crate::error::TransportError;
use crate::traits::{Clock, EpaperPanel};

// ============================================================================
// Configuration
// ============================================================================

/// Runtime MQTT client configuration for `rumqttc`.
///
/// Built from [`MqttConfig`] with [`MqttRuntimeConfig::from_config`], which
/// picks the per-process client id and reads the CA certificate up front.
#[derive(Debug, Clone)]
pub struct MqttRuntimeConfig {
    /// MQTT broker hostname
    pub host: String,
    /// MQTT broker port
    pub port: u16,
    /// Client ID
    pub client_id: String,
    /// Topic prefix (default: "epaper")
    pub topic_prefix: String,
    /// Credentials, if any
    pub credentials: Option<(String, String)>,
    /// PEM-encoded CA certificate enabling TLS
    pub ca_certificate: Option<Vec<u8>>,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// Largest inbound packet accepted
    pub max_payload_bytes: usize,
    /// First reconnect delay
    pub first_reconnect_delay: Duration,
    /// Reconnect delay growth factor
    pub reconnect_rate: u32,
    /// Reconnect delay cap
    pub max_reconnect_delay: Duration,
}

impl Default for MqttRuntimeConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "epaper-frame".to_string(),
            topic_prefix: "epaper".to_string(),
            credentials: None,
            ca_certificate: None,
            keep_alive: Duration::from_secs(60),
            max_payload_bytes: 1024 * 1024,
            first_reconnect_delay: Duration::from_secs(1),
            reconnect_rate: 2,
            max_reconnect_delay: Duration::from_secs(60),
        }
    }
}

impl MqttRuntimeConfig {
    /// Create a new config with the given broker address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Create from the file configuration.
    ///
    /// Fails if a CA certificate is configured but cannot be read.
    pub fn from_config(config: &MqttConfig) -> Result<Self, TransportError> {
        let ca_certificate = match &config.tls_ca_path {
            Some(path) => Some(std::fs::read(path).map_err(|e| {
                TransportError::Connect(format!("reading CA certificate {}: {e}", path.display()))
            })?),
            None => None,
        };
        Ok(Self {
            host: config.host.clone(),
            port: config.port,
            client_id: config.client_id(),
            topic_prefix: config.topic_prefix.clone(),
            credentials: config
                .has_auth()
                .then(|| (config.username.clone(), config.password.clone())),
            ca_certificate,
            keep_alive: config.keep_alive(),
            max_payload_bytes: config.max_payload_bytes,
            first_reconnect_delay: Duration::from_millis(config.first_reconnect_delay_ms),
            reconnect_rate: config.reconnect_rate,
            max_reconnect_delay: Duration::from_millis(config.max_reconnect_delay_ms),
        })
    }

    /// Set the client ID
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Set the topic prefix
    pub fn topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = prefix.into();
        self
    }

    /// Full topic for `suffix`.
    pub fn topic(&self, suffix: &str) -> String {
        format!("{}/{}", self.topic_prefix, suffix)
    }

    /// The command suffix of `topic`, if it is a command topic.
    pub fn command_suffix<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic
            .strip_prefix(self.topic_prefix.as_str())?
            .strip_prefix("/cmnd/")
    }

    fn backoff(&self) -> Backoff {
        Backoff::new(
            self.first_reconnect_delay,
            self.reconnect_rate,
            self.max_reconnect_delay,
        )
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_max_packet_size(self.max_payload_bytes, self.max_payload_bytes);
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }
        if let Some(ca) = &self.ca_certificate {
            options.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
                ca: ca.clone(),
                alpn: None,
                client_auth: None,
            }));
        }
        options
    }
}

/// Payload of the `online` announcement: naive ISO-8601 UTC with microseconds.
pub fn online_payload(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

// ============================================================================
// MQTT Handler
// ============================================================================

/// MQTT handler that bridges broker messages to the display controller.
pub struct MqttHandler<P, C>
where
    P: EpaperPanel + Send + 'static,
    C: Clock + Send + 'static,
{
    coordinator: Arc<Coordinator<P, C>>,
    config: MqttRuntimeConfig,
}

impl<P, C> MqttHandler<P, C>
where
    P: EpaperPanel + Send + 'static,
    C: Clock + Send + 'static,
{
    /// Create a handler sharing `coordinator` with the other services.
    pub fn new(coordinator: Arc<Coordinator<P, C>>, config: MqttRuntimeConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Client configuration in use.
    pub fn config(&self) -> &MqttRuntimeConfig {
        &self.config
    }

    /// Run the MQTT handler until `shutdown` flips to `true` (or its sender
    /// is dropped).
    ///
    /// Connection failures never end the loop; they are logged and retried
    /// after a backoff delay.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), TransportError> {
        let (client, mut eventloop) = AsyncClient::new(self.config.options(), 10);
        let mut backoff = self.config.backoff();

        info!(
            host = %self.config.host,
            port = self.config.port,
            client_id = %self.config.client_id,
            tls = self.config.ca_certificate.is_some(),
            "connecting to MQTT broker"
        );

        loop {
            let event = tokio::select! {
                _ = shutdown.changed() => break,
                event = eventloop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(code = ?ack.code, "MQTT connected");
                    backoff.reset();
                    self.on_connected(&client);
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!(codes = ?ack.return_codes, "subscription acknowledged");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.dispatch(&publish.topic, &publish.payload).await;
                }
                Ok(_) => {}
                Err(e) => {
                    let delay = backoff.next_delay();
                    let err = TransportError::Disconnected(e.to_string());
                    warn!(error = %err, attempt = backoff.attempts(), ?delay, "reconnecting");
                    tokio::select! {
                        _ = shutdown.changed() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        info!("MQTT handler stopping");
        if client.try_disconnect().is_ok() {
            // Drive the loop briefly so the DISCONNECT actually goes out.
            let _ = tokio::time::timeout(Duration::from_secs(1), eventloop.poll()).await;
        }
        Ok(())
    }

    fn on_connected(&self, client: &AsyncClient) {
        let commands = self.config.topic("cmnd/#");
        if let Err(e) = client.try_subscribe(commands.as_str(), QoS::ExactlyOnce) {
            error!(error = %e, topic = %commands, "subscribe failed");
        }

        let online = self.config.topic("online");
        if let Err(e) = client.try_publish(
            online.as_str(),
            QoS::AtLeastOnce,
            false,
            online_payload(Utc::now()),
        ) {
            error!(error = %e, topic = %online, "online announcement failed");
        }
    }

    /// Parses one inbound message and applies it to the controller.
    ///
    /// Returns `None` when the message was dropped: not a command topic,
    /// malformed, or failed in storage. Every drop is logged.
    pub async fn dispatch(&self, topic: &str, payload: &[u8]) -> Option<CommandOutcome> {
        let Some(suffix) = self.config.command_suffix(topic) else {
            debug!(%topic, "ignoring message outside command namespace");
            return None;
        };

        let cmd = match Command::parse(suffix, payload) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!(error = %e, %topic, "dropping command");
                return None;
            }
        };
        debug!(command = ?cmd, "received command");

        let coordinator = Arc::clone(&self.coordinator);
        match tokio::task::spawn_blocking(move || coordinator.apply_command(cmd)).await {
            Ok(Ok(outcome)) => {
                debug!(?outcome, "command applied");
                Some(outcome)
            }
            Ok(Err(e)) => {
                error!(error = %e, %topic, "command failed");
                None
            }
            Err(e) => {
                error!(error = %e, %topic, "command task panicked");
                None
            }
        }
    }
}

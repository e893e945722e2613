//! Remote control channel over MQTT.
//!
//! Implements [`RemoteChannel`].  Every virtual pin and the terminal map to
//! topics under the device namespace:
//!
//! | Topic                  | Direction | Meaning                          |
//! |------------------------|-----------|----------------------------------|
//! | `<ns>/v0/set`          | in        | button (`1` / `0`), retained     |
//! | `<ns>/terminal/in`     | in        | one terminal line                |
//! | `<ns>/ota`             | in        | firmware source URL              |
//! | `<ns>/v<n>`            | out       | virtual pin value, retained      |
//! | `<ns>/terminal`        | out       | terminal line                    |
//!
//! The dashboard publishes the button retained, so re-subscribing replays
//! its last value: that is the button sync.  Acknowledging the button also
//! overwrites the retained `<ns>/v0/set`, so the next sync replays `0`.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `EspMqttClient`; a receiver thread
//!   forwards connection events through an mpsc channel and
//!   [`RemoteLink::service`] drains it on the main task.
//! - **all other targets**: in-memory loopback.  Inbound messages are
//!   injected, outbound ones recorded.

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::app::events::RemoteEvent;
use crate::app::ports::RemoteChannel;
use crate::pins::virtual_pins;

/// Largest inbound payload accepted, in bytes.
const MAX_PAYLOAD_BYTES: usize = 512;

// ───────────────────────────────────────────────────────────────
// Topic map
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    namespace: String,
}

impl Topics {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.trim_end_matches('/').to_string(),
        }
    }

    pub fn button_set(&self) -> String {
        format!("{}/v{}/set", self.namespace, virtual_pins::BUTTON)
    }

    pub fn terminal_in(&self) -> String {
        format!("{}/terminal/in", self.namespace)
    }

    pub fn ota(&self) -> String {
        format!("{}/ota", self.namespace)
    }

    pub fn terminal_out(&self) -> String {
        format!("{}/terminal", self.namespace)
    }

    pub fn pin(&self, pin: u8) -> String {
        format!("{}/v{}", self.namespace, pin)
    }

    /// Translate an inbound message.  Unknown topics and malformed
    /// payloads yield `None`.
    pub fn parse(&self, topic: &str, payload: &[u8]) -> Option<RemoteEvent> {
        if payload.len() > MAX_PAYLOAD_BYTES {
            warn!("Remote: dropping {} byte payload on {}", payload.len(), topic);
            return None;
        }
        let text = core::str::from_utf8(payload).ok()?.trim();

        if topic == self.button_set() {
            match text {
                "1" => Some(RemoteEvent::Button(true)),
                "0" => Some(RemoteEvent::Button(false)),
                other => {
                    warn!("Remote: bad button value '{}'", other);
                    None
                }
            }
        } else if topic == self.terminal_in() {
            Some(RemoteEvent::Console(text.to_string()))
        } else if topic == self.ota() {
            if text.is_empty() {
                warn!("Remote: empty update URL");
                return None;
            }
            Some(RemoteEvent::UpdateRequested(text.to_string()))
        } else {
            debug!("Remote: ignoring topic {}", topic);
            None
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Receiver-thread messages (ESP only)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
enum Inbound {
    Connected,
    Disconnected,
    Message { topic: String, payload: Vec<u8> },
}

// ───────────────────────────────────────────────────────────────
// Link
// ───────────────────────────────────────────────────────────────

pub struct RemoteLink {
    topics: Topics,
    inbound: VecDeque<RemoteEvent>,
    /// Terminal lines written since the last flush.
    pending_lines: Vec<String>,
    connected: bool,
    #[cfg(target_os = "espidf")]
    client: Option<esp_idf_svc::mqtt::client::EspMqttClient<'static>>,
    #[cfg(target_os = "espidf")]
    rx: Option<std::sync::mpsc::Receiver<Inbound>>,
    /// Simulation: last retained button value.
    #[cfg(not(target_os = "espidf"))]
    retained_button: Option<bool>,
    /// Simulation: every `(topic, payload)` published.
    #[cfg(not(target_os = "espidf"))]
    published: Vec<(String, String)>,
}

impl RemoteLink {
    pub fn new(topics: Topics) -> Self {
        Self {
            topics,
            inbound: VecDeque::new(),
            pending_lines: Vec::new(),
            connected: false,
            #[cfg(target_os = "espidf")]
            client: None,
            #[cfg(target_os = "espidf")]
            rx: None,
            #[cfg(not(target_os = "espidf"))]
            retained_button: None,
            #[cfg(not(target_os = "espidf"))]
            published: Vec::new(),
        }
    }

    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Queue a connectivity-lost event (raised by the link layer).
    pub fn notify_link_lost(&mut self) {
        self.inbound.push_back(RemoteEvent::ConnectivityLost);
    }

    // ── Platform-specific ─────────────────────────────────────

    /// Create the client and its receiver thread.  The client reconnects
    /// on its own once the network is up.
    #[cfg(target_os = "espidf")]
    pub fn open(&mut self, broker_url: &str, client_id: &str, token: &str) -> Result<(), crate::error::ConnectivityError> {
        use esp_idf_svc::mqtt::client::{EspMqttClient, EventPayload, MqttClientConfiguration};
        use crate::error::ConnectivityError;

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            username: Some(client_id),
            password: (!token.is_empty()).then_some(token),
            ..Default::default()
        };
        let (client, mut conn) = EspMqttClient::new(broker_url, &conf).map_err(|e| {
            warn!("Remote: client create failed: {:?}", e);
            ConnectivityError::ConnectionFailed
        })?;

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::Builder::new()
            .name("mqtt-rx".into())
            .stack_size(8 * 1024)
            .spawn(move || {
                while let Ok(event) = conn.next() {
                    let msg = match event.payload() {
                        EventPayload::Connected(_) => Inbound::Connected,
                        EventPayload::Disconnected => Inbound::Disconnected,
                        EventPayload::Received { topic: Some(topic), data, .. } => Inbound::Message {
                            topic: topic.to_string(),
                            payload: data.to_vec(),
                        },
                        _ => continue,
                    };
                    if tx.send(msg).is_err() {
                        break;
                    }
                }
                info!("Remote: receiver thread exiting");
            })
            .map_err(|e| {
                warn!("Remote: receiver spawn failed: {}", e);
                ConnectivityError::ConnectionFailed
            })?;

        self.client = Some(client);
        self.rx = Some(rx);
        info!("Remote: client for {} created", broker_url);
        Ok(())
    }

    /// Move receiver-thread traffic into the inbound queue.
    #[cfg(target_os = "espidf")]
    pub fn service(&mut self) {
        let mut drained = Vec::new();
        if let Some(rx) = self.rx.as_ref() {
            while let Ok(msg) = rx.try_recv() {
                drained.push(msg);
            }
        }
        for msg in drained {
            match msg {
                Inbound::Connected => {
                    info!("Remote: connected");
                    self.connected = true;
                    self.subscribe_all();
                }
                Inbound::Disconnected => {
                    if self.connected {
                        warn!("Remote: broker connection lost");
                        self.inbound.push_back(RemoteEvent::ConnectivityLost);
                    }
                    self.connected = false;
                }
                Inbound::Message { topic, payload } => {
                    if let Some(event) = self.topics.parse(&topic, &payload) {
                        self.inbound.push_back(event);
                    }
                }
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn subscribe_all(&mut self) {
        use esp_idf_svc::mqtt::client::QoS;

        let Some(client) = self.client.as_mut() else {
            return;
        };
        for topic in [self.topics.button_set(), self.topics.terminal_in(), self.topics.ota()] {
            if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce) {
                warn!("Remote: subscribe {} failed: {:?}", topic, e);
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) {
        use esp_idf_svc::mqtt::client::QoS;

        if !self.connected {
            debug!("Remote: offline, dropping {}", topic);
            return;
        }
        if let Some(client) = self.client.as_mut() {
            if let Err(e) = client.publish(topic, QoS::AtMostOnce, retain, payload.as_bytes()) {
                warn!("Remote: publish {} failed: {:?}", topic, e);
            }
        }
    }

    #[cfg(target_os = "espidf")]
    fn replay_button(&mut self) {
        use esp_idf_svc::mqtt::client::QoS;

        let topic = self.topics.button_set();
        if let Some(client) = self.client.as_mut() {
            // Re-subscribing makes the broker resend the retained value.
            if let Err(e) = client.unsubscribe(&topic) {
                warn!("Remote: unsubscribe {} failed: {:?}", topic, e);
            }
            if let Err(e) = client.subscribe(&topic, QoS::AtLeastOnce) {
                warn!("Remote: button sync failed: {:?}", e);
            }
        }
    }

    /// Orderly teardown: drop the client, which stops the receiver thread.
    #[cfg(target_os = "espidf")]
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            info!("Remote: session closed");
        }
        self.rx = None;
        self.connected = false;
    }

    /// Orderly teardown.  Unlike a link drop, raises no event.
    #[cfg(not(target_os = "espidf"))]
    pub fn close(&mut self) {
        if self.connected {
            info!("Remote: session closed");
        }
        self.connected = false;
    }

    /// Simulation: bring the broker connection up or down.
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_connected(&mut self, up: bool) {
        if self.connected && !up {
            self.inbound.push_back(RemoteEvent::ConnectivityLost);
        }
        self.connected = up;
    }

    /// Simulation: deliver an inbound message as the broker would.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&mut self, topic: &str, payload: &str) {
        if let Some(event) = self.topics.parse(topic, payload.as_bytes()) {
            if let RemoteEvent::Button(pressed) = event {
                self.retained_button = Some(pressed);
            }
            self.inbound.push_back(event);
        }
    }

    /// Simulation: everything published so far.
    #[cfg(not(target_os = "espidf"))]
    pub fn published(&self) -> &[(String, String)] {
        &self.published
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn service(&mut self) {}

    #[cfg(not(target_os = "espidf"))]
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) {
        if !self.connected {
            return;
        }
        if retain && topic == self.topics.button_set() {
            if let Some(RemoteEvent::Button(pressed)) = self.topics.parse(topic, payload.as_bytes()) {
                self.retained_button = Some(pressed);
            }
        }
        self.published.push((topic.to_string(), payload.to_string()));
    }

    #[cfg(not(target_os = "espidf"))]
    fn replay_button(&mut self) {
        if let Some(pressed) = self.retained_button {
            self.inbound.push_back(RemoteEvent::Button(pressed));
        }
    }
}

impl RemoteChannel for RemoteLink {
    fn next_event(&mut self) -> Option<RemoteEvent> {
        self.inbound.pop_front()
    }

    fn request_button_sync(&mut self) {
        info!("Remote: button sync requested");
        self.replay_button();
    }

    fn write_virtual(&mut self, pin: u8, value: &str) {
        let topic = self.topics.pin(pin);
        self.publish(&topic, value, true);
        if pin == virtual_pins::BUTTON {
            let set = self.topics.button_set();
            self.publish(&set, value, true);
        }
    }

    fn console_write(&mut self, line: &str) {
        self.pending_lines.push(line.to_string());
    }

    fn console_flush(&mut self) {
        let topic = self.topics.terminal_out();
        for line in core::mem::take(&mut self.pending_lines) {
            self.publish(&topic, &line, false);
        }
    }
}

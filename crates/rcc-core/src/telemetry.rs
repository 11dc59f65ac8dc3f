//! Telemetry events and the in-process hub
//!
//! The orchestrator publishes one event per command through the
//! [`TelemetrySink`] port. [`TelemetryHub`] is the in-tree implementation:
//! it stamps each event with a per-radio id, keeps a bounded replay buffer
//! per radio, and fans events out to any number of subscribers.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use rcc_core::{TelemetryEvent, TelemetryHub, TelemetrySink};
//!
//! let hub = TelemetryHub::new(50, Duration::from_secs(3600));
//! let mut rx = hub.subscribe();
//!
//! hub.publish("radio-1", TelemetryEvent::power_changed("radio-1", 20.0)).unwrap();
//!
//! let event = rx.try_recv().unwrap();
//! assert_eq!(event.id, 1);
//! assert_eq!(hub.events_after("radio-1", 0).len(), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use rcc_adapter::RadioState;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::TimingConfig;
use crate::inventory::RadioStatus;

const FANOUT_CAPACITY: usize = 256;

/// Telemetry publish failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    /// The sink has shut down
    #[error("telemetry sink closed")]
    Closed,

    /// The sink refused the event
    #[error("telemetry event rejected: {0}")]
    Rejected(String),
}

/// Event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    PowerChanged,
    ChannelChanged,
    State,
    Fault,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PowerChanged => "powerChanged",
            Self::ChannelChanged => "channelChanged",
            Self::State => "state",
            Self::Fault => "fault",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A telemetry event
///
/// `id` is zero until a hub assigns one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Map<String, Value>,
}

impl TelemetryEvent {
    fn with(kind: EventKind, radio_id: &str, fields: Value) -> Self {
        let mut data = Map::new();
        data.insert("radioId".into(), Value::from(radio_id));
        if let Value::Object(fields) = fields {
            data.extend(fields);
        }
        data.insert("ts".into(), Value::from(Utc::now().to_rfc3339()));
        Self { id: 0, kind, data }
    }

    /// Transmit power changed
    pub fn power_changed(radio_id: &str, power_dbm: f64) -> Self {
        Self::with(EventKind::PowerChanged, radio_id, json!({ "powerDbm": power_dbm }))
    }

    /// Operating channel changed; index 0 when the change was frequency driven
    pub fn channel_changed(radio_id: &str, frequency_mhz: f64, channel_index: i32) -> Self {
        Self::with(
            EventKind::ChannelChanged,
            radio_id,
            json!({ "frequencyMhz": frequency_mhz, "channelIndex": channel_index }),
        )
    }

    /// Radio status, with the live state when it is known
    pub fn state(radio_id: &str, status: RadioStatus, state: Option<RadioState>) -> Self {
        let mut fields = json!({ "status": status.as_str() });
        if let (Some(state), Value::Object(map)) = (state, &mut fields) {
            map.insert("powerDbm".into(), Value::from(state.power_dbm));
            map.insert("frequencyMhz".into(), Value::from(state.frequency_mhz));
        }
        Self::with(EventKind::State, radio_id, fields)
    }

    /// A command or subsystem failed
    pub fn fault(radio_id: &str, code: &str, message: &str) -> Self {
        Self::with(
            EventKind::Fault,
            radio_id,
            json!({ "code": code, "message": message }),
        )
    }

    /// Radio the event is about
    pub fn radio_id(&self) -> Option<&str> {
        self.data.get("radioId").and_then(Value::as_str)
    }
}

/// Receives telemetry events
pub trait TelemetrySink: Send + Sync {
    fn publish(&self, radio_id: &str, event: TelemetryEvent) -> Result<(), TelemetryError>;
}

struct Buffered {
    at: Instant,
    event: TelemetryEvent,
}

#[derive(Default)]
struct HubState {
    /// Last id issued per radio
    next_ids: HashMap<String, u64>,
    buffers: HashMap<String, VecDeque<Buffered>>,
    /// Highest id issued to any forgotten radio; new counters start here
    retired_high_water: u64,
    last_sweep: Option<Instant>,
    closed: bool,
}

impl HubState {
    /// Drop a radio's expired events, forgetting the radio once none remain
    fn prune_radio(&mut self, radio_id: &str, retention: Duration) {
        let Some(buffer) = self.buffers.get_mut(radio_id) else {
            return;
        };
        prune(buffer, retention);
        if buffer.is_empty() {
            self.forget(radio_id);
        }
    }

    /// Prune every radio if a retention period has passed since the last sweep
    fn sweep_if_due(&mut self, retention: Duration) {
        if self.last_sweep.is_some_and(|at| at.elapsed() < retention) {
            return;
        }
        self.last_sweep = Some(Instant::now());

        let idle: Vec<String> = self
            .buffers
            .iter_mut()
            .filter_map(|(id, buffer)| {
                prune(buffer, retention);
                buffer.is_empty().then(|| id.clone())
            })
            .collect();
        if !idle.is_empty() {
            debug!("Telemetry hub forgot {} idle radios", idle.len());
        }
        for id in idle {
            self.forget(&id);
        }
    }

    fn forget(&mut self, radio_id: &str) {
        self.buffers.remove(radio_id);
        if let Some(last) = self.next_ids.remove(radio_id) {
            self.retired_high_water = self.retired_high_water.max(last);
        }
    }
}

/// In-process telemetry fan-out with per-radio replay
///
/// A radio whose buffered events have all outlived the retention period is
/// forgotten. Ids issued to it later still exceed every id it had before.
pub struct TelemetryHub {
    inner: Mutex<HubState>,
    capacity: usize,
    retention: Duration,
    tx: broadcast::Sender<TelemetryEvent>,
}

impl TelemetryHub {
    /// Hub keeping up to `capacity` events per radio for at most `retention`
    pub fn new(capacity: usize, retention: Duration) -> Self {
        let (tx, _) = broadcast::channel(FANOUT_CAPACITY);
        Self {
            inner: Mutex::new(HubState::default()),
            capacity: capacity.max(1),
            retention,
            tx,
        }
    }

    /// Hub sized from the event buffer settings
    pub fn from_config(config: &TimingConfig) -> Self {
        Self::new(config.event_buffer.size, config.event_buffer.retention)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HubState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }

    /// Buffered events for a radio with ids greater than `last_id`
    pub fn events_after(&self, radio_id: &str, last_id: u64) -> Vec<TelemetryEvent> {
        let mut inner = self.lock();
        inner.prune_radio(radio_id, self.retention);
        inner
            .buffers
            .get(radio_id)
            .map(|buffer| {
                buffer
                    .iter()
                    .filter(|b| b.event.id > last_id)
                    .map(|b| b.event.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stop accepting events
    pub fn close(&self) {
        self.lock().closed = true;
        debug!("Telemetry hub closed");
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

fn prune(buffer: &mut VecDeque<Buffered>, retention: Duration) {
    while buffer
        .front()
        .is_some_and(|b| b.at.elapsed() > retention)
    {
        buffer.pop_front();
    }
}

impl TelemetrySink for TelemetryHub {
    fn publish(&self, radio_id: &str, mut event: TelemetryEvent) -> Result<(), TelemetryError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(TelemetryError::Closed);
        }

        inner.sweep_if_due(self.retention);

        let seed = inner.retired_high_water;
        let next = inner.next_ids.entry(radio_id.to_string()).or_insert(seed);
        *next += 1;
        event.id = *next;

        let buffer = inner.buffers.entry(radio_id.to_string()).or_default();
        buffer.push_back(Buffered {
            at: Instant::now(),
            event: event.clone(),
        });
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
        prune(buffer, self.retention);

        // No subscribers is fine; the replay buffer still has it
        let _ = self.tx.send(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hub() -> TelemetryHub {
        TelemetryHub::new(3, Duration::from_secs(60))
    }

    #[test]
    fn test_ids_are_per_radio() {
        let hub = hub();
        hub.publish("a", TelemetryEvent::power_changed("a", 1.0)).unwrap();
        hub.publish("a", TelemetryEvent::power_changed("a", 2.0)).unwrap();
        hub.publish("b", TelemetryEvent::power_changed("b", 3.0)).unwrap();

        let ids: Vec<u64> = hub.events_after("a", 0).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(hub.events_after("b", 0)[0].id, 1);
        assert_eq!(hub.events_after("a", 1).len(), 1);
        assert!(hub.events_after("c", 0).is_empty());
    }

    #[test]
    fn test_buffer_is_bounded() {
        let hub = hub();
        for i in 0..5 {
            hub.publish("a", TelemetryEvent::power_changed("a", f64::from(i)))
                .unwrap();
        }
        let ids: Vec<u64> = hub.events_after("a", 0).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[test]
    fn test_expired_radios_are_forgotten() {
        let hub = TelemetryHub::new(3, Duration::from_millis(50));
        for i in 0..100 {
            let id = format!("ghost-{i}");
            hub.publish(&id, TelemetryEvent::fault(&id, "NOT_FOUND", &id))
                .unwrap();
        }
        std::thread::sleep(Duration::from_millis(120));

        for i in 0..100 {
            assert!(hub.events_after(&format!("ghost-{i}"), 0).is_empty());
        }
        let inner = hub.lock();
        assert!(inner.buffers.is_empty());
        assert!(inner.next_ids.is_empty());
    }

    #[test]
    fn test_publish_sweeps_idle_radios() {
        let hub = TelemetryHub::new(3, Duration::from_millis(50));
        for i in 0..100 {
            let id = format!("ghost-{i}");
            hub.publish(&id, TelemetryEvent::fault(&id, "NOT_FOUND", &id))
                .unwrap();
        }
        std::thread::sleep(Duration::from_millis(120));

        hub.publish("a", TelemetryEvent::power_changed("a", 10.0))
            .unwrap();

        let inner = hub.lock();
        assert_eq!(inner.buffers.len(), 1);
        assert_eq!(inner.next_ids.len(), 1);
        assert!(inner.buffers.contains_key("a"));
    }

    #[test]
    fn test_ids_keep_rising_after_radio_is_forgotten() {
        let hub = TelemetryHub::new(3, Duration::from_millis(50));
        hub.publish("a", TelemetryEvent::power_changed("a", 1.0)).unwrap();
        hub.publish("a", TelemetryEvent::power_changed("a", 2.0)).unwrap();
        std::thread::sleep(Duration::from_millis(120));
        assert!(hub.events_after("a", 0).is_empty());

        hub.publish("a", TelemetryEvent::power_changed("a", 3.0)).unwrap();

        let ids: Vec<u64> = hub.events_after("a", 2).iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3]);
    }

    #[test]
    fn test_closed_hub_rejects() {
        let hub = hub();
        hub.close();
        assert!(hub.is_closed());
        assert_eq!(
            hub.publish("a", TelemetryEvent::fault("a", "INTERNAL", "boom")),
            Err(TelemetryError::Closed)
        );
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let hub = hub();
        let mut rx = hub.subscribe();
        hub.publish("a", TelemetryEvent::channel_changed("a", 2437.0, 6))
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, EventKind::ChannelChanged);
        assert_eq!(event.data["channelIndex"], 6);
        assert_eq!(event.radio_id(), Some("a"));
    }

    #[test]
    fn test_event_payloads() {
        let state = TelemetryEvent::state("a", RadioStatus::Online, Some(RadioState::new(20.0, 2412.0)));
        assert_eq!(state.data["status"], "online");
        assert_eq!(state.data["powerDbm"], 20.0);
        assert!(state.data.contains_key("ts"));

        let offline = TelemetryEvent::state("a", RadioStatus::Offline, None);
        assert!(!offline.data.contains_key("powerDbm"));

        let fault = TelemetryEvent::fault("a", "BUSY", "RF_BUSY");
        let json = serde_json::to_value(&fault).unwrap();
        assert_eq!(json["type"], "fault");
        assert_eq!(json["data"]["code"], "BUSY");
    }
}

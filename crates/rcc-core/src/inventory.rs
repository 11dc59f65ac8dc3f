//! Device inventory
//!
//! The inventory owns every known radio record, the adapter bound to each
//! radio id, and the single "active" designation. All three live behind one
//! lock so they can never disagree. Adapter I/O always happens with the lock
//! released; callers only ever see snapshots.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rcc_adapter::{channels_from_profiles, RadioAdapter, RadioCapabilities, RadioState};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::deadline;
use crate::error::InventoryError;

/// Reachability of a radio, informational only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioStatus {
    Online,
    Offline,
}

impl RadioStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

/// Snapshot of one radio record
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Radio {
    pub id: String,
    pub model: String,
    pub status: RadioStatus,
    /// `None` while the entry is stale
    pub capabilities: Option<RadioCapabilities>,
    pub state: RadioState,
    pub last_seen: DateTime<Utc>,
}

/// All radios plus the active selection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioList {
    pub active_radio_id: Option<String>,
    pub items: Vec<Radio>,
}

#[derive(Default)]
struct InventoryState {
    radios: HashMap<String, Radio>,
    adapters: HashMap<String, Arc<dyn RadioAdapter>>,
    active: Option<String>,
}

impl InventoryState {
    fn radio_mut(&mut self, radio_id: &str) -> Result<&mut Radio, InventoryError> {
        self.radios
            .get_mut(radio_id)
            .ok_or_else(|| InventoryError::RadioNotFound(radio_id.to_string()))
    }
}

/// Concurrency-safe store of known radios
#[derive(Default)]
pub struct Inventory {
    inner: RwLock<InventoryState>,
}

impl Inventory {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, InventoryState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InventoryState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a radio, loading capabilities and state from its adapter
    ///
    /// Both adapter calls share one deadline of `timeout`. If the frequency
    /// profiles cannot be fetched the radio is not added. If only the state
    /// fetch fails the radio is added as offline with a zeroed state.
    /// Registering an id that already exists replaces the entry.
    pub async fn register_and_load(
        &self,
        radio_id: &str,
        adapter: Arc<dyn RadioAdapter>,
        timeout: Duration,
    ) -> Result<(), InventoryError> {
        let deadline = Instant::now() + timeout;

        let profiles = deadline::until(deadline, timeout, adapter.supported_frequency_profiles())
            .await
            .map_err(|source| InventoryError::CapabilitiesUnavailable {
                radio_id: radio_id.to_string(),
                source,
            })?;

        let (state, status) = match deadline::until(deadline, timeout, adapter.get_state()).await {
            Ok(state) => (state, RadioStatus::Online),
            Err(e) => {
                warn!("Radio {} registered without state: {}", radio_id, e);
                (RadioState::default(), RadioStatus::Offline)
            }
        };

        let channels = adapter
            .band_plan()
            .unwrap_or_else(|| channels_from_profiles(&profiles));
        let radio = Radio {
            id: radio_id.to_string(),
            model: adapter.model().to_string(),
            status,
            capabilities: Some(RadioCapabilities::new(adapter.power_range(), channels)),
            state,
            last_seen: Utc::now(),
        };

        let mut inner = self.write();
        let channel_count = radio.capabilities.as_ref().map_or(0, |c| c.channels.len());
        inner.radios.insert(radio_id.to_string(), radio);
        inner.adapters.insert(radio_id.to_string(), adapter);

        // If this is the first radio, make it active
        if inner.active.is_none() {
            inner.active = Some(radio_id.to_string());
            info!("Radio {} is now active", radio_id);
        }

        info!(
            "Registered radio {} ({} channels, {})",
            radio_id,
            channel_count,
            status.as_str()
        );
        Ok(())
    }

    /// Make a radio the active one
    pub fn set_active(&self, radio_id: &str) -> Result<(), InventoryError> {
        self.select(radio_id).map(|_| ())
    }

    /// Make a radio active and hand back its adapter in the same critical
    /// section, so a concurrent selection cannot swap the adapter in between
    pub fn select(
        &self,
        radio_id: &str,
    ) -> Result<(Arc<dyn RadioAdapter>, String), InventoryError> {
        let mut inner = self.write();
        let adapter = inner
            .adapters
            .get(radio_id)
            .filter(|_| inner.radios.contains_key(radio_id))
            .cloned()
            .ok_or_else(|| InventoryError::RadioNotFound(radio_id.to_string()))?;
        if inner.active.as_deref() != Some(radio_id) {
            info!("Active radio changed: {:?} -> {}", inner.active, radio_id);
            inner.active = Some(radio_id.to_string());
        }
        Ok((adapter, radio_id.to_string()))
    }

    /// Snapshot of one radio
    ///
    /// A stale entry is repaired from the adapter's band plan when the
    /// adapter has one. Repair failure never fails the lookup.
    pub fn get(&self, radio_id: &str) -> Result<Radio, InventoryError> {
        {
            let inner = self.read();
            let radio = inner
                .radios
                .get(radio_id)
                .ok_or_else(|| InventoryError::RadioNotFound(radio_id.to_string()))?;
            if radio.capabilities.is_some() {
                return Ok(radio.clone());
            }
        }

        let mut inner = self.write();
        let plan = inner.adapters.get(radio_id).and_then(|adapter| {
            adapter
                .band_plan()
                .map(|channels| RadioCapabilities::new(adapter.power_range(), channels))
        });
        let radio = inner.radio_mut(radio_id)?;
        if radio.capabilities.is_none() {
            match plan {
                Some(capabilities) => {
                    debug!("Hydrated capabilities for radio {}", radio_id);
                    radio.capabilities = Some(capabilities);
                }
                None => debug!("Radio {} has no band plan to hydrate from", radio_id),
            }
        }
        Ok(radio.clone())
    }

    /// Remove a radio, clearing the active selection if it pointed here
    pub fn remove(&self, radio_id: &str) -> Result<Radio, InventoryError> {
        let mut inner = self.write();
        let radio = inner
            .radios
            .remove(radio_id)
            .ok_or_else(|| InventoryError::RadioNotFound(radio_id.to_string()))?;
        inner.adapters.remove(radio_id);

        if inner.active.as_deref() == Some(radio_id) {
            inner.active = None;
            info!("Active radio {} removed, no radio selected", radio_id);
        }
        Ok(radio)
    }

    /// Replace the stored state and mark the radio online
    pub fn update_state(&self, radio_id: &str, state: RadioState) -> Result<(), InventoryError> {
        self.modify_state(radio_id, |s| *s = state)
    }

    /// Edit the stored state in place and mark the radio online
    pub fn modify_state<F>(&self, radio_id: &str, edit: F) -> Result<(), InventoryError>
    where
        F: FnOnce(&mut RadioState),
    {
        let mut inner = self.write();
        let radio = inner.radio_mut(radio_id)?;
        edit(&mut radio.state);
        radio.status = RadioStatus::Online;
        radio.last_seen = Utc::now();
        Ok(())
    }

    /// Set the status of a radio
    pub fn update_status(&self, radio_id: &str, status: RadioStatus) -> Result<(), InventoryError> {
        let mut inner = self.write();
        let radio = inner.radio_mut(radio_id)?;
        radio.status = status;
        radio.last_seen = Utc::now();
        Ok(())
    }

    /// Id of the active radio
    pub fn active_id(&self) -> Option<String> {
        self.read().active.clone()
    }

    /// Snapshot of the active radio
    pub fn active_radio(&self) -> Result<Radio, InventoryError> {
        let id = self.active_id().ok_or(InventoryError::NoActiveRadio)?;
        self.get(&id)
    }

    /// Adapter bound to the active radio, with that radio's id
    pub fn active_adapter(&self) -> Result<(Arc<dyn RadioAdapter>, String), InventoryError> {
        let inner = self.read();
        let id = inner.active.as_ref().ok_or(InventoryError::NoActiveRadio)?;
        let adapter = inner
            .adapters
            .get(id)
            .ok_or_else(|| InventoryError::RadioNotFound(id.clone()))?;
        Ok((Arc::clone(adapter), id.clone()))
    }

    /// All radios, sorted by id
    pub fn list(&self) -> RadioList {
        let inner = self.read();
        let mut items: Vec<Radio> = inner.radios.values().cloned().collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        RadioList {
            active_radio_id: inner.active.clone(),
            items,
        }
    }

    /// Re-fetch frequency profiles and replace the channel list
    pub async fn refresh_capabilities(
        &self,
        radio_id: &str,
        timeout: Duration,
    ) -> Result<(), InventoryError> {
        let adapter = self
            .read()
            .adapters
            .get(radio_id)
            .cloned()
            .ok_or_else(|| InventoryError::RadioNotFound(radio_id.to_string()))?;

        let profiles = deadline::with_deadline(timeout, adapter.supported_frequency_profiles())
            .await
            .map_err(|source| InventoryError::CapabilitiesUnavailable {
                radio_id: radio_id.to_string(),
                source,
            })?;
        let channels = adapter
            .band_plan()
            .unwrap_or_else(|| channels_from_profiles(&profiles));
        let capabilities = RadioCapabilities::new(adapter.power_range(), channels);

        let mut inner = self.write();
        let radio = inner.radio_mut(radio_id)?;
        debug!(
            "Refreshed capabilities for radio {} ({} channels)",
            radio_id,
            capabilities.channels.len()
        );
        radio.capabilities = Some(capabilities);
        radio.last_seen = Utc::now();
        Ok(())
    }

    /// Mark a radio's capabilities stale
    pub fn invalidate_capabilities(&self, radio_id: &str) -> Result<(), InventoryError> {
        let mut inner = self.write();
        inner.radio_mut(radio_id)?.capabilities = None;
        Ok(())
    }

    /// Number of registered radios
    pub fn len(&self) -> usize {
        self.read().radios.len()
    }

    /// Whether no radios are registered
    pub fn is_empty(&self) -> bool {
        self.read().radios.is_empty()
    }
}

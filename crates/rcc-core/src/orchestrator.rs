//! Command orchestration
//!
//! The [`Orchestrator`] is the single entry point for radio commands. Each
//! command runs the same pipeline:
//!
//! 1. Existence check against the inventory (no adapter call)
//! 2. Parameter validation
//! 3. Adapter binding check
//! 4. Adapter call bounded by the per-command timeout
//! 5. Audit record, inventory state update and telemetry event
//!
//! Every path, success or failure, writes exactly one audit record and
//! publishes one primary telemetry event. A telemetry failure never fails
//! the command.
//!
//! The orchestrator keeps no adapter of its own: each dispatch asks the
//! inventory for the active radio's adapter.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rcc_adapter::{
    AdapterError, NormalizedError, RadioAdapter, RadioState, MAX_POWER_DBM, MIN_POWER_DBM,
};
use serde_json::json;
use tracing::debug;

use crate::audit::{AuditResult, AuditSink};
use crate::band_plan::{BandPlan, DEFAULT_BAND};
use crate::config::{CommandTimeouts, TimingConfig};
use crate::deadline;
use crate::error::CommandError;
use crate::inventory::{Inventory, Radio, RadioStatus};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Lowest frequency accepted by any command, in MHz
pub const MIN_FREQUENCY_MHZ: f64 = 100.0;

/// Highest frequency accepted by any command, in MHz
pub const MAX_FREQUENCY_MHZ: f64 = 6000.0;

/// Command names as written to the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectRadio,
    GetState,
    SetPower,
    SetChannel,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelectRadio => "selectRadio",
            Self::GetState => "getState",
            Self::SetPower => "setPower",
            Self::SetChannel => "setChannel",
        }
    }
}

/// Check a power setting against the global bounds
pub fn validate_power(power_dbm: f64) -> Result<(), CommandError> {
    let (min, max) = (f64::from(MIN_POWER_DBM), f64::from(MAX_POWER_DBM));
    if power_dbm.is_finite() && (min..=max).contains(&power_dbm) {
        Ok(())
    } else {
        Err(CommandError::invalid_range(
            format!("power {power_dbm} dBm outside [{MIN_POWER_DBM}, {MAX_POWER_DBM}]"),
            None,
        ))
    }
}

/// Check a frequency against the global bounds
pub fn validate_frequency(frequency_mhz: f64) -> Result<(), CommandError> {
    if frequency_mhz.is_finite() && (MIN_FREQUENCY_MHZ..=MAX_FREQUENCY_MHZ).contains(&frequency_mhz) {
        Ok(())
    } else {
        Err(CommandError::invalid_range(
            format!(
                "frequency {frequency_mhz} MHz outside [{MIN_FREQUENCY_MHZ}, {MAX_FREQUENCY_MHZ}]"
            ),
            None,
        ))
    }
}

/// Bookkeeping for one command attempt
struct Attempt<'a> {
    action: Action,
    radio_id: &'a str,
    started: Instant,
}

/// Coordinates inventory, adapters, audit and telemetry
pub struct Orchestrator {
    inventory: Option<Arc<Inventory>>,
    timeouts: CommandTimeouts,
    band_plan: Option<BandPlan>,
    audit: Option<Arc<dyn AuditSink>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl Orchestrator {
    /// Orchestrator with timeouts and band plan from `config`
    pub fn new(config: &TimingConfig) -> Self {
        Self {
            inventory: None,
            timeouts: config.commands,
            band_plan: config.band_plan.clone(),
            audit: None,
            telemetry: None,
        }
    }

    /// Attach the inventory commands are checked and dispatched against
    pub fn with_inventory(mut self, inventory: Arc<Inventory>) -> Self {
        self.inventory = Some(inventory);
        self
    }

    /// Record every command attempt to `audit`
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Publish command outcomes to `telemetry`
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// The attached inventory, if any
    pub fn inventory(&self) -> Option<&Arc<Inventory>> {
        self.inventory.as_ref()
    }

    /// Per-command deadlines in effect
    pub fn timeouts(&self) -> &CommandTimeouts {
        &self.timeouts
    }

    // -------------------------------------------------------------------------
    // Commands
    // -------------------------------------------------------------------------

    /// Make a radio active and probe its state
    ///
    /// The selection sticks even if the probe fails.
    pub async fn select_radio(&self, radio_id: &str) -> Result<RadioState, CommandError> {
        let attempt = self.begin(Action::SelectRadio, radio_id);

        if radio_id.trim().is_empty() {
            let err = CommandError::BadRequest("radio id must not be empty".into());
            return Err(self.reject(&attempt, AuditResult::BadRequest, err));
        }

        let inventory = self.require_radio(&attempt)?.0;
        let adapter = match inventory.select(radio_id) {
            Ok(adapter) => adapter,
            Err(_) => {
                let err = CommandError::NotFound(radio_id.to_string());
                return Err(self.reject(&attempt, AuditResult::NotFound, err));
            }
        };
        let timeout = self.timeouts.select_radio;
        let state = self
            .dispatch(&attempt, &adapter, timeout, adapter.0.get_state())
            .await?;

        self.record_state(inventory, &adapter.1, |s| *s = state);
        self.succeed(
            &attempt,
            TelemetryEvent::state(radio_id, RadioStatus::Online, Some(state)),
        );
        Ok(state)
    }

    /// Read power and frequency from the active adapter
    pub async fn get_state(&self, radio_id: &str) -> Result<RadioState, CommandError> {
        let attempt = self.begin(Action::GetState, radio_id);

        let inventory = self.require_radio(&attempt)?.0;
        let adapter = self.require_adapter(&attempt, inventory)?;
        let timeout = self.timeouts.get_state;
        let state = self
            .dispatch(&attempt, &adapter, timeout, adapter.0.get_state())
            .await?;

        self.record_state(inventory, &adapter.1, |s| *s = state);
        self.succeed(
            &attempt,
            TelemetryEvent::state(radio_id, RadioStatus::Online, Some(state)),
        );
        Ok(state)
    }

    /// Set transmit power in dBm
    pub async fn set_power(&self, radio_id: &str, power_dbm: f64) -> Result<(), CommandError> {
        let attempt = self.begin(Action::SetPower, radio_id);

        let inventory = self.require_radio(&attempt)?.0;
        if let Err(err) = validate_power(power_dbm) {
            return Err(self.reject(&attempt, AuditResult::InvalidRange, err));
        }
        let adapter = self.require_adapter(&attempt, inventory)?;
        let timeout = self.timeouts.set_power;
        self.dispatch(&attempt, &adapter, timeout, adapter.0.set_power(power_dbm))
            .await?;

        self.record_state(inventory, &adapter.1, |s| s.power_dbm = power_dbm);
        self.succeed(&attempt, TelemetryEvent::power_changed(radio_id, power_dbm));
        Ok(())
    }

    /// Tune to a frequency in MHz
    pub async fn set_channel(&self, radio_id: &str, frequency_mhz: f64) -> Result<(), CommandError> {
        let attempt = self.begin(Action::SetChannel, radio_id);

        let inventory = self.require_radio(&attempt)?.0;
        if let Err(err) = validate_frequency(frequency_mhz) {
            return Err(self.reject(&attempt, AuditResult::InvalidRange, err));
        }
        let adapter = self.require_adapter(&attempt, inventory)?;
        self.tune(&attempt, inventory, &adapter, frequency_mhz, 0)
            .await
    }

    /// Tune to a logical channel index
    ///
    /// The index is resolved through the band plan for the radio's model
    /// first, then through the radio's own channel list.
    pub async fn set_channel_by_index(
        &self,
        radio_id: &str,
        channel_index: i32,
    ) -> Result<(), CommandError> {
        let attempt = self.begin(Action::SetChannel, radio_id);

        let (inventory, radio) = self.require_radio(&attempt)?;
        if channel_index < 1 {
            let err = CommandError::invalid_range(
                format!("channel index {channel_index} must be >= 1"),
                None,
            );
            return Err(self.reject(&attempt, AuditResult::InvalidRange, err));
        }
        let adapter = self.require_adapter(&attempt, inventory)?;

        let frequency_mhz = match self
            .resolve_channel(&radio, channel_index)
            .and_then(|f| validate_frequency(f).map(|()| f))
        {
            Ok(f) => f,
            Err(err) => return Err(self.reject(&attempt, AuditResult::InvalidRange, err)),
        };
        self.tune(&attempt, inventory, &adapter, frequency_mhz, channel_index)
            .await
    }

    /// Frequency for a channel index on this radio
    pub fn resolve_channel(&self, radio: &Radio, channel_index: i32) -> Result<f64, CommandError> {
        if let Some(plan) = &self.band_plan {
            if !radio.model.is_empty() {
                match plan.channel_frequency(&radio.model, DEFAULT_BAND, channel_index) {
                    Ok(frequency) => return Ok(frequency),
                    Err(e) => debug!("Band plan miss for {}: {}", radio.id, e),
                }
            }
        }

        let channels = radio
            .capabilities
            .as_ref()
            .map(|c| c.channels.as_slice())
            .unwrap_or_default();
        channels
            .iter()
            .find(|c| c.index == channel_index)
            .map(|c| c.frequency_mhz)
            .ok_or_else(|| {
                CommandError::invalid_range(
                    format!(
                        "channel index {channel_index} not found for radio {}",
                        radio.id
                    ),
                    Some(json!({
                        "radioId": radio.id,
                        "requestedIndex": channel_index,
                        "availableChannels": channels.len(),
                    })),
                )
            })
    }

    async fn tune(
        &self,
        attempt: &Attempt<'_>,
        inventory: &Inventory,
        adapter: &(Arc<dyn RadioAdapter>, String),
        frequency_mhz: f64,
        channel_index: i32,
    ) -> Result<(), CommandError> {
        let timeout = self.timeouts.set_channel;
        self.dispatch(attempt, adapter, timeout, adapter.0.set_frequency(frequency_mhz))
            .await?;

        self.record_state(inventory, &adapter.1, |s| s.frequency_mhz = frequency_mhz);
        self.succeed(
            attempt,
            TelemetryEvent::channel_changed(attempt.radio_id, frequency_mhz, channel_index),
        );
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Pipeline stages
    // -------------------------------------------------------------------------

    fn begin<'a>(&self, action: Action, radio_id: &'a str) -> Attempt<'a> {
        debug!("{} requested for radio {}", action.as_str(), radio_id);
        Attempt {
            action,
            radio_id,
            started: Instant::now(),
        }
    }

    fn require_radio(&self, attempt: &Attempt<'_>) -> Result<(&Inventory, Radio), CommandError> {
        let Some(inventory) = self.inventory.as_deref() else {
            let err = CommandError::Unavailable("radio inventory not configured".into());
            return Err(self.reject(attempt, AuditResult::Unavailable, err));
        };
        match inventory.get(attempt.radio_id) {
            Ok(radio) => Ok((inventory, radio)),
            Err(_) => {
                let err = CommandError::NotFound(attempt.radio_id.to_string());
                Err(self.reject(attempt, AuditResult::NotFound, err))
            }
        }
    }

    fn require_adapter(
        &self,
        attempt: &Attempt<'_>,
        inventory: &Inventory,
    ) -> Result<(Arc<dyn RadioAdapter>, String), CommandError> {
        inventory.active_adapter().map_err(|_| {
            let err = CommandError::Unavailable("no radio adapter bound".into());
            self.reject(attempt, AuditResult::Unavailable, err)
        })
    }

    async fn dispatch<T, F>(
        &self,
        attempt: &Attempt<'_>,
        adapter: &(Arc<dyn RadioAdapter>, String),
        timeout: Duration,
        call: F,
    ) -> Result<T, CommandError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        if adapter.1 != attempt.radio_id {
            debug!(
                "{} for radio {} dispatched to active radio {}",
                attempt.action.as_str(),
                attempt.radio_id,
                adapter.1
            );
        }

        deadline::with_deadline(timeout, call).await.map_err(|e| {
            let err = CommandError::from(NormalizedError::from_vendor(e, adapter.0.vendor(), None));
            self.reject(attempt, AuditResult::Error, err)
        })
    }

    fn record_state<F>(&self, inventory: &Inventory, radio_id: &str, edit: F)
    where
        F: FnOnce(&mut RadioState),
    {
        if let Err(e) = inventory.modify_state(radio_id, edit) {
            debug!("State not recorded: {}", e);
        }
    }

    /// Audit a failed attempt, publish its fault event, hand the error back
    fn reject(&self, attempt: &Attempt<'_>, result: AuditResult, err: CommandError) -> CommandError {
        debug!(
            "{} for radio {} failed: {}",
            attempt.action.as_str(),
            attempt.radio_id,
            err
        );
        self.audit(attempt, result);
        self.publish_fault(attempt.radio_id, err.code().as_str(), &err.to_string());
        err
    }

    fn succeed(&self, attempt: &Attempt<'_>, event: TelemetryEvent) {
        self.audit(attempt, AuditResult::Success);
        self.publish(attempt.radio_id, event);
    }

    fn audit(&self, attempt: &Attempt<'_>, result: AuditResult) {
        if let Some(audit) = &self.audit {
            audit.log_action(
                attempt.action.as_str(),
                attempt.radio_id,
                result,
                attempt.started.elapsed(),
            );
        }
    }

    /// Publish a primary event, reporting a failure with one fault event
    fn publish(&self, radio_id: &str, event: TelemetryEvent) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        let kind = event.kind;
        if let Err(e) = telemetry.publish(radio_id, event) {
            self.publish_fault(
                radio_id,
                "INTERNAL",
                &format!("failed to publish {kind} event: {e}"),
            );
        }
    }

    /// Publish a fault event; a failure here is dropped
    fn publish_fault(&self, radio_id: &str, code: &str, message: &str) {
        let Some(telemetry) = &self.telemetry else {
            return;
        };
        if let Err(e) = telemetry.publish(radio_id, TelemetryEvent::fault(radio_id, code, message)) {
            debug!("Dropped fault event for radio {}: {}", radio_id, e);
        }
    }
}

//! Simulated vendor radio
//!
//! Implements [`RadioAdapter`] entirely in memory. Failures are reported as
//! vendor-styled error text so they exercise the same normalization path a
//! real radio would.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rcc_adapter::{
    AdapterError, Channel, FrequencyProfile, PowerRange, RadioAdapter, RadioState, SILVUS_VENDOR,
};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Lowest frequency the simulated RF front end accepts, in MHz
const MIN_TUNABLE_MHZ: f64 = 100.0;

/// Highest frequency the simulated RF front end accepts, in MHz
const MAX_TUNABLE_MHZ: f64 = 6000.0;

/// Injected failure applied to every adapter call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FaultMode {
    /// Behave normally
    #[default]
    None,
    /// Report the transmitter as busy
    Busy,
    /// Report the node as unavailable
    Unavailable,
    /// Reject every parameter as out of range
    InvalidRange,
    /// Report the radio offline
    Offline,
    /// Reply with an unrecognized vendor error
    Garbled,
    /// Never answer
    Hang,
}

impl FaultMode {
    fn error(&self, op: &str) -> Option<AdapterError> {
        let text = match self {
            Self::None | Self::Hang => return None,
            Self::Busy => format!("RF_BUSY: transmitter busy during {op}"),
            Self::Unavailable => format!("NODE_UNAVAILABLE: node not responding to {op}"),
            Self::InvalidRange => format!("PARAMETER_OUT_OF_RANGE: {op} rejected"),
            Self::Offline => format!("RADIO_OFFLINE: {op} failed"),
            Self::Garbled => format!("unexpected response 0x7f to {op}"),
        };
        Some(AdapterError::Vendor(text))
    }
}

/// Configuration for a simulated radio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SimRadioConfig {
    /// Radio id
    pub id: String,
    /// Vendor tag used for error normalization
    pub vendor: String,
    /// Model name, used for band plan lookups
    pub model: String,
    /// Initial transmit power in dBm
    pub initial_power_dbm: f64,
    /// Initial frequency in MHz
    pub initial_frequency_mhz: f64,
    /// Channel list
    pub band_plan: Vec<Channel>,
    /// Whether the channel list is offered through the direct accessor
    pub expose_band_plan: bool,
    /// Accepted power bounds
    pub power_range: PowerRange,
    /// Delay before every reply, in milliseconds
    pub latency_ms: u64,
}

impl Default for SimRadioConfig {
    fn default() -> Self {
        Self {
            id: "sim-1".to_string(),
            vendor: SILVUS_VENDOR.to_string(),
            model: "SilvusMock-Test".to_string(),
            initial_power_dbm: 20.0,
            initial_frequency_mhz: 2412.0,
            band_plan: default_band_plan(),
            expose_band_plan: true,
            power_range: PowerRange::default(),
            latency_ms: 0,
        }
    }
}

/// Five 2.4 GHz channels, 5 MHz apart
pub fn default_band_plan() -> Vec<Channel> {
    [2412.0, 2417.0, 2422.0, 2427.0, 2432.0]
        .into_iter()
        .zip(1..)
        .map(|(frequency_mhz, index)| Channel::new(index, frequency_mhz))
        .collect()
}

#[derive(Debug)]
struct SimState {
    power_dbm: f64,
    frequency_mhz: f64,
    channel_index: Option<i32>,
    band_plan: Vec<Channel>,
    fault: FaultMode,
    latency: Duration,
    fail_profiles: bool,
    fail_state: bool,
    power_calls: Vec<f64>,
    frequency_calls: Vec<f64>,
    last_command: Instant,
}

/// A simulated radio with fault injection
#[derive(Debug)]
pub struct SimRadio {
    id: String,
    vendor: String,
    model: String,
    power_range: PowerRange,
    expose_band_plan: bool,
    state: Mutex<SimState>,
}

impl SimRadio {
    /// Create a simulated radio with default settings
    pub fn new(id: impl Into<String>) -> Self {
        Self::from_config(SimRadioConfig {
            id: id.into(),
            ..SimRadioConfig::default()
        })
    }

    /// Create a simulated radio from configuration
    pub fn from_config(config: SimRadioConfig) -> Self {
        let channel_index = index_of(&config.band_plan, config.initial_frequency_mhz);
        Self {
            id: config.id,
            vendor: config.vendor,
            model: config.model,
            power_range: config.power_range,
            expose_band_plan: config.expose_band_plan,
            state: Mutex::new(SimState {
                power_dbm: config.initial_power_dbm,
                frequency_mhz: config.initial_frequency_mhz,
                channel_index,
                band_plan: config.band_plan,
                fault: FaultMode::None,
                latency: Duration::from_millis(config.latency_ms),
                fail_profiles: false,
                fail_state: false,
                power_calls: Vec::new(),
                frequency_calls: Vec::new(),
                last_command: Instant::now(),
            }),
        }
    }

    /// Replace the channel list
    pub fn with_band_plan(self, band_plan: Vec<Channel>) -> Self {
        {
            let mut state = self.lock();
            state.channel_index = index_of(&band_plan, state.frequency_mhz);
            state.band_plan = band_plan;
        }
        self
    }

    /// Only report channels through frequency profiles
    pub fn without_band_plan(mut self) -> Self {
        self.expose_band_plan = false;
        self
    }

    /// Use another vendor tag
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = vendor.into();
        self
    }

    /// Use another model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Radio id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Inject a fault into every following call
    pub fn set_fault(&self, fault: FaultMode) {
        self.lock().fault = fault;
    }

    /// Return to normal behavior
    pub fn clear_fault(&self) {
        self.set_fault(FaultMode::None);
    }

    pub fn fault(&self) -> FaultMode {
        self.lock().fault
    }

    /// Delay every reply
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Make frequency profile queries fail
    pub fn fail_profiles(&self, fail: bool) {
        self.lock().fail_profiles = fail;
    }

    /// Make state queries fail
    pub fn fail_state(&self, fail: bool) {
        self.lock().fail_state = fail;
    }

    /// Every power value a caller asked for, in order
    pub fn power_calls(&self) -> Vec<f64> {
        self.lock().power_calls.clone()
    }

    /// Every frequency a caller asked for, in order
    pub fn frequency_calls(&self) -> Vec<f64> {
        self.lock().frequency_calls.clone()
    }

    /// Current state as the radio sees it
    pub fn current_state(&self) -> RadioState {
        let state = self.lock();
        RadioState::new(state.power_dbm, state.frequency_mhz)
    }

    /// Retune from the radio's own front panel, bypassing the adapter
    pub fn set_local_frequency(&self, frequency_mhz: f64) {
        let mut state = self.lock();
        state.frequency_mhz = frequency_mhz;
        state.channel_index = index_of(&state.band_plan, frequency_mhz);
    }

    /// Change power from the radio's own front panel
    pub fn set_local_power(&self, power_dbm: f64) {
        self.lock().power_dbm = power_dbm;
    }

    /// Channel matching the current frequency, if any
    pub fn channel_index(&self) -> Option<i32> {
        self.lock().channel_index
    }

    /// Time of the last accepted set command
    pub fn last_command(&self) -> Instant {
        self.lock().last_command
    }

    /// Apply latency and the injected fault
    async fn respond(&self, op: &str) -> Result<(), AdapterError> {
        let (latency, fault) = {
            let state = self.lock();
            (state.latency, state.fault)
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if fault == FaultMode::Hang {
            trace!("{}: {} hanging", self.id, op);
            std::future::pending::<()>().await;
        }
        match fault.error(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn index_of(band_plan: &[Channel], frequency_mhz: f64) -> Option<i32> {
    band_plan
        .iter()
        .find(|c| c.frequency_mhz == frequency_mhz)
        .map(|c| c.index)
}

#[async_trait]
impl RadioAdapter for SimRadio {
    fn vendor(&self) -> &str {
        &self.vendor
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn power_range(&self) -> PowerRange {
        self.power_range
    }

    fn band_plan(&self) -> Option<Vec<Channel>> {
        self.expose_band_plan
            .then(|| self.lock().band_plan.clone())
    }

    async fn get_state(&self) -> Result<RadioState, AdapterError> {
        self.respond("getState").await?;
        if self.lock().fail_state {
            return Err(AdapterError::Transport("state query timed out".into()));
        }
        Ok(self.current_state())
    }

    async fn set_power(&self, dbm: f64) -> Result<(), AdapterError> {
        self.lock().power_calls.push(dbm);
        self.respond("setPower").await?;

        let range = self.power_range;
        if !(f64::from(range.min_dbm)..=f64::from(range.max_dbm)).contains(&dbm) {
            return Err(AdapterError::Vendor(format!(
                "TX_POWER_OUT_OF_RANGE: {dbm} dBm outside [{}, {}]",
                range.min_dbm, range.max_dbm
            )));
        }

        let mut state = self.lock();
        state.power_dbm = dbm;
        state.last_command = Instant::now();
        trace!("{}: power {} dBm", self.id, dbm);
        Ok(())
    }

    async fn set_frequency(&self, frequency_mhz: f64) -> Result<(), AdapterError> {
        self.lock().frequency_calls.push(frequency_mhz);
        self.respond("setFrequency").await?;

        if !(MIN_TUNABLE_MHZ..=MAX_TUNABLE_MHZ).contains(&frequency_mhz) {
            return Err(AdapterError::Vendor(format!(
                "FREQUENCY_OUT_OF_RANGE: {frequency_mhz:.1} MHz outside [{MIN_TUNABLE_MHZ}, {MAX_TUNABLE_MHZ}]"
            )));
        }

        let mut state = self.lock();
        state.frequency_mhz = frequency_mhz;
        state.channel_index = index_of(&state.band_plan, frequency_mhz);
        state.last_command = Instant::now();
        trace!("{}: frequency {} MHz", self.id, frequency_mhz);
        Ok(())
    }

    async fn read_power_actual(&self) -> Result<f64, AdapterError> {
        self.respond("readPowerActual").await?;
        Ok(self.lock().power_dbm)
    }

    async fn supported_frequency_profiles(&self) -> Result<Vec<FrequencyProfile>, AdapterError> {
        self.respond("supportedFrequencyProfiles").await?;
        let state = self.lock();
        if state.fail_profiles {
            return Err(AdapterError::Vendor("SYSTEM_INITIALIZING: profiles not loaded".into()));
        }
        Ok(vec![FrequencyProfile {
            frequencies: state.band_plan.iter().map(|c| c.frequency_mhz).collect(),
            bandwidth: 20.0,
            antenna_mask: 0x1,
        }])
    }
}

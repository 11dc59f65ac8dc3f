//! The southbound adapter contract
//!
//! Every vendor integration implements [`RadioAdapter`]. The gateway never
//! talks to hardware directly; it only calls these operations, each wrapped
//! in a caller-side deadline. Dropping an in-flight future is the
//! cancellation signal, so adapters should not spawn work that outlives it.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::errors::GENERIC_VENDOR;
use crate::types::{Channel, FrequencyProfile, PowerRange, RadioState};

/// Raw failure reported by an adapter, before normalization
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdapterError {
    /// Error text reported by the vendor device or its API
    #[error("{0}")]
    Vendor(String),

    /// The call did not complete before its deadline
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Transport failure between the adapter and the device
    #[error("transport error: {0}")]
    Transport(String),
}

/// Operations a vendor adapter exposes to the gateway
#[async_trait]
pub trait RadioAdapter: Send + Sync {
    /// Vendor tag used to pick an error mapping table
    fn vendor(&self) -> &str {
        GENERIC_VENDOR
    }

    /// Radio model name, used for band plan lookups
    fn model(&self) -> &str;

    /// Transmit power bounds the radio accepts
    fn power_range(&self) -> PowerRange {
        PowerRange::default()
    }

    /// Direct channel-list accessor, for adapters that carry a band plan
    fn band_plan(&self) -> Option<Vec<Channel>> {
        None
    }

    /// Current power and frequency
    async fn get_state(&self) -> Result<RadioState, AdapterError>;

    /// Set transmit power in dBm
    async fn set_power(&self, dbm: f64) -> Result<(), AdapterError>;

    /// Set operating frequency in MHz
    ///
    /// Some radios soft-boot their RF chain on a frequency change.
    async fn set_frequency(&self, frequency_mhz: f64) -> Result<(), AdapterError>;

    /// Read back the power the radio is actually emitting
    async fn read_power_actual(&self) -> Result<f64, AdapterError>;

    /// Allowed frequency/bandwidth/antenna combinations
    async fn supported_frequency_profiles(&self) -> Result<Vec<FrequencyProfile>, AdapterError>;
}

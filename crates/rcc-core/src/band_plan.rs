//! Model band plans: channel index to frequency by model and band

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Band consulted when resolving channel indexes for commands
pub const DEFAULT_BAND: &str = "default";

/// One channel entry in a band plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BandChannel {
    /// Channel index
    pub channel_index: i32,
    /// Center frequency in MHz
    pub frequency_mhz: f64,
}

/// Lookup failures
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BandPlanError {
    /// No entry for this model
    #[error("model {0} not found in band plan")]
    ModelNotFound(String),

    /// Model known, band not
    #[error("band {band} not found for model {model}")]
    BandNotFound { model: String, band: String },

    /// No channel with this index in the band
    #[error("channel index {index} not found in model {model} band {band}")]
    ChannelNotFound {
        model: String,
        band: String,
        index: i32,
    },

    /// No channel with this frequency in the band
    #[error("frequency {frequency_mhz:.1} MHz not found in model {model} band {band}")]
    FrequencyNotFound {
        model: String,
        band: String,
        frequency_mhz: f64,
    },
}

/// Channel tables keyed by model, then band
///
/// ```json
/// {"models": {"Silvus-SC4200": {"default": [{"channelIndex": 1, "frequencyMhz": 2412.0}]}}}
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BandPlan {
    /// model -> band -> channels
    #[serde(default)]
    pub models: HashMap<String, HashMap<String, Vec<BandChannel>>>,
}

impl BandPlan {
    /// Parse a band plan from JSON text
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn band(&self, model: &str, band: &str) -> Result<&[BandChannel], BandPlanError> {
        let bands = self
            .models
            .get(model)
            .ok_or_else(|| BandPlanError::ModelNotFound(model.to_string()))?;
        bands
            .get(band)
            .map(Vec::as_slice)
            .ok_or_else(|| BandPlanError::BandNotFound {
                model: model.to_string(),
                band: band.to_string(),
            })
    }

    /// Frequency for a channel index
    pub fn channel_frequency(&self, model: &str, band: &str, index: i32) -> Result<f64, BandPlanError> {
        self.band(model, band)?
            .iter()
            .find(|c| c.channel_index == index)
            .map(|c| c.frequency_mhz)
            .ok_or_else(|| BandPlanError::ChannelNotFound {
                model: model.to_string(),
                band: band.to_string(),
                index,
            })
    }

    /// Channel index for an exact frequency
    pub fn channel_index(
        &self,
        model: &str,
        band: &str,
        frequency_mhz: f64,
    ) -> Result<i32, BandPlanError> {
        self.band(model, band)?
            .iter()
            .find(|c| c.frequency_mhz == frequency_mhz)
            .map(|c| c.channel_index)
            .ok_or_else(|| BandPlanError::FrequencyNotFound {
                model: model.to_string(),
                band: band.to_string(),
                frequency_mhz,
            })
    }

    /// Whether the plan has an entry for this model and band
    pub fn has_model_band(&self, model: &str, band: &str) -> bool {
        self.band(model, band).is_ok()
    }

    /// Models in the plan, sorted
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.models.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }

    /// Bands defined for a model, sorted; empty for unknown models
    pub fn bands(&self, model: &str) -> Vec<&str> {
        let mut bands: Vec<&str> = self
            .models
            .get(model)
            .map(|b| b.keys().map(String::as_str).collect())
            .unwrap_or_default();
        bands.sort_unstable();
        bands
    }

    /// Structural checks run during configuration validation
    pub fn validate(&self) -> Result<(), String> {
        for (model, bands) in &self.models {
            for (band, channels) in bands {
                for channel in channels {
                    if channel.channel_index < 1 {
                        return Err(format!(
                            "band plan {model}/{band}: channel index {} must be >= 1",
                            channel.channel_index
                        ));
                    }
                    if !channel.frequency_mhz.is_finite() || channel.frequency_mhz <= 0.0 {
                        return Err(format!(
                            "band plan {model}/{band}: channel {} has invalid frequency {}",
                            channel.channel_index, channel.frequency_mhz
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> BandPlan {
        BandPlan::from_json(
            r#"{
                "models": {
                    "Silvus-SC4200": {
                        "default": [
                            {"channelIndex": 1, "frequencyMhz": 2412.0},
                            {"channelIndex": 6, "frequencyMhz": 2437.0}
                        ],
                        "uhf": [{"channelIndex": 1, "frequencyMhz": 450.0}]
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_channel_frequency() {
        let plan = plan();
        assert_eq!(plan.channel_frequency("Silvus-SC4200", DEFAULT_BAND, 6), Ok(2437.0));
        assert_eq!(plan.channel_frequency("Silvus-SC4200", "uhf", 1), Ok(450.0));
    }

    #[test]
    fn test_lookup_errors() {
        let plan = plan();
        assert_eq!(
            plan.channel_frequency("Other", DEFAULT_BAND, 1),
            Err(BandPlanError::ModelNotFound("Other".into()))
        );
        assert!(matches!(
            plan.channel_frequency("Silvus-SC4200", "vhf", 1),
            Err(BandPlanError::BandNotFound { .. })
        ));
        assert!(matches!(
            plan.channel_frequency("Silvus-SC4200", DEFAULT_BAND, 2),
            Err(BandPlanError::ChannelNotFound { index: 2, .. })
        ));
    }

    #[test]
    fn test_reverse_lookup() {
        let plan = plan();
        assert_eq!(plan.channel_index("Silvus-SC4200", DEFAULT_BAND, 2437.0), Ok(6));
        assert!(plan.channel_index("Silvus-SC4200", DEFAULT_BAND, 2440.0).is_err());
    }

    #[test]
    fn test_listing() {
        let plan = plan();
        assert!(plan.has_model_band("Silvus-SC4200", "uhf"));
        assert!(!plan.has_model_band("Silvus-SC4200", "vhf"));
        assert_eq!(plan.models(), vec!["Silvus-SC4200"]);
        assert_eq!(plan.bands("Silvus-SC4200"), vec!["default", "uhf"]);
        assert!(plan.bands("Other").is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_index() {
        let mut plan = plan();
        plan.models
            .get_mut("Silvus-SC4200")
            .unwrap()
            .get_mut("uhf")
            .unwrap()
            .push(BandChannel {
                channel_index: 0,
                frequency_mhz: 460.0,
            });
        assert!(plan.validate().is_err());
        assert!(BandPlan::default().validate().is_ok());
    }
}

//! Value types exchanged with radio adapters

use serde::{Deserialize, Serialize};

/// Lowest transmit power any radio accepts, in dBm
pub const MIN_POWER_DBM: i32 = 0;

/// Highest transmit power any radio accepts, in dBm
pub const MAX_POWER_DBM: i32 = 39;

/// Live state reported by a radio
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioState {
    /// Transmit power in dBm
    pub power_dbm: f64,
    /// Operating frequency in MHz
    pub frequency_mhz: f64,
}

impl RadioState {
    /// Create a new state snapshot
    pub fn new(power_dbm: f64, frequency_mhz: f64) -> Self {
        Self {
            power_dbm,
            frequency_mhz,
        }
    }
}

/// A logical channel: index to physical frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Channel index (valid indexes are >= 1, not necessarily contiguous)
    pub index: i32,
    /// Center frequency in MHz
    pub frequency_mhz: f64,
}

impl Channel {
    /// Create a new channel mapping
    pub fn new(index: i32, frequency_mhz: f64) -> Self {
        Self {
            index,
            frequency_mhz,
        }
    }
}

/// A supported frequency/bandwidth/antenna combination
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FrequencyProfile {
    /// Frequencies in MHz usable with this profile
    pub frequencies: Vec<f64>,
    /// Channel bandwidth in MHz
    pub bandwidth: f64,
    /// Bitmask of antennas usable with this profile
    pub antenna_mask: u32,
}

/// Transmit power bounds advertised by an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerRange {
    /// Minimum power in dBm
    pub min_dbm: i32,
    /// Maximum power in dBm
    pub max_dbm: i32,
}

impl Default for PowerRange {
    fn default() -> Self {
        Self {
            min_dbm: MIN_POWER_DBM,
            max_dbm: MAX_POWER_DBM,
        }
    }
}

/// Capabilities of a radio as known to the gateway
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioCapabilities {
    /// Minimum transmit power in dBm
    pub min_power_dbm: i32,
    /// Maximum transmit power in dBm
    pub max_power_dbm: i32,
    /// Ordered channel list
    pub channels: Vec<Channel>,
}

impl RadioCapabilities {
    /// Build capabilities from power bounds and a channel list
    pub fn new(power: PowerRange, channels: Vec<Channel>) -> Self {
        Self {
            min_power_dbm: power.min_dbm,
            max_power_dbm: power.max_dbm,
            channels,
        }
    }

    /// Look up the frequency of a channel by exact index match
    pub fn channel_frequency(&self, index: i32) -> Option<f64> {
        self.channels
            .iter()
            .find(|c| c.index == index)
            .map(|c| c.frequency_mhz)
    }
}

/// Flatten frequency profiles into a 1-based channel list
///
/// Indexes run across all profiles in order, so two profiles of three
/// frequencies each produce channels 1 through 6.
pub fn channels_from_profiles(profiles: &[FrequencyProfile]) -> Vec<Channel> {
    profiles
        .iter()
        .flat_map(|p| p.frequencies.iter().copied())
        .zip(1..)
        .map(|(frequency_mhz, index)| Channel::new(index, frequency_mhz))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_from_profiles_are_one_based() {
        let profiles = vec![
            FrequencyProfile {
                frequencies: vec![2412.0, 2417.0],
                bandwidth: 20.0,
                antenna_mask: 1,
            },
            FrequencyProfile {
                frequencies: vec![5180.0],
                bandwidth: 40.0,
                antenna_mask: 3,
            },
        ];

        let channels = channels_from_profiles(&profiles);
        assert_eq!(
            channels,
            vec![
                Channel::new(1, 2412.0),
                Channel::new(2, 2417.0),
                Channel::new(3, 5180.0),
            ]
        );
    }

    #[test]
    fn test_channel_frequency_exact_match() {
        let caps = RadioCapabilities::new(
            PowerRange::default(),
            vec![Channel::new(1, 2412.0), Channel::new(6, 2437.0)],
        );
        assert_eq!(caps.channel_frequency(6), Some(2437.0));
        assert_eq!(caps.channel_frequency(2), None);
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let json = serde_json::to_value(RadioState::new(20.0, 2412.0)).unwrap();
        assert_eq!(json["powerDbm"], 20.0);
        assert_eq!(json["frequencyMhz"], 2412.0);
    }
}

//! Radio Adapter Contract
//!
//! This crate defines the southbound side of the radio control gateway:
//! the vendor-neutral [`RadioAdapter`] trait every vendor integration
//! implements, the value types that cross it, and the deterministic
//! vendor error normalizer.
//!
//! # Error normalization
//!
//! Vendors describe failures in their own language. Before an adapter error
//! leaves the gateway it is mapped onto a closed set of [`ErrorKind`]s using
//! per-vendor token tables:
//!
//! - **Range** tokens map to [`ErrorKind::InvalidRange`]
//! - **Busy** tokens map to [`ErrorKind::Busy`]
//! - **Unavailable** tokens map to [`ErrorKind::Unavailable`]
//! - anything else maps to [`ErrorKind::Internal`]
//!
//! Categories are checked in that order and the first match wins.
//!
//! # Example
//!
//! ```rust
//! use rcc_adapter::{normalize, AdapterError, ErrorKind};
//!
//! let err = AdapterError::Vendor("tx_power_out_of_range: 45 dBm".into());
//! let normalized = normalize(Some(err), "silvus", None).unwrap();
//! assert_eq!(normalized.kind(), ErrorKind::InvalidRange);
//! ```

pub mod adapter;
pub mod errors;
pub mod types;

pub use adapter::{AdapterError, RadioAdapter};
pub use errors::{
    classify, normalize, normalize_generic, vendor_map, ErrorKind, NormalizedError, VendorMap,
    GENERIC_VENDOR, SILVUS_VENDOR,
};
pub use types::{
    channels_from_profiles, Channel, FrequencyProfile, PowerRange, RadioCapabilities, RadioState,
    MAX_POWER_DBM, MIN_POWER_DBM,
};

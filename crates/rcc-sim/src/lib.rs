//! Radio Simulation Library
//!
//! This crate provides simulated vendor radios for exercising the gateway
//! without hardware. A [`SimRadio`] implements the full adapter contract in
//! memory and supports:
//!
//! - **Fault injection**: busy, unavailable, out-of-range, offline, garbled
//!   or hanging replies via [`FaultMode`]
//! - **Latency**: a fixed delay before every reply
//! - **Call recording**: every requested power and frequency, in order
//!
//! # Example
//!
//! ```rust
//! use rcc_adapter::RadioAdapter;
//! use rcc_sim::{FaultMode, SimRadio};
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let radio = SimRadio::new("radio-1");
//!
//! rt.block_on(radio.set_frequency(2422.0)).unwrap();
//! assert_eq!(radio.channel_index(), Some(3));
//!
//! radio.set_fault(FaultMode::Busy);
//! assert!(rt.block_on(radio.set_power(10.0)).is_err());
//! assert_eq!(radio.power_calls(), vec![10.0]);
//! ```

pub mod radio;

pub use radio::{default_band_plan, FaultMode, SimRadio, SimRadioConfig};

//! Deterministic vendor error normalization
//!
//! Vendor error text is classified by case-insensitive substring matching
//! against per-vendor token tables. Each table holds three ordered token
//! lists which are always checked Range, then Busy, then Unavailable; a
//! message containing tokens from two categories resolves to whichever is
//! checked first. Text matching no token at all is [`ErrorKind::Internal`].
//!
//! # Extending the tables
//!
//! 1. Add a [`VendorMap`] for the vendor and list it in [`VENDOR_ERROR_MAPPINGS`]
//! 2. Test each new token against its expected kind
//! 3. Unknown tokens fall through to [`ErrorKind::Internal`]
//! 4. Unknown vendor ids use the [`GENERIC_VENDOR`] table

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::trace;

/// Vendor id of the fallback mapping table
pub const GENERIC_VENDOR: &str = "generic";

/// Vendor id for Silvus StreamCaster radios
pub const SILVUS_VENDOR: &str = "silvus";

/// Normalized error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Parameter or resolved value outside allowed bounds
    InvalidRange,
    /// Transient condition, worth retrying
    Busy,
    /// Device or dependency not presently reachable
    Unavailable,
    /// Unknown vendor condition or programming fault
    Internal,
}

impl ErrorKind {
    /// Wire code for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRange => "INVALID_RANGE",
            Self::Busy => "BUSY",
            Self::Unavailable => "UNAVAILABLE",
            Self::Internal => "INTERNAL",
        }
    }

    /// Whether a caller may reasonably retry the same command
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy | Self::Unavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token lists for one vendor
#[derive(Debug)]
pub struct VendorMap {
    /// Tokens that map to [`ErrorKind::InvalidRange`]
    pub range: &'static [&'static str],
    /// Tokens that map to [`ErrorKind::Busy`]
    pub busy: &'static [&'static str],
    /// Tokens that map to [`ErrorKind::Unavailable`]
    pub unavailable: &'static [&'static str],
}

impl VendorMap {
    /// Token lists paired with their kind, in match priority order
    pub fn categories(&self) -> [(ErrorKind, &'static [&'static str]); 3] {
        [
            (ErrorKind::InvalidRange, self.range),
            (ErrorKind::Busy, self.busy),
            (ErrorKind::Unavailable, self.unavailable),
        ]
    }
}

static SILVUS: VendorMap = VendorMap {
    range: &[
        "TX_POWER_OUT_OF_RANGE",
        "FREQUENCY_OUT_OF_RANGE",
        "INVALID_POWER_LEVEL",
        "INVALID_FREQUENCY",
        "PARAMETER_OUT_OF_RANGE",
        "VALUE_OUT_OF_BOUNDS",
        "INVALID_PARAMETER",
    ],
    busy: &[
        "RF_BUSY",
        "TRANSMITTER_BUSY",
        "RADIO_BUSY",
        "OPERATION_IN_PROGRESS",
        "COMMAND_QUEUE_FULL",
        "RATE_LIMITED",
    ],
    unavailable: &[
        "NODE_UNAVAILABLE",
        "RADIO_OFFLINE",
        "REBOOTING",
        "SOFT_BOOT_IN_PROGRESS",
        "SYSTEM_INITIALIZING",
        "NOT_READY",
        "OFFLINE",
    ],
};

static GENERIC: VendorMap = VendorMap {
    range: &[
        "OUT_OF_RANGE",
        "INVALID_PARAMETER",
        "INVALID_RANGE",
        "BAD_VALUE",
        "RANGE_ERROR",
    ],
    busy: &["BUSY", "RETRY", "RATE_LIMIT", "TOO_MANY_REQUESTS", "BACKOFF"],
    unavailable: &["UNAVAILABLE", "REBOOT", "SOFT_BOOT", "OFFLINE", "NOT_READY"],
};

/// All known vendor tables, keyed by vendor id
pub static VENDOR_ERROR_MAPPINGS: &[(&str, &VendorMap)] =
    &[(SILVUS_VENDOR, &SILVUS), (GENERIC_VENDOR, &GENERIC)];

/// Mapping table for a vendor, falling back to the generic table
pub fn vendor_map(vendor_id: &str) -> &'static VendorMap {
    VENDOR_ERROR_MAPPINGS
        .iter()
        .find(|(id, _)| *id == vendor_id)
        .map_or(&GENERIC, |(_, map)| *map)
}

/// Classify a vendor message using the table for `vendor_id`
pub fn classify(message: &str, vendor_id: &str) -> ErrorKind {
    let upper = message.to_uppercase();

    for (kind, tokens) in vendor_map(vendor_id).categories() {
        if let Some(token) = tokens.iter().find(|t| upper.contains(&t.to_uppercase())) {
            trace!("Vendor message matched {} token {}", kind, token);
            return kind;
        }
    }

    ErrorKind::Internal
}

/// A vendor failure mapped onto the closed error taxonomy
///
/// The original error stays reachable through [`std::error::Error::source`]
/// and the vendor payload is carried along untouched.
#[derive(Debug, Error)]
#[error("{kind} (vendor: {original})")]
pub struct NormalizedError {
    kind: ErrorKind,
    #[source]
    original: Box<dyn StdError + Send + Sync + 'static>,
    details: Option<Value>,
}

impl NormalizedError {
    /// Build a normalized error directly from a kind
    pub fn new(
        kind: ErrorKind,
        original: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
        details: Option<Value>,
    ) -> Self {
        Self {
            kind,
            original: original.into(),
            details,
        }
    }

    /// Classify a vendor error with the table for `vendor_id`
    pub fn from_vendor(
        vendor_err: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
        vendor_id: &str,
        payload: Option<Value>,
    ) -> Self {
        let original = vendor_err.into();
        let kind = classify(&original.to_string(), vendor_id);
        Self {
            kind,
            original,
            details: payload,
        }
    }

    /// Normalized category
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The error as reported by the vendor
    pub fn original(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.original.as_ref()
    }

    /// Opaque vendor diagnostic payload
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Whether this error belongs to `kind`
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

/// Normalize a vendor error using the table for `vendor_id`
///
/// Returns `None` when there is no error to normalize.
pub fn normalize<E>(
    vendor_err: Option<E>,
    vendor_id: &str,
    payload: Option<Value>,
) -> Option<NormalizedError>
where
    E: Into<Box<dyn StdError + Send + Sync + 'static>>,
{
    vendor_err.map(|err| NormalizedError::from_vendor(err, vendor_id, payload))
}

/// Normalize a vendor error using the generic table
pub fn normalize_generic<E>(vendor_err: Option<E>, payload: Option<Value>) -> Option<NormalizedError>
where
    E: Into<Box<dyn StdError + Send + Sync + 'static>>,
{
    normalize(vendor_err, GENERIC_VENDOR, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterError;
    use serde_json::json;

    fn kind_of(message: &str, vendor: &str) -> ErrorKind {
        normalize(Some(AdapterError::Vendor(message.into())), vendor, None)
            .unwrap()
            .kind()
    }

    #[test]
    fn test_absent_error_is_none() {
        assert!(normalize(None::<AdapterError>, SILVUS_VENDOR, None).is_none());
    }

    #[test]
    fn test_silvus_tokens() {
        assert_eq!(kind_of("TX_POWER_OUT_OF_RANGE", SILVUS_VENDOR), ErrorKind::InvalidRange);
        assert_eq!(kind_of("err: transmitter_busy", SILVUS_VENDOR), ErrorKind::Busy);
        assert_eq!(
            kind_of("Soft_Boot_In_Progress, retry later", SILVUS_VENDOR),
            ErrorKind::Unavailable
        );
    }

    #[test]
    fn test_generic_tokens() {
        assert_eq!(kind_of("value out_of_range", GENERIC_VENDOR), ErrorKind::InvalidRange);
        assert_eq!(kind_of("TOO_MANY_REQUESTS", GENERIC_VENDOR), ErrorKind::Busy);
        assert_eq!(kind_of("device offline", GENERIC_VENDOR), ErrorKind::Unavailable);
    }

    #[test]
    fn test_range_wins_over_busy() {
        // Matches both INVALID_RANGE and BUSY tokens
        assert_eq!(
            kind_of("BUSY: INVALID_RANGE rejected", GENERIC_VENDOR),
            ErrorKind::InvalidRange
        );
        // Matches both BUSY and UNAVAILABLE tokens
        assert_eq!(
            kind_of("UNAVAILABLE while BUSY", GENERIC_VENDOR),
            ErrorKind::Busy
        );
    }

    #[test]
    fn test_unknown_text_is_internal() {
        assert_eq!(kind_of("the flux capacitor melted", SILVUS_VENDOR), ErrorKind::Internal);
        assert_eq!(kind_of("", GENERIC_VENDOR), ErrorKind::Internal);
    }

    #[test]
    fn test_deadline_is_internal() {
        let err = AdapterError::DeadlineExceeded(std::time::Duration::from_millis(50));
        let normalized = normalize_generic(Some(err), None).unwrap();
        assert_eq!(normalized.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_unknown_vendor_uses_generic() {
        assert!(std::ptr::eq(vendor_map("acme"), vendor_map(GENERIC_VENDOR)));
        assert_eq!(kind_of("RATE_LIMIT hit", "acme"), ErrorKind::Busy);
    }

    #[test]
    fn test_vendor_specific_tables_differ() {
        // Silvus-only token
        assert_eq!(kind_of("REBOOTING", SILVUS_VENDOR), ErrorKind::Unavailable);
        assert_eq!(kind_of("VALUE_OUT_OF_BOUNDS", SILVUS_VENDOR), ErrorKind::InvalidRange);
        assert_eq!(kind_of("VALUE_OUT_OF_BOUNDS", GENERIC_VENDOR), ErrorKind::Internal);
    }

    #[test]
    fn test_payload_and_vendor_error_preserved() {
        let payload = json!({"node": 7, "raw": [1, 2, 3]});
        let normalized = normalize(
            Some(AdapterError::Vendor("RF_BUSY".into())),
            SILVUS_VENDOR,
            Some(payload.clone()),
        )
        .unwrap();

        assert_eq!(normalized.details(), Some(&payload));
        assert_eq!(normalized.original().to_string(), "RF_BUSY");
        assert!(normalized.is(ErrorKind::Busy));
        assert_eq!(normalized.to_string(), "BUSY (vendor: RF_BUSY)");
        assert!(StdError::source(&normalized).is_some());
    }

    #[test]
    fn test_kind_wire_codes() {
        assert_eq!(ErrorKind::InvalidRange.to_string(), "INVALID_RANGE");
        assert_eq!(
            serde_json::to_value(ErrorKind::Unavailable).unwrap(),
            json!("UNAVAILABLE")
        );
        assert!(ErrorKind::Busy.is_retryable());
        assert!(!ErrorKind::Internal.is_retryable());
    }
}

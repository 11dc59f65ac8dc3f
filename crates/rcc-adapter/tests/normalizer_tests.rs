//! Property tests for the vendor error normalizer
//!
//! These tests check the table-driven mapping contract:
//! - Range tokens in any letter case always yield INVALID_RANGE
//! - Unknown vendor ids behave exactly like the generic table
//! - Text matching no token is INTERNAL, never a benign kind

use proptest::prelude::*;
use rcc_adapter::{
    classify, normalize, vendor_map, AdapterError, ErrorKind, GENERIC_VENDOR, SILVUS_VENDOR,
};

mod helpers {
    use super::*;

    pub fn kind(message: &str, vendor: &str) -> ErrorKind {
        normalize(Some(AdapterError::Vendor(message.to_string())), vendor, None)
            .map(|e| e.kind())
            .unwrap_or(ErrorKind::Internal)
    }

    /// Flip the case of characters selected by `mask`
    pub fn scramble_case(token: &str, mask: &[bool]) -> String {
        token
            .chars()
            .zip(mask.iter().cycle())
            .map(|(c, &lower)| {
                if lower {
                    c.to_ascii_lowercase()
                } else {
                    c.to_ascii_uppercase()
                }
            })
            .collect()
    }

    pub fn known_tokens() -> Vec<&'static str> {
        [SILVUS_VENDOR, GENERIC_VENDOR]
            .iter()
            .flat_map(|v| {
                let map = vendor_map(v);
                map.range
                    .iter()
                    .chain(map.busy.iter())
                    .chain(map.unavailable.iter())
                    .copied()
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

fn vendor() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(SILVUS_VENDOR), Just(GENERIC_VENDOR)]
}

proptest! {
    #[test]
    fn range_token_in_any_case_is_invalid_range(
        vendor in vendor(),
        idx in any::<prop::sample::Index>(),
        mask in prop::collection::vec(any::<bool>(), 1..16),
        prefix in "[a-z ]{0,12}",
        suffix in "[a-z ]{0,12}",
    ) {
        let tokens = vendor_map(vendor).range;
        let token = tokens[idx.index(tokens.len())];
        let message = format!("{prefix}{}{suffix}", helpers::scramble_case(token, &mask));

        prop_assert_eq!(helpers::kind(&message, vendor), ErrorKind::InvalidRange);
    }

    #[test]
    fn unknown_vendor_matches_generic(
        vendor_id in "[a-z]{3,10}",
        message in "[A-Za-z_ ]{0,40}",
    ) {
        prop_assume!(vendor_id != SILVUS_VENDOR && vendor_id != GENERIC_VENDOR);

        prop_assert_eq!(
            classify(&message, &vendor_id),
            classify(&message, GENERIC_VENDOR)
        );
    }

    #[test]
    fn tokenless_text_is_internal(
        vendor in vendor(),
        message in "[0-9 .:-]{0,40}",
    ) {
        // Digits and punctuation cannot contain any alphabetic token
        prop_assert!(!helpers::known_tokens().iter().any(|t| message.contains(t)));
        prop_assert_eq!(helpers::kind(&message, vendor), ErrorKind::Internal);
    }
}

#[test]
fn every_busy_token_maps_to_busy() {
    for vendor in [SILVUS_VENDOR, GENERIC_VENDOR] {
        let map = vendor_map(vendor);
        for token in map.busy {
            assert_eq!(helpers::kind(token, vendor), ErrorKind::Busy, "{vendor}: {token}");
        }
    }
}

#[test]
fn every_unavailable_token_maps_to_unavailable() {
    for vendor in [SILVUS_VENDOR, GENERIC_VENDOR] {
        let map = vendor_map(vendor);
        for token in map.unavailable {
            assert_eq!(
                helpers::kind(token, vendor),
                ErrorKind::Unavailable,
                "{vendor}: {token}"
            );
        }
    }
}

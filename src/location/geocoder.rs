// SPDX-License-Identifier: GPL-3.0-only

//! Reverse geocoding seam
//!
//! Turning coordinates into an address is a platform service; this module
//! only defines the seam and the address composition rules. The static
//! implementation serves fixed survey-site details from configuration.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::errors::LocationError;

/// Address components for one reverse-geocoded position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Full single-line address; preferred over composition when present
    pub formatted: Option<String>,
    /// Street number
    pub street_number: Option<String>,
    /// Street name
    pub street: Option<String>,
    /// Neighborhood
    pub sublocality: Option<String>,
    /// City/town
    pub locality: Option<String>,
    /// State/province
    pub admin_area: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// Compose a single-line address from the individual components
    ///
    /// Returns an empty string when every component is blank. The postal
    /// code is joined with a space, everything else with ", ".
    pub fn compose(&self) -> String {
        fn present(field: &Option<String>) -> Option<&str> {
            field.as_deref().map(str::trim).filter(|s| !s.is_empty())
        }

        let mut out = String::new();
        let mut push = |part: &str, separator: &str| {
            if !out.is_empty() {
                out.push_str(separator);
            }
            out.push_str(part);
        };

        // Street number and name form one segment
        match (present(&self.street_number), present(&self.street)) {
            (Some(number), Some(street)) => push(&format!("{} {}", number, street), ", "),
            (Some(number), None) => push(number, ", "),
            (None, Some(street)) => push(street, ", "),
            (None, None) => {}
        }

        if let Some(part) = present(&self.sublocality) {
            push(part, ", ");
        }
        if let Some(part) = present(&self.locality) {
            push(part, ", ");
        }
        if let Some(part) = present(&self.admin_area) {
            push(part, ", ");
        }
        if let Some(part) = present(&self.postal_code) {
            push(part, " ");
        }
        if let Some(part) = present(&self.country) {
            push(part, ", ");
        }

        out
    }
}

/// Reverse geocoder seam
pub trait Geocoder: Send + Sync {
    /// Resolve coordinates into address components
    ///
    /// An error means the service could not answer; the caller falls back
    /// to formatted raw coordinates.
    fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> BoxFuture<'_, Result<Address, LocationError>>;
}

/// Geocoder answering every query with a fixed address
///
/// Field surveys usually happen on one known site; the site address comes
/// from configuration and is stamped onto every capture.
pub struct StaticGeocoder {
    address: Address,
}

impl StaticGeocoder {
    pub fn new(address: Address) -> Self {
        Self { address }
    }
}

impl Geocoder for StaticGeocoder {
    fn reverse(&self, _lat: f64, _lon: f64) -> BoxFuture<'_, Result<Address, LocationError>> {
        let address = self.address.clone();
        Box::pin(async move { Ok(address) })
    }
}

/// Geocoder used when nothing is configured; always fails so callers fall
/// back to raw coordinates
pub struct NoGeocoder;

impl Geocoder for NoGeocoder {
    fn reverse(&self, _lat: f64, _lon: f64) -> BoxFuture<'_, Result<Address, LocationError>> {
        Box::pin(async {
            Err(LocationError::GeocodeFailed(
                "no geocoder configured".to_string(),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_address() -> Address {
        Address {
            formatted: None,
            street_number: Some("12".to_string()),
            street: Some("Harbour Road".to_string()),
            sublocality: Some("Docklands".to_string()),
            locality: Some("Porthaven".to_string()),
            admin_area: Some("Westshire".to_string()),
            postal_code: Some("PH1 2AB".to_string()),
            country: Some("United Kingdom".to_string()),
        }
    }

    #[test]
    fn test_compose_full() {
        assert_eq!(
            full_address().compose(),
            "12 Harbour Road, Docklands, Porthaven, Westshire PH1 2AB, United Kingdom"
        );
    }

    #[test]
    fn test_compose_partial() {
        let address = Address {
            locality: Some("Porthaven".to_string()),
            country: Some("United Kingdom".to_string()),
            ..Default::default()
        };
        assert_eq!(address.compose(), "Porthaven, United Kingdom");
    }

    #[test]
    fn test_compose_street_without_number() {
        let address = Address {
            street: Some("Harbour Road".to_string()),
            locality: Some("Porthaven".to_string()),
            ..Default::default()
        };
        assert_eq!(address.compose(), "Harbour Road, Porthaven");
    }

    #[test]
    fn test_compose_blank() {
        assert_eq!(Address::default().compose(), "");
        let whitespace = Address {
            locality: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(whitespace.compose(), "");
    }
}

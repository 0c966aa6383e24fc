// SPDX-License-Identifier: GPL-3.0-only

//! Location resolution
//!
//! `LocationResolver` turns a provider fix and a geocoder answer into the
//! `(coordinates, address text)` pair stamped onto captures:
//!
//! - fresh fix with acceptable accuracy → reverse-geocoded address
//! - poor accuracy (> 50 m), no fix, or timeout → last known location
//! - nothing at all → sentinel (0, 0) with "Location unavailable"
//! - geocoder answers blank → "Unknown Location"
//! - geocoder fails → raw coordinates, 6 decimal places

pub mod geocoder;
pub mod provider;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::location as location_constants;
use crate::errors::LocationError;
use geocoder::{Address, Geocoder};
use provider::{LocationFix, LocationProvider};

/// A latitude/longitude pair in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Sentinel value used when no position could be obtained
    pub const ZERO: Coordinates = Coordinates {
        latitude: 0.0,
        longitude: 0.0,
    };

    /// True for the (0, 0) sentinel
    pub fn is_zero(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }

    /// Decimal-degrees display used as the geocoder fallback
    pub fn format_dd(&self) -> String {
        format!("{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format_dd())
    }
}

/// Resolves the position and address text for a capture
pub struct LocationResolver {
    provider: Box<dyn LocationProvider>,
    geocoder: Box<dyn Geocoder>,
    accuracy_threshold_m: f64,
}

impl LocationResolver {
    pub fn new(provider: Box<dyn LocationProvider>, geocoder: Box<dyn Geocoder>) -> Self {
        Self {
            provider,
            geocoder,
            accuracy_threshold_m: location_constants::ACCURACY_THRESHOLD_M,
        }
    }

    pub fn with_threshold(mut self, accuracy_threshold_m: f64) -> Self {
        self.accuracy_threshold_m = accuracy_threshold_m;
        self
    }

    /// Resolve current coordinates and a human-readable address
    ///
    /// Cancellable by dropping the returned future. Only a hard provider
    /// failure with no cached fix surfaces as an error; every other outcome
    /// degrades to a fallback value.
    pub async fn resolve(&self) -> Result<(Coordinates, String), LocationError> {
        let fix = self.acquire_fix().await?;

        let Some(fix) = fix else {
            return Ok((
                Coordinates::ZERO,
                location_constants::UNAVAILABLE_TEXT.to_string(),
            ));
        };
        if fix.coordinates.is_zero() {
            return Ok((
                Coordinates::ZERO,
                location_constants::UNAVAILABLE_TEXT.to_string(),
            ));
        }

        let text = match self
            .geocoder
            .reverse(fix.coordinates.latitude, fix.coordinates.longitude)
            .await
        {
            Ok(address) => address_text(&address),
            Err(e) => {
                debug!(error = %e, "Reverse geocoding failed, using raw coordinates");
                fix.coordinates.format_dd()
            }
        };

        Ok((fix.coordinates, text))
    }

    /// Fix acquisition chain: fresh fix → last known → none
    async fn acquire_fix(&self) -> Result<Option<LocationFix>, LocationError> {
        let attempt =
            tokio::time::timeout(location_constants::FIX_TIMEOUT, self.provider.current_fix())
                .await;

        match attempt {
            Ok(Ok(Some(fix))) if self.is_acceptable(&fix) => Ok(Some(fix)),
            Ok(Ok(_)) => Ok(self.provider.last_known().await),
            Ok(Err(e)) => match self.provider.last_known().await {
                Some(fix) => {
                    warn!(error = %e, "Provider failed, using last known location");
                    Ok(Some(fix))
                }
                None => Err(e),
            },
            Err(_) => {
                debug!("Position fix timed out, using last known location");
                Ok(self.provider.last_known().await)
            }
        }
    }

    fn is_acceptable(&self, fix: &LocationFix) -> bool {
        if fix.coordinates.is_zero() {
            return false;
        }
        match fix.accuracy_m {
            Some(accuracy) => accuracy <= self.accuracy_threshold_m,
            None => true,
        }
    }
}

/// Turn geocoder output into display text
///
/// Prefers the full formatted line, then the composed components, then
/// "Unknown Location" when everything is blank.
fn address_text(address: &Address) -> String {
    if let Some(line) = &address.formatted
        && !line.trim().is_empty()
    {
        return line.clone();
    }

    let composed = address.compose();
    if composed.is_empty() {
        location_constants::UNKNOWN_TEXT.to_string()
    } else {
        composed
    }
}

// SPDX-License-Identifier: GPL-3.0-only

//! Location provider seam and GeoClue2 implementation
//!
//! GeoClue2 is reached through dynamic D-Bus proxies on the system bus.
//! The provider caches its most recent successful fix; that cache is the
//! "last known location" the resolver falls back to.

use std::sync::Mutex;
use std::time::Instant;

use futures::future::BoxFuture;
use tracing::{debug, info, warn};
use zbus::zvariant::OwnedObjectPath;

use super::Coordinates;
use crate::constants::location as location_constants;
use crate::errors::LocationError;

/// GClue accuracy level requesting exact positioning
const ACCURACY_LEVEL_EXACT: u32 = 8;

/// One position reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub coordinates: Coordinates,
    /// Horizontal accuracy in meters; None when the source does not report
    /// one
    pub accuracy_m: Option<f64>,
}

/// Source of position fixes
pub trait LocationProvider: Send + Sync {
    /// Attempt a fresh fix
    ///
    /// `Ok(None)` means the service answered but has no position. An error
    /// means the service itself could not be reached.
    fn current_fix(&self) -> BoxFuture<'_, Result<Option<LocationFix>, LocationError>>;

    /// Most recent fix this provider has delivered, if any
    fn last_known(&self) -> BoxFuture<'_, Option<LocationFix>>;
}

/// GeoClue2-backed provider
pub struct GeoClueProvider {
    desktop_id: String,
    last_fix: Mutex<Option<LocationFix>>,
}

impl GeoClueProvider {
    pub fn new(desktop_id: impl Into<String>) -> Self {
        Self {
            desktop_id: desktop_id.into(),
            last_fix: Mutex::new(None),
        }
    }

    async fn query_geoclue(&self) -> Result<Option<LocationFix>, LocationError> {
        let service_err = |e: &dyn std::fmt::Display| LocationError::ServiceUnavailable(e.to_string());

        let connection = zbus::Connection::system()
            .await
            .map_err(|e| service_err(&e))?;

        let manager = zbus::Proxy::new(
            &connection,
            "org.freedesktop.GeoClue2",
            "/org/freedesktop/GeoClue2/Manager",
            "org.freedesktop.GeoClue2.Manager",
        )
        .await
        .map_err(|e| service_err(&e))?;

        let client_path: OwnedObjectPath = manager
            .call("GetClient", &())
            .await
            .map_err(|e| service_err(&e))?;

        let client = zbus::Proxy::new(
            &connection,
            "org.freedesktop.GeoClue2",
            client_path.as_str(),
            "org.freedesktop.GeoClue2.Client",
        )
        .await
        .map_err(|e| service_err(&e))?;

        client
            .set_property("DesktopId", self.desktop_id.as_str())
            .await
            .map_err(|e| service_err(&e))?;
        client
            .set_property("RequestedAccuracyLevel", ACCURACY_LEVEL_EXACT)
            .await
            .map_err(|e| service_err(&e))?;

        let _: () = client
            .call("Start", &())
            .await
            .map_err(|e| service_err(&e))?;

        // Poll the Location property until the agent publishes a position
        let deadline = Instant::now() + location_constants::FIX_TIMEOUT;
        let fix = loop {
            let location_path: OwnedObjectPath = client
                .get_property("Location")
                .await
                .map_err(|e| service_err(&e))?;

            if location_path.as_str() != "/" {
                break Some(read_location(&connection, &location_path).await?);
            }
            if Instant::now() >= deadline {
                break None;
            }
            tokio::time::sleep(location_constants::FIX_POLL_INTERVAL).await;
        };

        // Best effort; the client is ours and GeoClue reaps idle clients
        let stop: Result<(), _> = client.call("Stop", &()).await;
        if let Err(e) = stop {
            debug!(error = %e, "Failed to stop GeoClue client");
        }

        Ok(fix)
    }
}

/// Read latitude/longitude/accuracy from a GeoClue2 Location object
async fn read_location(
    connection: &zbus::Connection,
    path: &OwnedObjectPath,
) -> Result<LocationFix, LocationError> {
    let service_err = |e: &dyn std::fmt::Display| LocationError::ServiceUnavailable(e.to_string());

    let location = zbus::Proxy::new(
        connection,
        "org.freedesktop.GeoClue2",
        path.as_str(),
        "org.freedesktop.GeoClue2.Location",
    )
    .await
    .map_err(|e| service_err(&e))?;

    let latitude: f64 = location
        .get_property("Latitude")
        .await
        .map_err(|e| service_err(&e))?;
    let longitude: f64 = location
        .get_property("Longitude")
        .await
        .map_err(|e| service_err(&e))?;
    let accuracy: f64 = location.get_property("Accuracy").await.unwrap_or(0.0);

    info!(latitude, longitude, accuracy, "GeoClue position fix");

    Ok(LocationFix {
        coordinates: Coordinates {
            latitude,
            longitude,
        },
        accuracy_m: if accuracy > 0.0 { Some(accuracy) } else { None },
    })
}

impl LocationProvider for GeoClueProvider {
    fn current_fix(&self) -> BoxFuture<'_, Result<Option<LocationFix>, LocationError>> {
        Box::pin(async move {
            let result = self.query_geoclue().await;
            match &result {
                Ok(Some(fix)) => {
                    *self.last_fix.lock().expect("last fix lock poisoned") = Some(*fix);
                }
                Ok(None) => debug!("GeoClue delivered no position before the deadline"),
                Err(e) => warn!(error = %e, "GeoClue query failed"),
            }
            result
        })
    }

    fn last_known(&self) -> BoxFuture<'_, Option<LocationFix>> {
        Box::pin(async move { *self.last_fix.lock().expect("last fix lock poisoned") })
    }
}

/// Provider returning a fixed position (from configuration) or none at all
pub struct StaticProvider {
    fix: Option<LocationFix>,
}

impl StaticProvider {
    pub fn new(fix: Option<LocationFix>) -> Self {
        Self { fix }
    }

    /// Provider with a known position and perfect accuracy
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self::new(Some(LocationFix {
            coordinates: Coordinates {
                latitude,
                longitude,
            },
            accuracy_m: Some(0.0),
        }))
    }
}

impl LocationProvider for StaticProvider {
    fn current_fix(&self) -> BoxFuture<'_, Result<Option<LocationFix>, LocationError>> {
        let fix = self.fix;
        Box::pin(async move { Ok(fix) })
    }

    fn last_known(&self) -> BoxFuture<'_, Option<LocationFix>> {
        let fix = self.fix;
        Box::pin(async move { fix })
    }
}

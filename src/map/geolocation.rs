use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::LatLng;

/// What the page's geolocation call produced.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationReport {
    Fix { latitude: f64, longitude: f64 },
    Denied,
    Unavailable,
    Timeout,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Device,
    Cached,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedLocation {
    pub point: LatLng,
    pub source: LocationSource,
}

/// Options handed to the browser geolocation API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PositionOptions {
    pub timeout_ms: u64,
    pub maximum_age_ms: u64,
}

/// Resolves the map center from device reports, with a cache and a fixed fallback.
#[derive(Debug, Clone)]
pub struct Geolocator {
    fallback: LatLng,
    timeout: Duration,
    maximum_age: Duration,
    last_fix: Option<(LatLng, Instant)>,
}

impl Geolocator {
    pub fn new(fallback: LatLng, timeout: Duration, maximum_age: Duration) -> Self {
        Self {
            fallback,
            timeout,
            maximum_age,
            last_fix: None,
        }
    }

    pub fn options(&self) -> PositionOptions {
        PositionOptions {
            timeout_ms: self.timeout.as_millis() as u64,
            maximum_age_ms: self.maximum_age.as_millis() as u64,
        }
    }

    pub fn resolve(&mut self, report: &LocationReport, now: Instant) -> ResolvedLocation {
        if let LocationReport::Fix {
            latitude,
            longitude,
        } = *report
        {
            match LatLng::new(latitude, longitude) {
                Some(point) => {
                    self.last_fix = Some((point, now));
                    return ResolvedLocation {
                        point,
                        source: LocationSource::Device,
                    };
                }
                None => {
                    tracing::warn!(latitude, longitude, "Discarding out-of-range position fix");
                }
            }
        } else {
            tracing::info!(?report, "Position unavailable, trying cache or fallback");
        }

        self.current(now)
    }

    /// Best known position without a new report.
    pub fn current(&self, now: Instant) -> ResolvedLocation {
        match self.last_fix {
            Some((point, at)) if now.saturating_duration_since(at) <= self.maximum_age => {
                ResolvedLocation {
                    point,
                    source: LocationSource::Cached,
                }
            }
            _ => ResolvedLocation {
                point: self.fallback,
                source: LocationSource::Fallback,
            },
        }
    }
}

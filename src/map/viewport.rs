//! Camera recentering so a chosen point lands at a fixed fraction of the screen.
//!
//! All math is Web-Mercator tile scale: one tile is 256 px, so a world at
//! zoom `z` is `2^(z+8)` pixels wide.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{LatLng, Viewport};

pub const EARTH_CIRCUMFERENCE_M: f64 = 40_075_016.686;
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Web-Mercator latitude limit. Cosines are taken at most this far from the equator.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

pub const CAMERA_TRANSITION: Duration = Duration::from_secs(1);

/// Where on screen the target should end up, as fractions of width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenFraction {
    pub x: f64,
    pub y: f64,
}

impl ScreenFraction {
    pub const CENTER: ScreenFraction = ScreenFraction { x: 0.5, y: 0.5 };
    pub const LEFT_QUARTER: ScreenFraction = ScreenFraction { x: 0.25, y: 0.5 };
    pub const RIGHT_QUARTER: ScreenFraction = ScreenFraction { x: 0.75, y: 0.5 };
}

/// A camera animation request. Zoom never changes during a recenter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraMove {
    pub center: LatLng,
    pub zoom: f64,
    #[serde(serialize_with = "duration_secs")]
    pub duration: Duration,
}

fn duration_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// How far the viewport center sits from the target's desired screen position, in pixels.
pub fn pixel_offset(viewport: Viewport, fraction: ScreenFraction) -> (f64, f64) {
    (
        viewport.width * (0.5 - fraction.x),
        viewport.height * (0.5 - fraction.y),
    )
}

/// Ground meters per screen pixel at `lat` and `zoom`, as (x, y).
///
/// Only the x axis carries the latitude correction.
pub fn meters_per_pixel(lat: f64, zoom: f64) -> (f64, f64) {
    let world_px = 2f64.powf(zoom + 8.0);
    let y = EARTH_CIRCUMFERENCE_M / world_px;
    (y * clamped_cos(lat), y)
}

fn clamped_cos(lat: f64) -> f64 {
    lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians().cos()
}

/// Center the map must move to so `target` renders at `fraction` of the viewport.
pub fn recenter(target: LatLng, zoom: f64, viewport: Viewport, fraction: ScreenFraction) -> LatLng {
    let (dx_px, dy_px) = pixel_offset(viewport, fraction);
    let (mpp_x, mpp_y) = meters_per_pixel(target.lat, zoom);

    let meters_x = dx_px * mpp_x;
    let meters_y = dy_px * mpp_y;

    let d_lng = meters_x / (METERS_PER_DEGREE * clamped_cos(target.lat));
    let d_lat = meters_y / METERS_PER_DEGREE;

    // Screen x grows east, screen y grows south.
    LatLng {
        lat: target.lat - d_lat,
        lng: target.lng + d_lng,
    }
}

/// Tracks the map camera and remembers where it was before a detail view took over.
#[derive(Debug, Clone)]
pub struct CameraController {
    center: LatLng,
    zoom: f64,
    pre_detail: Option<LatLng>,
}

impl CameraController {
    pub fn new(center: LatLng, zoom: f64) -> Self {
        Self {
            center,
            zoom,
            pre_detail: None,
        }
    }

    pub fn center(&self) -> LatLng {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pre_detail(&self) -> Option<LatLng> {
        self.pre_detail
    }

    /// The user panned or zoomed the map themselves.
    pub fn observe(&mut self, center: LatLng, zoom: f64) {
        self.center = center;
        self.zoom = zoom;
    }

    /// Move so `target` sits at `fraction`. No-op without a target.
    pub fn focus(
        &mut self,
        target: Option<LatLng>,
        viewport: Viewport,
        fraction: ScreenFraction,
    ) -> Option<CameraMove> {
        let target = target?;
        if self.pre_detail.is_none() {
            self.pre_detail = Some(self.center);
        }
        self.center = recenter(target, self.zoom, viewport, fraction);
        Some(self.camera_move())
    }

    /// Return to the pre-detail center at the current zoom and forget it.
    pub fn restore(&mut self) -> Option<CameraMove> {
        let previous = self.pre_detail.take()?;
        self.center = previous;
        Some(self.camera_move())
    }

    fn camera_move(&self) -> CameraMove {
        CameraMove {
            center: self.center,
            zoom: self.zoom,
            duration: CAMERA_TRANSITION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW: Viewport = Viewport {
        width: 1200.0,
        height: 800.0,
    };

    fn osaka() -> LatLng {
        LatLng::new(34.702_485_4, 135.493_762_1).unwrap()
    }

    #[test]
    fn centered_fraction_has_zero_offset() {
        assert_eq!(pixel_offset(VIEW, ScreenFraction::CENTER), (0.0, 0.0));
        let c = recenter(osaka(), 13.0, VIEW, ScreenFraction::CENTER);
        assert_eq!(c, osaka());
    }

    #[test]
    fn meters_per_pixel_at_equator_zoom_zero() {
        let (x, y) = meters_per_pixel(0.0, 0.0);
        assert!((y - EARTH_CIRCUMFERENCE_M / 256.0).abs() < 1e-9);
        assert!((x - y).abs() < 1e-9);
    }

    #[test]
    fn meters_per_pixel_x_shrinks_with_latitude() {
        let (x, y) = meters_per_pixel(60.0, 10.0);
        assert!((x - y * 0.5).abs() < 1e-6);
    }

    #[test]
    fn left_quarter_moves_center_east() {
        let target = osaka();
        let center = recenter(target, 13.0, VIEW, ScreenFraction::LEFT_QUARTER);
        assert!(center.lng > target.lng);
        assert!((center.lat - target.lat).abs() < 1e-12);

        // 300 px at zoom 13 is about 0.0129 degrees of longitude.
        let (dx, _) = pixel_offset(VIEW, ScreenFraction::LEFT_QUARTER);
        let expected = dx * EARTH_CIRCUMFERENCE_M / 2f64.powf(21.0) / METERS_PER_DEGREE;
        assert!((center.lng - target.lng - expected).abs() < 1e-9);
    }

    #[test]
    fn right_quarter_moves_center_west() {
        let target = osaka();
        let center = recenter(target, 13.0, VIEW, ScreenFraction::RIGHT_QUARTER);
        assert!(center.lng < target.lng);
    }

    #[test]
    fn upper_fraction_moves_center_south() {
        let target = osaka();
        let center = recenter(target, 13.0, VIEW, ScreenFraction { x: 0.5, y: 0.25 });
        assert!(center.lat < target.lat);
        assert_eq!(center.lng, target.lng);
    }

    #[test]
    fn polar_latitude_stays_finite() {
        let pole = LatLng::new(90.0, 0.0).unwrap();
        let c = recenter(pole, 5.0, VIEW, ScreenFraction::LEFT_QUARTER);
        assert!(c.lat.is_finite() && c.lng.is_finite());
    }

    #[test]
    fn focus_without_target_is_noop() {
        let mut cam = CameraController::new(LatLng::TOKYO_STATION, 13.0);
        assert!(cam.focus(None, VIEW, ScreenFraction::RIGHT_QUARTER).is_none());
        assert!(cam.pre_detail().is_none());
        assert_eq!(cam.center(), LatLng::TOKYO_STATION);
    }

    #[test]
    fn focus_then_restore_returns_to_pre_detail_center() {
        let mut cam = CameraController::new(LatLng::TOKYO_STATION, 13.0);

        let mv = cam
            .focus(Some(osaka()), VIEW, ScreenFraction::RIGHT_QUARTER)
            .unwrap();
        assert_eq!(mv.zoom, 13.0);
        assert_eq!(mv.duration, CAMERA_TRANSITION);
        assert_eq!(cam.pre_detail(), Some(LatLng::TOKYO_STATION));

        // A second focus while detail is open keeps the original memory.
        cam.focus(Some(LatLng::TOKYO_STATION), VIEW, ScreenFraction::RIGHT_QUARTER);
        assert_eq!(cam.pre_detail(), Some(LatLng::TOKYO_STATION));

        let back = cam.restore().unwrap();
        assert_eq!(back.center, LatLng::TOKYO_STATION);
        assert_eq!(back.zoom, 13.0);
        assert!(cam.pre_detail().is_none());
        assert!(cam.restore().is_none());
    }
}

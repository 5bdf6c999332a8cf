use crate::types::{GeoPoint, VisibleRegion, Viewport};

/// Mean Earth radius in meters (spherical approximation).
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Web-Mercator ground resolution at the equator for zoom 0, 256-px tiles.
const METERS_PER_PIXEL_ZOOM_0: f64 = 156_543.033_92;

/// Great-circle distance in meters using the haversine formula.
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points. `clamp` keeps NaN.
    2.0 * EARTH_RADIUS_METERS * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Radius in meters of the smallest circle centred on the camera target that
/// covers every corner of the visible region.
pub fn visible_radius(viewport: &Viewport) -> f64 {
    viewport
        .region
        .corners()
        .iter()
        .map(|corner| distance(viewport.center, *corner))
        .fold(0.0, |acc, d| if d > acc || d.is_nan() { d } else { acc })
}

impl VisibleRegion {
    /// Visible region of an unrotated, untilted Web-Mercator camera looking at
    /// `center` on a `width_px` x `height_px` map.
    pub fn from_camera(center: GeoPoint, zoom: f64, width_px: u32, height_px: u32) -> Self {
        let lat_rad = center.lat.to_radians();
        let meters_per_px = METERS_PER_PIXEL_ZOOM_0 * lat_rad.cos() / 2f64.powf(zoom);

        let half_width_m = f64::from(width_px) / 2.0 * meters_per_px;
        let half_height_m = f64::from(height_px) / 2.0 * meters_per_px;

        let d_lat = (half_height_m / EARTH_RADIUS_METERS).to_degrees();
        let d_lng = (half_width_m / (EARTH_RADIUS_METERS * lat_rad.cos())).to_degrees();

        Self {
            near_left: GeoPoint::new(center.lat - d_lat, center.lng - d_lng),
            near_right: GeoPoint::new(center.lat - d_lat, center.lng + d_lng),
            far_left: GeoPoint::new(center.lat + d_lat, center.lng - d_lng),
            far_right: GeoPoint::new(center.lat + d_lat, center.lng + d_lng),
        }
    }
}

impl Viewport {
    pub fn from_camera(center: GeoPoint, zoom: f64, width_px: u32, height_px: u32) -> Self {
        Self {
            center,
            region: VisibleRegion::from_camera(center, zoom, width_px, height_px),
        }
    }
}

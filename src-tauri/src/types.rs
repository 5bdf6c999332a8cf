use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point on the globe in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Corners of the visible map area. A tilted or rotated camera makes this a
/// general quadrilateral rather than a lat/lng box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibleRegion {
    pub near_left: GeoPoint,
    pub near_right: GeoPoint,
    pub far_left: GeoPoint,
    pub far_right: GeoPoint,
}

impl VisibleRegion {
    pub fn corners(&self) -> [GeoPoint; 4] {
        [self.near_left, self.near_right, self.far_left, self.far_right]
    }
}

/// What the map is showing when the camera settles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: GeoPoint,
    pub region: VisibleRegion,
}

/// A parking bay from the static catalogue, with its last known occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bay {
    pub bay_id: i64,
    pub position: GeoPoint,
    pub description: Option<String>,
    pub available: bool,
    pub status_updated_at: Option<DateTime<Utc>>,
}

/// Occupancy as reported by the bay sensor feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BayStatus {
    Available,
    Occupied,
}

/// One bay's status from a fetch around some center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayStatusUpdate {
    pub bay_id: i64,
    pub status: BayStatus,
    pub observed_at: Option<DateTime<Utc>>,
}

/// Why the policy asked for new status data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefetchReason {
    /// First close-up view of the session.
    Initial,
    /// Cached status outlived the freshness interval.
    Expired,
    /// The visible area reaches outside the last coverage circle.
    LeftCoverage,
}

/// Outcome of a viewport-settle event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    NoAction,
    Refetch {
        center: GeoPoint,
        reason: RefetchReason,
    },
}

impl Decision {
    pub fn is_refetch(&self) -> bool {
        matches!(self, Decision::Refetch { .. })
    }
}

/// Identifies the fetch decision a batch of status updates answers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FetchTicket {
    pub center: GeoPoint,
    pub issued_at: DateTime<Utc>,
}

/// Emitted after a status batch lands in the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRefresh {
    pub ticket: FetchTicket,
    pub applied: usize,
    pub unknown: usize,
}

//! Decides, on each camera-settle event, whether the bay status we already
//! fetched still covers what the user is looking at.
//!
//! Two independent triggers invalidate the cached status: age (the sensor
//! feed refreshes every couple of minutes) and position (the visible area
//! reaches past the circle the last fetch covered). The policy is pure
//! bookkeeping; the caller performs the fetch when told to.

use crate::config::PolicyConfig;
use crate::geometry;
use crate::types::{Decision, FetchTicket, GeoPoint, RefetchReason, Viewport};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Reference center and time of the last fetch. Both live in one `Option`
/// so they are always set together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FreshnessState {
    last_fetch: Option<FetchTicket>,
}

impl FreshnessState {
    pub fn last_fetch(&self) -> Option<&FetchTicket> {
        self.last_fetch.as_ref()
    }

    pub fn reference_center(&self) -> Option<GeoPoint> {
        self.last_fetch.map(|t| t.center)
    }

    pub fn last_fetch_time(&self) -> Option<DateTime<Utc>> {
        self.last_fetch.map(|t| t.issued_at)
    }
}

pub struct FreshnessPolicy {
    config: PolicyConfig,
    state: FreshnessState,
}

impl FreshnessPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            state: FreshnessState::default(),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn state(&self) -> &FreshnessState {
        &self.state
    }

    /// Settle event for a full viewport; derives the visible radius first.
    pub fn on_viewport_settled(&mut self, viewport: &Viewport, now: DateTime<Utc>) -> Decision {
        let radius = geometry::visible_radius(viewport);
        self.on_settled(viewport.center, radius, now)
    }

    /// Settle event with a precomputed visible radius in meters.
    ///
    /// Any comparison involving NaN is false, so a degenerate radius or
    /// center yields `NoAction` and leaves the state untouched.
    pub fn on_settled(&mut self, center: GeoPoint, radius: f64, now: DateTime<Utc>) -> Decision {
        if !(radius < self.config.street_view_radius_m) {
            return Decision::NoAction;
        }

        let Some(last) = self.state.last_fetch else {
            debug!(event = "policy.initial_circle", %center, radius);
            return self.recenter(center, now, RefetchReason::Initial);
        };

        // Whole seconds, truncated. A clock that went backwards reads as fresh.
        let age_secs = (now - last.issued_at).num_seconds();
        if age_secs > self.config.freshness_interval_secs {
            debug!(event = "policy.expired", age_secs, %center);
            return self.recenter(center, now, RefetchReason::Expired);
        }

        let moved = geometry::distance(last.center, center).round();
        let boundary = moved + radius;
        if boundary > self.config.coverage_radius_m {
            debug!(event = "policy.left_coverage", moved, radius, boundary);
            return self.recenter(center, now, RefetchReason::LeftCoverage);
        }

        debug!(event = "policy.within_coverage", age_secs, moved, boundary);
        Decision::NoAction
    }

    fn recenter(&mut self, center: GeoPoint, now: DateTime<Utc>, reason: RefetchReason) -> Decision {
        self.state.last_fetch = Some(FetchTicket {
            center,
            issued_at: now,
        });
        Decision::Refetch { center, reason }
    }
}

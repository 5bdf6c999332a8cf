use crate::geometry;
use crate::types::{Bay, BayStatus, BayStatusUpdate, FetchTicket, GeoPoint, StatusRefresh};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// The session's set of bays. Loaded once; status refreshes mutate entries
/// in place and nothing is ever removed.
#[derive(Debug, Default)]
pub struct BayCatalog {
    bays: BTreeMap<i64, Bay>,
    newest_applied: Option<DateTime<Utc>>,
}

/// What happened to a batch handed to [`BayCatalog::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied(StatusRefresh),
    /// A newer fetch already landed; the batch was discarded.
    Superseded,
}

impl BayCatalog {
    pub fn new(bays: Vec<Bay>) -> Self {
        Self {
            bays: bays.into_iter().map(|b| (b.bay_id, b)).collect(),
            newest_applied: None,
        }
    }

    pub fn len(&self) -> usize {
        self.bays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bays.is_empty()
    }

    pub fn get(&self, bay_id: i64) -> Option<&Bay> {
        self.bays.get(&bay_id)
    }

    pub fn all(&self) -> Vec<Bay> {
        self.bays.values().cloned().collect()
    }

    /// Bays whose position lies within `radius_m` of `center`, nearest first.
    pub fn bays_within(&self, center: GeoPoint, radius_m: f64) -> Vec<Bay> {
        let mut hits: Vec<(f64, &Bay)> = self
            .bays
            .values()
            .map(|b| (geometry::distance(center, b.position), b))
            .filter(|(d, _)| *d <= radius_m)
            .collect();
        hits.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        hits.into_iter().map(|(_, b)| b.clone()).collect()
    }

    /// Apply one fetch's status batch. Batches can resolve out of order, so a
    /// batch from a decision older than the newest one already applied is
    /// dropped rather than overwriting fresher data.
    pub fn apply(&mut self, ticket: FetchTicket, updates: &[BayStatusUpdate]) -> ApplyOutcome {
        if self.newest_applied.is_some_and(|newest| ticket.issued_at < newest) {
            return ApplyOutcome::Superseded;
        }
        self.newest_applied = Some(ticket.issued_at);

        let mut applied = 0;
        let mut unknown = 0;
        for update in updates {
            match self.bays.get_mut(&update.bay_id) {
                Some(bay) => {
                    bay.available = update.status == BayStatus::Available;
                    bay.status_updated_at = Some(update.observed_at.unwrap_or(ticket.issued_at));
                    applied += 1;
                }
                None => unknown += 1,
            }
        }

        ApplyOutcome::Applied(StatusRefresh {
            ticket,
            applied,
            unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 9, 2, 9, 0, 0).unwrap()
    }

    fn bay(bay_id: i64, lat: f64, lng: f64) -> Bay {
        Bay {
            bay_id,
            position: GeoPoint::new(lat, lng),
            description: None,
            available: false,
            status_updated_at: None,
        }
    }

    fn ticket(secs: i64) -> FetchTicket {
        FetchTicket {
            center: GeoPoint::new(-37.8136, 144.9631),
            issued_at: t0() + Duration::seconds(secs),
        }
    }

    fn update(bay_id: i64, status: BayStatus) -> BayStatusUpdate {
        BayStatusUpdate {
            bay_id,
            status,
            observed_at: None,
        }
    }

    fn sample() -> BayCatalog {
        BayCatalog::new(vec![
            bay(1, -37.8136, 144.9631),
            bay(2, -37.8140, 144.9635),
            bay(3, -37.8300, 144.9800),
        ])
    }

    #[test]
    fn test_new_indexes_by_id() {
        let catalog = sample();
        assert_eq!(catalog.len(), 3);
        assert!(!catalog.is_empty());
        assert_eq!(catalog.get(2).unwrap().position, GeoPoint::new(-37.8140, 144.9635));
        assert!(catalog.get(99).is_none());
    }

    #[test]
    fn test_apply_sets_availability_in_place() {
        let mut catalog = sample();
        let outcome = catalog.apply(
            ticket(0),
            &[update(1, BayStatus::Available), update(2, BayStatus::Occupied)],
        );
        assert_eq!(
            outcome,
            ApplyOutcome::Applied(StatusRefresh {
                ticket: ticket(0),
                applied: 2,
                unknown: 0
            })
        );
        assert!(catalog.get(1).unwrap().available);
        assert!(!catalog.get(2).unwrap().available);
        assert_eq!(catalog.get(1).unwrap().status_updated_at, Some(ticket(0).issued_at));
        assert!(catalog.get(3).unwrap().status_updated_at.is_none());
    }

    #[test]
    fn test_apply_prefers_sensor_timestamp() {
        let mut catalog = sample();
        let observed = t0() - Duration::seconds(40);
        catalog.apply(
            ticket(0),
            &[BayStatusUpdate {
                bay_id: 1,
                status: BayStatus::Occupied,
                observed_at: Some(observed),
            }],
        );
        assert_eq!(catalog.get(1).unwrap().status_updated_at, Some(observed));
    }

    #[test]
    fn test_apply_counts_unknown_bays_and_never_adds_them() {
        let mut catalog = sample();
        let outcome = catalog.apply(ticket(0), &[update(42, BayStatus::Available)]);
        let ApplyOutcome::Applied(refresh) = outcome else {
            panic!("expected batch to apply");
        };
        assert_eq!(refresh.unknown, 1);
        assert_eq!(refresh.applied, 0);
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_out_of_order_batch_is_superseded() {
        let mut catalog = sample();
        catalog.apply(ticket(30), &[update(1, BayStatus::Available)]);
        let outcome = catalog.apply(ticket(0), &[update(1, BayStatus::Occupied)]);
        assert_eq!(outcome, ApplyOutcome::Superseded);
        assert!(catalog.get(1).unwrap().available);
    }

    #[test]
    fn test_batches_in_order_all_apply() {
        let mut catalog = sample();
        catalog.apply(ticket(0), &[update(1, BayStatus::Available)]);
        let outcome = catalog.apply(ticket(30), &[update(1, BayStatus::Occupied)]);
        assert!(matches!(outcome, ApplyOutcome::Applied(_)));
        assert!(!catalog.get(1).unwrap().available);
    }

    #[test]
    fn test_same_ticket_time_is_not_superseded() {
        let mut catalog = sample();
        catalog.apply(ticket(10), &[]);
        assert!(matches!(
            catalog.apply(ticket(10), &[update(2, BayStatus::Available)]),
            ApplyOutcome::Applied(_)
        ));
    }

    #[test]
    fn test_bays_within_filters_and_sorts_by_distance() {
        let catalog = sample();
        let near = catalog.bays_within(GeoPoint::new(-37.8141, 144.9636), 200.0);
        let ids: Vec<i64> = near.iter().map(|b| b.bay_id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_bays_within_zero_radius_is_empty_off_target() {
        let catalog = sample();
        assert!(catalog.bays_within(GeoPoint::new(0.0, 0.0), 0.0).is_empty());
    }

    #[test]
    fn test_all_returns_every_bay() {
        assert_eq!(sample().all().len(), 3);
    }
}

//! Trip activity masks.
//!
//! A trip mask records, per route and service day, which trips actually run
//! under a given feature filter. Masks are produced by an external
//! [`TripMaskProvider`] (typically backed by timetable calendars); the
//! router only consumes them when materializing a day view.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::router::QueryConfig;

/// Which of a route's trips (in departure order) run on a service day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTripMask {
    /// One flag per trip, parallel to the route's trip list.
    pub active: Vec<bool>,
}

impl RouteTripMask {
    /// A mask with every trip active.
    pub fn all_active(trip_count: usize) -> Self {
        RouteTripMask {
            active: vec![true; trip_count],
        }
    }
}

/// The trip masks of every route for one service day.
#[derive(Debug, Clone)]
pub struct DayTripMask {
    /// Identifies the set of running services; equal ids across dates mean
    /// equal masks and allow day views to be shared.
    pub service_id: String,
    pub date: NaiveDate,
    /// Route id → trip mask.
    pub masks: HashMap<String, RouteTripMask>,
}

/// Decides which trips run on which date.
///
/// Implementations must be shareable across concurrent queries. The router
/// installs the per-route trip id lists once at construction time via
/// [`TripMaskProvider::set_trip_ids`].
pub trait TripMaskProvider: Send + Sync {
    /// Called once when the router is built, with each route's trip ids in
    /// departure order.
    fn set_trip_ids(&mut self, route_trip_ids: HashMap<String, Vec<String>>);

    /// Identifier of the service set running on `date`. Dates with equal
    /// service ids (and equal timezone offsets) share a cached day view.
    fn service_id_for_date(&self, date: NaiveDate) -> String;

    /// The trip masks for `date` under the query's feature filter.
    fn day_trip_mask(&self, date: NaiveDate, config: &QueryConfig) -> DayTripMask;
}

/// Provider that applies no mask: every trip runs every day.
///
/// This is the default provider and the workhorse for tests and timetables
/// without calendar data.
#[derive(Debug, Default)]
pub struct NoMaskProvider {
    trip_counts: HashMap<String, usize>,
}

impl TripMaskProvider for NoMaskProvider {
    fn set_trip_ids(&mut self, route_trip_ids: HashMap<String, Vec<String>>) {
        self.trip_counts = route_trip_ids
            .into_iter()
            .map(|(route_id, trip_ids)| (route_id, trip_ids.len()))
            .collect();
    }

    fn service_id_for_date(&self, _date: NaiveDate) -> String {
        "all".to_string()
    }

    fn day_trip_mask(&self, date: NaiveDate, _config: &QueryConfig) -> DayTripMask {
        let masks = self
            .trip_counts
            .iter()
            .map(|(route_id, &count)| (route_id.clone(), RouteTripMask::all_active(count)))
            .collect();

        DayTripMask {
            service_id: self.service_id_for_date(date),
            date,
            masks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    #[test]
    fn no_mask_provider_marks_everything_active() {
        let mut provider = NoMaskProvider::default();
        provider.set_trip_ids(HashMap::from([
            ("R1".to_string(), vec!["R1-T1".to_string(), "R1-T2".to_string()]),
            ("R2".to_string(), vec!["R2-T1".to_string()]),
        ]));

        let mask = provider.day_trip_mask(date(), &QueryConfig::default());
        assert_eq!(mask.service_id, "all");
        assert_eq!(mask.masks["R1"].active, vec![true, true]);
        assert_eq!(mask.masks["R2"].active, vec![true]);
    }

    #[test]
    fn service_id_is_date_independent() {
        let provider = NoMaskProvider::default();
        let other = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(
            provider.service_id_for_date(date()),
            provider.service_id_for_date(other)
        );
    }
}

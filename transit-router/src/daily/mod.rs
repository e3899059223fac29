//! Daily materialization of the static timetable.
//!
//! The static network stores timezone-naive local stop times. Before a
//! query can scan, those times are translated onto a single day's
//! UTC-relative timeline, filtered down to the trips actually running that
//! day. The resulting arrays are cached under a key that captures the
//! active service set and the UTC offset of every route timezone on that
//! date, so a cached array is never reused across a daylight saving
//! transition.

mod mask;

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;
use moka::sync::Cache;
use tracing::{debug, warn};

pub use mask::{DayTripMask, NoMaskProvider, RouteTripMask, TripMaskProvider};

use crate::network::{NO_TRIP, Network};
use crate::router::QueryConfig;

/// Offset in seconds to add to a local stop time of `tz` to obtain a
/// UTC-relative time on `date`.
///
/// Sampled at noon UTC of the service date, which no IANA zone makes
/// ambiguous. Example: Zurich in winter (UTC+1) yields -3600.
pub(crate) fn local_to_utc_offset(date: NaiveDate, tz: Tz) -> i32 {
    let noon = date.and_time(NaiveTime::from_hms_opt(12, 0, 0).expect("noon is a valid time"));
    -tz.offset_from_utc_datetime(&noon).fix().local_minus_utc()
}

/// Builds and caches per-day stop time arrays.
///
/// This layer owns key and value construction only; capacity bounding,
/// eviction, and the at-most-one-computation-per-key guarantee come from
/// the cache it consumes.
pub(crate) struct DayViewProvider {
    network: Arc<Network>,
    mask_provider: Box<dyn TripMaskProvider>,
    cache: Cache<String, Arc<Vec<i32>>>,
}

impl DayViewProvider {
    pub fn new(
        network: Arc<Network>,
        mask_provider: Box<dyn TripMaskProvider>,
        capacity: u64,
    ) -> Self {
        DayViewProvider {
            network,
            mask_provider,
            cache: Cache::builder().max_capacity(capacity.max(1)).build(),
        }
    }

    /// The day's stop time array, computed on first use per cache key.
    pub fn day_view(&self, date: NaiveDate, config: &QueryConfig) -> Arc<Vec<i32>> {
        let key = self.cache_key(date, config);
        self.cache
            .get_with(key, || Arc::new(self.build_day_view(date, config)))
    }

    /// Cache key: active-service identity, DST fingerprint, feature filter.
    fn cache_key(&self, date: NaiveDate, config: &QueryConfig) -> String {
        format!(
            "{}|{}|{}",
            self.mask_provider.service_id_for_date(date),
            self.dst_fingerprint(date),
            config.filter_key()
        )
    }

    /// Sorted, de-duplicated UTC offsets of every distinct route timezone
    /// on `date`. Two dates with equal service ids but different offsets
    /// (a DST transition somewhere on the network) get distinct keys.
    fn dst_fingerprint(&self, date: NaiveDate) -> String {
        let mut offsets: Vec<i32> = self
            .network
            .route_traversal
            .routes
            .iter()
            .map(|route| local_to_utc_offset(date, route.timezone))
            .collect();
        offsets.sort_unstable();
        offsets.dedup();

        let parts: Vec<String> = offsets.iter().map(i32::to_string).collect();
        parts.join(",")
    }

    fn build_day_view(&self, date: NaiveDate, config: &QueryConfig) -> Vec<i32> {
        debug!(%date, "materializing day view");
        let mask = self.mask_provider.day_trip_mask(date, config);
        let traversal = &self.network.route_traversal;
        let static_times = &traversal.stop_times;

        // start from all-NO_TRIP: a day without service is a valid,
        // queryable state
        let mut day = vec![NO_TRIP; static_times.len()];

        for (route_id, route_mask) in &mask.masks {
            let Some(&route_idx) = self.network.lookup.routes.get(route_id) else {
                warn!(route = %route_id, "trip mask for unknown route, ignoring");
                continue;
            };
            let route = &traversal.routes[route_idx];
            let utc_offset = local_to_utc_offset(date, route.timezone);

            let mut earliest = NO_TRIP;
            let mut latest = NO_TRIP;

            for trip_offset in 0..route.number_of_trips {
                let active = route_mask.active.get(trip_offset).copied().unwrap_or(false);
                if !active {
                    continue;
                }
                for stop_offset in 0..route.number_of_stops {
                    let index = route.stop_time_index(trip_offset, stop_offset);
                    let arrival = utc_offset + static_times[index];
                    let departure = utc_offset + static_times[index + 1];
                    day[index] = arrival;
                    day[index + 1] = departure;

                    if earliest == NO_TRIP {
                        earliest = arrival;
                    }
                    latest = departure;
                }
            }

            day[route.first_stop_time_idx] = earliest;
            day[route.first_stop_time_idx + 1] = latest;

            if earliest != NO_TRIP && latest != NO_TRIP {
                if day[0] == NO_TRIP || earliest < day[0] {
                    day[0] = earliest;
                }
                if day[1] == NO_TRIP || latest > day[1] {
                    day[1] = latest;
                }
            }
        }

        day
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::network::{NetworkBuilder, StopTime};
    use crate::router::RouterConfig;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// One route A -> B in the given timezone, two trips at 08:00 and 09:00
    /// local.
    fn network_with_zone(tz: Tz) -> Arc<Network> {
        let mut builder = NetworkBuilder::new(RouterConfig::default());
        builder.add_stop("A").unwrap();
        builder.add_stop("B").unwrap();
        builder
            .add_route("R1", vec!["A".into(), "B".into()], tz)
            .unwrap();
        for (trip, base) in [("R1-T1", 8 * 3600), ("R1-T2", 9 * 3600)] {
            builder.add_trip(trip, "R1").unwrap();
            builder.add_stop_time("R1", trip, 0, "A", base, base).unwrap();
            builder
                .add_stop_time("R1", trip, 1, "B", base + 300, base + 300)
                .unwrap();
        }
        let (network, _) = builder.build_network().unwrap();
        Arc::new(network)
    }

    fn provider_for(network: Arc<Network>) -> DayViewProvider {
        let mut mask_provider = NoMaskProvider::default();
        mask_provider.set_trip_ids(network.lookup.route_trip_ids.clone());
        DayViewProvider::new(network, Box::new(mask_provider), 5)
    }

    /// Counts mask computations so tests can observe cache hits.
    #[derive(Debug)]
    struct CountingProvider {
        inner: NoMaskProvider,
        calls: Arc<AtomicUsize>,
    }

    impl TripMaskProvider for CountingProvider {
        fn set_trip_ids(&mut self, route_trip_ids: HashMap<String, Vec<String>>) {
            self.inner.set_trip_ids(route_trip_ids);
        }

        fn service_id_for_date(&self, date: NaiveDate) -> String {
            self.inner.service_id_for_date(date)
        }

        fn day_trip_mask(&self, date: NaiveDate, config: &QueryConfig) -> DayTripMask {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.day_trip_mask(date, config)
        }
    }

    /// Masks out a fixed trip of a fixed route.
    #[derive(Debug)]
    struct OneTripInactiveProvider {
        inner: NoMaskProvider,
        route_id: String,
        trip_offset: usize,
    }

    impl TripMaskProvider for OneTripInactiveProvider {
        fn set_trip_ids(&mut self, route_trip_ids: HashMap<String, Vec<String>>) {
            self.inner.set_trip_ids(route_trip_ids);
        }

        fn service_id_for_date(&self, date: NaiveDate) -> String {
            self.inner.service_id_for_date(date)
        }

        fn day_trip_mask(&self, date: NaiveDate, config: &QueryConfig) -> DayTripMask {
            let mut mask = self.inner.day_trip_mask(date, config);
            if let Some(route_mask) = mask.masks.get_mut(&self.route_id) {
                route_mask.active[self.trip_offset] = false;
            }
            mask
        }
    }

    #[test]
    fn utc_offsets() {
        // Zurich: UTC+1 in winter, UTC+2 in summer
        let zurich = chrono_tz::Europe::Zurich;
        assert_eq!(local_to_utc_offset(date(2024, 1, 15), zurich), -3600);
        assert_eq!(local_to_utc_offset(date(2024, 7, 15), zurich), -7200);

        // New York: UTC-5 in winter
        let new_york = chrono_tz::America::New_York;
        assert_eq!(local_to_utc_offset(date(2024, 1, 15), new_york), 18_000);

        assert_eq!(local_to_utc_offset(date(2024, 1, 15), chrono_tz::UTC), 0);
    }

    #[test]
    fn day_view_shifts_times_to_utc() {
        let network = network_with_zone(chrono_tz::Europe::Zurich);
        let provider = provider_for(network.clone());

        // winter: local 08:00 is 07:00 UTC
        let day = provider.day_view(date(2024, 1, 15), &QueryConfig::default());
        let route = &network.route_traversal.routes[0];
        let at_a = StopTime::read(&day, route.stop_time_index(0, 0));
        assert_eq!(at_a.departure, 8 * 3600 - 3600);

        // route and global day bounds
        assert_eq!(route.day_bounds(&day), (7 * 3600, 9 * 3600 - 3600 + 300));
        assert_eq!(day[0], 7 * 3600);
        assert_eq!(day[1], 9 * 3600 - 3600 + 300);
    }

    #[test]
    fn inactive_trips_are_no_trip() {
        let network = network_with_zone(chrono_tz::UTC);
        let mut mask_provider = OneTripInactiveProvider {
            inner: NoMaskProvider::default(),
            route_id: "R1".to_string(),
            trip_offset: 0,
        };
        mask_provider.set_trip_ids(network.lookup.route_trip_ids.clone());
        let provider = DayViewProvider::new(network.clone(), Box::new(mask_provider), 5);

        let day = provider.day_view(date(2024, 1, 15), &QueryConfig::default());
        let route = &network.route_traversal.routes[0];

        let masked = StopTime::read(&day, route.stop_time_index(0, 0));
        assert!(masked.is_masked());
        let active = StopTime::read(&day, route.stop_time_index(1, 0));
        assert_eq!(active.departure, 9 * 3600);

        // bounds only cover the active trip
        assert_eq!(route.day_bounds(&day), (9 * 3600, 9 * 3600 + 300));
    }

    #[test]
    fn absent_service_builds_all_no_trip_view() {
        let network = network_with_zone(chrono_tz::UTC);
        // provider that was never given trip ids produces no masks at all
        let provider =
            DayViewProvider::new(network.clone(), Box::new(NoMaskProvider::default()), 5);

        let day = provider.day_view(date(2024, 1, 15), &QueryConfig::default());
        assert!(day.iter().all(|&value| value == NO_TRIP));
    }

    #[test]
    fn equal_keys_hit_the_cache() {
        let network = network_with_zone(chrono_tz::Europe::Zurich);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut mask_provider = CountingProvider {
            inner: NoMaskProvider::default(),
            calls: calls.clone(),
        };
        mask_provider.set_trip_ids(network.lookup.route_trip_ids.clone());
        let provider = DayViewProvider::new(network, Box::new(mask_provider), 5);

        let config = QueryConfig::default();
        let first = provider.day_view(date(2024, 1, 15), &config);
        // same service id, same offsets: cache hit, no recomputation
        let second = provider.day_view(date(2024, 1, 16), &config);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);

        // crossing the DST boundary changes the fingerprint and the key
        let _summer = provider.day_view(date(2024, 7, 15), &config);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn filter_changes_the_key() {
        let network = network_with_zone(chrono_tz::UTC);
        let calls = Arc::new(AtomicUsize::new(0));
        let mut mask_provider = CountingProvider {
            inner: NoMaskProvider::default(),
            calls: calls.clone(),
        };
        mask_provider.set_trip_ids(network.lookup.route_trip_ids.clone());
        let provider = DayViewProvider::new(network, Box::new(mask_provider), 5);

        let config = QueryConfig::default();
        provider.day_view(date(2024, 1, 15), &config);

        let mut accessible = config.clone();
        accessible.wheelchair_accessible = true;
        provider.day_view(date(2024, 1, 15), &accessible);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn repeated_views_are_element_wise_identical() {
        let network = network_with_zone(chrono_tz::Europe::Zurich);
        let provider = provider_for(network);
        let config = QueryConfig::default();

        let first = provider.day_view(date(2024, 1, 15), &config);
        let second = provider.day_view(date(2024, 1, 15), &config);
        assert_eq!(first.as_slice(), second.as_slice());
    }
}

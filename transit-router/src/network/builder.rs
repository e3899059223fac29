//! Incremental network construction and validation.
//!
//! The builder accepts stop/route/trip/stop-time/transfer records in any
//! dependency-respecting order, validates them eagerly where possible, and
//! on [`NetworkBuilder::build`] produces either a fully valid router or an
//! error. A failed build never leaves a partially applied network behind.

use std::collections::{HashMap, HashSet};

use chrono_tz::Tz;
use rayon::prelude::*;
use tracing::{debug, info};

use super::{Lookup, Network, NO_TRIP, Route, RouteStop, RouteTraversal, Stop, StopContext, StopTime, Transfer};
use crate::router::{Router, RouterConfig};

/// Validation failure while assembling the network.
///
/// Always fatal: the builder either produces a fully valid network or
/// nothing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildError {
    /// Stop id registered twice
    #[error("stop {0} already exists")]
    DuplicateStop(String),

    /// Route id registered twice
    #[error("route {0} already exists")]
    DuplicateRoute(String),

    /// Trip id registered twice within the same route
    #[error("trip {trip_id} already exists on route {route_id}")]
    DuplicateTrip { route_id: String, trip_id: String },

    /// Stop time supplied twice for the same trip position
    #[error("stop time at position {position} of trip {trip_id} on route {route_id} already exists")]
    DuplicateStopTime {
        route_id: String,
        trip_id: String,
        position: usize,
    },

    /// Referenced stop was never registered
    #[error("stop {0} does not exist")]
    UnknownStop(String),

    /// Referenced route was never registered
    #[error("route {0} does not exist")]
    UnknownRoute(String),

    /// Referenced trip was never registered on the route
    #[error("trip {trip_id} does not exist on route {route_id}")]
    UnknownTrip { route_id: String, trip_id: String },

    /// Stop time position outside the route's stop sequence
    #[error("position {position} is out of bounds [0, {number_of_stops}) on route {route_id}")]
    PositionOutOfBounds {
        route_id: String,
        position: usize,
        number_of_stops: usize,
    },

    /// Stop id does not match the route's declared sequence at the position
    #[error("stop {stop_id} does not match stop {expected} at position {position} of route {route_id}")]
    StopSequenceMismatch {
        route_id: String,
        stop_id: String,
        expected: String,
        position: usize,
    },

    /// A stop time departs before it arrives
    #[error("arrival is after departure at position {position} of trip {trip_id} on route {route_id}")]
    ArrivalAfterDeparture {
        route_id: String,
        trip_id: String,
        position: usize,
    },

    /// A stop time is inconsistent with the adjacent stop time on the same
    /// trip
    #[error("stop times of trip {trip_id} on route {route_id} are not monotonic around position {position}")]
    NonMonotonicStopTimes {
        route_id: String,
        trip_id: String,
        position: usize,
    },

    /// A trip is missing a stop time for one of its positions
    #[error("stop time at position {position} of trip {trip_id} on route {route_id} not set")]
    IncompleteRoute {
        route_id: String,
        trip_id: String,
        position: usize,
    },

    /// A registered stop is served by no route
    #[error("stop {0} is not served by any route")]
    OrphanStop(String),
}

/// Per-route accumulation of trips and stop times.
#[derive(Debug)]
struct RouteBuilder {
    id: String,
    timezone: Tz,
    stop_sequence: Vec<String>,
    trip_ids: Vec<String>,
    trip_index: HashMap<String, usize>,
    /// Stop times per trip, parallel to `trip_ids`; `None` until supplied.
    trips: Vec<Vec<Option<StopTime>>>,
}

/// A validated route: trips sorted by departure at the first stop,
/// tie-broken by trip id.
#[derive(Debug)]
struct RouteContainer {
    id: String,
    timezone: Tz,
    stop_sequence: Vec<String>,
    trip_ids: Vec<String>,
    trips: Vec<Vec<StopTime>>,
}

impl RouteBuilder {
    fn new(id: String, timezone: Tz, stop_sequence: Vec<String>) -> Self {
        RouteBuilder {
            id,
            timezone,
            stop_sequence,
            trip_ids: Vec::new(),
            trip_index: HashMap::new(),
            trips: Vec::new(),
        }
    }

    fn add_trip(&mut self, trip_id: &str) -> Result<(), BuildError> {
        if self.trip_index.contains_key(trip_id) {
            return Err(BuildError::DuplicateTrip {
                route_id: self.id.clone(),
                trip_id: trip_id.to_string(),
            });
        }

        debug!(route = %self.id, trip = %trip_id, "adding trip");
        self.trip_index.insert(trip_id.to_string(), self.trip_ids.len());
        self.trip_ids.push(trip_id.to_string());
        self.trips.push(vec![None; self.stop_sequence.len()]);

        Ok(())
    }

    fn add_stop_time(
        &mut self,
        trip_id: &str,
        position: usize,
        stop_id: &str,
        stop_time: StopTime,
    ) -> Result<(), BuildError> {
        if position >= self.stop_sequence.len() {
            return Err(BuildError::PositionOutOfBounds {
                route_id: self.id.clone(),
                position,
                number_of_stops: self.stop_sequence.len(),
            });
        }

        let trip_offset =
            *self
                .trip_index
                .get(trip_id)
                .ok_or_else(|| BuildError::UnknownTrip {
                    route_id: self.id.clone(),
                    trip_id: trip_id.to_string(),
                })?;

        if self.stop_sequence[position] != stop_id {
            return Err(BuildError::StopSequenceMismatch {
                route_id: self.id.clone(),
                stop_id: stop_id.to_string(),
                expected: self.stop_sequence[position].clone(),
                position,
            });
        }

        if stop_time.arrival > stop_time.departure {
            return Err(BuildError::ArrivalAfterDeparture {
                route_id: self.id.clone(),
                trip_id: trip_id.to_string(),
                position,
            });
        }

        let stop_times = &mut self.trips[trip_offset];
        if stop_times[position].is_some() {
            return Err(BuildError::DuplicateStopTime {
                route_id: self.id.clone(),
                trip_id: trip_id.to_string(),
                position,
            });
        }

        // the new pair must be consistent with already supplied neighbours
        let violates_previous = position > 0
            && stop_times[position - 1]
                .is_some_and(|previous| previous.departure > stop_time.arrival);
        let violates_next = position + 1 < stop_times.len()
            && stop_times[position + 1].is_some_and(|next| stop_time.departure > next.arrival);
        if violates_previous || violates_next {
            return Err(BuildError::NonMonotonicStopTimes {
                route_id: self.id.clone(),
                trip_id: trip_id.to_string(),
                position,
            });
        }

        stop_times[position] = Some(stop_time);

        Ok(())
    }

    /// Validates completeness and sorts trips by departure at the first
    /// stop (trip id breaks ties), producing the immutable container.
    fn build(self) -> Result<RouteContainer, BuildError> {
        let mut trips = Vec::with_capacity(self.trip_ids.len());
        for (trip_id, stop_times) in self.trip_ids.iter().zip(self.trips) {
            let mut complete = Vec::with_capacity(stop_times.len());
            for (position, stop_time) in stop_times.into_iter().enumerate() {
                complete.push(stop_time.ok_or_else(|| BuildError::IncompleteRoute {
                    route_id: self.id.clone(),
                    trip_id: trip_id.clone(),
                    position,
                })?);
            }
            trips.push((trip_id.clone(), complete));
        }

        trips.sort_by(|a, b| {
            a.1[0]
                .departure
                .cmp(&b.1[0].departure)
                .then_with(|| a.0.cmp(&b.0))
        });

        let (trip_ids, trips): (Vec<String>, Vec<Vec<StopTime>>) = trips.into_iter().unzip();

        Ok(RouteContainer {
            id: self.id,
            timezone: self.timezone,
            stop_sequence: self.stop_sequence,
            trip_ids,
            trips,
        })
    }
}

impl RouteContainer {
    /// Departure of the earliest trip at the route's first stop; routes
    /// without trips sort last.
    fn first_departure(&self) -> i32 {
        self.trips.first().map_or(i32::MAX, |trip| trip[0].departure)
    }
}

/// Incremental builder for the routing network.
///
/// # Examples
///
/// ```
/// use transit_router::{NetworkBuilder, RouterConfig};
///
/// let mut builder = NetworkBuilder::new(RouterConfig::default());
/// builder.add_stop("A")?;
/// builder.add_stop("B")?;
/// builder.add_route("R1", vec!["A".into(), "B".into()], chrono_tz::UTC)?;
/// builder.add_trip("R1-T1", "R1")?;
/// builder.add_stop_time("R1", "R1-T1", 0, "A", 28_800, 28_800)?;
/// builder.add_stop_time("R1", "R1-T1", 1, "B", 29_100, 29_160)?;
/// let router = builder.build()?;
/// # let _ = router;
/// # Ok::<(), transit_router::BuildError>(())
/// ```
#[derive(Debug)]
pub struct NetworkBuilder {
    config: RouterConfig,
    stop_index: HashMap<String, usize>,
    stop_ids: Vec<String>,
    /// Builder indices of the routes serving each stop.
    stop_route_sets: Vec<HashSet<usize>>,
    route_index: HashMap<String, usize>,
    route_builders: Vec<RouteBuilder>,
    /// Cross-stop transfers per source stop, last write wins per ordered
    /// stop pair.
    transfers: Vec<Vec<Transfer>>,
    same_stop_transfer_overrides: Vec<Option<i32>>,
}

impl NetworkBuilder {
    pub fn new(config: RouterConfig) -> Self {
        NetworkBuilder {
            config,
            stop_index: HashMap::new(),
            stop_ids: Vec::new(),
            stop_route_sets: Vec::new(),
            route_index: HashMap::new(),
            route_builders: Vec::new(),
            transfers: Vec::new(),
            same_stop_transfer_overrides: Vec::new(),
        }
    }

    /// Registers a stop.
    pub fn add_stop(&mut self, id: &str) -> Result<(), BuildError> {
        if self.stop_index.contains_key(id) {
            return Err(BuildError::DuplicateStop(id.to_string()));
        }

        debug!(stop = %id, "adding stop");
        self.stop_index.insert(id.to_string(), self.stop_ids.len());
        self.stop_ids.push(id.to_string());
        self.stop_route_sets.push(HashSet::new());
        self.transfers.push(Vec::new());
        self.same_stop_transfer_overrides.push(None);

        Ok(())
    }

    /// Registers a route with its stop sequence and timezone. All stops
    /// must already be registered.
    pub fn add_route(
        &mut self,
        id: &str,
        stop_ids: Vec<String>,
        timezone: Tz,
    ) -> Result<(), BuildError> {
        if self.route_index.contains_key(id) {
            return Err(BuildError::DuplicateRoute(id.to_string()));
        }

        let builder_idx = self.route_builders.len();
        for stop_id in &stop_ids {
            let stop_idx = *self
                .stop_index
                .get(stop_id)
                .ok_or_else(|| BuildError::UnknownStop(stop_id.clone()))?;
            self.stop_route_sets[stop_idx].insert(builder_idx);
        }

        debug!(route = %id, stops = ?stop_ids, "adding route");
        self.route_index.insert(id.to_string(), builder_idx);
        self.route_builders
            .push(RouteBuilder::new(id.to_string(), timezone, stop_ids));

        Ok(())
    }

    /// Registers a trip on an existing route.
    pub fn add_trip(&mut self, trip_id: &str, route_id: &str) -> Result<(), BuildError> {
        self.route_builder_mut(route_id)?.add_trip(trip_id)
    }

    /// Supplies the stop time for one position of a trip. Arrival and
    /// departure are local seconds relative to the service day.
    pub fn add_stop_time(
        &mut self,
        route_id: &str,
        trip_id: &str,
        position: usize,
        stop_id: &str,
        arrival: i32,
        departure: i32,
    ) -> Result<(), BuildError> {
        self.route_builder_mut(route_id)?
            .add_stop_time(trip_id, position, stop_id, StopTime { arrival, departure })
    }

    /// Registers a walking transfer. A transfer between a stop and itself
    /// overrides the stop's same-stop transfer time instead; for distinct
    /// stops the last write per ordered pair wins.
    pub fn add_transfer(
        &mut self,
        source_stop_id: &str,
        target_stop_id: &str,
        duration: u32,
    ) -> Result<(), BuildError> {
        let source_idx = *self
            .stop_index
            .get(source_stop_id)
            .ok_or_else(|| BuildError::UnknownStop(source_stop_id.to_string()))?;
        let target_idx = *self
            .stop_index
            .get(target_stop_id)
            .ok_or_else(|| BuildError::UnknownStop(target_stop_id.to_string()))?;

        let duration = duration.min(i32::MAX as u32) as i32;

        if source_idx == target_idx {
            self.same_stop_transfer_overrides[source_idx] = Some(duration);
            return Ok(());
        }

        let transfers = &mut self.transfers[source_idx];
        if let Some(existing) = transfers
            .iter_mut()
            .find(|transfer| transfer.target_stop_idx == target_idx)
        {
            existing.duration = duration;
        } else {
            transfers.push(Transfer {
                target_stop_idx: target_idx,
                duration,
            });
        }

        Ok(())
    }

    /// Validates all registered records and produces the router.
    ///
    /// Route containers are built in parallel (each route's trips are
    /// independent), then sorted by the departure of their earliest trip,
    /// tie-broken by route id, so scan order is reproducible.
    pub fn build(self) -> Result<Router, BuildError> {
        let (network, config) = self.build_network()?;
        Ok(Router::new(network, config))
    }

    pub(crate) fn build_network(self) -> Result<(Network, RouterConfig), BuildError> {
        info!(
            stops = self.stop_ids.len(),
            routes = self.route_builders.len(),
            "building network"
        );

        let containers: Vec<RouteContainer> = self
            .route_builders
            .into_par_iter()
            .map(RouteBuilder::build)
            .collect::<Result<_, _>>()?;

        // deterministic scan order: earliest first departure, then route id
        let mut indexed: Vec<(usize, RouteContainer)> = containers.into_iter().enumerate().collect();
        indexed.sort_by(|a, b| {
            a.1.first_departure()
                .cmp(&b.1.first_departure())
                .then_with(|| a.1.id.cmp(&b.1.id))
        });
        let mut final_route_idx = vec![0usize; indexed.len()];
        for (final_idx, (builder_idx, _)) in indexed.iter().enumerate() {
            final_route_idx[*builder_idx] = final_idx;
        }
        let containers: Vec<RouteContainer> = indexed.into_iter().map(|(_, container)| container).collect();

        // every registered stop must be served
        for (stop_idx, route_set) in self.stop_route_sets.iter().enumerate() {
            if route_set.is_empty() {
                return Err(BuildError::OrphanStop(self.stop_ids[stop_idx].clone()));
            }
        }

        let lookup = Self::build_lookup(&self.stop_index, &containers);
        let stop_context = Self::build_stop_context(
            &self.stop_ids,
            &self.stop_route_sets,
            &final_route_idx,
            self.transfers,
            &self.same_stop_transfer_overrides,
            self.config.default_same_stop_transfer_time.min(i32::MAX as u32) as i32,
        );
        let route_traversal = Self::build_route_traversal(&self.stop_index, containers);

        let network = Network {
            lookup,
            stop_context,
            route_traversal,
        };

        Ok((network, self.config))
    }

    fn build_lookup(stop_index: &HashMap<String, usize>, containers: &[RouteContainer]) -> Lookup {
        let mut routes = HashMap::with_capacity(containers.len());
        let mut route_trip_ids = HashMap::with_capacity(containers.len());
        for (route_idx, container) in containers.iter().enumerate() {
            routes.insert(container.id.clone(), route_idx);
            route_trip_ids.insert(container.id.clone(), container.trip_ids.clone());
        }

        Lookup {
            stops: stop_index.clone(),
            routes,
            route_trip_ids,
        }
    }

    fn build_stop_context(
        stop_ids: &[String],
        stop_route_sets: &[HashSet<usize>],
        final_route_idx: &[usize],
        transfers_per_stop: Vec<Vec<Transfer>>,
        same_stop_overrides: &[Option<i32>],
        default_same_stop_transfer_time: i32,
    ) -> StopContext {
        let mut stops = Vec::with_capacity(stop_ids.len());
        let mut transfers = Vec::new();
        let mut stop_routes = Vec::new();

        for (stop_idx, stop_id) in stop_ids.iter().enumerate() {
            let mut route_indices: Vec<usize> = stop_route_sets[stop_idx]
                .iter()
                .map(|&builder_idx| final_route_idx[builder_idx])
                .collect();
            route_indices.sort_unstable();

            let stop_transfers = &transfers_per_stop[stop_idx];
            stops.push(Stop {
                id: stop_id.clone(),
                first_stop_route_idx: stop_routes.len(),
                number_of_routes: route_indices.len(),
                same_stop_transfer_time: same_stop_overrides[stop_idx]
                    .unwrap_or(default_same_stop_transfer_time),
                first_transfer_idx: transfers.len(),
                number_of_transfers: stop_transfers.len(),
            });

            transfers.extend_from_slice(stop_transfers);
            stop_routes.extend(route_indices);
        }

        StopContext {
            stops,
            transfers,
            stop_routes,
        }
    }

    fn build_route_traversal(
        stop_index: &HashMap<String, usize>,
        containers: Vec<RouteContainer>,
    ) -> RouteTraversal {
        let stop_time_pairs: usize = containers
            .iter()
            .map(|container| container.trips.len() * container.stop_sequence.len())
            .sum();
        let route_stop_count: usize = containers
            .iter()
            .map(|container| container.stop_sequence.len())
            .sum();

        let mut routes = Vec::with_capacity(containers.len());
        let mut route_stops = Vec::with_capacity(route_stop_count);
        let mut stop_times = Vec::with_capacity(2 + 2 * containers.len() + 2 * stop_time_pairs);

        // global day bound header slots
        stop_times.push(NO_TRIP);
        stop_times.push(NO_TRIP);

        for (route_idx, container) in containers.into_iter().enumerate() {
            routes.push(Route {
                id: container.id,
                timezone: container.timezone,
                first_route_stop_idx: route_stops.len(),
                number_of_stops: container.stop_sequence.len(),
                first_stop_time_idx: stop_times.len(),
                number_of_trips: container.trips.len(),
                trip_ids: container.trip_ids,
            });

            // route day bound header slots
            stop_times.push(NO_TRIP);
            stop_times.push(NO_TRIP);

            for stop_id in &container.stop_sequence {
                route_stops.push(RouteStop {
                    stop_idx: stop_index[stop_id],
                    route_idx,
                });
            }

            for trip in &container.trips {
                for stop_time in trip {
                    stop_times.push(stop_time.arrival);
                    stop_times.push(stop_time.departure);
                }
            }
        }

        RouteTraversal {
            routes,
            route_stops,
            stop_times,
        }
    }

    fn route_builder_mut(&mut self, route_id: &str) -> Result<&mut RouteBuilder, BuildError> {
        let builder_idx = *self
            .route_index
            .get(route_id)
            .ok_or_else(|| BuildError::UnknownRoute(route_id.to_string()))?;
        Ok(&mut self.route_builders[builder_idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> NetworkBuilder {
        NetworkBuilder::new(RouterConfig::default())
    }

    /// Two stops, one route, one trip departing at 08:00.
    fn minimal_builder() -> NetworkBuilder {
        let mut b = builder();
        b.add_stop("A").unwrap();
        b.add_stop("B").unwrap();
        b.add_route("R1", vec!["A".into(), "B".into()], chrono_tz::UTC)
            .unwrap();
        b.add_trip("R1-T1", "R1").unwrap();
        b.add_stop_time("R1", "R1-T1", 0, "A", 28_800, 28_800).unwrap();
        b.add_stop_time("R1", "R1-T1", 1, "B", 29_100, 29_100).unwrap();
        b
    }

    #[test]
    fn duplicate_stop_rejected() {
        let mut b = builder();
        b.add_stop("A").unwrap();
        assert!(matches!(b.add_stop("A"), Err(BuildError::DuplicateStop(_))));
    }

    #[test]
    fn route_with_unknown_stop_rejected() {
        let mut b = builder();
        b.add_stop("A").unwrap();
        let result = b.add_route("R1", vec!["A".into(), "X".into()], chrono_tz::UTC);
        assert!(matches!(result, Err(BuildError::UnknownStop(id)) if id == "X"));
    }

    #[test]
    fn duplicate_route_rejected() {
        let mut b = builder();
        b.add_stop("A").unwrap();
        b.add_route("R1", vec!["A".into()], chrono_tz::UTC).unwrap();
        let result = b.add_route("R1", vec!["A".into()], chrono_tz::UTC);
        assert!(matches!(result, Err(BuildError::DuplicateRoute(_))));
    }

    #[test]
    fn trip_on_unknown_route_rejected() {
        let mut b = builder();
        assert!(matches!(
            b.add_trip("T1", "R9"),
            Err(BuildError::UnknownRoute(_))
        ));
    }

    #[test]
    fn duplicate_trip_rejected() {
        let mut b = minimal_builder();
        assert!(matches!(
            b.add_trip("R1-T1", "R1"),
            Err(BuildError::DuplicateTrip { .. })
        ));
    }

    #[test]
    fn stop_time_position_checks() {
        let mut b = minimal_builder();
        b.add_trip("R1-T2", "R1").unwrap();

        assert!(matches!(
            b.add_stop_time("R1", "R1-T2", 5, "A", 0, 0),
            Err(BuildError::PositionOutOfBounds { .. })
        ));
        assert!(matches!(
            b.add_stop_time("R1", "R1-T2", 0, "B", 0, 0),
            Err(BuildError::StopSequenceMismatch { .. })
        ));
        assert!(matches!(
            b.add_stop_time("R1", "missing", 0, "A", 0, 0),
            Err(BuildError::UnknownTrip { .. })
        ));
    }

    #[test]
    fn arrival_after_departure_rejected() {
        let mut b = minimal_builder();
        b.add_trip("R1-T2", "R1").unwrap();
        assert!(matches!(
            b.add_stop_time("R1", "R1-T2", 0, "A", 100, 50),
            Err(BuildError::ArrivalAfterDeparture { .. })
        ));
    }

    #[test]
    fn non_monotonic_stop_times_rejected() {
        let mut b = minimal_builder();
        b.add_trip("R1-T2", "R1").unwrap();
        b.add_stop_time("R1", "R1-T2", 0, "A", 30_000, 30_000).unwrap();
        // arrives before the previous stop departs
        assert!(matches!(
            b.add_stop_time("R1", "R1-T2", 1, "B", 29_000, 29_000),
            Err(BuildError::NonMonotonicStopTimes { .. })
        ));

        // same violation when the later position is supplied first
        let mut b = minimal_builder();
        b.add_trip("R1-T3", "R1").unwrap();
        b.add_stop_time("R1", "R1-T3", 1, "B", 29_000, 29_000).unwrap();
        assert!(matches!(
            b.add_stop_time("R1", "R1-T3", 0, "A", 30_000, 30_000),
            Err(BuildError::NonMonotonicStopTimes { .. })
        ));
    }

    #[test]
    fn incomplete_trip_fails_build() {
        let mut b = minimal_builder();
        b.add_trip("R1-T2", "R1").unwrap();
        b.add_stop_time("R1", "R1-T2", 0, "A", 30_000, 30_000).unwrap();
        // position 1 of R1-T2 never supplied
        assert!(matches!(
            b.build_network(),
            Err(BuildError::IncompleteRoute { position: 1, .. })
        ));
    }

    #[test]
    fn orphan_stop_fails_build() {
        let mut b = minimal_builder();
        b.add_stop("Z").unwrap();
        assert!(matches!(
            b.build_network(),
            Err(BuildError::OrphanStop(id)) if id == "Z"
        ));
    }

    #[test]
    fn routes_sorted_by_first_departure_then_id() {
        let mut b = builder();
        for id in ["A", "B", "C"] {
            b.add_stop(id).unwrap();
        }
        // registered late, departs early
        b.add_route("R2", vec!["B".into(), "C".into()], chrono_tz::UTC)
            .unwrap();
        b.add_route("R1", vec!["A".into(), "B".into()], chrono_tz::UTC)
            .unwrap();
        b.add_trip("R2-T1", "R2").unwrap();
        b.add_stop_time("R2", "R2-T1", 0, "B", 100, 100).unwrap();
        b.add_stop_time("R2", "R2-T1", 1, "C", 200, 200).unwrap();
        b.add_trip("R1-T1", "R1").unwrap();
        b.add_stop_time("R1", "R1-T1", 0, "A", 500, 500).unwrap();
        b.add_stop_time("R1", "R1-T1", 1, "B", 600, 600).unwrap();

        let (network, _) = b.build_network().unwrap();
        let route_ids: Vec<_> = network
            .route_traversal
            .routes
            .iter()
            .map(|route| route.id.as_str())
            .collect();
        assert_eq!(route_ids, vec!["R2", "R1"]);
        assert_eq!(network.lookup.routes["R2"], 0);
        assert_eq!(network.lookup.routes["R1"], 1);
    }

    #[test]
    fn trips_sorted_by_departure() {
        let mut b = minimal_builder();
        // departs earlier than R1-T1 despite later registration
        b.add_trip("R1-T0", "R1").unwrap();
        b.add_stop_time("R1", "R1-T0", 0, "A", 25_000, 25_000).unwrap();
        b.add_stop_time("R1", "R1-T0", 1, "B", 25_300, 25_300).unwrap();

        let (network, _) = b.build_network().unwrap();
        let route = &network.route_traversal.routes[0];
        assert_eq!(route.trip_ids, vec!["R1-T0", "R1-T1"]);

        // stop times stored in trip order: T0 pair first
        let first = StopTime::read(
            &network.route_traversal.stop_times,
            route.stop_time_index(0, 0),
        );
        assert_eq!(first.departure, 25_000);
    }

    #[test]
    fn stop_time_array_layout() {
        let (network, _) = minimal_builder().build_network().unwrap();
        let traversal = &network.route_traversal;
        let route = &traversal.routes[0];

        // two global header slots, then the route's two header slots
        assert_eq!(traversal.stop_times[0], NO_TRIP);
        assert_eq!(traversal.stop_times[1], NO_TRIP);
        assert_eq!(route.first_stop_time_idx, 2);
        assert_eq!(route.day_bounds(&traversal.stop_times), (NO_TRIP, NO_TRIP));

        let at_a = StopTime::read(&traversal.stop_times, route.stop_time_index(0, 0));
        let at_b = StopTime::read(&traversal.stop_times, route.stop_time_index(0, 1));
        assert_eq!(at_a, StopTime { arrival: 28_800, departure: 28_800 });
        assert_eq!(at_b, StopTime { arrival: 29_100, departure: 29_100 });
        assert_eq!(
            traversal.stop_times.len(),
            2 + 2 + 2 * route.number_of_stops * route.number_of_trips
        );
    }

    #[test]
    fn same_stop_transfer_default_and_override() {
        let mut b = minimal_builder();
        b.add_transfer("A", "A", 300).unwrap();
        let (network, _) = b.build_network().unwrap();

        let stops = &network.stop_context.stops;
        assert_eq!(stops[network.lookup.stops["A"]].same_stop_transfer_time, 300);
        // B keeps the configured default
        assert_eq!(stops[network.lookup.stops["B"]].same_stop_transfer_time, 120);
    }

    #[test]
    fn cross_stop_transfer_last_write_wins() {
        let mut b = minimal_builder();
        b.add_transfer("A", "B", 600).unwrap();
        b.add_transfer("A", "B", 240).unwrap();
        let (network, _) = b.build_network().unwrap();

        let stop_a = &network.stop_context.stops[network.lookup.stops["A"]];
        let transfers = network.transfers_of_stop(stop_a);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].duration, 240);
        assert_eq!(transfers[0].target_stop_idx, network.lookup.stops["B"]);
    }

    #[test]
    fn transfer_with_unknown_stop_rejected() {
        let mut b = minimal_builder();
        assert!(matches!(
            b.add_transfer("A", "X", 60),
            Err(BuildError::UnknownStop(_))
        ));
    }

    #[test]
    fn stop_routes_index_is_sorted() {
        let mut b = builder();
        for id in ["A", "B", "C"] {
            b.add_stop(id).unwrap();
        }
        b.add_route("R9", vec!["B".into(), "A".into()], chrono_tz::UTC)
            .unwrap();
        b.add_route("R1", vec!["A".into(), "C".into()], chrono_tz::UTC)
            .unwrap();
        for (route, trip, stops) in [
            ("R9", "R9-T1", ["B", "A"]),
            ("R1", "R1-T1", ["A", "C"]),
        ] {
            b.add_trip(trip, route).unwrap();
            b.add_stop_time(route, trip, 0, stops[0], 100, 100).unwrap();
            b.add_stop_time(route, trip, 1, stops[1], 200, 200).unwrap();
        }

        let (network, _) = b.build_network().unwrap();
        let stop_a = &network.stop_context.stops[network.lookup.stops["A"]];
        let routes_of_a = network.routes_of_stop(stop_a);
        let mut sorted = routes_of_a.to_vec();
        sorted.sort_unstable();
        assert_eq!(routes_of_a, sorted.as_slice());
        assert_eq!(routes_of_a.len(), 2);
    }

    #[test]
    fn identical_records_build_identical_networks() {
        let build = || {
            let mut b = minimal_builder();
            b.add_stop("C").unwrap();
            b.add_route("R2", vec!["B".into(), "C".into()], chrono_tz::UTC)
                .unwrap();
            b.add_trip("R2-T1", "R2").unwrap();
            b.add_stop_time("R2", "R2-T1", 0, "B", 29_400, 29_400).unwrap();
            b.add_stop_time("R2", "R2-T1", 1, "C", 29_700, 29_700).unwrap();
            b.add_transfer("A", "C", 420).unwrap();
            b.build_network().unwrap().0
        };

        let first = build();
        let second = build();
        assert_eq!(first.route_traversal.stop_times, second.route_traversal.stop_times);
        let ids = |network: &Network| {
            network
                .route_traversal
                .routes
                .iter()
                .map(|route| route.id.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(ids(&first), ids(&second));
    }
}

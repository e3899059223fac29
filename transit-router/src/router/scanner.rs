//! Route scanning.
//!
//! Each round, every route passing a stop marked in the previous round is
//! walked once in scan direction. At the first marked stop a boardable
//! trip is searched; riding it, every later stop is checked for an
//! improved time. Earliest-arrival and latest-departure share this code
//! path: the scan direction flips and every time comparison is multiplied
//! by the time direction.

use tracing::debug;

use super::TimeType;
use super::state::{Label, LabelRef, LabelSource, QueryState};
use crate::network::{NO_TRIP, Network, Route, StopTime};

/// The trip currently ridden while walking a route's stop sequence.
struct ActiveTrip {
    trip_offset: usize,
    /// Boarding time at the stop the trip was entered.
    entry_time: i32,
    /// Stop the trip was entered at; its previous-round label becomes the
    /// predecessor of every label written while riding.
    boarding_stop: usize,
}

pub(crate) struct RouteScanner<'a> {
    network: &'a Network,
    /// Day-materialized stop times.
    stop_times: &'a [i32],
    min_transfer_duration: i32,
    time_type: TimeType,
}

impl<'a> RouteScanner<'a> {
    pub fn new(
        network: &'a Network,
        stop_times: &'a [i32],
        min_transfer_duration: i32,
        time_type: TimeType,
    ) -> Self {
        RouteScanner {
            network,
            stop_times,
            min_transfer_duration,
            time_type,
        }
    }

    /// Scans all routes passing stops marked in the previous round,
    /// marking improved stops for the next round.
    pub fn scan(&self, round: usize, state: &mut QueryState) {
        // day without any service
        if self.stop_times[0] == NO_TRIP {
            return;
        }

        let routes = &self.network.route_traversal.routes;
        let mut routes_to_scan = vec![false; routes.len()];
        for stop_idx in 0..state.stop_count() {
            if !state.is_marked_this_round(stop_idx) {
                continue;
            }
            let stop = &self.network.stop_context.stops[stop_idx];
            for &route_idx in self.network.routes_of_stop(stop) {
                routes_to_scan[route_idx] = true;
            }
        }

        debug!(
            round,
            routes = routes_to_scan.iter().filter(|&&marked| marked).count(),
            "scanning routes"
        );

        for (route_idx, marked) in routes_to_scan.iter().enumerate() {
            if *marked {
                self.scan_route(route_idx, round, state);
            }
        }
    }

    /// Walks one route in scan direction, riding boardable trips and
    /// writing improved labels for the given round.
    fn scan_route(&self, route_idx: usize, round: usize, state: &mut QueryState) {
        let route = &self.network.route_traversal.routes[route_idx];
        let route_stops = &self.network.route_traversal.route_stops;
        let last_round = round - 1;
        let forward = self.time_type == TimeType::Departure;
        let number_of_stops = route.number_of_stops;

        if route.number_of_trips == 0 || route.day_bounds(self.stop_times).0 == NO_TRIP {
            return;
        }

        let mut active: Option<ActiveTrip> = None;

        for step in 0..number_of_stops {
            let stop_offset = if forward {
                step
            } else {
                number_of_stops - 1 - step
            };
            let stop_idx = route_stops[route.first_route_stop_idx + stop_offset].stop_idx;
            let best = state.best_time(stop_idx);

            match &active {
                None => {
                    // still looking for the first marked stop on the route
                    if !self.can_enter_at_stop(stop_idx, state, stop_offset, number_of_stops) {
                        continue;
                    }
                }
                Some(trip) => {
                    let stop_time = StopTime::read(
                        self.stop_times,
                        route.stop_time_index(trip.trip_offset, stop_offset),
                    );
                    if !self.update_on_active_trip(
                        &stop_time, trip, best, stop_idx, round, route_idx, state,
                    ) {
                        continue;
                    }
                }
            }

            let candidate =
                self.find_possible_trip(stop_idx, stop_offset, route, last_round, state);
            // re-boarding the same trip further along gains nothing and
            // would only lengthen the reconstructed connection
            active = match (active, candidate) {
                (Some(current), Some(new)) if new.trip_offset == current.trip_offset => {
                    Some(current)
                }
                (_, candidate) => candidate,
            };
        }
    }

    /// Whether a trip could be boarded at this stop in this round: the
    /// stop must be reachable, marked in the previous round, and not the
    /// final stop of the scan direction.
    fn can_enter_at_stop(
        &self,
        stop_idx: usize,
        state: &QueryState,
        stop_offset: usize,
        number_of_stops: usize,
    ) -> bool {
        if state.is_unreached(stop_idx) {
            return false;
        }

        if !state.is_marked_this_round(stop_idx) {
            // already scanned in a previous round without improvement
            return false;
        }

        match self.time_type {
            TimeType::Departure => stop_offset + 1 != number_of_stops,
            TimeType::Arrival => stop_offset != 0,
        }
    }

    /// Checks the active trip's time against the best known time at the
    /// stop. On improvement a route label is written, the stop marked, and
    /// `false` returned (no better trip can exist in this round). Without
    /// improvement, returns whether an earlier/later trip might still be
    /// boardable here (overtaking).
    #[allow(clippy::too_many_arguments)]
    fn update_on_active_trip(
        &self,
        stop_time: &StopTime,
        trip: &ActiveTrip,
        best: i32,
        stop_idx: usize,
        round: usize,
        route_idx: usize,
        state: &mut QueryState,
    ) -> bool {
        let dir = self.time_type.direction();
        let target_time = match self.time_type {
            TimeType::Departure => stop_time.arrival,
            TimeType::Arrival => stop_time.departure,
        };

        if dir * target_time < dir * best {
            state.set_best_time(stop_idx, target_time);
            state.set_label(
                round,
                stop_idx,
                Label {
                    source_time: trip.entry_time,
                    target_time,
                    source: LabelSource::Route {
                        route: route_idx,
                        trip_offset: trip.trip_offset,
                    },
                    stop: stop_idx,
                    previous: Some(LabelRef {
                        round: round - 1,
                        stop: trip.boarding_stop,
                    }),
                },
            );
            state.mark(stop_idx);
            return false;
        }

        // not improved: if the previous round reached this stop with a
        // strictly better time than the active trip offers, an earlier
        // (or later) trip may overtake, so try to re-board
        match state.label(round - 1, stop_idx) {
            None => false,
            Some(previous) => dir * previous.target_time < dir * target_time,
        }
    }

    /// Finds the first trip of the route boardable at the stop, honoring
    /// the same-stop transfer bias after a route label and the minimum
    /// transfer duration.
    fn find_possible_trip(
        &self,
        stop_idx: usize,
        stop_offset: usize,
        route: &Route,
        last_round: usize,
        state: &QueryState,
    ) -> Option<ActiveTrip> {
        let dir = self.time_type.direction();
        let forward = self.time_type == TimeType::Departure;
        let stop = &self.network.stop_context.stops[stop_idx];
        let previous = state.label(last_round, stop_idx)?;

        let mut reference_time = previous.target_time;
        if matches!(previous.source, LabelSource::Route { .. }) {
            reference_time +=
                dir * stop.same_stop_transfer_time.max(self.min_transfer_duration);
        }

        // fast pruning against the route's day bounds
        let (day_earliest, day_latest) = route.day_bounds(self.stop_times);
        let boardable_bound = if forward { day_latest } else { day_earliest };
        if dir * reference_time > dir * boardable_bound {
            return None;
        }

        let number_of_trips = route.number_of_trips;
        for step in 0..number_of_trips {
            let trip_offset = if forward {
                step
            } else {
                number_of_trips - 1 - step
            };
            let stop_time = StopTime::read(
                self.stop_times,
                route.stop_time_index(trip_offset, stop_offset),
            );
            if stop_time.is_masked() {
                continue;
            }

            let boarding_time = if forward {
                stop_time.departure
            } else {
                stop_time.arrival
            };
            if dir * boarding_time >= dir * reference_time {
                return Some(ActiveTrip {
                    trip_offset,
                    entry_time: boarding_time,
                    boarding_stop: stop_idx,
                });
            }
        }

        None
    }
}

//! Connection reconstruction from label chains.
//!
//! Turns the engine's per-round label layers into ordered leg sequences.
//! Two correction passes run on every extracted chain before legs are
//! built: combining a leading/trailing walk with an adjacent route leg
//! when the route's trip also serves the walk's far stop at least as well
//! (the same-stop transfer bias in scanning can hide this), and shifting a
//! source-side walk in time when idle waiting separates it from the first
//! route leg.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::state::{INFINITY, Label, LabelSource, NEG_INFINITY};
use super::{QueryError, TimeType};
use crate::domain::{Connection, Leg};
use crate::network::{Network, StopTime};

/// A leg before stop ids and timezones are resolved.
struct RawLeg {
    source: LabelSource,
    from_stop: usize,
    to_stop: usize,
    departure: i32,
    arrival: i32,
}

pub(crate) struct LabelPostprocessor<'a> {
    network: &'a Network,
    /// Day-materialized stop times, the same timeline the labels use.
    stop_times: &'a [i32],
    time_type: TimeType,
    reference_date: NaiveDate,
    reference_timezone: Tz,
}

impl<'a> LabelPostprocessor<'a> {
    pub fn new(
        network: &'a Network,
        stop_times: &'a [i32],
        time_type: TimeType,
        reference_date: NaiveDate,
        reference_timezone: Tz,
    ) -> Self {
        LabelPostprocessor {
            network,
            stop_times,
            time_type,
            reference_date,
            reference_timezone,
        }
    }

    /// One connection per round whose best target time strictly improves
    /// on all earlier rounds: the pareto front over (transfers, time).
    pub fn reconstruct_pareto(
        &self,
        rounds: &[Vec<Option<Label>>],
        target_stops: &[(usize, i32)],
        allow_target_transfer: bool,
    ) -> Result<Vec<Connection>, QueryError> {
        let dir = self.time_type.direction();
        let mut connections = Vec::new();
        let mut best_time = match self.time_type {
            TimeType::Departure => INFINITY,
            TimeType::Arrival => NEG_INFINITY,
        };

        for labels in rounds {
            let mut best_label: Option<&Label> = None;

            for &(stop_idx, walk) in target_stops {
                let Some(label) = labels[stop_idx].as_ref() else {
                    continue;
                };
                if !allow_target_transfer
                    && matches!(label.source, LabelSource::Transfer { .. })
                {
                    continue;
                }

                let actual = label.target_time.saturating_add(dir * walk);
                if dir * actual < dir * best_time {
                    best_label = Some(label);
                    best_time = actual;
                }
            }

            // target not reached in this round, or not better than an
            // earlier round
            let Some(label) = best_label else {
                continue;
            };
            if let Some(connection) = self.connection_from_label(label, rounds)? {
                connections.push(connection);
            }
        }

        Ok(connections)
    }

    /// The single best connection per reachable stop, keyed by stop id.
    ///
    /// Rounds are scanned in reverse: the first label found is the
    /// globally best by construction.
    pub fn reconstruct_isolines(
        &self,
        rounds: &[Vec<Option<Label>>],
    ) -> Result<HashMap<String, Connection>, QueryError> {
        let mut isolines = HashMap::new();

        for (stop_idx, stop) in self.network.stop_context.stops.iter().enumerate() {
            let best = rounds
                .iter()
                .rev()
                .find_map(|labels| labels[stop_idx].as_ref());
            let Some(label) = best else {
                continue;
            };
            if matches!(label.source, LabelSource::Initial) {
                continue;
            }
            if let Some(connection) = self.connection_from_label(label, rounds)? {
                isolines.insert(stop.id.clone(), connection);
            }
        }

        Ok(isolines)
    }

    /// Walks the backward label chain into chronological legs.
    fn connection_from_label(
        &self,
        label: &Label,
        rounds: &[Vec<Option<Label>>],
    ) -> Result<Option<Connection>, QueryError> {
        // extract the chain, target first, initial label at the tail
        let mut chain: Vec<Label> = Vec::new();
        let mut current = label.clone();
        loop {
            if matches!(current.source, LabelSource::Initial) {
                chain.push(current);
                break;
            }
            let previous_ref = current.previous.ok_or(QueryError::Internal(
                "label chain does not terminate in an initial label",
            ))?;
            let previous = rounds[previous_ref.round][previous_ref.stop]
                .clone()
                .ok_or(QueryError::Internal("label chain references a missing label"))?;
            chain.push(current);
            current = previous;
        }

        if chain.len() < 2 {
            return Ok(None);
        }

        self.maybe_combine_labels(&mut chain, true);
        self.maybe_combine_labels(&mut chain, false);

        let mut raw_legs: Vec<RawLeg> = Vec::with_capacity(chain.len() - 1);
        for i in 0..chain.len() - 1 {
            let leg_label = &chain[i];
            let neighbour_stop = chain[i + 1].stop;
            let (from_stop, to_stop, departure, arrival) = match self.time_type {
                TimeType::Departure => (
                    neighbour_stop,
                    leg_label.stop,
                    leg_label.source_time,
                    leg_label.target_time,
                ),
                TimeType::Arrival => (
                    leg_label.stop,
                    neighbour_stop,
                    leg_label.target_time,
                    leg_label.source_time,
                ),
            };
            raw_legs.push(RawLeg {
                source: leg_label.source,
                from_stop,
                to_stop,
                departure,
                arrival,
            });
        }

        if raw_legs.is_empty() {
            return Ok(None);
        }
        // the chain runs from the search target back to the source, which
        // is reverse chronological for departure queries and already
        // chronological for arrival queries
        if self.time_type == TimeType::Departure {
            raw_legs.reverse();
        }

        let legs = self.resolve_legs(raw_legs);
        let connection = Connection::new(legs)
            .map_err(|_| QueryError::Internal("reconstructed connection violates leg invariants"))?;

        Ok(Some(connection))
    }

    /// Combination pass for the first (target-side) or last (source-side)
    /// transfer/route label pair.
    ///
    /// The pair is combined only when the route's trip serves the
    /// transfer's far stop at a temporally feasible instant that is at
    /// least as good as the transfer's own time. When combination is not
    /// possible on the source side, idle time between the transfer and the
    /// route leg is removed instead.
    fn maybe_combine_labels(&self, chain: &mut Vec<Label>, from_target: bool) {
        let non_initial = chain.len() - 1;
        if non_initial < 2 {
            return;
        }

        let (transfer_i, route_i) = if from_target {
            (0, 1)
        } else {
            (non_initial - 1, non_initial - 2)
        };

        if !matches!(chain[transfer_i].source, LabelSource::Transfer { .. }) {
            return;
        }
        let LabelSource::Route { route, trip_offset } = chain[route_i].source else {
            return;
        };

        // the stop the route trip would have to serve instead of the walk
        let stop_idx = if from_target {
            chain[transfer_i].stop
        } else {
            chain[transfer_i + 1].stop
        };

        let stop_time = self.trip_stop_time(stop_idx, route, trip_offset);
        let feasible = stop_time.as_ref().is_some_and(|stop_time| {
            !stop_time.is_masked()
                && if from_target {
                    self.can_stop_time_be_target(stop_time, &chain[route_i], &chain[transfer_i])
                } else {
                    self.can_stop_time_be_source(stop_time, &chain[route_i], &chain[transfer_i])
                }
        });
        let Some(stop_time) = stop_time.filter(|_| feasible) else {
            if !from_target {
                Self::maybe_shift_source_transfer(chain, transfer_i, route_i);
            }
            return;
        };

        let forward = self.time_type == TimeType::Departure;
        let dir = self.time_type.direction();
        let route_time = match (from_target, forward) {
            (true, true) => stop_time.arrival,
            (true, false) => stop_time.departure,
            (false, true) => stop_time.departure,
            (false, false) => stop_time.arrival,
        };

        // best time achieved by the existing transfer/route pair
        let reference_time = if from_target {
            dir * chain[transfer_i].target_time
        } else {
            dir * chain[transfer_i].source_time
        };

        let improves = if from_target {
            dir * route_time <= reference_time
        } else {
            dir * route_time >= reference_time
        };
        if !improves {
            return;
        }

        if from_target {
            let combined = Label {
                source_time: chain[route_i].source_time,
                target_time: route_time,
                source: chain[route_i].source,
                stop: chain[transfer_i].stop,
                previous: chain[route_i].previous,
            };
            chain.drain(0..2);
            chain.insert(0, combined);
        } else {
            let combined = Label {
                source_time: route_time,
                target_time: chain[route_i].target_time,
                source: chain[route_i].source,
                stop: chain[route_i].stop,
                previous: chain[transfer_i].previous,
            };
            chain.drain(route_i..=transfer_i);
            chain.insert(route_i, combined);
        }
    }

    /// Removes idle time between a source-side transfer and the adjacent
    /// route leg by shifting the transfer in time. Travel time shrinks;
    /// the overall arrival/departure does not change.
    fn maybe_shift_source_transfer(chain: &mut [Label], transfer_i: usize, route_i: usize) {
        let idle_time = chain[route_i].source_time - chain[transfer_i].target_time;
        if idle_time != 0 {
            let transfer = &mut chain[transfer_i];
            transfer.source_time += idle_time;
            transfer.target_time += idle_time;
        }
    }

    /// Whether the stop time can replace the transfer as the journey's
    /// source: it must depart within the window spanned by the transfer
    /// start and the route label's target.
    fn can_stop_time_be_source(
        &self,
        stop_time: &StopTime,
        route_label: &Label,
        transfer_label: &Label,
    ) -> bool {
        let dir = self.time_type.direction();
        let time = match self.time_type {
            TimeType::Departure => stop_time.departure,
            TimeType::Arrival => stop_time.arrival,
        };
        dir * time <= dir * route_label.target_time
            && dir * time >= dir * transfer_label.source_time
    }

    /// Whether the stop time can replace the transfer as the journey's
    /// target: it must arrive within the window spanned by the route
    /// label's source and the transfer's end.
    fn can_stop_time_be_target(
        &self,
        stop_time: &StopTime,
        route_label: &Label,
        transfer_label: &Label,
    ) -> bool {
        let dir = self.time_type.direction();
        let time = match self.time_type {
            TimeType::Departure => stop_time.arrival,
            TimeType::Arrival => stop_time.departure,
        };
        dir * time >= dir * route_label.source_time
            && dir * time <= dir * transfer_label.target_time
    }

    /// The day stop time of the trip at `stop_idx`, or `None` when the
    /// trip's route does not serve that stop.
    fn trip_stop_time(&self, stop_idx: usize, route_idx: usize, trip_offset: usize) -> Option<StopTime> {
        let route = &self.network.route_traversal.routes[route_idx];
        let route_stops = &self.network.route_traversal.route_stops;
        let stop_offset = (0..route.number_of_stops).find(|&offset| {
            route_stops[route.first_route_stop_idx + offset].stop_idx == stop_idx
        })?;

        Some(StopTime::read(
            self.stop_times,
            route.stop_time_index(trip_offset, stop_offset),
        ))
    }

    /// Resolves per-leg timezones and converts internal seconds into
    /// concrete instants.
    fn resolve_legs(&self, raw_legs: Vec<RawLeg>) -> Vec<Leg> {
        let routes = &self.network.route_traversal.routes;
        let stops = &self.network.stop_context.stops;

        let route_zone = |leg: &RawLeg| match leg.source {
            LabelSource::Route { route, .. } => Some(routes[route].timezone),
            _ => None,
        };

        let midnight = self.reference_date.and_time(NaiveTime::MIN);
        let base = Utc.from_utc_datetime(&midnight);
        let instant =
            |seconds: i32, tz: Tz| (base + Duration::seconds(i64::from(seconds))).with_timezone(&tz);

        raw_legs
            .iter()
            .enumerate()
            .map(|(i, leg)| match leg.source {
                LabelSource::Route { route, trip_offset } => {
                    let route = &routes[route];
                    let tz = route.timezone;
                    Leg::Route {
                        route_id: route.id.clone(),
                        trip_id: route.trip_ids[trip_offset].clone(),
                        from_stop_id: stops[leg.from_stop].id.clone(),
                        to_stop_id: stops[leg.to_stop].id.clone(),
                        departure: instant(leg.departure, tz),
                        arrival: instant(leg.arrival, tz),
                    }
                }
                _ => {
                    // departure end looks backward, arrival end forward;
                    // a lone resolved end covers both so the walk never
                    // appears to cross a zone boundary it does not cross
                    let backward = raw_legs[..i].iter().rev().find_map(&route_zone);
                    let forward = raw_legs[i + 1..].iter().find_map(&route_zone);
                    let (departure_zone, arrival_zone) = match (backward, forward) {
                        (None, None) => (self.reference_timezone, self.reference_timezone),
                        (Some(zone), None) => (zone, zone),
                        (None, Some(zone)) => (zone, zone),
                        (Some(departure_zone), Some(arrival_zone)) => {
                            (departure_zone, arrival_zone)
                        }
                    };
                    Leg::WalkTransfer {
                        from_stop_id: stops[leg.from_stop].id.clone(),
                        to_stop_id: stops[leg.to_stop].id.clone(),
                        departure: instant(leg.departure, departure_zone),
                        arrival: instant(leg.arrival, arrival_zone),
                    }
                }
            })
            .collect()
    }
}

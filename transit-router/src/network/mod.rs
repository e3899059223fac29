//! Immutable, array-backed network representation.
//!
//! All entities are referenced by dense integer index into flat arrays
//! rather than by object reference, so route scanning walks contiguous
//! memory. The layout is fixed at build time and never grows afterwards;
//! the whole structure is shared read-only between concurrent queries.

mod builder;

use std::collections::HashMap;

use chrono_tz::Tz;

pub use builder::{BuildError, NetworkBuilder};

/// Sentinel in day-materialized stop time arrays marking a slot whose trip
/// does not run on that day.
pub(crate) const NO_TRIP: i32 = i32::MIN;

/// A stop of the network.
///
/// `first_stop_route_idx`/`number_of_routes` address this stop's slice of
/// [`StopContext::stop_routes`]; `first_transfer_idx`/`number_of_transfers`
/// address its slice of [`StopContext::transfers`].
#[derive(Debug, Clone)]
pub(crate) struct Stop {
    pub id: String,
    pub first_stop_route_idx: usize,
    pub number_of_routes: usize,
    /// Minimum dwell time in seconds to change trips at this stop without
    /// walking.
    pub same_stop_transfer_time: i32,
    pub first_transfer_idx: usize,
    pub number_of_transfers: usize,
}

/// A route of the network, with exactly one stop sequence.
///
/// Trips are ordered by increasing departure time at the first stop of the
/// route. `first_stop_time_idx` points at the route's two header slots in
/// the flat stop time array; trip stop times follow (see
/// [`Route::stop_time_index`]).
#[derive(Debug, Clone)]
pub(crate) struct Route {
    pub id: String,
    pub timezone: Tz,
    pub first_route_stop_idx: usize,
    pub number_of_stops: usize,
    pub first_stop_time_idx: usize,
    pub number_of_trips: usize,
    pub trip_ids: Vec<String>,
}

impl Route {
    /// Index of the arrival slot for a trip/stop pair in the flat stop time
    /// array. The departure slot follows at `+ 1`.
    pub fn stop_time_index(&self, trip_offset: usize, stop_offset: usize) -> usize {
        self.first_stop_time_idx + 2 + 2 * (trip_offset * self.number_of_stops + stop_offset)
    }

    /// Earliest arrival and latest departure of the route on the
    /// materialized day, or `NO_TRIP` when no trip of the route runs.
    pub fn day_bounds(&self, stop_times: &[i32]) -> (i32, i32) {
        (
            stop_times[self.first_stop_time_idx],
            stop_times[self.first_stop_time_idx + 1],
        )
    }
}

/// A (stop, route) pairing. The same flat array is sliced per route (in
/// traversal order) and per stop (across its routes).
#[derive(Debug, Clone, Copy)]
pub(crate) struct RouteStop {
    pub stop_idx: usize,
    pub route_idx: usize,
}

/// A one-directional walking edge to a *different* stop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Transfer {
    pub target_stop_idx: usize,
    /// Walking duration in seconds.
    pub duration: i32,
}

/// An (arrival, departure) pair read from a flat stop time array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StopTime {
    pub arrival: i32,
    pub departure: i32,
}

impl StopTime {
    /// Reads the pair at `index` (an arrival slot index).
    pub fn read(stop_times: &[i32], index: usize) -> Self {
        StopTime {
            arrival: stop_times[index],
            departure: stop_times[index + 1],
        }
    }

    /// True when the owning trip does not run on the materialized day.
    pub fn is_masked(&self) -> bool {
        self.arrival == NO_TRIP
    }
}

/// Stops, their walking transfers, and the stop → routes index.
#[derive(Debug)]
pub(crate) struct StopContext {
    pub stops: Vec<Stop>,
    pub transfers: Vec<Transfer>,
    /// Route indices, sliced per stop via
    /// `Stop::first_stop_route_idx`/`number_of_routes`.
    pub stop_routes: Vec<usize>,
}

/// Routes, their stop sequences, and the flat stop time array.
///
/// The stop time array holds local seconds at build time; the daily
/// materialization layer overlays UTC-shifted copies of it per service day.
/// Layout: two global header slots (earliest/latest of the day), then per
/// route two header slots followed by `2 × stops × trips` arrival/departure
/// values.
#[derive(Debug)]
pub(crate) struct RouteTraversal {
    pub routes: Vec<Route>,
    pub route_stops: Vec<RouteStop>,
    pub stop_times: Vec<i32>,
}

/// Immutable id → index maps, built once and shared read-only by all
/// queries.
#[derive(Debug)]
pub(crate) struct Lookup {
    pub stops: HashMap<String, usize>,
    pub routes: HashMap<String, usize>,
    /// Route id → trip ids ordered by departure at the route's first stop.
    pub route_trip_ids: HashMap<String, Vec<String>>,
}

/// The validated, immutable network: everything the engine scans.
#[derive(Debug)]
pub(crate) struct Network {
    pub lookup: Lookup,
    pub stop_context: StopContext,
    pub route_traversal: RouteTraversal,
}

impl Network {
    /// Route indices serving `stop`.
    pub fn routes_of_stop(&self, stop: &Stop) -> &[usize] {
        let start = stop.first_stop_route_idx;
        &self.stop_context.stop_routes[start..start + stop.number_of_routes]
    }

    /// Outgoing walking transfers of `stop`, with their indices into the
    /// flat transfer array.
    pub fn transfers_of_stop(&self, stop: &Stop) -> &[Transfer] {
        let start = stop.first_transfer_idx;
        &self.stop_context.transfers[start..start + stop.number_of_transfers]
    }
}

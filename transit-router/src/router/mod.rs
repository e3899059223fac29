//! The routing engine facade.
//!
//! A [`Router`] is built once per timetable version via
//! [`NetworkBuilder`](crate::NetworkBuilder) and is thereafter read-only:
//! arbitrarily many queries may run against it concurrently. Refreshing the
//! timetable means building a new router and swapping the reference; in
//! flight queries finish safely against the instance they captured.

mod config;
mod query;
mod reconstruct;
mod relaxer;
mod scanner;
mod state;


use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use config::{QueryConfig, RouterConfig};

use crate::daily::DayViewProvider;
use crate::domain::Connection;
use crate::network::Network;
use query::{Query, clamp_duration};
use reconstruct::LabelPostprocessor;

/// Direction of a query's time anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeType {
    /// Anchors are departure times; minimize arrival ("earliest arrival").
    Departure,
    /// Anchors are arrival times; maximize departure ("latest departure").
    Arrival,
}

impl TimeType {
    /// Multiplier threaded through every time comparison so both
    /// directions share one code path.
    pub(crate) fn direction(&self) -> i32 {
        match self {
            TimeType::Departure => 1,
            TimeType::Arrival => -1,
        }
    }
}

/// A query failed before or during routing.
///
/// Individual unknown stop ids are dropped with a warning instead; these
/// errors are raised only when nothing usable remains.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    /// A stop map was empty
    #[error("{side} stops must not be empty")]
    EmptyStops { side: &'static str },

    /// Every id of one side was unknown to the network
    #[error("none of the provided {side} stop ids exist in the network")]
    NoValidStops { side: &'static str },

    /// The same stop appears on both sides
    #[error("source and target stop ids must be disjoint")]
    SourceTargetOverlap,

    /// Source anchors more than a day apart
    #[error("source stop times must not differ by more than 24 hours")]
    SourceTimeSpreadTooLarge,

    /// Programming-error-class invariant violation; fails this query only
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

const MAX_SOURCE_TIME_SPREAD_SECONDS: i64 = 24 * 60 * 60;

/// The round-based routing engine over an immutable network.
pub struct Router {
    network: Arc<Network>,
    day_views: DayViewProvider,
}

impl Router {
    /// Starts building a router from timetable records.
    pub fn builder(config: RouterConfig) -> crate::network::NetworkBuilder {
        crate::network::NetworkBuilder::new(config)
    }

    pub(crate) fn new(network: Network, config: RouterConfig) -> Self {
        let network = Arc::new(network);
        let mut mask_provider = config.mask_provider;
        mask_provider.set_trip_ids(network.lookup.route_trip_ids.clone());
        let day_views = DayViewProvider::new(
            network.clone(),
            mask_provider,
            config.day_view_cache_size,
        );

        Router { network, day_views }
    }

    /// Pareto-optimal connections departing at or after the given times,
    /// minimizing arrival time per transfer count.
    ///
    /// `departure_stops` maps stop ids to departure anchors;
    /// `arrival_stops` maps stop ids to walking seconds needed after
    /// alighting there.
    pub fn route_earliest_arrival(
        &self,
        departure_stops: &HashMap<String, DateTime<Utc>>,
        arrival_stops: &HashMap<String, u32>,
        config: &QueryConfig,
    ) -> Result<Vec<Connection>, QueryError> {
        check_non_empty(departure_stops, "departure")?;
        check_non_empty(arrival_stops, "arrival")?;
        debug!(
            sources = departure_stops.len(),
            targets = arrival_stops.len(),
            "routing earliest arrival"
        );

        self.route_connections(departure_stops, arrival_stops, TimeType::Departure, config)
    }

    /// Pareto-optimal connections arriving at or before the given times,
    /// maximizing departure time per transfer count.
    pub fn route_latest_departure(
        &self,
        departure_stops: &HashMap<String, u32>,
        arrival_stops: &HashMap<String, DateTime<Utc>>,
        config: &QueryConfig,
    ) -> Result<Vec<Connection>, QueryError> {
        check_non_empty(departure_stops, "departure")?;
        check_non_empty(arrival_stops, "arrival")?;
        debug!(
            sources = arrival_stops.len(),
            targets = departure_stops.len(),
            "routing latest departure"
        );

        // run the scan from the arrival anchors; time comparisons mirror
        self.route_connections(arrival_stops, departure_stops, TimeType::Arrival, config)
    }

    /// The single best connection from the source stops to every reachable
    /// stop, keyed by stop id.
    pub fn route_isolines(
        &self,
        source_stops: &HashMap<String, DateTime<Utc>>,
        time_type: TimeType,
        config: &QueryConfig,
    ) -> Result<HashMap<String, Connection>, QueryError> {
        check_non_empty(source_stops, "source")?;
        validate_source_time_spread(source_stops)?;
        debug!(sources = source_stops.len(), ?time_type, "routing isolines");

        let (reference_date, source_pairs) = self.resolve_sources(source_stops, time_type)?;
        let day_view = self.day_views.day_view(reference_date, config);

        let rounds = Query {
            network: &self.network,
            stop_times: day_view.as_slice(),
            source_stops: &source_pairs,
            target_stops: &[],
            config,
            time_type,
        }
        .run();

        LabelPostprocessor::new(
            &self.network,
            day_view.as_slice(),
            time_type,
            reference_date,
            config.reference_timezone,
        )
        .reconstruct_isolines(&rounds)
    }

    /// Materializes (and caches) the day view for `date` ahead of queries.
    pub fn prepare_day_view(&self, date: NaiveDate) {
        self.day_views.day_view(date, &QueryConfig::default());
    }

    fn route_connections(
        &self,
        source_stops: &HashMap<String, DateTime<Utc>>,
        target_stops: &HashMap<String, u32>,
        time_type: TimeType,
        config: &QueryConfig,
    ) -> Result<Vec<Connection>, QueryError> {
        validate_source_time_spread(source_stops)?;
        if source_stops
            .keys()
            .any(|stop_id| target_stops.contains_key(stop_id))
        {
            return Err(QueryError::SourceTargetOverlap);
        }

        let (reference_date, source_pairs) = self.resolve_sources(source_stops, time_type)?;
        let target_pairs = self.resolve_targets(target_stops)?;
        let day_view = self.day_views.day_view(reference_date, config);

        let rounds = Query {
            network: &self.network,
            stop_times: day_view.as_slice(),
            source_stops: &source_pairs,
            target_stops: &target_pairs,
            config,
            time_type,
        }
        .run();

        LabelPostprocessor::new(
            &self.network,
            day_view.as_slice(),
            time_type,
            reference_date,
            config.reference_timezone,
        )
        .reconstruct_pareto(&rounds, &target_pairs, config.allow_target_transfer)
    }

    /// Maps source anchors to `(stop index, seconds since reference
    /// midnight UTC)`, dropping unknown ids with a warning.
    fn resolve_sources(
        &self,
        source_stops: &HashMap<String, DateTime<Utc>>,
        time_type: TimeType,
    ) -> Result<(NaiveDate, Vec<(usize, i32)>), QueryError> {
        let reference = match time_type {
            TimeType::Departure => source_stops.values().min(),
            TimeType::Arrival => source_stops.values().max(),
        }
        .copied()
        .ok_or(QueryError::EmptyStops { side: "source" })?;

        let reference_date = reference.date_naive();
        let base = Utc.from_utc_datetime(&reference_date.and_time(NaiveTime::MIN));

        let mut pairs = Vec::with_capacity(source_stops.len());
        for (stop_id, time) in source_stops {
            match self.network.lookup.stops.get(stop_id) {
                Some(&stop_idx) => {
                    let seconds = (*time - base).num_seconds() as i32;
                    pairs.push((stop_idx, seconds));
                }
                None => warn!(stop = %stop_id, "unknown source stop id, dropping from query"),
            }
        }

        if pairs.is_empty() {
            return Err(QueryError::NoValidStops { side: "source" });
        }
        pairs.sort_unstable_by_key(|&(stop_idx, _)| stop_idx);

        Ok((reference_date, pairs))
    }

    /// Maps target walk durations to `(stop index, walking seconds)`,
    /// dropping unknown ids with a warning.
    fn resolve_targets(
        &self,
        target_stops: &HashMap<String, u32>,
    ) -> Result<Vec<(usize, i32)>, QueryError> {
        let mut pairs = Vec::with_capacity(target_stops.len());
        for (stop_id, walk) in target_stops {
            match self.network.lookup.stops.get(stop_id) {
                Some(&stop_idx) => pairs.push((stop_idx, clamp_duration(*walk))),
                None => warn!(stop = %stop_id, "unknown target stop id, dropping from query"),
            }
        }

        if pairs.is_empty() {
            return Err(QueryError::NoValidStops { side: "target" });
        }
        pairs.sort_unstable_by_key(|&(stop_idx, _)| stop_idx);

        Ok(pairs)
    }
}

fn check_non_empty<V>(
    stops: &HashMap<String, V>,
    side: &'static str,
) -> Result<(), QueryError> {
    if stops.is_empty() {
        return Err(QueryError::EmptyStops { side });
    }
    Ok(())
}

fn validate_source_time_spread(
    source_stops: &HashMap<String, DateTime<Utc>>,
) -> Result<(), QueryError> {
    let Some(min) = source_stops.values().min() else {
        return Ok(());
    };
    let Some(max) = source_stops.values().max() else {
        return Ok(());
    };
    if (*max - *min).num_seconds() > MAX_SOURCE_TIME_SPREAD_SECONDS {
        return Err(QueryError::SourceTimeSpreadTooLarge);
    }
    Ok(())
}

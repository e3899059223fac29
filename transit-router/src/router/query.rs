//! Query orchestration.
//!
//! Coordinates one routing request: seeds the source stops, alternates
//! route scanning and footpath relaxation round by round, prunes
//! suboptimal labels after each round, and stops when no stop improved or
//! the transfer cap is reached. The result is the full list of per-round
//! label layers; every round boundary is a pareto front candidate.

use tracing::debug;

use super::TimeType;
use super::config::QueryConfig;
use super::relaxer::FootpathRelaxer;
use super::scanner::RouteScanner;
use super::state::{INFINITY, Label, LabelSource, NEG_INFINITY, QueryState};
use crate::network::Network;

/// Clamps an unsigned config duration into the engine's i32 time domain.
pub(crate) fn clamp_duration(duration: u32) -> i32 {
    duration.min(i32::MAX as u32) as i32
}

pub(crate) struct Query<'a> {
    pub network: &'a Network,
    /// Day-materialized stop times.
    pub stop_times: &'a [i32],
    /// `(stop index, departure/arrival time)` pairs, in index order.
    pub source_stops: &'a [(usize, i32)],
    /// `(stop index, walking seconds to target)` pairs, in index order;
    /// empty for isoline queries.
    pub target_stops: &'a [(usize, i32)],
    pub config: &'a QueryConfig,
    pub time_type: TimeType,
}

impl Query<'_> {
    /// Runs the round loop to completion.
    pub fn run(&self) -> Vec<Vec<Option<Label>>> {
        let stop_count = self.network.stop_context.stops.len();
        let mut state = QueryState::new(stop_count, self.time_type);

        let min_transfer = clamp_duration(self.config.minimum_transfer_duration);
        let max_walk = clamp_duration(self.config.maximum_walking_duration);
        let scanner =
            RouteScanner::new(self.network, self.stop_times, min_transfer, self.time_type);
        let relaxer =
            FootpathRelaxer::new(self.network, min_transfer, max_walk, self.time_type);
        let cutoff = self.cutoff_time();

        // seed all source stops and mark them
        for &(stop_idx, time) in self.source_stops {
            state.set_label(
                0,
                stop_idx,
                Label {
                    source_time: time,
                    target_time: time,
                    source: LabelSource::Initial,
                    stop: stop_idx,
                    previous: None,
                },
            );
            state.set_best_time(stop_idx, time);
            state.mark(stop_idx);
        }

        if self.config.allow_source_transfer {
            let sources: Vec<usize> = self.source_stops.iter().map(|&(stop, _)| stop).collect();
            relaxer.relax_initial(&sources, &mut state);
        }
        self.remove_suboptimal_labels(0, cutoff, &mut state);

        let mut round = 1usize;
        while state.has_marked_stops()
            && (round as u64 - 1) <= u64::from(self.config.maximum_transfer_number)
        {
            state.advance_round();
            debug_assert_eq!(state.round(), round);

            scanner.scan(round, &mut state);

            // relax only from the stops the scan improved; transfers found
            // now feed the next round
            let snapshot = state.snapshot_marked_next_round();
            relaxer.relax(round, &snapshot, &mut state);

            self.remove_suboptimal_labels(round, cutoff, &mut state);
            round += 1;
        }

        debug!(rounds = round, "query finished");
        state.into_rounds()
    }

    /// Latest allowed arrival (earliest allowed departure) derived from
    /// the maximum travel time; stops reached beyond it are never
    /// expanded.
    fn cutoff_time(&self) -> i32 {
        let Some(limit) = self.config.maximum_travel_time else {
            return match self.time_type {
                TimeType::Departure => INFINITY,
                TimeType::Arrival => NEG_INFINITY,
            };
        };

        let limit = clamp_duration(limit);
        let times = self.source_stops.iter().map(|&(_, time)| time);
        match self.time_type {
            TimeType::Departure => times
                .min()
                .map_or(INFINITY, |earliest| earliest.saturating_add(limit)),
            TimeType::Arrival => times
                .max()
                .map_or(NEG_INFINITY, |latest| latest.saturating_sub(limit)),
        }
    }

    /// Unmarks newly marked stops whose round label cannot lead to a
    /// better result than the best already known at any target stop, and
    /// discards those labels.
    fn remove_suboptimal_labels(&self, round: usize, cutoff: i32, state: &mut QueryState) {
        let best = self.best_target_time(cutoff, state);
        if best == INFINITY || best == NEG_INFINITY {
            return;
        }

        let dir = self.time_type.direction();
        for stop_idx in 0..state.stop_count() {
            if !state.is_marked_next_round(stop_idx) {
                continue;
            }
            let verdict = state
                .label(round, stop_idx)
                .map(|label| dir * label.target_time > dir * best);
            match verdict {
                Some(true) => {
                    state.clear_label(round, stop_idx);
                    state.unmark(stop_idx);
                }
                Some(false) => {}
                None => state.unmark(stop_idx),
            }
        }
    }

    /// Best time achievable at any target stop so far, adjusted by each
    /// target's walk time, bounded by the travel time cutoff.
    fn best_target_time(&self, cutoff: i32, state: &QueryState) -> i32 {
        // with target transfers disallowed the per-stop best times may
        // stem from unusable transfer arrivals; only the cutoff prunes
        if !self.config.allow_target_transfer {
            return cutoff;
        }

        let dir = self.time_type.direction();
        let mut best = cutoff;
        for &(stop_idx, walk) in self.target_stops {
            // the actual label time, not the comparable best time: the
            // latter carries the same-stop transfer bias of walk arrivals
            // and would over-prune
            let reached = state.actual_best_time(stop_idx);
            if reached == INFINITY || reached == NEG_INFINITY {
                continue;
            }
            let candidate = reached.saturating_add(dir * walk);
            if dir * candidate < dir * best {
                best = candidate;
            }
        }

        best
    }
}

//! Footpath relaxation.
//!
//! After each route scan, time improvements are propagated across walking
//! transfers from every newly improved stop. A stop that was itself only
//! reached by a transfer in the same round is never the source of a
//! further relaxation, so walk chains cannot grow within one round.

use tracing::debug;

use super::TimeType;
use super::state::{Label, LabelRef, LabelSource, QueryState};
use crate::network::Network;

pub(crate) struct FootpathRelaxer<'a> {
    network: &'a Network,
    /// Rest period added to every walk.
    min_transfer_duration: i32,
    max_walking_duration: i32,
    time_type: TimeType,
}

impl<'a> FootpathRelaxer<'a> {
    pub fn new(
        network: &'a Network,
        min_transfer_duration: i32,
        max_walking_duration: i32,
        time_type: TimeType,
    ) -> Self {
        FootpathRelaxer {
            network,
            min_transfer_duration,
            max_walking_duration,
            time_type,
        }
    }

    /// Relaxes footpaths from all source stops at round 0.
    pub fn relax_initial(&self, source_stops: &[usize], state: &mut QueryState) {
        debug!("initial relaxing of footpaths for source stops");
        for &stop_idx in source_stops {
            self.expand_footpaths_from_stop(stop_idx, 0, state);
        }
    }

    /// Relaxes footpaths from every stop flagged in `snapshot` (the stops
    /// the route scan just improved), marking improved targets for the
    /// next round.
    pub fn relax(&self, round: usize, snapshot: &[bool], state: &mut QueryState) {
        debug!(round, "relaxing footpaths");
        for (stop_idx, marked) in snapshot.iter().enumerate() {
            if *marked {
                self.expand_footpaths_from_stop(stop_idx, round, state);
            }
        }
    }

    fn expand_footpaths_from_stop(&self, stop_idx: usize, round: usize, state: &mut QueryState) {
        let stop = &self.network.stop_context.stops[stop_idx];
        if stop.number_of_transfers == 0 {
            return;
        }

        let source_time = match state.label(round, stop_idx) {
            // a stop reached by a transfer in this round does not relax again
            None
            | Some(Label {
                source: LabelSource::Transfer { .. },
                ..
            }) => return,
            Some(label) => label.target_time,
        };

        let dir = self.time_type.direction();
        let first = stop.first_transfer_idx;

        for (offset, &transfer) in self.network.transfers_of_stop(stop).iter().enumerate() {
            let transfer_idx = first + offset;
            if transfer.duration > self.max_walking_duration {
                continue;
            }

            let target_stop = &self.network.stop_context.stops[transfer.target_stop_idx];
            let target_time = source_time + dir * (transfer.duration + self.min_transfer_duration);

            // subtract the target stop's same-stop transfer time for the
            // comparison only: the walk may allow catching a trip that a
            // route arrival at this stop could not, because route times do
            // not yet include the same-stop transfer bias
            let comparable_target_time = target_time - target_stop.same_stop_transfer_time * dir;

            if dir * comparable_target_time >= dir * state.best_time(transfer.target_stop_idx) {
                continue;
            }

            state.set_best_time(transfer.target_stop_idx, comparable_target_time);
            state.set_label(
                round,
                transfer.target_stop_idx,
                Label {
                    source_time,
                    target_time,
                    source: LabelSource::Transfer {
                        transfer: transfer_idx,
                    },
                    stop: transfer.target_stop_idx,
                    previous: Some(LabelRef {
                        round,
                        stop: stop_idx,
                    }),
                },
            );
            state.mark(transfer.target_stop_idx);
        }
    }
}

//! Per-query search state.
//!
//! One query owns one `QueryState`: the best label per stop per round, the
//! global best time per stop, and the marked-stop masks driving the next
//! round. Labels form a backward chain through `(round, stop)` references
//! into earlier rounds; a predecessor's round is always strictly lower, so
//! the chain is acyclic and bounded by the round count.

use super::TimeType;

/// Best time placeholder for a stop not yet reached (earliest-arrival
/// direction).
pub(crate) const INFINITY: i32 = i32::MAX;

/// Best time placeholder for a stop not yet reached (latest-departure
/// direction). `-i32::MAX`, so negation under the time-direction
/// multiplier cannot overflow.
pub(crate) const NEG_INFINITY: i32 = -i32::MAX;

/// Reference to a label of an earlier round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LabelRef {
    pub round: usize,
    pub stop: usize,
}

/// How a label's stop was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LabelSource {
    /// Seeded source stop; the start of every chain.
    Initial,
    /// Riding a trip of a route.
    Route { route: usize, trip_offset: usize },
    /// Walking a transfer between distinct stops.
    Transfer { transfer: usize },
}

/// One best (time, round) state at a stop.
///
/// `source_time`/`target_time` are UTC-relative seconds in scan direction:
/// for earliest-arrival queries the source time is the boarding/walk start
/// and the target time the arrival; for latest-departure queries the roles
/// are mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Label {
    pub source_time: i32,
    pub target_time: i32,
    pub source: LabelSource,
    pub stop: usize,
    pub previous: Option<LabelRef>,
}

/// Mutable state of one routing query.
pub(crate) struct QueryState {
    time_type: TimeType,
    /// One `Option<Label>` per stop per round; earlier rounds are never
    /// mutated once the round has advanced.
    labels_per_round: Vec<Vec<Option<Label>>>,
    /// Global best comparable time per stop across all rounds.
    best_times: Vec<i32>,
    marked_this_round: Vec<bool>,
    marked_next_round: Vec<bool>,
    round: usize,
}

impl QueryState {
    pub fn new(stop_count: usize, time_type: TimeType) -> Self {
        let unreached = match time_type {
            TimeType::Departure => INFINITY,
            TimeType::Arrival => NEG_INFINITY,
        };

        QueryState {
            time_type,
            labels_per_round: vec![vec![None; stop_count]],
            best_times: vec![unreached; stop_count],
            marked_this_round: vec![false; stop_count],
            marked_next_round: vec![false; stop_count],
            round: 0,
        }
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn stop_count(&self) -> usize {
        self.best_times.len()
    }

    /// Moves to the next round: stops marked for "next" become "this",
    /// and a fresh label layer is added.
    pub fn advance_round(&mut self) {
        std::mem::swap(&mut self.marked_this_round, &mut self.marked_next_round);
        self.marked_next_round.fill(false);
        self.round += 1;
        self.labels_per_round.push(vec![None; self.stop_count()]);
    }

    pub fn label(&self, round: usize, stop: usize) -> Option<&Label> {
        self.labels_per_round[round][stop].as_ref()
    }

    pub fn set_label(&mut self, round: usize, stop: usize, label: Label) {
        self.labels_per_round[round][stop] = Some(label);
    }

    pub fn clear_label(&mut self, round: usize, stop: usize) {
        self.labels_per_round[round][stop] = None;
    }

    /// Global best comparable time at `stop`. Transfer arrivals store their
    /// same-stop-transfer-adjusted time here, so comparisons against route
    /// times are unbiased.
    pub fn best_time(&self, stop: usize) -> i32 {
        self.best_times[stop]
    }

    pub fn set_best_time(&mut self, stop: usize, time: i32) {
        self.best_times[stop] = time;
    }

    /// Actual best target time at `stop` across all rounds, read from the
    /// labels themselves. Unlike [`QueryState::best_time`] this carries no
    /// same-stop transfer bias, so it is safe to compare against label
    /// times of any type.
    pub fn actual_best_time(&self, stop: usize) -> i32 {
        let (dir, mut best) = match self.time_type {
            TimeType::Departure => (1, INFINITY),
            TimeType::Arrival => (-1, NEG_INFINITY),
        };
        for labels in &self.labels_per_round {
            if let Some(label) = &labels[stop] {
                if dir * label.target_time < dir * best {
                    best = label.target_time;
                }
            }
        }
        best
    }

    /// True when `stop` never improved in this direction.
    pub fn is_unreached(&self, stop: usize) -> bool {
        let unreached = match self.time_type {
            TimeType::Departure => INFINITY,
            TimeType::Arrival => NEG_INFINITY,
        };
        self.best_times[stop] == unreached
    }

    pub fn is_marked_this_round(&self, stop: usize) -> bool {
        self.marked_this_round[stop]
    }

    pub fn mark(&mut self, stop: usize) {
        self.marked_next_round[stop] = true;
    }

    pub fn unmark(&mut self, stop: usize) {
        self.marked_next_round[stop] = false;
    }

    pub fn is_marked_next_round(&self, stop: usize) -> bool {
        self.marked_next_round[stop]
    }

    pub fn has_marked_stops(&self) -> bool {
        self.marked_next_round.iter().any(|&marked| marked)
    }

    /// Snapshot of the stops marked for the next round, for iteration
    /// while further marks are being added.
    pub fn snapshot_marked_next_round(&self) -> Vec<bool> {
        self.marked_next_round.clone()
    }

    /// Consumes the state into the per-round label layers.
    pub fn into_rounds(self) -> Vec<Vec<Option<Label>>> {
        self.labels_per_round
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn initial_label(stop: usize, time: i32) -> Label {
        Label {
            source_time: 0,
            target_time: time,
            source: LabelSource::Initial,
            stop,
            previous: None,
        }
    }

    #[test]
    fn new_state_is_unreached_everywhere() {
        let state = QueryState::new(3, TimeType::Departure);
        assert_eq!(state.round(), 0);
        for stop in 0..3 {
            assert!(state.is_unreached(stop));
            assert!(state.label(0, stop).is_none());
            assert!(!state.is_marked_this_round(stop));
        }

        let state = QueryState::new(3, TimeType::Arrival);
        assert_eq!(state.best_time(0), NEG_INFINITY);
    }

    #[test]
    fn advance_round_swaps_marks() {
        let mut state = QueryState::new(2, TimeType::Departure);
        state.mark(1);
        assert!(!state.is_marked_this_round(1));

        state.advance_round();
        assert_eq!(state.round(), 1);
        assert!(state.is_marked_this_round(1));
        assert!(!state.has_marked_stops());
    }

    #[test]
    fn labels_are_per_round() {
        let mut state = QueryState::new(2, TimeType::Departure);
        state.set_label(0, 0, initial_label(0, 100));
        state.advance_round();
        state.set_label(
            1,
            1,
            Label {
                source_time: 100,
                target_time: 200,
                source: LabelSource::Route {
                    route: 0,
                    trip_offset: 0,
                },
                stop: 1,
                previous: Some(LabelRef { round: 0, stop: 0 }),
            },
        );

        assert_eq!(state.label(0, 0).unwrap().target_time, 100);
        assert!(state.label(1, 0).is_none());
        let label = state.label(1, 1).unwrap();
        assert_eq!(label.previous, Some(LabelRef { round: 0, stop: 0 }));
    }

    #[test]
    fn unmark_and_clear_discard_suboptimal_state() {
        let mut state = QueryState::new(2, TimeType::Departure);
        state.set_label(0, 0, initial_label(0, 100));
        state.mark(0);
        assert!(state.has_marked_stops());

        state.unmark(0);
        state.clear_label(0, 0);
        assert!(!state.has_marked_stops());
        assert!(state.label(0, 0).is_none());
    }

    #[test]
    fn snapshot_is_independent() {
        let mut state = QueryState::new(2, TimeType::Departure);
        state.mark(0);
        let snapshot = state.snapshot_marked_next_round();
        state.mark(1);
        assert!(snapshot[0]);
        assert!(!snapshot[1]);
    }
}

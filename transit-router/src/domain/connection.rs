//! Connection types.
//!
//! A `Connection` is a complete, validated journey from an origin stop to a
//! destination stop: an ordered sequence of route and walk-transfer legs.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::Serialize;

use super::{DomainError, Leg};

/// A complete connection from origin to destination.
///
/// # Invariants
///
/// - At least one leg
/// - Consecutive legs connect (arrival stop of one = departure stop of next)
/// - Times are chronological within and across legs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    legs: Vec<Leg>,
}

impl Connection {
    /// Constructs a connection from legs, validating the invariants above.
    pub(crate) fn new(legs: Vec<Leg>) -> Result<Self, DomainError> {
        if legs.is_empty() {
            return Err(DomainError::EmptyConnection);
        }

        for leg in &legs {
            if leg.arrival() < leg.departure() {
                return Err(DomainError::NonChronologicalLegs);
            }
        }

        for window in legs.windows(2) {
            if window[0].to_stop_id() != window[1].from_stop_id() {
                return Err(DomainError::LegsNotConnected(
                    window[0].to_stop_id().to_string(),
                    window[1].from_stop_id().to_string(),
                ));
            }
            if window[1].departure() < window[0].arrival() {
                return Err(DomainError::NonChronologicalLegs);
            }
        }

        Ok(Connection { legs })
    }

    /// All legs in travel order.
    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// The stop this connection departs from.
    pub fn from_stop_id(&self) -> &str {
        self.legs[0].from_stop_id()
    }

    /// The stop this connection arrives at.
    pub fn to_stop_id(&self) -> &str {
        self.legs[self.legs.len() - 1].to_stop_id()
    }

    /// Departure time at the origin stop.
    pub fn departure_time(&self) -> &DateTime<Tz> {
        self.legs[0].departure()
    }

    /// Arrival time at the destination stop.
    pub fn arrival_time(&self) -> &DateTime<Tz> {
        self.legs[self.legs.len() - 1].arrival()
    }

    /// Total travel duration, including waiting between legs.
    pub fn duration(&self) -> Duration {
        self.arrival_time().signed_duration_since(self.departure_time())
    }

    /// The route legs of this connection, in travel order.
    pub fn route_legs(&self) -> impl Iterator<Item = &Leg> {
        self.legs.iter().filter(|leg| leg.is_route())
    }

    /// The walk transfer legs of this connection, in travel order.
    pub fn walk_transfers(&self) -> impl Iterator<Item = &Leg> {
        self.legs.iter().filter(|leg| leg.is_walk_transfer())
    }

    /// Number of trip changes made without walking, i.e. adjacent route leg
    /// pairs.
    pub fn number_of_same_stop_transfers(&self) -> usize {
        self.legs
            .windows(2)
            .filter(|pair| pair[0].is_route() && pair[1].is_route())
            .count()
    }

    /// Total number of transfers: same-stop changes plus walk transfers.
    pub fn number_of_total_transfers(&self) -> usize {
        self.number_of_same_stop_transfers() + self.walk_transfers().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn time(secs: i64) -> DateTime<Tz> {
        chrono_tz::UTC.timestamp_opt(secs, 0).unwrap()
    }

    fn route(from: &str, to: &str, dep: i64, arr: i64) -> Leg {
        Leg::Route {
            route_id: format!("{from}{to}"),
            trip_id: format!("{from}{to}-T1"),
            from_stop_id: from.into(),
            to_stop_id: to.into(),
            departure: time(dep),
            arrival: time(arr),
        }
    }

    fn walk(from: &str, to: &str, dep: i64, arr: i64) -> Leg {
        Leg::WalkTransfer {
            from_stop_id: from.into(),
            to_stop_id: to.into(),
            departure: time(dep),
            arrival: time(arr),
        }
    }

    #[test]
    fn empty_connection_rejected() {
        assert!(matches!(
            Connection::new(vec![]),
            Err(DomainError::EmptyConnection)
        ));
    }

    #[test]
    fn disconnected_legs_rejected() {
        let result = Connection::new(vec![route("A", "B", 0, 300), route("C", "D", 400, 700)]);
        assert!(matches!(result, Err(DomainError::LegsNotConnected(_, _))));
    }

    #[test]
    fn non_chronological_legs_rejected() {
        // second leg departs before first arrives
        let result = Connection::new(vec![route("A", "B", 0, 300), route("B", "C", 200, 700)]);
        assert!(matches!(result, Err(DomainError::NonChronologicalLegs)));

        // leg arrives before it departs
        let result = Connection::new(vec![route("A", "B", 300, 0)]);
        assert!(matches!(result, Err(DomainError::NonChronologicalLegs)));
    }

    #[test]
    fn accessors() {
        let connection = Connection::new(vec![
            route("A", "B", 0, 300),
            walk("B", "C", 300, 480),
            route("C", "D", 600, 900),
        ])
        .unwrap();

        assert_eq!(connection.from_stop_id(), "A");
        assert_eq!(connection.to_stop_id(), "D");
        assert_eq!(connection.departure_time(), &time(0));
        assert_eq!(connection.arrival_time(), &time(900));
        assert_eq!(connection.duration(), Duration::minutes(15));
        assert_eq!(connection.route_legs().count(), 2);
        assert_eq!(connection.walk_transfers().count(), 1);
    }

    #[test]
    fn transfer_counts() {
        // route, route (same-stop change), walk, route
        let connection = Connection::new(vec![
            route("A", "B", 0, 300),
            route("B", "C", 400, 700),
            walk("C", "D", 700, 880),
            route("D", "E", 900, 1200),
        ])
        .unwrap();

        assert_eq!(connection.number_of_same_stop_transfers(), 1);
        assert_eq!(connection.number_of_total_transfers(), 2);
    }
}

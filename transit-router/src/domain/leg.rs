//! Leg types.
//!
//! A leg is the part of a connection travelled without changing vehicles:
//! either riding a single trip of a route, or walking a transfer between
//! two distinct stops. Each endpoint carries its own timezone, resolved
//! during reconstruction.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::Serialize;

/// A single leg of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Leg {
    /// Riding one trip of a route between two stops.
    Route {
        route_id: String,
        trip_id: String,
        from_stop_id: String,
        to_stop_id: String,
        departure: DateTime<Tz>,
        arrival: DateTime<Tz>,
    },
    /// Walking between two distinct stops.
    WalkTransfer {
        from_stop_id: String,
        to_stop_id: String,
        departure: DateTime<Tz>,
        arrival: DateTime<Tz>,
    },
}

impl Leg {
    /// Identifier of this leg: the route id for route legs, a synthetic
    /// `transfer_<from>_<to>` id for walk transfers.
    pub fn id(&self) -> String {
        match self {
            Leg::Route { route_id, .. } => route_id.clone(),
            Leg::WalkTransfer {
                from_stop_id,
                to_stop_id,
                ..
            } => format!("transfer_{from_stop_id}_{to_stop_id}"),
        }
    }

    /// The stop this leg departs from.
    pub fn from_stop_id(&self) -> &str {
        match self {
            Leg::Route { from_stop_id, .. } | Leg::WalkTransfer { from_stop_id, .. } => {
                from_stop_id
            }
        }
    }

    /// The stop this leg arrives at.
    pub fn to_stop_id(&self) -> &str {
        match self {
            Leg::Route { to_stop_id, .. } | Leg::WalkTransfer { to_stop_id, .. } => to_stop_id,
        }
    }

    /// Departure time at the first stop of the leg.
    pub fn departure(&self) -> &DateTime<Tz> {
        match self {
            Leg::Route { departure, .. } | Leg::WalkTransfer { departure, .. } => departure,
        }
    }

    /// Arrival time at the last stop of the leg.
    pub fn arrival(&self) -> &DateTime<Tz> {
        match self {
            Leg::Route { arrival, .. } | Leg::WalkTransfer { arrival, .. } => arrival,
        }
    }

    /// Duration of the leg.
    pub fn duration(&self) -> Duration {
        self.arrival().signed_duration_since(self.departure())
    }

    /// Returns true if this is a route leg.
    pub fn is_route(&self) -> bool {
        matches!(self, Leg::Route { .. })
    }

    /// Returns true if this is a walk transfer leg.
    pub fn is_walk_transfer(&self) -> bool {
        matches!(self, Leg::WalkTransfer { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn time(secs: i64) -> DateTime<Tz> {
        chrono_tz::UTC.timestamp_opt(secs, 0).unwrap()
    }

    fn route_leg() -> Leg {
        Leg::Route {
            route_id: "R1".into(),
            trip_id: "R1-T1".into(),
            from_stop_id: "A".into(),
            to_stop_id: "B".into(),
            departure: time(0),
            arrival: time(300),
        }
    }

    fn walk_leg() -> Leg {
        Leg::WalkTransfer {
            from_stop_id: "B".into(),
            to_stop_id: "C".into(),
            departure: time(300),
            arrival: time(480),
        }
    }

    #[test]
    fn route_leg_id_is_route_id() {
        assert_eq!(route_leg().id(), "R1");
    }

    #[test]
    fn walk_leg_id_is_synthetic() {
        assert_eq!(walk_leg().id(), "transfer_B_C");
    }

    #[test]
    fn accessors() {
        let leg = route_leg();
        assert_eq!(leg.from_stop_id(), "A");
        assert_eq!(leg.to_stop_id(), "B");
        assert_eq!(leg.duration(), Duration::minutes(5));
        assert!(leg.is_route());
        assert!(!leg.is_walk_transfer());

        let walk = walk_leg();
        assert_eq!(walk.duration(), Duration::minutes(3));
        assert!(walk.is_walk_transfer());
    }
}
